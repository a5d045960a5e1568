//! Traits for backends.

use crate::nv_tree::{NativeKind, NativeView};
use crate::rect::Rect;
use crate::view_tree::ViewId;
use std::collections::HashMap;
use thiserror::Error;

/// A backend implementation: creates and manipulates platform views.
pub trait Backend {
    /// A reference to a view in the backend.
    type ViewRef;

    /// Error type.
    type Error;

    /// Creates a new view.
    fn new_view(&mut self, id: ViewId, view: &NativeView) -> Result<Self::ViewRef, Self::Error>;

    /// Updates the view with new properties.
    fn update_view(
        &mut self,
        view: &mut Self::ViewRef,
        update: &NativeView,
    ) -> Result<(), Self::Error>;

    /// Replaces the view's subviews.
    fn set_subviews(
        &mut self,
        view: &mut Self::ViewRef,
        subviews: Vec<&Self::ViewRef>,
    ) -> Result<(), Self::Error>;

    /// Sets the view's frame, relative to its superview.
    fn set_frame(&mut self, view: &mut Self::ViewRef, frame: Rect) -> Result<(), Self::Error>;

    /// Removes the view from its superview and destroys it.
    fn remove_view(&mut self, view: Self::ViewRef) -> Result<(), Self::Error>;

    /// Installs the view as the root of the host window.
    fn set_root_view(&mut self, view: &mut Self::ViewRef) -> Result<(), Self::Error>;
}

/// A view handle in the [`HeadlessBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadlessView(usize);

/// A view as recorded by the [`HeadlessBackend`].
#[derive(Debug, Clone)]
pub struct HeadlessNode {
    pub id: ViewId,
    pub view: NativeView,
    pub subviews: Vec<HeadlessView>,
    pub frame: Rect,
}

/// Operations performed on a [`HeadlessBackend`], in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    New(ViewId, NativeKind),
    Update(ViewId),
    SetSubviews(ViewId, Vec<ViewId>),
    SetFrame(ViewId, Rect),
    Remove(ViewId),
    SetRoot(ViewId),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeadlessError {
    #[error("unknown headless view {0:?}")]
    UnknownView(HeadlessView),
}

/// An in-memory backend that records views and operations instead of drawing anything.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    views: HashMap<HeadlessView, HeadlessNode>,
    root: Option<HeadlessView>,
    next_handle: usize,
    ops: Vec<Op>,
}

impl HeadlessBackend {
    pub fn new() -> HeadlessBackend {
        HeadlessBackend::default()
    }

    pub fn get(&self, view: HeadlessView) -> Option<&HeadlessNode> {
        self.views.get(&view)
    }

    /// Looks up a view by the id it was created for.
    pub fn find(&self, id: ViewId) -> Option<&HeadlessNode> {
        self.views.values().find(|node| node.id == id)
    }

    pub fn root(&self) -> Option<&HeadlessNode> {
        self.root.and_then(|root| self.views.get(&root))
    }

    /// Number of live views.
    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// The operations log.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Drains the operations log.
    pub fn take_ops(&mut self) -> Vec<Op> {
        std::mem::take(&mut self.ops)
    }

    fn id_of(&self, view: HeadlessView) -> Result<ViewId, HeadlessError> {
        self.views
            .get(&view)
            .map(|node| node.id)
            .ok_or(HeadlessError::UnknownView(view))
    }

    fn node_mut(&mut self, view: HeadlessView) -> Result<&mut HeadlessNode, HeadlessError> {
        self.views
            .get_mut(&view)
            .ok_or(HeadlessError::UnknownView(view))
    }
}

impl Backend for HeadlessBackend {
    type ViewRef = HeadlessView;
    type Error = HeadlessError;

    fn new_view(&mut self, id: ViewId, view: &NativeView) -> Result<HeadlessView, HeadlessError> {
        let handle = HeadlessView(self.next_handle);
        self.next_handle += 1;
        self.views.insert(
            handle,
            HeadlessNode {
                id,
                view: view.clone(),
                subviews: Vec::new(),
                frame: Rect::zero(),
            },
        );
        self.ops.push(Op::New(id, view.kind));
        Ok(handle)
    }

    fn update_view(
        &mut self,
        view: &mut HeadlessView,
        update: &NativeView,
    ) -> Result<(), HeadlessError> {
        let node = self.node_mut(*view)?;
        node.view = update.clone();
        let id = node.id;
        self.ops.push(Op::Update(id));
        Ok(())
    }

    fn set_subviews(
        &mut self,
        view: &mut HeadlessView,
        subviews: Vec<&HeadlessView>,
    ) -> Result<(), HeadlessError> {
        let mut ids = Vec::with_capacity(subviews.len());
        for subview in &subviews {
            ids.push(self.id_of(**subview)?);
        }
        let node = self.node_mut(*view)?;
        node.subviews = subviews.into_iter().copied().collect();
        let id = node.id;
        self.ops.push(Op::SetSubviews(id, ids));
        Ok(())
    }

    fn set_frame(&mut self, view: &mut HeadlessView, frame: Rect) -> Result<(), HeadlessError> {
        let node = self.node_mut(*view)?;
        node.frame = frame;
        let id = node.id;
        self.ops.push(Op::SetFrame(id, frame));
        Ok(())
    }

    fn remove_view(&mut self, view: HeadlessView) -> Result<(), HeadlessError> {
        let node = self
            .views
            .remove(&view)
            .ok_or(HeadlessError::UnknownView(view))?;
        for other in self.views.values_mut() {
            other.subviews.retain(|subview| *subview != view);
        }
        if self.root == Some(view) {
            self.root = None;
        }
        self.ops.push(Op::Remove(node.id));
        Ok(())
    }

    fn set_root_view(&mut self, view: &mut HeadlessView) -> Result<(), HeadlessError> {
        let id = self.id_of(*view)?;
        self.root = Some(*view);
        self.ops.push(Op::SetRoot(id));
        Ok(())
    }
}
