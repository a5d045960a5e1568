use crate::backend::Backend;
use crate::element::{ExternalView, NativeType};
use crate::events::{EventHandler, Gesture, GestureEvent};
use crate::layout::LayoutResult;
use crate::properties::AnyProperties;
use crate::rect::Rect;
use crate::view_tree::ViewId;
use cgmath::{EuclideanSpace, Point2};
use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// What kind of platform view to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeKind {
    Native(NativeType),
    External(ExternalView),
}

/// A description of a native view, as sent to the UI side.
#[derive(Clone)]
pub struct NativeView {
    pub kind: NativeKind,
    pub properties: Arc<dyn AnyProperties>,
    /// The component that rendered this view, if any.
    pub owner: Option<ViewId>,
}

impl fmt::Debug for NativeView {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("NativeView")
            .field("kind", &self.kind)
            .field("properties", &self.properties)
            .field("owner", &self.owner)
            .finish()
    }
}

/// Patches for the NV tree.
#[derive(Debug, Clone)]
pub enum Patch {
    /// Installs a view as the root view.
    SetRoot(ViewId),
    /// Creates a view.
    Create(ViewId, NativeView),
    /// Updates a view's properties.
    Update(ViewId, NativeView),
    /// Replaces a view's subviews.
    Subviews(ViewId, Vec<ViewId>),
    /// Removes a view, along with whatever subviews it still has.
    Remove(ViewId),
}

/// Errors that may occur when running a patch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchError<E> {
    #[error("no such native view {0:?}")]
    NoSuchView(ViewId),
    #[error("backend error: {0:?}")]
    Backend(E),
    #[error("{0:?} cannot be its own subview")]
    Cycle(ViewId),
}

struct NVTNode<R> {
    view: NativeView,
    backing_ref: R,
    superview: Option<ViewId>,
    subviews: Vec<ViewId>,
    frame: Option<Rect>,
}

/// The native-view tree; mirrors what the backend is showing, applies layout and routes
/// gestures.
pub struct NVTree<B: Backend> {
    nodes: HashMap<ViewId, NVTNode<B::ViewRef>>,
    root: Option<ViewId>,
    backend: B,
}

impl<B: Backend> NVTree<B> {
    pub fn new(backend: B) -> NVTree<B> {
        NVTree {
            nodes: HashMap::new(),
            root: None,
            backend,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn root(&self) -> Option<ViewId> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn view(&self, id: ViewId) -> Option<&NativeView> {
        self.nodes.get(&id).map(|node| &node.view)
    }

    /// The last frame applied to the view, relative to its superview.
    pub fn frame(&self, id: ViewId) -> Option<Rect> {
        self.nodes.get(&id).and_then(|node| node.frame)
    }

    pub fn subviews(&self, id: ViewId) -> Option<&[ViewId]> {
        self.nodes.get(&id).map(|node| &node.subviews[..])
    }

    pub fn superview(&self, id: ViewId) -> Option<ViewId> {
        self.nodes.get(&id).and_then(|node| node.superview)
    }

    /// The view's frame in root coordinates.
    pub fn absolute_frame(&self, id: ViewId) -> Option<Rect> {
        let mut frame = self.frame(id)?;
        let mut superview = self.superview(id);
        while let Some(id) = superview {
            let origin = self.frame(id).map_or(Point2::origin(), |frame| frame.origin);
            frame = frame + origin;
            superview = self.superview(id);
        }
        Some(frame)
    }

    /// Patches the view tree.
    pub fn patch(&mut self, patch: Patch) -> Result<(), PatchError<B::Error>> {
        match patch {
            Patch::SetRoot(id) => self.set_root(id),
            Patch::Create(id, view) => self.create_view(id, view),
            Patch::Update(id, view) => self.update_view(id, view),
            Patch::Subviews(id, subviews) => self.set_subviews(id, subviews),
            Patch::Remove(id) => self.remove_view(id),
        }
    }

    fn set_root(&mut self, id: ViewId) -> Result<(), PatchError<B::Error>> {
        let node = self.nodes.get_mut(&id).ok_or(PatchError::NoSuchView(id))?;
        self.backend
            .set_root_view(&mut node.backing_ref)
            .map_err(PatchError::Backend)?;
        self.root = Some(id);
        Ok(())
    }

    fn create_view(&mut self, id: ViewId, view: NativeView) -> Result<(), PatchError<B::Error>> {
        if self.nodes.contains_key(&id) {
            log::warn!("view {:?} created twice; treating as an update", id);
            return self.update_view(id, view);
        }
        let backing_ref = self
            .backend
            .new_view(id, &view)
            .map_err(PatchError::Backend)?;
        self.nodes.insert(
            id,
            NVTNode {
                view,
                backing_ref,
                superview: None,
                subviews: Vec::new(),
                frame: None,
            },
        );
        Ok(())
    }

    fn update_view(&mut self, id: ViewId, view: NativeView) -> Result<(), PatchError<B::Error>> {
        let node = self.nodes.get_mut(&id).ok_or(PatchError::NoSuchView(id))?;
        self.backend
            .update_view(&mut node.backing_ref, &view)
            .map_err(PatchError::Backend)?;
        node.view = view;
        Ok(())
    }

    fn set_subviews(
        &mut self,
        id: ViewId,
        subviews: Vec<ViewId>,
    ) -> Result<(), PatchError<B::Error>> {
        if subviews.contains(&id) {
            return Err(PatchError::Cycle(id));
        }
        for subview in &subviews {
            if !self.nodes.contains_key(subview) {
                return Err(PatchError::NoSuchView(*subview));
            }
        }

        // remove the superview node because we need to alias self.nodes when sending a message to
        // the backend
        let mut superview_node = self.nodes.remove(&id).ok_or(PatchError::NoSuchView(id))?;
        let result = {
            let subview_refs = subviews
                .iter()
                .filter_map(|id| self.nodes.get(id).map(|node| &node.backing_ref))
                .collect();
            self.backend
                .set_subviews(&mut superview_node.backing_ref, subview_refs)
        };

        for old in &superview_node.subviews {
            if let Some(node) = self.nodes.get_mut(old) {
                if node.superview == Some(id) {
                    node.superview = None;
                }
            }
        }
        for subview in &subviews {
            if let Some(node) = self.nodes.get_mut(subview) {
                node.superview = Some(id);
            }
        }
        superview_node.subviews = subviews;
        self.nodes.insert(id, superview_node);
        result.map_err(PatchError::Backend)
    }

    /// Removes a view and whatever subviews it still has.
    fn remove_view(&mut self, id: ViewId) -> Result<(), PatchError<B::Error>> {
        let node = self.nodes.remove(&id).ok_or(PatchError::NoSuchView(id))?;
        if let Some(superview) = node.superview.and_then(|id| self.nodes.get_mut(&id)) {
            superview.subviews.retain(|subview| *subview != id);
        }
        for subview in node.subviews {
            if self.nodes.contains_key(&subview) {
                self.remove_view(subview)?;
            }
        }
        if self.root == Some(id) {
            self.root = None;
        }
        self.backend
            .remove_view(node.backing_ref)
            .map_err(PatchError::Backend)
    }

    /// Applies computed frames, walking the layout result and the view hierarchy in lockstep.
    ///
    /// Only frames that changed are sent to the backend. Returns how many were.
    pub fn apply_layout(&mut self, layout: &LayoutResult) -> Result<usize, PatchError<B::Error>> {
        let mut applied = 0;
        self.apply_frames(layout, &mut applied)?;
        log::trace!("applied {} changed frames", applied);
        Ok(applied)
    }

    fn apply_frames(
        &mut self,
        layout: &LayoutResult,
        applied: &mut usize,
    ) -> Result<(), PatchError<B::Error>> {
        let node = self
            .nodes
            .get_mut(&layout.id)
            .ok_or(PatchError::NoSuchView(layout.id))?;
        if node.frame != Some(layout.frame) {
            self.backend
                .set_frame(&mut node.backing_ref, layout.frame)
                .map_err(PatchError::Backend)?;
            node.frame = Some(layout.frame);
            *applied += 1;
        }

        let subviews = node.subviews.clone();
        for (index, child) in layout.children.iter().enumerate() {
            match subviews.get(index) {
                Some(subview) if *subview == child.id => self.apply_frames(child, applied)?,
                _ => log::warn!(
                    "layout for {:?} does not match subview {} of {:?}; skipping",
                    child.id,
                    index,
                    layout.id
                ),
            }
        }
        Ok(())
    }

    /// Delivers a gesture to a view.
    ///
    /// If the view has no handler for the gesture, it bubbles up to the closest superview that
    /// does. Returns whether any handler was invoked.
    pub fn dispatch(&self, target: ViewId, gesture: Gesture) -> bool {
        let mut current = Some(target);
        while let Some(id) = current {
            let node = match self.nodes.get(&id) {
                Some(node) => node,
                None => break,
            };
            if let Some(handler) = handler_for(&node.view, gesture) {
                log::trace!("{:?} on {:?} handled by {:?}", gesture, target, id);
                handler.call(GestureEvent {
                    target,
                    current: id,
                    gesture,
                });
                return true;
            }
            current = node.superview;
        }
        log::trace!("{:?} on {:?} was not handled", gesture, target);
        false
    }
}

fn handler_for(view: &NativeView, gesture: Gesture) -> Option<&EventHandler<GestureEvent>> {
    let gestures = &view.properties.core().gestures;
    match gesture {
        Gesture::Tap => gestures.on_tap.as_ref(),
        Gesture::Press => gestures.on_press.as_ref(),
        Gesture::DoubleTap => gestures.on_double_tap.as_ref(),
    }
}

impl<B: Backend + fmt::Debug> fmt::Debug for NVTree<B> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("NVTree")
            .field("views", &self.nodes.len())
            .field("root", &self.root)
            .field("backend", &self.backend)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HeadlessBackend, Op};
    use crate::properties::DefaultProperties;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn view(properties: DefaultProperties) -> NativeView {
        NativeView {
            kind: NativeKind::Native(NativeType::Box),
            properties: Arc::new(properties),
            owner: None,
        }
    }

    fn tree_with(ids: &[ViewId]) -> NVTree<HeadlessBackend> {
        let mut tree = NVTree::new(HeadlessBackend::new());
        for id in ids {
            tree.patch(Patch::Create(*id, view(DefaultProperties::default())))
                .unwrap();
        }
        tree
    }

    #[test]
    fn builds_hierarchy() {
        let (root, a, b) = (ViewId::new(), ViewId::new(), ViewId::new());
        let mut tree = tree_with(&[root, a, b]);
        tree.patch(Patch::Subviews(root, vec![a, b])).unwrap();
        tree.patch(Patch::SetRoot(root)).unwrap();

        assert_eq!(tree.root(), Some(root));
        assert_eq!(tree.subviews(root), Some(&[a, b][..]));
        assert_eq!(tree.superview(b), Some(root));

        tree.patch(Patch::Subviews(root, vec![b])).unwrap();
        assert_eq!(tree.superview(a), None, "detached views lose their superview");

        assert!(matches!(
            tree.patch(Patch::Subviews(a, vec![a])),
            Err(PatchError::Cycle(_))
        ));
        assert!(matches!(
            tree.patch(Patch::Update(ViewId::new(), view(DefaultProperties::default()))),
            Err(PatchError::NoSuchView(_))
        ));
    }

    #[test]
    fn removal_takes_subviews_along() {
        let (root, a, b) = (ViewId::new(), ViewId::new(), ViewId::new());
        let mut tree = tree_with(&[root, a, b]);
        tree.patch(Patch::Subviews(root, vec![a])).unwrap();
        tree.patch(Patch::Subviews(a, vec![b])).unwrap();

        // removing a subview first is fine too
        tree.patch(Patch::Remove(b)).unwrap();
        assert_eq!(tree.subviews(a), Some(&[][..]));
        tree.patch(Patch::Remove(a)).unwrap();
        assert_eq!(tree.subviews(root), Some(&[][..]));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.backend().len(), 1);
    }

    #[test]
    fn applies_only_changed_frames() {
        let (root, a, b) = (ViewId::new(), ViewId::new(), ViewId::new());
        let mut tree = tree_with(&[root, a, b]);
        tree.patch(Patch::Subviews(root, vec![a, b])).unwrap();

        let mut layout = LayoutResult {
            id: root,
            frame: Rect::from_xywh(0., 0., 100., 100.),
            children: vec![
                LayoutResult {
                    id: a,
                    frame: Rect::from_xywh(0., 0., 100., 50.),
                    children: Vec::new(),
                },
                LayoutResult {
                    id: b,
                    frame: Rect::from_xywh(0., 50., 100., 50.),
                    children: Vec::new(),
                },
            ],
        };
        assert_eq!(tree.apply_layout(&layout).unwrap(), 3);
        assert_eq!(tree.apply_layout(&layout).unwrap(), 0);

        layout.children[1].frame = Rect::from_xywh(0., 60., 100., 40.);
        tree.backend_mut().take_ops();
        assert_eq!(tree.apply_layout(&layout).unwrap(), 1);
        assert_eq!(
            tree.backend().ops(),
            &[Op::SetFrame(b, Rect::from_xywh(0., 60., 100., 40.))]
        );
        assert_eq!(
            tree.absolute_frame(b),
            Some(Rect::from_xywh(0., 60., 100., 40.))
        );
    }

    #[test]
    fn gestures_bubble_to_the_nearest_handler() {
        let (root, child) = (ViewId::new(), ViewId::new());
        let taps = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&taps);

        let mut root_props = DefaultProperties::default();
        root_props.core.gestures.on_tap = Some(EventHandler::new(move |event: GestureEvent| {
            assert_eq!(event.current, root);
            assert_eq!(event.target, child);
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let mut tree = NVTree::new(HeadlessBackend::new());
        tree.patch(Patch::Create(root, view(root_props))).unwrap();
        tree.patch(Patch::Create(child, view(DefaultProperties::default())))
            .unwrap();
        tree.patch(Patch::Subviews(root, vec![child])).unwrap();

        assert!(tree.dispatch(child, Gesture::Tap));
        assert_eq!(taps.load(Ordering::SeqCst), 1);
        assert!(!tree.dispatch(child, Gesture::Press), "nobody handles presses");
    }
}
