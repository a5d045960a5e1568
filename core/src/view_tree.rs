use crate::component::{ComponentHost, Phase};
use crate::element::{Element, ElementType, Key};
use crate::error::{Error, Result};
use crate::layout::{LayoutBridge, LayoutResult};
use crate::nv_tree::{NativeKind, NativeView, Patch};
use crate::properties::AnyProperties;
use crate::services::Services;
use crate::update_queue::{Completion, Request, StateMutation, StateUpdater, UpdateQueue};
use cgmath::Vector2;
use core::fmt;
use std::collections::{HashMap, HashSet, VecDeque};
use std::mem;
use std::sync::Arc;
use uuid::Uuid;

/// A unique identifier for a node in the view tree.
///
/// (this is just a UUID)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewId(u32, u16, u16, [u8; 8]);

impl ViewId {
    pub(crate) fn new() -> ViewId {
        let uuid = Uuid::new_v4();
        let (a, b, c, d) = uuid.as_fields();
        ViewId(a, b, c, *d)
    }
}

/// A change made to the tree while reconciling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// A new node was built and inserted at `index`.
    Insert {
        parent: ViewId,
        id: ViewId,
        index: usize,
    },
    /// A node was removed along with its subtree.
    Remove { parent: ViewId, id: ViewId },
    /// A node was moved among its siblings; `from` is its index among the previous children.
    Move {
        parent: ViewId,
        id: ViewId,
        from: usize,
        to: usize,
    },
    /// A node was replaced by one of a different type.
    Replace { old: ViewId, new: ViewId },
    /// A node's properties changed.
    Update { id: ViewId },
}

/// What happened during an update cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Number of component renders.
    pub rendered: usize,
    pub edits: Vec<Edit>,
}

/// The result of an update cycle, to be applied on the UI side.
pub struct Commit {
    /// Patches for the native-view tree, in order.
    pub patches: Vec<Patch>,
    /// New frames, if anything needed to be laid out.
    pub layout: Option<LayoutResult>,
    /// To be run after the patches have been applied.
    pub completions: Vec<Completion>,
    pub report: CycleReport,
}

impl Commit {
    /// Whether applying this commit would change nothing on screen.
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty() && self.layout.is_none()
    }
}

impl fmt::Debug for Commit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Commit")
            .field("patches", &self.patches)
            .field("layout", &self.layout)
            .field("completions", &self.completions.len())
            .field("report", &self.report)
            .finish()
    }
}

enum NodeKind {
    Native(NativeKind),
    Component {
        host: Box<dyn ComponentHost>,
        /// The root of the rendered subtree.
        instance: Option<ViewId>,
    },
}

/// A node in the view tree.
struct TreeNode {
    /// The element this node was last built or updated from.
    element: Element,
    kind: NodeKind,
    /// The structural parent: a native container, or the component this is the instance of.
    parent: Option<ViewId>,
    /// The closest component that rendered this node.
    owner: Option<ViewId>,
    /// Subviews, for native containers.
    children: Vec<ViewId>,
    /// Native nodes only.
    layout: Option<taffy::NodeId>,
}

fn is_container(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Native(NativeKind::Native(ty)) if ty.is_container())
}

/// A view tree; contains the live instances built from elements and manages rendering,
/// reconciliation, state updates and layout.
pub struct ViewTree {
    nodes: HashMap<ViewId, TreeNode>,
    root: Option<ViewId>,
    patches: VecDeque<Patch>,
    edits: Vec<Edit>,
    /// Containers whose native subviews must be re-sent, in the order they were touched.
    dirty_containers: Vec<ViewId>,
    dirty_set: HashSet<ViewId>,
    /// The native root most recently announced with `Patch::SetRoot`.
    committed_root: Option<ViewId>,
    needs_layout: bool,
    rendered: usize,
    viewport: Vector2<f64>,
    queue: Arc<UpdateQueue>,
    services: Services,
    layout: LayoutBridge,
}

impl ViewTree {
    pub fn new(services: Services, viewport: Vector2<f64>) -> ViewTree {
        ViewTree {
            nodes: HashMap::new(),
            root: None,
            patches: VecDeque::new(),
            edits: Vec::new(),
            dirty_containers: Vec::new(),
            dirty_set: HashSet::new(),
            committed_root: None,
            needs_layout: false,
            rendered: 0,
            viewport,
            queue: UpdateQueue::new(),
            services,
            layout: LayoutBridge::new(),
        }
    }

    /// The queue state updates for this tree are sent to.
    pub fn queue(&self) -> &Arc<UpdateQueue> {
        &self.queue
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn viewport(&self) -> Vector2<f64> {
        self.viewport
    }

    /// Changes the viewport; the next update cycle will lay out again.
    pub fn set_viewport(&mut self, viewport: Vector2<f64>) {
        if viewport != self.viewport {
            self.viewport = viewport;
            self.needs_layout = true;
        }
    }

    /// The root node, which may be a component.
    pub fn root(&self) -> Option<ViewId> {
        self.root
    }

    /// The native view at the root of the tree.
    pub fn native_root(&self) -> Option<ViewId> {
        self.root.and_then(|root| self.native_of(root))
    }

    /// Number of nodes, including components.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn element(&self, id: ViewId) -> Option<&Element> {
        self.nodes.get(&id).map(|node| &node.element)
    }

    /// The current properties of a node.
    pub fn properties(&self, id: ViewId) -> Option<&Arc<dyn AnyProperties>> {
        self.nodes.get(&id).map(|node| match &node.kind {
            NodeKind::Component { host, .. } => host.properties(),
            NodeKind::Native(_) => node.element.properties(),
        })
    }

    pub fn children(&self, id: ViewId) -> Option<&[ViewId]> {
        self.nodes.get(&id).map(|node| &node.children[..])
    }

    pub fn parent(&self, id: ViewId) -> Option<ViewId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    pub fn owner(&self, id: ViewId) -> Option<ViewId> {
        self.nodes.get(&id).and_then(|node| node.owner)
    }

    /// The root of what a component rendered.
    pub fn instance(&self, id: ViewId) -> Option<ViewId> {
        match &self.nodes.get(&id)?.kind {
            NodeKind::Component { instance, .. } => *instance,
            NodeKind::Native(_) => None,
        }
    }

    pub fn phase(&self, id: ViewId) -> Option<Phase> {
        match &self.nodes.get(&id)?.kind {
            NodeKind::Component { host, .. } => Some(host.phase()),
            NodeKind::Native(_) => None,
        }
    }

    /// The current state of a component.
    pub fn state<S: 'static>(&self, id: ViewId) -> Option<&S> {
        match &self.nodes.get(&id)?.kind {
            NodeKind::Component { host, .. } => host.state().downcast_ref::<S>(),
            NodeKind::Native(_) => None,
        }
    }

    /// Returns a handle for updating a component's state from outside of its render function.
    pub fn updater<S: 'static>(&self, id: ViewId) -> StateUpdater<S> {
        self.queue.updater(id)
    }

    /// Number of live layout nodes; one per native node.
    pub fn layout_node_count(&self) -> usize {
        self.layout.len()
    }

    /// Resolves a node to the native view that represents it on screen.
    pub fn native_of(&self, mut id: ViewId) -> Option<ViewId> {
        loop {
            match &self.nodes.get(&id)?.kind {
                NodeKind::Native(_) => return Some(id),
                NodeKind::Component { instance, .. } => id = (*instance)?,
            }
        }
    }

    /// Native subviews of a container, looking through components.
    fn native_children(&self, id: ViewId) -> Vec<ViewId> {
        match self.nodes.get(&id) {
            Some(node) => node
                .children
                .iter()
                .filter_map(|child| self.native_of(*child))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Returns an iterator over available patches.
    ///
    /// Does not drain the queue immediately.
    /// Calling `next` will always remove a patch from the queue.
    pub fn patches(&mut self) -> impl Iterator<Item = Patch> + '_ {
        struct PatchIterator<'a>(&'a mut ViewTree);
        impl<'a> Iterator for PatchIterator<'a> {
            type Item = Patch;
            fn next(&mut self) -> Option<Patch> {
                self.0.patches.pop_front()
            }
        }

        PatchIterator(self)
    }

    /// Takes the edits recorded since the last call or commit.
    pub fn take_edits(&mut self) -> Vec<Edit> {
        mem::take(&mut self.edits)
    }

    /// Renders a root element, reconciling it with the current root if there is one.
    ///
    /// The result is committed by the next update cycle.
    pub fn render_root(&mut self, element: Element) -> Result<ViewId> {
        let root = match self.root {
            Some(root) => self.perform_diff(root, element)?,
            None => self.build(element, None, None)?,
        };
        self.root = Some(root);
        self.needs_layout = true;
        Ok(root)
    }

    /// Runs one update cycle: applies all queued state updates, re-renders the components that
    /// should update, and lays out again if anything rendered.
    ///
    /// On error, the cycle is aborted and nothing is committed.
    pub fn run_update_cycle(&mut self) -> Result<Commit> {
        let pending = self.queue.drain();

        // group by component, in order of first submission
        let mut order = Vec::new();
        let mut batches: HashMap<ViewId, (Vec<StateMutation>, bool)> = HashMap::new();
        for (id, request) in pending.requests {
            let batch = batches.entry(id).or_insert_with(|| {
                order.push(id);
                (Vec::new(), false)
            });
            match request {
                Request::Mutate(mutation) => batch.0.push(mutation),
                Request::Force => batch.1 = true,
            }
        }

        for id in &order {
            if let Some(NodeKind::Component { host, .. }) =
                self.nodes.get_mut(id).map(|node| &mut node.kind)
            {
                host.set_phase(Phase::Dirty);
            }
        }

        for id in order {
            let (mutations, force) = match batches.remove(&id) {
                Some(batch) => batch,
                None => continue,
            };
            if !self.nodes.contains_key(&id) {
                log::warn!(
                    "dropping {} state updates for {:?}: view no longer exists",
                    mutations.len(),
                    id
                );
                continue;
            }
            self.update_component(id, None, mutations, force)?;
        }

        let layout = if self.needs_layout {
            self.compute_layout()?
        } else {
            None
        };
        Ok(self.commit(pending.completions, layout))
    }

    /// Lays out the whole tree against the viewport.
    ///
    /// Returns `None` if there is nothing to lay out.
    pub fn compute_layout(&mut self) -> Result<Option<LayoutResult>> {
        let root = match self.native_root() {
            Some(root) => root,
            None => return Ok(None),
        };
        self.sync_layout_children(root)?;

        let (layout_node, root_layout) = {
            let node = self.nodes.get(&root).ok_or(Error::NoSuchView(root))?;
            let layout_node = node.layout.ok_or(Error::NoSuchView(root))?;
            (layout_node, node.element.properties().core().layout.clone())
        };
        self.layout.compute(
            layout_node,
            &root_layout,
            self.viewport,
            &*self.services.text_measurer,
        )?;
        self.needs_layout = false;
        self.collect_layout(root).map(Some)
    }

    fn sync_layout_children(&mut self, id: ViewId) -> Result<()> {
        let layout_node = {
            let node = self.nodes.get(&id).ok_or(Error::NoSuchView(id))?;
            if !is_container(&node.kind) {
                return Ok(());
            }
            node.layout.ok_or(Error::NoSuchView(id))?
        };

        let natives = self.native_children(id);
        let child_nodes = natives
            .iter()
            .map(|child| {
                self.nodes
                    .get(child)
                    .and_then(|node| node.layout)
                    .ok_or(Error::NoSuchView(*child))
            })
            .collect::<Result<Vec<_>>>()?;
        self.layout.set_children(layout_node, &child_nodes)?;

        for child in natives {
            self.sync_layout_children(child)?;
        }
        Ok(())
    }

    fn collect_layout(&self, id: ViewId) -> Result<LayoutResult> {
        let node = self.nodes.get(&id).ok_or(Error::NoSuchView(id))?;
        let frame = self
            .layout
            .frame(node.layout.ok_or(Error::NoSuchView(id))?)?;
        let children = self
            .native_children(id)
            .into_iter()
            .map(|child| self.collect_layout(child))
            .collect::<Result<Vec<_>>>()?;
        Ok(LayoutResult {
            id,
            frame,
            children,
        })
    }

    fn commit(&mut self, completions: Vec<Completion>, layout: Option<LayoutResult>) -> Commit {
        self.dirty_set.clear();
        for id in mem::take(&mut self.dirty_containers) {
            if self.nodes.contains_key(&id) {
                let subviews = self.native_children(id);
                self.patches.push_back(Patch::Subviews(id, subviews));
            }
        }

        let native_root = self.native_root();
        if native_root != self.committed_root {
            if let Some(root) = native_root {
                self.patches.push_back(Patch::SetRoot(root));
            }
            self.committed_root = native_root;
        }

        let patches: Vec<Patch> = self.patches().collect();
        let report = CycleReport {
            rendered: mem::take(&mut self.rendered),
            edits: self.take_edits(),
        };
        log::debug!(
            "commit: {} patches, {} renders, {} edits, layout: {}",
            patches.len(),
            report.rendered,
            report.edits.len(),
            layout.is_some()
        );

        Commit {
            patches,
            layout,
            completions,
            report,
        }
    }

    fn mark_dirty(&mut self, container: ViewId) {
        if self.dirty_set.insert(container) {
            self.dirty_containers.push(container);
        }
    }

    /// Marks the closest native container at or above `parent` as needing a subview sync.
    fn mark_container_of_dirty(&mut self, mut parent: Option<ViewId>) {
        while let Some(id) = parent {
            match self.nodes.get(&id).map(|node| (&node.kind, node.parent)) {
                Some((NodeKind::Native(_), _)) => {
                    self.mark_dirty(id);
                    return;
                }
                Some((NodeKind::Component { .. }, next)) => parent = next,
                None => return,
            }
        }
    }

    fn host_mut(&mut self, id: ViewId) -> Result<&mut dyn ComponentHost> {
        match &mut self.nodes.get_mut(&id).ok_or(Error::NoSuchView(id))?.kind {
            NodeKind::Component { host, .. } => Ok(host.as_mut()),
            NodeKind::Native(_) => Err(Error::NotAComponent(id)),
        }
    }

    /// Builds a new node (and its subtree) from an element.
    ///
    /// If anything fails, whatever was built is torn down again and its patches are dropped.
    fn build(
        &mut self,
        element: Element,
        owner: Option<ViewId>,
        parent: Option<ViewId>,
    ) -> Result<ViewId> {
        let checkpoint = self.patches.len();
        let mut inserted = None;
        match self.build_node(element, owner, parent, &mut inserted) {
            Ok(id) => Ok(id),
            Err(err) => {
                if let Some(id) = inserted.filter(|id| self.nodes.contains_key(id)) {
                    log::debug!("tearing down partially built {:?}", id);
                    self.remove_node(id)?;
                }
                self.patches.truncate(checkpoint);
                Err(err)
            }
        }
    }

    /// Does the work for `build`; sets `inserted` as soon as the node is in the arena.
    fn build_node(
        &mut self,
        element: Element,
        owner: Option<ViewId>,
        parent: Option<ViewId>,
        inserted: &mut Option<ViewId>,
    ) -> Result<ViewId> {
        let kind = match element.ty().clone() {
            ElementType::Component(ty) => {
                let host = ty.construct(element.properties())?;
                let id = ViewId::new();
                log::trace!("building {} as {:?}", ty.name(), id);
                self.nodes.insert(
                    id,
                    TreeNode {
                        element,
                        kind: NodeKind::Component {
                            host,
                            instance: None,
                        },
                        parent,
                        owner,
                        children: Vec::new(),
                        layout: None,
                    },
                );
                *inserted = Some(id);

                self.host_mut(id)?.will_build();
                let rendered = self.render_component(id)?;
                let instance = self.build(rendered, Some(id), Some(id))?;
                self.finish_render(id, instance, true)?;
                return Ok(id);
            }
            ElementType::Native(ty) => NativeKind::Native(ty),
            ElementType::External(view) => NativeKind::External(view),
        };

        let id = ViewId::new();
        let native = NodeKind::Native(kind);
        let container = is_container(&native);
        let children = if container {
            element.children().to_vec()
        } else {
            if !element.children().is_empty() {
                log::warn!(
                    "{:?} cannot have subviews; ignoring {} children",
                    element.ty(),
                    element.children().len()
                );
            }
            Vec::new()
        };
        check_keys(Some(id), &children)?;

        log::trace!("building {:?} as {:?}", kind, id);
        let layout = self.layout.create(&element)?;
        self.patches.push_back(Patch::Create(
            id,
            NativeView {
                kind,
                properties: Arc::clone(element.properties()),
                owner,
            },
        ));

        self.nodes.insert(
            id,
            TreeNode {
                element,
                kind: native,
                parent,
                owner,
                children: Vec::with_capacity(children.len()),
                layout: Some(layout),
            },
        );
        *inserted = Some(id);

        let has_children = !children.is_empty();
        for child in children {
            let child = self.build(child, owner, Some(id))?;
            // attached as built; teardown walks `children`
            if let Some(node) = self.nodes.get_mut(&id) {
                node.children.push(child);
            }
        }
        if has_children {
            self.mark_dirty(id);
        }
        Ok(id)
    }

    fn render_component(&mut self, id: ViewId) -> Result<Element> {
        let queue = Arc::downgrade(&self.queue);
        let node = self.nodes.get_mut(&id).ok_or(Error::NoSuchView(id))?;
        match &mut node.kind {
            NodeKind::Component { host, .. } => {
                host.set_phase(Phase::Rendering);
                self.rendered += 1;
                host.render(id, node.element.children(), &queue, &self.services)
            }
            NodeKind::Native(_) => Err(Error::NotAComponent(id)),
        }
    }

    fn finish_render(&mut self, id: ViewId, rendered: ViewId, first: bool) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(Error::NoSuchView(id))?;
        match &mut node.kind {
            NodeKind::Component { host, instance } => {
                *instance = Some(rendered);
                if first {
                    host.did_build();
                    host.set_phase(Phase::Built);
                } else {
                    host.did_update();
                    host.set_phase(Phase::Committed);
                }
                Ok(())
            }
            NodeKind::Native(_) => Err(Error::NotAComponent(id)),
        }
    }

    /// Diffs a node with a new element.
    ///
    /// Returns the id of the node now in its place, which differs from `id` if the element type
    /// changed and the node had to be replaced.
    fn perform_diff(&mut self, id: ViewId, element: Element) -> Result<ViewId> {
        let node = self.nodes.get(&id).ok_or(Error::NoSuchView(id))?;
        if !node.element.ty().same_type(element.ty()) {
            return self.replace(id, element);
        }

        if matches!(node.kind, NodeKind::Native(_)) {
            self.update_native(id, element)?;
        } else {
            self.update_component(id, Some(element), Vec::new(), false)?;
        }
        Ok(id)
    }

    /// Replaces a node with a new one built from an element of a different type.
    fn replace(&mut self, id: ViewId, element: Element) -> Result<ViewId> {
        let (parent, owner) = {
            let node = self.nodes.get(&id).ok_or(Error::NoSuchView(id))?;
            (node.parent, node.owner)
        };
        log::debug!("replacing {:?} with a new {:?}", id, element.ty());

        self.remove_node(id)?;
        let new = self.build(element, owner, parent)?;
        self.edits.push(Edit::Replace { old: id, new });
        self.mark_container_of_dirty(parent);
        Ok(new)
    }

    /// Updates a native node in place.
    fn update_native(&mut self, id: ViewId, element: Element) -> Result<()> {
        let (kind, owner, layout, changed) = {
            let node = self.nodes.get_mut(&id).ok_or(Error::NoSuchView(id))?;
            let kind = match node.kind {
                NodeKind::Native(kind) => kind,
                NodeKind::Component { .. } => return Err(Error::NoSuchView(id)),
            };
            let changed = !node.element.properties().eq_dyn(&**element.properties());
            node.element = element.clone();
            (kind, node.owner, node.layout, changed)
        };

        if changed {
            log::trace!("updating properties of {:?}", id);
            self.patches.push_back(Patch::Update(
                id,
                NativeView {
                    kind,
                    properties: Arc::clone(element.properties()),
                    owner,
                },
            ));
            if let Some(layout) = layout {
                self.layout.sync(layout, &element)?;
            }
            self.edits.push(Edit::Update { id });
        }

        if is_container(&NodeKind::Native(kind)) {
            self.diff_children(id, element.children())?;
        }
        Ok(())
    }

    /// Commits new properties and/or state mutations to a component and re-renders it if it
    /// should update.
    fn update_component(
        &mut self,
        id: ViewId,
        element: Option<Element>,
        mutations: Vec<StateMutation>,
        force: bool,
    ) -> Result<()> {
        let should_render = {
            let node = self.nodes.get_mut(&id).ok_or(Error::NoSuchView(id))?;
            let (should_render, props_changed) = match &mut node.kind {
                NodeKind::Component { host, .. } => {
                    let next = match &element {
                        Some(element) => Arc::clone(element.properties()),
                        None => Arc::clone(host.properties()),
                    };
                    let props_changed = !host.properties().eq_dyn(&*next);
                    (host.update(&next, mutations, force)?, props_changed)
                }
                NodeKind::Native(_) => return Err(Error::NotAComponent(id)),
            };
            if let Some(element) = element {
                node.element = element;
            }
            if props_changed {
                self.edits.push(Edit::Update { id });
            }
            should_render
        };

        if !should_render {
            log::trace!("{:?} should not update; skipping render", id);
            if let Ok(host) = self.host_mut(id) {
                if host.phase() == Phase::Dirty {
                    host.set_phase(Phase::Committed);
                }
            }
            return Ok(());
        }

        self.host_mut(id)?.will_update();
        let rendered = self.render_component(id)?;
        let instance = match self.instance(id) {
            Some(instance) => self.perform_diff(instance, rendered)?,
            None => self.build(rendered, Some(id), Some(id))?,
        };
        self.finish_render(id, instance, false)?;
        self.needs_layout = true;
        Ok(())
    }

    /// Reconciles the children of a native container with a new list of elements.
    ///
    /// A child counts as moved if a child that preceded it before has not been placed yet.
    fn diff_children(&mut self, parent: ViewId, elements: &[Element]) -> Result<()> {
        // fail before touching anything
        let keys = check_keys(Some(parent), elements)?;

        let (owner, current) = {
            let node = self.nodes.get(&parent).ok_or(Error::NoSuchView(parent))?;
            (node.owner, node.children.clone())
        };

        let mut existing = HashMap::with_capacity(current.len());
        for (index, id) in current.iter().enumerate() {
            let node = self.nodes.get(id).ok_or(Error::NoSuchView(*id))?;
            existing.insert(Key::of(&node.element, index), index);
        }

        let mut placed = vec![false; current.len()];
        // first previous child that has not been placed yet
        let mut cursor = 0;
        let mut next = Vec::with_capacity(elements.len());
        let mut structural = false;
        for (index, (element, key)) in elements.iter().zip(keys).enumerate() {
            while cursor < current.len() && placed[cursor] {
                cursor += 1;
            }

            match existing.remove(&key) {
                None => {
                    log::debug!("inserting {} at {} in {:?}", key, index, parent);
                    let id = self.build(element.clone(), owner, Some(parent))?;
                    next.push(id);
                    self.edits.push(Edit::Insert { parent, id, index });
                    structural = true;
                }
                Some(from) => {
                    placed[from] = true;
                    let id = current[from];
                    if from != cursor {
                        log::debug!("moving {} from {} to {} in {:?}", key, from, index, parent);
                        self.edits.push(Edit::Move {
                            parent,
                            id,
                            from,
                            to: index,
                        });
                        structural = true;
                    }

                    let updated = self.perform_diff(id, element.clone())?;
                    if updated != id {
                        structural = true;
                    }
                    next.push(updated);
                }
            }
        }

        for (id, _) in current.iter().zip(&placed).filter(|(_, placed)| !**placed) {
            log::debug!("removing {:?} from {:?}", id, parent);
            self.remove_node(*id)?;
            self.edits.push(Edit::Remove { parent, id: *id });
            structural = true;
        }

        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children = next;
        }
        if structural {
            self.mark_dirty(parent);
        }
        Ok(())
    }

    /// Removes a node and its subtree, releasing layout nodes and running teardown hooks.
    ///
    /// Does *not* remove the node from its parent's `children` list.
    fn remove_node(&mut self, id: ViewId) -> Result<()> {
        let node = self.nodes.remove(&id).ok_or(Error::NoSuchView(id))?;
        match node.kind {
            NodeKind::Component { mut host, instance } => {
                log::trace!("detaching {} ({:?})", host.name(), id);
                host.will_detach();
                if let Some(instance) = instance {
                    self.remove_node(instance)?;
                }
            }
            NodeKind::Native(_) => {
                for child in node.children {
                    self.remove_node(child)?;
                }
                self.patches.push_back(Patch::Remove(id));
            }
        }
        if let Some(layout) = node.layout {
            self.layout.release(layout)?;
        }
        if self.dirty_set.remove(&id) {
            self.dirty_containers.retain(|container| *container != id);
        }
        Ok(())
    }
}

/// Keys the elements and checks that no two siblings share a key.
fn check_keys(parent: Option<ViewId>, elements: &[Element]) -> Result<Vec<Key>> {
    let mut seen = HashSet::with_capacity(elements.len());
    elements
        .iter()
        .enumerate()
        .map(|(index, element)| {
            let key = Key::of(element, index);
            if seen.insert(key.clone()) {
                Ok(key)
            } else {
                Err(Error::DuplicateKey {
                    parent,
                    key: key.to_string(),
                })
            }
        })
        .collect()
}

impl fmt::Debug for ViewTree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ViewTree")
            .field("nodes", &self.nodes.len())
            .field("root", &self.root)
            .field("pending_patches", &self.patches.len())
            .field("viewport", &self.viewport)
            .field("layout", &self.layout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::component::{Component, RenderContext};
    use crate::nv_tree::NVTree;
    use crate::properties::{CoreProperties, DefaultProperties, FlexDirection};
    use crate::rect::Rect;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tree() -> ViewTree {
        let _ = env_logger::builder().is_test(true).try_init();
        ViewTree::new(Services::default(), Vector2::new(300., 100.))
    }

    fn keyed(key: &str) -> Element {
        Element::boxed(DefaultProperties::keyed(key), Vec::new())
    }

    fn list(keys: &[&str]) -> Element {
        Element::boxed(
            DefaultProperties::default(),
            keys.iter().map(|key| keyed(key)).collect(),
        )
    }

    fn count(edits: &[Edit], f: impl Fn(&Edit) -> bool) -> usize {
        edits.iter().filter(|edit| f(edit)).count()
    }

    fn apply(nv_tree: &mut NVTree<HeadlessBackend>, commit: Commit) -> usize {
        for patch in commit.patches {
            nv_tree.patch(patch).expect("patch failed");
        }
        match commit.layout {
            Some(layout) => nv_tree.apply_layout(&layout).expect("layout failed"),
            None => 0,
        }
    }

    #[test]
    fn reorder_moves_without_rebuilding() {
        let mut tree = tree();
        let root = tree.render_root(list(&["1", "2", "3"])).unwrap();
        let before = tree.children(root).unwrap().to_vec();
        tree.take_edits();

        assert_eq!(tree.render_root(list(&["2", "3", "1"])).unwrap(), root);
        assert_eq!(
            tree.children(root).unwrap(),
            &[before[1], before[2], before[0]][..]
        );

        let edits = tree.take_edits();
        assert_eq!(count(&edits, |e| matches!(e, Edit::Move { .. })), 2);
        assert_eq!(
            count(&edits, |e| matches!(e, Edit::Insert { .. } | Edit::Remove { .. })),
            0,
            "keys are stable: {:?}",
            edits
        );
    }

    #[test]
    fn mixed_edits_record_previous_positions() {
        let mut tree = tree();
        let root = tree.render_root(list(&["a", "b", "c", "d"])).unwrap();
        let before = tree.children(root).unwrap().to_vec();
        let (a, b, c, d) = (before[0], before[1], before[2], before[3]);
        tree.take_edits();

        tree.render_root(list(&["d", "a", "x", "c"])).unwrap();
        let children = tree.children(root).unwrap().to_vec();
        assert_eq!(children.len(), 4);
        assert_eq!((children[0], children[1], children[3]), (d, a, c));
        let x = children[2];

        assert_eq!(
            tree.take_edits(),
            vec![
                Edit::Move { parent: root, id: d, from: 3, to: 0 },
                Edit::Insert { parent: root, id: x, index: 2 },
                Edit::Move { parent: root, id: c, from: 2, to: 3 },
                Edit::Remove { parent: root, id: b },
            ]
        );
        assert!(!tree.contains(b));
    }

    #[test]
    fn shrinking_keeps_the_first_child() {
        let mut tree = tree();
        let texts = |n: usize| {
            Element::boxed(
                DefaultProperties::default(),
                (0..n)
                    .map(|i| Element::text(DefaultProperties::text(format!("item {}", i))))
                    .collect(),
            )
        };
        let root = tree.render_root(texts(3)).unwrap();
        let first = tree.children(root).unwrap()[0];
        let layout_nodes = tree.layout_node_count();

        tree.render_root(texts(1)).unwrap();
        assert_eq!(tree.children(root).unwrap(), &[first][..]);
        assert_eq!(tree.element(first), Some(&texts(1).children()[0]));
        assert_eq!(tree.layout_node_count(), layout_nodes - 2, "layout nodes are released");
    }

    #[test]
    fn reconciling_twice_is_idempotent() {
        let mut tree = tree();
        let element = Element::boxed(
            DefaultProperties::default(),
            vec![list(&["a", "b"]), Element::text(DefaultProperties::text("x"))],
        );
        tree.render_root(element.clone()).unwrap();
        tree.run_update_cycle().unwrap();

        tree.render_root(element.clone()).unwrap();
        let commit = tree.run_update_cycle().unwrap();
        assert!(commit.report.edits.is_empty(), "{:?}", commit.report.edits);
        assert!(commit.patches.is_empty(), "{:?}", commit.patches);

        let root = tree.root().unwrap();
        assert_eq!(tree.element(root), Some(&element));
    }

    #[test]
    fn duplicate_keys_are_rejected_before_mutation() {
        let mut tree = tree();
        let root = tree.render_root(list(&["a"])).unwrap();
        let before = tree.children(root).unwrap().to_vec();

        match tree.render_root(list(&["a", "b", "a"])) {
            Err(Error::DuplicateKey { key, .. }) => assert_eq!(key, "a"),
            other => panic!("expected a duplicate key error, got {:?}", other),
        }
        assert_eq!(tree.children(root).unwrap(), &before[..]);
    }

    static DETACHED: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct Label;

    impl Component for Label {
        type Properties = DefaultProperties;
        type State = ();

        fn render(&self, cx: &RenderContext<'_, Self>) -> Result<Element> {
            Ok(Element::text(cx.properties().clone()))
        }

        fn will_detach(&mut self) {
            DETACHED.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn type_change_replaces_and_tears_down_once() {
        let mut tree = tree();
        let root = tree
            .render_root(Element::boxed(
                DefaultProperties::default(),
                vec![Element::component::<Label>(DefaultProperties::keyed("x"))],
            ))
            .unwrap();
        let label = tree.children(root).unwrap()[0];
        let label_text = tree.instance(label).unwrap();
        assert_eq!(tree.owner(label_text), Some(label));
        tree.run_update_cycle().unwrap();

        tree.render_root(Element::boxed(
            DefaultProperties::default(),
            vec![keyed("x")],
        ))
        .unwrap();
        let commit = tree.run_update_cycle().unwrap();

        let replacement = tree.children(root).unwrap()[0];
        assert_ne!(replacement, label);
        assert!(!tree.contains(label) && !tree.contains(label_text));
        assert_eq!(DETACHED.load(Ordering::SeqCst), 1);
        assert_eq!(
            tree.element(replacement).map(|e| e.ty().clone()),
            Some(ElementType::Native(crate::element::NativeType::Box))
        );

        assert!(commit
            .report
            .edits
            .contains(&Edit::Replace { old: label, new: replacement }));
        assert!(matches!(commit.patches[0], Patch::Remove(id) if id == label_text));
        assert!(matches!(&commit.patches[1], Patch::Create(id, _) if *id == replacement));
        assert!(
            matches!(&commit.patches[2], Patch::Subviews(id, subviews) if *id == root && subviews == &[replacement])
        );
        assert_eq!(
            commit.patches.len(),
            3,
            "empty containers need no subviews: {:?}",
            commit.patches
        );
    }

    #[derive(Default)]
    struct Counter;

    impl Component for Counter {
        type Properties = CoreProperties;
        type State = u32;

        fn render(&self, cx: &RenderContext<'_, Self>) -> Result<Element> {
            let items = (0..*cx.state())
                .map(|i| Element::text(DefaultProperties::text(i.to_string())))
                .collect();
            Ok(Element::boxed(DefaultProperties::default(), items))
        }
    }

    #[test]
    fn state_updates_coalesce_into_one_render() {
        let mut tree = tree();
        let root = tree
            .render_root(Element::component::<Counter>(CoreProperties::default()))
            .unwrap();
        assert_eq!(tree.phase(root), Some(Phase::Built));
        tree.run_update_cycle().unwrap();

        let updater = tree.updater::<u32>(root);
        updater.update_state(|count| *count += 1);
        updater.update_state_then(|count| *count *= 3, || {});
        assert!(tree.queue().is_scheduled());

        let commit = tree.run_update_cycle().unwrap();
        assert_eq!(tree.state::<u32>(root), Some(&3), "mutations apply in order");
        assert_eq!(commit.report.rendered, 1);
        assert_eq!(commit.completions.len(), 1);
        assert_eq!(tree.phase(root), Some(Phase::Committed));

        let list = tree.instance(root).unwrap();
        assert_eq!(tree.children(list).unwrap().len(), 3);
        let creates = commit
            .patches
            .iter()
            .filter(|p| matches!(p, Patch::Create(..)))
            .count();
        assert_eq!(creates, 3);
        assert!(commit.layout.is_some());
    }

    static FROZEN_RENDERS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct Frozen;

    impl Component for Frozen {
        type Properties = CoreProperties;
        type State = u32;

        fn render(&self, _: &RenderContext<'_, Self>) -> Result<Element> {
            FROZEN_RENDERS.fetch_add(1, Ordering::SeqCst);
            Ok(Element::boxed(DefaultProperties::default(), Vec::new()))
        }

        fn should_update(&self, _: &CoreProperties, _: &CoreProperties, _: &u32, _: &u32) -> bool {
            false
        }
    }

    #[test]
    fn should_update_false_commits_nothing() {
        let mut tree = tree();
        let root = tree
            .render_root(Element::component::<Frozen>(CoreProperties::default()))
            .unwrap();
        tree.run_update_cycle().unwrap();

        tree.updater::<u32>(root).update_state(|n| *n += 1);
        let commit = tree.run_update_cycle().unwrap();

        assert!(commit.is_empty(), "{:?}", commit);
        assert_eq!(commit.report.rendered, 0);
        assert_eq!(FROZEN_RENDERS.load(Ordering::SeqCst), 1);
        assert_eq!(tree.state::<u32>(root), Some(&1), "state is committed regardless");

        tree.updater::<u32>(root).force_update();
        let commit = tree.run_update_cycle().unwrap();
        assert_eq!(commit.report.rendered, 1, "forced updates always render");
    }

    #[derive(Default)]
    struct Switch;

    impl Component for Switch {
        type Properties = CoreProperties;
        type State = bool;

        fn render(&self, cx: &RenderContext<'_, Self>) -> Result<Element> {
            Ok(if *cx.state() {
                Element::text(DefaultProperties::text("on"))
            } else {
                Element::boxed(DefaultProperties::default(), Vec::new())
            })
        }
    }

    #[test]
    fn replaced_root_instance_is_reinstalled() {
        let mut tree = tree();
        let root = tree
            .render_root(Element::component::<Switch>(CoreProperties::default()))
            .unwrap();
        let first = tree.native_root().unwrap();
        let commit = tree.run_update_cycle().unwrap();
        assert!(matches!(commit.patches.last(), Some(Patch::SetRoot(id)) if *id == first));

        tree.updater::<bool>(root).update_state(|on| *on = true);
        let commit = tree.run_update_cycle().unwrap();
        let second = tree.native_root().unwrap();
        assert_ne!(first, second);
        assert!(commit.patches.iter().any(|p| matches!(p, Patch::Remove(id) if *id == first)));
        assert!(matches!(commit.patches.last(), Some(Patch::SetRoot(id)) if *id == second));
    }

    #[test]
    fn replaced_nested_instance_resyncs_its_container() {
        let mut tree = tree();
        let root = tree
            .render_root(Element::boxed(
                DefaultProperties::default(),
                vec![Element::component::<Switch>(CoreProperties::default())],
            ))
            .unwrap();
        let switch = tree.children(root).unwrap()[0];
        tree.run_update_cycle().unwrap();

        tree.updater::<bool>(switch).update_state(|on| *on = true);
        let commit = tree.run_update_cycle().unwrap();
        let text = tree.native_of(switch).unwrap();
        assert!(commit
            .patches
            .iter()
            .any(|p| matches!(p, Patch::Subviews(id, subviews) if *id == root && subviews == &[text])));
        assert!(!commit.patches.iter().any(|p| matches!(p, Patch::SetRoot(_))));
    }

    #[test]
    fn updates_for_removed_components_are_dropped() {
        let mut tree = tree();
        let root = tree
            .render_root(Element::boxed(
                DefaultProperties::default(),
                vec![Element::component::<Counter>(CoreProperties::default())],
            ))
            .unwrap();
        let counter = tree.children(root).unwrap()[0];
        tree.run_update_cycle().unwrap();

        let updater = tree.updater::<u32>(counter);
        tree.render_root(Element::boxed(DefaultProperties::default(), Vec::new()))
            .unwrap();
        updater.update_state(|n| *n += 1);

        let commit = tree.run_update_cycle().unwrap();
        assert_eq!(commit.report.rendered, 0);
        assert!(!tree.contains(counter));
    }

    #[test]
    fn updating_a_native_view_is_an_error() {
        let mut tree = tree();
        let root = tree.render_root(list(&[])).unwrap();
        tree.updater::<u32>(root).force_update();
        assert!(matches!(tree.run_update_cycle(), Err(Error::NotAComponent(id)) if id == root));
    }

    #[derive(Default)]
    struct Broken;

    impl Component for Broken {
        type Properties = CoreProperties;
        type State = ();

        fn render(&self, _: &RenderContext<'_, Self>) -> Result<Element> {
            Err(Error::render("broken"))
        }
    }

    #[test]
    fn failed_builds_are_torn_down() {
        let mut tree = tree();
        let mut nv_tree = NVTree::new(HeadlessBackend::new());

        let broken = Element::boxed(
            DefaultProperties::default(),
            vec![Element::boxed(
                DefaultProperties::default(),
                vec![
                    Element::text(DefaultProperties::text("ok")),
                    Element::component::<Broken>(CoreProperties::default()),
                ],
            )],
        );
        assert!(matches!(tree.render_root(broken), Err(Error::Render(_))));
        assert!(tree.is_empty());
        assert_eq!(tree.layout_node_count(), 0);

        tree.render_root(list(&[])).unwrap();
        apply(&mut nv_tree, tree.run_update_cycle().unwrap());
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.layout_node_count(), 1);
        assert_eq!(nv_tree.len(), 1);
        assert_eq!(nv_tree.backend().len(), 1);
    }

    #[test]
    fn failed_inserts_leave_the_siblings_alone() {
        let mut tree = tree();
        let root = tree.render_root(list(&["a"])).unwrap();
        let before = tree.children(root).unwrap().to_vec();
        tree.run_update_cycle().unwrap();

        let failing = Element::boxed(
            DefaultProperties::default(),
            vec![
                keyed("a"),
                Element::boxed(
                    DefaultProperties::keyed("b"),
                    vec![Element::component::<Broken>(CoreProperties::default())],
                ),
            ],
        );
        assert!(tree.render_root(failing).is_err());
        assert_eq!(tree.children(root).unwrap(), &before[..]);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.layout_node_count(), 2);

        tree.take_edits();
        let commit = tree.run_update_cycle().unwrap();
        assert!(
            !commit.patches.iter().any(|p| matches!(p, Patch::Create(..))),
            "{:?}",
            commit.patches
        );
    }

    fn screen(label: &str) -> Element {
        let mut label_props = DefaultProperties::text(label).with_key("label");
        label_props.text_style.font_size = Some(10.);
        screen_with(Element::text(label_props))
    }

    fn screen_with(label: Element) -> Element {
        Element::boxed(
            DefaultProperties::default(),
            vec![
                Element::boxed(
                    DefaultProperties::keyed("row").with_layout(|l| {
                        l.flex_direction = Some(FlexDirection::Row);
                        l.height = Some(20.);
                    }),
                    vec![
                        Element::boxed(
                            DefaultProperties::keyed("filler").with_layout(|l| l.flex_grow = Some(1.)),
                            Vec::new(),
                        ),
                        label,
                    ],
                ),
                Element::boxed(
                    DefaultProperties::keyed("other").with_layout(|l| l.height = Some(30.)),
                    vec![Element::boxed(
                        DefaultProperties::keyed("inner").with_layout(|l| {
                            l.width = Some(10.);
                            l.height = Some(10.);
                        }),
                        Vec::new(),
                    )],
                ),
            ],
        )
    }

    #[test]
    fn text_change_relayouts_only_dependent_frames() {
        let mut tree = tree();
        let mut nv_tree = NVTree::new(HeadlessBackend::new());

        let root = tree.render_root(screen("hi")).unwrap();
        let commit = tree.run_update_cycle().unwrap();
        assert_eq!(apply(&mut nv_tree, commit), 6);
        assert_eq!(nv_tree.root(), Some(root));

        let row = tree.children(root).unwrap()[0];
        let (filler, label) = {
            let children = tree.children(row).unwrap();
            (children[0], children[1])
        };
        assert_eq!(nv_tree.frame(label), Some(Rect::from_xywh(290., 0., 10., 20.)));

        tree.render_root(screen("hello")).unwrap();
        let commit = tree.run_update_cycle().unwrap();
        assert_eq!(commit.report.edits, vec![Edit::Update { id: label }]);
        assert_eq!(apply(&mut nv_tree, commit), 2, "only the label and the filler move");
        assert_eq!(nv_tree.frame(label), Some(Rect::from_xywh(275., 0., 25., 20.)));
        assert_eq!(nv_tree.frame(filler), Some(Rect::from_xywh(0., 0., 275., 20.)));
        assert_eq!(
            nv_tree.absolute_frame(label),
            Some(Rect::from_xywh(275., 0., 25., 20.))
        );
    }

    #[derive(Default)]
    struct Caption;

    impl Component for Caption {
        type Properties = CoreProperties;
        type State = bool;

        fn render(&self, cx: &RenderContext<'_, Self>) -> Result<Element> {
            let text = if *cx.state() { "hello" } else { "hi" };
            let mut props = DefaultProperties::text(text);
            props.text_style.font_size = Some(10.);
            Ok(Element::text(props))
        }
    }

    #[test]
    fn state_change_relayouts_only_dependent_frames() {
        let mut tree = tree();
        let mut nv_tree = NVTree::new(HeadlessBackend::new());

        let root = tree
            .render_root(screen_with(Element::component::<Caption>(
                CoreProperties::keyed("label"),
            )))
            .unwrap();
        assert_eq!(apply(&mut nv_tree, tree.run_update_cycle().unwrap()), 6);

        let row = tree.children(root).unwrap()[0];
        let (filler, caption) = {
            let children = tree.children(row).unwrap();
            (children[0], children[1])
        };
        let label = tree.native_of(caption).unwrap();
        assert_eq!(nv_tree.frame(label), Some(Rect::from_xywh(290., 0., 10., 20.)));
        let other = tree.children(root).unwrap()[1];
        let other_frame = nv_tree.frame(other);

        tree.updater::<bool>(caption).update_state(|long| *long = true);
        let commit = tree.run_update_cycle().unwrap();
        assert_eq!(commit.report.rendered, 1);
        assert_eq!(commit.report.edits, vec![Edit::Update { id: label }]);
        assert_eq!(apply(&mut nv_tree, commit), 2, "only the label and the filler move");
        assert_eq!(nv_tree.frame(label), Some(Rect::from_xywh(275., 0., 25., 20.)));
        assert_eq!(nv_tree.frame(filler), Some(Rect::from_xywh(0., 0., 275., 20.)));
        assert_eq!(nv_tree.frame(other), other_frame);
    }

    #[test]
    fn viewport_changes_relayout() {
        let mut tree = tree();
        let mut nv_tree = NVTree::new(HeadlessBackend::new());
        let root = tree.render_root(screen("hi")).unwrap();
        let commit = tree.run_update_cycle().unwrap();
        apply(&mut nv_tree, commit);

        assert!(tree.run_update_cycle().unwrap().is_empty());

        tree.set_viewport(Vector2::new(200., 100.));
        let commit = tree.run_update_cycle().unwrap();
        assert!(commit.patches.is_empty());
        apply(&mut nv_tree, commit);
        assert_eq!(nv_tree.frame(root), Some(Rect::from_xywh(0., 0., 200., 100.)));
    }
}
