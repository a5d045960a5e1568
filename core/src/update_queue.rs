//! The queue between state updates and update cycles.
//!
//! State updates may be requested from any thread (typically from event handlers on the UI
//! thread). They are appended to the tree's queue, and the first request after the queue was
//! last drained notifies the scheduler. Any number of requests made before the cycle runs are
//! coalesced into that one cycle.

use crate::view_tree::ViewId;
use core::any::Any;
use core::fmt;
use core::marker::PhantomData;
use parking_lot::Mutex;
use std::mem;
use std::sync::{Arc, Weak};

/// A type-erased state mutation.
pub type StateMutation = Box<dyn FnOnce(&mut dyn Any) + Send>;

/// A callback run once the update it was queued with has been committed.
pub type Completion = Box<dyn FnOnce() + Send>;

pub(crate) enum Request {
    Mutate(StateMutation),
    Force,
}

#[derive(Default)]
pub(crate) struct Pending {
    pub(crate) requests: Vec<(ViewId, Request)>,
    pub(crate) completions: Vec<Completion>,
    scheduled: bool,
}

/// A queue of pending state updates for one view tree.
#[derive(Default)]
pub struct UpdateQueue {
    pending: Mutex<Pending>,
    notifier: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
}

impl UpdateQueue {
    pub fn new() -> Arc<UpdateQueue> {
        Arc::new(UpdateQueue::default())
    }

    /// Sets the function called when the queue goes from idle to scheduled.
    pub fn set_notifier<F: Fn() + Send + Sync + 'static>(&self, notifier: F) {
        *self.notifier.lock() = Some(Arc::new(notifier));
    }

    /// Returns a handle for updating the state of the component `id` in the tree this queue
    /// belongs to.
    pub fn updater<S: 'static>(self: &Arc<Self>, id: ViewId) -> StateUpdater<S> {
        StateUpdater::new(id, Arc::downgrade(self))
    }

    /// Whether requests are waiting for an update cycle.
    pub fn is_scheduled(&self) -> bool {
        self.pending.lock().scheduled
    }

    pub(crate) fn push(&self, id: ViewId, request: Request, completion: Option<Completion>) {
        let needs_notify = {
            let mut pending = self.pending.lock();
            pending.requests.push((id, request));
            if let Some(completion) = completion {
                pending.completions.push(completion);
            }
            !mem::replace(&mut pending.scheduled, true)
        };

        if needs_notify {
            // don't hold the lock while notifying; the notifier may be re-entrant
            let notifier = self.notifier.lock().clone();
            match notifier {
                Some(notify) => notify(),
                None => log::trace!("update queued for {:?} with no scheduler attached", id),
            }
        }
    }

    /// Takes all pending requests; the next push will notify again.
    pub(crate) fn drain(&self) -> Pending {
        mem::take(&mut *self.pending.lock())
    }
}

impl fmt::Debug for UpdateQueue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let pending = self.pending.lock();
        f.debug_struct("UpdateQueue")
            .field("requests", &pending.requests.len())
            .field("completions", &pending.completions.len())
            .field("scheduled", &pending.scheduled)
            .finish()
    }
}

/// A handle for updating the state of one component.
///
/// Cheap to clone and safe to move into event handlers. Updates requested after the tree has
/// been dropped are discarded.
pub struct StateUpdater<S> {
    id: ViewId,
    queue: Weak<UpdateQueue>,
    _state: PhantomData<fn(&mut S)>,
}

impl<S: 'static> StateUpdater<S> {
    pub(crate) fn new(id: ViewId, queue: Weak<UpdateQueue>) -> StateUpdater<S> {
        StateUpdater {
            id,
            queue,
            _state: PhantomData,
        }
    }

    /// The component this updater belongs to.
    pub fn id(&self) -> ViewId {
        self.id
    }

    /// Queues a state mutation. Mutations are applied in the order they were queued.
    pub fn update_state<F: FnOnce(&mut S) + Send + 'static>(&self, mutation: F) {
        self.push(Request::Mutate(erase(mutation)), None);
    }

    /// Queues a state mutation and a callback to run once the result has been committed.
    pub fn update_state_then<F, G>(&self, mutation: F, completion: G)
    where
        F: FnOnce(&mut S) + Send + 'static,
        G: FnOnce() + Send + 'static,
    {
        self.push(Request::Mutate(erase(mutation)), Some(Box::new(completion)));
    }

    /// Queues a re-render regardless of whether state or properties changed.
    pub fn force_update(&self) {
        self.push(Request::Force, None);
    }

    fn push(&self, request: Request, completion: Option<Completion>) {
        match self.queue.upgrade() {
            Some(queue) => queue.push(self.id, request, completion),
            None => log::warn!("dropping state update for {:?}: view tree is gone", self.id),
        }
    }
}

fn erase<S: 'static, F: FnOnce(&mut S) + Send + 'static>(mutation: F) -> StateMutation {
    Box::new(move |state: &mut dyn Any| match state.downcast_mut::<S>() {
        Some(state) => mutation(state),
        None => log::error!(
            "state mutation for {} applied to a different state type",
            core::any::type_name::<S>()
        ),
    })
}

impl<S> Clone for StateUpdater<S> {
    fn clone(&self) -> Self {
        StateUpdater {
            id: self.id,
            queue: Weak::clone(&self.queue),
            _state: PhantomData,
        }
    }
}

impl<S> fmt::Debug for StateUpdater<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "StateUpdater<{}>({:?})", core::any::type_name::<S>(), self.id)
    }
}
