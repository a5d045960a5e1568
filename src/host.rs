use crate::config::Config;
use crate::worker::{self, Job, Message};
use cgmath::Vector2;
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use plume_core::events::Gesture;
use plume_core::{Backend, Commit, Element, NVTree, PatchError, StateUpdater, UpdateQueue, ViewId};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Errors surfaced by the host.
#[derive(Debug, Error)]
pub enum HostError<E> {
    #[error("failed to apply commit: {0}")]
    Patch(PatchError<E>),
    #[error("update cycle aborted: {0}")]
    Aborted(plume_core::Error),
    #[error("worker thread has stopped")]
    Disconnected,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Connects a view tree to a backend.
///
/// The view tree lives on a worker thread, which runs update cycles whenever state changes. The
/// resulting commits are applied to the backend when the host is polled, on whichever thread owns
/// the host.
pub struct Host<B: Backend> {
    nv_tree: NVTree<B>,
    queue: Arc<UpdateQueue>,
    jobs: Sender<Job>,
    commits: Receiver<Message>,
    worker: Option<JoinHandle<()>>,
}

impl<B: Backend> Host<B> {
    /// Creates a new Host and starts its worker.
    ///
    /// Nothing is shown until an element is rendered and the host is polled.
    pub fn new(backend: B, config: Config) -> Result<Host<B>, HostError<B::Error>> {
        let (jobs, job_recv) = channel::unbounded();
        let (commit_sender, commits) = channel::unbounded();

        let tree = plume_core::ViewTree::new(config.services, config.viewport);
        let queue = Arc::clone(tree.queue());
        let notify = jobs.clone();
        queue.set_notifier(move || {
            if notify.send(Job::Update).is_err() {
                log::warn!("state updated after the worker stopped");
            }
        });

        let worker = thread::Builder::new()
            .name(config.worker_name)
            .spawn(move || worker::run(tree, job_recv, commit_sender))?;

        Ok(Host {
            nv_tree: NVTree::new(backend),
            queue,
            jobs,
            commits,
            worker: Some(worker),
        })
    }

    /// Renders an element as the root, reconciling it with the previous root.
    pub fn render(&self, element: Element) -> Result<(), HostError<B::Error>> {
        self.send(Job::Mount(element))
    }

    /// Changes the size the root view is laid out in.
    pub fn resize(&self, viewport: Vector2<f64>) -> Result<(), HostError<B::Error>> {
        self.send(Job::Resize(viewport))
    }

    /// Returns a state updater for the component `id`.
    pub fn updater<S: 'static>(&self, id: ViewId) -> StateUpdater<S> {
        self.queue.updater(id)
    }

    /// Routes a gesture to a native view; see [`NVTree::dispatch`].
    pub fn dispatch(&self, target: ViewId, gesture: Gesture) -> bool {
        self.nv_tree.dispatch(target, gesture)
    }

    pub fn tree(&self) -> &NVTree<B> {
        &self.nv_tree
    }

    pub fn backend(&self) -> &B {
        self.nv_tree.backend()
    }

    pub fn backend_mut(&mut self) -> &mut B {
        self.nv_tree.backend_mut()
    }

    /// Applies all commits the worker has finished so far, in order.
    ///
    /// Returns the number of commits applied. Stops at the first aborted cycle and returns its
    /// error; later commits stay queued for the next poll.
    pub fn poll(&mut self) -> Result<usize, HostError<B::Error>> {
        let mut applied = 0;
        loop {
            match self.commits.try_recv() {
                Ok(Message::Commit(commit)) => {
                    self.apply(commit)?;
                    applied += 1;
                }
                Ok(Message::Aborted(err)) => return Err(HostError::Aborted(err)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Err(HostError::Disconnected),
            }
        }
        Ok(applied)
    }

    /// Waits for the worker to handle everything sent so far, then polls.
    pub fn flush(&mut self) -> Result<usize, HostError<B::Error>> {
        let (ack, done) = channel::bounded(1);
        self.send(Job::Barrier(ack))?;
        done.recv().map_err(|_| HostError::Disconnected)?;
        self.poll()
    }

    fn apply(&mut self, commit: Commit) -> Result<(), HostError<B::Error>> {
        let patches = commit.patches.len();
        for patch in commit.patches {
            self.nv_tree.patch(patch).map_err(HostError::Patch)?;
        }
        let frames = match &commit.layout {
            Some(layout) => self
                .nv_tree
                .apply_layout(layout)
                .map_err(HostError::Patch)?,
            None => 0,
        };
        log::debug!(
            "applied {} patches and {} frames ({} edits)",
            patches,
            frames,
            commit.report.edits.len()
        );
        for completion in commit.completions {
            completion();
        }
        Ok(())
    }

    fn send(&self, job: Job) -> Result<(), HostError<B::Error>> {
        self.jobs.send(job).map_err(|_| HostError::Disconnected)
    }
}

impl<B: Backend> Drop for Host<B> {
    fn drop(&mut self) {
        let _ = self.jobs.send(Job::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("worker thread panicked");
            }
        }
    }
}
