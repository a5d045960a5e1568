//! The update worker: owns the view tree and runs update cycles off the UI thread.

use cgmath::Vector2;
use crossbeam::channel::{Receiver, Sender};
use plume_core::{Commit, Element, Error, ViewTree};

/// Work for the worker thread.
pub(crate) enum Job {
    /// Renders a new root element.
    Mount(Element),
    /// Runs an update cycle for queued state updates.
    Update,
    /// Changes the viewport and lays out again.
    Resize(Vector2<f64>),
    /// Acknowledged once every job before it has been handled.
    Barrier(Sender<()>),
    Shutdown,
}

/// Results sent back to the UI thread.
pub(crate) enum Message {
    Commit(Commit),
    Aborted(Error),
}

pub(crate) fn run(mut tree: ViewTree, jobs: Receiver<Job>, commits: Sender<Message>) {
    while let Ok(job) = jobs.recv() {
        let result = match job {
            Job::Mount(element) => tree
                .render_root(element)
                .and_then(|_| tree.run_update_cycle()),
            Job::Update => tree.run_update_cycle(),
            Job::Resize(viewport) => {
                tree.set_viewport(viewport);
                tree.run_update_cycle()
            }
            Job::Barrier(ack) => {
                let _ = ack.send(());
                continue;
            }
            Job::Shutdown => break,
        };

        let message = match result {
            Ok(commit) => {
                // a coalesced update may find the queue already drained
                if commit.is_empty() && commit.completions.is_empty() {
                    continue;
                }
                log::trace!(
                    "committing {} patches after {} renders",
                    commit.patches.len(),
                    commit.report.rendered
                );
                Message::Commit(commit)
            }
            Err(err) => {
                log::error!("update cycle aborted: {}", err);
                Message::Aborted(err)
            }
        };
        if commits.send(message).is_err() {
            log::warn!("host is gone; stopping worker");
            break;
        }
    }
    log::debug!("worker stopped with {} views", tree.len());
}
