//! Supersession bookkeeping for one kind of operation.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Tracks the single live operation of a kind (weather load or search).
///
/// Every operation is stamped with the generation current when it started.
/// Starting or cancelling bumps the generation, so a stale operation can
/// detect that it lost its claim before publishing anything. Callers publish
/// while holding the slot's lock, which makes "check generation, then write
/// state" atomic with respect to supersession.
#[derive(Debug, Default)]
pub(crate) struct Slot {
    generation: u64,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Slot {
    /// Cancels the live operation and returns a claim for a new one.
    pub(crate) fn supersede(&mut self) -> (u64, CancellationToken) {
        self.cancel();
        self.token = CancellationToken::new();
        (self.generation, self.token.clone())
    }

    /// Cancels the live operation, if any, without starting another.
    pub(crate) fn cancel(&mut self) {
        self.generation += 1;
        self.token.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Records the task running generation `generation`. A task that was
    /// superseded before it could be attached is aborted straight away.
    pub(crate) fn attach(&mut self, generation: u64, task: JoinHandle<()>) {
        if self.generation == generation {
            self.task = Some(task);
        } else {
            task.abort();
        }
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}
