//! Dump progress events
//!
//! Sent over a crossbeam channel so a host can follow a session from another
//! thread.

use std::time::Duration;

use crossbeam::channel::Sender;

use super::TableStats;

/// Milestones of one dump session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpProgress {
    /// A table's cursor is about to be opened
    TableStarted { table: String, index: usize, total: usize },

    /// A table's entries were closed cleanly
    TableCompleted(TableStats),

    /// Teardown is over; `succeeded` is false if the session returned an error
    SessionFinished { tables: usize, succeeded: bool, elapsed: Duration },
}

/// Optional progress sender; a dropped receiver never fails the dump
#[derive(Default)]
pub(crate) struct ProgressReporter {
    sender: Option<Sender<DumpProgress>>,
}

impl ProgressReporter {
    pub(crate) fn new(sender: Option<Sender<DumpProgress>>) -> Self {
        Self { sender }
    }

    pub(crate) fn report(&self, event: DumpProgress) {
        if let Some(sender) = &self.sender {
            if sender.send(event).is_err() {
                tracing::trace!("progress receiver dropped");
            }
        }
    }
}
