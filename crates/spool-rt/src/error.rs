// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Runtime and task errors.
//!
//! `RuntimeError` is what the scheduler itself reports: misuse at a call
//! site, or an integrity failure that aborts `Scheduler::run`.
//! `TaskError` is what a task computation produces; it stays local to the
//! failing task and only travels further as a joined result.

use std::io;
use std::os::unix::io::RawFd;

use thiserror::Error;

use crate::task::TaskId;

/// Errors raised by the scheduler and task bookkeeping.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// `Task::result()` called before the task finished.
    #[error("{id} has not finished; its result is not available yet")]
    InvalidState { id: TaskId },

    /// Task is already sitting in the ready queue, a waiting bucket, or a join.
    #[error("{id} is already scheduled ({placement})")]
    AlreadyScheduled { id: TaskId, placement: &'static str },

    /// Finished tasks never run again.
    #[error("{id} has finished and cannot be scheduled")]
    TaskFinished { id: TaskId },

    /// A join over zero tasks can never complete.
    #[error("{id} asked to wait for an empty set of tasks")]
    EmptyJoin { id: TaskId },

    /// The readiness primitive flagged a descriptor as invalid.
    #[error("poller reported an exceptional condition on descriptor {fd}")]
    InvalidDescriptor { fd: RawFd },

    /// The readiness primitive itself failed.
    #[error("readiness poll failed: {0}")]
    Poll(#[from] io::Error),
}

impl RuntimeError {
    /// Integrity errors abort the whole run; everything else is caller misuse.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            RuntimeError::EmptyJoin { .. }
                | RuntimeError::InvalidDescriptor { .. }
                | RuntimeError::Poll(_)
        )
    }
}

/// Failure produced by a task computation.
///
/// Cloneable so a joiner can copy it out of a finished task without
/// taking it away from other observers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// Socket creation, connect, read or write failed.
    #[error("i/o error ({kind:?}): {message}")]
    Io { kind: io::ErrorKind, message: String },

    /// A suspension point was resumed with a value of the wrong shape.
    #[error("resumed with {found} where {expected} was expected")]
    UnexpectedResume {
        expected: &'static str,
        found: &'static str,
    },

    /// Application-level failure.
    #[error("{0}")]
    Failed(String),
}

impl TaskError {
    pub fn failed(msg: impl Into<String>) -> Self {
        TaskError::Failed(msg.into())
    }

    /// The I/O error kind, if this failure came from a socket.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            TaskError::Io { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<io::Error> for TaskError {
    fn from(err: io::Error) -> Self {
        TaskError::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts_with_kind() {
        let err: TaskError = io::Error::new(io::ErrorKind::ConnectionRefused, "nope").into();
        assert_eq!(err.io_kind(), Some(io::ErrorKind::ConnectionRefused));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn integrity_classification() {
        assert!(RuntimeError::EmptyJoin { id: TaskId(1) }.is_integrity());
        assert!(RuntimeError::InvalidDescriptor { fd: 3 }.is_integrity());
        assert!(!RuntimeError::InvalidState { id: TaskId(1) }.is_integrity());
        assert!(!RuntimeError::TaskFinished { id: TaskId(2) }.is_integrity());
    }

    #[test]
    fn messages_name_the_task() {
        let err = RuntimeError::AlreadyScheduled {
            id: TaskId(7),
            placement: "ready",
        };
        assert_eq!(err.to_string(), "Task(7) is already scheduled (ready)");
    }
}
