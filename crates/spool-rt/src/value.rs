// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Values that flow through suspension points.
//!
//! Whatever a task is resumed with, and whatever it finally produces, is a
//! `Value`. The set is closed: scheduler-level results (a spawned task's
//! handle, a join's collected results) sit next to the plain data a demo
//! task passes around.

use std::collections::BTreeMap;

use crate::error::TaskError;
use crate::task::{Task, TaskId};

/// Final outcome of a task computation.
pub type TaskResult = Result<Value, TaskError>;

/// Results collected by a join, keyed by the joined task's identity.
pub type JoinedResults = BTreeMap<TaskId, TaskResult>;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Bytes(Vec<u8>),
    Text(String),
    /// Handle to a task, injected after a spawn.
    Task(Task),
    /// Injected when a join completes.
    Joined(JoinedResults),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "text",
            Value::Task(_) => "task",
            Value::Joined(_) => "joined results",
        }
    }

    pub fn into_task(self) -> Result<Task, TaskError> {
        match self {
            Value::Task(task) => Ok(task),
            other => Err(other.mismatch("task")),
        }
    }

    pub fn into_joined(self) -> Result<JoinedResults, TaskError> {
        match self {
            Value::Joined(results) => Ok(results),
            other => Err(other.mismatch("joined results")),
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, TaskError> {
        match self {
            Value::Bytes(bytes) => Ok(bytes),
            Value::Text(text) => Ok(text.into_bytes()),
            other => Err(other.mismatch("bytes")),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }

    fn mismatch(&self, expected: &'static str) -> TaskError {
        TaskError::UnexpectedResume {
            expected,
            found: self.kind(),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<Task> for Value {
    fn from(task: Task) -> Self {
        Value::Task(task)
    }
}

impl From<JoinedResults> for Value {
    fn from(results: JoinedResults) -> Self {
        Value::Joined(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_accessor_reports_both_kinds() {
        let err = Value::Int(3).into_task().unwrap_err();
        assert_eq!(
            err,
            TaskError::UnexpectedResume {
                expected: "task",
                found: "int"
            }
        );
    }

    #[test]
    fn text_reads_as_bytes() {
        let bytes = Value::from("ping").into_bytes().unwrap();
        assert_eq!(bytes, b"ping");
    }

    #[test]
    fn default_is_unit() {
        assert!(Value::default().is_unit());
    }
}
