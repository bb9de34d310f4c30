// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Task representation.
//!
//! A task wraps one resumable computation: a boxed future driven by explicit
//! `resume` calls instead of wakers. Between resumes the task carries the
//! value to inject at its next suspension point, its final result once
//! finished, and the observers waiting for that result.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use crate::error::RuntimeError;
use crate::syscall::{self, Request, SuspendSlot, SystemCall};
use crate::value::{TaskResult, Value};

/// Unique identifier for a task. Allocated by the scheduler, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Task lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Created, computation not entered yet.
    NotStarted,
    /// Inside `resume`.
    Running,
    /// Parked at a suspension point.
    Suspended,
    /// Computation returned; result stored. Terminal.
    Finished,
}

/// Where the scheduler currently keeps a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    /// In no queue: freshly created, running, or dropped by the scheduler.
    Detached,
    /// In the ready queue.
    Ready,
    /// In a waiting-set bucket.
    Blocked,
    /// Waiting on a join.
    Joining,
}

impl Placement {
    fn describe(self) -> &'static str {
        match self {
            Placement::Detached => "detached",
            Placement::Ready => "ready",
            Placement::Blocked => "blocked on a socket",
            Placement::Joining => "waiting on a join",
        }
    }
}

/// What a single `resume` produced.
pub enum Step {
    /// The computation returned. Callbacks have already fired.
    Finished,
    /// The computation asked the scheduler to do something.
    Call(SystemCall),
    /// Plain suspension; the task should simply run again later.
    Yielded(Value),
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Finished => f.write_str("Finished"),
            Step::Call(call) => f.debug_tuple("Call").field(call).finish(),
            Step::Yielded(value) => f.debug_tuple("Yielded").field(value).finish(),
        }
    }
}

/// Type-erased task computation. Single-threaded, so no `Send` bound.
pub type BoxFuture = Pin<Box<dyn Future<Output = TaskResult>>>;

type Callback = Box<dyn FnOnce(&Task)>;

struct TaskInner {
    id: TaskId,
    state: Cell<TaskState>,
    placement: Cell<Placement>,
    future: RefCell<Option<BoxFuture>>,
    pending: RefCell<Option<Value>>,
    result: RefCell<Option<TaskResult>>,
    callbacks: RefCell<Vec<Callback>>,
    slot: Rc<SuspendSlot>,
}

/// Shared handle to a task. Cloning shares the same task.
#[derive(Clone)]
pub struct Task {
    inner: Rc<TaskInner>,
}

impl Task {
    pub(crate) fn new(id: TaskId, future: BoxFuture) -> Self {
        Self {
            inner: Rc::new(TaskInner {
                id,
                state: Cell::new(TaskState::NotStarted),
                placement: Cell::new(Placement::Detached),
                future: RefCell::new(Some(future)),
                pending: RefCell::new(None),
                result: RefCell::new(None),
                callbacks: RefCell::new(Vec::new()),
                slot: Rc::new(SuspendSlot::default()),
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn state(&self) -> TaskState {
        self.inner.state.get()
    }

    pub fn is_finished(&self) -> bool {
        self.state() == TaskState::Finished
    }

    /// Store the value injected at the next `resume`. Only the latest is kept.
    pub fn set_pending_value(&self, value: Value) {
        *self.inner.pending.borrow_mut() = Some(value);
    }

    /// Take the pending value, leaving nothing behind.
    pub(crate) fn take_pending(&self) -> Value {
        self.inner.pending.borrow_mut().take().unwrap_or_default()
    }

    /// The final result. Fails until the task has finished.
    pub fn result(&self) -> Result<TaskResult, RuntimeError> {
        match self.inner.result.borrow().as_ref() {
            Some(result) if self.is_finished() => Ok(result.clone()),
            _ => Err(RuntimeError::InvalidState { id: self.id() }),
        }
    }

    /// Run `callback` once the task finishes; immediately if it already has.
    pub fn on_result<F>(&self, callback: F)
    where
        F: FnOnce(&Task) + 'static,
    {
        if self.is_finished() {
            callback(self);
        } else {
            self.inner.callbacks.borrow_mut().push(Box::new(callback));
        }
    }

    /// Drive the computation to its next suspension point.
    ///
    /// The first resume starts the computation and ignores `value`; later
    /// resumes hand `value` to the suspension point the task is parked at.
    pub fn resume(&self, value: Value) -> Step {
        match self.state() {
            TaskState::Finished => return Step::Finished,
            TaskState::NotStarted => {}
            TaskState::Running | TaskState::Suspended => self.inner.slot.inject(value),
        }
        self.inner.state.set(TaskState::Running);

        let outcome = {
            let mut fut_slot = self.inner.future.borrow_mut();
            let Some(fut) = fut_slot.as_mut() else {
                return Step::Finished;
            };

            let _current = syscall::enter(self.inner.slot.clone());
            let waker = Waker::from(Arc::new(NoopWake));
            let mut cx = Context::from_waker(&waker);

            match fut.as_mut().poll(&mut cx) {
                Poll::Ready(result) => {
                    // Drop the computation now that it's done.
                    *fut_slot = None;
                    Some(result)
                }
                Poll::Pending => None,
            }
        };

        match outcome {
            Some(result) => {
                self.finish(result);
                Step::Finished
            }
            None => {
                self.inner.state.set(TaskState::Suspended);
                match self.inner.slot.take_request() {
                    Some(Request::Call(call)) => Step::Call(call),
                    Some(Request::Yield(value)) => Step::Yielded(value),
                    // Pending on something that isn't ours: re-run it later.
                    None => Step::Yielded(Value::Unit),
                }
            }
        }
    }

    fn finish(&self, result: TaskResult) {
        *self.inner.result.borrow_mut() = Some(result);
        self.inner.state.set(TaskState::Finished);
        self.inner.slot.clear();

        loop {
            let callbacks = std::mem::take(&mut *self.inner.callbacks.borrow_mut());
            if callbacks.is_empty() {
                break;
            }
            for callback in callbacks {
                callback(self);
            }
        }
    }

    pub(crate) fn placement(&self) -> Placement {
        self.inner.placement.get()
    }

    pub(crate) fn set_placement(&self, placement: Placement) {
        self.inner.placement.set(placement);
    }

    /// Misuse check before the task enters a queue or bucket.
    pub(crate) fn check_schedulable(&self) -> Result<(), RuntimeError> {
        if self.is_finished() {
            return Err(RuntimeError::TaskFinished { id: self.id() });
        }
        match self.placement() {
            Placement::Detached => Ok(()),
            other => Err(RuntimeError::AlreadyScheduled {
                id: self.id(),
                placement: other.describe(),
            }),
        }
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Task {}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("placement", &self.placement())
            .finish()
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id().fmt(f)
    }
}

/// The scheduler resumes tasks explicitly, so wakeups carry no information.
struct NoopWake;

impl Wake for NoopWake {
    fn wake(self: Arc<Self>) {}
}
