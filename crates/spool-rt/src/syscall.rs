// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! System calls: requests a task hands to the scheduler at a suspension point.
//!
//! Task code never talks to the scheduler directly. It awaits one of the
//! functions below; the awaitable parks its request in the running task's
//! suspension slot and returns `Pending`. `Task::resume` picks the request
//! up, the scheduler interprets it, and whatever the scheduler injects on
//! the next resume becomes the awaitable's output.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::error::TaskError;
use crate::net::{AsSocketId, SocketId};
use crate::task::{BoxFuture, Task};
use crate::value::{JoinedResults, TaskResult, Value};

/// A scheduling request. Consumed exactly once by the scheduler.
pub enum SystemCall {
    /// Start a new task; the caller is resumed with its handle.
    Spawn(BoxFuture),
    /// Park the caller until the socket is readable.
    WaitForRead(SocketId),
    /// Park the caller until the socket is writable.
    WaitForWrite(SocketId),
    /// Park the caller until every listed task has finished.
    WaitForAll(Vec<Task>),
}

impl SystemCall {
    pub fn name(&self) -> &'static str {
        match self {
            SystemCall::Spawn(_) => "spawn",
            SystemCall::WaitForRead(_) => "wait-for-read",
            SystemCall::WaitForWrite(_) => "wait-for-write",
            SystemCall::WaitForAll(_) => "wait-for-all",
        }
    }
}

impl fmt::Debug for SystemCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemCall::Spawn(_) => f.write_str("Spawn(..)"),
            SystemCall::WaitForRead(id) => f.debug_tuple("WaitForRead").field(id).finish(),
            SystemCall::WaitForWrite(id) => f.debug_tuple("WaitForWrite").field(id).finish(),
            SystemCall::WaitForAll(tasks) => {
                let ids: Vec<_> = tasks.iter().map(Task::id).collect();
                f.debug_tuple("WaitForAll").field(&ids).finish()
            }
        }
    }
}

/// What a suspended computation handed back.
pub(crate) enum Request {
    Call(SystemCall),
    Yield(Value),
}

/// Per-task exchange between awaitables and `Task::resume`.
#[derive(Default)]
pub(crate) struct SuspendSlot {
    request: RefCell<Option<Request>>,
    resumed: RefCell<Option<Value>>,
}

impl SuspendSlot {
    /// Park a request. Hands it back if another one is already parked.
    fn submit(&self, request: Request) -> Result<(), Request> {
        let mut slot = self.request.borrow_mut();
        if slot.is_some() {
            return Err(request);
        }
        *slot = Some(request);
        Ok(())
    }

    pub(crate) fn take_request(&self) -> Option<Request> {
        self.request.borrow_mut().take()
    }

    pub(crate) fn inject(&self, value: Value) {
        *self.resumed.borrow_mut() = Some(value);
    }

    fn take_resumed(&self) -> Value {
        self.resumed.borrow_mut().take().unwrap_or_default()
    }

    pub(crate) fn clear(&self) {
        self.request.borrow_mut().take();
        self.resumed.borrow_mut().take();
    }
}

thread_local! {
    /// Slot of the task currently inside `resume`.
    static CURRENT: RefCell<Option<Rc<SuspendSlot>>> = const { RefCell::new(None) };
}

/// Restores the previously running task's slot on drop.
pub(crate) struct EnterGuard {
    prev: Option<Rc<SuspendSlot>>,
}

pub(crate) fn enter(slot: Rc<SuspendSlot>) -> EnterGuard {
    let prev = CURRENT.with(|cell| cell.replace(Some(slot)));
    EnterGuard { prev }
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        CURRENT.with(|cell| *cell.borrow_mut() = prev);
    }
}

fn current_slot() -> Rc<SuspendSlot> {
    match CURRENT.with(|cell| cell.borrow().clone()) {
        Some(slot) => slot,
        None => panic!("spool awaitable polled outside of a running task"),
    }
}

/// Single suspension point. Resolves to the value injected on the next resume.
#[must_use = "suspension points do nothing unless awaited"]
pub struct Suspend {
    request: Option<Request>,
    submitted: bool,
}

impl Suspend {
    fn new(request: Request) -> Self {
        Self {
            request: Some(request),
            submitted: false,
        }
    }
}

impl Future for Suspend {
    type Output = Value;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Value> {
        let this = self.get_mut();
        let slot = current_slot();

        if this.submitted {
            this.submitted = false;
            return Poll::Ready(slot.take_resumed());
        }

        match this.request.take() {
            Some(request) => {
                // One request per step; a sibling that lost the race retries
                // on the next resume.
                match slot.submit(request) {
                    Ok(()) => this.submitted = true,
                    Err(request) => this.request = Some(request),
                }
                Poll::Pending
            }
            None => Poll::Ready(Value::Unit),
        }
    }
}

/// Start `future` as a new task. Resolves to the child's handle.
pub async fn spawn<F>(future: F) -> Result<Task, TaskError>
where
    F: Future<Output = TaskResult> + 'static,
{
    Suspend::new(Request::Call(SystemCall::Spawn(Box::pin(future))))
        .await
        .into_task()
}

/// Park until `socket` is readable.
pub fn wait_for_read<S>(socket: &S) -> impl Future<Output = ()>
where
    S: AsSocketId + ?Sized,
{
    let id = socket.socket_id();
    async move {
        Suspend::new(Request::Call(SystemCall::WaitForRead(id))).await;
    }
}

/// Park until `socket` is writable.
pub fn wait_for_write<S>(socket: &S) -> impl Future<Output = ()>
where
    S: AsSocketId + ?Sized,
{
    let id = socket.socket_id();
    async move {
        Suspend::new(Request::Call(SystemCall::WaitForWrite(id))).await;
    }
}

/// Park until every task in `tasks` finished; collects their results by id.
///
/// An empty list can never complete and aborts the scheduler run.
pub async fn wait_all(tasks: Vec<Task>) -> Result<JoinedResults, TaskError> {
    Suspend::new(Request::Call(SystemCall::WaitForAll(tasks)))
        .await
        .into_joined()
}

/// Plain suspension: hand `value` out, get re-queued, resolve to the
/// value injected on the next resume.
pub fn suspend(value: impl Into<Value>) -> Suspend {
    Suspend::new(Request::Yield(value.into()))
}

/// Give other ready tasks a turn.
pub async fn yield_now() {
    suspend(Value::Unit).await;
}
