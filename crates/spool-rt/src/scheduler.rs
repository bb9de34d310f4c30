// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Single-threaded cooperative scheduler.
//!
//! One ready queue, one waiting set, one poller. `run` pops the head of the
//! ready queue, resumes it, interprets whatever system call it produced,
//! and polls for socket readiness whenever tasks are parked on I/O. The
//! loop never blocks while something is runnable and never spins while
//! nothing is.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use crate::error::RuntimeError;
use crate::net::AsSocketId;
use crate::reactor::Poller;
use crate::syscall::SystemCall;
use crate::task::{BoxFuture, Placement, Step, Task, TaskId};
use crate::value::{JoinedResults, TaskResult, Value};
use crate::waiting::{Interest, WaitingSet};

/// FIFO of runnable tasks.
///
/// Shared with join callbacks, which release their waiter from inside
/// another task's completion.
#[derive(Clone, Default)]
pub(crate) struct ReadyQueue(Rc<RefCell<VecDeque<Task>>>);

impl ReadyQueue {
    /// Checked append for caller-supplied tasks.
    fn push(&self, task: Task) -> Result<(), RuntimeError> {
        task.check_schedulable()?;
        self.release(task);
        Ok(())
    }

    /// Append a task the scheduler itself just took out of a queue, bucket
    /// or join.
    fn release(&self, task: Task) {
        task.set_placement(Placement::Ready);
        self.0.borrow_mut().push_back(task);
    }

    fn pop(&self) -> Option<Task> {
        let task = self.0.borrow_mut().pop_front()?;
        task.set_placement(Placement::Detached);
        Some(task)
    }

    fn len(&self) -> usize {
        self.0.borrow().len()
    }

    fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

/// Owns every task it creates. Create one per run and drive it with `run`.
#[derive(Default)]
pub struct Scheduler {
    next_id: u64,
    ready: ReadyQueue,
    waiting: WaitingSet,
    poller: Poller,
    /// Unfinished tasks by id.
    live: BTreeMap<TaskId, Task>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `future` in a new task and queue it. Never suspends.
    pub fn new_task<F>(&mut self, future: F) -> Task
    where
        F: Future<Output = TaskResult> + 'static,
    {
        self.add_task(Box::pin(future))
    }

    fn add_task(&mut self, future: BoxFuture) -> Task {
        self.next_id += 1;
        let id = TaskId(self.next_id);
        let task = Task::new(id, future);
        log::debug!("create new task {}", id);

        self.live.insert(id, task.clone());
        self.ready.release(task.clone());
        task
    }

    /// Append `task` to the ready queue.
    ///
    /// Fails if the task is already queued, parked, or finished.
    pub fn schedule(&mut self, task: Task) -> Result<(), RuntimeError> {
        log::trace!("schedule {}", task.id());
        self.ready.push(task.clone())?;
        self.live.entry(task.id()).or_insert(task);
        Ok(())
    }

    /// Park `task` until `socket` is readable.
    pub fn wait_for_read<S>(&mut self, socket: &S, task: Task) -> Result<(), RuntimeError>
    where
        S: AsSocketId + ?Sized,
    {
        self.park(Interest::Readable, socket, task)
    }

    /// Park `task` until `socket` is writable.
    pub fn wait_for_write<S>(&mut self, socket: &S, task: Task) -> Result<(), RuntimeError>
    where
        S: AsSocketId + ?Sized,
    {
        self.park(Interest::Writable, socket, task)
    }

    fn park<S>(&mut self, interest: Interest, socket: &S, task: Task) -> Result<(), RuntimeError>
    where
        S: AsSocketId + ?Sized,
    {
        task.check_schedulable()?;
        self.waiting.register(interest, socket.socket_id(), task);
        Ok(())
    }

    /// Run until no task is ready and none is parked on a socket.
    ///
    /// Returns early with the error if an integrity check fails; the
    /// scheduler is not usable after that.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        log::debug!("run: {} task(s) ready", self.ready.len());

        while !self.ready.is_empty() || !self.waiting.is_empty() {
            if let Some(task) = self.ready.pop() {
                self.run_task(task)?;
            }

            if !self.waiting.is_empty() {
                // Block only when nothing else could make progress.
                let timeout = if self.ready.is_empty() {
                    None
                } else {
                    Some(Duration::ZERO)
                };
                self.io_poll(timeout)?;
            }
        }

        let parked = self.parked_tasks();
        if !parked.is_empty() {
            log::warn!(
                "run drained with {} task(s) parked on a join that cannot complete: {:?}",
                parked.len(),
                parked
            );
        }
        log::debug!("run: drained");
        Ok(())
    }

    fn run_task(&mut self, task: Task) -> Result<(), RuntimeError> {
        let value = task.take_pending();
        log::trace!("resume {}", task.id());

        match task.resume(value) {
            Step::Call(call) => self.dispatch(task, call),
            Step::Yielded(_) => {
                self.ready.release(task);
                Ok(())
            }
            Step::Finished => {
                log::debug!("{} finished", task.id());
                self.live.remove(&task.id());
                Ok(())
            }
        }
    }

    fn dispatch(&mut self, task: Task, call: SystemCall) -> Result<(), RuntimeError> {
        log::debug!("{} requested {}", task.id(), call.name());

        match call {
            SystemCall::Spawn(future) => {
                let child = self.add_task(future);
                task.set_pending_value(Value::Task(child));
                self.ready.release(task);
                Ok(())
            }
            SystemCall::WaitForRead(id) => self.wait_for_read(&id, task),
            SystemCall::WaitForWrite(id) => self.wait_for_write(&id, task),
            SystemCall::WaitForAll(tasks) => self.wait_for_all(task, tasks),
        }
    }

    /// Park `waiter` until every task in `tasks` finished.
    ///
    /// Results are collected by id; the waiter is released once the map
    /// holds one entry per listed task. A list naming the same task twice
    /// therefore never releases.
    fn wait_for_all(&mut self, waiter: Task, tasks: Vec<Task>) -> Result<(), RuntimeError> {
        waiter.set_placement(Placement::Joining);
        if tasks.is_empty() {
            return Err(RuntimeError::EmptyJoin { id: waiter.id() });
        }

        let expected = tasks.len();
        let collected: Rc<RefCell<JoinedResults>> = Rc::default();

        for task in &tasks {
            let collected = collected.clone();
            let waiter = waiter.clone();
            let ready = self.ready.clone();

            task.on_result(move |done| {
                let mut results = collected.borrow_mut();
                if let Ok(result) = done.result() {
                    results.insert(done.id(), result);
                }
                if results.len() == expected {
                    let joined = std::mem::take(&mut *results);
                    drop(results);
                    log::debug!("{} joined {} task(s)", waiter.id(), joined.len());
                    waiter.set_pending_value(Value::Joined(joined));
                    ready.release(waiter);
                }
            });
        }
        Ok(())
    }

    /// One multiplexer cycle: release every task whose socket became ready.
    fn io_poll(&mut self, timeout: Option<Duration>) -> Result<(), RuntimeError> {
        let readiness = self.poller.select(
            self.waiting.ids(Interest::Readable),
            self.waiting.ids(Interest::Writable),
            timeout,
        )?;

        for id in readiness.readable {
            for task in self.waiting.release(Interest::Readable, id) {
                self.ready.release(task);
            }
        }
        for id in readiness.writable {
            for task in self.waiting.release(Interest::Writable, id) {
                self.ready.release(task);
            }
        }
        Ok(())
    }

    /// Unfinished tasks parked on a join. Non-empty after `run` only if a
    /// join could never complete.
    pub fn parked_tasks(&self) -> Vec<TaskId> {
        self.live
            .values()
            .filter(|task| task.placement() == Placement::Joining)
            .map(Task::id)
            .collect()
    }

    /// Tasks created (or scheduled) here that have not finished yet.
    pub fn task_count(&self) -> usize {
        self.live.len()
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// True while some task is parked on socket readiness.
    pub fn is_waiting(&self) -> bool {
        !self.waiting.is_empty()
    }

    /// Number of tasks parked on socket readiness.
    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    /// Ids of the tasks parked on socket readiness, readers first.
    pub fn waiting_tasks(&self) -> Vec<TaskId> {
        self.waiting.tasks().map(Task::id).collect()
    }
}
