// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Spool runtime library.
//!
//! Single-threaded cooperative multitasking. Tasks are futures resumed
//! explicitly by the scheduler; they suspend by awaiting system calls
//! (spawn, wait for a socket, join) and the scheduler decides when they
//! run again, using `poll(2)` to find sockets that became ready.
//!
//! Components:
//! - task: resumable computation, lifecycle, completion callbacks
//! - syscall: system calls and the awaitables that issue them
//! - scheduler: ready queue, dispatch, run loop
//! - waiting/reactor: waiting set and readiness polling
//! - net: non-blocking TCP handles

pub mod error;
pub mod net;
pub mod reactor;
pub mod scheduler;
pub mod syscall;
pub mod task;
pub mod value;
pub mod waiting;

pub use error::{RuntimeError, TaskError};
pub use net::{AsSocketId, SocketId, TcpClient, TcpServer};
pub use scheduler::Scheduler;
pub use syscall::{spawn, suspend, wait_all, wait_for_read, wait_for_write, yield_now, SystemCall};
pub use task::{Step, Task, TaskId, TaskState};
pub use value::{JoinedResults, TaskResult, Value};
pub use waiting::Interest;
