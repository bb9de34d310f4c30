// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Readiness primitive backed by `poll(2)`.
//!
//! Stateless between cycles: the scheduler hands over the full read and
//! write sets every time, the poller reports which of them became ready.
//! Level-triggered, so a spurious report only costs the woken task a retry.

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use crate::error::RuntimeError;
use crate::net::SocketId;

/// Sockets reported ready by one poll cycle, in request order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Readiness {
    pub readable: Vec<SocketId>,
    pub writable: Vec<SocketId>,
}

impl Readiness {
    pub fn is_empty(&self) -> bool {
        self.readable.is_empty() && self.writable.is_empty()
    }

    pub fn len(&self) -> usize {
        self.readable.len() + self.writable.len()
    }
}

/// Conditions that release a reader or writer. Hang-up and error count as
/// readiness so the task observes EOF/the error on its next operation.
const READ_READY: libc::c_short = libc::POLLIN | libc::POLLHUP | libc::POLLERR;
const WRITE_READY: libc::c_short = libc::POLLOUT | libc::POLLHUP | libc::POLLERR;

#[derive(Default)]
pub struct Poller {
    /// Reused between cycles.
    fds: Vec<libc::pollfd>,
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until a socket in `read` or `write` is ready or `timeout`
    /// elapses. `None` waits indefinitely, `Some(Duration::ZERO)` only checks.
    ///
    /// An invalid descriptor is an integrity failure, not readiness.
    pub fn select<R, W>(
        &mut self,
        read: R,
        write: W,
        timeout: Option<Duration>,
    ) -> Result<Readiness, RuntimeError>
    where
        R: IntoIterator<Item = SocketId>,
        W: IntoIterator<Item = SocketId>,
    {
        self.fds.clear();
        self.fds.extend(read.into_iter().map(|id| pollfd(id.as_raw(), libc::POLLIN)));
        let read_len = self.fds.len();
        self.fds.extend(write.into_iter().map(|id| pollfd(id.as_raw(), libc::POLLOUT)));

        let n = unsafe {
            libc::poll(
                self.fds.as_mut_ptr(),
                self.fds.len() as libc::nfds_t,
                timeout_ms(timeout),
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(Readiness::default()); // EINTR: nothing this cycle.
            }
            return Err(RuntimeError::Poll(err));
        }

        let mut ready = Readiness::default();
        if n == 0 {
            return Ok(ready);
        }

        for (i, entry) in self.fds.iter().enumerate() {
            if entry.revents & libc::POLLNVAL != 0 {
                return Err(RuntimeError::InvalidDescriptor { fd: entry.fd });
            }
            let id = SocketId::from_raw(entry.fd);
            if i < read_len {
                if entry.revents & READ_READY != 0 {
                    ready.readable.push(id);
                }
            } else if entry.revents & WRITE_READY != 0 {
                ready.writable.push(id);
            }
        }

        log::trace!(
            "poll: {} readable, {} writable",
            ready.readable.len(),
            ready.writable.len()
        );
        Ok(ready)
    }
}

fn pollfd(fd: RawFd, events: libc::c_short) -> libc::pollfd {
    libc::pollfd {
        fd,
        events,
        revents: 0,
    }
}

fn timeout_ms(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(d) if d.is_zero() => 0,
        // Round sub-millisecond waits up so they don't degrade into spinning.
        Some(d) => d.as_millis().clamp(1, libc::c_int::MAX as u128) as libc::c_int,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: [SocketId; 0] = [];

    fn pipe() -> (RawFd, RawFd) {
        let mut fds = [0i32; 2];
        let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
        assert_eq!(ret, 0);
        (fds[0], fds[1])
    }

    fn close(fds: &[RawFd]) {
        for &fd in fds {
            unsafe { libc::close(fd) };
        }
    }

    #[test]
    fn empty_pipe_is_not_readable() {
        let (r, w) = pipe();
        let mut poller = Poller::new();
        let ready = poller
            .select([SocketId::from_raw(r)], NONE, Some(Duration::ZERO))
            .unwrap();
        assert!(ready.is_empty());
        close(&[r, w]);
    }

    #[test]
    fn written_pipe_is_readable() {
        let (r, w) = pipe();
        unsafe { libc::write(w, b"x".as_ptr() as *const libc::c_void, 1) };

        let mut poller = Poller::new();
        let ready = poller
            .select([SocketId::from_raw(r)], NONE, Some(Duration::from_millis(100)))
            .unwrap();
        assert_eq!(ready.readable, vec![SocketId::from_raw(r)]);
        assert!(ready.writable.is_empty());
        close(&[r, w]);
    }

    #[test]
    fn read_set_reported_before_write_set() {
        let (r, w) = pipe();
        unsafe { libc::write(w, b"x".as_ptr() as *const libc::c_void, 1) };

        let mut poller = Poller::new();
        let ready = poller
            .select([SocketId::from_raw(r)], [SocketId::from_raw(w)], None)
            .unwrap();
        assert_eq!(ready.readable, vec![SocketId::from_raw(r)]);
        assert_eq!(ready.writable, vec![SocketId::from_raw(w)]);
        assert_eq!(ready.len(), 2);
        close(&[r, w]);
    }

    #[test]
    fn closed_writer_releases_the_reader() {
        let (r, w) = pipe();
        close(&[w]);

        let mut poller = Poller::new();
        let ready = poller
            .select([SocketId::from_raw(r)], NONE, Some(Duration::from_millis(100)))
            .unwrap();
        assert_eq!(ready.readable, vec![SocketId::from_raw(r)]);
        close(&[r]);
    }

    #[test]
    fn invalid_descriptor_is_an_integrity_error() {
        // Far above anything the test process opens.
        let bogus = 999_999;

        let mut poller = Poller::new();
        let err = poller
            .select([SocketId::from_raw(bogus)], NONE, Some(Duration::ZERO))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidDescriptor { fd } if fd == bogus));
        assert!(err.is_integrity());
    }

    #[test]
    fn timeout_conversion() {
        assert_eq!(timeout_ms(None), -1);
        assert_eq!(timeout_ms(Some(Duration::ZERO)), 0);
        assert_eq!(timeout_ms(Some(Duration::from_micros(10))), 1);
        assert_eq!(timeout_ms(Some(Duration::from_millis(250))), 250);
    }
}
