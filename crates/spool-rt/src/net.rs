// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Non-blocking TCP handles.
//!
//! Every operation either completes immediately or fails with
//! `WouldBlock`; nothing here ever parks the thread. The `async` helpers
//! wrap the raw operations in a wait-then-retry loop that suspends the
//! calling task through the scheduler.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};

use crate::syscall::{wait_for_read, wait_for_write};

/// Stable identity of a socket: its descriptor. Waiting-set key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SocketId(RawFd);

impl SocketId {
    pub fn from_raw(fd: RawFd) -> Self {
        Self(fd)
    }

    pub fn as_raw(self) -> RawFd {
        self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd {}", self.0)
    }
}

impl AsRawFd for SocketId {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

/// Anything the scheduler can wait on.
pub trait AsSocketId {
    fn socket_id(&self) -> SocketId;
}

impl<T: AsRawFd + ?Sized> AsSocketId for T {
    fn socket_id(&self) -> SocketId {
        SocketId(self.as_raw_fd())
    }
}

/// Listening socket.
#[derive(Debug)]
pub struct TcpServer {
    listener: TcpListener,
}

impl TcpServer {
    /// Bind and listen. Fails with the OS error if the address is unusable.
    pub fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        log::debug!("listening on {} ({})", listener.local_addr()?, listener.socket_id());
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept a pending connection, or `WouldBlock` if there is none.
    pub fn try_accept(&self) -> io::Result<TcpClient> {
        let (stream, peer) = self.listener.accept()?;
        stream.set_nonblocking(true)?;
        log::debug!("accepted {} from {}", stream.socket_id(), peer);
        Ok(TcpClient { stream })
    }

    /// Suspend until a client connects.
    pub async fn accept(&self) -> io::Result<TcpClient> {
        loop {
            wait_for_read(self).await;
            match self.try_accept() {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                other => return other,
            }
        }
    }

    pub fn close(self) {
        log::trace!("closing listener {}", self.socket_id());
    }
}

impl AsRawFd for TcpServer {
    fn as_raw_fd(&self) -> RawFd {
        self.listener.as_raw_fd()
    }
}

/// Connected (or connecting) stream socket.
#[derive(Debug)]
pub struct TcpClient {
    stream: TcpStream,
}

impl TcpClient {
    /// Start a non-blocking connect to the first address `addr` resolves to.
    ///
    /// Returns as soon as the connect is in flight. The socket becomes
    /// writable once the handshake finishes; a refused connection shows up
    /// as an error on the first read/write or via `connect_error`.
    pub fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let addr = addr.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
        })?;

        let domain = match addr {
            SocketAddr::V4(_) => libc::AF_INET,
            SocketAddr::V6(_) => libc::AF_INET6,
        };
        let fd = unsafe {
            libc::socket(
                domain,
                libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                0,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // Owns the descriptor from here on; dropping it closes the socket.
        let stream = unsafe { TcpStream::from_raw_fd(fd) };

        let (storage, len) = std_to_sockaddr(&addr);
        let ret = unsafe {
            libc::connect(
                fd,
                &storage as *const libc::sockaddr_storage as *const libc::sockaddr,
                len,
            )
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EINPROGRESS) {
                return Err(err);
            }
        }

        log::debug!("connecting {} to {}", stream.socket_id(), addr);
        Ok(Self { stream })
    }

    /// Pending socket error, e.g. a refused connect. Clears it.
    pub fn connect_error(&self) -> io::Result<Option<io::Error>> {
        self.stream.take_error()
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    /// Read up to `max` bytes. Empty means the peer closed.
    pub fn try_read(&self, max: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; max];
        let n = (&self.stream).read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Write as much of `bytes` as fits without blocking.
    pub fn try_write(&self, bytes: &[u8]) -> io::Result<usize> {
        (&self.stream).write(bytes)
    }

    /// Suspend until readable, then read up to `max` bytes.
    pub async fn read(&self, max: usize) -> io::Result<Vec<u8>> {
        loop {
            wait_for_read(self).await;
            match self.try_read(max) {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                other => return other,
            }
        }
    }

    /// Suspend until writable, then write what fits.
    pub async fn write(&self, bytes: &[u8]) -> io::Result<usize> {
        loop {
            wait_for_write(self).await;
            match self.try_write(bytes) {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                other => return other,
            }
        }
    }

    pub async fn write_all(&self, mut bytes: &[u8]) -> io::Result<()> {
        while !bytes.is_empty() {
            match self.write(bytes).await? {
                0 => return Err(io::ErrorKind::WriteZero.into()),
                n => bytes = &bytes[n..],
            }
        }
        Ok(())
    }

    /// Read in `chunk`-sized pieces until the peer closes.
    pub async fn read_to_end(&self, chunk: usize) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let piece = self.read(chunk).await?;
            if piece.is_empty() {
                return Ok(out);
            }
            out.extend_from_slice(&piece);
        }
    }

    /// Release the socket. The handle cannot be used afterwards.
    pub fn close(self) {
        log::trace!("closing {}", self.socket_id());
    }
}

impl AsRawFd for TcpClient {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

/// Convert a std::net::SocketAddr to a raw sockaddr for `libc::connect`.
fn std_to_sockaddr(addr: &SocketAddr) -> (libc::sockaddr_storage, libc::socklen_t) {
    let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
    let len = match addr {
        SocketAddr::V4(v4) => {
            let sin = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in) };
            sin.sin_family = libc::AF_INET as libc::sa_family_t;
            sin.sin_port = v4.port().to_be();
            sin.sin_addr = libc::in_addr {
                s_addr: u32::from(*v4.ip()).to_be(),
            };
            std::mem::size_of::<libc::sockaddr_in>()
        }
        SocketAddr::V6(v6) => {
            let sin6 = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in6) };
            sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            sin6.sin6_port = v6.port().to_be();
            sin6.sin6_flowinfo = v6.flowinfo();
            sin6.sin6_addr = libc::in6_addr {
                s6_addr: v6.ip().octets(),
            };
            sin6.sin6_scope_id = v6.scope_id();
            std::mem::size_of::<libc::sockaddr_in6>()
        }
    };
    (storage, len as libc::socklen_t)
}
