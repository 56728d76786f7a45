//! Connection endpoint setup: the non-blocking local and TCP transports a bus daemon
//! listens on and dials out through.
//!
//! Every constructor here hands back a descriptor that is already non-blocking and
//! close-on-exec, or no descriptor at all: a failure after socket creation closes the
//! socket before the error reaches the caller, so there is no partially set up state to
//! clean up. Interrupted system calls are retried internally and never surface.

use crate::{
    error::Error,
    os::unix::{addr, c_wrappers, unixprelude::*},
    retry_on_intr,
};
use std::{
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

/// Queue depth for listeners, one fixed constant for both transports.
const BACKLOG: c_int = 30;

/// Where a connection is made to or accepted from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Endpoint {
    /// A filesystem path naming a Unix domain socket.
    Unix {
        /// Path of the socket file.
        path: PathBuf,
    },
    /// A TCP host and port.
    Tcp {
        /// Hostname to resolve. `None` means `"localhost"`.
        host: Option<String>,
        /// Port to dial or listen on.
        port: u16,
    },
}

impl Endpoint {
    /// Shorthand for [`Endpoint::Unix`].
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }
    /// Shorthand for [`Endpoint::Tcp`].
    pub fn tcp(host: Option<String>, port: u16) -> Self {
        Self::Tcp { host, port }
    }
}

/// Dials the given endpoint. See [`connect_unix`] and [`connect_tcp`].
pub fn connect(endpoint: &Endpoint) -> Result<Stream, Error> {
    match endpoint {
        Endpoint::Unix { path } => connect_unix(path),
        Endpoint::Tcp { host, port } => connect_tcp(host.as_deref(), *port),
    }
}

/// Starts listening at the given endpoint. See [`listen_unix`] and [`listen_tcp`].
pub fn listen(endpoint: &Endpoint) -> Result<Listener, Error> {
    match endpoint {
        Endpoint::Unix { path } => listen_unix(path),
        Endpoint::Tcp { host, port } => listen_tcp(host.as_deref(), *port),
    }
}

/// Connects to the Unix domain socket at `path`.
///
/// A path longer than a socket address can carry is truncated, not rejected; see
/// [`listen_unix`] for why that is lossless in practice. A missing socket file comes back
/// as [`FileNotFound`](crate::error::ErrorKind::FileNotFound), a present one with no
/// listener behind it as [`NoServer`](crate::error::ErrorKind::NoServer).
pub fn connect_unix(path: impl AsRef<Path>) -> Result<Stream, Error> {
    let addr = addr::sockaddr_un(path.as_ref());
    let socket = c_wrappers::socket(libc::AF_UNIX, libc::SOCK_STREAM)?;
    let (addr_ptr, addr_len) = addr::sockaddr_un_raw(&addr);
    unsafe { c_wrappers::connect(socket.as_fd(), addr_ptr, addr_len) }?;
    c_wrappers::set_nonblocking(socket.as_fd(), true)?;
    Ok(Stream(socket))
}

/// Creates a listening Unix domain socket at `path`.
///
/// Over-long paths are truncated to the address structure's capacity, identically to
/// [`connect_unix`], so both ends of an over-long name meet at the same truncated address.
/// Binding over an existing socket file fails with
/// [`AddressInUse`](crate::error::ErrorKind::AddressInUse); stale files are the caller's
/// lifecycle problem.
pub fn listen_unix(path: impl AsRef<Path>) -> Result<Listener, Error> {
    let addr = addr::sockaddr_un(path.as_ref());
    let socket = c_wrappers::socket(libc::AF_UNIX, libc::SOCK_STREAM)?;
    let (addr_ptr, addr_len) = addr::sockaddr_un_raw(&addr);
    retry_on_intr(|| unsafe { c_wrappers::bind(socket.as_fd(), addr_ptr, addr_len) })?;
    retry_on_intr(|| c_wrappers::listen(socket.as_fd(), BACKLOG))?;
    c_wrappers::set_nonblocking(socket.as_fd(), true)?;
    Ok(Listener(socket))
}

/// Resolves `host` and connects to it on `port` over TCP. An absent host means
/// `"localhost"`, and IPv4 addresses are preferred among the resolver's answers.
///
/// Name resolution failure comes back as
/// [`NoNetwork`](crate::error::ErrorKind::NoNetwork) without a socket ever having been
/// created, distinct from [`NoServer`](crate::error::ErrorKind::NoServer) for a live
/// address that refuses.
pub fn connect_tcp(host: Option<&str>, port: u16) -> Result<Stream, Error> {
    let addr = addr::resolve_tcp(host, port)?;
    let socket = c_wrappers::socket(addr.family(), libc::SOCK_STREAM)?;
    unsafe { c_wrappers::connect(socket.as_fd(), addr.as_ptr(), addr.socklen()) }?;
    c_wrappers::set_nonblocking(socket.as_fd(), true)?;
    Ok(Stream(socket))
}

/// Resolves `host` (`"localhost"` if absent) and listens on it at `port` over TCP.
pub fn listen_tcp(host: Option<&str>, port: u16) -> Result<Listener, Error> {
    let addr = addr::resolve_tcp(host, port)?;
    let socket = c_wrappers::socket(addr.family(), libc::SOCK_STREAM)?;
    retry_on_intr(|| unsafe { c_wrappers::bind(socket.as_fd(), addr.as_ptr(), addr.socklen()) })?;
    retry_on_intr(|| c_wrappers::listen(socket.as_fd(), BACKLOG))?;
    c_wrappers::set_nonblocking(socket.as_fd(), true)?;
    Ok(Listener(socket))
}

/// Creates a connected pair of local streams, both non-blocking, for parent/child and
/// in-process full-duplex channels.
pub fn socket_pair() -> Result<(Stream, Stream), Error> {
    let (a, b) = c_wrappers::socket_pair()?;
    c_wrappers::set_nonblocking(a.as_fd(), true)?;
    c_wrappers::set_nonblocking(b.as_fd(), true)?;
    Ok((Stream(a), Stream(b)))
}

/// A connected, always-non-blocking bus transport socket.
///
/// Owns its descriptor outright: dropping the stream closes it, and no clone operation is
/// provided, per the single-owner discipline of this layer. Conversion into [`OwnedFd`] is
/// the escape hatch for handing the descriptor off to an I/O loop.
#[derive(Debug)]
pub struct Stream(OwnedFd);

impl Stream {
    /// Queries the descriptor's file status flags for the non-blocking bit. Freshly
    /// produced streams report `true`.
    pub fn is_nonblocking(&self) -> Result<bool, Error> {
        Ok(c_wrappers::get_nonblocking(self.0.as_fd())?)
    }
}

impl Read for &Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        c_wrappers::read(self.0.as_fd(), buf)
    }
}
impl Write for &Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        c_wrappers::write(self.0.as_fd(), buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
impl Read for Stream {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&mut &*self).read(buf)
    }
}
impl Write for Stream {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&mut &*self).write(buf)
    }
    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        (&mut &*self).flush()
    }
}

impl AsFd for Stream {
    #[inline]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}
impl From<Stream> for OwnedFd {
    #[inline]
    fn from(stream: Stream) -> Self {
        stream.0
    }
}

/// A listening, always-non-blocking bus transport socket.
///
/// Same ownership rules as [`Stream`].
#[derive(Debug)]
pub struct Listener(OwnedFd);

impl Listener {
    /// Accepts one pending connection.
    ///
    /// The accepted stream comes back non-blocking and close-on-exec regardless of this
    /// listener's own flags. Since the listener itself is non-blocking, an empty queue
    /// reports `EWOULDBLOCK` rather than waiting; readiness is the caller's I/O loop's
    /// business.
    pub fn accept(&self) -> Result<Stream, Error> {
        let conn = retry_on_intr(|| c_wrappers::accept(self.0.as_fd()))?;
        Ok(Stream(conn))
    }

    /// Queries the descriptor's file status flags for the non-blocking bit. Freshly
    /// produced listeners report `true`.
    pub fn is_nonblocking(&self) -> Result<bool, Error> {
        Ok(c_wrappers::get_nonblocking(self.0.as_fd())?)
    }
}

impl AsFd for Listener {
    #[inline]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}
impl From<Listener> for OwnedFd {
    #[inline]
    fn from(listener: Listener) -> Self {
        listener.0
    }
}
