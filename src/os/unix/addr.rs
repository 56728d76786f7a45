//! Socket address construction: `sockaddr_un` from paths and `sockaddr_in`/`sockaddr_in6`
//! from resolved host/port pairs.

use crate::error::{Error, ErrorKind};
use libc::{in6_addr, in_addr, sockaddr, sockaddr_in, sockaddr_in6, sockaddr_un, socklen_t};
use std::{
    mem::{size_of, zeroed},
    net::{SocketAddr, ToSocketAddrs},
    os::unix::ffi::OsStrExt,
    path::Path,
};

/// Bytes of `sun_path` usable for the actual path, leaving room for the nul terminator.
pub(crate) const SUN_PATH_CAPACITY: usize = {
    let addr = unsafe { zeroed::<sockaddr_un>() };
    addr.sun_path.len() - 1
};

/// Builds a `sockaddr_un` for the given path.
///
/// A path longer than the address structure can hold is truncated to [`SUN_PATH_CAPACITY`]
/// bytes rather than rejected, so both ends of an over-long name meet at the same
/// truncated address.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub(crate) fn sockaddr_un(path: &Path) -> sockaddr_un {
    let mut addr = unsafe { zeroed::<sockaddr_un>() };
    addr.sun_family = libc::AF_UNIX as _;
    let bytes = path.as_os_str().as_bytes();
    for (dst, src) in addr.sun_path.iter_mut().take(SUN_PATH_CAPACITY).zip(bytes) {
        *dst = *src as _;
    }
    addr
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn sockaddr_un_raw(addr: &sockaddr_un) -> (*const sockaddr, socklen_t) {
    (<*const _>::cast(addr), size_of::<sockaddr_un>() as socklen_t)
}

/// A resolved TCP socket address, in the form the socket calls consume.
pub(crate) enum TcpAddr {
    V4(sockaddr_in),
    V6(sockaddr_in6),
}

#[allow(clippy::cast_possible_truncation)]
impl TcpAddr {
    pub fn family(&self) -> libc::c_int {
        match self {
            Self::V4(..) => libc::AF_INET,
            Self::V6(..) => libc::AF_INET6,
        }
    }
    pub fn as_ptr(&self) -> *const sockaddr {
        match self {
            Self::V4(sin) => <*const _>::cast(sin),
            Self::V6(sin6) => <*const _>::cast(sin6),
        }
    }
    pub fn socklen(&self) -> socklen_t {
        match self {
            Self::V4(..) => size_of::<sockaddr_in>() as socklen_t,
            Self::V6(..) => size_of::<sockaddr_in6>() as socklen_t,
        }
    }
}

impl From<SocketAddr> for TcpAddr {
    #[allow(clippy::cast_possible_truncation)]
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => {
                let mut sin = unsafe { zeroed::<sockaddr_in>() };
                sin.sin_family = libc::AF_INET as _;
                sin.sin_port = v4.port().to_be();
                // Octets are already in network order, so a native-endian load keeps them
                // laid out correctly in memory.
                sin.sin_addr = in_addr { s_addr: u32::from_ne_bytes(v4.ip().octets()) };
                Self::V4(sin)
            }
            SocketAddr::V6(v6) => {
                let mut sin6 = unsafe { zeroed::<sockaddr_in6>() };
                sin6.sin6_family = libc::AF_INET6 as _;
                sin6.sin6_port = v6.port().to_be();
                sin6.sin6_addr = in6_addr { s6_addr: v6.ip().octets() };
                sin6.sin6_flowinfo = v6.flowinfo();
                sin6.sin6_scope_id = v6.scope_id();
                Self::V6(sin6)
            }
        }
    }
}

/// Resolves `host:port` to one usable address, preferring IPv4. An absent or empty host
/// falls back to `"localhost"`.
///
/// Resolution failure is kept apart from connection failure: it comes back as
/// [`ErrorKind::NoNetwork`] before any socket exists.
pub(crate) fn resolve_tcp(host: Option<&str>, port: u16) -> Result<TcpAddr, Error> {
    let host = match host {
        Some(host) if !host.is_empty() => host,
        _ => "localhost",
    };
    let addrs = (host, port).to_socket_addrs().map_err(|e| match e.raw_os_error() {
        Some(errno) => Error::with_raw_os_error(ErrorKind::NoNetwork, errno),
        None => Error::new(ErrorKind::NoNetwork),
    })?;
    let mut fallback = None;
    for addr in addrs {
        if addr.is_ipv4() {
            return Ok(TcpAddr::from(addr));
        }
        fallback.get_or_insert(addr);
    }
    match fallback {
        Some(addr) => Ok(TcpAddr::from(addr)),
        None => Err(Error::new(ErrorKind::NoNetwork)),
    }
}
