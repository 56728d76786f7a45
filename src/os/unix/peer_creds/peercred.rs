//! Peer credentials through the `SO_PEERCRED` socket option: the kernel records who created
//! the connection, and either end can query it at any point afterwards. The trust byte
//! itself is plain data here.

use crate::{
    credentials::Credentials,
    os::unix::{c_wrappers, unixprelude::*},
};
use std::io;
use tracing::debug;

#[cfg(target_os = "openbsd")]
use libc::sockpeercred as RawCred;
#[cfg(not(target_os = "openbsd"))]
use libc::ucred as RawCred;

pub(crate) fn send_trust_byte(fd: BorrowedFd<'_>) -> io::Result<usize> {
    c_wrappers::write(fd, &[0])
}

pub(crate) fn recv_trust_byte(
    fd: BorrowedFd<'_>,
    buf: &mut [u8; 1],
) -> io::Result<(usize, Credentials)> {
    let len = c_wrappers::read(fd, buf)?;
    if len == 0 {
        return Ok((0, Credentials::UNKNOWN));
    }
    let creds = match unsafe {
        c_wrappers::getsockopt::<RawCred>(fd, libc::SOL_SOCKET, libc::SO_PEERCRED)
    } {
        Ok(cred) => Credentials {
            pid: Some(cred.pid),
            uid: Some(cred.uid),
            gid: Some(cred.gid),
        },
        Err(e) => {
            debug!("SO_PEERCRED query failed: {e}");
            Credentials::UNKNOWN
        }
    };
    Ok((len, creds))
}
