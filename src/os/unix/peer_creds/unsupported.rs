//! Stand-in for targets with no peer credential mechanism: the trust byte still travels,
//! so the wire protocol stays identical, but the peer always comes out unknown.

use crate::{
    credentials::Credentials,
    os::unix::{c_wrappers, unixprelude::*},
};
use std::io;
use tracing::debug;

pub(crate) fn send_trust_byte(fd: BorrowedFd<'_>) -> io::Result<usize> {
    c_wrappers::write(fd, &[0])
}

pub(crate) fn recv_trust_byte(
    fd: BorrowedFd<'_>,
    buf: &mut [u8; 1],
) -> io::Result<(usize, Credentials)> {
    let len = c_wrappers::read(fd, buf)?;
    if len > 0 {
        debug!("no peer credential mechanism on this platform");
    }
    Ok((len, Credentials::UNKNOWN))
}
