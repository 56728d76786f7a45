//! Peer credentials through `SCM_CREDS` ancillary data, as done on FreeBSD and DragonFly
//! BSD: the kernel stamps a `cmsgcred` onto the message carrying the trust byte, so the
//! credentials ride on the same receive that picks the byte up.

use crate::{
    credentials::Credentials,
    os::unix::{c_wrappers, unixprelude::*},
};
use libc::{cmsgcred, cmsghdr, msghdr, CMSG_DATA, CMSG_FIRSTHDR, SCM_CREDS, SOL_SOCKET};
use std::{
    io,
    mem::{size_of, zeroed},
};
use tracing::debug;

// libc's CMSG_SPACE and CMSG_LEN aren't const, so mirror the kernel's register-sized
// alignment here.
const ALIGN: usize = size_of::<libc::c_long>();
const fn cmsg_align(len: usize) -> usize {
    (len + ALIGN - 1) & !(ALIGN - 1)
}
const CMSG_LEN_CRED: usize = cmsg_align(size_of::<cmsghdr>()) + size_of::<cmsgcred>();
const CMSG_SPACE_CRED: usize = cmsg_align(size_of::<cmsghdr>()) + cmsg_align(size_of::<cmsgcred>());

#[repr(C)]
struct ControlBuf {
    // Aligns the byte storage for direct cmsghdr access.
    _align: [cmsghdr; 0],
    buf: [u8; CMSG_SPACE_CRED],
}

fn credential_msghdr(iov: &mut libc::iovec, control: &mut ControlBuf) -> msghdr {
    let mut msg = unsafe { zeroed::<msghdr>() };
    msg.msg_iov = iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.buf.as_mut_ptr().cast();
    msg.msg_controllen = CMSG_SPACE_CRED as _;
    msg
}

pub(crate) fn send_trust_byte(fd: BorrowedFd<'_>) -> io::Result<usize> {
    let byte = [0_u8];
    let mut iov = libc::iovec {
        iov_base: byte.as_ptr().cast_mut().cast(),
        iov_len: 1,
    };
    let mut control = unsafe { zeroed::<ControlBuf>() };
    let msg = credential_msghdr(&mut iov, &mut control);
    // The payload of the credentials message is filled in by the kernel on the way out;
    // the header merely requests that.
    let hdr = unsafe { CMSG_FIRSTHDR(&msg) };
    unsafe {
        (*hdr).cmsg_len = CMSG_LEN_CRED as _;
        (*hdr).cmsg_level = SOL_SOCKET;
        (*hdr).cmsg_type = SCM_CREDS;
    }
    unsafe { c_wrappers::sendmsg(fd, &msg) }
}

pub(crate) fn recv_trust_byte(
    fd: BorrowedFd<'_>,
    buf: &mut [u8; 1],
) -> io::Result<(usize, Credentials)> {
    let mut iov = libc::iovec {
        iov_base: buf.as_mut_ptr().cast(),
        iov_len: 1,
    };
    let mut control = unsafe { zeroed::<ControlBuf>() };
    let mut msg = credential_msghdr(&mut iov, &mut control);
    let len = unsafe { c_wrappers::recvmsg(fd, &mut msg) }?;
    if len == 0 {
        return Ok((0, Credentials::UNKNOWN));
    }
    let creds = unsafe { parse_creds(&msg) };
    Ok((len, creds))
}

/// # Safety
/// `msg` must have just been filled in by a successful `recvmsg` call, with its control
/// buffer still alive.
unsafe fn parse_creds(msg: &msghdr) -> Credentials {
    let hdr = unsafe { CMSG_FIRSTHDR(msg) };
    if hdr.is_null() {
        debug!("no ancillary data arrived with the trust byte");
        return Credentials::UNKNOWN;
    }
    let hdr = unsafe { &*hdr };
    if hdr.cmsg_level != SOL_SOCKET
        || hdr.cmsg_type != SCM_CREDS
        || (hdr.cmsg_len as usize) < CMSG_LEN_CRED
    {
        debug!("malformed credentials message arrived with the trust byte");
        return Credentials::UNKNOWN;
    }
    let cred = unsafe { CMSG_DATA(hdr).cast::<cmsgcred>().read_unaligned() };
    // The effective gid leads the supplementary group array.
    let gid = if cred.cmcred_ngroups > 0 {
        cred.cmcred_groups.first().copied()
    } else {
        None
    };
    Credentials {
        pid: Some(cred.cmcred_pid),
        uid: Some(cred.cmcred_euid),
        gid,
    }
}
