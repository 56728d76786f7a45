//! Thin wrappers over the libc calls this crate is built on. Policy lives in the callers;
//! the wrappers only translate the C error convention into `io::Result` and take care of
//! close-on-exec, which every descriptor created here carries from birth.

use super::unixprelude::*;
use crate::{FdOrErrno, OrErrno};
use std::{ffi::c_void, io, ptr};

pub(crate) fn socket(domain: c_int, ty: c_int) -> io::Result<OwnedFd> {
    #[cfg(target_os = "linux")]
    let ty = ty | libc::SOCK_CLOEXEC;
    let fd = unsafe { libc::socket(domain, ty, 0) }.fd_or_errno()?;
    let fd = unsafe { OwnedFd::from_raw_fd(fd) };
    #[cfg(not(target_os = "linux"))]
    set_cloexec(fd.as_fd())?;
    Ok(fd)
}

pub(crate) fn socket_pair() -> io::Result<(OwnedFd, OwnedFd)> {
    let ty = libc::SOCK_STREAM;
    #[cfg(target_os = "linux")]
    let ty = ty | libc::SOCK_CLOEXEC;
    let mut fds: [c_int; 2] = [-1; 2];
    unsafe { libc::socketpair(libc::AF_UNIX, ty, 0, fds.as_mut_ptr()) != -1 }
        .true_val_or_errno(())?;
    let [a, b] = fds.map(|fd| unsafe { OwnedFd::from_raw_fd(fd) });
    #[cfg(not(target_os = "linux"))]
    {
        set_cloexec(a.as_fd())?;
        set_cloexec(b.as_fd())?;
    }
    Ok((a, b))
}

pub(crate) fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds: [c_int; 2] = [-1; 2];
    #[cfg(target_os = "linux")]
    let success = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) != -1 };
    #[cfg(not(target_os = "linux"))]
    let success = unsafe { libc::pipe(fds.as_mut_ptr()) != -1 };
    success.true_val_or_errno(())?;
    let [rx, tx] = fds.map(|fd| unsafe { OwnedFd::from_raw_fd(fd) });
    #[cfg(not(target_os = "linux"))]
    {
        set_cloexec(rx.as_fd())?;
        set_cloexec(tx.as_fd())?;
    }
    Ok((rx, tx))
}

/// # Safety
/// `addr` must point to a valid socket address structure of `len` bytes whose family
/// matches the socket's.
pub(crate) unsafe fn bind(
    fd: BorrowedFd<'_>,
    addr: *const libc::sockaddr,
    len: libc::socklen_t,
) -> io::Result<()> {
    unsafe { libc::bind(fd.as_raw_fd(), addr, len) != -1 }.true_val_or_errno(())
}

/// Issues `connect`, absorbing interruptions. An interrupted attempt keeps progressing in
/// the kernel, so the retry treats `EALREADY` as still-in-flight and `EISCONN` as
/// completion instead of as failures.
///
/// # Safety
/// Same contract as [`bind`].
pub(crate) unsafe fn connect(
    fd: BorrowedFd<'_>,
    addr: *const libc::sockaddr,
    len: libc::socklen_t,
) -> io::Result<()> {
    let mut interrupted = false;
    loop {
        if unsafe { libc::connect(fd.as_raw_fd(), addr, len) } != -1 {
            return Ok(());
        }
        let e = io::Error::last_os_error();
        match e.raw_os_error() {
            Some(libc::EINTR) => interrupted = true,
            Some(libc::EALREADY) if interrupted => {}
            Some(libc::EISCONN) if interrupted => return Ok(()),
            _ => return Err(e),
        }
    }
}

pub(crate) fn listen(fd: BorrowedFd<'_>, backlog: c_int) -> io::Result<()> {
    unsafe { libc::listen(fd.as_raw_fd(), backlog) != -1 }.true_val_or_errno(())
}

/// Accepts one pending connection, discarding the peer address. The returned descriptor
/// is close-on-exec and non-blocking regardless of the listening socket's flags.
pub(crate) fn accept(fd: BorrowedFd<'_>) -> io::Result<OwnedFd> {
    #[cfg(target_os = "linux")]
    {
        let conn = unsafe {
            libc::accept4(
                fd.as_raw_fd(),
                ptr::null_mut(),
                ptr::null_mut(),
                libc::SOCK_CLOEXEC | libc::SOCK_NONBLOCK,
            )
        }
        .fd_or_errno()?;
        Ok(unsafe { OwnedFd::from_raw_fd(conn) })
    }
    #[cfg(not(target_os = "linux"))]
    {
        let conn = unsafe { libc::accept(fd.as_raw_fd(), ptr::null_mut(), ptr::null_mut()) }
            .fd_or_errno()?;
        let conn = unsafe { OwnedFd::from_raw_fd(conn) };
        set_cloexec(conn.as_fd())?;
        set_nonblocking(conn.as_fd(), true)?;
        Ok(conn)
    }
}

#[allow(clippy::cast_sign_loss)] // negative returns are rerouted to the error path
pub(crate) fn read(fd: BorrowedFd<'_>, buf: &mut [u8]) -> io::Result<usize> {
    let ret = unsafe { libc::read(fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
    (ret != -1).true_val_or_errno(ret as usize)
}

#[allow(clippy::cast_sign_loss)]
pub(crate) fn write(fd: BorrowedFd<'_>, buf: &[u8]) -> io::Result<usize> {
    let ret = unsafe { libc::write(fd.as_raw_fd(), buf.as_ptr().cast(), buf.len()) };
    (ret != -1).true_val_or_errno(ret as usize)
}

/// # Safety
/// `msg` must describe valid, live buffers.
#[cfg(ub_cmsgcred)]
#[allow(clippy::cast_sign_loss)]
pub(crate) unsafe fn sendmsg(fd: BorrowedFd<'_>, msg: &libc::msghdr) -> io::Result<usize> {
    let ret = unsafe { libc::sendmsg(fd.as_raw_fd(), msg, 0) };
    (ret != -1).true_val_or_errno(ret as usize)
}

/// # Safety
/// Same contract as [`sendmsg`].
#[cfg(ub_cmsgcred)]
#[allow(clippy::cast_sign_loss)]
pub(crate) unsafe fn recvmsg(fd: BorrowedFd<'_>, msg: &mut libc::msghdr) -> io::Result<usize> {
    let ret = unsafe { libc::recvmsg(fd.as_raw_fd(), msg, 0) };
    (ret != -1).true_val_or_errno(ret as usize)
}

/// # Safety
/// `T` must be a plain-data type which the given socket option fills in completely.
#[cfg(ub_peercred)]
#[allow(clippy::cast_possible_truncation)]
pub(crate) unsafe fn getsockopt<T>(fd: BorrowedFd<'_>, level: c_int, name: c_int) -> io::Result<T> {
    let mut val = std::mem::MaybeUninit::<T>::uninit();
    let mut len = std::mem::size_of::<T>() as libc::socklen_t;
    unsafe {
        libc::getsockopt(fd.as_raw_fd(), level, name, val.as_mut_ptr().cast(), &mut len) != -1
    }
    .true_val_or_errno(())?;
    Ok(unsafe { val.assume_init() })
}

pub(crate) fn set_nonblocking(fd: BorrowedFd<'_>, nonblocking: bool) -> io::Result<()> {
    let old_flags = get_status_flags(fd)?;
    let new_flags = if nonblocking {
        old_flags | libc::O_NONBLOCK
    } else {
        old_flags & !libc::O_NONBLOCK
    };
    unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFL, new_flags) != -1 }.true_val_or_errno(())
}

pub(crate) fn get_nonblocking(fd: BorrowedFd<'_>) -> io::Result<bool> {
    Ok(get_status_flags(fd)? & libc::O_NONBLOCK != 0)
}

fn get_status_flags(fd: BorrowedFd<'_>) -> io::Result<c_int> {
    // The third argument is unused by F_GETFL, but fcntl is variadic with a pointer-sized
    // slot, so pass a null pointer rather than nothing.
    let ret = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFL, ptr::null::<c_void>()) };
    (ret != -1).true_val_or_errno(ret)
}

#[cfg(not(target_os = "linux"))]
fn get_fdflags(fd: BorrowedFd<'_>) -> io::Result<c_int> {
    let ret = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFD, 0) };
    (ret != -1).true_val_or_errno(ret)
}
#[cfg(not(target_os = "linux"))]
fn set_fdflags(fd: BorrowedFd<'_>, flags: c_int) -> io::Result<()> {
    unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, flags) != -1 }.true_val_or_errno(())
}
#[cfg(not(target_os = "linux"))]
fn set_cloexec(fd: BorrowedFd<'_>) -> io::Result<()> {
    set_fdflags(fd, get_fdflags(fd)? | libc::FD_CLOEXEC)
}

/// # Safety
/// The caller becomes responsible for the entire existence of the child process. In
/// particular, in the child the caller must confine itself to async-signal-safe operations
/// and leave via `exec` or `_exit`.
pub(crate) unsafe fn fork() -> io::Result<pid_t> {
    let ret = unsafe { libc::fork() };
    (ret != -1).true_val_or_errno(ret)
}

/// Waits for the given child to terminate, discarding its exit status.
pub(crate) fn waitpid(pid: pid_t) -> io::Result<()> {
    unsafe { libc::waitpid(pid, ptr::null_mut(), 0) != -1 }.true_val_or_errno(())
}

pub(crate) fn get_pid() -> pid_t {
    unsafe { libc::getpid() }
}
pub(crate) fn get_uid() -> uid_t {
    unsafe { libc::getuid() }
}
pub(crate) fn get_gid() -> gid_t {
    unsafe { libc::getgid() }
}
