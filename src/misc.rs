use std::{io, os::unix::io::RawFd, sync::PoisonError};

pub(crate) static LOCK_POISON: &str = "unexpected lock poison";
pub(crate) fn poison_error<T>(_: PoisonError<T>) -> io::Error {
    io::Error::other(LOCK_POISON)
}

pub(crate) trait OrErrno<T>: Sized {
    fn true_or_errno(self, f: impl FnOnce() -> T) -> io::Result<T>;
    #[inline(always)]
    fn true_val_or_errno(self, value: T) -> io::Result<T> {
        self.true_or_errno(|| value)
    }
}
impl<T> OrErrno<T> for bool {
    #[inline]
    fn true_or_errno(self, f: impl FnOnce() -> T) -> io::Result<T> {
        if self {
            Ok(f())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

pub(crate) trait FdOrErrno: Sized {
    fn fd_or_errno(self) -> io::Result<Self>;
}
impl FdOrErrno for RawFd {
    #[inline]
    fn fd_or_errno(self) -> io::Result<Self> {
        (self != -1).true_val_or_errno(self)
    }
}

/// Reissues the given call for as long as it reports `EINTR`, per the blanket policy that
/// interrupted system calls never surface out of this crate.
pub(crate) fn retry_on_intr<T>(mut f: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match f() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            els => return els,
        }
    }
}
