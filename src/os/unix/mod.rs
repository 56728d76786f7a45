//! Unix implementation internals: thin syscall wrappers, socket address construction and
//! the per-platform peer credential mechanisms.

pub(crate) mod addr;
pub(crate) mod c_wrappers;
pub(crate) mod peer_creds;

pub(crate) mod unixprelude {
    pub use libc::{c_char, c_int, gid_t, pid_t, uid_t};
    pub use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
}
