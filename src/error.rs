//! The error taxonomy shared by every fallible operation in this crate.
//!
//! OS error numbers are folded into the small, closed set of [`ErrorKind`]s through one
//! fixed, total translation table. The raw number is retained alongside the kind for
//! diagnostics and for callers that need to distinguish finer than the taxonomy does.

use libc::c_int;
use std::{
    fmt::{self, Display, Formatter},
    io,
};
use thiserror::Error;

/// Classification of a failed transport, credential or lookup operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// The operation, protocol or address family isn't supported here.
    NotSupported,
    /// The OS denied permission.
    AccessDenied,
    /// The kernel ran out of memory, buffer space or descriptor table room.
    NoMemory,
    /// Nothing is listening at the target address.
    NoServer,
    /// The attempt timed out.
    Timeout,
    /// The network is unreachable, or the hostname could not be resolved at all.
    NoNetwork,
    /// The listen address is already taken.
    AddressInUse,
    /// The filesystem object or directory entry does not exist, or unexpectedly does.
    FileNotFound,
    /// Failure that fits no other kind.
    Failed,
}

impl ErrorKind {
    /// Translates an OS error number through the fixed table. Values without a row of their
    /// own fall through to [`Failed`](Self::Failed).
    pub fn from_raw_os_error(errno: c_int) -> Self {
        match errno {
            libc::EPROTONOSUPPORT | libc::EAFNOSUPPORT => Self::NotSupported,
            // Descriptor table exhaustion counts as resource exhaustion, same as the
            // kernel running out of buffer space.
            libc::ENFILE | libc::EMFILE => Self::NoMemory,
            libc::EACCES | libc::EPERM => Self::AccessDenied,
            libc::ENOBUFS | libc::ENOMEM => Self::NoMemory,
            libc::EINVAL | libc::EBADF | libc::EFAULT | libc::ENOTSOCK | libc::EISCONN => {
                Self::Failed
            }
            libc::ECONNREFUSED => Self::NoServer,
            libc::ETIMEDOUT => Self::Timeout,
            libc::ENETUNREACH => Self::NoNetwork,
            libc::EADDRINUSE => Self::AddressInUse,
            libc::EEXIST | libc::ENOENT => Self::FileNotFound,
            _ => Self::Failed,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::NotSupported => "not supported",
            Self::AccessDenied => "access denied",
            Self::NoMemory => "out of memory",
            Self::NoServer => "no server",
            Self::Timeout => "timed out",
            Self::NoNetwork => "no network",
            Self::AddressInUse => "address in use",
            Self::FileNotFound => "file not found",
            Self::Failed => "failed",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a transport, credential or lookup operation: a taxonomy kind plus the OS
/// error number it was derived from, when there was one.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    errno: Option<c_int>,
}

impl Error {
    /// Creates an error of the given kind with no OS error number attached.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, errno: None }
    }
    /// Classifies the given OS error number through the fixed table and remembers it.
    pub fn from_raw_os_error(errno: c_int) -> Self {
        Self {
            kind: ErrorKind::from_raw_os_error(errno),
            errno: Some(errno),
        }
    }
    /// Forces the given kind while still remembering the OS error number.
    pub fn with_raw_os_error(kind: ErrorKind, errno: c_int) -> Self {
        Self { kind, errno: Some(errno) }
    }

    /// The taxonomy kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
    /// The originating OS error number, if the error came from a failed OS call.
    pub fn raw_os_error(&self) -> Option<c_int> {
        self.errno
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        match e.raw_os_error() {
            Some(errno) => Self::from_raw_os_error(errno),
            None => Self::new(ErrorKind::Failed),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.errno {
            Some(errno) => write!(f, "{}: {}", self.kind, io::Error::from_raw_os_error(errno)),
            None => Display::fmt(&self.kind, f),
        }
    }
}
impl std::error::Error for Error {}

/// Failure of the credential handshake.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The peer hung up before the handshake byte went through.
    #[error("peer closed the connection during the credentials handshake")]
    PeerClosed,
    /// The first byte on the wire was not the expected zero.
    #[error("credentials byte was {0:#04x} instead of zero")]
    ProtocolViolation(u8),
    /// The underlying send or receive failed outright.
    #[error("credentials handshake I/O failed")]
    Transport(#[from] Error),
}

/// Which step of the launch pipeline a child failure report points at.
///
/// The raw values are the on-pipe encoding. This layer itself only ever reports
/// [`Exec`](Self::Exec) and [`Fork`](Self::Fork); the remaining tags are reserved for
/// pre-exec callbacks that adopt the same reporting convention.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SpawnStage {
    /// Changing the working directory failed.
    Chdir,
    /// Replacing the process image failed.
    Exec,
    /// Redirecting a standard descriptor failed.
    Dup2,
    /// The detaching fork failed.
    Fork,
    /// The report carried a tag this version doesn't know about.
    Unrecognized(c_int),
}

impl SpawnStage {
    /// The tag this stage is encoded as on the report pipe.
    pub const fn to_raw(self) -> c_int {
        match self {
            Self::Chdir => 0,
            Self::Exec => 1,
            Self::Dup2 => 2,
            Self::Fork => 3,
            Self::Unrecognized(raw) => raw,
        }
    }
    /// Decodes a report pipe tag. Unknown values are preserved, not rejected.
    pub fn from_raw(raw: c_int) -> Self {
        match raw {
            0 => Self::Chdir,
            1 => Self::Exec,
            2 => Self::Dup2,
            3 => Self::Fork,
            els => Self::Unrecognized(els),
        }
    }
}

impl Display for SpawnStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chdir => f.write_str("chdir"),
            Self::Exec => f.write_str("exec"),
            Self::Dup2 => f.write_str("dup2"),
            Self::Fork => f.write_str("fork"),
            Self::Unrecognized(raw) => write!(f, "unrecognized stage {raw}"),
        }
    }
}

/// Failure of a supervised launch.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// Creating the error reporting pipe failed.
    #[error("could not create the error reporting pipe")]
    PipeCreateFailed(#[source] Error),
    /// The first fork failed, before any child existed.
    #[error("could not fork")]
    ForkFailed(#[source] Error),
    /// A forked process reported failure before it could finish launching.
    #[error("child process failed in {stage}: {}", io::Error::from_raw_os_error(*errno))]
    ChildReportedFailure {
        /// Pipeline step the report points at.
        stage: SpawnStage,
        /// OS error number captured by the failing process.
        errno: c_int,
    },
    /// A failure report began but was cut short of one whole record, so neither success
    /// nor a specific failure can be claimed.
    #[error("child failure report truncated at {0} bytes")]
    TruncatedReport(usize),
    /// Reading the error reporting pipe failed, leaving the outcome unknowable.
    #[error("could not read the error reporting pipe")]
    ReportReadFailed(#[source] Error),
}
