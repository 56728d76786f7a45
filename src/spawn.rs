//! Supervised launch of helper programs.
//!
//! Launching goes through a double fork: the immediate child exists only to detach the
//! real program from the caller's child list, so there is nothing left to reap once
//! [`SpawnRequest::spawn`] returns, no matter how long the program runs. A close-on-exec
//! pipe carries failure reports out of the forked processes, and end-of-file on it without
//! a report is the proof that the exec happened, because a successful exec is the only way
//! the write end closes without writing.

use crate::{
    error::{SpawnError, SpawnStage},
    os::unix::{c_wrappers, unixprelude::*},
    retry_on_intr,
};
use std::{
    ffi::CString,
    fmt::{self, Debug, Formatter},
    io,
    mem::size_of,
    ptr,
};
use tracing::{debug, warn};

/// One whole failure report: a stage tag and an OS error number, native-endian.
const REPORT_LEN: usize = 2 * size_of::<c_int>();

/// One launch: the argument vector, whose first element doubles as the path of the program
/// to execute, plus optional pre-exec setup.
pub struct SpawnRequest {
    argv: Vec<CString>,
    pre_exec: Option<Box<dyn FnMut() + Send>>,
}

impl SpawnRequest {
    /// Creates a request for the given argument vector. `argv[0]` names the program to
    /// execute, with no `PATH` search applied.
    ///
    /// Panics if `argv` is empty.
    pub fn new(argv: Vec<CString>) -> Self {
        assert!(!argv.is_empty(), "argument vector must at least name the program");
        Self { argv, pre_exec: None }
    }

    /// Registers a callback that runs in the forked process right before exec, for setup
    /// like working directory changes or descriptor redirection.
    ///
    /// # Safety
    /// The callback runs between `fork` and `exec`, same as
    /// [`CommandExt::pre_exec`](std::os::unix::process::CommandExt::pre_exec): it must
    /// confine itself to async-signal-safe operations, which in particular rules out
    /// allocation and locks.
    pub unsafe fn pre_exec(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.pre_exec = Some(Box::new(f));
        self
    }

    /// Launches the program, blocking only for the double-fork pipeline, never for the
    /// program's own lifetime.
    ///
    /// On success the program is definitely running: its exec has happened, and the
    /// process it runs in is already detached from the caller, leaving no zombie behind
    /// whenever it terminates. Failures before that point come back tagged with the stage
    /// they struck at; see [`SpawnError`].
    pub fn spawn(mut self) -> Result<(), SpawnError> {
        // Exec vectors are laid out before forking; between fork and exec nothing
        // allocates.
        let argv_ptrs: Vec<*const c_char> = self
            .argv
            .iter()
            .map(|arg| arg.as_ptr())
            .chain([ptr::null()])
            .collect();

        let (report_read, report_write) =
            c_wrappers::pipe().map_err(|e| SpawnError::PipeCreateFailed(e.into()))?;

        debug!(argv = ?self.argv, "launching detached program");
        match unsafe { c_wrappers::fork() } {
            Err(e) => Err(SpawnError::ForkFailed(e.into())),
            Ok(0) => unsafe {
                self.exec_detached(report_write.as_raw_fd(), report_read.as_raw_fd(), &argv_ptrs)
            },
            Ok(child) => {
                // The parent must not hold the write end, or EOF detection would hang on
                // our own descriptor.
                drop(report_write);
                reap(child);
                read_report(report_read)
            }
        }
    }

    /// Body of the immediate child: detach via a second fork, then exec in the grandchild.
    /// Never returns.
    ///
    /// # Safety
    /// Must be entered exactly once, in a freshly forked child of the process that built
    /// `self`, with `argv` pointing at a null-terminated vector that outlives the call.
    unsafe fn exec_detached(
        &mut self,
        report_fd: RawFd,
        read_end: RawFd,
        argv: &[*const c_char],
    ) -> ! {
        unsafe {
            // The grandchild gets default signal dispositions, not the daemon's.
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
            libc::close(read_end);
            match libc::fork() {
                -1 => write_report_and_exit(report_fd, SpawnStage::Fork),
                0 => {
                    if let Some(pre_exec) = &mut self.pre_exec {
                        pre_exec();
                    }
                    if let Some(&program) = argv.first() {
                        libc::execv(program, argv.as_ptr());
                    }
                    // Nothing here runs unless the exec failed.
                    write_report_and_exit(report_fd, SpawnStage::Exec)
                }
                _ => libc::_exit(0),
            }
        }
    }
}

impl Debug for SpawnRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnRequest")
            .field("argv", &self.argv)
            .field("pre_exec", &self.pre_exec.is_some())
            .finish()
    }
}

/// Process-globally ignores the broken pipe signal, so that writes to a hung-up peer
/// report an error instead of killing the process. Bus daemons call this once at startup;
/// spawned programs get the default disposition back before their exec.
pub fn disable_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

/// Waits for the immediate child, which exits right after its own fork. Interruptions are
/// retried; "no such child" means something else already collected it, which changes
/// nothing; any other failure is logged and deliberately ignored, because the report pipe
/// alone decides the outcome.
fn reap(child: pid_t) {
    match retry_on_intr(|| c_wrappers::waitpid(child)) {
        Ok(()) => {}
        Err(e) if e.raw_os_error() == Some(libc::ECHILD) => {
            debug!(pid = child, "child already collected elsewhere");
        }
        Err(e) => warn!(pid = child, error = %e, "waiting for the launch child failed"),
    }
}

/// Drains the report pipe. End-of-file with nothing read is the success condition; one
/// whole record is a child-reported failure; a short record means the report was lost
/// mid-write and is surfaced as its own failure rather than mistaken for success.
#[allow(clippy::arithmetic_side_effects)] // `filled` stays bounded by REPORT_LEN
pub(crate) fn read_report(report: OwnedFd) -> Result<(), SpawnError> {
    let mut buf = [0_u8; REPORT_LEN];
    let mut filled = 0_usize;
    while filled < REPORT_LEN {
        let Some(chunk) = buf.get_mut(filled..) else {
            break;
        };
        let len = match retry_on_intr(|| c_wrappers::read(report.as_fd(), chunk)) {
            Ok(len) => len,
            Err(e) => return Err(SpawnError::ReportReadFailed(e.into())),
        };
        if len == 0 {
            break;
        }
        filled += len;
    }
    match filled {
        0 => Ok(()),
        REPORT_LEN => {
            drain_excess(&report);
            let (stage, errno) = buf.split_at(size_of::<c_int>());
            Err(SpawnError::ChildReportedFailure {
                stage: SpawnStage::from_raw(report_int(stage)),
                errno: report_int(errno),
            })
        }
        partial => Err(SpawnError::TruncatedReport(partial)),
    }
}

/// Consumes whatever follows the first whole record. Trailing data is untrusted and only
/// counted; the outcome is already decided by the record.
#[allow(clippy::arithmetic_side_effects)]
fn drain_excess(report: &OwnedFd) {
    let mut sink = [0_u8; 64];
    let mut discarded = 0_usize;
    loop {
        match retry_on_intr(|| c_wrappers::read(report.as_fd(), &mut sink)) {
            Ok(0) | Err(_) => break,
            Ok(len) => discarded += len,
        }
    }
    if discarded > 0 {
        warn!(bytes = discarded, "discarded data past the first failure report");
    }
}

fn report_int(chunk: &[u8]) -> c_int {
    let mut bytes = [0_u8; size_of::<c_int>()];
    bytes.copy_from_slice(chunk);
    c_int::from_ne_bytes(bytes)
}

/// Writes the fixed (stage, errno) record and terminates with no cleanup whatsoever. This
/// is as far as a failed forked process gets.
fn write_report_and_exit(report_fd: RawFd, stage: SpawnStage) -> ! {
    let errno = io::Error::last_os_error().raw_os_error().unwrap_or(0);
    let mut record = [0_u8; REPORT_LEN];
    let (stage_bytes, errno_bytes) = record.split_at_mut(size_of::<c_int>());
    stage_bytes.copy_from_slice(&stage.to_raw().to_ne_bytes());
    errno_bytes.copy_from_slice(&errno.to_ne_bytes());
    unsafe {
        loop {
            if libc::write(report_fd, record.as_ptr().cast(), record.len()) >= 0 {
                break;
            }
            if io::Error::last_os_error().kind() != io::ErrorKind::Interrupted {
                break;
            }
        }
        libc::_exit(1)
    }
}
