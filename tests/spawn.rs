//! The supervised launch pipeline and its failure reporting.

use crate::{
    error::{SpawnError, SpawnStage},
    os::unix::c_wrappers,
    spawn::{self, SpawnRequest},
    tests::util::*,
};
use color_eyre::eyre::{bail, ensure, WrapErr};
use std::{ffi::CString, fs, mem::size_of, os::unix::io::AsFd, path::Path};

fn cstr_args(args: &[&str]) -> TestResult<Vec<CString>> {
    args.iter().map(|arg| CString::new(*arg).context("NUL in argument")).collect()
}

// Everything that forks lives in one test: the closing sweep for stray children must not
// race another test's fork window, and the harness runs separate tests concurrently.
#[test]
fn launch_pipeline() -> TestResult {
    testinit();
    successful_launch()?;
    missing_binary()?;
    pre_exec_runs_in_the_forked_process()?;
    ensure_no_waitable_children()
}

fn successful_launch() -> TestResult {
    SpawnRequest::new(cstr_args(&["/bin/true"])?)
        .spawn()
        .context("launching /bin/true failed")
}

fn missing_binary() -> TestResult {
    let Err(e) = SpawnRequest::new(cstr_args(&["/surely/no/such/binary"])?).spawn() else {
        bail!("launching a nonexistent binary succeeded");
    };
    match e {
        SpawnError::ChildReportedFailure { stage, errno } => {
            ensure_eq!(stage, SpawnStage::Exec);
            ensure_eq!(errno, libc::ENOENT);
        }
        els => bail!("expected a child failure report, got: {els}"),
    }
    Ok(())
}

fn pre_exec_runs_in_the_forked_process() -> TestResult {
    let flag = format!("/tmp/underbus-test-{:08x}.flag", Xorshift32::from_id(make_id!()).next());
    let flag_c = CString::new(flag.clone())?;

    let request = SpawnRequest::new(cstr_args(&["/bin/true"])?);
    let request = unsafe {
        request.pre_exec(move || unsafe {
            let fd = libc::open(
                flag_c.as_ptr(),
                libc::O_WRONLY | libc::O_CREAT | libc::O_EXCL,
                0o600 as libc::c_uint,
            );
            if fd >= 0 {
                libc::close(fd);
            }
        })
    };
    request.spawn().context("launching with a pre-exec callback failed")?;

    // The report pipe hits end-of-file only at the exec, which the callback runs before,
    // so a successful spawn means the flag is already in place.
    ensure!(Path::new(&flag).exists(), "the pre-exec flag file never appeared");
    fs::remove_file(&flag).context("flag file cleanup failed")?;
    Ok(())
}

fn ensure_no_waitable_children() -> TestResult {
    // A detached launch leaves nothing behind for wait() to find, running or exited.
    match unsafe { libc::waitpid(-1, std::ptr::null_mut(), libc::WNOHANG) } {
        0 => bail!("an unwaited child is still alive"),
        -1 => {
            let e = std::io::Error::last_os_error();
            ensure_eq!(e.raw_os_error(), Some(libc::ECHILD));
            Ok(())
        }
        pid => bail!("process {pid} was left waitable"),
    }
}

#[test]
fn report_channel_policies() -> TestResult {
    testinit();
    // End-of-file with no report is the success condition.
    let (read_end, write_end) = c_wrappers::pipe().context("pipe creation failed")?;
    drop(write_end);
    ensure!(spawn::read_report(read_end).is_ok(), "bare EOF was not read as success");

    // A short record is reported as truncation, not mistaken for either outcome.
    let (read_end, write_end) = c_wrappers::pipe().context("pipe creation failed")?;
    let half = vec![0_u8; size_of::<libc::c_int>()];
    c_wrappers::write(write_end.as_fd(), &half).context("report write failed")?;
    drop(write_end);
    match spawn::read_report(read_end) {
        Err(SpawnError::TruncatedReport(len)) => ensure_eq!(len, size_of::<libc::c_int>()),
        els => bail!("expected a truncation report, got: {els:?}"),
    }

    // One whole record decodes into the reporting process's stage and errno.
    let (read_end, write_end) = c_wrappers::pipe().context("pipe creation failed")?;
    let mut record = Vec::new();
    record.extend_from_slice(&SpawnStage::Exec.to_raw().to_ne_bytes());
    record.extend_from_slice(&libc::ENOENT.to_ne_bytes());
    c_wrappers::write(write_end.as_fd(), &record).context("report write failed")?;
    drop(write_end);
    match spawn::read_report(read_end) {
        Err(SpawnError::ChildReportedFailure { stage, errno }) => {
            ensure_eq!(stage, SpawnStage::Exec);
            ensure_eq!(errno, libc::ENOENT);
        }
        els => bail!("expected a decoded failure report, got: {els:?}"),
    }

    // Trailing data past the record is discarded, not trusted: the first record wins.
    let (read_end, write_end) = c_wrappers::pipe().context("pipe creation failed")?;
    record.extend_from_slice(b"garbage that must not change the verdict");
    c_wrappers::write(write_end.as_fd(), &record).context("report write failed")?;
    drop(write_end);
    match spawn::read_report(read_end) {
        Err(SpawnError::ChildReportedFailure { stage, errno }) => {
            ensure_eq!(stage, SpawnStage::Exec);
            ensure_eq!(errno, libc::ENOENT);
        }
        els => bail!("expected a decoded failure report, got: {els:?}"),
    }
    Ok(())
}
