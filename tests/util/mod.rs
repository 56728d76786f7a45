//! Test utilities: fresh endpoints for listeners to claim and patience loops for the
//! non-blocking descriptors everything in this crate hands out.
#![allow(dead_code, unused_macros)]

#[macro_use]
mod eyre;
#[macro_use]
mod namegen;
mod xorshift;

#[allow(unused_imports)]
pub use {eyre::*, namegen::*, xorshift::*};

use crate::{
    error::{Error, ErrorKind},
    transport::{self, Listener, Stream},
};
use color_eyre::eyre::{bail, WrapErr};
use std::{io::Read, thread::sleep, time::Duration};

pub fn testinit() {
    eyre::install();
}

/// Retry cadence for non-blocking descriptors: how many "would block" rounds to sit
/// through, and how long to sleep between them.
pub const PATIENCE_LIMIT: u32 = 200;
pub const PATIENCE_STEP: Duration = Duration::from_millis(5);

/// Whether the error is the non-blocking "come back later" answer. The taxonomy files it
/// under the catch-all kind, so the retained OS error number is what identifies it.
pub fn is_would_block(e: &Error) -> bool {
    let errno = e.raw_os_error();
    errno == Some(libc::EAGAIN) || errno == Some(libc::EWOULDBLOCK)
}

/// Accepts one connection, sleeping through "would block" rounds until the client shows up
/// in the queue.
pub fn accept_with_patience(listener: &Listener) -> TestResult<Stream> {
    for _ in 0..PATIENCE_LIMIT {
        match listener.accept() {
            Ok(conn) => return Ok(conn),
            Err(e) if is_would_block(&e) => sleep(PATIENCE_STEP),
            Err(e) => return Err(e).context("accept failed"),
        }
    }
    bail!("no connection arrived within the patience limit")
}

/// Reads until `buf` is full. The streams under test are all non-blocking, so a plain
/// `read_exact` would error out the moment the buffer runs dry.
pub fn read_exactly(mut conn: &Stream, buf: &mut [u8]) -> TestResult<()> {
    let mut filled = 0;
    let mut patience = PATIENCE_LIMIT;
    while filled < buf.len() {
        match conn.read(&mut buf[filled..]) {
            Ok(0) => bail!("peer hung up after {filled} of {} bytes", buf.len()),
            Ok(len) => filled += len,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                patience -= 1;
                if patience == 0 {
                    bail!("receive stalled at {filled} of {} bytes", buf.len());
                }
                sleep(PATIENCE_STEP);
            }
            Err(e) => return Err(e).context("receive failed"),
        }
    }
    Ok(())
}

/// Binds a listener on a fresh socket path, skipping past collisions with names some other
/// test got to first.
pub fn listen_and_pick_name(namegen: &mut NameGen) -> TestResult<(String, Listener)> {
    use ErrorKind::*;
    namegen
        .find_map(|name| match transport::listen_unix(&name) {
            Ok(listener) => Some(Ok((name, listener))),
            Err(e) if matches!(e.kind(), AddressInUse | AccessDenied) => {
                eprintln!("\"{}\", skipping", e.kind());
                None
            }
            Err(e) => Some(Err(e)),
        })
        .unwrap() // Infinite iterator
        .context("listener bind failed")
}

/// Claims a free TCP port by listening on successive candidates until one binds.
pub fn pick_tcp_listener(id: &'static str) -> TestResult<(u16, Listener)> {
    use ErrorKind::*;
    let mut rng = Xorshift32::from_id(id);
    for _ in 0..PATIENCE_LIMIT {
        let port = 20000 + (rng.next() % 20000) as u16;
        match transport::listen_tcp(None, port) {
            Ok(listener) => return Ok((port, listener)),
            Err(e) if matches!(e.kind(), AddressInUse | AccessDenied) => {
                eprintln!("port {port}: \"{}\", skipping", e.kind());
            }
            Err(e) => return Err(e).context("TCP listener bind failed"),
        }
    }
    bail!("no free TCP port found within the patience limit")
}
