//! The credential handshake that gates admission to the bus.
//!
//! Immediately after the transport-level connection, the initiating side sends a single
//! zero byte and the accepting side reads it, with whatever peer credential collection the
//! platform offers riding on that read. The byte's only job is to give the OS a definite
//! moment at which to attest who is on the other end; admission itself is the caller's
//! decision, typically through [`Credentials::matches`].
//!
//! The wire format is one octet of value zero, nothing more, optionally paired at the OS
//! level with an ancillary credentials message on the same receive.

use crate::{
    credentials::Credentials,
    error::{AuthError, Error},
    os::unix::peer_creds,
    retry_on_intr,
    transport::Stream,
};
use std::os::unix::io::AsFd;
use tracing::debug;

/// Sends the trust byte over a freshly connected stream.
///
/// Interrupted writes are retried. A write the OS completes with zero bytes means the peer
/// is already gone and fails with [`AuthError::PeerClosed`]. On platforms whose credential
/// mechanism rides on the message itself, the matching ancillary payload is attached here.
pub fn send_credentials(conn: &Stream) -> Result<(), AuthError> {
    let sent = retry_on_intr(|| peer_creds::send_trust_byte(conn.as_fd())).map_err(Error::from)?;
    if sent == 0 {
        return Err(AuthError::PeerClosed);
    }
    debug_assert!(sent == 1, "trust byte writes are all-or-nothing");
    Ok(())
}

/// Reads and validates the trust byte, collecting the peer's credentials best-effort.
///
/// Call this once readiness notification says the stream is readable; the stream is
/// non-blocking, so an empty buffer reports `EWOULDBLOCK` instead of waiting. Exactly one
/// byte is consumed. A zero-length read fails with [`AuthError::PeerClosed`] and any byte
/// other than zero with [`AuthError::ProtocolViolation`]. Credential retrieval itself
/// never fails the handshake: platforms or moments with nothing to offer produce
/// [`Credentials::UNKNOWN`].
pub fn read_credentials(conn: &Stream) -> Result<Credentials, AuthError> {
    let mut buf = [0xff_u8; 1];
    let (len, credentials) =
        retry_on_intr(|| peer_creds::recv_trust_byte(conn.as_fd(), &mut buf)).map_err(Error::from)?;
    if len == 0 {
        return Err(AuthError::PeerClosed);
    }
    let [byte] = buf;
    if byte != 0 {
        return Err(AuthError::ProtocolViolation(byte));
    }
    debug!(
        pid = credentials.pid,
        uid = credentials.uid,
        gid = credentials.gid,
        "peer credentials collected"
    );
    Ok(credentials)
}
