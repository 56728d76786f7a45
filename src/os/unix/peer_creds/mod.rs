//! The per-platform peer credential mechanisms behind the handshake, exactly one of which
//! is compiled in, as selected by the build script. Every mechanism normalizes to
//! [`Credentials`](crate::credentials::Credentials) and degrades missing or malformed
//! credential data to unknown fields rather than failing the receive.

cfg_if::cfg_if! {
    if #[cfg(ub_peercred)] {
        mod peercred;
        pub(crate) use peercred::{recv_trust_byte, send_trust_byte};
    } else if #[cfg(ub_cmsgcred)] {
        mod cmsgcred;
        pub(crate) use cmsgcred::{recv_trust_byte, send_trust_byte};
    } else {
        mod unsupported;
        pub(crate) use unsupported::{recv_trust_byte, send_trust_byte};
    }
}
