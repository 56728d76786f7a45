#![doc = include_str!("../README.md")]
// If this was in Cargo.toml, it would apply to the test suite as well
#![warn(
    missing_docs,
    clippy::panic_in_result_fn,
    clippy::missing_assert_message,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

#[cfg(not(unix))]
compile_error!(
    "underbus is built on fork/exec and Unix socket peer credentials, neither of which this \
     target has"
);

pub mod credentials;
pub mod error;
pub mod handshake;
pub mod slot;
pub mod spawn;
pub mod transport;

mod os {
    #[cfg(unix)]
    pub(crate) mod unix;
}

mod misc;
pub(crate) use misc::*;

#[cfg(test)]
#[path = "../tests/index.rs"]
#[allow(
    clippy::unwrap_used,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::panic_in_result_fn
)]
mod tests;
