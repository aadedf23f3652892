//! Byte-level transport capability for DAQ devices.
//!
//! The protocol core never touches USB endpoints directly. It talks to a
//! [`Transport`]: something that can be opened, closed, written to, and read
//! from with an explicit timeout. Real USB backends live outside this
//! workspace; this crate ships the trait plus:
//! - [`UnixSocketTransport`] for bridge daemons and emulators that expose the
//!   device endpoint as a Unix stream socket (Linux/macOS)
//!
//! This is the lowest layer of libdaq. Everything else builds on top of it.

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use traits::Transport;

#[cfg(unix)]
pub use uds::UnixSocketTransport;
