//! Pinned TLS dialing on rustls.
//!
//! This crate provides the dialers built on `keypin-core` decisions:
//!
//! - [`BasicTlsDialer`]: chain verification on or off per target, no pin check
//! - [`PinningTlsDialer`]: the same, plus a mandatory pin check after every handshake
//! - [`transport::build_http_client`]: a reqwest client that pins inside the handshake

#![doc(html_root_url = "https://docs.rs/keypin-dialer/0.3.0")]

mod config;
mod connection;
mod dialer;
pub mod transport;
pub mod verifier;

pub use config::*;
pub use connection::TlsConnection;
pub use dialer::{BasicTlsDialer, PinningTlsDialer, SecureTlsDialer, TlsDialer, TlsDialerBuilder};
pub use keypin_core::{KeypinError, Result};
