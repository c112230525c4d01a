//! Core trust decisions for keypin.
//!
//! This crate holds the parts of pinned TLS dialing that need no I/O:
//!
//! - **Domain matching**: the two-label registrable-domain heuristic
//! - **Verification policy**: whether a dial should skip chain verification
//! - **Pins**: the [`PinnedKeySet`] contract and its SPKI SHA-256 implementation
//! - **Checker**: post-handshake pin checks ([`TlsPinChecker`], [`PermissiveChecker`])
//! - **Errors**: [`KeypinError`]
//!
//! # Example
//!
//! ```rust,ignore
//! use keypin_core::{TrustedEndpoint, TlsPinChecker, SpkiPinSet, CertificateChecker};
//! use std::sync::Arc;
//!
//! let endpoint = TrustedEndpoint::new("https://mail-api.proton.me");
//! let skip = endpoint.should_skip_verification("dns.google:443");
//!
//! let pins = SpkiPinSet::from_pins(["<base64 spki sha256>"])?;
//! let checker = TlsPinChecker::new(Arc::new(pins));
//! checker.check_certificate(&connection, skip)?;
//! ```

#![doc(html_root_url = "https://docs.rs/keypin-core/0.3.0")]

pub mod address;
pub mod checker;
pub mod domain;
mod error;
pub mod pins;
pub mod policy;

pub use address::Network;
pub use checker::{
    CertificateChecker, ConnectionTrustState, HandshakeState, PermissiveChecker, PinPolicy,
    TlsPinChecker,
};
pub use domain::{domains_equal, registrable_domain};
pub use error::{KeypinError, Result};
pub use pins::{spki_sha256_pin, PinnedKeySet, SpkiPinSet};
pub use policy::{should_skip_verification, TrustedEndpoint};
