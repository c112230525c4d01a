//! Certificate-pinning TLS dialer.
//!
//! Connections to the primary service's registrable domain get full chain
//! verification; connections anywhere else (alternative routes, fronting
//! hosts) skip it. Either way the leaf certificate's public key must match
//! a pinned key before the connection is handed out.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use keypin::{PinningTlsDialer, SpkiPinSet, TlsDialer};
//!
//! #[tokio::main]
//! async fn main() -> keypin::Result<()> {
//!     let pins = SpkiPinSet::from_pins(["drtmcR2kFkM8qJClsuWgUzxgBkePfRCkRpqUesyDmeE="])?;
//!     let dialer = PinningTlsDialer::builder("https://mail-api.proton.me")
//!         .pins(Arc::new(pins))
//!         .build()?;
//!
//!     // Same registrable domain: chain verified, then pinned.
//!     let conn = dialer.dial_tls("tcp", "mail-api.proton.me:443").await?;
//!     assert!(!conn.verification_skipped());
//!
//!     // Anything else: chain skipped, leaf still pinned.
//!     let http = keypin::transport::build_http_client(&dialer, &Default::default())?;
//!     let body = http.get("https://alt-route.example/api/tests/ping").send().await;
//!     println!("{body:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Crates
//!
//! - `keypin-core`: verification decision, pin sets, checker strategies
//! - `keypin-dialer`: rustls dialers, configuration, reqwest transport

#![doc(html_root_url = "https://docs.rs/keypin/0.3.0")]

// Re-export core types
pub use keypin_core::*;

// Re-export dialers
pub use keypin_dialer::{
    transport, verifier, BasicTlsDialer, DialerConfig, PinningTlsDialer, SecureTlsDialer,
    TlsConnection, TlsDialer, TlsDialerBuilder, TransportSettings, DEFAULT_DIAL_TIMEOUT,
};

// Re-export runtime for convenience
pub use serde;
pub use tokio;
