use std::time::Duration;
use thiserror::Error;

/// Result type alias for keypin operations
pub type Result<T> = std::result::Result<T, KeypinError>;

/// Errors that can occur while deciding, dialing or pin-checking a TLS connection
#[derive(Error, Debug)]
pub enum KeypinError {
    /// Trusted endpoint URL could not be parsed
    #[error("invalid trusted endpoint {url:?}: {reason}")]
    InvalidEndpoint {
        /// The configured URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// Target address is not a usable `host:port`
    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress {
        /// The requested address
        address: String,
        /// Why it was rejected
        reason: String,
    },

    /// Network name other than tcp, tcp4 or tcp6
    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),

    /// Name resolution failed
    #[error("failed to resolve {address}: {source}")]
    Resolve {
        /// The requested address
        address: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// TCP connect failed
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// The requested address
        address: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// TLS handshake failed
    #[error("TLS handshake with {address} failed: {source}")]
    Handshake {
        /// The requested address
        address: String,
        /// Underlying I/O error (wraps the rustls error)
        #[source]
        source: std::io::Error,
    },

    /// Connect plus handshake did not finish in time
    #[error("dial to {address} timed out after {after:?}")]
    Timeout {
        /// The requested address
        address: String,
        /// The configured dial timeout
        after: Duration,
    },

    /// The connection carries no TLS handshake state
    #[error("connection is not a TLS connection")]
    NotATlsConnection,

    /// Chain verification was enforced but produced no verified chains
    #[error("no verified certificate chains")]
    NoVerifiedChains,

    /// Chain verification was skipped and the peer presented nothing
    #[error("no peer certificates available")]
    NoPeerCertificates,

    /// The leaf certificate is not in the pinned key set
    #[error("TLS certificate pin mismatch")]
    PinMismatch,

    /// A configured pin is not a base64 SHA-256 digest
    #[error("invalid pin {pin:?}: {reason}")]
    InvalidPin {
        /// The offending pin text
        pin: String,
        /// Why it was rejected
        reason: String,
    },

    /// A certificate could not be parsed
    #[error("certificate parse error: {0}")]
    CertParse(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl KeypinError {
    /// Returns true if the failure is transient and the transport may dial again
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Resolve { .. } | Self::Connect { .. } | Self::Timeout { .. }
        )
    }

    /// Returns true if the connection must be discarded because trust was not established
    #[must_use]
    pub const fn is_trust_failure(&self) -> bool {
        matches!(
            self,
            Self::NotATlsConnection
                | Self::NoVerifiedChains
                | Self::NoPeerCertificates
                | Self::PinMismatch
        )
    }

    pub(crate) fn invalid_pin(pin: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPin {
            pin: pin.to_string(),
            reason: reason.into(),
        }
    }
}
