//! Post-handshake certificate pin checks.
//!
//! ```text
//! chain verified?  ── yes ──> any verified chain whose leaf is pinned -> Ok
//!                  │          no verified chains                      -> NoVerifiedChains
//!                  │          otherwise                               -> PinMismatch
//!                  └─ no ───> first peer certificate pinned           -> Ok
//!                             no peer certificates                    -> NoPeerCertificates
//!                             otherwise                               -> PinMismatch
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rustls_pki_types::CertificateDer;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{KeypinError, Result};
use crate::pins::PinnedKeySet;

/// Certificate material produced by a completed TLS handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionTrustState {
    /// Chains validated against the trust store, leaf first.
    /// Empty when chain verification was skipped.
    pub verified_chains: Vec<Vec<CertificateDer<'static>>>,
    /// Certificates exactly as presented by the peer, leaf first.
    pub peer_certificates: Vec<CertificateDer<'static>>,
}

impl ConnectionTrustState {
    /// State for a handshake whose chain was verified.
    ///
    /// An empty chain records no verified chain at all.
    #[must_use]
    pub fn verified(chain: Vec<CertificateDer<'static>>) -> Self {
        let verified_chains = if chain.is_empty() {
            Vec::new()
        } else {
            vec![chain.clone()]
        };
        Self {
            verified_chains,
            peer_certificates: chain,
        }
    }

    /// State for a handshake that skipped chain verification.
    #[must_use]
    pub const fn unverified(peer_certificates: Vec<CertificateDer<'static>>) -> Self {
        Self {
            verified_chains: Vec::new(),
            peer_certificates,
        }
    }
}

/// A connection that may carry TLS handshake state.
pub trait HandshakeState {
    /// Trust material from the handshake, `None` for plaintext transports.
    fn trust_state(&self) -> Option<&ConnectionTrustState>;
}

impl HandshakeState for ConnectionTrustState {
    fn trust_state(&self) -> Option<&ConnectionTrustState> {
        Some(self)
    }
}

impl<T: HandshakeState + ?Sized> HandshakeState for &T {
    fn trust_state(&self) -> Option<&ConnectionTrustState> {
        (**self).trust_state()
    }
}

#[cfg(feature = "tokio")]
impl HandshakeState for tokio::net::TcpStream {
    fn trust_state(&self) -> Option<&ConnectionTrustState> {
        None
    }
}

/// Pin-checking strategy, chosen once at construction.
pub trait CertificateChecker: Send + Sync + fmt::Debug {
    /// Validate the connection's certificates against the pinned set.
    ///
    /// `verification_was_skipped` must be the decision the connection was
    /// dialed with.
    fn check_certificate(
        &self,
        connection: &dyn HandshakeState,
        verification_was_skipped: bool,
    ) -> Result<()>;
}

/// Strict checker: the leaf must match a pinned key.
#[derive(Debug, Clone)]
pub struct TlsPinChecker {
    pins: Arc<dyn PinnedKeySet>,
}

impl TlsPinChecker {
    /// Create a checker over a shared pin set
    pub fn new(pins: Arc<dyn PinnedKeySet>) -> Self {
        Self { pins }
    }

    /// Whether a single certificate is pinned
    #[must_use]
    pub fn is_pinned(&self, cert: &CertificateDer<'_>) -> bool {
        self.pins.is_pinned(cert)
    }
}

impl CertificateChecker for TlsPinChecker {
    fn check_certificate(
        &self,
        connection: &dyn HandshakeState,
        verification_was_skipped: bool,
    ) -> Result<()> {
        let state = connection
            .trust_state()
            .ok_or(KeypinError::NotATlsConnection)?;

        if !verification_was_skipped {
            if state.verified_chains.is_empty() {
                return Err(KeypinError::NoVerifiedChains);
            }
            let matched = state
                .verified_chains
                .iter()
                .filter_map(|chain| chain.first())
                .any(|leaf| self.is_pinned(leaf));
            if matched {
                debug!("verified chain leaf matches a pinned key");
                return Ok(());
            }
            warn!(chains = state.verified_chains.len(), "no verified chain leaf matches a pinned key");
            return Err(KeypinError::PinMismatch);
        }

        // Only the leaf counts; a pinned intermediate proves nothing about the peer.
        let leaf = state
            .peer_certificates
            .first()
            .ok_or(KeypinError::NoPeerCertificates)?;
        if self.is_pinned(leaf) {
            debug!("unverified peer leaf matches a pinned key");
            return Ok(());
        }
        warn!("unverified peer leaf does not match any pinned key");
        Err(KeypinError::PinMismatch)
    }
}

/// Permissive checker for QA and test builds: accepts every TLS connection.
///
/// Still rejects plaintext connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveChecker;

impl CertificateChecker for PermissiveChecker {
    fn check_certificate(
        &self,
        connection: &dyn HandshakeState,
        verification_was_skipped: bool,
    ) -> Result<()> {
        connection
            .trust_state()
            .ok_or(KeypinError::NotATlsConnection)?;
        warn!(verification_was_skipped, "permissive pin policy: certificate accepted without pin check");
        Ok(())
    }
}

/// Which checker strategy to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinPolicy {
    /// Require a pinned leaf
    #[default]
    Strict,
    /// Accept any TLS peer
    Permissive,
}

impl PinPolicy {
    /// Build the checker for this policy
    pub fn checker(self, pins: Arc<dyn PinnedKeySet>) -> Arc<dyn CertificateChecker> {
        match self {
            Self::Strict => Arc::new(TlsPinChecker::new(pins)),
            Self::Permissive => Arc::new(PermissiveChecker),
        }
    }
}

impl FromStr for PinPolicy {
    type Err = KeypinError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "strict" => Ok(Self::Strict),
            "permissive" => Ok(Self::Permissive),
            other => Err(KeypinError::Config(format!("unknown pin policy: {other}"))),
        }
    }
}
