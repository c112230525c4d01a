//! Pinned key set.
//!
//! A pin is the SHA-256 digest of a certificate's DER-encoded
//! SubjectPublicKeyInfo, written as base64 (the HPKP `pin-sha256` form).
//! Hashing the key rather than the whole certificate keeps pins stable when
//! a certificate is re-issued for the same key.

use std::collections::HashSet;
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::digest::{digest, SHA256};
use rustls_pki_types::CertificateDer;
use tracing::warn;

use crate::error::{KeypinError, Result};

/// Length of a SHA-256 digest in bytes.
const PIN_LEN: usize = 32;

/// A raw SPKI SHA-256 digest.
pub type SpkiDigest = [u8; PIN_LEN];

/// Membership test for trusted certificate identities.
///
/// Implementations are read-only after construction and shared across
/// concurrent dials.
pub trait PinnedKeySet: Send + Sync + fmt::Debug {
    /// True when the certificate's identity belongs to the trusted set.
    ///
    /// Validity dates and chain building are not considered.
    fn is_pinned(&self, cert: &CertificateDer<'_>) -> bool;
}

/// Compute the SHA-256 digest of a certificate's SubjectPublicKeyInfo.
pub fn spki_sha256(cert: &CertificateDer<'_>) -> Result<SpkiDigest> {
    let (_, parsed) = x509_parser::parse_x509_certificate(cert.as_ref())
        .map_err(|e| KeypinError::CertParse(e.to_string()))?;
    let hash = digest(&SHA256, parsed.public_key().raw);
    let mut out = [0u8; PIN_LEN];
    out.copy_from_slice(hash.as_ref());
    Ok(out)
}

/// Base64 pin string for a certificate.
pub fn spki_sha256_pin(cert: &CertificateDer<'_>) -> Result<String> {
    spki_sha256(cert).map(|d| STANDARD.encode(d))
}

/// Decode a pin string.
///
/// Accepts plain base64, `pin-sha256:<base64>`, `sha256/<base64>`, or
/// `sha256:<hex>`.
pub fn parse_pin(pin: &str) -> Result<SpkiDigest> {
    let trimmed = pin.trim().trim_matches('"');
    let bytes = if let Some(hex_digits) = trimmed.strip_prefix("sha256:") {
        hex::decode(hex_digits).map_err(|e| KeypinError::invalid_pin(pin, e.to_string()))?
    } else {
        let b64 = trimmed
            .strip_prefix("pin-sha256:")
            .or_else(|| trimmed.strip_prefix("sha256/"))
            .unwrap_or(trimmed);
        STANDARD
            .decode(b64)
            .map_err(|e| KeypinError::invalid_pin(pin, e.to_string()))?
    };

    bytes.try_into().map_err(|b: Vec<u8>| {
        KeypinError::invalid_pin(pin, format!("expected {PIN_LEN} bytes, got {}", b.len()))
    })
}

/// Pinned key set keyed by SPKI SHA-256 digest.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SpkiPinSet {
    digests: HashSet<SpkiDigest>,
}

impl SpkiPinSet {
    /// Build from pin strings, failing on the first malformed pin.
    pub fn from_pins<I, S>(pins: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let digests = pins
            .into_iter()
            .map(|p| parse_pin(p.as_ref()))
            .collect::<Result<HashSet<_>>>()?;
        Ok(Self { digests })
    }

    /// Build by pinning the keys of the given certificates.
    pub fn from_certificates<'a, 'b: 'a, I>(certs: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a CertificateDer<'b>>,
    {
        let digests = certs
            .into_iter()
            .map(spki_sha256)
            .collect::<Result<HashSet<_>>>()?;
        Ok(Self { digests })
    }

    /// Number of distinct pins
    #[must_use]
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    /// True when nothing is pinned
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// True when the digest is pinned
    #[must_use]
    pub fn contains(&self, digest: &SpkiDigest) -> bool {
        self.digests.contains(digest)
    }
}

impl PinnedKeySet for SpkiPinSet {
    fn is_pinned(&self, cert: &CertificateDer<'_>) -> bool {
        match spki_sha256(cert) {
            Ok(d) => self.digests.contains(&d),
            Err(e) => {
                warn!(error = %e, "unparseable peer certificate treated as unpinned");
                false
            }
        }
    }
}

impl fmt::Debug for SpkiPinSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pins: Vec<String> = self.digests.iter().map(|d| STANDARD.encode(d)).collect();
        pins.sort_unstable();
        f.debug_struct("SpkiPinSet").field("pins", &pins).finish()
    }
}
