//! Dialer and transport configuration.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use keypin_core::{CertificateChecker, KeypinError, PinPolicy, PinnedKeySet, Result, SpkiPinSet};
use serde::{Deserialize, Serialize};

/// Dial timeout covering TCP connect plus TLS handshake.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a pinning dialer, usually read from TOML.
///
/// ```toml
/// host_url = "https://mail-api.proton.me"
/// pins = ["<base64 sha256 of the SPKI>"]
/// pin_policy = "strict"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialerConfig {
    /// Base URL of the primary service.
    #[serde(default)]
    pub host_url: String,

    /// Pinned SPKI SHA-256 digests.
    #[serde(default)]
    pub pins: Vec<String>,

    /// Strict or permissive pin checking.
    #[serde(default)]
    pub pin_policy: PinPolicy,

    /// Connect plus handshake timeout (seconds). Defaults to 30.
    #[serde(default)]
    pub dial_timeout_secs: Option<u64>,

    /// HTTP transport pooling and timeouts.
    #[serde(default)]
    pub transport: TransportSettings,
}

impl DialerConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml_str(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| KeypinError::Config(e.to_string()))
    }

    /// Effective dial timeout
    #[must_use]
    pub fn dial_timeout(&self) -> Duration {
        self.dial_timeout_secs
            .map_or(DEFAULT_DIAL_TIMEOUT, Duration::from_secs)
    }

    /// Decode the configured pins.
    pub fn pin_set(&self) -> Result<SpkiPinSet> {
        SpkiPinSet::from_pins(&self.pins)
    }

    /// Build the checker selected by `pin_policy`.
    ///
    /// A strict policy with no pins could never accept a connection and is
    /// reported as a configuration error.
    pub fn checker(&self) -> Result<Arc<dyn CertificateChecker>> {
        let pins = self.pin_set()?;
        if self.pin_policy == PinPolicy::Strict && pins.is_empty() {
            return Err(KeypinError::Config(
                "strict pin policy requires at least one pin".to_string(),
            ));
        }
        let pins: Arc<dyn PinnedKeySet> = Arc::new(pins);
        Ok(self.pin_policy.checker(pins))
    }
}

/// Pooling and timeout settings for the HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportSettings {
    /// Idle connections kept per host.
    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,

    /// How long an idle pooled connection is kept (seconds).
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Response timeout (seconds).
    ///
    /// Applied as reqwest's `read_timeout`, which bounds each read rather than
    /// the time until response headers arrive. A server that trickles bytes
    /// can take longer than this in total.
    #[serde(default = "default_response_header_timeout")]
    pub response_header_timeout_secs: u64,

    /// Time allowed for connect plus TLS handshake (seconds).
    #[serde(default = "default_tls_handshake_timeout")]
    pub tls_handshake_timeout_secs: u64,

    /// Honour `HTTPS_PROXY` and friends.
    #[serde(default = "default_env_proxy")]
    pub env_proxy: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            max_idle_per_host: default_max_idle_per_host(),
            idle_timeout_secs: default_idle_timeout(),
            response_header_timeout_secs: default_response_header_timeout(),
            tls_handshake_timeout_secs: default_tls_handshake_timeout(),
            env_proxy: default_env_proxy(),
        }
    }
}

impl TransportSettings {
    /// Set idle connections kept per host
    #[must_use]
    pub const fn max_idle_per_host(mut self, max: usize) -> Self {
        self.max_idle_per_host = max;
        self
    }

    /// Set the response timeout
    #[must_use]
    pub const fn response_header_timeout(mut self, timeout: Duration) -> Self {
        self.response_header_timeout_secs = timeout.as_secs();
        self
    }

    /// Enable or disable proxies from the environment
    #[must_use]
    pub const fn env_proxy(mut self, enabled: bool) -> Self {
        self.env_proxy = enabled;
        self
    }

    /// Idle timeout as a `Duration`
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Response timeout as a `Duration`
    #[must_use]
    pub const fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_header_timeout_secs)
    }

    /// Handshake timeout as a `Duration`
    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.tls_handshake_timeout_secs)
    }
}

// Default value functions for serde.
const fn default_max_idle_per_host() -> usize {
    100
}

const fn default_idle_timeout() -> u64 {
    5 * 60
}

// Flaky networks routinely need more than 10s here.
const fn default_response_header_timeout() -> u64 {
    30
}

const fn default_tls_handshake_timeout() -> u64 {
    30
}

const fn default_env_proxy() -> bool {
    true
}
