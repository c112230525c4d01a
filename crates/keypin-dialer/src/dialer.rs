//! TLS dialers.
//!
//! Two capabilities, two strategies:
//!
//! - [`TlsDialer`]: dial a TLS connection.
//! - [`SecureTlsDialer`]: also answer whether a given address is dialed
//!   with chain verification skipped.
//!
//! [`BasicTlsDialer`] applies the verification decision and leaves the pin
//! check to the caller. [`PinningTlsDialer`] runs the configured
//! [`CertificateChecker`] after every handshake and never hands out a
//! connection that failed it.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use keypin_core::address::parse_dial_target;
use keypin_core::{
    CertificateChecker, KeypinError, Network, PinPolicy, PinnedKeySet, Result, TrustedEndpoint,
};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::config::{DialerConfig, DEFAULT_DIAL_TIMEOUT};
use crate::connection::TlsConnection;
use crate::verifier::{default_provider, default_root_store, webpki_verifier, SkipChainVerifier};

/// Minimal dialing capability.
#[async_trait]
pub trait TlsDialer: Send + Sync {
    /// Connect to `address` (`host:port`) over `network` and complete a TLS handshake.
    ///
    /// `network` is `tcp`, `tcp4` or `tcp6`. Dropping the future abandons the
    /// attempt; no retries are made.
    async fn dial_tls(&self, network: &str, address: &str) -> Result<TlsConnection>;
}

/// Dialing capability that also exposes the verification decision.
pub trait SecureTlsDialer: TlsDialer {
    /// True when `address` is dialed without certificate chain verification.
    fn should_skip_certificate_chain_verification(&self, address: &str) -> bool;
}

/// Dialer that applies the chain-verification decision only.
#[derive(Clone)]
pub struct BasicTlsDialer {
    endpoint: Arc<TrustedEndpoint>,
    provider: Arc<CryptoProvider>,
    chain_verifier: Arc<WebPkiServerVerifier>,
    enforcing: Arc<ClientConfig>,
    skipping: Arc<ClientConfig>,
    timeout: Duration,
}

impl BasicTlsDialer {
    /// Create a dialer for `host_url` using the Mozilla root store.
    pub fn new(host_url: impl Into<String>) -> Result<Self> {
        TlsDialerBuilder::new(host_url).build_basic()
    }

    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder(host_url: impl Into<String>) -> TlsDialerBuilder {
        TlsDialerBuilder::new(host_url)
    }

    /// The trusted endpoint decisions are made against
    #[must_use]
    pub fn endpoint(&self) -> &Arc<TrustedEndpoint> {
        &self.endpoint
    }

    /// Connect plus handshake timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) const fn provider(&self) -> &Arc<CryptoProvider> {
        &self.provider
    }

    pub(crate) const fn chain_verifier(&self) -> &Arc<WebPkiServerVerifier> {
        &self.chain_verifier
    }

    async fn connect(
        &self,
        network: Network,
        address: &str,
        skip: bool,
    ) -> Result<TlsConnection> {
        let (host, port) = parse_dial_target(address)?;
        let server_name =
            ServerName::try_from(host.to_string()).map_err(|e| KeypinError::InvalidAddress {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        let (tcp, peer_addr) = connect_tcp(network, address, host, port).await?;
        debug!(address = %address, peer = %peer_addr, skip, "tcp connected, starting TLS handshake");

        let config = if skip { &self.skipping } else { &self.enforcing };
        let stream = TlsConnector::from(Arc::clone(config))
            .connect(server_name, tcp)
            .await
            .map_err(|source| KeypinError::Handshake {
                address: address.to_string(),
                source,
            })?;

        debug!(address = %address, "TLS handshake complete");
        Ok(TlsConnection::new(stream, skip, peer_addr))
    }
}

#[async_trait]
impl TlsDialer for BasicTlsDialer {
    async fn dial_tls(&self, network: &str, address: &str) -> Result<TlsConnection> {
        let network: Network = network.parse()?;
        let skip = self.should_skip_certificate_chain_verification(address);

        tokio::time::timeout(self.timeout, self.connect(network, address, skip))
            .await
            .map_err(|_| KeypinError::Timeout {
                address: address.to_string(),
                after: self.timeout,
            })?
    }
}

impl SecureTlsDialer for BasicTlsDialer {
    fn should_skip_certificate_chain_verification(&self, address: &str) -> bool {
        self.endpoint.should_skip_verification(address)
    }
}

impl std::fmt::Debug for BasicTlsDialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicTlsDialer")
            .field("endpoint", &self.endpoint.url())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Resolve and connect, trying each permitted address in order.
async fn connect_tcp(
    network: Network,
    address: &str,
    host: &str,
    port: u16,
) -> Result<(TcpStream, SocketAddr)> {
    let candidates: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| KeypinError::Resolve {
            address: address.to_string(),
            source,
        })?
        .filter(|addr| network.permits(addr))
        .collect();

    if candidates.is_empty() {
        return Err(KeypinError::Resolve {
            address: address.to_string(),
            source: io::Error::new(
                io::ErrorKind::NotFound,
                format!("no {network} addresses for {host}"),
            ),
        });
    }

    let mut last_err = None;
    for addr in candidates {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok((stream, addr)),
            Err(e) => {
                debug!(peer = %addr, error = %e, "connect attempt failed");
                last_err = Some(e);
            }
        }
    }

    Err(KeypinError::Connect {
        address: address.to_string(),
        source: last_err
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no address tried")),
    })
}

/// Dialer that pin-checks every connection before returning it.
#[derive(Clone)]
pub struct PinningTlsDialer {
    inner: BasicTlsDialer,
    checker: Arc<dyn CertificateChecker>,
}

impl PinningTlsDialer {
    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder(host_url: impl Into<String>) -> TlsDialerBuilder {
        TlsDialerBuilder::new(host_url)
    }

    /// Build a dialer from configuration.
    pub fn from_config(config: &DialerConfig) -> Result<Self> {
        TlsDialerBuilder::new(config.host_url.clone())
            .checker(config.checker()?)
            .timeout(config.dial_timeout())
            .build()
    }

    /// The underlying decision-only dialer
    #[must_use]
    pub const fn basic(&self) -> &BasicTlsDialer {
        &self.inner
    }

    /// The pin-checking strategy in use
    #[must_use]
    pub const fn checker(&self) -> &Arc<dyn CertificateChecker> {
        &self.checker
    }
}

#[async_trait]
impl TlsDialer for PinningTlsDialer {
    async fn dial_tls(&self, network: &str, address: &str) -> Result<TlsConnection> {
        let conn = self.inner.dial_tls(network, address).await?;
        if let Err(e) = self
            .checker
            .check_certificate(&conn, conn.verification_skipped())
        {
            warn!(address = %address, error = %e, "closing connection that failed the pin check");
            return Err(e);
        }
        Ok(conn)
    }
}

impl SecureTlsDialer for PinningTlsDialer {
    fn should_skip_certificate_chain_verification(&self, address: &str) -> bool {
        self.inner.should_skip_certificate_chain_verification(address)
    }
}

impl std::fmt::Debug for PinningTlsDialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinningTlsDialer")
            .field("inner", &self.inner)
            .field("checker", &self.checker)
            .finish()
    }
}

/// Builder for [`BasicTlsDialer`] and [`PinningTlsDialer`]
pub struct TlsDialerBuilder {
    host_url: String,
    roots: Option<Arc<RootCertStore>>,
    provider: Option<Arc<CryptoProvider>>,
    checker: Option<Arc<dyn CertificateChecker>>,
    timeout: Duration,
}

impl TlsDialerBuilder {
    /// Create a new builder for the given trusted endpoint URL
    #[must_use]
    pub fn new(host_url: impl Into<String>) -> Self {
        Self {
            host_url: host_url.into(),
            roots: None,
            provider: None,
            checker: None,
            timeout: DEFAULT_DIAL_TIMEOUT,
        }
    }

    /// Set the root store used when chain verification is enforced
    #[must_use]
    pub fn root_store(mut self, roots: Arc<RootCertStore>) -> Self {
        self.roots = Some(roots);
        self
    }

    /// Set the rustls crypto provider
    #[must_use]
    pub fn crypto_provider(mut self, provider: Arc<CryptoProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use a strict checker over `pins`
    #[must_use]
    pub fn pins(self, pins: Arc<dyn PinnedKeySet>) -> Self {
        self.policy(PinPolicy::Strict, pins)
    }

    /// Use the checker for `policy` over `pins`
    #[must_use]
    pub fn policy(self, policy: PinPolicy, pins: Arc<dyn PinnedKeySet>) -> Self {
        self.checker(policy.checker(pins))
    }

    /// Use a custom checker strategy
    #[must_use]
    pub fn checker(mut self, checker: Arc<dyn CertificateChecker>) -> Self {
        self.checker = Some(checker);
        self
    }

    /// Set the connect plus handshake timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a decision-only dialer
    pub fn build_basic(self) -> Result<BasicTlsDialer> {
        let provider = self.provider.unwrap_or_else(default_provider);
        let roots = self.roots.unwrap_or_else(default_root_store);
        let chain_verifier = webpki_verifier(Arc::clone(&roots), Arc::clone(&provider))?;

        let enforcing = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| KeypinError::Config(e.to_string()))?
            .with_webpki_verifier(Arc::clone(&chain_verifier))
            .with_no_client_auth();

        let skipping = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| KeypinError::Config(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipChainVerifier::new(Arc::clone(
                &provider,
            ))))
            .with_no_client_auth();

        Ok(BasicTlsDialer {
            endpoint: Arc::new(TrustedEndpoint::new(self.host_url)),
            provider,
            chain_verifier,
            enforcing: Arc::new(enforcing),
            skipping: Arc::new(skipping),
            timeout: self.timeout,
        })
    }

    /// Build a pinning dialer; a checker or pin set is required
    pub fn build(mut self) -> Result<PinningTlsDialer> {
        let checker = self
            .checker
            .take()
            .ok_or_else(|| KeypinError::Config("pinning dialer needs pins or a checker".into()))?;
        Ok(PinningTlsDialer {
            inner: self.build_basic()?,
            checker,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keypin_core::SpkiPinSet;

    fn pinning(host_url: &str) -> PinningTlsDialer {
        PinningTlsDialer::builder(host_url)
            .pins(Arc::new(SpkiPinSet::default()))
            .build()
            .unwrap()
    }

    #[test]
    fn dialers_share_the_decision() {
        let basic = BasicTlsDialer::new("https://mail-api.proton.me").unwrap();
        let pinned = pinning("https://mail-api.proton.me");

        for (address, skip) in [
            ("mail-api.proton.me:443", false),
            ("proton.me", false),
            ("dns.google:443", true),
        ] {
            assert_eq!(basic.should_skip_certificate_chain_verification(address), skip);
            assert_eq!(pinned.should_skip_certificate_chain_verification(address), skip);
        }
    }

    #[test]
    fn malformed_endpoint_still_builds() {
        let basic = BasicTlsDialer::new("::not a url::").unwrap();
        assert!(basic.should_skip_certificate_chain_verification("mail-api.proton.me:443"));
        assert_eq!(basic.endpoint().host(), None);
    }

    #[test]
    fn pinning_dialer_requires_checker() {
        assert!(matches!(
            PinningTlsDialer::builder("https://proton.me").build(),
            Err(KeypinError::Config(_))
        ));
    }

    #[test]
    fn from_config_applies_timeout() {
        let config = DialerConfig {
            host_url: "https://proton.me".into(),
            pin_policy: PinPolicy::Permissive,
            dial_timeout_secs: Some(3),
            ..DialerConfig::default()
        };
        let dialer = PinningTlsDialer::from_config(&config).unwrap();
        assert_eq!(dialer.basic().timeout(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn rejects_unsupported_network() {
        let dialer = pinning("https://proton.me");
        let err = dialer.dial_tls("udp", "proton.me:443").await.unwrap_err();
        assert!(matches!(err, KeypinError::UnsupportedNetwork(_)));
    }

    #[tokio::test]
    async fn rejects_address_without_port() {
        let dialer = BasicTlsDialer::new("https://proton.me").unwrap();
        let err = dialer.dial_tls("tcp", "proton.me").await.unwrap_err();
        assert!(matches!(err, KeypinError::InvalidAddress { .. }));
    }

    #[tokio::test]
    async fn connection_refused_is_retryable() {
        // bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let dialer = BasicTlsDialer::new("https://proton.me").unwrap();
        let err = dialer
            .dial_tls("tcp4", &format!("127.0.0.1:{port}"))
            .await
            .unwrap_err();
        assert!(matches!(err, KeypinError::Connect { .. }), "{err}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn wrong_family_has_no_candidates() {
        let dialer = BasicTlsDialer::new("https://proton.me").unwrap();
        let err = dialer.dial_tls("tcp6", "127.0.0.1:443").await.unwrap_err();
        assert!(matches!(err, KeypinError::Resolve { .. }), "{err}");
    }
}
