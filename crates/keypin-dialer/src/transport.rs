//! HTTP transport whose TLS layer enforces the dialer's decisions and pins.
//!
//! reqwest owns connection pooling, so instead of handing it a dial hook the
//! pinning logic runs inside the rustls verifier of a preconfigured
//! `ClientConfig`. Every new connection is decided and pin-checked during its
//! handshake; pooled connections were already checked when they were opened.

use std::sync::Arc;

use keypin_core::{KeypinError, Result};
use reqwest::Client as HttpClient;
use rustls::ClientConfig;
use tracing::debug;

use crate::config::TransportSettings;
use crate::dialer::PinningTlsDialer;
use crate::verifier::PinningServerVerifier;

/// Build the rustls client configuration used by the HTTP transport.
pub fn pinning_client_config(dialer: &PinningTlsDialer) -> Result<ClientConfig> {
    let basic = dialer.basic();
    let verifier = PinningServerVerifier::new(
        Arc::clone(basic.endpoint()),
        Arc::clone(basic.chain_verifier()),
        Arc::clone(basic.provider()),
        Arc::clone(dialer.checker()),
    );

    let mut config = ClientConfig::builder_with_provider(Arc::clone(basic.provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| KeypinError::Config(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(config)
}

/// Create an HTTP client that connects through the pinning dialer's policy.
///
/// Proxies are taken from the environment unless `settings.env_proxy` is off.
pub fn build_http_client(
    dialer: &PinningTlsDialer,
    settings: &TransportSettings,
) -> Result<HttpClient> {
    debug!(endpoint = %dialer.basic().endpoint().url(), ?settings, "building pinned HTTP transport");

    let mut builder = HttpClient::builder();
    if !settings.env_proxy {
        builder = builder.no_proxy();
    }
    builder
        .use_preconfigured_tls(pinning_client_config(dialer)?)
        .user_agent(format!("keypin/{}", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(settings.max_idle_per_host)
        .pool_idle_timeout(settings.idle_timeout())
        .connect_timeout(settings.handshake_timeout())
        .read_timeout(settings.response_timeout())
        .build()
        .map_err(|e| KeypinError::Config(format!("failed to build HTTP client: {e}")))
}
