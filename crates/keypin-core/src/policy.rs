//! Chain-verification policy.
//!
//! Decides, per dial, whether rustls should build and verify a certificate
//! chain for the target. Chain verification is enforced only when the target
//! shares its registrable domain with the trusted endpoint; every other
//! target (alternate routes, proxies with self-signed certificates) is
//! dialed with chain verification skipped. The pin check runs in both cases.

use tracing::{debug, warn};
use url::Url;

use crate::address::target_host;
use crate::domain::domains_equal;
use crate::error::{KeypinError, Result};

/// The operator-configured base URL of the primary service.
///
/// Parsed once at construction. A URL that fails to parse is kept as an
/// endpoint with no host, which makes every decision fail open.
///
/// The host is taken verbatim from the configured string, so it compares
/// against targets with the same case and the same Unicode form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedEndpoint {
    url: String,
    host: Option<String>,
}

impl TrustedEndpoint {
    /// Build from a URL string, accepting malformed input.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let host = match Url::parse(&url) {
            Ok(parsed) if parsed.has_host() => Some(authority_host(&url).to_string()),
            Ok(_) => Some(String::new()),
            Err(e) => {
                warn!(url = %url, error = %e, "trusted endpoint is not a valid URL, chain verification will be skipped");
                None
            }
        };
        Self { url, host }
    }

    /// Build from a URL string, rejecting malformed input.
    pub fn parse(url: &str) -> Result<Self> {
        let endpoint = Self::new(url);
        if endpoint.host.is_none() {
            let reason = Url::parse(url).err().map_or_else(String::new, |e| e.to_string());
            return Err(KeypinError::InvalidEndpoint {
                url: url.to_string(),
                reason,
            });
        }
        Ok(endpoint)
    }

    /// The URL as configured
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Host component as written, without port; `None` if the URL did not parse
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Whether chain verification should be skipped for `address`.
    ///
    /// `address` is `host` or `host:port`. Returns true when the endpoint is
    /// malformed or when the two registrable domains differ.
    #[must_use]
    pub fn should_skip_verification(&self, address: &str) -> bool {
        let skip = self
            .host
            .as_deref()
            .map_or(true, |host| !domains_equal(host, target_host(address)));
        debug!(target = %address, skip, "chain verification decision");
        skip
    }
}

/// Host of the URL's authority, without userinfo, port or IPv6 brackets.
fn authority_host(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.find(['/', '?', '#']).map_or(rest, |end| &rest[..end]);
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = target_host(authority);
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

/// One-shot form of [`TrustedEndpoint::should_skip_verification`].
#[must_use]
pub fn should_skip_verification(trusted_endpoint: &str, address: &str) -> bool {
    TrustedEndpoint::new(trusted_endpoint).should_skip_verification(address)
}
