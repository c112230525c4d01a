//! rustls certificate verifiers.
//!
//! - [`SkipChainVerifier`] accepts any certificate chain but still checks
//!   the handshake signatures, so the peer must hold the leaf's private key.
//!   Used when the policy skips chain verification; the pin check is what
//!   anchors trust afterwards.
//! - [`PinningServerVerifier`] runs decision, optional chain verification
//!   and pin check inside the handshake. This is the hook used by the HTTP
//!   transport, where the caller never sees the raw connection.

use std::sync::Arc;

use keypin_core::{CertificateChecker, ConnectionTrustState, KeypinError, TrustedEndpoint};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tracing::warn;

/// Default crypto provider (ring).
pub fn default_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Mozilla root store bundled by `webpki-roots`.
pub fn default_root_store() -> Arc<RootCertStore> {
    Arc::new(RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    })
}

/// Build the chain-verifying WebPKI verifier for a root store.
pub fn webpki_verifier(
    roots: Arc<RootCertStore>,
    provider: Arc<CryptoProvider>,
) -> keypin_core::Result<Arc<WebPkiServerVerifier>> {
    WebPkiServerVerifier::builder_with_provider(roots, provider)
        .build()
        .map_err(|e| KeypinError::Config(format!("cannot build certificate verifier: {e}")))
}

/// Host string rustls was asked to connect to.
pub(crate) fn server_host(name: &ServerName<'_>) -> String {
    match name {
        ServerName::DnsName(dns) => dns.as_ref().to_string(),
        ServerName::IpAddress(ip) => std::net::IpAddr::from(*ip).to_string(),
        _ => String::new(),
    }
}

/// Accepts any chain; verifies handshake signatures only.
#[derive(Debug)]
pub struct SkipChainVerifier {
    provider: Arc<CryptoProvider>,
}

impl SkipChainVerifier {
    /// Create a verifier using the provider's signature algorithms
    pub const fn new(provider: Arc<CryptoProvider>) -> Self {
        Self { provider }
    }
}

impl ServerCertVerifier for SkipChainVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Decision + chain verification + pin check, evaluated per server name.
#[derive(Debug)]
pub struct PinningServerVerifier {
    endpoint: Arc<TrustedEndpoint>,
    chain: Arc<WebPkiServerVerifier>,
    skip: SkipChainVerifier,
    checker: Arc<dyn CertificateChecker>,
}

impl PinningServerVerifier {
    /// Create a verifier from the dialer's shared configuration
    pub fn new(
        endpoint: Arc<TrustedEndpoint>,
        chain: Arc<WebPkiServerVerifier>,
        provider: Arc<CryptoProvider>,
        checker: Arc<dyn CertificateChecker>,
    ) -> Self {
        Self {
            endpoint,
            chain,
            skip: SkipChainVerifier::new(provider),
            checker,
        }
    }
}

impl ServerCertVerifier for PinningServerVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let host = server_host(server_name);
        let skipped = self.endpoint.should_skip_verification(&host);

        if !skipped {
            self.chain
                .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)?;
        }

        let presented: Vec<CertificateDer<'static>> = std::iter::once(end_entity)
            .chain(intermediates)
            .map(|c| c.clone().into_owned())
            .collect();
        let state = if skipped {
            ConnectionTrustState::unverified(presented)
        } else {
            ConnectionTrustState::verified(presented)
        };

        self.checker
            .check_certificate(&state, skipped)
            .map_err(|e| {
                warn!(host = %host, error = %e, "rejecting server certificate");
                rustls::Error::InvalidCertificate(CertificateError::ApplicationVerificationFailure)
            })?;

        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.skip.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.skip.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.skip.supported_verify_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keypin_core::{PermissiveChecker, SpkiPinSet, TlsPinChecker};

    fn mozilla_roots() -> RootCertStore {
        (*default_root_store()).clone()
    }

    fn leaf_and_ca() -> (CertificateDer<'static>, CertificateDer<'static>) {
        let ca_key = rcgen::KeyPair::generate().unwrap();
        let mut ca_params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        ca_params
            .distinguished_name
            .push(rcgen::DnType::CommonName, "keypin test CA");
        let ca = ca_params.self_signed(&ca_key).unwrap();

        let leaf_key = rcgen::KeyPair::generate().unwrap();
        let leaf = rcgen::CertificateParams::new(vec!["mail.proton.me".to_string()])
            .unwrap()
            .signed_by(&leaf_key, &ca, &ca_key)
            .unwrap();
        (leaf.der().clone(), ca.der().clone())
    }

    fn verifier(
        host_url: &str,
        roots: RootCertStore,
        checker: Arc<dyn CertificateChecker>,
    ) -> PinningServerVerifier {
        let provider = default_provider();
        let chain = webpki_verifier(Arc::new(roots), Arc::clone(&provider)).unwrap();
        PinningServerVerifier::new(
            Arc::new(TrustedEndpoint::new(host_url)),
            chain,
            provider,
            checker,
        )
    }

    fn verify(v: &PinningServerVerifier, leaf: &CertificateDer<'_>) -> Result<ServerCertVerified, rustls::Error> {
        let name = ServerName::try_from("mail.proton.me").unwrap();
        v.verify_server_cert(leaf, &[], &name, &[], UnixTime::now())
    }

    #[test]
    fn server_host_formats() {
        assert_eq!(server_host(&ServerName::try_from("proton.me").unwrap()), "proton.me");
        assert_eq!(server_host(&ServerName::try_from("127.0.0.1").unwrap()), "127.0.0.1");
        assert_eq!(server_host(&ServerName::try_from("::1").unwrap()), "::1");
    }

    #[test]
    fn skip_verifier_accepts_any_chain() {
        let (leaf, _) = leaf_and_ca();
        let v = SkipChainVerifier::new(default_provider());
        let name = ServerName::try_from("anything.example").unwrap();
        assert!(v.verify_server_cert(&leaf, &[], &name, &[], UnixTime::now()).is_ok());
        assert!(!v.supported_verify_schemes().is_empty());
    }

    #[test]
    fn same_domain_requires_chain_to_roots() {
        let (leaf, ca) = leaf_and_ca();
        let pins = Arc::new(SpkiPinSet::from_certificates([&leaf]).unwrap());
        let checker: Arc<dyn CertificateChecker> = Arc::new(TlsPinChecker::new(pins));

        // Mozilla roots do not include the test CA
        let v = verifier("https://api.proton.me", mozilla_roots(), Arc::clone(&checker));
        assert!(verify(&v, &leaf).is_err());

        let mut roots = RootCertStore::empty();
        roots.add(ca).unwrap();
        let v = verifier("https://api.proton.me", roots, checker);
        assert!(verify(&v, &leaf).is_ok());
    }

    #[test]
    fn other_domain_skips_chain_but_checks_pin() {
        let (leaf, _) = leaf_and_ca();
        let (other, _) = leaf_and_ca();
        let pins = Arc::new(SpkiPinSet::from_certificates([&leaf]).unwrap());
        let checker: Arc<dyn CertificateChecker> = Arc::new(TlsPinChecker::new(pins));

        let v = verifier("https://api.protonmail.com", mozilla_roots(), checker);
        assert!(verify(&v, &leaf).is_ok());
        assert!(matches!(
            verify(&v, &other),
            Err(rustls::Error::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure
            ))
        ));
    }

    #[test]
    fn permissive_policy_still_verifies_chain_for_trusted_domain() {
        let (leaf, _) = leaf_and_ca();
        let v = verifier("https://proton.me", mozilla_roots(), Arc::new(PermissiveChecker));
        assert!(verify(&v, &leaf).is_err());

        let v = verifier("https://example.com", mozilla_roots(), Arc::new(PermissiveChecker));
        assert!(verify(&v, &leaf).is_ok());
    }
}
