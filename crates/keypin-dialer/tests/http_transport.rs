//! The reqwest transport pins inside the handshake.

mod support;

use std::sync::Arc;

use keypin_core::SpkiPinSet;
use keypin_dialer::transport::build_http_client;
use keypin_dialer::{PinningTlsDialer, TransportSettings};
use support::{TlsServer, BODY};

fn settings() -> TransportSettings {
    TransportSettings::default().env_proxy(false)
}

#[tokio::test]
async fn pinned_request_succeeds() {
    let server = TlsServer::start().await;
    let dialer = PinningTlsDialer::builder("https://localhost")
        .root_store(server.pki.roots())
        .pins(Arc::new(
            SpkiPinSet::from_certificates([&server.pki.leaf]).unwrap(),
        ))
        .build()
        .unwrap();
    let client = build_http_client(&dialer, &settings()).unwrap();

    let response = client
        .get(format!("https://{}/", server.address()))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert_eq!(response.bytes().await.unwrap().as_ref(), BODY);
}

#[tokio::test]
async fn skipped_chain_still_pinned() {
    let server = TlsServer::start().await;
    let dialer = PinningTlsDialer::builder("https://mail-api.proton.me")
        .pins(Arc::new(
            SpkiPinSet::from_certificates([&server.pki.leaf]).unwrap(),
        ))
        .build()
        .unwrap();
    let client = build_http_client(&dialer, &settings()).unwrap();

    let response = client
        .get(format!("https://{}/", server.address()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.bytes().await.unwrap().as_ref(), BODY);
}

#[tokio::test]
async fn unpinned_server_is_refused() {
    let server = TlsServer::start().await;
    let dialer = PinningTlsDialer::builder("https://mail-api.proton.me")
        .pins(Arc::new(
            SpkiPinSet::from_certificates([&server.pki.ca]).unwrap(),
        ))
        .build()
        .unwrap();
    let client = build_http_client(&dialer, &settings()).unwrap();

    let result = client
        .get(format!("https://{}/", server.address()))
        .send()
        .await;
    assert!(result.is_err(), "pin mismatch must abort the request");
}
