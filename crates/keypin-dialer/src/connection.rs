//! Established TLS connection plus the trust state of its handshake.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use keypin_core::{ConnectionTrustState, HandshakeState};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

/// A TLS client connection returned by the dialers.
pub struct TlsConnection {
    stream: TlsStream<TcpStream>,
    trust: ConnectionTrustState,
    verification_skipped: bool,
    peer_addr: SocketAddr,
}

impl TlsConnection {
    /// Wrap a completed handshake.
    ///
    /// When chain verification was enforced, a completed handshake means the
    /// WebPKI verifier accepted the presented chain, so it is recorded as the
    /// verified chain.
    pub(crate) fn new(
        stream: TlsStream<TcpStream>,
        verification_skipped: bool,
        peer_addr: SocketAddr,
    ) -> Self {
        let presented = stream
            .get_ref()
            .1
            .peer_certificates()
            .map(<[_]>::to_vec)
            .unwrap_or_default();
        let trust = if verification_skipped {
            ConnectionTrustState::unverified(presented)
        } else {
            ConnectionTrustState::verified(presented)
        };
        Self {
            stream,
            trust,
            verification_skipped,
            peer_addr,
        }
    }

    /// Whether this connection was dialed with chain verification skipped
    #[must_use]
    pub const fn verification_skipped(&self) -> bool {
        self.verification_skipped
    }

    /// Certificates and chains from the handshake
    #[must_use]
    pub const fn trust(&self) -> &ConnectionTrustState {
        &self.trust
    }

    /// Remote socket address
    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Negotiated ALPN protocol, if any
    #[must_use]
    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        self.stream.get_ref().1.alpn_protocol()
    }

    /// Unwrap into the underlying tokio-rustls stream
    #[must_use]
    pub fn into_inner(self) -> TlsStream<TcpStream> {
        self.stream
    }
}

impl HandshakeState for TlsConnection {
    fn trust_state(&self) -> Option<&ConnectionTrustState> {
        Some(&self.trust)
    }
}

impl std::fmt::Debug for TlsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnection")
            .field("peer_addr", &self.peer_addr)
            .field("verification_skipped", &self.verification_skipped)
            .field("peer_certificates", &self.trust.peer_certificates.len())
            .finish_non_exhaustive()
    }
}

impl AsyncRead for TlsConnection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for TlsConnection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}
