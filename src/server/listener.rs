// src/server/listener.rs

//! A TCP listener that optionally terminates TLS before axum ever sees the
//! connection, so the main API port can serve plain or TLS traffic from the
//! same bind depending on `config.tls.enabled`.

use super::stream::AnyStream;
use axum::serve::Listener;
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::warn;

pub struct TlsOrTcpListener {
    inner: TcpListener,
    acceptor: Option<TlsAcceptor>,
}

impl TlsOrTcpListener {
    pub fn new(inner: TcpListener, acceptor: Option<TlsAcceptor>) -> Self {
        Self { inner, acceptor }
    }
}

impl Listener for TlsOrTcpListener {
    type Io = AnyStream;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            let (socket, addr) = match self.inner.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("failed to accept TCP connection: {e}");
                    continue;
                }
            };

            match &self.acceptor {
                None => return (AnyStream::Tcp(socket), addr),
                Some(acceptor) => match acceptor.accept(socket).await {
                    Ok(tls) => return (AnyStream::Tls(Box::new(tls)), addr),
                    Err(e) => {
                        warn!(%addr, "TLS handshake failed: {e}");
                        continue;
                    }
                },
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}
