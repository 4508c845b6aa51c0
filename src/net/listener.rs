//! TCP listener.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections and stamp them with identities
//!
//! Connection limits are not enforced here; every accepted connection goes
//! through the admission gate instead.

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::net::connection::Connection;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    Bind(std::io::Error),
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(std::io::Error),
}

/// Accepts connections and hands them out as [`Connection`]s.
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind to an address such as `0.0.0.0:8080`.
    pub async fn bind(bind_address: &str) -> Result<Self, ListenerError> {
        let addr: SocketAddr = bind_address.parse().map_err(|e| {
            ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self { inner: listener })
    }

    /// Accept the next connection.
    pub async fn accept(&self) -> Result<Connection, ListenerError> {
        let (stream, peer) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        let connection = Connection::new(stream, peer);

        tracing::debug!(
            peer_addr = %peer,
            connection_id = %connection.id,
            correlation_id = %connection.correlation_id,
            "Connection accepted"
        );

        Ok(connection)
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }
}
