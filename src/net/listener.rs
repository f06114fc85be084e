//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to an entry point's configured address
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore

use std::io;
use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::config::EntryPointConfig;

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("invalid address `{address}`: {source}")]
    InvalidAddress {
        address: String,
        source: AddrParseError,
    },

    #[error("failed to bind {address}: {source}")]
    Bind { address: String, source: io::Error },

    #[error("failed to accept: {0}")]
    Accept(#[source] io::Error),

    #[error("connection limit closed")]
    Closed,
}

/// A bounded TCP listener that limits concurrent connections.
///
/// When the limit is reached, accepting waits until a slot becomes available.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &EntryPointConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config
            .address
            .parse()
            .map_err(|source| ListenerError::InvalidAddress {
                address: config.address.clone(),
                source,
            })?;

        let bind_error = |source| ListenerError::Bind {
            address: config.address.clone(),
            source,
        };
        let inner = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = inner.local_addr().map_err(bind_error)?;

        Ok(Self {
            inner,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
            local_addr,
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        // Acquire permit first (backpressure)
        let permit = Arc::clone(&self.connection_limit)
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::trace!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A connection slot, released back to the listener when dropped.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_ephemeral_port_and_limits_connections() {
        let mut config = EntryPointConfig::new("127.0.0.1:0");
        config.max_connections = 1;
        let listener = Listener::bind(&config).await.unwrap();
        let addr = listener.local_addr();
        assert_ne!(addr.port(), 0);

        let _client = TcpStream::connect(addr).await.unwrap();
        let (_stream, _, permit) = listener.accept().await.unwrap();
        assert_eq!(listener.available_permits(), 0);
        drop(permit);
        assert_eq!(listener.available_permits(), 1);
    }

    #[tokio::test]
    async fn reports_address_in_use() {
        let first = Listener::bind(&EntryPointConfig::new("127.0.0.1:0")).await.unwrap();
        let taken = EntryPointConfig::new(first.local_addr().to_string());
        let err = Listener::bind(&taken).await.unwrap_err();
        assert!(matches!(err, ListenerError::Bind { .. }), "{err}");
    }

    #[tokio::test]
    async fn rejects_unparsable_address() {
        let err = Listener::bind(&EntryPointConfig::new("localhost")).await.unwrap_err();
        assert!(matches!(err, ListenerError::InvalidAddress { .. }));
    }
}
