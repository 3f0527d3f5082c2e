//! Gateway - TCP listener that accepts incoming connections.
//!
//! Binds the configured socket and spawns a connection task per client.
//! Connection-rate limiting happens here, before any handshake work.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::dispatcher::Dispatcher;
use crate::hub::Hub;
use crate::messenger::LineMessenger;
use crate::net::connection;
use crate::net::limit::RateLimitManager;

/// Shared context handed to every connection task.
pub(crate) struct Shared {
    pub hub: Arc<Hub>,
    pub messenger: Arc<LineMessenger>,
    pub dispatcher: Dispatcher,
    pub limits: Arc<RateLimitManager>,
}

/// The Gateway accepts incoming TCP connections and spawns handlers.
pub struct Gateway {
    listener: TcpListener,
    shared: Arc<Shared>,
}

impl Gateway {
    /// Bind the gateway to the configured listen address.
    pub async fn bind(hub: Arc<Hub>, messenger: Arc<LineMessenger>) -> anyhow::Result<Self> {
        let addr = hub.config.server.listen;
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "Gateway listening");

        let shared = Arc::new(Shared {
            dispatcher: Dispatcher::new(Arc::clone(&hub)),
            limits: Arc::new(RateLimitManager::new(hub.config.rate_limits.clone())),
            hub,
            messenger,
        });

        Ok(Self { listener, shared })
    }

    /// The actually bound address (useful with port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The gateway's rate limiter, for maintenance tasks.
    pub fn rate_limits(&self) -> Arc<RateLimitManager> {
        Arc::clone(&self.shared.limits)
    }

    /// Run the gateway, accepting connections forever.
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    // Gate on connection rate before spending any work on
                    // the handshake.
                    if !self.shared.limits.check_connection_rate(addr.ip()) {
                        warn!(%addr, "Connection rate limit exceeded, rejecting");
                        drop(stream);
                        continue;
                    }

                    let shared = Arc::clone(&self.shared);
                    tokio::spawn(async move {
                        connection::handle(stream, addr, shared).await;
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                }
            }
        }
    }
}
