//! Server Implementation Module
//!
//! Accepts device connections over WebSocket and runs one session per
//! connection.
//!
//! # Architecture
//!
//! ```text
//! AirMouseServer
//!   ├─> TcpListener (listen_addr)
//!   ├─> Connection limit (max_connections)
//!   ├─> SessionRegistry (status snapshots + change events)
//!   ├─> SharedPointer (one OS pointer, serialized across sessions)
//!   └─> Open connections (cancelled and drained on shutdown)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use airmouse_server::config::Config;
//! use airmouse_server::server::AirMouseServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml")?;
//!     let server = AirMouseServer::new(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

mod connection;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::input::{create_backend, SharedPointer};
use crate::session::{SessionContext, SessionRegistry};

/// Handle that stops a running [`AirMouseServer`]
#[derive(Clone)]
pub struct ShutdownHandle(CancellationToken);

impl ShutdownHandle {
    /// Stop accepting connections and close the open ones
    ///
    /// [`AirMouseServer::run`] returns once every session has released its
    /// held buttons and left the registry.
    pub fn shutdown(&self) {
        info!("Initiating graceful shutdown");
        self.0.cancel();
    }
}

/// AirMouse server
pub struct AirMouseServer {
    config: Arc<Config>,
    listener: TcpListener,
    ctx: SessionContext,
    limit: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl AirMouseServer {
    /// Create a server using the configured pointer backend
    pub async fn new(config: Config) -> Result<Self> {
        let pointer = create_backend(&config.input.backend)
            .context("Failed to initialize pointer backend")?;
        Self::with_pointer(config, pointer).await
    }

    /// Create a server around an existing pointer backend
    pub async fn with_pointer(config: Config, pointer: SharedPointer) -> Result<Self> {
        info!("Initializing AirMouse server");

        let listener = TcpListener::bind(&config.server.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", config.server.listen_addr))?;

        let registry = Arc::new(SessionRegistry::new());
        let ctx = SessionContext::new(&config, registry, pointer);
        let limit = Arc::new(Semaphore::new(config.server.max_connections));

        Ok(Self {
            config: Arc::new(config),
            listener,
            ctx,
            limit,
            shutdown: CancellationToken::new(),
        })
    }

    /// Address actually bound
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read listener address")
    }

    /// Live session registry
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.ctx.registry)
    }

    /// Handle for stopping [`AirMouseServer::run`]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown.clone())
    }

    /// Accept connections until shut down, then wait for open sessions
    /// to tear down
    pub async fn run(self) -> Result<()> {
        info!("╔════════════════════════════════════════════════════════════╗");
        info!("║          AirMouse Server is Starting                       ║");
        info!("╚════════════════════════════════════════════════════════════╝");
        info!("  Listen Address: ws://{}", self.local_addr()?);
        info!("  Max Connections: {}", self.config.server.max_connections);
        info!("  Pointer Backend: {}", self.config.input.backend);
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("Waiting for devices to connect...");

        let Self {
            config,
            listener,
            ctx,
            limit,
            shutdown,
        } = self;
        let mut connections = JoinSet::new();

        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Accept failed: {}", e);
                        continue;
                    }
                },
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = finished {
                        error!("Connection task failed: {}", e);
                    }
                    continue;
                }
                _ = shutdown.cancelled() => break,
            };

            let Ok(permit) = Arc::clone(&limit).try_acquire_owned() else {
                warn!(
                    "Rejecting {}: connection limit ({}) reached",
                    peer, config.server.max_connections
                );
                drop(stream);
                continue;
            };

            if let Err(e) = stream.set_nodelay(true) {
                debug!("Failed to set TCP_NODELAY for {}: {}", peer, e);
            }

            debug!("Accepted connection from {}", peer);
            connections.spawn(connection::serve_connection(
                stream,
                peer,
                ctx.clone(),
                config.server.queue_depth,
                shutdown.clone(),
                permit,
            ));
        }

        drop(listener);
        info!(
            "Stopped accepting connections, closing {} session(s)",
            connections.len()
        );
        while let Some(finished) = connections.join_next().await {
            if let Err(e) = finished {
                error!("Connection task failed: {}", e);
            }
        }

        info!("All sessions closed");
        Ok(())
    }
}
