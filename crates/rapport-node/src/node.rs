//! Rapport Node - the main application entry point.
//!
//! Architecture:
//! - Single daemon process with shared RocksDB storage
//! - HTTP API for clients (auth, connections, network, queries, admin)
//! - Unix admin socket for local admin ops (rapport-admin CLI)

use crate::admin_socket::AdminSocket;
use crate::api;
use crate::auth::TokenSigner;
use crate::error::{Error, Result};
use crate::storage::Storage;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;

/// Configuration for a Rapport node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Data directory for storage
    pub data_dir: PathBuf,

    /// HTTP API listen address
    pub api_addr: SocketAddr,

    /// Admin socket path (for rapport-admin CLI)
    pub admin_socket: PathBuf,

    /// Lifetime of issued bearer tokens
    pub token_ttl_secs: u64,

    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
}

const DEFAULT_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = PathBuf::from(
            lookup("RAPPORT_DATA_DIR").unwrap_or_else(|| "./rapport-data".to_string()),
        );

        let api_addr = lookup("RAPPORT_API_ADDR")
            .unwrap_or_else(|| "0.0.0.0:5000".to_string())
            .parse()
            .map_err(|e| Error::Config(format!("invalid RAPPORT_API_ADDR: {}", e)))?;

        let admin_socket = lookup("RAPPORT_ADMIN_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("admin.sock"));

        let token_ttl_secs = match lookup("RAPPORT_TOKEN_TTL_SECS") {
            Some(raw) => raw
                .parse()
                .map_err(|e| Error::Config(format!("invalid RAPPORT_TOKEN_TTL_SECS: {}", e)))?,
            None => DEFAULT_TOKEN_TTL_SECS,
        };

        let cors_origins = lookup("RAPPORT_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            data_dir,
            api_addr,
            admin_socket,
            token_ttl_secs,
            cors_origins,
        })
    }

    /// Defaults rooted at `data_dir`, ignoring the environment.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            admin_socket: data_dir.join("admin.sock"),
            data_dir,
            api_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            cors_origins: Vec::new(),
        }
    }
}

/// Shared state for the node - single storage instance shared by all components.
pub struct NodeState {
    pub storage: Arc<Storage>,
    pub config: NodeConfig,
    pub tokens: TokenSigner,
}

/// Router state handed to every handler.
pub type AppState = Arc<NodeState>;

impl NodeState {
    /// Build state around opened storage, loading the node signing key.
    pub fn new(storage: Arc<Storage>, config: NodeConfig) -> Result<Self> {
        let tokens = TokenSigner::new(storage.get_or_create_node_key()?, config.token_ttl_secs);
        Ok(Self {
            storage,
            config,
            tokens,
        })
    }
}

/// A Rapport node instance.
pub struct RapportNode {
    state: AppState,
}

impl RapportNode {
    /// Create a new node, opening storage under the configured data directory.
    pub fn new(config: NodeConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let storage = Arc::new(Storage::open(config.data_dir.join("db"))?);
        let state = Arc::new(NodeState::new(storage, config)?);

        Ok(Self { state })
    }

    /// Get the shared state (for API handlers).
    pub fn state(&self) -> AppState {
        Arc::clone(&self.state)
    }

    /// Run the node (starts HTTP server and admin socket).
    pub async fn run(self) -> Result<()> {
        let config = &self.state.config;
        tracing::info!("Rapport node starting");
        tracing::info!("  API: http://{}", config.api_addr);
        tracing::info!("  Admin: {:?}", config.admin_socket);
        tracing::info!("  Data: {:?}", config.data_dir);

        let admin_socket = AdminSocket::new(
            Arc::clone(&self.state.storage),
            config.admin_socket.clone(),
        );
        tokio::spawn(async move {
            if let Err(e) = admin_socket.run().await {
                tracing::error!("Admin socket error: {}", e);
            }
        });

        let app = api::build_router(self.state());

        let listener = tokio::net::TcpListener::bind(config.api_addr).await?;
        tracing::info!("HTTP server listening on {}", config.api_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Rapport node stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
