//! Rapport Node - accounts, connections, and an admin inbox over HTTP
//!
//! Hosts the [`rapport_graph`] services on RocksDB storage behind an axum API.
//!
//! # Architecture
//!
//! - **Models**: Node-side records (Profile, Query)
//! - **Storage**: RocksDB-backed persistent storage, implementing the graph
//!   store traits
//! - **Auth**: Argon2 password hashes and ed25519-signed bearer tokens
//! - **API**: HTTP endpoints for auth, connections, network, admin, queries
//! - **Admin Socket**: Unix socket for local admin commands (rapport-admin CLI)
//!
//! # Example
//!
//! ```no_run
//! use rapport_node::{NodeConfig, RapportNode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::from_env()?;
//!     let node = RapportNode::new(config)?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod models;
pub mod storage;
pub mod auth;
pub mod node;
pub mod api;
pub mod admin_socket;
pub mod error;

pub use models::{Profile, Query};
pub use storage::Storage;
pub use node::{AppState, NodeConfig, NodeState, RapportNode};
pub use error::{Error, Result};
