//! Rapport connection graph
//!
//! Directed connection requests between accounts, their promotion to
//! adjacency on acceptance, and the two-hop network of an account.
//!
//! # Model
//!
//! - **Accounts** carry an adjacency list (`connections`) of direct peers.
//! - **The ledger** records every [`ConnectionRequest`] with its
//!   [`ConnectionStatus`]: `pending`, then `accepted` or `rejected`, both
//!   terminal. At most one request exists per unordered pair of accounts.
//!
//! # Services
//!
//! - [`ConnectionService`] drives the request lifecycle. Accepting a request
//!   appends the accepter to the requester's adjacency list only.
//! - [`NetworkService`] reads adjacency lists and computes direct plus
//!   second-hop connections, deduplicated.
//!
//! Both services take their storage as an explicit `Arc` handle implementing
//! [`AccountDirectory`] and [`ConnectionLedger`]. [`MemoryStore`] is the
//! in-process implementation.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use rapport_graph::{Account, AccountDirectory, ConnectionService, MemoryStore, NetworkService};
//!
//! let store = Arc::new(MemoryStore::new());
//! for id in ["ada", "bo"] {
//!     let account = Account::new(id.into(), id.into(), format!("{id}@example.com"), 0);
//!     store.save_account(&account).unwrap();
//! }
//!
//! let connections = ConnectionService::new(Arc::clone(&store));
//! connections.request_connection(&"ada".into(), &"bo".into()).unwrap();
//! connections.accept_connection(&"bo".into(), &"ada".into()).unwrap();
//!
//! let network = NetworkService::new(store).compute_network(&"ada".into()).unwrap();
//! assert_eq!(network.network_size, 1);
//! ```

mod account;
mod connections;
mod error;
mod memory;
mod network;
mod request;
mod store;

pub use account::{Account, AccountId, AccountSummary, Role, DEFAULT_IMAGE};
pub use connections::{ConnectionList, ConnectionService};
pub use error::{GraphError, Result};
pub use memory::MemoryStore;
pub use network::{NetworkService, NetworkView};
pub use request::{pair_key, ConnectionRequest, ConnectionStatus};
pub use store::{resolve_summaries, AccountDirectory, ConnectionLedger};

/// Current time in unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
