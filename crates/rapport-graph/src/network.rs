//! Two-hop network expansion over adjacency lists.
//!
//! The extended network of an account U with direct connections D is
//!
//! ```text
//! N = D ∪ ⋃ { c.connections \ {U} : c ∈ D }
//! ```
//!
//! Traversal stops at exactly two hops. Only adjacency lists are read; the
//! ledger plays no part.

use crate::account::{Account, AccountId, AccountSummary};
use crate::error::{GraphError, Result};
use crate::store::{resolve_summaries, AccountDirectory};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Result of a network expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkView {
    /// Direct connections, in adjacency order
    #[serde(rename = "directConnections")]
    pub direct: Vec<AccountSummary>,

    /// Number of resolved members of the two-hop network
    pub network_size: usize,

    /// Members of the two-hop network, ordered by id
    pub network: Vec<AccountSummary>,
}

/// Read-only computation of an account's extended network.
pub struct NetworkService<D> {
    directory: Arc<D>,
}

impl<D: AccountDirectory> NetworkService<D> {
    pub fn new(directory: Arc<D>) -> Self {
        Self { directory }
    }

    /// Direct connections, network size, and network members of `user`.
    pub fn compute_network(&self, user: &AccountId) -> Result<NetworkView> {
        let account = self.load(user)?;

        let direct = resolve_summaries(self.directory.as_ref(), &account.connections)?;
        let reachable = self.expand(&account)?;
        let network = resolve_summaries(self.directory.as_ref(), &reachable)?;

        tracing::debug!(
            account = %user,
            direct = direct.len(),
            network = network.len(),
            "network computed"
        );

        Ok(NetworkView {
            direct,
            network_size: network.len(),
            network,
        })
    }

    fn load(&self, user: &AccountId) -> Result<Account> {
        self.directory
            .find_account(user)?
            .ok_or_else(|| GraphError::NotFound(format!("account {user}")))
    }

    fn expand(&self, account: &Account) -> Result<BTreeSet<AccountId>> {
        let mut reachable = BTreeSet::new();
        for direct in &account.connections {
            reachable.insert(direct.clone());

            let Some(peer) = self.directory.find_account(direct)? else {
                continue;
            };
            reachable.extend(peer.connections.into_iter().filter(|id| id != &account.id));
        }
        Ok(reachable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use proptest::prelude::*;

    fn id(s: &str) -> AccountId {
        AccountId::from(s)
    }

    fn store_with(edges: &[(&str, &[&str])]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for (owner, peers) in edges {
            let mut account =
                Account::new(id(owner), owner.to_string(), format!("{owner}@example.com"), 0);
            for peer in *peers {
                account.add_connection(id(peer));
            }
            store.save_account(&account).unwrap();
        }
        store
    }

    #[test]
    fn empty_adjacency_yields_empty_network() {
        let service = NetworkService::new(store_with(&[("u", &[])]));
        let view = service.compute_network(&id("u")).unwrap();
        assert!(view.direct.is_empty());
        assert!(view.network.is_empty());
        assert_eq!(view.network_size, 0);
    }

    #[test]
    fn unknown_account_is_not_found() {
        let service = NetworkService::new(store_with(&[]));
        assert!(matches!(
            service.compute_network(&id("ghost")),
            Err(GraphError::NotFound(_))
        ));
    }

    #[test]
    fn includes_second_hop_and_excludes_self() {
        let service = NetworkService::new(store_with(&[
            ("u", &["a", "b"]),
            ("a", &["u", "c"]),
            ("b", &["c", "d"]),
            ("c", &[]),
            ("d", &["e"]),
            ("e", &[]),
        ]));

        let view = service.compute_network(&id("u")).unwrap();
        let ids: Vec<_> = view.network.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(view.network_size, 4);

        let direct: Vec<_> = view.direct.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(direct, vec!["a", "b"]);
    }

    #[test]
    fn dangling_references_are_skipped() {
        let service = NetworkService::new(store_with(&[("u", &["a", "gone"]), ("a", &["x"])]));
        let view = service.compute_network(&id("u")).unwrap();
        assert_eq!(view.direct.len(), 1);
        // "gone" and "x" are reached but have no account
        assert_eq!(view.network_size, 1);
        assert_eq!(view.network[0].id, id("a"));
    }

    fn arb_graph() -> impl Strategy<Value = Vec<Vec<usize>>> {
        (1usize..8).prop_flat_map(|n| {
            proptest::collection::vec(proptest::collection::vec(0..n, 0..n), n)
        })
    }

    proptest! {
        #[test]
        fn expansion_is_idempotent_and_self_free(graph in arb_graph()) {
            let names: Vec<String> = (0..graph.len()).map(|i| format!("n{i}")).collect();
            let store = Arc::new(MemoryStore::new());
            for (i, peers) in graph.iter().enumerate() {
                let mut account = Account::new(
                    id(&names[i]),
                    names[i].clone(),
                    format!("{}@example.com", names[i]),
                    0,
                );
                for p in peers {
                    account.add_connection(id(&names[*p]));
                }
                store.save_account(&account).unwrap();
            }
            let service = NetworkService::new(store);

            for name in &names {
                let first = service.compute_network(&id(name)).unwrap();
                let second = service.compute_network(&id(name)).unwrap();
                prop_assert_eq!(&first, &second);
                prop_assert_eq!(first.network_size, first.network.len());

                let members: BTreeSet<_> = first.network.iter().map(|s| s.id.clone()).collect();
                prop_assert_eq!(members.len(), first.network.len());
                for d in &first.direct {
                    prop_assert!(members.contains(&d.id));
                }
                // self only appears through an explicit self-loop in the direct set
                if !first.direct.iter().any(|d| d.id.as_str() == name) {
                    prop_assert!(!members.contains(&id(name)));
                }
            }
        }
    }
}
