//! Connection request lifecycle: request, accept, reject, list, disconnect.

use crate::account::{AccountId, AccountSummary};
use crate::error::{GraphError, Result};
use crate::now_millis;
use crate::request::{ConnectionRequest, ConnectionStatus};
use crate::store::{resolve_summaries, AccountDirectory, ConnectionLedger};
use serde::Serialize;
use std::sync::Arc;

/// Accepted peers and incoming pending requests of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionList {
    /// The other party of every accepted request involving the account
    #[serde(rename = "connections")]
    pub accepted: Vec<AccountSummary>,

    /// Senders of pending requests addressed to the account
    #[serde(rename = "pendingConnections")]
    pub pending_incoming: Vec<AccountSummary>,
}

/// Owns the lifecycle of connection requests between accounts.
pub struct ConnectionService<S> {
    store: Arc<S>,
}

impl<S> ConnectionService<S>
where
    S: AccountDirectory + ConnectionLedger,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Send a connection request from `requester` to `target`.
    ///
    /// Fails with `NotFound` if `target` or `requester` does not exist,
    /// `InvalidOperation` if they are the same account, and `Conflict` if any
    /// request already exists between the two, whatever its status.
    pub fn request_connection(
        &self,
        requester: &AccountId,
        target: &AccountId,
    ) -> Result<ConnectionRequest> {
        if self.store.find_account(target)?.is_none() {
            return Err(GraphError::NotFound(format!("account {target}")));
        }
        if self.store.find_account(requester)?.is_none() {
            return Err(GraphError::NotFound(format!("account {requester}")));
        }
        if requester == target {
            return Err(GraphError::InvalidOperation(
                "cannot connect with yourself".into(),
            ));
        }
        if self.store.find_request_between(requester, target)?.is_some() {
            return Err(GraphError::Conflict("connection already exists".into()));
        }

        let request = ConnectionRequest::pending(requester.clone(), target.clone(), now_millis());
        // The pre-check above can race; the conditional insert is authoritative.
        if !self.store.insert_request_if_absent(&request)? {
            return Err(GraphError::Conflict("connection already exists".into()));
        }

        tracing::info!(sender = %requester, receiver = %target, "connection requested");
        Ok(request)
    }

    /// Accept the pending request sent by `requester` to `accepter`.
    ///
    /// Only the requester's adjacency list gains the accepter; the accepter's
    /// list is left as it is.
    pub fn accept_connection(
        &self,
        accepter: &AccountId,
        requester: &AccountId,
    ) -> Result<ConnectionRequest> {
        let request = self.resolve_pending(accepter, requester, ConnectionStatus::Accepted)?;

        match self.store.find_account(requester)? {
            Some(mut account) => {
                if account.add_connection(accepter.clone()) {
                    self.store.save_account(&account)?;
                }
            }
            None => tracing::warn!(
                requester = %requester,
                "requester vanished before adjacency update"
            ),
        }

        tracing::info!(sender = %requester, receiver = %accepter, "connection accepted");
        Ok(request)
    }

    /// Reject the pending request sent by `requester` to `accepter`.
    ///
    /// Terminal: the pair can never be requested again.
    pub fn reject_connection(
        &self,
        accepter: &AccountId,
        requester: &AccountId,
    ) -> Result<ConnectionRequest> {
        let request = self.resolve_pending(accepter, requester, ConnectionStatus::Rejected)?;
        tracing::info!(sender = %requester, receiver = %accepter, "connection rejected");
        Ok(request)
    }

    /// Accepted peers plus incoming pending requests of `user`.
    ///
    /// Outgoing pending requests are not included.
    pub fn list_connections(&self, user: &AccountId) -> Result<ConnectionList> {
        let requests = self.store.requests_involving(user)?;

        let accepted_ids = requests
            .iter()
            .filter(|r| r.status == ConnectionStatus::Accepted)
            .filter_map(|r| r.counterpart(user));
        let accepted = resolve_summaries(self.store.as_ref(), accepted_ids)?;

        let pending_ids = requests
            .iter()
            .filter(|r| r.status == ConnectionStatus::Pending && &r.receiver == user)
            .map(|r| &r.sender);
        let pending_incoming = resolve_summaries(self.store.as_ref(), pending_ids)?;

        Ok(ConnectionList {
            accepted,
            pending_incoming,
        })
    }

    /// Drop the direct edge between `user` and `other` from both adjacency
    /// lists.
    ///
    /// The ledger entry for the pair is left untouched.
    pub fn disconnect(&self, user: &AccountId, other: &AccountId) -> Result<()> {
        let mut account = self
            .store
            .find_account(user)?
            .ok_or_else(|| GraphError::NotFound(format!("account {user}")))?;
        let mut peer = self
            .store
            .find_account(other)?
            .ok_or_else(|| GraphError::NotFound(format!("account {other}")))?;

        if account.remove_connection(other) {
            self.store.save_account(&account)?;
        }
        if peer.remove_connection(user) {
            self.store.save_account(&peer)?;
        }

        tracing::info!(account = %user, peer = %other, "connection removed");
        Ok(())
    }

    fn resolve_pending(
        &self,
        accepter: &AccountId,
        requester: &AccountId,
        next: ConnectionStatus,
    ) -> Result<ConnectionRequest> {
        let not_found = || GraphError::NotFound("connection request not found".into());

        let mut request = self
            .store
            .find_request(requester, accepter)?
            .filter(|r| r.status == ConnectionStatus::Pending)
            .ok_or_else(not_found)?;

        if !request.advance(next, now_millis()) {
            return Err(not_found());
        }
        self.store.update_request(&request)?;
        Ok(request)
    }
}
