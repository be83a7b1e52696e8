//! Connection requests: the entries of the ledger.

use crate::account::AccountId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a connection request.
///
/// ```text
/// pending ──► accepted
///    │
///    └──────► rejected
/// ```
///
/// Both `accepted` and `rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ConnectionStatus {
    /// Validate a transition to `next`.
    ///
    /// Returns the new status, or `None` if the state machine has no such edge.
    pub fn transition(self, next: ConnectionStatus) -> Option<ConnectionStatus> {
        match (self, next) {
            (ConnectionStatus::Pending, ConnectionStatus::Accepted)
            | (ConnectionStatus::Pending, ConnectionStatus::Rejected) => Some(next),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Pending => "pending",
            ConnectionStatus::Accepted => "accepted",
            ConnectionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed request from `sender` to `receiver`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    pub sender: AccountId,
    pub receiver: AccountId,
    pub status: ConnectionStatus,
    /// Unix milliseconds
    pub created_at: u64,
    /// Unix milliseconds of the last status change
    pub updated_at: u64,
}

impl ConnectionRequest {
    /// A new pending request.
    pub fn pending(sender: AccountId, receiver: AccountId, now: u64) -> Self {
        Self {
            sender,
            receiver,
            status: ConnectionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `account` is either party.
    pub fn involves(&self, account: &AccountId) -> bool {
        &self.sender == account || &self.receiver == account
    }

    /// The party that is not `account`, if `account` is a party at all.
    pub fn counterpart(&self, account: &AccountId) -> Option<&AccountId> {
        if &self.sender == account {
            Some(&self.receiver)
        } else if &self.receiver == account {
            Some(&self.sender)
        } else {
            None
        }
    }

    /// Move to `next` if the state machine allows it.
    ///
    /// Returns `false` and leaves the request untouched otherwise.
    pub fn advance(&mut self, next: ConnectionStatus, now: u64) -> bool {
        match self.status.transition(next) {
            Some(status) => {
                self.status = status;
                self.updated_at = now;
                true
            }
            None => false,
        }
    }
}

/// Key of the unordered pair `{a, b}`: the two ids in ascending order.
pub fn pair_key<'a>(a: &'a AccountId, b: &'a AccountId) -> (&'a AccountId, &'a AccountId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_moves_to_either_terminal_state() {
        assert_eq!(
            ConnectionStatus::Pending.transition(ConnectionStatus::Accepted),
            Some(ConnectionStatus::Accepted)
        );
        assert_eq!(
            ConnectionStatus::Pending.transition(ConnectionStatus::Rejected),
            Some(ConnectionStatus::Rejected)
        );
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [ConnectionStatus::Accepted, ConnectionStatus::Rejected] {
            for to in [
                ConnectionStatus::Pending,
                ConnectionStatus::Accepted,
                ConnectionStatus::Rejected,
            ] {
                assert_eq!(from.transition(to), None);
            }
        }
    }

    #[test]
    fn advance_stamps_update_time() {
        let mut req = ConnectionRequest::pending("a".into(), "b".into(), 10);
        assert!(req.advance(ConnectionStatus::Accepted, 20));
        assert_eq!(req.updated_at, 20);
        assert!(!req.advance(ConnectionStatus::Rejected, 30));
        assert_eq!(req.status, ConnectionStatus::Accepted);
        assert_eq!(req.updated_at, 20);
    }

    #[test]
    fn counterpart_of_each_party() {
        let req = ConnectionRequest::pending("a".into(), "b".into(), 0);
        assert_eq!(req.counterpart(&"a".into()), Some(&AccountId::from("b")));
        assert_eq!(req.counterpart(&"b".into()), Some(&AccountId::from("a")));
        assert_eq!(req.counterpart(&"c".into()), None);
    }

    #[test]
    fn pair_key_ignores_order() {
        let a = AccountId::from("a");
        let b = AccountId::from("b");
        assert_eq!(pair_key(&a, &b), pair_key(&b, &a));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&ConnectionStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
    }
}
