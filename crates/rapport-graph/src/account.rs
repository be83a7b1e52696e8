//! Account records and their display projection.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Image assigned to accounts that never set one.
pub const DEFAULT_IMAGE: &str = "/default-avatar.png";

/// Opaque unique identifier of an account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Role of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted user account.
///
/// `connections` is the adjacency list: the ids of accounts this account is
/// directly connected to. The size of the extended network is never stored
/// here; it is computed on read by [`crate::NetworkService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,

    pub name: String,

    /// Lowercased, unique across accounts
    pub email: String,

    #[serde(default = "default_image")]
    pub image: String,

    #[serde(default)]
    pub bio: String,

    #[serde(default)]
    pub role: Role,

    /// Direct accepted connections, in the order they were added
    #[serde(default)]
    pub connections: Vec<AccountId>,

    /// Creation time in unix milliseconds
    pub created_at: u64,
}

fn default_image() -> String {
    DEFAULT_IMAGE.to_string()
}

impl Account {
    /// Create an account with no connections and the default image.
    pub fn new(id: AccountId, name: String, email: String, created_at: u64) -> Self {
        Self {
            id,
            name,
            email,
            image: default_image(),
            bio: String::new(),
            role: Role::User,
            connections: Vec::new(),
            created_at,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether `other` is in the adjacency list.
    pub fn is_connected_to(&self, other: &AccountId) -> bool {
        self.connections.contains(other)
    }

    /// Append `other` to the adjacency list unless already present.
    ///
    /// Returns `true` if the list changed.
    pub fn add_connection(&mut self, other: AccountId) -> bool {
        if self.is_connected_to(&other) {
            return false;
        }
        self.connections.push(other);
        true
    }

    /// Remove `other` from the adjacency list.
    ///
    /// Returns `true` if the list changed.
    pub fn remove_connection(&mut self, other: &AccountId) -> bool {
        let before = self.connections.len();
        self.connections.retain(|id| id != other);
        self.connections.len() != before
    }

    /// Display projection with no sensitive fields.
    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            image: self.image.clone(),
        }
    }
}

/// Public projection of an account: `{id, name, email, image}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub image: String,
}
