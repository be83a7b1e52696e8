//! Query model - messages from the public contact form.

use serde::{Deserialize, Serialize};

/// A contact-form submission, linked into every admin's inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: String,
    pub message: String,
    /// Unix milliseconds
    pub created_at: u64,
}

impl Query {
    /// Create a query with a fresh id, stamped now.
    pub fn new(name: String, email: String, subject: String, message: String) -> Self {
        let id = super::generate_id(&format!("query:{email}"));
        Self {
            id,
            name,
            email,
            subject,
            message,
            created_at: rapport_graph::now_millis(),
        }
    }
}
