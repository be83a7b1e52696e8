//! Storage seams consumed by the services.

use crate::account::{Account, AccountId, AccountSummary};
use crate::error::Result;
use crate::request::ConnectionRequest;

/// Persisted account records.
pub trait AccountDirectory: Send + Sync {
    /// Look up an account by id.
    fn find_account(&self, id: &AccountId) -> Result<Option<Account>>;

    /// Look up an account by its (lowercased) email.
    fn find_account_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Insert or overwrite an account.
    fn save_account(&self, account: &Account) -> Result<()>;
}

/// Persisted connection requests.
pub trait ConnectionLedger: Send + Sync {
    /// Insert `request` unless a request already exists between the unordered
    /// pair `{sender, receiver}` in any state.
    ///
    /// Returns `false` without writing if the pair is taken.
    fn insert_request_if_absent(&self, request: &ConnectionRequest) -> Result<bool>;

    /// The request sent by `sender` to `receiver`, if any.
    fn find_request(
        &self,
        sender: &AccountId,
        receiver: &AccountId,
    ) -> Result<Option<ConnectionRequest>>;

    /// The request between `a` and `b` in either direction, if any.
    fn find_request_between(
        &self,
        a: &AccountId,
        b: &AccountId,
    ) -> Result<Option<ConnectionRequest>>;

    /// Overwrite the stored status and timestamps of an existing request.
    fn update_request(&self, request: &ConnectionRequest) -> Result<()>;

    /// Every request where `account` is sender or receiver.
    fn requests_involving(&self, account: &AccountId) -> Result<Vec<ConnectionRequest>>;
}

/// Resolve `ids` to summaries in order, skipping ids with no account.
pub fn resolve_summaries<'a, D, I>(directory: &D, ids: I) -> Result<Vec<AccountSummary>>
where
    D: AccountDirectory + ?Sized,
    I: IntoIterator<Item = &'a AccountId>,
{
    let mut summaries = Vec::new();
    for id in ids {
        match directory.find_account(id)? {
            Some(account) => summaries.push(account.summary()),
            None => tracing::warn!(account = %id, "skipping dangling account reference"),
        }
    }
    Ok(summaries)
}
