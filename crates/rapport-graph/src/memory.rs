//! In-process store implementing both storage traits.

use crate::account::{Account, AccountId};
use crate::error::{GraphError, Result};
use crate::request::{pair_key, ConnectionRequest};
use crate::store::{AccountDirectory, ConnectionLedger};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    accounts: HashMap<AccountId, Account>,
    /// Keyed by the ordered pair so one entry per unordered pair
    requests: BTreeMap<(AccountId, AccountId), ConnectionRequest>,
}

/// Account directory and ledger held in memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| GraphError::Unavailable("memory store lock poisoned".into()))
    }

    /// Number of ledger entries.
    pub fn request_count(&self) -> Result<usize> {
        Ok(self.lock()?.requests.len())
    }
}

fn owned_pair(a: &AccountId, b: &AccountId) -> (AccountId, AccountId) {
    let (lo, hi) = pair_key(a, b);
    (lo.clone(), hi.clone())
}

impl AccountDirectory for MemoryStore {
    fn find_account(&self, id: &AccountId) -> Result<Option<Account>> {
        Ok(self.lock()?.accounts.get(id).cloned())
    }

    fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let inner = self.lock()?;
        Ok(inner.accounts.values().find(|a| a.email == email).cloned())
    }

    fn save_account(&self, account: &Account) -> Result<()> {
        self.lock()?
            .accounts
            .insert(account.id.clone(), account.clone());
        Ok(())
    }
}

impl ConnectionLedger for MemoryStore {
    fn insert_request_if_absent(&self, request: &ConnectionRequest) -> Result<bool> {
        let mut inner = self.lock()?;
        let key = owned_pair(&request.sender, &request.receiver);
        if inner.requests.contains_key(&key) {
            return Ok(false);
        }
        inner.requests.insert(key, request.clone());
        Ok(true)
    }

    fn find_request(
        &self,
        sender: &AccountId,
        receiver: &AccountId,
    ) -> Result<Option<ConnectionRequest>> {
        Ok(self
            .find_request_between(sender, receiver)?
            .filter(|r| &r.sender == sender && &r.receiver == receiver))
    }

    fn find_request_between(
        &self,
        a: &AccountId,
        b: &AccountId,
    ) -> Result<Option<ConnectionRequest>> {
        Ok(self.lock()?.requests.get(&owned_pair(a, b)).cloned())
    }

    fn update_request(&self, request: &ConnectionRequest) -> Result<()> {
        let mut inner = self.lock()?;
        match inner
            .requests
            .get_mut(&owned_pair(&request.sender, &request.receiver))
        {
            Some(stored) => {
                *stored = request.clone();
                Ok(())
            }
            None => Err(GraphError::NotFound(format!(
                "connection request {} -> {}",
                request.sender, request.receiver
            ))),
        }
    }

    fn requests_involving(&self, account: &AccountId) -> Result<Vec<ConnectionRequest>> {
        Ok(self
            .lock()?
            .requests
            .values()
            .filter(|r| r.involves(account))
            .cloned()
            .collect())
    }
}
