//! Persistent storage using RocksDB.
//!
//! Key layout:
//!
//! | Key | Value |
//! |---|---|
//! | `account:{id}` | [`Account`] |
//! | `email:{email}` | account id |
//! | `admin:{id}` | marker, present while the account has the admin role |
//! | `credential:{id}` | password hash |
//! | `profile:{id}` | [`Profile`] |
//! | `request:{sender}:{receiver}` | [`ConnectionRequest`] |
//! | `pair:{lo}:{hi}` | request key, one per unordered pair |
//! | `peer:{account}:{other}` | request key, written for both parties |
//! | `query:{id}` | [`Query`] |
//! | `inbox:{admin}:{query}` | marker |
//! | `node:signing_key` | ed25519 secret key bytes |

use crate::error::{Error, Result};
use crate::models::{Profile, Query};
use ed25519_dalek::SigningKey;
use rand::RngCore;
use rapport_graph::{
    pair_key, Account, AccountDirectory, AccountId, ConnectionLedger, ConnectionRequest,
    GraphError, Role,
};
use rocksdb::{Options, WriteBatch, DB};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

fn account_key(id: &AccountId) -> String {
    format!("account:{}", id)
}

fn email_key(email: &str) -> String {
    format!("email:{}", email)
}

fn admin_key(id: &AccountId) -> String {
    format!("admin:{}", id)
}

fn credential_key(id: &AccountId) -> String {
    format!("credential:{}", id)
}

fn profile_key(id: &AccountId) -> String {
    format!("profile:{}", id)
}

fn request_key(sender: &AccountId, receiver: &AccountId) -> String {
    format!("request:{}:{}", sender, receiver)
}

fn pair_claim_key(a: &AccountId, b: &AccountId) -> String {
    let (lo, hi) = pair_key(a, b);
    format!("pair:{}:{}", lo, hi)
}

fn peer_key(account: &AccountId, other: &AccountId) -> String {
    format!("peer:{}:{}", account, other)
}

fn query_key(id: &str) -> String {
    format!("query:{}", id)
}

fn inbox_key(admin: &AccountId, query_id: &str) -> String {
    format!("inbox:{}:{}", admin, query_id)
}

/// Storage backend for node data.
pub struct Storage {
    db: DB,
    /// Serializes check-then-write sequences (pair claims, email claims)
    write_lock: Mutex<()>,
}

impl Storage {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| Error::Storage("write lock poisoned".into()))
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.db.get(key.as_bytes())? {
            Some(data) => String::from_utf8(data)
                .map(Some)
                .map_err(|_| Error::Storage(format!("non-utf8 value at {}", key))),
            None => Ok(None),
        }
    }

    /// Key suffixes and values of every entry under `prefix`.
    fn scan(&self, prefix: &str) -> Result<Vec<(String, Box<[u8]>)>> {
        let prefix = prefix.as_bytes();
        let mut entries = Vec::new();

        let iter = self.db.prefix_iterator(prefix);
        for item in iter {
            let (key, value) = item?;
            if key.starts_with(prefix) {
                let suffix = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
                entries.push((suffix, value));
            } else {
                break;
            }
        }

        Ok(entries)
    }

    fn scan_json<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>> {
        self.scan(prefix)?
            .into_iter()
            .map(|(_, value)| serde_json::from_slice(&value).map_err(Error::from))
            .collect()
    }

    fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    // --- Accounts ---

    /// Create an account with its credential and profile.
    ///
    /// Returns `false` without writing if the email is already taken.
    pub fn create_account(
        &self,
        account: &Account,
        password_hash: &str,
        profile: &Profile,
    ) -> Result<bool> {
        let _guard = self.guard()?;
        if self.db.get(email_key(&account.email).as_bytes())?.is_some() {
            return Ok(false);
        }

        let mut batch = WriteBatch::default();
        self.stage_account(&mut batch, account, None)?;
        batch.put(credential_key(&account.id).as_bytes(), password_hash.as_bytes());
        if !profile.is_empty() {
            batch.put(profile_key(&account.id).as_bytes(), Self::to_json(profile)?);
        }
        self.db.write(batch)?;
        Ok(true)
    }

    /// Store an account, keeping the email and admin indexes in step.
    ///
    /// Fails with `Conflict` if the email belongs to another account.
    pub fn put_account(&self, account: &Account) -> Result<()> {
        self.update_account(account, None)
    }

    /// Store an account and, if given, its new password hash in one write.
    ///
    /// Nothing is written when the email belongs to another account.
    pub fn update_account(&self, account: &Account, password_hash: Option<&str>) -> Result<()> {
        let _guard = self.guard()?;
        if let Some(owner) = self.get_string(&email_key(&account.email))? {
            if owner != account.id.as_str() {
                return Err(GraphError::Conflict(format!(
                    "email {} already in use",
                    account.email
                ))
                .into());
            }
        }

        let previous = self.get_account(&account.id)?;
        let mut batch = WriteBatch::default();
        self.stage_account(&mut batch, account, previous.as_ref())?;
        if let Some(hash) = password_hash {
            batch.put(credential_key(&account.id).as_bytes(), hash.as_bytes());
        }
        self.db.write(batch)?;
        Ok(())
    }

    fn stage_account(
        &self,
        batch: &mut WriteBatch,
        account: &Account,
        previous: Option<&Account>,
    ) -> Result<()> {
        if let Some(previous) = previous {
            if previous.email != account.email {
                batch.delete(email_key(&previous.email).as_bytes());
            }
        }
        batch.put(account_key(&account.id).as_bytes(), Self::to_json(account)?);
        batch.put(email_key(&account.email).as_bytes(), account.id.as_str().as_bytes());
        match account.role {
            Role::Admin => batch.put(admin_key(&account.id).as_bytes(), b"1"),
            Role::User => batch.delete(admin_key(&account.id).as_bytes()),
        }
        Ok(())
    }

    /// Get an account by ID.
    pub fn get_account(&self, id: &AccountId) -> Result<Option<Account>> {
        self.get_json(&account_key(id))
    }

    /// Get an account by email.
    pub fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        match self.get_string(&email_key(email))? {
            Some(id) => self.get_account(&AccountId::new(id)),
            None => Ok(None),
        }
    }

    /// List all accounts.
    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        self.scan_json("account:")
    }

    /// Accounts whose email contains `fragment`, ignoring case.
    pub fn search_accounts_by_email(&self, fragment: &str) -> Result<Vec<Account>> {
        let needle = fragment.to_lowercase();
        Ok(self
            .list_accounts()?
            .into_iter()
            .filter(|a| a.email.to_lowercase().contains(&needle))
            .collect())
    }

    /// Delete an account with its credential, profile, and inbox.
    ///
    /// Ledger entries and other accounts' adjacency lists are left alone.
    pub fn delete_account(&self, id: &AccountId) -> Result<bool> {
        let _guard = self.guard()?;
        let Some(account) = self.get_account(id)? else {
            return Ok(false);
        };

        let mut batch = WriteBatch::default();
        batch.delete(account_key(id).as_bytes());
        batch.delete(email_key(&account.email).as_bytes());
        batch.delete(admin_key(id).as_bytes());
        batch.delete(credential_key(id).as_bytes());
        batch.delete(profile_key(id).as_bytes());
        for (query_id, _) in self.scan(&format!("inbox:{}:", id))? {
            batch.delete(inbox_key(id, &query_id).as_bytes());
        }
        self.db.write(batch)?;
        Ok(true)
    }

    // --- Credentials and profiles ---

    /// Get the password hash of an account.
    pub fn get_credential(&self, id: &AccountId) -> Result<Option<String>> {
        self.get_string(&credential_key(id))
    }

    /// Store a profile.
    pub fn put_profile(&self, id: &AccountId, profile: &Profile) -> Result<()> {
        self.db
            .put(profile_key(id).as_bytes(), Self::to_json(profile)?)?;
        Ok(())
    }

    /// Get a profile, empty if none was stored.
    pub fn get_profile(&self, id: &AccountId) -> Result<Profile> {
        Ok(self.get_json(&profile_key(id))?.unwrap_or_default())
    }

    // --- Admins ---

    /// Check if an account has the admin role.
    pub fn is_admin(&self, id: &AccountId) -> Result<bool> {
        Ok(self.db.get(admin_key(id).as_bytes())?.is_some())
    }

    /// List all admin account ids.
    pub fn list_admins(&self) -> Result<Vec<AccountId>> {
        Ok(self
            .scan("admin:")?
            .into_iter()
            .map(|(id, _)| AccountId::new(id))
            .collect())
    }

    /// Set the role of the account registered under `email`.
    pub fn set_role_by_email(&self, email: &str, role: Role) -> Result<Account> {
        let mut account = self
            .get_account_by_email(email)?
            .ok_or_else(|| Error::InvalidInput(format!("no account with email {}", email)))?;
        account.role = role;
        self.put_account(&account)?;
        Ok(account)
    }

    // --- Connection requests ---

    /// Get the request sent by `sender` to `receiver`.
    pub fn get_request(
        &self,
        sender: &AccountId,
        receiver: &AccountId,
    ) -> Result<Option<ConnectionRequest>> {
        self.get_json(&request_key(sender, receiver))
    }

    /// Get the request between `a` and `b` in either direction.
    pub fn get_request_between(
        &self,
        a: &AccountId,
        b: &AccountId,
    ) -> Result<Option<ConnectionRequest>> {
        match self.get_string(&pair_claim_key(a, b))? {
            Some(key) => self.get_json(&key),
            None => Ok(None),
        }
    }

    /// Claim the pair and store `request`, unless the pair is already claimed.
    pub fn insert_request(&self, request: &ConnectionRequest) -> Result<bool> {
        let _guard = self.guard()?;
        let claim = pair_claim_key(&request.sender, &request.receiver);
        if self.db.get(claim.as_bytes())?.is_some() {
            return Ok(false);
        }

        let key = request_key(&request.sender, &request.receiver);
        let mut batch = WriteBatch::default();
        batch.put(key.as_bytes(), Self::to_json(request)?);
        batch.put(claim.as_bytes(), key.as_bytes());
        batch.put(
            peer_key(&request.sender, &request.receiver).as_bytes(),
            key.as_bytes(),
        );
        batch.put(
            peer_key(&request.receiver, &request.sender).as_bytes(),
            key.as_bytes(),
        );
        self.db.write(batch)?;
        Ok(true)
    }

    /// Overwrite an existing request.
    pub fn put_request(&self, request: &ConnectionRequest) -> Result<()> {
        let key = request_key(&request.sender, &request.receiver);
        if self.db.get(key.as_bytes())?.is_none() {
            return Err(GraphError::NotFound(format!(
                "connection request {} -> {}",
                request.sender, request.receiver
            ))
            .into());
        }
        self.db.put(key.as_bytes(), Self::to_json(request)?)?;
        Ok(())
    }

    /// List requests where `account` is either party.
    pub fn list_requests_involving(&self, account: &AccountId) -> Result<Vec<ConnectionRequest>> {
        let mut requests = Vec::new();
        for (_, key) in self.scan(&format!("peer:{}:", account))? {
            let key = String::from_utf8_lossy(&key).into_owned();
            if let Some(request) = self.get_json(&key)? {
                requests.push(request);
            }
        }
        Ok(requests)
    }

    // --- Queries ---

    /// Store a query and link it into the inbox of every current admin.
    ///
    /// Returns the number of admins it was linked to.
    pub fn submit_query(&self, query: &Query) -> Result<usize> {
        let admins = self.list_admins()?;

        let mut batch = WriteBatch::default();
        batch.put(query_key(&query.id).as_bytes(), Self::to_json(query)?);
        for admin in &admins {
            batch.put(inbox_key(admin, &query.id).as_bytes(), b"1");
        }
        self.db.write(batch)?;
        Ok(admins.len())
    }

    /// Get a query by ID.
    pub fn get_query(&self, id: &str) -> Result<Option<Query>> {
        self.get_json(&query_key(id))
    }

    /// List all queries, newest first.
    pub fn list_queries(&self) -> Result<Vec<Query>> {
        let mut queries: Vec<Query> = self.scan_json("query:")?;
        queries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(queries)
    }

    /// Queries linked into the inbox of `admin`, newest first.
    pub fn inbox_queries(&self, admin: &AccountId) -> Result<Vec<Query>> {
        let mut queries = Vec::new();
        for (query_id, _) in self.scan(&format!("inbox:{}:", admin))? {
            if let Some(query) = self.get_query(&query_id)? {
                queries.push(query);
            }
        }
        queries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(queries)
    }

    // --- Node Identity ---

    /// Get or create the node's signing key (persistent identity).
    pub fn get_or_create_node_key(&self) -> Result<SigningKey> {
        let key = b"node:signing_key";
        let _guard = self.guard()?;

        if let Some(data) = self.db.get(key)? {
            let bytes: [u8; 32] = data
                .as_slice()
                .try_into()
                .map_err(|_| Error::Storage("Invalid stored key".into()))?;
            Ok(SigningKey::from_bytes(&bytes))
        } else {
            let mut bytes = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut bytes);
            let signing_key = SigningKey::from_bytes(&bytes);
            self.db.put(key, signing_key.as_bytes())?;
            Ok(signing_key)
        }
    }
}

impl AccountDirectory for Storage {
    fn find_account(&self, id: &AccountId) -> rapport_graph::Result<Option<Account>> {
        Ok(self.get_account(id)?)
    }

    fn find_account_by_email(&self, email: &str) -> rapport_graph::Result<Option<Account>> {
        Ok(self.get_account_by_email(email)?)
    }

    fn save_account(&self, account: &Account) -> rapport_graph::Result<()> {
        Ok(self.put_account(account)?)
    }
}

impl ConnectionLedger for Storage {
    fn insert_request_if_absent(&self, request: &ConnectionRequest) -> rapport_graph::Result<bool> {
        Ok(self.insert_request(request)?)
    }

    fn find_request(
        &self,
        sender: &AccountId,
        receiver: &AccountId,
    ) -> rapport_graph::Result<Option<ConnectionRequest>> {
        Ok(self.get_request(sender, receiver)?)
    }

    fn find_request_between(
        &self,
        a: &AccountId,
        b: &AccountId,
    ) -> rapport_graph::Result<Option<ConnectionRequest>> {
        Ok(self.get_request_between(a, b)?)
    }

    fn update_request(&self, request: &ConnectionRequest) -> rapport_graph::Result<()> {
        Ok(self.put_request(request)?)
    }

    fn requests_involving(
        &self,
        account: &AccountId,
    ) -> rapport_graph::Result<Vec<ConnectionRequest>> {
        Ok(self.list_requests_involving(account)?)
    }
}
