//! Password hashing and signed bearer tokens.
//!
//! Tokens are `hex(claims_json) "." hex(ed25519_signature)`, signed with the
//! node's persistent signing key. They carry the account id and an expiry in
//! unix seconds. Roles are not part of the token; admin-only routes read the
//! role from storage.

use crate::error::{Error, Result};
use crate::node::AppState;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rapport_graph::{Account, AccountId};
use serde::{Deserialize, Serialize};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Hash a password into a PHC string (Argon2id, random salt).
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Storage(format!("password hashing failed: {}", e)))
}

/// Check `password` against a stored PHC string.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Claims carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: AccountId,
    /// Expiry, unix seconds
    pub exp: u64,
}

/// Issues and verifies bearer tokens.
pub struct TokenSigner {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    ttl_secs: u64,
}

fn now_secs() -> u64 {
    rapport_graph::now_millis() / 1000
}

impl TokenSigner {
    pub fn new(signing_key: SigningKey, ttl_secs: u64) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
            ttl_secs,
        }
    }

    /// Issue a token for `account`, valid for the configured lifetime.
    pub fn issue(&self, account: &Account) -> Result<String> {
        self.issue_at(account, now_secs())
    }

    fn issue_at(&self, account: &Account, now: u64) -> Result<String> {
        let claims = Claims {
            sub: account.id.clone(),
            exp: now.saturating_add(self.ttl_secs),
        };
        let payload = serde_json::to_vec(&claims)?;
        let signature = self.signing_key.sign(&payload);
        Ok(format!(
            "{}.{}",
            hex::encode(&payload),
            hex::encode(signature.to_bytes())
        ))
    }

    /// Verify signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        self.verify_at(token, now_secs())
    }

    fn verify_at(&self, token: &str, now: u64) -> Result<Claims> {
        let invalid = || Error::Unauthorized("invalid token".into());

        let (payload_hex, signature_hex) = token.split_once('.').ok_or_else(invalid)?;
        let payload = hex::decode(payload_hex).map_err(|_| invalid())?;
        let signature_bytes: [u8; 64] = hex::decode(signature_hex)
            .map_err(|_| invalid())?
            .try_into()
            .map_err(|_| invalid())?;
        let signature = Signature::from_bytes(&signature_bytes);

        self.verifying_key
            .verify(&payload, &signature)
            .map_err(|_| invalid())?;

        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| invalid())?;
        if claims.exp <= now {
            return Err(Error::Unauthorized("token expired".into()));
        }
        Ok(claims)
    }
}

/// The verified caller of a protected route.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: AccountId,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| Error::Unauthorized("missing bearer token".into()))?;

        let claims = state.tokens.verify(token.trim())?;
        Ok(AuthUser { id: claims.sub })
    }
}

/// A caller whose stored account currently has the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Account);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let caller = AuthUser::from_request_parts(parts, state).await?;
        match state.storage.get_account(&caller.id)? {
            Some(account) if account.is_admin() => Ok(AdminUser(account)),
            _ => Err(Error::Forbidden("admin access only".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer(ttl: u64) -> TokenSigner {
        TokenSigner::new(SigningKey::from_bytes(&[7u8; 32]), ttl)
    }

    fn account() -> Account {
        Account::new("abc".into(), "Abc".into(), "abc@example.com".into(), 0)
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not-a-phc-string"));
    }

    #[test]
    fn token_roundtrip() {
        let signer = signer(60);
        let token = signer.issue_at(&account(), 1_000).unwrap();
        let claims = signer.verify_at(&token, 1_030).unwrap();
        assert_eq!(claims.sub, AccountId::from("abc"));
        assert_eq!(claims.exp, 1_060);
    }

    #[test]
    fn expired_token_is_rejected() {
        let signer = signer(60);
        let token = signer.issue_at(&account(), 1_000).unwrap();
        assert!(matches!(
            signer.verify_at(&token, 1_060),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let signer = signer(60);
        let token = signer.issue_at(&account(), 1_000).unwrap();
        let (_, signature) = token.split_once('.').unwrap();

        let forged_payload = serde_json::to_vec(&Claims {
            sub: account().id,
            exp: u64::MAX,
        })
        .unwrap();
        let forged_token = format!("{}.{}", hex::encode(forged_payload), signature);

        assert!(signer.verify_at(&forged_token, 1_000).is_err());
    }

    #[test]
    fn huge_lifetime_saturates_instead_of_wrapping() {
        let signer = signer(u64::MAX);
        let token = signer.issue_at(&account(), 1_000).unwrap();
        let claims = signer.verify_at(&token, 1_000).unwrap();
        assert_eq!(claims.exp, u64::MAX);
        assert!(signer.verify(&signer.issue(&account()).unwrap()).is_ok());
    }

    #[test]
    fn foreign_key_signature_is_rejected() {
        let token = signer(60).issue_at(&account(), 1_000).unwrap();
        let other = TokenSigner::new(SigningKey::from_bytes(&[9u8; 32]), 60);
        assert!(other.verify_at(&token, 1_000).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let signer = signer(60);
        for token in ["", "abc", "zz.zz", "00.00"] {
            assert!(signer.verify_at(token, 0).is_err());
        }
    }
}
