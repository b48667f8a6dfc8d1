//! Credential vault: password-hash storage and verification keyed by email.
//!
//! This component only compares pre-computed hashes - the one-way function
//! itself lives with the caller. Raw passwords and stored hashes are never
//! logged and never leave this module.

use crate::database::Store;
use crate::error::{StoreError, StoreResult};

/// Result of a credential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// No credential stored for that email.
    NotFound,
    /// Stored hash matches the candidate.
    Match,
    /// A credential exists but the candidate does not match.
    Mismatch,
}

pub struct CredentialVault {
    store: Store,
}

impl CredentialVault {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Stores a hash for the given email, overwriting any prior hash.
    /// The email is trimmed and lowercased so lookups are case-insensitive.
    pub fn store_hash(&self, email: &str, hash: &str) -> StoreResult<()> {
        let email = normalize_email(email)?;
        if hash.is_empty() {
            return Err(StoreError::Validation {
                entity: "Credential",
                reason: "hash must not be empty".to_string(),
            });
        }
        self.store.put_credential(&email, hash)?;
        log::info!("Stored credential for {}", email);
        Ok(())
    }

    /// Compares a candidate hash against the stored one.
    pub fn verify(&self, email: &str, candidate_hash: &str) -> StoreResult<VerifyOutcome> {
        let email = normalize_email(email)?;
        let outcome = match self.store.get_credential(&email)? {
            None => VerifyOutcome::NotFound,
            Some(stored) if stored == candidate_hash => VerifyOutcome::Match,
            Some(_) => VerifyOutcome::Mismatch,
        };
        log::debug!("Credential check for {}: {:?}", email, outcome);
        Ok(outcome)
    }
}

fn normalize_email(email: &str) -> StoreResult<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(StoreError::Validation {
            entity: "Credential",
            reason: "email must not be empty".to_string(),
        });
    }
    Ok(email)
}
