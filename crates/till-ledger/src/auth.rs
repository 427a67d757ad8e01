//! # Supervisor Authorization
//!
//! Voids and refunds need a supervisor's name and PIN. How the PIN is checked
//! is up to the deployment; the correction engine only asks a
//! [`SupervisorVerifier`] for yes or no.
//!
//! [`PinDirectory`] is the stock implementation: Argon2 PHC hashes keyed by
//! supervisor name, never plaintext PINs.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use std::collections::HashMap;

use crate::error::{LedgerError, LedgerResult};

/// Checks a supervisor credential.
pub trait SupervisorVerifier: Send + Sync {
    fn verify(&self, name: &str, pin: &str) -> bool;
}

impl<F> SupervisorVerifier for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn verify(&self, name: &str, pin: &str) -> bool {
        self(name, pin)
    }
}

/// Hashes a PIN for storage in a [`PinDirectory`].
pub fn hash_pin(pin: &str) -> LedgerResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(pin.as_bytes(), &salt)
        .map_err(|e| LedgerError::Credential(format!("Failed to hash PIN: {}", e)))?;

    Ok(hash.to_string())
}

/// Supervisor name to Argon2 PIN hash.
#[derive(Debug, Clone, Default)]
pub struct PinDirectory {
    hashes: HashMap<String, String>,
}

impl PinDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hashes `pin` and registers it for `name`, replacing any earlier PIN.
    pub fn enroll(&mut self, name: impl Into<String>, pin: &str) -> LedgerResult<()> {
        let hash = hash_pin(pin)?;
        self.hashes.insert(name.into(), hash);
        Ok(())
    }

    /// Registers an existing PHC hash string.
    pub fn insert_hash(&mut self, name: impl Into<String>, hash: impl Into<String>) {
        self.hashes.insert(name.into(), hash.into());
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.hashes.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

impl SupervisorVerifier for PinDirectory {
    fn verify(&self, name: &str, pin: &str) -> bool {
        let Some(stored) = self.hashes.get(name) else {
            return false;
        };

        let parsed_hash = match PasswordHash::new(stored) {
            Ok(h) => h,
            Err(_) => return false,
        };

        Argon2::default()
            .verify_password(pin.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrolled_supervisor_verifies() {
        let mut directory = PinDirectory::new();
        directory.enroll("sam", "4321").unwrap();

        assert!(directory.verify("sam", "4321"));
        assert!(!directory.verify("sam", "1234"));
        assert!(!directory.verify("pat", "4321"));
    }

    #[test]
    fn test_hash_is_not_the_pin() {
        let hash = hash_pin("4321").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(!hash.contains("4321"));
    }

    #[test]
    fn test_corrupt_hash_never_verifies() {
        let mut directory = PinDirectory::new();
        directory.insert_hash("sam", "not-a-phc-string");
        assert!(!directory.verify("sam", "anything"));
    }

    #[test]
    fn test_closure_verifier() {
        let verifier = |name: &str, pin: &str| name == "sam" && pin == "0000";
        assert!(verifier.verify("sam", "0000"));
        assert!(!verifier.verify("sam", "1111"));
    }
}
