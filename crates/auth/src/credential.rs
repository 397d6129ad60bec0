//! Password hashing.
//!
//! Records are PHC strings, self-describing so that cost parameters can
//! change without invalidating hashes already stored:
//!
//! ```text
//! $argon2id$v=19$m=65536,t=3,p=2$<salt>$<key>
//! ```
//!
//! Salt and key are standard base64 without padding.

use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use thiserror::Error;

const ALGORITHM_TAG: &str = "argon2id";
const VERSION: u32 = 19;
const COST_KEYS: [&str; 3] = ["m", "t", "p"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("malformed credential record: {0}")]
    Malformed(String),

    #[error("unsupported algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("unsupported argon2 version {0}")]
    UnsupportedVersion(u32),

    #[error("invalid cost parameters: {0}")]
    InvalidParams(String),

    #[error("random source failed: {0}")]
    Random(String),

    #[error("key derivation failed: {0}")]
    Derivation(String),
}

/// Argon2id cost settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    /// Memory in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub salt_len: usize,
    pub key_len: usize,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 2,
            salt_len: 16,
            key_len: 32,
        }
    }
}

impl HashParams {
    /// Cheap settings for tests and benches.
    pub fn insecure_fast() -> Self {
        Self {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
            ..Self::default()
        }
    }

    fn argon2(&self) -> Result<Argon2<'static>, CredentialError> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, Some(self.key_len))
            .map_err(|e| CredentialError::InvalidParams(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CredentialHasher {
    params: HashParams,
}

impl CredentialHasher {
    pub fn new(params: HashParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> HashParams {
        self.params
    }

    /// Hash `password` under a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, CredentialError> {
        let salt = self.salt()?;
        let phc = self
            .params
            .argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CredentialError::Derivation(e.to_string()))?;
        Ok(phc.to_string())
    }

    fn salt(&self) -> Result<SaltString, CredentialError> {
        let mut bytes = vec![0u8; self.params.salt_len];
        getrandom::getrandom(&mut bytes).map_err(|e| CredentialError::Random(e.to_string()))?;
        SaltString::encode_b64(&bytes).map_err(|e| CredentialError::InvalidParams(e.to_string()))
    }

    /// Check `password` against an encoded record.
    ///
    /// Uses the cost parameters and key length embedded in the record, not
    /// `self.params`. Any parse problem is an error; callers must treat
    /// errors as a mismatch.
    pub fn verify(&self, password: &str, encoded: &str) -> Result<bool, CredentialError> {
        let parsed = PasswordHash::new(encoded).map_err(|e| CredentialError::Malformed(e.to_string()))?;

        if parsed.algorithm.as_str() != ALGORITHM_TAG {
            return Err(CredentialError::UnsupportedAlgorithm(parsed.algorithm.to_string()));
        }
        match parsed.version {
            Some(VERSION) => {}
            Some(other) => return Err(CredentialError::UnsupportedVersion(other)),
            None => return Err(CredentialError::Malformed("missing version".into())),
        }
        // The hasher would fall back to defaults for absent costs.
        if let Some(key) = COST_KEYS.iter().find(|k| parsed.params.get_str(**k).is_none()) {
            return Err(CredentialError::Malformed(format!("missing cost '{key}'")));
        }
        if parsed.salt.is_none() || parsed.hash.is_none() {
            return Err(CredentialError::Malformed("missing salt or key".into()));
        }

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CredentialError::Derivation(e.to_string())),
        }
    }
}
