use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::{error, warn};

use crate::{config::HashConfig, error::ConfigError};

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password must not be empty")]
    InvalidInput,
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Argon2id hasher configured once at startup.
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
    /// Verified against when the email is unknown, so that both login failure
    /// branches pay the same hashing cost.
    dummy_hash: String,
}

impl PasswordService {
    pub fn new(cfg: &HashConfig) -> Result<Self, ConfigError> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| ConfigError::Invalid {
                key: "HASH_MEMORY_KIB/HASH_ITERATIONS/HASH_PARALLELISM",
                reason: e.to_string(),
            })?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = SaltString::generate(&mut OsRng);
        let dummy_hash = argon2
            .hash_password(uuid::Uuid::new_v4().as_bytes(), &salt)
            .map_err(|e| ConfigError::Invalid {
                key: "HASH_MEMORY_KIB/HASH_ITERATIONS/HASH_PARALLELISM",
                reason: e.to_string(),
            })?
            .to_string();

        Ok(Self { argon2, dummy_hash })
    }

    pub fn hash(&self, plain: &str) -> Result<String, PasswordError> {
        if plain.is_empty() {
            return Err(PasswordError::InvalidInput);
        }
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                PasswordError::Hash(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// Constant-time check of `plain` against a PHC string. A hash that cannot be
    /// parsed never matches.
    pub fn verify(&self, plain: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "stored password hash is unreadable");
                return false;
            }
        };
        self.argon2
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }

    /// Burns one verification against a hash nobody knows the input of.
    pub fn verify_dummy(&self, plain: &str) -> bool {
        self.verify(plain, &self.dummy_hash);
        false
    }
}

#[cfg(test)]
pub(crate) fn cheap_params() -> HashConfig {
    HashConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}
