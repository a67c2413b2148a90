//! Password hashing and verification.
//!
//! Uses Argon2id; the cost parameters come from [`PasswordConfig`] so that
//! production and tests differ only in configuration.

use crate::config::PasswordConfig;
use crate::entity::user;
use crate::error::AuthError;
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Argon2id hasher bound to a set of cost parameters.
#[derive(Clone, Debug)]
pub struct PasswordHasher {
    params: Params,
    /// Hash of a random secret, verified against when there is no account hash.
    dummy_hash: String,
}

impl PasswordHasher {
    pub fn new(config: &PasswordConfig) -> Result<Self, AuthError> {
        let params = Params::new(
            config.memory_cost,
            config.time_cost,
            config.parallelism,
            None,
        )
        .map_err(|e| AuthError::Hashing(e.to_string()))?;
        let mut hasher = Self {
            params,
            dummy_hash: String::new(),
        };
        hasher.dummy_hash = hasher.hash_password(&generate_token())?;
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password, returning the PHC-formatted string for storage.
    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Verify a password against a stored hash.
    ///
    /// The parameters embedded in the PHC string win over the configured ones,
    /// so hashes made under older settings keep verifying.
    pub fn verify_password(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            return false;
        };
        self.argon2()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Check a user's password. Accounts without a hash never match.
    pub fn check_password(&self, user: &user::Model, password: &str) -> bool {
        match &user.password_hash {
            Some(hash) => self.verify_password(password, hash),
            None => self.verify_dummy(password),
        }
    }

    /// Spend one verification at the configured cost without an account.
    ///
    /// Always false. Keeps a login for a missing account as slow as one with
    /// a wrong password.
    pub fn verify_dummy(&self, password: &str) -> bool {
        let _ = self.verify_password(password, &self.dummy_hash);
        false
    }

    pub fn dummy_hash(&self) -> &str {
        &self.dummy_hash
    }
}

/// Enforce the password policy on a new plaintext password.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::validation(
            "password",
            format!("must be at least {MIN_PASSWORD_LENGTH} characters"),
        ));
    }
    if password.trim().is_empty() {
        return Err(AuthError::validation("password", "must not be blank"));
    }
    Ok(())
}

/// Generate an opaque random token (authorization codes, bearer tokens, client credentials).
///
/// Returns a URL-safe base64-encoded string of 32 random bytes.
pub fn generate_token() -> String {
    use base64::Engine;
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes).expect("Failed to generate random bytes");
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a password reset code: 32 lower-case hex characters.
pub fn generate_reset_code() -> String {
    let mut bytes = [0u8; 16];
    getrandom::fill(&mut bytes).expect("Failed to generate random bytes");
    hex::encode(bytes)
}
