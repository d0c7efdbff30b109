//! Password hashing and bearer token values.

use anyhow::{bail, Result};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const AUTH_TOKEN_LENGTH: usize = 64;

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
#[serde(transparent)]
pub struct AuthTokenValue(pub String);

impl AuthTokenValue {
    pub fn generate() -> AuthTokenValue {
        let value: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(AUTH_TOKEN_LENGTH)
            .map(char::from)
            .collect();
        AuthTokenValue(value)
    }
}

/// A token as persisted server side. `created` is in store nanoseconds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthToken {
    pub value: AuthTokenValue,
    pub user_id: String,
    pub created: i64,
}

impl AuthToken {
    pub fn is_expired(&self, now: i64, ttl_nanos: i64) -> bool {
        now.saturating_sub(self.created) > ttl_nanos
    }
}

mod library_argon2 {
    use anyhow::{anyhow, Result};
    use argon2::{
        password_hash::{
            rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        },
        Argon2,
    };

    #[cfg(not(feature = "test-fast-hasher"))]
    fn argon2() -> Argon2<'static> {
        Argon2::default()
    }

    #[cfg(feature = "test-fast-hasher")]
    fn argon2() -> Argon2<'static> {
        use argon2::{Algorithm, Params, Version};
        let params = Params::new(8, 1, 1, None).unwrap_or_default();
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    }

    pub fn hash(plain: &[u8]) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(argon2()
            .hash_password(plain, &salt)
            .map_err(|err| anyhow!("{}", err))?
            .to_string())
    }

    pub fn verify(plain: &[u8], target_hash: &str) -> Result<bool> {
        let password_hash = PasswordHash::new(target_hash).map_err(|err| anyhow!("{}", err))?;
        Ok(argon2().verify_password(plain, &password_hash).is_ok())
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum PasswordHasherKind {
    Argon2,
}

impl FromStr for PasswordHasherKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "argon2" => Ok(PasswordHasherKind::Argon2),
            _ => bail!("Unknown hasher {}", s),
        }
    }
}

impl fmt::Display for PasswordHasherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordHasherKind::Argon2 => write!(f, "argon2"),
        }
    }
}

impl PasswordHasherKind {
    /// Returns a self-describing (PHC) hash string, salt included.
    pub fn hash(&self, plain: &str) -> Result<String> {
        match self {
            PasswordHasherKind::Argon2 => library_argon2::hash(plain.as_bytes()),
        }
    }

    pub fn verify(&self, plain: &str, target_hash: &str) -> Result<bool> {
        match self {
            PasswordHasherKind::Argon2 => library_argon2::verify(plain.as_bytes(), target_hash),
        }
    }
}
