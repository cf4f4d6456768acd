//! Password hashing and auth tokens

use crate::ids::UserId;
use anyhow::{bail, Result};

use rand::Rng;
use rand_distr::Alphanumeric;
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

const AUTH_TOKEN_LEN: usize = 64;

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct AuthTokenValue(pub String);

#[derive(Clone, Debug)]
pub struct AuthToken {
    pub value: AuthTokenValue,
    pub user_id: UserId,
    pub created: SystemTime,
    pub last_used: Option<SystemTime>,
}

impl AuthTokenValue {
    pub fn generate() -> AuthTokenValue {
        let rng = rand::rng();
        let random_string: String = rng
            .sample_iter(&Alphanumeric)
            .take(AUTH_TOKEN_LEN)
            .map(char::from)
            .collect();
        AuthTokenValue(random_string)
    }
}

mod argon2_hashing {
    use anyhow::{anyhow, Result};
    use argon2::{
        password_hash::{
            rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        },
        Argon2,
    };

    pub fn generate_b64_salt() -> String {
        SaltString::generate(&mut OsRng).to_string()
    }

    pub fn hash(plain: &[u8], b64_salt: &str) -> Result<String> {
        let salt = SaltString::from_b64(b64_salt).map_err(|err| anyhow!("{}", err))?;
        let hash_string = Argon2::default()
            .hash_password(plain, &salt)
            .map_err(|err| anyhow!("{}", err))?
            .to_string();
        Ok(hash_string)
    }

    pub fn verify(plain_pw: &[u8], target_hash: &str) -> Result<bool> {
        let password_hash = PasswordHash::new(target_hash).map_err(|err| anyhow!("{}", err))?;
        Ok(Argon2::default()
            .verify_password(plain_pw, &password_hash)
            .is_ok())
    }
}

/// The algorithm a stored password hash was produced with. Persisted by
/// name next to the hash so the algorithm can change without invalidating
/// existing credentials.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
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
            PasswordHasherKind::Argon2 => f.write_str("argon2"),
        }
    }
}

impl PasswordHasherKind {
    pub fn generate_b64_salt(&self) -> String {
        match self {
            PasswordHasherKind::Argon2 => argon2_hashing::generate_b64_salt(),
        }
    }

    pub fn hash(&self, plain: &[u8], b64_salt: &str) -> Result<String> {
        match self {
            PasswordHasherKind::Argon2 => argon2_hashing::hash(plain, b64_salt),
        }
    }

    pub fn verify(&self, plain_pw: &str, target_hash: &str) -> Result<bool> {
        match self {
            PasswordHasherKind::Argon2 => argon2_hashing::verify(plain_pw.as_bytes(), target_hash),
        }
    }
}
