//! Argon2id password hashing and password-based key derivation.
//!
//! [`hash_password`] produces a self-describing PHC string
//! (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`) that [`verify_password`]
//! checks and [`needs_rehash`] compares against the current cost settings.
//! [`derive_key`] turns a password and a caller-stored salt into raw key
//! bytes, for example to wrap a stream key at rest.

use crate::backend::{NativeBackend, Primitives};
use crate::error::{CryptoError, Result};
use crate::validation;
use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version, ARGON2ID_IDENT};
use serde::{Deserialize, Serialize};

/// Size of a salt in bytes.
pub const SALT_SIZE: usize = 16;

/// Smallest key [`derive_key`] will produce, in bytes.
pub const MIN_KEY_SIZE: usize = 16;

/// Largest key [`derive_key`] will produce, in bytes.
pub const MAX_KEY_SIZE: usize = 64;

/// Size of the hash embedded in PHC strings, in bytes.
pub const HASH_SIZE: usize = 32;

/// Argon2id cost settings.
///
/// Deserialises with missing fields taken from [`Default`], so a
/// configuration file may override only some of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordHashConfig {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes over memory.
    pub iterations: u32,
    /// Degree of parallelism (lanes).
    pub parallelism: u32,
}

impl PasswordHashConfig {
    /// 64 MiB, 2 passes: suitable for interactive logins.
    pub const INTERACTIVE: Self = Self {
        memory_kib: 64 * 1024,
        iterations: 2,
        parallelism: 1,
    };

    /// 256 MiB, 3 passes.
    pub const MODERATE: Self = Self {
        memory_kib: 256 * 1024,
        iterations: 3,
        parallelism: 1,
    };

    /// 1 GiB, 4 passes: for keys protecting long-lived secrets.
    pub const SENSITIVE: Self = Self {
        memory_kib: 1024 * 1024,
        iterations: 4,
        parallelism: 1,
    };

    fn params(&self, output_len: usize) -> Result<Params> {
        validation::greater_than_zero("memory_kib", u64::from(self.memory_kib))?;
        validation::greater_than_zero("iterations", u64::from(self.iterations))?;
        validation::greater_than_zero("parallelism", u64::from(self.parallelism))?;
        Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(output_len),
        )
        .map_err(|e| CryptoError::InvalidParameter {
            name: "password hash config",
            reason: e.to_string(),
        })
    }

    fn hasher(&self, output_len: usize) -> Result<Argon2<'static>> {
        Ok(Argon2::new(
            Algorithm::Argon2id,
            Version::V0x13,
            self.params(output_len)?,
        ))
    }
}

impl Default for PasswordHashConfig {
    fn default() -> Self {
        Self::INTERACTIVE
    }
}

/// Hashes `password` under a fresh random salt and returns a PHC string.
///
/// # Errors
///
/// Returns an argument error if `config` is rejected by Argon2, and
/// `CryptoError::RandomnessFailure` if the salt cannot be generated.
pub fn hash_password(password: &[u8], config: &PasswordHashConfig) -> Result<String> {
    let hasher = config.hasher(HASH_SIZE)?;
    let mut salt = [0u8; SALT_SIZE];
    NativeBackend.fill_random(&mut salt)?;
    let salt = SaltString::encode_b64(&salt).map_err(|e| CryptoError::InvalidParameter {
        name: "salt",
        reason: e.to_string(),
    })?;

    tracing::debug!(
        memory_kib = config.memory_kib,
        iterations = config.iterations,
        "hashing password"
    );
    let hash = hasher
        .hash_password(password, &salt)
        .map_err(|e| CryptoError::InvalidParameter {
            name: "password",
            reason: e.to_string(),
        })?;
    Ok(hash.to_string())
}

/// Checks `password` against a PHC string from [`hash_password`].
///
/// A wrong password is `Ok(false)`, not an error.
///
/// # Errors
///
/// Returns `CryptoError::InvalidFormat` if `hash` is not a well-formed
/// Argon2id PHC string.
pub fn verify_password(hash: &str, password: &[u8]) -> Result<bool> {
    let parsed = parse(hash)?;
    match Argon2::default().verify_password(password, &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(malformed(e)),
    }
}

/// Returns whether `hash` was produced with settings other than `config`.
///
/// # Errors
///
/// Returns `CryptoError::InvalidFormat` for a malformed string.
pub fn needs_rehash(hash: &str, config: &PasswordHashConfig) -> Result<bool> {
    let parsed = parse(hash)?;
    if parsed.version != Some(Version::V0x13.into()) {
        return Ok(true);
    }
    let params = Params::try_from(&parsed).map_err(malformed)?;
    let output_len = parsed.hash.map(|output| output.len());
    Ok(params.m_cost() != config.memory_kib
        || params.t_cost() != config.iterations
        || params.p_cost() != config.parallelism
        || output_len != Some(HASH_SIZE))
}

/// Derives `key.len()` bytes from `password` and `salt`.
///
/// The same password, salt and config always give the same key.
///
/// # Errors
///
/// Returns an argument error unless `salt` is [`SALT_SIZE`] bytes and
/// `key` is between [`MIN_KEY_SIZE`] and [`MAX_KEY_SIZE`] bytes.
pub fn derive_key(
    key: &mut [u8],
    password: &[u8],
    salt: &[u8],
    config: &PasswordHashConfig,
) -> Result<()> {
    validation::size_between("key", key.len(), MIN_KEY_SIZE, MAX_KEY_SIZE)?;
    validation::equal_to_size("salt", salt.len(), SALT_SIZE)?;
    let hasher = config.hasher(key.len())?;
    hasher
        .hash_password_into(password, salt, key)
        .map_err(|e| CryptoError::InvalidParameter {
            name: "password",
            reason: e.to_string(),
        })
}

fn parse(hash: &str) -> Result<PasswordHash<'_>> {
    validation::not_null_or_empty("hash", Some(hash))?;
    let parsed = PasswordHash::new(hash).map_err(malformed)?;
    if parsed.algorithm != ARGON2ID_IDENT {
        return Err(CryptoError::InvalidFormat {
            what: "password hash",
            reason: format!("unsupported algorithm {}", parsed.algorithm),
        });
    }
    Ok(parsed)
}

fn malformed(err: password_hash::Error) -> CryptoError {
    CryptoError::InvalidFormat {
        what: "password hash",
        reason: err.to_string(),
    }
}
