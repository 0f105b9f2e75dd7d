//! BLAKE3 hashing.
//!
//! Plain and keyed hashing with a 32-byte output, plus an incremental
//! [`Hasher`] that can also produce longer outputs.

use crate::backend::{NativeBackend, Primitives, HASH_KEY_SIZE};
use crate::error::Result;
use crate::validation;

/// Size of a BLAKE3 hash output in bytes.
pub const HASH_OUTPUT_SIZE: usize = 32;

/// Size of a BLAKE3 key in bytes.
pub const KEY_SIZE: usize = HASH_KEY_SIZE;

/// A BLAKE3 hash output.
///
/// Equality is constant-time, so outputs of keyed hashing can be compared
/// directly.
#[derive(Clone, Copy, Debug)]
pub struct HashOutput([u8; HASH_OUTPUT_SIZE]);

impl HashOutput {
    /// Creates a hash output from raw bytes.
    pub fn from_bytes(bytes: [u8; HASH_OUTPUT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the hash as a byte array.
    pub fn as_bytes(&self) -> &[u8; HASH_OUTPUT_SIZE] {
        &self.0
    }
}

impl PartialEq for HashOutput {
    fn eq(&self, other: &Self) -> bool {
        blake3::Hash::from(self.0) == blake3::Hash::from(other.0)
    }
}

impl Eq for HashOutput {}

impl From<[u8; HASH_OUTPUT_SIZE]> for HashOutput {
    fn from(bytes: [u8; HASH_OUTPUT_SIZE]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl AsRef<[u8]> for HashOutput {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Incremental BLAKE3 hasher.
#[derive(Clone)]
pub struct Hasher(blake3::Hasher);

impl Hasher {
    /// Creates an unkeyed hasher.
    pub fn new() -> Self {
        Self(blake3::Hasher::new())
    }

    /// Creates a hasher in keyed (MAC) mode.
    ///
    /// # Errors
    ///
    /// Returns an argument error unless `key` is [`KEY_SIZE`] bytes.
    pub fn new_keyed(key: &[u8]) -> Result<Self> {
        let key = validation::as_array("key", key)?;
        Ok(Self(blake3::Hasher::new_keyed(key)))
    }

    /// Feeds more data into the hasher.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.0.update(data);
        self
    }

    /// Returns the 32-byte hash of everything fed so far.
    pub fn finalize(&self) -> HashOutput {
        HashOutput(self.0.finalize().into())
    }

    /// Fills `output` with extendable output of any non-zero length.
    ///
    /// The first 32 bytes equal [`finalize`](Self::finalize).
    pub fn finalize_into(&self, output: &mut [u8]) -> Result<()> {
        validation::not_empty("output", output.len())?;
        self.0.finalize_xof().fill(output);
        Ok(())
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hasher").finish_non_exhaustive()
    }
}

/// Computes the BLAKE3 hash of data.
///
/// # Examples
///
/// ```
/// use cinder_crypto::hash::hash;
///
/// let hash_output = hash(b"Hello, World!");
/// assert_eq!(hash_output.as_bytes().len(), 32);
/// ```
pub fn hash(data: &[u8]) -> HashOutput {
    HashOutput(blake3::hash(data).into())
}

/// Computes a keyed BLAKE3 hash (a MAC) of data.
///
/// # Errors
///
/// Returns an argument error unless `key` is [`KEY_SIZE`] bytes.
pub fn keyed_hash(key: &[u8], data: &[u8]) -> Result<HashOutput> {
    let key = validation::as_array("key", key)?;
    Ok(HashOutput(NativeBackend.keyed_hash(key, &[data])))
}
