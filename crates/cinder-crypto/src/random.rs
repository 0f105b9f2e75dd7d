//! Secure random byte generation.
//!
//! Bytes come from the operating system CSPRNG through [`NativeBackend`].

use crate::backend::{NativeBackend, Primitives};
use crate::error::Result;

/// Fills a buffer with secure random bytes.
///
/// # Errors
///
/// Returns `CryptoError::RandomnessFailure` if the OS RNG is unavailable.
///
/// # Examples
///
/// ```
/// use cinder_crypto::random::fill_random;
///
/// let mut buffer = [0u8; 32];
/// fill_random(&mut buffer).unwrap();
/// ```
pub fn fill_random(dest: &mut [u8]) -> Result<()> {
    NativeBackend.fill_random(dest)
}

/// Generates a fixed-size array of random bytes.
///
/// ```
/// use cinder_crypto::random::generate_random_bytes;
///
/// let random_key: [u8; 32] = generate_random_bytes().unwrap();
/// ```
pub fn generate_random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    fill_random(&mut bytes)?;
    Ok(bytes)
}
