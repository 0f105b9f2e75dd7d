//! One-shot XChaCha20-Poly1305 authenticated encryption.
//!
//! [`encrypt`] and [`decrypt`] work on caller-provided buffers and take an
//! explicit 24-byte nonce, which is large enough to be chosen at random for
//! every message. [`seal`] and [`open`] do exactly that and carry the nonce in
//! front of the ciphertext:
//!
//! ```text
//! nonce (24 bytes) ‖ ciphertext ‖ tag (16 bytes)
//! ```
//!
//! Use [`crate::stream`] for data that is produced or consumed in pieces.

use crate::backend::{NativeBackend, Primitives};
use crate::error::{CryptoError, Result};
use crate::validation;
use chacha20poly1305::aead::{AeadInPlace, KeyInit};
use chacha20poly1305::{Key, Tag, XChaCha20Poly1305, XNonce};
use zeroize::Zeroize;

/// Size of an XChaCha20-Poly1305 nonce in bytes.
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Size of an AEAD key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Largest plaintext accepted by a single call.
pub const MAX_MESSAGE_SIZE: usize = {
    let limit: u64 = (1u64 << 38) - 64;
    if ((usize::MAX - TAG_SIZE - NONCE_SIZE) as u64) < limit {
        usize::MAX - TAG_SIZE - NONCE_SIZE
    } else {
        limit as usize
    }
};

/// Encrypts `plaintext` into `ciphertext` (`plaintext.len() + TAG_SIZE` bytes).
///
/// The nonce must never be reused with the same key.
///
/// # Errors
///
/// Returns an argument error if any buffer has the wrong size.
pub fn encrypt(
    ciphertext: &mut [u8],
    plaintext: &[u8],
    nonce: &[u8],
    key: &[u8],
    associated_data: &[u8],
) -> Result<()> {
    validation::not_greater_than_max("plaintext", plaintext.len(), MAX_MESSAGE_SIZE)?;
    validation::equal_to_size("ciphertext", ciphertext.len(), plaintext.len() + TAG_SIZE)?;
    validation::equal_to_size("nonce", nonce.len(), NONCE_SIZE)?;
    validation::equal_to_size("key", key.len(), KEY_SIZE)?;

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let (body, tag_out) = ciphertext.split_at_mut(plaintext.len());
    body.copy_from_slice(plaintext);
    match cipher.encrypt_in_place_detached(XNonce::from_slice(nonce), associated_data, body) {
        Ok(tag) => {
            tag_out.copy_from_slice(&tag);
            Ok(())
        }
        Err(_) => {
            ciphertext.zeroize();
            Err(CryptoError::TooLong {
                name: "plaintext",
                max: MAX_MESSAGE_SIZE,
                actual: plaintext.len(),
            })
        }
    }
}

/// Authenticates and decrypts `ciphertext` into `plaintext`
/// (`ciphertext.len() - TAG_SIZE` bytes).
///
/// # Errors
///
/// Returns `CryptoError::DecryptionFailed` if the ciphertext, nonce, key or
/// associated data does not match. `plaintext` is zeroed in that case.
pub fn decrypt(
    plaintext: &mut [u8],
    ciphertext: &[u8],
    nonce: &[u8],
    key: &[u8],
    associated_data: &[u8],
) -> Result<()> {
    validation::not_less_than_min("ciphertext", ciphertext.len(), TAG_SIZE)?;
    validation::equal_to_size("plaintext", plaintext.len(), ciphertext.len() - TAG_SIZE)?;
    validation::equal_to_size("nonce", nonce.len(), NONCE_SIZE)?;
    validation::equal_to_size("key", key.len(), KEY_SIZE)?;

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let (body, tag) = ciphertext.split_at(plaintext.len());
    plaintext.copy_from_slice(body);
    cipher
        .decrypt_in_place_detached(
            XNonce::from_slice(nonce),
            associated_data,
            plaintext,
            Tag::from_slice(tag),
        )
        .map_err(|_| {
            plaintext.zeroize();
            CryptoError::DecryptionFailed
        })
}

/// Encrypts under a fresh random nonce and returns `nonce ‖ ciphertext ‖ tag`.
///
/// # Errors
///
/// Returns `CryptoError::RandomnessFailure` if the nonce cannot be generated.
///
/// # Examples
///
/// ```
/// use cinder_crypto::aead::{open, seal, KEY_SIZE};
///
/// let key = [7u8; KEY_SIZE];
/// let sealed = seal(&key, b"attack at dawn", b"header")?;
/// assert_eq!(open(&key, &sealed, b"header")?, b"attack at dawn");
/// # Ok::<(), cinder_crypto::error::CryptoError>(())
/// ```
pub fn seal(key: &[u8], plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
    validation::not_greater_than_max("plaintext", plaintext.len(), MAX_MESSAGE_SIZE)?;
    let mut output = vec![0u8; NONCE_SIZE + plaintext.len() + TAG_SIZE];
    let (nonce, ciphertext) = output.split_at_mut(NONCE_SIZE);
    NativeBackend.fill_random(nonce)?;
    encrypt(ciphertext, plaintext, nonce, key, associated_data)?;
    Ok(output)
}

/// Reverses [`seal`].
///
/// # Errors
///
/// Returns an argument error if `sealed` is shorter than a nonce and tag, and
/// `CryptoError::DecryptionFailed` if authentication fails.
pub fn open(key: &[u8], sealed: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
    validation::not_less_than_min("sealed", sealed.len(), NONCE_SIZE + TAG_SIZE)?;
    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
    let mut plaintext = vec![0u8; ciphertext.len() - TAG_SIZE];
    decrypt(&mut plaintext, ciphertext, nonce, key, associated_data)?;
    Ok(plaintext)
}
