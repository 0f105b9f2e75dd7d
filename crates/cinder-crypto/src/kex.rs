//! X25519 key exchange.
//!
//! Raw Diffie-Hellman output is not uniformly random and must not be used as
//! a key directly. [`derive_sender_shared_key`] and
//! [`derive_recipient_shared_key`] hash it together with both public keys
//! (sender first, whichever side is computing) under an optional pre-shared
//! key, so both parties end up with the same 32-byte symmetric key:
//!
//! ```text
//! shared_key = BLAKE3-keyed(psk or 0^32, X25519(priv, pub) ‖ sender_pub ‖ recipient_pub)
//! ```
//!
//! A scalar multiplication that yields all zeros (a low-order public key) is
//! rejected with `CryptoError::WeakKey`. Intermediate secrets are zeroed
//! before returning.

use crate::backend::{NativeBackend, Primitives, HASH_KEY_SIZE, X25519_SIZE};
use crate::constant_time;
use crate::error::{CryptoError, Result};
use crate::validation;
use zeroize::Zeroizing;

/// Size of an X25519 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = X25519_SIZE;

/// Size of an X25519 private key in bytes.
pub const PRIVATE_KEY_SIZE: usize = X25519_SIZE;

/// Size of a raw X25519 shared secret in bytes.
pub const SHARED_SECRET_SIZE: usize = X25519_SIZE;

/// Size of a derived shared key in bytes.
pub const SHARED_KEY_SIZE: usize = HASH_KEY_SIZE;

/// Size of an optional pre-shared key in bytes.
pub const PRE_SHARED_KEY_SIZE: usize = HASH_KEY_SIZE;

/// Generates a key pair into the given buffers.
///
/// # Errors
///
/// Returns an argument error for mis-sized buffers and
/// `CryptoError::RandomnessFailure` if the OS RNG is unavailable.
///
/// # Examples
///
/// ```
/// use cinder_crypto::kex::{generate_key_pair, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE};
///
/// let mut public_key = [0u8; PUBLIC_KEY_SIZE];
/// let mut private_key = [0u8; PRIVATE_KEY_SIZE];
/// generate_key_pair(&mut public_key, &mut private_key)?;
/// # Ok::<(), cinder_crypto::error::CryptoError>(())
/// ```
pub fn generate_key_pair(public_key: &mut [u8], private_key: &mut [u8]) -> Result<()> {
    validation::equal_to_size("public_key", public_key.len(), PUBLIC_KEY_SIZE)?;
    validation::equal_to_size("private_key", private_key.len(), PRIVATE_KEY_SIZE)?;
    NativeBackend.fill_random(private_key)?;
    compute_public_key(public_key, private_key)
}

/// Computes the public key belonging to `private_key`.
pub fn compute_public_key(public_key: &mut [u8], private_key: &[u8]) -> Result<()> {
    validation::equal_to_size("public_key", public_key.len(), PUBLIC_KEY_SIZE)?;
    let private_key = validation::as_array("private_key", private_key)?;
    public_key.copy_from_slice(&NativeBackend.x25519_base(private_key));
    Ok(())
}

/// Computes the raw X25519 shared secret.
///
/// Prefer the `derive_*_shared_key` functions unless the secret is fed into a
/// KDF of your own.
///
/// # Errors
///
/// Returns `CryptoError::WeakKey` if `public_key` is a low-order point.
pub fn compute_shared_secret(
    shared_secret: &mut [u8],
    private_key: &[u8],
    public_key: &[u8],
) -> Result<()> {
    validation::equal_to_size("shared_secret", shared_secret.len(), SHARED_SECRET_SIZE)?;
    let private_key = validation::as_array("private_key", private_key)?;
    let public_key = validation::as_array("public_key", public_key)?;
    let secret = agree(&NativeBackend, private_key, public_key)?;
    shared_secret.copy_from_slice(&secret[..]);
    Ok(())
}

/// Derives the shared key on the sending side.
///
/// # Errors
///
/// Returns an argument error for mis-sized keys (a pre-shared key must be
/// [`PRE_SHARED_KEY_SIZE`] bytes) and `CryptoError::WeakKey` for a low-order
/// recipient key.
pub fn derive_sender_shared_key(
    shared_key: &mut [u8],
    sender_private_key: &[u8],
    recipient_public_key: &[u8],
    pre_shared_key: Option<&[u8]>,
) -> Result<()> {
    derive_shared_key(
        &NativeBackend,
        Role::Sender,
        shared_key,
        sender_private_key,
        recipient_public_key,
        pre_shared_key,
    )
}

/// Derives the shared key on the receiving side.
///
/// Produces the same key as [`derive_sender_shared_key`] called with the
/// matching key pairs and pre-shared key.
pub fn derive_recipient_shared_key(
    shared_key: &mut [u8],
    recipient_private_key: &[u8],
    sender_public_key: &[u8],
    pre_shared_key: Option<&[u8]>,
) -> Result<()> {
    derive_shared_key(
        &NativeBackend,
        Role::Recipient,
        shared_key,
        recipient_private_key,
        sender_public_key,
        pre_shared_key,
    )
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Role {
    Sender,
    Recipient,
}

fn derive_shared_key<B: Primitives>(
    backend: &B,
    role: Role,
    shared_key: &mut [u8],
    private_key: &[u8],
    remote_public_key: &[u8],
    pre_shared_key: Option<&[u8]>,
) -> Result<()> {
    validation::equal_to_size("shared_key", shared_key.len(), SHARED_KEY_SIZE)?;
    let private_key = validation::as_array("private_key", private_key)?;
    let remote_public_key: &[u8; PUBLIC_KEY_SIZE] =
        validation::as_array("public_key", remote_public_key)?;
    let zero_key = [0u8; PRE_SHARED_KEY_SIZE];
    let hash_key = match pre_shared_key {
        Some(psk) => validation::as_array("pre_shared_key", psk)?,
        None => &zero_key,
    };

    let secret = agree(backend, private_key, remote_public_key)?;
    let local_public_key = Zeroizing::new(backend.x25519_base(private_key));
    let (sender, recipient) = match role {
        Role::Sender => (&*local_public_key, remote_public_key),
        Role::Recipient => (remote_public_key, &*local_public_key),
    };

    let derived = Zeroizing::new(
        backend.keyed_hash(hash_key, &[&secret[..], &sender[..], &recipient[..]]),
    );
    shared_key.copy_from_slice(&derived[..]);
    Ok(())
}

fn agree<B: Primitives>(
    backend: &B,
    private_key: &[u8; PRIVATE_KEY_SIZE],
    public_key: &[u8; PUBLIC_KEY_SIZE],
) -> Result<Zeroizing<[u8; SHARED_SECRET_SIZE]>> {
    let secret = Zeroizing::new(backend.x25519(private_key, public_key));
    if constant_time::is_all_zeros(&secret[..])? {
        return Err(CryptoError::WeakKey);
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn key_pair() -> ([u8; PUBLIC_KEY_SIZE], [u8; PRIVATE_KEY_SIZE]) {
        let mut public_key = [0u8; PUBLIC_KEY_SIZE];
        let mut private_key = [0u8; PRIVATE_KEY_SIZE];
        generate_key_pair(&mut public_key, &mut private_key).unwrap();
        (public_key, private_key)
    }

    #[test]
    fn test_rfc7748_shared_secret() {
        let alice_private =
            hex::decode("77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a")
                .unwrap();
        let bob_public =
            hex::decode("de9edb7d7b7dc1b4d35b61c2ece435373f8343c85b78674dadfc7e146f882b4f")
                .unwrap();
        let mut shared_secret = [0u8; SHARED_SECRET_SIZE];
        compute_shared_secret(&mut shared_secret, &alice_private, &bob_public).unwrap();
        assert_eq!(
            hex::encode(shared_secret),
            "4a5d9d5ba4ce2de1728e3bf480350f25e07e21c947d19e3376f09b3c1e161742"
        );

        let mut alice_public = [0u8; PUBLIC_KEY_SIZE];
        compute_public_key(&mut alice_public, &alice_private).unwrap();
        assert_eq!(
            hex::encode(alice_public),
            "8520f0098930a754748b7ddcb43ef75a0dbf3a0d26381af4eba4a98eaa9b4e6a"
        );
    }

    #[test]
    fn test_generated_public_key_matches_private_key() {
        let (public_key, private_key) = key_pair();
        let mut recomputed = [0u8; PUBLIC_KEY_SIZE];
        compute_public_key(&mut recomputed, &private_key).unwrap();
        assert_eq!(public_key, recomputed);
    }

    #[test]
    fn test_sender_and_recipient_agree() {
        let (sender_public, sender_private) = key_pair();
        let (recipient_public, recipient_private) = key_pair();

        let mut sender_key = [0u8; SHARED_KEY_SIZE];
        let mut recipient_key = [0u8; SHARED_KEY_SIZE];
        derive_sender_shared_key(&mut sender_key, &sender_private, &recipient_public, None)
            .unwrap();
        derive_recipient_shared_key(&mut recipient_key, &recipient_private, &sender_public, None)
            .unwrap();
        assert_eq!(sender_key, recipient_key);

        let mut raw = [0u8; SHARED_SECRET_SIZE];
        compute_shared_secret(&mut raw, &sender_private, &recipient_public).unwrap();
        assert_ne!(raw, sender_key);
    }

    #[test]
    fn test_derivation_hashes_secret_and_both_public_keys() {
        let (sender_public, sender_private) = key_pair();
        let (recipient_public, recipient_private) = key_pair();
        let psk = [4u8; PRE_SHARED_KEY_SIZE];

        let mut raw = [0u8; SHARED_SECRET_SIZE];
        compute_shared_secret(&mut raw, &recipient_private, &sender_public).unwrap();
        let mut transcript = raw.to_vec();
        transcript.extend_from_slice(&sender_public);
        transcript.extend_from_slice(&recipient_public);
        let expected = *blake3::keyed_hash(&psk, &transcript).as_bytes();

        let mut shared_key = [0u8; SHARED_KEY_SIZE];
        derive_recipient_shared_key(
            &mut shared_key,
            &recipient_private,
            &sender_public,
            Some(&psk[..]),
        )
        .unwrap();
        assert_eq!(shared_key, expected);
    }

    #[test]
    fn test_pre_shared_key_changes_result() {
        let (_, sender_private) = key_pair();
        let (recipient_public, _) = key_pair();
        let psk = [9u8; PRE_SHARED_KEY_SIZE];

        let mut plain = [0u8; SHARED_KEY_SIZE];
        let mut with_psk = [0u8; SHARED_KEY_SIZE];
        derive_sender_shared_key(&mut plain, &sender_private, &recipient_public, None).unwrap();
        derive_sender_shared_key(&mut with_psk, &sender_private, &recipient_public, Some(&psk[..]))
            .unwrap();
        assert_ne!(plain, with_psk);
    }

    #[test]
    fn test_roles_are_not_interchangeable() {
        let (_, a_private) = key_pair();
        let (b_public, _) = key_pair();
        let mut as_sender = [0u8; SHARED_KEY_SIZE];
        let mut as_recipient = [0u8; SHARED_KEY_SIZE];
        derive_sender_shared_key(&mut as_sender, &a_private, &b_public, None).unwrap();
        derive_recipient_shared_key(&mut as_recipient, &a_private, &b_public, None).unwrap();
        assert_ne!(as_sender, as_recipient);
    }

    #[test]
    fn test_low_order_point_is_weak() {
        let (_, private_key) = key_pair();
        let zero_point = [0u8; PUBLIC_KEY_SIZE];

        let mut shared_secret = [0u8; SHARED_SECRET_SIZE];
        let err = compute_shared_secret(&mut shared_secret, &private_key, &zero_point).unwrap_err();
        assert!(matches!(err, CryptoError::WeakKey));
        assert_eq!(err.kind(), ErrorKind::Cryptographic);

        let mut shared_key = [0u8; SHARED_KEY_SIZE];
        assert!(matches!(
            derive_sender_shared_key(&mut shared_key, &private_key, &zero_point, None),
            Err(CryptoError::WeakKey)
        ));
        assert_eq!(shared_key, [0u8; SHARED_KEY_SIZE]);
    }

    #[test]
    fn test_size_checks() {
        let (public_key, private_key) = key_pair();
        let mut shared_key = [0u8; SHARED_KEY_SIZE];
        assert!(matches!(
            derive_sender_shared_key(&mut shared_key, &private_key, &public_key, Some(&[1u8; 16][..])),
            Err(CryptoError::InvalidLength {
                name: "pre_shared_key",
                ..
            })
        ));
        assert!(matches!(
            derive_recipient_shared_key(&mut shared_key[..31], &private_key, &public_key, None),
            Err(CryptoError::InvalidLength {
                name: "shared_key",
                ..
            })
        ));
        let mut short_public = [0u8; PUBLIC_KEY_SIZE - 1];
        let mut private_out = [0u8; PRIVATE_KEY_SIZE];
        assert!(generate_key_pair(&mut short_public, &mut private_out).is_err());
    }
}
