//! Ed25519 digital signatures.
//!
//! Private keys are the 32-byte seed form; the public key is derived from it.
//! Signatures are deterministic. Verification uses the strict rules, which
//! reject small-order keys and non-canonical signatures.

use crate::backend::{NativeBackend, Primitives};
use crate::error::{CryptoError, Result};
use crate::validation;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use zeroize::Zeroizing;

/// Size of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of an Ed25519 private key (seed) in bytes.
pub const PRIVATE_KEY_SIZE: usize = 32;

/// Size of an Ed25519 signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Generates a signing key pair into the given buffers.
///
/// # Errors
///
/// Returns an argument error for mis-sized buffers and
/// `CryptoError::RandomnessFailure` if the OS RNG is unavailable.
pub fn generate_key_pair(public_key: &mut [u8], private_key: &mut [u8]) -> Result<()> {
    validation::equal_to_size("public_key", public_key.len(), PUBLIC_KEY_SIZE)?;
    validation::equal_to_size("private_key", private_key.len(), PRIVATE_KEY_SIZE)?;
    NativeBackend.fill_random(private_key)?;
    compute_public_key(public_key, private_key)
}

/// Computes the public key belonging to `private_key`.
pub fn compute_public_key(public_key: &mut [u8], private_key: &[u8]) -> Result<()> {
    validation::equal_to_size("public_key", public_key.len(), PUBLIC_KEY_SIZE)?;
    let signing_key = signing_key(private_key)?;
    public_key.copy_from_slice(signing_key.verifying_key().as_bytes());
    Ok(())
}

/// Signs `message` into `signature`.
///
/// # Examples
///
/// ```
/// use cinder_crypto::sign::{generate_key_pair, sign, verify, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
///
/// let mut public_key = [0u8; PUBLIC_KEY_SIZE];
/// let mut private_key = [0u8; PRIVATE_KEY_SIZE];
/// generate_key_pair(&mut public_key, &mut private_key)?;
///
/// let mut signature = [0u8; SIGNATURE_SIZE];
/// sign(&mut signature, b"release v1.2.0", &private_key)?;
/// verify(&signature, b"release v1.2.0", &public_key)?;
/// # Ok::<(), cinder_crypto::error::CryptoError>(())
/// ```
pub fn sign(signature: &mut [u8], message: &[u8], private_key: &[u8]) -> Result<()> {
    validation::equal_to_size("signature", signature.len(), SIGNATURE_SIZE)?;
    let signing_key = signing_key(private_key)?;
    signature.copy_from_slice(&signing_key.sign(message).to_bytes());
    Ok(())
}

/// Verifies `signature` over `message`.
///
/// # Errors
///
/// Returns `CryptoError::InvalidSignature` if the signature does not verify,
/// and `CryptoError::InvalidFormat` if `public_key` is not a valid point.
pub fn verify(signature: &[u8], message: &[u8], public_key: &[u8]) -> Result<()> {
    let signature: &[u8; SIGNATURE_SIZE] = validation::as_array("signature", signature)?;
    let public_key: &[u8; PUBLIC_KEY_SIZE] = validation::as_array("public_key", public_key)?;
    let verifying_key =
        VerifyingKey::from_bytes(public_key).map_err(|_| CryptoError::InvalidFormat {
            what: "public key",
            reason: "not a valid Ed25519 point".into(),
        })?;
    verifying_key
        .verify_strict(message, &Signature::from_bytes(signature))
        .map_err(|_| CryptoError::InvalidSignature)
}

fn signing_key(private_key: &[u8]) -> Result<SigningKey> {
    let seed = Zeroizing::new(*validation::as_array::<PRIVATE_KEY_SIZE>("private_key", private_key)?);
    Ok(SigningKey::from_bytes(&seed))
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
    fn test_rfc8032_test_1() {
        let private_key =
            hex::decode("9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60")
                .unwrap();
        let mut public_key = [0u8; PUBLIC_KEY_SIZE];
        compute_public_key(&mut public_key, &private_key).unwrap();
        assert_eq!(
            hex::encode(public_key),
            "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a"
        );

        let mut signature = [0u8; SIGNATURE_SIZE];
        sign(&mut signature, b"", &private_key).unwrap();
        assert_eq!(
            hex::encode(signature),
            "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e06522490155\
             5fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b"
        );
        verify(&signature, b"", &public_key).unwrap();
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let (public_key, private_key) = key_pair();
        let mut signature = [0u8; SIGNATURE_SIZE];
        sign(&mut signature, b"Hello, World!", &private_key).unwrap();
        assert!(verify(&signature, b"Hello, World!", &public_key).is_ok());
    }

    #[test]
    fn test_verify_wrong_message_or_key() {
        let (public_key, private_key) = key_pair();
        let (other_public, _) = key_pair();
        let mut signature = [0u8; SIGNATURE_SIZE];
        sign(&mut signature, b"message 1", &private_key).unwrap();

        let err = verify(&signature, b"message 2", &public_key).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidSignature));
        assert_eq!(err.kind(), ErrorKind::Cryptographic);
        assert!(verify(&signature, b"message 1", &other_public).is_err());
    }

    #[test]
    fn test_verify_tampered_signature() {
        let (public_key, private_key) = key_pair();
        let mut signature = [0u8; SIGNATURE_SIZE];
        sign(&mut signature, b"test", &private_key).unwrap();
        signature[0] ^= 0x01;
        assert!(verify(&signature, b"test", &public_key).is_err());
    }

    #[test]
    fn test_signature_determinism() {
        let (_, private_key) = key_pair();
        let mut first = [0u8; SIGNATURE_SIZE];
        let mut second = [0u8; SIGNATURE_SIZE];
        sign(&mut first, b"same", &private_key).unwrap();
        sign(&mut second, b"same", &private_key).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_size_checks() {
        let (public_key, private_key) = key_pair();
        let mut short = [0u8; SIGNATURE_SIZE - 1];
        assert!(matches!(
            sign(&mut short, b"m", &private_key),
            Err(CryptoError::InvalidLength {
                name: "signature",
                ..
            })
        ));
        assert!(matches!(
            verify(&[0u8; SIGNATURE_SIZE], b"m", &public_key[..31]),
            Err(CryptoError::InvalidLength {
                name: "public_key",
                ..
            })
        ));
    }
}
