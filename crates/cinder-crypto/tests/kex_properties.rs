//! Property-based tests for X25519 key exchange.

use cinder_crypto::kex::{
    compute_shared_secret, derive_recipient_shared_key, derive_sender_shared_key,
    generate_key_pair, PRE_SHARED_KEY_SIZE, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE,
    SHARED_KEY_SIZE, SHARED_SECRET_SIZE,
};
use cinder_crypto::stream::{ChunkFlag, IncrementalXChaCha20Poly1305, StreamMode, HEADER_SIZE, TAG_SIZE};
use proptest::prelude::*;

fn key_pair() -> ([u8; PUBLIC_KEY_SIZE], [u8; PRIVATE_KEY_SIZE]) {
    let mut public_key = [0u8; PUBLIC_KEY_SIZE];
    let mut private_key = [0u8; PRIVATE_KEY_SIZE];
    generate_key_pair(&mut public_key, &mut private_key).expect("key generation should succeed");
    (public_key, private_key)
}

/// Property 1: Shared Key Symmetry
///
/// For any pair of key pairs and optional pre-shared key, the sender and the
/// recipient SHALL derive the same shared key.
#[test]
fn property_shared_key_symmetry() {
    proptest!(|(
        psk in proptest::option::of(prop::array::uniform32(any::<u8>()))
    )| {
        let (sender_public, sender_private) = key_pair();
        let (recipient_public, recipient_private) = key_pair();

        let mut sender_key = [0u8; SHARED_KEY_SIZE];
        let mut recipient_key = [0u8; SHARED_KEY_SIZE];
        derive_sender_shared_key(
            &mut sender_key,
            &sender_private,
            &recipient_public,
            psk.as_ref().map(|k| &k[..]),
        )
        .unwrap();
        derive_recipient_shared_key(
            &mut recipient_key,
            &recipient_private,
            &sender_public,
            psk.as_ref().map(|k| &k[..]),
        )
        .unwrap();
        prop_assert_eq!(sender_key, recipient_key);
    });
}

/// Property 2: Raw Secret Symmetry
#[test]
fn property_shared_secret_symmetry() {
    proptest!(ProptestConfig::with_cases(64), |(_seed in any::<u8>())| {
        let (a_public, a_private) = key_pair();
        let (b_public, b_private) = key_pair();
        let mut ab = [0u8; SHARED_SECRET_SIZE];
        let mut ba = [0u8; SHARED_SECRET_SIZE];
        compute_shared_secret(&mut ab, &a_private, &b_public).unwrap();
        compute_shared_secret(&mut ba, &b_private, &a_public).unwrap();
        prop_assert_eq!(ab, ba);
    });
}

#[test]
fn test_mismatched_pre_shared_keys_disagree() {
    let (sender_public, sender_private) = key_pair();
    let (recipient_public, recipient_private) = key_pair();

    let mut sender_key = [0u8; SHARED_KEY_SIZE];
    let mut recipient_key = [0u8; SHARED_KEY_SIZE];
    derive_sender_shared_key(
        &mut sender_key,
        &sender_private,
        &recipient_public,
        Some(&[1u8; PRE_SHARED_KEY_SIZE][..]),
    )
    .unwrap();
    derive_recipient_shared_key(
        &mut recipient_key,
        &recipient_private,
        &sender_public,
        Some(&[2u8; PRE_SHARED_KEY_SIZE][..]),
    )
    .unwrap();
    assert_ne!(sender_key, recipient_key);
}

#[test]
fn test_derived_key_drives_a_stream() {
    let (sender_public, sender_private) = key_pair();
    let (recipient_public, recipient_private) = key_pair();

    let mut sender_key = [0u8; SHARED_KEY_SIZE];
    derive_sender_shared_key(&mut sender_key, &sender_private, &recipient_public, None).unwrap();
    let mut header = [0u8; HEADER_SIZE];
    let mut sender =
        IncrementalXChaCha20Poly1305::new(StreamMode::Encryption, &mut header, &sender_key)
            .unwrap();
    let mut chunk = [0u8; 12 + TAG_SIZE];
    sender
        .push(&mut chunk, b"hello, world", b"", ChunkFlag::Final)
        .unwrap();

    let mut recipient_key = [0u8; SHARED_KEY_SIZE];
    derive_recipient_shared_key(&mut recipient_key, &recipient_private, &sender_public, None)
        .unwrap();
    let mut receiver =
        IncrementalXChaCha20Poly1305::new(StreamMode::Decryption, &mut header, &recipient_key)
            .unwrap();
    let mut plaintext = [0u8; 12];
    assert_eq!(
        receiver.pull(&mut plaintext, &chunk, b"").unwrap(),
        ChunkFlag::Final
    );
    assert_eq!(&plaintext, b"hello, world");
}
