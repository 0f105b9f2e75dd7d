//! Shared test utilities for cinder.
//!
//! Substitute backends for failure paths and fixed headers, proptest
//! strategies for stream inputs, and a tracing subscriber for test runs.

#![allow(missing_docs)]

use cinder_crypto::backend::{
    NativeBackend, Primitives, CHACHA_KEY_SIZE, CHACHA_NONCE_SIZE, HASH_KEY_SIZE,
    HCHACHA_INPUT_SIZE, POLY1305_KEY_SIZE, POLY1305_TAG_SIZE, X25519_SIZE,
};
use cinder_crypto::error::{CryptoError, Result};
use cinder_crypto::stream::{ChunkFlag, HEADER_SIZE, KEY_SIZE};
use proptest::prelude::*;
use std::sync::Once;

/// Native primitives with a corrupted MAC: every Poly1305 tag has its first
/// bit flipped.
///
/// Chunks sealed through this backend never open with [`NativeBackend`], and
/// chunks sealed with [`NativeBackend`] never open through it.
#[derive(Clone, Copy, Debug, Default)]
pub struct TamperingBackend;

impl Primitives for TamperingBackend {
    fn fill_random(&self, dest: &mut [u8]) -> Result<()> {
        NativeBackend.fill_random(dest)
    }

    fn hchacha20(
        &self,
        key: &[u8; CHACHA_KEY_SIZE],
        input: &[u8; HCHACHA_INPUT_SIZE],
    ) -> [u8; CHACHA_KEY_SIZE] {
        NativeBackend.hchacha20(key, input)
    }

    fn chacha20_xor_ic(
        &self,
        data: &mut [u8],
        nonce: &[u8; CHACHA_NONCE_SIZE],
        counter: u32,
        key: &[u8; CHACHA_KEY_SIZE],
    ) {
        NativeBackend.chacha20_xor_ic(data, nonce, counter, key)
    }

    fn poly1305(
        &self,
        key: &[u8; POLY1305_KEY_SIZE],
        segments: &[&[u8]],
    ) -> [u8; POLY1305_TAG_SIZE] {
        let mut tag = NativeBackend.poly1305(key, segments);
        tag[0] ^= 0x01;
        tag
    }

    fn x25519(&self, scalar: &[u8; X25519_SIZE], point: &[u8; X25519_SIZE]) -> [u8; X25519_SIZE] {
        NativeBackend.x25519(scalar, point)
    }

    fn x25519_base(&self, scalar: &[u8; X25519_SIZE]) -> [u8; X25519_SIZE] {
        NativeBackend.x25519_base(scalar)
    }

    fn keyed_hash(&self, key: &[u8; HASH_KEY_SIZE], segments: &[&[u8]]) -> [u8; HASH_KEY_SIZE] {
        NativeBackend.keyed_hash(key, segments)
    }
}

/// Native primitives whose randomness source is unavailable.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingRandomBackend;

impl Primitives for FailingRandomBackend {
    fn fill_random(&self, _dest: &mut [u8]) -> Result<()> {
        Err(CryptoError::RandomnessFailure(
            "entropy source disabled for testing".into(),
        ))
    }

    fn hchacha20(
        &self,
        key: &[u8; CHACHA_KEY_SIZE],
        input: &[u8; HCHACHA_INPUT_SIZE],
    ) -> [u8; CHACHA_KEY_SIZE] {
        NativeBackend.hchacha20(key, input)
    }

    fn chacha20_xor_ic(
        &self,
        data: &mut [u8],
        nonce: &[u8; CHACHA_NONCE_SIZE],
        counter: u32,
        key: &[u8; CHACHA_KEY_SIZE],
    ) {
        NativeBackend.chacha20_xor_ic(data, nonce, counter, key)
    }

    fn poly1305(
        &self,
        key: &[u8; POLY1305_KEY_SIZE],
        segments: &[&[u8]],
    ) -> [u8; POLY1305_TAG_SIZE] {
        NativeBackend.poly1305(key, segments)
    }

    fn x25519(&self, scalar: &[u8; X25519_SIZE], point: &[u8; X25519_SIZE]) -> [u8; X25519_SIZE] {
        NativeBackend.x25519(scalar, point)
    }

    fn x25519_base(&self, scalar: &[u8; X25519_SIZE]) -> [u8; X25519_SIZE] {
        NativeBackend.x25519_base(scalar)
    }

    fn keyed_hash(&self, key: &[u8; HASH_KEY_SIZE], segments: &[&[u8]]) -> [u8; HASH_KEY_SIZE] {
        NativeBackend.keyed_hash(key, segments)
    }
}

/// Native primitives whose randomness source replays a fixed byte string.
///
/// Every `fill_random` call copies the first `dest.len()` bytes of the seed,
/// so an encrypting stream session gets a chosen header.
#[derive(Clone, Debug)]
pub struct FixedRandomBackend {
    seed: Vec<u8>,
}

impl FixedRandomBackend {
    pub fn new(seed: &[u8]) -> Self {
        Self {
            seed: seed.to_vec(),
        }
    }
}

impl Primitives for FixedRandomBackend {
    fn fill_random(&self, dest: &mut [u8]) -> Result<()> {
        if dest.len() > self.seed.len() {
            return Err(CryptoError::RandomnessFailure(format!(
                "fixed seed holds {} bytes, {} requested",
                self.seed.len(),
                dest.len()
            )));
        }
        dest.copy_from_slice(&self.seed[..dest.len()]);
        Ok(())
    }

    fn hchacha20(
        &self,
        key: &[u8; CHACHA_KEY_SIZE],
        input: &[u8; HCHACHA_INPUT_SIZE],
    ) -> [u8; CHACHA_KEY_SIZE] {
        NativeBackend.hchacha20(key, input)
    }

    fn chacha20_xor_ic(
        &self,
        data: &mut [u8],
        nonce: &[u8; CHACHA_NONCE_SIZE],
        counter: u32,
        key: &[u8; CHACHA_KEY_SIZE],
    ) {
        NativeBackend.chacha20_xor_ic(data, nonce, counter, key)
    }

    fn poly1305(
        &self,
        key: &[u8; POLY1305_KEY_SIZE],
        segments: &[&[u8]],
    ) -> [u8; POLY1305_TAG_SIZE] {
        NativeBackend.poly1305(key, segments)
    }

    fn x25519(&self, scalar: &[u8; X25519_SIZE], point: &[u8; X25519_SIZE]) -> [u8; X25519_SIZE] {
        NativeBackend.x25519(scalar, point)
    }

    fn x25519_base(&self, scalar: &[u8; X25519_SIZE]) -> [u8; X25519_SIZE] {
        NativeBackend.x25519_base(scalar)
    }

    fn keyed_hash(&self, key: &[u8; HASH_KEY_SIZE], segments: &[&[u8]]) -> [u8; HASH_KEY_SIZE] {
        NativeBackend.keyed_hash(key, segments)
    }
}

/// Any 32-byte stream key.
pub fn stream_key() -> impl Strategy<Value = [u8; KEY_SIZE]> {
    any::<[u8; KEY_SIZE]>()
}

/// Any 24-byte stream header.
pub fn stream_header() -> impl Strategy<Value = [u8; HEADER_SIZE]> {
    any::<[u8; HEADER_SIZE]>()
}

/// Any chunk flag.
pub fn chunk_flag() -> impl Strategy<Value = ChunkFlag> {
    prop_oneof![
        Just(ChunkFlag::Message),
        Just(ChunkFlag::Boundary),
        Just(ChunkFlag::Rekey),
        Just(ChunkFlag::Final),
    ]
}

/// Associated data of up to 64 bytes, empty included.
pub fn associated_data() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// Between one and eight chunks whose last flag is [`ChunkFlag::Final`] and
/// whose other flags are never `Final`.
pub fn chunk_plan() -> impl Strategy<Value = Vec<(Vec<u8>, ChunkFlag)>> {
    let middle = prop_oneof![
        Just(ChunkFlag::Message),
        Just(ChunkFlag::Boundary),
        Just(ChunkFlag::Rekey),
    ];
    (
        prop::collection::vec((prop::collection::vec(any::<u8>(), 0..200), middle), 0..7),
        prop::collection::vec(any::<u8>(), 0..200),
    )
        .prop_map(|(mut chunks, last)| {
            chunks.push((last, ChunkFlag::Final));
            chunks
        })
}

/// Installs a `tracing` subscriber filtered by `RUST_LOG`, once per process.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
