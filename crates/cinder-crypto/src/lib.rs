//! Incremental authenticated encryption and memory-hygiene primitives.
//!
//! The centrepiece is [`stream::IncrementalXChaCha20Poly1305`], a chunked
//! XChaCha20-Poly1305 stream with per-chunk flags and key ratcheting that is
//! wire-compatible with libsodium's secretstream. Around it sit the pieces a
//! caller needs to use it safely: parameter validation, constant-time
//! comparison and arithmetic, page locking, guarded heap allocations, and an
//! X25519 key exchange that yields stream keys.
//!
//! Every operation works on caller-provided buffers, checks their sizes before
//! touching any key material, and reports failures through
//! [`error::CryptoError`].
//!
//! # Modules
//!
//! - `stream`: incremental XChaCha20-Poly1305 with rekeying
//! - `kex`: X25519 key exchange and shared-key derivation
//! - `constant_time`: timing-safe comparison and little-endian arithmetic
//! - `memory`: zeroing and page locking
//! - `guarded`: page-guarded heap allocations
//! - `validation`: buffer size contracts
//! - `backend`: the primitive boundary and process-wide initialisation
//! - `aead`: one-shot XChaCha20-Poly1305
//! - `hash`: BLAKE3 hashing
//! - `sign`: Ed25519 signatures
//! - `password`: Argon2id password hashing and key derivation
//! - `random`: secure random byte generation
//! - `error`: error types

#![deny(missing_docs)]
#![deny(clippy::all)]

pub mod aead;
pub mod backend;
pub mod constant_time;
pub mod error;
pub mod guarded;
pub mod hash;
pub mod kex;
pub mod memory;
pub mod password;
pub mod random;
pub mod sign;
pub mod stream;
pub mod validation;
