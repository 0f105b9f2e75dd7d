//! Boundary to the primitive implementations.
//!
//! The stream, key-exchange and memory modules never call a cipher, MAC or
//! curve crate directly. They go through [`Primitives`], which has exactly one
//! method per primitive. Keys, nonces and tags cross the boundary as
//! fixed-size arrays so length mistakes are caught by the type system; only
//! message data is passed as slices. [`NativeBackend`] is the production
//! implementation. Tests substitute their own to exercise failure paths.
//!
//! Process-wide state (the page size and the guard canary) is created once by
//! [`ensure_ready`].

use crate::error::{CryptoError, Result};
use chacha20::cipher::consts::U10;
use chacha20::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use poly1305::universal_hash::{KeyInit, UniversalHash};
use std::sync::OnceLock;

/// Size of a ChaCha20 / HChaCha20 key in bytes.
pub const CHACHA_KEY_SIZE: usize = 32;

/// Size of an IETF ChaCha20 nonce in bytes.
pub const CHACHA_NONCE_SIZE: usize = 12;

/// Size of an HChaCha20 input block in bytes.
pub const HCHACHA_INPUT_SIZE: usize = 16;

/// Size of a Poly1305 one-time key in bytes.
pub const POLY1305_KEY_SIZE: usize = 32;

/// Size of a Poly1305 tag in bytes.
pub const POLY1305_TAG_SIZE: usize = 16;

const POLY1305_BLOCK_SIZE: usize = 16;

/// Size of an X25519 scalar or point in bytes.
pub const X25519_SIZE: usize = 32;

/// Size of a BLAKE3 key and default output in bytes.
pub const HASH_KEY_SIZE: usize = 32;

/// Size of the canary placed in front of guarded allocations.
pub const CANARY_SIZE: usize = 16;

/// The primitive black boxes the rest of the crate is built on.
///
/// Implementations must be pure functions of their inputs, except for
/// [`Primitives::fill_random`].
pub trait Primitives {
    /// Fills `dest` with bytes from a CSPRNG.
    fn fill_random(&self, dest: &mut [u8]) -> Result<()>;

    /// Derives a subkey from `key` and a 16-byte input with HChaCha20.
    fn hchacha20(
        &self,
        key: &[u8; CHACHA_KEY_SIZE],
        input: &[u8; HCHACHA_INPUT_SIZE],
    ) -> [u8; CHACHA_KEY_SIZE];

    /// XORs `data` with the IETF ChaCha20 keystream starting at block `counter`.
    fn chacha20_xor_ic(
        &self,
        data: &mut [u8],
        nonce: &[u8; CHACHA_NONCE_SIZE],
        counter: u32,
        key: &[u8; CHACHA_KEY_SIZE],
    );

    /// Computes Poly1305 over the concatenation of `segments`.
    ///
    /// No padding is inserted between segments; callers pass their own zero
    /// segments where a construction requires them.
    fn poly1305(
        &self,
        key: &[u8; POLY1305_KEY_SIZE],
        segments: &[&[u8]],
    ) -> [u8; POLY1305_TAG_SIZE];

    /// X25519 scalar multiplication.
    fn x25519(&self, scalar: &[u8; X25519_SIZE], point: &[u8; X25519_SIZE]) -> [u8; X25519_SIZE];

    /// X25519 scalar multiplication by the base point.
    fn x25519_base(&self, scalar: &[u8; X25519_SIZE]) -> [u8; X25519_SIZE];

    /// Keyed BLAKE3 over the concatenation of `segments`.
    fn keyed_hash(&self, key: &[u8; HASH_KEY_SIZE], segments: &[&[u8]]) -> [u8; HASH_KEY_SIZE];
}

/// Primitives backed by RustCrypto, x25519-dalek and BLAKE3.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeBackend;

impl Primitives for NativeBackend {
    fn fill_random(&self, dest: &mut [u8]) -> Result<()> {
        getrandom::getrandom(dest).map_err(|e| CryptoError::RandomnessFailure(e.to_string()))
    }

    fn hchacha20(
        &self,
        key: &[u8; CHACHA_KEY_SIZE],
        input: &[u8; HCHACHA_INPUT_SIZE],
    ) -> [u8; CHACHA_KEY_SIZE] {
        let subkey = chacha20::hchacha::<U10>(
            chacha20::Key::from_slice(key),
            chacha20::cipher::generic_array::GenericArray::from_slice(input),
        );
        let mut output = [0u8; CHACHA_KEY_SIZE];
        output.copy_from_slice(&subkey);
        output
    }

    fn chacha20_xor_ic(
        &self,
        data: &mut [u8],
        nonce: &[u8; CHACHA_NONCE_SIZE],
        counter: u32,
        key: &[u8; CHACHA_KEY_SIZE],
    ) {
        let mut cipher = chacha20::ChaCha20::new(
            chacha20::Key::from_slice(key),
            chacha20::Nonce::from_slice(nonce),
        );
        cipher.seek(u64::from(counter) * 64);
        cipher.apply_keystream(data);
    }

    fn poly1305(
        &self,
        key: &[u8; POLY1305_KEY_SIZE],
        segments: &[&[u8]],
    ) -> [u8; POLY1305_TAG_SIZE] {
        let mut mac = poly1305::Poly1305::new(poly1305::Key::from_slice(key));
        let mut pending = [0u8; POLY1305_BLOCK_SIZE];
        let mut filled = 0;
        for segment in segments {
            let mut rest: &[u8] = segment;
            while !rest.is_empty() {
                let take = (POLY1305_BLOCK_SIZE - filled).min(rest.len());
                pending[filled..filled + take].copy_from_slice(&rest[..take]);
                filled += take;
                rest = &rest[take..];
                if filled == POLY1305_BLOCK_SIZE {
                    mac.update(&[poly1305::Block::clone_from_slice(&pending)]);
                    filled = 0;
                }
            }
        }
        let mut tag = [0u8; POLY1305_TAG_SIZE];
        tag.copy_from_slice(&mac.compute_unpadded(&pending[..filled]));
        tag
    }

    fn x25519(&self, scalar: &[u8; X25519_SIZE], point: &[u8; X25519_SIZE]) -> [u8; X25519_SIZE] {
        x25519_dalek::x25519(*scalar, *point)
    }

    fn x25519_base(&self, scalar: &[u8; X25519_SIZE]) -> [u8; X25519_SIZE] {
        x25519_dalek::x25519(*scalar, x25519_dalek::X25519_BASEPOINT_BYTES)
    }

    fn keyed_hash(&self, key: &[u8; HASH_KEY_SIZE], segments: &[&[u8]]) -> [u8; HASH_KEY_SIZE] {
        let mut hasher = blake3::Hasher::new_keyed(key);
        for segment in segments {
            hasher.update(segment);
        }
        *hasher.finalize().as_bytes()
    }
}

/// Process-wide values shared by every caller.
pub struct Runtime {
    page_size: usize,
    canary: [u8; CANARY_SIZE],
}

impl Runtime {
    fn initialise() -> Result<Self> {
        // SAFETY: sysconf has no memory-safety preconditions.
        let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        let page_size = usize::try_from(raw)
            .ok()
            .filter(|size| size.is_power_of_two())
            .ok_or_else(|| CryptoError::AllocationFailed {
                size: 0,
                source: std::io::Error::last_os_error(),
            })?;

        let mut canary = [0u8; CANARY_SIZE];
        NativeBackend.fill_random(&mut canary)?;

        tracing::debug!(page_size, "cryptographic backend initialised");
        Ok(Self { page_size, canary })
    }

    /// Returns the OS page size in bytes.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub(crate) fn canary(&self) -> &[u8; CANARY_SIZE] {
        &self.canary
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Initialises process-wide backend state on first use.
///
/// Safe to call any number of times from any thread; every call after the
/// first successful one returns the same [`Runtime`].
///
/// # Errors
///
/// Returns `CryptoError::RandomnessFailure` if the canary cannot be generated,
/// or `CryptoError::AllocationFailed` if the page size cannot be determined.
pub fn ensure_ready() -> Result<&'static Runtime> {
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime);
    }
    let runtime = Runtime::initialise()?;
    Ok(RUNTIME.get_or_init(|| runtime))
}
