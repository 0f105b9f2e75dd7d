//! Incremental XChaCha20-Poly1305 authenticated streams.
//!
//! A stream is a sequence of independently authenticated chunks bound
//! together by a ratcheting internal nonce. The encrypting side creates a
//! session, which fills a 24-byte header with random bytes; the header is sent
//! ahead of the first chunk and the decrypting side opens a session from it
//! with the same key. Chunks must be pulled in the order they were pushed.
//!
//! The construction is byte-compatible with libsodium's
//! `crypto_secretstream_xchacha20poly1305`: a header and chunks produced by
//! either side open on the other.
//!
//! # Truncation
//!
//! [`IncrementalXChaCha20Poly1305::pull`] cannot tell that chunks are missing
//! from the end of a stream. Callers must check that the last chunk they
//! accept was flagged [`ChunkFlag::Final`].
//!
//! # Examples
//!
//! ```
//! use cinder_crypto::stream::{
//!     ChunkFlag, IncrementalXChaCha20Poly1305, StreamMode, HEADER_SIZE, KEY_SIZE, TAG_SIZE,
//! };
//!
//! let key = [0x42u8; KEY_SIZE];
//! let mut header = [0u8; HEADER_SIZE];
//! let mut sender = IncrementalXChaCha20Poly1305::new(StreamMode::Encryption, &mut header, &key)?;
//!
//! let mut chunk = [0u8; 5 + TAG_SIZE];
//! sender.push(&mut chunk, b"hello", b"", ChunkFlag::Final)?;
//!
//! let mut receiver =
//!     IncrementalXChaCha20Poly1305::new(StreamMode::Decryption, &mut header, &key)?;
//! let mut plaintext = [0u8; 5];
//! let flag = receiver.pull(&mut plaintext, &chunk, b"")?;
//! assert_eq!(&plaintext, b"hello");
//! assert_eq!(flag, ChunkFlag::Final);
//! # Ok::<(), cinder_crypto::error::CryptoError>(())
//! ```

use crate::backend::{
    self, NativeBackend, Primitives, CHACHA_NONCE_SIZE, HCHACHA_INPUT_SIZE, POLY1305_KEY_SIZE,
    POLY1305_TAG_SIZE,
};
use crate::constant_time;
use crate::error::{CryptoError, Result};
use crate::validation;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Size of a stream key in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of the stream header in bytes.
pub const HEADER_SIZE: usize = 24;

/// Bytes added to every chunk: one encrypted flag byte and a 16-byte tag.
pub const TAG_SIZE: usize = 1 + POLY1305_TAG_SIZE;

/// Largest plaintext accepted in a single chunk.
pub const MAX_MESSAGE_SIZE: usize = {
    let limit: u64 = 64 * ((1u64 << 32) - 2);
    if ((usize::MAX - TAG_SIZE) as u64) < limit {
        usize::MAX - TAG_SIZE
    } else {
        limit as usize
    }
};

const COUNTER_SIZE: usize = 4;
const BLOCK_SIZE: usize = 64;
const REKEY_BIT: u8 = 0x02;
const PAD_SIZE: usize = 16;
const ZERO_PAD: [u8; PAD_SIZE] = [0u8; PAD_SIZE];

/// Direction of a stream session, fixed when it is (re)initialised.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamMode {
    /// The session pushes plaintext and produces chunks.
    Encryption,
    /// The session pulls chunks and recovers plaintext.
    Decryption,
}

impl StreamMode {
    /// Lower-case name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Encryption => "encryption",
            Self::Decryption => "decryption",
        }
    }
}

/// Per-chunk flag, authenticated together with the chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChunkFlag {
    /// An ordinary chunk.
    Message = 0,
    /// Marks the end of a logical message within the stream.
    Boundary = 1,
    /// Both sides rekey after this chunk.
    Rekey = 2,
    /// Last chunk of the stream.
    Final = 3,
}

impl ChunkFlag {
    /// Wire value of the flag.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ChunkFlag {
    type Error = CryptoError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Message),
            1 => Ok(Self::Boundary),
            2 => Ok(Self::Rekey),
            3 => Ok(Self::Final),
            _ => Err(CryptoError::InvalidFormat {
                what: "chunk flag",
                reason: format!("unknown flag value {value}"),
            }),
        }
    }
}

/// Subkey and nonce (`counter ‖ inonce`) of a live session.
#[derive(Zeroize, ZeroizeOnDrop)]
struct StreamState {
    key: [u8; KEY_SIZE],
    nonce: [u8; CHACHA_NONCE_SIZE],
}

impl StreamState {
    fn empty() -> Self {
        Self {
            key: [0u8; KEY_SIZE],
            nonce: [0u8; CHACHA_NONCE_SIZE],
        }
    }

    fn reset_counter(&mut self) {
        self.nonce[..COUNTER_SIZE].copy_from_slice(&1u32.to_le_bytes());
    }
}

/// A chunked XChaCha20-Poly1305 stream session.
///
/// The type parameter selects the primitive implementation and defaults to
/// [`NativeBackend`]. Key material is zeroed by [`dispose`](Self::dispose) and
/// on drop.
pub struct IncrementalXChaCha20Poly1305<B: Primitives = NativeBackend> {
    backend: B,
    state: StreamState,
    mode: StreamMode,
    finalized: bool,
    disposed: bool,
}

impl IncrementalXChaCha20Poly1305 {
    /// Opens a session over the native primitives.
    ///
    /// In [`StreamMode::Encryption`] `header` is overwritten with fresh random
    /// bytes that must be delivered to the receiver. In
    /// [`StreamMode::Decryption`] it is read as received.
    ///
    /// # Errors
    ///
    /// Returns an argument error if `header` is not [`HEADER_SIZE`] bytes or
    /// `key` is not [`KEY_SIZE`] bytes, and `CryptoError::RandomnessFailure`
    /// if a header cannot be generated.
    pub fn new(mode: StreamMode, header: &mut [u8], key: &[u8]) -> Result<Self> {
        Self::with_backend(NativeBackend, mode, header, key)
    }
}

impl<B: Primitives> IncrementalXChaCha20Poly1305<B> {
    /// Opens a session over `backend`. See [`IncrementalXChaCha20Poly1305::new`].
    pub fn with_backend(backend: B, mode: StreamMode, header: &mut [u8], key: &[u8]) -> Result<Self> {
        let mut stream = Self {
            backend,
            state: StreamState::empty(),
            mode,
            finalized: false,
            disposed: false,
        };
        stream.reinitialize(mode, header, key)?;
        Ok(stream)
    }

    /// Starts a new session on this handle, discarding the current one.
    ///
    /// Clears the finalized flag. On error the current session is left as
    /// it was.
    ///
    /// # Errors
    ///
    /// As [`IncrementalXChaCha20Poly1305::new`], plus `CryptoError::Disposed`.
    pub fn reinitialize(&mut self, mode: StreamMode, header: &mut [u8], key: &[u8]) -> Result<()> {
        self.ensure_live()?;
        validation::equal_to_size("header", header.len(), HEADER_SIZE)?;
        let key: &[u8; KEY_SIZE] = validation::as_array("key", key)?;
        backend::ensure_ready()?;

        if mode == StreamMode::Encryption {
            self.backend.fill_random(header)?;
        }
        let (input, inonce) = header.split_at(HCHACHA_INPUT_SIZE);
        let input: &[u8; HCHACHA_INPUT_SIZE] = validation::as_array("header", input)?;

        self.state.key = self.backend.hchacha20(key, input);
        self.state.reset_counter();
        self.state.nonce[COUNTER_SIZE..].copy_from_slice(inonce);
        self.mode = mode;
        self.finalized = false;

        tracing::trace!(mode = mode.name(), "stream session initialised");
        Ok(())
    }

    /// Encrypts `plaintext_chunk` into `ciphertext_chunk`.
    ///
    /// `ciphertext_chunk` must be exactly `plaintext_chunk.len() + TAG_SIZE`
    /// bytes. `associated_data` is authenticated but not encrypted and must be
    /// supplied unchanged to [`pull`](Self::pull).
    ///
    /// # Errors
    ///
    /// Returns a state error if the session is disposed, decrypting or
    /// finalized, and an argument error for mis-sized buffers.
    pub fn push(
        &mut self,
        ciphertext_chunk: &mut [u8],
        plaintext_chunk: &[u8],
        associated_data: &[u8],
        flag: ChunkFlag,
    ) -> Result<()> {
        self.ensure_live()?;
        self.ensure_mode(StreamMode::Encryption, "push")?;
        self.ensure_open("push")?;
        validation::not_greater_than_max(
            "plaintext_chunk",
            plaintext_chunk.len(),
            MAX_MESSAGE_SIZE,
        )?;
        validation::equal_to_size(
            "ciphertext_chunk",
            ciphertext_chunk.len(),
            plaintext_chunk.len() + TAG_SIZE,
        )?;

        let (flag_out, rest) = ciphertext_chunk.split_at_mut(1);
        let (body, mac_out) = rest.split_at_mut(plaintext_chunk.len());

        let poly_key = self.poly1305_key();
        let mut block = Zeroizing::new([0u8; BLOCK_SIZE]);
        block[0] = flag.as_byte();
        self.backend
            .chacha20_xor_ic(&mut block[..], &self.state.nonce, 1, &self.state.key);
        flag_out[0] = block[0];

        body.copy_from_slice(plaintext_chunk);
        self.backend
            .chacha20_xor_ic(body, &self.state.nonce, 2, &self.state.key);

        let mac = self.compute_mac(&poly_key, associated_data, &block, body);
        mac_out.copy_from_slice(&mac);

        self.advance(&mac, flag.as_byte())?;
        if flag == ChunkFlag::Final {
            self.finalized = true;
        }
        Ok(())
    }

    /// Authenticates and decrypts `ciphertext_chunk` into `plaintext_chunk`.
    ///
    /// `plaintext_chunk` must be exactly `ciphertext_chunk.len() - TAG_SIZE`
    /// bytes. Returns the flag the sender attached to the chunk.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::DecryptionFailed` if the chunk, the associated
    /// data, the header or the key was altered, or if chunks were reordered.
    /// `plaintext_chunk` is zeroed and the session is not advanced, so the
    /// next correctly ordered chunk still opens. State and argument errors are
    /// reported as for [`push`](Self::push).
    pub fn pull(
        &mut self,
        plaintext_chunk: &mut [u8],
        ciphertext_chunk: &[u8],
        associated_data: &[u8],
    ) -> Result<ChunkFlag> {
        self.ensure_live()?;
        self.ensure_mode(StreamMode::Decryption, "pull")?;
        self.ensure_open("pull")?;
        validation::not_less_than_min("ciphertext_chunk", ciphertext_chunk.len(), TAG_SIZE)?;
        let message_len = ciphertext_chunk.len() - TAG_SIZE;
        validation::not_greater_than_max("ciphertext_chunk", message_len, MAX_MESSAGE_SIZE)?;
        validation::equal_to_size("plaintext_chunk", plaintext_chunk.len(), message_len)?;

        let result = self.open(plaintext_chunk, ciphertext_chunk, associated_data);
        if result.is_err() {
            plaintext_chunk.zeroize();
        }
        result
    }

    /// Ratchets the session key without sending a chunk.
    ///
    /// Both sides must rekey at the same position in the stream. Pushing a
    /// chunk flagged [`ChunkFlag::Rekey`] does this implicitly.
    ///
    /// # Errors
    ///
    /// Returns a state error if the session is disposed or finalized.
    pub fn rekey(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.ensure_open("rekey")?;
        self.ratchet();
        tracing::trace!(mode = self.mode.name(), "stream session rekeyed");
        Ok(())
    }

    /// Zeroes the session state. Later calls fail; calling again is a no-op.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.state.zeroize();
        self.disposed = true;
        tracing::trace!("stream session disposed");
    }

    /// Direction of the current session.
    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Whether a [`ChunkFlag::Final`] chunk has been processed.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn open(
        &mut self,
        plaintext_chunk: &mut [u8],
        ciphertext_chunk: &[u8],
        associated_data: &[u8],
    ) -> Result<ChunkFlag> {
        let (flag_in, rest) = ciphertext_chunk.split_at(1);
        let (body, stored_mac) = rest.split_at(plaintext_chunk.len());

        let poly_key = self.poly1305_key();
        let mut block = Zeroizing::new([0u8; BLOCK_SIZE]);
        block[0] = flag_in[0];
        self.backend
            .chacha20_xor_ic(&mut block[..], &self.state.nonce, 1, &self.state.key);
        let tag = block[0];
        block[0] = flag_in[0];

        let mut mac = self.compute_mac(&poly_key, associated_data, &block, body);
        if !constant_time::equals(&mac, stored_mac)? {
            mac.zeroize();
            return Err(CryptoError::DecryptionFailed);
        }
        let flag = ChunkFlag::try_from(tag)?;

        plaintext_chunk.copy_from_slice(body);
        self.backend
            .chacha20_xor_ic(plaintext_chunk, &self.state.nonce, 2, &self.state.key);

        self.advance(&mac, tag)?;
        if flag == ChunkFlag::Final {
            self.finalized = true;
        }
        Ok(flag)
    }

    fn poly1305_key(&self) -> Zeroizing<[u8; POLY1305_KEY_SIZE]> {
        let mut key = Zeroizing::new([0u8; POLY1305_KEY_SIZE]);
        self.backend
            .chacha20_xor_ic(&mut key[..], &self.state.nonce, 0, &self.state.key);
        key
    }

    /// Poly1305 over `ad ‖ pad16(ad) ‖ block ‖ ct ‖ 0^(|ct| mod 16) ‖ le64(|ad|) ‖ le64(64 + |ct|)`.
    ///
    /// The ciphertext is followed by `|ct| mod 16` zero bytes, not padded to
    /// a block boundary. libsodium's secretstream does the same, and the tags
    /// must match it.
    fn compute_mac(
        &self,
        poly_key: &[u8; POLY1305_KEY_SIZE],
        associated_data: &[u8],
        block: &[u8; BLOCK_SIZE],
        ciphertext: &[u8],
    ) -> [u8; POLY1305_TAG_SIZE] {
        let ad_pad = (PAD_SIZE - associated_data.len() % PAD_SIZE) % PAD_SIZE;
        let ct_pad = ciphertext.len() % PAD_SIZE;
        let mut lengths = [0u8; 16];
        lengths[..8].copy_from_slice(&(associated_data.len() as u64).to_le_bytes());
        lengths[8..].copy_from_slice(&((BLOCK_SIZE + ciphertext.len()) as u64).to_le_bytes());
        self.backend.poly1305(
            poly_key,
            &[
                associated_data,
                &ZERO_PAD[..ad_pad],
                &block[..],
                ciphertext,
                &ZERO_PAD[..ct_pad],
                &lengths[..],
            ],
        )
    }

    fn advance(&mut self, mac: &[u8; POLY1305_TAG_SIZE], tag: u8) -> Result<()> {
        for (n, m) in self.state.nonce[COUNTER_SIZE..].iter_mut().zip(mac) {
            *n ^= m;
        }
        constant_time::increment(&mut self.state.nonce[..COUNTER_SIZE])?;
        if tag & REKEY_BIT != 0 || constant_time::is_all_zeros(&self.state.nonce[..COUNTER_SIZE])? {
            self.ratchet();
        }
        Ok(())
    }

    fn ratchet(&mut self) {
        let mut next = Zeroizing::new([0u8; KEY_SIZE + CHACHA_NONCE_SIZE - COUNTER_SIZE]);
        next[..KEY_SIZE].copy_from_slice(&self.state.key);
        next[KEY_SIZE..].copy_from_slice(&self.state.nonce[COUNTER_SIZE..]);
        self.backend
            .chacha20_xor_ic(&mut next[..], &self.state.nonce, 0, &self.state.key);
        self.state.key.copy_from_slice(&next[..KEY_SIZE]);
        self.state.nonce[COUNTER_SIZE..].copy_from_slice(&next[KEY_SIZE..]);
        self.state.reset_counter();
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            return Err(CryptoError::Disposed {
                object: "IncrementalXChaCha20Poly1305",
            });
        }
        Ok(())
    }

    fn ensure_mode(&self, required: StreamMode, operation: &'static str) -> Result<()> {
        if self.mode != required {
            return Err(CryptoError::WrongMode {
                operation,
                mode: self.mode.name(),
            });
        }
        Ok(())
    }

    fn ensure_open(&self, operation: &'static str) -> Result<()> {
        if self.finalized {
            return Err(CryptoError::StreamFinalized { operation });
        }
        Ok(())
    }
}

impl<B: Primitives> std::fmt::Debug for IncrementalXChaCha20Poly1305<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalXChaCha20Poly1305")
            .field("mode", &self.mode)
            .field("finalized", &self.finalized)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}
