//! Cryptographic error types.
//!
//! Every failure in this crate is reported through [`CryptoError`]. The
//! variants fall into five classes, exposed through [`CryptoError::kind`], so
//! that callers can tell a malformed call apart from a forged ciphertext or an
//! exhausted OS resource without matching on individual variants.

use thiserror::Error;

/// Broad classification of a [`CryptoError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A parameter broke its contract (wrong length, empty, out of range).
    InvalidArgument,
    /// Authentication failed or key material was degenerate.
    Cryptographic,
    /// The OS refused memory, a page lock, or randomness.
    ResourceExhausted,
    /// An object was used in a state that does not permit the call.
    InvalidState,
    /// An encoded value could not be parsed.
    Format,
}

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Buffer length differs from the single length the operation accepts.
    #[error("{name} must be {expected} bytes long, got {actual}")]
    InvalidLength {
        /// Parameter name.
        name: &'static str,
        /// Required length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Buffer length falls outside an inclusive range.
    #[error("{name} must be between {min} and {max} bytes long, got {actual}")]
    LengthOutOfRange {
        /// Parameter name.
        name: &'static str,
        /// Minimum length in bytes.
        min: usize,
        /// Maximum length in bytes.
        max: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Buffer is shorter than the minimum length.
    #[error("{name} must be at least {min} bytes long, got {actual}")]
    TooShort {
        /// Parameter name.
        name: &'static str,
        /// Minimum length in bytes.
        min: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Buffer is longer than the maximum length.
    #[error("{name} must be at most {max} bytes long, got {actual}")]
    TooLong {
        /// Parameter name.
        name: &'static str,
        /// Maximum length in bytes.
        max: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Buffer length is not a multiple of the required block size.
    #[error("{name} length must be a multiple of {multiple}, got {actual}")]
    NotMultipleOf {
        /// Parameter name.
        name: &'static str,
        /// Required divisor.
        multiple: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Buffer or string must not be empty.
    #[error("{name} must not be empty")]
    Empty {
        /// Parameter name.
        name: &'static str,
    },

    /// Numeric parameter must be greater than zero.
    #[error("{name} must be greater than zero")]
    NotPositive {
        /// Parameter name.
        name: &'static str,
    },

    /// A tuning parameter was rejected.
    #[error("invalid {name}: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// AEAD decryption failed (authentication tag mismatch or invalid ciphertext).
    #[error("decryption failed: authentication tag mismatch or invalid ciphertext")]
    DecryptionFailed,

    /// Ed25519 signature verification failed.
    #[error("signature verification failed")]
    InvalidSignature,

    /// Key agreement produced a degenerate (all-zero) shared secret.
    #[error("weak key: key agreement produced a degenerate shared secret")]
    WeakKey,

    /// OS random number generator is unavailable (fatal).
    #[error("randomness source unavailable: {0}")]
    RandomnessFailure(String),

    /// Pages could not be locked into memory.
    #[error("unable to lock memory: {0}")]
    MemoryLock(#[source] std::io::Error),

    /// Pages could not be unlocked.
    #[error("unable to unlock memory: {0}")]
    MemoryUnlock(#[source] std::io::Error),

    /// Guarded region could not be mapped.
    #[error("unable to allocate {size} guarded bytes: {source}")]
    AllocationFailed {
        /// Requested size in bytes.
        size: usize,
        /// OS error.
        #[source]
        source: std::io::Error,
    },

    /// Page protection could not be changed.
    #[error("unable to change memory protection: {0}")]
    ProtectionFailed(#[source] std::io::Error),

    /// Operation is not valid for the stream's mode.
    #[error("{operation} is not allowed on a {mode} stream")]
    WrongMode {
        /// Rejected operation.
        operation: &'static str,
        /// Current stream mode.
        mode: &'static str,
    },

    /// The stream has processed its final chunk and must be reinitialised.
    #[error("cannot {operation} after the final chunk without reinitialising")]
    StreamFinalized {
        /// Rejected operation.
        operation: &'static str,
    },

    /// The object has been disposed.
    #[error("{object} has been disposed")]
    Disposed {
        /// Type of the disposed object.
        object: &'static str,
    },

    /// Guarded memory is not accessible in its current protection state.
    #[error("guarded memory is not {required} in the {current} state")]
    Inaccessible {
        /// Access the caller asked for.
        required: &'static str,
        /// Current protection state.
        current: &'static str,
    },

    /// The canary in front of a guarded allocation was overwritten.
    #[error("guarded allocation canary was overwritten")]
    CanaryCorrupted,

    /// An encoded value could not be parsed.
    #[error("invalid {what}: {reason}")]
    InvalidFormat {
        /// What was being parsed.
        what: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl CryptoError {
    /// Returns the class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidLength { .. }
            | Self::LengthOutOfRange { .. }
            | Self::TooShort { .. }
            | Self::TooLong { .. }
            | Self::NotMultipleOf { .. }
            | Self::Empty { .. }
            | Self::NotPositive { .. }
            | Self::InvalidParameter { .. } => ErrorKind::InvalidArgument,
            Self::DecryptionFailed | Self::InvalidSignature | Self::WeakKey => {
                ErrorKind::Cryptographic
            }
            Self::RandomnessFailure(_)
            | Self::MemoryLock(_)
            | Self::MemoryUnlock(_)
            | Self::AllocationFailed { .. }
            | Self::ProtectionFailed(_) => ErrorKind::ResourceExhausted,
            Self::WrongMode { .. }
            | Self::StreamFinalized { .. }
            | Self::Disposed { .. }
            | Self::Inaccessible { .. }
            | Self::CanaryCorrupted => ErrorKind::InvalidState,
            Self::InvalidFormat { .. } => ErrorKind::Format,
        }
    }
}

/// Result type for cryptographic operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
