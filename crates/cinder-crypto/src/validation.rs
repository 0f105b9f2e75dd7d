//! Parameter contract checks.
//!
//! Every public operation runs the relevant checks on its buffer arguments
//! before any cryptographic state or backend primitive is touched, so a
//! malformed call never reaches the backend. The checks only compare lengths:
//! they do not allocate and are safe to call with attacker-controlled sizes.

use crate::error::{CryptoError, Result};

/// Requires `actual` to equal `expected`.
pub fn equal_to_size(name: &'static str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(CryptoError::InvalidLength {
            name,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Requires `bytes` to be exactly `N` long and borrows it as an array.
pub fn as_array<'a, const N: usize>(name: &'static str, bytes: &'a [u8]) -> Result<&'a [u8; N]> {
    bytes.try_into().map_err(|_| CryptoError::InvalidLength {
        name,
        expected: N,
        actual: bytes.len(),
    })
}

/// Requires `min <= actual <= max`.
pub fn size_between(name: &'static str, actual: usize, min: usize, max: usize) -> Result<()> {
    if actual < min || actual > max {
        return Err(CryptoError::LengthOutOfRange {
            name,
            min,
            max,
            actual,
        });
    }
    Ok(())
}

/// Requires `actual >= min`.
pub fn not_less_than_min(name: &'static str, actual: usize, min: usize) -> Result<()> {
    if actual < min {
        return Err(CryptoError::TooShort { name, min, actual });
    }
    Ok(())
}

/// Requires `actual <= max`.
pub fn not_greater_than_max(name: &'static str, actual: usize, max: usize) -> Result<()> {
    if actual > max {
        return Err(CryptoError::TooLong { name, max, actual });
    }
    Ok(())
}

/// Requires `actual` to be a multiple of `multiple`.
///
/// Zero is a multiple of everything; combine with [`not_empty`] when an empty
/// buffer must also be rejected.
pub fn multiple_of_size(name: &'static str, actual: usize, multiple: usize) -> Result<()> {
    if multiple == 0 || actual % multiple != 0 {
        return Err(CryptoError::NotMultipleOf {
            name,
            multiple,
            actual,
        });
    }
    Ok(())
}

/// Requires a non-zero length.
pub fn not_empty(name: &'static str, actual: usize) -> Result<()> {
    if actual == 0 {
        return Err(CryptoError::Empty { name });
    }
    Ok(())
}

/// Requires a numeric parameter to be strictly positive.
pub fn greater_than_zero(name: &'static str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(CryptoError::NotPositive { name });
    }
    Ok(())
}

/// Requires a string to be present and non-empty.
pub fn not_null_or_empty(name: &'static str, value: Option<&str>) -> Result<()> {
    match value {
        Some(s) if !s.is_empty() => Ok(()),
        _ => Err(CryptoError::Empty { name }),
    }
}
