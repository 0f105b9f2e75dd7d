//! Constant-time operations over byte buffers.
//!
//! Buffers are treated as arbitrary-width little-endian unsigned integers.
//! The running time of every function depends only on buffer lengths, never
//! on their contents, so they can be used on tags, keys and nonces without
//! opening a timing side channel.
//!
//! Lengths are treated as public: [`equals`] returns early when the lengths
//! differ, and every other function rejects mismatched lengths with an
//! argument error instead of truncating or padding.

use crate::error::Result;
use crate::validation;
use subtle::ConstantTimeEq;

/// Compares two buffers in constant time.
///
/// Returns `Ok(false)` without reading the contents when the lengths differ.
///
/// # Errors
///
/// Returns `CryptoError::Empty` if either buffer is empty.
pub fn equals(a: &[u8], b: &[u8]) -> Result<bool> {
    validation::not_empty("a", a.len())?;
    validation::not_empty("b", b.len())?;
    if a.len() != b.len() {
        return Ok(false);
    }
    Ok(bool::from(a.ct_eq(b)))
}

/// Adds one to `buffer` in place, wrapping on overflow.
pub fn increment(buffer: &mut [u8]) -> Result<()> {
    validation::not_empty("buffer", buffer.len())?;
    let mut carry: u16 = 1;
    for byte in buffer.iter_mut() {
        carry += u16::from(*byte);
        *byte = carry as u8;
        carry >>= 8;
    }
    Ok(())
}

/// Writes `a + b` (mod 2^(8n)) into `buffer`.
pub fn add(buffer: &mut [u8], a: &[u8], b: &[u8]) -> Result<()> {
    check_operands(buffer.len(), a, b)?;
    let mut carry: u16 = 0;
    for ((out, &x), &y) in buffer.iter_mut().zip(a).zip(b) {
        carry += u16::from(x) + u16::from(y);
        *out = carry as u8;
        carry >>= 8;
    }
    Ok(())
}

/// Writes `a - b` (mod 2^(8n)) into `buffer`.
pub fn subtract(buffer: &mut [u8], a: &[u8], b: &[u8]) -> Result<()> {
    check_operands(buffer.len(), a, b)?;
    let mut borrow: u16 = 0;
    for ((out, &x), &y) in buffer.iter_mut().zip(a).zip(b) {
        let diff = u16::from(x)
            .wrapping_sub(u16::from(y))
            .wrapping_sub(borrow);
        *out = diff as u8;
        borrow = (diff >> 8) & 1;
    }
    Ok(())
}

/// Returns whether `a < b`.
pub fn is_less_than(a: &[u8], b: &[u8]) -> Result<bool> {
    Ok(compare(a, b)? == -1)
}

/// Returns whether `a > b`.
pub fn is_greater_than(a: &[u8], b: &[u8]) -> Result<bool> {
    Ok(compare(a, b)? == 1)
}

/// Returns whether every byte of `buffer` is zero.
pub fn is_all_zeros(buffer: &[u8]) -> Result<bool> {
    validation::not_empty("buffer", buffer.len())?;
    let folded = buffer.iter().fold(0u8, |acc, &byte| acc | byte);
    Ok(bool::from(folded.ct_eq(&0)))
}

fn check_operands(buffer_len: usize, a: &[u8], b: &[u8]) -> Result<()> {
    validation::not_empty("a", a.len())?;
    validation::equal_to_size("b", b.len(), a.len())?;
    validation::equal_to_size("buffer", buffer_len, a.len())
}

/// Returns -1, 0 or 1 as `a` is less than, equal to or greater than `b`.
fn compare(a: &[u8], b: &[u8]) -> Result<i32> {
    validation::not_empty("a", a.len())?;
    validation::equal_to_size("b", b.len(), a.len())?;

    let mut gt: u16 = 0;
    let mut eq: u16 = 1;
    for (&x, &y) in a.iter().zip(b).rev() {
        let (x, y) = (u16::from(x), u16::from(y));
        gt |= (y.wrapping_sub(x) >> 8) & eq;
        eq &= (y ^ x).wrapping_sub(1) >> 8;
    }
    Ok(i32::from(gt + gt + eq) - 1)
}
