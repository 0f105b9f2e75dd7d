//! Secure memory helpers.
//!
//! [`zero_memory`] goes through `zeroize`, whose volatile writes and compiler
//! fence cannot be removed by the optimiser the way a plain loop over a buffer
//! that is about to be dropped can.
//!
//! [`lock_memory`] pins pages so secrets are never written to swap. The buffer
//! length must be a whole number of pages: the OS locks whole pages, and a
//! length that is not a multiple would silently lock (or fail to lock)
//! neighbouring data.

use crate::backend;
use crate::error::{CryptoError, Result};
use crate::validation;
use zeroize::Zeroize;

/// Returns the OS page size in bytes.
pub fn page_size() -> Result<usize> {
    Ok(backend::ensure_ready()?.page_size())
}

/// Overwrites `buffer` with zeros.
///
/// Works for byte and character buffers as well as `String`/`str`.
pub fn zero_memory<Z: Zeroize + ?Sized>(buffer: &mut Z) {
    buffer.zeroize();
}

/// Locks the pages backing `buffer` into RAM.
///
/// Where supported, the pages are also excluded from core dumps.
///
/// # Errors
///
/// Returns an argument error if `buffer` is empty or its length is not a
/// multiple of [`page_size`], and `CryptoError::MemoryLock` if the OS refuses
/// (for example when `RLIMIT_MEMLOCK` is exhausted or the region is too large).
pub fn lock_memory(buffer: &mut [u8]) -> Result<()> {
    check_pages(buffer)?;
    // SAFETY: the pointer and length describe a live, exclusively borrowed
    // allocation. mlock does not read or write the memory.
    let rc = unsafe { libc::mlock(buffer.as_ptr().cast(), buffer.len()) };
    if rc != 0 {
        return Err(CryptoError::MemoryLock(std::io::Error::last_os_error()));
    }
    advise_dump(buffer, false);
    Ok(())
}

/// Zeroes `buffer`, then unlocks its pages.
///
/// # Errors
///
/// Returns an argument error under the same conditions as [`lock_memory`]
/// (the buffer is not touched in that case) and `CryptoError::MemoryUnlock`
/// if the OS refuses. The buffer has been zeroed by the time the OS is asked.
pub fn unlock_and_zero_memory(buffer: &mut [u8]) -> Result<()> {
    check_pages(buffer)?;
    buffer.zeroize();
    advise_dump(buffer, true);
    // SAFETY: see lock_memory.
    let rc = unsafe { libc::munlock(buffer.as_ptr().cast(), buffer.len()) };
    if rc != 0 {
        return Err(CryptoError::MemoryUnlock(std::io::Error::last_os_error()));
    }
    Ok(())
}

fn check_pages(buffer: &[u8]) -> Result<()> {
    validation::not_empty("buffer", buffer.len())?;
    validation::multiple_of_size("buffer", buffer.len(), page_size()?)
}

/// Marks the pages as (non-)dumpable. Advisory: the kernel only accepts
/// page-aligned ranges, so unaligned heap buffers are left as they are.
#[cfg(target_os = "linux")]
fn advise_dump(buffer: &mut [u8], dump: bool) {
    let Ok(page) = page_size() else { return };
    if buffer.as_ptr() as usize % page != 0 {
        return;
    }
    let advice = if dump {
        libc::MADV_DODUMP
    } else {
        libc::MADV_DONTDUMP
    };
    // SAFETY: the range is page aligned and covers a live allocation.
    // MADV_(DONT)DUMP only changes core-dump bookkeeping.
    unsafe {
        libc::madvise(buffer.as_mut_ptr().cast(), buffer.len(), advice);
    }
}

#[cfg(not(target_os = "linux"))]
fn advise_dump(_buffer: &mut [u8], _dump: bool) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_zero_memory_bytes() {
        let mut buffer = vec![0xdbu8; page_size().unwrap()];
        zero_memory(buffer.as_mut_slice());
        assert!(buffer.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_zero_memory_chars() {
        let mut buffer = ['s', 'e', 'c', 'r', 'e', 't'];
        zero_memory(&mut buffer[..]);
        assert!(buffer.iter().all(|&c| c == '\0'));
    }

    #[test]
    fn test_zero_memory_string() {
        let mut password = String::from("correct horse battery staple");
        zero_memory(&mut password);
        assert!(password.is_empty());
    }

    #[test]
    fn test_lock_rejects_partial_pages() {
        let page = page_size().unwrap();
        let mut buffer = vec![0u8; page + 1];
        let err = lock_memory(&mut buffer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(matches!(err, CryptoError::NotMultipleOf { .. }));
    }

    #[test]
    fn test_lock_rejects_empty() {
        let mut buffer: Vec<u8> = Vec::new();
        assert!(matches!(
            lock_memory(&mut buffer),
            Err(CryptoError::Empty { .. })
        ));
    }

    #[test]
    fn test_lock_then_unlock_zeroes() {
        let page = page_size().unwrap();
        let mut buffer = vec![0xdbu8; page];
        lock_memory(&mut buffer).unwrap();
        unlock_and_zero_memory(&mut buffer).unwrap();
        assert!(buffer.iter().all(|&b| b == 0));
    }
}
