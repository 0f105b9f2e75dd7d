//! Guarded heap allocations.
//!
//! A [`GuardedHeapAllocation`] maps its own pages:
//!
//! ```text
//! | guard page | canary ... user bytes | guard page |
//!   PROT_NONE    ^ unprotected region  ^  PROT_NONE
//! ```
//!
//! The user bytes end exactly where the trailing guard page begins, so
//! reading or writing one byte past the end faults immediately. A random
//! per-process canary sits directly in front of the user bytes and is checked
//! on disposal to catch underflows. The unprotected region is locked into RAM
//! when the OS allows it and excluded from core dumps on Linux.
//!
//! # Safety contract
//!
//! [`as_slice`](GuardedHeapAllocation::as_slice) and
//! [`as_mut_slice`](GuardedHeapAllocation::as_mut_slice) check the protection
//! state and refuse access they cannot honour. The raw pointers returned by
//! [`as_ptr`](GuardedHeapAllocation::as_ptr) and
//! [`as_mut_ptr`](GuardedHeapAllocation::as_mut_ptr) are not checked: touching
//! them while the allocation is in [`Protection::NoAccess`] (or writing while
//! [`Protection::ReadOnly`]) raises `SIGSEGV` and kills the process. That is
//! the point of the guard and cannot be caught or recovered from.

use crate::backend::{self, CANARY_SIZE};
use crate::constant_time;
use crate::error::{CryptoError, Result};
use crate::validation;
use std::ptr::{self, NonNull};
use zeroize::Zeroize;

/// Byte written over fresh allocations so callers never rely on zeroed memory.
pub const GARBAGE_VALUE: u8 = 0xdb;

/// Access permitted on a guarded allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protection {
    /// Any access faults.
    NoAccess,
    /// Reads are allowed, writes fault.
    ReadOnly,
    /// Reads and writes are allowed.
    ReadWrite,
}

impl Protection {
    fn as_prot(self) -> libc::c_int {
        match self {
            Self::NoAccess => libc::PROT_NONE,
            Self::ReadOnly => libc::PROT_READ,
            Self::ReadWrite => libc::PROT_READ | libc::PROT_WRITE,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::NoAccess => "no-access",
            Self::ReadOnly => "read-only",
            Self::ReadWrite => "read-write",
        }
    }
}

/// A page-guarded heap region with switchable protection.
///
/// Owned exclusively by its creator. Dropping the allocation disposes it.
pub struct GuardedHeapAllocation {
    base: NonNull<u8>,
    total_size: usize,
    page_size: usize,
    unprotected_size: usize,
    size: usize,
    protection: Protection,
    locked: bool,
    disposed: bool,
}

// SAFETY: the mapping is owned exclusively by this value and is only reached
// through `&self`/`&mut self`, so moving it to another thread is sound. It is
// deliberately not `Sync`: protection changes are not synchronised.
unsafe impl Send for GuardedHeapAllocation {}

impl GuardedHeapAllocation {
    /// Maps a new guarded region able to hold `size` bytes.
    ///
    /// The region starts in [`Protection::ReadWrite`] and is filled with
    /// [`GARBAGE_VALUE`], not zeros.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::NotPositive` if `size` is zero,
    /// `CryptoError::TooLong` if the region size overflows, and
    /// `CryptoError::AllocationFailed` / `CryptoError::ProtectionFailed` if the
    /// OS refuses the mapping or the guard pages.
    pub fn new(size: usize) -> Result<Self> {
        validation::greater_than_zero("size", size as u64)?;
        let runtime = backend::ensure_ready()?;
        let page_size = runtime.page_size();

        let max = isize::MAX as usize - CANARY_SIZE - 3 * page_size;
        validation::not_greater_than_max("size", size, max)?;
        let unprotected_size = round_up(size + CANARY_SIZE, page_size);
        let total_size = unprotected_size + 2 * page_size;

        // SAFETY: anonymous private mapping with no address hint; the result
        // is checked against MAP_FAILED before use.
        let raw = unsafe {
            libc::mmap(
                ptr::null_mut(),
                total_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANON,
                -1,
                0,
            )
        };
        if raw == libc::MAP_FAILED {
            return Err(CryptoError::AllocationFailed {
                size,
                source: std::io::Error::last_os_error(),
            });
        }
        let base = NonNull::new(raw.cast::<u8>()).ok_or_else(|| CryptoError::AllocationFailed {
            size,
            source: std::io::Error::from_raw_os_error(libc::ENOMEM),
        })?;

        let mut allocation = Self {
            base,
            total_size,
            page_size,
            unprotected_size,
            size,
            protection: Protection::ReadWrite,
            locked: false,
            disposed: false,
        };
        // SAFETY: the canary and user bytes lie inside the fresh read-write
        // mapping.
        unsafe {
            let user = allocation.user_ptr();
            ptr::copy_nonoverlapping(runtime.canary().as_ptr(), user.sub(CANARY_SIZE), CANARY_SIZE);
            ptr::write_bytes(user, GARBAGE_VALUE, size);
        }

        // From here on, an early return unmaps through Drop.
        allocation.install_guards()?;
        allocation.locked = allocation.lock_unprotected();

        tracing::trace!(size, locked = allocation.locked, "guarded allocation created");
        Ok(allocation)
    }

    /// Number of usable bytes.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Always `false`; zero-sized allocations are rejected.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Current protection state.
    pub fn protection(&self) -> Protection {
        self.protection
    }

    /// Whether the OS agreed to lock the region into RAM.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Borrows the user bytes for reading.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Inaccessible` in [`Protection::NoAccess`] and
    /// `CryptoError::Disposed` after disposal.
    pub fn as_slice(&self) -> Result<&[u8]> {
        self.ensure_live()?;
        if self.protection == Protection::NoAccess {
            return Err(CryptoError::Inaccessible {
                required: "readable",
                current: self.protection.name(),
            });
        }
        // SAFETY: the region is mapped and readable; the borrow is tied to
        // `&self`, and protection can only change through `&mut self`.
        Ok(unsafe { std::slice::from_raw_parts(self.user_ptr(), self.size) })
    }

    /// Borrows the user bytes for writing.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Inaccessible` unless the allocation is
    /// [`Protection::ReadWrite`], and `CryptoError::Disposed` after disposal.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        self.ensure_live()?;
        if self.protection != Protection::ReadWrite {
            return Err(CryptoError::Inaccessible {
                required: "writable",
                current: self.protection.name(),
            });
        }
        // SAFETY: the region is mapped read-write and exclusively borrowed.
        Ok(unsafe { std::slice::from_raw_parts_mut(self.user_ptr(), self.size) })
    }

    /// Raw pointer to the first user byte.
    ///
    /// Dereferencing it in a state that forbids the access faults the process;
    /// see the module documentation.
    pub fn as_ptr(&self) -> Result<*const u8> {
        self.ensure_live()?;
        Ok(self.user_ptr())
    }

    /// Mutable raw pointer to the first user byte.
    ///
    /// Same contract as [`as_ptr`](Self::as_ptr).
    pub fn as_mut_ptr(&mut self) -> Result<*mut u8> {
        self.ensure_live()?;
        Ok(self.user_ptr())
    }

    /// Revokes all access.
    pub fn no_access(&mut self) -> Result<()> {
        self.set_protection(Protection::NoAccess)
    }

    /// Allows reads only.
    pub fn read_only(&mut self) -> Result<()> {
        self.set_protection(Protection::ReadOnly)
    }

    /// Allows reads and writes.
    pub fn read_write(&mut self) -> Result<()> {
        self.set_protection(Protection::ReadWrite)
    }

    /// Zeroes and releases the region.
    ///
    /// Restores read-write access, checks the canary, zeroes the unprotected
    /// region, unlocks and unmaps it. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::CanaryCorrupted` if memory in front of the user
    /// bytes was overwritten. The region is released either way.
    pub fn dispose(&mut self) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;

        let reopened = self.protect_unprotected(Protection::ReadWrite);
        let canary_intact = match reopened {
            Ok(()) => {
                let intact = self.canary_intact();
                // SAFETY: the unprotected region is mapped read-write.
                unsafe {
                    std::slice::from_raw_parts_mut(self.unprotected_ptr(), self.unprotected_size)
                        .zeroize();
                }
                intact
            }
            Err(_) => true,
        };

        if self.locked {
            // SAFETY: same range that was locked in `new`.
            let rc = unsafe { libc::munlock(self.unprotected_ptr().cast(), self.unprotected_size) };
            released("munlock", rc);
            self.locked = false;
        }
        // SAFETY: `base`/`total_size` describe the mapping created in `new`,
        // which is unmapped exactly once because `disposed` is now set.
        let rc = unsafe { libc::munmap(self.base.as_ptr().cast(), self.total_size) };
        released("munmap", rc);
        tracing::trace!(size = self.size, "guarded allocation disposed");

        reopened?;
        if !canary_intact {
            return Err(CryptoError::CanaryCorrupted);
        }
        Ok(())
    }

    fn set_protection(&mut self, protection: Protection) -> Result<()> {
        self.ensure_live()?;
        self.protect_unprotected(protection)?;
        self.protection = protection;
        Ok(())
    }

    fn protect_unprotected(&self, protection: Protection) -> Result<()> {
        // SAFETY: the range is page aligned and inside the mapping.
        let rc = unsafe {
            libc::mprotect(
                self.unprotected_ptr().cast(),
                self.unprotected_size,
                protection.as_prot(),
            )
        };
        if rc != 0 {
            return Err(CryptoError::ProtectionFailed(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    fn install_guards(&self) -> Result<()> {
        let trailing = self.unprotected_ptr().wrapping_add(self.unprotected_size);
        for guard in [self.base.as_ptr(), trailing] {
            // SAFETY: each guard is one page inside the mapping.
            let rc = unsafe { libc::mprotect(guard.cast(), self.page_size, libc::PROT_NONE) };
            if rc != 0 {
                return Err(CryptoError::ProtectionFailed(std::io::Error::last_os_error()));
            }
        }
        Ok(())
    }

    fn lock_unprotected(&self) -> bool {
        // SAFETY: the range is inside the mapping.
        let rc = unsafe { libc::mlock(self.unprotected_ptr().cast(), self.unprotected_size) };
        #[cfg(target_os = "linux")]
        // SAFETY: page-aligned range inside the mapping; advisory only.
        unsafe {
            libc::madvise(
                self.unprotected_ptr().cast(),
                self.unprotected_size,
                libc::MADV_DONTDUMP,
            );
        }
        rc == 0
    }

    fn canary_intact(&self) -> bool {
        let Ok(runtime) = backend::ensure_ready() else {
            return false;
        };
        // SAFETY: the canary lies inside the readable unprotected region.
        let stored =
            unsafe { std::slice::from_raw_parts(self.user_ptr().sub(CANARY_SIZE), CANARY_SIZE) };
        constant_time::equals(stored, runtime.canary()).unwrap_or(false)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            return Err(CryptoError::Disposed {
                object: "GuardedHeapAllocation",
            });
        }
        Ok(())
    }

    fn unprotected_ptr(&self) -> *mut u8 {
        self.base.as_ptr().wrapping_add(self.page_size)
    }

    fn user_ptr(&self) -> *mut u8 {
        self.unprotected_ptr()
            .wrapping_add(self.unprotected_size - self.size)
    }
}

/// Reports whether a release call succeeded, logging the OS error if not.
/// The user bytes are already zeroed when this runs.
fn released(call: &'static str, rc: libc::c_int) -> bool {
    if rc == 0 {
        return true;
    }
    let error = std::io::Error::last_os_error();
    tracing::warn!(call, error = %error, "guarded allocation release failed");
    false
}

impl Drop for GuardedHeapAllocation {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            tracing::error!(error = %e, "guarded allocation released with a fault");
        }
    }
}

impl std::fmt::Debug for GuardedHeapAllocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedHeapAllocation")
            .field("size", &self.size)
            .field("protection", &self.protection)
            .field("locked", &self.locked)
            .field("disposed", &self.disposed)
            .finish()
    }
}

fn round_up(value: usize, multiple: usize) -> usize {
    (value + multiple - 1) & !(multiple - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_new_allocation_is_garbage_filled() {
        let allocation = GuardedHeapAllocation::new(100).unwrap();
        assert_eq!(allocation.len(), 100);
        assert_eq!(allocation.protection(), Protection::ReadWrite);
        assert!(allocation.as_slice().unwrap().iter().all(|&b| b == GARBAGE_VALUE));
    }

    #[test]
    fn test_user_bytes_end_on_page_boundary() {
        let allocation = GuardedHeapAllocation::new(100).unwrap();
        let page = backend::ensure_ready().unwrap().page_size();
        let end = allocation.as_ptr().unwrap() as usize + allocation.len();
        assert_eq!(end % page, 0);
    }

    #[test]
    fn test_zero_size_rejected() {
        let err = GuardedHeapAllocation::new(0).unwrap_err();
        assert!(matches!(err, CryptoError::NotPositive { name: "size" }));
    }

    #[test]
    fn test_read_only_blocks_mutable_access() {
        let mut allocation = GuardedHeapAllocation::new(32).unwrap();
        allocation.as_mut_slice().unwrap().fill(0x11);
        allocation.read_only().unwrap();

        assert_eq!(allocation.as_slice().unwrap(), &[0x11; 32]);
        let err = allocation.as_mut_slice().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_no_access_blocks_checked_access() {
        let mut allocation = GuardedHeapAllocation::new(32).unwrap();
        allocation.no_access().unwrap();
        assert!(matches!(
            allocation.as_slice(),
            Err(CryptoError::Inaccessible { .. })
        ));

        allocation.read_write().unwrap();
        assert!(allocation.as_slice().is_ok());
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut allocation = GuardedHeapAllocation::new(16).unwrap();
        allocation.dispose().unwrap();
        allocation.dispose().unwrap();
        assert!(allocation.is_disposed());
    }

    #[test]
    fn test_dispose_from_no_access() {
        let mut allocation = GuardedHeapAllocation::new(16).unwrap();
        allocation.no_access().unwrap();
        assert!(allocation.dispose().is_ok());
    }

    #[test]
    fn test_use_after_dispose_fails() {
        let mut allocation = GuardedHeapAllocation::new(16).unwrap();
        allocation.dispose().unwrap();
        assert!(matches!(
            allocation.as_slice(),
            Err(CryptoError::Disposed { .. })
        ));
        assert!(matches!(
            allocation.read_only(),
            Err(CryptoError::Disposed { .. })
        ));
        assert!(allocation.as_ptr().is_err());
    }

    #[test]
    fn test_release_failure_is_reported() {
        assert!(released("munmap", 0));
        assert!(!released("munmap", -1));

        // munmap rejects an address that is not page aligned.
        let allocation = GuardedHeapAllocation::new(8).unwrap();
        // SAFETY: the call fails with EINVAL and unmaps nothing.
        let rc = unsafe { libc::munmap(allocation.base.as_ptr().add(1).cast(), 1) };
        assert!(!released("munmap", rc));
    }

    #[test]
    fn test_canary_overwrite_is_detected() {
        let mut allocation = GuardedHeapAllocation::new(16).unwrap();
        let user = allocation.as_mut_ptr().unwrap();
        // SAFETY: the byte before the user bytes is the last canary byte,
        // inside the read-write region.
        unsafe {
            *user.sub(1) ^= 0xff;
        }
        assert!(matches!(
            allocation.dispose(),
            Err(CryptoError::CanaryCorrupted)
        ));
    }
}
