//! Property-based tests for secure memory and guarded allocations.

use cinder_crypto::error::{CryptoError, ErrorKind};
use cinder_crypto::guarded::{GuardedHeapAllocation, Protection, GARBAGE_VALUE};
use cinder_crypto::memory::{page_size, zero_memory};
use proptest::prelude::*;

/// Property 1: Zeroing Clears Every Byte
///
/// For any buffer contents, zeroing SHALL leave every byte equal to zero.
#[test]
fn property_zero_memory_clears() {
    proptest!(|(mut buffer in prop::collection::vec(any::<u8>(), 0..4096))| {
        zero_memory(buffer.as_mut_slice());
        prop_assert!(buffer.iter().all(|&b| b == 0));
    });
}

/// Property 2: Guarded Allocation Stores What Is Written
///
/// For any size and contents, bytes written in read-write mode SHALL read
/// back unchanged in read-only mode.
#[test]
fn property_guarded_write_then_read_only() {
    proptest!(ProptestConfig::with_cases(32), |(data in prop::collection::vec(any::<u8>(), 1..10_000))| {
        let mut allocation = GuardedHeapAllocation::new(data.len()).unwrap();
        prop_assert_eq!(allocation.len(), data.len());
        prop_assert!(allocation.as_slice().unwrap().iter().all(|&b| b == GARBAGE_VALUE));

        allocation.as_mut_slice().unwrap().copy_from_slice(&data);
        allocation.read_only().unwrap();
        prop_assert_eq!(allocation.protection(), Protection::ReadOnly);
        prop_assert_eq!(allocation.as_slice().unwrap(), &data[..]);
        allocation.dispose().unwrap();
    });
}

#[test]
fn test_page_of_garbage_is_zeroed() {
    let mut buffer = vec![0xdbu8; page_size().unwrap()];
    zero_memory(buffer.as_mut_slice());
    assert!(buffer.iter().all(|&b| b == 0x00));
}

#[test]
fn test_guarded_protection_cycle() {
    let mut allocation = GuardedHeapAllocation::new(64).unwrap();
    allocation.as_mut_slice().unwrap().fill(0x17);

    allocation.no_access().unwrap();
    let err = allocation.as_slice().unwrap_err();
    assert!(matches!(err, CryptoError::Inaccessible { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    allocation.read_only().unwrap();
    assert!(allocation.as_mut_slice().is_err());
    assert!(allocation.as_slice().unwrap().iter().all(|&b| b == 0x17));

    allocation.read_write().unwrap();
    allocation.as_mut_slice().unwrap()[63] = 0x18;
    assert_eq!(allocation.as_slice().unwrap()[63], 0x18);
}

#[test]
fn test_guarded_dispose_is_terminal() {
    let mut allocation = GuardedHeapAllocation::new(32).unwrap();
    allocation.dispose().unwrap();
    allocation.dispose().unwrap();
    assert!(allocation.is_disposed());
    assert!(matches!(
        allocation.as_slice(),
        Err(CryptoError::Disposed { .. })
    ));
    assert!(matches!(
        allocation.read_write(),
        Err(CryptoError::Disposed { .. })
    ));
}

#[test]
fn test_guarded_rejects_zero_size() {
    let err = GuardedHeapAllocation::new(0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}
