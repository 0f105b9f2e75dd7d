//! Property-based tests for BLAKE3 hashing.

use cinder_crypto::hash::{hash, keyed_hash, Hasher};
use proptest::prelude::*;

/// Property 1: Hash Determinism
///
/// For any input data, BLAKE3 SHALL produce the same hash on repeated calls.
#[test]
fn property_hash_determinism() {
    proptest!(|(data in prop::collection::vec(any::<u8>(), 0..1000))| {
        prop_assert_eq!(hash(&data), hash(&data));
    });
}

/// Property 2: Streaming Equivalence
///
/// Feeding data to a `Hasher` in any split SHALL give the one-shot hash.
#[test]
fn property_streaming_matches_one_shot() {
    proptest!(|(
        data in prop::collection::vec(any::<u8>(), 0..2000),
        split in any::<usize>()
    )| {
        let split = if data.is_empty() { 0 } else { split % data.len() };
        let mut hasher = Hasher::new();
        hasher.update(&data[..split]).update(&data[split..]);
        prop_assert_eq!(hasher.finalize(), hash(&data));
    });
}

/// Property 3: Keyed Streaming Equivalence
#[test]
fn property_keyed_streaming_matches_one_shot() {
    proptest!(|(
        key in prop::array::uniform32(any::<u8>()),
        data in prop::collection::vec(any::<u8>(), 0..1000)
    )| {
        let mut hasher = Hasher::new_keyed(&key).unwrap();
        hasher.update(&data);
        prop_assert_eq!(hasher.finalize(), keyed_hash(&key, &data).unwrap());
    });
}
