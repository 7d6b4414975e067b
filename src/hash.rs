//! Byte hash functions.
//!
//! A store never looks at a key's type when deciding identity. It hashes the key's
//! raw bytes with a [`HashFn`] and compares the result against the hash stored next
//! to every record. The default is [`djb2`]; [`fnv1a`] is provided as a faster
//! alternative with better avalanche on short integer keys.

use std::hash::Hasher;

use bytemuck::NoUninit;
use fnv::FnvHasher;

/// A stateless function from raw key bytes to a hash value.
///
/// Plain function pointers keep the hash strategy `Copy` and comparable, so a store
/// can report which function it currently uses.
pub type HashFn = fn(&[u8]) -> u64;

/// Seed of the djb2 recurrence.
pub const DJB2_SEED: u64 = 5381;

/// The djb2 byte hash: `hash = hash * 33 + byte`, seeded with 5381.
///
/// Arithmetic wraps on overflow. Bytes are read as unsigned.
///
/// ```rust
/// use pairmap::hash::djb2;
///
/// assert_eq!(djb2(b""), 5381);
/// assert_eq!(djb2(b"a"), 5381 * 33 + 97);
/// ```
pub fn djb2(bytes: &[u8]) -> u64 {
    bytes.iter().fold(DJB2_SEED, |hash, &byte| {
        (hash << 5).wrapping_add(hash).wrapping_add(u64::from(byte))
    })
}

/// 64-bit FNV-1a over the bytes.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(bytes);
    hasher.finish()
}

/// Hashes the in-memory bytes of `key` with `hash_fn`.
#[inline]
pub fn hash_key<K: NoUninit>(hash_fn: HashFn, key: &K) -> u64 {
    hash_fn(bytemuck::bytes_of(key))
}
