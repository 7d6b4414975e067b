//! Record type and its layout metadata.
//!
//! Every entry of a store is one [`Record`]: the key, the value and the key's hash,
//! laid out `{key, value, hash}` with C ordering and natural alignment padding. The
//! sizes and byte offsets of those fields are captured once per store in a
//! [`RecordLayout`] so callers can inspect how the buffer is organised.

use core::mem::{offset_of, size_of};

/// One stored key/value pair together with the hash computed when it was inserted.
///
/// `repr(C)` pins the field order, so the offsets reported by [`RecordLayout`]
/// are those of the equivalent C struct.
#[repr(C)]
#[derive(Debug, Clone, PartialEq)]
pub struct Record<K, V> {
    pub key: K,
    pub value: V,
    pub hash: u64,
}

impl<K, V> Record<K, V> {
    #[inline(always)]
    pub fn new(key: K, value: V, hash: u64) -> Self {
        Self { key, value, hash }
    }
}

/// Sizes and byte offsets of a `Record<K, V>`.
///
/// Derived from the key and value types at construction and never recomputed, so
/// it always agrees with the types the store was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordLayout {
    /// Size of one record including padding, i.e. the stride of the buffer.
    pub pair_size: usize,
    pub key_size: usize,
    pub value_size: usize,
    pub key_offset: usize,
    pub value_offset: usize,
    pub hash_offset: usize,
}

impl RecordLayout {
    /// Computes the layout of `Record<K, V>`.
    pub fn of<K, V>() -> Self {
        Self {
            pair_size: size_of::<Record<K, V>>(),
            key_size: size_of::<K>(),
            value_size: size_of::<V>(),
            key_offset: offset_of!(Record<K, V>, key),
            value_offset: offset_of!(Record<K, V>, value),
            hash_offset: offset_of!(Record<K, V>, hash),
        }
    }

    /// Number of bytes `records` records occupy, or `None` on overflow.
    #[inline]
    pub fn bytes_for(&self, records: usize) -> Option<usize> {
        self.pair_size.checked_mul(records)
    }
}
