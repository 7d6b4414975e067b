use core::mem;
use core::ops::{Index, IndexMut};
use core::slice;
use std::fmt::{self, Debug};

use bytemuck::NoUninit;
// A hash -> slot table for `Lookup::Indexed`; keyed by the hash stored in each record.
use hashbrown::HashTable;
use log::debug;

use crate::buffer::{self, IntoRecords, RecordBuffer};
use crate::config::{self, KeyMatch, Lookup, MapConfig};
use crate::error::StoreError;
use crate::hash::{self, HashFn};
use crate::layout::{Record, RecordLayout};

/// An insertion-ordered key → value store over one contiguous buffer of records.
///
/// # Overview
/// * **Storage:** every entry is a [`Record`] `{ key, value, hash }` in a single
///   growable buffer. Records `[0, len)` are live; erase compacts, so there are no
///   tombstones and storage order is insertion order.
/// * **Identity:** a key is hashed over its raw bytes with the store's hash function
///   (djb2 by default). By default two keys with the same hash *are* the same key;
///   see [`KeyMatch`].
/// * **Lookup:** a linear scan of the stored hashes, or a hash index when configured
///   with [`Lookup::Indexed`]. Both give identical results.
/// * **Growth:** starts with 5 slots and grows to `capacity + capacity / 2 + 1`
///   when an insert finds the buffer full. Never shrinks on its own.
///
/// # Key constraint
/// Keys must be plain bytes (`K: bytemuck::NoUninit`): integers, floats, arrays and
/// `#[repr(C)]` structs without padding. Values can be any type.
///
/// # Thread safety
/// Not synchronised. Shared references only read; mutation needs `&mut`, so
/// concurrent writers must wrap the store in a `Mutex` or similar.
///
/// ```rust
/// use pairmap::PairMap;
///
/// let mut map: PairMap<u32, f32> = PairMap::new();
/// map.set(1, 1.0).unwrap();
/// map.set(2, 2.0).unwrap();
///
/// assert_eq!(map.get(&2), Some(&2.0));
/// assert_eq!(map.erase(&2), Some(2.0));
/// assert!(!map.exists(&2));
/// assert_eq!(map.len(), 1);
/// ```
pub struct PairMap<K, V> {
    records: RecordBuffer<K, V>,
    layout: RecordLayout,
    config: MapConfig,
    /// Present only for `Lookup::Indexed`. Holds one slot per live record.
    index: Option<HashTable<usize>>,
}

// --- 1. Construction & Layout ---

impl<K, V> PairMap<K, V> {
    /// Creates an empty store with room for 5 records, hashing with djb2.
    pub fn new() -> Self {
        Self::with_config(MapConfig::default())
    }

    /// Creates an empty store with room for `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(MapConfig::new().initial_capacity(capacity))
    }

    /// Creates an empty store from `config`.
    ///
    /// # Panics
    /// Panics (or aborts through `handle_alloc_error`) if the initial buffer cannot be
    /// allocated. Use [`try_with_config`](Self::try_with_config) to handle that.
    pub fn with_config(config: MapConfig) -> Self {
        buffer::unwrap_alloc::<_, K, V>(Self::try_with_config(config))
    }

    /// Creates an empty store from `config`, reporting allocation failure.
    pub fn try_with_config(config: MapConfig) -> Result<Self, StoreError> {
        let records = RecordBuffer::with_capacity(config.initial_capacity)?;
        let index = match config.lookup {
            Lookup::Scan => None,
            Lookup::Indexed => Some(HashTable::with_capacity(config.initial_capacity)),
        };
        Ok(Self {
            records,
            layout: RecordLayout::of::<K, V>(),
            config,
            index,
        })
    }

    /// Sizes and byte offsets of one record, fixed at construction.
    #[inline]
    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    #[inline]
    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Returns the number of live records.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the number of record slots currently allocated.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.records.capacity()
    }

    /// The live records in storage order, including the hash stored with each one.
    #[inline]
    pub fn records(&self) -> &[Record<K, V>] {
        self.records.as_slice()
    }

    /// Drops every record. The allocation is kept for reuse.
    pub fn clear(&mut self) {
        self.records.clear();
        if let Some(index) = &mut self.index {
            index.clear();
        }
    }

    // --- Hash function ---

    /// The function used for every hash computed from now on.
    #[inline]
    pub fn hash_function(&self) -> HashFn {
        self.config.hash_function
    }

    /// Replaces the hash function.
    ///
    /// Only future hashing is affected: hashes already stored are kept. A key
    /// inserted under the old function is generally not found under the new one
    /// until the old function is restored or [`rehash`](Self::rehash) is called.
    pub fn set_hash_function(&mut self, hash_function: HashFn) {
        debug!(
            "pairmap hash function changed from {} to {} ({} records keep their stored hashes)",
            config::hash_name(self.config.hash_function),
            config::hash_name(hash_function),
            self.len()
        );
        self.config.hash_function = hash_function;
    }

    /// Restores the default hash function, djb2.
    pub fn reset_hash_function(&mut self) {
        self.set_hash_function(hash::djb2);
    }

    // --- Iteration ---

    /// Calls `visitor` once per record, in storage order.
    ///
    /// The store is borrowed for the whole call, so it cannot be modified from
    /// inside the visitor.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&K, &V),
    {
        for record in self.records.as_slice() {
            visitor(&record.key, &record.value);
        }
    }

    /// Calls `visitor` once per record with mutable access to the value.
    pub fn for_each_mut<F>(&mut self, mut visitor: F)
    where
        F: FnMut(&K, &mut V),
    {
        for record in self.records.as_mut_slice() {
            visitor(&record.key, &mut record.value);
        }
    }

    /// Returns an iterator over `(&K, &V)` in storage order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.records.as_slice().iter(),
        }
    }

    /// Returns an iterator over `(&K, &mut V)` in storage order.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.records.as_mut_slice().iter_mut(),
        }
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys {
            inner: self.records.as_slice().iter(),
        }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values {
            inner: self.records.as_slice().iter(),
        }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.records.as_mut_slice().iter_mut(),
        }
    }
}

// --- 2. Keyed Operations ---

impl<K: NoUninit, V> PairMap<K, V> {
    /// Hash of `key` under the current hash function.
    #[inline]
    pub fn key_hash(&self, key: &K) -> u64 {
        hash::hash_key(self.config.hash_function, key)
    }

    /// Associates `value` with `key`.
    ///
    /// If a record matches `key` its value is replaced in place (key and stored hash
    /// are left as they were) and the old value is returned. Otherwise a record is
    /// appended, growing the buffer if it is full.
    ///
    /// # Errors
    /// Returns [`StoreError`] if growing fails. The store is then unchanged.
    pub fn set(&mut self, key: K, value: V) -> Result<Option<V>, StoreError> {
        let hash = self.key_hash(&key);
        if let Some(slot) = self.find(hash, &key) {
            let record = &mut self.records.as_mut_slice()[slot];
            return Ok(Some(mem::replace(&mut record.value, value)));
        }

        let Self { records, index, .. } = self;
        // Reserve in the index first so a failed push leaves nothing to undo.
        if let Some(index) = index.as_mut() {
            let stored = records.as_slice();
            index
                .try_reserve(1, |&slot| stored[slot].hash)
                .map_err(index_error)?;
        }
        records.push(Record::new(key, value, hash))?;

        if let Some(index) = index.as_mut() {
            let stored = records.as_slice();
            index.insert_unique(hash, stored.len() - 1, |&slot| stored[slot].hash);
        }
        Ok(None)
    }

    /// Returns a reference to the value for `key`, or `None`.
    pub fn get(&self, key: &K) -> Option<&V> {
        let slot = self.find(self.key_hash(key), key)?;
        Some(&self.records.as_slice()[slot].value)
    }

    /// Returns a mutable reference to the value for `key`, or `None`.
    ///
    /// Writes through the reference are visible in the store.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let slot = self.find(self.key_hash(key), key)?;
        Some(&mut self.records.as_mut_slice()[slot].value)
    }

    /// Returns `true` if a record matches `key`.
    pub fn exists(&self, key: &K) -> bool {
        self.find(self.key_hash(key), key).is_some()
    }

    /// Removes the record for `key`, returning its value.
    ///
    /// Later records shift down one slot, keeping storage dense and ordered. Erasing
    /// a key that is not present returns `None` and touches nothing.
    pub fn erase(&mut self, key: &K) -> Option<V> {
        let hash = self.key_hash(key);
        let slot = self.find(hash, key)?;

        if let Some(index) = &mut self.index {
            if let Ok(entry) = index.find_entry(hash, |&candidate| candidate == slot) {
                entry.remove();
            }
            for candidate in index.iter_mut() {
                if *candidate > slot {
                    *candidate -= 1;
                }
            }
        }
        Some(self.records.remove(slot).value)
    }

    /// Makes room for at least `additional` more records.
    pub fn reserve(&mut self, additional: usize) -> Result<(), StoreError> {
        let Self { records, index, .. } = self;
        records.reserve(additional)?;
        if let Some(index) = index.as_mut() {
            let stored = records.as_slice();
            index
                .try_reserve(additional, |&slot| stored[slot].hash)
                .map_err(index_error)?;
        }
        Ok(())
    }

    /// Sets every pair from `iter`, stopping at the first allocation failure.
    pub fn try_extend<I>(&mut self, iter: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in iter {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Recomputes every stored hash with the current hash function.
    ///
    /// Records that now match an earlier record are removed, the earliest one wins.
    /// Returns the number of records removed.
    pub fn rehash(&mut self) -> usize {
        let hash_function = self.config.hash_function;
        let key_match = self.config.key_match;
        let before = self.len();

        // (hash, key) of every record kept so far.
        let mut kept: HashTable<(u64, K)> = HashTable::with_capacity(before);
        self.records.retain_mut(|record| {
            record.hash = hash::hash_key(hash_function, &record.key);
            let duplicate = kept
                .find(record.hash, |(hash, key)| {
                    same_key(key_match, *hash, key, record.hash, &record.key)
                })
                .is_some();
            if !duplicate {
                kept.insert_unique(record.hash, (record.hash, record.key), |(hash, _)| *hash);
            }
            !duplicate
        });
        self.rebuild_index();

        let removed = before - self.len();
        debug!(
            "pairmap rehashed {} records with {}, {} duplicates removed",
            before,
            config::hash_name(hash_function),
            removed
        );
        removed
    }

    /// Slot of the record matching `key`, whose hash under the current function is
    /// `hash`.
    fn find(&self, hash: u64, key: &K) -> Option<usize> {
        let key_match = self.config.key_match;
        let stored = self.records.as_slice();
        match &self.index {
            Some(index) => index
                .find(hash, |&slot| {
                    let record = &stored[slot];
                    same_key(key_match, record.hash, &record.key, hash, key)
                })
                .copied(),
            None => stored
                .iter()
                .position(|record| same_key(key_match, record.hash, &record.key, hash, key)),
        }
    }

    fn rebuild_index(&mut self) {
        let Self { records, index, .. } = self;
        if let Some(index) = index.as_mut() {
            let stored = records.as_slice();
            index.clear();
            for (slot, record) in stored.iter().enumerate() {
                index.insert_unique(record.hash, slot, |&slot| stored[slot].hash);
            }
        }
    }
}

/// Whether a record `(stored_hash, stored_key)` is the entry for `(hash, key)`.
#[inline(always)]
fn same_key<K: NoUninit>(
    key_match: KeyMatch,
    stored_hash: u64,
    stored_key: &K,
    hash: u64,
    key: &K,
) -> bool {
    stored_hash == hash
        && match key_match {
            KeyMatch::Hash => true,
            KeyMatch::HashAndBytes => bytemuck::bytes_of(stored_key) == bytemuck::bytes_of(key),
        }
}

fn index_error(err: hashbrown::TryReserveError) -> StoreError {
    match err {
        hashbrown::TryReserveError::CapacityOverflow => StoreError::CapacityOverflow {
            records: usize::MAX,
            record_size: mem::size_of::<usize>(),
        },
        hashbrown::TryReserveError::AllocError { layout } => StoreError::AllocationFailed {
            bytes: layout.size(),
        },
    }
}

// --- 3. Trait Implementations ---

impl<K, V> Default for PairMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: NoUninit, V: Clone> Clone for PairMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            records: buffer::unwrap_alloc::<_, K, V>(self.records.try_clone()),
            layout: self.layout,
            config: self.config,
            index: self.index.clone(),
        }
    }
}

impl<K: Debug, V: Debug> Debug for PairMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Two stores are equal when they hold the same number of entries and every key of
/// one maps to an equal value in the other, regardless of order.
impl<K: NoUninit, V: PartialEq> PartialEq for PairMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

/// Allows read access using `map[&key]`.
///
/// # Panics
/// Panics if the key is not present in the map.
impl<K: NoUninit, V> Index<&K> for PairMap<K, V> {
    type Output = V;

    fn index(&self, key: &K) -> &Self::Output {
        self.get(key).expect("no entry found for key")
    }
}

/// Allows mutable access using `map[&key] = new_value`.
///
/// # Panics
/// Panics if the key is not present in the map.
impl<K: NoUninit, V> IndexMut<&K> for PairMap<K, V> {
    fn index_mut(&mut self, key: &K) -> &mut Self::Output {
        self.get_mut(key).expect("no entry found for key")
    }
}

// FromIterator / Extend abort on allocation failure like std collections;
// `try_extend` is the fallible form.
impl<K: NoUninit, V> FromIterator<(K, V)> for PairMap<K, V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = PairMap::new();
        map.extend(iter);
        map
    }
}

impl<K: NoUninit, V> Extend<(K, V)> for PairMap<K, V> {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            buffer::unwrap_alloc::<_, K, V>(self.set(key, value));
        }
    }
}

// --- 4. Iterators ---

pub struct Iter<'a, K, V> {
    inner: slice::Iter<'a, Record<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|r| (&r.key, &r.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|r| (&r.key, &r.value))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

pub struct IterMut<'a, K, V> {
    inner: slice::IterMut<'a, Record<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|record| {
            let Record { key, value, .. } = record;
            (&*key, value)
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for IterMut<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|record| {
            let Record { key, value, .. } = record;
            (&*key, value)
        })
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

pub struct Keys<'a, K, V> {
    inner: slice::Iter<'a, Record<K, V>>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|r| &r.key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

pub struct Values<'a, K, V> {
    inner: slice::Iter<'a, Record<K, V>>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|r| &r.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

pub struct ValuesMut<'a, K, V> {
    inner: slice::IterMut<'a, Record<K, V>>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|r| &mut r.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}

/// Owning iterator, yields `(K, V)` in storage order.
pub struct IntoIter<K, V> {
    inner: IntoRecords<K, V>,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|r| (r.key, r.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}

impl<K, V> IntoIterator for PairMap<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.records.into_records(),
        }
    }
}

impl<'a, K, V> IntoIterator for &'a PairMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V> IntoIterator for &'a mut PairMap<K, V> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

// --- 5. Test Suite ---
