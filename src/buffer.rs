//! Contiguous, growable buffer of records.
//!
//! [`RecordBuffer`] owns a single raw allocation of `Record<K, V>` slots. Slots
//! `[0, len)` are initialised; everything past `len` is uninitialised memory that is
//! never read. Appending to a full buffer grows it to `capacity + capacity / 2 + 1`
//! slots, and removal shifts the tail down so live records stay dense and in
//! insertion order.
//!
//! Allocation is fallible: growth reports a [`StoreError`] instead of aborting, and
//! a failed reallocation leaves the buffer exactly as it was.

use core::alloc::Layout;
use core::marker::PhantomData;
use core::mem::{align_of, size_of};
use core::ptr::{self, NonNull};
use core::slice;
use std::alloc;

use log::trace;

use crate::error::StoreError;
use crate::layout::Record;

/// Capacity after one growth step from `capacity`.
///
/// The `+ 1` guarantees progress from zero and one.
#[inline]
pub fn next_capacity(capacity: usize) -> Option<usize> {
    capacity.checked_add(capacity / 2)?.checked_add(1)
}

pub struct RecordBuffer<K, V> {
    ptr: NonNull<Record<K, V>>,
    len: usize,
    capacity: usize,
    _marker: PhantomData<Record<K, V>>,
}

// Safety: the buffer uniquely owns its records, exactly like `Vec<Record<K, V>>`.
unsafe impl<K: Send, V: Send> Send for RecordBuffer<K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for RecordBuffer<K, V> {}

impl<K, V> RecordBuffer<K, V> {
    /// An empty buffer that has not allocated.
    pub const fn new() -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
            capacity: 0,
            _marker: PhantomData,
        }
    }

    /// An empty buffer with room for exactly `capacity` records.
    pub fn with_capacity(capacity: usize) -> Result<Self, StoreError> {
        let mut buffer = Self::new();
        if capacity > 0 {
            buffer.grow_to(capacity)?;
        }
        Ok(buffer)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    #[inline(always)]
    pub fn get(&self, index: usize) -> Option<&Record<K, V>> {
        self.as_slice().get(index)
    }

    #[inline(always)]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Record<K, V>> {
        self.as_mut_slice().get_mut(index)
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[Record<K, V>] {
        // Safety: `[0, len)` is initialised and `ptr` is non-null and aligned
        // (dangling only when `len == 0`).
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [Record<K, V>] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Appends a record, growing by one step when full.
    ///
    /// On error the buffer is unchanged and the record is dropped.
    pub fn push(&mut self, record: Record<K, V>) -> Result<(), StoreError> {
        if self.is_full() {
            let new_capacity = next_capacity(self.capacity).ok_or(StoreError::CapacityOverflow {
                records: usize::MAX,
                record_size: size_of::<Record<K, V>>(),
            })?;
            self.grow_to(new_capacity)?;
        }
        unsafe {
            ptr::write(self.ptr.as_ptr().add(self.len), record);
        }
        self.len += 1;
        Ok(())
    }

    /// Makes room for at least `additional` more records.
    ///
    /// Grows to whichever is larger: the exact requirement or one growth step.
    pub fn reserve(&mut self, additional: usize) -> Result<(), StoreError> {
        let required = self
            .len
            .checked_add(additional)
            .ok_or(StoreError::CapacityOverflow {
                records: usize::MAX,
                record_size: size_of::<Record<K, V>>(),
            })?;
        if required <= self.capacity {
            return Ok(());
        }
        let step = next_capacity(self.capacity).unwrap_or(required);
        self.grow_to(required.max(step))
    }

    /// Removes the record at `index`, shifting every later record down one slot.
    ///
    /// # Panics
    /// Panics if `index >= len`.
    pub fn remove(&mut self, index: usize) -> Record<K, V> {
        assert!(
            index < self.len,
            "removal index (is {index}) should be < len (is {})",
            self.len
        );
        unsafe {
            let base = self.ptr.as_ptr();
            let record = ptr::read(base.add(index));
            // Zero records move when removing the last one.
            ptr::copy(base.add(index + 1), base.add(index), self.len - index - 1);
            self.len -= 1;
            record
        }
    }

    /// Keeps only the records for which `keep` returns `true`, preserving order.
    pub fn retain_mut<F>(&mut self, mut keep: F)
    where
        F: FnMut(&mut Record<K, V>) -> bool,
    {
        let len = self.len;
        // If `keep` panics the remaining records leak instead of being dropped twice.
        self.len = 0;
        let mut removed = 0;
        unsafe {
            let base = self.ptr.as_ptr();
            for i in 0..len {
                let current = base.add(i);
                if !keep(&mut *current) {
                    ptr::drop_in_place(current);
                    removed += 1;
                } else if removed > 0 {
                    ptr::copy_nonoverlapping(current, base.add(i - removed), 1);
                }
            }
        }
        self.len = len - removed;
    }

    /// Drops every record, keeping the allocation.
    pub fn clear(&mut self) {
        let records: *mut [Record<K, V>] = self.as_mut_slice();
        self.len = 0;
        unsafe {
            ptr::drop_in_place(records);
        }
    }

    /// Consumes the buffer, yielding its records in storage order.
    pub fn into_records(self) -> IntoRecords<K, V> {
        IntoRecords {
            buffer: self,
            front: 0,
        }
    }

    fn layout_for(capacity: usize) -> Result<Layout, StoreError> {
        Layout::array::<Record<K, V>>(capacity).map_err(|_| StoreError::CapacityOverflow {
            records: capacity,
            record_size: size_of::<Record<K, V>>(),
        })
    }

    /// Reallocates to exactly `new_capacity` slots. `new_capacity` must exceed the
    /// current capacity.
    #[inline(never)]
    fn grow_to(&mut self, new_capacity: usize) -> Result<(), StoreError> {
        debug_assert!(new_capacity > self.capacity);
        let new_layout = Self::layout_for(new_capacity)?;

        // `Record` always holds a `u64`, so `new_layout` is never zero-sized.
        let raw = unsafe {
            if self.capacity == 0 {
                alloc::alloc(new_layout)
            } else {
                let old_layout = Self::layout_for(self.capacity)?;
                alloc::realloc(self.ptr.as_ptr().cast(), old_layout, new_layout.size())
            }
        };

        let Some(ptr) = NonNull::new(raw.cast::<Record<K, V>>()) else {
            return Err(StoreError::AllocationFailed {
                bytes: new_layout.size(),
            });
        };

        trace!(
            "record buffer grew from {} to {} slots ({} bytes)",
            self.capacity,
            new_capacity,
            new_layout.size()
        );
        self.ptr = ptr;
        self.capacity = new_capacity;
        Ok(())
    }
}

impl<K: Clone, V: Clone> RecordBuffer<K, V> {
    /// Deep copy with the same capacity.
    pub fn try_clone(&self) -> Result<Self, StoreError> {
        let mut copy = Self::with_capacity(self.capacity)?;
        for record in self.as_slice() {
            copy.push(record.clone())?;
        }
        Ok(copy)
    }
}

/// Turns a growth failure into the same outcome as an infallible std collection:
/// a panic on overflow, `handle_alloc_error` when the allocator refuses.
pub(crate) fn unwrap_alloc<T, K, V>(result: Result<T, StoreError>) -> T {
    match result {
        Ok(value) => value,
        Err(StoreError::AllocationFailed { bytes }) => {
            match Layout::from_size_align(bytes, align_of::<Record<K, V>>()) {
                Ok(layout) => alloc::handle_alloc_error(layout),
                Err(_) => panic!("failed to allocate {bytes} bytes for the record buffer"),
            }
        }
        Err(err @ StoreError::CapacityOverflow { .. }) => panic!("{err}"),
    }
}

impl<K, V> Drop for RecordBuffer<K, V> {
    fn drop(&mut self) {
        self.clear();
        if self.capacity > 0 {
            if let Ok(layout) = Self::layout_for(self.capacity) {
                unsafe { alloc::dealloc(self.ptr.as_ptr().cast(), layout) };
            }
        }
    }
}

impl<K, V> Default for RecordBuffer<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Owning iterator over the records of a consumed [`RecordBuffer`].
pub struct IntoRecords<K, V> {
    buffer: RecordBuffer<K, V>,
    front: usize,
}

impl<K, V> Iterator for IntoRecords<K, V> {
    type Item = Record<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front < self.buffer.len {
            let record = unsafe { ptr::read(self.buffer.ptr.as_ptr().add(self.front)) };
            self.front += 1;
            Some(record)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.buffer.len - self.front;
        (remaining, Some(remaining))
    }
}

impl<K, V> ExactSizeIterator for IntoRecords<K, V> {}

impl<K, V> Drop for IntoRecords<K, V> {
    fn drop(&mut self) {
        let len = self.buffer.len;
        // The buffer's own Drop must only release memory.
        self.buffer.len = 0;
        unsafe {
            let rest = self.buffer.ptr.as_ptr().add(self.front);
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(rest, len - self.front));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn record(key: u32, value: u32) -> Record<u32, u32> {
        Record::new(key, value, u64::from(key))
    }

    #[test]
    fn test_next_capacity_sequence() {
        assert_eq!(next_capacity(0), Some(1));
        assert_eq!(next_capacity(1), Some(2));
        assert_eq!(next_capacity(5), Some(8));
        assert_eq!(next_capacity(8), Some(13));
        assert_eq!(next_capacity(13), Some(20));
        assert_eq!(next_capacity(usize::MAX), None);
    }

    #[test]
    fn test_buffer_new_does_not_allocate() {
        let buffer: RecordBuffer<u32, u32> = RecordBuffer::new();
        assert_eq!(buffer.capacity(), 0);
        assert!(buffer.is_empty());
        assert!(buffer.as_slice().is_empty());
    }

    #[test]
    fn test_buffer_push_grows_by_step() {
        let mut buffer = RecordBuffer::with_capacity(5).unwrap();
        for i in 0..5 {
            buffer.push(record(i, i * 10)).unwrap();
        }
        assert_eq!(buffer.capacity(), 5);
        assert!(buffer.is_full());

        buffer.push(record(5, 50)).unwrap();
        assert_eq!(buffer.capacity(), 8);
        assert_eq!(buffer.len(), 6);

        let keys: Vec<u32> = buffer.as_slice().iter().map(|r| r.key).collect();
        assert_eq!(keys, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_buffer_push_from_zero_capacity() {
        let mut buffer = RecordBuffer::new();
        buffer.push(record(1, 1)).unwrap();
        assert_eq!(buffer.capacity(), 1);
        buffer.push(record(2, 2)).unwrap();
        assert_eq!(buffer.capacity(), 2);
        buffer.push(record(3, 3)).unwrap();
        assert_eq!(buffer.capacity(), 4);
    }

    #[test]
    fn test_buffer_remove_middle_and_last() {
        let mut buffer = RecordBuffer::with_capacity(4).unwrap();
        for i in 0..4 {
            buffer.push(record(i, i)).unwrap();
        }

        let removed = buffer.remove(1);
        assert_eq!(removed.key, 1);
        let keys: Vec<u32> = buffer.as_slice().iter().map(|r| r.key).collect();
        assert_eq!(keys, vec![0, 2, 3]);

        // Last element: nothing to shift.
        let removed = buffer.remove(2);
        assert_eq!(removed.key, 3);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.capacity(), 4);
    }

    #[test]
    #[should_panic(expected = "removal index")]
    fn test_buffer_remove_out_of_bounds() {
        let mut buffer: RecordBuffer<u32, u32> = RecordBuffer::with_capacity(1).unwrap();
        buffer.remove(0);
    }

    #[test]
    fn test_buffer_reserve() {
        let mut buffer: RecordBuffer<u32, u32> = RecordBuffer::with_capacity(2).unwrap();
        buffer.reserve(1).unwrap();
        assert_eq!(buffer.capacity(), 2);

        // One step (2 -> 4) covers it.
        buffer.reserve(3).unwrap();
        assert_eq!(buffer.capacity(), 4);

        // Exact requirement exceeds one step.
        buffer.reserve(100).unwrap();
        assert_eq!(buffer.capacity(), 100);
    }

    #[test]
    fn test_buffer_capacity_overflow_is_an_error() {
        let mut buffer: RecordBuffer<u64, u64> = RecordBuffer::new();
        let err = buffer.reserve(usize::MAX).unwrap_err();
        assert!(matches!(err, StoreError::CapacityOverflow { .. }));
        assert_eq!(buffer.capacity(), 0);
        assert!(RecordBuffer::<u64, u64>::with_capacity(usize::MAX / 2).is_err());
    }

    #[test]
    fn test_buffer_retain_mut() {
        let mut buffer = RecordBuffer::with_capacity(6).unwrap();
        for i in 0..6 {
            buffer.push(record(i, i)).unwrap();
        }
        buffer.retain_mut(|r| {
            r.value += 100;
            r.key % 2 == 0
        });
        let pairs: Vec<(u32, u32)> = buffer.as_slice().iter().map(|r| (r.key, r.value)).collect();
        assert_eq!(pairs, vec![(0, 100), (2, 102), (4, 104)]);
    }

    #[test]
    fn test_buffer_drops_records() {
        let tracker = Rc::new(());
        {
            let mut buffer = RecordBuffer::with_capacity(2).unwrap();
            for i in 0..3u32 {
                buffer.push(Record::new(i, Rc::clone(&tracker), 0)).unwrap();
            }
            assert_eq!(Rc::strong_count(&tracker), 4);

            drop(buffer.remove(0));
            assert_eq!(Rc::strong_count(&tracker), 3);

            buffer.retain_mut(|r| r.key != 1);
            assert_eq!(Rc::strong_count(&tracker), 2);
        }
        assert_eq!(Rc::strong_count(&tracker), 1);
    }

    #[test]
    fn test_buffer_clear_keeps_capacity() {
        let tracker = Rc::new(());
        let mut buffer = RecordBuffer::with_capacity(3).unwrap();
        buffer.push(Record::new(1u8, Rc::clone(&tracker), 0)).unwrap();
        buffer.push(Record::new(2u8, Rc::clone(&tracker), 0)).unwrap();
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 3);
        assert_eq!(Rc::strong_count(&tracker), 1);
    }

    #[test]
    fn test_buffer_into_records_partial_consumption() {
        let tracker = Rc::new(());
        let mut buffer = RecordBuffer::with_capacity(3).unwrap();
        for i in 0..3u8 {
            buffer.push(Record::new(i, Rc::clone(&tracker), 0)).unwrap();
        }
        let mut records = buffer.into_records();
        assert_eq!(records.len(), 3);
        let first = records.next().unwrap();
        assert_eq!(first.key, 0);
        drop(records);
        // Only `first` is still alive.
        assert_eq!(Rc::strong_count(&tracker), 2);
        drop(first);
        assert_eq!(Rc::strong_count(&tracker), 1);
    }

    #[test]
    fn test_buffer_try_clone_is_independent() {
        let mut buffer = RecordBuffer::with_capacity(2).unwrap();
        buffer.push(record(1, 10)).unwrap();
        let mut copy = buffer.try_clone().unwrap();
        copy.get_mut(0).unwrap().value = 99;
        assert_eq!(buffer.get(0).unwrap().value, 10);
        assert_eq!(copy.get(0).unwrap().value, 99);
        assert_eq!(copy.capacity(), 2);
    }
}
