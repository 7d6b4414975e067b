//! Errors surfaced by the store.
//!
//! Only operations that allocate can fail. Looking up, testing for, or erasing a
//! key that is not present is a normal outcome (`None` / `false`), not an error.

use thiserror::Error;

/// The store could not obtain memory for more records.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The requested capacity, in bytes, does not fit in `isize`.
    #[error("capacity overflow: {records} records of {record_size} bytes")]
    CapacityOverflow { records: usize, record_size: usize },

    /// The global allocator refused the request.
    #[error("failed to allocate {bytes} bytes for the record buffer")]
    AllocationFailed { bytes: usize },
}
