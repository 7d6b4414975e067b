//! # pairmap
//!
//! An associative store that keeps every entry as a `{ key, value, hash }` record in one
//! contiguous, growable buffer, and decides key identity by comparing hashes of the
//! keys' raw bytes.
//!
//! This crate provides [`PairMap`], its [`MapConfig`], the [`Record`] / [`RecordLayout`]
//! types describing the buffer, and the byte hash functions in [`hash`].
//!
//! ## Key Features
//!
//! * **One buffer:** records live back to back in insertion order. Erase compacts, so
//!   iteration order is always insertion order.
//! * **Hash identity:** keys are hashed over their in-memory bytes (djb2 by default) and
//!   two keys with equal hashes are the same entry. [`KeyMatch::HashAndBytes`] adds a
//!   byte comparison for callers that cannot accept collisions.
//! * **Per-store hashing:** each store owns its hash function and can swap it at any time;
//!   stored hashes are never silently recomputed.
//! * **Predictable growth:** 5 slots initially, then `capacity + capacity / 2 + 1`.
//! * **Fallible allocation:** `set`, `reserve` and `try_extend` return [`StoreError`]
//!   instead of aborting.
//!
//! ## Key Constraint
//!
//! Keys must implement [`bytemuck::NoUninit`] (plain integers, floats, byte arrays,
//! `#[repr(C)]` structs without padding), because their bytes are what gets hashed.
//!
//! ## Examples
//!
//! ### Basic use
//!
//! ```rust
//! use pairmap::PairMap;
//!
//! let mut map: PairMap<u32, f32> = PairMap::new();
//! map.set(1, 1.0).unwrap();
//! map.set(2, 2.0).unwrap();
//! map.set(3, 3.0).unwrap();
//!
//! let pairs: Vec<(u32, f32)> = map.iter().map(|(k, v)| (*k, *v)).collect();
//! assert_eq!(pairs, vec![(1, 1.0), (2, 2.0), (3, 3.0)]);
//!
//! map.erase(&2);
//! assert!(!map.exists(&2));
//! assert_eq!(map.len(), 2);
//! ```
//!
//! ### Configuration
//!
//! ```rust
//! use pairmap::{hash, KeyMatch, Lookup, MapConfig, PairMap};
//!
//! let config = MapConfig::new()
//!     .hash_function(hash::fnv1a)
//!     .key_match(KeyMatch::HashAndBytes)
//!     .lookup(Lookup::Indexed);
//!
//! let mut map: PairMap<[u8; 4], u64> = PairMap::with_config(config);
//! map.set(*b"rust", 2015).unwrap();
//! assert_eq!(map.get(b"rust"), Some(&2015));
//! ```

// --- Module Declarations ---

pub mod buffer;
pub mod config;
pub mod error;
pub mod hash;
pub mod layout;
pub mod map;

// --- Re-exports ---

pub use config::{KeyMatch, Lookup, MapConfig};
pub use error::StoreError;
pub use hash::HashFn;
pub use layout::{Record, RecordLayout};
pub use map::PairMap;
