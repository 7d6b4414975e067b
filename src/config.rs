//! Per-store configuration.
//!
//! [`MapConfig::default()`] reproduces the classic behaviour: five initial slots,
//! djb2 hashing, hash equality as the only identity test and a linear scan for every
//! lookup. Each knob can be changed independently with the builder-style setters.

use core::fmt;
use core::ptr;

use crate::hash::{self, HashFn};

/// Initial number of record slots of a default store.
pub const DEFAULT_INITIAL_CAPACITY: usize = 5;

/// How a stored record is matched against a query key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMatch {
    /// Equal hashes mean equal keys. Two distinct keys whose hashes collide are
    /// treated as the same entry.
    #[default]
    Hash,
    /// Equal hashes *and* equal key bytes. Colliding keys are kept apart; no
    /// equality function is required.
    HashAndBytes,
}

/// How the store finds the record for a hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lookup {
    /// Compare the query hash with every live record. O(n).
    #[default]
    Scan,
    /// Keep a hash → slot index next to the records. O(1) average lookups; erase
    /// remains O(n) because the records still compact.
    Indexed,
}

#[derive(Clone, Copy)]
pub struct MapConfig {
    pub initial_capacity: usize,
    pub hash_function: HashFn,
    pub key_match: KeyMatch,
    pub lookup: Lookup,
}

impl MapConfig {
    pub fn new() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            hash_function: hash::djb2,
            key_match: KeyMatch::Hash,
            lookup: Lookup::Scan,
        }
    }

    /// Number of record slots allocated up front. Zero defers allocation to the
    /// first insert.
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn hash_function(mut self, hash_function: HashFn) -> Self {
        self.hash_function = hash_function;
        self
    }

    pub fn key_match(mut self, key_match: KeyMatch) -> Self {
        self.key_match = key_match;
        self
    }

    pub fn lookup(mut self, lookup: Lookup) -> Self {
        self.lookup = lookup;
        self
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapConfig")
            .field("initial_capacity", &self.initial_capacity)
            .field("hash_function", &hash_name(self.hash_function))
            .field("key_match", &self.key_match)
            .field("lookup", &self.lookup)
            .finish()
    }
}

/// Display name of a hash function: the built-ins by name, anything else by address.
pub(crate) fn hash_name(hash_function: HashFn) -> String {
    if ptr::fn_addr_eq(hash_function, hash::djb2 as HashFn) {
        "djb2".to_string()
    } else if ptr::fn_addr_eq(hash_function, hash::fnv1a as HashFn) {
        "fnv1a".to_string()
    } else {
        format!("custom@{:p}", hash_function as *const ())
    }
}
