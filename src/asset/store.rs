//! Concurrency-safe partition store
//!
//! Partitions are copied in and out by value. The backing map never leaves
//! this module, so every mutation goes through the same write lock.

use super::Partition;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Partition collection keyed by part number
#[derive(Debug, Default)]
pub struct PartitionStore {
    parts: RwLock<BTreeMap<i64, Partition>>,
}

impl PartitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Known part numbers in ascending order
    pub fn ids(&self) -> Vec<i64> {
        self.parts.read().keys().copied().collect()
    }

    /// Copy of the partition with the given id
    pub fn get(&self, id: i64) -> Option<Partition> {
        self.parts.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.parts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.read().is_empty()
    }

    /// Insert or replace. Callers must have finished any file I/O beforehand.
    pub(crate) fn set(&self, part: Partition) {
        self.parts.write().insert(part.id, part);
    }
}
