//! Process-wide record table (§3.3).
//!
//! Maps flat tuples of [`RamDomain`] (arity known at the call site) to
//! dense record indices and back. Index 0 is reserved for `nil`. `pack` is
//! idempotent: packing the same tuple twice returns the same index.
//!
//! §5 calls for "a lock-free intern-or-insert path with a fallback lock on
//! growth". `dashmap` gives us exactly that shape for the dedup map; the
//! backing storage vector still needs a lock for the rare append, which we
//! take only on a genuine miss, mirroring the symbol table's RwLock
//! fast-path/slow-path split.

use crate::value::{RamDomain, NIL};
use dashmap::DashMap;
use parking_lot::RwLock;

/// Packs and unpacks flat tuples into dense record indices.
#[derive(Debug, Default)]
pub struct RecordTable {
    storage: RwLock<Vec<Box<[RamDomain]>>>,
    index: DashMap<Box<[RamDomain]>, u32>,
}

impl RecordTable {
    pub fn new() -> Self {
        // Index 0 is reserved for nil; seed storage with an empty slot so
        // record indices returned by `pack` never collide with NIL.
        let table = RecordTable {
            storage: RwLock::new(vec![Box::from([])]),
            index: DashMap::new(),
        };
        table
    }

    /// Packs `data` (length must equal `arity`) into a record index.
    /// Idempotent: the same slice always yields the same index.
    pub fn pack(&self, data: &[RamDomain], arity: usize) -> u32 {
        debug_assert_eq!(data.len(), arity);
        if arity == 0 {
            return NIL as u32;
        }
        if let Some(existing) = self.index.get(data) {
            return *existing;
        }
        let mut storage = self.storage.write();
        if let Some(existing) = self.index.get(data) {
            return *existing;
        }
        let idx = storage.len() as u32;
        let boxed: Box<[RamDomain]> = data.into();
        storage.push(boxed.clone());
        self.index.insert(boxed, idx);
        idx
    }

    /// Unpacks a record index back to its original slice. `nil` (index 0)
    /// unpacks to an empty slice without touching the lock's slow path.
    ///
    /// # Panics
    /// Panics if `idx` is out of range or its stored arity does not match
    /// `arity` — both indicate a bug upstream in the translator, not a
    /// recoverable runtime condition.
    pub fn unpack(&self, idx: u32, arity: usize) -> Box<[RamDomain]> {
        if idx == NIL as u32 {
            return Box::from([]);
        }
        let storage = self.storage.read();
        let entry = storage
            .get(idx as usize)
            .unwrap_or_else(|| panic!("record index {idx} out of range"));
        assert_eq!(
            entry.len(),
            arity,
            "record {idx} has arity {}, requested {arity}",
            entry.len()
        );
        entry.clone()
    }

    pub fn len(&self) -> usize {
        self.storage.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_is_idempotent() {
        let table = RecordTable::new();
        let a = table.pack(&[1, 2, 3], 3);
        let b = table.pack(&[1, 2, 3], 3);
        assert_eq!(a, b);
    }

    #[test]
    fn unpack_of_pack_returns_original_slice() {
        let table = RecordTable::new();
        let idx = table.pack(&[10, 20, 30], 3);
        assert_eq!(&*table.unpack(idx, 3), &[10, 20, 30]);
    }

    #[test]
    fn nil_unpacks_without_recursing() {
        let table = RecordTable::new();
        assert_eq!(&*table.unpack(NIL as u32, 0), &[] as &[RamDomain]);
    }

    #[test]
    fn distinct_tuples_get_distinct_indices() {
        let table = RecordTable::new();
        let a = table.pack(&[1, 2], 2);
        let b = table.pack(&[2, 1], 2);
        assert_ne!(a, b);
    }

    #[test]
    fn zero_arity_pack_is_nil() {
        let table = RecordTable::new();
        assert_eq!(table.pack(&[], 0), NIL as u32);
    }
}
