//! Process-wide symbol interner (§3.2).
//!
//! A lock-guarded two-way map between strings and dense `u32` indices.
//! Interning is idempotent, indices are stable for the table's lifetime,
//! and concurrent lookups are safe; writers take the exclusive path of the
//! `RwLock` only on a genuine miss.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Inner {
    strings: Vec<Arc<str>>,
    indices: HashMap<Arc<str>, u32>,
}

/// Interns strings to dense indices and resolves indices back to strings.
#[derive(Debug, Default)]
pub struct SymbolTable {
    inner: RwLock<Inner>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Interns `s`, returning its stable index. Idempotent: interning the
    /// same string twice returns the same index.
    pub fn lookup(&self, s: &str) -> u32 {
        {
            let read = self.inner.read();
            if let Some(&idx) = read.indices.get(s) {
                return idx;
            }
        }
        let mut write = self.inner.write();
        // Re-check under the write lock: another writer may have interned
        // this string while we were waiting for the lease.
        if let Some(&idx) = write.indices.get(s) {
            return idx;
        }
        let idx = write.strings.len() as u32;
        let arc: Arc<str> = Arc::from(s);
        write.strings.push(arc.clone());
        write.indices.insert(arc, idx);
        idx
    }

    /// Resolves a previously-interned index back to its string.
    ///
    /// # Panics
    /// Panics if `idx` was never returned by [`SymbolTable::lookup`] on this
    /// table; this is a programming error in the caller (the translator
    /// never fabricates symbol indices), not a recoverable runtime
    /// condition.
    pub fn resolve(&self, idx: u32) -> Arc<str> {
        let read = self.inner.read();
        read.strings
            .get(idx as usize)
            .cloned()
            .unwrap_or_else(|| panic!("symbol index {idx} out of range"))
    }

    pub fn len(&self) -> usize {
        self.inner.read().strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates all `(index, string)` pairs, in index order. Used by the
    /// intermediate symbol-table file writer (§6).
    pub fn entries(&self) -> Vec<(u32, Arc<str>)> {
        let read = self.inner.read();
        read.strings
            .iter()
            .enumerate()
            .map(|(i, s)| (i as u32, s.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;
    use std::thread;

    #[test]
    fn lookup_is_idempotent() {
        let table = SymbolTable::new();
        let a = table.lookup("foo");
        let b = table.lookup("foo");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_strings_get_distinct_indices() {
        let table = SymbolTable::new();
        let a = table.lookup("foo");
        let b = table.lookup("bar");
        assert_ne!(a, b);
    }

    #[test]
    fn roundtrip_resolve_of_lookup() {
        let table = SymbolTable::new();
        let idx = table.lookup("hello");
        assert_eq!(&*table.resolve(idx), "hello");
    }

    #[test]
    fn concurrent_lookups_converge_on_one_index() {
        let table = StdArc::new(SymbolTable::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let table = table.clone();
            handles.push(thread::spawn(move || table.lookup("shared")));
        }
        let results: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }
}
