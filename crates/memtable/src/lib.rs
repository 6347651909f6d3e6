//! # Memtable
//!
//! Ordered in-memory table used twice by the key-value layer: as the live
//! table of a store, and as the write overlay of an open
//! transaction. Deletes are kept as tombstones so an overlay can shadow a
//! key that still exists in the table underneath it.
//!
//! Every entry carries the sequence number of the write that produced it. A
//! write with a sequence number lower than or equal to the stored one is
//! ignored, which makes replaying the same log twice harmless.

use std::collections::BTreeMap;
use std::ops::Bound;

/// ValueEntry stores the sequence number and the optional value.
/// `value == None` signifies a tombstone (delete).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueEntry {
    pub seq: u64,
    pub value: Option<Vec<u8>>,
}

#[derive(Debug)]
pub struct Memtable {
    map: BTreeMap<Vec<u8>, ValueEntry>,
    approx_size: usize,
}

impl Memtable {
    pub fn new() -> Self {
        Self {
            map: BTreeMap::new(),
            approx_size: 0,
        }
    }

    /// Put a key with a seq number. Overwrites existing entry if seq is newer.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>, seq: u64) {
        if !self.replace_allowed(&key, seq) {
            return;
        }
        self.approx_size += value.len();
        self.map.insert(
            key,
            ValueEntry {
                seq,
                value: Some(value),
            },
        );
    }

    /// Delete: add a tombstone with seq
    pub fn delete(&mut self, key: Vec<u8>, seq: u64) {
        if !self.replace_allowed(&key, seq) {
            return;
        }
        self.map.insert(key, ValueEntry { seq, value: None });
    }

    /// Checks the stored seq and releases the size accounted to the old
    /// entry when the write is going to replace it.
    fn replace_allowed(&mut self, key: &[u8], seq: u64) -> bool {
        match self.map.get(key) {
            Some(old) if old.seq >= seq => false,
            Some(old) => {
                if let Some(ref ov) = old.value {
                    self.approx_size = self.approx_size.saturating_sub(ov.len());
                }
                true
            }
            None => {
                self.approx_size += key.len();
                true
            }
        }
    }

    /// Get the latest value if present and not a tombstone
    pub fn get(&self, key: &[u8]) -> Option<(u64, Vec<u8>)> {
        self.map
            .get(key)
            .and_then(|e| e.value.as_ref().map(|v| (e.seq, v.clone())))
    }

    /// Returns the raw entry, tombstones included.
    pub fn get_entry(&self, key: &[u8]) -> Option<&ValueEntry> {
        self.map.get(key)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    /// Ordered iterator over entries (key, ValueEntry)
    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &ValueEntry)> {
        self.map.iter()
    }

    /// Ordered iterator over every entry whose key starts with `prefix`,
    /// tombstones included. An empty prefix yields the whole table.
    pub fn scan_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
    ) -> impl Iterator<Item = (&'a Vec<u8>, &'a ValueEntry)> + 'a {
        self.map
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(k, _)| k.starts_with(prefix))
    }

    /// Consumes the table, yielding entries in key order.
    pub fn into_entries(self) -> impl Iterator<Item = (Vec<u8>, ValueEntry)> {
        self.map.into_iter()
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.approx_size = 0;
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Bytes held by keys and live values.
    pub fn approx_size(&self) -> usize {
        self.approx_size
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for Memtable {
    fn default() -> Self {
        Self::new()
    }
}
