//! Write overlay giving a command all-or-nothing semantics.
//!
//! Writes land in a private memtable; reads consult it before the base
//! store. [`Transaction::commit`] hands every buffered write to the base in
//! a single [`KvStore::apply`]; dropping the transaction discards them.

use anyhow::Result;
use memtable::Memtable;
use std::collections::BTreeMap;

use crate::{validate_batch, BatchOp, KvStore};

pub struct Transaction<'a, S: KvStore + ?Sized> {
    base: &'a mut S,
    overlay: Memtable,
    seq: u64,
}

impl<'a, S: KvStore + ?Sized> Transaction<'a, S> {
    pub fn new(base: &'a mut S) -> Self {
        Self {
            base,
            overlay: Memtable::new(),
            seq: 0,
        }
    }

    /// Number of distinct keys written so far.
    pub fn pending(&self) -> usize {
        self.overlay.len()
    }

    /// Applies every buffered write to the base store as one batch.
    pub fn commit(self) -> Result<()> {
        let Transaction { base, overlay, .. } = self;
        let batch: Vec<BatchOp> = overlay
            .into_entries()
            .map(|(key, entry)| match entry.value {
                Some(value) => BatchOp::Put { key, value },
                None => BatchOp::Del { key },
            })
            .collect();
        if batch.is_empty() {
            return Ok(());
        }
        base.apply(batch)
    }

    /// Discards every buffered write.
    pub fn abort(self) {
        if !self.overlay.is_empty() {
            tracing::debug!(pending = self.overlay.len(), "transaction aborted");
        }
    }
}

impl<S: KvStore + ?Sized> KvStore for Transaction<'_, S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.overlay.get_entry(key) {
            Some(entry) => Ok(entry.value.clone()),
            None => self.base.get(key),
        }
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.base.scan_prefix(prefix)?.into_iter().collect();
        for (key, entry) in self.overlay.scan_prefix(prefix) {
            match &entry.value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    fn apply(&mut self, batch: Vec<BatchOp>) -> Result<()> {
        validate_batch(&batch)?;
        for op in batch {
            self.seq += 1;
            match op {
                BatchOp::Put { key, value } => self.overlay.put(key, value, self.seq),
                BatchOp::Del { key } => self.overlay.delete(key, self.seq),
            }
        }
        Ok(())
    }
}
