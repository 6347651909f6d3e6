/// Write path: `apply()` and `compact_log()`.
///
/// Every mutation flows through `apply`. The batch is appended to the WAL as
/// one record, then applied to the in-memory Memtable.
use anyhow::{Context, Result};
use memtable::Memtable;
use std::collections::BTreeMap;
use std::fs;
use wal::{WalBatch, WalOp, WalWriter};

use crate::{validate_batch, BatchOp, KvStore, Store};

/// Collapses a batch to one operation per key, keeping the last one.
///
/// Every operation of a batch shares a sequence number and the memtable
/// ignores writes at an equal sequence, so without this a later operation
/// on the same key would be lost.
pub(crate) fn coalesce(ops: Vec<WalOp>) -> Vec<WalOp> {
    let mut last: BTreeMap<Vec<u8>, WalOp> = BTreeMap::new();
    for op in ops {
        last.insert(op.key().to_vec(), op);
    }
    last.into_values().collect()
}

pub(crate) fn apply_to_memtable(mem: &mut Memtable, ops: Vec<WalOp>, seq: u64) {
    // MemStore batches and replayed records reach this path uncoalesced
    for op in coalesce(ops) {
        match op {
            WalOp::Put { key, value } => mem.put(key, value, seq),
            WalOp::Del { key } => mem.delete(key, seq),
        }
    }
}

impl Store {
    /// Rewrites the WAL so it holds a single batch with the live entries.
    ///
    /// Tombstones are dropped: after compaction nothing older than the new
    /// log exists for them to shadow. The new log is written to a temp file,
    /// fsynced, and renamed over the old one.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure; the old log is left untouched unless
    /// the rename succeeded.
    pub fn compact_log(&mut self) -> Result<()> {
        let tmp_path = Self::tmp_log_path(&self.wal_path);
        let _ = fs::remove_file(&tmp_path);

        let ops: Vec<WalOp> = self
            .mem
            .iter()
            .filter_map(|(key, entry)| {
                entry.value.as_ref().map(|value| WalOp::Put {
                    key: key.clone(),
                    value: value.clone(),
                })
            })
            .collect();
        let live = ops.len();

        {
            let mut w = WalWriter::create(&tmp_path, true)
                .with_context(|| format!("failed to create {}", tmp_path.display()))?;
            w.append(&WalBatch { seq: self.seq, ops })?;
        }

        fs::rename(&tmp_path, &self.wal_path)
            .with_context(|| format!("failed to replace {}", self.wal_path.display()))?;

        // the old writer still points at the replaced inode
        self.wal_writer = WalWriter::create(&self.wal_path, self.wal_sync)?;

        let mut fresh = Memtable::new();
        for (key, entry) in std::mem::take(&mut self.mem).into_entries() {
            if let Some(value) = entry.value {
                fresh.put(key, value, entry.seq);
            }
        }
        self.mem = fresh;

        tracing::info!(seq = self.seq, live, "wal compacted");
        Ok(())
    }
}

impl KvStore for Store {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.read_entry(key))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self.read_prefix(prefix))
    }

    fn apply(&mut self, batch: Vec<BatchOp>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        validate_batch(&batch)?;

        let seq = self
            .seq
            .checked_add(1)
            .ok_or_else(|| anyhow::anyhow!("sequence number overflow (u64::MAX reached)"))?;

        let record = WalBatch {
            seq,
            ops: coalesce(batch),
        };
        self.wal_writer.append(&record)?;
        self.seq = seq;

        tracing::debug!(seq, ops = record.ops.len(), "batch applied");
        apply_to_memtable(&mut self.mem, record.ops, seq);
        Ok(())
    }

    fn compact(&mut self) -> Result<()> {
        self.compact_log()
    }
}
