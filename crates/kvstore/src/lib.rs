//! # kvstore - Key-Value Primitive
//!
//! The byte-key to byte-value store the vessel oracle keeps its state in.
//! It offers exactly what the oracle's stores need: point reads, ordered
//! prefix scans, and atomic application of a batch of writes.
//!
//! ## Architecture
//!
//! ```text
//! Dispatcher (one command)
//!   |
//!   v
//! Transaction ── reads: overlay memtable, then base store
//!   |             writes: overlay memtable only
//!   | commit()
//!   v
//! ┌───────────────────────────────────────────────┐
//! │ Store                                         │
//! │ write.rs → WAL append (one batch) → Memtable  │
//! │ read.rs  → Memtable                           │
//! │ recovery.rs → WAL replay on open              │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module        | Purpose                                            |
//! |--------------|----------------------------------------------------|
//! | [`lib.rs`]   | `KvStore` trait, `Store` struct, limits, `Debug`    |
//! | [`recovery`] | WAL replay, tmp file cleanup                       |
//! | [`write`]    | `apply()`, `compact_log()`                         |
//! | [`read`]     | `get()`, `scan_prefix()`                           |
//! | [`mem`]      | `MemStore`, a store without a log                  |
//! | [`txn`]      | `Transaction` write overlay                        |
//!
//! ## Crash Safety
//!
//! A committed transaction reaches the WAL as a single CRC-framed record
//! before the memtable sees any of it. Replay either applies the whole
//! batch or, for a torn tail record, none of it.
mod mem;
mod read;
mod recovery;
mod txn;
mod write;

use anyhow::Result;
use memtable::Memtable;
use std::path::{Path, PathBuf};
use wal::WalWriter;

pub use mem::MemStore;
pub use recovery::replay_wal_and_build;
pub use txn::Transaction;
pub use wal::WalOp as BatchOp;

/// Maximum allowed key size in bytes (64 KiB).
pub const MAX_KEY_SIZE: usize = 64 * 1024;
/// Maximum allowed value size in bytes (10 MiB).
pub const MAX_VALUE_SIZE: usize = 10 * 1024 * 1024;

/// Point access, prefix iteration and atomic batch writes over byte keys.
pub trait KvStore {
    /// Returns the live value stored at `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Returns every live `(key, value)` pair whose key starts with `prefix`,
    /// in ascending key order.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Applies all operations of `batch` together, or none of them.
    fn apply(&mut self, batch: Vec<BatchOp>) -> Result<()>;

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.apply(vec![BatchOp::Put { key, value }])
    }

    fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        self.apply(vec![BatchOp::Del { key }])
    }

    /// Reclaims space held by overwritten and deleted entries.
    fn compact(&mut self) -> Result<()> {
        Ok(())
    }

    /// Opens a write overlay on top of this store.
    fn begin(&mut self) -> Transaction<'_, Self>
    where
        Self: Sized,
    {
        Transaction::new(self)
    }
}

impl<K: KvStore + ?Sized> KvStore for Box<K> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        (**self).scan_prefix(prefix)
    }

    fn apply(&mut self, batch: Vec<BatchOp>) -> Result<()> {
        (**self).apply(batch)
    }

    fn compact(&mut self) -> Result<()> {
        (**self).compact()
    }
}

/// Rejects batches that contain empty or oversized keys or oversized values.
pub fn validate_batch(batch: &[BatchOp]) -> Result<()> {
    for op in batch {
        let key = op.key();
        anyhow::ensure!(!key.is_empty(), "key must not be empty");
        anyhow::ensure!(
            key.len() <= MAX_KEY_SIZE,
            "key too large: {} bytes (max {})",
            key.len(),
            MAX_KEY_SIZE
        );
        if let BatchOp::Put { value, .. } = op {
            anyhow::ensure!(
                value.len() <= MAX_VALUE_SIZE,
                "value too large: {} bytes (max {})",
                value.len(),
                MAX_VALUE_SIZE
            );
        }
    }
    Ok(())
}

/// Durable store: a memtable backed by a write-ahead log.
///
/// # Write Path
///
/// 1. Validate the batch.
/// 2. Increment the monotonic sequence number.
/// 3. Coalesce the batch by key (last operation wins) and append it to the
///    WAL as one record.
/// 4. Apply every operation to the Memtable under that sequence number.
///
/// # Recovery
///
/// On construction ([`Store::open`]) the WAL is replayed into a fresh
/// Memtable.
pub struct Store {
    pub(crate) mem: Memtable,
    pub(crate) wal_path: PathBuf,
    pub(crate) wal_writer: WalWriter,

    /// Current monotonic sequence number.
    pub(crate) seq: u64,

    /// If `true`, every WAL append is followed by `fsync` for durability.
    pub(crate) wal_sync: bool,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("seq", &self.seq)
            .field("wal_sync", &self.wal_sync)
            .field("wal_path", &self.wal_path)
            .field("memtable_size", &self.mem.approx_size())
            .field("memtable_entries", &self.mem.len())
            .finish()
    }
}

impl Store {
    /// Opens the store at `wal_path`, replaying any existing log.
    ///
    /// # Recovery Steps
    ///
    /// 1. Create the parent directory if it does not exist.
    /// 2. Remove a leftover `.tmp` log from an interrupted [`Store::compact_log`].
    /// 3. Replay the WAL into a fresh Memtable.
    /// 4. Open the WAL writer in append mode.
    pub fn open<P: AsRef<Path>>(wal_path: P, wal_sync: bool) -> Result<Self> {
        let wal_path = wal_path.as_ref().to_path_buf();

        if let Some(parent) = wal_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        Self::cleanup_tmp_log(&wal_path);

        // replay must happen before the writer opens the same file
        let mut mem = Memtable::new();
        let seq = replay_wal_and_build(&wal_path, &mut mem)?;

        let wal_writer = WalWriter::create(&wal_path, wal_sync)?;

        tracing::info!(
            wal = %wal_path.display(),
            seq,
            entries = mem.len(),
            "store opened"
        );

        Ok(Self {
            mem,
            wal_path,
            wal_writer,
            seq,
            wal_sync,
        })
    }

    /// Returns the current monotonic sequence number.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Number of memtable entries, tombstones included.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.mem.len()
    }

    #[must_use]
    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    pub(crate) fn tmp_log_path(wal_path: &Path) -> PathBuf {
        let mut name = wal_path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

/// Best-effort sync on drop.
///
/// With `wal_sync == false` appends may still sit in the OS page cache;
/// Drop cannot propagate errors, so a failure here is ignored.
impl Drop for Store {
    fn drop(&mut self) {
        if !self.wal_sync {
            let _ = self.wal_writer.sync_to_disk();
        }
    }
}

#[cfg(test)]
mod tests;
