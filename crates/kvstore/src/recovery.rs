/// WAL replay and leftover-file cleanup for the cold-start path.
use anyhow::Result;
use memtable::Memtable;
use std::path::Path;
use wal::WalReader;

use crate::write::apply_to_memtable;
use crate::Store;

/// Replays a WAL file into the given memtable, returning the highest sequence
/// number encountered.
///
/// If the WAL file does not exist, returns `Ok(0)` (fresh start).
///
/// # Errors
///
/// Propagates any I/O or corruption error from [`WalReader::replay`].
pub fn replay_wal_and_build<P: AsRef<Path>>(path: P, mem: &mut Memtable) -> Result<u64> {
    match WalReader::open(path.as_ref()) {
        Ok(mut reader) => {
            let mut max_seq = 0u64;
            let mut batches = 0usize;

            reader.replay(|batch| {
                max_seq = max_seq.max(batch.seq);
                batches += 1;
                apply_to_memtable(mem, batch.ops, batch.seq);
            })?;

            tracing::debug!(batches, max_seq, "wal replayed");
            Ok(max_seq)
        }
        Err(e) => {
            // File doesn't exist yet -> fresh start
            if matches!(e, wal::WalError::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
            {
                Ok(0)
            } else {
                Err(anyhow::anyhow!(e).context("failed to open WAL for replay"))
            }
        }
    }
}

impl Store {
    /// Removes a `.tmp` log left behind by an interrupted compaction.
    pub(crate) fn cleanup_tmp_log(wal_path: &Path) {
        let tmp = Self::tmp_log_path(wal_path);
        if tmp.exists() {
            tracing::warn!(path = %tmp.display(), "removing leftover compaction log");
            let _ = std::fs::remove_file(&tmp);
        }
    }
}
