use anyhow::Result;
use memtable::Memtable;

use crate::write::apply_to_memtable;
use crate::{validate_batch, BatchOp, KvStore};

/// A store without a log. Contents vanish with the value.
#[derive(Debug, Default)]
pub struct MemStore {
    mem: Memtable,
    seq: u64,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.mem.iter().filter(|(_, e)| e.value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.mem.get(key).map(|(_, v)| v))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .mem
            .scan_prefix(prefix)
            .filter_map(|(k, e)| e.value.as_ref().map(|v| (k.clone(), v.clone())))
            .collect())
    }

    fn apply(&mut self, batch: Vec<BatchOp>) -> Result<()> {
        validate_batch(&batch)?;
        self.seq += 1;
        apply_to_memtable(&mut self.mem, batch, self.seq);
        Ok(())
    }
}
