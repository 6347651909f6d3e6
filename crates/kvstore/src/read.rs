/// Read path: point lookups and prefix scans against the memtable.
///
/// Tombstones are never returned: a deleted key reads as absent and is
/// skipped by scans.
use crate::Store;

impl Store {
    pub(crate) fn read_entry(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.mem.get(key).map(|(_, v)| v)
    }

    pub(crate) fn read_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.mem
            .scan_prefix(prefix)
            .filter_map(|(k, e)| e.value.as_ref().map(|v| (k.clone(), v.clone())))
            .collect()
    }
}
