use crate::Store;
use anyhow::Result;
use std::path::Path;

pub fn open_store(dir: &Path) -> Result<Store> {
    Store::open(dir.join("wal.log"), false)
}

pub fn kv(key: &str, value: &str) -> (Vec<u8>, Vec<u8>) {
    (key.as_bytes().to_vec(), value.as_bytes().to_vec())
}
