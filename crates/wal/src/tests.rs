use super::*;
use std::fs;
use std::io::Cursor;
use tempfile::tempdir;

// -------------------- Helpers --------------------

fn put(key: &[u8], value: &[u8]) -> WalOp {
    WalOp::Put {
        key: key.to_vec(),
        value: value.to_vec(),
    }
}

fn del(key: &[u8]) -> WalOp {
    WalOp::Del { key: key.to_vec() }
}

fn batch(seq: u64, ops: Vec<WalOp>) -> WalBatch {
    WalBatch { seq, ops }
}

fn replay_all(path: &std::path::Path) -> Result<Vec<WalBatch>, WalError> {
    let mut reader = WalReader::open(path)?;
    let mut out = Vec::new();
    reader.replay(|b| out.push(b))?;
    Ok(out)
}

fn replay_from_bytes(data: &[u8]) -> Result<Vec<WalBatch>, WalError> {
    let mut reader = WalReader::from_reader(Cursor::new(data.to_vec()));
    let mut out = Vec::new();
    reader.replay(|b| out.push(b))?;
    Ok(out)
}

/// Frames a raw body with a correct length and CRC.
fn frame(body: &[u8]) -> Vec<u8> {
    let mut hasher = Crc32::new();
    hasher.update(body);
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&((body.len() + 4) as u32).to_le_bytes());
    bytes.extend_from_slice(&hasher.finalize().to_le_bytes());
    bytes.extend_from_slice(body);
    bytes
}

// -------------------- Write & replay --------------------

#[test]
fn write_and_replay_batches() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");

    let first = batch(1, vec![put(b"Vessel/value/a", b"obs"), put(b"VesselIndexImo/value/a", b"idx")]);
    let second = batch(2, vec![del(b"Vessel/value/a")]);
    {
        let mut w = WalWriter::create(&path, true).unwrap();
        w.append(&first).unwrap();
        w.append(&second).unwrap();
    }

    assert_eq!(replay_all(&path).unwrap(), vec![first, second]);
}

#[test]
fn empty_batch_roundtrips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");
    {
        let mut w = WalWriter::create(&path, false).unwrap();
        w.append(&batch(9, vec![])).unwrap();
        w.sync_to_disk().unwrap();
    }
    assert_eq!(replay_all(&path).unwrap(), vec![batch(9, vec![])]);
}

#[test]
fn reopen_appends_after_existing_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");
    {
        let mut w = WalWriter::create(&path, true).unwrap();
        w.append(&batch(1, vec![put(b"k", b"v1")])).unwrap();
    }
    {
        let mut w = WalWriter::create(&path, true).unwrap();
        w.append(&batch(2, vec![put(b"k", b"v2")])).unwrap();
    }
    let seqs: Vec<u64> = replay_all(&path).unwrap().iter().map(|b| b.seq).collect();
    assert_eq!(seqs, vec![1, 2]);
}

// -------------------- Truncated tail tolerance --------------------

#[test]
fn truncated_batch_is_dropped_whole() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");
    {
        let mut w = WalWriter::create(&path, true).unwrap();
        w.append(&batch(1, vec![put(b"k1", b"v1")])).unwrap();
        w.append(&batch(2, vec![put(b"k2", b"v2"), put(b"k3", b"v3")])).unwrap();
    }

    // chop the last few bytes off the second batch, as a crash mid-write would
    let mut data = fs::read(&path).unwrap();
    data.truncate(data.len() - 3);
    fs::write(&path, &data).unwrap();

    let recs = replay_all(&path).unwrap();
    assert_eq!(recs, vec![batch(1, vec![put(b"k1", b"v1")])]);
}

#[test]
fn replay_empty_input() {
    assert!(replay_from_bytes(b"").unwrap().is_empty());
}

#[test]
fn header_only_tail_is_ok() {
    let result = replay_from_bytes(&[0x20, 0, 0, 0]);
    assert!(result.unwrap().is_empty());
}

#[test]
fn open_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let result = WalReader::open(dir.path().join("absent.log"));
    assert!(matches!(result, Err(WalError::Io(_))));
}

// -------------------- Corruption detection --------------------

#[test]
fn flipped_byte_is_corruption() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");
    {
        let mut w = WalWriter::create(&path, true).unwrap();
        w.append(&batch(1, vec![put(b"k", b"v")])).unwrap();
    }

    let mut data = fs::read(&path).unwrap();
    let last = data.len() - 1;
    data[last] ^= 0xFF;
    fs::write(&path, &data).unwrap();

    assert!(matches!(replay_all(&path), Err(WalError::Corrupt)));
}

#[test]
fn record_len_too_small_is_corruption() {
    assert!(matches!(replay_from_bytes(&[3, 0, 0, 0]), Err(WalError::Corrupt)));
}

#[test]
fn unknown_op_code_is_corruption() {
    let mut body = Vec::new();
    body.extend_from_slice(&1u64.to_le_bytes());
    body.extend_from_slice(&1u32.to_le_bytes());
    body.push(7); // no such op
    body.extend_from_slice(&1u32.to_le_bytes());
    body.extend_from_slice(b"k");

    assert!(matches!(replay_from_bytes(&frame(&body)), Err(WalError::Corrupt)));
}

#[test]
fn op_count_beyond_body_is_corruption() {
    let mut body = Vec::new();
    body.extend_from_slice(&1u64.to_le_bytes());
    body.extend_from_slice(&2u32.to_le_bytes()); // claims two ops
    body.push(OP_DEL);
    body.extend_from_slice(&1u32.to_le_bytes());
    body.extend_from_slice(b"k");

    assert!(matches!(replay_from_bytes(&frame(&body)), Err(WalError::Corrupt)));
}

#[test]
fn trailing_garbage_in_body_is_corruption() {
    let mut body = Vec::new();
    body.extend_from_slice(&1u64.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes());
    body.push(0xAB);

    assert!(matches!(replay_from_bytes(&frame(&body)), Err(WalError::Corrupt)));
}

#[test]
fn op_key_accessor() {
    assert_eq!(put(b"a", b"b").key(), b"a");
    assert_eq!(del(b"z").key(), b"z");
}
