//! # WAL: Write-Ahead Log
//!
//! Durability layer of the oracle's key-value store.
//!
//! Each committed transaction is serialized into **one** binary record and
//! appended to the WAL before any of its writes reach the memtable. A batch
//! is therefore all-or-nothing on replay: a crash in the middle of an append
//! leaves a truncated tail record, which the reader treats as a clean end of
//! log, so none of that batch's operations are applied.
//!
//! ## Binary Record Format
//!
//! ```text
//! [record_len: u32 LE][crc32: u32 LE][body ...]
//! ```
//!
//! Body: `[seq: u64][op_count: u32][op ...]`
//!
//! Op (Put): `[op=0: u8][key_len: u32][key][val_len: u32][value]`
//! Op (Del): `[op=1: u8][key_len: u32][key]`
//!
//! `record_len` includes the 4-byte CRC but **not** itself.
//!
//! ## Example
//!
//! ```rust,no_run
//! use wal::{WalBatch, WalOp, WalReader, WalWriter};
//!
//! let mut w = WalWriter::create("wal.log", true).unwrap();
//! w.append(&WalBatch {
//!     seq: 1,
//!     ops: vec![WalOp::Put { key: b"hello".to_vec(), value: b"world".to_vec() }],
//! }).unwrap();
//! drop(w);
//!
//! let mut r = WalReader::open("wal.log").unwrap();
//! r.replay(|batch| println!("{:?}", batch)).unwrap();
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use thiserror::Error;

/// Safety cap on a single record; anything larger is treated as corruption.
const MAX_RECORD_SIZE: u32 = 64 * 1024 * 1024;

const OP_PUT: u8 = 0;
const OP_DEL: u8 = 1;

/// One mutation inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalOp {
    /// A key-value insertion.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// A key deletion (tombstone).
    Del { key: Vec<u8> },
}

impl WalOp {
    pub fn key(&self) -> &[u8] {
        match self {
            WalOp::Put { key, .. } | WalOp::Del { key } => key,
        }
    }
}

/// The writes of one committed transaction.
///
/// `seq` is the sequence number the store assigned to the batch; every op in
/// the batch is applied to the memtable under that same number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalBatch {
    pub seq: u64,
    pub ops: Vec<WalOp>,
}

/// Errors that can occur during WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A record failed CRC validation or contained an unknown op code.
    #[error("corrupt record")]
    Corrupt,
}

/// Append-only WAL writer.
///
/// Records are serialized into an in-memory buffer, CRC-checksummed, and then
/// written to the underlying file in a single `write_all` call. When `sync` is
/// `true`, every append is followed by `sync_all()`.
pub struct WalWriter {
    file: File,
    sync: bool,
    /// Reusable scratch buffer to avoid allocation on every append.
    buf: Vec<u8>,
}

impl WalWriter {
    /// Opens (or creates) a WAL file in append mode.
    ///
    /// # Arguments
    ///
    /// * `path` - file system path for the WAL (created if it does not exist).
    /// * `sync` - if true, every `append` call is followed by `fsync`.
    pub fn create<P: AsRef<Path>>(path: P, sync: bool) -> Result<Self, WalError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;
        Ok(Self {
            file,
            sync,
            buf: Vec::with_capacity(256),
        })
    }

    /// Serializes `batch` and appends it to the WAL file as a single frame.
    pub fn append(&mut self, batch: &WalBatch) -> Result<(), WalError> {
        self.buf.clear();

        // frame header (record_len + crc) is filled in once the body is known
        self.buf.extend_from_slice(&[0u8; 8]);

        let op_count = u32::try_from(batch.ops.len()).map_err(|_| too_large("op count"))?;
        self.buf.write_u64::<LittleEndian>(batch.seq)?;
        self.buf.write_u32::<LittleEndian>(op_count)?;
        for op in &batch.ops {
            match op {
                WalOp::Put { key, value } => {
                    self.buf.write_u8(OP_PUT)?;
                    write_bytes(&mut self.buf, key)?;
                    write_bytes(&mut self.buf, value)?;
                }
                WalOp::Del { key } => {
                    self.buf.write_u8(OP_DEL)?;
                    write_bytes(&mut self.buf, key)?;
                }
            }
        }

        let body = &self.buf[8..];
        let mut hasher = Crc32::new();
        hasher.update(body);
        let crc = hasher.finalize();

        let record_len = (body.len() as u64) + 4;
        if record_len > u64::from(MAX_RECORD_SIZE) {
            return Err(too_large("record"));
        }

        self.buf[0..4].copy_from_slice(&(record_len as u32).to_le_bytes());
        self.buf[4..8].copy_from_slice(&crc.to_le_bytes());

        self.file.write_all(&self.buf)?;
        self.file.flush()?;

        if self.sync {
            self.file.sync_all()?;
        }

        Ok(())
    }

    /// Forces all buffered data to be written to disk via `sync_all()`.
    pub fn sync_to_disk(&mut self) -> Result<(), WalError> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<(), WalError> {
    let len = u32::try_from(bytes.len()).map_err(|_| too_large("field"))?;
    buf.write_u32::<LittleEndian>(len)?;
    buf.extend_from_slice(bytes);
    Ok(())
}

fn too_large(what: &str) -> WalError {
    WalError::Io(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("WAL {what} too large"),
    ))
}

/// Sequential WAL reader that yields valid batches.
///
/// Generic over any `Read` implementor so tests can replay from a
/// `Cursor<Vec<u8>>`. A truncated tail record is treated as a clean EOF.
pub struct WalReader<R: Read> {
    rdr: BufReader<R>,
}

impl WalReader<File> {
    /// Opens an existing WAL file for sequential replay.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<WalReader<File>, WalError> {
        let f = File::open(path)?;
        Ok(WalReader {
            rdr: BufReader::new(f),
        })
    }
}

impl<R: Read> WalReader<R> {
    pub fn from_reader(reader: R) -> Self {
        WalReader {
            rdr: BufReader::new(reader),
        }
    }

    /// Replays every valid batch in the WAL, calling `apply` for each one.
    ///
    /// # Termination
    ///
    /// - **Clean EOF** -> `Ok(())`.
    /// - **Truncated tail** -> `Ok(())` after yielding all complete batches.
    /// - **CRC mismatch**, **unknown op code** or **malformed body** ->
    ///   `Err(WalError::Corrupt)`.
    /// - **I/O error** -> `Err(WalError::Io(...))`.
    pub fn replay<F>(&mut self, mut apply: F) -> Result<(), WalError>
    where
        F: FnMut(WalBatch),
    {
        let mut body = Vec::with_capacity(256);

        loop {
            let record_len = match self.rdr.read_u32::<LittleEndian>() {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(WalError::Io(e)),
            };

            if record_len <= 4 || record_len > MAX_RECORD_SIZE {
                return Err(WalError::Corrupt);
            }

            let crc = match self.rdr.read_u32::<LittleEndian>() {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(WalError::Io(e)),
            };

            let body_len = (record_len - 4) as usize;
            body.clear();
            body.resize(body_len, 0);
            match self.rdr.read_exact(&mut body) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(WalError::Io(e)),
            }

            let mut hasher = Crc32::new();
            hasher.update(&body);
            if hasher.finalize() != crc {
                return Err(WalError::Corrupt);
            }

            apply(decode_body(&body)?);
        }
    }
}

/// Parses a CRC-verified body. A checksum match with a malformed body still
/// counts as corruption, never as a truncated tail.
fn decode_body(body: &[u8]) -> Result<WalBatch, WalError> {
    let mut br = body;
    let seq = br.read_u64::<LittleEndian>().map_err(|_| WalError::Corrupt)?;
    let op_count = br.read_u32::<LittleEndian>().map_err(|_| WalError::Corrupt)? as usize;
    if op_count > body.len() {
        return Err(WalError::Corrupt);
    }

    let mut ops = Vec::with_capacity(op_count);
    for _ in 0..op_count {
        let op = br.read_u8().map_err(|_| WalError::Corrupt)?;
        let key = read_bytes(&mut br)?;
        match op {
            OP_PUT => {
                let value = read_bytes(&mut br)?;
                ops.push(WalOp::Put { key, value });
            }
            OP_DEL => ops.push(WalOp::Del { key }),
            _ => return Err(WalError::Corrupt),
        }
    }

    if !br.is_empty() {
        return Err(WalError::Corrupt);
    }
    Ok(WalBatch { seq, ops })
}

fn read_bytes(br: &mut &[u8]) -> Result<Vec<u8>, WalError> {
    let len = br.read_u32::<LittleEndian>().map_err(|_| WalError::Corrupt)? as usize;
    if len > br.len() {
        return Err(WalError::Corrupt);
    }
    let (head, tail) = br.split_at(len);
    let out = head.to_vec();
    *br = tail;
    Ok(out)
}

#[cfg(test)]
mod tests;
