//! Binary encoding of stored records.
//!
//! Every value starts with a one-byte format version followed by the fields
//! in declaration order, little-endian:
//!
//! - strings: `[len: u32][utf8 bytes]`
//! - fixed-point and angle fields: `i32`
//! - epochs and report statistics: `u64`
//! - counts and scores: `u32`
//!
//! An [`ImoIndex`] is `[count: u32]` followed by `count` triples of
//! `[imo: string][ts: u64][source: string]`.
//!
//! Decoding rejects an unknown version, truncated input, invalid UTF-8 and
//! any bytes left over after the last field.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Write};
use thiserror::Error;

use crate::types::{ConsolidatedReport, ImoIndex, Observation, ObservationId};

pub const FORMAT_VERSION: u8 = 1;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unsupported record version {0}")]
    UnsupportedVersion(u8),
    #[error("record truncated")]
    Truncated,
    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),
    #[error("string field is not valid utf-8")]
    InvalidUtf8,
    #[error("{0} too large to encode")]
    TooLarge(&'static str),
    #[error("io: {0}")]
    Io(io::Error),
}

impl From<io::Error> for CodecError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::Truncated
        } else {
            CodecError::Io(e)
        }
    }
}

/// A record with a stable binary layout.
pub trait Record: Sized {
    fn encode_fields<W: Write>(&self, w: &mut W) -> Result<(), CodecError>;
    fn decode_fields(r: &mut &[u8]) -> Result<Self, CodecError>;
}

pub fn encode<T: Record>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::with_capacity(128);
    buf.write_u8(FORMAT_VERSION)?;
    value.encode_fields(&mut buf)?;
    Ok(buf)
}

pub fn decode<T: Record>(bytes: &[u8]) -> Result<T, CodecError> {
    let mut r = bytes;
    let version = r.read_u8()?;
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let value = T::decode_fields(&mut r)?;
    if !r.is_empty() {
        return Err(CodecError::TrailingBytes(r.len()));
    }
    Ok(value)
}

fn write_str<W: Write>(w: &mut W, s: &str) -> Result<(), CodecError> {
    let len = u32::try_from(s.len()).map_err(|_| CodecError::TooLarge("string"))?;
    w.write_u32::<LittleEndian>(len)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn read_str(r: &mut &[u8]) -> Result<String, CodecError> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    if r.len() < len {
        return Err(CodecError::Truncated);
    }
    let (head, tail) = r.split_at(len);
    let s = std::str::from_utf8(head).map_err(|_| CodecError::InvalidUtf8)?;
    *r = tail;
    Ok(s.to_string())
}

impl Record for Observation {
    fn encode_fields<W: Write>(&self, w: &mut W) -> Result<(), CodecError> {
        write_str(w, &self.creator)?;
        write_str(w, &self.imo)?;
        w.write_u64::<LittleEndian>(self.ts)?;
        write_str(w, &self.source)?;
        w.write_i32::<LittleEndian>(self.lat)?;
        w.write_i32::<LittleEndian>(self.lon)?;
        w.write_i32::<LittleEndian>(self.speed)?;
        w.write_i32::<LittleEndian>(self.course)?;
        w.write_i32::<LittleEndian>(self.heading)?;
        w.write_u64::<LittleEndian>(self.adt)?;
        w.write_u64::<LittleEndian>(self.eta)?;
        write_str(w, &self.name)?;
        write_str(w, &self.destport)?;
        write_str(w, &self.depport)?;
        write_str(w, &self.mmsi)?;
        Ok(())
    }

    fn decode_fields(r: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Observation {
            creator: read_str(r)?,
            imo: read_str(r)?,
            ts: r.read_u64::<LittleEndian>()?,
            source: read_str(r)?,
            lat: r.read_i32::<LittleEndian>()?,
            lon: r.read_i32::<LittleEndian>()?,
            speed: r.read_i32::<LittleEndian>()?,
            course: r.read_i32::<LittleEndian>()?,
            heading: r.read_i32::<LittleEndian>()?,
            adt: r.read_u64::<LittleEndian>()?,
            eta: r.read_u64::<LittleEndian>()?,
            name: read_str(r)?,
            destport: read_str(r)?,
            depport: read_str(r)?,
            mmsi: read_str(r)?,
        })
    }
}

impl Record for ConsolidatedReport {
    fn encode_fields<W: Write>(&self, w: &mut W) -> Result<(), CodecError> {
        write_str(w, &self.creator)?;
        write_str(w, &self.imo)?;
        w.write_u64::<LittleEndian>(self.ts)?;
        w.write_u32::<LittleEndian>(self.total_samples)?;
        w.write_u32::<LittleEndian>(self.eta_outliers)?;
        w.write_u64::<LittleEndian>(self.eta_mean_cleaned)?;
        w.write_u64::<LittleEndian>(self.eta_std_cleaned)?;
        w.write_u64::<LittleEndian>(self.eta_mean_all)?;
        w.write_u64::<LittleEndian>(self.eta_std_all)?;
        write_str(w, &self.depport)?;
        w.write_u32::<LittleEndian>(self.depport_score)?;
        Ok(())
    }

    fn decode_fields(r: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(ConsolidatedReport {
            creator: read_str(r)?,
            imo: read_str(r)?,
            ts: r.read_u64::<LittleEndian>()?,
            total_samples: r.read_u32::<LittleEndian>()?,
            eta_outliers: r.read_u32::<LittleEndian>()?,
            eta_mean_cleaned: r.read_u64::<LittleEndian>()?,
            eta_std_cleaned: r.read_u64::<LittleEndian>()?,
            eta_mean_all: r.read_u64::<LittleEndian>()?,
            eta_std_all: r.read_u64::<LittleEndian>()?,
            depport: read_str(r)?,
            depport_score: r.read_u32::<LittleEndian>()?,
        })
    }
}

impl Record for ImoIndex {
    fn encode_fields<W: Write>(&self, w: &mut W) -> Result<(), CodecError> {
        let count =
            u32::try_from(self.entries.len()).map_err(|_| CodecError::TooLarge("index"))?;
        w.write_u32::<LittleEndian>(count)?;
        for e in &self.entries {
            write_str(w, &e.imo)?;
            w.write_u64::<LittleEndian>(e.ts)?;
            write_str(w, &e.source)?;
        }
        Ok(())
    }

    fn decode_fields(r: &mut &[u8]) -> Result<Self, CodecError> {
        let count = r.read_u32::<LittleEndian>()? as usize;
        // each triple needs at least 16 bytes; bound the allocation by input size
        let mut entries = Vec::with_capacity(count.min(r.len() / 16));
        for _ in 0..count {
            entries.push(ObservationId {
                imo: read_str(r)?,
                ts: r.read_u64::<LittleEndian>()?,
                source: read_str(r)?,
            });
        }
        Ok(ImoIndex { entries })
    }
}
