//! Byte keys for the three record families.
//!
//! ```text
//! Observation  "Vessel/value/"                 imo "/" ts_be8 "/" source "/"
//! IMO index    "VesselIndexImo/value/"         imo "/"
//! Report       "ConsolidatedDataReport/value/" imo "/" ts_be8 "/"
//! ```
//!
//! `ts_be8` is the 8-byte big-endian timestamp, so it may itself contain a
//! `/` byte. Parsing is therefore positional: the IMO runs to the first `/`
//! after the prefix, the next 8 bytes are the timestamp. IMO and source
//! strings must not contain `/` (see [`is_valid_component`]).

use byteorder::{BigEndian, ByteOrder};

use crate::types::{ObservationId, ReportId};

pub const OBSERVATION_PREFIX: &[u8] = b"Vessel/value/";
pub const IMO_INDEX_PREFIX: &[u8] = b"VesselIndexImo/value/";
pub const REPORT_PREFIX: &[u8] = b"ConsolidatedDataReport/value/";

const SEP: u8 = b'/';

/// True when `s` can be embedded in a key and parsed back.
pub fn is_valid_component(s: &str) -> bool {
    !s.is_empty() && !s.as_bytes().contains(&SEP)
}

pub fn observation_key(imo: &str, ts: u64, source: &str) -> Vec<u8> {
    let mut key =
        Vec::with_capacity(OBSERVATION_PREFIX.len() + imo.len() + source.len() + 11);
    key.extend_from_slice(OBSERVATION_PREFIX);
    key.extend_from_slice(imo.as_bytes());
    key.push(SEP);
    push_ts(&mut key, ts);
    key.push(SEP);
    key.extend_from_slice(source.as_bytes());
    key.push(SEP);
    key
}

pub fn imo_index_key(imo: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(IMO_INDEX_PREFIX.len() + imo.len() + 1);
    key.extend_from_slice(IMO_INDEX_PREFIX);
    key.extend_from_slice(imo.as_bytes());
    key.push(SEP);
    key
}

pub fn report_key(imo: &str, ts: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(REPORT_PREFIX.len() + imo.len() + 10);
    key.extend_from_slice(REPORT_PREFIX);
    key.extend_from_slice(imo.as_bytes());
    key.push(SEP);
    push_ts(&mut key, ts);
    key.push(SEP);
    key
}

fn push_ts(key: &mut Vec<u8>, ts: u64) {
    let mut buf = [0u8; 8];
    BigEndian::write_u64(&mut buf, ts);
    key.extend_from_slice(&buf);
}

/// Splits `imo "/" ts_be8 "/"` off the front of `rest`.
fn split_imo_ts(rest: &[u8]) -> Option<(String, u64, &[u8])> {
    let slash = rest.iter().position(|b| *b == SEP)?;
    let imo = std::str::from_utf8(&rest[..slash]).ok()?;
    let after = &rest[slash + 1..];
    if after.len() < 9 || after[8] != SEP {
        return None;
    }
    let ts = BigEndian::read_u64(&after[..8]);
    Some((imo.to_string(), ts, &after[9..]))
}

pub fn parse_observation_key(key: &[u8]) -> Option<ObservationId> {
    let rest = key.strip_prefix(OBSERVATION_PREFIX)?;
    let (imo, ts, tail) = split_imo_ts(rest)?;
    let source = tail.strip_suffix(&[SEP])?;
    let source = std::str::from_utf8(source).ok()?;
    if !is_valid_component(&imo) || !is_valid_component(source) {
        return None;
    }
    Some(ObservationId {
        imo,
        ts,
        source: source.to_string(),
    })
}

pub fn parse_report_key(key: &[u8]) -> Option<ReportId> {
    let rest = key.strip_prefix(REPORT_PREFIX)?;
    let (imo, ts, tail) = split_imo_ts(rest)?;
    if !tail.is_empty() || !is_valid_component(&imo) {
        return None;
    }
    Some(ReportId { imo, ts })
}
