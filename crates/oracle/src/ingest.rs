//! Ingestion fan-out.
//!
//! One record from the vessel tracking API is turned into several emulated
//! data-source observations. Source 0 repeats the reference unchanged,
//! source 1 reports an ETA hours too early, source 2 reports a different
//! departure port, and every source from 2 on carries small ETA and
//! position-time jitter.

use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::address::derive_address;
use crate::types::Observation;

pub const DATA_SOURCE_COUNT: usize = 8;
pub const OUTLIER_DEPARTURE_PORT: &str = "DEBWE";
pub const OUTLIER_DEPARTURE_PORT_NAME: &str = "BRAUNSCHWEIG";

const ETA_JITTER_OFFSET: i64 = 2 * 60;
const ETA_JITTER_WIDTH: i64 = 4 * 60;
const ETA_OUTLIER_OFFSET: i64 = 6 * 60 * 60;
const ETA_OUTLIER_WIDTH: i64 = 4 * 60 * 60;
const POSITION_JITTER_OFFSET: i64 = 30 * 60;
const POSITION_JITTER_WIDTH: i64 = 60 * 60;

/// Response of the tracking API's vessel endpoint for MAERSK CHENNAI.
pub const SIMULATION_SAMPLE: &str = r#"{
  "data": {
    "uuid": "b8625b67-7142-cfd1-7b85-595cebfe4191",
    "name": "MAERSK CHENNAI",
    "mmsi": "566093000",
    "imo": "9525338",
    "eni": null,
    "country_iso": "SG",
    "type": "Cargo - Hazard A (Major)",
    "type_specific": "Container Ship",
    "lat": 0.60566,
    "lon": 55.61919,
    "speed": 15.8,
    "course": 219,
    "heading": 208,
    "current_draught": 14,
    "navigation_status": null,
    "destination": "INNSA>>CGPNR",
    "dest_port": "POINTE NOIRE",
    "dest_port_unlocode": "CGPNR",
    "dep_port": "NHAVA SHEVA",
    "dep_port_unlocode": "INNSA",
    "last_position_epoch": 1726625760,
    "last_position_UTC": "2024-09-18T02:16:00Z",
    "atd_epoch": 1726280520,
    "atd_UTC": "2024-09-14T02:22:00Z",
    "eta_epoch": 1727690400,
    "eta_UTC": "2024-09-30T10:00:00Z",
    "timezone_offset_sec": 14400,
    "timezone": "+04"
  },
  "meta": {
    "duration": 0.004499582,
    "endpoint": "/api/v0/vessel_pro",
    "success": true
  }
}"#;

/// The tracking API fields the oracle consumes. Positions are decimal
/// degrees, speed is decimal knots, epochs are seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub imo: String,
    pub name: String,
    pub mmsi: String,
    pub lat: f64,
    pub lon: f64,
    pub speed: f64,
    pub course: i32,
    pub heading: i32,
    pub last_position_epoch: i64,
    pub atd_epoch: i64,
    pub eta_epoch: i64,
    #[serde(default)]
    pub dep_port: String,
    pub dep_port_unlocode: String,
    pub dest_port_unlocode: String,
}

#[derive(Deserialize)]
struct Envelope {
    data: TrackingRecord,
}

/// Parses an API response body (`{"data": {...}, ...}`).
pub fn parse_payload(json: &str) -> Result<TrackingRecord> {
    let envelope: Envelope =
        serde_json::from_str(json).context("malformed tracking API payload")?;
    Ok(envelope.data)
}

pub fn simulation_record() -> Result<TrackingRecord> {
    parse_payload(SIMULATION_SAMPLE)
}

/// Local account name of emulated data source `index`.
pub fn source_account(index: usize) -> String {
    format!("ds{}", index)
}

/// Produces `count` emulated data-source records from `reference`.
pub fn fan_out<R: Rng + ?Sized>(
    reference: &TrackingRecord,
    count: usize,
    rng: &mut R,
) -> Vec<TrackingRecord> {
    (0..count)
        .map(|index| {
            let mut record = reference.clone();
            if index > 1 {
                record.eta_epoch += rng.gen_range(0..ETA_JITTER_WIDTH) - ETA_JITTER_OFFSET;
                record.last_position_epoch +=
                    rng.gen_range(0..POSITION_JITTER_WIDTH) - POSITION_JITTER_OFFSET;
            }
            match index {
                1 => {
                    record.eta_epoch -= ETA_OUTLIER_OFFSET + rng.gen_range(0..ETA_OUTLIER_WIDTH);
                }
                2 => {
                    record.dep_port_unlocode = OUTLIER_DEPARTURE_PORT.to_string();
                    record.dep_port = OUTLIER_DEPARTURE_PORT_NAME.to_string();
                }
                _ => {}
            }
            record
        })
        .collect()
}

/// Converts units to the stored fixed-point form. Fractions beyond the
/// fixed-point scale are truncated; negative epochs become 0.
pub fn to_observation(record: &TrackingRecord, source_address: &str) -> Observation {
    Observation {
        creator: source_address.to_string(),
        imo: record.imo.clone(),
        ts: epoch(record.last_position_epoch),
        source: source_address.to_string(),
        lat: (record.lat * 100_000.0) as i32,
        lon: (record.lon * 100_000.0) as i32,
        speed: (record.speed * 10.0) as i32,
        course: record.course,
        heading: record.heading,
        adt: epoch(record.atd_epoch),
        eta: epoch(record.eta_epoch),
        name: record.name.clone(),
        destport: record.dest_port_unlocode.clone(),
        depport: record.dep_port_unlocode.clone(),
        mmsi: record.mmsi.clone(),
    }
}

fn epoch(secs: i64) -> u64 {
    u64::try_from(secs).unwrap_or(0)
}

/// Fans `reference` out and converts each record into an observation
/// created by and attributed to its data source's account.
pub fn emulate<R: Rng + ?Sized>(
    reference: &TrackingRecord,
    count: usize,
    rng: &mut R,
) -> Vec<Observation> {
    fan_out(reference, count, rng)
        .iter()
        .enumerate()
        .map(|(index, record)| to_observation(record, &derive_address(&source_account(index))))
        .collect()
}
