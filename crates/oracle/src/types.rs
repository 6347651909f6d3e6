//! Records kept in the store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One raw report from one data source for one vessel at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub creator: String,
    pub imo: String,
    pub ts: u64,
    pub source: String,
    /// Latitude, 1e-5 degrees.
    pub lat: i32,
    /// Longitude, 1e-5 degrees.
    pub lon: i32,
    /// Speed over ground, 0.1 knots.
    pub speed: i32,
    pub course: i32,
    pub heading: i32,
    /// Actual departure time, epoch seconds.
    pub adt: u64,
    /// Estimated arrival time, epoch seconds.
    pub eta: u64,
    pub name: String,
    pub destport: String,
    pub depport: String,
    pub mmsi: String,
}

impl Observation {
    pub fn id(&self) -> ObservationId {
        ObservationId {
            imo: self.imo.clone(),
            ts: self.ts,
            source: self.source.clone(),
        }
    }
}

/// Identity of an [`Observation`]; also the element type of the IMO index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObservationId {
    pub imo: String,
    pub ts: u64,
    pub source: String,
}

impl fmt::Display for ObservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}/{}", self.imo, self.ts, self.source)
    }
}

/// Observation identities currently stored for one IMO, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImoIndex {
    pub entries: Vec<ObservationId>,
}

/// The result of one consolidation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedReport {
    pub creator: String,
    pub imo: String,
    /// Wall-clock second at which the consolidation ran.
    pub ts: u64,
    pub total_samples: u32,
    pub eta_outliers: u32,
    pub eta_mean_cleaned: u64,
    pub eta_std_cleaned: u64,
    pub eta_mean_all: u64,
    pub eta_std_all: u64,
    pub depport: String,
    /// Share of samples agreeing on `depport`, 0-100.
    pub depport_score: u32,
}

impl ConsolidatedReport {
    pub fn id(&self) -> ReportId {
        ReportId {
            imo: self.imo.clone(),
            ts: self.ts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReportId {
    pub imo: String,
    pub ts: u64,
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.imo, self.ts)
    }
}
