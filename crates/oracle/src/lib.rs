//! # oracle - Vessel Data Consolidation
//!
//! Keeps per-vessel observations from several data sources and condenses
//! the recent ones into a single report that tolerates outliers.
//!
//! ## Architecture
//!
//! ```text
//! Command ─► Dispatcher ─► Transaction over a KvStore
//!              │
//!              ├─ create/update/delete ─► observations ─► index
//!              │
//!              ├─ consolidate ─► window ─► consolidate ─► reports
//!              │
//!              └─ transmit ─► reports ─► PacketSink
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module           | Purpose                                             |
//! |------------------|-----------------------------------------------------|
//! | [`types`]        | Observation, ConsolidatedReport, identities         |
//! | [`keys`]         | byte-exact key layouts                              |
//! | [`codec`]        | versioned binary record encoding                    |
//! | [`observations`] | observation CRUD, keeps the index in step           |
//! | [`index`]        | per-IMO list of observation identities              |
//! | [`window`]       | newest-N-within-T selection                         |
//! | [`consolidate`]  | plurality vote and median-anchored ETA filter       |
//! | [`reports`]      | consolidated report CRUD                            |
//! | [`dispatch`]     | commands, address check, authorization              |
//! | [`sink`]         | outbound packet seam and in-process channels        |
//! | [`genesis`]      | state import and export                             |
//! | [`ingest`]       | tracking API record fan-out                         |

pub mod address;
pub mod clock;
pub mod codec;
pub mod consolidate;
pub mod dispatch;
pub mod error;
pub mod genesis;
pub mod index;
pub mod ingest;
pub mod keys;
pub mod observations;
pub mod reports;
pub mod sink;
pub mod types;
pub mod window;

pub use address::{derive_address, validate_address};
pub use clock::{Clock, FixedClock, SystemClock};
pub use dispatch::{Command, Dispatcher, Outcome};
pub use error::{ErrorKind, OracleError, Result};
pub use genesis::GenesisState;
pub use sink::{ChannelSink, PacketSink, ReportPacket, TimeoutHeight};
pub use types::{ConsolidatedReport, ImoIndex, Observation, ObservationId, ReportId};

#[cfg(test)]
mod tests;
