//! The command boundary.
//!
//! Every [`Command`] runs inside its own [`Transaction`]: the creator
//! address is checked, the command's writes go to the overlay, and only a
//! successful command commits them. A failed command leaves the store
//! exactly as it was.
//!
//! Authorization: create is open; update and delete are allowed only for
//! the address that created the record.

use config::{ConsolidationParams, ParamsSource, DEFAULT_TRANSMIT_TIMEOUT_SECS};
use kvstore::{KvStore, Transaction};

use crate::address::validate_address;
use crate::clock::{Clock, SystemClock};
use crate::error::{OracleError, Result};
use crate::keys::is_valid_component;
use crate::sink::{PacketSink, ReportPacket, TimeoutHeight};
use crate::types::{ConsolidatedReport, Observation, ObservationId, ReportId};
use crate::{consolidate, observations, reports};

const NANOS_PER_SEC: u64 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreateObservation(Observation),
    UpdateObservation(Observation),
    DeleteObservation {
        creator: String,
        imo: String,
        ts: u64,
        source: String,
    },
    Consolidate {
        creator: String,
        imo: String,
    },
    CreateReport(ConsolidatedReport),
    UpdateReport(ConsolidatedReport),
    DeleteReport {
        creator: String,
        imo: String,
        ts: u64,
    },
    TransmitReport {
        creator: String,
        imo: String,
        ts: u64,
        channel: String,
    },
}

impl Command {
    pub fn creator(&self) -> &str {
        match self {
            Command::CreateObservation(o) | Command::UpdateObservation(o) => &o.creator,
            Command::CreateReport(r) | Command::UpdateReport(r) => &r.creator,
            Command::DeleteObservation { creator, .. }
            | Command::Consolidate { creator, .. }
            | Command::DeleteReport { creator, .. }
            | Command::TransmitReport { creator, .. } => creator,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateObservation(_) => "create-observation",
            Command::UpdateObservation(_) => "update-observation",
            Command::DeleteObservation { .. } => "delete-observation",
            Command::Consolidate { .. } => "consolidate",
            Command::CreateReport(_) => "create-report",
            Command::UpdateReport(_) => "update-report",
            Command::DeleteReport { .. } => "delete-report",
            Command::TransmitReport { .. } => "transmit-report",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Stored,
    Deleted,
    Consolidated(ConsolidatedReport),
    Transmitted { sequence: u64 },
}

pub struct Dispatcher<S: KvStore, K: PacketSink> {
    store: S,
    sink: K,
    params: Box<dyn ParamsSource>,
    clock: Box<dyn Clock>,
    transmit_timeout_secs: u64,
}

impl<S: KvStore, K: PacketSink> Dispatcher<S, K> {
    /// Dispatcher with default parameters and the system clock.
    pub fn new(store: S, sink: K) -> Self {
        Self {
            store,
            sink,
            params: Box::new(ConsolidationParams::default()),
            clock: Box::new(SystemClock),
            transmit_timeout_secs: DEFAULT_TRANSMIT_TIMEOUT_SECS,
        }
    }

    pub fn with_params(mut self, params: impl ParamsSource + 'static) -> Self {
        self.params = Box::new(params);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_transmit_timeout(mut self, secs: u64) -> Self {
        self.transmit_timeout_secs = secs;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    pub fn params(&self) -> ConsolidationParams {
        self.params.params()
    }

    pub fn into_parts(self) -> (S, K) {
        (self.store, self.sink)
    }

    /// Runs `cmd` to completion. On error nothing it wrote is kept.
    pub fn execute(&mut self, cmd: Command) -> Result<Outcome> {
        let name = cmd.name();
        validate_address(cmd.creator())?;

        let mut txn = Transaction::new(&mut self.store);
        let result = match cmd {
            Command::CreateObservation(obs) => create_observation(&mut txn, &obs),
            Command::UpdateObservation(obs) => update_observation(&mut txn, &obs),
            Command::DeleteObservation {
                creator,
                imo,
                ts,
                source,
            } => delete_observation(
                &mut txn,
                &creator,
                &ObservationId { imo, ts, source },
            ),
            Command::Consolidate { creator, imo } => {
                check_component("imo", &imo).and_then(|_| {
                    consolidate::consolidate(
                        &mut txn,
                        self.params.as_ref(),
                        self.clock.as_ref(),
                        &creator,
                        &imo,
                    )
                    .map(Outcome::Consolidated)
                })
            }
            Command::CreateReport(report) => create_report(&mut txn, &report),
            Command::UpdateReport(report) => update_report(&mut txn, &report),
            Command::DeleteReport { creator, imo, ts } => {
                delete_report(&mut txn, &creator, &ReportId { imo, ts })
            }
            Command::TransmitReport {
                imo, ts, channel, ..
            } => {
                let timeout_timestamp = self
                    .clock
                    .now_secs()
                    .saturating_add(self.transmit_timeout_secs)
                    .saturating_mul(NANOS_PER_SEC);
                transmit_report(
                    &txn,
                    &mut self.sink,
                    &ReportId { imo, ts },
                    &channel,
                    timeout_timestamp,
                )
            }
        };

        match result {
            Ok(outcome) => {
                txn.commit()?;
                tracing::info!(command = name, "command executed");
                Ok(outcome)
            }
            Err(e) => {
                txn.abort();
                tracing::info!(command = name, kind = e.kind().as_str(), error = %e, "command rejected");
                Err(e)
            }
        }
    }
}

fn check_component(field: &str, value: &str) -> Result<()> {
    if is_valid_component(value) {
        Ok(())
    } else {
        Err(OracleError::InvalidRequest(format!(
            "{} {:?} must be non-empty and must not contain '/'",
            field, value
        )))
    }
}

/// Checks everything about `obs` a create would check, except existence.
pub(crate) fn check_observation(obs: &Observation) -> Result<()> {
    validate_address(&obs.creator)?;
    check_component("imo", &obs.imo)?;
    check_component("source", &obs.source)
}

/// Checks the record invariants of `report` and its creator address.
pub(crate) fn check_report(report: &ConsolidatedReport) -> Result<()> {
    validate_address(&report.creator)?;
    check_component("imo", &report.imo)?;
    let id = report.id();
    if report.total_samples == 0 {
        return Err(OracleError::InvalidRequest(format!(
            "report {}: total_samples must be at least 1",
            id
        )));
    }
    if report.eta_outliers > report.total_samples {
        return Err(OracleError::InvalidRequest(format!(
            "report {}: eta_outliers {} exceeds total_samples {}",
            id, report.eta_outliers, report.total_samples
        )));
    }
    if report.depport_score > 100 {
        return Err(OracleError::InvalidRequest(format!(
            "report {}: depport_score {} exceeds 100",
            id, report.depport_score
        )));
    }
    Ok(())
}

fn create_observation<S: KvStore + ?Sized>(kv: &mut S, obs: &Observation) -> Result<Outcome> {
    check_observation(obs)?;
    if observations::get(kv, &obs.imo, obs.ts, &obs.source)?.is_some() {
        return Err(OracleError::Duplicate {
            what: "observation",
            id: obs.id().to_string(),
        });
    }
    observations::put(kv, obs)?;
    Ok(Outcome::Stored)
}

fn update_observation<S: KvStore + ?Sized>(kv: &mut S, obs: &Observation) -> Result<Outcome> {
    check_observation(obs)?;
    let id = obs.id();
    let existing = observations::get(kv, &id.imo, id.ts, &id.source)?.ok_or_else(|| {
        OracleError::NotFound {
            what: "observation",
            id: id.to_string(),
        }
    })?;
    if existing.creator != obs.creator {
        return Err(OracleError::Unauthorized {
            what: "observation",
            id: id.to_string(),
            principal: obs.creator.clone(),
        });
    }
    observations::put(kv, obs)?;
    Ok(Outcome::Stored)
}

fn delete_observation<S: KvStore + ?Sized>(
    kv: &mut S,
    creator: &str,
    id: &ObservationId,
) -> Result<Outcome> {
    check_component("imo", &id.imo)?;
    check_component("source", &id.source)?;
    let existing = observations::get(kv, &id.imo, id.ts, &id.source)?.ok_or_else(|| {
        OracleError::NotFound {
            what: "observation",
            id: id.to_string(),
        }
    })?;
    if existing.creator != creator {
        return Err(OracleError::Unauthorized {
            what: "observation",
            id: id.to_string(),
            principal: creator.to_string(),
        });
    }
    observations::remove(kv, &id.imo, id.ts, &id.source)?;
    Ok(Outcome::Deleted)
}

fn create_report<S: KvStore + ?Sized>(kv: &mut S, report: &ConsolidatedReport) -> Result<Outcome> {
    check_report(report)?;
    if reports::get(kv, &report.imo, report.ts)?.is_some() {
        return Err(OracleError::Duplicate {
            what: "report",
            id: report.id().to_string(),
        });
    }
    reports::put(kv, report)?;
    Ok(Outcome::Stored)
}

fn update_report<S: KvStore + ?Sized>(kv: &mut S, report: &ConsolidatedReport) -> Result<Outcome> {
    check_report(report)?;
    let id = report.id();
    let existing = reports::get(kv, &id.imo, id.ts)?.ok_or_else(|| OracleError::NotFound {
        what: "report",
        id: id.to_string(),
    })?;
    if existing.creator != report.creator {
        return Err(OracleError::Unauthorized {
            what: "report",
            id: id.to_string(),
            principal: report.creator.clone(),
        });
    }
    reports::put(kv, report)?;
    Ok(Outcome::Stored)
}

fn delete_report<S: KvStore + ?Sized>(kv: &mut S, creator: &str, id: &ReportId) -> Result<Outcome> {
    check_component("imo", &id.imo)?;
    let existing = reports::get(kv, &id.imo, id.ts)?.ok_or_else(|| OracleError::NotFound {
        what: "report",
        id: id.to_string(),
    })?;
    if existing.creator != creator {
        return Err(OracleError::Unauthorized {
            what: "report",
            id: id.to_string(),
            principal: creator.to_string(),
        });
    }
    reports::remove(kv, &id.imo, id.ts)?;
    Ok(Outcome::Deleted)
}

fn transmit_report<S: KvStore + ?Sized, K: PacketSink + ?Sized>(
    kv: &S,
    sink: &mut K,
    id: &ReportId,
    channel: &str,
    timeout_timestamp: u64,
) -> Result<Outcome> {
    check_component("imo", &id.imo)?;
    if channel.is_empty() {
        return Err(OracleError::InvalidRequest("channel must not be empty".into()));
    }
    let report = reports::get(kv, &id.imo, id.ts)?.ok_or_else(|| OracleError::NotFound {
        what: "report",
        id: id.to_string(),
    })?;
    let packet = ReportPacket {
        consolidated_data_report: report,
    };
    let sequence = sink
        .transmit(&packet, channel, TimeoutHeight::default(), timeout_timestamp)
        .map_err(|e| OracleError::DispatchFailed {
            id: id.to_string(),
            channel: channel.to_string(),
            reason: format!("{:#}", e),
        })?;
    tracing::info!(report = %id, channel, sequence, "report transmitted");
    Ok(Outcome::Transmitted { sequence })
}
