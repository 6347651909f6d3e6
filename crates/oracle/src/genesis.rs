//! Initial state import and full state export.
//!
//! A genesis file is the JSON form of [`GenesisState`]. Import goes through
//! the same put paths as runtime creates, so the IMO index is rebuilt from
//! the observations rather than carried in the file.

use anyhow::Context;
use config::ConsolidationParams;
use kvstore::{KvStore, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::dispatch::{check_observation, check_report};
use crate::error::{OracleError, Result};
use crate::types::{ConsolidatedReport, Observation};
use crate::{observations, reports};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisState {
    pub params: ConsolidationParams,
    pub observations: Vec<Observation>,
    pub reports: Vec<ConsolidatedReport>,
}

impl GenesisState {
    /// Rejects duplicate identities and records that a runtime create would
    /// refuse.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for obs in &self.observations {
            check_observation(obs)
                .map_err(|e| OracleError::Genesis(format!("observation {}: {}", obs.id(), e)))?;
            if !seen.insert(obs.id()) {
                return Err(OracleError::Genesis(format!(
                    "duplicate observation {}",
                    obs.id()
                )));
            }
        }

        let mut seen = HashSet::new();
        for report in &self.reports {
            check_report(report)
                .map_err(|e| OracleError::Genesis(format!("report {}: {}", report.id(), e)))?;
            if !seen.insert(report.id()) {
                return Err(OracleError::Genesis(format!(
                    "duplicate report {}",
                    report.id()
                )));
            }
        }
        Ok(())
    }
}

/// Loads `state` into `kv` as one batch. Records whose identity already
/// exists in `kv` are rejected like duplicates within the file.
pub fn init_genesis<S: KvStore + ?Sized>(kv: &mut S, state: &GenesisState) -> Result<()> {
    state.validate()?;

    let mut txn = Transaction::new(kv);
    for obs in &state.observations {
        if observations::get(&txn, &obs.imo, obs.ts, &obs.source)?.is_some() {
            return Err(OracleError::Genesis(format!(
                "observation {} already in store",
                obs.id()
            )));
        }
        observations::put(&mut txn, obs)?;
    }
    for report in &state.reports {
        if reports::get(&txn, &report.imo, report.ts)?.is_some() {
            return Err(OracleError::Genesis(format!(
                "report {} already in store",
                report.id()
            )));
        }
        reports::put(&mut txn, report)?;
    }
    txn.commit()?;

    tracing::info!(
        observations = state.observations.len(),
        reports = state.reports.len(),
        "genesis imported"
    );
    Ok(())
}

/// Snapshot of both stores in key order.
pub fn export_genesis<S: KvStore + ?Sized>(
    kv: &S,
    params: ConsolidationParams,
) -> Result<GenesisState> {
    Ok(GenesisState {
        params,
        observations: observations::all(kv)?,
        reports: reports::all(kv)?,
    })
}

/// Writes `state` as pretty JSON via a fsynced temp file renamed over
/// `path`, so readers never see a partial file.
pub fn write_genesis_file(path: &Path, state: &GenesisState) -> Result<()> {
    let json = serde_json::to_vec_pretty(state).context("failed to serialize genesis")?;

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    {
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(tmp_path)
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        f.write_all(&json).context("failed to write genesis")?;
        f.flush().context("failed to flush genesis")?;
        f.sync_all().context("failed to sync genesis")?;
    }

    fs::rename(tmp_path, path)
        .with_context(|| format!("failed to move genesis into {}", path.display()))?;
    Ok(())
}

pub fn read_genesis_file(path: &Path) -> Result<GenesisState> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| OracleError::Genesis(format!("{}: {}", path.display(), e)))
}
