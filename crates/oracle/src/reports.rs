//! Consolidated report records.

use kvstore::KvStore;

use crate::codec::{decode, encode};
use crate::error::{OracleError, Result};
use crate::keys::{parse_report_key, report_key, REPORT_PREFIX};
use crate::types::ConsolidatedReport;

/// Writes `report` under `(imo, ts)`, replacing any report already there.
pub fn put<S: KvStore + ?Sized>(kv: &mut S, report: &ConsolidatedReport) -> Result<()> {
    kv.set(report_key(&report.imo, report.ts), encode(report)?)?;
    Ok(())
}

pub fn get<S: KvStore + ?Sized>(kv: &S, imo: &str, ts: u64) -> Result<Option<ConsolidatedReport>> {
    match kv.get(&report_key(imo, ts))? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

pub fn remove<S: KvStore + ?Sized>(kv: &mut S, imo: &str, ts: u64) -> Result<()> {
    kv.delete(report_key(imo, ts))?;
    Ok(())
}

/// Every stored report, in key order.
pub fn all<S: KvStore + ?Sized>(kv: &S) -> Result<Vec<ConsolidatedReport>> {
    kv.scan_prefix(REPORT_PREFIX)?
        .into_iter()
        .map(|(key, value)| {
            let report: ConsolidatedReport = decode(&value)?;
            match parse_report_key(&key) {
                Some(id) if id == report.id() => Ok(report),
                _ => Err(OracleError::Internal(anyhow::anyhow!(
                    "report stored under mismatched key {:?}",
                    String::from_utf8_lossy(&key)
                ))),
            }
        })
        .collect()
}
