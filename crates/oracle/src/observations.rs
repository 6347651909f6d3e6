//! Observation records and their index entries.
//!
//! [`put`] and [`remove`] keep the IMO index in step with the stored
//! observations: both writes go through one transaction.

use kvstore::{KvStore, Transaction};

use crate::codec::{decode, encode};
use crate::error::{OracleError, Result};
use crate::index;
use crate::keys::{observation_key, parse_observation_key, OBSERVATION_PREFIX};
use crate::types::Observation;

/// Writes `obs` under its identity and records the identity in the index.
pub fn put<S: KvStore + ?Sized>(kv: &mut S, obs: &Observation) -> Result<()> {
    let mut txn = Transaction::new(kv);
    txn.set(
        observation_key(&obs.imo, obs.ts, &obs.source),
        encode(obs)?,
    )?;
    index::add(&mut txn, &obs.id())?;
    txn.commit()?;
    Ok(())
}

pub fn get<S: KvStore + ?Sized>(
    kv: &S,
    imo: &str,
    ts: u64,
    source: &str,
) -> Result<Option<Observation>> {
    match kv.get(&observation_key(imo, ts, source))? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

/// Deletes the observation and its index entry. Deleting an absent
/// observation is a no-op.
pub fn remove<S: KvStore + ?Sized>(kv: &mut S, imo: &str, ts: u64, source: &str) -> Result<()> {
    let Some(obs) = get(kv, imo, ts, source)? else {
        return Ok(());
    };
    let mut txn = Transaction::new(kv);
    txn.delete(observation_key(imo, ts, source))?;
    index::remove(&mut txn, &obs.id())?;
    txn.commit()?;
    Ok(())
}

/// Every stored observation, in key order.
pub fn all<S: KvStore + ?Sized>(kv: &S) -> Result<Vec<Observation>> {
    kv.scan_prefix(OBSERVATION_PREFIX)?
        .into_iter()
        .map(|(key, value)| {
            let obs: Observation = decode(&value)?;
            match parse_observation_key(&key) {
                Some(id) if id == obs.id() => Ok(obs),
                _ => Err(OracleError::Internal(anyhow::anyhow!(
                    "observation stored under mismatched key {:?}",
                    String::from_utf8_lossy(&key)
                ))),
            }
        })
        .collect()
}
