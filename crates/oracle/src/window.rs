//! Selection of the recent observations that feed one consolidation run.

use kvstore::KvStore;

use crate::error::{OracleError, Result};
use crate::types::Observation;
use crate::{index, observations};

/// Returns up to `max_count` observations for `imo`, newest first, whose
/// timestamps lie within `interval_width` seconds of the newest indexed one.
///
/// The width is clamped to the newest timestamp so the lower bound never
/// goes below zero. Entries are chosen from the index first; an entry whose
/// observation is gone is then logged and skipped without being replaced.
pub fn select<S: KvStore + ?Sized>(
    kv: &S,
    imo: &str,
    interval_width: u64,
    max_count: u32,
) -> Result<Vec<Observation>> {
    if max_count == 0 {
        return Ok(Vec::new());
    }
    let Some(idx) = index::list(kv, imo)? else {
        return Ok(Vec::new());
    };
    let mut entries = idx.entries;
    // stable: equal timestamps keep index order
    entries.sort_by(|a, b| b.ts.cmp(&a.ts));

    let Some(t_max) = entries.first().map(|e| e.ts) else {
        return Ok(Vec::new());
    };
    let lower = t_max - interval_width.min(t_max);
    let kept = entries
        .into_iter()
        .take_while(|e| e.ts >= lower)
        .take(max_count as usize);

    let mut selected = Vec::new();
    for entry in kept {
        match observations::get(kv, &entry.imo, entry.ts, &entry.source)? {
            Some(obs) => selected.push(obs),
            None => {
                let drift = OracleError::IndexDrift(entry.to_string());
                tracing::warn!(imo, "{}", drift);
            }
        }
    }
    tracing::debug!(imo, t_max, lower, selected = selected.len(), "window selected");
    Ok(selected)
}
