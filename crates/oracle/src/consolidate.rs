//! Turns a window of observations into one [`ConsolidatedReport`].
//!
//! Two independent estimators run over the same samples:
//!
//! - departure port: plurality vote, scored by the winner's share of votes.
//! - ETA: mean and std over all samples, then a one-sigma acceptance window
//!   centred on the median, then mean and std over the samples inside it.
//!
//! All ETA arithmetic is integer epoch seconds. Sums are accumulated in
//! 128 bits so no number of samples or spread of deviations overflows.

use config::ParamsSource;
use kvstore::KvStore;
use std::collections::HashMap;

use crate::clock::Clock;
use crate::error::{OracleError, Result};
use crate::types::{ConsolidatedReport, Observation, ReportId};
use crate::{reports, window};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepportVote {
    pub port: String,
    /// `floor(100 * votes / samples)`
    pub score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EtaStats {
    pub mean_all: u64,
    pub std_all: u64,
    pub median: u64,
    pub outliers: u32,
    /// Zero when every sample is an outlier.
    pub mean_cleaned: u64,
    /// Zero when every sample is an outlier.
    pub std_cleaned: u64,
}

/// Plurality vote over `depport`. A tie goes to the port seen first.
pub fn departure_port(samples: &[Observation]) -> Result<DepportVote> {
    if samples.is_empty() {
        return Err(OracleError::EmptyInput("departure port"));
    }

    // first-seen order is kept so ties resolve the same way on every run
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for obs in samples {
        let c = counts.entry(obs.depport.as_str()).or_insert(0);
        if *c == 0 {
            order.push(obs.depport.as_str());
        }
        *c += 1;
    }

    let mut best = order[0];
    let mut best_count = counts[best];
    for &port in &order[1..] {
        let c = counts[port];
        if c > best_count {
            best = port;
            best_count = c;
        }
    }

    let score = (best_count * 100 / samples.len()) as u32;
    Ok(DepportVote {
        port: best.to_string(),
        score,
    })
}

/// Median-anchored ETA filter.
pub fn eta(samples: &[Observation]) -> Result<EtaStats> {
    if samples.is_empty() {
        return Err(OracleError::EmptyInput("eta"));
    }
    let etas: Vec<u64> = samples.iter().map(|o| o.eta).collect();

    let mean_all = mean(&etas);
    let std_all = std_dev(&etas, mean_all);

    let mut sorted = etas.clone();
    sorted.sort_unstable();
    let median = sorted[sorted.len() / 2];

    let low = median.saturating_sub(std_all);
    let high = median.saturating_add(std_all);
    let kept: Vec<u64> = etas
        .iter()
        .copied()
        .filter(|e| (low..=high).contains(e))
        .collect();
    let outliers = (etas.len() - kept.len()) as u32;

    let (mean_cleaned, std_cleaned) = if kept.is_empty() {
        (0, 0)
    } else {
        let m = mean(&kept);
        (m, std_dev(&kept, m))
    };

    Ok(EtaStats {
        mean_all,
        std_all,
        median,
        outliers,
        mean_cleaned,
        std_cleaned,
    })
}

fn mean(values: &[u64]) -> u64 {
    let sum: u128 = values.iter().map(|v| u128::from(*v)).sum();
    (sum / values.len() as u128) as u64
}

/// Population standard deviation, truncated to whole seconds.
///
/// The root is an exact integer square root. Truncating an `f64` root
/// agrees with it while the variance stays below 2^52; above that the
/// float can round up past the true floor, and this returns the floor.
fn std_dev(values: &[u64], mean: u64) -> u64 {
    let sum_sq: u128 = values
        .iter()
        .map(|v| {
            let d = u128::from(v.abs_diff(mean));
            d * d
        })
        .fold(0u128, u128::saturating_add);
    isqrt(sum_sq / values.len() as u128) as u64
}

/// Floor of the square root. The float estimate is corrected so large
/// inputs round the same way as small ones.
pub(crate) fn isqrt(v: u128) -> u128 {
    let mut r = (v as f64).sqrt() as u128;
    while r.checked_mul(r).map_or(true, |sq| sq > v) {
        r -= 1;
    }
    while (r + 1).checked_mul(r + 1).map_or(false, |sq| sq <= v) {
        r += 1;
    }
    r
}

/// Builds a report from `samples`. Fails only if `samples` is empty.
pub fn build_report(
    creator: &str,
    imo: &str,
    ts: u64,
    samples: &[Observation],
) -> Result<ConsolidatedReport> {
    let vote = departure_port(samples)?;
    let stats = eta(samples)?;
    let total_samples = u32::try_from(samples.len())
        .map_err(|_| OracleError::InvalidRequest(format!("too many samples for imo {}", imo)))?;

    Ok(ConsolidatedReport {
        creator: creator.to_string(),
        imo: imo.to_string(),
        ts,
        total_samples,
        eta_outliers: stats.outliers,
        eta_mean_cleaned: stats.mean_cleaned,
        eta_std_cleaned: stats.std_cleaned,
        eta_mean_all: stats.mean_all,
        eta_std_all: stats.std_all,
        depport: vote.port,
        depport_score: vote.score,
    })
}

/// Consolidates the current window for `imo` and stores the report under
/// the clock's current second.
///
/// Fails with [`OracleError::Duplicate`] if a report already exists for the
/// same `(imo, second)`, whoever created it.
pub fn consolidate<S, P, C>(
    kv: &mut S,
    params: &P,
    clock: &C,
    creator: &str,
    imo: &str,
) -> Result<ConsolidatedReport>
where
    S: KvStore + ?Sized,
    P: ParamsSource + ?Sized,
    C: Clock + ?Sized,
{
    let now = clock.now_secs();
    if reports::get(kv, imo, now)?.is_some() {
        return Err(OracleError::Duplicate {
            what: "report",
            id: ReportId {
                imo: imo.to_string(),
                ts: now,
            }
            .to_string(),
        });
    }

    let p = params.params();
    let samples = window::select(kv, imo, p.interval_width, p.max_item_count)?;
    if samples.len() < p.min_item_count as usize || samples.is_empty() {
        return Err(OracleError::InsufficientSamples {
            imo: imo.to_string(),
            found: samples.len(),
            required: p.min_item_count,
        });
    }

    let report = build_report(creator, imo, now, &samples)?;
    reports::put(kv, &report)?;

    tracing::info!(
        imo,
        ts = report.ts,
        samples = report.total_samples,
        outliers = report.eta_outliers,
        depport = %report.depport,
        score = report.depport_score,
        "report consolidated"
    );
    Ok(report)
}
