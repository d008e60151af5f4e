//! Distance-threshold estimation.
//!
//! The threshold τ separates "same haplotype" from "distinct" contig
//! pairs. It is read off the distance distribution of locus-co-located
//! pairs: a Gaussian kernel-density estimate over the sample is scanned
//! for the leftmost interior valley with at least 5% of the sample mass on
//! each side. Degenerate distributions fall back to the median or, for a
//! single repeated value, to that value plus a small offset.

use crate::contig::ContigSummary;
use crate::distance::DistanceIndex;
use crate::error::{PurgaError, Result};
use log::{debug, info};
use rayon::prelude::*;

/// Grid resolution of the density estimate.
const GRID_POINTS: usize = 1024;

/// Minimum sample size for estimation.
const MIN_SAMPLE: usize = 30;

/// Required sample mass on each side of an accepted valley.
const SIDE_MASS_FRACTION: f64 = 0.05;

/// Offset added to a single-valued sample.
const DEGENERATE_EPSILON: f64 = 1e-6;

/// How τ was obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimatorStatus {
    /// Caller supplied τ; no estimation ran
    UserSupplied,
    /// KDE valley found; all interior valley positions are listed
    Estimated { valleys: Vec<f64> },
    /// No qualifying valley; τ is the sample median
    MedianFallback,
    /// All sampled distances identical; τ is that value plus ε
    DegenerateSingleValue,
}

/// The threshold decision, kept for reporting.
#[derive(Debug, Clone)]
pub struct ThresholdReport {
    pub tau: f64,
    pub sample_size: usize,
    pub status: EstimatorStatus,
}

impl ThresholdReport {
    /// True when τ came from the caller rather than the data.
    pub fn user_supplied(&self) -> bool {
        self.status == EstimatorStatus::UserSupplied
    }
}

/// Collects the distances of all locus-co-located pairs.
///
/// A pair qualifies when both contigs have the same primary target and
/// their locus intervals overlap by at least one base.
pub fn collect_colocated_sample(
    distances: &DistanceIndex,
    summaries: &[ContigSummary],
) -> Vec<f64> {
    let mut sample: Vec<f64> = distances
        .iter_pairs()
        .par_bridge()
        .filter_map(|(a, b, d)| {
            let (sa, sb) = (&summaries[a.index()], &summaries[b.index()]);
            let colocated = sa.primary_target.is_some()
                && sa.primary_target == sb.primary_target
                && sa.locus_overlap(sb) >= 1;
            colocated.then_some(d)
        })
        .collect();
    sample.sort_by(f64::total_cmp);
    sample
}

/// Derives τ from a co-located distance sample.
///
/// # Errors
/// Returns [`PurgaError::EstimatorDegenerate`] when the sample is too
/// small to estimate from; callers with a configured τ never reach this.
pub fn estimate(sample: &[f64]) -> Result<ThresholdReport> {
    if sample.len() < MIN_SAMPLE {
        return Err(degenerate_error(
            format!("sample of {} co-located pairs is below {MIN_SAMPLE}", sample.len()),
            sample,
        ));
    }
    let mut sorted = sample.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let (lo, hi) = (sorted[0], sorted[n - 1]);

    if hi - lo <= f64::EPSILON {
        let tau = lo + DEGENERATE_EPSILON;
        info!("all {n} co-located distances equal {lo}; τ = {tau}");
        return Ok(ThresholdReport {
            tau,
            sample_size: n,
            status: EstimatorStatus::DegenerateSingleValue,
        });
    }

    let density = kernel_density(&sorted, lo, hi);

    // Interior valleys: grid points strictly below both neighbours.
    let step = (hi - lo) / (GRID_POINTS - 1) as f64;
    let required = SIDE_MASS_FRACTION * n as f64;
    let mut valleys = Vec::new();
    let mut chosen: Option<f64> = None;
    for i in 1..GRID_POINTS - 1 {
        if density[i] < density[i - 1] && density[i] < density[i + 1] {
            let x = lo + step * i as f64;
            valleys.push(x);
            let left = sorted.partition_point(|&v| v <= x);
            let right = n - left;
            if chosen.is_none() && left as f64 >= required && right as f64 >= required {
                chosen = Some(x);
            }
        }
    }

    let report = match chosen {
        Some(tau) => {
            debug!("KDE valley at {tau:.5} over {n} pairs ({} interior valleys)", valleys.len());
            ThresholdReport {
                tau,
                sample_size: n,
                status: EstimatorStatus::Estimated { valleys },
            }
        }
        None => {
            let tau = median(&sorted);
            info!("no qualifying KDE valley over {n} pairs; τ = median {tau:.5}");
            ThresholdReport {
                tau,
                sample_size: n,
                status: EstimatorStatus::MedianFallback,
            }
        }
    };
    Ok(report)
}

/// Gaussian KDE over a dense grid, Scott-rule bandwidth.
fn kernel_density(sorted: &[f64], lo: f64, hi: f64) -> Vec<f64> {
    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let sigma = variance.sqrt();
    let bandwidth = (sigma * (n as f64).powf(-0.2)).max(f64::MIN_POSITIVE);

    let step = (hi - lo) / (GRID_POINTS - 1) as f64;
    let norm = 1.0 / (n as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    (0..GRID_POINTS)
        .into_par_iter()
        .map(|i| {
            let x = lo + step * i as f64;
            let mass: f64 = sorted
                .iter()
                .map(|&v| {
                    let z = (x - v) / bandwidth;
                    (-0.5 * z * z).exp()
                })
                .sum();
            mass * norm
        })
        .collect()
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn degenerate_error(reason: String, sample: &[f64]) -> PurgaError {
    let mut sorted = sample.to_vec();
    sorted.sort_by(f64::total_cmp);
    let (min, median, max) = if sorted.is_empty() {
        (f64::NAN, f64::NAN, f64::NAN)
    } else {
        (sorted[0], median(&sorted), sorted[sorted.len() - 1])
    };
    PurgaError::EstimatorDegenerate {
        reason,
        n: sample.len(),
        min,
        median,
        max,
    }
}
