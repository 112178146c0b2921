use std::cmp::Ordering;

use sync_latency_store::RoundedLatency;

use crate::error::{ProbeError, Result};

/// Latency percentiles of one run, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStats {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl LatencyStats {
    /// Aggregates the successful samples of a run. `attempted` includes failures.
    pub fn aggregate(samples: &[f64], attempted: usize) -> Result<Self> {
        let failed = attempted.saturating_sub(samples.len());
        let percentiles = Percentiles::from_samples(samples)
            .ok_or(ProbeError::NoSuccessfulSamples { attempted, failed })?;

        Ok(Self {
            p50: percentiles.p50,
            p95: percentiles.p95,
            p99: percentiles.p99,
            attempted,
            succeeded: samples.len(),
            failed,
        })
    }

    /// Whole milliseconds, halves rounded to even.
    pub fn rounded(&self) -> RoundedLatency {
        RoundedLatency {
            p50: round_ms(self.p50),
            p95: round_ms(self.p95),
            p99: round_ms(self.p99),
        }
    }
}

fn round_ms(value: f64) -> u64 {
    value.round_ties_even().max(0.0) as u64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percentiles {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

impl Percentiles {
    /// Median interpolates between the middle pair on even counts. The upper
    /// percentiles pick the sorted sample at `floor(n * q)`, no interpolation.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let count = sorted.len();
        let median = if count % 2 == 0 {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        } else {
            sorted[count / 2]
        };

        Some(Self {
            p50: median,
            p95: nearest_rank(&sorted, 0.95),
            p99: nearest_rank(&sorted, 0.99),
        })
    }
}

fn nearest_rank(sorted: &[f64], quantile: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let index = ((sorted.len() as f64 * quantile) as usize).min(sorted.len() - 1);
    sorted[index]
}
