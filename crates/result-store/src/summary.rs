use std::{fmt, str::FromStr};

use statrs::statistics::Statistics;
use tabled::Tabled;

use crate::HistoryEntry;

/// Trailing slice of the history to summarize, assuming one run per hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryWindow {
    Day,
    #[default]
    Week,
    Month,
}

impl HistoryWindow {
    pub fn entries(self) -> usize {
        match self {
            Self::Day => 24,
            Self::Week => 168,
            Self::Month => 720,
        }
    }
}

impl fmt::Display for HistoryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Day => "24h",
            Self::Week => "7d",
            Self::Month => "30d",
        };
        f.write_str(label)
    }
}

impl FromStr for HistoryWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "24h" | "1d" => Ok(Self::Day),
            "7d" => Ok(Self::Week),
            "30d" => Ok(Self::Month),
            other => Err(format!("unknown window '{other}', expected 24h, 7d or 30d")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct WindowSummary {
    #[tabled(rename = "Window")]
    pub window: HistoryWindow,
    #[tabled(rename = "Runs")]
    pub samples: usize,
    #[tabled(rename = "Avg P50 (ms)")]
    pub avg_p50: f64,
    #[tabled(rename = "Avg P95 (ms)")]
    pub avg_p95: f64,
    #[tabled(rename = "Max P99 (ms)")]
    pub max_p99: f64,
    #[tabled(rename = "P50 StdDev (ms)")]
    pub p50_std_dev: f64,
}

/// Aggregates the most recent `window.entries()` history points.
///
/// The standard deviation is the population deviation of the p50 series.
/// All values are rounded to one decimal place.
pub fn summarize_window(history: &[HistoryEntry], window: HistoryWindow) -> Option<WindowSummary> {
    let start = history.len().saturating_sub(window.entries());
    let points = &history[start..];
    if points.is_empty() {
        return None;
    }

    let p50s: Vec<f64> = points.iter().map(|p| p.p50 as f64).collect();
    let p95s: Vec<f64> = points.iter().map(|p| p.p95 as f64).collect();
    let max_p99 = points.iter().map(|p| p.p99).max().unwrap_or_default() as f64;

    Some(WindowSummary {
        window,
        samples: points.len(),
        avg_p50: round_tenth(p50s.iter().mean()),
        avg_p95: round_tenth(p95s.iter().mean()),
        max_p99: round_tenth(max_p99),
        p50_std_dev: round_tenth(p50s.iter().population_std_dev()),
    })
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
