//! Pure aggregation of a run's result list into a scored report.

#![allow(missing_docs)]

use std::fmt;

use serde::Serialize;

use crate::core::config::ReportConfig;
use crate::harness::recorder::TestResult;

/// Metric key whose values feed the latency summary.
pub const LATENCY_METRIC: &str = "response_time_ms";

/// Unrounded `100 * passed / total`. Zero when `total` is 0.
///
/// Threshold comparisons use this value; [`round_pct`] is for display only.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn pass_rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    100.0 * passed as f64 / total as f64
}

/// Round a percentage to one decimal place.
#[must_use]
pub fn round_pct(raw: f64) -> f64 {
    (raw * 10.0).round() / 10.0
}

/// Deployment recommendation tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    Ready,
    NeedsAttention,
    NotReady,
}

impl Tier {
    /// Map a score onto a tier: `>= ready` is Ready, `>= attention` is
    /// NeedsAttention, anything lower is NotReady.
    #[must_use]
    pub fn classify(score: f64, ready: f64, attention: f64) -> Self {
        if score >= ready {
            Self::Ready
        } else if score >= attention {
            Self::NeedsAttention
        } else {
            Self::NotReady
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::NeedsAttention => "needs-attention",
            Self::NotReady => "not-ready",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
    /// Rounded for display; `tier` is classified on the exact rate.
    pub score: f64,
    pub tier: Tier,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencySummary {
    pub samples: usize,
    pub avg_ms: f64,
    pub max_ms: f64,
}

/// A failing result, reduced to what the report prints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedCheck {
    pub category: String,
    pub name: String,
    pub message: String,
}

/// Derived view of a run. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// One decimal place, for display and serialization.
    pub score: f64,
    /// Exact pass rate that `tier` and [`RunReport::meets`] compare against.
    #[serde(skip)]
    pub raw_score: f64,
    /// Set when no results were recorded at all.
    pub no_data: bool,
    /// In order of first appearance.
    pub categories: Vec<CategorySummary>,
    pub failures: Vec<FailedCheck>,
    pub tier: Tier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencySummary>,
}

impl RunReport {
    /// Whether the run clears the exit-status bar.
    #[must_use]
    pub fn meets(&self, pass_threshold: f64) -> bool {
        !self.no_data && self.raw_score >= pass_threshold
    }
}

/// Build a [`RunReport`] from recorded results. Deterministic, no I/O.
#[must_use]
pub fn summarize(results: &[TestResult], thresholds: &ReportConfig) -> RunReport {
    let mut categories: Vec<CategorySummary> = Vec::new();
    for result in results {
        let idx = match categories.iter().position(|c| c.category == result.category) {
            Some(idx) => idx,
            None => {
                categories.push(CategorySummary {
                    category: result.category.clone(),
                    passed: 0,
                    failed: 0,
                    total: 0,
                    score: 0.0,
                    tier: Tier::NotReady,
                });
                categories.len() - 1
            }
        };
        let entry = &mut categories[idx];
        entry.total += 1;
        if result.success {
            entry.passed += 1;
        } else {
            entry.failed += 1;
        }
    }
    for entry in &mut categories {
        let raw = pass_rate(entry.passed, entry.total);
        entry.score = round_pct(raw);
        entry.tier = Tier::classify(
            raw,
            thresholds.category_ready_threshold,
            thresholds.category_attention_threshold,
        );
    }

    let total = results.len();
    let passed = results.iter().filter(|r| r.success).count();
    let raw_score = pass_rate(passed, total);
    let failures = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| FailedCheck {
            category: r.category.clone(),
            name: r.name.clone(),
            message: r.message.clone(),
        })
        .collect();

    RunReport {
        total,
        passed,
        failed: total - passed,
        score: round_pct(raw_score),
        raw_score,
        no_data: total == 0,
        categories,
        failures,
        tier: Tier::classify(
            raw_score,
            thresholds.ready_threshold,
            thresholds.monitoring_threshold,
        ),
        latency: latency(results),
    }
}

#[allow(clippy::cast_precision_loss)]
fn latency(results: &[TestResult]) -> Option<LatencySummary> {
    let samples: Vec<f64> = results
        .iter()
        .filter_map(|r| r.performance.get(LATENCY_METRIC).copied())
        .collect();
    if samples.is_empty() {
        return None;
    }
    let sum: f64 = samples.iter().sum();
    let max = samples.iter().copied().fold(f64::MIN, f64::max);
    Some(LatencySummary {
        samples: samples.len(),
        avg_ms: ((sum / samples.len() as f64) * 100.0).round() / 100.0,
        max_ms: max,
    })
}
