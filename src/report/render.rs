//! Console and JSON rendering of a run.

#![allow(missing_docs)]

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use serde_json::{Value, json};

use crate::core::config::{ReportConfig, ResolvedUrl};
use crate::harness::recorder::TestResult;
use crate::report::summary::{RunReport, Tier};

const RULE_WIDTH: usize = 60;

/// Run metadata printed above the report and embedded in JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct RunHeader {
    pub suite: String,
    pub target: ResolvedUrl,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Title block printed before the first probe runs.
#[must_use]
pub fn run_banner(header: &RunHeader) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "READINESS HARNESS".bold());
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "Suite:       {}", header.suite);
    let _ = writeln!(
        out,
        "Backend URL: {} ({})",
        header.target.url, header.target.source
    );
    let _ = writeln!(out, "Started at:  {}", header.started_at.to_rfc3339());
    if let Some(hash) = &header.config_hash {
        let _ = writeln!(out, "Config hash: {hash}");
    }
    out
}

/// Heading printed when results of a new category start arriving.
#[must_use]
pub fn phase_banner(index: usize, category: &str) -> String {
    format!(
        "\n{}\n{}\n",
        format!("PHASE {index}: {}", category.to_uppercase()).bold(),
        rule()
    )
}

/// Live line block for one recorded result.
#[must_use]
pub fn result_line(result: &TestResult) -> String {
    let mut out = String::new();
    let status = if result.success {
        "PASS".green().bold()
    } else {
        "FAIL".red().bold()
    };
    let _ = writeln!(out, "{status}: {}", result.name);
    let _ = writeln!(out, "   {}", result.message);
    for (key, value) in &result.details {
        let _ = writeln!(out, "   {key}: {}", display_value(value));
    }
    for (key, value) in &result.performance {
        let _ = writeln!(out, "   {key}: {value:.2}");
    }
    out
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn tier_label(tier: Tier) -> colored::ColoredString {
    match tier {
        Tier::Ready => "READY".green(),
        Tier::NeedsAttention => "NEEDS ATTENTION".yellow(),
        Tier::NotReady => "NOT READY".red(),
    }
}

/// Headline and bullet points for a deployment tier.
#[must_use]
pub const fn recommendations(tier: Tier) -> (&'static str, [&'static str; 3]) {
    match tier {
        Tier::Ready => (
            "READY FOR DEPLOYMENT",
            [
                "All critical systems operational",
                "Performance meets production standards",
                "Security measures properly implemented",
            ],
        ),
        Tier::NeedsAttention => (
            "READY FOR DEPLOYMENT WITH MONITORING",
            [
                "Address minor issues post-deployment",
                "Implement enhanced monitoring",
                "Plan for quick fixes if needed",
            ],
        ),
        Tier::NotReady => (
            "NOT READY FOR DEPLOYMENT",
            [
                "Critical issues must be resolved",
                "Additional testing required",
                "Consider staged deployment approach",
            ],
        ),
    }
}

/// Final assessment block: score, category breakdown, latency, failing checks,
/// recommendation.
#[must_use]
pub fn render_human(report: &RunReport, thresholds: &ReportConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", "READINESS ASSESSMENT".bold());
    let _ = writeln!(out, "{}", rule());

    if report.no_data {
        let _ = writeln!(out, "{}", "No tests executed: score 0.0%".red().bold());
    }
    let _ = writeln!(
        out,
        "OVERALL READINESS SCORE: {:.1}% ({}/{})",
        report.score, report.passed, report.total
    );
    let _ = writeln!(out);

    for category in &report.categories {
        let _ = writeln!(
            out,
            "{}: {:.1}% ({}/{}) {}",
            category.category.to_uppercase(),
            category.score,
            category.passed,
            category.total,
            tier_label(category.tier)
        );
    }
    if !report.categories.is_empty() {
        let _ = writeln!(out);
    }

    if let Some(latency) = report.latency {
        let _ = writeln!(out, "PERFORMANCE METRICS:");
        let _ = writeln!(out, "  Average Response Time: {:.2}ms", latency.avg_ms);
        let _ = writeln!(out, "  Maximum Response Time: {:.2}ms", latency.max_ms);
        let _ = writeln!(out);
    }

    if !report.failures.is_empty() {
        let _ = writeln!(out, "CRITICAL ISSUES REQUIRING FIXES:");
        for failure in &report.failures {
            let _ = writeln!(
                out,
                "  {} {}: {}",
                "x".red(),
                failure.name,
                failure.message
            );
        }
        let _ = writeln!(out);
    }

    let (headline, bullets) = recommendations(report.tier);
    let _ = writeln!(out, "DEPLOYMENT RECOMMENDATIONS:");
    let headline = match report.tier {
        Tier::Ready => headline.green().bold(),
        Tier::NeedsAttention => headline.yellow().bold(),
        Tier::NotReady => headline.red().bold(),
    };
    let _ = writeln!(out, "  {headline}");
    for bullet in bullets {
        let _ = writeln!(out, "  - {bullet}");
    }
    let _ = writeln!(out, "{}", rule());

    let verdict = if report.meets(thresholds.pass_threshold) {
        format!("PASSED (score >= {:.1}%)", thresholds.pass_threshold).green().bold()
    } else {
        format!("FAILED (score < {:.1}%)", thresholds.pass_threshold).red().bold()
    };
    let _ = writeln!(out, "{verdict}");
    out
}

/// Single JSON document for `--json` mode.
#[must_use]
pub fn render_json(
    header: &RunHeader,
    report: &RunReport,
    results: &[TestResult],
    thresholds: &ReportConfig,
) -> Value {
    json!({
        "command": "run",
        "header": header,
        "passed": report.meets(thresholds.pass_threshold),
        "pass_threshold": thresholds.pass_threshold,
        "report": report,
        "results": results,
    })
}
