//! Aggregation and presentation of recorded results.

pub mod render;
pub mod summary;

use std::io::{self, Write};

use crate::core::config::ReportConfig;
use crate::harness::recorder::TestResult;
use summary::RunReport;

/// Summarize `results`, write the human report to `out` and hand the report
/// back so the caller can decide its exit status.
pub fn assess<W: Write>(
    results: &[TestResult],
    thresholds: &ReportConfig,
    out: &mut W,
) -> io::Result<RunReport> {
    let report = summary::summarize(results, thresholds);
    out.write_all(render::render_human(&report, thresholds).as_bytes())?;
    Ok(report)
}
