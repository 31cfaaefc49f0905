//! JSONL result stream: one self-contained JSON object per line.
//!
//! Lines are assembled in memory and written with a single `write_all` so a
//! tailing reader never sees a partial line. The writer degrades instead of
//! failing: file, then stderr with an `[RH-JSONL]` prefix, then silent discard.
//! A logging failure never aborts a run.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::{HarnessError, Result};
use crate::harness::recorder::TestResult;
use crate::report::summary::RunReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RunStart,
    Result,
    RunFinish,
}

/// A single line. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC, millisecond precision.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Probe details and metrics, or the report for `run_finish`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    #[must_use]
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            suite: None,
            base_url: None,
            config_hash: None,
            category: None,
            name: None,
            ok: None,
            message: None,
            error_code: None,
            details: None,
            score: None,
            tier: None,
            duration_ms: None,
        }
    }

    #[must_use]
    pub fn run_start(suite: &str, base_url: &str, config_hash: Option<String>) -> Self {
        let mut entry = Self::new(EventType::RunStart, Severity::Info);
        entry.suite = Some(suite.to_string());
        entry.base_url = Some(base_url.to_string());
        entry.config_hash = config_hash;
        entry
    }

    /// Entry for a recorded result. Failed results are warnings.
    #[must_use]
    pub fn result(result: &TestResult) -> Self {
        let severity = if result.success {
            Severity::Info
        } else {
            Severity::Warning
        };
        let mut entry = Self::new(EventType::Result, severity);
        entry.ts = result
            .timestamp
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        entry.category = Some(result.category.clone());
        entry.name = Some(result.name.clone());
        entry.ok = Some(result.success);
        entry.message = Some(result.message.clone());
        entry.error_code = result
            .details
            .get("error_code")
            .and_then(Value::as_str)
            .map(str::to_string);
        if !result.details.is_empty() || !result.performance.is_empty() {
            entry.details = Some(serde_json::json!({
                "details": result.details,
                "performance": result.performance,
            }));
        }
        entry
    }

    #[must_use]
    pub fn run_finish(report: &RunReport, duration_ms: u64) -> Self {
        let mut entry = Self::new(EventType::RunFinish, Severity::Info);
        entry.ok = Some(!report.no_data && report.failed == 0);
        entry.score = Some(report.score);
        entry.tier = Some(report.tier.to_string());
        entry.duration_ms = Some(duration_ms);
        entry.details = serde_json::to_value(report).ok();
        entry
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    File,
    Stderr,
    Discard,
}

/// Append-only JSONL writer with a degradation chain.
pub struct JsonlWriter {
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    lines_written: u64,
}

impl JsonlWriter {
    /// Open `path` for appending. On failure the writer starts on stderr.
    #[must_use]
    pub fn open(path: &Path) -> Self {
        let mut w = Self {
            path: Some(path.to_path_buf()),
            writer: None,
            state: WriterState::Discard,
            lines_written: 0,
        };
        match open_append(path) {
            Ok(file) => {
                w.writer = Some(BufWriter::with_capacity(64 * 1024, file));
                w.state = WriterState::File;
            }
            Err(error) => {
                tracing::warn!(%error, "JSONL log unavailable, writing events to stderr");
                w.state = WriterState::Stderr;
            }
        }
        w
    }

    /// A writer that drops everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            path: None,
            writer: None,
            state: WriterState::Discard,
            lines_written: 0,
        }
    }

    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(error) => {
                let _ = writeln!(io::stderr(), "[RH-JSONL] serialize error: {error}");
                return;
            }
        };
        self.write_line(&line);
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut()
            && w.flush().is_err()
        {
            self.degrade();
        }
    }

    /// Current degradation state.
    #[must_use]
    pub fn state(&self) -> &str {
        match self.state {
            WriterState::File => "file",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    #[must_use]
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn write_line(&mut self, line: &str) {
        match self.state {
            WriterState::File => {
                let Some(w) = self.writer.as_mut() else {
                    self.degrade();
                    self.write_line(line);
                    return;
                };
                if w.write_all(line.as_bytes()).is_err() {
                    self.degrade();
                    self.write_line(line);
                    return;
                }
                self.lines_written += 1;
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[RH-JSONL] {line}").is_err() {
                    self.degrade();
                    return;
                }
                self.lines_written += 1;
            }
            WriterState::Discard => {}
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        self.state = match self.state {
            WriterState::File => {
                let _ = writeln!(io::stderr(), "[RH-JSONL] file write failed, using stderr");
                WriterState::Stderr
            }
            WriterState::Stderr | WriterState::Discard => WriterState::Discard,
        };
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| HarnessError::io(parent, source))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| HarnessError::io(path, source))
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
