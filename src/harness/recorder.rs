//! Append-only store of probe verdicts for a single run.
//!
//! Results are never mutated or removed once recorded; the ordered list is the
//! only input the report stage reads. Timestamps are clamped so they never go
//! backwards within a run, even if the wall clock is stepped.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::HarnessError;

/// Free-form diagnostic context (status codes, counts, ids, error text).
pub type Details = BTreeMap<String, Value>;

/// Numeric timing/throughput metrics, e.g. `response_time_ms`.
pub type Metrics = BTreeMap<String, f64>;

/// One recorded verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub category: String,
    pub name: String,
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: Details,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub performance: Metrics,
    pub timestamp: DateTime<Utc>,
}

/// A verdict before it is stamped and appended.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    category: String,
    name: String,
    success: bool,
    message: String,
    details: Details,
    performance: Metrics,
}

impl Outcome {
    #[must_use]
    pub fn new(
        category: impl Into<String>,
        name: impl Into<String>,
        success: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            success,
            message: message.into(),
            details: Details::new(),
            performance: Metrics::new(),
        }
    }

    #[must_use]
    pub fn pass(
        category: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(category, name, true, message)
    }

    #[must_use]
    pub fn fail(
        category: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(category, name, false, message)
    }

    /// Failed verdict for a fault caught at the probe boundary.
    ///
    /// The error text lands in `details.error` together with its stable code
    /// and whether the fault looks transient.
    #[must_use]
    pub fn from_error(
        category: impl Into<String>,
        name: impl Into<String>,
        context: &str,
        error: &HarnessError,
    ) -> Self {
        Self::fail(category, name, format!("{context}: {error}"))
            .detail("error", error.to_string())
            .detail("error_code", error.code())
            .detail("retryable", error.is_retryable())
    }

    #[must_use]
    pub fn detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Attach a metric, rounded to two decimals.
    #[must_use]
    pub fn metric(mut self, key: &str, value: f64) -> Self {
        self.performance
            .insert(key.to_string(), (value * 100.0).round() / 100.0);
        self
    }
}

type Observer = Box<dyn FnMut(&TestResult)>;

/// Ordered, append-only result list with optional live observers.
#[derive(Default)]
pub struct Recorder {
    results: Vec<TestResult>,
    observers: Vec<Observer>,
}

impl fmt::Debug for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("results", &self.results.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Recorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked once for every result, after it is appended.
    #[must_use]
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&TestResult) + 'static,
    {
        self.observers.push(Box::new(observer));
        self
    }

    /// Stamp and append a verdict. Never fails.
    pub fn record(&mut self, outcome: Outcome) {
        let now = Utc::now();
        let timestamp = match self.results.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };
        let result = TestResult {
            category: outcome.category,
            name: outcome.name,
            success: outcome.success,
            message: outcome.message,
            details: outcome.details,
            performance: outcome.performance,
            timestamp,
        };
        for observer in &mut self.observers {
            observer(&result);
        }
        self.results.push(result);
    }

    /// All results in arrival order.
    #[must_use]
    pub fn all_results(&self) -> &[TestResult] {
        &self.results
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Consume the recorder at run end.
    #[must_use]
    pub fn into_results(self) -> Vec<TestResult> {
        self.results
    }
}
