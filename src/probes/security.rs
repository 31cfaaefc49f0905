//! Hostile-input handling and HTTP status-code correctness.

use regex::RegexBuilder;
use serde_json::{Value, json};

use super::SECURITY;
use crate::harness::recorder::{Outcome, Recorder};
use crate::harness::runner::{Probe, ProbeContext};
use crate::harness::transport::{HttpRequest, HttpResponse, Method};
use crate::report::summary::{pass_rate, round_pct};

/// Dangerous text that must not survive into an accepted echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Exact, case-sensitive substring.
    Literal(&'static str),
    /// Case-insensitive regular expression.
    Pattern(&'static str),
}

impl Marker {
    #[must_use]
    pub fn found_in(self, text: &str) -> bool {
        match self {
            Self::Literal(needle) => text.contains(needle),
            Self::Pattern(pattern) => RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_or_else(|_| text.contains(pattern), |re| re.is_match(text)),
        }
    }
}

/// One class of hostile or malformed create payload.
#[derive(Debug, Clone, PartialEq)]
pub struct HostilePayload {
    pub class: &'static str,
    pub body: Value,
    pub marker: Option<Marker>,
}

impl HostilePayload {
    #[must_use]
    pub fn new(class: &'static str, body: Value, marker: Option<Marker>) -> Self {
        Self {
            class,
            body,
            marker,
        }
    }

    /// Whether the backend handled this payload acceptably.
    ///
    /// A rejection status always passes. A 200 passes only when the echoed
    /// `client_name` no longer carries the dangerous marker. Anything else fails.
    #[must_use]
    pub fn judge(&self, response: &HttpResponse, reject_statuses: &[u16]) -> bool {
        if reject_statuses.contains(&response.status) {
            return true;
        }
        if response.status != 200 {
            return false;
        }
        let Some(marker) = self.marker else {
            return true;
        };
        let Ok(body) = response.json() else {
            return false;
        };
        let echoed = body
            .get("client_name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        !marker.found_in(echoed)
    }
}

/// Sends each hostile payload to `POST /status` and requires the configured
/// share to be rejected or sanitized.
pub struct InputValidation {
    payloads: Vec<HostilePayload>,
}

impl Default for InputValidation {
    fn default() -> Self {
        Self::new(vec![
            HostilePayload::new(
                "script_injection",
                json!({ "client_name": "<script>alert('xss')</script>" }),
                Some(Marker::Literal("<script>")),
            ),
            HostilePayload::new(
                "sql_injection",
                json!({ "client_name": "'; DROP TABLE status_checks; --" }),
                Some(Marker::Pattern(r"drop\s+table")),
            ),
            HostilePayload::new(
                "oversized_string",
                json!({ "client_name": "A".repeat(10_000) }),
                None,
            ),
            HostilePayload::new("null_name", json!({ "client_name": null }), None),
            HostilePayload::new("unknown_field", json!({ "invalid_field": "test" }), None),
            HostilePayload::new("empty_object", json!({}), None),
        ])
    }
}

impl InputValidation {
    #[must_use]
    pub fn new(payloads: Vec<HostilePayload>) -> Self {
        Self { payloads }
    }
}

impl Probe for InputValidation {
    fn name(&self) -> &'static str {
        "Input Validation Protection"
    }

    fn category(&self) -> &'static str {
        SECURITY
    }

    fn run(&self, ctx: &ProbeContext<'_>, recorder: &mut Recorder) {
        let reject = &ctx.probes().reject_statuses;
        let cutoff = ctx.probes().validation_min_pct;
        let mut failures: Vec<String> = Vec::new();

        for payload in &self.payloads {
            let request = HttpRequest::post_json(
                ctx.url("/status"),
                payload.body.clone(),
                ctx.timeouts().default_timeout(),
            );
            match ctx.transport.send(&request) {
                Ok(response) if payload.judge(&response, reject) => {}
                Ok(response) => failures.push(format!("{}:{}", payload.class, response.status)),
                Err(error) => failures.push(format!("{}:{}", payload.class, error.code())),
            }
        }

        let total = self.payloads.len();
        let raw = pass_rate(total - failures.len(), total);
        let rate = round_pct(raw);
        let outcome = if raw >= cutoff {
            Outcome::pass(
                SECURITY,
                self.name(),
                "API validates or sanitizes hostile input",
            )
        } else {
            Outcome::fail(
                SECURITY,
                self.name(),
                format!("input validation {rate}% below {cutoff}%"),
            )
        };
        let mut outcome = outcome
            .detail("validation_rate", rate)
            .detail("payloads_tested", total);
        if !failures.is_empty() {
            outcome = outcome.detail("failed_payloads", failures.join(", "));
        }
        recorder.record(outcome);
    }
}

/// Table of requests with the status each must produce.
pub struct StatusCodeAccuracy;

impl StatusCodeAccuracy {
    fn cases() -> Vec<(Method, &'static str, Option<Value>, u16)> {
        vec![
            (Method::Get, "/", None, 200),
            (Method::Get, "/status", None, 200),
            (
                Method::Post,
                "/status",
                Some(json!({ "client_name": "status_code_check" })),
                200,
            ),
            (Method::Get, "/nonexistent", None, 404),
            (
                Method::Post,
                "/status",
                Some(json!({ "invalid": "data" })),
                422,
            ),
        ]
    }
}

impl Probe for StatusCodeAccuracy {
    fn name(&self) -> &'static str {
        "HTTP Status Code Accuracy"
    }

    fn category(&self) -> &'static str {
        SECURITY
    }

    fn run(&self, ctx: &ProbeContext<'_>, recorder: &mut Recorder) {
        let cutoff = ctx.probes().status_accuracy_min_pct;
        let timeout = ctx.timeouts().default_timeout();
        let cases = Self::cases();
        let mut mismatches: Vec<String> = Vec::new();

        for (method, path, body, expected) in &cases {
            let url = ctx.url(path);
            let request = match body {
                Some(payload) => HttpRequest::post_json(url, payload.clone(), timeout),
                None => HttpRequest::new(*method, url, timeout),
            };
            match ctx.transport.send(&request) {
                Ok(response) if response.status == *expected => {}
                Ok(response) => mismatches.push(format!(
                    "{method} {path} -> {} (expected {expected})",
                    response.status
                )),
                Err(error) => mismatches.push(format!("{method} {path} -> {}", error.code())),
            }
        }

        let total = cases.len();
        let passed = total - mismatches.len();
        let raw = pass_rate(passed, total);
        let rate = round_pct(raw);
        let outcome = if raw >= cutoff {
            Outcome::pass(SECURITY, self.name(), "API returns appropriate status codes")
        } else {
            Outcome::fail(
                SECURITY,
                self.name(),
                format!("status code accuracy {rate}% below {cutoff}%"),
            )
        };
        let mut outcome = outcome
            .detail("accuracy_rate", rate)
            .detail("tests_passed", passed);
        if !mismatches.is_empty() {
            outcome = outcome.detail("mismatches", mismatches.join("; "));
        }
        recorder.record(outcome);
    }
}
