//! How the backend degrades: unknown routes, unparseable bodies and callers
//! that give up early.

use serde_json::Value;

use super::ERROR_RECOVERY;
use crate::harness::recorder::{Outcome, Recorder};
use crate::harness::runner::{Probe, ProbeContext};
use crate::harness::transport::{HttpRequest, Method};

/// `GET /invalid_endpoint` must answer 404.
pub struct InvalidEndpoint;

impl Probe for InvalidEndpoint {
    fn name(&self) -> &'static str {
        "Invalid Endpoint Handling"
    }

    fn category(&self) -> &'static str {
        ERROR_RECOVERY
    }

    fn run(&self, ctx: &ProbeContext<'_>, recorder: &mut Recorder) {
        let request =
            HttpRequest::get(ctx.url("/invalid_endpoint"), ctx.timeouts().default_timeout());
        let response = match ctx.transport.send(&request) {
            Ok(response) => response,
            Err(error) => {
                recorder.record(Outcome::from_error(
                    ERROR_RECOVERY,
                    self.name(),
                    "invalid endpoint request failed",
                    &error,
                ));
                return;
            }
        };

        let has_error_message = response
            .json()
            .is_ok_and(|body| body.get("detail").is_some_and(|d| !d.is_null()));
        let outcome = if response.status == 404 {
            Outcome::pass(
                ERROR_RECOVERY,
                self.name(),
                "unknown routes are answered with 404",
            )
        } else {
            Outcome::fail(
                ERROR_RECOVERY,
                self.name(),
                format!("unknown route returned {} instead of 404", response.status),
            )
        };
        recorder.record(
            outcome
                .detail("status_code", response.status)
                .detail("has_error_message", has_error_message),
        );
    }
}

/// A body that is not JSON, labelled as JSON, must be refused with 400 or 422.
pub struct MalformedRequest;

const MALFORMED_STATUSES: [u16; 2] = [400, 422];

impl Probe for MalformedRequest {
    fn name(&self) -> &'static str {
        "Malformed Request Handling"
    }

    fn category(&self) -> &'static str {
        ERROR_RECOVERY
    }

    fn run(&self, ctx: &ProbeContext<'_>, recorder: &mut Recorder) {
        let request = HttpRequest::new(
            Method::Post,
            ctx.url("/status"),
            ctx.timeouts().default_timeout(),
        )
        .raw_body("application/json", "invalid json");

        let outcome = match ctx.transport.send(&request) {
            Ok(response) if MALFORMED_STATUSES.contains(&response.status) => Outcome::pass(
                ERROR_RECOVERY,
                self.name(),
                "malformed bodies are rejected cleanly",
            )
            .detail("status_code", response.status),
            Ok(response) => Outcome::fail(
                ERROR_RECOVERY,
                self.name(),
                format!(
                    "malformed body returned {} instead of 400/422",
                    response.status
                ),
            )
            .detail("status_code", response.status),
            Err(error) => Outcome::from_error(
                ERROR_RECOVERY,
                self.name(),
                "malformed request failed",
                &error,
            ),
        };
        recorder.record(outcome);
    }
}

/// Requests under an aggressive deadline.
///
/// Hitting the deadline is an acceptable result: the harness must survive it
/// and carry on. Only a non-timeout transport error fails an attempt.
pub struct TimeoutHandling;

impl Probe for TimeoutHandling {
    fn name(&self) -> &'static str {
        "Timeout Handling"
    }

    fn category(&self) -> &'static str {
        ERROR_RECOVERY
    }

    fn run(&self, ctx: &ProbeContext<'_>, recorder: &mut Recorder) {
        let attempts = ctx.probes().timeout_attempts as usize;
        let request = HttpRequest::get(ctx.url("/"), ctx.timeouts().aggressive_timeout());
        let mut passed = 0_usize;
        let mut timed_out = 0_usize;
        let mut failures: Vec<Value> = Vec::new();

        for attempt in 0..attempts {
            match ctx.transport.send(&request) {
                Ok(_) => passed += 1,
                Err(error) if error.is_timeout() => {
                    passed += 1;
                    timed_out += 1;
                }
                Err(error) => {
                    tracing::debug!(attempt, %error, "timeout probe attempt failed");
                    failures.push(Value::String(format!("{}: {error}", error.code())));
                }
            }
        }

        let outcome = if passed == attempts {
            Outcome::pass(
                ERROR_RECOVERY,
                self.name(),
                "deadlines are handled without aborting the run",
            )
        } else {
            Outcome::fail(
                ERROR_RECOVERY,
                self.name(),
                format!("{}/{attempts} attempts failed outright", attempts - passed),
            )
        };
        let mut outcome = outcome
            .detail("timeout_tests_passed", passed)
            .detail("timed_out", timed_out);
        if !failures.is_empty() {
            outcome = outcome.detail("failed_attempts", Value::Array(failures));
        }
        recorder.record(outcome);
    }
}
