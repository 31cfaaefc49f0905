//! Endpoint availability, create/read round trip and repeated-call consistency.

use serde_json::{Value, json};

use super::{RELIABILITY, unique_client_name};
use crate::core::errors::{HarnessError, Result};
use crate::harness::recorder::{Outcome, Recorder};
use crate::harness::runner::{Probe, ProbeContext};
use crate::harness::transport::HttpRequest;
use crate::report::summary::{pass_rate, round_pct};

/// `GET /` must answer 200 within the latency bound.
pub struct RootAvailability;

impl Probe for RootAvailability {
    fn name(&self) -> &'static str {
        "Root Endpoint Performance"
    }

    fn category(&self) -> &'static str {
        RELIABILITY
    }

    fn run(&self, ctx: &ProbeContext<'_>, recorder: &mut Recorder) {
        let bound_ms = ctx.probes().availability_max_latency_ms;
        let request = HttpRequest::get(ctx.url("/"), ctx.timeouts().default_timeout());
        let response = match ctx.transport.send(&request) {
            Ok(response) => response,
            Err(error) => {
                recorder.record(Outcome::from_error(
                    RELIABILITY,
                    self.name(),
                    "root endpoint failed",
                    &error,
                ));
                return;
            }
        };

        let elapsed_ms = response.elapsed_ms();
        #[allow(clippy::cast_precision_loss)]
        let within_bound = elapsed_ms < bound_ms as f64;
        let outcome = if response.status == 200 && within_bound {
            Outcome::pass(
                RELIABILITY,
                self.name(),
                "root endpoint responds quickly and reliably",
            )
        } else {
            Outcome::fail(
                RELIABILITY,
                self.name(),
                format!(
                    "root endpoint performance issue: status {} in {elapsed_ms:.0}ms (bound {bound_ms}ms)",
                    response.status
                ),
            )
        };
        recorder.record(
            outcome
                .detail("status_code", response.status)
                .metric("response_time_ms", elapsed_ms),
        );
    }
}

/// `POST /status` then `GET /status`.
///
/// The create must echo `client_name` and return `id` and `timestamp`; the read
/// must be a JSON array that either contains the new record or is empty.
pub struct StatusCrud;

const REQUIRED_FIELDS: [&str; 3] = ["id", "client_name", "timestamp"];

impl StatusCrud {
    fn create(ctx: &ProbeContext<'_>, client_name: &str) -> Result<(String, f64)> {
        let request = HttpRequest::post_json(
            ctx.url("/status"),
            json!({ "client_name": client_name }),
            ctx.timeouts().default_timeout(),
        );
        let response = ctx.transport.send(&request)?;
        if response.status != 200 {
            return Err(HarnessError::protocol(format!(
                "create returned status {}",
                response.status
            )));
        }
        let body = response.json()?;
        if let Some(missing) = REQUIRED_FIELDS.iter().find(|field| body.get(**field).is_none()) {
            return Err(HarnessError::protocol(format!(
                "create response is missing field {missing:?}"
            )));
        }
        if body.get("client_name").and_then(Value::as_str) != Some(client_name) {
            return Err(HarnessError::protocol(
                "create response does not echo client_name",
            ));
        }
        let id = match &body["id"] {
            Value::String(id) => id.clone(),
            other => other.to_string(),
        };
        Ok((id, response.elapsed_ms()))
    }

    fn read(ctx: &ProbeContext<'_>, id: &str) -> Result<(usize, f64)> {
        let request = HttpRequest::get(ctx.url("/status"), ctx.timeouts().default_timeout());
        let response = ctx.transport.send(&request)?;
        if response.status != 200 {
            return Err(HarnessError::protocol(format!(
                "read returned status {}",
                response.status
            )));
        }
        let body = response.json()?;
        let Some(records) = body.as_array() else {
            return Err(HarnessError::protocol("read response is not a JSON array"));
        };
        let found = records
            .iter()
            .any(|record| record.get("id").is_some_and(|value| value.as_str() == Some(id)));
        if !found && !records.is_empty() {
            return Err(HarnessError::protocol(format!(
                "created record {id} missing from {} returned records",
                records.len()
            )));
        }
        Ok((records.len(), response.elapsed_ms()))
    }
}

impl Probe for StatusCrud {
    fn name(&self) -> &'static str {
        "Status CRUD Operations"
    }

    fn category(&self) -> &'static str {
        RELIABILITY
    }

    fn run(&self, ctx: &ProbeContext<'_>, recorder: &mut Recorder) {
        let client_name = unique_client_name("Production_Test");

        let (id, create_ms) = match Self::create(ctx, &client_name) {
            Ok(created) => created,
            Err(error) => {
                recorder.record(
                    Outcome::from_error(RELIABILITY, self.name(), "status create failed", &error)
                        .detail("phase", "create"),
                );
                return;
            }
        };

        match Self::read(ctx, &id) {
            Ok((total, read_ms)) => recorder.record(
                Outcome::pass(
                    RELIABILITY,
                    self.name(),
                    "status endpoints support reliable create and read",
                )
                .detail("created_id", id)
                .detail("total_records", total)
                .metric("create_time_ms", create_ms)
                .metric("read_time_ms", read_ms),
            ),
            Err(error) => recorder.record(
                Outcome::from_error(RELIABILITY, self.name(), "status read failed", &error)
                    .detail("phase", "read")
                    .detail("created_id", id),
            ),
        }
    }
}

/// Repeated `GET /`; a fixed number of independent attempts, no retries.
pub struct EndpointConsistency;

impl Probe for EndpointConsistency {
    fn name(&self) -> &'static str {
        "Endpoint Consistency"
    }

    fn category(&self) -> &'static str {
        RELIABILITY
    }

    fn run(&self, ctx: &ProbeContext<'_>, recorder: &mut Recorder) {
        let attempts = ctx.probes().consistency_attempts as usize;
        let cutoff = ctx.probes().consistency_min_pct;
        let request = HttpRequest::get(ctx.url("/"), ctx.timeouts().short_timeout());

        let successes = (0..attempts)
            .filter(|_| {
                ctx.transport
                    .send(&request)
                    .is_ok_and(|response| response.status == 200)
            })
            .count();
        let raw = pass_rate(successes, attempts);
        let rate = round_pct(raw);

        let outcome = if raw >= cutoff {
            Outcome::pass(
                RELIABILITY,
                self.name(),
                "endpoint answers consistently across repeated requests",
            )
        } else {
            Outcome::fail(
                RELIABILITY,
                self.name(),
                format!("endpoint consistency {rate}% below {cutoff}%"),
            )
        };
        recorder.record(
            outcome
                .detail("consistency_rate", rate)
                .detail("successful_requests", successes)
                .detail("attempts", attempts),
        );
    }
}
