//! Quick backend health check: root, create, list.
//!
//! Create and list only run once the root probe has shown the backend is
//! reachable.

use serde_json::{Value, json};

use super::BACKEND;
use crate::harness::recorder::{Outcome, Recorder};
use crate::harness::runner::{Prerequisite, Probe, ProbeContext};
use crate::harness::transport::HttpRequest;

pub struct BackendRoot;

impl Probe for BackendRoot {
    fn name(&self) -> &'static str {
        "Backend Root Endpoint"
    }

    fn category(&self) -> &'static str {
        BACKEND
    }

    fn establishes(&self) -> Option<Prerequisite> {
        Some(Prerequisite::BackendReachable)
    }

    fn run(&self, ctx: &ProbeContext<'_>, recorder: &mut Recorder) {
        let request = HttpRequest::get(ctx.url("/"), ctx.timeouts().default_timeout());
        let outcome = match ctx.transport.send(&request) {
            Ok(response) if response.status == 200 => match response.json() {
                Ok(body) => Outcome::pass(
                    BACKEND,
                    self.name(),
                    "backend API is accessible and responding",
                )
                .detail("response", body),
                Err(error) => {
                    Outcome::from_error(BACKEND, self.name(), "backend root is not JSON", &error)
                }
            }
            .detail("status_code", response.status),
            Ok(response) => Outcome::fail(
                BACKEND,
                self.name(),
                format!("backend returned status {}", response.status),
            )
            .detail("status_code", response.status),
            Err(error) => Outcome::from_error(
                BACKEND,
                self.name(),
                "failed to connect to backend",
                &error,
            )
            .detail("url", ctx.base_url),
        };
        recorder.record(outcome);
    }
}

pub struct StatusCreation;

impl Probe for StatusCreation {
    fn name(&self) -> &'static str {
        "Status Check Creation"
    }

    fn category(&self) -> &'static str {
        BACKEND
    }

    fn requires(&self) -> Option<Prerequisite> {
        Some(Prerequisite::BackendReachable)
    }

    fn run(&self, ctx: &ProbeContext<'_>, recorder: &mut Recorder) {
        let request = HttpRequest::post_json(
            ctx.url("/status"),
            json!({ "client_name": "Readiness Smoke Test" }),
            ctx.timeouts().default_timeout(),
        );
        let outcome = match ctx.transport.send(&request) {
            Ok(response) if response.status == 200 => {
                let created_id = response
                    .json()
                    .ok()
                    .and_then(|body| body.get("id").cloned())
                    .unwrap_or(Value::Null);
                Outcome::pass(BACKEND, self.name(), "status checks can be created")
                    .detail("status_code", response.status)
                    .detail("created_id", created_id)
            }
            Ok(response) => Outcome::fail(
                BACKEND,
                self.name(),
                format!("failed to create status check: {}", response.status),
            )
            .detail("status_code", response.status),
            Err(error) => Outcome::from_error(
                BACKEND,
                self.name(),
                "status check creation failed",
                &error,
            ),
        };
        recorder.record(outcome);
    }
}

pub struct StatusRetrieval;

impl Probe for StatusRetrieval {
    fn name(&self) -> &'static str {
        "Status Check Retrieval"
    }

    fn category(&self) -> &'static str {
        BACKEND
    }

    fn requires(&self) -> Option<Prerequisite> {
        Some(Prerequisite::BackendReachable)
    }

    fn run(&self, ctx: &ProbeContext<'_>, recorder: &mut Recorder) {
        let request = HttpRequest::get(ctx.url("/status"), ctx.timeouts().default_timeout());
        let outcome = match ctx.transport.send(&request) {
            Ok(response) if response.status == 200 => match response.json() {
                Ok(Value::Array(records)) => {
                    Outcome::pass(BACKEND, self.name(), "status checks can be retrieved")
                        .detail("count", records.len())
                }
                Ok(_) => Outcome::fail(
                    BACKEND,
                    self.name(),
                    "status listing is not a JSON array",
                ),
                Err(error) => Outcome::from_error(
                    BACKEND,
                    self.name(),
                    "status listing is not JSON",
                    &error,
                ),
            }
            .detail("status_code", response.status),
            Ok(response) => Outcome::fail(
                BACKEND,
                self.name(),
                format!("failed to retrieve status checks: {}", response.status),
            )
            .detail("status_code", response.status),
            Err(error) => Outcome::from_error(
                BACKEND,
                self.name(),
                "status check retrieval failed",
                &error,
            ),
        };
        recorder.record(outcome);
    }
}
