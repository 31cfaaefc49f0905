//! Probe catalog.
//!
//! Each probe is an independent [`Probe`] that talks to the backend through the
//! context's transport and converts every fault into a failed verdict.
//! Thresholds and attempt counts come from [`ProbeConfig`](crate::core::config::ProbeConfig).

pub mod cors;
pub mod performance;
pub mod recovery;
pub mod reliability;
pub mod security;
pub mod smoke;

use crate::core::config::Suite;
use crate::harness::runner::Probe;

pub const RELIABILITY: &str = "Reliability";
pub const SECURITY: &str = "Security";
pub const PERFORMANCE: &str = "Performance";
pub const ERROR_RECOVERY: &str = "Error Recovery";
pub const CORS: &str = "CORS";
pub const BACKEND: &str = "Backend";

/// Probes for a suite, in execution order.
#[must_use]
pub fn catalog(suite: Suite) -> Vec<Box<dyn Probe>> {
    match suite {
        Suite::Production => production(),
        Suite::Smoke => smoke(),
        Suite::All => {
            let mut probes = smoke();
            probes.extend(production());
            probes
        }
    }
}

fn smoke() -> Vec<Box<dyn Probe>> {
    vec![
        Box::new(smoke::BackendRoot),
        Box::new(smoke::StatusCreation),
        Box::new(smoke::StatusRetrieval),
    ]
}

fn production() -> Vec<Box<dyn Probe>> {
    vec![
        Box::new(reliability::RootAvailability),
        Box::new(reliability::StatusCrud),
        Box::new(reliability::EndpointConsistency),
        Box::new(security::InputValidation::default()),
        Box::new(security::StatusCodeAccuracy),
        Box::new(performance::ConcurrentLoad),
        Box::new(performance::ConnectionStability),
        Box::new(recovery::InvalidEndpoint),
        Box::new(recovery::MalformedRequest),
        Box::new(recovery::TimeoutHandling),
        Box::new(cors::CorsHeaders),
        Box::new(cors::Preflight),
    ]
}

/// Client name that will not collide with earlier runs.
pub(crate) fn unique_client_name(prefix: &str) -> String {
    format!("{prefix}_{:08x}", rand::random::<u32>())
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! A well-behaved in-memory backend used by probe tests.

    use std::time::Duration;

    use serde_json::{Value, json};

    use crate::core::config::Config;
    use crate::core::errors::Result;
    use crate::harness::recorder::{Recorder, TestResult};
    use crate::harness::runner::{Probe, ProbeContext};
    use crate::harness::transport::{Body, HttpRequest, HttpResponse, Method, MockTransport};

    pub const BASE: &str = "http://mock/api";

    /// Config with pauses removed so tests stay fast.
    pub fn fast_config() -> Config {
        let mut config = Config::default();
        config.probes.stability_pause_ms = 0;
        config
    }

    /// Behaves like the reference backend: echoes created records, rejects
    /// schema-invalid bodies with 422, answers CORS with credentials.
    pub fn healthy(request: &HttpRequest) -> Result<HttpResponse> {
        let cors = |resp: HttpResponse| {
            resp.with_header("access-control-allow-origin", "chrome-extension://test-extension-id")
                .with_header("access-control-allow-credentials", "true")
                .with_elapsed(Duration::from_millis(5))
        };
        let response = match (request.method, request.path()) {
            (Method::Get, "/api/" | "/api") => {
                HttpResponse::new(200).with_json(&json!({"message": "Hello World"}))
            }
            (Method::Get, "/api/status") => HttpResponse::new(200).with_json(&json!([])),
            (Method::Post, "/api/status") => create_status(&request.body),
            (Method::Options, _) => HttpResponse::new(200)
                .with_header("access-control-allow-methods", "GET, POST, OPTIONS"),
            _ => HttpResponse::new(404).with_json(&json!({"detail": "Not Found"})),
        };
        Ok(cors(response))
    }

    fn create_status(body: &Body) -> HttpResponse {
        let Body::Json(value) = body else {
            return HttpResponse::new(422).with_json(&json!({"detail": "invalid body"}));
        };
        match value.get("client_name").and_then(Value::as_str) {
            Some(name) => HttpResponse::new(200).with_json(&json!({
                "id": "0b5c8e3a-1111-4222-8333-944455556666",
                "client_name": name.replace("<script>", "").replace("DROP TABLE", ""),
                "timestamp": "2026-10-19T00:00:00Z",
            })),
            None => HttpResponse::new(422).with_json(&json!({"detail": "client_name required"})),
        }
    }

    pub fn run_one(probe: &dyn Probe, transport: &MockTransport, config: &Config) -> Vec<TestResult> {
        let ctx = ProbeContext::new(config, BASE, transport);
        let mut recorder = Recorder::new();
        probe.run(&ctx, &mut recorder);
        recorder.into_results()
    }
}
