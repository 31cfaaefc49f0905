//! Cross-origin access for the browser-extension client.

use serde_json::Value;

use super::CORS;
use crate::harness::recorder::{Outcome, Recorder};
use crate::harness::runner::{Probe, ProbeContext};
use crate::harness::transport::{HttpRequest, HttpResponse};

const REPORTED_HEADERS: [&str; 4] = [
    "access-control-allow-origin",
    "access-control-allow-methods",
    "access-control-allow-headers",
    "access-control-allow-credentials",
];

/// Whether the response grants `origin` access, and carries credentials when
/// those are required.
///
/// Browsers refuse `*` on credentialed requests, so with credentials required
/// only an exact origin match counts.
#[must_use]
pub fn grants_origin(response: &HttpResponse, origin: &str, require_credentials: bool) -> bool {
    let origin_ok = response
        .header("access-control-allow-origin")
        .is_some_and(|allowed| allowed == origin || (allowed == "*" && !require_credentials));
    let credentials_ok = !require_credentials
        || response
            .header("access-control-allow-credentials")
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));
    origin_ok && credentials_ok
}

/// `GET /` with an extension `Origin` header.
pub struct CorsHeaders;

impl Probe for CorsHeaders {
    fn name(&self) -> &'static str {
        "CORS Headers Configuration"
    }

    fn category(&self) -> &'static str {
        CORS
    }

    fn run(&self, ctx: &ProbeContext<'_>, recorder: &mut Recorder) {
        let probes = ctx.probes();
        let request = HttpRequest::get(ctx.url("/"), ctx.timeouts().default_timeout())
            .header("Origin", &probes.cors_origin);
        let response = match ctx.transport.send(&request) {
            Ok(response) => response,
            Err(error) => {
                recorder.record(Outcome::from_error(
                    CORS,
                    self.name(),
                    "CORS request failed",
                    &error,
                ));
                return;
            }
        };

        let granted = grants_origin(
            &response,
            &probes.cors_origin,
            probes.cors_require_credentials,
        );
        let mut outcome = if granted {
            Outcome::pass(CORS, self.name(), "CORS is configured for extension access")
        } else if probes.cors_require_credentials {
            Outcome::fail(
                CORS,
                self.name(),
                "CORS does not grant the extension origin with credentials",
            )
        } else {
            Outcome::fail(CORS, self.name(), "CORS does not grant the extension origin")
        };
        for name in REPORTED_HEADERS {
            let value = response
                .header(name)
                .map_or(Value::Null, |v| Value::String(v.to_string()));
            outcome = outcome.detail(name, value);
        }
        recorder.record(outcome);
    }
}

/// `OPTIONS /status` announcing a cross-origin JSON POST.
pub struct Preflight;

impl Probe for Preflight {
    fn name(&self) -> &'static str {
        "Preflight Request Handling"
    }

    fn category(&self) -> &'static str {
        CORS
    }

    fn run(&self, ctx: &ProbeContext<'_>, recorder: &mut Recorder) {
        let request = HttpRequest::options(ctx.url("/status"), ctx.timeouts().default_timeout())
            .header("Origin", &ctx.probes().cors_origin)
            .header("Access-Control-Request-Method", "POST")
            .header("Access-Control-Request-Headers", "Content-Type");

        let outcome = match ctx.transport.send(&request) {
            Ok(response) if (200..300).contains(&response.status) => {
                Outcome::pass(CORS, self.name(), "preflight requests are handled")
                    .detail("status_code", response.status)
                    .detail(
                        "allow_methods",
                        response
                            .header("access-control-allow-methods")
                            .map_or(Value::Null, |v| Value::String(v.to_string())),
                    )
            }
            Ok(response) => Outcome::fail(
                CORS,
                self.name(),
                format!("preflight returned {}", response.status),
            )
            .detail("status_code", response.status),
            Err(error) => Outcome::from_error(CORS, self.name(), "preflight request failed", &error),
        };
        recorder.record(outcome);
    }
}
