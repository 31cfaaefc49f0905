//! Concurrent load and sustained sequential write stability.

use std::thread;
use std::time::Duration;

use serde_json::json;

use super::PERFORMANCE;
use crate::harness::pool::fan_out;
use crate::harness::recorder::{Outcome, Recorder};
use crate::harness::runner::{Probe, ProbeContext};
use crate::harness::transport::HttpRequest;
use crate::report::summary::{pass_rate, round_pct};

/// Result of one request issued by a pool worker.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Shot {
    success: bool,
    latency_ms: f64,
}

/// Fires `load_requests` concurrent `GET /` calls on a pool of
/// `load_pool_size` workers and waits for all of them.
pub struct ConcurrentLoad;

impl Probe for ConcurrentLoad {
    fn name(&self) -> &'static str {
        "Concurrent Request Handling"
    }

    fn category(&self) -> &'static str {
        PERFORMANCE
    }

    fn run(&self, ctx: &ProbeContext<'_>, recorder: &mut Recorder) {
        let probes = ctx.probes();
        let request = HttpRequest::get(ctx.url("/"), ctx.timeouts().default_timeout());
        let transport = ctx.transport;

        let batch = fan_out(probes.load_pool_size, probes.load_requests, |_| {
            match transport.send(&request) {
                Ok(response) => Shot {
                    success: response.status == 200,
                    latency_ms: response.elapsed_ms(),
                },
                Err(_) => Shot {
                    success: false,
                    latency_ms: 0.0,
                },
            }
        });

        let latencies: Vec<f64> = batch
            .outcomes()
            .filter(|shot| shot.success)
            .map(|shot| shot.latency_ms)
            .collect();
        let successes = latencies.len();
        #[allow(clippy::cast_precision_loss)]
        let avg_ms = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<f64>() / latencies.len() as f64
        };
        // Ratio is over dispatched requests, so unfinished jobs count against it.
        let rate = pass_rate(successes, batch.requested);
        #[allow(clippy::cast_precision_loss)]
        let fast_enough = avg_ms < probes.load_max_avg_latency_ms as f64;

        let outcome = if rate >= probes.load_min_success_pct && fast_enough {
            Outcome::pass(
                PERFORMANCE,
                self.name(),
                "API handles concurrent requests efficiently",
            )
        } else {
            Outcome::fail(
                PERFORMANCE,
                self.name(),
                format!(
                    "performance issue under load: {successes}/{} successful, avg {avg_ms:.0}ms",
                    batch.requested
                ),
            )
        };
        recorder.record(
            outcome
                .detail("successful_requests", successes)
                .detail("total_requests", batch.requested)
                .detail("completed_requests", batch.completed.len())
                .detail("pool_size", probes.load_pool_size)
                .metric("avg_response_time_ms", avg_ms),
        );
    }
}

/// Sequential `POST /status` calls with a short pause between them.
pub struct ConnectionStability;

impl Probe for ConnectionStability {
    fn name(&self) -> &'static str {
        "Database Connection Stability"
    }

    fn category(&self) -> &'static str {
        PERFORMANCE
    }

    fn run(&self, ctx: &ProbeContext<'_>, recorder: &mut Recorder) {
        let probes = ctx.probes();
        let attempts = probes.stability_attempts as usize;
        let pause = Duration::from_millis(probes.stability_pause_ms);
        let mut successes = 0_usize;

        for i in 0..attempts {
            let request = HttpRequest::post_json(
                ctx.url("/status"),
                json!({ "client_name": format!("stability_test_{i}") }),
                ctx.timeouts().short_timeout(),
            );
            if ctx
                .transport
                .send(&request)
                .is_ok_and(|response| response.status == 200)
            {
                successes += 1;
            }
            if !pause.is_zero() {
                thread::sleep(pause);
            }
        }

        let raw = pass_rate(successes, attempts);
        let rate = round_pct(raw);
        let outcome = if raw >= probes.stability_min_pct {
            Outcome::pass(
                PERFORMANCE,
                self.name(),
                "writes stay stable under sustained load",
            )
        } else {
            Outcome::fail(
                PERFORMANCE,
                self.name(),
                format!("write stability {rate}% below {}%", probes.stability_min_pct),
            )
        };
        recorder.record(
            outcome
                .detail("stability_rate", rate)
                .detail("successful_operations", successes)
                .detail("attempts", attempts),
        );
    }
}
