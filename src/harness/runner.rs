//! Probe capability and the fault-isolating run loop.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use crate::core::config::{Config, ProbeConfig, TimeoutConfig};
use crate::harness::recorder::{Outcome, Recorder};
use crate::harness::transport::Transport;

/// Everything a probe may touch: configuration, target and transport.
#[derive(Clone, Copy)]
pub struct ProbeContext<'a> {
    pub config: &'a Config,
    pub base_url: &'a str,
    pub transport: &'a dyn Transport,
}

impl<'a> ProbeContext<'a> {
    #[must_use]
    pub fn new(config: &'a Config, base_url: &'a str, transport: &'a dyn Transport) -> Self {
        Self {
            config,
            base_url,
            transport,
        }
    }

    /// Absolute URL for an API path such as `/status`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    #[must_use]
    pub fn probes(&self) -> &'a ProbeConfig {
        &self.config.probes
    }

    #[must_use]
    pub fn timeouts(&self) -> &'a TimeoutConfig {
        &self.config.timeouts
    }
}

/// A condition later probes may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prerequisite {
    BackendReachable,
}

impl fmt::Display for Prerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BackendReachable => f.write_str("backend reachable"),
        }
    }
}

/// One independent check.
///
/// `run` executes against the context and reports at least one result to the
/// recorder. It must not let transport or parsing faults escape; the run loop
/// additionally contains panics so one broken probe never aborts the run.
pub trait Probe {
    fn name(&self) -> &'static str;

    fn category(&self) -> &'static str;

    /// Condition that must hold before this probe is worth running.
    fn requires(&self) -> Option<Prerequisite> {
        None
    }

    /// Condition this probe proves when every result it records passes.
    fn establishes(&self) -> Option<Prerequisite> {
        None
    }

    fn run(&self, ctx: &ProbeContext<'_>, recorder: &mut Recorder);
}

/// Execute probes sequentially, in order, isolating each one.
pub fn run_probes(ctx: &ProbeContext<'_>, probes: &[Box<dyn Probe>], recorder: &mut Recorder) {
    let mut satisfied: HashSet<Prerequisite> = HashSet::new();

    for probe in probes {
        if let Some(needed) = probe.requires()
            && !satisfied.contains(&needed)
        {
            tracing::info!(probe = probe.name(), prerequisite = %needed, "skipping probe");
            recorder.record(
                Outcome::fail(
                    probe.category(),
                    probe.name(),
                    format!("skipped: prerequisite not met ({needed})"),
                )
                .detail("skipped", true)
                .detail("prerequisite", needed.to_string()),
            );
            continue;
        }

        let before = recorder.len();
        let started = Instant::now();
        tracing::debug!(probe = probe.name(), category = probe.category(), "running probe");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| probe.run(ctx, recorder)));
        if let Err(payload) = outcome {
            let text = panic_text(payload.as_ref());
            tracing::error!(probe = probe.name(), "probe panicked: {text}");
            recorder.record(
                Outcome::fail(probe.category(), probe.name(), format!("probe panicked: {text}"))
                    .detail("error", text),
            );
        }

        if recorder.len() == before {
            recorder.record(Outcome::fail(
                probe.category(),
                probe.name(),
                "probe recorded no verdict",
            ));
        }

        let produced = &recorder.all_results()[before..];
        let passed = produced.iter().all(|result| result.success);
        if passed && let Some(established) = probe.establishes() {
            satisfied.insert(established);
        }

        tracing::debug!(
            probe = probe.name(),
            passed,
            elapsed_ms = started.elapsed().as_millis(),
            "probe finished"
        );
    }
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::transport::{HttpResponse, MockTransport};

    struct Fixed {
        name: &'static str,
        pass: bool,
        establishes: Option<Prerequisite>,
        requires: Option<Prerequisite>,
    }

    impl Probe for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }
        fn category(&self) -> &'static str {
            "Test"
        }
        fn requires(&self) -> Option<Prerequisite> {
            self.requires
        }
        fn establishes(&self) -> Option<Prerequisite> {
            self.establishes
        }
        fn run(&self, _ctx: &ProbeContext<'_>, recorder: &mut Recorder) {
            recorder.record(Outcome::new("Test", self.name, self.pass, "fixed"));
        }
    }

    struct Exploding;

    impl Probe for Exploding {
        fn name(&self) -> &'static str {
            "exploding"
        }
        fn category(&self) -> &'static str {
            "Test"
        }
        fn run(&self, _ctx: &ProbeContext<'_>, _recorder: &mut Recorder) {
            panic!("boom");
        }
    }

    struct Silent;

    impl Probe for Silent {
        fn name(&self) -> &'static str {
            "silent"
        }
        fn category(&self) -> &'static str {
            "Test"
        }
        fn run(&self, _ctx: &ProbeContext<'_>, _recorder: &mut Recorder) {}
    }

    fn fixed(name: &'static str, pass: bool) -> Box<dyn Probe> {
        Box::new(Fixed {
            name,
            pass,
            establishes: None,
            requires: None,
        })
    }

    #[test]
    fn url_joins_without_double_slash() {
        let config = Config::default();
        let transport = MockTransport::always(HttpResponse::new(200));
        let ctx = ProbeContext::new(&config, "http://h/api/", &transport);
        assert_eq!(ctx.url("/status"), "http://h/api/status");
        assert_eq!(ctx.url("/"), "http://h/api/");
    }

    #[test]
    fn panicking_probe_does_not_abort_run() {
        let config = Config::default();
        let transport = MockTransport::always(HttpResponse::new(200));
        let ctx = ProbeContext::new(&config, "http://h/api", &transport);
        let probes: Vec<Box<dyn Probe>> = vec![fixed("a", true), Box::new(Exploding), fixed("b", true)];
        let mut recorder = Recorder::new();
        run_probes(&ctx, &probes, &mut recorder);

        let results = recorder.all_results();
        assert_eq!(results.len(), 3);
        assert!(!results[1].success);
        assert!(results[1].message.contains("boom"));
        assert!(results[2].success);
    }

    #[test]
    fn silent_probe_is_marked_failed() {
        let config = Config::default();
        let transport = MockTransport::always(HttpResponse::new(200));
        let ctx = ProbeContext::new(&config, "http://h/api", &transport);
        let probes: Vec<Box<dyn Probe>> = vec![Box::new(Silent)];
        let mut recorder = Recorder::new();
        run_probes(&ctx, &probes, &mut recorder);
        assert_eq!(recorder.len(), 1);
        assert!(!recorder.all_results()[0].success);
    }

    #[test]
    fn unmet_prerequisite_marks_dependents_failed() {
        let config = Config::default();
        let transport = MockTransport::always(HttpResponse::new(200));
        let ctx = ProbeContext::new(&config, "http://h/api", &transport);
        let probes: Vec<Box<dyn Probe>> = vec![
            Box::new(Fixed {
                name: "root",
                pass: false,
                establishes: Some(Prerequisite::BackendReachable),
                requires: None,
            }),
            Box::new(Fixed {
                name: "dependent",
                pass: true,
                establishes: None,
                requires: Some(Prerequisite::BackendReachable),
            }),
        ];
        let mut recorder = Recorder::new();
        run_probes(&ctx, &probes, &mut recorder);

        let dependent = &recorder.all_results()[1];
        assert!(!dependent.success);
        assert_eq!(dependent.details["skipped"], true);
    }

    #[test]
    fn met_prerequisite_lets_dependents_run() {
        let config = Config::default();
        let transport = MockTransport::always(HttpResponse::new(200));
        let ctx = ProbeContext::new(&config, "http://h/api", &transport);
        let probes: Vec<Box<dyn Probe>> = vec![
            Box::new(Fixed {
                name: "root",
                pass: true,
                establishes: Some(Prerequisite::BackendReachable),
                requires: None,
            }),
            Box::new(Fixed {
                name: "dependent",
                pass: true,
                establishes: None,
                requires: Some(Prerequisite::BackendReachable),
            }),
        ];
        let mut recorder = Recorder::new();
        run_probes(&ctx, &probes, &mut recorder);
        assert!(recorder.all_results().iter().all(|r| r.success));
    }
}
