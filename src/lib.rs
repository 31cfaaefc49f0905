#![forbid(unsafe_code)]

//! Readiness Harness (rh): HTTP conformance and production-readiness checks
//! for a backend API.
//!
//! A run resolves the base URL, executes a suite of independent probes that
//! record pass/fail verdicts, then scores the verdicts into a tiered
//! deployment recommendation:
//! 1. **Recorder**: append-only, ordered result list
//! 2. **Probes**: reliability, security, performance, error recovery, CORS, smoke
//! 3. **Report**: per-category scores, latency summary, recommendation tier
//!
//! # Library usage
//!
//! ```rust,no_run
//! use readiness_harness::prelude::*;
//!
//! let config = Config::default();
//! let target = config.target.resolve_base_url();
//! let transport = ReqwestTransport::new()?;
//! let ctx = ProbeContext::new(&config, &target.url, &transport);
//! let mut recorder = Recorder::new();
//! run_probes(&ctx, &catalog(config.probes.suite), &mut recorder);
//! let report = summarize(recorder.all_results(), &config.report);
//! println!("score {:.1}% ({})", report.score, report.tier);
//! # Ok::<(), HarnessError>(())
//! ```

pub mod prelude;

pub mod core;
pub mod harness;
pub mod logger;
pub mod probes;
pub mod report;
