//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use readiness_harness::prelude::*;
//! ```

// Core
pub use crate::core::config::{Config, ResolvedUrl, Suite, UrlSource};
pub use crate::core::errors::{HarnessError, Result};

// Harness
pub use crate::harness::recorder::{Outcome, Recorder, TestResult};
pub use crate::harness::runner::{Prerequisite, Probe, ProbeContext, run_probes};
pub use crate::harness::transport::{
    HttpRequest, HttpResponse, Method, MockTransport, ReqwestTransport, Transport,
};

// Probes
pub use crate::probes::catalog;

// Report
pub use crate::report::summary::{RunReport, Tier, summarize};
