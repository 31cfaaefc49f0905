//! Configuration system: TOML file + env var overrides + smart defaults.
//!
//! The base URL under test is resolved separately by
//! [`TargetConfig::resolve_base_url`], which never fails: every unreadable or
//! malformed source is logged and skipped until the hardcoded fallback.

#![allow(missing_docs)]

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{HarnessError, Result};

/// Full harness configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub timeouts: TimeoutConfig,
    pub probes: ProbeConfig,
    pub report: ReportConfig,
    pub output: OutputConfig,
}

/// Where the backend under test lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TargetConfig {
    /// Explicit base URL; wins over the env file when set.
    pub base_url: Option<String>,
    /// Dotenv-style file that carries the frontend's backend URL.
    pub env_file: PathBuf,
    /// Key looked up in `env_file`.
    pub env_key: String,
    /// Path appended to a URL read from `env_file`.
    pub api_suffix: String,
    /// Used when nothing else resolves.
    pub fallback_url: String,
}

/// Per-request deadlines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub default_ms: u64,
    pub short_ms: u64,
    /// Deliberately tight deadline used by the timeout-handling probe.
    pub aggressive_ms: u64,
}

/// Which probe catalog to execute.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Suite {
    #[default]
    Production,
    Smoke,
    All,
}

/// Probe tuning: attempt counts, pass-rate cutoffs and latency bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProbeConfig {
    pub suite: Suite,
    pub availability_max_latency_ms: u64,
    pub consistency_attempts: u32,
    pub consistency_min_pct: f64,
    pub stability_attempts: u32,
    pub stability_min_pct: f64,
    pub stability_pause_ms: u64,
    pub validation_min_pct: f64,
    /// Statuses that count as an explicit rejection of a hostile payload.
    pub reject_statuses: Vec<u16>,
    pub status_accuracy_min_pct: f64,
    pub load_pool_size: usize,
    pub load_requests: usize,
    pub load_min_success_pct: f64,
    pub load_max_avg_latency_ms: u64,
    pub timeout_attempts: u32,
    pub cors_origin: String,
    /// Require `Access-Control-Allow-Credentials: true` alongside the origin header.
    pub cors_require_credentials: bool,
}

/// Score thresholds for the overall tier, the exit code and per-category status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub ready_threshold: f64,
    pub monitoring_threshold: f64,
    /// Minimum overall score for exit code 0.
    pub pass_threshold: f64,
    pub category_ready_threshold: f64,
    pub category_attention_threshold: f64,
}

/// Optional result sinks beyond the console.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub jsonl_log: Option<PathBuf>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            env_file: PathBuf::from("/app/frontend/.env"),
            env_key: "REACT_APP_BACKEND_URL".to_string(),
            api_suffix: "/api".to_string(),
            fallback_url: "http://127.0.0.1:8001/api".to_string(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_ms: 10_000,
            short_ms: 5_000,
            aggressive_ms: 1_000,
        }
    }
}

impl TimeoutConfig {
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_ms)
    }

    #[must_use]
    pub const fn short_timeout(&self) -> Duration {
        Duration::from_millis(self.short_ms)
    }

    #[must_use]
    pub const fn aggressive_timeout(&self) -> Duration {
        Duration::from_millis(self.aggressive_ms)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            suite: Suite::Production,
            availability_max_latency_ms: 2_000,
            consistency_attempts: 5,
            consistency_min_pct: 95.0,
            stability_attempts: 20,
            stability_min_pct: 95.0,
            stability_pause_ms: 100,
            validation_min_pct: 90.0,
            reject_statuses: vec![422],
            status_accuracy_min_pct: 80.0,
            load_pool_size: 10,
            load_requests: 10,
            load_min_success_pct: 80.0,
            load_max_avg_latency_ms: 3_000,
            timeout_attempts: 3,
            cors_origin: "chrome-extension://test-extension-id".to_string(),
            cors_require_credentials: true,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            ready_threshold: 95.0,
            monitoring_threshold: 85.0,
            pass_threshold: 85.0,
            category_ready_threshold: 90.0,
            category_attention_threshold: 70.0,
        }
    }
}

impl Suite {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Smoke => "smoke",
            Self::All => "all",
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Suite {
    type Err = HarnessError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "smoke" => Ok(Self::Smoke),
            "all" => Ok(Self::All),
            other => Err(HarnessError::ConfigParse {
                context: "suite",
                details: format!("unknown suite {other:?} (expected production, smoke or all)"),
            }),
        }
    }
}

/// How the base URL was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "path")]
pub enum UrlSource {
    /// `--base-url`, `RH_BASE_URL` or `target.base_url`.
    Explicit,
    EnvFile(PathBuf),
    Fallback,
}

impl fmt::Display for UrlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => f.write_str("explicit"),
            Self::EnvFile(path) => write!(f, "env file {}", path.display()),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// A base URL together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedUrl {
    pub url: String,
    pub source: UrlSource,
}

impl TargetConfig {
    /// Resolve the base URL under test. Never fails.
    #[must_use]
    pub fn resolve_base_url(&self) -> ResolvedUrl {
        if let Some(url) = self.base_url.as_deref() {
            return ResolvedUrl {
                url: trim_url(url),
                source: UrlSource::Explicit,
            };
        }

        match read_env_file_url(&self.env_file, &self.env_key) {
            Ok(Some(url)) if is_http_url(&url) => {
                return ResolvedUrl {
                    url: format!("{}{}", trim_url(&url), self.api_suffix),
                    source: UrlSource::EnvFile(self.env_file.clone()),
                };
            }
            Ok(Some(url)) => {
                tracing::warn!(
                    env_file = %self.env_file.display(),
                    value = %url,
                    "ignoring non-http backend URL from env file"
                );
            }
            Ok(None) => {
                tracing::warn!(
                    env_file = %self.env_file.display(),
                    key = %self.env_key,
                    "backend URL key not present in env file"
                );
            }
            Err(error) => {
                tracing::warn!(
                    env_file = %self.env_file.display(),
                    code = error.code(),
                    "error reading env file: {error}"
                );
            }
        }

        ResolvedUrl {
            url: trim_url(&self.fallback_url),
            source: UrlSource::Fallback,
        }
    }
}

/// Read `key=value` from a dotenv-style file. `Ok(None)` when the key is absent.
pub fn read_env_file_url(path: &Path, key: &str) -> Result<Option<String>> {
    let raw = fs::read_to_string(path).map_err(|source| HarnessError::io(path, source))?;
    Ok(parse_env_line(&raw, key))
}

fn parse_env_line(raw: &str, key: &str) -> Option<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .map(|line| line.strip_prefix("export ").unwrap_or(line))
        .find_map(|line| {
            let (name, value) = line.split_once('=')?;
            if name.trim() != key {
                return None;
            }
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            (!value.is_empty()).then(|| value.to_string())
        })
}

fn trim_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn is_http_url(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("http://") || url.starts_with("https://")
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                tracing::warn!("HOME not set, falling back to /tmp for config path");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        home_dir.join(".config").join("rh").join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf)
                .map_err(|source| HarnessError::io(&path_buf, source))?;
            toml::from_str::<Self>(&raw)?
        } else if path.is_some() {
            return Err(HarnessError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for report headers.
    ///
    /// FNV-1a over canonical JSON so the value is stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("RH_BASE_URL") {
            self.target.base_url = Some(raw);
        }
        if let Some(raw) = lookup("RH_SUITE") {
            self.probes.suite = raw.parse()?;
        }
        if let Some(raw) = lookup("RH_LOAD_POOL_SIZE") {
            self.probes.load_pool_size = parse_env("RH_LOAD_POOL_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("RH_LOAD_REQUESTS") {
            self.probes.load_requests = parse_env("RH_LOAD_REQUESTS", &raw)?;
        }
        if let Some(raw) = lookup("RH_READY_THRESHOLD") {
            self.report.ready_threshold = parse_env("RH_READY_THRESHOLD", &raw)?;
        }
        if let Some(raw) = lookup("RH_MONITORING_THRESHOLD") {
            self.report.monitoring_threshold = parse_env("RH_MONITORING_THRESHOLD", &raw)?;
        }
        if let Some(raw) = lookup("RH_PASS_THRESHOLD") {
            self.report.pass_threshold = parse_env("RH_PASS_THRESHOLD", &raw)?;
        }
        if let Some(raw) = lookup("RH_TIMEOUT_DEFAULT_MS") {
            self.timeouts.default_ms = parse_env("RH_TIMEOUT_DEFAULT_MS", &raw)?;
        }
        if let Some(raw) = lookup("RH_TIMEOUT_AGGRESSIVE_MS") {
            self.timeouts.aggressive_ms = parse_env("RH_TIMEOUT_AGGRESSIVE_MS", &raw)?;
        }
        if let Some(raw) = lookup("RH_JSONL_LOG") {
            self.output.jsonl_log = Some(PathBuf::from(raw));
        }
        Ok(())
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = self.target.base_url.as_deref()
            && !is_http_url(url)
        {
            return Err(HarnessError::InvalidConfig {
                details: format!("target.base_url must be an http(s) URL, got {url:?}"),
            });
        }
        if !is_http_url(&self.target.fallback_url) {
            return Err(HarnessError::InvalidConfig {
                details: format!(
                    "target.fallback_url must be an http(s) URL, got {:?}",
                    self.target.fallback_url
                ),
            });
        }

        for (name, val) in [
            ("report.ready_threshold", self.report.ready_threshold),
            ("report.monitoring_threshold", self.report.monitoring_threshold),
            ("report.pass_threshold", self.report.pass_threshold),
            (
                "report.category_ready_threshold",
                self.report.category_ready_threshold,
            ),
            (
                "report.category_attention_threshold",
                self.report.category_attention_threshold,
            ),
            ("probes.consistency_min_pct", self.probes.consistency_min_pct),
            ("probes.stability_min_pct", self.probes.stability_min_pct),
            ("probes.validation_min_pct", self.probes.validation_min_pct),
            (
                "probes.status_accuracy_min_pct",
                self.probes.status_accuracy_min_pct,
            ),
            ("probes.load_min_success_pct", self.probes.load_min_success_pct),
        ] {
            validate_pct(name, val)?;
        }

        if self.report.ready_threshold < self.report.monitoring_threshold {
            return Err(HarnessError::InvalidConfig {
                details: "report.ready_threshold must be >= report.monitoring_threshold"
                    .to_string(),
            });
        }
        if self.report.category_ready_threshold < self.report.category_attention_threshold {
            return Err(HarnessError::InvalidConfig {
                details: "report.category_ready_threshold must be >= category_attention_threshold"
                    .to_string(),
            });
        }

        for (name, val) in [
            ("timeouts.default_ms", self.timeouts.default_ms),
            ("timeouts.short_ms", self.timeouts.short_ms),
            ("timeouts.aggressive_ms", self.timeouts.aggressive_ms),
            (
                "probes.availability_max_latency_ms",
                self.probes.availability_max_latency_ms,
            ),
            (
                "probes.load_max_avg_latency_ms",
                self.probes.load_max_avg_latency_ms,
            ),
        ] {
            if val == 0 {
                return Err(HarnessError::InvalidConfig {
                    details: format!("{name} must be > 0"),
                });
            }
        }

        for (name, val) in [
            ("probes.consistency_attempts", self.probes.consistency_attempts),
            ("probes.stability_attempts", self.probes.stability_attempts),
            ("probes.timeout_attempts", self.probes.timeout_attempts),
        ] {
            if val == 0 {
                return Err(HarnessError::InvalidConfig {
                    details: format!("{name} must be >= 1"),
                });
            }
        }

        if self.probes.load_pool_size == 0 || self.probes.load_requests == 0 {
            return Err(HarnessError::InvalidConfig {
                details: "probes.load_pool_size and probes.load_requests must be >= 1".to_string(),
            });
        }

        if self.probes.reject_statuses.is_empty() {
            return Err(HarnessError::InvalidConfig {
                details: "probes.reject_statuses must list at least one status".to_string(),
            });
        }

        Ok(())
    }
}

fn validate_pct(name: &str, value: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&value) {
        return Err(HarnessError::InvalidConfig {
            details: format!("{name} must be in [0, 100], got {value}"),
        });
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|error| HarnessError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}
