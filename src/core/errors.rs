//! RH-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Top-level error type for the readiness harness.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("[RH-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[RH-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[RH-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[RH-2001] request to {url} timed out after {after_ms}ms")]
    Timeout { url: String, after_ms: u64 },

    #[error("[RH-2002] transport failure for {url}: {details}")]
    Transport { url: String, details: String },

    #[error("[RH-2003] protocol contract violated: {details}")]
    Protocol { details: String },

    #[error("[RH-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[RH-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[RH-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl HarnessError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "RH-1001",
            Self::MissingConfig { .. } => "RH-1002",
            Self::ConfigParse { .. } => "RH-1003",
            Self::Timeout { .. } => "RH-2001",
            Self::Transport { .. } => "RH-2002",
            Self::Protocol { .. } => "RH-2003",
            Self::Serialization { .. } => "RH-2101",
            Self::Io { .. } => "RH-3002",
            Self::Runtime { .. } => "RH-3900",
        }
    }

    /// Whether the failure is a deadline expiry rather than a hard fault.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether retrying might resolve the failure.
    ///
    /// The harness itself never retries; this is surfaced in result details so
    /// an operator can tell flaky infrastructure from contract breakage.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Transport { .. } | Self::Io { .. } | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for protocol-contract violations.
    #[must_use]
    pub fn protocol(details: impl Into<String>) -> Self {
        Self::Protocol {
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for HarnessError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<HarnessError> {
        vec![
            HarnessError::InvalidConfig {
                details: String::new(),
            },
            HarnessError::MissingConfig {
                path: PathBuf::new(),
            },
            HarnessError::ConfigParse {
                context: "",
                details: String::new(),
            },
            HarnessError::Timeout {
                url: String::new(),
                after_ms: 0,
            },
            HarnessError::Transport {
                url: String::new(),
                details: String::new(),
            },
            HarnessError::Protocol {
                details: String::new(),
            },
            HarnessError::Serialization {
                context: "",
                details: String::new(),
            },
            HarnessError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            HarnessError::Runtime {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = all_variants();
        let codes: Vec<&str> = errors.iter().map(HarnessError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_codes_have_rh_prefix() {
        for err in &all_variants() {
            assert!(
                err.code().starts_with("RH-"),
                "code {} must start with RH-",
                err.code()
            );
        }
    }

    #[test]
    fn error_display_includes_code() {
        let err = HarnessError::Timeout {
            url: "http://127.0.0.1/api/".to_string(),
            after_ms: 1_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("RH-2001"), "display should contain code: {msg}");
        assert!(msg.contains("1000ms"), "display should contain deadline: {msg}");
    }

    #[test]
    fn only_timeout_is_timeout() {
        for err in all_variants() {
            assert_eq!(
                err.is_timeout(),
                err.code() == "RH-2001",
                "unexpected is_timeout for {}",
                err.code()
            );
        }
    }

    #[test]
    fn retryable_errors_are_correct() {
        assert!(
            HarnessError::Transport {
                url: String::new(),
                details: String::new()
            }
            .is_retryable()
        );
        assert!(
            HarnessError::Timeout {
                url: String::new(),
                after_ms: 5
            }
            .is_retryable()
        );
        assert!(!HarnessError::protocol("missing id").is_retryable());
        assert!(
            !HarnessError::InvalidConfig {
                details: String::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn io_convenience_constructor() {
        let err = HarnessError::io(
            "/tmp/frontend/.env",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "RH-3002");
        assert!(err.to_string().contains("/tmp/frontend/.env"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: HarnessError = json_err.into();
        assert_eq!(err.code(), "RH-2101");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: HarnessError = toml_err.into();
        assert_eq!(err.code(), "RH-1003");
    }
}
