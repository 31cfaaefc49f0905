//! HTTP boundary: request/response values, the `Transport` trait, a reqwest
//! blocking implementation and an in-memory mock for deterministic tests.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::core::errors::{HarnessError, Result};

/// HTTP methods the probes issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Options,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
    /// Sent verbatim; used to deliver deliberately malformed JSON.
    Raw {
        content_type: String,
        text: String,
    },
}

/// A single outbound request with its own deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Body,
    pub timeout: Duration,
}

impl HttpRequest {
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Body::Empty,
            timeout,
        }
    }

    #[must_use]
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self::new(Method::Get, url, timeout)
    }

    #[must_use]
    pub fn post_json(url: impl Into<String>, payload: Value, timeout: Duration) -> Self {
        let mut request = Self::new(Method::Post, url, timeout);
        request.body = Body::Json(payload);
        request
    }

    #[must_use]
    pub fn options(url: impl Into<String>, timeout: Duration) -> Self {
        Self::new(Method::Options, url, timeout)
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn raw_body(mut self, content_type: &str, text: &str) -> Self {
        self.body = Body::Raw {
            content_type: content_type.to_string(),
            text: text.to_string(),
        };
        self
    }

    /// Path component of the URL, without scheme/authority or query.
    #[must_use]
    pub fn path(&self) -> &str {
        let after_scheme = self.url.split_once("://").map_or(self.url.as_str(), |(_, rest)| rest);
        let path = after_scheme.find('/').map_or("/", |idx| &after_scheme[idx..]);
        path.split('?').next().unwrap_or(path)
    }

    fn timeout_error(&self) -> HarnessError {
        HarnessError::Timeout {
            url: self.url.clone(),
            after_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// A fully read response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are stored lowercase.
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub elapsed: Duration,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: String::new(),
            elapsed: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_json(mut self, value: &Value) -> Self {
        self.body = value.to_string();
        self.headers
            .insert("content-type".to_string(), "application/json".to_string());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    #[must_use]
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Parse the body as JSON; a malformed body is a protocol violation.
    pub fn json(&self) -> Result<Value> {
        serde_json::from_str(&self.body).map_err(|error| {
            HarnessError::protocol(format!("response body is not valid JSON: {error}"))
        })
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1_000.0
    }
}

/// Performs one HTTP exchange. Implementations must be shareable across the
/// load-test worker pool.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Live transport backed by `reqwest::blocking`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .gzip(true)
            .user_agent(concat!("rh/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| HarnessError::Runtime {
                details: format!("failed to build HTTP client: {error}"),
            })?;
        Ok(Self { client })
    }

    fn classify(request: &HttpRequest, error: reqwest::Error) -> HarnessError {
        if error.is_timeout() {
            request.timeout_error()
        } else {
            HarnessError::Transport {
                url: request.url.clone(),
                details: error.to_string(),
            }
        }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Options => reqwest::Method::OPTIONS,
        };
        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::Raw { content_type, text } => builder
                .header(reqwest::header::CONTENT_TYPE, content_type.as_str())
                .body(text.clone()),
        };

        let started = Instant::now();
        let response = builder
            .send()
            .map_err(|error| Self::classify(request, error))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .text()
            .map_err(|error| Self::classify(request, error))?;
        let elapsed = started.elapsed();

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status,
            elapsed_ms = elapsed.as_millis(),
            "http exchange"
        );

        Ok(HttpResponse {
            status,
            headers,
            body,
            elapsed,
        })
    }
}

type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync>;

/// In-memory transport for deterministic tests.
///
/// Every request is answered by the supplied handler and logged so tests can
/// assert on what was sent.
pub struct MockTransport {
    handler: Handler,
    sent: Mutex<Vec<HttpRequest>>,
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport")
            .field("sent", &self.sent.lock().len())
            .finish_non_exhaustive()
    }
}

impl MockTransport {
    #[must_use]
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with the same response.
    #[must_use]
    pub fn always(response: HttpResponse) -> Self {
        Self::new(move |_| Ok(response.clone()))
    }

    /// Fail every request with a deadline expiry.
    #[must_use]
    pub fn always_timeout() -> Self {
        Self::new(|request| Err(request.timeout_error()))
    }

    /// Fail every request as if the connection were refused.
    #[must_use]
    pub fn unreachable() -> Self {
        Self::new(|request| {
            Err(HarnessError::Transport {
                url: request.url.clone(),
                details: "connection refused".to_string(),
            })
        })
    }

    /// Snapshot of every request sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<HttpRequest> {
        self.sent.lock().clone()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.sent.lock().push(request.clone());
        (self.handler)(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_path_strips_authority_and_query() {
        let req = HttpRequest::get("http://127.0.0.1:8001/api/status?x=1", Duration::from_secs(1));
        assert_eq!(req.path(), "/api/status");
        let bare = HttpRequest::get("http://127.0.0.1:8001", Duration::from_secs(1));
        assert_eq!(bare.path(), "/");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let resp = HttpResponse::new(200).with_header("Access-Control-Allow-Origin", "*");
        assert_eq!(resp.header("access-control-allow-origin"), Some("*"));
        assert_eq!(resp.header("ACCESS-CONTROL-ALLOW-ORIGIN"), Some("*"));
        assert_eq!(resp.header("access-control-allow-credentials"), None);
    }

    #[test]
    fn malformed_body_is_protocol_error() {
        let mut resp = HttpResponse::new(200);
        resp.body = "<html>".to_string();
        let err = resp.json().expect_err("html is not json");
        assert_eq!(err.code(), "RH-2003");
    }

    #[test]
    fn mock_records_requests_and_answers() {
        let mock = MockTransport::always(HttpResponse::new(200).with_json(&json!({"ok": true})));
        let req = HttpRequest::post_json("http://mock/api/status", json!({"client_name": "x"}), Duration::from_secs(1));
        let resp = mock.send(&req).expect("mock answers");
        assert_eq!(resp.status, 200);
        assert_eq!(resp.json().expect("json")["ok"], true);
        let sent = mock.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::Post);
    }

    #[test]
    fn mock_timeout_reports_deadline() {
        let mock = MockTransport::always_timeout();
        let req = HttpRequest::get("http://mock/api/", Duration::from_millis(1_000));
        let err = mock.send(&req).expect_err("must time out");
        assert!(err.is_timeout());
        assert!(err.to_string().contains("1000ms"));
    }
}
