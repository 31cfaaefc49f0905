//! Integration tests: CLI surface and full runs of the `rh` binary against an
//! in-process loopback backend.

mod common;

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    /// Validates, sanitizes, stores and lists records; answers CORS.
    Healthy,
    /// Every request gets a 500.
    Broken,
}

struct Request {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Start a backend on an ephemeral loopback port and return its API base URL.
fn spawn_backend(behavior: Behavior) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    let store: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let _ = serve(stream, behavior, &store);
            });
        }
    });
    format!("http://{addr}/api")
}

fn read_request(stream: &TcpStream) -> std::io::Result<Request> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or("/").to_string();

    let mut headers = Vec::new();
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            break;
        }
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((k, v)) = header.split_once(':') {
            headers.push((k.trim().to_string(), v.trim().to_string()));
        }
    }

    let length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0_u8; length];
    reader.read_exact(&mut body)?;
    Ok(Request {
        method,
        path,
        headers,
        body,
    })
}

fn serve(mut stream: TcpStream, behavior: Behavior, store: &Mutex<Vec<Value>>) -> std::io::Result<()> {
    let request = read_request(&stream)?;
    let (status, body) = match behavior {
        Behavior::Broken => (500, json!({"detail": "Internal Server Error"})),
        Behavior::Healthy => route(&request, store),
    };

    let origin = request
        .header("origin")
        .unwrap_or("chrome-extension://test-extension-id")
        .to_string();
    let payload = body.to_string();
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        422 => "Unprocessable Entity",
        _ => "Internal Server Error",
    };
    let mut response = format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n",
        payload.len()
    );
    if behavior == Behavior::Healthy {
        response.push_str(&format!(
            "Access-Control-Allow-Origin: {origin}\r\n\
             Access-Control-Allow-Credentials: true\r\n\
             Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
             Access-Control-Allow-Headers: Content-Type\r\n"
        ));
    }
    response.push_str("\r\n");
    response.push_str(&payload);
    stream.write_all(response.as_bytes())?;
    stream.flush()
}

fn route(request: &Request, store: &Mutex<Vec<Value>>) -> (u16, Value) {
    let path = request.path.split('?').next().unwrap_or("/");
    match (request.method.as_str(), path) {
        ("OPTIONS", _) => (200, json!({})),
        ("GET", "/api/" | "/api") => (200, json!({"message": "Hello World"})),
        ("GET", "/api/status") => {
            let records = store.lock().expect("store lock").clone();
            (200, Value::Array(records))
        }
        ("POST", "/api/status") => {
            let Ok(parsed) = serde_json::from_slice::<Value>(&request.body) else {
                return (422, json!({"detail": "body is not valid JSON"}));
            };
            let Some(name) = parsed.get("client_name").and_then(Value::as_str) else {
                return (422, json!({"detail": "client_name must be a string"}));
            };
            let mut records = store.lock().expect("store lock");
            let record = json!({
                "id": format!("rec-{}", records.len()),
                "client_name": name.replace("<script>", "").replace("DROP TABLE", ""),
                "timestamp": "2026-10-19T00:00:00Z",
            });
            records.push(record.clone());
            (200, record)
        }
        _ => (404, json!({"detail": "Not Found"})),
    }
}

#[test]
fn help_command_prints_usage() {
    let result = common::run_cli_case("help_command_prints_usage", &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: rh [OPTIONS] <COMMAND>"),
        "missing help banner; log: {}",
        result.log_path.display()
    );
}

#[test]
fn version_command_prints_version() {
    let result = common::run_cli_case("version_command_prints_version", &["--version"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(result.stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn list_prints_suite_catalog() {
    let result = common::run_cli_case("list_prints_suite_catalog", &["list", "--suite", "all"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(result.stdout.contains("Suite: all (15 probes)"));
    assert!(result.stdout.contains("Concurrent Request Handling"));
    assert!(result.stdout.contains("(requires backend reachable)"));
}

#[test]
fn list_json_is_machine_readable() {
    let result = common::run_cli_case("list_json_is_machine_readable", &["--json", "list"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let doc: Value = serde_json::from_str(result.stdout.trim()).expect("json list");
    assert_eq!(doc["suite"], "production");
    assert_eq!(doc["probes"].as_array().map(Vec::len), Some(12));
}

#[test]
fn config_path_reports_missing_default() {
    let result = common::run_cli_case("config_path_reports_missing_default", &["config", "path"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(result.stdout.contains("config.toml"));
    assert!(result.stdout.contains("defaults will be used"));
}

#[test]
fn missing_explicit_config_is_user_error() {
    let result = common::run_cli_case(
        "missing_explicit_config_is_user_error",
        &["--config", "/nonexistent/rh-config.toml", "run"],
    );
    assert_eq!(result.status.code(), Some(2), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("RH-1002"));
}

#[test]
fn non_http_base_url_is_user_error() {
    let result = common::run_cli_case(
        "non_http_base_url_is_user_error",
        &["run", "--base-url", "ftp://example.com/api"],
    );
    assert_eq!(result.status.code(), Some(2), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("RH-1001"));
}

#[test]
fn healthy_backend_passes_production_suite() {
    let base = spawn_backend(Behavior::Healthy);
    let result = common::run_cli_case(
        "healthy_backend_passes_production_suite",
        &["--no-color", "run", "--base-url", base.as_str()],
    );
    assert_eq!(
        result.status.code(),
        Some(0),
        "expected exit 0; log: {}",
        result.log_path.display()
    );
    assert!(result.stdout.contains("PHASE 1: RELIABILITY"));
    assert!(result.stdout.contains("PHASE 5: CORS"));
    assert!(result.stdout.contains("OVERALL READINESS SCORE: 100.0% (12/12)"));
    assert!(result.stdout.contains("READY FOR DEPLOYMENT"));
    assert!(!result.stdout.contains("FAIL:"));
}

#[test]
fn healthy_backend_smoke_suite_in_json_mode() {
    let base = spawn_backend(Behavior::Healthy);
    let result = common::run_cli_case_with_env(
        "healthy_backend_smoke_suite_in_json_mode",
        &["run", "--suite", "smoke"],
        &[("RH_BASE_URL", base.as_str()), ("RH_OUTPUT_FORMAT", "json")],
    );
    assert_eq!(result.status.code(), Some(0), "log: {}", result.log_path.display());
    let doc: Value = serde_json::from_str(result.stdout.trim()).expect("single json document");
    assert_eq!(doc["passed"], true);
    assert_eq!(doc["report"]["total"], 3);
    assert_eq!(doc["report"]["tier"], "ready");
    assert_eq!(doc["header"]["target"]["url"], base.as_str());
    assert_eq!(doc["header"]["target"]["source"]["kind"], "explicit");
}

#[test]
fn broken_backend_fails_with_full_report() {
    let base = spawn_backend(Behavior::Broken);
    let result = common::run_cli_case(
        "broken_backend_fails_with_full_report",
        &["--no-color", "run", "--suite", "smoke", "--base-url", base.as_str()],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stdout.contains("FAIL: Backend Root Endpoint"));
    assert!(result.stdout.contains("skipped: prerequisite not met"));
    assert!(result.stdout.contains("NOT READY FOR DEPLOYMENT"));
    assert!(result.stderr.contains("below the pass threshold"));
}

#[test]
fn unreachable_backend_still_reports_and_exits_nonzero() {
    let dir = tempfile::tempdir().expect("tempdir");
    let jsonl = dir.path().join("run.jsonl");
    let jsonl_arg = jsonl.to_string_lossy().to_string();
    let result = common::run_cli_case(
        "unreachable_backend_still_reports_and_exits_nonzero",
        &[
            "--no-color",
            "run",
            "--suite",
            "smoke",
            "--base-url",
            "http://127.0.0.1:1/api",
            "--jsonl",
            jsonl_arg.as_str(),
        ],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stdout.contains("OVERALL READINESS SCORE: 0.0% (0/3)"));
    assert!(result.stdout.contains("RH-2002") || result.stdout.contains("RH-2001"));

    let events: Vec<Value> = std::fs::read_to_string(&jsonl)
        .expect("jsonl written")
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(events.len(), 5);
    assert_eq!(events[0]["event"], "run_start");
    assert_eq!(events[4]["event"], "run_finish");
    assert_eq!(events[4]["tier"], "not-ready");
}

#[test]
fn lowered_pass_threshold_accepts_partial_run() {
    let base = spawn_backend(Behavior::Broken);
    let result = common::run_cli_case(
        "lowered_pass_threshold_accepts_partial_run",
        &[
            "--no-color",
            "run",
            "--suite",
            "smoke",
            "--base-url",
            base.as_str(),
            "--pass-threshold",
            "0",
        ],
    );
    assert_eq!(result.status.code(), Some(0), "log: {}", result.log_path.display());
}
