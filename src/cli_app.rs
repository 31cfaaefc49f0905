//! Top-level CLI definition and dispatch.

use std::cell::RefCell;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

use chrono::Utc;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::control;
use serde_json::{Value, json};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use readiness_harness::core::config::{Config, Suite};
use readiness_harness::core::errors::HarnessError;
use readiness_harness::harness::recorder::{Recorder, TestResult};
use readiness_harness::harness::runner::{ProbeContext, run_probes};
use readiness_harness::harness::transport::ReqwestTransport;
use readiness_harness::logger::jsonl::{JsonlWriter, LogEntry};
use readiness_harness::probes::catalog;
use readiness_harness::report::assess;
use readiness_harness::report::render::{self, RunHeader};
use readiness_harness::report::summary::summarize;

/// Readiness Harness: HTTP conformance and production-readiness checks.
#[derive(Debug, Parser)]
#[command(
    name = "rh",
    author,
    version,
    about = "Readiness Harness - backend API readiness checks",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run a probe suite against the backend and score it.
    Run(RunArgs),
    /// List the probes of a suite.
    List(ListArgs),
    /// Inspect configuration state.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct RunArgs {
    /// Backend base URL, including the API prefix (e.g. http://host:8001/api).
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,
    /// Probe suite: production, smoke or all.
    #[arg(long, value_name = "SUITE")]
    suite: Option<Suite>,
    /// Worker count for the concurrent load probe.
    #[arg(long, value_name = "N")]
    pool_size: Option<usize>,
    /// Request count for the concurrent load probe.
    #[arg(long, value_name = "N")]
    requests: Option<usize>,
    /// Minimum overall score for a zero exit status.
    #[arg(long, value_name = "PCT")]
    pass_threshold: Option<f64>,
    /// Append run events to this JSONL file.
    #[arg(long, value_name = "PATH")]
    jsonl: Option<PathBuf>,
}

#[derive(Debug, Clone, Args, Default)]
struct ListArgs {
    /// Probe suite: production, smoke or all.
    #[arg(long, value_name = "SUITE")]
    suite: Option<Suite>,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the config file path in use.
    Path,
    /// Print the effective configuration and resolved base URL.
    Show,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// The run completed but scored below the pass threshold.
    #[error("{0}")]
    NotReady(String),
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::NotReady(_) => 1,
            Self::User(_) => 2,
            Self::Runtime(_) | Self::Io(_) => 3,
            Self::Internal(_) | Self::Json(_) => 4,
        }
    }
}

impl From<HarnessError> for CliError {
    fn from(error: HarnessError) -> Self {
        match error {
            HarnessError::InvalidConfig { .. }
            | HarnessError::MissingConfig { .. }
            | HarnessError::ConfigParse { .. } => Self::User(error.to_string()),
            HarnessError::Serialization { .. } => Self::Internal(error.to_string()),
            _ => Self::Runtime(error.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }
    init_tracing(cli);

    match &cli.command {
        Command::Run(args) => run_suite(cli, args),
        Command::List(args) => run_list(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if cli.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_env("RH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(!cli.no_color && io::stderr().is_terminal())
        .try_init();
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Ok(Config::load(cli.config.as_deref())?)
}

fn apply_run_overrides(config: &mut Config, args: &RunArgs) -> Result<(), CliError> {
    if let Some(url) = &args.base_url {
        config.target.base_url = Some(url.clone());
    }
    if let Some(suite) = args.suite {
        config.probes.suite = suite;
    }
    if let Some(pool_size) = args.pool_size {
        config.probes.load_pool_size = pool_size;
    }
    if let Some(requests) = args.requests {
        config.probes.load_requests = requests;
    }
    if let Some(threshold) = args.pass_threshold {
        config.report.pass_threshold = threshold;
    }
    if let Some(path) = &args.jsonl {
        config.output.jsonl_log = Some(path.clone());
    }
    config.validate()?;
    Ok(())
}

fn run_suite(cli: &Cli, args: &RunArgs) -> Result<(), CliError> {
    let mut config = load_config(cli)?;
    apply_run_overrides(&mut config, args)?;
    let mode = output_mode(cli);
    let started = Instant::now();

    let target = config.target.resolve_base_url();
    let header = RunHeader {
        suite: config.probes.suite.to_string(),
        target: target.clone(),
        started_at: Utc::now(),
        config_hash: config.stable_hash().ok(),
    };
    tracing::info!(
        suite = %header.suite,
        base_url = %target.url,
        source = %target.source,
        "starting run"
    );

    let jsonl = Rc::new(RefCell::new(
        config
            .output
            .jsonl_log
            .as_deref()
            .map_or_else(JsonlWriter::disabled, JsonlWriter::open),
    ));
    jsonl.borrow_mut().write_entry(&LogEntry::run_start(
        &header.suite,
        &target.url,
        header.config_hash.clone(),
    ));

    let mut recorder = Recorder::new().with_observer({
        let jsonl = Rc::clone(&jsonl);
        move |result: &TestResult| jsonl.borrow_mut().write_entry(&LogEntry::result(result))
    });
    if mode == OutputMode::Human {
        print!("{}", render::run_banner(&header));
        recorder = recorder.with_observer(live_printer());
    }

    let transport = ReqwestTransport::new()?;
    let ctx = ProbeContext::new(&config, &target.url, &transport);
    let probes = catalog(config.probes.suite);
    run_probes(&ctx, &probes, &mut recorder);
    let results = recorder.into_results();

    let report = match mode {
        OutputMode::Human => {
            let mut stdout = io::stdout().lock();
            let report = assess(&results, &config.report, &mut stdout)?;
            stdout.flush()?;
            report
        }
        OutputMode::Json => {
            let report = summarize(&results, &config.report);
            let payload = render::render_json(&header, &report, &results, &config.report);
            write_json_line(&payload)?;
            report
        }
    };

    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    {
        let mut writer = jsonl.borrow_mut();
        writer.write_entry(&LogEntry::run_finish(&report, duration_ms));
        writer.flush();
    }
    tracing::info!(
        score = report.score,
        tier = %report.tier,
        duration_ms,
        "run finished"
    );

    if report.meets(config.report.pass_threshold) {
        Ok(())
    } else if report.no_data {
        Err(CliError::NotReady("no tests executed".to_string()))
    } else {
        Err(CliError::NotReady(format!(
            "readiness score {:.2}% is below the pass threshold {:.1}%",
            report.raw_score, config.report.pass_threshold
        )))
    }
}

/// Observer printing a phase banner on each category change and one block per
/// result.
fn live_printer() -> impl FnMut(&TestResult) + 'static {
    let mut current: Option<String> = None;
    let mut phase = 0_usize;
    move |result: &TestResult| {
        let mut stdout = io::stdout().lock();
        if current.as_deref() != Some(result.category.as_str()) {
            phase += 1;
            current = Some(result.category.clone());
            let _ = write!(stdout, "{}", render::phase_banner(phase, &result.category));
        }
        let _ = writeln!(stdout, "{}", render::result_line(result));
        let _ = stdout.flush();
    }
}

fn run_list(cli: &Cli, args: &ListArgs) -> Result<(), CliError> {
    let suite = match args.suite {
        Some(suite) => suite,
        None => load_config(cli)?.probes.suite,
    };
    let probes = catalog(suite);

    match output_mode(cli) {
        OutputMode::Human => {
            println!("Suite: {suite} ({} probes)", probes.len());
            for probe in &probes {
                match probe.requires() {
                    Some(needed) => println!(
                        "  {:<16} {} (requires {needed})",
                        probe.category(),
                        probe.name()
                    ),
                    None => println!("  {:<16} {}", probe.category(), probe.name()),
                }
            }
        }
        OutputMode::Json => {
            let entries: Vec<Value> = probes
                .iter()
                .map(|probe| {
                    json!({
                        "category": probe.category(),
                        "name": probe.name(),
                        "requires": probe.requires().map(|p| p.to_string()),
                    })
                })
                .collect();
            let payload = json!({
                "command": "list",
                "suite": suite.as_str(),
                "probes": entries,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli)?;
            let target = config.target.resolve_base_url();
            let hash = config.stable_hash()?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Internal(format!("serialize config: {e}")))?;
                    println!("# base URL: {} ({})", target.url, target.source);
                    println!("# hash: {hash}");
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                        "resolved_base_url": target,
                        "hash": hash,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("RH_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref())
}

/// `--json` wins, then `RH_OUTPUT_FORMAT`; the console report is the default
/// even when stdout is not a terminal.
fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        _ => OutputMode::Human,
    }
}
