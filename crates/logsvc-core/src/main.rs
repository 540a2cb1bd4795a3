//! Log Retrieval Service CLI
//!
//! The entry point for `logsvc`, handling:
//! - One-shot retrievals (`query`)
//! - Export of retrieved lines to files (`export`)
//! - Redaction of arbitrary text streams (`redact`)
//! - Cluster config validation (`check`)
//! - The HTTP surface (`serve`)

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use logsvc_common::{
    format_error_human, parse_timestamp, Error, ExportFormat, ExportRequest, LogLine,
    OutputFormat, QueryRequest, QueryResponse, Result, StructuredError, TimeRange,
    DEFAULT_MAX_LINES, DEFAULT_WINDOW_SECONDS,
};
use logsvc_config::{
    resolve_cluster_config_path, validate_cluster_config, ClusterConfig, Settings,
};
use logsvc_core::exit_codes::ExitCode;
use logsvc_core::logging::{generate_run_id, init_logging, LogConfig, LogFormat};
use logsvc_core::serve::run_blocking;
use logsvc_core::service::QueryService;
use logsvc_redact::Redactor;
use std::io::{BufRead, Read, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info_span};

/// Log retrieval service - windowed Loki queries with admission control and redaction
#[derive(Parser)]
#[command(name = "logsvc")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q errors only, -qq silent)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    quiet: u8,

    /// Log format on stderr (human, jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve log lines for one cluster
    Query(QueryArgs),

    /// Write log lines to an export file under the data directory
    Export(ExportArgs),

    /// Redact stdin to stdout, line by line
    Redact(RedactArgs),

    /// Validate a cluster config and the redaction rule file
    Check(CheckArgs),

    /// Serve the HTTP API
    Serve(ServeArgs),
}

fn parse_ts(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    parse_timestamp(value)
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Read the full request from a JSON file
    #[arg(long, conflicts_with_all = ["cluster_id", "component", "keyword", "start", "end", "since"])]
    request: Option<PathBuf>,

    /// Cluster to query (also the cluster label value)
    #[arg(long, required_unless_present = "request")]
    cluster_id: Option<String>,

    /// Cluster config file (overrides LOGSERVICE_CONFIG and default locations)
    #[arg(long)]
    cluster_config: Option<PathBuf>,

    /// Component to query; repeatable. Defaults to every configured component.
    #[arg(long)]
    component: Vec<String>,

    /// Keyword every line must contain; repeatable
    #[arg(long)]
    keyword: Vec<String>,

    /// Range start (RFC 3339 or naive UTC)
    #[arg(long, value_parser = parse_ts, conflicts_with = "since")]
    start: Option<DateTime<Utc>>,

    /// Range end (default: now)
    #[arg(long, value_parser = parse_ts)]
    end: Option<DateTime<Utc>>,

    /// Range start as seconds before the end
    #[arg(long)]
    since: Option<u64>,

    /// Maximum lines to return (1-100)
    #[arg(long)]
    max_lines: Option<usize>,

    /// Window size in seconds (10-3600)
    #[arg(long)]
    window_seconds: Option<u64>,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Export file format (overrides the format in the input)
    #[arg(long, value_enum)]
    export_format: Option<ExportFormat>,

    /// JSON file with an array of lines or an export request; stdin when absent
    #[arg(long)]
    input: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RedactArgs {
    /// Redaction rule file (default: LOGSERVICE_REDACTION)
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Input file; stdin when absent
    #[arg(long)]
    input: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Cluster config file (overrides LOGSERVICE_CONFIG and default locations)
    #[arg(long)]
    cluster_config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            let code = if e.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Clean
            };
            std::process::exit(code.as_i32());
        }
    };

    let log_config = LogConfig::from_env(
        LogConfig::level_from_verbosity(cli.global.verbose, cli.global.quiet),
        cli.global.log_format,
    );
    init_logging(&log_config);

    let run_id = generate_run_id();
    let _run = info_span!("run", run_id = %run_id).entered();

    let result = match &cli.command {
        Commands::Query(args) => run_query(&cli.global, args),
        Commands::Export(args) => run_export(&cli.global, args),
        Commands::Redact(args) => run_redact(args),
        Commands::Check(args) => run_check(&cli.global, args),
        Commands::Serve(args) => run_serve(args),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(err) => report_error(&cli.global, &err),
    };
    std::process::exit(exit_code.as_i32());
}

/// Print `err` in the requested format and pick the exit code.
fn report_error(global: &GlobalOpts, err: &Error) -> ExitCode {
    match global.format {
        OutputFormat::Json => println!("{}", StructuredError::from(err).to_json_pretty()),
        OutputFormat::Jsonl => println!("{}", StructuredError::from(err).to_json()),
        OutputFormat::Text => eprintln!("{}", format_error_human(err, !global.no_color)),
    }
    ExitCode::from(err)
}

fn load_settings() -> Result<Settings> {
    Ok(Settings::from_env()?)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => Ok(std::fs::read_to_string(p)?),
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn build_request(args: &QueryArgs) -> Result<QueryRequest> {
    let mut request = if let Some(path) = &args.request {
        serde_json::from_str::<QueryRequest>(&std::fs::read_to_string(path)?)?
    } else {
        let end = args.end.unwrap_or_else(Utc::now);
        let start = match (args.start, args.since) {
            (Some(start), _) => start,
            (None, since) => {
                let secs = since.unwrap_or(3600);
                let out_of_range =
                    || Error::InvalidRequest(format!("since {}s is out of range", secs));
                let delta = i64::try_from(secs)
                    .ok()
                    .and_then(chrono::Duration::try_seconds)
                    .ok_or_else(out_of_range)?;
                end.checked_sub_signed(delta).ok_or_else(out_of_range)?
            }
        };
        QueryRequest {
            cluster_id: args.cluster_id.clone().unwrap_or_default(),
            cluster_config_path: None,
            components: args.component.clone(),
            keywords: args.keyword.clone(),
            time_range: TimeRange::new(start, end),
            max_lines: DEFAULT_MAX_LINES,
            window_seconds: DEFAULT_WINDOW_SECONDS,
        }
    };

    if let Some(path) = &args.cluster_config {
        request.cluster_config_path = Some(path.clone());
    }
    if let Some(max_lines) = args.max_lines {
        request.max_lines = max_lines;
    }
    if let Some(window_seconds) = args.window_seconds {
        request.window_seconds = window_seconds;
    }
    Ok(request)
}

fn print_response(format: OutputFormat, response: &QueryResponse) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(response)?)?,
        OutputFormat::Jsonl => {
            for line in &response.lines {
                writeln!(out, "{}", serde_json::to_string(line)?)?;
            }
        }
        OutputFormat::Text => {
            for line in &response.lines {
                writeln!(out, "{} {}", line.ts, line.line)?;
            }
        }
    }
    Ok(())
}

fn run_query(global: &GlobalOpts, args: &QueryArgs) -> Result<ExitCode> {
    let request = build_request(args)?;
    debug!(cluster_id = %request.cluster_id, "query request built");

    let service = QueryService::new(load_settings()?);
    let response = service.query(&request)?;
    print_response(global.format, &response)?;
    Ok(ExitCode::Clean)
}

/// Accepts either an [`ExportRequest`] object or a bare array of lines.
fn parse_export_input(content: &str) -> Result<ExportRequest> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    if value.is_array() {
        let lines: Vec<LogLine> = serde_json::from_value(value)?;
        Ok(ExportRequest {
            format: ExportFormat::default(),
            lines,
        })
    } else {
        Ok(serde_json::from_value(value)?)
    }
}

fn run_export(global: &GlobalOpts, args: &ExportArgs) -> Result<ExitCode> {
    let mut request = parse_export_input(&read_input(args.input.as_deref())?)?;
    if let Some(format) = args.export_format {
        request.format = format;
    }

    let service = QueryService::new(load_settings()?);
    let response = service.export(request)?;
    match global.format {
        OutputFormat::Text => println!("{}", response.path),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        OutputFormat::Jsonl => println!("{}", serde_json::to_string(&response)?),
    }
    Ok(ExitCode::Clean)
}

fn run_redact(args: &RedactArgs) -> Result<ExitCode> {
    let rules_path = match &args.rules {
        Some(path) => path.clone(),
        None => load_settings()?.redaction_path,
    };
    let redactor = Redactor::from_file(&rules_path);

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) if path != Path::new("-") => {
            Box::new(std::io::BufReader::new(std::fs::File::open(path)?))
        }
        _ => Box::new(std::io::BufReader::new(std::io::stdin())),
    };
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    for line in reader.lines() {
        writeln!(out, "{}", redactor.redact_text(&line?))?;
    }
    out.flush()?;
    Ok(ExitCode::Clean)
}

fn run_check(global: &GlobalOpts, args: &CheckArgs) -> Result<ExitCode> {
    let settings = load_settings()?;
    let explicit = args
        .cluster_config
        .as_deref()
        .or(settings.config_path.as_deref());
    let location = resolve_cluster_config_path(explicit);

    let mut results: Vec<serde_json::Value> = Vec::new();
    let mut all_ok = true;

    match &location.path {
        Some(path) => {
            match ClusterConfig::from_file(path)
                .and_then(|config| validate_cluster_config(&config).map(|()| config))
            {
                Ok(config) => results.push(serde_json::json!({
                    "check": "cluster_config",
                    "status": "ok",
                    "path": path.display().to_string(),
                    "source": location.source.to_string(),
                    "base_url": config.loki.base_url,
                    "components": config.components,
                })),
                Err(e) => {
                    all_ok = false;
                    results.push(serde_json::json!({
                        "check": "cluster_config",
                        "status": "error",
                        "path": path.display().to_string(),
                        "source": location.source.to_string(),
                        "code": e.code(),
                        "error": e.to_string(),
                    }));
                }
            }
        }
        None => {
            all_ok = false;
            results.push(serde_json::json!({
                "check": "cluster_config",
                "status": "error",
                "error": "no cluster config found",
            }));
        }
    }

    let redaction_path = &settings.redaction_path;
    match Redactor::try_from_file(redaction_path) {
        Ok(redactor) => results.push(serde_json::json!({
            "check": "redaction_rules",
            "status": "ok",
            "path": redaction_path.display().to_string(),
            "rules": redactor.len(),
        })),
        // a missing or broken rule file falls back to the built-in rules
        Err(e) => results.push(serde_json::json!({
            "check": "redaction_rules",
            "status": "fallback",
            "path": redaction_path.display().to_string(),
            "rules": Redactor::builtin().len(),
            "reason": e.to_string(),
        })),
    }

    let report = serde_json::json!({
        "status": if all_ok { "ok" } else { "error" },
        "checks": results,
    });
    match global.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Jsonl => println!("{}", serde_json::to_string(&report)?),
        OutputFormat::Text => {
            for check in &results {
                println!(
                    "{}: {}",
                    check["check"].as_str().unwrap_or_default(),
                    check["status"].as_str().unwrap_or_default()
                );
                if let Some(err) = check.get("error").and_then(|e| e.as_str()) {
                    println!("  {}", err);
                }
            }
        }
    }

    Ok(if all_ok {
        ExitCode::Clean
    } else {
        ExitCode::ValidationError
    })
}

fn run_serve(args: &ServeArgs) -> Result<ExitCode> {
    let service = Arc::new(QueryService::new(load_settings()?));
    run_blocking(args.bind, service)?;
    Ok(ExitCode::Clean)
}
