use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pathbench_core::BenchError;
use pathbench_runner::{
    describe_matrix, regenerate_reports, run_matrix, BenchConfig, GroupReport, MatrixSummary,
    ProcessExecutor, RunSummary, CONFIG_TEMPLATE,
};

#[derive(Parser)]
#[command(
    name = "pathbench",
    version = "0.3.0",
    about = "Pathfinding benchmark matrix runner"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate maps, run every algorithm, log results and write reports.
    Run {
        config: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Show the matrix and how much of it is already logged.
    Plan {
        config: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Rewrite stats.txt for every group from the existing logs.
    Report {
        config: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Write a starter experiment file.
    Init {
        #[arg(long, default_value = "pathbench.yaml")]
        path: PathBuf,
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let json_mode = command_json_mode(&cli.command);
    let result = run_command(cli.command);
    match result {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                let (code, details) = error_details(&err);
                emit_json(&json_error(code, err.to_string(), details));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

// Logs go to stderr so `--json` output on stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run_command(command: Commands) -> Result<Option<Value>> {
    match command {
        Commands::Run { config, json } => {
            let cfg = BenchConfig::load(&config)?;
            let summary = run_matrix(&cfg, &ProcessExecutor)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "run",
                    "run": serde_json::to_value(&summary)?,
                })));
            }
            print_run_summary(&summary);
        }
        Commands::Plan { config, json } => {
            let cfg = BenchConfig::load(&config)?;
            let summary = describe_matrix(&cfg)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "plan",
                    "plan": serde_json::to_value(&summary)?,
                })));
            }
            print_matrix_summary(&summary);
        }
        Commands::Report { config, json } => {
            let cfg = BenchConfig::load(&config)?;
            let reports = regenerate_reports(&cfg)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "report",
                    "reports": serde_json::to_value(&reports)?,
                })));
            }
            if reports.is_empty() {
                println!("no logs under {}", cfg.layout.compiled_dir.display());
            }
            print_reports(&reports);
        }
        Commands::Init { path, force } => {
            if !force && path.exists() {
                return Err(anyhow::anyhow!(
                    "config already exists (use --force): {}",
                    path.display()
                ));
            }
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, CONFIG_TEMPLATE)?;
            println!("wrote: {}", path.display());
            println!("next: pathbench plan {}", path.display());
        }
    }
    Ok(None)
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\",\"details\":{{}}}}}}"
        ),
    }
}

fn json_error(code: &str, message: String, details: Value) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}

fn error_details(err: &anyhow::Error) -> (&'static str, Value) {
    match err.downcast_ref::<BenchError>() {
        Some(bench) => {
            let details = match bench {
                BenchError::TaskFailed { task, .. } => json!({ "task": task }),
                _ => json!({}),
            };
            (bench.root().code(), details)
        }
        None => ("command_failed", json!({})),
    }
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Run { json, .. } | Commands::Plan { json, .. } | Commands::Report { json, .. } => {
            *json
        }
        Commands::Init { .. } => false,
    }
}

fn print_run_summary(summary: &RunSummary) {
    println!("maps_generated: {}", summary.maps_generated);
    println!("maps_reused: {}", summary.maps_reused);
    println!("runs_executed: {}", summary.runs_executed);
    println!("runs_skipped: {}", summary.runs_skipped);
    println!("std_records_appended: {}", summary.std_records_appended);
    print_reports(&summary.reports);
}

fn print_matrix_summary(summary: &MatrixSummary) {
    println!("groups: {}", summary.groups.join(", "));
    println!("algorithms: {}", summary.algorithms.join(", "));
    println!("instances_per_size: {}", summary.instances_per_size);
    println!("trials_per_run: {}", summary.trials_per_run);
    println!(
        "directions: {}",
        summary
            .directions
            .iter()
            .map(|d| d.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("maps: {}/{} present", summary.maps_present, summary.maps_total);
    println!("runs: {}/{} logged", summary.runs_logged, summary.runs_total);
    println!("log_layout_digest: {}", summary.log_layout_digest);
    println!("compiled_dir: {}", summary.compiled_dir.display());
}

fn print_reports(reports: &[GroupReport]) {
    for report in reports {
        println!("report: {} ({} algorithms)", report.path.display(), report.entries.len());
    }
}
