//! Crop Suitability CLI - Main Entry Point
//!
//! `cropfit evaluate` reads one JSON request per stdin line:
//! `{"observation": {"nitrogen": 90, ...}, "target": "rice"}`
//! and prints one JSON result (or error report) per line.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Deserialize;

use crop_suitability::constants;
use crop_suitability::logic::model::reference_bundle;
use crop_suitability::{
    Crop, EngineConfig, EngineError, EngineHandle, EngineResult, RawObservation, Stage,
};

#[derive(Parser)]
#[command(name = "cropfit", version, about = "Crop suitability inference & explanation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the reference model bundle (and its .sha256 sidecar).
    ExportReference {
        /// Destination JSON file.
        path: PathBuf,
    },
    /// Evaluate newline-delimited JSON requests from stdin.
    Evaluate {
        /// Model bundle; defaults to CROPFIT_MODEL_PATH, then the reference model.
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Print the loaded model's status.
    Status {
        #[arg(long)]
        model: Option<PathBuf>,
    },
}

#[derive(Debug, Deserialize)]
struct Request {
    observation: RawObservation,
    #[serde(default)]
    target: Option<String>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    log::info!("Starting {} v{}", constants::APP_NAME, constants::APP_VERSION);

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::ExportReference { path } => export_reference(&path),
        Command::Evaluate { model } => {
            open_handle(model).and_then(|handle| evaluate_stdin(&handle))
        }
        Command::Status { model } => open_handle(model).and_then(|handle| print_status(&handle)),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn export_reference(path: &Path) -> EngineResult<()> {
    reference_bundle()?.save(path)
}

fn open_handle(model: Option<PathBuf>) -> EngineResult<EngineHandle> {
    let config = EngineConfig::from_env()?;
    match model.or_else(constants::get_model_path) {
        Some(path) => EngineHandle::from_path(&path, config),
        None => {
            log::info!("No model path configured, using the reference model");
            EngineHandle::reference(config)
        }
    }
}

fn read_error(e: io::Error) -> EngineError {
    EngineError::validation(Stage::Validation, "request", format!("cannot read stdin: {}", e))
}

fn output_error(e: impl std::fmt::Display) -> EngineError {
    EngineError::invariant(Stage::Output, format!("cannot write output: {}", e))
}

fn evaluate_stdin(handle: &EngineHandle) -> EngineResult<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line.map_err(read_error)?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match evaluate_line(handle, &line) {
            Ok(value) => value,
            Err(e) => e.to_report(),
        };
        writeln!(stdout, "{}", response).map_err(output_error)?;
    }

    let status = handle.status();
    log::info!(
        "Processed {} request(s), {} failed, avg {:.3} ms",
        status.evaluation_count,
        status.failure_count,
        status.avg_latency_ms
    );
    Ok(())
}

fn evaluate_line(handle: &EngineHandle, line: &str) -> EngineResult<serde_json::Value> {
    let request: Request = serde_json::from_str(line)
        .map_err(|e| EngineError::validation(Stage::Validation, "request", e.to_string()))?;
    let target = request.target.as_deref().map(str::parse::<Crop>).transpose()?;

    let result = handle.evaluate(&request.observation, target)?;
    serde_json::to_value(&result).map_err(output_error)
}

fn print_status(handle: &EngineHandle) -> EngineResult<()> {
    let status = serde_json::to_string_pretty(&handle.status()).map_err(output_error)?;
    println!("{}", status);
    Ok(())
}
