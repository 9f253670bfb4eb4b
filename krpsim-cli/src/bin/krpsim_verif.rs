//! `krpsim_verif` — verify an execution trace against its configuration.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use krpsim_core::{verify_trace, SimulationConfig};

#[derive(Parser)]
#[command(
    name = "krpsim_verif",
    about = "Replay and verify a krpsim execution trace"
)]
struct Args {
    /// Configuration file (.krpsim format)
    config: PathBuf,
    /// Trace file produced by krpsim
    trace: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match SimulationConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let trace_text = match fs::read_to_string(&args.trace) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("Error: failed to read {}: {err}", args.trace.display());
            return ExitCode::FAILURE;
        }
    };

    match verify_trace(&config, &trace_text) {
        Ok(report) => {
            println!(
                "Trace is valid: {} executions, final cycle {}",
                report.executions, report.final_cycle
            );
            println!("Final stocks:");
            for (name, qty) in &report.final_stocks {
                println!("  {name} => {qty}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Trace is INVALID: {err}");
            ExitCode::FAILURE
        }
    }
}
