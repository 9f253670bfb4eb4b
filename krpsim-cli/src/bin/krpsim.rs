//! `krpsim` — run a process simulation over a configuration file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use krpsim_core::{render_final_stocks, write_trace_file, Simulation, SimulationConfig};

#[derive(Parser)]
#[command(
    name = "krpsim",
    about = "Discrete-cycle resource-flow simulator and optimizer"
)]
struct Args {
    /// Configuration file (.krpsim format)
    config: PathBuf,
    /// Number of cycles to simulate
    delay: u64,
    /// Write the execution trace to this file for later verification
    #[arg(long)]
    trace: Option<PathBuf>,
    /// Emit the result as JSON instead of the plain report
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if args.delay == 0 {
        eprintln!("Error: delay must be a positive number of cycles");
        return ExitCode::FAILURE;
    }

    let config = match SimulationConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut simulation = match Simulation::new(&config, args.delay) {
        Ok(simulation) => simulation,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "# {} processes, {} stocks, optimizing: {}",
        config.processes.len(),
        config.initial_stocks.len(),
        config.targets.join(", ")
    );
    println!("Main walk:");

    let result = simulation.run();
    for record in &result.executions {
        println!("{}:{}", record.cycle, record.process);
    }
    println!(
        "# simulation ended at cycle {} ({:?})",
        result.final_cycle, result.termination
    );

    if args.json {
        match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                eprintln!("Error: failed to serialize result: {err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print!("{}", render_final_stocks(&result));
    }

    if let Some(path) = &args.trace {
        if let Err(err) = write_trace_file(path, &result) {
            eprintln!("Error: failed to write trace file: {err}");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
