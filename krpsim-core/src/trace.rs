//! Execution trace rendering.
//!
//! The trace format is one `cycle:process_name` line per launch, in launch
//! order, followed by the final cycle number on its own line. The same
//! format feeds the verifier.

use std::fs;
use std::io;
use std::path::Path;

use crate::engine::SimulationResult;

/// Render the full trace: one line per launch plus the final cycle.
pub fn render_trace(result: &SimulationResult) -> String {
    let mut out = String::new();
    for record in &result.executions {
        out.push_str(&format!("{}:{}\n", record.cycle, record.process));
    }
    out.push_str(&format!("{}\n", result.final_cycle));
    out
}

/// Render the final stock report, one `name => quantity` line per resource.
pub fn render_final_stocks(result: &SimulationResult) -> String {
    let mut out = String::from("Stock:\n");
    for (name, qty) in &result.final_stocks {
        out.push_str(&format!("  {name} => {qty}\n"));
    }
    out
}

/// Write the trace to a file for later verification.
pub fn write_trace_file(path: impl AsRef<Path>, result: &SimulationResult) -> io::Result<()> {
    fs::write(path, render_trace(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ExecutionRecord, TerminationReason};

    fn sample_result() -> SimulationResult {
        SimulationResult {
            executions: vec![
                ExecutionRecord {
                    cycle: 0,
                    process: "buy".to_string(),
                },
                ExecutionRecord {
                    cycle: 1,
                    process: "sell".to_string(),
                },
            ],
            final_stocks: vec![("euro".to_string(), 1200), ("item".to_string(), 0)],
            final_cycle: 2,
            termination: TerminationReason::NoRunnableProcess,
        }
    }

    #[test]
    fn trace_lists_launches_then_final_cycle() {
        assert_eq!(render_trace(&sample_result()), "0:buy\n1:sell\n2\n");
    }

    #[test]
    fn stock_report_lists_each_resource() {
        let report = render_final_stocks(&sample_result());
        assert!(report.contains("euro => 1200"));
        assert!(report.contains("item => 0"));
    }
}
