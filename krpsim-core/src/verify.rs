//! Trace verification.
//!
//! Replays an execution trace against its configuration: every launch must
//! name a known process, cycles must not go backward, and every launch must
//! be affordable once earlier completions are credited. Verification
//! reports the first violation or the verified final state.

use std::collections::{BinaryHeap, HashMap};
use std::cmp::Reverse;

use thiserror::Error;

use crate::config::SimulationConfig;
use crate::types::{ProcessSpec, Quantity};

// === ERRORS ===

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("trace file is empty")]
    EmptyTrace,
    #[error("trace line {line}: malformed entry '{content}'")]
    Malformed { line: usize, content: String },
    #[error("trace line {line}: unknown process '{name}'")]
    UnknownProcess { line: usize, name: String },
    #[error("trace line {line}: cycle {cycle} precedes cycle {previous}")]
    NonMonotonicCycle {
        line: usize,
        cycle: u64,
        previous: u64,
    },
    #[error(
        "cycle {cycle}: starting '{process}' needs {required} '{resource}' but only {available} in stock"
    )]
    InsufficientStock {
        cycle: u64,
        process: String,
        resource: String,
        required: Quantity,
        available: Quantity,
    },
    #[error("declared final cycle {declared} precedes the last completion at cycle {replayed}")]
    FinalCycleMismatch { declared: u64, replayed: u64 },
}

// === TRACE PARSING ===

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub cycle: u64,
    pub process: String,
}

/// Parse trace text into entries plus the optional trailing final cycle.
pub fn parse_trace(text: &str) -> Result<(Vec<TraceEntry>, Option<u64>), VerifyError> {
    let mut entries = Vec::new();
    let mut final_cycle = None;

    let mut saw_content = false;
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        saw_content = true;

        if let Some((cycle, name)) = line.split_once(':') {
            let cycle: u64 = cycle.trim().parse().map_err(|_| VerifyError::Malformed {
                line: line_no,
                content: line.to_string(),
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(VerifyError::Malformed {
                    line: line_no,
                    content: line.to_string(),
                });
            }
            entries.push(TraceEntry {
                cycle,
                process: name.to_string(),
            });
        } else {
            final_cycle = Some(line.parse().map_err(|_| VerifyError::Malformed {
                line: line_no,
                content: line.to_string(),
            })?);
        }
    }

    if !saw_content {
        return Err(VerifyError::EmptyTrace);
    }
    Ok((entries, final_cycle))
}

// === VERIFICATION ===

#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub executions: usize,
    pub final_cycle: u64,
    /// Stock levels after the replay, sorted by name.
    pub final_stocks: Vec<(String, Quantity)>,
}

impl VerificationReport {
    pub fn stock_of(&self, name: &str) -> Quantity {
        self.final_stocks
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, q)| q)
            .unwrap_or(0)
    }
}

/// Replay a trace against a configuration.
pub fn verify_trace(
    config: &SimulationConfig,
    trace_text: &str,
) -> Result<VerificationReport, VerifyError> {
    let (entries, declared_final) = parse_trace(trace_text)?;

    let by_name: HashMap<&str, &ProcessSpec> = config
        .processes
        .iter()
        .map(|p| (p.name.as_str(), p))
        .collect();

    let mut stocks: HashMap<String, Quantity> = config.initial_stocks.iter().cloned().collect();
    // completion queue ordered by (end_cycle, launch sequence)
    let mut pending: BinaryHeap<Reverse<(u64, usize)>> = BinaryHeap::new();
    let mut scheduled: Vec<&ProcessSpec> = Vec::new();
    let mut current_cycle = 0u64;

    for (index, entry) in entries.iter().enumerate() {
        let line = index + 1;
        if entry.cycle < current_cycle {
            return Err(VerifyError::NonMonotonicCycle {
                line,
                cycle: entry.cycle,
                previous: current_cycle,
            });
        }
        current_cycle = entry.cycle;
        credit_completions(&mut pending, &scheduled, &mut stocks, current_cycle);

        let process = by_name
            .get(entry.process.as_str())
            .copied()
            .ok_or_else(|| VerifyError::UnknownProcess {
                line,
                name: entry.process.clone(),
            })?;

        for (resource, required) in &process.needs {
            let available = stocks.get(resource).copied().unwrap_or(0);
            if available < *required {
                return Err(VerifyError::InsufficientStock {
                    cycle: entry.cycle,
                    process: entry.process.clone(),
                    resource: resource.clone(),
                    required: *required,
                    available,
                });
            }
        }
        for (resource, required) in &process.needs {
            *stocks.entry(resource.clone()).or_insert(0) -= required;
        }

        pending.push(Reverse((entry.cycle + process.delay as u64, scheduled.len())));
        scheduled.push(process);
    }

    // drain the completion queue
    let replayed_final = pending
        .iter()
        .map(|&Reverse((end, _))| end)
        .max()
        .unwrap_or(current_cycle);
    credit_completions(&mut pending, &scheduled, &mut stocks, u64::MAX);

    // the simulator may idle past the last completion, so a later declared
    // final cycle is fine; an earlier one contradicts the replay
    if let Some(declared) = declared_final {
        if declared < replayed_final {
            return Err(VerifyError::FinalCycleMismatch {
                declared,
                replayed: replayed_final,
            });
        }
    }

    let mut final_stocks: Vec<(String, Quantity)> = stocks.into_iter().collect();
    final_stocks.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(VerificationReport {
        executions: entries.len(),
        final_cycle: declared_final.unwrap_or(replayed_final),
        final_stocks,
    })
}

/// Credit the results of every scheduled process completing at or before
/// `cycle`, in (end_cycle, launch order).
fn credit_completions(
    pending: &mut BinaryHeap<Reverse<(u64, usize)>>,
    scheduled: &[&ProcessSpec],
    stocks: &mut HashMap<String, Quantity>,
    cycle: u64,
) {
    while let Some(&Reverse((end, seq))) = pending.peek() {
        if end > cycle {
            break;
        }
        pending.pop();
        for (resource, qty) in &scheduled[seq].results {
            *stocks.entry(resource.clone()).or_insert(0) += qty;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    const CONFIG: &str = "\
euro:1000
buy:(euro:100):(item:1):1
sell:(item:1):(euro:300):1
optimize:(euro)
";

    #[test]
    fn valid_trace_replays_to_final_stocks() {
        let config = parse_config(CONFIG).unwrap();
        let report = verify_trace(&config, "0:buy\n1:sell\n2\n").unwrap();
        assert_eq!(report.executions, 2);
        assert_eq!(report.final_cycle, 2);
        assert_eq!(report.stock_of("euro"), 1200);
        assert_eq!(report.stock_of("item"), 0);
    }

    #[test]
    fn spending_before_completion_is_rejected() {
        let config = parse_config(CONFIG).unwrap();
        // sell at cycle 0 needs an item that only exists at cycle 1
        let err = verify_trace(&config, "0:buy\n0:sell\n").unwrap_err();
        assert!(matches!(err, VerifyError::InsufficientStock { .. }));
    }

    #[test]
    fn unknown_process_and_backward_cycles_are_rejected() {
        let config = parse_config(CONFIG).unwrap();
        let err = verify_trace(&config, "0:steal\n").unwrap_err();
        assert!(matches!(err, VerifyError::UnknownProcess { .. }));

        let err = verify_trace(&config, "5:buy\n3:buy\n").unwrap_err();
        assert!(matches!(err, VerifyError::NonMonotonicCycle { .. }));
    }

    #[test]
    fn final_cycle_before_last_completion_is_rejected() {
        let config = parse_config(CONFIG).unwrap();
        let err = verify_trace(&config, "0:buy\n0\n").unwrap_err();
        assert!(matches!(err, VerifyError::FinalCycleMismatch { .. }));

        // idling past the last completion is legitimate
        let report = verify_trace(&config, "0:buy\n9\n").unwrap();
        assert_eq!(report.final_cycle, 9);
    }

    #[test]
    fn empty_and_malformed_traces_are_rejected() {
        let config = parse_config(CONFIG).unwrap();
        assert!(matches!(
            verify_trace(&config, "\n\n"),
            Err(VerifyError::EmptyTrace)
        ));
        assert!(matches!(
            verify_trace(&config, "abc:buy\n"),
            Err(VerifyError::Malformed { .. })
        ));
    }
}
