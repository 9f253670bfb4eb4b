//! Configuration parsing for the `.krpsim` format.
//!
//! A configuration is a line-oriented text file:
//!
//! ```text
//! # comment
//! euro:1000
//! buy_wood:(euro:100):(wood:10):20
//! optimize:(time;euro)
//! ```
//!
//! Stock lines declare starting quantities, process lines declare
//! `name:(needs):(results):delay`, and a single trailing `optimize:`
//! directive names the resources to maximize. Every resource referenced by a
//! process is implicitly added to the stock set at zero.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ProcessSpec, Quantity};

// === ERRORS ===

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error("line {line}: duplicate stock definition '{name}'")]
    DuplicateStock { line: usize, name: String },
    #[error("line {line}: duplicate process name '{name}'")]
    DuplicateProcess { line: usize, name: String },
    #[error("line {line}: stock and process definitions must come before the optimize directive")]
    DefinitionAfterOptimize { line: usize },
    #[error("line {line}: multiple optimize directives")]
    MultipleOptimize { line: usize },
    #[error("line {line}: optimize target '{name}' is not a declared stock")]
    UnknownTarget { line: usize, name: String },
    #[error("no processes defined in configuration")]
    NoProcesses,
    #[error("failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ParseError {
    fn malformed(line: usize, message: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            message: message.into(),
        }
    }
}

// === CONFIGURATION ===

/// Parsed simulation configuration: starting stocks, the process list, and
/// the ordered optimization targets (possibly including the `time`
/// pseudo-resource).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub initial_stocks: Vec<(String, Quantity)>,
    pub processes: Vec<ProcessSpec>,
    pub targets: Vec<String>,
}

impl SimulationConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        parse_config(&text)
    }

    pub fn stock_of(&self, name: &str) -> Quantity {
        self.initial_stocks
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, q)| q)
            .unwrap_or(0)
    }
}

// === PARSER ===

/// Parse configuration text into a [`SimulationConfig`].
pub fn parse_config(text: &str) -> Result<SimulationConfig, ParseError> {
    let mut stocks: Vec<(String, Quantity)> = Vec::new();
    let mut processes: Vec<ProcessSpec> = Vec::new();
    let mut targets: Vec<String> = Vec::new();
    let mut saw_optimize = false;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix("optimize:") {
            if saw_optimize {
                return Err(ParseError::MultipleOptimize { line: line_no });
            }
            saw_optimize = true;
            let inner = rest
                .trim()
                .strip_prefix('(')
                .and_then(|s| s.strip_suffix(')'))
                .ok_or_else(|| {
                    ParseError::malformed(line_no, "optimize directive must be optimize:(...)")
                })?;
            for target in inner.split(';').map(str::trim).filter(|t| !t.is_empty()) {
                if target != "time" && !stocks.iter().any(|(n, _)| n == target) {
                    return Err(ParseError::UnknownTarget {
                        line: line_no,
                        name: target.to_string(),
                    });
                }
                targets.push(target.to_string());
            }
        } else if line.contains('(') {
            if saw_optimize {
                return Err(ParseError::DefinitionAfterOptimize { line: line_no });
            }
            let process = parse_process_line(line, line_no)?;
            if processes.iter().any(|p| p.name == process.name) {
                return Err(ParseError::DuplicateProcess {
                    line: line_no,
                    name: process.name,
                });
            }
            enrich_stocks(&mut stocks, &process);
            processes.push(process);
        } else if line.contains(':') {
            if saw_optimize {
                return Err(ParseError::DefinitionAfterOptimize { line: line_no });
            }
            let (name, qty) = line.split_once(':').unwrap_or((line, ""));
            let name = name.trim();
            if name.is_empty() {
                return Err(ParseError::malformed(line_no, "empty stock name"));
            }
            if stocks.iter().any(|(n, _)| n == name) {
                return Err(ParseError::DuplicateStock {
                    line: line_no,
                    name: name.to_string(),
                });
            }
            let qty: Quantity = qty.trim().parse().map_err(|_| {
                ParseError::malformed(line_no, format!("invalid quantity for stock '{name}'"))
            })?;
            if qty < 0 {
                return Err(ParseError::malformed(
                    line_no,
                    format!("stock '{name}' must be non-negative"),
                ));
            }
            stocks.push((name.to_string(), qty));
        } else {
            return Err(ParseError::malformed(
                line_no,
                format!("unrecognized line '{line}'"),
            ));
        }
    }

    if processes.is_empty() {
        return Err(ParseError::NoProcesses);
    }

    Ok(SimulationConfig {
        initial_stocks: stocks,
        processes,
        targets,
    })
}

/// Parse one `name:(needs):(results):delay` line.
fn parse_process_line(line: &str, line_no: usize) -> Result<ProcessSpec, ParseError> {
    let (name, remainder) = line
        .split_once(':')
        .ok_or_else(|| ParseError::malformed(line_no, "missing ':' after process name"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(ParseError::malformed(line_no, "empty process name"));
    }

    let (needs_part, rest) = remainder.split_once("):(").ok_or_else(|| {
        ParseError::malformed(line_no, "expected 'name:(needs):(results):delay'")
    })?;
    let needs_inner = needs_part.trim().strip_prefix('(').ok_or_else(|| {
        ParseError::malformed(line_no, "needs list must be parenthesized")
    })?;

    let (results_inner, delay_part) = rest.split_once("):").ok_or_else(|| {
        ParseError::malformed(line_no, "expected ':delay' after results list")
    })?;

    let needs = parse_bundle(needs_inner, line_no)?;
    let results = parse_bundle(results_inner, line_no)?;
    let delay: u32 = delay_part.trim().parse().map_err(|_| {
        ParseError::malformed(line_no, format!("invalid delay '{}'", delay_part.trim()))
    })?;
    if delay == 0 {
        return Err(ParseError::malformed(line_no, "delay must be positive"));
    }

    Ok(ProcessSpec {
        name: name.to_string(),
        needs,
        results,
        delay,
    })
}

/// Parse a `res:qty;res:qty` bundle (inner content, no parentheses).
fn parse_bundle(inner: &str, line_no: usize) -> Result<Vec<(String, Quantity)>, ParseError> {
    let mut entries = Vec::new();
    for pair in inner.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, qty) = pair
            .split_once(':')
            .ok_or_else(|| ParseError::malformed(line_no, format!("missing ':' in '{pair}'")))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ParseError::malformed(line_no, "empty resource name"));
        }
        let qty: Quantity = qty.trim().parse().map_err(|_| {
            ParseError::malformed(line_no, format!("invalid quantity for '{name}'"))
        })?;
        if qty <= 0 {
            return Err(ParseError::malformed(
                line_no,
                format!("quantity for '{name}' must be positive"),
            ));
        }
        entries.push((name.to_string(), qty));
    }
    Ok(entries)
}

/// Every resource a process touches becomes a known stock (at zero) so the
/// optimize directive and reports can refer to it.
fn enrich_stocks(stocks: &mut Vec<(String, Quantity)>, process: &ProcessSpec) {
    for (name, _) in process.needs.iter().chain(process.results.iter()) {
        if !stocks.iter().any(|(n, _)| n == name) {
            stocks.push((name.clone(), 0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# simple trade config
euro:1000
buy:(euro:100):(item:1):1
sell:(item:1):(euro:300):1
optimize:(euro)
";

    #[test]
    fn parses_stocks_processes_and_targets() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.stock_of("euro"), 1000);
        // item was enriched in at zero
        assert_eq!(config.stock_of("item"), 0);
        assert_eq!(config.processes.len(), 2);
        assert_eq!(config.targets, vec!["euro".to_string()]);

        let buy = &config.processes[0];
        assert_eq!(buy.name, "buy");
        assert_eq!(buy.needs, vec![("euro".to_string(), 100)]);
        assert_eq!(buy.results, vec![("item".to_string(), 1)]);
        assert_eq!(buy.delay, 1);
    }

    #[test]
    fn parses_empty_need_and_result_lists() {
        let config = parse_config("work:():(euro:1):1\noptimize:(euro)\n").unwrap();
        let work = &config.processes[0];
        assert!(work.needs.is_empty());
        assert_eq!(work.results, vec![("euro".to_string(), 1)]);

        let config = parse_config("burn:(wood:1):():2\n").unwrap();
        let burn = &config.processes[0];
        assert_eq!(burn.needs, vec![("wood".to_string(), 1)]);
        assert!(burn.results.is_empty());
    }

    #[test]
    fn rejects_duplicates_and_misplaced_lines() {
        let err = parse_config("euro:10\neuro:20\nnoop:(euro:1):(x:1):1\n").unwrap_err();
        assert!(matches!(err, ParseError::DuplicateStock { .. }));

        let err =
            parse_config("a:(x:1):(y:1):1\na:(x:1):(y:1):1\n").unwrap_err();
        assert!(matches!(err, ParseError::DuplicateProcess { .. }));

        let err = parse_config("a:(x:1):(y:1):1\noptimize:(y)\nz:5\n").unwrap_err();
        assert!(matches!(err, ParseError::DefinitionAfterOptimize { .. }));
    }

    #[test]
    fn rejects_unknown_target_and_bad_delay() {
        let err = parse_config("a:(x:1):(y:1):1\noptimize:(gold)\n").unwrap_err();
        assert!(matches!(err, ParseError::UnknownTarget { .. }));

        let err = parse_config("a:(x:1):(y:1):0\n").unwrap_err();
        assert!(matches!(err, ParseError::Malformed { .. }));
    }

    #[test]
    fn time_target_needs_no_stock() {
        let config = parse_config("a:(x:1):(y:1):1\noptimize:(time;y)\n").unwrap();
        assert_eq!(config.targets, vec!["time".to_string(), "y".to_string()]);
    }

    #[test]
    fn empty_configuration_is_an_error() {
        assert!(matches!(
            parse_config("# nothing here\n"),
            Err(ParseError::NoProcesses)
        ));
    }
}
