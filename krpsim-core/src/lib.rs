//! Discrete-cycle resource-flow optimization library
//!
//! This crate implements the `krpsim` process simulator: given a declarative
//! configuration of resources, processes (integer inputs, integer outputs, a
//! positive delay) and a set of optimization targets, it repeatedly selects
//! which runnable process to start so that the target resources are
//! maximized over a bounded cycle horizon.
//!
//! ## The selector
//!
//! The decision engine is a deterministic greedy policy built from five
//! coupled subsystems:
//!
//! - **Graph analysis** (`analysis`): a one-shot pass classifying high-value
//!   processes, mapping their value chains, and sizing bulk targets and
//!   target reserves with a scale-adaptive multiplier.
//! - **Phase control** (`phase`): a per-cycle state machine over
//!   Gathering, Production, Conversion, and Selling, driven by stock ratios
//!   and the cycle index.
//! - **Scoring** (`scoring`): a pure multi-factor score combining base
//!   efficiency, target-production bonuses, bulk and reservation penalties,
//!   and phase multipliers.
//! - **Bottleneck detection** (`bottleneck`): urgency-ranked overrides that
//!   force producers of missing value-chain resources ahead of scoring.
//! - **Selection** (`optimizer`): the per-cycle driver with high-value
//!   boosts, critical-resource sort keys, stall detection, and cash-flow
//!   recovery.
//!
//! There is no lookahead, no learning across runs, and no concurrency: the
//! optimizer is an explicit value, `select` is synchronous, and identical
//! inputs produce identical decisions.
//!
//! ## Around the selector
//!
//! - `config`     `.krpsim` configuration parsing
//! - `engine`     discrete-event simulation driver
//! - `trace`      execution trace rendering
//! - `verify`     trace replay verification
//! - `types`      interned ids, process records, flat stock vectors

pub mod analysis;
pub mod bottleneck;
pub mod config;
pub mod engine;
pub mod optimizer;
pub mod phase;
pub mod scoring;
pub mod trace;
pub mod types;
pub mod verify;

// Re-export the common surface at the crate root

pub use analysis::Analysis;
pub use config::{parse_config, ParseError, SimulationConfig};
pub use engine::{
    ExecutionRecord, Simulation, SimulationResult, TerminationReason,
};
pub use optimizer::{InitError, Optimizer};
pub use phase::{detect_phase, Phase, PhaseState};
pub use scoring::{score_process, ProcessScore};
pub use trace::{render_final_stocks, render_trace, write_trace_file};
pub use types::{
    Process, ProcessId, ProcessSpec, Quantity, ResourceId, ResourceTable, StockLevels,
};
pub use verify::{parse_trace, verify_trace, TraceEntry, VerificationReport, VerifyError};
