//! The process selector.
//!
//! An [`Optimizer`] is an explicit value carrying the immutable analysis and
//! the mutable phase state; several optimizers can coexist. Construction
//! validates the configuration and runs the one-shot graph analysis; from
//! then on [`Optimizer::select`] is called once per cycle (possibly several
//! times within a cycle as the simulator launches processes) and picks the
//! next process to start, or none.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::analysis::Analysis;
use crate::bottleneck;
use crate::phase::{detect_phase, Phase, PhaseState};
use crate::scoring::score_process;
use crate::types::{
    Process, ProcessId, ProcessSpec, Quantity, ResourceId, ResourceTable, StockLevels,
};

// === SELECTOR CONSTANTS ===

/// Consecutive stalled cycles before cash-flow recovery engages.
const STALL_CYCLES_BEFORE_CASH_FLOW: u32 = 3;
/// Scores below this floor read as "no selection". Penalty factors push
/// crushed candidates many orders of magnitude below it, while any
/// unpenalized candidate scores well above.
const MIN_SELECTABLE_SCORE: f64 = 1.0;
/// High-value process runnable at full bulk scale, late phases.
const HV_FULL_BULK_LATE_BOOST: f64 = 10_000_000.0;
/// High-value process runnable at full bulk scale, early phases.
const HV_FULL_BULK_EARLY_BOOST: f64 = 1_000_000.0;
/// High-value process runnable for a single execution only.
const HV_SINGLE_RUN_BOOST: f64 = 100.0;
/// Base boost for producers of a short bulk resource.
const CRITICAL_BOOST_BASE: f64 = 100.0;
/// Shortage-proportional part of the critical boost, capped.
const CRITICAL_BOOST_CAP: f64 = 1000.0;

// === ERRORS ===

/// Fatal configuration problems caught at initialization.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("process '{name}' has non-positive delay")]
    NonPositiveDelay { name: String },
    #[error("duplicate process name '{name}'")]
    DuplicateProcess { name: String },
    #[error("optimization target '{name}' is neither consumed nor produced by any process")]
    UnusedTarget { name: String },
}

// === OPTIMIZER ===

#[derive(Debug, Clone)]
pub struct Optimizer {
    resources: ResourceTable,
    processes: Vec<Process>,
    analysis: Analysis,
    state: PhaseState,
    horizon: u64,
    time_optimized: bool,
}

impl Optimizer {
    /// Validate the configuration, intern all resources, and run the
    /// one-shot analysis. An empty process list is accepted and yields an
    /// optimizer that always declines.
    pub fn new(
        specs: &[ProcessSpec],
        targets: &[String],
        horizon: u64,
    ) -> Result<Self, InitError> {
        let mut seen = HashSet::new();
        for spec in specs {
            if spec.delay == 0 {
                return Err(InitError::NonPositiveDelay {
                    name: spec.name.clone(),
                });
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(InitError::DuplicateProcess {
                    name: spec.name.clone(),
                });
            }
        }

        let mut resources = ResourceTable::new();
        let processes: Vec<Process> = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| Process {
                id: ProcessId(i as u32),
                name: spec.name.clone(),
                needs: intern_bundle(&mut resources, &spec.needs),
                results: intern_bundle(&mut resources, &spec.results),
                delay: spec.delay,
            })
            .collect();

        let time_optimized = targets.iter().any(|t| t == "time");
        let mut effective: Vec<ResourceId> = Vec::new();
        for name in targets.iter().filter(|t| t.as_str() != "time") {
            let touched = specs.iter().any(|s| {
                s.needs.iter().chain(s.results.iter()).any(|(r, _)| r == name)
            });
            if !touched {
                return Err(InitError::UnusedTarget { name: name.clone() });
            }
            // the touch check guarantees the name is interned
            if let Some(id) = resources.lookup(name) {
                if !effective.contains(&id) {
                    effective.push(id);
                }
            }
        }

        let analysis = Analysis::build(&processes, &effective, resources.len(), horizon);

        Ok(Self {
            resources,
            processes,
            analysis,
            state: PhaseState::new(),
            horizon,
            time_optimized,
        })
    }

    // === ACCESSORS ===

    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn analysis(&self) -> &Analysis {
        &self.analysis
    }

    pub fn phase(&self) -> Phase {
        self.state.current
    }

    pub fn cash_flow_mode(&self) -> bool {
        self.state.cash_flow_mode
    }

    pub fn horizon(&self) -> u64 {
        self.horizon
    }

    /// Whether the configuration asked to optimize for `time`.
    pub fn time_optimized(&self) -> bool {
        self.time_optimized
    }

    pub fn process_name(&self, id: ProcessId) -> &str {
        &self.processes[id.index()].name
    }

    // === SELECTION ===

    /// Pick the process to start this cycle, or none to idle.
    pub fn select(&mut self, cycle: u64, stocks: &StockLevels) -> Option<ProcessId> {
        self.select_filtered(cycle, stocks, |_| true)
    }

    /// Like [`select`](Self::select), with candidates restricted by a
    /// caller-side filter (the simulator excludes processes it already
    /// launched this cycle).
    pub fn select_filtered(
        &mut self,
        cycle: u64,
        stocks: &StockLevels,
        allow: impl Fn(ProcessId) -> bool,
    ) -> Option<ProcessId> {
        let can_execute_hv = self
            .analysis
            .any_high_value_runnable(&self.processes, stocks);
        if can_execute_hv {
            self.state.hv_was_runnable = true;
        }

        let next = detect_phase(
            &self.analysis,
            &self.state,
            cycle,
            stocks,
            self.horizon,
            can_execute_hv,
        );
        if next != self.state.current {
            tracing::debug!(cycle, from = ?self.state.current, to = ?next, "phase transition");
            self.state.current = next;
        }

        let runnable: Vec<ProcessId> = self
            .processes
            .iter()
            .filter(|p| allow(p.id) && p.can_run(stocks))
            .map(|p| p.id)
            .collect();

        if !runnable.is_empty() {
            if let Some(pid) = bottleneck::find_bottleneck(
                &self.processes,
                &self.analysis,
                self.state.current,
                self.state.cash_flow_mode,
                stocks,
                &runnable,
            ) {
                self.state.stuck_counter = 0;
                tracing::debug!(cycle, process = %self.process_name(pid), "bottleneck override");
                return Some(pid);
            }

            if let Some(pid) = self.rank(&runnable, stocks, self.state.cash_flow_mode) {
                self.state.stuck_counter = 0;
                if self.state.cash_flow_mode {
                    tracing::debug!(cycle, "production resumed, leaving cash-flow mode");
                    self.state.cash_flow_mode = false;
                }
                return Some(pid);
            }
        }

        self.note_stall(cycle);
        if self.state.stuck_counter >= STALL_CYCLES_BEFORE_CASH_FLOW
            && !self.state.cash_flow_mode
        {
            self.state.cash_flow_mode = true;
            tracing::info!(cycle, "selector stalled, entering cash-flow mode");
            // rescore with reservations relaxed; keep the mode and counter
            // until production actually resumes
            if !runnable.is_empty() {
                if let Some(pid) = self.rank(&runnable, stocks, true) {
                    return Some(pid);
                }
            }
        }
        None
    }

    /// Adapter for the external string-keyed stock shape.
    pub fn select_named(
        &mut self,
        cycle: u64,
        stocks_by_name: &HashMap<String, Quantity>,
    ) -> Option<&str> {
        let mut stocks = StockLevels::zeroed(self.resources.len());
        for (name, &qty) in stocks_by_name {
            if let Some(id) = self.resources.lookup(name) {
                stocks.set(id, qty);
            }
        }
        let pid = self.select(cycle, &stocks)?;
        Some(self.process_name(pid))
    }

    // === RANKING ===

    /// Score every runnable candidate, apply the selector-level boosts, and
    /// sort by (critical, depth, score, name).
    fn rank(
        &self,
        runnable: &[ProcessId],
        stocks: &StockLevels,
        cash_flow_mode: bool,
    ) -> Option<ProcessId> {
        let mut best: Option<(bool, u32, f64, &str)> = None;
        let mut best_pid = None;

        for &pid in runnable {
            let process = &self.processes[pid.index()];
            let scored = score_process(
                process,
                stocks,
                self.state.current,
                &self.analysis,
                cash_flow_mode,
            );
            let mut score = scored.score;

            // High-value boosts: full bulk readiness dominates everything,
            // a single-run readiness still jumps the queue.
            if self.analysis.is_high_value(pid) {
                score *= if self.analysis.can_run_bulk(process, stocks) {
                    if self.state.current.is_late() {
                        HV_FULL_BULK_LATE_BOOST
                    } else {
                        HV_FULL_BULK_EARLY_BOOST
                    }
                } else {
                    HV_SINGLE_RUN_BOOST
                };
            }

            // Critical-resource boost for producers refilling a short bulk
            // stockpile. Reservation- or loop-penalized candidates are not
            // critical: the penalty must keep them out of the front of the
            // sort.
            let mut critical = false;
            let mut critical_depth = u32::MAX;
            if !scored.dips_into_reserve && !scored.loop_penalized {
                for &(resource, _) in &process.results {
                    let bulk = self.analysis.bulk_target(resource);
                    let held = stocks.get(resource);
                    if bulk > 0 && held < bulk {
                        let shortage = (bulk - held) as f64;
                        score *= CRITICAL_BOOST_BASE + (shortage / 10.0).min(CRITICAL_BOOST_CAP);
                        critical = true;
                        let depth = self.analysis.depth(resource).unwrap_or(u32::MAX);
                        critical_depth = critical_depth.min(depth);
                    }
                }
            }

            if !score.is_finite() {
                score = f64::MAX;
            }
            if score < MIN_SELECTABLE_SCORE {
                continue;
            }

            let depth_key = if critical { critical_depth } else { 0 };
            let key = (critical, depth_key, score, process.name.as_str());
            if best.map_or(true, |b| ranks_above(key, b)) {
                best = Some(key);
                best_pid = Some(pid);
            }
        }

        best_pid
    }

    fn note_stall(&mut self, cycle: u64) {
        // at most one stall per cycle index, so repeated calls with the
        // same inputs return the same decision
        if self.state.last_stall_cycle != Some(cycle) {
            self.state.last_stall_cycle = Some(cycle);
            self.state.stuck_counter += 1;
        }
    }
}

/// Ordering for the selection sort: critical producers first, closer to the
/// high-value chain first among them, then score, then name for
/// determinism.
fn ranks_above(a: (bool, u32, f64, &str), b: (bool, u32, f64, &str)) -> bool {
    let (a_crit, a_depth, a_score, a_name) = a;
    let (b_crit, b_depth, b_score, b_name) = b;
    if a_crit != b_crit {
        return a_crit;
    }
    if a_crit && a_depth != b_depth {
        return a_depth < b_depth;
    }
    if a_score != b_score {
        return a_score > b_score;
    }
    a_name < b_name
}

fn intern_bundle(
    resources: &mut ResourceTable,
    bundle: &[(String, Quantity)],
) -> Vec<(ResourceId, Quantity)> {
    let mut entries: HashMap<ResourceId, Quantity> = HashMap::new();
    for (name, qty) in bundle {
        // a repeated resource in one bundle keeps the last quantity
        entries.insert(resources.intern(name), *qty);
    }
    let mut entries: Vec<_> = entries.into_iter().collect();
    entries.sort_by_key(|&(r, _)| r);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade_specs() -> Vec<ProcessSpec> {
        vec![
            ProcessSpec::new("buy", 1)
                .with_need("euro", 100)
                .with_result("item", 1),
            ProcessSpec::new("sell", 1)
                .with_need("item", 1)
                .with_result("euro", 300),
        ]
    }

    fn stocks_for(optimizer: &Optimizer, entries: &[(&str, Quantity)]) -> StockLevels {
        let mut stocks = StockLevels::zeroed(optimizer.resources().len());
        for &(name, qty) in entries {
            let id = optimizer.resources().lookup(name).unwrap();
            stocks.set(id, qty);
        }
        stocks
    }

    #[test]
    fn rejects_invalid_configurations() {
        let specs = vec![ProcessSpec::new("bad", 0).with_result("x", 1)];
        assert!(matches!(
            Optimizer::new(&specs, &[], 10),
            Err(InitError::NonPositiveDelay { .. })
        ));

        let specs = vec![
            ProcessSpec::new("dup", 1).with_result("x", 1),
            ProcessSpec::new("dup", 1).with_result("y", 1),
        ];
        assert!(matches!(
            Optimizer::new(&specs, &[], 10),
            Err(InitError::DuplicateProcess { .. })
        ));

        let specs = vec![ProcessSpec::new("p", 1).with_result("x", 1)];
        let targets = vec!["gold".to_string()];
        assert!(matches!(
            Optimizer::new(&specs, &targets, 10),
            Err(InitError::UnusedTarget { .. })
        ));
    }

    #[test]
    fn empty_process_list_always_declines() {
        let mut optimizer = Optimizer::new(&[], &[], 10).unwrap();
        let stocks = StockLevels::zeroed(0);
        assert_eq!(optimizer.select(0, &stocks), None);
        assert_eq!(optimizer.select(1, &stocks), None);
    }

    #[test]
    fn time_is_stripped_from_effective_targets() {
        let specs = trade_specs();
        let targets = vec!["time".to_string(), "euro".to_string()];
        let optimizer = Optimizer::new(&specs, &targets, 10).unwrap();
        assert!(optimizer.time_optimized());
        assert_eq!(optimizer.analysis().targets().len(), 1);
    }

    #[test]
    fn never_selects_an_unrunnable_process() {
        let specs = trade_specs();
        let targets = vec!["euro".to_string()];
        let mut optimizer = Optimizer::new(&specs, &targets, 10).unwrap();

        // no item: sell cannot run, whatever the scores say
        let stocks = stocks_for(&optimizer, &[("euro", 1000)]);
        let picked = optimizer.select(0, &stocks).unwrap();
        assert_eq!(optimizer.process_name(picked), "buy");
        let process = &optimizer.processes()[picked.index()];
        assert!(process.can_run(&stocks));
    }

    #[test]
    fn selection_is_idempotent_for_identical_inputs() {
        let specs = trade_specs();
        let targets = vec!["euro".to_string()];
        let mut optimizer = Optimizer::new(&specs, &targets, 10).unwrap();

        let stocks = stocks_for(&optimizer, &[("euro", 1000), ("item", 1)]);
        let first = optimizer.select(3, &stocks);
        let second = optimizer.select(3, &stocks);
        assert_eq!(first, second);

        // a declining cycle does not advance hidden state when repeated
        let empty = stocks_for(&optimizer, &[]);
        let first = optimizer.select(4, &empty);
        let second = optimizer.select(4, &empty);
        assert_eq!(first, None);
        assert_eq!(second, None);
        assert_eq!(optimizer.state.stuck_counter, 1);
    }

    #[test]
    fn runnable_high_value_wins_in_selling_with_name_tiebreak() {
        // two identical high-value sellers differing only by name
        let specs = vec![
            ProcessSpec::new("sell_b", 1)
                .with_need("item", 1)
                .with_result("euro", 300),
            ProcessSpec::new("sell_a", 1)
                .with_need("item", 1)
                .with_result("euro", 300),
        ];
        let targets = vec!["euro".to_string()];
        let mut optimizer = Optimizer::new(&specs, &targets, 10).unwrap();

        // item far above its bulk target: no bottleneck, no shortage
        let stocks = stocks_for(&optimizer, &[("item", 100)]);
        let picked = optimizer.select(0, &stocks).unwrap();
        assert_eq!(optimizer.phase(), Phase::Selling);
        assert_eq!(optimizer.process_name(picked), "sell_a");
    }

    #[test]
    fn stall_enters_cash_flow_mode_and_recovers_free_gatherers() {
        // the only runnable process consumes a reserved target; the
        // high-value goal process is unaffordable
        let specs = vec![
            ProcessSpec::new("work", 1).with_result("euro", 1),
            ProcessSpec::new("spend", 1)
                .with_need("euro", 100)
                .with_result("goal", 1),
        ];
        let targets = vec!["goal".to_string()];
        let mut optimizer = Optimizer::new(&specs, &targets, 500).unwrap();

        let stocks = stocks_for(&optimizer, &[]);
        // work is a free gatherer: selectable from the first cycle on,
        // whatever the phase
        for cycle in 0..5 {
            let picked = optimizer.select(cycle, &stocks);
            assert!(picked.is_some(), "cycle {cycle} must not stall forever");
            assert_eq!(optimizer.process_name(picked.unwrap()), "work");
        }
    }

    #[test]
    fn stuck_counter_triggers_cash_flow_after_three_stalled_cycles() {
        let specs = trade_specs();
        let targets = vec!["euro".to_string()];
        let mut optimizer = Optimizer::new(&specs, &targets, 10).unwrap();

        let empty = stocks_for(&optimizer, &[]);
        for cycle in 0..3 {
            assert_eq!(optimizer.select(cycle, &empty), None);
        }
        assert!(optimizer.state.stuck_counter >= 3);
        assert!(optimizer.cash_flow_mode());
    }
}
