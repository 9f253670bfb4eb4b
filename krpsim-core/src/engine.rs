//! Discrete-event simulation driver.
//!
//! Owns the stock vector and the clock, asks the optimizer which process to
//! start, applies consumption at start and production at completion, and
//! jumps the clock between events. The optimizer never mutates stocks; the
//! engine is the only writer.

use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::optimizer::{InitError, Optimizer};
use crate::types::{ProcessId, Quantity, StockLevels};

/// Consecutive idle cycles (selector declining with work still runnable and
/// nothing in flight) tolerated before the run is declared stalled. Gives
/// cycle-driven phase transitions and cash-flow recovery room to act.
const IDLE_CYCLE_LIMIT: u64 = 8;

// === RESULTS ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// The cycle horizon was reached with work still possible.
    HorizonReached,
    /// Nothing was running and no process could start.
    NoRunnableProcess,
    /// Processes remained runnable but the selector persistently declined.
    SelectorStalled,
}

/// One launched process instance, recorded at start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub cycle: u64,
    pub process: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub executions: Vec<ExecutionRecord>,
    /// Final stock levels by resource name, sorted by name.
    pub final_stocks: Vec<(String, Quantity)>,
    pub final_cycle: u64,
    pub termination: TerminationReason,
}

// === SIMULATION ===

#[derive(Debug, Clone)]
struct InFlight {
    process: ProcessId,
    end_cycle: u64,
}

/// A complete simulation run over one configuration.
#[derive(Debug)]
pub struct Simulation {
    optimizer: Optimizer,
    stocks: StockLevels,
    /// Declared stocks no process touches; carried through to the report.
    inert_stocks: Vec<(String, Quantity)>,
    cycle: u64,
    horizon: u64,
    in_flight: Vec<InFlight>,
    executions: Vec<(u64, ProcessId)>,
}

impl Simulation {
    pub fn new(config: &SimulationConfig, horizon: u64) -> Result<Self, InitError> {
        let optimizer = Optimizer::new(&config.processes, &config.targets, horizon)?;

        let mut stocks = StockLevels::zeroed(optimizer.resources().len());
        let mut inert_stocks = Vec::new();
        for (name, qty) in &config.initial_stocks {
            match optimizer.resources().lookup(name) {
                Some(id) => stocks.set(id, *qty),
                None => inert_stocks.push((name.clone(), *qty)),
            }
        }

        Ok(Self {
            optimizer,
            stocks,
            inert_stocks,
            cycle: 0,
            horizon,
            in_flight: Vec::new(),
            executions: Vec::new(),
        })
    }

    pub fn optimizer(&self) -> &Optimizer {
        &self.optimizer
    }

    pub fn stocks(&self) -> &StockLevels {
        &self.stocks
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Run to termination and produce the result.
    pub fn run(&mut self) -> SimulationResult {
        let mut idle_streak = 0u64;
        let mut termination = TerminationReason::HorizonReached;

        while self.cycle < self.horizon {
            self.complete_due();
            let started = self.launch_ready();
            if started > 0 {
                idle_streak = 0;
            }

            if let Some(next_end) = self.next_completion() {
                self.cycle = next_end.min(self.horizon);
            } else {
                if !self.any_runnable() {
                    termination = TerminationReason::NoRunnableProcess;
                    break;
                }
                if started == 0 {
                    idle_streak += 1;
                    if idle_streak > IDLE_CYCLE_LIMIT {
                        termination = TerminationReason::SelectorStalled;
                        break;
                    }
                }
                self.cycle += 1;
            }
        }

        // drain everything still in flight
        while let Some(next_end) = self.next_completion() {
            self.cycle = next_end;
            self.complete_due();
        }

        tracing::info!(
            final_cycle = self.cycle,
            executions = self.executions.len(),
            reason = ?termination,
            "simulation finished"
        );

        self.build_result(termination)
    }

    // === CYCLE STEPS ===

    /// Grant the results of every process completing at the current cycle.
    fn complete_due(&mut self) {
        let cycle = self.cycle;
        let mut index = 0;
        while index < self.in_flight.len() {
            if self.in_flight[index].end_cycle <= cycle {
                let entry = self.in_flight.remove(index);
                let process = &self.optimizer.processes()[entry.process.index()];
                self.stocks.produce(&process.results);
                tracing::debug!(cycle, process = %process.name, "process completed");
            } else {
                index += 1;
            }
        }
    }

    /// Ask the optimizer for processes to start until it declines, at most
    /// one instance of a given process per cycle.
    fn launch_ready(&mut self) -> usize {
        let mut launched = vec![false; self.optimizer.processes().len()];
        let mut started = 0;

        loop {
            let picked =
                self.optimizer
                    .select_filtered(self.cycle, &self.stocks, |pid| !launched[pid.index()]);
            let Some(pid) = picked else {
                break;
            };
            let process = &self.optimizer.processes()[pid.index()];
            if !self.stocks.try_consume(&process.needs) {
                // the selector never hands back an unrunnable process;
                // refuse and stop rather than underflow
                tracing::warn!(cycle = self.cycle, process = %process.name, "selected process is not runnable");
                break;
            }
            launched[pid.index()] = true;
            self.in_flight.push(InFlight {
                process: pid,
                end_cycle: self.cycle + process.delay as u64,
            });
            self.executions.push((self.cycle, pid));
            tracing::info!(cycle = self.cycle, process = %process.name, "started process");
            started += 1;
        }

        started
    }

    fn next_completion(&self) -> Option<u64> {
        self.in_flight.iter().map(|f| f.end_cycle).min()
    }

    fn any_runnable(&self) -> bool {
        self.optimizer
            .processes()
            .iter()
            .any(|p| p.can_run(&self.stocks))
    }

    fn build_result(&self, termination: TerminationReason) -> SimulationResult {
        let executions = self
            .executions
            .iter()
            .map(|&(cycle, pid)| ExecutionRecord {
                cycle,
                process: self.optimizer.process_name(pid).to_string(),
            })
            .collect();

        let mut final_stocks: Vec<(String, Quantity)> = self
            .stocks
            .iter()
            .map(|(id, qty)| (self.optimizer.resources().name(id).to_string(), qty))
            .chain(self.inert_stocks.iter().cloned())
            .collect();
        final_stocks.sort_by(|a, b| a.0.cmp(&b.0));

        SimulationResult {
            executions,
            final_stocks,
            final_cycle: self.cycle,
            termination,
        }
    }
}

impl SimulationResult {
    pub fn stock_of(&self, name: &str) -> Quantity {
        self.final_stocks
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, q)| q)
            .unwrap_or(0)
    }

    /// Number of times a process was launched.
    pub fn launch_count(&self, process: &str) -> usize {
        self.executions.iter().filter(|e| e.process == process).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn delays_defer_production_to_completion() {
        let config = parse_config(
            "seed:1\ngrow:(seed:1):(crop:4):3\noptimize:(crop)\n",
        )
        .unwrap();
        let mut simulation = Simulation::new(&config, 10).unwrap();
        let result = simulation.run();

        assert_eq!(result.launch_count("grow"), 1);
        assert_eq!(result.stock_of("crop"), 4);
        assert_eq!(result.stock_of("seed"), 0);
        assert_eq!(result.termination, TerminationReason::NoRunnableProcess);
    }

    #[test]
    fn terminates_when_nothing_is_runnable() {
        let config = parse_config("fuel:2\nburn:(fuel:1):(heat:1):1\n").unwrap();
        let mut simulation = Simulation::new(&config, 100).unwrap();
        let result = simulation.run();

        assert_eq!(result.launch_count("burn"), 2);
        assert_eq!(result.stock_of("heat"), 2);
        assert_eq!(result.termination, TerminationReason::NoRunnableProcess);
    }

    #[test]
    fn horizon_caps_the_run_and_drains_in_flight_work() {
        // a free gatherer runs every cycle forever
        let config = parse_config("till:():(soil:1):1\noptimize:(soil)\n").unwrap();
        let mut simulation = Simulation::new(&config, 5).unwrap();
        let result = simulation.run();

        assert_eq!(result.termination, TerminationReason::HorizonReached);
        assert_eq!(result.launch_count("till"), 5);
        assert_eq!(result.stock_of("soil"), 5);
        assert_eq!(result.final_cycle, 5);
    }

    #[test]
    fn untouched_stocks_survive_to_the_report() {
        let config =
            parse_config("relic:7\nfuel:1\nburn:(fuel:1):(heat:1):1\n").unwrap();
        let mut simulation = Simulation::new(&config, 10).unwrap();
        let result = simulation.run();
        assert_eq!(result.stock_of("relic"), 7);
    }
}
