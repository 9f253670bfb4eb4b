//! Per-cycle phase state machine.
//!
//! Phases drive the scoring multipliers: gather seed resources first, build
//! up the value chain, convert intermediates toward high-value inputs, then
//! fire the high-value processes. Phases are not sticky; if stocks deplete
//! after a sell the controller moves backward.

use serde::{Deserialize, Serialize};

use crate::analysis::{Analysis, LONG_HORIZON_CYCLES};
use crate::types::StockLevels;

// === TRANSITION THRESHOLDS ===

/// Past this cycle the run is assumed to be converting regardless of stock.
const CONVERSION_CYCLE_FLOOR: u64 = 1000;
/// Past this cycle the run is assumed to be producing regardless of stock.
const PRODUCTION_CYCLE_FLOOR: u64 = 500;
/// Value-chain stock ratio that signals conversion readiness.
const CONVERSION_STOCK_RATIO: f64 = 0.2;
/// Value-chain stock ratio that signals production readiness.
const PRODUCTION_STOCK_RATIO: f64 = 0.02;
/// Long-horizon runs switch to selling for the final fifth of the run.
const SELLING_HORIZON_FRACTION: f64 = 0.8;

// === PHASE ===

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Gathering,
    Production,
    Conversion,
    Selling,
}

impl Phase {
    pub fn is_late(self) -> bool {
        matches!(self, Phase::Conversion | Phase::Selling)
    }
}

/// Mutable per-run optimizer state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseState {
    pub current: Phase,
    /// Consecutive cycles with no positive selection.
    pub stuck_counter: u32,
    /// Recovery mode entered after repeated stalls; relaxes reservations and
    /// boosts gatherers until production resumes.
    pub cash_flow_mode: bool,
    /// Whether any high-value process has ever been runnable this run.
    pub hv_was_runnable: bool,
    /// Cycle of the last counted stall, so repeated calls within one cycle
    /// advance the counter at most once.
    pub last_stall_cycle: Option<u64>,
}

impl PhaseState {
    pub fn new() -> Self {
        Self {
            current: Phase::Gathering,
            stuck_counter: 0,
            cash_flow_mode: false,
            hv_was_runnable: false,
            last_stall_cycle: None,
        }
    }
}

impl Default for PhaseState {
    fn default() -> Self {
        Self::new()
    }
}

// === PHASE DETECTION ===

/// Decide the phase for this cycle. Rules are evaluated in order; without
/// any high-value process the optimizer stays in Gathering permanently.
pub fn detect_phase(
    analysis: &Analysis,
    state: &PhaseState,
    cycle: u64,
    stocks: &StockLevels,
    horizon: u64,
    can_execute_high_value: bool,
) -> Phase {
    if !analysis.has_high_value() {
        return Phase::Gathering;
    }

    if horizon > LONG_HORIZON_CYCLES
        && cycle as f64 >= SELLING_HORIZON_FRACTION * horizon as f64
        && state.hv_was_runnable
    {
        return Phase::Selling;
    }

    if can_execute_high_value {
        return Phase::Selling;
    }

    let ratio = analysis.value_chain_stock_ratio(stocks);
    if cycle > CONVERSION_CYCLE_FLOOR || ratio > CONVERSION_STOCK_RATIO {
        return Phase::Conversion;
    }
    if cycle > PRODUCTION_CYCLE_FLOOR || ratio > PRODUCTION_STOCK_RATIO {
        return Phase::Production;
    }
    if cycle > analysis.gathering_limit_cycle() {
        Phase::Production
    } else {
        Phase::Gathering
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Process, ProcessId, ResourceTable};

    fn trade_analysis() -> (ResourceTable, Vec<Process>, Analysis) {
        let mut table = ResourceTable::new();
        let euro = table.intern("euro");
        let item = table.intern("item");

        let processes = vec![
            Process {
                id: ProcessId(0),
                name: "buy".to_string(),
                needs: vec![(euro, 100)],
                results: vec![(item, 1)],
                delay: 1,
            },
            Process {
                id: ProcessId(1),
                name: "sell".to_string(),
                needs: vec![(item, 1)],
                results: vec![(euro, 300)],
                delay: 1,
            },
        ];
        let analysis = Analysis::build(&processes, &[euro], table.len(), 100);
        (table, processes, analysis)
    }

    #[test]
    fn runnable_high_value_forces_selling() {
        let (table, _, analysis) = trade_analysis();
        let stocks = StockLevels::zeroed(table.len());
        let state = PhaseState::new();

        assert_eq!(
            detect_phase(&analysis, &state, 0, &stocks, 100, true),
            Phase::Selling
        );
        assert_eq!(
            detect_phase(&analysis, &state, 0, &stocks, 100, false),
            Phase::Gathering
        );
    }

    #[test]
    fn stock_ratio_moves_through_production_and_conversion() {
        let (table, _, analysis) = trade_analysis();
        let item = table.lookup("item").unwrap();
        let state = PhaseState::new();

        // bulk target for item is 5; one item puts the ratio at 0.2
        let mut stocks = StockLevels::zeroed(table.len());
        stocks.set(item, 1);
        assert_eq!(
            detect_phase(&analysis, &state, 10, &stocks, 100, false),
            Phase::Production
        );

        stocks.set(item, 2);
        assert_eq!(
            detect_phase(&analysis, &state, 10, &stocks, 100, false),
            Phase::Conversion
        );
    }

    #[test]
    fn cycle_floors_force_transitions_forward() {
        let (table, _, analysis) = trade_analysis();
        let stocks = StockLevels::zeroed(table.len());
        let state = PhaseState::new();

        assert_eq!(
            detect_phase(&analysis, &state, 301, &stocks, 5000, false),
            Phase::Production,
            "gathering limit expires at 300"
        );
        assert_eq!(
            detect_phase(&analysis, &state, 501, &stocks, 5000, false),
            Phase::Production
        );
        assert_eq!(
            detect_phase(&analysis, &state, 1001, &stocks, 5000, false),
            Phase::Conversion
        );
    }

    #[test]
    fn long_horizon_endgame_requires_prior_runnability() {
        let (table, _, analysis) = trade_analysis();
        let stocks = StockLevels::zeroed(table.len());

        let mut state = PhaseState::new();
        assert_eq!(
            detect_phase(&analysis, &state, 80_000, &stocks, 100_000, false),
            Phase::Conversion,
            "never-runnable chains keep converting"
        );

        state.hv_was_runnable = true;
        assert_eq!(
            detect_phase(&analysis, &state, 80_000, &stocks, 100_000, false),
            Phase::Selling
        );
    }

    #[test]
    fn phases_move_backward_when_stocks_deplete() {
        let (table, _, analysis) = trade_analysis();
        let item = table.lookup("item").unwrap();
        let state = PhaseState::new();

        let mut stocks = StockLevels::zeroed(table.len());
        stocks.set(item, 2);
        assert_eq!(
            detect_phase(&analysis, &state, 10, &stocks, 100, false),
            Phase::Conversion
        );
        stocks.set(item, 0);
        assert_eq!(
            detect_phase(&analysis, &state, 10, &stocks, 100, false),
            Phase::Gathering
        );
    }
}
