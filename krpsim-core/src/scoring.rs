//! Multi-factor process scoring.
//!
//! A pure function over (process, stocks, phase, analysis, flags). Scores
//! span many orders of magnitude: penalties push candidates down to 1e-8 of
//! base while boosts climb to 1e7, so every multiplicative step is clamped
//! to a finite non-negative range and the final score is never NaN or
//! infinite.

use crate::analysis::Analysis;
use crate::phase::Phase;
use crate::types::{Process, Quantity, StockLevels};

// === BASE SCORING ===

/// Base score for processes with no inputs at all.
const FREE_PROCESS_BASE: f64 = 100_000.0;
/// Output/input efficiency is scaled by this factor.
const EFFICIENCY_SCALE: f64 = 100.0;

// === TARGET PRODUCTION BONUS ===

const TARGET_BONUS_WEIGHT: f64 = 50_000.0;
const BONUS_TIER_HUGE: f64 = 200.0; // net > 10_000
const BONUS_TIER_LARGE: f64 = 80.0; // net > 1_000
const BONUS_TIER_MEDIUM: f64 = 30.0; // net > 100
const BONUS_TIER_SMALL: f64 = 10.0; // net > 0

// === BULK FACTORS ===

/// Consuming a bulk resource still below its target.
const BULK_CONSUME_PENALTY: f64 = 1e-4;
/// Producing a bulk resource below its target.
const BULK_PRODUCE_BASE: f64 = 1000.0;
const BULK_PRODUCE_SHORTAGE_WEIGHT: f64 = 100_000.0;
/// Producing a bulk resource already at its target.
const BULK_SATISFIED_PENALTY: f64 = 1e-4;

// === RESERVATION FACTORS ===

/// A value-chain producer dipping into target reserves.
const RESERVE_CHAIN_PENALTY: f64 = 1e-3;
/// Any other process dipping into target reserves.
const RESERVE_HARD_PENALTY: f64 = 1e-7;
// Graduated scarcity factors once the reserve is respected.
const SCARCITY_TIGHT: f64 = 1e-4; // available < 100
const SCARCITY_LOW: f64 = 1e-3; // available < 1000
const SCARCITY_MODERATE: f64 = 1e-2; // available < 10_000
const SCARCITY_COMFORTABLE: f64 = 0.1;

// === PHASE MULTIPLIERS ===

const GATHERER_GATHERING_BOOST: f64 = 2.0;
const GATHERER_PRODUCTION_PENALTY: f64 = 1e-4;
const GATHERER_CONVERSION_PENALTY: f64 = 1e-6;
const GATHERER_SELLING_PENALTY: f64 = 1e-8;
const GATHERER_CASH_FLOW_BOOST: f64 = 2.0;
const DEEP_PRODUCER_PRODUCTION_BOOST: f64 = 50.0;
const DIRECT_PRODUCER_CONVERSION_BOOST: f64 = 500.0;
const DEEP_PRODUCER_CONVERSION_BOOST: f64 = 100.0;
const HIGH_VALUE_SELLING_BOOST: f64 = 1e7;

/// Conversion-loop guard.
const LOOP_GUARD_PENALTY: f64 = 1e-5;

/// Upper clamp keeping repeated boosts finite.
const SCORE_CEILING: f64 = 1e300;

// === RESULT ===

/// Score plus the penalty provenance the selector needs: a process crushed
/// by reservation or loop penalties must not ride the critical-resource
/// sort key back to the top.
#[derive(Debug, Clone, Copy)]
pub struct ProcessScore {
    pub score: f64,
    pub dips_into_reserve: bool,
    pub loop_penalized: bool,
}

// === SCORING ===

/// Score one candidate process against current stocks.
pub fn score_process(
    process: &Process,
    stocks: &StockLevels,
    phase: Phase,
    analysis: &Analysis,
    cash_flow_mode: bool,
) -> ProcessScore {
    let mut score = base_score(process);
    let mut dips_into_reserve = false;

    // Target-production bonus, tiered by net production scale.
    let net: Quantity = analysis.targets().iter().map(|&t| process.net_of(t)).sum();
    let mut bonus = net as f64 * TARGET_BONUS_WEIGHT;
    bonus *= if net > 10_000 {
        BONUS_TIER_HUGE
    } else if net > 1000 {
        BONUS_TIER_LARGE
    } else if net > 100 {
        BONUS_TIER_MEDIUM
    } else if net > 0 {
        BONUS_TIER_SMALL
    } else {
        1.0
    };
    score = clamp(score + bonus);

    // Bulk-consumption penalty: draining a stockpile still being built is
    // only tolerated when a target is below reserve and this process
    // replenishes it.
    for &(resource, _) in &process.needs {
        let bulk = analysis.bulk_target(resource);
        if bulk > 0 && stocks.get(resource) < bulk {
            let replenishes_short_target = analysis.targets().iter().any(|&t| {
                stocks.get(t) < analysis.reserve(t) && process.net_of(t) > 0
            });
            if !replenishes_short_target {
                score = clamp(score * BULK_CONSUME_PENALTY);
            }
        }
    }

    // Bulk-production bonus: filling a short stockpile is boosted in
    // proportion to the shortage; topping up a full one is pointless.
    for &(resource, _) in &process.results {
        let bulk = analysis.bulk_target(resource);
        if bulk <= 0 {
            continue;
        }
        let held = stocks.get(resource);
        if held < bulk {
            let shortage = (bulk - held) as f64 / bulk as f64;
            score = clamp(score * (BULK_PRODUCE_BASE + shortage * BULK_PRODUCE_SHORTAGE_WEIGHT));
        } else {
            score = clamp(score * BULK_SATISFIED_PENALTY);
        }
    }

    // Target-reservation penalty. Skipped entirely while gathering or in
    // cash-flow mode so bootstrap buying stays possible.
    if phase != Phase::Gathering && !cash_flow_mode {
        let high_value = analysis.is_high_value(process.id);
        for &(resource, qty) in &process.needs {
            if !analysis.is_target(resource) {
                continue;
            }
            let available = stocks.get(resource) - analysis.reserve(resource);
            let factor = if available < qty {
                dips_into_reserve = true;
                if high_value {
                    1.0
                } else if analysis.produces_chain_resource(process.id) {
                    RESERVE_CHAIN_PENALTY
                } else {
                    RESERVE_HARD_PENALTY
                }
            } else if available < 100 {
                SCARCITY_TIGHT
            } else if available < 1000 {
                SCARCITY_LOW
            } else if available < 10_000 {
                SCARCITY_MODERATE
            } else {
                SCARCITY_COMFORTABLE
            };
            score = clamp(score * factor);
        }
    }

    score = clamp(score * phase_multiplier(process, phase, analysis, cash_flow_mode));

    // Conversion-loop guard: the upstream half of a two-process loop is
    // suppressed so material keeps moving toward the value chain.
    let loop_penalized = analysis.is_loop_penalized(process.id);
    if loop_penalized {
        score = clamp(score * LOOP_GUARD_PENALTY);
    }

    ProcessScore {
        score,
        dips_into_reserve,
        loop_penalized,
    }
}

fn base_score(process: &Process) -> f64 {
    if process.needs.is_empty() {
        return FREE_PROCESS_BASE;
    }
    let input_cost = process.input_total() as f64;
    let output_value = process.output_total() as f64;
    if input_cost > 0.0 {
        (output_value / input_cost) * EFFICIENCY_SCALE
    } else {
        output_value * EFFICIENCY_SCALE
    }
}

/// The phase table: one column per process role.
fn phase_multiplier(
    process: &Process,
    phase: Phase,
    analysis: &Analysis,
    cash_flow_mode: bool,
) -> f64 {
    if analysis.is_high_value(process.id) {
        return match phase {
            Phase::Selling => HIGH_VALUE_SELLING_BOOST,
            _ => 1.0,
        };
    }

    if analysis.is_gatherer(process.id) {
        if cash_flow_mode {
            return GATHERER_CASH_FLOW_BOOST;
        }
        return match phase {
            Phase::Gathering => GATHERER_GATHERING_BOOST,
            Phase::Production => GATHERER_PRODUCTION_PENALTY,
            Phase::Conversion => GATHERER_CONVERSION_PENALTY,
            Phase::Selling => GATHERER_SELLING_PENALTY,
        };
    }

    match (phase, analysis.min_result_depth(process.id)) {
        (Phase::Production, Some(d)) if d >= 2 => DEEP_PRODUCER_PRODUCTION_BOOST,
        (Phase::Conversion, Some(1)) => DIRECT_PRODUCER_CONVERSION_BOOST,
        (Phase::Conversion, Some(d)) if d >= 2 => DEEP_PRODUCER_CONVERSION_BOOST,
        _ => 1.0,
    }
}

/// Clamp to a finite non-negative range; NaN collapses to zero.
fn clamp(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, SCORE_CEILING)
}
