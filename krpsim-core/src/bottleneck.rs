//! Bottleneck detection with urgency-based override.
//!
//! Runs before scoring each cycle. When a value-chain resource sits below
//! its bulk target, or a high-value process is blocked on an input, an
//! affordable producer of the missing resource short-circuits normal
//! scoring entirely.

use crate::analysis::Analysis;
use crate::phase::Phase;
use crate::types::{Process, ProcessId, Quantity, ResourceId, StockLevels};

// === PRIORITY WEIGHTS ===

/// Priority per missing unit of a short value-chain resource.
const SHORTAGE_URGENCY_WEIGHT: f64 = 1000.0;
/// Flat priority tier for producers unblocking a high-value process in the
/// late phases; dominates every shortage-driven candidate.
const BLOCKER_PRIORITY_FLOOR: f64 = 10_000_000.0;
/// Priority per missing unit of a blocking resource.
const BLOCKER_URGENCY_WEIGHT: f64 = 10_000.0;
/// Chain resources without a bulk target still bottleneck below this stock.
const LOW_STOCK_FLOOR: Quantity = 10;

#[derive(Debug, Clone, Copy)]
struct Candidate {
    process: ProcessId,
    priority: f64,
    /// Depth of the resource the candidate was nominated for.
    resource_depth: u32,
    delay: u32,
}

// === DETECTION ===

/// Scan for bottlenecks and return the producer to force, if any.
///
/// Candidates come from the runnable set only. Loop-upstream processes are
/// never nominated, and outside Gathering (or cash-flow mode) a gatherer
/// whose target spend would dip into reserves is not considered affordable.
pub fn find_bottleneck(
    processes: &[Process],
    analysis: &Analysis,
    phase: Phase,
    cash_flow_mode: bool,
    stocks: &StockLevels,
    runnable: &[ProcessId],
) -> Option<ProcessId> {
    let mut candidates: Vec<Candidate> = Vec::new();

    let affordable = |pid: ProcessId| -> bool {
        if analysis.is_loop_penalized(pid) {
            return false;
        }
        if phase == Phase::Gathering || cash_flow_mode || !analysis.is_gatherer(pid) {
            return true;
        }
        processes[pid.index()]
            .needs
            .iter()
            .filter(|&&(r, _)| analysis.is_target(r))
            .all(|&(r, q)| stocks.get(r) - analysis.reserve(r) >= q)
    };

    let nominate = |resource: ResourceId, priority: f64, candidates: &mut Vec<Candidate>| {
        let depth = analysis.depth(resource).unwrap_or(u32::MAX);
        for &pid in runnable {
            let process = &processes[pid.index()];
            if process.result_of(resource) > 0 && affordable(pid) {
                candidates.push(Candidate {
                    process: pid,
                    priority,
                    resource_depth: depth,
                    delay: process.delay,
                });
            }
        }
    };

    // Value-chain shortages, weighted by shortage size and downstream value.
    for resource in chain_resources(analysis) {
        if analysis.is_target(resource) {
            continue;
        }
        let held = stocks.get(resource);
        let bulk = analysis.bulk_target(resource);
        let shortage = if bulk > 0 && held < bulk {
            bulk - held
        } else if bulk == 0 && held < LOW_STOCK_FLOOR {
            LOW_STOCK_FLOOR - held
        } else {
            continue;
        };
        let priority =
            shortage as f64 * SHORTAGE_URGENCY_WEIGHT + analysis.downstream_value(resource);
        nominate(resource, priority, &mut candidates);
    }

    // High-value blockers: in the late phases a missing bulk input to a
    // high-value process outranks everything.
    if phase.is_late() {
        for process in processes {
            if !analysis.is_high_value(process.id) {
                continue;
            }
            for &(resource, qty) in analysis.intermediate_needs(process.id) {
                let needed = qty * analysis.bulk_multiplier();
                let held = stocks.get(resource);
                if held < needed {
                    let priority = BLOCKER_PRIORITY_FLOOR
                        + (needed - held) as f64 * BLOCKER_URGENCY_WEIGHT;
                    nominate(resource, priority, &mut candidates);
                }
            }
        }
    }

    best_candidate(processes, candidates)
}

fn chain_resources(analysis: &Analysis) -> impl Iterator<Item = ResourceId> + '_ {
    (0..analysis.resource_count() as u32)
        .map(ResourceId)
        .filter(move |&r| analysis.in_value_chain(r))
}

/// Highest priority wins; ties break toward smaller depth, then smaller
/// delay, then name order.
fn best_candidate(processes: &[Process], candidates: Vec<Candidate>) -> Option<ProcessId> {
    candidates.into_iter().reduce(|best, other| {
        let ordering = other
            .priority
            .partial_cmp(&best.priority)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| best.resource_depth.cmp(&other.resource_depth))
            .then_with(|| best.delay.cmp(&other.delay))
            .then_with(|| {
                processes[best.process.index()]
                    .name
                    .cmp(&processes[other.process.index()].name)
            });
        if ordering == std::cmp::Ordering::Greater {
            other
        } else {
            best
        }
    })
    .map(|c| c.process)
}
