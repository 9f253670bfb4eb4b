// Adaptive bulk multiplier, bulk production targets, and target reserves.

use crate::types::{Process, Quantity, ResourceId};

// === SCALE CONSTANTS ===

/// Horizons beyond this run in long-horizon mode.
pub const LONG_HORIZON_CYCLES: u64 = 50_000;
/// Long-horizon mode scales the adaptive multiplier by this factor,
/// raising the 2/5/10/20 ladder to at most 100.
pub const LONG_HORIZON_BULK_FACTOR: Quantity = 5;
/// Default cycle after which the gathering phase is forced to end.
pub const GATHERING_LIMIT_CYCLES: u64 = 300;
/// Gathering limit used in long-horizon mode.
pub const GATHERING_LIMIT_CYCLES_LONG: u64 = 500;

/// Upstream bulk-target propagation stops at this chain depth.
const BULK_MAX_DEPTH: u32 = 3;
/// Each depth level upstream halves the propagated amount.
const BULK_DEPTH_REDUCTION: f64 = 0.5;
/// Reserves for value-chain intermediates scale by this extra factor, since
/// intermediates run many times per high-value execution.
const RESERVE_INTERMEDIATE_FACTOR: Quantity = 5;

// === BULK MULTIPLIER ===

/// Pick the adaptive bulk multiplier from the largest single-execution
/// target production observed anywhere in the configuration, and the
/// matching gathering limit.
pub(super) fn bulk_multiplier(
    processes: &[Process],
    targets: &[ResourceId],
    horizon: u64,
) -> (Quantity, u64) {
    let peak: Quantity = processes
        .iter()
        .flat_map(|p| targets.iter().map(|&t| p.result_of(t)))
        .max()
        .unwrap_or(0);

    let base: Quantity = if peak >= 10_000 {
        20
    } else if peak >= 1000 {
        10
    } else if peak >= 100 {
        5
    } else {
        2
    };

    if horizon > LONG_HORIZON_CYCLES {
        (base * LONG_HORIZON_BULK_FACTOR, GATHERING_LIMIT_CYCLES_LONG)
    } else {
        (base, GATHERING_LIMIT_CYCLES)
    }
}

// === BULK TARGETS ===

/// Desired accumulated stock per value-chain resource.
///
/// Direct high-value inputs are seeded at `need * multiplier`. Each upstream
/// pass then sizes producer inputs from the run count needed to fill the
/// downstream target, scaled by 0.5^(d-1) for a receiving resource at depth
/// d, and bounded at depth 3. Merging always takes the maximum over
/// consumers, never the sum.
pub(super) fn compute_bulk_targets(
    processes: &[Process],
    high_value: &[bool],
    is_target: &[bool],
    depth: &[u32],
    multiplier: Quantity,
    resource_count: usize,
) -> Vec<Quantity> {
    let mut bulk = vec![0; resource_count];

    for process in processes.iter().filter(|p| high_value[p.id.index()]) {
        for &(resource, qty) in &process.needs {
            if is_target[resource.index()] {
                continue;
            }
            let slot = &mut bulk[resource.index()];
            *slot = (*slot).max(qty * multiplier);
        }
    }

    // Two upstream passes reach depth 3 from the depth-1 seeds.
    for _ in 1..BULK_MAX_DEPTH {
        let snapshot: Vec<usize> = (0..resource_count).filter(|&i| bulk[i] > 0).collect();
        for &consumed in &snapshot {
            let wanted = bulk[consumed];
            for producer in processes {
                let per_run = producer.result_of(ResourceId(consumed as u32));
                if per_run <= 0 {
                    continue;
                }
                let runs = (wanted + per_run - 1) / per_run;
                for &(input, qty) in &producer.needs {
                    let d = depth[input.index()];
                    if is_target[input.index()] || d == 0 || d > BULK_MAX_DEPTH {
                        continue;
                    }
                    let scale = BULK_DEPTH_REDUCTION.powi(d as i32 - 1);
                    let amount = ((qty * runs) as f64 * scale) as Quantity;
                    if amount > 0 {
                        let slot = &mut bulk[input.index()];
                        *slot = (*slot).max(amount);
                    }
                }
            }
        }
    }

    bulk
}

// === TARGET RESERVES ===

/// Target stock that must stay untouched by ordinary processes so the value
/// chain can keep executing. High-value consumers reserve `need *
/// multiplier`; chain intermediates reserve five times that. Aggregation is
/// a maximum over consumers, never a sum.
pub(super) fn compute_reserves(
    processes: &[Process],
    high_value: &[bool],
    chain_producer: &[bool],
    is_target: &[bool],
    multiplier: Quantity,
    resource_count: usize,
) -> Vec<Quantity> {
    let mut reserves = vec![0; resource_count];

    for process in processes {
        let factor = if high_value[process.id.index()] {
            multiplier
        } else if chain_producer[process.id.index()] {
            multiplier * RESERVE_INTERMEDIATE_FACTOR
        } else {
            continue;
        };
        for &(resource, qty) in &process.needs {
            if !is_target[resource.index()] {
                continue;
            }
            let slot = &mut reserves[resource.index()];
            *slot = (*slot).max(qty * factor);
        }
    }

    reserves
}
