// High-value classification and value-chain discovery.

use crate::types::{Process, ProcessId, Quantity, ResourceId};

// === CLASSIFICATION THRESHOLDS ===

/// Absolute net production that marks a process high-value outright.
const NET_PRODUCTION_FLOOR: Quantity = 1000;
/// Absolute single-run output that marks a process high-value outright.
const RAW_PRODUCTION_FLOOR: Quantity = 10_000;
/// A producer within half of the best net production also qualifies.
const RELATIVE_SHARE_DIVISOR: Quantity = 2;
/// Net production dwarfing the total input bundle qualifies.
const INPUT_DOMINANCE_FACTOR: Quantity = 50;

/// Largest single-execution net production per target, over all processes
/// that produce the target at all. Zero for non-targets.
pub(super) fn max_net_production(
    processes: &[Process],
    targets: &[ResourceId],
    resource_count: usize,
) -> Vec<Quantity> {
    let mut max_net = vec![0; resource_count];
    for &t in targets {
        let best = processes
            .iter()
            .filter(|p| p.result_of(t) > 0)
            .map(|p| p.net_of(t))
            .max()
            .unwrap_or(0);
        max_net[t.index()] = best;
    }
    max_net
}

/// Classify each process and cache the non-target input requirements of the
/// high-value ones.
pub(super) fn classify_high_value(
    processes: &[Process],
    targets: &[ResourceId],
    is_target: &[bool],
    max_net: &[Quantity],
) -> (Vec<bool>, Vec<Vec<(ResourceId, Quantity)>>) {
    let mut high_value = vec![false; processes.len()];
    let mut intermediate_needs = vec![Vec::new(); processes.len()];

    for process in processes {
        for &t in targets {
            let produced = process.result_of(t);
            if produced == 0 {
                continue;
            }
            let net = process.net_of(t);
            let best = max_net[t.index()];

            let qualifies = net > NET_PRODUCTION_FLOOR
                || produced > RAW_PRODUCTION_FLOOR
                || (best > 0 && net * RELATIVE_SHARE_DIVISOR >= best)
                || (best > 0 && net == best)
                || (!process.needs.is_empty()
                    && net > INPUT_DOMINANCE_FACTOR * process.input_total());

            if qualifies {
                high_value[process.id.index()] = true;
                intermediate_needs[process.id.index()] = process
                    .needs
                    .iter()
                    .filter(|&&(r, _)| !is_target[r.index()])
                    .copied()
                    .collect();
                break;
            }
        }
    }

    (high_value, intermediate_needs)
}

/// Walk each high-value process's inputs upstream, following every producer
/// of every required resource, guarded by a per-walk visited set so cyclic
/// graphs terminate. Collects the value-chain resource set and accumulates
/// each resource's downstream value (the net target production of the
/// high-value processes it transitively feeds).
pub(super) fn walk_value_chains(
    processes: &[Process],
    high_value: &[bool],
    targets: &[ResourceId],
    resource_count: usize,
) -> (Vec<bool>, Vec<f64>) {
    let mut in_chain = vec![false; resource_count];
    let mut downstream = vec![0.0; resource_count];

    for root in processes.iter().filter(|p| high_value[p.id.index()]) {
        let net: Quantity = targets.iter().map(|&t| root.net_of(t)).sum();
        let weight = net.max(0) as f64;

        let mut visited = vec![false; resource_count];
        let mut stack: Vec<ProcessId> = vec![root.id];

        while let Some(pid) = stack.pop() {
            for &(resource, _) in &processes[pid.index()].needs {
                if visited[resource.index()] {
                    continue;
                }
                visited[resource.index()] = true;
                in_chain[resource.index()] = true;
                downstream[resource.index()] += weight;

                for producer in processes {
                    if producer.result_of(resource) > 0 {
                        stack.push(producer.id);
                    }
                }
            }
        }
    }

    (in_chain, downstream)
}

/// Flag the upstream half of two-process conversion loops.
///
/// A pair (p, q) forms a loop when q consumes something p produces while
/// producing something p consumes, and neither is high-value. The member
/// whose outputs sit strictly closer to the high-value chain than its inputs
/// moves material downstream and is exempt; the other direction is flagged.
pub(super) fn conversion_loop_flags(
    processes: &[Process],
    high_value: &[bool],
    depth: &[u32],
) -> Vec<bool> {
    let mut flags = vec![false; processes.len()];

    for process in processes {
        if high_value[process.id.index()] {
            continue;
        }
        let in_loop = processes.iter().any(|other| {
            other.id != process.id
                && !high_value[other.id.index()]
                && process.results.iter().any(|&(r, _)| other.need_of(r) > 0)
                && process.needs.iter().any(|&(r, _)| other.result_of(r) > 0)
        });
        if !in_loop {
            continue;
        }

        let result_depth = min_depth(&process.results, depth);
        let need_depth = min_depth(&process.needs, depth);
        flags[process.id.index()] = result_depth >= need_depth;
    }

    flags
}

fn min_depth(entries: &[(ResourceId, Quantity)], depth: &[u32]) -> u32 {
    entries
        .iter()
        .map(|&(r, _)| match depth[r.index()] {
            0 => u32::MAX,
            d => d,
        })
        .min()
        .unwrap_or(u32::MAX)
}
