// Iterative value-chain depth calculation.

use crate::types::Process;

/// Bounded pass count; complex dependency webs settle well before this.
const MAX_ITERATIONS: usize = 10;

/// Compute the value-chain depth of every resource.
///
/// Depth 1 is assigned to every non-target input of a high-value process.
/// Each pass then assigns `d + 1` to the inputs of any process producing a
/// resource of known depth `d`, keeping the minimum (shortest path to a
/// high-value process). Terminates early on a pass that changes nothing;
/// unreached resources keep depth 0 ("not in the value chain").
pub(super) fn compute_depths(
    processes: &[Process],
    high_value: &[bool],
    is_target: &[bool],
    resource_count: usize,
) -> Vec<u32> {
    let mut depth = vec![0u32; resource_count];

    for process in processes.iter().filter(|p| high_value[p.id.index()]) {
        for &(resource, _) in &process.needs {
            if !is_target[resource.index()] {
                depth[resource.index()] = 1;
            }
        }
    }

    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for process in processes {
            for &(produced, _) in &process.results {
                let d = depth[produced.index()];
                if d == 0 {
                    continue;
                }
                for &(needed, _) in &process.needs {
                    if is_target[needed.index()] {
                        continue;
                    }
                    let slot = &mut depth[needed.index()];
                    if *slot == 0 || *slot > d + 1 {
                        *slot = d + 1;
                        changed = true;
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }

    depth
}
