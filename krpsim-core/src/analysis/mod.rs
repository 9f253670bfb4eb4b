//! One-shot static analysis of the process graph.
//!
//! Runs once at initialization and is immutable afterwards. The analysis
//! discovers the value chains feeding high-value processes and derives the
//! per-resource tables the scorer, bottleneck detector, and phase controller
//! read every cycle:
//!
//! - which processes are **high-value** (dominant producers of a target),
//! - the **value-chain** resource set and each resource's **depth** (1 =
//!   direct input to a high-value process, +1 per level upstream),
//! - **bulk targets**: the stock a chain resource should reach before its
//!   consumer runs, scaled by an adaptive multiplier,
//! - **target reserves**: target stock that ordinary processes are scored as
//!   though they cannot touch,
//! - per-process flags (gatherer, chain producer, conversion-loop member)
//!   precomputed so the per-cycle hot path is flat table lookups.

mod bulk;
mod classify;
mod depth;

use crate::types::{Process, ProcessId, Quantity, ResourceId, StockLevels};

pub use bulk::{
    GATHERING_LIMIT_CYCLES, GATHERING_LIMIT_CYCLES_LONG, LONG_HORIZON_BULK_FACTOR,
    LONG_HORIZON_CYCLES,
};

// === ANALYSIS ===

/// Immutable artifact bundle produced by [`Analysis::build`].
#[derive(Debug, Clone)]
pub struct Analysis {
    targets: Vec<ResourceId>,
    is_target: Vec<bool>,
    /// Largest single-execution net production per target resource.
    max_net: Vec<Quantity>,
    high_value: Vec<bool>,
    high_value_count: usize,
    in_value_chain: Vec<bool>,
    /// Value-chain depth per resource; 0 means "not in the chain".
    depth: Vec<u32>,
    /// Desired accumulated stock per resource; 0 means "no bulk target".
    bulk_targets: Vec<Quantity>,
    /// Reserved stock per target resource.
    reserves: Vec<Quantity>,
    /// Aggregate net target production of the high-value processes each
    /// resource transitively feeds.
    downstream_value: Vec<f64>,
    bulk_multiplier: Quantity,
    gathering_limit_cycle: u64,
    /// Cached non-target input requirements of each high-value process.
    intermediate_needs: Vec<Vec<(ResourceId, Quantity)>>,
    gatherer: Vec<bool>,
    chain_producer: Vec<bool>,
    loop_penalized: Vec<bool>,
    /// Minimum depth over each process's produced resources; 0 if none.
    min_result_depth: Vec<u32>,
}

impl Analysis {
    /// Run the full static analysis over the process graph.
    pub fn build(
        processes: &[Process],
        targets: &[ResourceId],
        resource_count: usize,
        horizon: u64,
    ) -> Self {
        let mut is_target = vec![false; resource_count];
        for &t in targets {
            is_target[t.index()] = true;
        }

        let max_net = classify::max_net_production(processes, targets, resource_count);
        let (high_value, intermediate_needs) =
            classify::classify_high_value(processes, targets, &is_target, &max_net);
        let high_value_count = high_value.iter().filter(|&&hv| hv).count();

        let (in_value_chain, downstream_value) =
            classify::walk_value_chains(processes, &high_value, targets, resource_count);

        let depth = depth::compute_depths(processes, &high_value, &is_target, resource_count);

        let (bulk_multiplier, gathering_limit_cycle) =
            bulk::bulk_multiplier(processes, targets, horizon);
        let bulk_targets = bulk::compute_bulk_targets(
            processes,
            &high_value,
            &is_target,
            &depth,
            bulk_multiplier,
            resource_count,
        );

        let chain_producer: Vec<bool> = processes
            .iter()
            .map(|p| p.results.iter().any(|&(r, _)| in_value_chain[r.index()]))
            .collect();

        let reserves = bulk::compute_reserves(
            processes,
            &high_value,
            &chain_producer,
            &is_target,
            bulk_multiplier,
            resource_count,
        );

        let gatherer: Vec<bool> = processes
            .iter()
            .map(|p| {
                p.needs.is_empty()
                    || (p.needs.len() == 1 && is_target[p.needs[0].0.index()])
            })
            .collect();

        let min_result_depth: Vec<u32> = processes
            .iter()
            .map(|p| {
                p.results
                    .iter()
                    .map(|&(r, _)| depth[r.index()])
                    .filter(|&d| d > 0)
                    .min()
                    .unwrap_or(0)
            })
            .collect();

        let loop_penalized = classify::conversion_loop_flags(processes, &high_value, &depth);

        tracing::info!(
            high_value = high_value_count,
            chain_resources = in_value_chain.iter().filter(|&&c| c).count(),
            bulk_multiplier,
            gathering_limit_cycle,
            "process graph analyzed"
        );

        Self {
            targets: targets.to_vec(),
            is_target,
            max_net,
            high_value,
            high_value_count,
            in_value_chain,
            depth,
            bulk_targets,
            reserves,
            downstream_value,
            bulk_multiplier,
            gathering_limit_cycle,
            intermediate_needs,
            gatherer,
            chain_producer,
            loop_penalized,
            min_result_depth,
        }
    }

    // === ACCESSORS ===

    /// Effective optimization targets (the `time` pseudo-resource stripped).
    pub fn targets(&self) -> &[ResourceId] {
        &self.targets
    }

    /// Number of interned resources all per-resource tables cover.
    pub fn resource_count(&self) -> usize {
        self.is_target.len()
    }

    pub fn is_target(&self, resource: ResourceId) -> bool {
        self.is_target[resource.index()]
    }

    pub fn max_net_for_target(&self, resource: ResourceId) -> Quantity {
        self.max_net[resource.index()]
    }

    pub fn is_high_value(&self, process: ProcessId) -> bool {
        self.high_value[process.index()]
    }

    pub fn has_high_value(&self) -> bool {
        self.high_value_count > 0
    }

    pub fn in_value_chain(&self, resource: ResourceId) -> bool {
        self.in_value_chain[resource.index()]
    }

    pub fn depth(&self, resource: ResourceId) -> Option<u32> {
        match self.depth[resource.index()] {
            0 => None,
            d => Some(d),
        }
    }

    pub fn bulk_target(&self, resource: ResourceId) -> Quantity {
        self.bulk_targets[resource.index()]
    }

    pub fn reserve(&self, resource: ResourceId) -> Quantity {
        self.reserves[resource.index()]
    }

    pub fn downstream_value(&self, resource: ResourceId) -> f64 {
        self.downstream_value[resource.index()]
    }

    pub fn bulk_multiplier(&self) -> Quantity {
        self.bulk_multiplier
    }

    pub fn gathering_limit_cycle(&self) -> u64 {
        self.gathering_limit_cycle
    }

    pub fn intermediate_needs(&self, process: ProcessId) -> &[(ResourceId, Quantity)] {
        &self.intermediate_needs[process.index()]
    }

    pub fn is_gatherer(&self, process: ProcessId) -> bool {
        self.gatherer[process.index()]
    }

    pub fn produces_chain_resource(&self, process: ProcessId) -> bool {
        self.chain_producer[process.index()]
    }

    pub fn is_loop_penalized(&self, process: ProcessId) -> bool {
        self.loop_penalized[process.index()]
    }

    pub fn min_result_depth(&self, process: ProcessId) -> Option<u32> {
        match self.min_result_depth[process.index()] {
            0 => None,
            d => Some(d),
        }
    }

    // === DERIVED QUERIES ===

    /// Ratio of current value-chain stock to the summed bulk targets.
    pub fn value_chain_stock_ratio(&self, stocks: &StockLevels) -> f64 {
        let total_bulk: Quantity = self.bulk_targets.iter().sum();
        if total_bulk <= 0 {
            return 0.0;
        }
        let held: Quantity = (0..self.in_value_chain.len())
            .filter(|&i| self.in_value_chain[i] && !self.is_target[i])
            .map(|i| stocks.get(ResourceId(i as u32)))
            .sum();
        held as f64 / total_bulk as f64
    }

    /// Whether any high-value process is runnable from current stock.
    pub fn any_high_value_runnable(&self, processes: &[Process], stocks: &StockLevels) -> bool {
        processes
            .iter()
            .any(|p| self.high_value[p.id.index()] && p.can_run(stocks))
    }

    /// Whether a high-value process could run `bulk_multiplier` times over.
    pub fn can_run_bulk(&self, process: &Process, stocks: &StockLevels) -> bool {
        process
            .needs
            .iter()
            .all(|&(r, q)| stocks.get(r) >= q * self.bulk_multiplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceTable;

    /// Intern and build the three-stage forge chain from raw specs.
    fn forge_chain() -> (ResourceTable, Vec<Process>, Vec<ResourceId>) {
        let mut table = ResourceTable::new();
        let ore = table.intern("ore");
        let bar = table.intern("bar");
        let sword = table.intern("sword");

        let processes = vec![
            Process {
                id: ProcessId(0),
                name: "dig".to_string(),
                needs: vec![],
                results: vec![(ore, 1)],
                delay: 1,
            },
            Process {
                id: ProcessId(1),
                name: "smelt".to_string(),
                needs: vec![(ore, 3)],
                results: vec![(bar, 1)],
                delay: 1,
            },
            Process {
                id: ProcessId(2),
                name: "forge".to_string(),
                needs: vec![(bar, 5)],
                results: vec![(sword, 1)],
                delay: 1,
            },
        ];
        (table, processes, vec![sword])
    }

    #[test]
    fn forge_chain_depths_and_bulk_targets() {
        let (table, processes, targets) = forge_chain();
        let analysis = Analysis::build(&processes, &targets, table.len(), 1000);

        let ore = table.lookup("ore").unwrap();
        let bar = table.lookup("bar").unwrap();

        assert!(analysis.is_high_value(ProcessId(2)));
        assert!(!analysis.is_high_value(ProcessId(0)));
        assert_eq!(analysis.depth(bar), Some(1));
        assert_eq!(analysis.depth(ore), Some(2));

        // max production of sword is 1 -> multiplier 2
        assert_eq!(analysis.bulk_multiplier(), 2);
        assert_eq!(analysis.bulk_target(bar), 5 * 2);
        // ore receives ceil(10 / 1) smelt runs * 3 ore, halved at depth 2
        assert_eq!(analysis.bulk_target(ore), 15);
    }

    #[test]
    fn bulk_target_is_max_over_consumers_not_sum() {
        let mut table = ResourceTable::new();
        let part = table.intern("part");
        let a = table.intern("a");
        let b = table.intern("b");

        // Two high-value producers consuming the same part: 4 and 6 units.
        let processes = vec![
            Process {
                id: ProcessId(0),
                name: "make_a".to_string(),
                needs: vec![(part, 4)],
                results: vec![(a, 2000)],
                delay: 1,
            },
            Process {
                id: ProcessId(1),
                name: "make_b".to_string(),
                needs: vec![(part, 6)],
                results: vec![(b, 2000)],
                delay: 1,
            },
        ];
        let analysis = Analysis::build(&processes, &[a, b], table.len(), 100);

        assert!(analysis.is_high_value(ProcessId(0)));
        assert!(analysis.is_high_value(ProcessId(1)));
        // multiplier 10 (production 2000); target is max(4,6)*10, not (4+6)*10
        assert_eq!(analysis.bulk_multiplier(), 10);
        assert_eq!(analysis.bulk_target(part), 60);
    }

    #[test]
    fn reserves_use_max_over_consumers() {
        let mut table = ResourceTable::new();
        let euro = table.intern("euro");
        let gem = table.intern("gem");
        let rock = table.intern("rock");

        let processes = vec![
            Process {
                id: ProcessId(0),
                name: "buy_small".to_string(),
                needs: vec![(euro, 10)],
                results: vec![(gem, 2000)],
                delay: 1,
            },
            Process {
                id: ProcessId(1),
                name: "buy_big".to_string(),
                needs: vec![(euro, 40)],
                results: vec![(gem, 2000)],
                delay: 1,
            },
            Process {
                id: ProcessId(2),
                name: "mine".to_string(),
                needs: vec![(euro, 1)],
                results: vec![(rock, 1)],
                delay: 1,
            },
        ];
        // euro and gem are both targets
        let analysis = Analysis::build(&processes, &[gem, euro], table.len(), 100);

        // multiplier 10; reserve is max(10, 40) * 10 over high-value
        // consumers, never 10*10 + 40*10
        assert_eq!(analysis.reserve(euro), 400);
        assert_eq!(analysis.reserve(gem), 0);
    }

    #[test]
    fn no_high_value_degrades_cleanly() {
        let mut table = ResourceTable::new();
        let x = table.intern("x");
        let y = table.intern("y");

        // Two near-identical producers; each matches the other's net, and
        // nothing clears the absolute thresholds.
        let processes = vec![
            Process {
                id: ProcessId(0),
                name: "swap".to_string(),
                needs: vec![(x, 5)],
                results: vec![(x, 5)],
                delay: 1,
            },
            Process {
                id: ProcessId(1),
                name: "hold".to_string(),
                needs: vec![(y, 5)],
                results: vec![(y, 5)],
                delay: 1,
            },
        ];
        let analysis = Analysis::build(&processes, &[x], table.len(), 100);
        assert!(!analysis.has_high_value());
        assert_eq!(analysis.bulk_target(x), 0);
        let stocks = StockLevels::zeroed(table.len());
        assert_eq!(analysis.value_chain_stock_ratio(&stocks), 0.0);
    }

    #[test]
    fn long_horizon_scales_multiplier_and_gathering_limit() {
        let (table, processes, targets) = forge_chain();
        let short = Analysis::build(&processes, &targets, table.len(), 1000);
        let long = Analysis::build(&processes, &targets, table.len(), 60_000);

        assert_eq!(short.bulk_multiplier(), 2);
        assert_eq!(short.gathering_limit_cycle(), 300);
        assert_eq!(long.bulk_multiplier(), 10);
        assert_eq!(long.gathering_limit_cycle(), 500);
    }
}
