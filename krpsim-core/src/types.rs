use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// === CORE TYPES ===

/// Integer stock quantity. Realistic runs stay well under 10^12, so i64
/// headroom is ample.
pub type Quantity = i64;

/// Dense resource index assigned at initialization. Indices are stable for
/// the lifetime of an optimizer and index flat per-resource tables.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ResourceId(pub u32);

impl ResourceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dense process index, in declaration order.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ProcessId(pub u32);

impl ProcessId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// === RESOURCE TABLE ===

/// Interner mapping resource names to dense ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceTable {
    names: Vec<String>,
    index: HashMap<String, ResourceId>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `name`, assigning the next dense id on first sight.
    pub fn intern(&mut self, name: &str) -> ResourceId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = ResourceId(self.names.len() as u32);
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<ResourceId> {
        self.index.get(name).copied()
    }

    pub fn name(&self, id: ResourceId) -> &str {
        &self.names[id.index()]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate all ids in dense order.
    pub fn ids(&self) -> impl Iterator<Item = ResourceId> {
        (0..self.names.len() as u32).map(ResourceId)
    }
}

// === PROCESS SPECS ===

/// A process as parsed from configuration: string-keyed, not yet interned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub name: String,
    pub needs: Vec<(String, Quantity)>,
    pub results: Vec<(String, Quantity)>,
    pub delay: u32,
}

impl ProcessSpec {
    pub fn new(name: impl Into<String>, delay: u32) -> Self {
        Self {
            name: name.into(),
            needs: Vec::new(),
            results: Vec::new(),
            delay,
        }
    }

    pub fn with_need(mut self, resource: &str, qty: Quantity) -> Self {
        self.needs.push((resource.to_string(), qty));
        self
    }

    pub fn with_result(mut self, resource: &str, qty: Quantity) -> Self {
        self.results.push((resource.to_string(), qty));
        self
    }
}

// === PROCESS ===

/// An interned process record. Immutable once built; need/result lists are
/// sorted by resource id so iteration order is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    pub id: ProcessId,
    pub name: String,
    /// Inputs consumed when the process starts.
    pub needs: Vec<(ResourceId, Quantity)>,
    /// Outputs granted when the process completes.
    pub results: Vec<(ResourceId, Quantity)>,
    /// Cycles from start to completion. Always positive.
    pub delay: u32,
}

impl Process {
    pub fn need_of(&self, resource: ResourceId) -> Quantity {
        lookup_sorted(&self.needs, resource)
    }

    pub fn result_of(&self, resource: ResourceId) -> Quantity {
        lookup_sorted(&self.results, resource)
    }

    /// Net production of a resource over one execution.
    pub fn net_of(&self, resource: ResourceId) -> Quantity {
        self.result_of(resource) - self.need_of(resource)
    }

    pub fn input_total(&self) -> Quantity {
        self.needs.iter().map(|&(_, q)| q).sum()
    }

    pub fn output_total(&self) -> Quantity {
        self.results.iter().map(|&(_, q)| q).sum()
    }

    /// Check that every input is covered by current stock.
    pub fn can_run(&self, stocks: &StockLevels) -> bool {
        self.needs.iter().all(|&(r, q)| stocks.get(r) >= q)
    }
}

fn lookup_sorted(entries: &[(ResourceId, Quantity)], resource: ResourceId) -> Quantity {
    entries
        .binary_search_by_key(&resource, |&(r, _)| r)
        .map(|i| entries[i].1)
        .unwrap_or(0)
}

// === STOCK LEVELS ===

/// Flat per-resource stock vector indexed by `ResourceId`.
///
/// Owned by the simulator; the selector only ever reads it during a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevels(Vec<Quantity>);

impl StockLevels {
    pub fn zeroed(resources: usize) -> Self {
        Self(vec![0; resources])
    }

    pub fn get(&self, resource: ResourceId) -> Quantity {
        self.0.get(resource.index()).copied().unwrap_or(0)
    }

    pub fn set(&mut self, resource: ResourceId, qty: Quantity) {
        self.ensure(resource);
        self.0[resource.index()] = qty;
    }

    pub fn add(&mut self, resource: ResourceId, qty: Quantity) {
        self.ensure(resource);
        self.0[resource.index()] += qty;
    }

    /// Consume a full need bundle, all or nothing. Returns false and leaves
    /// stocks untouched if any input is short.
    pub fn try_consume(&mut self, needs: &[(ResourceId, Quantity)]) -> bool {
        if !needs.iter().all(|&(r, q)| self.get(r) >= q) {
            return false;
        }
        for &(r, q) in needs {
            self.0[r.index()] -= q;
        }
        true
    }

    /// Grant a result bundle.
    pub fn produce(&mut self, results: &[(ResourceId, Quantity)]) {
        for &(r, q) in results {
            self.add(r, q);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, Quantity)> + '_ {
        self.0
            .iter()
            .enumerate()
            .map(|(i, &q)| (ResourceId(i as u32), q))
    }

    fn ensure(&mut self, resource: ResourceId) {
        if resource.index() >= self.0.len() {
            self.0.resize(resource.index() + 1, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_stable_and_dense() {
        let mut table = ResourceTable::new();
        let euro = table.intern("euro");
        let wood = table.intern("wood");
        assert_eq!(euro, ResourceId(0));
        assert_eq!(wood, ResourceId(1));
        assert_eq!(table.intern("euro"), euro);
        assert_eq!(table.len(), 2);
        assert_eq!(table.name(wood), "wood");
        assert_eq!(table.lookup("plank"), None);
    }

    #[test]
    fn process_lookup_and_runnability() {
        let mut table = ResourceTable::new();
        let euro = table.intern("euro");
        let item = table.intern("item");

        let process = Process {
            id: ProcessId(0),
            name: "buy".to_string(),
            needs: vec![(euro, 100)],
            results: vec![(item, 1)],
            delay: 1,
        };

        assert_eq!(process.need_of(euro), 100);
        assert_eq!(process.result_of(item), 1);
        assert_eq!(process.net_of(euro), -100);
        assert_eq!(process.input_total(), 100);

        let mut stocks = StockLevels::zeroed(table.len());
        stocks.set(euro, 99);
        assert!(!process.can_run(&stocks));
        stocks.set(euro, 100);
        assert!(process.can_run(&stocks));
    }

    #[test]
    fn consume_is_all_or_nothing() {
        let mut stocks = StockLevels::zeroed(2);
        stocks.set(ResourceId(0), 5);
        stocks.set(ResourceId(1), 1);

        let needs = vec![(ResourceId(0), 3), (ResourceId(1), 2)];
        assert!(!stocks.try_consume(&needs));
        assert_eq!(stocks.get(ResourceId(0)), 5);

        let needs = vec![(ResourceId(0), 3), (ResourceId(1), 1)];
        assert!(stocks.try_consume(&needs));
        assert_eq!(stocks.get(ResourceId(0)), 2);
        assert_eq!(stocks.get(ResourceId(1)), 0);
    }
}
