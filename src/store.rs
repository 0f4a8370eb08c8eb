use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::Arc;

use crate::model::{Outcome, Target};

/// Latest outcome per domain, plus the inventory that decides what is visible.
///
/// Entries of targets dropped by a reload stay in the map but are never
/// returned: every read goes through the current inventory.
pub struct ResultStore {
    results: DashMap<String, Outcome>,
    inventory: ArcSwap<Vec<Target>>,
}

impl ResultStore {
    pub fn new(inventory: Vec<Target>) -> Self {
        Self {
            results: DashMap::new(),
            inventory: ArcSwap::from_pointee(inventory),
        }
    }

    /// Stores `outcome` and returns the one it replaced, as a single step
    /// under the entry's shard lock.
    pub fn swap(&self, outcome: Outcome) -> Option<Outcome> {
        self.results.insert(outcome.domain.clone(), outcome)
    }

    pub fn get(&self, domain: &str) -> Option<Outcome> {
        if !self.inventory.load().iter().any(|t| t.domain == domain) {
            return None;
        }
        self.results.get(domain).map(|entry| entry.value().clone())
    }

    /// Latest outcome of every configured target that has one, in inventory order.
    pub fn snapshot(&self) -> Vec<Outcome> {
        self.inventory
            .load()
            .iter()
            .filter_map(|target| {
                self.results
                    .get(&target.domain)
                    .map(|entry| entry.value().clone())
            })
            .collect()
    }

    pub fn inventory(&self) -> Arc<Vec<Target>> {
        self.inventory.load_full()
    }

    pub fn replace_inventory(&self, inventory: Vec<Target>) {
        self.inventory.store(Arc::new(inventory));
    }
}
