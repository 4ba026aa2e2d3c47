//! Dependency tracking between settings
//!
//! Nodes are setting slots: the position of a setting in its table's
//! declared order. An edge `precedent -> dependent` means the dependent's
//! formulas read the precedent.

use ahash::{AHashMap, AHashSet};
use std::collections::BTreeSet;

/// Dependency graph over setting slots
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    node_count: usize,
    /// Slot → slots that depend on it (dependents)
    dependents: AHashMap<usize, AHashSet<usize>>,
    /// Slot → slots it depends on (precedents)
    precedents: AHashMap<usize, AHashSet<usize>>,
}

/// Result of ordering a dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopologicalOrder {
    /// Every slot exactly once: acyclic slots first, then the slots that are
    /// on or behind a cycle, each group in declared order
    pub order: Vec<usize>,
    /// Slots that lie on a cycle, in declared order
    pub cyclic: Vec<usize>,
}

impl DependencyGraph {
    /// Create a graph with `node_count` slots and no edges
    pub fn with_nodes(node_count: usize) -> Self {
        Self {
            node_count,
            ..Self::default()
        }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.node_count
    }

    pub fn is_empty(&self) -> bool {
        self.node_count == 0
    }

    /// Add a dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: usize, dependent: usize) {
        self.node_count = self.node_count.max(precedent + 1).max(dependent + 1);
        self.dependents
            .entry(precedent)
            .or_default()
            .insert(dependent);
        self.precedents
            .entry(dependent)
            .or_default()
            .insert(precedent);
    }

    /// Get slots that depend on the given slot
    pub fn get_dependents(&self, slot: usize) -> impl Iterator<Item = usize> + '_ {
        self.dependents
            .get(&slot)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Get slots that the given slot depends on
    pub fn get_precedents(&self, slot: usize) -> impl Iterator<Item = usize> + '_ {
        self.precedents
            .get(&slot)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Whether the slot can reach itself through its precedents
    pub fn is_on_cycle(&self, slot: usize) -> bool {
        let mut visited = AHashSet::new();
        let mut stack: Vec<usize> = self.get_precedents(slot).collect();

        while let Some(current) = stack.pop() {
            if current == slot {
                return true;
            }
            if visited.insert(current) {
                stack.extend(self.get_precedents(current));
            }
        }

        false
    }

    /// Order slots so that every slot follows its precedents.
    ///
    /// Kahn's algorithm with declared order as the tie-break, so a graph
    /// whose edges all point forward keeps the declared order unchanged.
    /// Slots that cannot be ordered (on a cycle, or depending on one) are
    /// appended in declared order.
    pub fn evaluation_order(&self) -> TopologicalOrder {
        let mut in_degree: Vec<usize> = (0..self.node_count)
            .map(|slot| self.precedents.get(&slot).map_or(0, |set| set.len()))
            .collect();

        let mut ready: BTreeSet<usize> = (0..self.node_count)
            .filter(|&slot| in_degree[slot] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.node_count);
        let mut placed = vec![false; self.node_count];

        while let Some(slot) = ready.pop_first() {
            order.push(slot);
            placed[slot] = true;
            for dependent in self.get_dependents(slot) {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        let blocked: Vec<usize> = (0..self.node_count).filter(|&slot| !placed[slot]).collect();
        let cyclic = blocked
            .iter()
            .copied()
            .filter(|&slot| self.is_on_cycle(slot))
            .collect();
        order.extend(blocked);

        TopologicalOrder { order, cyclic }
    }

    /// Clear all edges
    pub fn clear(&mut self) {
        self.dependents.clear();
        self.precedents.clear();
    }
}
