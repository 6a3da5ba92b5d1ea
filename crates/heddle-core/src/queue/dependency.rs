//! Dependency graph for ordering operations.
//!
//! Design:
//! - Forward edges: operation -> operations it depends on (waits for)
//! - Reverse edges: operation -> operations that depend on it (waiting operations)
//! - Invariant: edges and reverse_edges must be kept in sync

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::domain::OperationId;

/// Dependency graph for tracking operation dependencies.
///
/// - `edges`: OperationId -> set it depends on
/// - `reverse_edges`: OperationId -> set waiting for it
#[derive(Debug, Default)]
pub struct DependencyGraph {
    edges: HashMap<OperationId, HashSet<OperationId>>,

    /// Enables O(1) lookup: "who is waiting for this operation?"
    reverse_edges: HashMap<OperationId, HashSet<OperationId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency: `op` depends on `depends_on` ("op waits for depends_on").
    pub fn add_dependency(&mut self, op: OperationId, depends_on: OperationId) {
        self.edges.entry(op).or_default().insert(depends_on);
        self.reverse_edges.entry(depends_on).or_default().insert(op);
    }

    /// Remove a dependency, typically because `depends_on` finished.
    pub fn remove_dependency(&mut self, op: OperationId, depends_on: OperationId) {
        if let Entry::Occupied(mut e) = self.edges.entry(op) {
            e.get_mut().remove(&depends_on);
            if e.get().is_empty() {
                e.remove_entry();
            }
        }
        if let Entry::Occupied(mut e) = self.reverse_edges.entry(depends_on) {
            e.get_mut().remove(&op);
            if e.get().is_empty() {
                e.remove_entry();
            }
        }
    }

    /// Drop every outgoing edge of `op` (it no longer waits for anything).
    pub fn clear_dependencies(&mut self, op: OperationId) {
        for dep in self.get_dependencies(op) {
            self.remove_dependency(op, dep);
        }
    }

    /// Operations waiting for `finished`.
    ///
    /// Includes operations that still have other dependencies; the caller
    /// checks `has_dependencies` after removing the edge.
    pub fn get_waiting(&self, finished: OperationId) -> Vec<OperationId> {
        self.reverse_edges
            .get(&finished)
            .map(|waiting| waiting.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn has_dependencies(&self, op: OperationId) -> bool {
        self.edges
            .get(&op)
            .map(|deps| !deps.is_empty())
            .unwrap_or(false)
    }

    pub fn get_dependencies(&self, op: OperationId) -> Vec<OperationId> {
        self.edges
            .get(&op)
            .map(|deps| deps.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Would adding `op -> depends_on` close a cycle?
    ///
    /// Returns the cycle (starting and ending at `op`) if so.
    pub fn cycle_with(&self, op: OperationId, depends_on: OperationId) -> Option<Vec<OperationId>> {
        if op == depends_on {
            return Some(vec![op, op]);
        }
        // A path depends_on -> ... -> op plus the new edge is a cycle.
        let mut prev: HashMap<OperationId, OperationId> = HashMap::new();
        let mut seen: HashSet<OperationId> = HashSet::from([depends_on]);
        let mut stack = vec![depends_on];
        while let Some(node) = stack.pop() {
            for dep in self.get_dependencies(node) {
                if !seen.insert(dep) {
                    continue;
                }
                prev.insert(dep, node);
                if dep == op {
                    let mut path = vec![op];
                    let mut current = op;
                    while let Some(&p) = prev.get(&current) {
                        path.push(p);
                        current = p;
                    }
                    path.reverse();
                    path.insert(0, op);
                    return Some(path);
                }
                stack.push(dep);
            }
        }
        None
    }
}
