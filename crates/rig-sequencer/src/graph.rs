//! Dependency graph between loads
//!
//! Edges run from prerequisite to dependent. The graph is kept acyclic on
//! every insertion, so any order the sequencer produces is a valid
//! topological order.

use crate::error::SequencerError;
use crate::key::LoadKey;
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

/// Declared "X waits for Y" constraints
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    inner: DiGraph<LoadKey, ()>,
    index: HashMap<LoadKey, NodeIndex>,
}

impl DependencyGraph {
    /// Create empty graph
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a load
    ///
    /// # Errors
    /// `SequencerError::DuplicateLoad` if already present
    pub fn add_load(&mut self, key: LoadKey) -> Result<(), SequencerError> {
        if self.index.contains_key(&key) {
            return Err(SequencerError::DuplicateLoad(key));
        }
        let node = self.inner.add_node(key.clone());
        self.index.insert(key, node);
        Ok(())
    }

    /// Declare that `dependent` must wait for `prerequisite` to be loaded
    ///
    /// # Errors
    /// - `SequencerError::UnknownLoad` if either load is missing
    /// - `SequencerError::SelfDependency` if both are the same
    /// - `SequencerError::DuplicateDependency` if already declared
    /// - `SequencerError::Cycle` if the edge would close a cycle
    pub fn add_dependency(
        &mut self,
        dependent: &LoadKey,
        prerequisite: &LoadKey,
    ) -> Result<(), SequencerError> {
        let to = self.node(dependent)?;
        let from = self.node(prerequisite)?;

        if from == to {
            return Err(SequencerError::SelfDependency(dependent.clone()));
        }
        if self.inner.contains_edge(from, to) {
            return Err(SequencerError::DuplicateDependency {
                dependent: dependent.clone(),
                prerequisite: prerequisite.clone(),
            });
        }

        let edge = self.inner.add_edge(from, to, ());
        if is_cyclic_directed(&self.inner) {
            self.inner.remove_edge(edge);
            return Err(SequencerError::Cycle {
                dependent: dependent.clone(),
                prerequisite: prerequisite.clone(),
            });
        }
        Ok(())
    }

    fn node(&self, key: &LoadKey) -> Result<NodeIndex, SequencerError> {
        self.index
            .get(key)
            .copied()
            .ok_or_else(|| SequencerError::UnknownLoad(key.clone()))
    }

    /// Check if a load is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Loads `key` waits for
    #[must_use]
    pub fn prerequisites(&self, key: &str) -> Vec<LoadKey> {
        self.neighbors(key, Direction::Incoming)
    }

    /// Loads waiting for `key`
    #[must_use]
    pub fn dependents(&self, key: &str) -> Vec<LoadKey> {
        self.neighbors(key, Direction::Outgoing)
    }

    fn neighbors(&self, key: &str, direction: Direction) -> Vec<LoadKey> {
        let Some(&node) = self.index.get(key) else {
            return Vec::new();
        };
        let mut keys: Vec<LoadKey> = self
            .inner
            .neighbors_directed(node, direction)
            .map(|n| self.inner[n].clone())
            .collect();
        keys.sort();
        keys
    }

    /// All loads, prerequisites before dependents
    #[must_use]
    pub fn topological_order(&self) -> Vec<LoadKey> {
        // Acyclic by construction, so toposort cannot fail.
        toposort(&self.inner, None)
            .map(|order| order.into_iter().map(|n| self.inner[n].clone()).collect())
            .unwrap_or_default()
    }

    /// Loads with no prerequisites
    #[must_use]
    pub fn roots(&self) -> Vec<LoadKey> {
        let mut roots: Vec<LoadKey> = self
            .inner
            .node_indices()
            .filter(|&n| {
                self.inner
                    .neighbors_directed(n, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|n| self.inner[n].clone())
            .collect();
        roots.sort();
        roots
    }

    /// All `(dependent, prerequisite)` pairs
    #[must_use]
    pub fn edges(&self) -> Vec<(LoadKey, LoadKey)> {
        let mut edges: Vec<(LoadKey, LoadKey)> = self
            .inner
            .edge_indices()
            .filter_map(|e| self.inner.edge_endpoints(e))
            .map(|(from, to)| (self.inner[to].clone(), self.inner[from].clone()))
            .collect();
        edges.sort();
        edges
    }

    /// All loads in registration order
    pub fn keys(&self) -> impl Iterator<Item = &LoadKey> {
        self.inner.node_weights()
    }

    /// Number of loads
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.node_count()
    }

    /// Check if graph has no loads
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.node_count() == 0
    }
}
