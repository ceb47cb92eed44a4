// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node selection state.

use crate::node::NodeId;
use indexmap::IndexSet;

/// Selection mode for a press on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectMode {
    /// Select the node alone unless it is already selected
    #[default]
    Keep,
    /// Toggle in current selection (Shift/Ctrl+Click)
    Toggle,
}

/// Selected nodes of the active graph, in selection order.
///
/// When no node is selected the graph itself may be the selection target
/// (`graph_selected`), which external inspector panels use as a fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    nodes: IndexSet<NodeId>,
    graph_selected: bool,
}

impl Selection {
    /// Create a new empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a selection with the given nodes
    pub fn with_nodes(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            nodes: nodes.into_iter().collect(),
            graph_selected: false,
        }
    }

    /// Check if a node is selected
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    /// Add a node (idempotent)
    pub fn add(&mut self, id: NodeId) {
        self.nodes.insert(id);
        self.graph_selected = false;
    }

    /// Remove a node
    pub fn remove(&mut self, id: NodeId) -> bool {
        self.nodes.shift_remove(&id)
    }

    /// Toggle a node
    pub fn toggle(&mut self, id: NodeId) {
        if !self.nodes.shift_remove(&id) {
            self.add(id);
        }
    }

    /// Apply a press with the given mode
    pub fn apply(&mut self, id: NodeId, mode: SelectMode) {
        match mode {
            SelectMode::Keep if self.contains(id) => {}
            SelectMode::Keep => self.set([id]),
            SelectMode::Toggle => self.toggle(id),
        }
    }

    /// Replace the selection
    pub fn set(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.nodes = ids.into_iter().collect();
        self.graph_selected = false;
    }

    /// Symmetric difference of `base` and `other`
    pub fn symmetric_difference(base: &Selection, other: &[NodeId]) -> Selection {
        let other: IndexSet<NodeId> = other.iter().copied().collect();
        Selection::with_nodes(base.nodes.symmetric_difference(&other).copied())
    }

    /// Clear the selection
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.graph_selected = false;
    }

    /// Clear nodes and select the graph itself
    pub fn select_graph(&mut self) {
        self.nodes.clear();
        self.graph_selected = true;
    }

    /// Whether the graph itself is the selection target
    pub fn is_graph_selected(&self) -> bool {
        self.graph_selected
    }

    /// Keep only nodes matching a predicate
    pub fn retain(&mut self, mut keep: impl FnMut(NodeId) -> bool) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|id| keep(*id));
        before - self.nodes.len()
    }

    /// Check if the selection is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of selected nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Iterate over selected nodes
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// Selected ids as a vector
    pub fn to_vec(&self) -> Vec<NodeId> {
        self.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_and_apply() {
        let a = NodeId::new();
        let b = NodeId::new();
        let mut selection = Selection::new();
        selection.apply(a, SelectMode::Keep);
        selection.apply(b, SelectMode::Toggle);
        assert_eq!(selection.to_vec(), vec![a, b]);
        // Pressing a selected node keeps the group for dragging
        selection.apply(b, SelectMode::Keep);
        assert_eq!(selection.to_vec(), vec![a, b]);
        selection.apply(a, SelectMode::Toggle);
        assert_eq!(selection.to_vec(), vec![b]);
        selection.apply(a, SelectMode::Keep);
        assert_eq!(selection.to_vec(), vec![a]);
    }

    #[test]
    fn test_symmetric_difference() {
        let a = NodeId::new();
        let b = NodeId::new();
        let c = NodeId::new();
        let base = Selection::with_nodes([a, b]);
        let merged = Selection::symmetric_difference(&base, &[a, c]);
        assert!(!merged.contains(a));
        assert!(merged.contains(b));
        assert!(merged.contains(c));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_graph_fallback_target() {
        let a = NodeId::new();
        let mut selection = Selection::with_nodes([a]);
        selection.select_graph();
        assert!(selection.is_empty());
        assert!(selection.is_graph_selected());
        selection.add(a);
        assert!(!selection.is_graph_selected());
    }

    #[test]
    fn test_retain_reports_removed() {
        let a = NodeId::new();
        let b = NodeId::new();
        let mut selection = Selection::with_nodes([a, b]);
        assert_eq!(selection.retain(|id| id == a), 1);
        assert_eq!(selection.to_vec(), vec![a]);
    }
}
