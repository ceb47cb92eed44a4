// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo history built on serialized snapshots.
//!
//! Every mutating editor action pushes an [`EditorSnapshot`] taken *before*
//! the mutation. Undoing swaps the current state for the stored one and keeps
//! the current state on the redo side, so redo is the same swap in reverse.

use crate::graph::Graph;
use crate::node::NodeId;
use crate::view::ViewState;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Maximum undo history depth
pub const MAX_HISTORY: usize = 100;

/// History errors
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Serialized state blob
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Serialized state
    pub data: Vec<u8>,
    /// Timestamp when snapshot was taken
    pub timestamp: u64,
    /// Size in bytes
    pub size: usize,
}

impl StateSnapshot {
    /// Create a new state snapshot
    pub fn new(data: Vec<u8>) -> Self {
        let size = data.len();
        Self {
            data,
            timestamp: now_secs(),
            size,
        }
    }

    /// Create from serializable value
    pub fn from_value<T: Serialize>(value: &T) -> Result<Self> {
        let data = bincode::serialize(value)?;
        Ok(Self::new(data))
    }

    /// Deserialize to value
    pub fn to_value<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        Ok(bincode::deserialize(&self.data)?)
    }
}

/// Everything needed to put the editor back where it was
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorSnapshot {
    /// Root graph, serialized
    pub graph: StateSnapshot,
    /// Live node ids at capture time, nested graphs included
    pub nodes: Vec<NodeId>,
    /// Selection and view of the active tab
    pub view: ViewState,
    /// Subgraph path of the active tab
    pub tab_path: Vec<NodeId>,
}

impl EditorSnapshot {
    /// Decode the stored graph
    pub fn restore_graph(&self) -> Result<Graph> {
        self.graph.to_value()
    }

    /// Memory held by this snapshot
    pub fn memory_size(&self) -> usize {
        self.graph.size + self.nodes.len() * std::mem::size_of::<NodeId>()
    }
}

/// Builds snapshots while caching the live-object set.
///
/// Walking every nested graph on each snapshot is wasted work during
/// repeated actions, so the id list is only rebuilt when the node count
/// changes or a cached id no longer resolves.
#[derive(Debug, Default)]
pub struct SnapshotRecorder {
    objects: Vec<NodeId>,
    rebuilds: u64,
}

fn count_nodes(graph: &Graph) -> usize {
    graph
        .nodes()
        .map(|n| 1 + n.subgraph.as_deref().map_or(0, count_nodes))
        .sum()
}

impl SnapshotRecorder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the object set was rebuilt
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    fn is_stale(&self, graph: &Graph) -> bool {
        if count_nodes(graph) != self.objects.len() {
            return true;
        }
        self.objects
            .iter()
            .any(|id| !graph.contains_node(*id) && graph.find_node_recursive(*id).is_none())
    }

    /// Current live-object set, rebuilt if stale
    pub fn objects(&mut self, graph: &Graph) -> &[NodeId] {
        if self.rebuilds == 0 || self.is_stale(graph) {
            self.objects = graph.all_node_ids();
            self.rebuilds += 1;
        }
        &self.objects
    }

    /// Drop the cached set
    pub fn invalidate(&mut self) {
        self.objects.clear();
        self.rebuilds = 0;
    }

    /// Capture graph and transient editor state
    pub fn record(&mut self, graph: &Graph, view: ViewState, tab_path: Vec<NodeId>) -> Result<EditorSnapshot> {
        let snapshot = StateSnapshot::from_value(graph)?;
        Ok(EditorSnapshot {
            graph: snapshot,
            nodes: self.objects(graph).to_vec(),
            view,
            tab_path,
        })
    }
}

/// One labelled history entry
#[derive(Debug, Clone)]
pub struct UndoEntry {
    /// Human-readable description
    pub label: String,
    /// State to return to
    pub snapshot: EditorSnapshot,
    /// Timestamp
    pub timestamp: u64,
}

impl UndoEntry {
    fn new(label: String, snapshot: EditorSnapshot) -> Self {
        Self {
            label,
            snapshot,
            timestamp: now_secs(),
        }
    }
}

/// Host undo stack the editor pushes snapshots into
pub trait UndoStack {
    /// Record the state before a mutation under a label. Clears redo.
    fn append(&mut self, snapshot: EditorSnapshot, label: &str);

    /// Step back: `current` moves to the redo side, the stored state is returned
    fn undo(&mut self, current: EditorSnapshot) -> Result<EditorSnapshot>;

    /// Step forward: `current` moves to the undo side, the stored state is returned
    fn redo(&mut self, current: EditorSnapshot) -> Result<EditorSnapshot>;

    /// Check if undo is available
    fn can_undo(&self) -> bool;

    /// Check if redo is available
    fn can_redo(&self) -> bool;

    /// Drop the most recent entry without applying it, returning its label
    fn discard_last(&mut self) -> Option<String>;

    /// Label of the next undo
    fn undo_label(&self) -> Option<&str>;

    /// Label of the next redo
    fn redo_label(&self) -> Option<&str>;

    /// Clear all history
    fn clear(&mut self);
}

/// History statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStats {
    /// Entries in the undo stack
    pub undo_count: usize,
    /// Entries in the redo stack
    pub redo_count: usize,
    /// Total memory used by history (bytes)
    pub memory_used: usize,
    /// Maximum history depth
    pub max_depth: usize,
}

/// Entries pushed out by the latest append. Restored by `discard_last`,
/// dropped by any other history operation.
#[derive(Debug, Default)]
struct Displaced {
    redo: VecDeque<UndoEntry>,
    evicted: Vec<UndoEntry>,
}

/// Bounded in-memory [`UndoStack`]
#[derive(Debug)]
pub struct History {
    undo_stack: VecDeque<UndoEntry>,
    redo_stack: VecDeque<UndoEntry>,
    displaced: Option<Displaced>,
    max_depth: usize,
    memory_used: usize,
}

impl History {
    /// Create a new history manager
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create with custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            displaced: None,
            max_depth: max_depth.max(1),
            memory_used: 0,
        }
    }

    /// Get undo stack depth
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get redo stack depth
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            memory_used: self.memory_used,
            max_depth: self.max_depth,
        }
    }

    /// Push onto the undo stack, returning entries evicted by the depth
    /// limit, oldest first
    fn push_undo(&mut self, entry: UndoEntry) -> Vec<UndoEntry> {
        self.memory_used += entry.snapshot.memory_size();
        self.undo_stack.push_back(entry);

        let mut evicted = Vec::new();
        while self.undo_stack.len() > self.max_depth {
            if let Some(old) = self.undo_stack.pop_front() {
                self.memory_used = self.memory_used.saturating_sub(old.snapshot.memory_size());
                evicted.push(old);
            }
        }
        evicted
    }

    fn push_redo(&mut self, entry: UndoEntry) {
        self.memory_used += entry.snapshot.memory_size();
        self.redo_stack.push_back(entry);
    }

    fn take_redo(&mut self) -> VecDeque<UndoEntry> {
        let redo = std::mem::take(&mut self.redo_stack);
        for entry in &redo {
            self.memory_used = self.memory_used.saturating_sub(entry.snapshot.memory_size());
        }
        redo
    }

    fn restore(&mut self, displaced: Displaced) {
        for entry in displaced.evicted.into_iter().rev() {
            self.memory_used += entry.snapshot.memory_size();
            self.undo_stack.push_front(entry);
        }
        for entry in displaced.redo {
            self.push_redo(entry);
        }
    }
}

impl UndoStack for History {
    fn append(&mut self, snapshot: EditorSnapshot, label: &str) {
        let redo = self.take_redo();
        let evicted = self.push_undo(UndoEntry::new(label.to_string(), snapshot));
        self.displaced = Some(Displaced { redo, evicted });
        tracing::debug!("Recorded undo entry '{}' ({} deep)", label, self.undo_stack.len());
    }

    fn undo(&mut self, current: EditorSnapshot) -> Result<EditorSnapshot> {
        let entry = self.undo_stack.pop_back().ok_or(HistoryError::NothingToUndo)?;
        self.displaced = None;
        self.memory_used = self.memory_used.saturating_sub(entry.snapshot.memory_size());
        self.push_redo(UndoEntry::new(entry.label, current));
        Ok(entry.snapshot)
    }

    fn redo(&mut self, current: EditorSnapshot) -> Result<EditorSnapshot> {
        let entry = self.redo_stack.pop_back().ok_or(HistoryError::NothingToRedo)?;
        self.displaced = None;
        self.memory_used = self.memory_used.saturating_sub(entry.snapshot.memory_size());
        self.push_undo(UndoEntry::new(entry.label, current));
        Ok(entry.snapshot)
    }

    fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    fn discard_last(&mut self) -> Option<String> {
        let entry = self.undo_stack.pop_back()?;
        self.memory_used = self.memory_used.saturating_sub(entry.snapshot.memory_size());
        if let Some(displaced) = self.displaced.take() {
            self.restore(displaced);
        }
        Some(entry.label)
    }

    fn undo_label(&self) -> Option<&str> {
        self.undo_stack.back().map(|e| e.label.as_str())
    }

    fn redo_label(&self) -> Option<&str> {
        self.redo_stack.back().map(|e| e.label.as_str())
    }

    fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.displaced = None;
        self.memory_used = 0;
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeKind};

    fn snapshot_of(graph: &Graph, recorder: &mut SnapshotRecorder) -> EditorSnapshot {
        recorder.record(graph, ViewState::default(), Vec::new()).unwrap()
    }

    #[test]
    fn test_undo_redo_swaps_states() {
        let mut recorder = SnapshotRecorder::new();
        let mut history = History::new();
        let mut graph = Graph::with_entry_nodes("test");

        history.append(snapshot_of(&graph, &mut recorder), "Add node");
        graph.add_node(Node::new(NodeKind::General, "state", "A"));
        assert_eq!(graph.node_count(), 2);

        let restored = history.undo(snapshot_of(&graph, &mut recorder)).unwrap();
        let graph_before = restored.restore_graph().unwrap();
        assert_eq!(graph_before.node_count(), 1);
        assert_eq!(history.redo_label(), Some("Add node"));

        let redone = history.redo(snapshot_of(&graph_before, &mut recorder)).unwrap();
        assert_eq!(redone.restore_graph().unwrap().node_count(), 2);
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_empty_history_errors() {
        let mut recorder = SnapshotRecorder::new();
        let graph = Graph::new("test");
        let mut history = History::new();
        assert!(matches!(
            history.undo(snapshot_of(&graph, &mut recorder)),
            Err(HistoryError::NothingToUndo)
        ));
        assert!(matches!(
            history.redo(snapshot_of(&graph, &mut recorder)),
            Err(HistoryError::NothingToRedo)
        ));
    }

    #[test]
    fn test_append_clears_redo() {
        let mut recorder = SnapshotRecorder::new();
        let graph = Graph::new("test");
        let mut history = History::new();
        history.append(snapshot_of(&graph, &mut recorder), "one");
        history.undo(snapshot_of(&graph, &mut recorder)).unwrap();
        assert!(history.can_redo());
        history.append(snapshot_of(&graph, &mut recorder), "two");
        assert!(!history.can_redo());
    }

    #[test]
    fn test_depth_limit_and_memory() {
        let mut recorder = SnapshotRecorder::new();
        let graph = Graph::with_entry_nodes("test");
        let mut history = History::with_max_depth(3);
        for i in 0..5 {
            history.append(snapshot_of(&graph, &mut recorder), &format!("op {i}"));
        }
        let stats = history.stats();
        assert_eq!(stats.undo_count, 3);
        assert!(stats.memory_used > 0);
        assert_eq!(history.undo_label(), Some("op 4"));

        history.clear();
        assert_eq!(history.stats().memory_used, 0);
    }

    #[test]
    fn test_discard_last() {
        let mut recorder = SnapshotRecorder::new();
        let graph = Graph::new("test");
        let mut history = History::new();
        history.append(snapshot_of(&graph, &mut recorder), "Drag");
        assert_eq!(history.discard_last().as_deref(), Some("Drag"));
        assert!(!history.can_undo());
        assert_eq!(history.discard_last(), None);
    }

    #[test]
    fn test_discard_last_restores_displaced_entries() {
        let mut recorder = SnapshotRecorder::new();
        let graph = Graph::new("test");
        let mut history = History::with_max_depth(2);
        history.append(snapshot_of(&graph, &mut recorder), "one");
        history.append(snapshot_of(&graph, &mut recorder), "two");
        history.undo(snapshot_of(&graph, &mut recorder)).unwrap();
        history.append(snapshot_of(&graph, &mut recorder), "three");
        let before = history.stats();

        // Redo is cleared and "one" would be evicted on the next append
        history.append(snapshot_of(&graph, &mut recorder), "rejected");
        assert!(!history.can_redo());
        assert_eq!(history.discard_last().as_deref(), Some("rejected"));
        assert_eq!(history.stats(), before);
        assert_eq!(history.undo_label(), Some("three"));

        history.undo(snapshot_of(&graph, &mut recorder)).unwrap();
        assert_eq!(history.undo_label(), Some("one"));
    }

    #[test]
    fn test_discard_after_undo_keeps_redo() {
        let mut recorder = SnapshotRecorder::new();
        let graph = Graph::new("test");
        let mut history = History::new();
        history.append(snapshot_of(&graph, &mut recorder), "one");
        history.append(snapshot_of(&graph, &mut recorder), "two");
        history.undo(snapshot_of(&graph, &mut recorder)).unwrap();
        assert_eq!(history.discard_last().as_deref(), Some("one"));
        assert_eq!(history.redo_label(), Some("two"));
    }

    #[test]
    fn test_recorder_caches_object_set() {
        let mut recorder = SnapshotRecorder::new();
        let mut graph = Graph::with_entry_nodes("test");
        let a = graph.add_node(Node::new(NodeKind::General, "state", "A"));

        assert_eq!(recorder.objects(&graph).len(), 2);
        graph.node_mut(a).unwrap().position = [10.0, 10.0];
        recorder.objects(&graph);
        assert_eq!(recorder.rebuild_count(), 1);

        graph.add_node(Node::new(NodeKind::General, "state", "B"));
        assert_eq!(recorder.objects(&graph).len(), 3);
        assert_eq!(recorder.rebuild_count(), 2);
    }

    #[test]
    fn test_recorder_detects_stale_ids() {
        let mut recorder = SnapshotRecorder::new();
        let mut graph = Graph::with_entry_nodes("test");
        let a = graph.add_node(Node::new(NodeKind::General, "state", "A"));
        recorder.objects(&graph);

        // Same count, different node
        graph.remove_node(a, crate::graph::RemoveMode::Hard);
        let b = graph.add_node(Node::new(NodeKind::General, "state", "B"));
        assert!(recorder.objects(&graph).contains(&b));
        assert_eq!(recorder.rebuild_count(), 2);
    }

    #[test]
    fn test_nested_nodes_are_counted() {
        let mut recorder = SnapshotRecorder::new();
        let mut graph = Graph::with_entry_nodes("test");
        graph.add_node(Node::new(NodeKind::SubGraph, "subgraph", "Sub"));
        // start + sub + enter + exit
        assert_eq!(recorder.objects(&graph).len(), 4);
    }
}
