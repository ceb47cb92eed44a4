// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor session: one open graph plus every cache and mode around it.
//!
//! All model mutation goes through [`EditorSession`]. Each mutating call
//! records an undo snapshot before touching the graph, invalidates the
//! lookup maps and publishes the matching [`EditorEvent`].

use crate::clipboard::{unique_name, Clipboard, PasteBatch};
use crate::config::EditorConfig;
use crate::connection::ConnectionId;
use crate::events::{ContextTarget, DeferredQueue, EditorEvent, EventBus, SubscriptionId};
use crate::graph::{ConnectionError, Graph, RemoveMode, RepairReport, ReorderDirection};
use crate::history::{EditorSnapshot, History, SnapshotRecorder, UndoStack};
use crate::interaction::{ConnectHint, InputTracker, InteractionState};
use crate::lookup::{self, LookupMaps};
use crate::node::NodeId;
use crate::persistence::{GraphStore, PersistenceError};
use crate::registry::{NodeTypeRegistry, RegistryError};
use crate::selection::Selection;
use crate::socket::{Socket, SocketId};
use crate::tabs::TabStack;
use crate::view::{snap, ViewState, ViewTransform};
use egui::{Pos2, Rect, Vec2};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Margin kept around framed nodes, in world units
const FRAME_MARGIN: f32 = 40.0;

/// Session errors
#[derive(Debug, Error)]
pub enum EditorError {
    /// Unknown node type requested
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Load or save failed
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The active tab does not resolve to a graph
    #[error("Active graph is not available")]
    GraphUnavailable,
}

/// Work deferred to the next event-loop tick
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Force a full lookup rebuild
    RebuildLookups,
    /// Fit the view around these nodes (all nodes if empty)
    FrameNodes(Vec<NodeId>),
    /// Recompute duplicate-name flags in every graph
    ValidateNames,
}

/// An open graph with its editor state
pub struct EditorSession {
    pub(crate) root: Graph,
    pub(crate) tabs: TabStack,
    pub(crate) view: ViewTransform,
    pub(crate) selection: Selection,
    pub(crate) lookup: LookupMaps,
    pub(crate) state: InteractionState,
    pub(crate) input: InputTracker,
    pub(crate) history: Box<dyn UndoStack>,
    pub(crate) recorder: SnapshotRecorder,
    pub(crate) clipboard: Clipboard,
    pub(crate) events: EventBus,
    pub(crate) deferred: DeferredQueue<SessionAction>,
    pub(crate) config: EditorConfig,
    pub(crate) registry: NodeTypeRegistry,
    pub(crate) context_menu: Option<(ContextTarget, Pos2)>,
    asset_path: Option<PathBuf>,
    dirty: bool,
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("graph", &self.root.name)
            .field("tabs", &self.tabs.breadcrumb())
            .field("state", &self.state)
            .field("selection", &self.selection.len())
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

fn validate_all(graph: &mut Graph) {
    graph.validate_names();
    for node in graph.nodes_mut() {
        if let Some(subgraph) = node.subgraph.as_deref_mut() {
            validate_all(subgraph);
        }
    }
}

impl EditorSession {
    /// Open a session on a graph
    pub fn new(graph: Graph, config: EditorConfig, registry: NodeTypeRegistry) -> Self {
        let config = config.sanitized();
        let mut view = ViewTransform::new(config.min_zoom, config.max_zoom);
        view.restore(1.0, [0.0, 0.0]);
        let history = Box::new(History::with_max_depth(config.undo_depth));
        let tabs = TabStack::new(graph.name.clone());
        Self {
            root: graph,
            tabs,
            view,
            selection: Selection::new(),
            lookup: LookupMaps::new(),
            state: InteractionState::Idle,
            input: InputTracker::default(),
            history,
            recorder: SnapshotRecorder::new(),
            clipboard: Clipboard::new(),
            events: EventBus::new(),
            deferred: DeferredQueue::new(),
            config,
            registry,
            context_menu: None,
            asset_path: None,
            dirty: false,
        }
    }

    /// Replace the undo stack implementation
    pub fn with_undo_stack(mut self, history: Box<dyn UndoStack>) -> Self {
        self.history = history;
        self
    }

    /// Load a graph asset and open a session on it
    pub fn open(
        store: &impl GraphStore,
        path: &Path,
        config: EditorConfig,
        registry: NodeTypeRegistry,
    ) -> Result<Self, PersistenceError> {
        let graph = store.load(path)?;
        let mut session = Self::new(graph, config, registry);
        session.asset_path = Some(path.to_path_buf());
        session.deferred.schedule(SessionAction::FrameNodes(Vec::new()), 1);
        let title = session.root.name.clone();
        session.events.publish(EditorEvent::GraphOpened { path: Vec::new(), title });
        Ok(session)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Root graph
    pub fn root(&self) -> &Graph {
        &self.root
    }

    /// Graph shown by the active tab
    pub fn graph(&self) -> &Graph {
        self.root
            .graph_at_path(self.tabs.active_path())
            .unwrap_or(&self.root)
    }

    pub(crate) fn active_graph_mut(&mut self) -> Option<&mut Graph> {
        self.root.graph_at_path_mut(self.tabs.active_path())
    }

    /// View transform
    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    /// Current selection
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Lookup maps, as last built
    pub fn lookup(&self) -> &LookupMaps {
        &self.lookup
    }

    /// Interaction mode
    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    /// Provisional connection hint while connecting
    pub fn connect_hint(&self) -> ConnectHint {
        match &self.state {
            InteractionState::Connect(connect) => connect.hint,
            _ => ConnectHint::Neutral,
        }
    }

    /// Navigation tabs
    pub fn tabs(&self) -> &TabStack {
        &self.tabs
    }

    /// Configuration
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Node type registry
    pub fn registry(&self) -> &NodeTypeRegistry {
        &self.registry
    }

    /// Clipboard
    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    /// Undo stack
    pub fn history(&self) -> &dyn UndoStack {
        self.history.as_ref()
    }

    /// Pending context menu request, cleared by [`EditorSession::take_context_menu`]
    pub fn context_menu(&self) -> Option<&(ContextTarget, Pos2)> {
        self.context_menu.as_ref()
    }

    /// Take the pending context menu request
    pub fn take_context_menu(&mut self) -> Option<(ContextTarget, Pos2)> {
        self.context_menu.take()
    }

    /// Last pointer position in world space
    pub fn pointer(&self) -> Pos2 {
        self.input.pointer
    }

    /// Asset path, if the graph was loaded or saved
    pub fn asset_path(&self) -> Option<&Path> {
        self.asset_path.as_deref()
    }

    /// Whether there are unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    // ------------------------------------------------------------------
    // Events and deferred work
    // ------------------------------------------------------------------

    /// Subscribe to editor events
    pub fn subscribe(&mut self, callback: impl FnMut(&EditorEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(callback)
    }

    /// Remove an event subscription
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Queue work for a later tick
    pub fn schedule(&mut self, action: SessionAction, delay_ticks: u32) -> crate::events::DeferredToken {
        self.deferred.schedule(action, delay_ticks)
    }

    /// Cancel queued work
    pub fn cancel(&mut self, token: crate::events::DeferredToken) -> bool {
        self.deferred.cancel(token)
    }

    /// Drain deferred actions due this tick. Call once per event-loop tick.
    pub fn tick(&mut self) {
        for action in self.deferred.tick() {
            match action {
                SessionAction::RebuildLookups => {
                    self.lookup.invalidate();
                    self.ensure_lookups();
                }
                SessionAction::FrameNodes(ids) => self.frame_nodes(&ids),
                SessionAction::ValidateNames => validate_all(&mut self.root),
            }
        }
    }

    // ------------------------------------------------------------------
    // Lookups and view
    // ------------------------------------------------------------------

    /// Rebuild lookup maps if they are stale
    pub fn ensure_lookups(&mut self) {
        let graph = self
            .root
            .graph_at_path(self.tabs.active_path())
            .unwrap_or(&self.root);
        self.lookup.ensure(graph, &self.view, &self.config);
    }

    /// Recompute one node's lookup entries after it moved
    pub(crate) fn refresh_node(&mut self, node_id: NodeId) {
        let graph = self
            .root
            .graph_at_path(self.tabs.active_path())
            .unwrap_or(&self.root);
        self.lookup.refresh_node(graph, node_id, &self.view, &self.config);
    }

    /// Set the canvas size in world units
    pub fn set_viewport(&mut self, size: Vec2) {
        if self.view.viewport != size {
            self.view.viewport = size;
            self.deferred.schedule(SessionAction::RebuildLookups, 0);
        }
    }

    /// Zoom keeping `cursor` fixed
    pub fn zoom_at(&mut self, cursor: Pos2, steps: f32) {
        self.view.zoom_at(cursor, steps, self.config.zoom_step);
    }

    /// Pan by a world-space delta
    pub fn pan_by(&mut self, delta: Vec2) {
        self.view.pan_by(delta);
    }

    /// Fit the view around nodes of the active graph, or all of them if
    /// `ids` is empty
    pub fn frame_nodes(&mut self, ids: &[NodeId]) {
        let graph = self.graph();
        let rect = graph
            .nodes()
            .filter(|n| ids.is_empty() || ids.contains(&n.id))
            .map(|n| lookup::node_grid_rect(n, &self.config))
            .reduce(|a, b| a.union(b));
        if let Some(rect) = rect {
            self.view.frame(rect, FRAME_MARGIN);
        }
    }

    /// Grid position under a world position, snapped if enabled
    pub fn grid_at(&self, world: Pos2) -> [f32; 2] {
        let grid = self.view.world_to_grid(world);
        self.snap([grid.x, grid.y])
    }

    pub(crate) fn snap(&self, position: [f32; 2]) -> [f32; 2] {
        if self.config.snap_to_grid {
            snap(position, self.config.grid_cell)
        } else {
            position
        }
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Selection plus view of the active tab
    pub fn view_state(&self) -> ViewState {
        let (zoom, pan) = self.view.capture();
        ViewState {
            zoom,
            pan,
            selection: self.selection.to_vec(),
            graph_selected: self.selection.is_graph_selected(),
        }
    }

    pub(crate) fn apply_view_state(&mut self, state: ViewState, restore_transform: bool) {
        if restore_transform {
            self.view.restore(state.zoom, state.pan);
        }
        let graph = self.graph();
        let mut selection = Selection::with_nodes(
            state
                .selection
                .into_iter()
                .filter(|id| graph.contains_node(*id)),
        );
        if state.graph_selected && selection.is_empty() {
            selection.select_graph();
        }
        self.set_selection(selection);
    }

    /// Replace the selection, publishing a change event if it differs
    pub fn set_selection(&mut self, selection: Selection) {
        if selection != self.selection {
            self.selection = selection;
            self.events
                .publish(EditorEvent::SelectionChanged(self.selection.to_vec()));
        }
    }

    /// Select the given nodes
    pub fn select(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.set_selection(Selection::with_nodes(ids));
    }

    /// Select every node of the active graph
    pub fn select_all(&mut self) {
        let ids: Vec<_> = self.graph().node_ids().collect();
        self.select(ids);
    }

    /// Clear the selection and make the graph the selection target
    pub fn select_graph(&mut self) {
        let mut selection = Selection::new();
        selection.select_graph();
        self.set_selection(selection);
    }

    // ------------------------------------------------------------------
    // Undo
    // ------------------------------------------------------------------

    fn capture(&mut self) -> Option<EditorSnapshot> {
        let view = self.view_state();
        let path = self.tabs.active_path().to_vec();
        match self.recorder.record(&self.root, view, path) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!("Failed to capture undo snapshot: {}", e);
                None
            }
        }
    }

    /// Push the current state under `label` before a mutation
    pub(crate) fn record_undo(&mut self, label: &str) -> bool {
        match self.capture() {
            Some(snapshot) => {
                self.history.append(snapshot, label);
                true
            }
            None => false,
        }
    }

    /// Drop the entry pushed for a mutation that turned out to be a no-op
    pub(crate) fn discard_undo(&mut self) {
        self.history.discard_last();
    }

    /// Whether undo is available
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether redo is available
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Undo the last recorded action
    pub fn undo(&mut self) -> bool {
        self.step_history(false)
    }

    /// Redo the last undone action
    pub fn redo(&mut self) -> bool {
        self.step_history(true)
    }

    fn step_history(&mut self, redo: bool) -> bool {
        let label = if redo {
            self.history.redo_label()
        } else {
            self.history.undo_label()
        };
        let Some(label) = label.map(str::to_string) else {
            return false;
        };
        let Some(current) = self.capture() else {
            return false;
        };
        let result = if redo {
            self.history.redo(current)
        } else {
            self.history.undo(current)
        };
        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!("History step failed: {}", e);
                return false;
            }
        };
        let graph = match snapshot.restore_graph() {
            Ok(graph) => graph,
            Err(e) => {
                tracing::warn!("Failed to restore snapshot '{}': {}", label, e);
                return false;
            }
        };

        self.state = InteractionState::Idle;
        self.root = graph;
        self.recorder.invalidate();
        self.tabs.resolve(&self.root);
        let report = self.repair();
        let same_tab = snapshot.tab_path.as_slice() == self.tabs.active_path();
        self.apply_view_state(snapshot.view, same_tab);
        self.lookup.invalidate();
        self.mark_dirty();
        self.deferred.schedule(SessionAction::ValidateNames, 0);

        tracing::info!(
            "{} '{}' ({} repairs)",
            if redo { "Redo" } else { "Undo" },
            label,
            report.total()
        );
        self.events
            .publish(EditorEvent::UndoRedoPerformed { label, redo });
        true
    }

    /// Run the repair pass over the whole tree and prune stale lookups.
    /// Non-empty reports are published as [`EditorEvent::GraphRepaired`].
    pub fn repair(&mut self) -> RepairReport {
        let report = self.root.repair();
        validate_all(&mut self.root);
        let graph = self
            .root
            .graph_at_path(self.tabs.active_path())
            .unwrap_or(&self.root);
        let pruned = self.lookup.prune(graph);
        let selection_pruned = self.selection.retain(|id| graph.contains_node(id));
        if !report.is_clean() || pruned > 0 {
            tracing::debug!("Repair: {:?}, {} lookup entries pruned", report, pruned);
        }
        if selection_pruned > 0 {
            self.events
                .publish(EditorEvent::SelectionChanged(self.selection.to_vec()));
        }
        if !report.is_clean() {
            self.events.publish(EditorEvent::GraphRepaired(report));
        }
        report
    }

    fn structural_change(&mut self) {
        self.lookup.invalidate();
        self.mark_dirty();
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Instantiate a registered node type at a grid position
    pub fn add_node(&mut self, type_id: &str, grid: [f32; 2]) -> Result<NodeId, EditorError> {
        let position = self.snap(grid);
        let mut node = self.registry.instantiate(type_id, position).map_err(|e| {
            tracing::warn!("{}", e);
            e
        })?;
        if !node.allow_duplicate_name {
            node.name = unique_name(self.graph(), &node.name);
        }
        let label = format!("Add {}", node.name);
        self.record_undo(&label);
        let Some(graph) = self.active_graph_mut() else {
            self.discard_undo();
            return Err(EditorError::GraphUnavailable);
        };
        let id = graph.add_node(node);
        self.structural_change();
        self.events.publish(EditorEvent::NodeCreated(id));
        Ok(id)
    }

    /// Soft-delete nodes. Protected and non-deletable nodes are kept.
    /// Returns the number of nodes removed.
    pub fn remove_nodes(&mut self, ids: &[NodeId]) -> usize {
        let deletable: Vec<NodeId> = ids
            .iter()
            .copied()
            .filter(|id| self.graph().node(*id).is_some_and(|n| n.can_delete()))
            .collect();
        if deletable.is_empty() {
            return 0;
        }
        self.record_undo("Delete nodes");
        let Some(graph) = self.active_graph_mut() else {
            self.discard_undo();
            return 0;
        };

        let mut events = Vec::new();
        for id in deletable {
            let connections: Vec<ConnectionId> =
                graph.connections_for_node(id).map(|c| c.id).collect();
            if graph.remove_node(id, RemoveMode::Soft).is_some() {
                events.extend(connections.into_iter().map(EditorEvent::ConnectionRemoved));
                events.push(EditorEvent::NodeDeleted(id));
            }
        }
        let removed = events
            .iter()
            .filter(|e| matches!(e, EditorEvent::NodeDeleted(_)))
            .count();

        self.structural_change();
        self.tabs.resolve(&self.root);
        for event in events {
            self.events.publish(event);
        }
        let graph = self.graph();
        let mut selection = self.selection.clone();
        selection.retain(|id| graph.contains_node(id));
        self.set_selection(selection);
        removed
    }

    /// Soft-delete the selected nodes
    pub fn delete_selection(&mut self) -> usize {
        let ids = self.selection.to_vec();
        self.remove_nodes(&ids)
    }

    /// Rename a node of the active graph
    pub fn rename_node(&mut self, id: NodeId, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.graph().node(id).map_or(true, |n| n.name == name) {
            return false;
        }
        self.record_undo("Rename node");
        let Some(graph) = self.active_graph_mut() else {
            self.discard_undo();
            return false;
        };
        graph.rename_node(id, name.clone());
        self.structural_change();
        self.tabs.resolve(&self.root);
        self.events.publish(EditorEvent::NodeRenamed { node: id, name });
        true
    }

    /// Move a node to a grid position
    pub fn move_node(&mut self, id: NodeId, position: [f32; 2]) -> bool {
        if !self.graph().contains_node(id) {
            return false;
        }
        self.record_undo("Move node");
        let position = self.snap(position);
        if let Some(node) = self.active_graph_mut().and_then(|g| g.node_mut(id)) {
            node.position = position;
        }
        if let Some(graph) = self.active_graph_mut() {
            graph.mark_dirty();
        }
        self.mark_dirty();
        self.refresh_node(id);
        true
    }

    // ------------------------------------------------------------------
    // Sockets
    // ------------------------------------------------------------------

    /// Append a socket to a node
    pub fn add_socket(&mut self, node_id: NodeId, socket: Socket) -> Option<SocketId> {
        self.graph().node(node_id)?;
        self.record_undo("Add socket");
        let id = self
            .active_graph_mut()
            .and_then(|g| g.add_socket(node_id, socket));
        match id {
            Some(_) => self.structural_change(),
            None => self.discard_undo(),
        }
        id
    }

    /// Remove a socket. Non-deletable sockets are kept.
    pub fn remove_socket(&mut self, socket_id: SocketId) -> bool {
        let Some(socket) = self.graph().socket(socket_id) else {
            return false;
        };
        if !socket.deletable {
            tracing::debug!("Socket {:?} is not deletable", socket_id);
            return false;
        }
        let connections: Vec<ConnectionId> = socket.connections.clone();
        self.record_undo("Remove socket");
        let removed = self
            .active_graph_mut()
            .is_some_and(|g| g.remove_socket(socket_id));
        if !removed {
            self.discard_undo();
            return false;
        }
        self.structural_change();
        for id in connections {
            self.events.publish(EditorEvent::ConnectionRemoved(id));
        }
        self.events.publish(EditorEvent::SocketRemoved(socket_id));
        true
    }

    /// Move a reorderable output socket one row up or down
    pub fn reorder_socket(&mut self, socket_id: SocketId, direction: ReorderDirection) -> bool {
        if self.graph().reorder_target(socket_id, direction).is_none() {
            return false;
        }
        self.record_undo("Reorder socket");
        let moved = self
            .active_graph_mut()
            .is_some_and(|g| g.reorder_socket(socket_id, direction));
        if moved {
            self.structural_change();
        } else {
            self.discard_undo();
        }
        moved
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Connect two sockets of the active graph, given in any order.
    /// Rejected connections leave no undo entry.
    pub fn connect(&mut self, a: SocketId, b: SocketId) -> Result<ConnectionId, ConnectionError> {
        let (output, input) = self.graph().check_connect(a, b)?;
        let before: HashSet<ConnectionId> = self
            .graph()
            .connections_for_socket(output)
            .chain(self.graph().connections_for_socket(input))
            .map(|c| c.id)
            .collect();

        self.record_undo("Connect");
        let result = match self.active_graph_mut() {
            Some(graph) => graph.connect(output, input),
            None => Err(ConnectionError::SocketNotFound(output)),
        };
        let id = match result {
            Ok(id) => id,
            Err(e) => {
                self.discard_undo();
                return Err(e);
            }
        };

        self.structural_change();
        let graph = self.graph();
        let replaced: Vec<ConnectionId> = before
            .into_iter()
            .filter(|c| graph.connection(*c).is_none())
            .collect();
        for old in replaced {
            self.events.publish(EditorEvent::ConnectionRemoved(old));
        }
        self.events.publish(EditorEvent::ConnectionEstablished(id));
        Ok(id)
    }

    /// Remove connections by id under one undo entry. Returns how many existed.
    pub fn disconnect_connections(&mut self, ids: &[ConnectionId]) -> usize {
        let existing: Vec<ConnectionId> = ids
            .iter()
            .copied()
            .filter(|id| self.graph().connection(*id).is_some())
            .collect();
        if existing.is_empty() {
            return 0;
        }
        self.record_undo("Disconnect");
        let Some(graph) = self.active_graph_mut() else {
            self.discard_undo();
            return 0;
        };
        let removed: Vec<ConnectionId> = existing
            .into_iter()
            .filter_map(|id| graph.disconnect(id).map(|c| c.id))
            .collect();
        self.structural_change();
        for id in &removed {
            self.events.publish(EditorEvent::ConnectionRemoved(*id));
        }
        removed.len()
    }

    /// Remove one connection
    pub fn disconnect(&mut self, id: ConnectionId) -> bool {
        self.disconnect_connections(&[id]) == 1
    }

    /// Remove every connection of a socket. Idempotent.
    pub fn disconnect_socket(&mut self, socket_id: SocketId) -> usize {
        let ids: Vec<ConnectionId> = self
            .graph()
            .connections_for_socket(socket_id)
            .map(|c| c.id)
            .collect();
        self.disconnect_connections(&ids)
    }

    // ------------------------------------------------------------------
    // Clipboard
    // ------------------------------------------------------------------

    /// Copy the selected nodes
    pub fn copy_selection(&mut self) -> usize {
        let ids = self.selection.to_vec();
        let path = self.tabs.active_path().to_vec();
        self.clipboard.copy(&self.root, &path, &ids)
    }

    /// Paste the clipboard at a grid position and select the result
    pub fn paste_at(&mut self, grid: [f32; 2]) -> Vec<NodeId> {
        let at = self.snap(grid);
        match self.clipboard.paste(&self.root, at) {
            Some(batch) => self.insert_batch(batch, "Paste"),
            None => Vec::new(),
        }
    }

    /// Copy and paste the selection at a grid position without touching
    /// the clipboard
    pub fn duplicate_selection(&mut self, grid: [f32; 2]) -> Vec<NodeId> {
        let mut scratch = Clipboard::new();
        let ids = self.selection.to_vec();
        let path = self.tabs.active_path().to_vec();
        if scratch.copy(&self.root, &path, &ids) == 0 {
            return Vec::new();
        }
        let at = self.snap(grid);
        match scratch.paste(&self.root, at) {
            Some(batch) => self.insert_batch(batch, "Duplicate"),
            None => Vec::new(),
        }
    }

    fn insert_batch(&mut self, mut batch: PasteBatch, label: &str) -> Vec<NodeId> {
        if batch.is_empty() {
            return Vec::new();
        }
        for node in &mut batch.nodes {
            if !node.allow_duplicate_name {
                node.name = unique_name(self.graph(), &node.name);
            }
        }
        self.record_undo(label);
        let Some(graph) = self.active_graph_mut() else {
            self.discard_undo();
            return Vec::new();
        };
        let ids = graph.insert_nodes_front(batch.nodes);
        for connection in batch.connections {
            graph.insert_connection_record(connection);
        }

        self.structural_change();
        tracing::info!("{}: {} nodes", label, ids.len());
        self.events.publish(EditorEvent::NodesPasted(ids.clone()));
        self.select(ids.clone());
        ids
    }

    // ------------------------------------------------------------------
    // Tabs
    // ------------------------------------------------------------------

    /// Open the subgraph owned by a node of the active graph in a new tab
    pub fn open_subgraph(&mut self, node_id: NodeId) -> bool {
        let current = self.view_state();
        if self.tabs.open_subgraph(&self.root, node_id, current).is_none() {
            return false;
        }
        self.state = InteractionState::Idle;
        self.view.restore(1.0, [0.0, 0.0]);
        self.selection = Selection::new();
        self.lookup.invalidate();
        self.deferred.schedule(SessionAction::FrameNodes(Vec::new()), 1);
        self.publish_opened();
        true
    }

    /// Activate tab `index`, closing every tab above it
    pub fn navigate_to(&mut self, index: usize) -> bool {
        let Some(view) = self.tabs.navigate_to(index) else {
            return false;
        };
        self.after_tab_change(view);
        true
    }

    /// Close tab `index` and every tab above it
    pub fn close_tab(&mut self, index: usize) -> bool {
        let Some(view) = self.tabs.close_tab(index) else {
            return false;
        };
        self.after_tab_change(view);
        self.events.publish(EditorEvent::TabClosed(index));
        true
    }

    fn after_tab_change(&mut self, view: ViewState) {
        self.state = InteractionState::Idle;
        self.lookup.invalidate();
        self.apply_view_state(view, true);
        self.publish_opened();
    }

    fn publish_opened(&mut self) {
        let path = self.tabs.active_path().to_vec();
        let title = self.tabs.active().title.clone();
        self.events.publish(EditorEvent::GraphOpened { path, title });
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Save to the current asset path
    pub fn save_with(&mut self, store: &impl GraphStore) -> Result<(), PersistenceError> {
        let Some(path) = self.asset_path.clone() else {
            return Err(PersistenceError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No asset path set",
            )));
        };
        store.save(&self.root, &path)?;
        self.root.clear_dirty();
        self.dirty = false;
        self.events.publish(EditorEvent::GraphSaved(path));
        Ok(())
    }

    /// Save to a new asset path and remember it
    pub fn save_as(&mut self, store: &impl GraphStore, path: impl Into<PathBuf>) -> Result<(), PersistenceError> {
        self.asset_path = Some(path.into());
        self.save_with(store)
    }

    /// World rect of a node, if it is indexed
    pub fn node_rect(&self, id: NodeId) -> Option<Rect> {
        self.lookup.node(id).map(|e| e.rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use crate::persistence::RonGraphStore;
    use crate::registry::{create_flow_registry, STATE_TYPE, SUBGRAPH_TYPE};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn session() -> EditorSession {
        EditorSession::new(
            Graph::with_entry_nodes("Flow"),
            EditorConfig::default(),
            create_flow_registry(),
        )
    }

    fn recorded(session: &mut EditorSession) -> Rc<RefCell<Vec<EditorEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        session.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    fn out_of(session: &EditorSession, id: NodeId) -> SocketId {
        session.graph().node(id).unwrap().outputs[0].id
    }

    fn in_of(session: &EditorSession, id: NodeId) -> SocketId {
        session.graph().node(id).unwrap().inputs[0].id
    }

    #[test]
    fn test_add_node_names_and_events() {
        let mut session = session();
        let events = recorded(&mut session);
        let a = session.add_node(STATE_TYPE, [13.0, 17.0]).unwrap();
        let b = session.add_node(STATE_TYPE, [0.0, 0.0]).unwrap();

        assert_eq!(session.graph().node(a).unwrap().position, [10.0, 20.0]);
        assert_eq!(session.graph().node(a).unwrap().name, "State");
        assert_eq!(session.graph().node(b).unwrap().name, "State (2)");
        assert!(events.borrow().contains(&EditorEvent::NodeCreated(a)));
        assert!(session.is_dirty());
    }

    #[test]
    fn test_unknown_type_is_explicit_error() {
        let mut session = session();
        assert!(matches!(
            session.add_node("nope", [0.0, 0.0]),
            Err(EditorError::Registry(RegistryError::UnknownNodeType(_)))
        ));
        assert!(!session.can_undo());
    }

    #[test]
    fn test_soft_delete_keeps_start() {
        let mut session = session();
        let start = session.graph().node_ids().next().unwrap();
        assert_eq!(session.remove_nodes(&[start]), 0);
        assert!(session.graph().contains_node(start));
        assert!(!session.can_undo());
    }

    #[test]
    fn test_rejected_connect_leaves_no_undo_entry() {
        let mut session = session();
        let a = session.add_node(STATE_TYPE, [0.0, 0.0]).unwrap();
        let depth = session.history().can_undo();
        let result = session.connect(out_of(&session, a), in_of(&session, a));
        assert_eq!(result, Err(ConnectionError::SelfLoop));
        assert_eq!(session.history().can_undo(), depth);
        assert_eq!(session.history().undo_label(), Some("Add State"));
    }

    #[test]
    fn test_override_replacement_publishes_removal() {
        let mut session = session();
        let a = session.add_node(STATE_TYPE, [0.0, 0.0]).unwrap();
        let b = session.add_node(STATE_TYPE, [300.0, 0.0]).unwrap();
        let c = session.add_node(STATE_TYPE, [300.0, 200.0]).unwrap();
        let first = session.connect(out_of(&session, a), in_of(&session, b)).unwrap();
        let events = recorded(&mut session);
        let second = session.connect(out_of(&session, a), in_of(&session, c)).unwrap();

        assert_eq!(session.graph().connection_count(), 1);
        assert_eq!(
            *events.borrow(),
            vec![
                EditorEvent::ConnectionRemoved(first),
                EditorEvent::ConnectionEstablished(second)
            ]
        );
    }

    #[test]
    fn test_delete_undo_restores_connections() {
        let mut session = session();
        let a = session.add_node(STATE_TYPE, [0.0, 0.0]).unwrap();
        let b = session.add_node(STATE_TYPE, [300.0, 0.0]).unwrap();
        session.connect(out_of(&session, a), in_of(&session, b)).unwrap();
        session.select([a]);

        assert_eq!(session.delete_selection(), 1);
        assert_eq!(session.graph().connection_count(), 0);
        assert!(session.selection().is_empty());

        assert!(session.undo());
        assert!(session.graph().contains_node(a));
        assert_eq!(session.graph().connection_count(), 1);
        assert_eq!(session.selection().to_vec(), vec![a]);
    }

    #[test]
    fn test_paste_layers_on_top_and_selects() {
        let mut session = session();
        let a = session.add_node(STATE_TYPE, [0.0, 0.0]).unwrap();
        session.select([a]);
        assert_eq!(session.copy_selection(), 1);
        let pasted = session.paste_at([100.0, 100.0]);

        assert_eq!(pasted.len(), 1);
        assert_eq!(session.graph().node_ids().next(), Some(pasted[0]));
        assert_eq!(session.selection().to_vec(), pasted);
        assert_eq!(session.graph().node(pasted[0]).unwrap().position, [100.0, 100.0]);
        assert_eq!(session.history().undo_label(), Some("Paste"));
    }

    #[test]
    fn test_duplicate_keeps_clipboard() {
        let mut session = session();
        let a = session.add_node(STATE_TYPE, [0.0, 0.0]).unwrap();
        let b = session.add_node(STATE_TYPE, [200.0, 0.0]).unwrap();
        session.select([a]);
        session.copy_selection();
        session.select([b]);
        session.duplicate_selection([0.0, 300.0]);
        assert_eq!(session.clipboard().node_ids(), &[a]);
        assert_eq!(session.graph().node_count(), 4);
    }

    #[test]
    fn test_subgraph_tabs_and_view_restore() {
        let mut session = session();
        let sub = session.add_node(SUBGRAPH_TYPE, [0.0, 0.0]).unwrap();
        session.zoom_at(Pos2::new(100.0, 100.0), 5.0);
        let zoom = session.view().zoom();
        let events = recorded(&mut session);

        assert!(session.open_subgraph(sub));
        assert_eq!(session.tabs().len(), 2);
        assert_eq!(session.graph().node_count(), 2);
        assert!(session.graph().is_subgraph);

        assert!(session.navigate_to(0));
        assert_eq!(session.view().zoom(), zoom);
        assert!(session.graph().contains_node(sub));
        assert_eq!(
            events.borrow().iter().filter(|e| matches!(e, EditorEvent::GraphOpened { .. })).count(),
            2
        );
    }

    #[test]
    fn test_undo_outside_tab_falls_back() {
        let mut session = session();
        let sub = session.add_node(SUBGRAPH_TYPE, [0.0, 0.0]).unwrap();
        session.open_subgraph(sub);
        // Undo the creation of the subgraph node while inside it
        assert!(session.undo());
        assert_eq!(session.tabs().len(), 1);
        assert!(!session.graph().is_subgraph);
    }

    #[test]
    fn test_deferred_frame_nodes() {
        let mut session = session();
        session.add_node(STATE_TYPE, [2000.0, 2000.0]).unwrap();
        session.schedule(SessionAction::FrameNodes(Vec::new()), 1);
        session.tick();
        assert_eq!(session.view().pan, Vec2::ZERO);
        session.tick();
        assert_ne!(session.view().pan, Vec2::ZERO);
    }

    #[test]
    fn test_save_clears_dirty() {
        let mut session = session();
        session.add_node(STATE_TYPE, [0.0, 0.0]).unwrap();
        let store = RonGraphStore::new();
        assert!(session.save_with(&store).is_err());

        let path = std::env::temp_dir().join(format!("flowgraph_session_{}.ron", uuid::Uuid::new_v4()));
        let events = recorded(&mut session);
        session.save_as(&store, path.clone()).unwrap();
        assert!(!session.is_dirty());
        assert_eq!(session.asset_path(), Some(path.as_path()));
        assert_eq!(*events.borrow(), vec![EditorEvent::GraphSaved(path.clone())]);

        let reopened = EditorSession::open(&store, &path, EditorConfig::default(), create_flow_registry()).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(reopened.graph().node_count(), 2);
        assert!(reopened.graph().nodes().any(|n| n.kind == NodeKind::Start));
    }

    #[test]
    fn test_rename_revalidates() {
        let mut session = session();
        let a = session.add_node(STATE_TYPE, [0.0, 0.0]).unwrap();
        let b = session.add_node(STATE_TYPE, [0.0, 100.0]).unwrap();
        assert!(session.rename_node(b, "State"));
        assert!(session.graph().node(a).unwrap().errors.duplicate_name);
        assert!(!session.rename_node(b, "State"));
        assert!(session.rename_node(b, "Other"));
        assert!(!session.graph().node(a).unwrap().errors.duplicate_name);
    }
}
