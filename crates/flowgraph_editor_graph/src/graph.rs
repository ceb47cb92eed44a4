// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and connections.
//!
//! Connection records are owned once by the graph; sockets only keep the ids
//! of the connections attached to them. Every mutation keeps both sides in
//! agreement, and [`Graph::repair`] restores agreement after any external
//! change (undo/redo, hand-edited assets).

use crate::connection::{Connection, ConnectionId};
use crate::node::{Node, NodeId, NodeKind};
use crate::socket::{Socket, SocketDirection, SocketId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How a node removal treats protection flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveMode {
    /// User-facing removal: protected and non-deletable nodes are kept
    Soft,
    /// Unconditional removal
    Hard,
}

/// Direction for [`Graph::reorder_socket`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderDirection {
    /// Towards index 0
    Up,
    /// Towards the end of the list
    Down,
}

/// Counts of inconsistencies fixed by [`Graph::repair`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Connection records whose endpoints no longer resolve
    pub dangling_connections: usize,
    /// Socket references to connections that do not exist or do not involve the socket
    pub stale_socket_refs: usize,
    /// Connection records one of whose sockets did not reference them
    pub missing_socket_refs: usize,
    /// Connections dropped because an override socket held more than one
    pub override_overflow: usize,
    /// Lookup-map entries pruned by the session after the model repair
    pub pruned_lookups: usize,
}

impl RepairReport {
    /// Total number of fixes
    pub fn total(&self) -> usize {
        self.dangling_connections
            + self.stale_socket_refs
            + self.missing_socket_refs
            + self.override_overflow
            + self.pruned_lookups
    }

    /// Whether nothing needed fixing
    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    fn merge(&mut self, other: RepairReport) {
        self.dangling_connections += other.dangling_connections;
        self.stale_socket_refs += other.stale_socket_refs;
        self.missing_socket_refs += other.missing_socket_refs;
        self.override_overflow += other.override_overflow;
        self.pruned_lookups += other.pruned_lookups;
    }
}

/// A node graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Incremented on every structural mutation
    pub version: u64,
    /// Whether this graph is nested under a subgraph node
    pub is_subgraph: bool,
    /// Unsaved changes
    #[serde(skip)]
    dirty: bool,
    /// Nodes, index 0 topmost
    nodes: IndexMap<NodeId, Node>,
    /// Connection table
    connections: IndexMap<ConnectionId, Connection>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 0,
            is_subgraph: false,
            dirty: false,
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
        }
    }

    /// Create a new empty nested graph
    pub fn new_subgraph(name: impl Into<String>) -> Self {
        Self {
            is_subgraph: true,
            ..Self::new(name)
        }
    }

    /// Create a root graph containing its Start node
    pub fn with_entry_nodes(name: impl Into<String>) -> Self {
        let mut graph = Self::new(name);
        graph.insert_entry_nodes();
        graph.dirty = false;
        graph
    }

    /// Insert the protected entry nodes: Start for a root graph,
    /// Enter and Exit for a subgraph.
    pub fn insert_entry_nodes(&mut self) {
        let kinds: &[NodeKind] = if self.is_subgraph {
            &[NodeKind::Exit, NodeKind::Enter]
        } else {
            &[NodeKind::Start]
        };
        for kind in kinds {
            if let Some(mut node) = Node::entry(*kind) {
                if *kind == NodeKind::Exit {
                    node.position = [400.0, 0.0];
                }
                self.add_node(node);
            }
        }
    }

    // ------------------------------------------------------------------
    // Bookkeeping
    // ------------------------------------------------------------------

    /// Record a structural mutation
    pub fn touch(&mut self) {
        self.version += 1;
        self.dirty = true;
    }

    /// Whether there are unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark as having unsaved changes
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clear the unsaved-changes flag
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Add a node on top of all others
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.shift_insert(0, id, node);
        self.validate_names();
        self.touch();
        id
    }

    /// Insert nodes ahead of existing ones, keeping their relative order
    pub fn insert_nodes_front(&mut self, nodes: Vec<Node>) -> Vec<NodeId> {
        let ids: Vec<_> = nodes.iter().map(|n| n.id).collect();
        for node in nodes.into_iter().rev() {
            self.nodes.shift_insert(0, node.id, node);
        }
        self.validate_names();
        self.touch();
        ids
    }

    /// Remove a node and its connections.
    ///
    /// With [`RemoveMode::Soft`] protected and non-deletable nodes are left
    /// untouched and `None` is returned.
    pub fn remove_node(&mut self, node_id: NodeId, mode: RemoveMode) -> Option<Node> {
        let node = self.nodes.get(&node_id)?;
        if mode == RemoveMode::Soft && !node.can_delete() {
            tracing::debug!("Refusing to delete protected node {:?}", node_id);
            return None;
        }

        let socket_ids: Vec<_> = node.sockets().map(|s| s.id).collect();
        for socket_id in socket_ids {
            self.disconnect_socket(socket_id);
        }

        let node = self.nodes.shift_remove(&node_id);
        self.validate_names();
        self.touch();
        node
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Whether the node exists
    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Position of a node in the node list (0 is topmost)
    pub fn node_index(&self, node_id: NodeId) -> Option<usize> {
        self.nodes.get_index_of(&node_id)
    }

    /// Get all nodes, topmost first
    pub fn nodes(&self) -> impl DoubleEndedIterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all nodes mutably, topmost first
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    /// Get all node IDs, topmost first
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Rename a node and re-run the duplicate-name check
    pub fn rename_node(&mut self, node_id: NodeId, name: impl Into<String>) -> bool {
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return false;
        };
        node.name = name.into();
        self.validate_names();
        self.touch();
        true
    }

    /// Recompute duplicate-name flags. Returns the number of flagged nodes.
    pub fn validate_names(&mut self) -> usize {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for node in self.nodes.values() {
            if !node.is_protected() && !node.allow_duplicate_name {
                *counts.entry(node.name.as_str()).or_default() += 1;
            }
        }
        let duplicated: HashSet<String> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name.to_string())
            .collect();

        let mut flagged = 0;
        for node in self.nodes.values_mut() {
            let duplicate = !node.is_protected()
                && !node.allow_duplicate_name
                && duplicated.contains(&node.name);
            if duplicate && !node.errors.duplicate_name {
                tracing::warn!("Duplicate node name '{}' in graph '{}'", node.name, self.name);
            }
            node.errors.duplicate_name = duplicate;
            flagged += usize::from(duplicate);
        }
        flagged
    }

    // ------------------------------------------------------------------
    // Sockets
    // ------------------------------------------------------------------

    /// Find the node owning a socket
    pub fn socket_owner(&self, socket_id: SocketId) -> Option<NodeId> {
        self.nodes
            .values()
            .find(|n| n.socket(socket_id).is_some())
            .map(|n| n.id)
    }

    /// Get a socket by ID
    pub fn socket(&self, socket_id: SocketId) -> Option<&Socket> {
        self.nodes.values().find_map(|n| n.socket(socket_id))
    }

    fn socket_mut(&mut self, socket_id: SocketId) -> Option<&mut Socket> {
        self.nodes.values_mut().find_map(|n| n.socket_mut(socket_id))
    }

    /// Add a socket to a node
    pub fn add_socket(&mut self, node_id: NodeId, socket: Socket) -> Option<SocketId> {
        let node = self.nodes.get_mut(&node_id)?;
        let id = node.push_socket(socket);
        self.touch();
        Some(id)
    }

    /// Remove a socket after disconnecting it. Non-deletable sockets are
    /// left in place.
    pub fn remove_socket(&mut self, socket_id: SocketId) -> bool {
        let Some(socket) = self.socket(socket_id) else {
            return false;
        };
        if !socket.deletable {
            tracing::debug!("Socket {:?} is not deletable", socket_id);
            return false;
        }
        let node_id = socket.node_id;
        let direction = socket.direction;

        self.disconnect_socket(socket_id);

        let Some(node) = self.nodes.get_mut(&node_id) else {
            return false;
        };
        let list = node.sockets_in_mut(direction);
        list.retain(|s| s.id != socket_id);
        for (index, socket) in list.iter_mut().enumerate() {
            socket.reorder_index = index;
        }
        self.touch();
        true
    }

    /// Resolve a reorder request to `(node, from, to)` output indices, or
    /// `None` when the socket cannot move that way.
    pub fn reorder_target(
        &self,
        socket_id: SocketId,
        direction: ReorderDirection,
    ) -> Option<(NodeId, usize, usize)> {
        let node_id = self.socket_owner(socket_id)?;
        let node = self.nodes.get(&node_id)?;
        let index = node.outputs.iter().position(|s| s.id == socket_id)?;
        if !node.outputs[index].reorderable {
            return None;
        }
        let target = match direction {
            ReorderDirection::Up if index > 0 => index - 1,
            ReorderDirection::Down if index + 1 < node.outputs.len() => index + 1,
            _ => return None,
        };
        node.outputs[target].reorderable.then_some((node_id, index, target))
    }

    /// Move a reorderable output socket one slot up or down among its
    /// siblings.
    pub fn reorder_socket(&mut self, socket_id: SocketId, direction: ReorderDirection) -> bool {
        let Some((node_id, index, target)) = self.reorder_target(socket_id, direction) else {
            return false;
        };
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return false;
        };
        node.outputs.swap(index, target);
        node.outputs[index].reorder_index = index;
        node.outputs[target].reorder_index = target;
        self.touch();
        true
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Validate a prospective connection between two sockets given in any
    /// order. Returns the `(output, input)` pair on success.
    pub fn check_connect(
        &self,
        a: SocketId,
        b: SocketId,
    ) -> Result<(SocketId, SocketId), ConnectionError> {
        let first = self.socket(a).ok_or(ConnectionError::SocketNotFound(a))?;
        let second = self.socket(b).ok_or(ConnectionError::SocketNotFound(b))?;

        if first.direction == second.direction {
            return Err(ConnectionError::SameDirection);
        }
        if first.node_id == second.node_id {
            return Err(ConnectionError::SelfLoop);
        }
        if !first.socket_type.can_connect_to(&second.socket_type) {
            return Err(ConnectionError::IncompatibleTypes);
        }

        let (output, input) = if first.direction == SocketDirection::Output {
            (first.id, second.id)
        } else {
            (second.id, first.id)
        };
        if self.are_connected(output, input) {
            return Err(ConnectionError::AlreadyConnected);
        }
        Ok((output, input))
    }

    /// Whether a connection between two sockets would be accepted
    pub fn can_connect(&self, a: SocketId, b: SocketId) -> bool {
        self.check_connect(a, b).is_ok()
    }

    /// Connect two sockets given in any order.
    ///
    /// Any error leaves the graph untouched. An occupied override socket on
    /// either end is disconnected before the new connection is recorded.
    pub fn connect(&mut self, a: SocketId, b: SocketId) -> Result<ConnectionId, ConnectionError> {
        let (output, input) = self.check_connect(a, b)?;
        let (Some(output_node), Some(input_node)) =
            (self.socket_owner(output), self.socket_owner(input))
        else {
            return Err(ConnectionError::SocketNotFound(output));
        };

        for socket_id in [output, input] {
            let occupied = self
                .socket(socket_id)
                .is_some_and(|s| s.is_override() && s.is_connected());
            if occupied {
                self.disconnect_socket(socket_id);
            }
        }

        let connection = Connection::new(output_node, output, input_node, input);
        let id = connection.id;
        for socket_id in [output, input] {
            if let Some(socket) = self.socket_mut(socket_id) {
                socket.connections.push(id);
            }
        }
        self.connections.insert(id, connection);
        self.touch();
        Ok(id)
    }

    /// Remove a connection from the table and from both endpoint sockets.
    /// A missing endpoint is ignored; repair prunes leftovers.
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.shift_remove(&connection_id)?;
        for socket_id in [connection.output_socket, connection.input_socket] {
            if let Some(socket) = self.socket_mut(socket_id) {
                socket.connections.retain(|c| *c != connection_id);
            }
        }
        self.touch();
        Some(connection)
    }

    /// Remove every connection attached to a socket. Idempotent.
    pub fn disconnect_socket(&mut self, socket_id: SocketId) -> Vec<Connection> {
        let mut ids: Vec<ConnectionId> = self
            .socket(socket_id)
            .map(|s| s.connections.clone())
            .unwrap_or_default();
        for connection in self.connections.values() {
            if connection.involves_socket(socket_id) && !ids.contains(&connection.id) {
                ids.push(connection.id);
            }
        }
        if let Some(socket) = self.socket_mut(socket_id) {
            socket.connections.clear();
        }
        ids.into_iter().filter_map(|id| self.disconnect(id)).collect()
    }

    /// Get a connection by ID
    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get connections involving a socket
    pub fn connections_for_socket(&self, socket_id: SocketId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.involves_socket(socket_id))
    }

    /// Get connections involving a node
    pub fn connections_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.involves_node(node_id))
    }

    /// Whether an output socket is already connected to an input socket
    pub fn are_connected(&self, output: SocketId, input: SocketId) -> bool {
        self.connections.values().any(|c| c.joins(output, input))
    }

    /// Insert a pre-built connection record, used when pasting. Both
    /// endpoint sockets must already list the connection id.
    pub(crate) fn insert_connection_record(&mut self, connection: Connection) {
        self.connections.insert(connection.id, connection);
    }

    /// Split into nodes (topmost first) and connection records
    pub(crate) fn into_parts(self) -> (Vec<Node>, Vec<Connection>) {
        (
            self.nodes.into_values().collect(),
            self.connections.into_values().collect(),
        )
    }

    /// Reassemble a graph from parts produced by [`Graph::into_parts`]
    pub(crate) fn from_parts(
        name: String,
        is_subgraph: bool,
        nodes: Vec<Node>,
        connections: Vec<Connection>,
    ) -> Self {
        Self {
            name,
            version: 0,
            is_subgraph,
            dirty: false,
            nodes: nodes.into_iter().map(|n| (n.id, n)).collect(),
            connections: connections.into_iter().map(|c| (c.id, c)).collect(),
        }
    }

    // ------------------------------------------------------------------
    // Repair
    // ------------------------------------------------------------------

    /// Restore agreement between the connection table and socket id lists,
    /// recursing into nested graphs.
    pub fn repair(&mut self) -> RepairReport {
        let mut report = RepairReport::default();

        // Sockets by id with direction and owner
        let sockets: HashMap<SocketId, (NodeId, SocketDirection)> = self
            .nodes
            .values()
            .flat_map(|n| n.sockets().map(move |s| (s.id, (n.id, s.direction))))
            .collect();

        let before = self.connections.len();
        self.connections.retain(|_, c| {
            sockets.get(&c.output_socket) == Some(&(c.output_node, SocketDirection::Output))
                && sockets.get(&c.input_socket) == Some(&(c.input_node, SocketDirection::Input))
        });
        report.dangling_connections = before - self.connections.len();

        let connections = &self.connections;
        for node in self.nodes.values_mut() {
            for socket in node.sockets_mut() {
                let socket_id = socket.id;
                let before = socket.connections.len();
                let mut seen = HashSet::new();
                socket.connections.retain(|id| {
                    seen.insert(*id)
                        && connections.get(id).is_some_and(|c| c.involves_socket(socket_id))
                });
                report.stale_socket_refs += before - socket.connections.len();
            }
        }

        let records: Vec<Connection> = self.connections.values().cloned().collect();
        for connection in &records {
            for socket_id in [connection.output_socket, connection.input_socket] {
                if let Some(socket) = self.socket_mut(socket_id) {
                    if !socket.connections.contains(&connection.id) {
                        socket.connections.push(connection.id);
                        report.missing_socket_refs += 1;
                    }
                }
            }
        }

        // Keep the most recent connection on overfull override sockets
        let mut overflow = Vec::new();
        for node in self.nodes.values() {
            for socket in node.sockets().filter(|s| s.is_override()) {
                if let Some((_, extra)) = socket.connections.split_last() {
                    overflow.extend_from_slice(extra);
                }
            }
        }
        for id in overflow {
            if self.disconnect(id).is_some() {
                report.override_overflow += 1;
            }
        }

        for node in self.nodes.values_mut() {
            if let Some(subgraph) = node.subgraph.as_deref_mut() {
                report.merge(subgraph.repair());
            }
        }

        if !report.is_clean() {
            tracing::debug!("Repaired graph '{}': {:?}", self.name, report);
        }
        report
    }

    // ------------------------------------------------------------------
    // Nested graphs
    // ------------------------------------------------------------------

    /// Resolve a nested graph by following subgraph node ids from this graph
    pub fn graph_at_path(&self, path: &[NodeId]) -> Option<&Graph> {
        let mut graph = self;
        for node_id in path {
            graph = graph.node(*node_id)?.subgraph.as_deref()?;
        }
        Some(graph)
    }

    /// Mutable variant of [`Graph::graph_at_path`]
    pub fn graph_at_path_mut(&mut self, path: &[NodeId]) -> Option<&mut Graph> {
        let mut graph = self;
        for node_id in path {
            graph = graph.node_mut(*node_id)?.subgraph.as_deref_mut()?;
        }
        Some(graph)
    }

    /// Find a node anywhere in the nested tree. Returns the path of the
    /// graph containing it.
    pub fn find_node_recursive(&self, node_id: NodeId) -> Option<(Vec<NodeId>, &Node)> {
        if let Some(node) = self.node(node_id) {
            return Some((Vec::new(), node));
        }
        for node in self.nodes.values() {
            if let Some(subgraph) = node.subgraph.as_deref() {
                if let Some((mut path, found)) = subgraph.find_node_recursive(node_id) {
                    path.insert(0, node.id);
                    return Some((path, found));
                }
            }
        }
        None
    }

    /// Every node id in this graph and its nested graphs
    pub fn all_node_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        for node in self.nodes.values() {
            ids.push(node.id);
            if let Some(subgraph) = node.subgraph.as_deref() {
                ids.extend(subgraph.all_node_ids());
            }
        }
        ids
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Reason a connection was not created. The graph is unchanged in every case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// Socket not found
    #[error("Socket not found: {0:?}")]
    SocketNotFound(SocketId),

    /// Both sockets have the same direction
    #[error("Sockets have the same direction")]
    SameDirection,

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,

    /// Incompatible socket types
    #[error("Incompatible socket types")]
    IncompatibleTypes,

    /// The pair is already connected
    #[error("Sockets are already connected")]
    AlreadyConnected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::SocketArity;

    fn state(name: &str) -> Node {
        Node::new(NodeKind::General, "state", name)
            .with_socket(|id| Socket::input(id, "In"))
            .with_socket(|id| Socket::output(id, "Next"))
    }

    fn ids(graph: &Graph, node: NodeId) -> (SocketId, SocketId) {
        let node = graph.node(node).unwrap();
        (node.inputs[0].id, node.outputs[0].id)
    }

    #[test]
    fn test_connect_records_on_both_sockets() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(state("A"));
        let b = graph.add_node(state("B"));
        let (_, a_out) = ids(&graph, a);
        let (b_in, _) = ids(&graph, b);

        let id = graph.connect(a_out, b_in).unwrap();
        assert_eq!(graph.connection_count(), 1);
        assert_eq!(graph.socket(a_out).unwrap().connections, vec![id]);
        assert_eq!(graph.socket(b_in).unwrap().connections, vec![id]);
        let record = graph.connection(id).unwrap();
        assert_eq!(record.output_node, a);
        assert_eq!(record.input_node, b);
    }

    #[test]
    fn test_connect_normalizes_order() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(state("A"));
        let b = graph.add_node(state("B"));
        let (_, a_out) = ids(&graph, a);
        let (b_in, _) = ids(&graph, b);

        let id = graph.connect(b_in, a_out).unwrap();
        assert_eq!(graph.connection(id).unwrap().output_socket, a_out);
    }

    #[test]
    fn test_connect_rejections_leave_graph_untouched() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(state("A"));
        let b = graph.add_node(state("B"));
        let (a_in, a_out) = ids(&graph, a);
        let (b_in, b_out) = ids(&graph, b);
        let version = graph.version;

        assert_eq!(graph.connect(a_out, b_out), Err(ConnectionError::SameDirection));
        assert_eq!(graph.connect(a_out, a_in), Err(ConnectionError::SelfLoop));
        let missing = SocketId::new();
        assert_eq!(graph.connect(missing, b_in), Err(ConnectionError::SocketNotFound(missing)));
        assert_eq!(graph.connection_count(), 0);
        assert_eq!(graph.version, version);

        graph.connect(a_out, b_in).unwrap();
        assert_eq!(graph.connect(a_out, b_in), Err(ConnectionError::AlreadyConnected));
        assert_eq!(graph.connection_count(), 1);
    }

    #[test]
    fn test_override_replaces_existing_connection() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(state("A"));
        let b = graph.add_node(state("B"));
        let c = graph.add_node(state("C"));
        let (_, a_out) = ids(&graph, a);
        let (b_in, _) = ids(&graph, b);
        let (c_in, _) = ids(&graph, c);

        graph.connect(a_out, b_in).unwrap();
        let second = graph.connect(a_out, c_in).unwrap();
        assert_eq!(graph.connection_count(), 1);
        assert_eq!(graph.socket(a_out).unwrap().connections, vec![second]);
        assert!(graph.socket(b_in).unwrap().connections.is_empty());
    }

    #[test]
    fn test_multiple_input_accepts_many() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(state("A"));
        let b = graph.add_node(state("B"));
        let c = graph.add_node(state("C"));
        let (_, a_out) = ids(&graph, a);
        let (_, b_out) = ids(&graph, b);
        let (c_in, _) = ids(&graph, c);

        graph.connect(a_out, c_in).unwrap();
        graph.connect(b_out, c_in).unwrap();
        assert_eq!(graph.socket(c_in).unwrap().connections.len(), 2);
    }

    #[test]
    fn test_disconnect_socket_is_idempotent() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(state("A"));
        let b = graph.add_node(state("B"));
        let (_, a_out) = ids(&graph, a);
        let (b_in, _) = ids(&graph, b);
        graph.connect(a_out, b_in).unwrap();

        assert_eq!(graph.disconnect_socket(a_out).len(), 1);
        assert!(graph.disconnect_socket(a_out).is_empty());
        assert_eq!(graph.connection_count(), 0);
        assert!(graph.socket(b_in).unwrap().connections.is_empty());
    }

    #[test]
    fn test_soft_remove_skips_protected_nodes() {
        let mut graph = Graph::with_entry_nodes("root");
        let start = graph.nodes().find(|n| n.kind == NodeKind::Start).unwrap().id;
        assert!(graph.remove_node(start, RemoveMode::Soft).is_none());
        assert!(graph.contains_node(start));
        assert!(graph.remove_node(start, RemoveMode::Hard).is_some());
        assert!(!graph.contains_node(start));
    }

    #[test]
    fn test_remove_node_disconnects() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(state("A"));
        let b = graph.add_node(state("B"));
        let (_, a_out) = ids(&graph, a);
        let (b_in, _) = ids(&graph, b);
        graph.connect(a_out, b_in).unwrap();

        graph.remove_node(b, RemoveMode::Soft).unwrap();
        assert_eq!(graph.connection_count(), 0);
        assert!(graph.socket(a_out).unwrap().connections.is_empty());
    }

    #[test]
    fn test_add_node_goes_on_top() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(state("A"));
        let b = graph.add_node(state("B"));
        assert_eq!(graph.node_index(b), Some(0));
        assert_eq!(graph.node_index(a), Some(1));
    }

    #[test]
    fn test_remove_socket_respects_lock() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(state("A"));
        let locked = graph
            .add_socket(a, Socket::output(a, "Locked").locked())
            .unwrap();
        assert!(!graph.remove_socket(locked));
        let (a_in, _) = ids(&graph, a);
        assert!(graph.remove_socket(a_in));
        assert!(graph.node(a).unwrap().inputs.is_empty());
    }

    #[test]
    fn test_reorder_socket() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(Node::new(NodeKind::General, "branch", "Branch"));
        let first = graph.add_socket(a, Socket::output(a, "First").reorderable()).unwrap();
        let second = graph.add_socket(a, Socket::output(a, "Second").reorderable()).unwrap();

        assert!(!graph.reorder_socket(first, ReorderDirection::Up));
        assert!(graph.reorder_socket(second, ReorderDirection::Up));
        let node = graph.node(a).unwrap();
        assert_eq!(node.outputs[0].id, second);
        assert_eq!(node.outputs[0].reorder_index, 0);
        assert_eq!(node.outputs[1].reorder_index, 1);
    }

    #[test]
    fn test_duplicate_names_flagged_and_cleared() {
        let mut graph = Graph::with_entry_nodes("root");
        let a = graph.add_node(state("Idle"));
        let b = graph.add_node(state("Idle"));
        assert!(graph.node(a).unwrap().errors.duplicate_name);
        assert!(graph.node(b).unwrap().errors.duplicate_name);

        graph.rename_node(b, "Walk");
        assert!(!graph.node(a).unwrap().errors.duplicate_name);

        // Protected nodes never participate
        let c = graph.add_node(state("Start"));
        assert!(!graph.node(c).unwrap().errors.duplicate_name);
    }

    #[test]
    fn test_repair_fixes_desynchronized_references() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(state("A"));
        let b = graph.add_node(state("B"));
        let (_, a_out) = ids(&graph, a);
        let (b_in, _) = ids(&graph, b);
        let id = graph.connect(a_out, b_in).unwrap();

        // Stale reference on a socket
        let bogus = ConnectionId::new();
        graph.node_mut(a).unwrap().outputs[0].connections.push(bogus);
        // Missing reference on the other end
        graph.node_mut(b).unwrap().inputs[0].connections.clear();
        // Dangling record
        let dangling = Connection::new(a, a_out, NodeId::new(), SocketId::new());
        graph.insert_connection_record(dangling);

        let report = graph.repair();
        assert_eq!(report.stale_socket_refs, 1);
        assert_eq!(report.missing_socket_refs, 1);
        assert_eq!(report.dangling_connections, 1);
        assert_eq!(graph.connection_count(), 1);
        assert_eq!(graph.socket(b_in).unwrap().connections, vec![id]);
        assert!(graph.repair().is_clean());
    }

    #[test]
    fn test_repair_trims_override_overflow() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(state("A"));
        let b = graph.add_node(state("B"));
        let c = graph.add_node(state("C"));
        let (_, a_out) = ids(&graph, a);
        let (b_in, _) = ids(&graph, b);
        let (c_in, _) = ids(&graph, c);
        graph.connect(a_out, b_in).unwrap();

        // Forge a second connection on the override output
        let forged = Connection::new(a, a_out, c, c_in);
        let forged_id = forged.id;
        graph.node_mut(a).unwrap().outputs[0].connections.push(forged_id);
        graph.node_mut(c).unwrap().inputs[0].connections.push(forged_id);
        graph.insert_connection_record(forged);

        let report = graph.repair();
        assert_eq!(report.override_overflow, 1);
        let socket = graph.socket(a_out).unwrap();
        assert_eq!(socket.arity, SocketArity::Override);
        assert_eq!(socket.connections, vec![forged_id]);
    }

    #[test]
    fn test_nested_paths() {
        let mut graph = Graph::with_entry_nodes("root");
        let sub = graph.add_node(Node::new(NodeKind::SubGraph, "subgraph", "Nested"));
        let inner = graph
            .graph_at_path_mut(&[sub])
            .unwrap()
            .add_node(state("Inner"));

        let (path, node) = graph.find_node_recursive(inner).unwrap();
        assert_eq!(path, vec![sub]);
        assert_eq!(node.name, "Inner");
        assert!(graph.graph_at_path(&[NodeId::new()]).is_none());
        assert!(graph.all_node_ids().contains(&inner));
    }
}
