// SPDX-License-Identifier: MIT OR Apache-2.0
//! Copy/paste with id remapping.
//!
//! Copying records node identities only. Pasting deep-clones whatever of
//! those nodes still exists, mints fresh ids for every connection, socket
//! and node (in that order, since each layer references the next), drops
//! connections leaving the pasted set, and lays the clones out relative to
//! the leftmost copied node.

use crate::connection::{Connection, ConnectionId};
use crate::graph::Graph;
use crate::node::{Node, NodeId};
use crate::socket::SocketId;
use std::collections::{HashMap, HashSet};

/// Clones ready to be inserted into a graph
#[derive(Debug, Clone, Default)]
pub struct PasteBatch {
    /// Cloned nodes with fresh ids, in source layering order
    pub nodes: Vec<Node>,
    /// Internal connections with fresh ids
    pub connections: Vec<Connection>,
}

impl PasteBatch {
    /// Ids of the pasted nodes
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    /// Whether nothing would be pasted
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Node identities captured by a copy
#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    source_path: Vec<NodeId>,
    nodes: Vec<NodeId>,
}

impl Clipboard {
    /// Create an empty clipboard
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy nodes of the graph at `path`. Start/Enter/Exit nodes are skipped.
    /// Returns the number of nodes captured.
    pub fn copy(&mut self, root: &Graph, path: &[NodeId], ids: &[NodeId]) -> usize {
        let Some(graph) = root.graph_at_path(path) else {
            return 0;
        };
        let wanted: HashSet<NodeId> = ids.iter().copied().collect();
        let captured: Vec<NodeId> = graph
            .nodes()
            .filter(|n| wanted.contains(&n.id) && !n.is_protected())
            .map(|n| n.id)
            .collect();
        if captured.is_empty() {
            return 0;
        }
        self.source_path = path.to_vec();
        self.nodes = captured;
        tracing::info!("Copied {} nodes", self.nodes.len());
        self.nodes.len()
    }

    /// Whether nothing has been copied
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of captured nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Captured node ids
    pub fn node_ids(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Build remapped clones anchored at `at` (grid space). Nodes deleted
    /// since the copy are skipped.
    pub fn paste(&self, root: &Graph, at: [f32; 2]) -> Option<PasteBatch> {
        let graph = root.graph_at_path(&self.source_path)?;
        let nodes: Vec<Node> = self
            .nodes
            .iter()
            .filter_map(|id| graph.node(*id))
            .cloned()
            .collect();
        if nodes.is_empty() {
            return None;
        }

        let node_set: HashSet<NodeId> = nodes.iter().map(|n| n.id).collect();
        let connections: Vec<Connection> = graph
            .connections()
            .filter(|c| node_set.contains(&c.output_node) || node_set.contains(&c.input_node))
            .cloned()
            .collect();

        let mut batch = remap(nodes, connections);
        place_at(&mut batch.nodes, at);
        Some(batch)
    }
}

/// Move nodes so the leftmost lands on `at`, preserving relative offsets
fn place_at(nodes: &mut [Node], at: [f32; 2]) {
    let Some(origin) = nodes
        .iter()
        .map(|n| n.position)
        .min_by(|a, b| a[0].total_cmp(&b[0]))
    else {
        return;
    };
    for node in nodes {
        node.position = [
            at[0] + node.position[0] - origin[0],
            at[1] + node.position[1] - origin[1],
        ];
    }
}

/// Three-pass id regeneration over a closed set of nodes.
///
/// Connections whose endpoints are not both inside `nodes` are dropped and
/// removed from socket lists.
pub fn remap(mut nodes: Vec<Node>, mut connections: Vec<Connection>) -> PasteBatch {
    // Pass 1: connections
    let connection_map: HashMap<ConnectionId, ConnectionId> = connections
        .iter()
        .map(|c| (c.id, ConnectionId::new()))
        .collect();
    for connection in &mut connections {
        if let Some(new_id) = connection_map.get(&connection.id) {
            connection.id = *new_id;
        }
    }
    for socket in nodes.iter_mut().flat_map(|n| n.sockets_mut()) {
        socket.connections = socket
            .connections
            .iter()
            .filter_map(|id| connection_map.get(id).copied())
            .collect();
    }

    // Pass 2: sockets
    let mut socket_map: HashMap<SocketId, SocketId> = HashMap::new();
    for socket in nodes.iter_mut().flat_map(|n| n.sockets_mut()) {
        let new_id = SocketId::new();
        socket_map.insert(socket.id, new_id);
        socket.id = new_id;
    }
    for connection in &mut connections {
        if let Some(id) = socket_map.get(&connection.output_socket) {
            connection.output_socket = *id;
        }
        if let Some(id) = socket_map.get(&connection.input_socket) {
            connection.input_socket = *id;
        }
    }

    // Pass 3: nodes
    let mut node_map: HashMap<NodeId, NodeId> = HashMap::new();
    for node in &mut nodes {
        let new_id = NodeId::new();
        node_map.insert(node.id, new_id);
        node.id = new_id;
        for socket in node.sockets_mut() {
            socket.node_id = new_id;
        }
        if let Some(subgraph) = node.subgraph.take() {
            node.subgraph = Some(Box::new(remap_graph(*subgraph)));
        }
    }
    let mut internal = HashSet::new();
    connections.retain(|connection| {
        let keep = node_map.contains_key(&connection.output_node)
            && node_map.contains_key(&connection.input_node);
        if keep {
            internal.insert(connection.id);
        }
        keep
    });
    for connection in &mut connections {
        connection.output_node = node_map[&connection.output_node];
        connection.input_node = node_map[&connection.input_node];
    }

    // Drop external connections from socket lists
    for socket in nodes.iter_mut().flat_map(|n| n.sockets_mut()) {
        socket.connections.retain(|id| internal.contains(id));
    }

    PasteBatch { nodes, connections }
}

/// Remap every id inside a nested graph
fn remap_graph(graph: Graph) -> Graph {
    let name = graph.name.clone();
    let is_subgraph = graph.is_subgraph;
    let (nodes, connections) = graph.into_parts();
    let batch = remap(nodes, connections);
    Graph::from_parts(name, is_subgraph, batch.nodes, batch.connections)
}

/// Name not used by any node in `graph`, derived from `base`
pub fn unique_name(graph: &Graph, base: &str) -> String {
    let taken = |name: &str| graph.nodes().any(|n| n.name == name);
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|i| format!("{base} ({i})"))
        .find(|name| !taken(name))
        .unwrap_or_else(|| base.to_string())
}
