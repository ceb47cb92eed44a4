// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph model.

use crate::graph::Graph;
use crate::socket::{Socket, SocketDirection, SocketId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default node size in grid units
pub const DEFAULT_NODE_SIZE: [f32; 2] = [180.0, 60.0];

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural role of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Entry point of a root graph
    Start,
    /// Entry point of a subgraph
    Enter,
    /// Exit point of a subgraph
    Exit,
    /// Regular state node
    General,
    /// Node that owns a nested graph
    SubGraph,
}

impl NodeKind {
    /// Start/Enter/Exit are never deleted by the user, never copied and
    /// never take part in duplicate-name checks.
    pub fn is_protected(self) -> bool {
        matches!(self, Self::Start | Self::Enter | Self::Exit)
    }

    /// Get the display name
    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::Enter => "Enter",
            Self::Exit => "Exit",
            Self::General => "General",
            Self::SubGraph => "SubGraph",
        }
    }
}

/// Derived validation flags, recomputed by [`Graph::validate_names`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeErrors {
    /// Another node in the same graph has the same name
    pub duplicate_name: bool,
}

impl NodeErrors {
    /// Whether any error is set
    pub fn any(&self) -> bool {
        self.duplicate_name
    }
}

/// A node instance in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Structural role
    pub kind: NodeKind,
    /// Registry type tag
    pub type_id: String,
    /// Display name
    pub name: String,
    /// Top-left corner in grid space
    pub position: [f32; 2],
    /// Size in grid space
    pub size: [f32; 2],
    /// Input sockets
    pub inputs: Vec<Socket>,
    /// Output sockets
    pub outputs: Vec<Socket>,
    /// Whether the user may delete this node
    pub deletable: bool,
    /// Whether this node is exempt from the duplicate-name check
    pub allow_duplicate_name: bool,
    /// Derived validation flags
    #[serde(skip)]
    pub errors: NodeErrors,
    /// Nested graph owned by a [`NodeKind::SubGraph`] node
    pub subgraph: Option<Box<Graph>>,
}

impl Node {
    /// Build the protected entry node for `kind` (Start, Enter or Exit)
    pub fn entry(kind: NodeKind) -> Option<Self> {
        let node = match kind {
            NodeKind::Start => Self::new(kind, "start", "Start").with_socket(|id| Socket::output(id, "Next")),
            NodeKind::Enter => Self::new(kind, "enter", "Enter").with_socket(|id| Socket::output(id, "Next")),
            NodeKind::Exit => Self::new(kind, "exit", "Exit").with_socket(|id| Socket::input(id, "In")),
            NodeKind::General | NodeKind::SubGraph => return None,
        };
        Some(node.with_size(120.0, 40.0))
    }

    /// Create a new node without sockets
    pub fn new(kind: NodeKind, type_id: impl Into<String>, name: impl Into<String>) -> Self {
        let subgraph = (kind == NodeKind::SubGraph).then(|| {
            let mut graph = Graph::new_subgraph("Subgraph");
            graph.insert_entry_nodes();
            Box::new(graph)
        });
        Self {
            id: NodeId::new(),
            kind,
            type_id: type_id.into(),
            name: name.into(),
            position: [0.0, 0.0],
            size: DEFAULT_NODE_SIZE,
            inputs: Vec::new(),
            outputs: Vec::new(),
            deletable: !kind.is_protected(),
            allow_duplicate_name: false,
            errors: NodeErrors::default(),
            subgraph,
        }
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Set the size
    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.size = [width, height];
        self
    }

    /// Add a socket built from this node's id
    pub fn with_socket(mut self, build: impl FnOnce(NodeId) -> Socket) -> Self {
        let socket = build(self.id);
        self.push_socket(socket);
        self
    }

    /// Append a socket to the list matching its direction. The socket is
    /// re-owned by this node.
    pub fn push_socket(&mut self, mut socket: Socket) -> SocketId {
        socket.node_id = self.id;
        let id = socket.id;
        let list = self.sockets_in_mut(socket.direction);
        socket.reorder_index = list.len();
        list.push(socket);
        id
    }

    /// Whether the node is protected from deletion and copying
    pub fn is_protected(&self) -> bool {
        self.kind.is_protected()
    }

    /// Whether the user may delete this node
    pub fn can_delete(&self) -> bool {
        self.deletable && !self.is_protected()
    }

    /// Get an input socket by index
    pub fn input(&self, index: usize) -> Option<&Socket> {
        self.inputs.get(index)
    }

    /// Get an output socket by index
    pub fn output(&self, index: usize) -> Option<&Socket> {
        self.outputs.get(index)
    }

    /// Get a socket by ID
    pub fn socket(&self, socket_id: SocketId) -> Option<&Socket> {
        self.inputs
            .iter()
            .find(|s| s.id == socket_id)
            .or_else(|| self.outputs.iter().find(|s| s.id == socket_id))
    }

    /// Get a mutable socket by ID
    pub fn socket_mut(&mut self, socket_id: SocketId) -> Option<&mut Socket> {
        if let Some(index) = self.inputs.iter().position(|s| s.id == socket_id) {
            return self.inputs.get_mut(index);
        }
        self.outputs.iter_mut().find(|s| s.id == socket_id)
    }

    /// Get all sockets, inputs first
    pub fn sockets(&self) -> impl Iterator<Item = &Socket> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Get all sockets mutably, inputs first
    pub fn sockets_mut(&mut self) -> impl Iterator<Item = &mut Socket> {
        self.inputs.iter_mut().chain(self.outputs.iter_mut())
    }

    /// The socket list for one direction
    pub fn sockets_in(&self, direction: SocketDirection) -> &[Socket] {
        match direction {
            SocketDirection::Input => &self.inputs,
            SocketDirection::Output => &self.outputs,
        }
    }

    /// The mutable socket list for one direction
    pub fn sockets_in_mut(&mut self, direction: SocketDirection) -> &mut Vec<Socket> {
        match direction {
            SocketDirection::Input => &mut self.inputs,
            SocketDirection::Output => &mut self.outputs,
        }
    }

    /// Index of a socket within its direction list
    pub fn socket_row(&self, socket_id: SocketId) -> Option<(SocketDirection, usize)> {
        if let Some(i) = self.inputs.iter().position(|s| s.id == socket_id) {
            return Some((SocketDirection::Input, i));
        }
        self.outputs
            .iter()
            .position(|s| s.id == socket_id)
            .map(|i| (SocketDirection::Output, i))
    }

    /// Number of socket rows the node body needs
    pub fn row_count(&self) -> usize {
        self.inputs.len().max(self.outputs.len())
    }

    /// Center of the node in grid space
    pub fn center(&self) -> [f32; 2] {
        [
            self.position[0] + self.size[0] * 0.5,
            self.position[1] + self.size[1] * 0.5,
        ]
    }
}
