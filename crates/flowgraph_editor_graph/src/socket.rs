// SPDX-License-Identifier: MIT OR Apache-2.0
//! Socket definitions for node inputs/outputs.

use crate::connection::ConnectionId;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SocketId(pub Uuid);

impl SocketId {
    /// Create a new random socket ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SocketId {
    fn default() -> Self {
        Self::new()
    }
}

/// Socket direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketDirection {
    /// Input socket, the receiving end of a connection
    Input,
    /// Output socket, the originating end of a connection
    Output,
}

impl SocketDirection {
    /// The opposite direction
    pub fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }
}

/// How many connections a socket accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SocketArity {
    /// At most one connection; a new connection replaces the existing one
    Override,
    /// Unbounded number of connections
    #[default]
    Multiple,
}

/// Kind of flow carried by a socket
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketType {
    /// State-to-state transition flow
    Flow,
    /// Wildcard, compatible with every type
    Any,
    /// Custom type tag
    Custom(String),
}

impl SocketType {
    /// Get the color for this socket type (for UI)
    pub fn color(&self) -> [u8; 3] {
        match self {
            Self::Flow => [200, 200, 200],
            Self::Any => [150, 150, 150],
            Self::Custom(_) => [100, 150, 200],
        }
    }

    /// Check if this type can connect to another type
    pub fn can_connect_to(&self, other: &SocketType) -> bool {
        matches!(self, Self::Any) || matches!(other, Self::Any) || self == other
    }
}

/// A socket on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Socket {
    /// Unique socket ID
    pub id: SocketId,
    /// Owning node
    pub node_id: NodeId,
    /// Socket name
    pub name: String,
    /// Socket direction
    pub direction: SocketDirection,
    /// Arity policy
    pub arity: SocketArity,
    /// Flow type
    pub socket_type: SocketType,
    /// Connections attached to this socket
    pub connections: Vec<ConnectionId>,
    /// Anchor offsets relative to the owning node's grid position.
    /// Empty means a single anchor on the node edge facing `direction`.
    pub anchors: Vec<[f32; 2]>,
    /// Whether the socket may be moved up/down among its siblings
    pub reorderable: bool,
    /// Position among reorderable siblings
    pub reorder_index: usize,
    /// Whether the user may remove this socket
    pub deletable: bool,
    /// Scales the tangent length of curves leaving this socket
    pub tangent_modifier: f32,
}

impl Socket {
    /// Create a new socket owned by `node_id`
    pub fn new(
        node_id: NodeId,
        name: impl Into<String>,
        direction: SocketDirection,
        arity: SocketArity,
        socket_type: SocketType,
    ) -> Self {
        Self {
            id: SocketId::new(),
            node_id,
            name: name.into(),
            direction,
            arity,
            socket_type,
            connections: Vec::new(),
            anchors: Vec::new(),
            reorderable: false,
            reorder_index: 0,
            deletable: true,
            tangent_modifier: 1.0,
        }
    }

    /// Create a new flow input socket
    pub fn input(node_id: NodeId, name: impl Into<String>) -> Self {
        Self::new(node_id, name, SocketDirection::Input, SocketArity::Multiple, SocketType::Flow)
    }

    /// Create a new flow output socket
    pub fn output(node_id: NodeId, name: impl Into<String>) -> Self {
        Self::new(node_id, name, SocketDirection::Output, SocketArity::Override, SocketType::Flow)
    }

    /// Set the arity policy
    pub fn with_arity(mut self, arity: SocketArity) -> Self {
        self.arity = arity;
        self
    }

    /// Set the socket type
    pub fn with_type(mut self, socket_type: SocketType) -> Self {
        self.socket_type = socket_type;
        self
    }

    /// Add an explicit anchor offset
    pub fn with_anchor(mut self, offset: [f32; 2]) -> Self {
        self.anchors.push(offset);
        self
    }

    /// Mark as reorderable
    pub fn reorderable(mut self) -> Self {
        self.reorderable = true;
        self
    }

    /// Mark as non-deletable
    pub fn locked(mut self) -> Self {
        self.deletable = false;
        self
    }

    /// Whether this socket has any connection
    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty()
    }

    /// Whether the arity policy allows only one connection
    pub fn is_override(&self) -> bool {
        self.arity == SocketArity::Override
    }

    /// Structural compatibility with another socket: opposite directions,
    /// distinct nodes and compatible types.
    pub fn can_connect(&self, other: &Socket) -> bool {
        self.direction != other.direction
            && self.node_id != other.node_id
            && self.socket_type.can_connect_to(&other.socket_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_compatibility() {
        assert!(SocketType::Flow.can_connect_to(&SocketType::Flow));
        assert!(SocketType::Any.can_connect_to(&SocketType::Custom("x".into())));
        assert!(!SocketType::Flow.can_connect_to(&SocketType::Custom("x".into())));
        assert!(SocketType::Custom("x".into()).can_connect_to(&SocketType::Custom("x".into())));
    }

    #[test]
    fn test_can_connect_rules() {
        let a = NodeId::new();
        let b = NodeId::new();
        let out = Socket::output(a, "Out");
        let input = Socket::input(b, "In");
        assert!(out.can_connect(&input));
        assert!(input.can_connect(&out));

        let same_dir = Socket::output(b, "Out");
        assert!(!out.can_connect(&same_dir));

        let self_loop = Socket::input(a, "In");
        assert!(!out.can_connect(&self_loop));

        let typed = Socket::input(b, "Typed").with_type(SocketType::Custom("event".into()));
        assert!(!out.can_connect(&typed));
    }
}
