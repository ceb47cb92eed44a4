// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::node::NodeId;
use crate::socket::SocketId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// A directed connection from an output socket to an input socket.
///
/// The graph owns exactly one record per connection; both endpoint sockets
/// refer to it by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Node owning the output socket
    pub output_node: NodeId,
    /// Output socket
    pub output_socket: SocketId,
    /// Node owning the input socket
    pub input_node: NodeId,
    /// Input socket
    pub input_socket: SocketId,
}

impl Connection {
    /// Create a new connection
    pub fn new(
        output_node: NodeId,
        output_socket: SocketId,
        input_node: NodeId,
        input_socket: SocketId,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            output_node,
            output_socket,
            input_node,
            input_socket,
        }
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.output_node == node_id || self.input_node == node_id
    }

    /// Check if this connection involves a specific socket
    pub fn involves_socket(&self, socket_id: SocketId) -> bool {
        self.output_socket == socket_id || self.input_socket == socket_id
    }

    /// Whether the connection joins exactly this output/input pair
    pub fn joins(&self, output_socket: SocketId, input_socket: SocketId) -> bool {
        self.output_socket == output_socket && self.input_socket == input_socket
    }

    /// The socket on the other end from `socket_id`
    pub fn other_end(&self, socket_id: SocketId) -> Option<(NodeId, SocketId)> {
        if self.output_socket == socket_id {
            Some((self.input_node, self.input_socket))
        } else if self.input_socket == socket_id {
            Some((self.output_node, self.output_socket))
        } else {
            None
        }
    }
}
