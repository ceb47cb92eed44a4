// SPDX-License-Identifier: MIT OR Apache-2.0
//! Derived lookup maps and hit testing.
//!
//! Four maps are kept: nodes by id, sockets by id, virtual points by socket
//! and virtual connections by connection id. They are rebuilt only when
//! invalidated (structural change, view change) and patched per node while
//! dragging. Queries take world-space positions.

use crate::config::EditorConfig;
use crate::connection::ConnectionId;
use crate::graph::Graph;
use crate::node::{Node, NodeId};
use crate::router::{self, Route, RouteEnd, TangentParams};
use crate::socket::{Socket, SocketDirection, SocketId};
use crate::view::ViewTransform;
use egui::{Pos2, Rect, Vec2};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Radius of a virtual point in grid units
pub const POINT_RADIUS: f32 = 6.0;
/// Padding below the last socket row in grid units
const BODY_PADDING: f32 = 8.0;

/// Screen-space projection of one socket anchor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualPoint {
    /// Socket the anchor belongs to
    pub socket_id: SocketId,
    /// Owning node
    pub node_id: NodeId,
    /// Index within the socket's anchor list
    pub index: usize,
    /// World position
    pub position: Pos2,
}

/// Render-time realization of one connection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualConnection {
    /// Connection
    pub id: ConnectionId,
    /// Output socket
    pub output_socket: SocketId,
    /// Input socket
    pub input_socket: SocketId,
    /// Routed curve
    pub route: Route,
}

/// Cached node geometry in world space
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEntry {
    /// Index in the graph's node list (0 topmost)
    pub index: usize,
    /// Full node rect
    pub rect: Rect,
    /// Header rect
    pub header: Rect,
    /// Inputs then outputs, in row order
    pub sockets: Vec<SocketId>,
}

/// Cached socket placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SocketEntry {
    /// Owning node
    pub node_id: NodeId,
    /// Direction
    pub direction: SocketDirection,
    /// Row within its direction list
    pub row: usize,
    /// Socket row rect, world space
    pub rect: Rect,
}

// ----------------------------------------------------------------------------
// Grid-space layout
// ----------------------------------------------------------------------------

/// Full node rect in grid space
pub fn node_grid_rect(node: &Node, config: &EditorConfig) -> Rect {
    let body = config.header_height + node.row_count() as f32 * config.socket_row_height + BODY_PADDING;
    Rect::from_min_size(
        Pos2::new(node.position[0], node.position[1]),
        Vec2::new(node.size[0], node.size[1].max(body)),
    )
}

/// Header rect in grid space
pub fn header_grid_rect(node: &Node, config: &EditorConfig) -> Rect {
    Rect::from_min_size(
        Pos2::new(node.position[0], node.position[1]),
        Vec2::new(node.size[0], config.header_height),
    )
}

/// Socket row rect in grid space: inputs on the left half, outputs on the right
pub fn socket_grid_rect(node: &Node, direction: SocketDirection, row: usize, config: &EditorConfig) -> Rect {
    let half = node.size[0] * 0.5;
    let x = match direction {
        SocketDirection::Input => node.position[0],
        SocketDirection::Output => node.position[0] + half,
    };
    let y = node.position[1] + config.header_height + row as f32 * config.socket_row_height;
    Rect::from_min_size(Pos2::new(x, y), Vec2::new(half, config.socket_row_height))
}

/// Anchor offsets of a socket relative to its node, falling back to one
/// anchor on the edge facing the socket's direction
pub fn anchor_offsets(node: &Node, socket: &Socket, row: usize, config: &EditorConfig) -> Vec<[f32; 2]> {
    if !socket.anchors.is_empty() {
        return socket.anchors.clone();
    }
    let y = config.header_height + row as f32 * config.socket_row_height + config.socket_row_height * 0.5;
    let x = match socket.direction {
        SocketDirection::Input => 0.0,
        SocketDirection::Output => node.size[0],
    };
    vec![[x, y]]
}

// ----------------------------------------------------------------------------
// LookupMaps
// ----------------------------------------------------------------------------

/// Invalidation-driven derived maps for one graph under one view
#[derive(Debug, Default)]
pub struct LookupMaps {
    node_by_id: HashMap<NodeId, NodeEntry>,
    socket_by_id: HashMap<SocketId, SocketEntry>,
    points_by_socket: HashMap<SocketId, Vec<VirtualPoint>>,
    connection_by_id: IndexMap<ConnectionId, VirtualConnection>,
    /// Node ids, topmost first
    order: Vec<NodeId>,
    valid: bool,
    built_version: u64,
    built_view: Option<(f32, Vec2)>,
    rebuilds: u64,
}

impl LookupMaps {
    /// Create empty, invalid maps
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a rebuild on the next [`LookupMaps::ensure`]
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Whether the maps are valid
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Number of full rebuilds performed
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    /// Rebuild if invalidated or if the graph version or view changed
    pub fn ensure(&mut self, graph: &Graph, view: &ViewTransform, config: &EditorConfig) {
        let view_key = (view.zoom(), view.pan);
        if !self.valid || self.built_version != graph.version || self.built_view != Some(view_key) {
            self.rebuild(graph, view, config);
        }
    }

    /// Rebuild all four maps. O(nodes + sockets + connections)
    pub fn rebuild(&mut self, graph: &Graph, view: &ViewTransform, config: &EditorConfig) {
        self.node_by_id.clear();
        self.socket_by_id.clear();
        self.points_by_socket.clear();
        self.connection_by_id.clear();
        self.order.clear();

        for (index, node) in graph.nodes().enumerate() {
            self.order.push(node.id);
            self.index_node(index, node, view, config);
        }
        for connection in graph.connections() {
            self.route_connection(graph, connection.id, config, view.zoom());
        }

        self.valid = true;
        self.built_version = graph.version;
        self.built_view = Some((view.zoom(), view.pan));
        self.rebuilds += 1;
        tracing::debug!(
            "Rebuilt lookup maps: {} nodes, {} sockets, {} connections",
            self.node_by_id.len(),
            self.socket_by_id.len(),
            self.connection_by_id.len()
        );
    }

    /// Recompute one node's geometry, points and attached connections
    /// without touching the rest of the graph
    pub fn refresh_node(&mut self, graph: &Graph, node_id: NodeId, view: &ViewTransform, config: &EditorConfig) {
        let Some(node) = graph.node(node_id) else {
            return;
        };
        let Some(index) = self.node_by_id.get(&node_id).map(|e| e.index) else {
            self.invalidate();
            return;
        };
        self.index_node(index, node, view, config);

        let attached: Vec<ConnectionId> = node
            .sockets()
            .flat_map(|s| s.connections.iter().copied())
            .collect();
        for id in attached {
            self.route_connection(graph, id, config, view.zoom());
        }
    }

    fn index_node(&mut self, index: usize, node: &Node, view: &ViewTransform, config: &EditorConfig) {
        self.node_by_id.insert(
            node.id,
            NodeEntry {
                index,
                rect: view.grid_rect_to_world(node_grid_rect(node, config)),
                header: view.grid_rect_to_world(header_grid_rect(node, config)),
                sockets: node.sockets().map(|s| s.id).collect(),
            },
        );

        for direction in [SocketDirection::Input, SocketDirection::Output] {
            for (row, socket) in node.sockets_in(direction).iter().enumerate() {
                let rect = view.grid_rect_to_world(socket_grid_rect(node, direction, row, config));
                self.socket_by_id.insert(
                    socket.id,
                    SocketEntry {
                        node_id: node.id,
                        direction,
                        row,
                        rect,
                    },
                );
                let points = anchor_offsets(node, socket, row, config)
                    .into_iter()
                    .enumerate()
                    .map(|(i, offset)| VirtualPoint {
                        socket_id: socket.id,
                        node_id: node.id,
                        index: i,
                        position: view.grid_to_world(Pos2::new(
                            node.position[0] + offset[0],
                            node.position[1] + offset[1],
                        )),
                    })
                    .collect();
                self.points_by_socket.insert(socket.id, points);
            }
        }
    }

    fn route_connection(&mut self, graph: &Graph, id: ConnectionId, config: &EditorConfig, zoom: f32) {
        let Some(connection) = graph.connection(id) else {
            self.connection_by_id.shift_remove(&id);
            return;
        };
        let end = |socket_id: SocketId, node_id: NodeId| -> Option<(Vec<Pos2>, Rect, f32)> {
            let points = self.points_by_socket.get(&socket_id)?;
            let rect = self.node_by_id.get(&node_id)?.rect;
            let modifier = graph
                .node(node_id)
                .and_then(|n| n.socket(socket_id))
                .map_or(1.0, |s| s.tangent_modifier);
            Some((points.iter().map(|p| p.position).collect(), rect, modifier))
        };
        let (Some(out), Some(inp)) = (
            end(connection.output_socket, connection.output_node),
            end(connection.input_socket, connection.input_node),
        ) else {
            tracing::debug!("Skipping connection {:?} with unresolved endpoint", id);
            self.connection_by_id.shift_remove(&id);
            return;
        };

        let params = TangentParams {
            factor: config.tangent_factor,
            min_length: config.min_tangent * zoom,
        };
        let output = RouteEnd { points: &out.0, node_rect: out.1, tangent_modifier: out.2 };
        let input = RouteEnd { points: &inp.0, node_rect: inp.1, tangent_modifier: inp.2 };
        if let Some(route) = router::route(&output, &input, params) {
            self.connection_by_id.insert(
                id,
                VirtualConnection {
                    id,
                    output_socket: connection.output_socket,
                    input_socket: connection.input_socket,
                    route,
                },
            );
        }
    }

    /// Drop entries whose parent no longer exists. Returns the number of
    /// entries removed.
    pub fn prune(&mut self, graph: &Graph) -> usize {
        let before = self.len();
        self.node_by_id.retain(|id, _| graph.contains_node(*id));
        self.order.retain(|id| graph.contains_node(*id));
        self.socket_by_id.retain(|id, entry| {
            graph
                .node(entry.node_id)
                .is_some_and(|n| n.socket(*id).is_some())
        });
        let sockets = &self.socket_by_id;
        self.points_by_socket.retain(|id, _| sockets.contains_key(id));
        self.connection_by_id.retain(|id, vc| {
            graph.connection(*id).is_some()
                && sockets.contains_key(&vc.output_socket)
                && sockets.contains_key(&vc.input_socket)
        });
        let removed = before - self.len();
        if removed > 0 {
            tracing::debug!("Pruned {} stale lookup entries", removed);
        }
        removed
    }

    fn len(&self) -> usize {
        self.node_by_id.len()
            + self.socket_by_id.len()
            + self.points_by_socket.len()
            + self.connection_by_id.len()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Node geometry
    pub fn node(&self, id: NodeId) -> Option<&NodeEntry> {
        self.node_by_id.get(&id)
    }

    /// Socket placement
    pub fn socket(&self, id: SocketId) -> Option<&SocketEntry> {
        self.socket_by_id.get(&id)
    }

    /// Virtual points of a socket
    pub fn points(&self, socket_id: SocketId) -> &[VirtualPoint] {
        self.points_by_socket
            .get(&socket_id)
            .map_or(&[], Vec::as_slice)
    }

    /// A single virtual point
    pub fn point(&self, socket_id: SocketId, index: usize) -> Option<&VirtualPoint> {
        self.points(socket_id).get(index)
    }

    /// Virtual connection by id
    pub fn connection(&self, id: ConnectionId) -> Option<&VirtualConnection> {
        self.connection_by_id.get(&id)
    }

    /// All virtual connections
    pub fn connections(&self) -> impl Iterator<Item = &VirtualConnection> {
        self.connection_by_id.values()
    }

    /// Node ids, topmost first
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    // ------------------------------------------------------------------
    // Hit testing
    // ------------------------------------------------------------------

    fn visible(rect: &Rect, viewport: Rect) -> bool {
        rect.intersects(viewport)
    }

    /// Topmost visible node under `pos`
    pub fn node_at(&self, pos: Pos2, view: &ViewTransform, config: &EditorConfig) -> Option<NodeId> {
        let viewport = view.viewport_rect();
        self.order.iter().copied().find(|id| {
            self.node_by_id.get(id).is_some_and(|e| {
                Self::visible(&e.rect, viewport) && e.rect.expand(config.hit_epsilon).contains(pos)
            })
        })
    }

    /// Topmost visible node whose header is under `pos`
    pub fn header_at(&self, pos: Pos2, view: &ViewTransform, config: &EditorConfig) -> Option<NodeId> {
        let node = self.node_at(pos, view, config)?;
        let entry = self.node_by_id.get(&node)?;
        entry.header.expand(config.hit_epsilon).contains(pos).then_some(node)
    }

    /// Socket row under `pos` on the topmost node at that position
    pub fn socket_at(&self, pos: Pos2, view: &ViewTransform, config: &EditorConfig) -> Option<SocketId> {
        let node = self.node_at(pos, view, config)?;
        let mut best: Option<(SocketId, f32)> = None;
        for id in &self.node_by_id.get(&node)?.sockets {
            let Some(entry) = self.socket_by_id.get(id) else {
                continue;
            };
            let d = entry.rect.distance_to_pos(pos);
            if d <= config.hit_epsilon && best.map_or(true, |(_, bd)| d < bd) {
                best = Some((*id, d));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Virtual point under `pos`. Disabled below the configured zoom threshold.
    pub fn point_at(&self, pos: Pos2, view: &ViewTransform, config: &EditorConfig) -> Option<VirtualPoint> {
        if view.zoom() < config.point_zoom_threshold {
            return None;
        }
        let viewport = view.viewport_rect();
        let radius = POINT_RADIUS * view.zoom() + config.hit_epsilon;
        let mut best: Option<(VirtualPoint, f32)> = None;
        for node_id in &self.order {
            let Some(entry) = self.node_by_id.get(node_id) else {
                continue;
            };
            if !Self::visible(&entry.rect.expand(radius), viewport) {
                continue;
            }
            for socket_id in &entry.sockets {
                for point in self.points(*socket_id) {
                    let d = point.position.distance(pos);
                    if d <= radius && best.map_or(true, |(_, bd)| d < bd) {
                        best = Some((*point, d));
                    }
                }
            }
            if best.is_some() {
                break;
            }
        }
        best.map(|(p, _)| p)
    }

    /// Nodes whose rect lies completely inside `rect`
    pub fn nodes_in_rect(&self, rect: Rect) -> Vec<NodeId> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.node_by_id.get(id).is_some_and(|e| rect.contains_rect(e.rect)))
            .collect()
    }

    /// Closest virtual connection within `tolerance` of `pos`
    pub fn connection_at(&self, pos: Pos2, tolerance: f32) -> Option<ConnectionId> {
        self.connection_by_id
            .values()
            .filter(|vc| vc.route.bounds().expand(tolerance).contains(pos))
            .map(|vc| (vc.id, vc.route.distance_to(pos)))
            .filter(|(_, d)| *d <= tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// Virtual connections ending at a given virtual point
    pub fn connections_at_point(&self, point: &VirtualPoint) -> Vec<ConnectionId> {
        self.connection_by_id
            .values()
            .filter(|vc| {
                (vc.output_socket == point.socket_id && vc.route.from_index == point.index)
                    || (vc.input_socket == point.socket_id && vc.route.to_index == point.index)
            })
            .map(|vc| vc.id)
            .collect()
    }
}
