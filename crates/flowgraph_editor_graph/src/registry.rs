// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node type registry.
//!
//! Types are registered explicitly at startup; each descriptor carries menu
//! metadata and a factory. The editor core only ever asks the registry to
//! "instantiate type T at position P".

use crate::node::{Node, NodeKind};
use crate::socket::Socket;
use indexmap::IndexMap;

/// Type tag of the default flow state node
pub const STATE_TYPE: &str = "state";
/// Type tag of the branching state node
pub const BRANCH_TYPE: &str = "branch";
/// Type tag of the subgraph node
pub const SUBGRAPH_TYPE: &str = "subgraph";

/// Factory creating a fresh node for a type tag
pub type NodeFactory = fn(&NodeTypeDescriptor) -> Node;

/// Registered node type
#[derive(Debug, Clone)]
pub struct NodeTypeDescriptor {
    /// Unique type tag
    pub type_id: String,
    /// Structural role of nodes of this type
    pub kind: NodeKind,
    /// Display name
    pub display_name: String,
    /// Context-menu path, `/` separated
    pub menu_path: String,
    /// Description
    pub description: String,
    /// Whether users may create this type from menus
    pub user_creatable: bool,
    /// Factory
    pub factory: NodeFactory,
}

impl NodeTypeDescriptor {
    /// Create a descriptor
    pub fn new(
        type_id: impl Into<String>,
        kind: NodeKind,
        display_name: impl Into<String>,
        factory: NodeFactory,
    ) -> Self {
        let display_name = display_name.into();
        Self {
            type_id: type_id.into(),
            kind,
            menu_path: display_name.clone(),
            display_name,
            description: String::new(),
            user_creatable: !kind.is_protected(),
            factory,
        }
    }

    /// Set the menu path
    pub fn with_menu_path(mut self, path: impl Into<String>) -> Self {
        self.menu_path = path.into();
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// One entry of the "add node" menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    /// Type tag to instantiate
    pub type_id: String,
    /// Menu path
    pub path: String,
}

/// Registry of available node types
#[derive(Debug, Default)]
pub struct NodeTypeRegistry {
    types: IndexMap<String, NodeTypeDescriptor>,
}

impl NodeTypeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type
    pub fn register(&mut self, descriptor: NodeTypeDescriptor) {
        self.types.insert(descriptor.type_id.clone(), descriptor);
    }

    /// Get a node type by tag
    pub fn get(&self, type_id: &str) -> Option<&NodeTypeDescriptor> {
        self.types.get(type_id)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeTypeDescriptor> {
        self.types.values()
    }

    /// Menu entries for user-creatable types, sorted by path
    pub fn menu_entries(&self) -> Vec<MenuEntry> {
        let mut entries: Vec<_> = self
            .types
            .values()
            .filter(|t| t.user_creatable)
            .map(|t| MenuEntry {
                type_id: t.type_id.clone(),
                path: t.menu_path.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    /// Create a node of the given type with its top-left corner at `position`
    pub fn instantiate(&self, type_id: &str, position: [f32; 2]) -> Result<Node, RegistryError> {
        let descriptor = self
            .get(type_id)
            .ok_or_else(|| RegistryError::UnknownNodeType(type_id.to_string()))?;
        let mut node = (descriptor.factory)(descriptor);
        node.type_id = descriptor.type_id.clone();
        node.position = position;
        Ok(node)
    }
}

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The type tag was never registered
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),
}

fn state_node(descriptor: &NodeTypeDescriptor) -> Node {
    Node::new(NodeKind::General, &descriptor.type_id, &descriptor.display_name)
        .with_socket(|id| Socket::input(id, "In"))
        .with_socket(|id| Socket::output(id, "Next"))
}

fn branch_node(descriptor: &NodeTypeDescriptor) -> Node {
    Node::new(NodeKind::General, &descriptor.type_id, &descriptor.display_name)
        .with_size(180.0, 84.0)
        .with_socket(|id| Socket::input(id, "In"))
        .with_socket(|id| Socket::output(id, "True").reorderable())
        .with_socket(|id| Socket::output(id, "False").reorderable())
}

fn subgraph_node(descriptor: &NodeTypeDescriptor) -> Node {
    let mut node = Node::new(NodeKind::SubGraph, &descriptor.type_id, &descriptor.display_name)
        .with_socket(|id| Socket::input(id, "In"))
        .with_socket(|id| Socket::output(id, "Out"));
    node.allow_duplicate_name = true;
    node
}

/// Create the flow graph node registry
pub fn create_flow_registry() -> NodeTypeRegistry {
    let mut registry = NodeTypeRegistry::new();

    registry.register(
        NodeTypeDescriptor::new(STATE_TYPE, NodeKind::General, "State", state_node)
            .with_menu_path("Flow/State")
            .with_description("A state with one outgoing transition"),
    );
    registry.register(
        NodeTypeDescriptor::new(BRANCH_TYPE, NodeKind::General, "Branch", branch_node)
            .with_menu_path("Flow/Branch")
            .with_description("Two-way conditional transition"),
    );
    registry.register(
        NodeTypeDescriptor::new(SUBGRAPH_TYPE, NodeKind::SubGraph, "Subgraph", subgraph_node)
            .with_menu_path("Structure/Subgraph")
            .with_description("Nested graph, opened in its own tab"),
    );

    registry
}
