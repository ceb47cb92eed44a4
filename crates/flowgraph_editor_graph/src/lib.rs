// SPDX-License-Identifier: MIT OR Apache-2.0
//! Flow graph editing core.
//!
//! This crate provides the model and editing machinery behind the flow
//! graph editor:
//! - Graph model: nodes, sockets and connections with arity rules
//! - View transform and spatial lookup maps for hit testing
//! - Connection routing between anchor points
//! - Snapshot-based undo/redo
//! - Pointer/keyboard interaction state machine
//! - Clipboard, subgraph tabs and RON persistence
//!
//! ## Architecture
//!
//! [`EditorSession`] owns one root [`Graph`] and every cache around it. All
//! mutation goes through the session, which records undo, invalidates
//! lookups and publishes [`EditorEvent`]s. The [`canvas`] module adapts a
//! session to an egui `Ui`.

pub mod socket;
pub mod connection;
pub mod node;
pub mod graph;
pub mod registry;
pub mod config;
pub mod view;
pub mod lookup;
pub mod router;
pub mod history;
pub mod selection;
pub mod events;
pub mod clipboard;
pub mod tabs;
pub mod persistence;
pub mod session;
pub mod interaction;
pub mod canvas;

pub use socket::{Socket, SocketArity, SocketDirection, SocketId, SocketType};
pub use connection::{Connection, ConnectionId};
pub use node::{Node, NodeId, NodeKind};
pub use graph::{ConnectionError, Graph, RemoveMode, ReorderDirection, RepairReport};
pub use registry::{create_flow_registry, NodeTypeDescriptor, NodeTypeRegistry, RegistryError};
pub use config::{ConfigError, EditorConfig};
pub use view::{ViewState, ViewTransform};
pub use lookup::LookupMaps;
pub use history::{History, UndoStack};
pub use selection::Selection;
pub use events::{ContextTarget, EditorEvent};
pub use clipboard::Clipboard;
pub use tabs::TabStack;
pub use persistence::{GraphStore, PersistenceError, RonGraphStore};
pub use session::{EditorError, EditorSession, SessionAction};
pub use interaction::{ConnectHint, InputEvent, InteractionState};
pub use canvas::GraphCanvas;
