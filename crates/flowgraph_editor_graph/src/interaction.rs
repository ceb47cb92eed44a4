// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pointer/keyboard state machine.
//!
//! Modes are `Idle`, `Connect`, `BoxSelect`, `Drag` and `Pan`. Holding Alt
//! overlays delete mode on `Idle` presses. Every non-idle mode is
//! speculative: Escape restores whatever it touched, and only a release over
//! a valid target commits a model change.

use crate::events::{ContextTarget, EditorEvent};
use crate::node::NodeId;
use crate::selection::{SelectMode, Selection};
use crate::session::EditorSession;
use crate::socket::{SocketDirection, SocketId};
use egui::{Key, Modifiers, PointerButton, Pos2, Rect, Vec2};

/// Input fed to [`EditorSession::handle_input`]. Positions are canvas-local
/// world coordinates, times are seconds.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// A pointer button went down
    PointerPressed {
        /// Pointer position
        pos: Pos2,
        /// Button
        button: PointerButton,
        /// Held modifiers
        modifiers: Modifiers,
        /// Event time
        time: f64,
    },
    /// The pointer moved
    PointerMoved {
        /// Pointer position
        pos: Pos2,
        /// Held modifiers
        modifiers: Modifiers,
    },
    /// A pointer button went up
    PointerReleased {
        /// Pointer position
        pos: Pos2,
        /// Button
        button: PointerButton,
        /// Held modifiers
        modifiers: Modifiers,
    },
    /// Wheel zoom, positive zooms in
    Scroll {
        /// Zoom anchor
        pos: Pos2,
        /// Zoom steps
        steps: f32,
    },
    /// A key changed state
    Key {
        /// Key
        key: Key,
        /// Pressed or released
        pressed: bool,
        /// Held modifiers
        modifiers: Modifiers,
    },
}

/// Feedback for the provisional connection line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectHint {
    /// Nothing connectable under the pointer
    #[default]
    Neutral,
    /// Releasing here connects
    Valid,
    /// Releasing here is rejected
    Invalid,
}

/// In-progress connection gesture
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectState {
    /// Socket the gesture started from
    pub socket: SocketId,
    /// World position of the starting anchor
    pub origin: Pos2,
    /// Whether the starting socket is an output
    pub from_output: bool,
    /// Current pointer
    pub pointer: Pos2,
    /// Socket under the pointer
    pub target: Option<SocketId>,
    /// Validity of `target`
    pub hint: ConnectHint,
}

/// In-progress rubber band
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSelectState {
    /// Press position
    pub anchor: Pos2,
    /// Current pointer
    pub current: Pos2,
    /// Selection before the gesture
    pub base: Selection,
    /// Shift held: merge by symmetric difference
    pub toggle: bool,
    /// Moved past the drag threshold
    pub moved: bool,
}

impl BoxSelectState {
    /// Band rectangle in world space
    pub fn rect(&self) -> Rect {
        Rect::from_two_pos(self.anchor, self.current)
    }
}

/// In-progress node drag
#[derive(Debug, Clone, PartialEq)]
pub struct DragState {
    /// Press position
    pub press: Pos2,
    /// Grid positions of the dragged nodes at press time
    pub initial: Vec<(NodeId, [f32; 2])>,
    /// Moved past the drag threshold
    pub moved: bool,
    /// Undo entry pushed for this drag
    pub recorded: bool,
}

/// In-progress pan
#[derive(Debug, Clone, PartialEq)]
pub struct PanState {
    /// Last pointer position
    pub last: Pos2,
    /// Pan before the gesture
    pub initial_pan: Vec2,
}

/// Interaction mode
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InteractionState {
    /// Waiting for input
    #[default]
    Idle,
    /// Dragging a provisional connection
    Connect(ConnectState),
    /// Rubber-band selection
    BoxSelect(BoxSelectState),
    /// Moving selected nodes
    Drag(DragState),
    /// Panning the view
    Pan(PanState),
}

impl InteractionState {
    /// Whether no gesture is in progress
    pub fn is_idle(&self) -> bool {
        matches!(self, InteractionState::Idle)
    }

    /// Mode name
    pub fn name(&self) -> &'static str {
        match self {
            InteractionState::Idle => "Idle",
            InteractionState::Connect(_) => "Connect",
            InteractionState::BoxSelect(_) => "BoxSelect",
            InteractionState::Drag(_) => "Drag",
            InteractionState::Pan(_) => "Pan",
        }
    }
}

/// Raw input bookkeeping between events
#[derive(Debug, Clone, Default)]
pub struct InputTracker {
    /// Last pointer position
    pub pointer: Pos2,
    /// Last modifiers
    pub modifiers: Modifiers,
    /// Space is held (primary press pans)
    pub space_held: bool,
    /// Last header click, for double-click detection
    pub last_click: Option<(NodeId, f64)>,
}

fn delete_mode(modifiers: &Modifiers) -> bool {
    modifiers.alt
}

fn toggle_mode(modifiers: &Modifiers) -> bool {
    modifiers.shift || modifiers.ctrl || modifiers.command
}

fn is_command(modifiers: &Modifiers) -> bool {
    modifiers.ctrl || modifiers.command
}

impl EditorSession {
    /// Feed one input event through the state machine
    pub fn handle_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::PointerPressed {
                pos,
                button,
                modifiers,
                time,
            } => {
                self.input.pointer = pos;
                self.input.modifiers = modifiers;
                match button {
                    PointerButton::Primary => self.on_primary_press(pos, modifiers, time),
                    PointerButton::Middle => {
                        if self.state.is_idle() {
                            self.begin_pan(pos);
                        }
                    }
                    PointerButton::Secondary => self.on_secondary_press(pos),
                    _ => {}
                }
            }
            InputEvent::PointerMoved { pos, modifiers } => {
                self.input.pointer = pos;
                self.input.modifiers = modifiers;
                self.on_pointer_moved(pos);
            }
            InputEvent::PointerReleased {
                pos,
                button,
                modifiers,
            } => {
                self.input.pointer = pos;
                self.input.modifiers = modifiers;
                match button {
                    PointerButton::Primary => self.on_primary_release(pos),
                    PointerButton::Middle => {
                        if matches!(self.state, InteractionState::Pan(_)) {
                            self.state = InteractionState::Idle;
                        }
                    }
                    _ => {}
                }
            }
            InputEvent::Scroll { pos, steps } => {
                if steps != 0.0 {
                    self.zoom_at(pos, steps);
                }
            }
            InputEvent::Key {
                key,
                pressed,
                modifiers,
            } => self.on_key(key, pressed, modifiers),
        }
    }

    // ------------------------------------------------------------------
    // Press
    // ------------------------------------------------------------------

    fn on_primary_press(&mut self, pos: Pos2, modifiers: Modifiers, time: f64) {
        if !self.state.is_idle() {
            return;
        }
        self.context_menu = None;
        if self.input.space_held {
            self.begin_pan(pos);
            return;
        }

        self.ensure_lookups();
        let delete = delete_mode(&modifiers);

        if let Some(point) = self.lookup.point_at(pos, &self.view, &self.config) {
            if delete {
                let ids = self.lookup.connections_at_point(&point);
                let removed = self.disconnect_connections(&ids);
                tracing::debug!("Delete mode removed {} connections at point", removed);
                return;
            }
            if self.selection.len() < 2 {
                self.begin_connect(point.socket_id, point.position, pos);
                return;
            }
        }

        if let Some(socket) = self.lookup.socket_at(pos, &self.view, &self.config) {
            if delete {
                self.remove_socket(socket);
                return;
            }
            if self.selection.len() < 2 {
                let origin = self.lookup.points(socket).first().map_or(pos, |p| p.position);
                self.begin_connect(socket, origin, pos);
                return;
            }
        }

        if let Some(node) = self.lookup.node_at(pos, &self.view, &self.config) {
            let on_header = self.lookup.header_at(pos, &self.view, &self.config) == Some(node);
            if on_header && self.is_double_click(node, time) {
                self.input.last_click = None;
                self.activate_node(node);
                return;
            }
            self.input.last_click = on_header.then_some((node, time));

            let mode = if toggle_mode(&modifiers) {
                SelectMode::Toggle
            } else {
                SelectMode::Keep
            };
            let mut selection = self.selection.clone();
            selection.apply(node, mode);
            self.set_selection(selection);

            if self.selection.contains(node) {
                let graph = self.graph();
                let initial = self
                    .selection
                    .iter()
                    .filter_map(|id| graph.node(id).map(|n| (id, n.position)))
                    .collect();
                self.state = InteractionState::Drag(DragState {
                    press: pos,
                    initial,
                    moved: false,
                    recorded: false,
                });
            }
            return;
        }

        self.input.last_click = None;
        self.state = InteractionState::BoxSelect(BoxSelectState {
            anchor: pos,
            current: pos,
            base: self.selection.clone(),
            toggle: modifiers.shift,
            moved: false,
        });
    }

    fn begin_pan(&mut self, pos: Pos2) {
        self.state = InteractionState::Pan(PanState {
            last: pos,
            initial_pan: self.view.pan,
        });
    }

    fn begin_connect(&mut self, socket: SocketId, origin: Pos2, pointer: Pos2) {
        let Some(direction) = self.graph().socket(socket).map(|s| s.direction) else {
            return;
        };
        self.state = InteractionState::Connect(ConnectState {
            socket,
            origin,
            from_output: direction == SocketDirection::Output,
            pointer,
            target: None,
            hint: ConnectHint::Neutral,
        });
    }

    fn is_double_click(&self, node: NodeId, time: f64) -> bool {
        self.input.last_click.is_some_and(|(last, at)| {
            last == node && time >= at && time - at <= self.config.double_click_window
        })
    }

    fn activate_node(&mut self, node: NodeId) {
        tracing::debug!("Activated node {:?}", node);
        self.events.publish(EditorEvent::NodeActivated(node));
        let has_subgraph = self
            .graph()
            .node(node)
            .is_some_and(|n| n.subgraph.is_some());
        if has_subgraph {
            self.open_subgraph(node);
        }
    }

    fn on_secondary_press(&mut self, pos: Pos2) {
        self.ensure_lookups();
        let target = if let Some(point) = self.lookup.point_at(pos, &self.view, &self.config) {
            ContextTarget::Point {
                socket: point.socket_id,
                index: point.index,
            }
        } else if let Some(socket) = self.lookup.socket_at(pos, &self.view, &self.config) {
            ContextTarget::Socket(socket)
        } else if let Some(node) = self.lookup.node_at(pos, &self.view, &self.config) {
            ContextTarget::Node(node)
        } else if let Some(connection) = self.lookup.connection_at(pos, self.config.hit_epsilon) {
            ContextTarget::Connection(connection)
        } else {
            ContextTarget::Background(self.view.world_to_grid(pos))
        };
        self.context_menu = Some((target, pos));
        self.events.publish(EditorEvent::ContextMenuRequested(target));
    }

    // ------------------------------------------------------------------
    // Move
    // ------------------------------------------------------------------

    fn on_pointer_moved(&mut self, pos: Pos2) {
        let state = std::mem::take(&mut self.state);
        self.state = match state {
            InteractionState::Idle => InteractionState::Idle,
            InteractionState::Pan(mut pan) => {
                self.pan_by(pos - pan.last);
                pan.last = pos;
                InteractionState::Pan(pan)
            }
            InteractionState::Connect(mut connect) => {
                connect.pointer = pos;
                connect.target = self.connect_target(pos, connect.socket);
                connect.hint = match connect.target {
                    None => ConnectHint::Neutral,
                    Some(target) if self.graph().can_connect(connect.socket, target) => {
                        ConnectHint::Valid
                    }
                    Some(_) => ConnectHint::Invalid,
                };
                InteractionState::Connect(connect)
            }
            InteractionState::Drag(mut drag) => {
                self.update_drag(&mut drag, pos);
                InteractionState::Drag(drag)
            }
            InteractionState::BoxSelect(mut band) => {
                self.update_box(&mut band, pos);
                InteractionState::BoxSelect(band)
            }
        };
    }

    fn connect_target(&mut self, pos: Pos2, source: SocketId) -> Option<SocketId> {
        self.ensure_lookups();
        self.lookup
            .point_at(pos, &self.view, &self.config)
            .map(|p| p.socket_id)
            .or_else(|| self.lookup.socket_at(pos, &self.view, &self.config))
            .filter(|s| *s != source)
    }

    fn update_drag(&mut self, drag: &mut DragState, pos: Pos2) {
        let delta = pos - drag.press;
        if !drag.moved {
            if delta.length() < self.config.drag_threshold {
                return;
            }
            drag.moved = true;
        }
        if !drag.recorded {
            drag.recorded = self.record_undo("Move nodes");
        }

        let grid_delta = self.view.world_delta_to_grid(delta);
        let moves: Vec<(NodeId, [f32; 2])> = drag
            .initial
            .iter()
            .map(|(id, start)| {
                (*id, self.snap([start[0] + grid_delta.x, start[1] + grid_delta.y]))
            })
            .collect();
        self.apply_positions(&moves);
    }

    /// Set node positions without a structural version bump, patching only
    /// the moved nodes' lookup entries
    fn apply_positions(&mut self, moves: &[(NodeId, [f32; 2])]) {
        self.ensure_lookups();
        let Some(graph) = self.active_graph_mut() else {
            return;
        };
        for (id, position) in moves {
            if let Some(node) = graph.node_mut(*id) {
                node.position = *position;
            }
        }
        graph.mark_dirty();
        self.mark_dirty();
        for (id, _) in moves {
            self.refresh_node(*id);
        }
    }

    fn update_box(&mut self, band: &mut BoxSelectState, pos: Pos2) {
        band.current = pos;
        if !band.moved && band.anchor.distance(pos) < self.config.drag_threshold {
            return;
        }
        band.moved = true;
        self.ensure_lookups();
        let contained = self.lookup.nodes_in_rect(band.rect());
        self.selection = if band.toggle {
            Selection::symmetric_difference(&band.base, &contained)
        } else {
            Selection::with_nodes(contained)
        };
    }

    // ------------------------------------------------------------------
    // Release
    // ------------------------------------------------------------------

    fn on_primary_release(&mut self, pos: Pos2) {
        let state = std::mem::take(&mut self.state);
        match state {
            InteractionState::Idle | InteractionState::Pan(_) => {}
            InteractionState::Drag(drag) => {
                if drag.moved {
                    tracing::debug!("Moved {} nodes", drag.initial.len());
                }
            }
            InteractionState::Connect(connect) => match self.connect_target(pos, connect.socket) {
                Some(target) => {
                    if let Err(e) = self.connect(connect.socket, target) {
                        tracing::debug!("Connection rejected: {}", e);
                    }
                }
                None => tracing::debug!("Connection abandoned"),
            },
            InteractionState::BoxSelect(mut band) => {
                self.update_box(&mut band, pos);
                if band.moved {
                    let merged = std::mem::replace(&mut self.selection, band.base);
                    self.set_selection(merged);
                } else {
                    self.selection = band.base;
                    self.select_graph();
                }
            }
        }
    }

    /// Abort the current gesture, undoing its speculative effects
    pub fn abort_gesture(&mut self) {
        let state = std::mem::take(&mut self.state);
        match state {
            InteractionState::Idle | InteractionState::Connect(_) => {}
            InteractionState::Drag(drag) => {
                if drag.moved {
                    self.apply_positions(&drag.initial);
                }
                if drag.recorded {
                    self.discard_undo();
                }
            }
            InteractionState::Pan(pan) => self.view.pan = pan.initial_pan,
            InteractionState::BoxSelect(band) => self.selection = band.base,
        }
    }

    // ------------------------------------------------------------------
    // Keyboard
    // ------------------------------------------------------------------

    fn on_key(&mut self, key: Key, pressed: bool, modifiers: Modifiers) {
        self.input.modifiers = modifiers;
        if key == Key::Space {
            self.input.space_held = pressed;
            return;
        }
        if !pressed {
            return;
        }
        if key == Key::Escape {
            self.abort_gesture();
            self.context_menu = None;
            return;
        }
        if !self.state.is_idle() {
            return;
        }

        let command = is_command(&modifiers);
        let at = self.grid_at(self.input.pointer);
        match key {
            Key::Delete | Key::Backspace => {
                self.delete_selection();
            }
            Key::C if command => {
                self.copy_selection();
            }
            Key::V if command => {
                self.paste_at(at);
            }
            Key::D if command => {
                self.duplicate_selection(at);
            }
            Key::A if command => self.select_all(),
            Key::Z if command && modifiers.shift => {
                self.redo();
            }
            Key::Z if command => {
                self.undo();
            }
            Key::Y if command => {
                self.redo();
            }
            Key::N if !command => {
                let type_id = self.config.default_node_type.clone();
                if let Err(e) = self.add_node(&type_id, at) {
                    tracing::debug!("Spawn failed: {}", e);
                }
            }
            _ => {}
        }
    }
}
