// SPDX-License-Identifier: MIT OR Apache-2.0
//! egui adapter for an [`EditorSession`].
//!
//! Translates egui input into [`InputEvent`]s and paints the active graph
//! from the session's lookup maps: grid, connections, nodes, anchor points,
//! the provisional connection line, the selection band and the context menu.
//! Node bodies are painted by [`NodeContentRenderer`]s keyed by type tag.

use crate::connection::ConnectionId;
use crate::events::ContextTarget;
use crate::graph::ReorderDirection;
use crate::interaction::{ConnectHint, InputEvent, InteractionState};
use crate::node::{Node, NodeId};
use crate::registry::SUBGRAPH_TYPE;
use crate::router::{self, TangentParams};
use crate::session::EditorSession;
use crate::socket::{SocketDirection, SocketId};
use egui::{Color32, Key, Modifiers, MouseWheelUnit, Pos2, Rect, Stroke, Vec2};
use indexmap::IndexMap;
use std::collections::HashMap;

const NODE_ROUNDING: f32 = 6.0;
const NODE_SHADOW_OFFSET: f32 = 3.0;
const SOCKET_LABEL_PADDING: f32 = 12.0;
const CONNECTION_THICKNESS: f32 = 2.5;
const CONNECTION_SEGMENTS: usize = 24;
/// Wheel points per zoom step
const POINTS_PER_STEP: f32 = 50.0;
/// Offset applied to nodes duplicated from the context menu
const DUPLICATE_OFFSET: [f32; 2] = [20.0, 20.0];

const COLOR_SELECTED: Color32 = Color32::from_rgb(100, 150, 255);
const COLOR_VALID: Color32 = Color32::from_rgb(110, 200, 120);
const COLOR_INVALID: Color32 = Color32::from_rgb(220, 80, 80);

/// Paints the body of a node below its socket rows
pub trait NodeContentRenderer {
    /// Paint into `body` (screen space). `zoom` is the current view zoom.
    fn paint(&self, painter: &egui::Painter, node: &Node, body: Rect, zoom: f32);
}

/// Fallback body: the node's type tag, faint
#[derive(Debug, Default)]
pub struct TypeLabelContent;

impl NodeContentRenderer for TypeLabelContent {
    fn paint(&self, painter: &egui::Painter, node: &Node, body: Rect, zoom: f32) {
        if body.height() < 10.0 * zoom {
            return;
        }
        painter.text(
            body.center(),
            egui::Align2::CENTER_CENTER,
            &node.type_id,
            egui::FontId::proportional(10.0 * zoom),
            Color32::from_gray(110),
        );
    }
}

/// Subgraph body: size of the inner graph
#[derive(Debug, Default)]
pub struct SubgraphSummaryContent;

impl NodeContentRenderer for SubgraphSummaryContent {
    fn paint(&self, painter: &egui::Painter, node: &Node, body: Rect, zoom: f32) {
        let Some(subgraph) = &node.subgraph else {
            return;
        };
        painter.text(
            body.center(),
            egui::Align2::CENTER_CENTER,
            format!("{} nodes", subgraph.node_count()),
            egui::FontId::proportional(10.0 * zoom),
            Color32::from_gray(150),
        );
    }
}

/// Body renderers keyed by node type tag
pub struct ContentRenderers {
    by_type: HashMap<String, Box<dyn NodeContentRenderer>>,
    fallback: Box<dyn NodeContentRenderer>,
}

impl ContentRenderers {
    /// Registry with the built-in subgraph summary and type-label fallback
    pub fn new() -> Self {
        let mut renderers = Self {
            by_type: HashMap::new(),
            fallback: Box::new(TypeLabelContent),
        };
        renderers.register(SUBGRAPH_TYPE, SubgraphSummaryContent);
        renderers
    }

    /// Register a renderer for a type tag, replacing any previous one
    pub fn register(&mut self, type_id: impl Into<String>, renderer: impl NodeContentRenderer + 'static) {
        self.by_type.insert(type_id.into(), Box::new(renderer));
    }

    /// Replace the fallback renderer
    pub fn set_fallback(&mut self, renderer: impl NodeContentRenderer + 'static) {
        self.fallback = Box::new(renderer);
    }

    /// Whether a dedicated renderer exists for `type_id`
    pub fn has(&self, type_id: &str) -> bool {
        self.by_type.contains_key(type_id)
    }

    /// Renderer for `type_id`, or the fallback
    pub fn get(&self, type_id: &str) -> &dyn NodeContentRenderer {
        self.by_type
            .get(type_id)
            .map_or(self.fallback.as_ref(), AsRef::as_ref)
    }
}

impl Default for ContentRenderers {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContentRenderers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentRenderers")
            .field("types", &self.by_type.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Wheel delta to zoom steps
pub fn scroll_steps(unit: MouseWheelUnit, delta: Vec2) -> f32 {
    match unit {
        MouseWheelUnit::Point => delta.y / POINTS_PER_STEP,
        MouseWheelUnit::Line | MouseWheelUnit::Page => delta.y.signum() * delta.y.abs().min(3.0),
    }
}

/// Translate one egui event into canvas-local input. `origin` is the
/// canvas' top-left corner in screen space.
pub fn translate_event(event: &egui::Event, origin: Pos2, modifiers: Modifiers, time: f64) -> Option<InputEvent> {
    let local = |pos: Pos2| pos - origin.to_vec2();
    match event {
        egui::Event::PointerMoved(pos) => Some(InputEvent::PointerMoved {
            pos: local(*pos),
            modifiers,
        }),
        egui::Event::PointerButton {
            pos,
            button,
            pressed: true,
            modifiers,
        } => Some(InputEvent::PointerPressed {
            pos: local(*pos),
            button: *button,
            modifiers: *modifiers,
            time,
        }),
        egui::Event::PointerButton {
            pos,
            button,
            pressed: false,
            modifiers,
        } => Some(InputEvent::PointerReleased {
            pos: local(*pos),
            button: *button,
            modifiers: *modifiers,
        }),
        egui::Event::MouseWheel { unit, delta, .. } => {
            let steps = scroll_steps(*unit, *delta);
            (steps != 0.0).then_some(InputEvent::Scroll { pos: Pos2::ZERO, steps })
        }
        egui::Event::Key {
            key,
            pressed,
            modifiers,
            ..
        } => Some(InputEvent::Key {
            key: *key,
            pressed: *pressed,
            modifiers: *modifiers,
        }),
        egui::Event::Copy => Some(command_key(Key::C)),
        egui::Event::Paste(_) => Some(command_key(Key::V)),
        _ => None,
    }
}

fn command_key(key: Key) -> InputEvent {
    InputEvent::Key {
        key,
        pressed: true,
        modifiers: Modifiers::COMMAND,
    }
}

/// Context menu commands, applied after the menu closes
#[derive(Debug, Clone, PartialEq)]
enum MenuAction {
    AddNode(String, [f32; 2]),
    Paste([f32; 2]),
    SelectAll,
    OpenSubgraph(NodeId),
    Copy(NodeId),
    Duplicate(NodeId),
    Delete(NodeId),
    DisconnectSocket(SocketId),
    RemoveSocket(SocketId),
    Reorder(SocketId, ReorderDirection),
    DisconnectPoint(SocketId, usize),
    Disconnect(ConnectionId),
}

/// Interactive canvas widget
#[derive(Debug)]
pub struct GraphCanvas {
    /// Node body renderers
    pub renderers: ContentRenderers,
    /// Paint the background grid
    pub show_grid: bool,
    /// Paint the status line
    pub show_status: bool,
    menu_rect: Option<Rect>,
}

impl Default for GraphCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphCanvas {
    /// Canvas with the default renderers
    pub fn new() -> Self {
        Self {
            renderers: ContentRenderers::new(),
            show_grid: true,
            show_status: true,
            menu_rect: None,
        }
    }

    /// Run one frame: feed input, advance deferred work, paint
    pub fn ui(&mut self, ui: &mut egui::Ui, session: &mut EditorSession) {
        let rect = ui.available_rect_before_wrap();
        let response = ui.allocate_rect(rect, egui::Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        session.set_viewport(rect.size());
        session.tick();

        for event in self.collect_input(ui, &response, rect, session) {
            session.handle_input(event);
        }
        session.ensure_lookups();

        if self.show_grid {
            draw_grid(&painter, rect, session);
        }
        draw_connections(&painter, rect, session);
        if let InteractionState::Connect(connect) = session.state() {
            let zoom = session.view().zoom();
            let params = TangentParams {
                factor: session.config().tangent_factor,
                min_length: session.config().min_tangent * zoom,
            };
            let route = router::provisional(connect.origin, connect.from_output, connect.pointer, params);
            let color = match connect.hint {
                ConnectHint::Neutral => Color32::from_gray(200),
                ConnectHint::Valid => COLOR_VALID,
                ConnectHint::Invalid => COLOR_INVALID,
            };
            let offset = rect.min.to_vec2();
            let points = route.sample(CONNECTION_SEGMENTS).into_iter().map(|p| p + offset).collect();
            painter.add(egui::Shape::line(points, Stroke::new(CONNECTION_THICKNESS, color)));
        }
        self.draw_nodes(&painter, rect, session);
        if let InteractionState::BoxSelect(band) = session.state() {
            if band.moved {
                let band_rect = band.rect().translate(rect.min.to_vec2());
                painter.rect_filled(band_rect, 0.0, Color32::from_rgba_unmultiplied(100, 150, 255, 30));
                painter.rect_stroke(band_rect, 0.0, Stroke::new(1.0, COLOR_SELECTED));
            }
        }
        if self.show_status {
            draw_status_bar(ui, rect, session);
        }
        self.context_menu_ui(ui, rect, session);
    }

    fn collect_input(
        &self,
        ui: &egui::Ui,
        response: &egui::Response,
        rect: Rect,
        session: &EditorSession,
    ) -> Vec<InputEvent> {
        let hovered = response.hovered() || ui.rect_contains_pointer(rect);
        let active = !session.state().is_idle();
        let keyboard = (hovered || active) && !ui.ctx().wants_keyboard_input();

        // egui-winit may report clipboard shortcuts both as keys and as
        // clipboard events
        let events: Vec<InputEvent> = ui.input(|i| {
            let has_key = |wanted: Key| {
                i.events.iter().any(|e| {
                    matches!(e, egui::Event::Key { key, pressed: true, modifiers, .. } if *key == wanted && modifiers.command)
                })
            };
            let (copy_key, paste_key) = (has_key(Key::C), has_key(Key::V));
            i.events
                .iter()
                .filter(|e| match e {
                    egui::Event::Copy => !copy_key,
                    egui::Event::Paste(_) => !paste_key,
                    _ => true,
                })
                .filter_map(|e| translate_event(e, rect.min, i.modifiers, i.time))
                .collect()
        });

        let pointer = session.pointer();
        let local_rect = Rect::from_min_size(Pos2::ZERO, rect.size());
        let menu_rect = self.menu_rect.map(|r| r.translate(-rect.min.to_vec2()));
        events
            .into_iter()
            .filter_map(|event| match event {
                InputEvent::PointerPressed { pos, .. } => {
                    let in_menu = menu_rect.is_some_and(|r| r.contains(pos));
                    (local_rect.contains(pos) && !in_menu).then_some(event)
                }
                InputEvent::Scroll { steps, .. } => {
                    hovered.then_some(InputEvent::Scroll { pos: pointer, steps })
                }
                InputEvent::Key { .. } => keyboard.then_some(event),
                _ => Some(event),
            })
            .collect()
    }

    fn draw_nodes(&self, painter: &egui::Painter, rect: Rect, session: &EditorSession) {
        let zoom = session.view().zoom();
        let config = session.config();
        let lookup = session.lookup();
        let offset = rect.min.to_vec2();
        let show_points = zoom >= config.point_zoom_threshold;

        // Index 0 is topmost, so paint back to front
        for node in session.graph().nodes().rev() {
            let Some(entry) = lookup.node(node.id) else {
                continue;
            };
            let screen_rect = entry.rect.translate(offset);
            if !screen_rect.intersects(rect) {
                continue;
            }
            let rounding = NODE_ROUNDING * zoom;
            let selected = session.selection().contains(node.id);

            painter.rect_filled(
                screen_rect.translate(Vec2::splat(NODE_SHADOW_OFFSET)),
                rounding,
                Color32::from_rgba_unmultiplied(0, 0, 0, 60),
            );
            let bg_color = if selected {
                Color32::from_rgb(60, 70, 90)
            } else {
                Color32::from_rgb(45, 45, 48)
            };
            painter.rect_filled(screen_rect, rounding, bg_color);

            let header_rect = entry.header.translate(offset);
            let header_color = if node.errors.any() {
                Color32::from_rgb(150, 60, 60)
            } else if node.is_protected() {
                Color32::from_rgb(90, 110, 80)
            } else {
                Color32::from_rgb(70, 100, 130)
            };
            painter.rect_filled(
                header_rect,
                egui::Rounding {
                    nw: rounding,
                    ne: rounding,
                    sw: 0.0,
                    se: 0.0,
                },
                header_color,
            );
            painter.text(
                header_rect.center(),
                egui::Align2::CENTER_CENTER,
                &node.name,
                egui::FontId::proportional(12.0 * zoom),
                Color32::WHITE,
            );

            let mut rows_bottom = header_rect.bottom();
            for socket in node.sockets() {
                let Some(socket_entry) = lookup.socket(socket.id) else {
                    continue;
                };
                let row = socket_entry.rect.translate(offset);
                rows_bottom = rows_bottom.max(row.bottom());
                let (anchor, align, dx) = match socket.direction {
                    SocketDirection::Input => (row.left_center(), egui::Align2::LEFT_CENTER, SOCKET_LABEL_PADDING),
                    SocketDirection::Output => (row.right_center(), egui::Align2::RIGHT_CENTER, -SOCKET_LABEL_PADDING),
                };
                painter.text(
                    anchor + Vec2::new(dx * zoom, 0.0),
                    align,
                    &socket.name,
                    egui::FontId::proportional(10.0 * zoom),
                    Color32::from_gray(200),
                );

                if show_points {
                    let [r, g, b] = socket.socket_type.color();
                    let color = Color32::from_rgb(r, g, b);
                    let radius = crate::lookup::POINT_RADIUS * zoom;
                    let hover = session.pointer();
                    for point in lookup.points(socket.id) {
                        let pos = point.position + offset;
                        let hovered = point.position.distance(hover) <= radius;
                        let radius = if hovered { radius * 1.3 } else { radius };
                        if socket.is_connected() {
                            painter.circle_filled(pos, radius, color);
                        }
                        painter.circle_stroke(pos, radius, Stroke::new(1.5, color));
                    }
                }
            }

            let body = Rect::from_min_max(Pos2::new(screen_rect.left(), rows_bottom), screen_rect.max);
            self.renderers.get(&node.type_id).paint(painter, node, body, zoom);

            if selected {
                painter.rect_stroke(screen_rect, rounding, Stroke::new(2.0, COLOR_SELECTED));
            }
        }
    }

    fn context_menu_ui(&mut self, ui: &egui::Ui, rect: Rect, session: &mut EditorSession) {
        let Some((target, pos)) = session.context_menu().copied() else {
            self.menu_rect = None;
            return;
        };

        let mut action = None;
        let area = egui::Area::new(egui::Id::new("flowgraph_context_menu"))
            .fixed_pos(pos + rect.min.to_vec2())
            .order(egui::Order::Foreground)
            .show(ui.ctx(), |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.set_min_width(140.0);
                    action = menu_items(ui, session, target);
                });
            });
        self.menu_rect = Some(area.response.rect);

        if let Some(action) = action {
            session.take_context_menu();
            self.menu_rect = None;
            apply_menu_action(session, action);
        }
    }
}

fn menu_items(ui: &mut egui::Ui, session: &EditorSession, target: ContextTarget) -> Option<MenuAction> {
    let mut action = None;
    match target {
        ContextTarget::Background(grid) => {
            let grid = session.grid_at(session.view().grid_to_world(grid));
            let mut categories: IndexMap<String, Vec<(String, String)>> = IndexMap::new();
            for entry in session.registry().menu_entries() {
                let (category, label) = entry
                    .path
                    .rsplit_once('/')
                    .map_or((String::new(), entry.path.clone()), |(c, l)| (c.to_string(), l.to_string()));
                categories.entry(category).or_default().push((label, entry.type_id));
            }
            for (category, entries) in categories {
                if category.is_empty() {
                    for (label, type_id) in entries {
                        if ui.button(label).clicked() {
                            action = Some(MenuAction::AddNode(type_id, grid));
                        }
                    }
                } else {
                    ui.menu_button(category, |ui| {
                        for (label, type_id) in entries {
                            if ui.button(label).clicked() {
                                action = Some(MenuAction::AddNode(type_id, grid));
                            }
                        }
                    });
                }
            }
            ui.separator();
            if ui
                .add_enabled(!session.clipboard().is_empty(), egui::Button::new("Paste"))
                .clicked()
            {
                action = Some(MenuAction::Paste(grid));
            }
            if ui.button("Select all").clicked() {
                action = Some(MenuAction::SelectAll);
            }
        }
        ContextTarget::Node(id) => {
            let Some(node) = session.graph().node(id) else {
                return None;
            };
            if node.subgraph.is_some() && ui.button("Open subgraph").clicked() {
                action = Some(MenuAction::OpenSubgraph(id));
            }
            if ui.add_enabled(!node.is_protected(), egui::Button::new("Copy")).clicked() {
                action = Some(MenuAction::Copy(id));
            }
            if ui.add_enabled(!node.is_protected(), egui::Button::new("Duplicate")).clicked() {
                action = Some(MenuAction::Duplicate(id));
            }
            if ui.add_enabled(node.can_delete(), egui::Button::new("Delete")).clicked() {
                action = Some(MenuAction::Delete(id));
            }
        }
        ContextTarget::Socket(id) => {
            let Some(socket) = session.graph().socket(id) else {
                return None;
            };
            if ui.add_enabled(socket.is_connected(), egui::Button::new("Disconnect all")).clicked() {
                action = Some(MenuAction::DisconnectSocket(id));
            }
            if socket.reorderable {
                if ui.button("Move up").clicked() {
                    action = Some(MenuAction::Reorder(id, ReorderDirection::Up));
                }
                if ui.button("Move down").clicked() {
                    action = Some(MenuAction::Reorder(id, ReorderDirection::Down));
                }
            }
            if ui.add_enabled(socket.deletable, egui::Button::new("Remove socket")).clicked() {
                action = Some(MenuAction::RemoveSocket(id));
            }
        }
        ContextTarget::Point { socket, index } => {
            if ui.button("Disconnect").clicked() {
                action = Some(MenuAction::DisconnectPoint(socket, index));
            }
        }
        ContextTarget::Connection(id) => {
            if ui.button("Disconnect").clicked() {
                action = Some(MenuAction::Disconnect(id));
            }
        }
    }
    action
}

fn apply_menu_action(session: &mut EditorSession, action: MenuAction) {
    tracing::debug!("Context menu action {:?}", action);
    match action {
        MenuAction::AddNode(type_id, grid) => {
            if let Ok(id) = session.add_node(&type_id, grid) {
                session.select([id]);
            }
        }
        MenuAction::Paste(grid) => {
            session.paste_at(grid);
        }
        MenuAction::SelectAll => session.select_all(),
        MenuAction::OpenSubgraph(id) => {
            session.open_subgraph(id);
        }
        MenuAction::Copy(id) => {
            session.select([id]);
            session.copy_selection();
        }
        MenuAction::Duplicate(id) => {
            let Some(position) = session.graph().node(id).map(|n| n.position) else {
                return;
            };
            session.select([id]);
            session.duplicate_selection([position[0] + DUPLICATE_OFFSET[0], position[1] + DUPLICATE_OFFSET[1]]);
        }
        MenuAction::Delete(id) => {
            session.remove_nodes(&[id]);
        }
        MenuAction::DisconnectSocket(id) => {
            session.disconnect_socket(id);
        }
        MenuAction::RemoveSocket(id) => {
            session.remove_socket(id);
        }
        MenuAction::Reorder(id, direction) => {
            session.reorder_socket(id, direction);
        }
        MenuAction::DisconnectPoint(socket, index) => {
            session.ensure_lookups();
            let ids = session
                .lookup()
                .point(socket, index)
                .map(|p| session.lookup().connections_at_point(p))
                .unwrap_or_default();
            session.disconnect_connections(&ids);
        }
        MenuAction::Disconnect(id) => {
            session.disconnect(id);
        }
    }
}

fn draw_grid(painter: &egui::Painter, rect: Rect, session: &EditorSession) {
    let view = session.view();
    let spacing = session.config().grid_cell * 2.0 * view.zoom();
    if spacing < 4.0 {
        return;
    }
    let major_spacing = spacing * 5.0;
    let grid_color_minor = Color32::from_rgba_unmultiplied(60, 60, 60, 100);
    let grid_color_major = Color32::from_rgba_unmultiplied(80, 80, 80, 150);
    let origin = view.grid_to_world(Pos2::ZERO) + rect.min.to_vec2();

    for (step, color) in [(spacing, grid_color_minor), (major_spacing, grid_color_major)] {
        let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
        while x < rect.right() {
            painter.line_segment(
                [Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())],
                Stroke::new(1.0, color),
            );
            x += step;
        }
        let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
        while y < rect.bottom() {
            painter.line_segment(
                [Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)],
                Stroke::new(1.0, color),
            );
            y += step;
        }
    }

    if rect.contains(origin) {
        let axis = Stroke::new(2.0, Color32::from_rgba_unmultiplied(100, 100, 150, 180));
        painter.line_segment([Pos2::new(origin.x, rect.top()), Pos2::new(origin.x, rect.bottom())], axis);
        painter.line_segment([Pos2::new(rect.left(), origin.y), Pos2::new(rect.right(), origin.y)], axis);
    }
}

fn draw_connections(painter: &egui::Painter, rect: Rect, session: &EditorSession) {
    let lookup = session.lookup();
    let offset = rect.min.to_vec2();
    let touches_selection = |socket: SocketId| {
        lookup
            .socket(socket)
            .is_some_and(|s| session.selection().contains(s.node_id))
    };

    for connection in lookup.connections() {
        if !connection.route.bounds().translate(offset).intersects(rect) {
            continue;
        }
        let color = if touches_selection(connection.output_socket) || touches_selection(connection.input_socket) {
            COLOR_SELECTED
        } else {
            session
                .graph()
                .socket(connection.output_socket)
                .map_or(Color32::from_gray(180), |socket| {
                    let [r, g, b] = socket.socket_type.color();
                    Color32::from_rgb(r, g, b)
                })
        };
        let points = connection
            .route
            .sample(CONNECTION_SEGMENTS)
            .into_iter()
            .map(|p| p + offset)
            .collect();
        painter.add(egui::Shape::line(points, Stroke::new(CONNECTION_THICKNESS, color)));
    }
}

fn draw_status_bar(ui: &egui::Ui, rect: Rect, session: &EditorSession) {
    let graph = session.graph();
    ui.painter().text(
        Pos2::new(rect.left() + 5.0, rect.bottom() - 11.0),
        egui::Align2::LEFT_CENTER,
        format!(
            "{} | Nodes: {} | Connections: {} | Zoom: {:.0}% | Selected: {} | {}",
            session.tabs().breadcrumb().join(" > "),
            graph.node_count(),
            graph.connection_count(),
            session.view().zoom() * 100.0,
            session.selection().len(),
            session.state().name(),
        ),
        egui::FontId::proportional(11.0),
        Color32::from_gray(150),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::graph::Graph;
    use crate::registry::{create_flow_registry, STATE_TYPE};
    use egui::PointerButton;

    #[test]
    fn test_translate_pointer_is_canvas_local() {
        let origin = Pos2::new(100.0, 50.0);
        let event = egui::Event::PointerButton {
            pos: Pos2::new(130.0, 70.0),
            button: PointerButton::Primary,
            pressed: true,
            modifiers: Modifiers::SHIFT,
        };
        assert_eq!(
            translate_event(&event, origin, Modifiers::NONE, 2.5),
            Some(InputEvent::PointerPressed {
                pos: Pos2::new(30.0, 20.0),
                button: PointerButton::Primary,
                modifiers: Modifiers::SHIFT,
                time: 2.5,
            })
        );
        assert_eq!(
            translate_event(&egui::Event::PointerMoved(Pos2::new(100.0, 50.0)), origin, Modifiers::NONE, 0.0),
            Some(InputEvent::PointerMoved {
                pos: Pos2::ZERO,
                modifiers: Modifiers::NONE,
            })
        );
    }

    #[test]
    fn test_translate_clipboard_events() {
        assert!(matches!(
            translate_event(&egui::Event::Copy, Pos2::ZERO, Modifiers::NONE, 0.0),
            Some(InputEvent::Key { key: Key::C, pressed: true, .. })
        ));
        assert!(matches!(
            translate_event(&egui::Event::Paste(String::new()), Pos2::ZERO, Modifiers::NONE, 0.0),
            Some(InputEvent::Key { key: Key::V, pressed: true, .. })
        ));
        assert_eq!(
            translate_event(&egui::Event::PointerGone, Pos2::ZERO, Modifiers::NONE, 0.0),
            None
        );
    }

    #[test]
    fn test_scroll_steps() {
        assert_eq!(scroll_steps(MouseWheelUnit::Point, Vec2::new(0.0, 100.0)), 2.0);
        assert_eq!(scroll_steps(MouseWheelUnit::Line, Vec2::new(0.0, -1.0)), -1.0);
        assert_eq!(scroll_steps(MouseWheelUnit::Line, Vec2::new(0.0, 10.0)), 3.0);
        assert_eq!(scroll_steps(MouseWheelUnit::Point, Vec2::ZERO), 0.0);
    }

    #[test]
    fn test_renderer_fallback() {
        struct Blank;
        impl NodeContentRenderer for Blank {
            fn paint(&self, _: &egui::Painter, _: &Node, _: Rect, _: f32) {}
        }

        let mut renderers = ContentRenderers::new();
        assert!(renderers.has(SUBGRAPH_TYPE));
        assert!(!renderers.has(STATE_TYPE));
        renderers.register(STATE_TYPE, Blank);
        assert!(renderers.has(STATE_TYPE));
    }

    #[test]
    fn test_menu_actions_apply_to_session() {
        let mut session = EditorSession::new(
            Graph::with_entry_nodes("Flow"),
            EditorConfig::default(),
            create_flow_registry(),
        );
        apply_menu_action(&mut session, MenuAction::AddNode(STATE_TYPE.to_string(), [40.0, 40.0]));
        assert_eq!(session.graph().node_count(), 2);
        let id = session.selection().to_vec()[0];

        apply_menu_action(&mut session, MenuAction::Duplicate(id));
        assert_eq!(session.graph().node_count(), 3);
        let copy = session.selection().to_vec()[0];
        assert_eq!(session.graph().node(copy).unwrap().position, [60.0, 60.0]);

        apply_menu_action(&mut session, MenuAction::Delete(id));
        assert_eq!(session.graph().node_count(), 2);
    }
}
