// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end editing scenarios driven through `EditorSession`.

use std::collections::HashSet;

use egui::{Key, Modifiers, PointerButton, Pos2};
use flowgraph_editor_graph::registry::{BRANCH_TYPE, STATE_TYPE, SUBGRAPH_TYPE};
use flowgraph_editor_graph::{
    create_flow_registry, ConnectionError, EditorConfig, EditorSession, Graph, InputEvent, NodeId,
    NodeKind, ReorderDirection, SocketId,
};

fn session_with(config: EditorConfig) -> EditorSession {
    EditorSession::new(Graph::with_entry_nodes("Flow"), config, create_flow_registry())
}

fn session() -> EditorSession {
    session_with(EditorConfig::default())
}

fn output(session: &EditorSession, node: NodeId) -> SocketId {
    session.graph().node(node).unwrap().outputs[0].id
}

fn input(session: &EditorSession, node: NodeId) -> SocketId {
    session.graph().node(node).unwrap().inputs[0].id
}

fn socket_connections(session: &EditorSession, socket: SocketId) -> usize {
    session.graph().socket(socket).unwrap().connections.len()
}

fn press(session: &mut EditorSession, pos: Pos2, modifiers: Modifiers) {
    session.handle_input(InputEvent::PointerPressed {
        pos,
        button: PointerButton::Primary,
        modifiers,
        time: 0.0,
    });
}

fn move_to(session: &mut EditorSession, pos: Pos2) {
    session.handle_input(InputEvent::PointerMoved {
        pos,
        modifiers: Modifiers::NONE,
    });
}

fn escape(session: &mut EditorSession) {
    session.handle_input(InputEvent::Key {
        key: Key::Escape,
        pressed: true,
        modifiers: Modifiers::NONE,
    });
}

fn drag_to(session: &mut EditorSession, pos: Pos2) {
    session.handle_input(InputEvent::PointerMoved {
        pos,
        modifiers: Modifiers::NONE,
    });
    session.handle_input(InputEvent::PointerReleased {
        pos,
        button: PointerButton::Primary,
        modifiers: Modifiers::NONE,
    });
}

#[test]
fn test_connect_twice_is_rejected_noop() {
    let mut session = session();
    let a = session.add_node(STATE_TYPE, [200.0, 200.0]).unwrap();
    let b = session.add_node(STATE_TYPE, [500.0, 200.0]).unwrap();
    let (out, inp) = (output(&session, a), input(&session, b));

    let id = session.connect(out, inp).unwrap();
    assert_eq!(socket_connections(&session, out), 1);
    assert_eq!(socket_connections(&session, inp), 1);
    assert!(session.graph().socket(out).unwrap().connections.contains(&id));
    assert!(session.graph().socket(inp).unwrap().connections.contains(&id));

    let undo_depth = session.history().undo_label().map(str::to_string);
    assert_eq!(session.connect(inp, out), Err(ConnectionError::AlreadyConnected));
    assert_eq!(session.graph().connection_count(), 1);
    assert_eq!(socket_connections(&session, out), 1);
    assert_eq!(socket_connections(&session, inp), 1);
    assert_eq!(session.history().undo_label().map(str::to_string), undo_depth);
}

#[test]
fn test_drag_at_zoom_two_moves_by_half_delta() {
    let mut config = EditorConfig::default();
    config.snap_to_grid = false;
    let mut session = session_with(config);
    let a = session.add_node(STATE_TYPE, [100.0, 100.0]).unwrap();
    let b = session.add_node(STATE_TYPE, [400.0, 100.0]).unwrap();
    session.zoom_at(Pos2::ZERO, 10.0);
    assert_eq!(session.view().zoom(), 2.0);

    session.select([a, b]);
    // A's header spans world y 200..248 at this zoom
    press(&mut session, Pos2::new(300.0, 210.0), Modifiers::NONE);
    drag_to(&mut session, Pos2::new(350.0, 260.0));

    assert_eq!(session.graph().node(a).unwrap().position, [125.0, 125.0]);
    assert_eq!(session.graph().node(b).unwrap().position, [425.0, 125.0]);
    assert_eq!(session.history().undo_label(), Some("Move nodes"));

    session.undo();
    assert_eq!(session.graph().node(a).unwrap().position, [100.0, 100.0]);
}

#[test]
fn test_shift_box_select_is_symmetric_difference() {
    let mut session = session();
    let a = session.add_node(STATE_TYPE, [200.0, 200.0]).unwrap();
    let b = session.add_node(STATE_TYPE, [200.0, 400.0]).unwrap();
    let c = session.add_node(STATE_TYPE, [500.0, 200.0]).unwrap();
    session.select([a]);

    press(&mut session, Pos2::new(150.0, 150.0), Modifiers::SHIFT);
    drag_to(&mut session, Pos2::new(720.0, 300.0));

    assert_eq!(session.selection().to_vec(), vec![c]);
    assert!(!session.selection().contains(b));
}

#[test]
fn test_undo_redo_connect() {
    let mut session = session();
    let a = session.add_node(STATE_TYPE, [200.0, 200.0]).unwrap();
    let b = session.add_node(STATE_TYPE, [500.0, 200.0]).unwrap();
    session.connect(output(&session, a), input(&session, b)).unwrap();

    assert!(session.undo());
    assert_eq!(session.graph().connection_count(), 0);
    assert_eq!(socket_connections(&session, output(&session, a)), 0);

    assert!(session.redo());
    assert_eq!(session.graph().connection_count(), 1);
    assert_eq!(socket_connections(&session, output(&session, a)), 1);
    assert_eq!(socket_connections(&session, input(&session, b)), 1);
}

#[test]
fn test_override_socket_never_exceeds_one_connection() {
    let mut session = session();
    let a = session.add_node(STATE_TYPE, [0.0, 200.0]).unwrap();
    let targets: Vec<NodeId> = (0..4)
        .map(|i| session.add_node(STATE_TYPE, [300.0, 100.0 * i as f32]).unwrap())
        .collect();
    let out = output(&session, a);

    for target in targets.iter().chain(targets.iter().rev()) {
        let _ = session.connect(out, input(&session, *target));
        assert!(socket_connections(&session, out) <= 1);
    }
    assert_eq!(session.graph().connection_count(), 1);

    // Multiple inputs accumulate
    let sink = targets[0];
    for source in &targets[1..] {
        session.connect(output(&session, *source), input(&session, sink)).unwrap();
    }
    assert_eq!(socket_connections(&session, input(&session, sink)), 4);
    assert_eq!(socket_connections(&session, out), 1);
}

#[test]
fn test_paste_is_isomorphic_and_disjoint() {
    let mut session = session();
    let a = session.add_node(STATE_TYPE, [100.0, 100.0]).unwrap();
    let b = session.add_node(STATE_TYPE, [400.0, 100.0]).unwrap();
    let c = session.add_node(STATE_TYPE, [700.0, 100.0]).unwrap();
    let outside = session.add_node(STATE_TYPE, [1000.0, 100.0]).unwrap();
    session.connect(output(&session, a), input(&session, b)).unwrap();
    session.connect(output(&session, b), input(&session, c)).unwrap();
    session.connect(output(&session, c), input(&session, outside)).unwrap();

    session.select([a, b, c]);
    assert_eq!(session.copy_selection(), 3);
    let pasted = session.paste_at([100.0, 600.0]);
    assert_eq!(pasted.len(), 3);

    let originals: HashSet<NodeId> = [a, b, c, outside].into_iter().collect();
    let original_sockets: HashSet<SocketId> = [a, b, c, outside]
        .iter()
        .flat_map(|id| session.graph().node(*id).unwrap().sockets().map(|s| s.id).collect::<Vec<_>>())
        .collect();
    let graph = session.graph();

    let mut copies: Vec<_> = pasted.iter().map(|id| graph.node(*id).unwrap()).collect();
    copies.sort_by(|x, y| x.position[0].total_cmp(&y.position[0]));
    assert_eq!(
        copies.iter().map(|n| n.position).collect::<Vec<_>>(),
        vec![[100.0, 600.0], [400.0, 600.0], [700.0, 600.0]]
    );
    for node in &copies {
        assert!(!originals.contains(&node.id));
        for socket in node.sockets() {
            assert!(!original_sockets.contains(&socket.id));
            assert_eq!(socket.node_id, node.id);
        }
    }

    let pasted_set: HashSet<NodeId> = pasted.iter().copied().collect();
    let internal: Vec<_> = graph
        .connections()
        .filter(|c| pasted_set.contains(&c.output_node) || pasted_set.contains(&c.input_node))
        .collect();
    assert_eq!(internal.len(), 2);
    for connection in &internal {
        assert!(pasted_set.contains(&connection.output_node));
        assert!(pasted_set.contains(&connection.input_node));
    }
    assert!(graph.are_connected(copies[0].outputs[0].id, copies[1].inputs[0].id));
    assert!(graph.are_connected(copies[1].outputs[0].id, copies[2].inputs[0].id));
    assert!(copies[2].outputs[0].connections.is_empty());
    assert_eq!(graph.connection_count(), 5);
}

#[test]
fn test_zoom_stays_clamped_and_rounded() {
    let mut session = session();
    let config = session.config().clone();
    for steps in [3.0, 7.5, -0.37, 40.0, -100.0, 0.123, 12.0, -1.01] {
        session.handle_input(InputEvent::Scroll {
            pos: Pos2::new(123.0, 45.0),
            steps,
        });
        let zoom = session.view().zoom();
        assert!(zoom >= config.min_zoom && zoom <= config.max_zoom, "zoom {zoom}");
        assert_eq!(zoom, (zoom * 100.0).round() / 100.0);
    }
}

#[test]
fn test_soft_delete_of_entry_nodes_is_noop() {
    let mut session = session();
    let start = session
        .graph()
        .nodes()
        .find(|n| n.kind == NodeKind::Start)
        .map(|n| n.id)
        .unwrap();
    assert_eq!(session.remove_nodes(&[start]), 0);
    assert!(session.graph().contains_node(start));
    assert!(!session.can_undo());

    let sub = session.add_node(SUBGRAPH_TYPE, [300.0, 0.0]).unwrap();
    assert!(session.open_subgraph(sub));
    let entries: Vec<NodeId> = session.graph().node_ids().collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(session.remove_nodes(&entries), 0);
    assert_eq!(session.graph().node_count(), 2);
}

#[test]
fn test_disconnect_socket_is_idempotent() {
    let mut session = session();
    let a = session.add_node(STATE_TYPE, [200.0, 200.0]).unwrap();
    let b = session.add_node(STATE_TYPE, [500.0, 200.0]).unwrap();
    let out = output(&session, a);
    session.connect(out, input(&session, b)).unwrap();

    assert_eq!(session.disconnect_socket(out), 1);
    let label = session.history().undo_label().map(str::to_string);
    assert_eq!(session.disconnect_socket(out), 0);
    assert_eq!(session.graph().connection_count(), 0);
    assert_eq!(socket_connections(&session, input(&session, b)), 0);
    assert_eq!(session.history().undo_label().map(str::to_string), label);
}

#[test]
fn test_escape_during_connect_leaves_no_trace() {
    let mut session = session();
    let a = session.add_node(STATE_TYPE, [200.0, 200.0]).unwrap();
    let b = session.add_node(STATE_TYPE, [500.0, 200.0]).unwrap();
    let label = session.history().undo_label().map(str::to_string);

    // A's output anchor
    press(&mut session, Pos2::new(380.0, 235.0), Modifiers::NONE);
    assert_eq!(session.state().name(), "Connect");
    move_to(&mut session, Pos2::new(502.0, 236.0));
    escape(&mut session);
    assert!(session.state().is_idle());

    drag_to(&mut session, Pos2::new(502.0, 236.0));
    assert_eq!(session.graph().connection_count(), 0);
    assert_eq!(socket_connections(&session, output(&session, a)), 0);
    assert_eq!(socket_connections(&session, input(&session, b)), 0);
    assert_eq!(session.history().undo_label().map(str::to_string), label);
}

#[test]
fn test_rejected_mutations_keep_redo_history() {
    let mut session = session();
    let a = session.add_node(STATE_TYPE, [200.0, 200.0]).unwrap();
    let b = session.add_node(BRANCH_TYPE, [500.0, 200.0]).unwrap();
    assert!(session.undo());
    assert!(session.can_redo());
    let undo = session.history().undo_label().map(str::to_string);
    let redo = session.history().redo_label().map(str::to_string);
    assert!(!session.graph().contains_node(b));

    let inp = input(&session, a);
    let out = output(&session, a);
    assert!(!session.reorder_socket(inp, ReorderDirection::Up));
    assert!(!session.reorder_socket(out, ReorderDirection::Down));
    assert!(session.connect(out, out).is_err());
    assert_eq!(session.disconnect_socket(out), 0);
    assert_eq!(session.remove_nodes(&[b]), 0);

    // A drag cancelled with Escape after crossing the threshold
    press(&mut session, Pos2::new(250.0, 210.0), Modifiers::NONE);
    move_to(&mut session, Pos2::new(300.0, 260.0));
    escape(&mut session);
    assert_eq!(session.graph().node(a).unwrap().position, [200.0, 200.0]);

    assert!(session.can_redo());
    assert_eq!(session.history().undo_label().map(str::to_string), undo);
    assert_eq!(session.history().redo_label().map(str::to_string), redo);
    assert!(session.redo());
    assert!(session.graph().contains_node(b));
}

#[test]
fn test_press_near_socket_edge_starts_connect() {
    let mut session = session();
    session.add_node(STATE_TYPE, [200.0, 200.0]).unwrap();
    // Input row spans y 224..246; press just below it
    press(&mut session, Pos2::new(250.0, 248.0), Modifiers::NONE);
    assert_eq!(session.state().name(), "Connect");
}
