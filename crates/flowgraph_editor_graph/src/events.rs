// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host event bus and deferred-action queue.

use crate::connection::ConnectionId;
use crate::graph::RepairReport;
use crate::node::NodeId;
use crate::socket::SocketId;
use egui::Pos2;

/// What a secondary click landed on
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContextTarget {
    /// A node body or header
    Node(NodeId),
    /// A socket row
    Socket(SocketId),
    /// A virtual point of a socket
    Point {
        /// Socket owning the point
        socket: SocketId,
        /// Anchor index
        index: usize,
    },
    /// A connection curve
    Connection(ConnectionId),
    /// Empty canvas, in grid coordinates
    Background(Pos2),
}

/// High-level lifecycle events
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// A node was created
    NodeCreated(NodeId),
    /// A node was deleted
    NodeDeleted(NodeId),
    /// A node was renamed
    NodeRenamed {
        /// Node
        node: NodeId,
        /// New name
        name: String,
    },
    /// Nodes were pasted or duplicated
    NodesPasted(Vec<NodeId>),
    /// A connection was created
    ConnectionEstablished(ConnectionId),
    /// A connection was removed
    ConnectionRemoved(ConnectionId),
    /// A socket was removed
    SocketRemoved(SocketId),
    /// Selection changed
    SelectionChanged(Vec<NodeId>),
    /// A graph tab became active
    GraphOpened {
        /// Subgraph path, empty for the root graph
        path: Vec<NodeId>,
        /// Title of the graph
        title: String,
    },
    /// A tab was closed
    TabClosed(usize),
    /// Undo or redo was applied
    UndoRedoPerformed {
        /// Label of the entry
        label: String,
        /// Whether it was a redo
        redo: bool,
    },
    /// The repair pass fixed inconsistencies
    GraphRepaired(RepairReport),
    /// Double-click activation of a node
    NodeActivated(NodeId),
    /// Secondary click
    ContextMenuRequested(ContextTarget),
    /// The graph was written to disk
    GraphSaved(std::path::PathBuf),
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&EditorEvent)>;

/// Synchronous publish/subscribe channel
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_id: u64,
    published: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .field("published", &self.published)
            .finish()
    }
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback
    pub fn subscribe(&mut self, callback: impl FnMut(&EditorEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove a callback
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        before != self.subscribers.len()
    }

    /// Deliver an event to every subscriber in subscription order
    pub fn publish(&mut self, event: EditorEvent) {
        self.published += 1;
        for (_, subscriber) in &mut self.subscribers {
            subscriber(&event);
        }
    }

    /// Number of events published so far
    pub fn published_count(&self) -> u64 {
        self.published
    }
}

/// Token for cancelling a scheduled action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeferredToken(u64);

#[derive(Debug)]
struct Pending<A> {
    token: DeferredToken,
    remaining: u32,
    action: A,
}

/// Actions drained once per event-loop tick
#[derive(Debug)]
pub struct DeferredQueue<A> {
    pending: Vec<Pending<A>>,
    next_token: u64,
}

impl<A> Default for DeferredQueue<A> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            next_token: 0,
        }
    }
}

impl<A> DeferredQueue<A> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an action to run after `delay_ticks` ticks (0 = next tick)
    pub fn schedule(&mut self, action: A, delay_ticks: u32) -> DeferredToken {
        let token = DeferredToken(self.next_token);
        self.next_token += 1;
        self.pending.push(Pending {
            token,
            remaining: delay_ticks,
            action,
        });
        token
    }

    /// Cancel a pending action. Returns false if it already ran.
    pub fn cancel(&mut self, token: DeferredToken) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.token != token);
        before != self.pending.len()
    }

    /// Advance one tick and return the actions that are due, in scheduling order
    pub fn tick(&mut self) -> Vec<A> {
        let mut due = Vec::new();
        let mut waiting = Vec::with_capacity(self.pending.len());
        for mut pending in self.pending.drain(..) {
            if pending.remaining == 0 {
                due.push(pending.action);
            } else {
                pending.remaining -= 1;
                waiting.push(pending);
            }
        }
        self.pending = waiting;
        due
    }

    /// Number of pending actions
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_publish_and_unsubscribe() {
        let mut bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let id = bus.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        let node = NodeId::new();
        bus.publish(EditorEvent::NodeCreated(node));
        assert!(bus.unsubscribe(id));
        bus.publish(EditorEvent::NodeDeleted(node));

        assert_eq!(*seen.borrow(), vec![EditorEvent::NodeCreated(node)]);
        assert_eq!(bus.published_count(), 2);
        assert!(!bus.unsubscribe(id));
    }

    #[test]
    fn test_deferred_delay_and_order() {
        let mut queue = DeferredQueue::new();
        queue.schedule("later", 2);
        queue.schedule("now", 0);
        queue.schedule("next", 1);

        assert_eq!(queue.tick(), vec!["now"]);
        assert_eq!(queue.tick(), vec!["next"]);
        assert_eq!(queue.tick(), vec!["later"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_deferred_cancel() {
        let mut queue = DeferredQueue::new();
        let token = queue.schedule(1, 1);
        queue.schedule(2, 0);
        assert!(queue.cancel(token));
        assert_eq!(queue.tick(), vec![2]);
        assert!(queue.tick().is_empty());
        assert!(!queue.cancel(token));
    }
}
