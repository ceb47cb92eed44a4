// SPDX-License-Identifier: MIT OR Apache-2.0
//! Breadcrumb navigation over nested graphs.
//!
//! Tabs form a stack: index 0 is the root graph and the last tab is the
//! active one. Opening a subgraph pushes, navigating back or closing
//! truncates. Each tab keeps the view it had when it was left.

use crate::graph::Graph;
use crate::node::NodeId;
use crate::view::ViewState;

/// What a tab shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabTarget {
    /// The root graph
    Root,
    /// A nested graph reached through subgraph node ids, outermost first
    SubGraph(Vec<NodeId>),
}

impl TabTarget {
    /// Subgraph path, empty for the root
    pub fn path(&self) -> &[NodeId] {
        match self {
            TabTarget::Root => &[],
            TabTarget::SubGraph(path) => path,
        }
    }
}

/// One entry of the navigation stack
#[derive(Debug, Clone, PartialEq)]
pub struct GraphTab {
    /// Target graph
    pub target: TabTarget,
    /// Display title
    pub title: String,
    /// View captured when navigating away
    pub saved_view: Option<ViewState>,
}

/// Navigation stack
#[derive(Debug, Clone)]
pub struct TabStack {
    tabs: Vec<GraphTab>,
}

impl TabStack {
    /// Create a stack holding only the root tab
    pub fn new(root_title: impl Into<String>) -> Self {
        Self {
            tabs: vec![GraphTab {
                target: TabTarget::Root,
                title: root_title.into(),
                saved_view: None,
            }],
        }
    }

    /// All tabs, root first
    pub fn tabs(&self) -> &[GraphTab] {
        &self.tabs
    }

    /// Number of tabs
    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    /// Always false; the root tab cannot be removed
    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Index of the active tab
    pub fn active_index(&self) -> usize {
        self.tabs.len().saturating_sub(1)
    }

    /// The active tab
    pub fn active(&self) -> &GraphTab {
        &self.tabs[self.active_index()]
    }

    /// Subgraph path of the active tab
    pub fn active_path(&self) -> &[NodeId] {
        self.active().target.path()
    }

    /// Titles from root to active
    pub fn breadcrumb(&self) -> Vec<&str> {
        self.tabs.iter().map(|t| t.title.as_str()).collect()
    }

    /// Push a tab for the subgraph owned by `node_id` in the active graph.
    /// `current_view` is stored on the tab being left.
    pub fn open_subgraph(&mut self, root: &Graph, node_id: NodeId, current_view: ViewState) -> Option<usize> {
        let graph = root.graph_at_path(self.active_path())?;
        let node = graph.node(node_id)?;
        node.subgraph.as_ref()?;

        let mut path = self.active_path().to_vec();
        path.push(node_id);
        let title = node.name.clone();

        let index = self.active_index();
        self.tabs[index].saved_view = Some(current_view);
        self.tabs.push(GraphTab {
            target: TabTarget::SubGraph(path),
            title,
            saved_view: None,
        });
        tracing::info!("Opened subgraph tab '{}'", self.active().title);
        Some(self.active_index())
    }

    /// Make tab `index` active, dropping every tab above it. Returns the view
    /// to restore, or `None` if nothing changed.
    pub fn navigate_to(&mut self, index: usize) -> Option<ViewState> {
        if index >= self.active_index() {
            return None;
        }
        self.tabs.truncate(index + 1);
        tracing::info!("Navigated to tab '{}'", self.active().title);
        Some(self.active().saved_view.clone().unwrap_or_default())
    }

    /// Close tab `index` and everything above it. The root tab cannot be
    /// closed. Returns the view to restore.
    pub fn close_tab(&mut self, index: usize) -> Option<ViewState> {
        if index == 0 || index >= self.tabs.len() {
            return None;
        }
        self.tabs.truncate(index);
        tracing::info!("Closed tab {}, now at '{}'", index, self.active().title);
        Some(self.active().saved_view.clone().unwrap_or_default())
    }

    /// Drop tabs whose target no longer resolves, so the deepest resolvable
    /// ancestor becomes active, and refresh titles from node names.
    /// Returns true if tabs were dropped.
    pub fn resolve(&mut self, root: &Graph) -> bool {
        let keep = self
            .tabs
            .iter()
            .position(|t| root.graph_at_path(t.target.path()).is_none())
            .unwrap_or(self.tabs.len())
            .max(1);
        let dropped = keep < self.tabs.len();
        if dropped {
            tracing::debug!("Dropping {} unresolvable tabs", self.tabs.len() - keep);
            self.tabs.truncate(keep);
        }

        for tab in self.tabs.iter_mut().skip(1) {
            if let TabTarget::SubGraph(path) = &tab.target {
                let (last, parent) = match path.split_last() {
                    Some(split) => split,
                    None => continue,
                };
                if let Some(node) = root.graph_at_path(parent).and_then(|g| g.node(*last)) {
                    if node.name != tab.title {
                        tab.title = node.name.clone();
                    }
                }
            }
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RemoveMode;
    use crate::node::{Node, NodeKind};

    fn nested() -> (Graph, NodeId, NodeId) {
        let mut root = Graph::with_entry_nodes("root");
        let outer = root.add_node(Node::new(NodeKind::SubGraph, "subgraph", "Outer"));
        let inner = root
            .node_mut(outer)
            .and_then(|n| n.subgraph.as_deref_mut())
            .unwrap()
            .add_node(Node::new(NodeKind::SubGraph, "subgraph", "Inner"));
        (root, outer, inner)
    }

    fn view(zoom: f32) -> ViewState {
        ViewState {
            zoom,
            ..ViewState::default()
        }
    }

    #[test]
    fn test_open_and_breadcrumb() {
        let (root, outer, inner) = nested();
        let mut tabs = TabStack::new("root");
        assert_eq!(tabs.open_subgraph(&root, outer, view(1.5)), Some(1));
        assert_eq!(tabs.open_subgraph(&root, inner, view(2.0)), Some(2));
        assert_eq!(tabs.breadcrumb(), vec!["root", "Outer", "Inner"]);
        assert_eq!(tabs.active_path(), &[outer, inner]);
    }

    #[test]
    fn test_open_requires_subgraph_in_active_graph() {
        let (root, _, inner) = nested();
        let start = root.nodes().find(|n| n.is_protected()).unwrap().id;
        let mut tabs = TabStack::new("root");
        assert_eq!(tabs.open_subgraph(&root, start, view(1.0)), None);
        // Inner lives one level down
        assert_eq!(tabs.open_subgraph(&root, inner, view(1.0)), None);
        assert_eq!(tabs.len(), 1);
    }

    #[test]
    fn test_navigate_restores_saved_view() {
        let (root, outer, inner) = nested();
        let mut tabs = TabStack::new("root");
        tabs.open_subgraph(&root, outer, view(1.5));
        tabs.open_subgraph(&root, inner, view(2.0));

        assert_eq!(tabs.navigate_to(0), Some(view(1.5)));
        assert_eq!(tabs.len(), 1);
        assert_eq!(tabs.navigate_to(0), None);
    }

    #[test]
    fn test_close_truncates_above() {
        let (root, outer, inner) = nested();
        let mut tabs = TabStack::new("root");
        tabs.open_subgraph(&root, outer, view(1.5));
        tabs.open_subgraph(&root, inner, view(2.0));

        assert_eq!(tabs.close_tab(0), None);
        assert_eq!(tabs.close_tab(1), Some(view(1.5)));
        assert_eq!(tabs.breadcrumb(), vec!["root"]);
    }

    #[test]
    fn test_resolve_falls_back_to_ancestor() {
        let (mut root, outer, inner) = nested();
        let mut tabs = TabStack::new("root");
        tabs.open_subgraph(&root, outer, view(1.0));
        tabs.open_subgraph(&root, inner, view(1.0));

        root.graph_at_path_mut(&[outer])
            .unwrap()
            .remove_node(inner, RemoveMode::Hard);
        assert!(tabs.resolve(&root));
        assert_eq!(tabs.active_path(), &[outer]);

        root.rename_node(outer, "Renamed");
        assert!(!tabs.resolve(&root));
        assert_eq!(tabs.active().title, "Renamed");
    }
}
