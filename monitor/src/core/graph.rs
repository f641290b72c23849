//! Revisit-aware navigation graph for a single model execution.
//!
//! Nodes are keyed by a deterministic id derived from the resource title, so a
//! resource visited twice stays one node with two entries in
//! `visited_at_steps`. At most one node carries [`NodeKind::Current`].

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::types::{EdgeKind, NodeKind};

/// Derive the stable node id for a resource title.
///
/// Trims, collapses whitespace runs to `_` and lowercases, so titles that
/// differ only in case or spacing address the same node.
pub fn node_id(title: &str) -> String {
    title
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub title: String,
    pub kind: NodeKind,
    pub visited_at_steps: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub source_id: String,
    pub target_id: String,
    pub kind: EdgeKind,
    /// Step index of the notification that produced this edge.
    pub step: u32,
}

/// One `step` notification reduced to what the graph needs.
#[derive(Debug, Clone, Copy)]
pub struct StepVisit<'a> {
    pub step: u32,
    pub page_title: &'a str,
    pub next_page_title: Option<&'a str>,
    /// The page could not be fetched.
    pub unresolved: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationGraph {
    nodes: BTreeMap<String, GraphNode>,
    edges: Vec<GraphEdge>,
    start_id: Option<String>,
    current_id: Option<String>,
    /// Where the trajectory last stood, including unresolved pages.
    cursor_id: Option<String>,
}

impl NavigationGraph {
    /// Graph holding a single `start` node for `start_title`.
    pub fn seeded(start_title: &str) -> Self {
        let id = node_id(start_title);
        let mut nodes = BTreeMap::new();
        nodes.insert(
            id.clone(),
            GraphNode {
                id: id.clone(),
                title: start_title.to_string(),
                kind: NodeKind::Start,
                visited_at_steps: Vec::new(),
            },
        );
        Self {
            nodes,
            edges: Vec::new(),
            start_id: Some(id.clone()),
            current_id: None,
            cursor_id: Some(id),
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn current(&self) -> Option<&GraphNode> {
        self.current_id.as_deref().and_then(|id| self.nodes.get(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Record one step of the trajectory.
    ///
    /// When `live` is false the step is late (an older step index arriving
    /// after a newer one): its visit, nodes and edges are recorded but the
    /// current marker and cursor stay where the newer steps left them.
    pub fn apply_step(&mut self, visit: StepVisit<'_>, live: bool) {
        let page_id = self.record_visit(visit.page_title, visit.step);

        if live {
            if let Some(cursor) = self.cursor_id.clone()
                && cursor != page_id
                && self.kind_of(&cursor) == Some(NodeKind::Unresolved)
            {
                self.push_edge(&cursor, &page_id, EdgeKind::Backtrack, visit.step);
            }
            self.cursor_id = Some(page_id.clone());
        }

        if visit.unresolved {
            if self.current_id.as_deref() == Some(page_id.as_str()) {
                self.current_id = None;
            }
            self.set_kind(&page_id, NodeKind::Unresolved);
            return;
        }

        let Some(next_title) = visit.next_page_title else {
            return;
        };
        let next_id = node_id(next_title);
        let kind = if self.nodes.contains_key(&next_id) {
            EdgeKind::Loop
        } else {
            self.insert_visited(&next_id, next_title);
            EdgeKind::Normal
        };
        self.push_edge(&page_id, &next_id, kind, visit.step);

        if live {
            self.demote_current();
            self.set_kind(&next_id, NodeKind::Current);
            self.current_id = Some(next_id.clone());
            self.cursor_id = Some(next_id);
        }
    }

    /// Demote the current node back to `visited` (or `start` for the start node).
    pub fn demote_current(&mut self) {
        if let Some(id) = self.current_id.take() {
            let kind = if self.start_id.as_deref() == Some(id.as_str()) {
                NodeKind::Start
            } else {
                NodeKind::Visited
            };
            self.set_kind(&id, kind);
        }
    }

    /// Recolor the current node with a terminal kind and clear the marker.
    pub fn finish_current(&mut self, kind: NodeKind) {
        if let Some(id) = self.current_id.take() {
            self.set_kind(&id, kind);
        }
    }

    fn record_visit(&mut self, title: &str, step: u32) -> String {
        let id = node_id(title);
        if !self.nodes.contains_key(&id) {
            self.insert_visited(&id, title);
        }
        if let Some(node) = self.nodes.get_mut(&id)
            && !node.visited_at_steps.contains(&step)
        {
            node.visited_at_steps.push(step);
            node.visited_at_steps.sort_unstable();
        }
        id
    }

    fn insert_visited(&mut self, id: &str, title: &str) {
        self.nodes.insert(
            id.to_string(),
            GraphNode {
                id: id.to_string(),
                title: title.to_string(),
                kind: NodeKind::Visited,
                visited_at_steps: Vec::new(),
            },
        );
    }

    fn kind_of(&self, id: &str) -> Option<NodeKind> {
        self.nodes.get(id).map(|node| node.kind)
    }

    fn set_kind(&mut self, id: &str, kind: NodeKind) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.kind = kind;
        }
    }

    fn push_edge(&mut self, source_id: &str, target_id: &str, kind: EdgeKind, step: u32) {
        let exists = self
            .edges
            .iter()
            .any(|e| e.source_id == source_id && e.target_id == target_id && e.step == step);
        if !exists {
            self.edges.push(GraphEdge {
                source_id: source_id.to_string(),
                target_id: target_id.to_string(),
                kind,
                step,
            });
        }
    }
}
