use crate::layout::{LayoutConfig, LayoutEngine, LayoutItem};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use studymap_core::{ChapterSelection, NodeId, TopicContent, TopicEdge, TopicNode};
use tracing::{debug, warn};

/// Identifies one content fetch. A completion is only applied while the
/// node still waits on the same token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchToken(pub u64);

/// Everything a caller needs to run the fetch for an expand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandTicket {
    pub node_id: NodeId,
    pub label: String,
    pub token: FetchToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IgnoreReason {
    Missing,
    AlreadyExpanded,
    AlreadyLoading,
    NotExpanded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandStart {
    /// Guard tripped, nothing changed.
    Ignored(IgnoreReason),
    /// Cached content was present, children were added without a fetch.
    Materialized { children: Vec<NodeId> },
    /// Node is now loading; run the fetch described by the ticket.
    Fetch(ExpandTicket),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandOutcome {
    Expanded {
        node_id: NodeId,
        children: Vec<NodeId>,
    },
    Failed {
        node_id: NodeId,
    },
    /// Target was pruned, reset, or re-created while the fetch was in flight.
    Stale {
        node_id: NodeId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollapseOutcome {
    Ignored(IgnoreReason),
    Collapsed {
        node_id: NodeId,
        removed_nodes: Vec<NodeId>,
        removed_edges: usize,
    },
}

/// Owned copy of the graph handed to subscribers after each update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<TopicNode>,
    pub edges: Vec<TopicEdge>,
}

impl GraphSnapshot {
    pub fn node(&self, id: &NodeId) -> Option<&TopicNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn edges_from<'a>(&'a self, id: &NodeId) -> impl Iterator<Item = &'a TopicEdge> + use<'a> {
        let id = id.clone();
        self.edges.iter().filter(move |e| e.source == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Single source of truth for the visible topic graph.
///
/// Hierarchy is tracked with explicit parent/child links; ids still follow
/// the `{parent}-{index}` scheme so the two views of ancestry agree.
#[derive(Debug, Default)]
pub struct GraphStore {
    nodes: HashMap<NodeId, TopicNode>,
    /// Insertion order, used for snapshots and layout tie-breaks.
    order: Vec<NodeId>,
    edges: Vec<TopicEdge>,
    pending: HashMap<NodeId, FetchToken>,
    next_token: u64,
    layout: LayoutEngine,
}

impl GraphStore {
    pub fn new(layout: LayoutConfig) -> Self {
        Self {
            layout: LayoutEngine::new(layout),
            ..Default::default()
        }
    }

    pub fn node(&self, id: &NodeId) -> Option<&TopicNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TopicNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn roots(&self) -> impl Iterator<Item = &TopicNode> {
        self.nodes().filter(|n| n.is_root())
    }

    pub fn edges(&self) -> &[TopicEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes().cloned().collect(),
            edges: self.edges.clone(),
        }
    }

    /// Replace the graph with one root per topic of the chapter.
    pub fn seed(&mut self, selection: &ChapterSelection) {
        self.reset();
        let positions = self.layout.root_positions(selection.topics.len());
        for (index, (topic, position)) in selection.topics.iter().zip(positions).enumerate() {
            let mut node = TopicNode::root(
                NodeId(format!("topic-{index}")),
                topic.name.clone(),
                format!("Topic in {}", selection.chapter),
            );
            node.position = position;
            self.insert_node(node);
        }
        self.relayout();
    }

    /// Insert a standalone root. Used by callers that build graphs by hand.
    pub fn insert_root(&mut self, node: TopicNode) {
        debug_assert!(node.parent.is_none());
        self.insert_node(node);
        self.relayout();
    }

    fn insert_node(&mut self, node: TopicNode) {
        self.order.push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
    }

    /// Synchronous half of expand: apply the guards and mark the node loading.
    pub fn begin_expand(&mut self, id: &NodeId) -> ExpandStart {
        let Some(node) = self.nodes.get_mut(id) else {
            debug!(node = %id, "expand ignored: unknown node");
            return ExpandStart::Ignored(IgnoreReason::Missing);
        };
        if node.expanded {
            debug!(node = %id, "expand ignored: already expanded");
            return ExpandStart::Ignored(IgnoreReason::AlreadyExpanded);
        }
        if node.loading {
            debug!(node = %id, "expand ignored: fetch in flight");
            return ExpandStart::Ignored(IgnoreReason::AlreadyLoading);
        }

        if let Some(content) = node.content.clone() {
            let children = self.materialize(id, content);
            return ExpandStart::Materialized { children };
        }

        node.loading = true;
        node.error = false;
        let label = node.label.clone();

        let token = FetchToken(self.next_token);
        self.next_token += 1;
        self.pending.insert(id.clone(), token);

        ExpandStart::Fetch(ExpandTicket {
            node_id: id.clone(),
            label,
            token,
        })
    }

    /// Asynchronous half of expand: apply the fetch result to the node the
    /// ticket was issued for.
    pub fn complete_expand<E: fmt::Display>(
        &mut self,
        ticket: &ExpandTicket,
        result: Result<TopicContent, E>,
    ) -> ExpandOutcome {
        let node_id = ticket.node_id.clone();
        if self.pending.get(&node_id) != Some(&ticket.token) || !self.nodes.contains_key(&node_id)
        {
            debug!(node = %node_id, token = ticket.token.0, "dropping stale content response");
            return ExpandOutcome::Stale { node_id };
        }
        self.pending.remove(&node_id);

        match result {
            Ok(content) => {
                let children = self.materialize(&node_id, content);
                ExpandOutcome::Expanded { node_id, children }
            }
            Err(err) => {
                warn!(node = %node_id, label = %ticket.label, error = %err, "content fetch failed");
                if let Some(node) = self.nodes.get_mut(&node_id) {
                    node.loading = false;
                    node.error = true;
                }
                ExpandOutcome::Failed { node_id }
            }
        }
    }

    /// Mark `id` expanded with `content` and add one child per subtopic,
    /// nodes and edges together.
    fn materialize(&mut self, id: &NodeId, content: TopicContent) -> Vec<NodeId> {
        let Some(parent) = self.nodes.get(id) else {
            return Vec::new();
        };

        let positions = self
            .layout
            .child_positions(parent.position, content.subtopics.len());
        let children: Vec<TopicNode> = content
            .subtopics
            .iter()
            .zip(positions)
            .enumerate()
            .map(|(index, (subtopic, position))| {
                let mut child = TopicNode::child_of(parent, index, subtopic);
                child.position = position;
                child
            })
            .collect();
        let child_ids: Vec<NodeId> = children.iter().map(|c| c.id.clone()).collect();

        for child in children {
            self.edges
                .push(TopicEdge::new(id.clone(), child.id.clone()));
            self.insert_node(child);
        }

        if let Some(parent) = self.nodes.get_mut(id) {
            parent.expanded = true;
            parent.loading = false;
            parent.error = false;
            parent.content = Some(content);
            parent.children = child_ids.clone();
        }

        self.relayout();
        child_ids
    }

    /// Remove the whole subtree below `id` and mark it collapsed.
    pub fn collapse(&mut self, id: &NodeId) -> CollapseOutcome {
        match self.nodes.get(id) {
            None => {
                debug!(node = %id, "collapse ignored: unknown node");
                return CollapseOutcome::Ignored(IgnoreReason::Missing);
            }
            Some(node) if !node.expanded => {
                debug!(node = %id, "collapse ignored: not expanded");
                return CollapseOutcome::Ignored(IgnoreReason::NotExpanded);
            }
            Some(_) => {}
        }

        let removed = self.descendants(id);
        let removed_set: HashSet<&NodeId> = removed.iter().collect();

        for node_id in &removed {
            self.nodes.remove(node_id);
            self.pending.remove(node_id);
        }
        self.order.retain(|n| !removed_set.contains(n));

        let before = self.edges.len();
        self.edges
            .retain(|e| !removed_set.contains(&e.source) && !removed_set.contains(&e.target));
        let removed_edges = before - self.edges.len();

        if let Some(node) = self.nodes.get_mut(id) {
            node.expanded = false;
            node.children.clear();
        }

        CollapseOutcome::Collapsed {
            node_id: id.clone(),
            removed_nodes: removed,
            removed_edges,
        }
    }

    pub fn reset(&mut self) {
        self.nodes.clear();
        self.order.clear();
        self.edges.clear();
        self.pending.clear();
    }

    /// Cache content on a node that has none yet. Returns whether it was stored.
    pub fn cache_content(&mut self, id: &NodeId, content: TopicContent) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) if node.content.is_none() => {
                node.content = Some(content);
                true
            }
            _ => false,
        }
    }

    /// All nodes below `id`, walked through the child lists.
    pub fn descendants(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<&NodeId> = match self.nodes.get(id) {
            Some(node) => node.children.iter().rev().collect(),
            None => return out,
        };
        while let Some(current) = stack.pop() {
            out.push(current.clone());
            if let Some(node) = self.nodes.get(current) {
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// All nodes whose id has `id` as a `-`-delimited prefix.
    pub fn descendants_by_prefix(&self, id: &NodeId) -> Vec<NodeId> {
        self.order
            .iter()
            .filter(|n| n.is_descendant_of(id))
            .cloned()
            .collect()
    }

    fn relayout(&mut self) {
        let items: Vec<LayoutItem> = self
            .nodes()
            .map(|n| LayoutItem {
                id: n.id.clone(),
                parent: n.parent.clone(),
                depth: n.depth,
                position: n.position,
            })
            .collect();
        let placed = self.layout.resolve_collisions(&items);
        for (id, position) in placed {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.position = position;
            }
        }
    }
}
