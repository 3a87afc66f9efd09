use crate::store::GraphStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use studymap_core::{NodeId, NodeKind, TopicContent};
use tracing::{debug, warn};

pub const FALLBACK_PLACEHOLDER: &str =
    "Detailed content for this topic is not available right now. Try again in a moment.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "content", rename_all = "snake_case")]
pub enum DetailStatus {
    Loading,
    Ready(TopicContent),
    Fallback { placeholder: String },
}

/// What the detail panel currently shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailView {
    pub node_id: NodeId,
    pub label: String,
    pub kind: NodeKind,
    pub status: DetailStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailTicket {
    pub node_id: NodeId,
    pub label: String,
    generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailRequest {
    /// Node not in the graph; selection unchanged.
    Ignored,
    /// Cached content was shown directly.
    Ready,
    /// Panel is loading; fetch content for the ticket's label.
    Fetch(DetailTicket),
}

/// Tracks the single selected node and its detail panel. Independent of
/// expand/collapse state.
#[derive(Debug, Default)]
pub struct DetailBinding {
    view: Option<DetailView>,
    generation: u64,
}

impl DetailBinding {
    pub fn view(&self) -> Option<&DetailView> {
        self.view.as_ref()
    }

    pub fn selected(&self) -> Option<&NodeId> {
        self.view.as_ref().map(|v| &v.node_id)
    }

    pub fn select(&mut self, id: &NodeId, store: &GraphStore) -> DetailRequest {
        let Some(node) = store.node(id) else {
            debug!(node = %id, "select ignored: unknown node");
            return DetailRequest::Ignored;
        };

        self.generation += 1;
        let (status, request) = match &node.content {
            Some(content) => (DetailStatus::Ready(content.clone()), DetailRequest::Ready),
            None => (
                DetailStatus::Loading,
                DetailRequest::Fetch(DetailTicket {
                    node_id: id.clone(),
                    label: node.label.clone(),
                    generation: self.generation,
                }),
            ),
        };

        self.view = Some(DetailView {
            node_id: id.clone(),
            label: node.label.clone(),
            kind: node.kind,
            status,
        });
        request
    }

    /// Apply a detail fetch. Returns false when the panel has moved on.
    pub fn complete<E: fmt::Display>(
        &mut self,
        ticket: &DetailTicket,
        result: Result<TopicContent, E>,
        store: &mut GraphStore,
    ) -> bool {
        if ticket.generation != self.generation {
            debug!(node = %ticket.node_id, "dropping detail response for old selection");
            return false;
        }
        let Some(view) = self.view.as_mut() else {
            debug!(node = %ticket.node_id, "dropping detail response: panel closed");
            return false;
        };

        view.status = match result {
            Ok(content) => {
                store.cache_content(&ticket.node_id, content.clone());
                DetailStatus::Ready(content)
            }
            Err(err) => {
                warn!(node = %ticket.node_id, error = %err, "detail fetch failed, showing fallback");
                DetailStatus::Fallback {
                    placeholder: FALLBACK_PLACEHOLDER.to_string(),
                }
            }
        };
        true
    }

    pub fn close(&mut self) {
        self.view = None;
        self.generation += 1;
    }
}
