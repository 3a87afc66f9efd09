use serde::{Deserialize, Serialize};
use studymap_core::{NodeId, SessionPhase};
use studymap_events::Event;

/// Event shape pushed to clients over the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AppEventPayload {
    PhaseChanged {
        phase: SessionPhase,
    },
    GraphSeeded {
        topic: String,
        root_count: u32,
    },
    GraphReset,
    NodeLoading {
        node_id: NodeId,
    },
    NodeExpanded {
        node_id: NodeId,
        child_count: u32,
        from_cache: bool,
    },
    NodeExpandFailed {
        node_id: NodeId,
        error: String,
    },
    NodeCollapsed {
        node_id: NodeId,
        removed_nodes: u32,
    },
    /// The detail panel changed; `None` when it was closed.
    DetailUpdated {
        node_id: Option<NodeId>,
    },
    StatusUpdate {
        message: String,
    },
    ShowError {
        message: String,
    },
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl AppEventPayload {
    /// Client-facing form of a bus event. Internal bookkeeping events map to `None`.
    pub fn from_event(event: &Event) -> Option<Self> {
        let payload = match event {
            Event::SessionPhaseChanged { phase } => Self::PhaseChanged { phase: *phase },
            Event::GraphSeeded { topic, root_count } => Self::GraphSeeded {
                topic: topic.clone(),
                root_count: count(*root_count),
            },
            Event::GraphReset => Self::GraphReset,
            Event::NodeLoading { id } => Self::NodeLoading {
                node_id: id.clone(),
            },
            Event::NodeExpanded {
                id,
                child_count,
                from_cache,
            } => Self::NodeExpanded {
                node_id: id.clone(),
                child_count: count(*child_count),
                from_cache: *from_cache,
            },
            Event::NodeExpandFailed { id, error } => Self::NodeExpandFailed {
                node_id: id.clone(),
                error: error.clone(),
            },
            Event::NodeCollapsed {
                id, removed_nodes, ..
            } => Self::NodeCollapsed {
                node_id: id.clone(),
                removed_nodes: count(*removed_nodes),
            },
            Event::NodeSelected { id }
            | Event::DetailReady { id }
            | Event::DetailFallback { id, .. } => Self::DetailUpdated {
                node_id: Some(id.clone()),
            },
            Event::DetailClosed => Self::DetailUpdated { node_id: None },
            Event::StatusUpdate { message } => Self::StatusUpdate {
                message: message.clone(),
            },
            Event::ShowError { message } => Self::ShowError {
                message: message.clone(),
            },
            Event::StaleResponseDropped { .. } => return None,
        };
        Some(payload)
    }
}
