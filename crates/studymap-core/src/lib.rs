use serde::{Deserialize, Serialize};
use std::fmt;

pub mod content;
pub mod syllabus;

pub use content::{Resource, ResourceKind, Subtopic, TopicContent};
pub use syllabus::{Chapter, ChapterSelection, Subject, SyllabusData, SyllabusError, Topic};

/// Separator between a parent id and a sibling index in child ids.
pub const ID_SEPARATOR: char = '-';

/// Identifier of a node in the topic graph.
///
/// Root ids are chosen by the seeder. Children are always named
/// `{parent}-{index}`, so ancestry can be recovered from the id alone.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Id of the `index`-th child of this node.
    pub fn child(&self, index: usize) -> NodeId {
        NodeId(format!("{}{}{}", self.0, ID_SEPARATOR, index))
    }

    /// True when `self` lies strictly below `ancestor` by id-prefix.
    pub fn is_descendant_of(&self, ancestor: &NodeId) -> bool {
        self.0
            .strip_prefix(ancestor.0.as_str())
            .is_some_and(|rest| rest.starts_with(ID_SEPARATOR) && rest.len() > 1)
    }

    /// Number of `-`-delimited segments in the id.
    pub fn segment_count(&self) -> usize {
        self.0.split(ID_SEPARATOR).count()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    pub fn between(source: &NodeId, target: &NodeId) -> Self {
        Self(format!("e{}-{}", source, target))
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Presentational tier of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[default]
    Primary,
    Secondary,
    Tertiary,
}

impl NodeKind {
    pub fn label(self) -> &'static str {
        match self {
            NodeKind::Primary => "primary",
            NodeKind::Secondary => "secondary",
            NodeKind::Tertiary => "tertiary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicNode {
    pub id: NodeId,
    pub label: String,
    pub description: String,
    pub kind: NodeKind,
    pub position: Position,
    pub expanded: bool,
    pub loading: bool,
    /// Set when the last content fetch for this node failed.
    pub error: bool,
    pub content: Option<TopicContent>,

    // Hierarchy
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// 0 for roots.
    pub depth: u32,
}

impl TopicNode {
    pub fn root(id: NodeId, label: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            description: description.into(),
            kind: NodeKind::Primary,
            position: Position::default(),
            expanded: false,
            loading: false,
            error: false,
            content: None,
            parent: None,
            children: Vec::new(),
            depth: 0,
        }
    }

    pub fn child_of(parent: &TopicNode, index: usize, subtopic: &Subtopic) -> Self {
        Self {
            id: parent.id.child(index),
            label: subtopic.name.clone(),
            description: subtopic.description.clone(),
            kind: NodeKind::Secondary,
            position: Position::default(),
            expanded: false,
            loading: false,
            error: false,
            content: None,
            parent: Some(parent.id.clone()),
            children: Vec::new(),
            depth: parent.depth + 1,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Where a visualizer session is in its flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Waiting for a syllabus
    #[default]
    Input,
    /// Syllabus accepted, waiting for a chapter choice
    Selection,
    /// Chapter content is being generated
    Generating,
    /// Graph is seeded and interactive
    Visualizing,
}

/// Directed parent → child edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
}

impl TopicEdge {
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self {
            id: EdgeId::between(&source, &target),
            source,
            target,
        }
    }

    pub fn touches(&self, id: &NodeId) -> bool {
        &self.source == id || &self.target == id
    }
}
