use serde::{Deserialize, Serialize};
use studymap_core::{NodeId, SessionPhase};
use studymap_graph::{DetailView, GraphSnapshot, StudyGuide};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRequest {
    #[serde(default)]
    pub topic: Option<String>,
}

impl TopicRequest {
    /// The trimmed topic, if one was given and is not blank.
    pub fn topic(&self) -> Option<&str> {
        self.topic
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRequest {
    pub node_id: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRequest {
    pub subject_index: usize,
    pub chapter_index: usize,
}

/// Detail panel plus its rendered study guide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailDto {
    pub view: DetailView,
    pub guide: Option<StudyGuide>,
}

impl From<&DetailView> for DetailDto {
    fn from(view: &DetailView) -> Self {
        Self {
            guide: view.study_guide(),
            view: view.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualizerStateDto {
    pub phase: SessionPhase,
    pub graph: GraphSnapshot,
    pub detail: Option<DetailDto>,
}
