use serde::{Deserialize, Serialize};

/// Structured payload returned by a content source for a topic label.
///
/// Field names follow the JSON the content endpoint has always served
/// (`videoId`, not `video_id`). Everything except `name` is optional on
/// input so partially filled model replies still parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicContent {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(default)]
    pub subtopics: Vec<Subtopic>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtopic {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtopics: Vec<Subtopic>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub title: String,
    #[serde(default = "default_resource_url")]
    pub url: String,
}

fn default_resource_url() -> String {
    "#".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Article,
    Video,
    Book,
    Course,
    #[serde(other)]
    Other,
}

impl Resource {
    pub fn new(kind: ResourceKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            url: default_resource_url(),
        }
    }
}

impl TopicContent {
    /// Names of the direct subtopics, in order.
    pub fn subtopic_names(&self) -> Vec<&str> {
        self.subtopics.iter().map(|s| s.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_payload_parses() {
        let raw = r#"{
            "name": "Arrays",
            "subtopics": [
                { "name": "1D Arrays", "description": "Linear storage" },
                { "name": "2D Arrays" }
            ]
        }"#;
        let content: TopicContent = serde_json::from_str(raw).expect("parse");
        assert_eq!(content.subtopic_names(), vec!["1D Arrays", "2D Arrays"]);
        assert_eq!(content.subtopics[1].description, "");
        assert!(content.video_id.is_none());
        assert!(content.resources.is_empty());
    }

    #[test]
    fn test_missing_subtopics_defaults_to_empty() {
        let content: TopicContent =
            serde_json::from_str(r#"{"name":"Limits","videoId":"riXcZT0VBNM"}"#).expect("parse");
        assert!(content.subtopics.is_empty());
        assert_eq!(content.video_id.as_deref(), Some("riXcZT0VBNM"));
    }

    #[test]
    fn test_unknown_resource_type_maps_to_other() {
        let resource: Resource =
            serde_json::from_str(r#"{"type":"podcast","title":"Listen"}"#).expect("parse");
        assert_eq!(resource.kind, ResourceKind::Other);
        assert_eq!(resource.url, "#");
    }

    #[test]
    fn test_serializes_camel_case() {
        let content = TopicContent {
            id: "arrays".into(),
            name: "Arrays".into(),
            description: String::new(),
            content: None,
            video_id: Some("W2MfQ5Y_LHc".into()),
            subtopics: vec![],
            resources: vec![Resource::new(ResourceKind::Book, "Guide")],
        };
        let v = serde_json::to_value(&content).expect("serialize");
        assert_eq!(v["videoId"], "W2MfQ5Y_LHc");
        assert_eq!(v["resources"][0]["type"], "book");
        assert!(v.get("content").is_none());
    }
}
