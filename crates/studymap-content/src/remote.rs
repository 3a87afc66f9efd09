use crate::config::RemoteConfig;
use crate::{ContentError, ContentSource, slugify};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use studymap_core::TopicContent;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are a study assistant. Reply with a single JSON object and nothing else. \
Shape: {\"name\": string, \"description\": string, \"content\": string, \"videoId\": string (optional YouTube id), \
\"subtopics\": [{\"name\": string, \"description\": string, \"content\": string, \
\"resources\": [{\"type\": \"article\"|\"video\"|\"book\"|\"course\", \"title\": string, \"url\": string}]}], \
\"resources\": [same shape as above]}. Give 4 to 6 subtopics.";

/// Longest error body kept in a `ContentError::Status`.
const MAX_ERROR_BODY: usize = 280;

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Topic content from an OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone)]
pub struct RemoteContentSource {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl RemoteContentSource {
    pub fn new(config: &RemoteConfig) -> Result<Self, ContentError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ContentError::Misconfigured("missing API key".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ContentError::Misconfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ContentSource for RemoteContentSource {
    async fn generate(&self, topic: &str) -> Result<TopicContent, ContentError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ContentError::MissingTopic);
        }

        let body = json!({
            "model": self.model,
            "temperature": 0.4,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": format!("Topic: {topic}") },
            ],
        });

        debug!(topic, endpoint = %self.endpoint, "requesting topic content");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ContentError::Status {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY),
            });
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| ContentError::Parse(format!("completion envelope: {e}")))?;
        let reply = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ContentError::Parse("completion had no message".to_string()))?;

        parse_topic_reply(topic, &reply)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

/// Parse a model reply into a payload, unwrapping a fenced code block if the
/// model added one.
pub fn parse_topic_reply(topic: &str, reply: &str) -> Result<TopicContent, ContentError> {
    let json_text = strip_code_fence(reply);
    let mut content: TopicContent =
        serde_json::from_str(json_text).map_err(|e| ContentError::Parse(e.to_string()))?;

    if content.id.is_empty() {
        content.id = slugify(topic);
    }
    for (i, subtopic) in content.subtopics.iter_mut().enumerate() {
        if subtopic.id.is_empty() {
            subtopic.id = format!("{}-{}", content.id, i + 1);
        }
    }
    Ok(content)
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag, which may share a line with the body.
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn truncate(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max).collect();
    out.push('…');
    out
}
