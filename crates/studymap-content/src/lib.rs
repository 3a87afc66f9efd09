//! Content sources for the topic graph.
//!
//! A content source maps a topic label to a [`TopicContent`] payload. The
//! graph treats every source the same way: an async call that succeeds or
//! fails. Sources here are a deterministic mock, an OpenAI-compatible chat
//! completion client, and a combinator that falls back from one to the other.

use async_trait::async_trait;
use std::sync::Arc;
use studymap_core::TopicContent;
use thiserror::Error;
use tracing::warn;

pub mod config;
pub mod fallback;
pub mod math;
pub mod mock;
pub mod remote;

pub use config::{ContentConfig, MathConfig, RemoteConfig};
pub use fallback::FallbackContentSource;
pub use math::{MathSolverClient, SolveRequest, SolveResponse, SolverError};
pub use mock::MockContentSource;
pub use remote::RemoteContentSource;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("Topic is required")]
    MissingTopic,
    #[error("Content service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Content service unreachable: {0}")]
    Transport(String),
    #[error("Malformed content payload: {0}")]
    Parse(String),
    #[error("Content source misconfigured: {0}")]
    Misconfigured(String),
}

impl From<reqwest::Error> for ContentError {
    fn from(value: reqwest::Error) -> Self {
        ContentError::Transport(value.to_string())
    }
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn generate(&self, topic: &str) -> Result<TopicContent, ContentError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Pick the source for a configuration: the remote model backed by the mock
/// when an API key is set, the mock alone otherwise.
pub fn build_content_source(config: &ContentConfig) -> Result<Arc<dyn ContentSource>, ContentError> {
    let mock = MockContentSource::with_latency(config.mock_latency());

    match config.remote.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => {
            let remote = RemoteContentSource::new(&config.remote)?;
            Ok(Arc::new(FallbackContentSource::new(
                Arc::new(remote),
                Arc::new(mock),
            )))
        }
        _ => {
            warn!("no content API key configured; serving mock topic content");
            Ok(Arc::new(mock))
        }
    }
}

/// Lowercased, whitespace-to-dash form of a topic used for payload ids.
pub fn slugify(topic: &str) -> String {
    topic
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}
