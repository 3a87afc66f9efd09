use crate::{ContentError, ContentSource};
use async_trait::async_trait;
use std::sync::Arc;
use studymap_core::TopicContent;
use tracing::warn;

/// Serve from `primary`, or from `fallback` when the primary fails.
#[derive(Clone)]
pub struct FallbackContentSource {
    primary: Arc<dyn ContentSource>,
    fallback: Arc<dyn ContentSource>,
}

impl FallbackContentSource {
    pub fn new(primary: Arc<dyn ContentSource>, fallback: Arc<dyn ContentSource>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl ContentSource for FallbackContentSource {
    async fn generate(&self, topic: &str) -> Result<TopicContent, ContentError> {
        match self.primary.generate(topic).await {
            Ok(content) => Ok(content),
            // A blank topic fails the same way everywhere.
            Err(ContentError::MissingTopic) => Err(ContentError::MissingTopic),
            Err(err) => {
                warn!(
                    topic,
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    error = %err,
                    "content source failed, using fallback"
                );
                self.fallback.generate(topic).await
            }
        }
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}
