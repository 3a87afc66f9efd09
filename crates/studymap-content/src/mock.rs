use crate::{ContentError, ContentSource, slugify};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use studymap_core::{Resource, ResourceKind, Subtopic, TopicContent};

/// Offline content generator.
///
/// Output is pseudo-random but keyed on the topic string, so the same label
/// always yields the same subtopics.
#[derive(Debug, Clone, Default)]
pub struct MockContentSource {
    latency: Duration,
}

impl MockContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }

    pub fn content_for(topic: &str) -> TopicContent {
        let mut rng = topic_rng(topic);
        let title = capitalize(topic);
        let slug = slugify(topic);

        let subtopic_count = rng.gen_range(4..=6);
        let subtopics = (1..=subtopic_count)
            .map(|i| {
                let nested_count = rng.gen_range(2..=4);
                let nested = (1..=nested_count)
                    .map(|j| Subtopic {
                        id: format!("{slug}-{i}-{j}"),
                        name: format!("{title} Subtopic {i}.{j}"),
                        description: format!(
                            "This is a detailed explanation about {topic} subtopic {i}.{j}."
                        ),
                        content: Some(format!(
                            "{title} is an important concept that includes many aspects including this subtopic."
                        )),
                        subtopics: Vec::new(),
                        resources: vec![
                            Resource::new(ResourceKind::Article, format!("Understanding {topic}")),
                            Resource::new(
                                ResourceKind::Video,
                                format!("Learn {topic} in 10 minutes"),
                            ),
                        ],
                    })
                    .collect();

                Subtopic {
                    id: format!("{slug}-{i}"),
                    name: format!("{title} Subtopic {i}"),
                    description: format!("This is a detailed explanation about {topic} subtopic {i}."),
                    content: Some(format!(
                        "{title} is an important concept that includes many aspects."
                    )),
                    subtopics: nested,
                    resources: vec![
                        Resource::new(ResourceKind::Article, format!("Deep dive into {topic}")),
                        Resource::new(ResourceKind::Video, format!("{topic} explained")),
                    ],
                }
            })
            .collect();

        TopicContent {
            id: slug,
            name: title.clone(),
            description: format!("This is the main topic about {topic}."),
            content: Some(format!(
                "{title} is a key concept that encompasses multiple subtopics and areas of study."
            )),
            video_id: None,
            subtopics,
            resources: vec![
                Resource::new(ResourceKind::Book, format!("Complete guide to {topic}")),
                Resource::new(ResourceKind::Course, format!("Mastering {topic}")),
            ],
        }
    }
}

#[async_trait]
impl ContentSource for MockContentSource {
    async fn generate(&self, topic: &str) -> Result<TopicContent, ContentError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ContentError::MissingTopic);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(Self::content_for(topic))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

fn capitalize(topic: &str) -> String {
    let mut chars = topic.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Seeds a generator from an FNV-1a hash of the topic.
fn topic_rng(topic: &str) -> StdRng {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in topic.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    StdRng::seed_from_u64(hash)
}
