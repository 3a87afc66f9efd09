mod dto;
mod errors;
mod events;

pub use dto::{ChapterRequest, DetailDto, NodeRequest, TopicRequest, VisualizerStateDto};
pub use errors::ApiError;
pub use events::AppEventPayload;
