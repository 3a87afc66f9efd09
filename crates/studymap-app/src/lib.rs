//! Visualizer session orchestration: configuration, the session phase
//! machine, and the actor that owns the topic graph.

pub mod config;
pub mod controller;
pub mod session;

pub use config::{AppConfig, ConfigError, ServerConfig};
pub use controller::{SessionStatus, VisualizerController};
pub use session::{GenerationTicket, Session, SessionError};
