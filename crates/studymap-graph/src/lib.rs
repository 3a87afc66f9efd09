pub mod guide;
pub mod layout;
pub mod selection;
pub mod store;

pub use guide::StudyGuide;
pub use layout::{LayoutConfig, LayoutEngine, LayoutItem};
pub use selection::{DetailBinding, DetailRequest, DetailStatus, DetailTicket, DetailView};
pub use store::{
    CollapseOutcome, ExpandOutcome, ExpandStart, ExpandTicket, FetchToken, GraphSnapshot,
    GraphStore, IgnoreReason,
};
