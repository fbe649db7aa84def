mod core;
mod feedback;
mod planner;
mod session;
mod watcher;

pub use core::{Orchestrator, WatchOptions};
pub use feedback::FeedbackAnalyzer;
pub use planner::{BarProgress, BuildLayout, BuildPlanner, BuildProgress, NoProgress, Sweep};
pub use session::{RunOutcome, RunSession};
pub use watcher::{
    DEFAULT_DEBOUNCE, EventCallback, EventSource, NotifySource, PatternSet, WatchEvent, WatchLoop,
};
