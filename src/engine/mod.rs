pub mod orchestrator;
pub mod retry;
pub mod scheduler;

pub use orchestrator::{AuthOrchestrator, find_token};
pub use scheduler::Watcher;
