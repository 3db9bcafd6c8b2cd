pub mod api;
pub mod config;
pub mod queue;
pub mod staging;
pub mod supervisor;
pub mod task;

pub use api::{build_router, ApiState};
pub use config::TokenStore;
pub use queue::QueueEngine;
pub use staging::StagingEngine;
