pub mod auth;
pub mod done;
pub mod error;
pub mod health;
pub mod info;
pub mod queue;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::ApiState;
