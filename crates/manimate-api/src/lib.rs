//! HTTP boundary for the narrated-animation pipeline.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod state;
pub mod workspace;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
pub use workspace::RequestWorkspace;
