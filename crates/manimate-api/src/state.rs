//! Shared application state.

use std::sync::Arc;

use crate::config::ApiConfig;
use crate::error::ApiResult;
use crate::services::Pipeline;

/// State shared across request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    /// Build production state from config.
    pub fn new(config: ApiConfig) -> ApiResult<Self> {
        let pipeline = Arc::new(Pipeline::new(config.clone())?);
        Ok(Self { config, pipeline })
    }
}
