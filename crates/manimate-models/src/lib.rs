//! Shared data models for the manimate backend.
//!
//! This crate provides Serde-serializable types for:
//! - Scene plans produced by the planning stage
//! - Generated renderer source code
//! - Request/response wire shapes at the HTTP boundary

pub mod code;
pub mod plan;
pub mod wire;

// Re-export common types
pub use code::GeneratedCode;
pub use plan::{Caption, ScenePlan, ScenePlanError};
pub use wire::{ErrorResponse, GenerateVideoRequest, GenerateVideoResponse};
