//! Manim rendering: subprocess invocation, artifact location, and the
//! generate-repair loop.
//!
//! This crate provides:
//! - `RenderInvoker`: runs the renderer with a timeout and captures its streams
//! - `VideoLocator` strategies that find the produced `.mp4` on disk
//! - `repair_render`: the generate → render → repair loop that feeds failing
//!   code and error text back to the code generator

pub mod error;
pub mod invoker;
pub mod locate;
pub mod repair;

pub use error::{RenderError, RenderResult};
pub use invoker::{RenderConfig, RenderInvoker, RenderOutcome, SceneRenderer};
pub use locate::{
    default_locators, LocateContext, MediaTreeLocator, StdoutLocator, VideoLocator,
    WorkspaceScanLocator,
};
pub use repair::{repair_render, CodeGenerator, RepairConfig, RepairReport};
