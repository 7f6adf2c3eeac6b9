//! Adaptive N-back working-memory engine.
//!
//! The engine is host-agnostic: a CLI, a desktop shell or a browser build
//! drive the same [`tasks::nback::NBackEngine`], either directly with
//! synthetic timestamps or through the async [`tasks::nback::run`] loop.

pub mod config;
pub mod core;
pub mod error;
pub mod tasks;

pub use config::{ConfigError, NBackConfig};
pub use error::{EngineError, EngineResult};
