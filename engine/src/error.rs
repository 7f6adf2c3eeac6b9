//! Engine errors reported to the host.

use thiserror::Error;

use crate::config::ConfigError;
use crate::tasks::nback::Phase;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Cannot {action} while in phase {phase:?}")]
    InvalidTransition { phase: Phase, action: &'static str },

    #[error("No trial is open")]
    NoOpenTrial,
}

pub type EngineResult<T> = Result<T, EngineError>;
