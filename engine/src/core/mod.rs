//! Platform-agnostic building blocks shared by task engines.

pub mod format;
pub mod platform;
pub mod qc;
pub mod record;
pub mod timing;
