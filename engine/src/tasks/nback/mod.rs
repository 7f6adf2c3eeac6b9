//! Adaptive spatial N-back: sequence generation, trial timing, scoring, the
//! between-block staircase and the session that ties them together.

pub mod clock;
pub mod engine;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod scoring;
pub mod sequence;
pub mod session;
pub mod staircase;

pub use engine::{Advance, EngineEvent, NBackEngine, NBackReport, ResponseOutcome, SessionOutcome};
pub use export::TestItemPayload;
pub use metrics::NBackResult;
pub use runner::{channel, run, NBackHandle, NBackMessage, NBackQueue};
pub use scoring::Classification;
pub use session::{Phase, TrialCue, TrialRecord};
pub use staircase::{BlockSummary, LevelChange};
