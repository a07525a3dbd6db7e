//! The Warden engine: validation orchestration, suspicion escalation,
//! rollback, and the per-player-ordered event pipeline.
//!
//! Hosts construct a [`WardenEngine`], feed it [`warden_model::TelemetryEvent`]s,
//! and drain [`EngineOutput`]s (enforcement decisions and rollback
//! commands) from the explicitly-owned output channel. There is no global
//! event bus.

mod dispatch;
mod error;
mod escalation;
mod orchestrator;
mod pipeline;
mod rollback;
mod stats;

pub use dispatch::{EnforcementDispatcher, EngineOutput};
pub use error::PipelineError;
pub use escalation::{EscalationOutcome, apply_violation_batch};
pub use orchestrator::ValidationOrchestrator;
pub use pipeline::WardenEngine;
pub use rollback::RollbackEngine;
pub use stats::{PlayerValidatorStats, ValidatorStat};
