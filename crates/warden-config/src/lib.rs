//! Configuration for the Warden engine: physics constants, per-validator
//! thresholds, escalation thresholds, and pipeline sizing, with sensible
//! defaults, RON persistence, and CLI overrides.
//!
//! Detection weights and penalties were chosen empirically against live
//! traffic; they are tunables, not contract. Hosts adjust them here rather
//! than patching validator code.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    BehaviorConfig, CausalConfig, DebugConfig, DivergenceConfig, EscalationConfig, HistoryConfig,
    MovementConfig, PacketConfig, PhysicsConfig, PipelineConfig, VelocityConfig, WardenConfig,
};
pub use error::ConfigError;
