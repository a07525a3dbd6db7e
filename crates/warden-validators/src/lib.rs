//! The six independent validators.
//!
//! Each validator reads the player's pre-event snapshot plus the incoming
//! event and produces a [`ValidationResult`]; none observes another's
//! output for the same event, and none mutates state — commits happen in
//! the engine after fan-in. Validators are `Send + Sync` and hold only
//! configuration, so one instance serves all players concurrently.

mod behavior;
mod causal;
mod divergence;
mod movement;
mod packet;
mod signatures;
mod velocity;

pub use behavior::BehaviorValidator;
pub use causal::CausalValidator;
pub use divergence::{DivergenceBreakdown, RealityDivergenceValidator, measure_divergence};
pub use movement::MovementValidator;
pub use packet::PacketFlowValidator;
pub use signatures::{CheatSignature, CompressionBand, SignatureTable, TimingWindow};
pub use velocity::VelocityValidator;

use warden_model::{TelemetryEvent, ValidationResult, ValidatorKind};
use warden_state::PlayerState;

/// A single detection signal.
///
/// `validate` must be pure with respect to shared state: it may read the
/// snapshot and the event, never the registry.
pub trait Validator: Send + Sync {
    /// Which validator this is.
    fn kind(&self) -> ValidatorKind;

    /// Runs the validator against one event.
    fn validate(
        &self,
        state: &PlayerState,
        event: &TelemetryEvent,
        now_ms: u64,
    ) -> ValidationResult;
}
