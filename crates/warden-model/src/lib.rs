//! Shared data model: telemetry events consumed from the host, violations
//! and their evidence, per-validator results, threat levels, and the
//! enforcement outputs handed back to the host.

mod decision;
mod event;
mod result;
mod violation;

pub use decision::{
    EnforcementAction, EnforcementDecision, EscalationState, RollbackCommand, SuspicionState,
};
pub use event::{ActionCategory, ActionEvent, ActionKind, MovementEvent, PacketEvent, PacketKind,
    PlayerId, TelemetryEvent, VelocityEvent};
pub use result::{
    BatchVerdict, MovementClass, ThreatLevel, ValidationDetail, ValidationResult, ValidatorKind,
};
pub use violation::{Evidence, EvidenceKind, EvidenceValue, Violation, ViolationKind};
