//! Violations and the typed evidence backing them.
//!
//! A [`Violation`] is immutable once created: validators construct it with
//! its confidence, severity, and supporting [`Evidence`], and everything
//! downstream (escalation, enforcement, operator queries) only reads it.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::event::PlayerId;

// ---------------------------------------------------------------------------
// Violation kinds
// ---------------------------------------------------------------------------

/// Every class of cheat or anomaly the validators can flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// Movement faster than the active mode's speed ceiling.
    SpeedHack,
    /// Upward movement inconsistent with gravity.
    FlyHack,
    /// Path passes through solid geometry.
    PhaseHack,
    /// Reported motion that no physical path reproduces (terminal
    /// velocity breach, unreachable endpoint).
    ImpossibleMotion,
    /// Client clock running faster than the server tick.
    TimerHack,
    /// Bridging pattern: falling + fast horizontal movement + block placement.
    Scaffold,
    /// Fall past the damage threshold while claiming to be grounded.
    NoFall,
    /// Inhuman attack cadence.
    KillAura,
    /// Reported velocity outside plausible bounds.
    VelocityAnomaly,
    /// Sustained, systematic velocity desynchronization.
    VelocityDesync,
    /// Packet sequence matching a known cheat-client signature.
    PacketSpoofing,
    /// Inter-packet timing inside a known anomalous window.
    TimingAnomaly,
    /// Live client fingerprint diverging from the established one.
    FingerprintMismatch,
    /// Low-entropy or otherwise non-human action statistics.
    BehaviorAnomaly,
    /// Macro-like repetition loop.
    MacroPattern,
    /// Action with no valid preceding cause.
    CausalViolation,
    /// Action timestamped before its predecessor.
    TemporalInversion,
    /// Client-reported state diverging from server-simulated reality.
    RealityDivergence,
    /// A validator failed internally; fail-closed placeholder.
    SystemAnomaly,
}

impl ViolationKind {
    /// Base suspicion-score contribution of one violation of this kind.
    ///
    /// Scaled by the violation's confidence when applied to the ledger;
    /// the escalation thresholds in `warden-config` are calibrated
    /// against these values.
    pub fn base_severity(self) -> f64 {
        match self {
            Self::SpeedHack => 10.0,
            Self::FlyHack => 12.0,
            Self::PhaseHack => 15.0,
            Self::ImpossibleMotion => 12.0,
            Self::TimerHack => 10.0,
            Self::Scaffold => 8.0,
            Self::NoFall => 8.0,
            Self::KillAura => 12.0,
            Self::VelocityAnomaly => 6.0,
            Self::VelocityDesync => 8.0,
            Self::PacketSpoofing => 15.0,
            Self::TimingAnomaly => 6.0,
            Self::FingerprintMismatch => 8.0,
            Self::BehaviorAnomaly => 6.0,
            Self::MacroPattern => 8.0,
            Self::CausalViolation => 10.0,
            Self::TemporalInversion => 12.0,
            Self::RealityDivergence => 10.0,
            Self::SystemAnomaly => 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

/// What a piece of evidence describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvidenceKind {
    /// A measured speed or distance.
    Measurement,
    /// A position or displacement.
    Position,
    /// A statistical score (entropy, ratio, deviation).
    Statistic,
    /// A matched signature or pattern name.
    Pattern,
    /// A timing observation.
    Timing,
    /// Internal diagnostics (validator failures).
    Diagnostic,
}

/// A closed union of evidence payloads. Always introspectable and
/// serializable; never an opaque blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EvidenceValue {
    /// A scalar measurement.
    Number(f64),
    /// A count or identifier.
    Integer(i64),
    /// A short label (signature name, reason).
    Text(String),
    /// A position or direction.
    Vector(DVec3),
    /// Named scalar components (e.g. per-axis deviations).
    Map(Vec<(String, f64)>),
}

/// A structured, typed fact supporting a violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// What this evidence describes.
    pub kind: EvidenceKind,
    /// The typed payload.
    pub value: EvidenceValue,
    /// How strongly this fact supports the violation, in [0, 1].
    pub confidence: f64,
    /// Human-readable description for operators.
    pub description: String,
}

impl Evidence {
    /// Convenience constructor for a scalar measurement.
    pub fn measurement(description: impl Into<String>, value: f64, confidence: f64) -> Self {
        Self {
            kind: EvidenceKind::Measurement,
            value: EvidenceValue::Number(value),
            confidence,
            description: description.into(),
        }
    }

    /// Convenience constructor for a statistic.
    pub fn statistic(description: impl Into<String>, value: f64, confidence: f64) -> Self {
        Self {
            kind: EvidenceKind::Statistic,
            value: EvidenceValue::Number(value),
            confidence,
            description: description.into(),
        }
    }

    /// Convenience constructor for a matched pattern.
    pub fn pattern(description: impl Into<String>, name: impl Into<String>, confidence: f64) -> Self {
        Self {
            kind: EvidenceKind::Pattern,
            value: EvidenceValue::Text(name.into()),
            confidence,
            description: description.into(),
        }
    }

    /// Convenience constructor for a position.
    pub fn position(description: impl Into<String>, at: DVec3, confidence: f64) -> Self {
        Self {
            kind: EvidenceKind::Position,
            value: EvidenceValue::Vector(at),
            confidence,
            description: description.into(),
        }
    }

    /// Convenience constructor for a timing observation.
    pub fn timing(description: impl Into<String>, millis: f64, confidence: f64) -> Self {
        Self {
            kind: EvidenceKind::Timing,
            value: EvidenceValue::Number(millis),
            confidence,
            description: description.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Violation
// ---------------------------------------------------------------------------

/// A single detected violation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// What was detected.
    pub kind: ViolationKind,
    /// Detection confidence in [0, 1].
    pub confidence: f64,
    /// Suspicion-score contribution (base severity × confidence unless a
    /// validator overrides it).
    pub severity: f64,
    /// Supporting facts.
    pub evidence: Vec<Evidence>,
    /// When the violating behavior was observed, in milliseconds.
    pub timestamp_ms: u64,
    /// Who violated.
    pub player_id: PlayerId,
}

impl Violation {
    /// Creates a violation with severity derived from the kind's base
    /// severity scaled by `confidence`.
    pub fn new(
        kind: ViolationKind,
        confidence: f64,
        evidence: Vec<Evidence>,
        timestamp_ms: u64,
        player_id: PlayerId,
    ) -> Self {
        let confidence = confidence.clamp(0.0, 1.0);
        Self {
            kind,
            confidence,
            severity: kind.base_severity() * confidence,
            evidence,
            timestamp_ms,
            player_id,
        }
    }

    /// A synthetic low-confidence violation standing in for a failed
    /// validator (fail-closed error handling).
    pub fn system_anomaly(
        detail: impl Into<String>,
        timestamp_ms: u64,
        player_id: PlayerId,
    ) -> Self {
        let detail = detail.into();
        Self::new(
            ViolationKind::SystemAnomaly,
            0.1,
            vec![Evidence {
                kind: EvidenceKind::Diagnostic,
                value: EvidenceValue::Text(detail.clone()),
                confidence: 0.1,
                description: format!("validator failure: {detail}"),
            }],
            timestamp_ms,
            player_id,
        )
    }
}
