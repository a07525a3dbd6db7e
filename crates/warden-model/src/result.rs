//! Validator results and batch-level aggregation.
//!
//! Every validator produces the same [`ValidationResult`] shape: the common
//! `valid`/`violations`/`confidence` triple plus a variant-specific
//! [`ValidationDetail`] payload. One tagged type, exhaustively matchable —
//! no trait-object hierarchy.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::event::PlayerId;
use crate::violation::Violation;

// ---------------------------------------------------------------------------
// Validator identity
// ---------------------------------------------------------------------------

/// The six validators plus the orchestrator itself (for synthetic results).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidatorKind {
    /// Movement-physics reconstruction (§ movement checks).
    Movement,
    /// Velocity consistency.
    Velocity,
    /// Packet-flow fingerprinting.
    Packet,
    /// Behavioral entropy and pattern analysis.
    Behavior,
    /// Causal action-graph validation.
    Causal,
    /// Client/server reality divergence.
    Divergence,
}

impl ValidatorKind {
    /// All validators, in dispatch order.
    pub const ALL: [ValidatorKind; 6] = [
        ValidatorKind::Movement,
        ValidatorKind::Velocity,
        ValidatorKind::Packet,
        ValidatorKind::Behavior,
        ValidatorKind::Causal,
        ValidatorKind::Divergence,
    ];
}

// ---------------------------------------------------------------------------
// Movement classification
// ---------------------------------------------------------------------------

/// How the movement validator classified one movement step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementClass {
    Walk,
    Sprint,
    Jump,
    Fall,
    Fly,
    Phase,
    Teleport,
}

// ---------------------------------------------------------------------------
// Detail payloads
// ---------------------------------------------------------------------------

/// Variant-specific payload of a [`ValidationResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationDetail {
    /// Movement-physics detail.
    Movement {
        /// Sub-tick reconstructed path (including both endpoints).
        reconstructed_path: Vec<DVec3>,
        /// Distance between the reconstructed final position and the
        /// client-reported one, in blocks.
        divergence: f64,
        /// Classification of the step.
        classification: MovementClass,
    },
    /// Velocity-consistency detail.
    Velocity {
        /// `1 − mean(normalized deviations)` over the recent window.
        consistency: f64,
        /// Samples currently in the window.
        window_len: usize,
        /// Whether a freeze was recommended (systematic desync).
        freeze_recommended: bool,
    },
    /// Packet-flow detail.
    Packet {
        /// Live average packet size, bytes.
        avg_size: f64,
        /// Live inter-packet timing variance, ms².
        timing_variance: f64,
        /// Live compression ratio.
        compression_ratio: f64,
    },
    /// Behavior-pattern detail.
    Behavior {
        /// Shannon entropy of the action-kind distribution, normalized
        /// to [0, 1].
        entropy: f64,
        /// Human-likeness composite in [0, 1].
        human_likeness: f64,
        /// Blended anomaly score in [0, 1].
        anomaly_score: f64,
    },
    /// Causal-chain detail.
    Causal {
        /// Actions currently retained in the chain.
        chain_len: usize,
        /// Derived cause→effect edges.
        edge_count: usize,
    },
    /// Reality-divergence detail.
    Divergence {
        /// Weighted position component of the divergence.
        position_divergence: f64,
        /// Weighted velocity component of the divergence.
        velocity_divergence: f64,
        /// Environment-flag mismatch count.
        flag_mismatches: u32,
        /// Whether a rollback was recommended.
        rollback_recommended: bool,
    },
    /// No payload (synthetic failure results).
    None,
}

// ---------------------------------------------------------------------------
// ValidationResult
// ---------------------------------------------------------------------------

/// The outcome of running one validator against one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Which validator produced this result.
    pub validator: ValidatorKind,
    /// `true` when no violations were detected.
    pub valid: bool,
    /// Detected violations (empty when `valid`).
    pub violations: Vec<Violation>,
    /// Validator confidence in the player's innocence, in [0, 1].
    pub confidence: f64,
    /// Variant-specific payload.
    pub detail: ValidationDetail,
}

impl ValidationResult {
    /// A clean result: no violations, full confidence.
    pub fn clean(validator: ValidatorKind, detail: ValidationDetail) -> Self {
        Self {
            validator,
            valid: true,
            violations: Vec::new(),
            confidence: 1.0,
            detail,
        }
    }

    /// A result carrying violations. Confidence is clamped to [0, 1].
    pub fn flagged(
        validator: ValidatorKind,
        violations: Vec<Violation>,
        confidence: f64,
        detail: ValidationDetail,
    ) -> Self {
        Self {
            validator,
            valid: violations.is_empty(),
            confidence: confidence.clamp(0.0, 1.0),
            violations,
            detail,
        }
    }

    /// The synthetic result standing in for a validator that panicked or
    /// overran its deadline.
    pub fn failure(
        validator: ValidatorKind,
        detail_msg: impl Into<String>,
        timestamp_ms: u64,
        player_id: PlayerId,
    ) -> Self {
        let violation = Violation::system_anomaly(detail_msg, timestamp_ms, player_id);
        Self {
            validator,
            valid: false,
            violations: vec![violation],
            confidence: 0.1,
            detail: ValidationDetail::None,
        }
    }
}

// ---------------------------------------------------------------------------
// Threat level
// ---------------------------------------------------------------------------

/// Ordinal classification of one validation batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ThreatLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    /// Derives a threat level from the maximum violation severity and the
    /// mean violation confidence of one batch.
    pub fn classify(max_severity: f64, mean_confidence: f64) -> Self {
        if max_severity <= 0.0 {
            return Self::Safe;
        }
        // Weight severity by how certain the batch is overall.
        let weighted = max_severity * mean_confidence;
        if weighted >= 12.0 {
            Self::Critical
        } else if weighted >= 8.0 {
            Self::High
        } else if weighted >= 4.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

// ---------------------------------------------------------------------------
// BatchVerdict
// ---------------------------------------------------------------------------

/// The merged outcome of all validators dispatched for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchVerdict {
    /// Player the event belonged to.
    pub player_id: PlayerId,
    /// Event timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// Every per-validator result, in dispatch order.
    pub results: Vec<ValidationResult>,
    /// Union of all violations across results.
    pub violations: Vec<Violation>,
    /// Product of per-validator confidences.
    pub confidence: f64,
    /// Derived ordinal threat level.
    pub threat: ThreatLevel,
}

impl BatchVerdict {
    /// Merges per-validator results into a batch verdict.
    ///
    /// Overall confidence is the product of component confidences, so a
    /// single low-confidence validator dominates (conservative). Threat is
    /// classified from the max violation severity and mean violation
    /// confidence.
    pub fn merge(
        player_id: PlayerId,
        timestamp_ms: u64,
        results: Vec<ValidationResult>,
    ) -> Self {
        let mut violations = Vec::new();
        let mut confidence = 1.0_f64;
        for result in &results {
            confidence *= result.confidence.clamp(0.0, 1.0);
            violations.extend(result.violations.iter().cloned());
        }

        let max_severity = violations.iter().map(|v| v.severity).fold(0.0, f64::max);
        let mean_confidence = if violations.is_empty() {
            0.0
        } else {
            violations.iter().map(|v| v.confidence).sum::<f64>() / violations.len() as f64
        };

        Self {
            player_id,
            timestamp_ms,
            results,
            violations,
            confidence,
            threat: ThreatLevel::classify(max_severity, mean_confidence),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::ViolationKind;

    fn flagged(validator: ValidatorKind, kind: ViolationKind, confidence: f64) -> ValidationResult {
        let v = Violation::new(kind, confidence, vec![], 0, 1);
        ValidationResult::flagged(validator, vec![v], 1.0 - confidence * 0.5, ValidationDetail::None)
    }

    #[test]
    fn test_merge_confidence_is_product() {
        let a = ValidationResult::clean(ValidatorKind::Movement, ValidationDetail::None);
        let mut b = ValidationResult::clean(ValidatorKind::Velocity, ValidationDetail::None);
        b.confidence = 0.5;
        let mut c = ValidationResult::clean(ValidatorKind::Packet, ValidationDetail::None);
        c.confidence = 0.8;

        let verdict = BatchVerdict::merge(1, 0, vec![a, b, c]);
        assert!((verdict.confidence - 0.4).abs() < 1e-9);
        // Product never exceeds the minimum component.
        assert!(verdict.confidence <= 0.5);
    }

    #[test]
    fn test_merge_unions_violations() {
        let a = flagged(ValidatorKind::Movement, ViolationKind::SpeedHack, 0.9);
        let b = flagged(ValidatorKind::Packet, ViolationKind::PacketSpoofing, 0.8);
        let verdict = BatchVerdict::merge(1, 0, vec![a, b]);
        assert_eq!(verdict.violations.len(), 2);
        assert!(verdict.threat > ThreatLevel::Safe);
    }

    #[test]
    fn test_clean_batch_is_safe() {
        let results = vec![
            ValidationResult::clean(ValidatorKind::Movement, ValidationDetail::None),
            ValidationResult::clean(ValidatorKind::Causal, ValidationDetail::None),
        ];
        let verdict = BatchVerdict::merge(1, 0, results);
        assert_eq!(verdict.threat, ThreatLevel::Safe);
        assert_eq!(verdict.confidence, 1.0);
        assert!(verdict.violations.is_empty());
    }

    #[test]
    fn test_threat_classification_ordering() {
        assert_eq!(ThreatLevel::classify(0.0, 0.0), ThreatLevel::Safe);
        assert_eq!(ThreatLevel::classify(2.0, 0.5), ThreatLevel::Low);
        assert_eq!(ThreatLevel::classify(10.0, 0.5), ThreatLevel::Medium);
        assert_eq!(ThreatLevel::classify(10.0, 0.9), ThreatLevel::High);
        assert_eq!(ThreatLevel::classify(15.0, 0.95), ThreatLevel::Critical);
        assert!(ThreatLevel::Safe < ThreatLevel::Critical);
    }

    #[test]
    fn test_failure_result_is_fail_closed() {
        let r = ValidationResult::failure(ValidatorKind::Behavior, "deadline exceeded", 5, 2);
        assert!(!r.valid);
        assert_eq!(r.violations.len(), 1);
        assert_eq!(r.violations[0].kind, ViolationKind::SystemAnomaly);
        assert!(r.confidence <= 0.1);
    }
}
