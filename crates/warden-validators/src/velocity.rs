//! Velocity consistency validation: server-predicted vs client-reported
//! velocity, judged against a sliding window of recent pairs.

use warden_config::{PhysicsConfig, VelocityConfig};
use warden_model::{
    Evidence, TelemetryEvent, ValidationDetail, ValidationResult, ValidatorKind, VelocityEvent,
    Violation, ViolationKind,
};
use warden_state::{PlayerState, VelocityRecord};

use crate::Validator;

/// Expected-velocity magnitude below which knockback comparison is noise.
const KNOCKBACK_MIN_EXPECTED: f64 = 0.5;

/// Velocity consistency validator.
pub struct VelocityValidator {
    cfg: VelocityConfig,
    physics: PhysicsConfig,
}

impl VelocityValidator {
    /// Creates a validator with the given thresholds.
    pub fn new(cfg: VelocityConfig, physics: PhysicsConfig) -> Self {
        Self { cfg, physics }
    }

    fn validate_velocity(&self, state: &PlayerState, ev: &VelocityEvent) -> ValidationResult {
        // Window = stored pairs plus the incoming one.
        let mut window: Vec<VelocityRecord> = state
            .velocity_pairs
            .recent(self.cfg.window.saturating_sub(1))
            .copied()
            .collect();
        window.push(VelocityRecord {
            timestamp_ms: ev.timestamp_ms,
            expected: ev.expected,
            actual: ev.actual,
        });

        let mut violations = Vec::new();
        let mut freeze_recommended = false;

        let actual_mag = ev.actual.length();
        let expected_mag = ev.expected.length();

        // Hard magnitude ceiling.
        if self.cfg.check_magnitude && actual_mag > self.cfg.max_magnitude {
            violations.push(Violation::new(
                ViolationKind::VelocityAnomaly,
                ((actual_mag / self.cfg.max_magnitude - 1.0) * 2.0).clamp(0.6, 1.0),
                vec![Evidence::measurement(
                    format!(
                        "velocity magnitude {actual_mag:.2} blocks/s exceeds ceiling {:.2}",
                        self.cfg.max_magnitude
                    ),
                    actual_mag,
                    0.9,
                )],
                ev.timestamp_ms,
                ev.player_id,
            ));
        }

        // Sudden change against the windowed moving average.
        if self.cfg.check_sudden_change && window.len() >= 4 {
            let mean_mag: f64 = window[..window.len() - 1]
                .iter()
                .map(|r| r.actual.length())
                .sum::<f64>()
                / (window.len() - 1) as f64;
            if mean_mag > 0.1 {
                let relative = (actual_mag - mean_mag).abs() / mean_mag;
                if relative > self.cfg.sudden_change_threshold {
                    violations.push(Violation::new(
                        ViolationKind::VelocityAnomaly,
                        (relative / 4.0).clamp(0.5, 0.9),
                        vec![Evidence::statistic(
                            format!(
                                "velocity jumped {relative:.0}× the moving average of {mean_mag:.2}"
                            ),
                            relative,
                            0.7,
                        )],
                        ev.timestamp_ms,
                        ev.player_id,
                    ));
                }
            }
        }

        // Knockback impulse mismatch.
        if self.cfg.check_knockback && expected_mag > KNOCKBACK_MIN_EXPECTED {
            let mismatch = (ev.actual - ev.expected).length() / expected_mag;
            if mismatch > self.cfg.knockback_tolerance {
                violations.push(Violation::new(
                    ViolationKind::VelocityAnomaly,
                    (mismatch / 2.0).clamp(0.5, 0.9),
                    vec![Evidence::statistic(
                        format!(
                            "knockback response off by {:.0}% of the expected impulse",
                            mismatch * 100.0
                        ),
                        mismatch,
                        0.75,
                    )],
                    ev.timestamp_ms,
                    ev.player_id,
                ));
            }
        }

        // Systematic desync across the window.
        let deviations: Vec<f64> = window.iter().map(normalized_deviation).collect();
        if self.cfg.check_desync && window.len() >= 8 {
            let exceeding = deviations
                .iter()
                .filter(|&&d| d > self.cfg.desync_tolerance)
                .count();
            let fraction = exceeding as f64 / deviations.len() as f64;
            if fraction > self.cfg.desync_ratio {
                freeze_recommended = true;
                let delta = ev.actual - ev.expected;
                violations.push(Violation::new(
                    ViolationKind::VelocityDesync,
                    fraction.clamp(0.7, 0.95),
                    vec![
                        Evidence::statistic(
                            format!(
                                "{:.0}% of the last {} velocity reports exceed tolerance",
                                fraction * 100.0,
                                deviations.len()
                            ),
                            fraction,
                            0.85,
                        ),
                        Evidence {
                            kind: warden_model::EvidenceKind::Measurement,
                            value: warden_model::EvidenceValue::Map(vec![
                                ("dx".to_string(), delta.x),
                                ("dy".to_string(), delta.y),
                                ("dz".to_string(), delta.z),
                            ]),
                            confidence: 0.8,
                            description: "per-axis deviation of the latest report".to_string(),
                        },
                    ],
                    ev.timestamp_ms,
                    ev.player_id,
                ));
            }
        }

        // Gravity step: airborne Δy between consecutive reports must track
        // the gravity constant.
        if self.cfg.check_gravity
            && !state.environment.grounded
            && let Some(prev) = state.velocity_pairs.back()
        {
            let dt_s = ev.timestamp_ms.saturating_sub(prev.timestamp_ms).max(1) as f64 / 1_000.0;
            let expected_dy = -self.physics.gravity * dt_s;
            let actual_dy = ev.actual.y - prev.actual.y;
            if (actual_dy - expected_dy).abs() > self.cfg.gravity_step_tolerance
                && ev.actual.y > -self.physics.terminal_velocity + 1.0
            {
                violations.push(Violation::new(
                    ViolationKind::VelocityAnomaly,
                    0.6,
                    vec![Evidence::measurement(
                        format!(
                            "vertical velocity step {actual_dy:.2} vs gravity step {expected_dy:.2}"
                        ),
                        actual_dy,
                        0.6,
                    )],
                    ev.timestamp_ms,
                    ev.player_id,
                ));
            }
        }

        // Consistency score: 1 − mean normalized deviation.
        let mean_dev = deviations.iter().sum::<f64>() / deviations.len() as f64;
        let consistency = (1.0 - mean_dev).clamp(0.0, 1.0);

        ValidationResult::flagged(
            ValidatorKind::Velocity,
            violations,
            consistency,
            ValidationDetail::Velocity {
                consistency,
                window_len: window.len(),
                freeze_recommended,
            },
        )
    }
}

impl Validator for VelocityValidator {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Velocity
    }

    fn validate(
        &self,
        state: &PlayerState,
        event: &TelemetryEvent,
        _now_ms: u64,
    ) -> ValidationResult {
        match event {
            TelemetryEvent::Velocity(ev) => self.validate_velocity(state, ev),
            TelemetryEvent::Comprehensive { timestamp_ms, .. } => {
                match state.velocity_pairs.back() {
                    Some(rec) => {
                        let ev = VelocityEvent {
                            player_id: state.player_id,
                            timestamp_ms: *timestamp_ms,
                            expected: rec.expected,
                            actual: rec.actual,
                        };
                        self.validate_velocity(state, &ev)
                    }
                    None => ValidationResult::clean(
                        ValidatorKind::Velocity,
                        ValidationDetail::None,
                    ),
                }
            }
            _ => ValidationResult::clean(ValidatorKind::Velocity, ValidationDetail::None),
        }
    }
}

/// Deviation of one pair, normalized by the expected magnitude (floored so
/// small expectations don't explode the ratio).
fn normalized_deviation(rec: &VelocityRecord) -> f64 {
    (rec.actual - rec.expected).length() / rec.expected.length().max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use warden_config::HistoryConfig;

    fn validator() -> VelocityValidator {
        VelocityValidator::new(VelocityConfig::default(), PhysicsConfig::default())
    }

    fn velocity_event(ts: u64, expected: DVec3, actual: DVec3) -> TelemetryEvent {
        TelemetryEvent::Velocity(VelocityEvent {
            player_id: 1,
            timestamp_ms: ts,
            expected,
            actual,
        })
    }

    fn state_with_pairs(pairs: &[(u64, DVec3, DVec3)]) -> PlayerState {
        let mut s = PlayerState::new(1, 0, &HistoryConfig::default());
        for (ts, expected, actual) in pairs {
            s.record_velocity(&VelocityEvent {
                player_id: 1,
                timestamp_ms: *ts,
                expected: *expected,
                actual: *actual,
            });
        }
        s
    }

    #[test]
    fn test_matching_velocity_is_valid() {
        let v = validator();
        let state = state_with_pairs(&[]);
        let ev = velocity_event(50, DVec3::new(2.0, 0.0, 0.0), DVec3::new(2.0, 0.0, 0.0));
        let result = v.validate(&state, &ev, 50);
        assert!(result.valid, "{:?}", result.violations);
        match result.detail {
            ValidationDetail::Velocity { consistency, .. } => {
                assert!(consistency > 0.99);
            }
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn test_magnitude_ceiling_flagged() {
        let v = validator();
        let state = state_with_pairs(&[]);
        let ev = velocity_event(50, DVec3::ZERO, DVec3::new(100.0, 0.0, 0.0));
        let result = v.validate(&state, &ev, 50);
        assert!(
            result
                .violations
                .iter()
                .any(|v| v.kind == ViolationKind::VelocityAnomaly),
            "{:?}",
            result.violations
        );
    }

    #[test]
    fn test_knockback_mismatch_flagged() {
        let v = validator();
        let state = state_with_pairs(&[]);
        // Server expects a 4-block/s knockback; client reports standing
        // still (anti-knockback).
        let ev = velocity_event(50, DVec3::new(4.0, 0.0, 0.0), DVec3::ZERO);
        let result = v.validate(&state, &ev, 50);
        assert!(
            result
                .violations
                .iter()
                .any(|v| v.kind == ViolationKind::VelocityAnomaly),
            "{:?}",
            result.violations
        );
    }

    #[test]
    fn test_systematic_desync_recommends_freeze() {
        let v = validator();
        // 20 pairs, all badly desynced.
        let pairs: Vec<_> = (0..20u64)
            .map(|i| {
                (
                    i * 50,
                    DVec3::new(3.0, 0.0, 0.0),
                    DVec3::new(9.0, 0.0, 0.0),
                )
            })
            .collect();
        let state = state_with_pairs(&pairs);
        let ev = velocity_event(1_000, DVec3::new(3.0, 0.0, 0.0), DVec3::new(9.0, 0.0, 0.0));
        let result = v.validate(&state, &ev, 1_000);
        let desync: Vec<_> = result
            .violations
            .iter()
            .filter(|v| v.kind == ViolationKind::VelocityDesync)
            .collect();
        assert_eq!(desync.len(), 1, "{:?}", result.violations);
        match result.detail {
            ValidationDetail::Velocity {
                freeze_recommended, ..
            } => assert!(freeze_recommended),
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn test_consistency_score_degrades_with_deviation() {
        let v = validator();
        let clean_state = state_with_pairs(&[(0, DVec3::X, DVec3::X)]);
        let clean = v.validate(
            &clean_state,
            &velocity_event(50, DVec3::X, DVec3::X),
            50,
        );

        let noisy_state = state_with_pairs(&[(0, DVec3::X, DVec3::X * 3.0)]);
        let noisy = v.validate(
            &noisy_state,
            &velocity_event(50, DVec3::X, DVec3::X * 3.0),
            50,
        );

        let (c_clean, c_noisy) = match (clean.detail, noisy.detail) {
            (
                ValidationDetail::Velocity {
                    consistency: a, ..
                },
                ValidationDetail::Velocity {
                    consistency: b, ..
                },
            ) => (a, b),
            other => panic!("unexpected details {other:?}"),
        };
        assert!(c_clean > c_noisy);
        assert!((0.0..=1.0).contains(&c_noisy));
    }

    #[test]
    fn test_disabled_checks_do_not_fire() {
        let cfg = VelocityConfig {
            check_magnitude: false,
            check_knockback: false,
            ..Default::default()
        };
        let v = VelocityValidator::new(cfg, PhysicsConfig::default());
        let state = state_with_pairs(&[]);
        let ev = velocity_event(50, DVec3::new(4.0, 0.0, 0.0), DVec3::new(100.0, 0.0, 0.0));
        let result = v.validate(&state, &ev, 50);
        assert!(result.valid, "{:?}", result.violations);
    }
}
