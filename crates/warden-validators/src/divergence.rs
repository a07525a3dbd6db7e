//! Reality-divergence validation: the server simulates each player
//! forward with the shared physics kernel and measures how far the
//! client's reported state drifts from that simulated reality.
//!
//! The "expected" state is a weighted ensemble of three deterministic
//! predictors — dead reckoning, physics integration, and the last trusted
//! state — with configurable weights.

use glam::DVec3;
use warden_config::{DivergenceConfig, PhysicsConfig};
use warden_model::{
    Evidence, MovementEvent, TelemetryEvent, ValidationDetail, ValidationResult, ValidatorKind,
    Violation, ViolationKind,
};
use warden_physics::Environment;
use warden_state::{PlayerState, ServerReality};

use crate::Validator;

/// Weighted divergence between simulated reality and a client report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DivergenceBreakdown {
    /// Weighted position component.
    pub position: f64,
    /// Weighted velocity component.
    pub velocity: f64,
    /// Raw environment-flag mismatch count.
    pub flag_mismatches: u32,
    /// Total weighted divergence.
    pub total: f64,
}

/// Computes the ensemble-expected state and its divergence from a report.
///
/// Shared with the engine's state-commit path so the validator's verdict
/// and the registry's counter bookkeeping always agree.
pub fn measure_divergence(
    reality: &ServerReality,
    reported_position: DVec3,
    reported_velocity: DVec3,
    reported_env: Environment,
    dt_s: f64,
    cfg: &DivergenceConfig,
    physics: &PhysicsConfig,
) -> DivergenceBreakdown {
    let weight_sum =
        (cfg.weight_dead_reckon + cfg.weight_integrated + cfg.weight_last_trusted).max(1e-9);

    // Predictor 1: dead reckoning.
    let dead_reckon = reality.position + reality.velocity * dt_s;
    // Predictor 2: physics integration.
    let mut integrated = *reality;
    integrated.advance(dt_s, physics);
    // Predictor 3: last trusted state.
    let last_trusted = reality.position;

    let expected_position = (dead_reckon * cfg.weight_dead_reckon
        + integrated.position * cfg.weight_integrated
        + last_trusted * cfg.weight_last_trusted)
        / weight_sum;
    let expected_velocity = (reality.velocity * cfg.weight_dead_reckon
        + integrated.velocity * cfg.weight_integrated
        + reality.velocity * cfg.weight_last_trusted)
        / weight_sum;

    let position = cfg.position_weight * expected_position.distance(reported_position);
    let velocity = cfg.velocity_weight * expected_velocity.distance(reported_velocity);
    let flag_mismatches = reality.environment.mismatch_count(reported_env);
    let total = position + velocity + cfg.flag_weight * flag_mismatches as f64;

    DivergenceBreakdown {
        position,
        velocity,
        flag_mismatches,
        total,
    }
}

/// Reality-divergence validator.
pub struct RealityDivergenceValidator {
    cfg: DivergenceConfig,
    physics: PhysicsConfig,
}

impl RealityDivergenceValidator {
    /// Creates a validator with the given thresholds.
    pub fn new(cfg: DivergenceConfig, physics: PhysicsConfig) -> Self {
        Self { cfg, physics }
    }

    fn validate_movement(
        &self,
        state: &PlayerState,
        ev: &MovementEvent,
        now_ms: u64,
    ) -> ValidationResult {
        // No reality to compare against until the first committed step
        // anchors it.
        if state.movement.is_empty() {
            return ValidationResult::clean(ValidatorKind::Divergence, ValidationDetail::None);
        }

        let dt_ms = ev.timestamp_ms.saturating_sub(state.last_event_ms).max(1);
        let dt_s = dt_ms as f64 / 1_000.0;
        let reported_velocity = (ev.to - ev.from) / dt_s;
        let reported_env = Environment {
            grounded: ev.on_ground,
            ..state.environment
        };

        let breakdown = measure_divergence(
            &state.reality,
            ev.to,
            reported_velocity,
            reported_env,
            dt_s,
            &self.cfg,
            &self.physics,
        );

        let diverged = breakdown.total > self.cfg.tolerance;
        let mut violations = Vec::new();

        // Mirror the counter/cooldown bookkeeping on a scratch copy to
        // decide whether this observation would force a resync; the real
        // counters move when the engine commits the event.
        let mut scratch = state.reality;
        scratch.advance(dt_s, &self.physics);
        let anchor_pos = scratch.position;
        let anchor_vel = scratch.velocity;
        let rollback_recommended = scratch.observe(
            diverged,
            anchor_pos,
            anchor_vel,
            now_ms,
            self.cfg.counter_threshold,
            self.cfg.resync_cooldown_ms,
        );

        if diverged {
            violations.push(Violation::new(
                ViolationKind::RealityDivergence,
                (breakdown.total / (self.cfg.tolerance * 4.0)).clamp(0.6, 0.95),
                vec![
                    Evidence::measurement(
                        format!(
                            "weighted divergence {:.2} against tolerance {:.2}",
                            breakdown.total, self.cfg.tolerance
                        ),
                        breakdown.total,
                        0.8,
                    ),
                    Evidence::position("reported position", ev.to, 1.0),
                    Evidence::position("simulated position", state.reality.position, 0.8),
                ],
                ev.timestamp_ms,
                ev.player_id,
            ));
        }

        let confidence = if diverged {
            (1.0 - (breakdown.total / (self.cfg.tolerance * 8.0)).min(0.9)).max(0.1)
        } else {
            1.0
        };

        ValidationResult::flagged(
            ValidatorKind::Divergence,
            violations,
            confidence,
            ValidationDetail::Divergence {
                position_divergence: breakdown.position,
                velocity_divergence: breakdown.velocity,
                flag_mismatches: breakdown.flag_mismatches,
                rollback_recommended,
            },
        )
    }
}

impl Validator for RealityDivergenceValidator {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Divergence
    }

    fn validate(
        &self,
        state: &PlayerState,
        event: &TelemetryEvent,
        now_ms: u64,
    ) -> ValidationResult {
        match event {
            TelemetryEvent::Movement(ev) => self.validate_movement(state, ev, now_ms),
            TelemetryEvent::Comprehensive { timestamp_ms, .. } => match state.movement.back() {
                Some(rec) => {
                    let ev = MovementEvent {
                        player_id: state.player_id,
                        timestamp_ms: *timestamp_ms,
                        from: rec.from,
                        to: rec.to,
                        on_ground: rec.on_ground,
                    };
                    self.validate_movement(state, &ev, now_ms)
                }
                None => {
                    ValidationResult::clean(ValidatorKind::Divergence, ValidationDetail::None)
                }
            },
            _ => ValidationResult::clean(ValidatorKind::Divergence, ValidationDetail::None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_config::HistoryConfig;

    fn validator() -> RealityDivergenceValidator {
        RealityDivergenceValidator::new(DivergenceConfig::default(), PhysicsConfig::default())
    }

    /// A grounded player at `pos` whose reality agrees with the client.
    fn synced_state(pos: DVec3) -> PlayerState {
        let mut s = PlayerState::new(1, 0, &HistoryConfig::default());
        s.record_movement(&MovementEvent {
            player_id: 1,
            timestamp_ms: 50,
            from: pos,
            to: pos,
            on_ground: true,
        });
        s.velocity = DVec3::ZERO;
        s.reality = ServerReality::anchored_at(pos, 50);
        s.reality.environment = Environment {
            grounded: true,
            ..Default::default()
        };
        s
    }

    fn movement(ts: u64, from: DVec3, to: DVec3) -> TelemetryEvent {
        TelemetryEvent::Movement(MovementEvent {
            player_id: 1,
            timestamp_ms: ts,
            from,
            to,
            on_ground: true,
        })
    }

    #[test]
    fn test_agreeing_client_is_clean() {
        let v = validator();
        let pos = DVec3::new(0.0, 64.0, 0.0);
        let state = synced_state(pos);
        // Client stays put; simulated reality (zero velocity, grounded)
        // also stays put.
        let ev = movement(100, pos, pos);
        let result = v.validate(&state, &ev, 100);
        assert!(result.valid, "{:?}", result.violations);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_divergent_client_is_flagged() {
        let v = validator();
        let pos = DVec3::new(0.0, 64.0, 0.0);
        let state = synced_state(pos);
        // Client claims to be 6 blocks away from everything the server
        // can predict.
        let ev = movement(100, pos, pos + DVec3::new(6.0, 0.0, 0.0));
        let result = v.validate(&state, &ev, 100);
        assert!(
            result
                .violations
                .iter()
                .any(|v| v.kind == ViolationKind::RealityDivergence),
            "{:?}",
            result.violations
        );
        assert!(result.confidence < 1.0);
    }

    #[test]
    fn test_rollback_recommended_after_sustained_divergence() {
        let v = validator();
        let pos = DVec3::new(0.0, 64.0, 0.0);
        let mut state = synced_state(pos);
        // Pre-load the counter to just below the threshold with the last
        // resync far in the past.
        state.reality.divergence_counter = 4;
        state.reality.last_resync_ms = 0;

        let ev = movement(20_000, pos, pos + DVec3::new(6.0, 0.0, 0.0));
        let result = v.validate(&state, &ev, 20_000);
        match result.detail {
            ValidationDetail::Divergence {
                rollback_recommended,
                ..
            } => assert!(rollback_recommended),
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn test_no_rollback_inside_cooldown() {
        let v = validator();
        let pos = DVec3::new(0.0, 64.0, 0.0);
        let mut state = synced_state(pos);
        state.reality.divergence_counter = 10;
        state.reality.last_resync_ms = 19_900; // resynced 100 ms ago

        let ev = movement(20_000, pos, pos + DVec3::new(6.0, 0.0, 0.0));
        let result = v.validate(&state, &ev, 20_000);
        match result.detail {
            ValidationDetail::Divergence {
                rollback_recommended,
                ..
            } => assert!(!rollback_recommended),
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn test_first_event_has_no_reality_to_compare() {
        let v = validator();
        let state = PlayerState::new(1, 0, &HistoryConfig::default());
        let ev = movement(50, DVec3::ZERO, DVec3::new(100.0, 64.0, 0.0));
        let result = v.validate(&state, &ev, 50);
        assert!(result.valid);
    }

    #[test]
    fn test_measure_divergence_is_deterministic() {
        let reality = ServerReality::anchored_at(DVec3::new(1.0, 64.0, 1.0), 0);
        let cfg = DivergenceConfig::default();
        let physics = PhysicsConfig::default();
        let a = measure_divergence(
            &reality,
            DVec3::new(2.0, 64.0, 1.0),
            DVec3::new(4.0, 0.0, 0.0),
            Environment::default(),
            0.05,
            &cfg,
            &physics,
        );
        let b = measure_divergence(
            &reality,
            DVec3::new(2.0, 64.0, 1.0),
            DVec3::new(4.0, 0.0, 0.0),
            Environment::default(),
            0.05,
            &cfg,
            &physics,
        );
        assert_eq!(a, b);
        assert!(a.total > 0.0);
    }
}
