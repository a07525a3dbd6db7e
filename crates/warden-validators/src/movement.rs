//! Movement-physics validation: sub-tick reconstruction plus the
//! speed / fly / phase / timer / scaffold / no-fall checks.
//!
//! Every check is independent and produces its own violation; the result
//! confidence is the product of `(1 − penalty)` over triggered checks,
//! floored at the configured minimum.

use std::sync::Arc;

use warden_config::{MovementConfig, PhysicsConfig};
use warden_math::horizontal_distance;
use warden_model::{
    ActionKind, Evidence, MovementClass, MovementEvent, TelemetryEvent, ValidationDetail,
    ValidationResult, ValidatorKind, Violation, ViolationKind,
};
use warden_physics::{
    Environment, MovementMode, Reconstruction, WorldProbe, expected_fall_velocity, max_speed,
    reconstruct_path,
};
use warden_state::PlayerState;

use crate::Validator;

/// Step distance above which a movement is classified as a teleport.
const TELEPORT_DISTANCE: f64 = 8.0;

/// Vertical tolerance on fly detection, blocks/s.
const FLY_VY_TOLERANCE: f64 = 0.5;

/// Window scanned for recent block placements in scaffold detection, ms.
const SCAFFOLD_PLACE_WINDOW_MS: u64 = 2_000;

/// Movement-physics validator.
pub struct MovementValidator {
    cfg: MovementConfig,
    physics: PhysicsConfig,
    probe: Arc<dyn WorldProbe>,
}

impl MovementValidator {
    /// Creates a validator over the given world probe.
    pub fn new(cfg: MovementConfig, physics: PhysicsConfig, probe: Arc<dyn WorldProbe>) -> Self {
        Self {
            cfg,
            physics,
            probe,
        }
    }

    fn validate_movement(&self, state: &PlayerState, ev: &MovementEvent) -> ValidationResult {
        let prev = state.movement.back();
        let dt_ms = prev
            .map(|p| ev.timestamp_ms.saturating_sub(p.timestamp_ms))
            .filter(|&d| d > 0)
            .unwrap_or(self.physics.tick_ms);
        let dt_s = dt_ms as f64 / 1_000.0;

        let delta = ev.to - ev.from;
        let distance = delta.length();
        let h_distance = horizontal_distance(ev.from, ev.to);
        let h_speed = h_distance / dt_s;
        let vy = delta.y / dt_s;

        let env = Environment {
            grounded: ev.on_ground,
            ..state.environment
        };

        let steps = if self.cfg.subtick_mode {
            self.cfg.subtick_steps
        } else {
            // Whole-tick mode still uses the shared kernel, at the
            // minimum resolution.
            100
        };
        let recon = reconstruct_path(
            ev.from,
            ev.to,
            env,
            dt_s,
            steps,
            self.probe.as_ref(),
            &self.physics,
        );
        let tolerance = if self.cfg.subtick_mode {
            self.cfg.divergence_tolerance_subtick
        } else {
            self.cfg.divergence_tolerance_whole
        };

        let mut violations = Vec::new();
        let mut confidence = 1.0_f64;
        // Speed ceiling for the current movement mode.
        let mode = MovementMode::from_environment(env);
        let ceiling = max_speed(mode, &self.physics) * self.cfg.speed_tolerance;
        if h_speed > ceiling {
            let ratio = h_speed / ceiling;
            violations.push(Violation::new(
                ViolationKind::SpeedHack,
                ((ratio - 1.0) / 2.0).clamp(0.5, 1.0),
                vec![
                    Evidence::measurement(
                        format!("horizontal speed {h_speed:.2} blocks/s against ceiling {ceiling:.2} ({mode:?})"),
                        h_speed,
                        0.9,
                    ),
                    Evidence::position("step start", ev.from, 1.0),
                    Evidence::position("step end", ev.to, 1.0),
                ],
                ev.timestamp_ms,
                ev.player_id,
            ));
            confidence *= 1.0 - self.cfg.penalty_speed;
        }

        // Fly: upward motion inconsistent with gravity on the last known
        // vertical velocity. A jump from the ground is allowed its impulse.
        if !ev.on_ground && !env.flying && vy > 0.01 {
            let launched = prev.is_none_or(|p| p.on_ground);
            let allowed = if launched {
                self.physics.jump_impulse + FLY_VY_TOLERANCE
            } else {
                expected_fall_velocity(state.velocity.y, dt_s, &self.physics) + FLY_VY_TOLERANCE
            };
            if vy > allowed {
                let excess = vy - allowed;
                violations.push(Violation::new(
                    ViolationKind::FlyHack,
                    (excess / 10.0).clamp(0.6, 0.95),
                    vec![Evidence::measurement(
                        format!("ascent at {vy:.2} blocks/s, max legal {allowed:.2}"),
                        vy,
                        0.85,
                    )],
                    ev.timestamp_ms,
                    ev.player_id,
                ));
                confidence *= 1.0 - self.cfg.penalty_fly;
            }
        }

        // Phase: reconstructed path hit solid geometry.
        if let Some(hit) = recon.collision {
            violations.push(Violation::new(
                ViolationKind::PhaseHack,
                0.9,
                vec![Evidence::position(
                    "path intersects solid volume",
                    hit,
                    0.9,
                )],
                ev.timestamp_ms,
                ev.player_id,
            ));
            confidence *= 1.0 - self.cfg.penalty_phase;
        }

        // Timer: events arriving faster than the tick period, each still
        // carrying a normal per-tick displacement.
        let normal_tick_distance = max_speed(mode, &self.physics) * self.physics.tick_ms as f64
            / 1_000.0;
        if dt_ms < (self.physics.tick_ms * 3) / 4
            && distance > normal_tick_distance * 0.5
            && distance < normal_tick_distance * 1.5
        {
            violations.push(Violation::new(
                ViolationKind::TimerHack,
                0.7,
                vec![Evidence::timing(
                    format!(
                        "tick-sized step of {distance:.2} blocks delivered after {dt_ms} ms (tick is {} ms)",
                        self.physics.tick_ms
                    ),
                    dt_ms as f64,
                    0.7,
                )],
                ev.timestamp_ms,
                ev.player_id,
            ));
            confidence *= 1.0 - self.cfg.penalty_timer;
        }

        // Scaffold: descending fast horizontally while placing blocks.
        if !ev.on_ground && delta.y < 0.0 && h_speed > self.physics.walk_speed * 0.9 {
            let cutoff = ev.timestamp_ms.saturating_sub(SCAFFOLD_PLACE_WINDOW_MS);
            let recent_places = state
                .behavior
                .iter()
                .filter(|s| s.kind == ActionKind::BlockPlace && s.timestamp_ms >= cutoff)
                .count();
            if recent_places >= 2 {
                violations.push(Violation::new(
                    ViolationKind::Scaffold,
                    0.6,
                    vec![Evidence::statistic(
                        format!("{recent_places} block placements while bridging at {h_speed:.2} blocks/s"),
                        recent_places as f64,
                        0.6,
                    )],
                    ev.timestamp_ms,
                    ev.player_id,
                ));
                confidence *= 1.0 - self.cfg.penalty_scaffold;
            }
        }

        // No-fall: claiming solid ground mid-descent after a damaging fall.
        if ev.on_ground && delta.y < -0.5 {
            let fall = trailing_fall_distance(state) - delta.y;
            if fall > self.physics.fall_damage_threshold {
                violations.push(Violation::new(
                    ViolationKind::NoFall,
                    0.75,
                    vec![Evidence::measurement(
                        format!("grounded claim {fall:.1} blocks into a fall"),
                        fall,
                        0.75,
                    )],
                    ev.timestamp_ms,
                    ev.player_id,
                ));
                confidence *= 1.0 - self.cfg.penalty_nofall;
            }
        }

        // Reconstruction divergence with no collision to explain it:
        // the claimed endpoints cannot be connected by a legal path.
        if recon.collision.is_none() && recon.divergence > tolerance {
            violations.push(Violation::new(
                ViolationKind::ImpossibleMotion,
                (recon.divergence / 1.0).clamp(0.6, 0.95),
                vec![Evidence::measurement(
                    format!(
                        "reconstructed endpoint misses report by {:.3} blocks (tolerance {tolerance})",
                        recon.divergence
                    ),
                    recon.divergence,
                    0.8,
                )],
                ev.timestamp_ms,
                ev.player_id,
            ));
            confidence *= 1.0 - self.cfg.penalty_divergence;
        }

        let classification = classify(ev, &recon, env, distance, h_speed, &self.physics);
        let confidence = if violations.is_empty() {
            1.0
        } else {
            confidence.max(self.cfg.confidence_floor)
        };

        ValidationResult::flagged(
            ValidatorKind::Movement,
            violations,
            confidence,
            ValidationDetail::Movement {
                reconstructed_path: recon.path,
                divergence: recon.divergence,
                classification,
            },
        )
    }
}

impl Validator for MovementValidator {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Movement
    }

    fn validate(
        &self,
        state: &PlayerState,
        event: &TelemetryEvent,
        _now_ms: u64,
    ) -> ValidationResult {
        match event {
            TelemetryEvent::Movement(ev) => self.validate_movement(state, ev),
            TelemetryEvent::Comprehensive { timestamp_ms, .. } => {
                // Re-validate the most recent movement step against the
                // history preceding it.
                match state.movement.back() {
                    Some(rec) => {
                        let ev = MovementEvent {
                            player_id: state.player_id,
                            timestamp_ms: *timestamp_ms,
                            from: rec.from,
                            to: rec.to,
                            on_ground: rec.on_ground,
                        };
                        self.validate_movement(state, &ev)
                    }
                    None => ValidationResult::clean(
                        ValidatorKind::Movement,
                        ValidationDetail::None,
                    ),
                }
            }
            _ => ValidationResult::clean(ValidatorKind::Movement, ValidationDetail::None),
        }
    }
}

/// Total downward distance across the trailing run of airborne records.
fn trailing_fall_distance(state: &PlayerState) -> f64 {
    let mut fall = 0.0;
    for rec in state.movement.iter().rev() {
        let dy = rec.to.y - rec.from.y;
        if rec.on_ground || dy >= 0.0 {
            break;
        }
        fall -= dy;
    }
    fall
}

/// Classifies one movement step.
fn classify(
    ev: &MovementEvent,
    recon: &Reconstruction,
    env: Environment,
    distance: f64,
    h_speed: f64,
    physics: &PhysicsConfig,
) -> MovementClass {
    let dy = ev.to.y - ev.from.y;
    if distance > TELEPORT_DISTANCE {
        MovementClass::Teleport
    } else if recon.collision.is_some() {
        MovementClass::Phase
    } else if env.flying {
        MovementClass::Fly
    } else if !ev.on_ground && dy > 0.01 {
        MovementClass::Jump
    } else if !ev.on_ground && dy < -0.01 {
        MovementClass::Fall
    } else if h_speed > physics.walk_speed {
        MovementClass::Sprint
    } else {
        MovementClass::Walk
    }
}
