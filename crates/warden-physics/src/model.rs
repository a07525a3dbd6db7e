//! The closed-form movement model: speed ceilings, gravity, drag.

use glam::DVec3;
use warden_config::PhysicsConfig;

use crate::Environment;

/// Movement mode derived from environment flags; selects the speed ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovementMode {
    Walk,
    Sprint,
    Fly,
}

impl MovementMode {
    /// Derives the mode from environment flags. Flight dominates sprint.
    pub fn from_environment(env: Environment) -> Self {
        if env.flying {
            Self::Fly
        } else if env.sprinting {
            Self::Sprint
        } else {
            Self::Walk
        }
    }
}

/// Speed ceiling in blocks/s for the given mode.
pub fn max_speed(mode: MovementMode, cfg: &PhysicsConfig) -> f64 {
    match mode {
        MovementMode::Walk => cfg.walk_speed,
        MovementMode::Sprint => cfg.sprint_speed,
        MovementMode::Fly => cfg.fly_speed,
    }
}

/// Vertical velocity after falling for `dt` seconds from initial vertical
/// velocity `vy0`, with gravity and the terminal-velocity clamp.
/// Negative = downward.
pub fn expected_fall_velocity(vy0: f64, dt: f64, cfg: &PhysicsConfig) -> f64 {
    (vy0 - cfg.gravity * dt).max(-cfg.terminal_velocity)
}

/// One Euler integration step of the model: applies gravity (when
/// airborne and not flying), per-medium drag, and the terminal-velocity
/// clamp. Returns the new (position, velocity).
///
/// This is the single integration kernel shared by sub-tick
/// reconstruction and the reality-divergence simulation, so both agree
/// on what "expected" motion is.
pub fn integrate_step(
    position: DVec3,
    velocity: DVec3,
    env: Environment,
    dt: f64,
    cfg: &PhysicsConfig,
) -> (DVec3, DVec3) {
    let mut vel = velocity;

    if !env.grounded && !env.flying {
        vel.y = (vel.y - cfg.gravity * dt).max(-cfg.terminal_velocity);
    }

    // Drag retains a per-second fraction of horizontal velocity; raise it
    // to the dt power for sub-second steps.
    let retain = if env.in_fluid {
        cfg.fluid_drag
    } else if env.grounded {
        cfg.ground_friction
    } else {
        cfg.air_drag
    };
    let factor = retain.powf(dt);
    vel.x *= factor;
    vel.z *= factor;

    (position + vel * dt, vel)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> PhysicsConfig {
        PhysicsConfig::default()
    }

    #[test]
    fn test_mode_from_environment() {
        let mut env = Environment::default();
        assert_eq!(MovementMode::from_environment(env), MovementMode::Walk);
        env.sprinting = true;
        assert_eq!(MovementMode::from_environment(env), MovementMode::Sprint);
        env.flying = true;
        assert_eq!(MovementMode::from_environment(env), MovementMode::Fly);
    }

    #[test]
    fn test_max_speed_ordering() {
        let cfg = cfg();
        assert!(max_speed(MovementMode::Walk, &cfg) < max_speed(MovementMode::Sprint, &cfg));
        assert!(max_speed(MovementMode::Sprint, &cfg) < max_speed(MovementMode::Fly, &cfg));
    }

    #[test]
    fn test_fall_velocity_accelerates_downward() {
        let cfg = cfg();
        let v1 = expected_fall_velocity(0.0, 0.05, &cfg);
        let v2 = expected_fall_velocity(v1, 0.05, &cfg);
        assert!(v1 < 0.0);
        assert!(v2 < v1);
    }

    #[test]
    fn test_fall_velocity_clamps_at_terminal() {
        let cfg = cfg();
        let v = expected_fall_velocity(-1000.0, 1.0, &cfg);
        assert_eq!(v, -cfg.terminal_velocity);
    }

    #[test]
    fn test_integrate_step_applies_gravity_when_airborne() {
        let cfg = cfg();
        let env = Environment::default(); // airborne, not flying
        let (pos, vel) = integrate_step(DVec3::new(0.0, 64.0, 0.0), DVec3::ZERO, env, 0.05, &cfg);
        assert!(vel.y < 0.0);
        assert!(pos.y < 64.0);
    }

    #[test]
    fn test_integrate_step_no_gravity_when_flying() {
        let cfg = cfg();
        let env = Environment {
            flying: true,
            ..Default::default()
        };
        let (_, vel) = integrate_step(DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0), env, 0.05, &cfg);
        assert_eq!(vel.y, 0.0);
    }

    #[test]
    fn test_integrate_step_is_deterministic() {
        let cfg = cfg();
        let env = Environment {
            grounded: true,
            sprinting: true,
            ..Default::default()
        };
        let a = integrate_step(DVec3::ONE, DVec3::new(3.0, 0.0, -2.0), env, 0.01, &cfg);
        let b = integrate_step(DVec3::ONE, DVec3::new(3.0, 0.0, -2.0), env, 0.01, &cfg);
        assert_eq!(a, b);
    }
}
