//! Sub-tick path reconstruction.
//!
//! One 50 ms tick hides a lot of motion. To judge whether a reported
//! movement step was physically possible, the tick is subdivided into N
//! equal sub-intervals and the expected path is rebuilt sub-step by
//! sub-step: horizontal motion at the client's implied velocity, vertical
//! motion on the ballistic arc that would connect the endpoints, both
//! clamped by terminal velocity and stopped at the first collision.
//!
//! For an honest client the reconstructed final position lands on the
//! reported one and divergence is ~0; divergence appears exactly when the
//! claimed endpoints cannot be connected by any legal path.

use glam::DVec3;
use warden_config::PhysicsConfig;
use warden_math::Aabb;

use crate::world::WorldProbe;
use crate::Environment;

/// Minimum sub-steps per tick; configured values below this are clamped up.
pub const MIN_SUBTICK_STEPS: usize = 100;

/// The rebuilt expected path for one movement step.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    /// Sampled positions, `steps + 1` points including both endpoints
    /// (fewer if a collision truncated the path).
    pub path: Vec<DVec3>,
    /// Where the legal path actually ends.
    pub final_position: DVec3,
    /// Distance from `final_position` to the client-reported endpoint.
    pub divergence: f64,
    /// First position whose player volume intersected solid geometry,
    /// if any.
    pub collision: Option<DVec3>,
    /// Whether the vertical motion had to be clamped at terminal velocity.
    pub terminal_clamped: bool,
}

/// Rebuilds the expected sub-tick path from `from` to `to` over `dt`
/// seconds.
///
/// Deterministic: identical inputs produce identical reconstructions.
pub fn reconstruct_path(
    from: DVec3,
    to: DVec3,
    env: Environment,
    dt: f64,
    steps: usize,
    probe: &dyn WorldProbe,
    cfg: &PhysicsConfig,
) -> Reconstruction {
    let steps = steps.max(MIN_SUBTICK_STEPS);
    let dt = dt.max(1e-6);
    let sub_dt = dt / steps as f64;

    let delta = to - from;

    // Initial vertical velocity on the ballistic arc connecting the
    // endpoints: dy = vy0*dt - g*dt²/2. Grounded/flying motion is linear.
    let ballistic = !env.grounded && !env.flying;
    let vy0 = if ballistic {
        delta.y / dt + 0.5 * cfg.gravity * dt
    } else {
        delta.y / dt
    };

    let vx = delta.x / dt;
    let vz = delta.z / dt;

    let mut path = Vec::with_capacity(steps + 1);
    path.push(from);

    let mut pos = from;
    let mut vy = vy0;
    let mut terminal_clamped = false;
    let mut collision = None;

    for _ in 0..steps {
        if ballistic {
            vy -= cfg.gravity * sub_dt;
            if vy < -cfg.terminal_velocity {
                vy = -cfg.terminal_velocity;
                terminal_clamped = true;
            }
        }
        let next = DVec3::new(pos.x + vx * sub_dt, pos.y + vy * sub_dt, pos.z + vz * sub_dt);

        if probe.is_solid(&Aabb::player_at(next)) {
            collision = Some(next);
            break;
        }

        pos = next;
        path.push(pos);
    }

    let divergence = pos.distance(to);

    Reconstruction {
        path,
        final_position: pos,
        divergence,
        collision,
        terminal_clamped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{FlatFloor, OpenWorld};

    fn cfg() -> PhysicsConfig {
        PhysicsConfig::default()
    }

    fn grounded() -> Environment {
        Environment {
            grounded: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_honest_walk_reconstructs_exactly() {
        let from = DVec3::new(0.0, 64.0, 0.0);
        let to = DVec3::new(0.2, 64.0, 0.0);
        let r = reconstruct_path(from, to, grounded(), 0.05, 100, &OpenWorld, &cfg());
        assert!(r.divergence < 1e-9, "divergence {}", r.divergence);
        assert!(r.collision.is_none());
        assert!(!r.terminal_clamped);
        assert_eq!(r.path.len(), 101);
    }

    #[test]
    fn test_honest_fall_reconstructs_within_subtick_tolerance() {
        let cfg = cfg();
        let from = DVec3::new(0.0, 80.0, 0.0);
        // An honest fall from rest: dy = -g*dt²/2 over one tick.
        let dt = 0.05;
        let dy = -cfg.gravity * dt * dt / 2.0;
        let to = DVec3::new(0.0, 80.0 + dy, 0.0);
        let env = Environment::default();
        let r = reconstruct_path(from, to, env, dt, 100, &OpenWorld, &cfg);
        assert!(r.divergence < 0.01, "divergence {}", r.divergence);
    }

    #[test]
    fn test_faster_than_terminal_fall_diverges() {
        let cfg = cfg();
        let from = DVec3::new(0.0, 1000.0, 0.0);
        // Claims to fall 10 blocks in one tick: 200 blocks/s, far past
        // terminal velocity.
        let to = DVec3::new(0.0, 990.0, 0.0);
        let env = Environment::default();
        let r = reconstruct_path(from, to, env, 0.05, 100, &OpenWorld, &cfg);
        assert!(r.terminal_clamped);
        assert!(r.divergence > 0.1, "divergence {}", r.divergence);
    }

    #[test]
    fn test_path_through_floor_collides() {
        let cfg = cfg();
        let from = DVec3::new(0.0, 70.0, 0.0);
        let to = DVec3::new(0.0, 60.0, 0.0); // floor top is at 64
        let env = Environment::default();
        let probe = FlatFloor { floor_y: 64.0 };
        let r = reconstruct_path(from, to, env, 0.05, 100, &probe, &cfg);
        assert!(r.collision.is_some());
        let hit = r.collision.unwrap();
        assert!(hit.y > 60.0 && hit.y < 65.0, "hit at y={}", hit.y);
    }

    #[test]
    fn test_reconstruction_is_deterministic() {
        let cfg = cfg();
        let from = DVec3::new(3.0, 70.0, -2.0);
        let to = DVec3::new(3.4, 69.8, -1.7);
        let env = Environment::default();
        let a = reconstruct_path(from, to, env, 0.05, 128, &OpenWorld, &cfg);
        let b = reconstruct_path(from, to, env, 0.05, 128, &OpenWorld, &cfg);
        assert_eq!(a, b);
    }

    #[test]
    fn test_step_count_clamped_to_minimum() {
        let r = reconstruct_path(
            DVec3::ZERO,
            DVec3::ONE,
            grounded(),
            0.05,
            10,
            &OpenWorld,
            &cfg(),
        );
        // 10 requested, clamped to 100 sub-steps → 101 path points.
        assert_eq!(r.path.len(), MIN_SUBTICK_STEPS + 1);
    }
}
