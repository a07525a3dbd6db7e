//! Host-supplied collision geometry behind a trait seam.
//!
//! The engine never owns world data; the host answers solid-volume
//! queries. [`OpenWorld`] (nothing solid) is the default when no probe is
//! wired up, and [`FlatFloor`] covers demos and tests.

use warden_math::Aabb;

/// Answers "does this volume intersect solid world geometry?".
///
/// Implementations must be cheap (called per sub-step on the hot path)
/// and thread-safe: validators run concurrently across players.
pub trait WorldProbe: Send + Sync {
    /// Returns `true` if `volume` intersects any solid block.
    fn is_solid(&self, volume: &Aabb) -> bool;
}

/// A world with no solid geometry. Phase detection never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenWorld;

impl WorldProbe for OpenWorld {
    fn is_solid(&self, _volume: &Aabb) -> bool {
        false
    }
}

/// An infinite solid floor: everything at or below `floor_y` is solid.
#[derive(Debug, Clone, Copy)]
pub struct FlatFloor {
    /// Top surface of the floor in blocks.
    pub floor_y: f64,
}

impl WorldProbe for FlatFloor {
    fn is_solid(&self, volume: &Aabb) -> bool {
        volume.min.y < self.floor_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_open_world_is_never_solid() {
        let probe = OpenWorld;
        let volume = Aabb::player_at(DVec3::new(0.0, -1000.0, 0.0));
        assert!(!probe.is_solid(&volume));
    }

    #[test]
    fn test_flat_floor_solid_below_surface() {
        let probe = FlatFloor { floor_y: 64.0 };
        assert!(probe.is_solid(&Aabb::player_at(DVec3::new(0.0, 63.0, 0.0))));
        assert!(!probe.is_solid(&Aabb::player_at(DVec3::new(0.0, 64.0, 0.0))));
        assert!(!probe.is_solid(&Aabb::player_at(DVec3::new(0.0, 70.0, 0.0))));
    }
}
