use glam::DVec3;

/// Axis-aligned bounding box in f64 world space.
///
/// Invariant: min.x <= max.x, min.y <= max.y, min.z <= max.z.
/// The constructor enforces this by swapping components if needed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

/// Player collision box half-width in blocks.
pub const PLAYER_HALF_WIDTH: f64 = 0.3;

/// Player collision box height in blocks.
pub const PLAYER_HEIGHT: f64 = 1.8;

impl Aabb {
    /// Create an AABB from two corners. Automatically sorts
    /// components so that min <= max on every axis.
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Create an AABB from a center point and half-extents.
    pub fn from_center_half_extents(center: DVec3, half: DVec3) -> Self {
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// The collision box of a player whose feet are at `feet`.
    ///
    /// 0.6 blocks wide, 1.8 blocks tall, centered on the feet position
    /// horizontally.
    pub fn player_at(feet: DVec3) -> Self {
        Self {
            min: DVec3::new(feet.x - PLAYER_HALF_WIDTH, feet.y, feet.z - PLAYER_HALF_WIDTH),
            max: DVec3::new(
                feet.x + PLAYER_HALF_WIDTH,
                feet.y + PLAYER_HEIGHT,
                feet.z + PLAYER_HALF_WIDTH,
            ),
        }
    }

    /// Returns true if the point lies inside or on the boundary.
    pub fn contains_point(&self, p: DVec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Returns true if this AABB overlaps with other
    /// (including touching edges/faces).
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Returns the smallest AABB enclosing both self and other.
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Returns the center point of the AABB.
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Returns a new AABB expanded by `margin` on each side.
    pub fn expand_by(&self, margin: f64) -> Aabb {
        Aabb {
            min: self.min - DVec3::splat(margin),
            max: self.max + DVec3::splat(margin),
        }
    }

    /// Returns the size along each axis.
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// Returns the volume in cubic blocks.
    pub fn volume(&self) -> f64 {
        let s = self.size();
        s.x * s.y * s.z
    }
}
