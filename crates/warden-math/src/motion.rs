use glam::DVec3;

/// Horizontal (XZ-plane) distance between two points.
pub fn horizontal_distance(a: DVec3, b: DVec3) -> f64 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    (dx * dx + dz * dz).sqrt()
}

/// Horizontal (XZ-plane) length of a vector.
pub fn horizontal_length(v: DVec3) -> f64 {
    (v.x * v.x + v.z * v.z).sqrt()
}

/// Samples `steps + 1` evenly spaced points along the segment from `from`
/// to `to`, inclusive of both endpoints.
///
/// Used for swept-volume queries: a path intersects solid geometry iff at
/// least one sample's player box does, for sufficiently small step sizes.
pub fn segment_points(from: DVec3, to: DVec3, steps: usize) -> Vec<DVec3> {
    let steps = steps.max(1);
    let mut points = Vec::with_capacity(steps + 1);
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        points.push(from.lerp(to, t));
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_distance_ignores_y() {
        let a = DVec3::new(0.0, 100.0, 0.0);
        let b = DVec3::new(3.0, -50.0, 4.0);
        assert!((horizontal_distance(a, b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_horizontal_length() {
        let v = DVec3::new(3.0, 99.0, 4.0);
        assert!((horizontal_length(v) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_segment_points_endpoints_and_count() {
        let from = DVec3::ZERO;
        let to = DVec3::new(10.0, 0.0, 0.0);
        let pts = segment_points(from, to, 10);
        assert_eq!(pts.len(), 11);
        assert_eq!(pts[0], from);
        assert_eq!(pts[10], to);
        assert!((pts[5].x - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_segment_points_zero_steps_clamped() {
        let pts = segment_points(DVec3::ZERO, DVec3::ONE, 0);
        assert_eq!(pts.len(), 2);
    }
}
