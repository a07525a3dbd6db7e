//! Geometry primitives shared by every validator: f64 vectors, AABBs,
//! and swept-segment helpers.
//!
//! Positions are measured in blocks (1 block = 1 meter), velocities in
//! blocks per second. All validator math is double-precision so that
//! sub-tick reconstruction stays deterministic across platforms.

mod aabb;
mod motion;

pub use aabb::Aabb;
pub use glam::DVec3;
pub use motion::{horizontal_distance, horizontal_length, segment_points};
