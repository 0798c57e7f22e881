//! Axis-aligned bounding boxes and vector re-exports.
//!
//! World positions are `f64` ([`DVec3`]); voxel coordinates and storage
//! sizes are `i32` ([`IVec3`]).

pub use glam::{DVec3, IVec3};
use serde::{Deserialize, Serialize};

/// An axis-aligned box in world space.
///
/// Containment tests are inclusive on both faces, so a point lying exactly
/// on `max` is inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner.
    pub min: DVec3,
    /// Maximum corner.
    pub max: DVec3,
}

impl Aabb {
    /// Create a box from two corners.
    pub const fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Create a box from its minimum corner and a voxel storage size.
    pub fn from_corner_and_size(corner: DVec3, size: IVec3) -> Self {
        Self {
            min: corner,
            max: corner + size.as_dvec3(),
        }
    }

    /// Whether `point` lies inside the box, faces included.
    pub const fn contains_inclusive(&self, point: DVec3) -> bool {
        self.min.x <= point.x
            && point.x <= self.max.x
            && self.min.y <= point.y
            && point.y <= self.max.y
            && self.min.z <= point.z
            && point.z <= self.max.z
    }

    /// Center of the box.
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Edge lengths of the box.
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_inclusive_on_faces() {
        let b = Aabb::new(DVec3::ZERO, DVec3::splat(10.0));
        assert!(b.contains_inclusive(DVec3::ZERO));
        assert!(b.contains_inclusive(DVec3::splat(10.0)));
        assert!(b.contains_inclusive(DVec3::new(10.0, 0.0, 5.0)));
        assert!(!b.contains_inclusive(DVec3::new(10.000_001, 0.0, 5.0)));
        assert!(!b.contains_inclusive(DVec3::new(5.0, -0.5, 5.0)));
    }

    #[test]
    fn corner_and_size_builds_expected_box() {
        let b = Aabb::from_corner_and_size(DVec3::new(-64.0, 0.0, 0.0), IVec3::splat(128));
        assert!(b.center().abs_diff_eq(DVec3::new(0.0, 64.0, 64.0), 1e-9));
        assert!(b.size().abs_diff_eq(DVec3::splat(128.0), 1e-9));
    }
}
