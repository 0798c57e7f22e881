//! Gravity field parameters and their absolute bounds.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::constants::{RADIUS_MAX, RADIUS_MIN, STRENGTH_MAX, STRENGTH_MIN};

/// The replicated parameters of a gravity field.
///
/// This is exactly what a create message carries besides the field id.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldParams {
    /// World-space center the field pulls toward.
    pub center: DVec3,
    /// Radius in metres, within `[RADIUS_MIN, RADIUS_MAX]`.
    pub radius: i32,
    /// Strength as a fraction of standard gravity, within `[0, 1]`.
    pub strength: f32,
}

impl FieldParams {
    /// Build parameters, clamping radius and strength into their absolute
    /// bounds.
    pub fn clamped(center: DVec3, radius: i64, strength: f32) -> Self {
        Self {
            center,
            radius: clamp_radius(radius),
            strength: clamp_strength(strength),
        }
    }
}

/// Clamp a requested radius into `[RADIUS_MIN, RADIUS_MAX]`.
///
/// Accepts `i64` so out-of-range command input never wraps before clamping.
pub fn clamp_radius(value: i64) -> i32 {
    let clamped = value.clamp(i64::from(RADIUS_MIN), i64::from(RADIUS_MAX));
    i32::try_from(clamped).unwrap_or(RADIUS_MAX)
}

/// Clamp a requested strength into `[STRENGTH_MIN, STRENGTH_MAX]`.
///
/// NaN collapses to the minimum.
pub const fn clamp_strength(value: f32) -> f32 {
    if value.is_nan() {
        return STRENGTH_MIN;
    }
    value.clamp(STRENGTH_MIN, STRENGTH_MAX)
}
