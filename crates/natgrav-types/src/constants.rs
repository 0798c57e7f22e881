//! Physical and scheduling constants.
//!
//! Radius and strength bounds here are the absolute limits. The tunable
//! `radius_min`/`radius_max`/`strength_min`/`strength_max` settings are
//! always clamped into these.

/// Standard gravity in m/s². Field strength is a fraction of this value.
pub const G: f32 = 9.806_65;

/// Smallest radius any field may have, in metres.
pub const RADIUS_MIN: i32 = 1;

/// Largest radius any field may have, in metres.
pub const RADIUS_MAX: i32 = 999_999_999;

/// Smallest field strength (fraction of [`G`]).
pub const STRENGTH_MIN: f32 = 0.0;

/// Largest field strength (fraction of [`G`]).
pub const STRENGTH_MAX: f32 = 1.0;

/// Fixed simulation step used for observer velocity changes (1/60 s).
pub const STEP_SECONDS: f64 = 1.0 / 60.0;

/// Default number of steps between membership refreshes.
pub const SKIP_TICKS: u32 = 10;

/// Default number of membership refreshes between asteroid scans.
pub const SKIP_EXTRA_TICKS: u32 = 30;

/// Maximum per-axis voxel resolution sampled when deriving field geometry.
pub const MAX_SAMPLE_RESOLUTION: i32 = 512;

/// Level of detail the asteroid sampler starts from.
pub const BASE_SAMPLE_LOD: u32 = 2;
