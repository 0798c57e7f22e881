//! Membership tests and asteroid-derived field geometry.
//!
//! Membership is exact: a point at exactly `radius` from the center is a
//! member. Deriving a field from an asteroid is a pure function of the
//! sampled voxel occupancy and the current settings, so two participants
//! scanning the same asteroid compute bit-identical centers.

use std::collections::BTreeSet;

use natgrav_types::constants::{BASE_SAMPLE_LOD, MAX_SAMPLE_RESOLUTION};
use natgrav_types::{Aabb, AsteroidId, BodyId, DVec3, FieldParams, IVec3};
use tracing::debug;

use crate::error::CollaboratorFailure;
use crate::registry::FieldRegistry;
use crate::settings::GlobalSettings;
use crate::world::{AsteroidSnapshot, BodySnapshot, ContentGrid, SampleLevel, World};

/// `|point - center|² <= radius²`, boundary included.
pub fn in_radius(center: DVec3, radius: i32, point: DVec3) -> bool {
    let radius = f64::from(radius);
    center.distance_squared(point) <= radius * radius
}

/// Whether `point` lies in `bounds`, faces included.
pub fn in_box_inclusive(point: DVec3, bounds: &Aabb) -> bool {
    bounds.contains_inclusive(point)
}

/// Non-static, physics-enabled, non-phantom bodies are pulled.
pub const fn is_eligible_body(body: &BodySnapshot) -> bool {
    !body.is_static && body.physics_enabled && !body.phantom
}

/// Recompute every field's members from scratch. Returns the total number
/// of memberships.
pub fn refresh_membership(registry: &mut FieldRegistry, bodies: &[BodySnapshot]) -> usize {
    let eligible: Vec<&BodySnapshot> = bodies.iter().filter(|b| is_eligible_body(b)).collect();
    let mut total = 0_usize;
    for field in registry.all_mut() {
        let members: BTreeSet<BodyId> = eligible
            .iter()
            .filter(|body| field.in_radius(body.position))
            .map(|body| body.id)
            .collect();
        total = total.saturating_add(members.len());
        field.replace_members(members);
    }
    total
}

/// Add a newly appeared body to every field containing it.
pub fn track_body(registry: &mut FieldRegistry, body: &BodySnapshot) -> usize {
    if !is_eligible_body(body) {
        return 0;
    }
    registry
        .all_mut()
        .filter(|field| field.in_radius(body.position))
        .filter_map(|field| field.add_member(body.id).then_some(()))
        .count()
}

/// Drop a closed body from every field.
pub fn untrack_body(registry: &mut FieldRegistry, body: BodyId) -> usize {
    registry
        .all_mut()
        .filter_map(|field| field.remove_member(body).then_some(()))
        .count()
}

/// The first asteroid whose storage bounds contain `point`, faces included.
pub fn asteroid_containing(asteroids: Vec<AsteroidSnapshot>, point: DVec3) -> Option<AsteroidSnapshot> {
    asteroids
        .into_iter()
        .find(|asteroid| in_box_inclusive(point, &asteroid.bounds()))
}

/// Whether the auto-creation scan should derive a field for this asteroid.
pub fn is_scan_candidate(
    asteroid: &AsteroidSnapshot,
    settings: &GlobalSettings,
    registry: &FieldRegistry,
) -> bool {
    asteroid.physics_enabled
        && !asteroid.phantom
        && settings.matches_asteroid_prefix(&asteroid.storage_name)
        && registry.find_by_point_in_box(&asteroid.bounds()).is_none()
}

/// Candidates for the auto-creation scan, in world order.
pub fn scan_candidates(
    asteroids: &[AsteroidSnapshot],
    settings: &GlobalSettings,
    registry: &FieldRegistry,
) -> Vec<AsteroidId> {
    asteroids
        .iter()
        .filter(|asteroid| is_scan_candidate(asteroid, settings, registry))
        .map(|asteroid| asteroid.id)
        .collect()
}

/// The coarsest-needed sampling level for a storage of `size` voxels.
///
/// Starts at the base level and doubles it, with `scale = lod²`, until the
/// sampled grid is at most 512 cells along every axis.
pub fn sample_level(size: IVec3) -> SampleLevel {
    let mut lod = BASE_SAMPLE_LOD;
    loop {
        let scale = i32::try_from(lod.saturating_mul(lod))
            .unwrap_or(i32::MAX)
            .max(1);
        if grid_size(size, scale).max_element() <= MAX_SAMPLE_RESOLUTION || scale == i32::MAX {
            return SampleLevel { lod, scale };
        }
        lod = lod.saturating_mul(2);
    }
}

/// Number of sampled cells per axis for a storage size and scale.
pub fn grid_size(size: IVec3, scale: i32) -> IVec3 {
    let div = |axis: i32| axis.checked_div(scale).unwrap_or(0);
    IVec3::new(div(size.x), div(size.y), div(size.z))
}

/// Tight world-space bounds of the non-empty cells of `grid`.
///
/// A cell at `p` covers `[p, p + 1)` in grid units, scaled by `scale` and
/// offset by the storage corner. `None` when every cell is empty.
pub fn occupied_bounds(grid: &ContentGrid, scale: i32, corner: DVec3) -> Option<Aabb> {
    let size = grid.size();
    let mut found: Option<(IVec3, IVec3)> = None;

    for z in 0..size.z {
        for y in 0..size.y {
            for x in 0..size.x {
                let cell = IVec3::new(x, y, z);
                if grid.get(cell) == 0 {
                    continue;
                }
                let upper = cell.saturating_add(IVec3::ONE);
                found = Some(match found {
                    Some((min, max)) => (min.min(cell), max.max(upper)),
                    None => (cell, upper),
                });
            }
        }
    }

    found.map(|(min, max)| {
        let scale = f64::from(scale);
        Aabb::new(
            corner + min.as_dvec3() * scale,
            corner + max.as_dvec3() * scale,
        )
    })
}

/// Largest absolute storage dimension, the asteroid's "boundary size".
pub fn size_metric(size: IVec3) -> u32 {
    [size.x, size.y, size.z]
        .into_iter()
        .map(i32::unsigned_abs)
        .max()
        .unwrap_or(0)
}

/// Boundary size relative to `asteroid_maxsize`, unbounded above.
fn normalized_size(size: IVec3, settings: &GlobalSettings) -> f64 {
    if settings.asteroid_maxsize <= 0 {
        return f64::INFINITY;
    }
    f64::from(size_metric(size)) / f64::from(settings.asteroid_maxsize)
}

/// `clamp(round(normalized * radius_max), radius_min, radius_max)`.
///
/// Ties round to even.
#[allow(clippy::cast_possible_truncation)]
pub fn derive_radius(size: IVec3, settings: &GlobalSettings) -> i32 {
    let scaled = (normalized_size(size, settings) * f64::from(settings.radius_max)).round_ties_even();
    // Float-to-int `as` saturates, NaN maps to 0.
    let radius = scaled as i32;
    radius.max(settings.radius_min).min(settings.radius_max)
}

/// `clamp(normalized * strength_max, strength_min, strength_max)`.
#[allow(clippy::cast_possible_truncation)]
pub fn derive_strength(size: IVec3, settings: &GlobalSettings) -> f32 {
    let strength = (normalized_size(size, settings) * f64::from(settings.strength_max)) as f32;
    strength.max(settings.strength_min).min(settings.strength_max)
}

/// Field parameters for an asteroid, from already sampled content.
///
/// An asteroid with no content at the sampled level falls back to the
/// center of its whole storage.
pub fn field_params_from_grid(
    asteroid: &AsteroidSnapshot,
    level: SampleLevel,
    grid: &ContentGrid,
    settings: &GlobalSettings,
) -> FieldParams {
    let bounds = occupied_bounds(grid, level.scale, asteroid.corner).unwrap_or_else(|| {
        debug!(asteroid = %asteroid.id, "No content at sampled level, using storage bounds");
        asteroid.bounds()
    });
    FieldParams {
        center: bounds.center(),
        radius: derive_radius(asteroid.size, settings),
        strength: derive_strength(asteroid.size, settings),
    }
}

/// Sample an asteroid through the world and derive its field parameters.
pub fn derive_field_params(
    world: &dyn World,
    asteroid: &AsteroidSnapshot,
    settings: &GlobalSettings,
) -> Result<FieldParams, CollaboratorFailure> {
    let level = sample_level(asteroid.size);
    let cells = grid_size(asteroid.size, level.scale);
    let grid = world.read_content(asteroid.id, level, cells)?;
    debug!(
        asteroid = %asteroid.id,
        lod = level.lod,
        scale = level.scale,
        "Sampled asteroid content"
    );
    Ok(field_params_from_grid(asteroid, level, &grid, settings))
}
