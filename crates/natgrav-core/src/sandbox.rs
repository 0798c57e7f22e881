//! An in-memory [`World`] and [`Presenter`] for tests and the demo engine.
//!
//! Bodies, asteroids and anchors live in ordered maps. Asteroid content is
//! described analytically by a [`VoxelShape`], so sampling a large storage
//! at a coarse level costs one check per sampled cell. Forces applied
//! during a step accumulate until [`SandboxWorld::integrate`] turns them
//! into motion.

use std::collections::BTreeMap;

use natgrav_types::{AsteroidId, BodyId, DVec3, FieldId, FieldParams, IVec3};
use tracing::debug;

use crate::error::CollaboratorFailure;
use crate::world::{
    AsteroidSnapshot, BodySnapshot, ContentGrid, ObserverSnapshot, Presenter, SampleLevel, World,
};

/// Anchor template name the sandbox spawns from.
pub const DEFAULT_ANCHOR_TEMPLATE: &str = "NaturalGravityBlocks";

/// Content byte of an occupied sampled cell.
const SOLID: u8 = u8::MAX;

/// First entity id handed out by the sandbox.
const FIRST_ENTITY_ID: u64 = 1000;

/// Occupied voxels of an asteroid, in storage-local voxel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoxelShape {
    /// Every voxel of the storage.
    Solid,
    /// Voxels `v` with `min <= v < max` on every axis.
    Block {
        /// Inclusive lower voxel.
        min: IVec3,
        /// Exclusive upper voxel.
        max: IVec3,
    },
    /// Voxels within `radius` of `center`.
    Ball {
        /// Center in voxel units.
        center: DVec3,
        /// Radius in voxels.
        radius: f64,
    },
    /// No content at all.
    Empty,
}

impl VoxelShape {
    /// Whether any voxel in `[lo, hi)` is occupied.
    fn touches(self, lo: IVec3, hi: IVec3) -> bool {
        match self {
            Self::Solid => true,
            Self::Block { min, max } => lo.cmplt(max).all() && min.cmplt(hi).all(),
            Self::Ball { center, radius } => {
                let nearest = center.clamp(lo.as_dvec3(), hi.as_dvec3());
                nearest.distance_squared(center) <= radius * radius
            }
            Self::Empty => false,
        }
    }
}

/// A physics body held by the sandbox.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SandboxBody {
    /// Current state.
    pub snapshot: BodySnapshot,
    /// Linear velocity in m/s.
    pub velocity: DVec3,
    /// Force accumulated since the last integration.
    pub force: DVec3,
}

/// The backing object of a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SandboxAnchor {
    /// Parameters the anchor was spawned or last updated with.
    pub params: FieldParams,
    /// Whether the anchor is switched on.
    pub enabled: bool,
}

#[derive(Debug, Clone)]
struct SandboxAsteroid {
    snapshot: AsteroidSnapshot,
    shape: VoxelShape,
}

/// A deterministic in-memory world.
#[derive(Debug, Clone)]
pub struct SandboxWorld {
    bodies: BTreeMap<BodyId, SandboxBody>,
    asteroids: BTreeMap<AsteroidId, SandboxAsteroid>,
    anchors: BTreeMap<FieldId, SandboxAnchor>,
    observer: Option<ObserverSnapshot>,
    observer_velocity: DVec3,
    template: String,
    template_available: bool,
    fail_next_spawn: bool,
    next_entity: u64,
}

impl Default for SandboxWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxWorld {
    /// An empty world with no observer.
    pub fn new() -> Self {
        Self::with_template(DEFAULT_ANCHOR_TEMPLATE)
    }

    /// An empty world spawning anchors from the named template.
    pub fn with_template(template: impl Into<String>) -> Self {
        Self {
            bodies: BTreeMap::new(),
            asteroids: BTreeMap::new(),
            anchors: BTreeMap::new(),
            observer: None,
            observer_velocity: DVec3::ZERO,
            template: template.into(),
            template_available: true,
            fail_next_spawn: false,
            next_entity: FIRST_ENTITY_ID,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_entity;
        self.next_entity = self.next_entity.saturating_add(1);
        id
    }

    /// Add a dynamic body and return its id.
    pub fn add_body(&mut self, position: DVec3, mass: f64) -> BodyId {
        let id = BodyId::new(self.next_id());
        self.insert_body(BodySnapshot {
            id,
            position,
            mass,
            is_static: false,
            physics_enabled: true,
            phantom: false,
        });
        id
    }

    /// Insert or replace a body with explicit flags.
    pub fn insert_body(&mut self, snapshot: BodySnapshot) {
        self.bodies.insert(
            snapshot.id,
            SandboxBody {
                snapshot,
                velocity: DVec3::ZERO,
                force: DVec3::ZERO,
            },
        );
    }

    /// Close a body.
    pub fn remove_body(&mut self, id: BodyId) -> Option<SandboxBody> {
        self.bodies.remove(&id)
    }

    /// A body's full sandbox state.
    pub fn sandbox_body(&self, id: BodyId) -> Option<&SandboxBody> {
        self.bodies.get(&id)
    }

    /// Force accumulated on a body since the last integration.
    pub fn accumulated_force(&self, id: BodyId) -> DVec3 {
        self.bodies.get(&id).map_or(DVec3::ZERO, |body| body.force)
    }

    /// Place, move or remove the local observer.
    pub const fn set_observer(&mut self, observer: Option<ObserverSnapshot>) {
        self.observer = observer;
    }

    /// Velocity gathered by the observer so far.
    pub const fn observer_velocity(&self) -> DVec3 {
        self.observer_velocity
    }

    /// Add an asteroid and return its id.
    pub fn add_asteroid(
        &mut self,
        storage_name: &str,
        corner: DVec3,
        size: IVec3,
        shape: VoxelShape,
    ) -> AsteroidId {
        let id = AsteroidId::new(self.next_id());
        self.asteroids.insert(
            id,
            SandboxAsteroid {
                snapshot: AsteroidSnapshot {
                    id,
                    storage_name: storage_name.to_owned(),
                    corner,
                    size,
                    physics_enabled: true,
                    phantom: false,
                },
                shape,
            },
        );
        id
    }

    /// Remove an asteroid.
    pub fn remove_asteroid(&mut self, id: AsteroidId) -> bool {
        self.asteroids.remove(&id).is_some()
    }

    /// An anchor's state.
    pub fn anchor(&self, id: FieldId) -> Option<&SandboxAnchor> {
        self.anchors.get(&id)
    }

    /// Number of anchors in the world.
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    /// Destroy an anchor the way a player grinding it down would.
    pub fn destroy_anchor(&mut self, id: FieldId) -> bool {
        self.anchors.remove(&id).is_some()
    }

    /// Make the anchor template available or missing.
    pub const fn set_template_available(&mut self, available: bool) {
        self.template_available = available;
    }

    /// Make the next spawn produce nothing.
    pub const fn fail_next_spawn(&mut self) {
        self.fail_next_spawn = true;
    }

    /// Turn accumulated forces into motion over `dt` seconds and clear them.
    pub fn integrate(&mut self, dt: f64) {
        for body in self.bodies.values_mut() {
            if body.snapshot.mass > 0.0 && !body.snapshot.is_static {
                body.velocity += body.force / body.snapshot.mass * dt;
                body.snapshot.position += body.velocity * dt;
            }
            body.force = DVec3::ZERO;
        }
        if let Some(observer) = self.observer.as_mut() {
            observer.position += self.observer_velocity * dt;
        }
    }
}

impl World for SandboxWorld {
    fn bodies(&self) -> Vec<BodySnapshot> {
        self.bodies.values().map(|body| body.snapshot).collect()
    }

    fn body(&self, id: BodyId) -> Option<BodySnapshot> {
        self.bodies.get(&id).map(|body| body.snapshot)
    }

    fn apply_force(&mut self, id: BodyId, force: DVec3) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.force += force;
        }
    }

    fn observer(&self) -> Option<ObserverSnapshot> {
        self.observer
    }

    fn add_observer_velocity(&mut self, delta: DVec3) {
        self.observer_velocity += delta;
    }

    fn asteroids(&self) -> Vec<AsteroidSnapshot> {
        self.asteroids
            .values()
            .map(|asteroid| asteroid.snapshot.clone())
            .collect()
    }

    fn asteroid(&self, id: AsteroidId) -> Option<AsteroidSnapshot> {
        self.asteroids
            .get(&id)
            .map(|asteroid| asteroid.snapshot.clone())
    }

    fn read_content(
        &self,
        asteroid: AsteroidId,
        level: SampleLevel,
        size: IVec3,
    ) -> Result<ContentGrid, CollaboratorFailure> {
        let entry = self
            .asteroids
            .get(&asteroid)
            .ok_or_else(|| CollaboratorFailure::ContentRead {
                asteroid,
                reason: "asteroid does not exist".to_owned(),
            })?;

        let scale = level.scale.max(1);
        let mut grid = ContentGrid::filled(size, 0);
        let cells = grid.size();
        for z in 0..cells.z {
            for y in 0..cells.y {
                for x in 0..cells.x {
                    let cell = IVec3::new(x, y, z);
                    let lo = cell.saturating_mul(IVec3::splat(scale));
                    let hi = lo.saturating_add(IVec3::splat(scale));
                    if entry.shape.touches(lo, hi) {
                        grid.set(cell, SOLID);
                    }
                }
            }
        }
        Ok(grid)
    }

    fn spawn_anchor(
        &mut self,
        id: FieldId,
        params: &FieldParams,
    ) -> Result<FieldId, CollaboratorFailure> {
        if !self.template_available {
            return Err(CollaboratorFailure::AnchorTemplateMissing {
                name: self.template.clone(),
            });
        }
        if self.fail_next_spawn {
            self.fail_next_spawn = false;
            return Err(CollaboratorFailure::AnchorSpawnFailed { id });
        }

        let id = if id.into_inner() == 0 || self.anchors.contains_key(&id) {
            FieldId::new(self.next_id())
        } else {
            id
        };
        self.anchors.insert(
            id,
            SandboxAnchor {
                params: *params,
                enabled: true,
            },
        );
        debug!(field_id = %id, "Anchor spawned");
        Ok(id)
    }

    fn despawn_anchor(&mut self, id: FieldId) {
        self.anchors.remove(&id);
    }

    fn anchor_exists(&self, id: FieldId) -> bool {
        self.anchors.contains_key(&id)
    }

    fn update_anchor(&mut self, id: FieldId, params: &FieldParams, enabled: bool) {
        if let Some(anchor) = self.anchors.get_mut(&id) {
            anchor.params = *params;
            anchor.enabled = enabled;
        }
    }
}

/// A [`Presenter`] that records everything shown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingPresenter {
    /// Notifications as `(text, duration_ms)`.
    pub notifications: Vec<(String, u32)>,
    /// Messages as `(sender, text)`.
    pub messages: Vec<(String, String)>,
}

impl Presenter for RecordingPresenter {
    fn notify(&mut self, text: &str, duration_ms: u32) {
        self.notifications.push((text.to_owned(), duration_ms));
    }

    fn message(&mut self, sender: &str, text: &str) {
        self.messages.push((sender.to_owned(), text.to_owned()));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn coarse_sampling_marks_cells_touching_content() {
        let mut world = SandboxWorld::new();
        let id = world.add_asteroid(
            "gravity_block",
            DVec3::ZERO,
            IVec3::splat(16),
            VoxelShape::Block {
                min: IVec3::new(5, 0, 0),
                max: IVec3::new(6, 1, 1),
            },
        );
        let grid = world
            .read_content(id, SampleLevel { lod: 2, scale: 4 }, IVec3::splat(4))
            .unwrap();
        assert_eq!(grid.get(IVec3::new(1, 0, 0)), SOLID);
        assert_eq!(grid.get(IVec3::new(0, 0, 0)), 0);
        assert_eq!(grid.get(IVec3::new(2, 0, 0)), 0);
    }

    #[test]
    fn reading_a_missing_asteroid_fails() {
        let world = SandboxWorld::new();
        let err = world
            .read_content(AsteroidId::new(5), SampleLevel { lod: 2, scale: 4 }, IVec3::ONE)
            .unwrap_err();
        assert!(matches!(err, CollaboratorFailure::ContentRead { .. }));
    }

    #[test]
    fn spawn_honours_free_ids_and_replaces_taken_ones() {
        let mut world = SandboxWorld::new();
        let params = FieldParams {
            center: DVec3::ZERO,
            radius: 10,
            strength: 0.1,
        };
        assert_eq!(world.spawn_anchor(FieldId::new(77), &params).unwrap(), FieldId::new(77));
        let other = world.spawn_anchor(FieldId::new(77), &params).unwrap();
        assert_ne!(other, FieldId::new(77));
        assert_eq!(world.anchor_count(), 2);
    }

    #[test]
    fn integrate_moves_bodies_along_force() {
        let mut world = SandboxWorld::new();
        let id = world.add_body(DVec3::ZERO, 2.0);
        world.apply_force(id, DVec3::new(4.0, 0.0, 0.0));
        world.integrate(1.0);
        let body = world.sandbox_body(id).unwrap();
        assert!(body.velocity.abs_diff_eq(DVec3::new(2.0, 0.0, 0.0), 1e-12));
        assert!(body.snapshot.position.abs_diff_eq(DVec3::new(2.0, 0.0, 0.0), 1e-12));
        assert_eq!(world.accumulated_force(id), DVec3::ZERO);
    }
}
