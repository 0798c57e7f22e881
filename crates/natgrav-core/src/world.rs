//! Host world and presentation collaborators.
//!
//! The session core never touches entities, physics or voxel storage
//! directly. Everything it needs from the host world goes through the
//! [`World`] trait, and everything it shows to the local player goes
//! through [`Presenter`]. Snapshots are plain values copied out of the
//! world at the moment of the call.

use natgrav_types::{Aabb, AsteroidId, BodyId, DVec3, FieldId, FieldParams, IVec3};

use crate::error::CollaboratorFailure;

/// A movable physics body as seen at the moment of the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodySnapshot {
    /// Entity id of the body.
    pub id: BodyId,
    /// World position.
    pub position: DVec3,
    /// Physics mass in kilograms.
    pub mass: f64,
    /// Static bodies never move and are never pulled.
    pub is_static: bool,
    /// Whether physics simulation is enabled on the body.
    pub physics_enabled: bool,
    /// Phantom bodies detect overlaps but do not collide.
    pub phantom: bool,
}

/// The locally controlled character or vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverSnapshot {
    /// World position of the controlled entity.
    pub position: DVec3,
    /// The controlled entity is a character (not a ship seat).
    pub is_character: bool,
    /// The character's jetpack is on.
    pub jetpack_enabled: bool,
    /// The character's inertia dampeners are on.
    pub dampeners_enabled: bool,
}

/// An asteroid (voxel map) in the world.
#[derive(Debug, Clone, PartialEq)]
pub struct AsteroidSnapshot {
    /// Entity id of the asteroid.
    pub id: AsteroidId,
    /// Storage name, matched against the configured prefixes.
    pub storage_name: String,
    /// World position of the storage's minimum corner.
    pub corner: DVec3,
    /// Storage size in voxels (one voxel is one metre).
    pub size: IVec3,
    /// Whether physics is enabled on the asteroid.
    pub physics_enabled: bool,
    /// Phantom asteroids are ignored.
    pub phantom: bool,
}

impl AsteroidSnapshot {
    /// World-space bounds of the whole voxel storage.
    pub fn bounds(&self) -> Aabb {
        Aabb::from_corner_and_size(self.corner, self.size)
    }
}

/// Level of detail used to sample voxel content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLevel {
    /// Level of detail passed to the storage reader.
    pub lod: u32,
    /// Voxels per sampled cell along each axis.
    pub scale: i32,
}

/// Per-cell content bytes of a sampled voxel region. Zero means empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentGrid {
    size: IVec3,
    content: Vec<u8>,
}

impl ContentGrid {
    /// A grid of `size` cells, all set to `value`. Negative axes count as 0.
    pub fn filled(size: IVec3, value: u8) -> Self {
        let size = size.max(IVec3::ZERO);
        Self {
            size,
            content: vec![value; cell_count(size)],
        }
    }

    /// Grid dimensions in cells.
    pub const fn size(&self) -> IVec3 {
        self.size
    }

    /// Content of a cell, 0 when out of range.
    pub fn get(&self, cell: IVec3) -> u8 {
        self.index(cell)
            .and_then(|i| self.content.get(i).copied())
            .unwrap_or(0)
    }

    /// Set the content of a cell. Out-of-range cells are ignored.
    pub fn set(&mut self, cell: IVec3, value: u8) {
        if let Some(slot) = self.index(cell).and_then(|i| self.content.get_mut(i)) {
            *slot = value;
        }
    }

    fn index(&self, cell: IVec3) -> Option<usize> {
        if cell.cmplt(IVec3::ZERO).any() || cell.cmpge(self.size).any() {
            return None;
        }
        let x = usize::try_from(cell.x).ok()?;
        let y = usize::try_from(cell.y).ok()?;
        let z = usize::try_from(cell.z).ok()?;
        let sx = usize::try_from(self.size.x).ok()?;
        let sy = usize::try_from(self.size.y).ok()?;
        z.checked_mul(sy)?
            .checked_add(y)?
            .checked_mul(sx)?
            .checked_add(x)
    }
}

fn cell_count(size: IVec3) -> usize {
    [size.x, size.y, size.z]
        .into_iter()
        .map(|axis| usize::try_from(axis).unwrap_or(0))
        .try_fold(1_usize, usize::checked_mul)
        .unwrap_or(0)
}

/// The host world as the gravity subsystem sees it.
pub trait World {
    /// Snapshot of every physics body currently in the world.
    fn bodies(&self) -> Vec<BodySnapshot>;

    /// Live lookup of one body. `None` once the body is closed.
    fn body(&self, id: BodyId) -> Option<BodySnapshot>;

    /// Apply a world-frame force to a body for this step.
    fn apply_force(&mut self, id: BodyId, force: DVec3);

    /// The locally controlled entity. `None` on a dedicated host or when
    /// nothing is controlled.
    fn observer(&self) -> Option<ObserverSnapshot>;

    /// Add to the observer's linear velocity.
    fn add_observer_velocity(&mut self, delta: DVec3);

    /// Snapshot of every asteroid.
    fn asteroids(&self) -> Vec<AsteroidSnapshot>;

    /// Live lookup of one asteroid.
    fn asteroid(&self, id: AsteroidId) -> Option<AsteroidSnapshot>;

    /// Sample `size` cells of voxel content at the given level.
    fn read_content(
        &self,
        asteroid: AsteroidId,
        level: SampleLevel,
        size: IVec3,
    ) -> Result<ContentGrid, CollaboratorFailure>;

    /// Create the backing anchor object of a field and return its id.
    ///
    /// The world should honour `id` so ids agree across participants.
    fn spawn_anchor(&mut self, id: FieldId, params: &FieldParams)
    -> Result<FieldId, CollaboratorFailure>;

    /// Destroy an anchor. Unknown ids are ignored.
    fn despawn_anchor(&mut self, id: FieldId);

    /// Whether the anchor still exists.
    fn anchor_exists(&self, id: FieldId) -> bool;

    /// Mirror radius, strength and the enabled flag onto the anchor.
    fn update_anchor(&mut self, id: FieldId, params: &FieldParams, enabled: bool);
}

/// On-screen output for the local player.
pub trait Presenter {
    /// Show a transient notification.
    fn notify(&mut self, text: &str, duration_ms: u32);

    /// Show a chat-style message from `sender`.
    fn message(&mut self, sender: &str, text: &str);
}
