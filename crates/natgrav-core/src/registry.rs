//! The canonical set of gravity fields of one participant.
//!
//! Pure data: the registry performs no world or network I/O. Callers mirror
//! every create and remove into the replication layer themselves.

use std::collections::{BTreeMap, BTreeSet};

use natgrav_types::{Aabb, DVec3, FieldId, FieldParams};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::error::Anomaly;
use crate::field::GravityField;

/// Result of [`FieldRegistry::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateOutcome {
    /// Id of the inserted field.
    pub id: FieldId,
    /// Set when a field with the same id was replaced.
    pub anomaly: Option<Anomaly>,
}

/// Owns the field-id to field mapping.
///
/// Iteration is in ascending id order, which makes "first match" lookups
/// and the dedup survivor deterministic on every participant.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    fields: BTreeMap<FieldId, GravityField>,
    rng: SmallRng,
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldRegistry {
    /// An empty registry with a randomly seeded id allocator.
    pub fn new() -> Self {
        Self::with_seed(rand::rng().random())
    }

    /// An empty registry whose id allocator is seeded deterministically.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            fields: BTreeMap::new(),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Pick a fresh, non-zero id not currently in use.
    pub fn allocate_id(&mut self) -> FieldId {
        loop {
            let candidate = FieldId::new(self.rng.random());
            if candidate.into_inner() != 0 && !self.fields.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Insert a field, replacing any existing field with the same id.
    ///
    /// When `id` is `None` a fresh id is allocated. Replacing is reported as
    /// [`Anomaly::DuplicateCreateReplaced`]; afterwards exactly one field
    /// with that id exists and it carries the new parameters.
    pub fn create(&mut self, id: Option<FieldId>, params: FieldParams) -> CreateOutcome {
        let id = id.unwrap_or_else(|| self.allocate_id());
        let field = GravityField::new(id, params);
        let anomaly = self.fields.insert(id, field).map(|_old| {
            warn!(field_id = %id, "Field already existed, removed and re-added");
            Anomaly::DuplicateCreateReplaced { id }
        });
        debug!(field_id = %id, radius = params.radius, strength = params.strength, "Field registered");
        CreateOutcome { id, anomaly }
    }

    /// Remove a field. Removing an unknown id is reported, not fatal.
    pub fn remove(&mut self, id: FieldId) -> Result<GravityField, Anomaly> {
        self.fields.remove(&id).ok_or_else(|| {
            warn!(field_id = %id, "Remove for unknown field");
            Anomaly::UnknownFieldRemoved { id }
        })
    }

    /// Look up a field.
    pub fn get(&self, id: FieldId) -> Option<&GravityField> {
        self.fields.get(&id)
    }

    /// Look up a field mutably.
    pub fn get_mut(&mut self, id: FieldId) -> Option<&mut GravityField> {
        self.fields.get_mut(&id)
    }

    /// Whether a field with this id exists.
    pub fn contains(&self, id: FieldId) -> bool {
        self.fields.contains_key(&id)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All fields in ascending id order.
    pub fn all(&self) -> impl Iterator<Item = &GravityField> {
        self.fields.values()
    }

    /// All fields, mutably, in ascending id order.
    pub fn all_mut(&mut self) -> impl Iterator<Item = &mut GravityField> {
        self.fields.values_mut()
    }

    /// The lowest-id field whose center lies inside `bounds`, faces
    /// included.
    pub fn find_by_point_in_box(&self, bounds: &Aabb) -> Option<&GravityField> {
        self.fields
            .values()
            .find(|field| bounds.contains_inclusive(field.center()))
    }

    /// Drop every field whose center equals that of a lower-id field.
    ///
    /// Centers are compared exactly. Returns one anomaly per removed field.
    pub fn dedup_sweep(&mut self) -> Vec<Anomaly> {
        let mut seen: BTreeMap<[u64; 3], FieldId> = BTreeMap::new();
        let mut anomalies = Vec::new();

        for field in self.fields.values() {
            let key = center_key(field.center());
            match seen.get(&key) {
                Some(&kept) => anomalies.push(Anomaly::DuplicateCenterRemoved {
                    removed: field.id(),
                    kept,
                }),
                None => {
                    seen.insert(key, field.id());
                }
            }
        }

        for anomaly in &anomalies {
            if let Anomaly::DuplicateCenterRemoved { removed, kept } = *anomaly {
                self.fields.remove(&removed);
                warn!(field_id = %removed, kept = %kept, "Removed duplicated field");
            }
        }
        anomalies
    }

    /// Keep only fields for which `keep` returns true. Returns removed ids.
    pub fn retain(&mut self, mut keep: impl FnMut(&GravityField) -> bool) -> Vec<FieldId> {
        let doomed: BTreeSet<FieldId> = self
            .fields
            .values()
            .filter(|field| !keep(field))
            .map(GravityField::id)
            .collect();
        self.fields.retain(|id, _| !doomed.contains(id));
        doomed.into_iter().collect()
    }

    /// Remove every field.
    pub fn clear(&mut self) {
        self.fields.clear();
    }
}

/// Exact bit pattern of a center, with `-0.0` folded into `0.0`.
fn center_key(center: DVec3) -> [u64; 3] {
    // -0.0 + 0.0 is +0.0; every other value is unchanged.
    let fold = |v: f64| (v + 0.0).to_bits();
    [fold(center.x), fold(center.y), fold(center.z)]
}
