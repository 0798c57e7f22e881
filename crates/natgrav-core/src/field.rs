//! A single gravity field and its local state.

use std::collections::BTreeSet;

use natgrav_types::{BodyId, DVec3, FieldId, FieldParams, clamp_radius, clamp_strength};

use crate::spatial;

/// A spherical region pulling bodies toward its center.
///
/// Radius and strength are always within their absolute bounds. The center
/// never moves after creation. Membership and the notification flag are
/// local to this participant and never replicated.
#[derive(Debug, Clone, PartialEq)]
pub struct GravityField {
    id: FieldId,
    params: FieldParams,
    enabled: bool,
    members: BTreeSet<BodyId>,
    notified: bool,
}

impl GravityField {
    /// A new enabled field with no members.
    pub fn new(id: FieldId, params: FieldParams) -> Self {
        Self {
            id,
            params: FieldParams {
                center: params.center,
                radius: clamp_radius(i64::from(params.radius)),
                strength: clamp_strength(params.strength),
            },
            enabled: true,
            members: BTreeSet::new(),
            notified: false,
        }
    }

    /// Field id.
    pub const fn id(&self) -> FieldId {
        self.id
    }

    /// Replicated parameters.
    pub const fn params(&self) -> FieldParams {
        self.params
    }

    /// World-space center.
    pub const fn center(&self) -> DVec3 {
        self.params.center
    }

    /// Radius in metres.
    pub const fn radius(&self) -> i32 {
        self.params.radius
    }

    /// Strength as a fraction of G.
    pub const fn strength(&self) -> f32 {
        self.params.strength
    }

    /// Whether the field is switched on.
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Switch the field on or off.
    pub const fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Enabled with a positive strength, so it exerts force.
    pub const fn is_active(&self) -> bool {
        self.enabled && self.params.strength > 0.0
    }

    /// Whether `point` is within the radius, boundary included.
    pub fn in_radius(&self, point: DVec3) -> bool {
        spatial::in_radius(self.params.center, self.params.radius, point)
    }

    /// Clamp and store a new radius. Returns the stored value.
    pub fn set_radius(&mut self, radius: i64) -> i32 {
        self.params.radius = clamp_radius(radius);
        self.params.radius
    }

    /// Clamp and store a new strength. Returns the stored value.
    pub const fn set_strength(&mut self, strength: f32) -> f32 {
        self.params.strength = clamp_strength(strength);
        self.params.strength
    }

    /// Bodies found inside the radius at the last refresh.
    pub const fn members(&self) -> &BTreeSet<BodyId> {
        &self.members
    }

    pub(crate) fn replace_members(&mut self, members: BTreeSet<BodyId>) {
        self.members = members;
    }

    pub(crate) fn add_member(&mut self, body: BodyId) -> bool {
        self.members.insert(body)
    }

    pub(crate) fn remove_member(&mut self, body: BodyId) -> bool {
        self.members.remove(&body)
    }

    /// Whether the observer was last told they are inside.
    pub const fn notified(&self) -> bool {
        self.notified
    }

    pub(crate) const fn set_notified(&mut self, notified: bool) {
        self.notified = notified;
    }
}
