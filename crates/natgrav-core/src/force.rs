//! Per-step force on tracked bodies and the local observer.
//!
//! The field is a constant-magnitude pull toward its center. There is no
//! falloff with distance, no orbital model and no collision handling.

use natgrav_types::DVec3;
use natgrav_types::constants::{G, STEP_SECONDS};
use tracing::debug;

use crate::registry::FieldRegistry;
use crate::settings::GlobalSettings;
use crate::world::{ObserverSnapshot, Presenter, World};

/// Shown when the observer crosses into a field.
pub const ENTERING_TEXT: &str = "Entering natural gravity...";

/// Shown when the observer crosses out of a field.
pub const LEAVING_TEXT: &str = "Leaving natural gravity...";

/// Acceleration in m/s² of a field with the given strength.
pub fn field_acceleration(strength: f32) -> f64 {
    f64::from(G) * f64::from(strength)
}

/// Mass the field pulls on, after `mass_limit` and `mass_divide`.
///
/// With a divisor, mass above the limit counts `1/mass_divide`. With only a
/// limit, mass is capped at it.
pub fn effective_mass(mass: f64, settings: &GlobalSettings) -> f64 {
    let limit = f64::from(settings.mass_limit);
    if settings.mass_divide > 0 {
        if mass > limit {
            limit + (mass - limit) / f64::from(settings.mass_divide)
        } else {
            mass
        }
    } else if settings.mass_limit > 0 {
        mass.min(limit)
    } else {
        mass
    }
}

/// World-frame force on a body. Zero when the body sits on the center.
pub fn body_force(center: DVec3, position: DVec3, mass: f64, acceleration: f64) -> DVec3 {
    (center - position).normalize_or_zero() * mass * acceleration
}

/// Velocity change of a jetpacking observer for one step.
pub fn jetpack_velocity_delta(
    center: DVec3,
    position: DVec3,
    acceleration: f64,
    jetpack_percent: i32,
) -> DVec3 {
    (center - position).normalize_or_zero()
        * acceleration
        * (f64::from(jetpack_percent) / 100.0)
        * STEP_SECONDS
}

/// Whether the jetpack pull applies to this observer.
///
/// With `jetpack_hover` on, an observer hovering on dampeners is left alone.
pub const fn jetpack_applies(observer: &ObserverSnapshot, settings: &GlobalSettings) -> bool {
    settings.jetpack > 0
        && observer.is_character
        && observer.jetpack_enabled
        && !(settings.jetpack_hover && observer.dampeners_enabled)
}

/// A change in the observer's inside/outside state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyEdge {
    /// Crossed into the field.
    Entering,
    /// Crossed out of the field.
    Leaving,
}

impl NotifyEdge {
    /// Notification text.
    pub const fn text(self) -> &'static str {
        match self {
            Self::Entering => ENTERING_TEXT,
            Self::Leaving => LEAVING_TEXT,
        }
    }
}

/// Edge-triggered: an event only when `inside` differs from the last
/// notified state.
pub const fn notify_edge(inside: bool, notified: bool) -> Option<NotifyEdge> {
    match (inside, notified) {
        (true, false) => Some(NotifyEdge::Entering),
        (false, true) => Some(NotifyEdge::Leaving),
        _ => None,
    }
}

/// Counters from one force pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForceReport {
    /// Forces applied to bodies.
    pub forces_applied: usize,
    /// Velocity changes applied to the observer.
    pub observer_pulls: usize,
    /// Notifications shown.
    pub notifications: usize,
}

/// Apply one step of every active field.
///
/// Bodies are looked up live, so members closed since the last refresh are
/// skipped. Observer effects run only when `notify` is on or `jetpack` is
/// positive.
pub fn apply_forces(
    registry: &mut FieldRegistry,
    world: &mut dyn World,
    presenter: &mut dyn Presenter,
    settings: &GlobalSettings,
    notify_duration_ms: u32,
) -> ForceReport {
    let mut report = ForceReport::default();
    let observer = if settings.notify || settings.jetpack > 0 {
        world.observer()
    } else {
        None
    };

    for field in registry.all_mut() {
        if !field.is_active() {
            continue;
        }
        let acceleration = field_acceleration(field.strength());

        if settings.affect_ships {
            for &id in field.members() {
                let Some(body) = world.body(id) else {
                    continue;
                };
                let mass = effective_mass(body.mass, settings);
                world.apply_force(id, body_force(field.center(), body.position, mass, acceleration));
                report.forces_applied = report.forces_applied.saturating_add(1);
            }
        }

        let Some(observer) = observer else {
            continue;
        };
        let inside = field.in_radius(observer.position);

        if settings.notify
            && let Some(edge) = notify_edge(inside, field.notified())
        {
            presenter.notify(edge.text(), notify_duration_ms);
            field.set_notified(inside);
            report.notifications = report.notifications.saturating_add(1);
            debug!(field_id = %field.id(), ?edge, "Observer crossed field boundary");
        }

        if inside && jetpack_applies(&observer, settings) {
            world.add_observer_velocity(jetpack_velocity_delta(
                field.center(),
                observer.position,
                acceleration,
                settings.jetpack,
            ));
            report.observer_pulls = report.observer_pulls.saturating_add(1);
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn mass_above_limit_is_divided() {
        let s = GlobalSettings::default();
        assert!(close(effective_mass(100_000.0, &s), 100_000.0));
        assert!(close(effective_mass(300_000.0, &s), 210_000.0));
    }

    #[test]
    fn limit_alone_caps_mass() {
        let s = GlobalSettings {
            mass_divide: 0,
            ..GlobalSettings::default()
        };
        assert!(close(effective_mass(300_000.0, &s), 200_000.0));
        let off = GlobalSettings {
            mass_divide: 0,
            mass_limit: 0,
            ..GlobalSettings::default()
        };
        assert!(close(effective_mass(300_000.0, &off), 300_000.0));
    }

    #[test]
    fn force_points_at_center_with_mass_times_acceleration() {
        let accel = field_acceleration(0.5);
        let f = body_force(DVec3::ZERO, DVec3::new(0.0, 0.0, 50.0), 2.0, accel);
        assert!(f.abs_diff_eq(DVec3::new(0.0, 0.0, -2.0 * accel), 1e-9));
        assert_eq!(body_force(DVec3::ONE, DVec3::ONE, 2.0, accel), DVec3::ZERO);
    }

    #[test]
    fn jetpack_delta_uses_one_sixtieth_second() {
        let accel = field_acceleration(1.0);
        let d = jetpack_velocity_delta(DVec3::ZERO, DVec3::new(10.0, 0.0, 0.0), accel, 50);
        assert!(close(d.x, -accel * 0.5 / 60.0));
        assert!(close(d.y, 0.0));
    }

    #[test]
    fn hover_exception_only_with_dampeners() {
        let mut s = GlobalSettings::default();
        let mut obs = ObserverSnapshot {
            position: DVec3::ZERO,
            is_character: true,
            jetpack_enabled: true,
            dampeners_enabled: true,
        };
        assert!(jetpack_applies(&obs, &s));
        s.jetpack_hover = true;
        assert!(!jetpack_applies(&obs, &s));
        obs.dampeners_enabled = false;
        assert!(jetpack_applies(&obs, &s));
        obs.jetpack_enabled = false;
        assert!(!jetpack_applies(&obs, &s));
    }

    #[test]
    fn notify_is_edge_triggered() {
        assert_eq!(notify_edge(true, false), Some(NotifyEdge::Entering));
        assert_eq!(notify_edge(true, true), None);
        assert_eq!(notify_edge(false, true), Some(NotifyEdge::Leaving));
        assert_eq!(notify_edge(false, false), None);
    }
}
