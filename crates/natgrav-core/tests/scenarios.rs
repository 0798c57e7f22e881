//! End-to-end behaviour of a single session and of two racing auto-scans.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

mod common;

use common::{Participant, add_asteroid_everywhere, close, quick_config, settle};
use natgrav_core::loopback::LoopbackNetwork;
use natgrav_core::sandbox::VoxelShape;
use natgrav_core::world::World;
use natgrav_core::{Anomaly, MessageOutcome, RoleKind, ValidationError};
use natgrav_protocol::Channel;
use natgrav_types::constants::G;
use natgrav_types::{DVec3, FieldId, FieldParams, ParticipantId};

fn field_at_origin() -> FieldParams {
    FieldParams {
        center: DVec3::ZERO,
        radius: 1000,
        strength: 0.5,
    }
}

fn lone_host() -> (LoopbackNetwork, Participant) {
    let net = LoopbackNetwork::new(ParticipantId::new(1));
    let host = Participant::join(&net, 1, RoleKind::Host, quick_config());
    (net, host)
}

#[test]
fn membership_includes_the_boundary_and_nothing_beyond() {
    let (_net, mut host) = lone_host();
    let inside = host.world.add_body(DVec3::new(999.0, 0.0, 0.0), 1000.0);
    let outside = host.world.add_body(DVec3::new(1001.0, 0.0, 0.0), 1000.0);
    let boundary = host.world.add_body(DVec3::new(0.0, 0.0, 1000.0), 1000.0);

    let id = host
        .with_io(|session, io| session.create_field(io, field_at_origin()))
        .unwrap();
    let report = host.step();
    assert_eq!(report.memberships, 2);

    let members = host.session.registry().get(id).unwrap().members().clone();
    assert!(members.contains(&inside));
    assert!(members.contains(&boundary));
    assert!(!members.contains(&outside));

    let pull = host.world.accumulated_force(inside);
    assert!(close(pull.x, -1000.0 * f64::from(G) * 0.5));
    assert!(close(pull.y, 0.0));
    assert_eq!(host.world.accumulated_force(outside), DVec3::ZERO);
}

#[test]
fn remove_of_unknown_field_is_an_anomaly_not_a_change() {
    let (_net, mut host) = lone_host();
    host.with_io(|session, io| session.create_field(io, field_at_origin()))
        .unwrap();
    let before = host.session.registry().len();

    let outcome = host.with_io(|session, io| session.handle_message(io, Channel::Sync.id(), b"1;42"));

    assert!(matches!(
        outcome,
        MessageOutcome::Applied { ref anomalies }
            if anomalies.as_slice() == [Anomaly::UnknownFieldRemoved { id: FieldId::new(42) }]
    ));
    assert_eq!(host.session.registry().len(), before);
}

#[test]
fn invalid_setting_value_keeps_the_previous_value() {
    let (_net, mut host) = lone_host();
    let previous = host.session.settings().mass_limit;

    let err = host
        .with_io(|session, io| session.set_setting(io, "mass_limit", "abc"))
        .unwrap_err();

    assert!(matches!(err, ValidationError::InvalidValue { ref key, .. } if key == "mass_limit"));
    assert_eq!(host.session.settings().mass_limit, previous);
}

#[test]
fn racing_scans_converge_on_one_field() {
    let net = LoopbackNetwork::new(ParticipantId::new(1));
    let mut host = Participant::join(&net, 1, RoleKind::Host, quick_config());
    let mut follower = Participant::join(&net, 2, RoleKind::Follower, quick_config());
    add_asteroid_everywhere(
        &mut [&mut host, &mut follower],
        "gravity_moon",
        DVec3::new(-256.0, -256.0, -256.0),
        512,
        VoxelShape::Ball {
            center: DVec3::splat(256.0),
            radius: 200.0,
        },
    );

    let host_report = host.step();
    let follower_report = follower.step();
    assert_eq!(host_report.created.len(), 1);
    assert_eq!(follower_report.created.len(), 1);
    let centers: Vec<DVec3> = [&host, &follower]
        .iter()
        .flat_map(|p| p.fields())
        .map(|(_, params)| params.center)
        .collect();
    assert_eq!(centers[0], centers[1]);

    settle(&net, &mut [&mut host, &mut follower]);

    let survivor = host_report.created[0].min(follower_report.created[0]);
    assert_eq!(host.fields().len(), 1);
    assert_eq!(host.fields(), follower.fields());
    assert_eq!(host.fields()[0].0, survivor.into_inner());
    assert_eq!(host.world.anchor_count(), 1);
    assert_eq!(follower.world.anchor_count(), 1);
    assert!(follower.world.anchor_exists(survivor));
}

#[test]
fn scan_skips_prefixless_and_disabled_setups() {
    let (_net, mut host) = lone_host();
    host.world
        .add_asteroid("plain_rock", DVec3::ZERO, natgrav_types::IVec3::splat(64), VoxelShape::Solid);
    assert!(host.step().created.is_empty());

    host.with_io(|session, io| session.set_setting(io, "asteroid_prefix", "plain_"))
        .unwrap();
    host.with_io(|session, io| session.set_setting(io, "asteroid_prefix", "null"))
        .unwrap();
    assert!(host.step().created.is_empty());

    host.with_io(|session, io| session.set_setting(io, "asteroid_prefix", "PLAIN_"))
        .unwrap();
    assert_eq!(host.step().created.len(), 1);
    assert!(host.step().created.is_empty());
}

#[test]
fn destroyed_anchor_leaves_the_registry_on_the_next_step() {
    let (_net, mut host) = lone_host();
    let id = host
        .with_io(|session, io| session.create_field(io, field_at_origin()))
        .unwrap();
    assert!(host.session.protects(id));

    host.world.destroy_anchor(id);
    let report = host.step();

    assert_eq!(report.anomalies, vec![Anomaly::AnchorLost { id }]);
    assert!(host.session.registry().is_empty());
}

#[test]
fn bodies_join_and_leave_between_refreshes() {
    let net = LoopbackNetwork::new(ParticipantId::new(1));
    let mut host = Participant::join(
        &net,
        1,
        RoleKind::Host,
        natgrav_core::SessionConfig {
            skip_ticks: 1000,
            ..quick_config()
        },
    );
    let id = host
        .with_io(|session, io| session.create_field(io, field_at_origin()))
        .unwrap();
    host.step();

    let body = host.world.add_body(DVec3::new(10.0, 0.0, 0.0), 50.0);
    let snapshot = host.world.body(body).unwrap();
    assert_eq!(host.session.on_body_added(&snapshot), 1);
    host.step();
    assert!(host.world.accumulated_force(body).x < 0.0);

    assert_eq!(host.session.on_body_removed(body), 1);
    assert!(host.session.registry().get(id).unwrap().members().is_empty());
}

#[test]
fn observer_is_notified_once_per_crossing() {
    let (_net, mut host) = lone_host();
    host.with_io(|session, io| session.create_field(io, field_at_origin()))
        .unwrap();

    host.place_observer(DVec3::new(10.0, 0.0, 0.0));
    host.step();
    host.step();
    host.place_observer(DVec3::new(5000.0, 0.0, 0.0));
    host.step();

    let texts: Vec<&str> = host
        .presenter
        .notifications
        .iter()
        .map(|(text, _)| text.as_str())
        .collect();
    assert_eq!(
        texts,
        vec!["Entering natural gravity...", "Leaving natural gravity..."]
    );
}
