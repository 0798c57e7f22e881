//! Host and followers exchanging fields and settings over the loopback
//! network, including reordered and duplicated delivery.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

mod common;

use common::{Participant, add_asteroid_everywhere, quick_config, settle};
use natgrav_core::loopback::LoopbackNetwork;
use natgrav_core::replication::ConfigRoute;
use natgrav_core::sandbox::VoxelShape;
use natgrav_core::store::MemoryConfigPersistence;
use natgrav_core::world::World;
use natgrav_core::{MessageOutcome, RoleKind};
use natgrav_protocol::{Channel, ConfigAction};
use natgrav_types::{DVec3, FieldParams, ParticipantId};
use rand::SeedableRng;
use rand::rngs::SmallRng;

const FILE: &str = "natural-gravity.cfg";

fn session_of_three() -> (LoopbackNetwork, Participant, Participant, Participant) {
    let net = LoopbackNetwork::new(ParticipantId::new(1));
    let host = Participant::join(&net, 1, RoleKind::Host, quick_config());
    let a = Participant::join(&net, 2, RoleKind::Follower, quick_config());
    let b = Participant::join(&net, 3, RoleKind::Follower, quick_config());
    (net, host, a, b)
}

fn params(x: f64) -> FieldParams {
    FieldParams {
        center: DVec3::new(x, 0.0, 0.0),
        radius: 800,
        strength: 0.25,
    }
}

#[test]
fn follower_fetches_host_settings_on_start() {
    let (net, mut host, mut a, mut b) = session_of_three();
    host.persistence = MemoryConfigPersistence::with_file(FILE, "mass_limit=5\njetpack=40\n");

    host.start();
    a.start();
    assert_eq!(net.pending(), 1);

    settle(&net, &mut [&mut host, &mut a, &mut b]);

    assert_eq!(a.session.settings().mass_limit, 5);
    assert_eq!(a.session.settings().jetpack, 40);
    // Only the follower that asked gets the answer.
    assert_eq!(b.session.settings().mass_limit, 200_000);
    // The host re-saved its file with comments.
    assert!(host.persistence.text(FILE).unwrap().contains("// "));
}

#[test]
fn followers_ignore_settings_requests() {
    let (_net, _host, mut a, _b) = session_of_three();
    let outcome = a.with_io(|session, io| {
        session.handle_message(io, Channel::AskSettings.id(), b"3")
    });
    assert!(matches!(outcome, MessageOutcome::Ignored));
}

#[test]
fn follower_setting_reaches_every_participant() {
    let (net, mut host, mut a, mut b) = session_of_three();

    a.with_io(|session, io| session.set_setting(io, "notify", "FALSE"))
        .unwrap();
    settle(&net, &mut [&mut host, &mut a, &mut b]);

    for participant in [&host, &a, &b] {
        assert!(!participant.session.settings().notify);
    }
}

#[test]
fn forwarded_reset_runs_on_the_host_without_saving() {
    let (net, mut host, mut a, mut b) = session_of_three();
    host.persistence = MemoryConfigPersistence::with_file(FILE, "mass_limit=5\n");
    host.start();
    a.start();
    b.start();
    settle(&net, &mut [&mut host, &mut a, &mut b]);
    assert_eq!(b.session.settings().mass_limit, 5);

    let route = a
        .with_io(|session, io| session.config_action(io, ConfigAction::Reset))
        .unwrap();
    assert_eq!(route, ConfigRoute::Forwarded);
    // Nothing changes locally until the host answers.
    assert_eq!(a.session.settings().mass_limit, 5);

    settle(&net, &mut [&mut host, &mut a, &mut b]);

    for participant in [&host, &a, &b] {
        assert_eq!(participant.session.settings().mass_limit, 200_000);
    }
    assert!(host.persistence.text(FILE).unwrap().contains("mass_limit=5"));
}

#[test]
fn config_request_from_a_peer_is_ignored_by_followers() {
    let (_net, _host, mut a, _b) = session_of_three();
    let outcome = a.with_io(|session, io| {
        session.handle_message(io, Channel::Config.id(), &[ConfigAction::Reset.code()])
    });
    assert!(matches!(outcome, MessageOutcome::Ignored));
}

#[test]
fn follower_creates_are_echoed_to_everyone() {
    let (net, mut host, mut a, mut b) = session_of_three();

    let id = a
        .with_io(|session, io| session.create_field(io, params(0.0)))
        .unwrap();
    settle(&net, &mut [&mut host, &mut a, &mut b]);

    for participant in [&host, &a, &b] {
        assert_eq!(participant.fields(), vec![(id.into_inner(), params(0.0))]);
        assert!(participant.world.anchor_exists(id));
    }

    b.with_io(|session, io| session.remove_field(io, id)).unwrap();
    settle(&net, &mut [&mut host, &mut a, &mut b]);

    for participant in [&host, &a, &b] {
        assert!(participant.fields().is_empty());
        assert_eq!(participant.world.anchor_count(), 0);
    }
}

#[test]
fn switching_off_is_local_and_survives_remote_edits() {
    let (net, mut host, mut a, mut b) = session_of_three();
    let id = host
        .with_io(|session, io| session.create_field(io, params(0.0)))
        .unwrap();
    settle(&net, &mut [&mut host, &mut a, &mut b]);

    a.with_io(|session, io| session.set_field_enabled(io, id, false))
        .unwrap();
    assert_eq!(net.pending(), 0);

    host.with_io(|session, io| session.set_field_radius(io, id, 5000))
        .unwrap();
    settle(&net, &mut [&mut host, &mut a, &mut b]);

    let on_a = a.session.registry().get(id).unwrap();
    assert_eq!(on_a.radius(), 5000);
    assert!(!on_a.is_enabled());
    assert!(!a.world.anchor(id).unwrap().enabled);
    assert!(b.session.registry().get(id).unwrap().is_enabled());
}

#[test]
fn scrambled_delivery_still_converges() {
    let (net, mut host, mut a, mut b) = session_of_three();
    for (name, x) in [("gravity_a", 0.0), ("gravity_b", 10_000.0), ("gravity_c", 20_000.0)] {
        add_asteroid_everywhere(
            &mut [&mut host, &mut a, &mut b],
            name,
            DVec3::new(x, 0.0, 0.0),
            128,
            VoxelShape::Solid,
        );
    }
    a.with_io(|session, io| session.create_field(io, params(-50_000.0)))
        .unwrap();

    let mut rng = SmallRng::seed_from_u64(11);
    for _ in 0..5 {
        host.step();
        a.step();
        b.step();
        for _ in 0..50 {
            net.scramble(&mut rng, 0.3);
            host.pump();
            a.pump();
            b.pump();
            if net.pending() == 0 {
                break;
            }
        }
    }
    assert_eq!(net.pending(), 0);

    let expected = host.fields();
    assert_eq!(expected.len(), 4);
    assert_eq!(a.fields(), expected);
    assert_eq!(b.fields(), expected);
    for participant in [&host, &a, &b] {
        assert_eq!(participant.world.anchor_count(), expected.len());
    }
}

#[test]
fn malformed_field_sync_changes_nothing() {
    let net = LoopbackNetwork::new(ParticipantId::new(1));
    let mut a = Participant::join(&net, 2, RoleKind::Follower, quick_config());
    let sync = |a: &mut Participant, payload: &[u8]| {
        a.with_io(|session, io| session.handle_message(io, Channel::Sync.id(), payload))
    };

    assert!(sync(&mut a, b"0;4;1;2;3;100;0.5").is_applied());
    let before = a.fields();

    for payload in [
        &b"0;1;2;3;4;5"[..],
        b"0;9;abc;0;0;100;0.5",
        b"0;9;0;0;0;100;NaN",
        b"0;9;0;0;0;NaN;0.5",
        b"0;9;0;0;0;100;inf",
        b"7;9",
        b"1;4;5",
    ] {
        let outcome = sync(&mut a, payload);
        assert!(
            matches!(outcome, MessageOutcome::Dropped { .. }),
            "{:?} gave {outcome:?}",
            String::from_utf8_lossy(payload)
        );
    }
    assert_eq!(a.fields(), before);
    assert_eq!(a.world.anchor_count(), 1);

    assert!(sync(&mut a, b"0;9;0;0;0;100;0.5").is_applied());
    assert_eq!(a.fields().len(), 2);
    assert_eq!(a.world.anchor_count(), 2);
}
