//! A participant harness shared by the integration tests: one session with
//! its own sandbox world, loopback transport, presenter and settings disk.

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::panic,
    clippy::missing_const_for_fn
)]

use natgrav_core::loopback::{LoopbackNetwork, LoopbackTransport};
use natgrav_core::sandbox::{RecordingPresenter, SandboxWorld, VoxelShape};
use natgrav_core::store::MemoryConfigPersistence;
use natgrav_core::world::ObserverSnapshot;
use natgrav_core::{
    CommandError, GravitySession, Identity, MessageOutcome, RoleKind, SessionConfig, SessionIo,
    StepReport, run_command,
};
use natgrav_types::{DVec3, IVec3, ParticipantId};

/// Config with no warm-up and both cadences on every step.
pub fn quick_config() -> SessionConfig {
    SessionConfig {
        warmup_ticks: 0,
        skip_ticks: 1,
        skip_extra_ticks: 1,
        ..SessionConfig::default()
    }
}

pub struct Participant {
    pub id: ParticipantId,
    pub session: GravitySession,
    pub world: SandboxWorld,
    pub transport: LoopbackTransport,
    pub presenter: RecordingPresenter,
    pub persistence: MemoryConfigPersistence,
}

impl Participant {
    pub fn join(net: &LoopbackNetwork, id: u64, kind: RoleKind, config: SessionConfig) -> Self {
        let id = ParticipantId::new(id);
        Self {
            id,
            session: GravitySession::with_seed(kind, config, id.into_inner()),
            world: SandboxWorld::new(),
            transport: net.join(id),
            presenter: RecordingPresenter::default(),
            persistence: MemoryConfigPersistence::new(),
        }
    }

    /// Run `f` with the session and its collaborators borrowed apart.
    pub fn with_io<R>(&mut self, f: impl FnOnce(&mut GravitySession, &mut SessionIo<'_>) -> R) -> R {
        let Self {
            session,
            world,
            transport,
            presenter,
            persistence,
            ..
        } = self;
        let mut io = SessionIo {
            world,
            transport,
            presenter,
            persistence,
        };
        f(session, &mut io)
    }

    pub fn start(&mut self) {
        self.with_io(|session, io| session.start(io));
    }

    pub fn step(&mut self) -> StepReport {
        self.with_io(|session, io| session.step(io))
    }

    /// Handle everything queued for this participant.
    pub fn pump(&mut self) -> Vec<MessageOutcome> {
        let inbox = self.transport.drain();
        self.with_io(|session, io| {
            inbox
                .iter()
                .map(|envelope| session.handle_message(io, envelope.channel_id, &envelope.payload))
                .collect()
        })
    }

    pub fn command(&mut self, is_admin: bool, text: &str) -> Option<Result<String, CommandError>> {
        let identity = Identity {
            participant: self.id,
            is_admin,
        };
        self.with_io(|session, io| run_command(session, io, identity, text))
    }

    /// Reply text of a command that must be recognised.
    pub fn reply(&mut self, is_admin: bool, text: &str) -> String {
        self.command(is_admin, text)
            .unwrap()
            .unwrap_or_else(|e| e.to_string())
    }

    pub fn place_observer(&mut self, position: DVec3) {
        self.world.set_observer(Some(ObserverSnapshot {
            position,
            is_character: true,
            jetpack_enabled: false,
            dampeners_enabled: false,
        }));
    }

    /// Field ids and parameters, in id order.
    pub fn fields(&self) -> Vec<(u64, natgrav_types::FieldParams)> {
        self.session
            .registry()
            .all()
            .map(|field| (field.id().into_inner(), field.params()))
            .collect()
    }
}

/// Add the same asteroid to every world. Sandbox ids are sequential, so the
/// asteroid gets the same id everywhere as long as worlds are built alike.
pub fn add_asteroid_everywhere(
    participants: &mut [&mut Participant],
    name: &str,
    corner: DVec3,
    size: i32,
    shape: VoxelShape,
) {
    for participant in participants.iter_mut() {
        participant
            .world
            .add_asteroid(name, corner, IVec3::splat(size), shape);
    }
}

/// Pump every participant until no message is left in flight.
pub fn settle(net: &LoopbackNetwork, participants: &mut [&mut Participant]) {
    for _ in 0..100 {
        for participant in participants.iter_mut() {
            participant.pump();
        }
        if net.pending() == 0 {
            return;
        }
    }
    panic!("network did not settle");
}

pub fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}
