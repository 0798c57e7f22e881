//! One session participant of the demo: its session, its private sandbox
//! world and its end of the loopback network.

use natgrav_core::loopback::LoopbackTransport;
use natgrav_core::sandbox::SandboxWorld;
use natgrav_core::store::ConfigPersistence;
use natgrav_core::world::Presenter;
use natgrav_core::{
    CommandError, GravitySession, Identity, MessageOutcome, SessionIo, StepReport, Transport,
    run_command,
};
use natgrav_types::constants::STEP_SECONDS;
use natgrav_types::{FieldId, FieldParams, ParticipantId};
use tracing::{debug, info};

/// Shows notifications and chat replies as log lines.
#[derive(Debug, Clone, Copy)]
pub struct LogPresenter {
    participant: ParticipantId,
}

impl Presenter for LogPresenter {
    fn notify(&mut self, text: &str, duration_ms: u32) {
        info!(participant = %self.participant, duration_ms, "{text}");
    }

    fn message(&mut self, sender: &str, text: &str) {
        for line in text.lines() {
            info!(participant = %self.participant, sender, "{line}");
        }
    }
}

/// A participant and everything its session talks to.
pub struct Node {
    id: ParticipantId,
    session: GravitySession,
    world: SandboxWorld,
    transport: LoopbackTransport,
    presenter: LogPresenter,
    persistence: Box<dyn ConfigPersistence>,
}

impl Node {
    /// Wire a session to its world, transport and settings storage.
    pub fn new(
        session: GravitySession,
        world: SandboxWorld,
        transport: LoopbackTransport,
        persistence: Box<dyn ConfigPersistence>,
    ) -> Self {
        let id = transport.local_id();
        Self {
            id,
            session,
            world,
            transport,
            presenter: LogPresenter { participant: id },
            persistence,
        }
    }

    /// This participant's id.
    pub const fn id(&self) -> ParticipantId {
        self.id
    }

    /// The session.
    pub const fn session(&self) -> &GravitySession {
        &self.session
    }

    fn split(&mut self) -> (&mut GravitySession, SessionIo<'_>) {
        let io = SessionIo {
            world: &mut self.world,
            transport: &mut self.transport,
            presenter: &mut self.presenter,
            persistence: &mut *self.persistence,
        };
        (&mut self.session, io)
    }

    /// Start the session.
    pub fn start(&mut self) {
        let (session, mut io) = self.split();
        session.start(&mut io);
    }

    /// Run one session step, then let the world move for one step.
    pub fn step(&mut self) -> StepReport {
        let report = {
            let (session, mut io) = self.split();
            session.step(&mut io)
        };
        self.world.integrate(STEP_SECONDS);
        report
    }

    /// Handle everything queued for this participant. Returns how many
    /// messages were applied.
    pub fn pump(&mut self) -> usize {
        let inbox = self.transport.drain();
        let (session, mut io) = self.split();
        let mut applied = 0_usize;
        for envelope in inbox {
            let outcome = session.handle_message(&mut io, envelope.channel_id, &envelope.payload);
            if let MessageOutcome::Applied { anomalies } = &outcome {
                applied = applied.saturating_add(1);
                for anomaly in anomalies {
                    debug!(participant = %envelope.from, %anomaly, "Corrected while applying");
                }
            }
        }
        applied
    }

    /// Type a chat line.
    pub fn command(&mut self, is_admin: bool, text: &str) -> Option<Result<String, CommandError>> {
        let identity = Identity {
            participant: self.id,
            is_admin,
        };
        let (session, mut io) = self.split();
        run_command(session, &mut io, identity, text)
    }

    /// Field ids and parameters, in id order.
    pub fn fields(&self) -> Vec<(FieldId, FieldParams)> {
        self.session
            .registry()
            .all()
            .map(|field| (field.id(), field.params()))
            .collect()
    }

    /// End the session. Returns the number of fields dropped.
    pub fn teardown(&mut self) -> usize {
        self.session.teardown()
    }
}
