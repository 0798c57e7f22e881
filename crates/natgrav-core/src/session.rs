//! The session-scoped context owning every piece of gravity state of one
//! participant.
//!
//! A [`GravitySession`] is built when the subsystem activates and torn down
//! when the session ends. The host world drives it with two entry points,
//! always serially:
//!
//! - [`GravitySession::step`] once per simulation step.
//! - [`GravitySession::handle_message`] for every received payload.
//!
//! Neither returns an error. Failures are logged where they are caught and
//! counted in the returned report, so one bad tick or message never stops
//! the next one.
//!
//! Within a step the order is: drop fields whose anchor vanished, rebuild
//! the scan queue (slow cadence), process a budget of scan candidates and
//! dedup, refresh membership (fast cadence), apply forces (every step).

use std::collections::VecDeque;

use natgrav_protocol::{
    CodecError, ConfigAction, CreateField, RemoveField, SyncMessage, WireMessage, decode_raw,
};
use natgrav_types::{AsteroidId, BodyId, FieldId, FieldParams, ParticipantId};
use tracing::{debug, error, info, info_span, warn};

use crate::config::SessionConfig;
use crate::error::{Anomaly, CollaboratorFailure, ValidationError};
use crate::field::GravityField;
use crate::force::{ForceReport, apply_forces};
use crate::registry::FieldRegistry;
use crate::replication::{ConfigRoute, ReplicationRole, RoleKind, Transport, role_for};
use crate::scheduler::{TickPlan, TickScheduler};
use crate::settings::{GlobalSettings, SettingKey};
use crate::spatial::{
    derive_field_params, is_scan_candidate, refresh_membership, scan_candidates, track_body,
    untrack_body,
};
use crate::store::{ConfigPersistence, ConfigStore, LoadOutcome};
use crate::world::{AsteroidSnapshot, BodySnapshot, Presenter, World};

/// The collaborators a session talks to during one call.
pub struct SessionIo<'a> {
    /// The host world.
    pub world: &'a mut dyn World,
    /// The session network.
    pub transport: &'a mut dyn Transport,
    /// On-screen output for the local player.
    pub presenter: &'a mut dyn Presenter,
    /// Byte storage for the settings file.
    pub persistence: &'a mut dyn ConfigPersistence,
}

/// Why a received message was not applied.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The payload did not decode.
    #[error("malformed message: {source}")]
    Codec {
        /// The underlying codec error.
        #[from]
        source: CodecError,
    },

    /// The world or the persistence layer failed while applying it.
    #[error("failed to apply message: {source}")]
    Collaborator {
        /// The underlying failure.
        #[from]
        source: CollaboratorFailure,
    },
}

/// What [`GravitySession::handle_message`] did with a payload.
#[derive(Debug)]
pub enum MessageOutcome {
    /// The message was applied. Corrected inconsistencies are listed.
    Applied {
        /// Anomalies found and corrected while applying.
        anomalies: Vec<Anomaly>,
    },
    /// The message is not meant for this role and was ignored.
    Ignored,
    /// The message was dropped. No state changed.
    Dropped {
        /// What went wrong.
        error: MessageError,
    },
}

impl MessageOutcome {
    const fn applied() -> Self {
        Self::Applied {
            anomalies: Vec::new(),
        }
    }

    /// Whether the message was applied.
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Summary of one [`GravitySession::step`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    /// What the scheduler asked for.
    pub plan: TickPlan,
    /// Scan queue entries consumed.
    pub scanned: usize,
    /// Fields created by the scan.
    pub created: Vec<FieldId>,
    /// Total memberships after a refresh, 0 when none ran.
    pub memberships: usize,
    /// Force pass counters.
    pub forces: ForceReport,
    /// Inconsistencies corrected during the step.
    pub anomalies: Vec<Anomaly>,
    /// Operations aborted by a collaborator failure.
    pub failures: usize,
}

/// All gravity state of one participant, for the lifetime of a session.
#[derive(Debug)]
pub struct GravitySession {
    config: SessionConfig,
    role: Box<dyn ReplicationRole>,
    registry: FieldRegistry,
    store: ConfigStore,
    scheduler: TickScheduler,
    scan_queue: VecDeque<AsteroidId>,
}

impl GravitySession {
    /// A session for the given role with a randomly seeded id allocator.
    pub fn new(kind: RoleKind, config: SessionConfig) -> Self {
        Self::with_registry(kind, config, FieldRegistry::new())
    }

    /// A session whose id allocator is seeded deterministically.
    pub fn with_seed(kind: RoleKind, config: SessionConfig, seed: u64) -> Self {
        Self::with_registry(kind, config, FieldRegistry::with_seed(seed))
    }

    fn with_registry(kind: RoleKind, config: SessionConfig, registry: FieldRegistry) -> Self {
        Self {
            role: role_for(kind),
            registry,
            store: ConfigStore::new(config.config_file.clone()),
            scheduler: TickScheduler::new(&config),
            scan_queue: VecDeque::new(),
            config,
        }
    }

    /// This participant's role.
    pub fn role(&self) -> RoleKind {
        self.role.kind()
    }

    /// Whether this participant is the authoritative host.
    pub fn is_authoritative(&self) -> bool {
        self.role.is_authoritative()
    }

    /// The session configuration.
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The field registry.
    pub const fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// The current global settings.
    pub const fn settings(&self) -> &GlobalSettings {
        self.store.settings()
    }

    /// The settings store.
    pub const fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Asteroids waiting for the scan.
    pub fn scan_queue_len(&self) -> usize {
        self.scan_queue.len()
    }

    /// Whether the scheduler is still in its warm-up.
    pub const fn is_warming_up(&self) -> bool {
        self.scheduler.is_warming_up()
    }

    /// Session start.
    ///
    /// The host reads its settings file and writes it straight back so
    /// comments and new keys are current. A follower asks the host for the
    /// settings.
    pub fn start(&mut self, io: &mut SessionIo<'_>) {
        let _span = info_span!("session_start", role = %self.role.kind()).entered();

        if self.role.is_authoritative() {
            match self.store.load(io.persistence) {
                Ok(outcome) => debug!(?outcome, "Settings load finished"),
                Err(e) => error!(error = %e, "Failed to load settings file"),
            }
            if let Err(e) = self.store.save(io.persistence) {
                error!(error = %e, "Failed to save settings file");
            }
        }
        self.role.on_start(io.transport);

        info!(
            participant = %io.transport.local_id(),
            dedicated = self.config.dedicated,
            "Natural gravity session started"
        );
    }

    /// Run one simulation step.
    pub fn step(&mut self, io: &mut SessionIo<'_>) -> StepReport {
        let plan = self.scheduler.advance();
        let mut report = StepReport {
            plan,
            ..StepReport::default()
        };
        if plan.warming_up {
            return report;
        }
        let _span = info_span!("step", role = %self.role.kind()).entered();

        report.anomalies.extend(self.drop_lost_anchors(io.world));

        if plan.rebuild_scan_queue {
            self.rebuild_scan_queue(io.world);
        }
        self.run_scan_batch(io, &mut report);

        if plan.refresh_membership
            && self.store.settings().affect_ships
            && !self.registry.is_empty()
        {
            report.memberships = refresh_membership(&mut self.registry, &io.world.bodies());
            debug!(
                fields = self.registry.len(),
                memberships = report.memberships,
                "Membership refreshed"
            );
        }

        report.forces = apply_forces(
            &mut self.registry,
            io.world,
            io.presenter,
            self.store.settings(),
            self.config.notify_duration_ms,
        );
        report
    }

    /// Apply one received payload.
    pub fn handle_message(
        &mut self,
        io: &mut SessionIo<'_>,
        channel_id: u16,
        payload: &[u8],
    ) -> MessageOutcome {
        let _span = info_span!("handle_message", channel_id).entered();

        let message = match decode_raw(channel_id, payload) {
            Ok(message) => message,
            Err(source) => {
                error!(error = %source, len = payload.len(), "Dropping malformed message");
                return MessageOutcome::Dropped {
                    error: source.into(),
                };
            }
        };
        debug!(channel = %message.channel(), "Received message");

        let result = match message {
            WireMessage::Sync(SyncMessage::Create(create)) => self.apply_create(io, create),
            WireMessage::Sync(SyncMessage::Remove(remove)) => Ok(self.apply_remove(io, remove)),
            WireMessage::Settings(text) => Ok(self.apply_settings_blob(io, &text)),
            WireMessage::AskSettings(requester) => Ok(self.answer_settings_request(io, requester)),
            WireMessage::ConfigAction(action) => self.apply_remote_config(io, action),
        };

        result.unwrap_or_else(|error| {
            error!(error = %error, "Failed to apply message");
            MessageOutcome::Dropped { error }
        })
    }

    /// Create a field at this participant and announce it.
    ///
    /// The anchor is spawned first. If that fails nothing is registered.
    pub fn create_field(
        &mut self,
        io: &mut SessionIo<'_>,
        params: FieldParams,
    ) -> Result<FieldId, CollaboratorFailure> {
        let params = FieldParams::clamped(params.center, i64::from(params.radius), params.strength);
        let requested = self.registry.allocate_id();
        let id = io.world.spawn_anchor(requested, &params)?;
        self.registry.create(Some(id), params);

        info!(
            field_id = %id,
            radius = params.radius,
            strength = params.strength,
            "Gravity field created"
        );
        self.role
            .publish_sync(io.transport, &SyncMessage::Create(CreateField { id, params }));
        Ok(id)
    }

    /// Remove a field and its anchor, and announce it.
    pub fn remove_field(
        &mut self,
        io: &mut SessionIo<'_>,
        id: FieldId,
    ) -> Result<GravityField, ValidationError> {
        let field = self
            .registry
            .remove(id)
            .map_err(|_anomaly| ValidationError::UnknownField { id })?;
        io.world.despawn_anchor(id);

        info!(field_id = %id, "Gravity field removed");
        self.role
            .publish_sync(io.transport, &SyncMessage::Remove(RemoveField { id }));
        Ok(field)
    }

    /// Change a field's radius. Returns the clamped radius now in effect.
    pub fn set_field_radius(
        &mut self,
        io: &mut SessionIo<'_>,
        id: FieldId,
        radius: i64,
    ) -> Result<i32, ValidationError> {
        let field = self
            .registry
            .get_mut(id)
            .ok_or(ValidationError::UnknownField { id })?;
        let radius = field.set_radius(radius);
        let (params, enabled) = (field.params(), field.is_enabled());
        self.announce_edit(io, id, &params, enabled);
        Ok(radius)
    }

    /// Change a field's strength. Returns the clamped strength now in effect.
    pub fn set_field_strength(
        &mut self,
        io: &mut SessionIo<'_>,
        id: FieldId,
        strength: f32,
    ) -> Result<f32, ValidationError> {
        let field = self
            .registry
            .get_mut(id)
            .ok_or(ValidationError::UnknownField { id })?;
        let strength = field.set_strength(strength);
        let (params, enabled) = (field.params(), field.is_enabled());
        self.announce_edit(io, id, &params, enabled);
        Ok(strength)
    }

    /// Turn a field on or off.
    ///
    /// The flag lives on the anchor and is not part of the wire format.
    pub fn set_field_enabled(
        &mut self,
        io: &mut SessionIo<'_>,
        id: FieldId,
        enabled: bool,
    ) -> Result<(), ValidationError> {
        let field = self
            .registry
            .get_mut(id)
            .ok_or(ValidationError::UnknownField { id })?;
        field.set_enabled(enabled);
        io.world.update_anchor(id, &field.params(), enabled);
        info!(field_id = %id, enabled, "Gravity field toggled");
        Ok(())
    }

    /// Change one global setting and share the new settings.
    pub fn set_setting(
        &mut self,
        io: &mut SessionIo<'_>,
        name: &str,
        raw: &str,
    ) -> Result<(SettingKey, String), ValidationError> {
        let changed = self.store.set(name, raw)?;
        self.role
            .publish_settings(io.transport, &self.store.wire_text());
        Ok(changed)
    }

    /// Run a config verb here, or forward it to the host.
    pub fn config_action(
        &mut self,
        io: &mut SessionIo<'_>,
        action: ConfigAction,
    ) -> Result<ConfigRoute, CollaboratorFailure> {
        let route = self.role.route_config_action(io.transport, action);
        if route == ConfigRoute::Local {
            self.run_config_action(io, action)?;
        }
        Ok(route)
    }

    /// A body appeared in the world between refreshes.
    pub fn on_body_added(&mut self, body: &BodySnapshot) -> usize {
        track_body(&mut self.registry, body)
    }

    /// A body was closed.
    pub fn on_body_removed(&mut self, body: BodyId) -> usize {
        untrack_body(&mut self.registry, body)
    }

    /// Whether `anchor` backs a registered field, so the world should
    /// ignore damage to it.
    pub fn protects(&self, anchor: FieldId) -> bool {
        self.registry.contains(anchor)
    }

    /// The field whose center lies inside an asteroid's bounds.
    pub fn field_for_asteroid(&self, asteroid: &AsteroidSnapshot) -> Option<&GravityField> {
        self.registry.find_by_point_in_box(&asteroid.bounds())
    }

    /// Session end. Drops every field and queued scan. Anchors stay in the
    /// world. Returns the number of fields dropped.
    pub fn teardown(&mut self) -> usize {
        let count = self.registry.len();
        self.registry.clear();
        self.scan_queue.clear();
        info!(fields = count, "Natural gravity session torn down");
        count
    }

    fn announce_edit(
        &self,
        io: &mut SessionIo<'_>,
        id: FieldId,
        params: &FieldParams,
        enabled: bool,
    ) {
        io.world.update_anchor(id, params, enabled);
        info!(
            field_id = %id,
            radius = params.radius,
            strength = params.strength,
            "Gravity field updated"
        );
        self.role.publish_sync(
            io.transport,
            &SyncMessage::Create(CreateField {
                id,
                params: *params,
            }),
        );
    }

    fn drop_lost_anchors(&mut self, world: &dyn World) -> Vec<Anomaly> {
        self.registry
            .retain(|field| world.anchor_exists(field.id()))
            .into_iter()
            .map(|id| {
                warn!(field_id = %id, "Field anchor was destroyed, dropping field");
                Anomaly::AnchorLost { id }
            })
            .collect()
    }

    fn rebuild_scan_queue(&mut self, world: &dyn World) {
        self.scan_queue.clear();
        if self.store.settings().asteroid_prefix.is_none() {
            return;
        }
        self.scan_queue.extend(scan_candidates(
            &world.asteroids(),
            self.store.settings(),
            &self.registry,
        ));
        debug!(queued = self.scan_queue.len(), "Asteroid scan queue rebuilt");
    }

    fn run_scan_batch(&mut self, io: &mut SessionIo<'_>, report: &mut StepReport) {
        for _ in 0..self.config.scan_budget {
            let Some(asteroid_id) = self.scan_queue.pop_front() else {
                break;
            };
            report.scanned = report.scanned.saturating_add(1);

            let Some(asteroid) = io.world.asteroid(asteroid_id) else {
                debug!(asteroid = %asteroid_id, "Queued asteroid no longer exists");
                continue;
            };
            if !is_scan_candidate(&asteroid, self.store.settings(), &self.registry) {
                debug!(asteroid = %asteroid_id, "Queued asteroid no longer qualifies");
                continue;
            }

            match self.create_from_asteroid(io, &asteroid) {
                Ok(id) => report.created.push(id),
                Err(e) => {
                    error!(asteroid = %asteroid_id, error = %e, "Failed to add natural gravity");
                    report.failures = report.failures.saturating_add(1);
                }
            }
        }

        if report.scanned > 0 {
            report.anomalies.extend(self.dedup(io));
        }
    }

    fn create_from_asteroid(
        &mut self,
        io: &mut SessionIo<'_>,
        asteroid: &AsteroidSnapshot,
    ) -> Result<FieldId, CollaboratorFailure> {
        let params = derive_field_params(io.world, asteroid, self.store.settings())?;
        let id = self.create_field(io, params)?;
        info!(field_id = %id, asteroid = %asteroid.storage_name, "Added natural gravity to asteroid");
        Ok(id)
    }

    /// Keep the lowest id per exact center, despawning the rest.
    fn dedup(&mut self, io: &mut SessionIo<'_>) -> Vec<Anomaly> {
        let anomalies = self.registry.dedup_sweep();
        for anomaly in &anomalies {
            if let Anomaly::DuplicateCenterRemoved { removed, .. } = *anomaly {
                io.world.despawn_anchor(removed);
                self.role.publish_correction(
                    io.transport,
                    &SyncMessage::Remove(RemoveField { id: removed }),
                );
            }
        }
        anomalies
    }

    fn apply_create(
        &mut self,
        io: &mut SessionIo<'_>,
        create: CreateField,
    ) -> Result<MessageOutcome, MessageError> {
        let CreateField { id, params } = create;
        let previous_enabled = self.registry.get(id).map(GravityField::is_enabled);
        if previous_enabled.is_some() {
            io.world.despawn_anchor(id);
        }

        let anchor = match io.world.spawn_anchor(id, &params) {
            Ok(anchor) => anchor,
            Err(failure) => {
                self.drop_stale(id);
                return Err(failure.into());
            }
        };
        if anchor != id {
            io.world.despawn_anchor(anchor);
            self.drop_stale(id);
            return Err(CollaboratorFailure::AnchorSpawnFailed { id }.into());
        }

        let outcome = self.registry.create(Some(id), params);
        let mut stored = params;
        if let Some(field) = self.registry.get_mut(id) {
            // The enabled flag is anchor state and survives a replace.
            if previous_enabled == Some(false) {
                field.set_enabled(false);
                io.world.update_anchor(id, &field.params(), false);
            }
            stored = field.params();
        }
        info!(
            field_id = %id,
            radius = stored.radius,
            strength = stored.strength,
            "Gravity field received"
        );

        self.role.relay_sync(
            io.transport,
            &SyncMessage::Create(CreateField { id, params: stored }),
        );

        let mut anomalies: Vec<Anomaly> = outcome.anomaly.into_iter().collect();
        anomalies.extend(self.dedup(io));
        Ok(MessageOutcome::Applied { anomalies })
    }

    fn drop_stale(&mut self, id: FieldId) {
        if self.registry.remove(id).is_ok() {
            warn!(field_id = %id, "Dropped field whose anchor could not be respawned");
        }
    }

    fn apply_remove(&mut self, io: &mut SessionIo<'_>, remove: RemoveField) -> MessageOutcome {
        let RemoveField { id } = remove;
        io.world.despawn_anchor(id);
        let anomalies = match self.registry.remove(id) {
            Ok(_field) => {
                info!(field_id = %id, "Gravity field removed by peer");
                Vec::new()
            }
            Err(anomaly) => vec![anomaly],
        };
        self.role
            .relay_sync(io.transport, &SyncMessage::Remove(remove));
        MessageOutcome::Applied { anomalies }
    }

    fn apply_settings_blob(&mut self, io: &mut SessionIo<'_>, text: &str) -> MessageOutcome {
        let rejected = self.store.replace_from_blob(text);
        info!(rejected = rejected.len(), "Settings received");
        self.role
            .relay_settings(io.transport, &self.store.wire_text());
        MessageOutcome::applied()
    }

    fn answer_settings_request(
        &self,
        io: &mut SessionIo<'_>,
        requester: ParticipantId,
    ) -> MessageOutcome {
        let text = self.store.wire_text();
        if self
            .role
            .answer_settings_request(io.transport, requester, &text)
        {
            MessageOutcome::applied()
        } else {
            debug!(%requester, "Ignoring settings request");
            MessageOutcome::Ignored
        }
    }

    fn apply_remote_config(
        &mut self,
        io: &mut SessionIo<'_>,
        action: ConfigAction,
    ) -> Result<MessageOutcome, MessageError> {
        if !self.role.is_authoritative() {
            debug!(%action, "Ignoring config request");
            return Ok(MessageOutcome::Ignored);
        }
        info!(%action, "Config request received");
        self.run_config_action(io, action)?;
        Ok(MessageOutcome::applied())
    }

    fn run_config_action(
        &mut self,
        io: &mut SessionIo<'_>,
        action: ConfigAction,
    ) -> Result<(), CollaboratorFailure> {
        match action {
            ConfigAction::Save => self.store.save(io.persistence)?,
            ConfigAction::Load => {
                if let LoadOutcome::Loaded { .. } = self.store.load(io.persistence)? {
                    self.role
                        .publish_settings(io.transport, &self.store.wire_text());
                }
            }
            ConfigAction::Reset => {
                self.store.reset();
                self.role
                    .publish_settings(io.transport, &self.store.wire_text());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use natgrav_protocol::{Channel, encode};
    use natgrav_types::{DVec3, IVec3};

    use super::*;
    use crate::sandbox::{RecordingPresenter, SandboxWorld, VoxelShape};
    use crate::store::MemoryConfigPersistence;

    #[derive(Debug, Default)]
    struct NullTransport {
        sent: usize,
    }

    impl Transport for NullTransport {
        fn local_id(&self) -> ParticipantId {
            ParticipantId::new(1)
        }

        fn send_to_others(&mut self, _channel: Channel, _payload: &[u8]) {
            self.sent = self.sent.saturating_add(1);
        }

        fn send_to_host(&mut self, _channel: Channel, _payload: &[u8]) {
            self.sent = self.sent.saturating_add(1);
        }

        fn send_to(&mut self, _recipient: ParticipantId, _channel: Channel, _payload: &[u8]) {
            self.sent = self.sent.saturating_add(1);
        }
    }

    struct Rig {
        world: SandboxWorld,
        transport: NullTransport,
        presenter: RecordingPresenter,
        persistence: MemoryConfigPersistence,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                world: SandboxWorld::new(),
                transport: NullTransport::default(),
                presenter: RecordingPresenter::default(),
                persistence: MemoryConfigPersistence::new(),
            }
        }

        fn io(&mut self) -> SessionIo<'_> {
            SessionIo {
                world: &mut self.world,
                transport: &mut self.transport,
                presenter: &mut self.presenter,
                persistence: &mut self.persistence,
            }
        }
    }

    fn quick_config() -> SessionConfig {
        SessionConfig {
            warmup_ticks: 0,
            skip_ticks: 1,
            skip_extra_ticks: 1,
            ..SessionConfig::default()
        }
    }

    fn params(center: DVec3) -> FieldParams {
        FieldParams {
            center,
            radius: 1000,
            strength: 0.5,
        }
    }

    #[test]
    fn warmup_steps_touch_nothing() {
        let mut rig = Rig::new();
        rig.world
            .add_asteroid("gravity_rock", DVec3::ZERO, IVec3::splat(64), VoxelShape::Solid);
        let mut session = GravitySession::with_seed(
            RoleKind::Host,
            SessionConfig {
                warmup_ticks: 3,
                ..quick_config()
            },
            1,
        );
        for _ in 0..3 {
            let report = session.step(&mut rig.io());
            assert!(report.plan.warming_up);
        }
        assert!(session.registry().is_empty());
        session.step(&mut rig.io());
        assert_eq!(session.registry().len(), 1);
    }

    #[test]
    fn scan_batches_respect_the_budget_and_drain_the_queue() {
        let mut rig = Rig::new();
        for i in 0..5_i32 {
            rig.world.add_asteroid(
                &format!("gravity_rock_{i}"),
                DVec3::new(f64::from(i) * 10_000.0, 0.0, 0.0),
                IVec3::splat(64),
                VoxelShape::Solid,
            );
        }
        let mut session = GravitySession::with_seed(
            RoleKind::Host,
            SessionConfig {
                scan_budget: 2,
                skip_extra_ticks: 10,
                ..quick_config()
            },
            1,
        );

        let scanned: Vec<usize> = (0..3)
            .map(|_| {
                let report = session.step(&mut rig.io());
                assert!(report.scanned <= 2);
                assert_eq!(report.created.len(), report.scanned);
                report.scanned
            })
            .collect();
        assert_eq!(scanned, vec![2, 2, 1]);
        assert_eq!(session.scan_queue_len(), 0);
        assert_eq!(session.registry().len(), 5);

        // The next rebuild finds every asteroid already covered.
        for _ in 0..12 {
            let report = session.step(&mut rig.io());
            assert!(report.created.is_empty());
        }
        assert_eq!(session.registry().len(), 5);
    }

    #[test]
    fn destroyed_anchor_drops_field_without_traffic() {
        let mut rig = Rig::new();
        let mut session = GravitySession::with_seed(RoleKind::Host, quick_config(), 1);
        let id = session.create_field(&mut rig.io(), params(DVec3::ZERO)).unwrap();
        let sent_before = rig.transport.sent;

        rig.world.destroy_anchor(id);
        let report = session.step(&mut rig.io());

        assert_eq!(report.anomalies, vec![Anomaly::AnchorLost { id }]);
        assert!(!session.protects(id));
        assert_eq!(rig.transport.sent, sent_before);
    }

    #[test]
    fn missing_template_registers_nothing() {
        let mut rig = Rig::new();
        rig.world.set_template_available(false);
        let mut session = GravitySession::with_seed(RoleKind::Host, quick_config(), 1);
        let err = session
            .create_field(&mut rig.io(), params(DVec3::ZERO))
            .unwrap_err();
        assert!(matches!(err, CollaboratorFailure::AnchorTemplateMissing { .. }));
        assert!(session.registry().is_empty());
        assert_eq!(rig.transport.sent, 0);
    }

    #[test]
    fn failed_respawn_of_replicated_create_removes_stale_field() {
        let mut rig = Rig::new();
        let mut session = GravitySession::with_seed(RoleKind::Follower, quick_config(), 1);
        let create = |x: f64| {
            encode(&WireMessage::Sync(SyncMessage::Create(CreateField {
                id: FieldId::new(8),
                params: params(DVec3::new(x, 0.0, 0.0)),
            })))
        };

        let first = session.handle_message(&mut rig.io(), Channel::Sync.id(), &create(1.0));
        assert!(first.is_applied());

        rig.world.fail_next_spawn();
        let second = session.handle_message(&mut rig.io(), Channel::Sync.id(), &create(2.0));
        assert!(matches!(second, MessageOutcome::Dropped { .. }));
        assert!(session.registry().is_empty());
    }

    #[test]
    fn replace_keeps_the_local_enabled_flag() {
        let mut rig = Rig::new();
        let mut session = GravitySession::with_seed(RoleKind::Follower, quick_config(), 1);
        let id = FieldId::new(5);
        let create = |radius: i32| {
            encode(&WireMessage::Sync(SyncMessage::Create(CreateField {
                id,
                params: FieldParams {
                    radius,
                    ..params(DVec3::ZERO)
                },
            })))
        };

        session.handle_message(&mut rig.io(), Channel::Sync.id(), &create(100));
        session.set_field_enabled(&mut rig.io(), id, false).unwrap();
        let outcome = session.handle_message(&mut rig.io(), Channel::Sync.id(), &create(200));

        assert!(matches!(
            outcome,
            MessageOutcome::Applied { ref anomalies }
                if anomalies.as_slice() == [Anomaly::DuplicateCreateReplaced { id }]
        ));
        let field = session.registry().get(id).unwrap();
        assert_eq!(field.radius(), 200);
        assert!(!field.is_enabled());
    }

    #[test]
    fn teardown_clears_fields_but_leaves_anchors() {
        let mut rig = Rig::new();
        let mut session = GravitySession::with_seed(RoleKind::Host, quick_config(), 1);
        let id = session.create_field(&mut rig.io(), params(DVec3::ZERO)).unwrap();
        assert_eq!(session.teardown(), 1);
        assert!(session.registry().is_empty());
        assert!(rig.world.anchor_exists(id));
    }
}
