//! Session roles and the transport they send through.
//!
//! A session is either the single authoritative host or one of many
//! followers. The role is picked once at session start. Everything that
//! differs between the two lives behind [`ReplicationRole`], so the session
//! itself never branches on "am I the host".
//!
//! | Event | Host | Follower |
//! |-------|------|----------|
//! | session start | load + save the settings file | ask the host for settings |
//! | local create/remove | broadcast to others | send to the host |
//! | create/remove from a peer | apply, echo to others | apply |
//! | local settings edit | broadcast blob | send blob to the host |
//! | settings blob from a peer | apply, re-broadcast | apply |
//! | settings request | reply to the requester | ignore |
//! | config verb | run locally | send the action byte to the host |
//! | config verb from a peer | run it | ignore |
//! | dedup loser | broadcast its removal | drop locally only |

use natgrav_protocol::{Channel, ConfigAction, SyncMessage, WireMessage, encode};
use natgrav_types::ParticipantId;
use tracing::{debug, info};

/// Outbound side of the session network. Every send is reliable.
pub trait Transport {
    /// Id of this participant.
    fn local_id(&self) -> ParticipantId;

    /// Send to every participant except this one.
    fn send_to_others(&mut self, channel: Channel, payload: &[u8]);

    /// Send to the host.
    fn send_to_host(&mut self, channel: Channel, payload: &[u8]);

    /// Send to one participant.
    fn send_to(&mut self, recipient: ParticipantId, channel: Channel, payload: &[u8]);
}

/// Which side of the session this participant is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleKind {
    /// The authoritative participant.
    Host,
    /// Any other participant.
    Follower,
}

impl core::fmt::Display for RoleKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Follower => f.write_str("follower"),
        }
    }
}

/// Where a config verb ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigRoute {
    /// Run it on this participant.
    Local,
    /// Sent to the host, which runs it.
    Forwarded,
}

/// Role-specific replication behaviour.
pub trait ReplicationRole: core::fmt::Debug {
    /// Which role this is.
    fn kind(&self) -> RoleKind;

    /// Whether this participant owns the settings file and runs config
    /// verbs received from others.
    fn is_authoritative(&self) -> bool;

    /// Session start. Followers ask the host for the settings.
    fn on_start(&self, transport: &mut dyn Transport);

    /// A create or remove that originated on this participant.
    fn publish_sync(&self, transport: &mut dyn Transport, message: &SyncMessage);

    /// A create or remove received from a peer and already applied.
    fn relay_sync(&self, transport: &mut dyn Transport, message: &SyncMessage);

    /// A correction this participant made on its own, such as a dedup
    /// removal. Only the host tells the others.
    fn publish_correction(&self, transport: &mut dyn Transport, message: &SyncMessage);

    /// Settings changed locally.
    fn publish_settings(&self, transport: &mut dyn Transport, text: &str);

    /// Settings blob received from a peer and already applied.
    fn relay_settings(&self, transport: &mut dyn Transport, text: &str);

    /// Answer a settings request. Returns `false` when this role does not
    /// answer requests.
    fn answer_settings_request(
        &self,
        transport: &mut dyn Transport,
        requester: ParticipantId,
        text: &str,
    ) -> bool;

    /// Decide where a config verb runs, forwarding it if needed.
    fn route_config_action(&self, transport: &mut dyn Transport, action: ConfigAction)
    -> ConfigRoute;
}

/// Build the role for `kind`.
pub fn role_for(kind: RoleKind) -> Box<dyn ReplicationRole> {
    match kind {
        RoleKind::Host => Box::new(HostRole),
        RoleKind::Follower => Box::new(FollowerRole),
    }
}

fn broadcast(transport: &mut dyn Transport, message: &WireMessage) {
    let channel = message.channel();
    debug!(%channel, "Sending to all clients");
    transport.send_to_others(channel, &encode(message));
}

fn to_host(transport: &mut dyn Transport, message: &WireMessage) {
    let channel = message.channel();
    debug!(%channel, "Sending to host");
    transport.send_to_host(channel, &encode(message));
}

/// The authoritative participant.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostRole;

impl ReplicationRole for HostRole {
    fn kind(&self) -> RoleKind {
        RoleKind::Host
    }

    fn is_authoritative(&self) -> bool {
        true
    }

    fn on_start(&self, _transport: &mut dyn Transport) {}

    fn publish_sync(&self, transport: &mut dyn Transport, message: &SyncMessage) {
        broadcast(transport, &WireMessage::Sync(*message));
    }

    fn relay_sync(&self, transport: &mut dyn Transport, message: &SyncMessage) {
        broadcast(transport, &WireMessage::Sync(*message));
    }

    fn publish_correction(&self, transport: &mut dyn Transport, message: &SyncMessage) {
        broadcast(transport, &WireMessage::Sync(*message));
    }

    fn publish_settings(&self, transport: &mut dyn Transport, text: &str) {
        broadcast(transport, &WireMessage::Settings(text.to_owned()));
    }

    fn relay_settings(&self, transport: &mut dyn Transport, text: &str) {
        broadcast(transport, &WireMessage::Settings(text.to_owned()));
    }

    fn answer_settings_request(
        &self,
        transport: &mut dyn Transport,
        requester: ParticipantId,
        text: &str,
    ) -> bool {
        info!(%requester, "Sending settings to client");
        let message = WireMessage::Settings(text.to_owned());
        transport.send_to(requester, message.channel(), &encode(&message));
        true
    }

    fn route_config_action(
        &self,
        _transport: &mut dyn Transport,
        _action: ConfigAction,
    ) -> ConfigRoute {
        ConfigRoute::Local
    }
}

/// A non-authoritative participant.
#[derive(Debug, Clone, Copy, Default)]
pub struct FollowerRole;

impl ReplicationRole for FollowerRole {
    fn kind(&self) -> RoleKind {
        RoleKind::Follower
    }

    fn is_authoritative(&self) -> bool {
        false
    }

    fn on_start(&self, transport: &mut dyn Transport) {
        let local = transport.local_id();
        info!("Requesting settings from host");
        to_host(transport, &WireMessage::AskSettings(local));
    }

    fn publish_sync(&self, transport: &mut dyn Transport, message: &SyncMessage) {
        to_host(transport, &WireMessage::Sync(*message));
    }

    fn relay_sync(&self, _transport: &mut dyn Transport, _message: &SyncMessage) {}

    fn publish_correction(&self, _transport: &mut dyn Transport, _message: &SyncMessage) {}

    fn publish_settings(&self, transport: &mut dyn Transport, text: &str) {
        to_host(transport, &WireMessage::Settings(text.to_owned()));
    }

    fn relay_settings(&self, _transport: &mut dyn Transport, _text: &str) {}

    fn answer_settings_request(
        &self,
        _transport: &mut dyn Transport,
        _requester: ParticipantId,
        _text: &str,
    ) -> bool {
        false
    }

    fn route_config_action(
        &self,
        transport: &mut dyn Transport,
        action: ConfigAction,
    ) -> ConfigRoute {
        info!(%action, "Sending config request to host");
        to_host(transport, &WireMessage::ConfigAction(action));
        ConfigRoute::Forwarded
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use natgrav_protocol::{RemoveField, decode};
    use natgrav_types::FieldId;

    use super::*;

    #[derive(Debug, Default)]
    struct Outbox {
        sent: Vec<(&'static str, Channel, Vec<u8>)>,
    }

    impl Transport for Outbox {
        fn local_id(&self) -> ParticipantId {
            ParticipantId::new(77)
        }

        fn send_to_others(&mut self, channel: Channel, payload: &[u8]) {
            self.sent.push(("others", channel, payload.to_vec()));
        }

        fn send_to_host(&mut self, channel: Channel, payload: &[u8]) {
            self.sent.push(("host", channel, payload.to_vec()));
        }

        fn send_to(&mut self, _recipient: ParticipantId, channel: Channel, payload: &[u8]) {
            self.sent.push(("direct", channel, payload.to_vec()));
        }
    }

    fn remove(id: u64) -> SyncMessage {
        SyncMessage::Remove(RemoveField { id: FieldId::new(id) })
    }

    #[test]
    fn follower_asks_host_for_settings_on_start() {
        let mut out = Outbox::default();
        FollowerRole.on_start(&mut out);
        let (target, channel, payload) = out.sent.first().unwrap();
        assert_eq!(*target, "host");
        assert_eq!(
            decode(*channel, payload).unwrap(),
            WireMessage::AskSettings(ParticipantId::new(77))
        );

        let mut host_out = Outbox::default();
        HostRole.on_start(&mut host_out);
        assert!(host_out.sent.is_empty());
    }

    #[test]
    fn host_echoes_and_follower_does_not() {
        let mut out = Outbox::default();
        HostRole.relay_sync(&mut out, &remove(5));
        FollowerRole.relay_sync(&mut out, &remove(5));
        assert_eq!(out.sent.len(), 1);
        assert_eq!(out.sent.first().unwrap().0, "others");
    }

    #[test]
    fn local_sync_goes_to_host_from_follower() {
        let mut out = Outbox::default();
        FollowerRole.publish_sync(&mut out, &remove(5));
        assert_eq!(out.sent.first().unwrap().0, "host");
        assert_eq!(out.sent.first().unwrap().2, b"1;5");
    }

    #[test]
    fn config_verbs_are_forwarded_by_followers_only() {
        let mut out = Outbox::default();
        assert_eq!(
            HostRole.route_config_action(&mut out, ConfigAction::Save),
            ConfigRoute::Local
        );
        assert!(out.sent.is_empty());
        assert_eq!(
            FollowerRole.route_config_action(&mut out, ConfigAction::Reset),
            ConfigRoute::Forwarded
        );
        let (_, channel, payload) = out.sent.first().unwrap();
        assert_eq!(*channel, Channel::Config);
        assert_eq!(payload, &vec![2_u8]);
    }

    #[test]
    fn only_host_answers_settings_requests() {
        let mut out = Outbox::default();
        assert!(!FollowerRole.answer_settings_request(&mut out, ParticipantId::new(1), "x=1"));
        assert!(HostRole.answer_settings_request(&mut out, ParticipantId::new(1), "x=1"));
        assert_eq!(out.sent.len(), 1);
        assert_eq!(out.sent.first().unwrap().0, "direct");
    }

    #[test]
    fn corrections_stay_local_on_followers() {
        let mut out = Outbox::default();
        FollowerRole.publish_correction(&mut out, &remove(9));
        assert!(out.sent.is_empty());
        HostRole.publish_correction(&mut out, &remove(9));
        assert_eq!(out.sent.len(), 1);
    }
}
