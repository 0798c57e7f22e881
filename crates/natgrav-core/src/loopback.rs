//! In-process session network for tests and the demo engine.
//!
//! Every participant gets an inbox. Sending pushes an [`Envelope`] into the
//! recipients' inboxes and nothing is delivered until the owner drains its
//! inbox and hands each envelope to its session.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use natgrav_protocol::Channel;
use natgrav_types::ParticipantId;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::replication::Transport;

/// A queued payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Who sent it.
    pub from: ParticipantId,
    /// Numeric channel id.
    pub channel_id: u16,
    /// Raw bytes.
    pub payload: Vec<u8>,
}

#[derive(Debug)]
struct NetworkState {
    host: ParticipantId,
    inboxes: BTreeMap<ParticipantId, VecDeque<Envelope>>,
}

impl NetworkState {
    fn push(&mut self, to: ParticipantId, envelope: Envelope) {
        match self.inboxes.get_mut(&to) {
            Some(inbox) => inbox.push_back(envelope),
            None => debug!(recipient = %to, "Dropping message for unknown participant"),
        }
    }
}

/// The shared network. Cloning yields another handle to the same network.
#[derive(Debug, Clone)]
pub struct LoopbackNetwork {
    state: Rc<RefCell<NetworkState>>,
}

impl LoopbackNetwork {
    /// A network whose host is `host`. The host still has to [`join`].
    ///
    /// [`join`]: LoopbackNetwork::join
    pub fn new(host: ParticipantId) -> Self {
        Self {
            state: Rc::new(RefCell::new(NetworkState {
                host,
                inboxes: BTreeMap::new(),
            })),
        }
    }

    /// The host's id.
    pub fn host(&self) -> ParticipantId {
        self.state.borrow().host
    }

    /// Register a participant and return its transport.
    pub fn join(&self, id: ParticipantId) -> LoopbackTransport {
        self.state.borrow_mut().inboxes.entry(id).or_default();
        LoopbackTransport {
            id,
            network: self.clone(),
        }
    }

    /// Messages waiting in every inbox.
    pub fn pending(&self) -> usize {
        self.state.borrow().inboxes.values().map(VecDeque::len).sum()
    }

    /// Make delivery adversarial: interleave senders randomly and duplicate
    /// some messages. Each sender's own order is kept.
    pub fn scramble<R: Rng>(&self, rng: &mut R, duplicate_probability: f64) {
        let mut state = self.state.borrow_mut();
        for inbox in state.inboxes.values_mut() {
            let mut by_sender: BTreeMap<ParticipantId, VecDeque<Envelope>> = BTreeMap::new();
            for envelope in inbox.drain(..) {
                by_sender.entry(envelope.from).or_default().push_back(envelope);
            }

            let mut order: Vec<ParticipantId> = by_sender
                .iter()
                .flat_map(|(sender, queue)| std::iter::repeat_n(*sender, queue.len()))
                .collect();
            order.shuffle(rng);

            for sender in order {
                let Some(envelope) = by_sender.get_mut(&sender).and_then(VecDeque::pop_front)
                else {
                    continue;
                };
                if rng.random_bool(duplicate_probability.clamp(0.0, 1.0)) {
                    inbox.push_back(envelope.clone());
                }
                inbox.push_back(envelope);
            }
        }
    }

    fn drain(&self, id: ParticipantId) -> Vec<Envelope> {
        self.state
            .borrow_mut()
            .inboxes
            .get_mut(&id)
            .map(|inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }
}

/// One participant's end of a [`LoopbackNetwork`].
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    id: ParticipantId,
    network: LoopbackNetwork,
}

impl LoopbackTransport {
    /// Take everything queued for this participant, oldest first.
    pub fn drain(&self) -> Vec<Envelope> {
        self.network.drain(self.id)
    }

    fn envelope(&self, channel: Channel, payload: &[u8]) -> Envelope {
        Envelope {
            from: self.id,
            channel_id: channel.id(),
            payload: payload.to_vec(),
        }
    }
}

impl Transport for LoopbackTransport {
    fn local_id(&self) -> ParticipantId {
        self.id
    }

    fn send_to_others(&mut self, channel: Channel, payload: &[u8]) {
        let envelope = self.envelope(channel, payload);
        let mut state = self.network.state.borrow_mut();
        for (participant, inbox) in &mut state.inboxes {
            if *participant != self.id {
                inbox.push_back(envelope.clone());
            }
        }
    }

    fn send_to_host(&mut self, channel: Channel, payload: &[u8]) {
        let envelope = self.envelope(channel, payload);
        let mut state = self.network.state.borrow_mut();
        let host = state.host;
        state.push(host, envelope);
    }

    fn send_to(&mut self, recipient: ParticipantId, channel: Channel, payload: &[u8]) {
        let envelope = self.envelope(channel, payload);
        self.network.state.borrow_mut().push(recipient, envelope);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn ids() -> (ParticipantId, ParticipantId, ParticipantId) {
        (ParticipantId::new(1), ParticipantId::new(2), ParticipantId::new(3))
    }

    #[test]
    fn broadcast_skips_the_sender() {
        let (h, a, b) = ids();
        let net = LoopbackNetwork::new(h);
        let mut host = net.join(h);
        let fa = net.join(a);
        let fb = net.join(b);

        host.send_to_others(Channel::Sync, b"1;5");
        assert!(host.drain().is_empty());
        assert_eq!(fa.drain().len(), 1);
        assert_eq!(fb.drain().first().unwrap().from, h);
    }

    #[test]
    fn host_and_direct_sends_reach_one_inbox() {
        let (h, a, b) = ids();
        let net = LoopbackNetwork::new(h);
        let host = net.join(h);
        let mut fa = net.join(a);
        let fb = net.join(b);

        fa.send_to_host(Channel::AskSettings, b"2");
        fa.send_to(b, Channel::Settings, b"x=1");
        fa.send_to(ParticipantId::new(99), Channel::Settings, b"x=1");

        assert_eq!(host.drain().first().unwrap().channel_id, Channel::AskSettings.id());
        assert_eq!(fb.drain().len(), 1);
        assert_eq!(net.pending(), 0);
    }

    #[test]
    fn scramble_keeps_each_senders_order() {
        let (h, a, b) = ids();
        let net = LoopbackNetwork::new(h);
        let host = net.join(h);
        let mut fa = net.join(a);
        let mut fb = net.join(b);
        for i in 0..20_u8 {
            fa.send_to_host(Channel::Sync, &[i]);
            fb.send_to_host(Channel::Sync, &[i]);
        }

        let mut rng = SmallRng::seed_from_u64(3);
        net.scramble(&mut rng, 0.25);
        let delivered = host.drain();
        assert!(delivered.len() >= 40);

        for sender in [a, b] {
            let seq: Vec<u8> = delivered
                .iter()
                .filter(|e| e.from == sender)
                .map(|e| *e.payload.first().unwrap())
                .collect();
            assert!(seq.windows(2).all(|w| w.first() <= w.last()));
            assert_eq!(seq.last(), Some(&19));
        }
    }
}
