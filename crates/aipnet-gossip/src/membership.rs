//! HyParView active/passive view membership (spec §4.8).

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use aipnet_frame::header::NodeId;
use aipnet_routing::{RouteEntry, Sad};

use crate::message::GossipMessage;

/// Default bound on the active view.
pub const DEFAULT_ACTIVE_SIZE: usize = 5;
/// Default bound on the passive view.
pub const DEFAULT_PASSIVE_SIZE: usize = 30;
/// Active Random Walk Length: hop budget for `ForwardJoin`.
pub const DEFAULT_ARWL: u8 = 6;
/// Passive Random Walk Length: hop at which a `ForwardJoin` also seeds the passive view.
pub const DEFAULT_PRWL: u8 = 3;
/// Number of entries exchanged per shuffle round.
pub const DEFAULT_SHUFFLE_LEN: usize = 6;

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub active_size: usize,
    pub passive_size: usize,
    pub arwl: u8,
    pub prwl: u8,
    pub shuffle_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            active_size: DEFAULT_ACTIVE_SIZE,
            passive_size: DEFAULT_PASSIVE_SIZE,
            arwl: DEFAULT_ARWL,
            prwl: DEFAULT_PRWL,
            shuffle_len: DEFAULT_SHUFFLE_LEN,
        }
    }
}

/// Outbound effects produced by processing one inbound message or tick.
#[derive(Debug, Default)]
pub struct Outcome {
    pub sends: Vec<(NodeId, GossipMessage)>,
    pub advertised: Vec<RouteEntry>,
}

impl Outcome {
    fn send(mut self, to: NodeId, msg: GossipMessage) -> Self {
        self.sends.push((to, msg));
        self
    }
}

/// One node's view of HyParView membership. Pure state machine: networking
/// is the caller's responsibility, driven by [`Membership::handle`] and
/// [`Membership::tick_shuffle`].
pub struct Membership {
    local_id: NodeId,
    active: Vec<NodeId>,
    passive: Vec<NodeId>,
    config: Config,
    rng: ChaCha20Rng,
}

impl Membership {
    pub fn new(local_id: NodeId, config: Config) -> Self {
        Self {
            local_id,
            active: Vec::new(),
            passive: Vec::new(),
            config,
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    pub fn active_view(&self) -> &[NodeId] {
        &self.active
    }

    pub fn passive_view(&self) -> &[NodeId] {
        &self.passive
    }

    fn add_active(&mut self, peer: NodeId) -> Option<(NodeId, GossipMessage)> {
        if peer == self.local_id || self.active.contains(&peer) {
            return None;
        }
        self.passive.retain(|p| *p != peer);

        let evicted = if self.active.len() >= self.config.active_size {
            let idx = self.rng.gen_range(0..self.active.len());
            Some(self.active.remove(idx))
        } else {
            None
        };

        self.active.push(peer);

        if let Some(evicted) = evicted {
            self.add_passive(evicted);
            Some((evicted, GossipMessage::Disconnect { sender: self.local_id.0 }))
        } else {
            None
        }
    }

    fn add_passive(&mut self, peer: NodeId) {
        if peer == self.local_id || self.active.contains(&peer) || self.passive.contains(&peer) {
            return;
        }
        if self.passive.len() >= self.config.passive_size {
            let idx = self.rng.gen_range(0..self.passive.len());
            self.passive[idx] = peer;
        } else {
            self.passive.push(peer);
        }
    }

    /// Initiate membership by joining through a known contact node.
    pub fn join(&mut self, contact: NodeId) -> Outcome {
        Outcome::default().send(
            contact,
            GossipMessage::Join { sender: self.local_id.0, origin: self.local_id.0 },
        )
    }

    /// Process one inbound message from `from`.
    pub fn handle(&mut self, from: NodeId, msg: GossipMessage) -> Outcome {
        match msg {
            GossipMessage::Join { origin, .. } => self.handle_join(NodeId(origin)),
            GossipMessage::ForwardJoin { sender, origin, ttl } => {
                self.handle_forward_join(from, NodeId(sender), NodeId(origin), ttl)
            }
            GossipMessage::Disconnect { .. } => self.handle_disconnect(from),
            GossipMessage::Shuffle { sender, entries, .. } => self.handle_shuffle(NodeId(sender), entries),
            GossipMessage::ShuffleReply { entries, .. } => self.handle_shuffle_reply(entries),
            GossipMessage::Advertise { sender, sad, latency_us, region } => {
                self.handle_advertise(NodeId(sender), &sad, latency_us, region)
            }
        }
    }

    fn handle_join(&mut self, joiner: NodeId) -> Outcome {
        let mut outcome = Outcome::default();
        if let Some((to, disconnect)) = self.add_active(joiner) {
            outcome = outcome.send(to, disconnect);
        }
        for &peer in self.active.clone().iter().filter(|p| **p != joiner) {
            outcome = outcome.send(
                peer,
                GossipMessage::ForwardJoin {
                    sender: self.local_id.0,
                    origin: joiner.0,
                    ttl: self.config.arwl,
                },
            );
        }
        outcome
    }

    fn active_is_nearly_empty(&self) -> bool {
        self.active.len() <= 1
    }

    fn handle_forward_join(&mut self, from: NodeId, sender: NodeId, origin: NodeId, ttl: u8) -> Outcome {
        let mut outcome = Outcome::default();

        if ttl == 0 || self.active_is_nearly_empty() {
            if let Some((to, disconnect)) = self.add_active(origin) {
                outcome = outcome.send(to, disconnect);
            }
            return outcome;
        }

        if ttl == self.config.prwl {
            self.add_passive(origin);
            return outcome;
        }

        let candidates: Vec<NodeId> = self
            .active
            .iter()
            .copied()
            .filter(|p| *p != from && *p != sender && *p != origin)
            .collect();
        if let Some(&next) = candidates.choose(&mut self.rng) {
            outcome = outcome.send(
                next,
                GossipMessage::ForwardJoin { sender: self.local_id.0, origin: origin.0, ttl: ttl - 1 },
            );
        }
        outcome
    }

    fn handle_disconnect(&mut self, from: NodeId) -> Outcome {
        self.active.retain(|p| *p != from);
        if let Some(idx) = (!self.passive.is_empty()).then(|| self.rng.gen_range(0..self.passive.len())) {
            let promoted = self.passive.remove(idx);
            self.add_active(promoted);
        }
        Outcome::default()
    }

    /// Periodically exchange a sample of the passive view with a random active peer.
    pub fn tick_shuffle(&mut self) -> Outcome {
        let Some(&target) = self.active.choose(&mut self.rng) else {
            return Outcome::default();
        };
        let sample = self.sample_passive();
        Outcome::default().send(
            target,
            GossipMessage::Shuffle { sender: self.local_id.0, origin: self.local_id.0, entries: sample },
        )
    }

    fn sample_passive(&mut self) -> Vec<[u8; 16]> {
        let mut pool: Vec<NodeId> = self.passive.clone();
        pool.shuffle(&mut self.rng);
        let mut entries: Vec<[u8; 16]> = pool.into_iter().take(self.config.shuffle_len).map(|n| n.0).collect();
        entries.push(self.local_id.0);
        entries
    }

    fn handle_shuffle(&mut self, sender: NodeId, entries: Vec<[u8; 16]>) -> Outcome {
        for raw in &entries {
            self.add_passive(NodeId(*raw));
        }
        let reply_entries = self.sample_passive();
        Outcome::default().send(sender, GossipMessage::ShuffleReply { sender: self.local_id.0, entries: reply_entries })
    }

    fn handle_shuffle_reply(&mut self, entries: Vec<[u8; 16]>) -> Outcome {
        for raw in &entries {
            self.add_passive(NodeId(*raw));
        }
        Outcome::default()
    }

    /// Build an outbound advertisement to broadcast across the active view.
    pub fn advertise(&self, sad: &Sad, latency_us: u32, region: u16) -> Vec<(NodeId, GossipMessage)> {
        let encoded = sad.encode().unwrap_or_default();
        self.active
            .iter()
            .map(|&peer| {
                (
                    peer,
                    GossipMessage::Advertise { sender: self.local_id.0, sad: encoded.clone(), latency_us, region },
                )
            })
            .collect()
    }

    fn handle_advertise(&mut self, sender: NodeId, sad_bytes: &[u8], latency_us: u32, region: u16) -> Outcome {
        let mut outcome = Outcome::default();
        if let Ok(sad) = Sad::decode(sad_bytes) {
            let mut entry = RouteEntry::new(sender, sad, region);
            entry.latency_us = latency_us;
            outcome.advertised.push(entry);
        }
        outcome
    }
}
