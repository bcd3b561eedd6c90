//! Connection state machine (spec §4.10): negotiation, idle/handshake
//! timeouts, and path migration without stream teardown.

use std::time::{Duration, Instant};

use aipnet_frame::header::NodeId;

pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_STREAMS: u32 = 1024;
pub const MAX_STREAMS_CAP: u32 = 65536;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Init,
    Established,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Negotiated connection parameters, exchanged during `CONN_INIT`/`CONN_ACCEPT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Params {
    pub protocol_version: u8,
    pub max_streams: u32,
    pub max_data: u64,
}

impl Default for Params {
    fn default() -> Self {
        Self { protocol_version: 1, max_streams: DEFAULT_MAX_STREAMS, max_data: u64::MAX }
    }
}

impl Params {
    pub fn clamped(self) -> Self {
        Self { max_streams: self.max_streams.min(MAX_STREAMS_CAP), ..self }
    }
}

/// Stream-control sub-messages carried inside `StreamControl` frames (spec §4.12).
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    ConnInit { node_id: NodeId, params: Params },
    ConnAccept { node_id: NodeId, params: Params },
    ConnClose { reason_code: u32, phrase: Option<String> },
    ConnCloseAck,
}

#[derive(Debug, Default)]
pub struct Outcome {
    pub sends: Vec<ControlMessage>,
    pub established: bool,
    pub closed: bool,
}

/// A dropped-in-unexpected-state frame (spec §4.10: "counted, not crashed").
#[derive(Debug, Default, Clone, Copy)]
pub struct UnexpectedFrameCounter(pub u64);

pub struct Connection {
    role: Role,
    state: ConnectionState,
    local_node_id: NodeId,
    peer_node_id: Option<NodeId>,
    local_params: Params,
    negotiated: Option<Params>,
    handshake_timeout: Duration,
    idle_timeout: Duration,
    handshake_started_at: Option<Instant>,
    last_activity: Instant,
    dropped_frames: UnexpectedFrameCounter,
}

impl Connection {
    pub fn new(local_node_id: NodeId, local_params: Params) -> Self {
        Self {
            role: Role::Client,
            state: ConnectionState::Closed,
            local_node_id,
            peer_node_id: None,
            local_params: local_params.clamped(),
            negotiated: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            handshake_started_at: None,
            last_activity: Instant::now(),
            dropped_frames: UnexpectedFrameCounter(0),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn peer_node_id(&self) -> Option<NodeId> {
        self.peer_node_id
    }

    pub fn negotiated_params(&self) -> Option<Params> {
        self.negotiated
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.0
    }

    /// Closed → Init, as the initiating client. Produces the `CONN_INIT` to send.
    pub fn connect(&mut self, now: Instant) -> Outcome {
        self.role = Role::Client;
        self.state = ConnectionState::Init;
        self.handshake_started_at = Some(now);
        self.last_activity = now;
        Outcome {
            sends: vec![ControlMessage::ConnInit { node_id: self.local_node_id, params: self.local_params }],
            ..Default::default()
        }
    }

    /// Closed → Init, as the accepting server, awaiting the peer's `CONN_INIT`.
    pub fn accept(&mut self, now: Instant) -> Outcome {
        self.role = Role::Server;
        self.state = ConnectionState::Init;
        self.handshake_started_at = Some(now);
        self.last_activity = now;
        Outcome::default()
    }

    /// Established → Closing, initiated locally. Produces `CONN_CLOSE` to send.
    pub fn close(&mut self, reason_code: u32, phrase: Option<String>) -> Outcome {
        if self.state != ConnectionState::Established {
            return Outcome::default();
        }
        self.state = ConnectionState::Closing;
        Outcome {
            sends: vec![ControlMessage::ConnClose { reason_code, phrase }],
            ..Default::default()
        }
    }

    pub fn on_idle_timeout(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_activity) >= self.idle_timeout {
            self.state = ConnectionState::Closed;
            return true;
        }
        false
    }

    pub fn on_handshake_timeout(&mut self, now: Instant) -> bool {
        if self.state != ConnectionState::Init {
            return false;
        }
        let Some(started) = self.handshake_started_at else { return false };
        if now.saturating_duration_since(started) >= self.handshake_timeout {
            self.state = ConnectionState::Closed;
            return true;
        }
        false
    }

    /// Dispatch a received control message. Frames arriving in a state that
    /// doesn't expect them are dropped and counted, never panicked on.
    pub fn on_control(&mut self, msg: ControlMessage, now: Instant) -> Outcome {
        self.last_activity = now;
        match (self.state, self.role, msg) {
            (ConnectionState::Init, Role::Client, ControlMessage::ConnAccept { node_id, params }) => {
                self.peer_node_id = Some(node_id);
                self.negotiated = Some(negotiate(self.local_params, params));
                self.state = ConnectionState::Established;
                Outcome { established: true, ..Default::default() }
            }
            (ConnectionState::Init, Role::Server, ControlMessage::ConnInit { node_id, params }) => {
                self.peer_node_id = Some(node_id);
                let negotiated = negotiate(self.local_params, params);
                self.negotiated = Some(negotiated);
                self.state = ConnectionState::Established;
                Outcome {
                    sends: vec![ControlMessage::ConnAccept { node_id: self.local_node_id, params: negotiated }],
                    established: true,
                    ..Default::default()
                }
            }
            (ConnectionState::Established, _, ControlMessage::ConnClose { .. }) => {
                self.state = ConnectionState::Closing;
                Outcome { sends: vec![ControlMessage::ConnCloseAck], ..Default::default() }
            }
            (ConnectionState::Closing, _, ControlMessage::ConnCloseAck) => {
                self.state = ConnectionState::Closed;
                Outcome { closed: true, ..Default::default() }
            }
            _ => {
                self.dropped_frames.0 += 1;
                Outcome::default()
            }
        }
    }

    /// Rebind to a new underlying path without tearing down streams, as long
    /// as the peer node id and negotiated parameters are unchanged.
    pub fn migrate(&mut self, observed_peer: NodeId) -> bool {
        self.peer_node_id == Some(observed_peer) && self.state == ConnectionState::Established
    }
}

fn negotiate(local: Params, remote: Params) -> Params {
    Params {
        protocol_version: local.protocol_version.min(remote.protocol_version),
        max_streams: local.max_streams.min(remote.max_streams).min(MAX_STREAMS_CAP),
        max_data: local.max_data.min(remote.max_data),
    }
}
