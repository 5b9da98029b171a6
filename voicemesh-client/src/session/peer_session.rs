use crate::transport::ConnectionWrapper;
use voicemesh_core::ParticipantId;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;

/// Which side of a pair produces the offer. Decided once per pair by uid
/// order, so exactly one side ever offers and glare cannot occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationRole {
    Offering,
    Answering,
}

impl NegotiationRole {
    /// The lexicographically smaller uid initiates.
    pub fn between(local: &ParticipantId, remote: &ParticipantId) -> Self {
        if local < remote {
            NegotiationRole::Offering
        } else {
            NegotiationRole::Answering
        }
    }
}

/// Lifecycle of one remote peer's connection. `Closed` is terminal: no
/// further signals or transport events are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Idle,
    Negotiating,
    Connected,
    Closed,
}

/// Per-remote-participant connection state. Owned exclusively by the
/// session event loop, so none of this needs a lock.
pub struct PeerSession {
    pub remote_uid: ParticipantId,
    pub role: NegotiationRole,
    pub state: PeerState,
    pub transport: ConnectionWrapper,
    pub remote_description_set: bool,
    pending_candidates: Vec<RTCIceCandidateInit>,
}

impl PeerSession {
    pub fn new(
        remote_uid: ParticipantId,
        role: NegotiationRole,
        transport: ConnectionWrapper,
    ) -> Self {
        Self {
            remote_uid,
            role,
            state: PeerState::Idle,
            transport,
            remote_description_set: false,
            pending_candidates: Vec::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == PeerState::Closed
    }

    /// Buffer a candidate that arrived before the remote description.
    pub fn queue_candidate(&mut self, candidate: RTCIceCandidateInit) {
        self.pending_candidates.push(candidate);
    }

    /// Hand back buffered candidates in receipt order. Called once the
    /// remote description is set, and on close to drop them.
    pub fn take_pending_candidates(&mut self) -> Vec<RTCIceCandidateInit> {
        std::mem::take(&mut self.pending_candidates)
    }
}
