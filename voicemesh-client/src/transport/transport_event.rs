use std::sync::Arc;
use voicemesh_core::ParticipantId;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::track::track_remote::TrackRemote;

/// Notifications a peer transport feeds into the session event loop.
pub enum TransportEvent {
    /// Local ICE candidate discovered; relay it through the mailbox.
    CandidateGenerated(ParticipantId, RTCIceCandidateInit),
    /// Remote audio arrived for this peer.
    TrackReady(ParticipantId, Arc<TrackRemote>),
    /// The connection reached its connected state.
    Connected(ParticipantId),
    /// Failure or disconnection; terminal for this peer session.
    Disconnected(ParticipantId),
}
