use voicemesh_core::{ParticipantId, ParticipantRecord};

/// Observable room activity, broadcast to whoever holds the handle.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    ParticipantJoined(ParticipantRecord),
    ParticipantLeft(ParticipantId),
    ConnectionEstablished(ParticipantId),
    ConnectionLost(ParticipantId),
    MicToggled(bool),
    SpeakerToggled(bool),
}
