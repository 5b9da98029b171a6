use voicemesh_core::{ParticipantId, RoomId};

/// Collection of presence records for a room.
pub fn roster_path(room: &RoomId) -> String {
    format!("servers/{}/channels/{}/voiceUsers", room.server, room.channel)
}

/// Per-participant inbox of transient signaling documents.
pub fn mailbox_path(room: &RoomId, uid: &ParticipantId) -> String {
    format!(
        "servers/{}/channels/{}/voiceUsers/{}/mailbox",
        room.server, room.channel, uid
    )
}
