use crate::model::ParticipantId;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One presence entry in a room's roster. Field names follow the document
/// store layout; `uid` is the document id rather than a stored field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRecord {
    #[serde(skip)]
    pub uid: ParticipantId,
    pub display_name: String,
    pub avatar: Option<String>,
    pub joined_at: u64,
    pub muted: bool,
}

impl ParticipantRecord {
    pub fn new(uid: impl Into<ParticipantId>, display_name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: display_name.into(),
            avatar: None,
            joined_at: unix_millis(),
            muted: false,
        }
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
}

/// Client-stamped wall-clock milliseconds. Informational only; never
/// compared across participants.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
