use serde::{Deserialize, Serialize};
use std::fmt;

/// A voice room is addressed by its server and channel. Rooms have no
/// lifecycle of their own: the first joiner brings one into existence, the
/// last leaver leaves no trace.
#[derive(Debug, Clone, Serialize, Deserialize, Hash, Eq, PartialEq)]
pub struct RoomId {
    pub server: String,
    pub channel: String,
}

impl RoomId {
    pub fn new(server: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            channel: channel.into(),
        }
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.server, self.channel)
    }
}
