mod participant;
mod record;
mod room;
mod signaling;

pub use participant::ParticipantId;
pub use record::{ParticipantRecord, unix_millis};
pub use room::RoomId;
pub use signaling::{IceServerConfig, SignalEnvelope, SignalPayload};
