pub mod model;

pub use model::{
    IceServerConfig, ParticipantId, ParticipantRecord, RoomId, SignalEnvelope, SignalPayload,
    unix_millis,
};
