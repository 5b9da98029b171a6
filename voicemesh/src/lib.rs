pub use voicemesh_core::model::ParticipantId;

pub mod model {
    pub use voicemesh_core::model::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use voicemesh_client::*;
}
