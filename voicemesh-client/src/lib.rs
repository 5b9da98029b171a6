pub mod error;
pub mod mailbox;
pub mod media;
pub mod roster;
pub mod session;
pub mod sink;
pub mod store;
pub mod transport;

pub use error::{DeviceError, JoinError, NegotiationError, StoreError, TransportError};
pub use media::{CaptureConfig, CaptureSource, CaptureStream, CpalSource, SilenceSource};
pub use session::{SessionEvent, VoiceClient, VoiceHandle};
pub use sink::{CpalPlayback, NullPlayback, PlaybackBackend};
pub use store::{DocChange, DocChangeKind, DocumentStore, MemoryStore};
pub use transport::TransportConfig;
