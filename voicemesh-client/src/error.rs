use thiserror::Error;

/// Failure acquiring the local capture device. Fatal for a join attempt;
/// nothing is written to the roster when acquisition fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("microphone permission denied")]
    PermissionDenied,
    #[error("no capture device found")]
    NotFound,
    #[error("capture device is busy")]
    Busy,
}

/// Roster or mailbox backend failure. Fatal for join/leave, swallowed for
/// best-effort writes (candidate relay, mute-state broadcast).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("store subscription closed")]
    SubscriptionClosed,
    #[error("malformed document: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Underlying connection failure; terminal for the affected peer session.
#[derive(Debug, Error)]
#[error("transport error: {0}")]
pub struct TransportError(#[from] pub webrtc::Error);

/// Malformed or inapplicable signaling. Scoped to one peer session, which
/// closes; the rest of the room is unaffected.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("malformed signaling payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors that abort a join attempt before the session loop starts.
#[derive(Debug, Error)]
pub enum JoinError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
