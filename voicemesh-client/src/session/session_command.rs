use tokio::sync::oneshot;

/// Commands from the owning handle into the session event loop.
#[derive(Debug)]
pub enum SessionCommand {
    SetMicEnabled {
        enabled: bool,
        reply: oneshot::Sender<bool>,
    },
    SetSpeakerEnabled {
        enabled: bool,
        reply: oneshot::Sender<bool>,
    },
    Leave {
        reply: oneshot::Sender<()>,
    },
}
