mod client;
mod handle;
mod local_session;
mod peer_session;
mod session_command;
mod session_event;

pub use client::*;
pub use handle::*;
pub use local_session::*;
pub use peer_session::*;
pub use session_command::*;
pub use session_event::*;
