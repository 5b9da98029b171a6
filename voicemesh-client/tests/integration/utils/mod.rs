mod harness;
mod sources;

pub use harness::*;
pub use sources::*;
