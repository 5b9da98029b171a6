mod document_store;
mod memory;
mod paths;

pub use document_store::*;
pub use memory::*;
pub use paths::*;
