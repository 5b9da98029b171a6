mod capture;
mod controller;

pub use capture::*;
pub use controller::*;
