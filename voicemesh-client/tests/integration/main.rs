mod utils;

mod mailbox_tests;
mod media_tests;
mod mesh_tests;
mod roster_tests;
