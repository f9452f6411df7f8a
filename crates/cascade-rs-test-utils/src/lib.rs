//! Test helpers shared across cascade-rs crates.

pub mod files;
pub mod wait;

pub use files::{TempSourceDir, temp_file_of};
pub use wait::wait_until;
