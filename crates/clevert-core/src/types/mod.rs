//! Type definitions shared across Clevert crates

mod entry;
mod manifest;
mod platform;

pub use entry::*;
pub use manifest::*;
pub use platform::*;
