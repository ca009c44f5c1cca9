//! # clevert-core
//!
//! Core library for the Clevert automation host providing:
//! - Extension manifest, entry and summary types
//! - The shared error taxonomy
//! - Job id generation and completion signalling
//! - Host configuration (defaults, `config.yaml`, `CLEVERT_*` overrides)
//! - A latest-only coalescing runner used for config persistence

pub mod coalesce;
pub mod completion;
pub mod config;
pub mod error;
pub mod ids;
pub mod types;
pub mod utils;

pub use completion::{Completion, CompletionSender, Outcome};
pub use config::{ConfigStore, HierarchicalConfigLoader, HostConfig};
pub use error::{Error, Result};
pub use ids::IdGenerator;
pub use utils::get_home_dir;
