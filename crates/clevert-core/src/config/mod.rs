//! Host configuration
//!
//! - `types`: the `HostConfig` structure and its defaults
//! - `hierarchical_loader`: defaults, `config.yaml` and `CLEVERT_*` overrides
//! - `store`: shared, mutable configuration with coalesced persistence

mod hierarchical_loader;
mod store;
mod types;

pub use hierarchical_loader::{HierarchicalConfigLoader, CONFIG_FILE};
pub use store::ConfigStore;
pub use types::*;
