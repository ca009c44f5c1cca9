//! # clevert-actions
//!
//! Running extension actions over batches of entries:
//! - Entry enumeration strategies (`entries`)
//! - The execute capability an action exposes (`execute`)
//! - Subprocess-backed actions declared in manifests (`command`)
//! - A bounded worker pool with aggregate progress (`scheduler`)

pub mod command;
pub mod entries;
pub mod execute;
pub mod scheduler;

pub use command::CommandAction;
pub use entries::{enumerate, EntriesSpec};
pub use execute::{Action, ExecuteController, ExecuteProbe};
pub use scheduler::{RunJob, RunProgress, RunTiming, Scheduler};
