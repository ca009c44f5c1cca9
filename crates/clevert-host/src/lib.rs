//! # clevert-host
//!
//! The local HTTP host:
//! - Job registry for run and install jobs (`jobs`)
//! - Per-observer status stream with exactly-once terminal events (`status`)
//! - Request handlers (`api`) and router/listener setup (`server`)

pub mod api;
pub mod jobs;
pub mod server;
pub mod state;
pub mod status;

pub use api::ApiError;
pub use jobs::JobRegistry;
pub use server::{bind, router, serve};
pub use state::{ActionResolver, AppState, CommandResolver};
pub use status::{observe, StatusEvent};
