//! # clevert-extensions
//!
//! Extension management for Clevert:
//! - Streaming downloads with progress and cancellation (`transfer`)
//! - Staged install pipeline with rollback (`installer`)
//! - Enumeration, lookup and removal of installed extensions (`store`)
//! - Serving an extension's browser UI module (`module`)

pub mod installer;
pub mod module;
pub mod store;
pub mod transfer;

pub use installer::{DownloadProgress, InstallJob, InstallProgress, Installer};
pub use module::{exclude_imports, strip_host_imports};
pub use store::{ExtensionStore, InstallClaim};
pub use transfer::{Transfer, TransferSummary, TransferUpdate};
