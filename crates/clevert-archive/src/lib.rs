//! # clevert-archive
//!
//! ZIP reader used by the extension installer:
//! - Tail-anchored end-of-central-directory scan (tolerates trailing comments)
//! - Zip64 fallback for archives beyond 32-bit limits
//! - Entry name validation against path traversal
//! - Streaming extraction of stored/deflated entries with CRC-32 and size verification
//!
//! # Example
//!
//! ```no_run
//! use clevert_archive::ZipArchive;
//!
//! fn main() -> clevert_archive::Result<()> {
//!     let archive = ZipArchive::open("assets.zip")?;
//!     println!("{} entries", archive.len());
//!     archive.extract(None, "out/")?;
//!     Ok(())
//! }
//! ```

pub mod entry;
pub mod error;
pub mod reader;
mod verify;

pub use entry::ZipEntry;
pub use error::{ArchiveError, Result};
pub use reader::ZipArchive;
