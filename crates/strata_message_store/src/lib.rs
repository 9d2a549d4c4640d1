//! Append-only record stores.
//!
//! Records are grouped into streams, each with a gap-free version starting at
//! 1, and every record also receives a global id that is strictly increasing
//! across all streams. Two backends are provided: [`InMemoryStore`] and
//! [`FileStore`], which persists records as newline-delimited JSON.

pub mod error;
mod file;
mod log;
mod memory;
mod record;
mod store;

pub use error::{Error, Result};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use record::{StreamRecord, TimeRange};
pub use store::AppendOnlyStore;
