//! Persistence for strata aggregates.
//!
//! [`EventStore`] maps aggregates onto streams of an
//! [`AppendOnlyStore`](strata_message_store::AppendOnlyStore) and
//! notifies subscribers of every saved event. [`Repository`] loads aggregates
//! from their history and saves new events, resolving version conflicts
//! through the aggregate's concurrency resolver.

pub mod config;
mod error;
mod event_store;
mod factory;
mod repository;

pub use config::{ConfiguredStore, RuntimeConfig, StoreConfig};
pub use error::{Error, Result};
pub use event_store::EventStore;
pub use factory::RepositoryFactory;
pub use repository::Repository;
