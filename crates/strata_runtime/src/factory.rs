use std::sync::Arc;

use strata::AggregateRoot;
use strata_message_store::AppendOnlyStore;

use crate::config::{ConfiguredStore, RuntimeConfig};
use crate::error::Result;
use crate::event_store::EventStore;
use crate::repository::Repository;

/// Creates repositories that share one event store and runtime configuration.
pub struct RepositoryFactory<S> {
    event_store: EventStore<S>,
    config: RuntimeConfig,
}

impl RepositoryFactory<ConfiguredStore> {
    /// Opens the configured backend and wraps it in an event store.
    pub fn open(config: RuntimeConfig) -> Result<Self> {
        let store = config.store.open()?;
        let event_store = EventStore::from_config(store, &config);
        Ok(RepositoryFactory {
            event_store,
            config,
        })
    }
}

impl<S> RepositoryFactory<S>
where
    S: AppendOnlyStore + 'static,
{
    pub fn new(event_store: EventStore<S>) -> Self {
        let config = RuntimeConfig {
            context: event_store.context().map(ToOwned::to_owned),
            ..RuntimeConfig::default()
        };
        RepositoryFactory {
            event_store,
            config,
        }
    }

    pub fn with_max_conflict_retries(mut self, max_conflict_retries: u8) -> Self {
        self.config.max_conflict_retries = max_conflict_retries;
        self
    }

    pub fn event_store(&self) -> &EventStore<S> {
        &self.event_store
    }

    pub fn create_repository<T>(
        &self,
        aggregate: impl Into<Arc<AggregateRoot<T>>>,
    ) -> Repository<T, S>
    where
        T: Clone + Send + Sync + 'static,
    {
        Repository::new(aggregate, self.event_store.clone()).with_config(&self.config)
    }
}
