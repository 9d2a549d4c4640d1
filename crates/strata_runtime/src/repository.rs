//! Loads aggregates from their event history and saves new events with
//! optimistic concurrency.
//!
//! When a save loses a race, the aggregate's concurrency resolver is shown
//! the state before and after the competing write. If it supplies
//! replacement events they are saved against the actual version; otherwise
//! the save fails with [`Error::ConcurrentModification`].

use std::sync::Arc;

use async_recursion::async_recursion;
use serde_json::Value;
use strata::{
    AggregateIdentifier, AggregateRoot, AggregateState, ConcurrencyConflict, DomainCommand,
    DomainEvent, Metadata, ServiceRegistry,
};
use strata_message_store::AppendOnlyStore;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{RuntimeConfig, DEFAULT_MAX_CONFLICT_RETRIES};
use crate::error::{Error, Result};
use crate::event_store::EventStore;

pub struct Repository<T, S> {
    aggregate: Arc<AggregateRoot<T>>,
    event_store: EventStore<S>,
    max_conflict_retries: u8,
}

impl<T, S> Clone for Repository<T, S> {
    fn clone(&self) -> Self {
        Repository {
            aggregate: Arc::clone(&self.aggregate),
            event_store: self.event_store.clone(),
            max_conflict_retries: self.max_conflict_retries,
        }
    }
}

impl<T, S> Repository<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: AppendOnlyStore + 'static,
{
    pub fn new(aggregate: impl Into<Arc<AggregateRoot<T>>>, event_store: EventStore<S>) -> Self {
        Repository {
            aggregate: aggregate.into(),
            event_store,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }

    pub fn with_max_conflict_retries(mut self, max_conflict_retries: u8) -> Self {
        self.max_conflict_retries = max_conflict_retries;
        self
    }

    pub(crate) fn with_config(self, config: &RuntimeConfig) -> Self {
        self.with_max_conflict_retries(config.max_conflict_retries)
    }

    pub fn aggregate_root(&self) -> &AggregateRoot<T> {
        &self.aggregate
    }

    pub fn event_store(&self) -> &EventStore<S> {
        &self.event_store
    }

    pub fn aggregate_identifier(&self, id: &str) -> AggregateIdentifier {
        AggregateIdentifier::new(self.aggregate.name(), id)
    }

    /// A fresh random aggregate id.
    pub fn get_next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Rehydrates an aggregate, optionally only up to and including `at_version`.
    pub async fn get_by_id(&self, id: &str, at_version: Option<u64>) -> Result<AggregateState<T>> {
        let limit = at_version.map(|version| usize::try_from(version).unwrap_or(usize::MAX));
        let events = self
            .event_store
            .load_events(&self.aggregate_identifier(id), 0, limit)
            .await?;

        Ok(self.aggregate.rehydrate(id, &events, None)?)
    }

    /// Rehydrates an aggregate by applying only the events after the snapshot.
    pub async fn get_by_id_from_snapshot(
        &self,
        snapshot: AggregateState<T>,
    ) -> Result<AggregateState<T>> {
        let events = self
            .event_store
            .load_events(&self.aggregate_identifier(&snapshot.id), snapshot.version, None)
            .await?;
        let id = snapshot.id.clone();

        Ok(self.aggregate.rehydrate(id, &events, Some(snapshot))?)
    }

    /// Saves events produced against `expected_version`, returning the new version.
    pub async fn save(
        &self,
        id: &str,
        events: Vec<DomainEvent>,
        expected_version: u64,
        metadata: Option<Metadata>,
    ) -> Result<u64> {
        self.save_with_retry(id, events, expected_version, metadata, 0)
            .await
    }

    #[async_recursion]
    async fn save_with_retry(
        &self,
        id: &str,
        events: Vec<DomainEvent>,
        expected_version: u64,
        metadata: Option<Metadata>,
        attempt: u8,
    ) -> Result<u64> {
        let aggregate = self.aggregate_identifier(id);
        let err = match self
            .event_store
            .save(&aggregate, &events, expected_version, metadata.clone())
            .await
        {
            Ok(saved) => return Ok(expected_version + saved.len() as u64),
            Err(Error::Store(err)) if err.is_concurrency() => err,
            Err(err) => return Err(err),
        };
        warn!(%aggregate, expected_version, %err, "concurrency conflict");

        let actual_state = self.get_by_id(id, None).await?;
        let expected_state = self.get_by_id(id, Some(expected_version)).await?;
        let saved_events = self
            .event_store
            .load_events(&aggregate, expected_version, None)
            .await?;

        let resolved = self.aggregate.resolve_concurrency_error(ConcurrencyConflict {
            actual_state: &actual_state,
            expected_state: &expected_state,
            new_events: &events,
            saved_events: &saved_events,
        });
        let Some(resolved) = resolved else {
            warn!(%aggregate, expected_version, actual_version = actual_state.version, "conflict rejected");
            return Err(Error::ConcurrentModification {
                aggregate,
                expected_version,
                actual_version: actual_state.version,
            });
        };

        if attempt >= self.max_conflict_retries {
            return Err(Error::ConflictRetriesExhausted {
                aggregate,
                attempts: attempt + 1,
            });
        }

        info!(
            %aggregate,
            actual_version = actual_state.version,
            events = resolved.len(),
            attempt = attempt + 1,
            "conflict resolved, retrying save"
        );
        self.save_with_retry(id, resolved, actual_state.version, metadata, attempt + 1)
            .await
    }

    /// Loads the aggregate, applies the command and saves the resulting events.
    ///
    /// The command's version is the expected version of the save. Returns the
    /// aggregate version afterwards; a command that publishes nothing leaves
    /// the store untouched.
    pub async fn execute(
        &self,
        id: &str,
        command: &DomainCommand,
        services: &ServiceRegistry,
    ) -> Result<u64> {
        let aggregate = self.get_by_id(id, None).await?;
        let current_version = aggregate.version;
        let events = match self.aggregate.apply_command(aggregate, command, services).await {
            Ok(events) => events,
            Err(err) => {
                let err = Error::from(err);
                err.log();
                return Err(err);
            }
        };
        if events.is_empty() {
            return Ok(current_version);
        }

        let metadata = command
            .user_id
            .as_ref()
            .map(|user_id| Metadata::from([("userId".to_string(), Value::from(user_id.as_str()))]));
        self.save(id, events, command.version, metadata).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use strata::{AggregateDefinition, Handler};
    use strata_message_store::InMemoryStore;

    use super::*;

    fn counter() -> AggregateRoot<i64> {
        AggregateDefinition::new("counter", 0_i64)
            .apply("incremented", |value: &i64, by: i64| value + by)
            .command(
                "increment",
                Handler::sync(|entity, _, _| entity.publish("incremented", json!(1))),
            )
            .command("noop", Handler::sync(|entity, _, _| Ok(entity)))
            .build()
    }

    fn repository() -> Repository<i64, InMemoryStore> {
        Repository::new(counter(), EventStore::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn get_by_id_at_version() {
        let repository = repository();
        let events = vec![DomainEvent::new("incremented", json!(2)); 3];
        assert_eq!(repository.save("c1", events, 0, None).await.unwrap(), 3);

        let latest = repository.get_by_id("c1", None).await.unwrap();
        assert_eq!((latest.state, latest.version), (6, 3));

        let earlier = repository.get_by_id("c1", Some(1)).await.unwrap();
        assert_eq!((earlier.state, earlier.version), (2, 1));

        let missing = repository.get_by_id("other", None).await.unwrap();
        assert!(!missing.exists);
        assert_eq!(missing.version, 0);
    }

    #[tokio::test]
    async fn replays_from_snapshot() {
        let repository = repository();
        let events = vec![DomainEvent::new("incremented", json!(1)); 4];
        repository.save("c1", events, 0, None).await.unwrap();

        let snapshot = AggregateState {
            id: "c1".to_string(),
            exists: true,
            state: 100,
            version: 3,
        };
        let state = repository.get_by_id_from_snapshot(snapshot).await.unwrap();
        assert_eq!((state.state, state.version), (101, 4));
    }

    #[tokio::test]
    async fn execute_saves_with_user_metadata() {
        let repository = repository();
        let command = DomainCommand::new("increment", 0).with_user_id("u1");
        let version = repository
            .execute("c1", &command, &ServiceRegistry::new())
            .await
            .unwrap();
        assert_eq!(version, 1);

        let events = repository
            .event_store()
            .load_events(&repository.aggregate_identifier("c1"), 0, None)
            .await
            .unwrap();
        assert_eq!(
            events[0].metadata,
            Some(Metadata::from([("userId".to_string(), json!("u1"))]))
        );
    }

    #[tokio::test]
    async fn execute_without_events_skips_save() {
        let repository = repository();
        let mut saved = repository.event_store().subscribe();
        let version = repository
            .execute("c1", &DomainCommand::new("noop", 0), &ServiceRegistry::new())
            .await
            .unwrap();
        assert_eq!(version, 0);
        assert!(saved.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_command_without_resolver_is_rejected() {
        let repository = repository();
        let services = ServiceRegistry::new();
        repository
            .execute("c1", &DomainCommand::new("increment", 0), &services)
            .await
            .unwrap();

        let err = repository
            .execute("c1", &DomainCommand::new("increment", 0), &services)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ConcurrentModification {
                expected_version: 0,
                actual_version: 1,
                ..
            }
        ));
    }

    #[test]
    fn next_ids_are_unique() {
        let repository = repository();
        assert_ne!(repository.get_next_id(), repository.get_next_id());
    }
}
