//! Persists domain events into an append-only store.
//!
//! Each aggregate instance maps to one stream, named by the canonical encoding
//! of its identifier and the store's context. Records hold an envelope of the
//! event and its metadata; loading converts them back into
//! [`AggregateEvent`]s enriched with the record's id, version and timestamp.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strata::{AggregateEvent, AggregateIdentifier, DomainEvent, Metadata, StreamName};
use strata_message_store::{AppendOnlyStore, StreamRecord, TimeRange};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};

/// Stored form of an event.
#[derive(Serialize, Deserialize)]
struct Envelope {
    event: DomainEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata>,
}

pub struct EventStore<S> {
    store: Arc<S>,
    context: Option<String>,
    saved: broadcast::Sender<AggregateEvent>,
}

impl<S> Clone for EventStore<S> {
    fn clone(&self) -> Self {
        EventStore {
            store: Arc::clone(&self.store),
            context: self.context.clone(),
            saved: self.saved.clone(),
        }
    }
}

impl<S> EventStore<S>
where
    S: AppendOnlyStore,
{
    pub fn new(store: S) -> Self {
        EventStore::from_config(store, &RuntimeConfig::default())
    }

    pub fn from_config(store: S, config: &RuntimeConfig) -> Self {
        let (saved, _) = broadcast::channel(config.notification_capacity.max(1));
        EventStore {
            store: Arc::new(store),
            context: config.context.clone(),
            saved,
        }
    }

    /// Sets the bounded context mixed into every stream name.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stream_name(&self, aggregate: &AggregateIdentifier) -> StreamName<'static> {
        aggregate.stream_name(self.context.as_deref())
    }

    /// Receives every event after it has been persisted, in persistence order.
    pub fn subscribe(&self) -> broadcast::Receiver<AggregateEvent> {
        self.saved.subscribe()
    }

    /// Appends events to the aggregate's stream, which must be at `expected_version`.
    pub async fn save(
        &self,
        aggregate: &AggregateIdentifier,
        events: &[DomainEvent],
        expected_version: u64,
        metadata: Option<Metadata>,
    ) -> Result<Vec<AggregateEvent>> {
        let stream_name = self.stream_name(aggregate);
        debug!(%stream_name, expected_version, count = events.len(), "saving events");

        let data = events
            .iter()
            .map(|event| {
                serde_json::to_value(Envelope {
                    event: event.clone(),
                    metadata: metadata.clone(),
                })
                .map_err(Error::SerializeEvent)
            })
            .collect::<Result<Vec<_>>>()?;
        let records = self
            .store
            .append(&stream_name, data, expected_version)
            .await?;

        let events = records
            .into_iter()
            .map(to_aggregate_event)
            .collect::<Result<Vec<_>>>()?;
        for event in &events {
            trace!(id = event.id, version = event.version, name = %event.name, "event saved");
            // No receivers is not an error.
            let _ = self.saved.send(event.clone());
        }

        Ok(events)
    }

    /// Events of one aggregate with a version greater than `after_version`.
    pub async fn load_events(
        &self,
        aggregate: &AggregateIdentifier,
        after_version: u64,
        limit: Option<usize>,
    ) -> Result<Vec<AggregateEvent>> {
        let stream_name = self.stream_name(aggregate);
        let records = self
            .store
            .read_records(&stream_name, after_version, limit)
            .await?;
        debug!(%stream_name, after_version, count = records.len(), "loaded events");

        records.into_iter().map(to_aggregate_event).collect()
    }

    /// Events of every aggregate in global order.
    pub async fn load_all_events(
        &self,
        skip: usize,
        limit: Option<usize>,
    ) -> Result<Vec<AggregateEvent>> {
        let records = self.store.read_all_records(skip, limit).await?;
        debug!(skip, count = records.len(), "loaded all events");

        records.into_iter().map(to_aggregate_event).collect()
    }

    pub async fn load_all_events_in_range(&self, range: TimeRange) -> Result<Vec<AggregateEvent>> {
        let records = self.store.read_all_records_in_range(range).await?;
        debug!(?range, count = records.len(), "loaded events in range");

        records.into_iter().map(to_aggregate_event).collect()
    }
}

fn to_aggregate_event(record: StreamRecord) -> Result<AggregateEvent> {
    let aggregate = StreamName::new(record.stream_id.as_str())
        .aggregate_identifier()
        .map_err(strata::Error::from)?;
    let Envelope { event, metadata } =
        serde_json::from_value(record.data).map_err(Error::DeserializeEvent)?;

    Ok(AggregateEvent::from_record(
        aggregate,
        record.id,
        record.version,
        record.timestamp,
        event,
        metadata,
    ))
}
