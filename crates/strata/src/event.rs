use std::collections::BTreeMap;
use std::ops::Deref;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifier::AggregateIdentifier;

/// Free-form metadata attached to persisted events.
pub type Metadata = BTreeMap<String, Value>;

/// An event as produced by a command handler, before it is persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl DomainEvent {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        DomainEvent {
            name: name.into(),
            data: Some(data),
        }
    }

    /// An event carrying no data.
    pub fn named(name: impl Into<String>) -> Self {
        DomainEvent {
            name: name.into(),
            data: None,
        }
    }

    /// Builds an event from any serializable payload.
    pub fn with_payload<D: Serialize>(name: impl Into<String>, payload: &D) -> Result<Self> {
        let data = serde_json::to_value(payload).map_err(Error::SerializeData)?;
        Ok(DomainEvent::new(name, data))
    }

    /// Deserializes the event data, treating absent data as `null`.
    pub fn data_as<D: DeserializeOwned>(&self) -> Result<D> {
        let data = self.data.clone().unwrap_or(Value::Null);
        serde_json::from_value(data).map_err(Error::DeserializeData)
    }
}

impl AsRef<DomainEvent> for DomainEvent {
    fn as_ref(&self) -> &DomainEvent {
        self
    }
}

/// A persisted event, enriched by the event store.
///
/// Aggregate events are never built by handlers; they only exist once the
/// underlying record has been appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct AggregateEvent {
    pub aggregate: AggregateIdentifier,
    /// Global position of the record, unique across all streams.
    pub id: u64,
    /// Position within the aggregate's stream, starting at 1.
    pub version: u64,
    /// Milliseconds since the unix epoch.
    pub timestamp: u64,
    #[serde(flatten)]
    pub event: DomainEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl AggregateEvent {
    pub fn from_record(
        aggregate: AggregateIdentifier,
        id: u64,
        version: u64,
        timestamp: u64,
        event: DomainEvent,
        metadata: Option<Metadata>,
    ) -> Self {
        AggregateEvent {
            aggregate,
            id,
            version,
            timestamp,
            event,
            metadata,
        }
    }

    pub fn into_domain_event(self) -> DomainEvent {
        self.event
    }

    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        let millis = i64::try_from(self.timestamp).ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }
}

impl Deref for AggregateEvent {
    type Target = DomainEvent;

    fn deref(&self) -> &Self::Target {
        &self.event
    }
}

impl AsRef<DomainEvent> for AggregateEvent {
    fn as_ref(&self) -> &DomainEvent {
        &self.event
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn aggregate_event_serializes_flat() {
        let event = AggregateEvent::from_record(
            AggregateIdentifier::new("counter", "c1"),
            7,
            2,
            1_700_000_000_000,
            DomainEvent::new("incremented", json!({ "by": 1 })),
            None,
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "aggregate": { "id": "c1", "name": "counter", "context": null },
                "id": 7,
                "version": 2,
                "timestamp": 1_700_000_000_000u64,
                "name": "incremented",
                "data": { "by": 1 },
            })
        );
        assert_eq!(event.recorded_at().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn missing_data_reads_as_null() {
        let event = DomainEvent::named("reset");
        event.data_as::<()>().unwrap();
        assert!(matches!(
            event.data_as::<u32>(),
            Err(Error::DeserializeData(_))
        ));
    }
}
