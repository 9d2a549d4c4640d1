use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use strata_message_store::{
    AppendOnlyStore, FileStore, InMemoryStore, Result, StreamRecord, TimeRange,
};

pub const DEFAULT_MAX_CONFLICT_RETRIES: u8 = 8;
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 1024;

/// Runtime settings shared by the event store and its repositories.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RuntimeConfig {
    /// Bounded context mixed into every stream name.
    pub context: Option<String>,
    /// How many times a save is retried after the resolver accepts a conflict.
    pub max_conflict_retries: u8,
    /// Buffer size of the saved event broadcast channel.
    pub notification_capacity: usize,
    pub store: StoreConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            context: None,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            store: StoreConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    #[default]
    Memory,
    File {
        path: PathBuf,
        /// Sync the file to disk after every append.
        #[serde(default)]
        sync: bool,
    },
}

impl StoreConfig {
    pub fn open(&self) -> Result<ConfiguredStore> {
        match self {
            StoreConfig::Memory => Ok(ConfiguredStore::Memory(InMemoryStore::new())),
            StoreConfig::File { path, sync } => {
                Ok(ConfiguredStore::File(FileStore::open(path, *sync)?))
            }
        }
    }
}

/// The backend selected by a [`StoreConfig`].
#[derive(Debug)]
pub enum ConfiguredStore {
    Memory(InMemoryStore),
    File(FileStore),
}

#[async_trait]
impl AppendOnlyStore for ConfiguredStore {
    async fn append(
        &self,
        stream_id: &str,
        data: Vec<Value>,
        expected_version: u64,
    ) -> Result<Vec<StreamRecord>> {
        match self {
            ConfiguredStore::Memory(store) => store.append(stream_id, data, expected_version).await,
            ConfiguredStore::File(store) => store.append(stream_id, data, expected_version).await,
        }
    }

    async fn read_records(
        &self,
        stream_id: &str,
        after_version: u64,
        limit: Option<usize>,
    ) -> Result<Vec<StreamRecord>> {
        match self {
            ConfiguredStore::Memory(store) => {
                store.read_records(stream_id, after_version, limit).await
            }
            ConfiguredStore::File(store) => {
                store.read_records(stream_id, after_version, limit).await
            }
        }
    }

    async fn read_all_records(
        &self,
        skip: usize,
        limit: Option<usize>,
    ) -> Result<Vec<StreamRecord>> {
        match self {
            ConfiguredStore::Memory(store) => store.read_all_records(skip, limit).await,
            ConfiguredStore::File(store) => store.read_all_records(skip, limit).await,
        }
    }

    async fn read_all_records_in_range(&self, range: TimeRange) -> Result<Vec<StreamRecord>> {
        match self {
            ConfiguredStore::Memory(store) => store.read_all_records_in_range(range).await,
            ConfiguredStore::File(store) => store.read_all_records_in_range(range).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.max_conflict_retries, 8);
        assert_eq!(config.store, StoreConfig::Memory);
    }

    #[test]
    fn file_store_from_json() {
        let config: RuntimeConfig = serde_json::from_str(
            r#"{
                "context": "billing",
                "max_conflict_retries": 2,
                "store": { "type": "file", "path": "/var/lib/strata/events.log" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.context.as_deref(), Some("billing"));
        assert_eq!(config.max_conflict_retries, 2);
        assert_eq!(config.notification_capacity, DEFAULT_NOTIFICATION_CAPACITY);
        assert_eq!(
            config.store,
            StoreConfig::File {
                path: PathBuf::from("/var/lib/strata/events.log"),
                sync: false,
            }
        );
    }

    #[tokio::test]
    async fn opens_selected_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::File {
            path: dir.path().join("events.log"),
            sync: true,
        };
        let store = config.open().unwrap();
        assert!(matches!(store, ConfiguredStore::File(_)));

        store.append("s", vec![Value::Null], 0).await.unwrap();
        assert_eq!(store.read_all_records(0, None).await.unwrap().len(), 1);
    }
}
