use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::log::Log;
use crate::record::{now_millis, StreamRecord, TimeRange};
use crate::store::AppendOnlyStore;

/// A store that keeps every record in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    log: RwLock<Log>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore::default()
    }

    /// Number of records across all streams.
    pub fn len(&self) -> Result<usize> {
        Ok(self.log.read().map_err(|_| Error::RwPoison)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl AppendOnlyStore for InMemoryStore {
    async fn append(
        &self,
        stream_id: &str,
        data: Vec<Value>,
        expected_version: u64,
    ) -> Result<Vec<StreamRecord>> {
        debug!(stream_id, expected_version, count = data.len(), "appending records");

        let mut log = self.log.write().map_err(|_| Error::RwPoison)?;
        let records = log.prepare(stream_id, data, expected_version, now_millis())?;
        log.commit(records.clone());

        if let (Some(first), Some(last)) = (records.first(), records.last()) {
            info!(stream_id, first_id = first.id, last_id = last.id, version = last.version, "records written");
        }

        Ok(records)
    }

    async fn read_records(
        &self,
        stream_id: &str,
        after_version: u64,
        limit: Option<usize>,
    ) -> Result<Vec<StreamRecord>> {
        let log = self.log.read().map_err(|_| Error::RwPoison)?;
        Ok(log.read_records(stream_id, after_version, limit))
    }

    async fn read_all_records(
        &self,
        skip: usize,
        limit: Option<usize>,
    ) -> Result<Vec<StreamRecord>> {
        let log = self.log.read().map_err(|_| Error::RwPoison)?;
        Ok(log.read_all_records(skip, limit))
    }

    async fn read_all_records_in_range(&self, range: TimeRange) -> Result<Vec<StreamRecord>> {
        let log = self.log.read().map_err(|_| Error::RwPoison)?;
        Ok(log.read_all_records_in_range(range))
    }
}
