use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::record::{StreamRecord, TimeRange};

/// A log of records partitioned into streams.
///
/// Appends to one stream are all-or-nothing and only succeed when the stream
/// is still at the version the writer expects.
#[async_trait]
pub trait AppendOnlyStore: Send + Sync {
    /// Appends `data` to a stream currently at `expected_version`.
    ///
    /// The version check happens even when `data` is empty.
    async fn append(
        &self,
        stream_id: &str,
        data: Vec<Value>,
        expected_version: u64,
    ) -> Result<Vec<StreamRecord>>;

    /// Records of one stream with a version greater than `after_version`.
    async fn read_records(
        &self,
        stream_id: &str,
        after_version: u64,
        limit: Option<usize>,
    ) -> Result<Vec<StreamRecord>>;

    /// Records of every stream in global order.
    async fn read_all_records(&self, skip: usize, limit: Option<usize>)
        -> Result<Vec<StreamRecord>>;

    /// Records of every stream whose timestamp falls within `range`, in global order.
    async fn read_all_records_in_range(&self, range: TimeRange) -> Result<Vec<StreamRecord>>;
}

#[async_trait]
impl<S> AppendOnlyStore for Arc<S>
where
    S: AppendOnlyStore + ?Sized,
{
    async fn append(
        &self,
        stream_id: &str,
        data: Vec<Value>,
        expected_version: u64,
    ) -> Result<Vec<StreamRecord>> {
        (**self).append(stream_id, data, expected_version).await
    }

    async fn read_records(
        &self,
        stream_id: &str,
        after_version: u64,
        limit: Option<usize>,
    ) -> Result<Vec<StreamRecord>> {
        (**self).read_records(stream_id, after_version, limit).await
    }

    async fn read_all_records(
        &self,
        skip: usize,
        limit: Option<usize>,
    ) -> Result<Vec<StreamRecord>> {
        (**self).read_all_records(skip, limit).await
    }

    async fn read_all_records_in_range(&self, range: TimeRange) -> Result<Vec<StreamRecord>> {
        (**self).read_all_records_in_range(range).await
    }
}
