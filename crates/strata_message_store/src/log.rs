use std::collections::HashMap;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::record::{StreamRecord, TimeRange};

/// In-memory index of every record: one global list plus per-stream positions.
///
/// Writes happen in two phases so that a backend can persist the prepared
/// records before they become visible to readers.
#[derive(Debug)]
pub(crate) struct Log {
    records: Vec<StreamRecord>,
    streams: HashMap<String, Vec<usize>>,
    next_id: u64,
}

impl Default for Log {
    fn default() -> Self {
        Log {
            records: Vec::new(),
            streams: HashMap::new(),
            next_id: 1,
        }
    }
}

impl Log {
    /// Rebuilds the index from records in global order.
    pub(crate) fn from_records(records: Vec<StreamRecord>) -> Self {
        let mut log = Log::default();
        log.commit(records);
        log
    }

    pub(crate) fn version(&self, stream_id: &str) -> u64 {
        self.streams
            .get(stream_id)
            .map(|positions| positions.len() as u64)
            .unwrap_or(0)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Checks the expected version and builds the records an append would write.
    pub(crate) fn prepare(
        &self,
        stream_id: &str,
        data: Vec<Value>,
        expected_version: u64,
        timestamp: u64,
    ) -> Result<Vec<StreamRecord>> {
        let actual_version = self.version(stream_id);
        if expected_version != actual_version {
            return Err(Error::Concurrency {
                stream_id: stream_id.to_string(),
                expected_version,
                actual_version,
            });
        }

        Ok(data
            .into_iter()
            .zip(0..)
            .map(|(data, offset)| StreamRecord {
                stream_id: stream_id.to_string(),
                id: self.next_id + offset,
                version: actual_version + offset + 1,
                data,
                timestamp,
            })
            .collect())
    }

    pub(crate) fn commit(&mut self, records: Vec<StreamRecord>) {
        for record in records {
            self.next_id = self.next_id.max(record.id + 1);
            self.streams
                .entry(record.stream_id.clone())
                .or_default()
                .push(self.records.len());
            self.records.push(record);
        }
    }

    pub(crate) fn read_records(
        &self,
        stream_id: &str,
        after_version: u64,
        limit: Option<usize>,
    ) -> Vec<StreamRecord> {
        let Some(positions) = self.streams.get(stream_id) else {
            return Vec::new();
        };
        let skip = usize::try_from(after_version).unwrap_or(usize::MAX);
        positions
            .iter()
            .skip(skip)
            .take(limit.unwrap_or(usize::MAX))
            .map(|&position| self.records[position].clone())
            .collect()
    }

    pub(crate) fn read_all_records(&self, skip: usize, limit: Option<usize>) -> Vec<StreamRecord> {
        self.records
            .iter()
            .skip(skip)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub(crate) fn read_all_records_in_range(&self, range: TimeRange) -> Vec<StreamRecord> {
        self.records
            .iter()
            .filter(|record| range.contains(record.timestamp))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn prepare_does_not_mutate() {
        let log = Log::default();
        let records = log
            .prepare("a", vec![json!(1), json!(2)], 0, 100)
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!((records[0].id, records[0].version), (1, 1));
        assert_eq!((records[1].id, records[1].version), (2, 2));
        assert_eq!(log.version("a"), 0);
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn rebuilds_from_records() {
        let mut log = Log::default();
        let a = log.prepare("a", vec![json!(1)], 0, 1).unwrap();
        log.commit(a);
        let b = log.prepare("b", vec![json!(2), json!(3)], 0, 2).unwrap();
        log.commit(b);

        let rebuilt = Log::from_records(log.read_all_records(0, None));
        assert_eq!(rebuilt.version("a"), 1);
        assert_eq!(rebuilt.version("b"), 2);
        let next = rebuilt.prepare("a", vec![json!(4)], 1, 3).unwrap();
        assert_eq!((next[0].id, next[0].version), (4, 2));
    }
}
