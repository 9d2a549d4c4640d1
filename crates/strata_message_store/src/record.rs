use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One appended entry, as stored.
///
/// Serialized as a single JSON object per line in the file backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRecord {
    pub stream_id: String,
    /// Global position, strictly increasing across all streams.
    pub id: u64,
    /// Position in the stream, gap-free from 1.
    pub version: u64,
    pub data: Value,
    /// Milliseconds since the unix epoch.
    pub timestamp: u64,
}

/// Exclusive bounds on record timestamps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub after_ts: Option<u64>,
    pub before_ts: Option<u64>,
}

impl TimeRange {
    pub fn new(after_ts: Option<u64>, before_ts: Option<u64>) -> Self {
        TimeRange {
            after_ts,
            before_ts,
        }
    }

    pub fn contains(&self, timestamp: u64) -> bool {
        self.after_ts.map_or(true, |after| timestamp > after)
            && self.before_ts.map_or(true, |before| timestamp < before)
    }
}

pub(crate) fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_bounds_are_exclusive() {
        let range = TimeRange::new(Some(10), Some(20));
        assert!(!range.contains(10));
        assert!(range.contains(11));
        assert!(range.contains(19));
        assert!(!range.contains(20));
        assert!(TimeRange::default().contains(0));
    }

    #[test]
    fn record_field_names() {
        let record = StreamRecord {
            stream_id: "s".to_string(),
            id: 1,
            version: 1,
            data: Value::Null,
            timestamp: 5,
        };
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"streamId":"s","id":1,"version":1,"data":null,"timestamp":5}"#
        );
    }
}
