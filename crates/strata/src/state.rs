use serde::{Deserialize, Serialize};

/// The materialized state of one aggregate instance.
///
/// `version` equals the number of events applied, and `exists` is false only
/// for a fresh instance no event has touched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateState<T> {
    pub id: String,
    pub exists: bool,
    pub state: T,
    pub version: u64,
}

impl<T> AggregateState<T> {
    pub fn new(id: impl Into<String>, state: T) -> Self {
        AggregateState {
            id: id.into(),
            exists: false,
            state,
            version: 0,
        }
    }
}
