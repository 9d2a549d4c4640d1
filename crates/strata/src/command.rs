use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A request to change an aggregate.
///
/// `version` is the aggregate version the caller observed, and becomes the
/// expected version when the resulting events are saved.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainCommand {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub version: u64,
}

impl DomainCommand {
    pub fn new(name: impl Into<String>, version: u64) -> Self {
        DomainCommand {
            name: name.into(),
            data: None,
            user_id: None,
            version,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Deserializes the command payload.
    ///
    /// Malformed payloads are reported as validation errors.
    pub fn data_as<D: DeserializeOwned>(&self) -> Result<D> {
        let data = self.data.clone().unwrap_or(Value::Null);
        serde_json::from_value(data).map_err(|err| Error::validation(err.to_string()))
    }
}
