use std::fmt;

use serde::{Deserialize, Serialize};

use crate::stream_name::StreamName;

/// Addresses one aggregate instance.
///
/// Two identifiers refer to the same stream if and only if their `name`, `id`
/// and `context` are equal.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregateIdentifier {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub context: Option<String>,
}

impl AggregateIdentifier {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        AggregateIdentifier {
            id: id.into(),
            name: name.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Canonical stream name for this identifier.
    ///
    /// A context passed here takes precedence over the identifier's own.
    pub fn stream_name(&self, context: Option<&str>) -> StreamName<'static> {
        StreamName::from_identifier(self, context.or(self.context.as_deref()))
    }
}

impl fmt::Display for AggregateIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{context}/{}:{}", self.name, self.id),
            None => write!(f, "{}:{}", self.name, self.id),
        }
    }
}
