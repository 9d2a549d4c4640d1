//! Stream names are the canonical encoding of an aggregate identifier.
//!
//! Every aggregate instance owns exactly one stream in the append-only store.
//! The stream is addressed by a string derived from the aggregate's `context`,
//! `id` and `name`, encoded as a JSON object with its keys in lexicographic
//! order and no insignificant whitespace. An absent context encodes as `null`.
//!
//! # Example Stream Names
//!
//! `{"context":null,"id":"c1","name":"counter"}`
//!
//! The stream of the `counter` aggregate with the ID `c1`, outside of any
//! bounded context.
//!
//! `{"context":"billing","id":"42","name":"invoice"}`
//!
//! The stream of invoice `42` within the `billing` context.
//!
//! Encoding is deterministic: the same identifier always yields the same
//! stream name, regardless of how it was constructed.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::identifier::AggregateIdentifier;

/// The canonical name of an aggregate's stream.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamName<'a>(Cow<'a, str>);

impl<'a> StreamName<'a> {
    /// Wraps an already encoded stream name, such as one read back from storage.
    ///
    /// The name is not validated until [`StreamName::aggregate_identifier`] is
    /// called.
    pub fn new(name: impl Into<Cow<'a, str>>) -> Self {
        StreamName(name.into())
    }

    /// Encodes an identifier into its stream name.
    ///
    /// `context` replaces whatever context the identifier carries.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata::{AggregateIdentifier, StreamName};
    ///
    /// let id = AggregateIdentifier::new("counter", "c1");
    /// let stream_name = StreamName::from_identifier(&id, None);
    /// assert_eq!(stream_name, r#"{"context":null,"id":"c1","name":"counter"}"#);
    /// ```
    pub fn from_identifier(
        identifier: &AggregateIdentifier,
        context: Option<&str>,
    ) -> StreamName<'static> {
        // Value's Display writes compact JSON with escaped strings
        let context = context.map(Value::from).unwrap_or(Value::Null);
        let id = Value::from(identifier.id.as_str());
        let name = Value::from(identifier.name.as_str());
        StreamName(Cow::Owned(format!(
            r#"{{"context":{context},"id":{id},"name":{name}}}"#
        )))
    }

    /// Decodes the stream name back into the identifier it was built from.
    pub fn aggregate_identifier(&self) -> Result<AggregateIdentifier, InvalidStreamName> {
        serde_json::from_str(&self.0).map_err(|source| InvalidStreamName {
            stream_name: self.0.to_string(),
            source,
        })
    }
}

#[derive(Debug, Error)]
#[error("invalid stream name '{stream_name}': {source}")]
pub struct InvalidStreamName {
    stream_name: String,
    #[source]
    source: serde_json::Error,
}

impl_eq! { StreamName<'a>, &'b str }
impl_eq! { StreamName<'a>, String }
impl_cow_str! { StreamName, StreamName<'a>, StreamName<'static> }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_keys_in_sorted_order() {
        let id = AggregateIdentifier::new("counter", "c1");
        assert_eq!(
            StreamName::from_identifier(&id, None),
            r#"{"context":null,"id":"c1","name":"counter"}"#
        );
        assert_eq!(
            StreamName::from_identifier(&id, Some("billing")),
            r#"{"context":"billing","id":"c1","name":"counter"}"#
        );
    }

    #[test]
    fn escapes_strings() {
        let id = AggregateIdentifier::new("coun\"ter", "a\\b");
        let stream_name = StreamName::from_identifier(&id, None);
        assert_eq!(
            stream_name,
            r#"{"context":null,"id":"a\\b","name":"coun\"ter"}"#
        );
        assert_eq!(stream_name.aggregate_identifier().unwrap(), id);
    }

    #[test]
    fn decodes_context() {
        let id = AggregateIdentifier::new("invoice", "42");
        let decoded = id
            .stream_name(Some("billing"))
            .aggregate_identifier()
            .unwrap();
        assert_eq!(decoded, id.with_context("billing"));
    }

    #[test]
    fn identifier_context_used_when_none_given() {
        let id = AggregateIdentifier::new("invoice", "42").with_context("billing");
        assert_eq!(
            id.stream_name(None),
            r#"{"context":"billing","id":"42","name":"invoice"}"#
        );
        assert_eq!(
            id.stream_name(Some("sales")),
            r#"{"context":"sales","id":"42","name":"invoice"}"#
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(StreamName::new("counter-1").aggregate_identifier().is_err());
    }
}
