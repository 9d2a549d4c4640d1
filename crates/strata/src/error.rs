use std::borrow::Cow;

use thiserror::Error;

use crate::stream_name::InvalidStreamName;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// No handler is registered under the command name.
    #[error("unknown command '{aggregate}.{command}'")]
    UnknownCommand { aggregate: String, command: String },
    /// No reducer is registered under the event name.
    #[error("unknown event '{aggregate}.{event}'")]
    UnknownEvent { aggregate: String, event: String },
    /// Business rule rejection raised by a command handler.
    #[error("{0}")]
    Domain(Cow<'static, str>),
    /// A command payload failed validation before any event was published.
    #[error("invalid command: {0}")]
    CommandValidation(Cow<'static, str>),
    #[error("failed to deserialize data: {0}")]
    DeserializeData(#[source] serde_json::Error),
    #[error("failed to serialize data: {0}")]
    SerializeData(#[source] serde_json::Error),
    #[error(transparent)]
    InvalidStreamName(#[from] InvalidStreamName),
}

impl Error {
    pub fn domain(msg: impl Into<Cow<'static, str>>) -> Self {
        Error::Domain(msg.into())
    }

    pub fn validation(msg: impl Into<Cow<'static, str>>) -> Self {
        Error::CommandValidation(msg.into())
    }

    /// Returns true for errors raised by user handlers rather than the kernel.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::Domain(_) | Error::CommandValidation(_))
    }
}
