use strata::AggregateIdentifier;
use tracing::Level;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Aggregate(#[from] strata::Error),
    #[error(transparent)]
    Store(#[from] strata_message_store::Error),
    /// A conflicting write was detected and the aggregate's resolver rejected it.
    #[error("Expected aggregate {aggregate} to be at version {expected_version}, got {actual_version}")]
    ConcurrentModification {
        aggregate: AggregateIdentifier,
        expected_version: u64,
        actual_version: u64,
    },
    #[error("gave up saving aggregate {aggregate} after {attempts} conflicting attempts")]
    ConflictRetriesExhausted {
        aggregate: AggregateIdentifier,
        attempts: u8,
    },
    /// A stored record is not a valid event envelope.
    #[error("failed to deserialize stored event: {0}")]
    DeserializeEvent(#[source] serde_json::Error),
    #[error("failed to serialize event: {0}")]
    SerializeEvent(#[source] serde_json::Error),
}

impl Error {
    /// Returns true if the error was caused by a concurrent write to the same stream.
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Store(err) => err.is_concurrency(),
            Error::ConcurrentModification { .. } | Error::ConflictRetriesExhausted { .. } => true,
            _ => false,
        }
    }

    /// Recommended log level for the current error.
    pub fn level(&self) -> Level {
        match self {
            Error::Aggregate(err) if err.is_rejection() => Level::WARN,
            Error::Aggregate(strata::Error::UnknownCommand { .. }) => Level::WARN,
            Error::Aggregate(_) => Level::ERROR,
            Error::Store(err) if err.is_concurrency() => Level::WARN,
            Error::Store(_) => Level::ERROR,
            Error::ConcurrentModification { .. } => Level::WARN,
            Error::ConflictRetriesExhausted { .. } => Level::ERROR,
            Error::DeserializeEvent(_) => Level::ERROR,
            Error::SerializeEvent(_) => Level::ERROR,
        }
    }

    /// Log the error based on the recommended level.
    pub fn log(&self) {
        use tracing::{debug, error, info, trace, warn};

        let level = self.level();
        if level == Level::ERROR {
            error!(%self);
        } else if level == Level::WARN {
            warn!(%self);
        } else if level == Level::INFO {
            info!(%self);
        } else if level == Level::DEBUG {
            debug!(%self);
        } else {
            trace!(%self);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message() {
        let err = Error::ConcurrentModification {
            aggregate: AggregateIdentifier::new("counter", "c1"),
            expected_version: 1,
            actual_version: 2,
        };
        assert_eq!(
            err.to_string(),
            "Expected aggregate counter:c1 to be at version 1, got 2"
        );
        assert!(err.is_conflict());
        assert_eq!(err.level(), Level::WARN);
    }

    #[test]
    fn rejections_are_warnings() {
        let err = Error::from(strata::Error::domain("Must be even"));
        assert_eq!(err.level(), Level::WARN);
        assert!(!err.is_conflict());

        let err = Error::from(strata::Error::UnknownEvent {
            aggregate: "counter".to_string(),
            event: "exploded".to_string(),
        });
        assert_eq!(err.level(), Level::ERROR);
    }
}
