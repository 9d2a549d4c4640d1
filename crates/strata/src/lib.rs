//! Core types for building event sourced aggregates.
//!
//! An aggregate is defined by its initial state, a reducer per event, and a
//! handler (or chain of handlers) per command. The [`AggregateRoot`] processor
//! applies commands to produce [`DomainEvent`]s and rehydrates an
//! [`AggregateState`] by folding persisted events.
//!
//! Persistence lives in the `strata_message_store` and `strata_runtime` crates.

#[macro_use]
mod macros;

pub mod aggregate;
pub mod handler;
pub mod stream_name;

mod command;
mod error;
mod event;
mod identifier;
mod services;
mod state;

pub use aggregate::{AggregateDefinition, AggregateRoot, ConcurrencyConflict};
pub use command::DomainCommand;
pub use error::{Error, Result};
pub use event::{AggregateEvent, DomainEvent, Metadata};
pub use handler::{Handler, PublishableAggregateState, Step, Steps};
pub use identifier::AggregateIdentifier;
pub use services::ServiceRegistry;
pub use state::AggregateState;
pub use stream_name::{InvalidStreamName, StreamName};

pub use async_trait::async_trait;
