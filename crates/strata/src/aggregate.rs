//! Aggregates fold events into state and turn commands into new events.
//!
//! An aggregate is described once with an [`AggregateDefinition`]: its name,
//! the state a fresh instance starts from, one reducer per event name, and the
//! handlers for each command. Building the definition yields an
//! [`AggregateRoot`], the processor that applies commands and rehydrates state.
//!
//! ```
//! use strata::{AggregateDefinition, DomainEvent, Handler};
//!
//! let counter = AggregateDefinition::new("counter", 0_i64)
//!     .reducer("incremented", |value, _| Ok(value + 1))
//!     .command(
//!         "increment",
//!         Handler::sync(|entity, _, _| entity.publish_event(DomainEvent::named("incremented"))),
//!     )
//!     .build();
//!
//! let events = vec![DomainEvent::named("incremented"); 3];
//! let state = counter.rehydrate("c1", &events, None).unwrap();
//! assert_eq!(state.state, 3);
//! assert_eq!(state.version, 3);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::trace;

use crate::command::DomainCommand;
use crate::error::{Error, Result};
use crate::event::{AggregateEvent, DomainEvent};
use crate::handler::{Handler, PublishableAggregateState};
use crate::services::ServiceRegistry;
use crate::state::AggregateState;

pub type ReducerFn<T> = dyn Fn(&T, &DomainEvent) -> Result<T> + Send + Sync;

pub type ConcurrencyResolverFn<T> =
    dyn Fn(ConcurrencyConflict<'_, T>) -> Option<Vec<DomainEvent>> + Send + Sync;

/// Everything known about a failed save, handed to the concurrency resolver.
pub struct ConcurrencyConflict<'a, T> {
    /// State including the events written concurrently.
    pub actual_state: &'a AggregateState<T>,
    /// State at the version the rejected events were produced against.
    pub expected_state: &'a AggregateState<T>,
    /// Events that failed to save.
    pub new_events: &'a [DomainEvent],
    /// Events written since the expected version.
    pub saved_events: &'a [AggregateEvent],
}

/// Event name to reducer lookup for one aggregate.
pub(crate) struct Reducer<T> {
    aggregate: String,
    reducers: HashMap<String, Arc<ReducerFn<T>>>,
}

impl<T> Reducer<T> {
    pub(crate) fn apply(
        &self,
        aggregate: AggregateState<T>,
        event: &DomainEvent,
    ) -> Result<AggregateState<T>> {
        let reduce = self
            .reducers
            .get(&event.name)
            .ok_or_else(|| Error::UnknownEvent {
                aggregate: self.aggregate.clone(),
                event: event.name.clone(),
            })?;
        let state = reduce(&aggregate.state, event)?;

        Ok(AggregateState {
            id: aggregate.id,
            exists: true,
            state,
            version: aggregate.version + 1,
        })
    }
}

/// Builder describing an aggregate.
pub struct AggregateDefinition<T> {
    name: String,
    initial_state: T,
    reducers: HashMap<String, Arc<ReducerFn<T>>>,
    commands: HashMap<String, Vec<Handler<T>>>,
    concurrency_error_resolver: Option<Arc<ConcurrencyResolverFn<T>>>,
}

impl<T> AggregateDefinition<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, initial_state: T) -> Self {
        AggregateDefinition {
            name: name.into(),
            initial_state,
            reducers: HashMap::new(),
            commands: HashMap::new(),
            concurrency_error_resolver: None,
        }
    }

    /// Registers the reducer for an event name, replacing any previous one.
    pub fn reducer<F>(mut self, event: impl Into<String>, f: F) -> Self
    where
        F: Fn(&T, &DomainEvent) -> Result<T> + Send + Sync + 'static,
    {
        self.reducers.insert(event.into(), Arc::new(f));
        self
    }

    /// Registers a reducer that receives the event data deserialized.
    pub fn apply<D, F>(self, event: impl Into<String>, f: F) -> Self
    where
        D: DeserializeOwned,
        F: Fn(&T, D) -> T + Send + Sync + 'static,
    {
        self.reducer(event, move |state, event| Ok(f(state, event.data_as()?)))
    }

    /// Registers the handler for a command name, replacing any previous one.
    pub fn command(self, name: impl Into<String>, handler: Handler<T>) -> Self {
        self.command_chain(name, [handler])
    }

    /// Registers handlers that run in order for a single command.
    ///
    /// Each handler continues from the state left by the previous one, and the
    /// first failure aborts the whole chain.
    pub fn command_chain<I>(mut self, name: impl Into<String>, handlers: I) -> Self
    where
        I: IntoIterator<Item = Handler<T>>,
    {
        self.commands
            .insert(name.into(), handlers.into_iter().collect());
        self
    }

    /// Registers the resolver consulted when a save hits a version conflict.
    ///
    /// Returning `None` rejects the conflict. Without a resolver every
    /// conflict is rejected.
    pub fn concurrency_error_resolver<F>(mut self, f: F) -> Self
    where
        F: Fn(ConcurrencyConflict<'_, T>) -> Option<Vec<DomainEvent>> + Send + Sync + 'static,
    {
        self.concurrency_error_resolver = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> AggregateRoot<T> {
        AggregateRoot {
            reducer: Arc::new(Reducer {
                aggregate: self.name.clone(),
                reducers: self.reducers,
            }),
            name: self.name,
            initial_state: self.initial_state,
            commands: self.commands,
            concurrency_error_resolver: self.concurrency_error_resolver,
        }
    }
}

/// The processor for one aggregate type.
pub struct AggregateRoot<T> {
    name: String,
    initial_state: T,
    reducer: Arc<Reducer<T>>,
    commands: HashMap<String, Vec<Handler<T>>>,
    concurrency_error_resolver: Option<Arc<ConcurrencyResolverFn<T>>>,
}

impl<T> AggregateRoot<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered command names, sorted.
    pub fn commands(&self) -> Vec<&str> {
        let mut commands: Vec<_> = self.commands.keys().map(String::as_str).collect();
        commands.sort_unstable();
        commands
    }

    pub fn get_initial_state(&self, id: impl Into<String>) -> AggregateState<T> {
        AggregateState::new(id, self.initial_state.clone())
    }

    /// Applies one event, incrementing the version and marking the aggregate as existing.
    pub fn apply_event(
        &self,
        aggregate: AggregateState<T>,
        event: &DomainEvent,
    ) -> Result<AggregateState<T>> {
        self.reducer.apply(aggregate, event)
    }

    /// Runs the command's handlers in order and returns every event they published.
    ///
    /// Any handler failure aborts the command and nothing is returned.
    pub async fn apply_command(
        &self,
        aggregate: AggregateState<T>,
        command: &DomainCommand,
        services: &ServiceRegistry,
    ) -> Result<Vec<DomainEvent>> {
        let handlers = self
            .commands
            .get(&command.name)
            .ok_or_else(|| Error::UnknownCommand {
                aggregate: self.name.clone(),
                command: command.name.clone(),
            })?;

        let mut entity = PublishableAggregateState::new(aggregate, Arc::clone(&self.reducer));
        for handler in handlers {
            entity = handler.run(entity, command, services).await?;
        }

        let events = entity.into_published();
        trace!(
            aggregate = %self.name,
            command = %command.name,
            events = events.len(),
            "applied command"
        );

        Ok(events)
    }

    /// Folds events over the snapshot, or over the initial state if there is none.
    pub fn rehydrate<I>(
        &self,
        id: impl Into<String>,
        events: I,
        snapshot: Option<AggregateState<T>>,
    ) -> Result<AggregateState<T>>
    where
        I: IntoIterator,
        I::Item: AsRef<DomainEvent>,
    {
        let initial = snapshot.unwrap_or_else(|| self.get_initial_state(id));
        events
            .into_iter()
            .try_fold(initial, |aggregate, event| {
                self.apply_event(aggregate, event.as_ref())
            })
    }

    /// Asks the resolver for replacement events, or `None` if the conflict is rejected.
    pub fn resolve_concurrency_error(
        &self,
        conflict: ConcurrencyConflict<'_, T>,
    ) -> Option<Vec<DomainEvent>> {
        let resolver = self.concurrency_error_resolver.as_ref()?;
        resolver(conflict)
    }
}

impl<T> fmt::Debug for AggregateRoot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateRoot")
            .field("name", &self.name)
            .field("commands", &self.commands.len())
            .field("reducers", &self.reducer.reducers.len())
            .finish()
    }
}
