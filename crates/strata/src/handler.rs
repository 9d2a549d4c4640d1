//! Command handlers and the state they publish events through.
//!
//! A handler receives a [`PublishableAggregateState`], publishes zero or more
//! events through it, and hands it back. Each publish folds the event into the
//! state immediately, so later logic in the same command (including later
//! handlers in a chain) observes the updated state and version.

use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::aggregate::Reducer;
use crate::command::DomainCommand;
use crate::error::Result;
use crate::event::DomainEvent;
use crate::services::ServiceRegistry;
use crate::state::AggregateState;

/// Aggregate state that records every event published while handling a command.
///
/// Not `Clone`: a handler can only continue from the latest state it was given.
pub struct PublishableAggregateState<T> {
    aggregate: AggregateState<T>,
    reducer: Arc<Reducer<T>>,
    published: Vec<DomainEvent>,
}

impl<T> PublishableAggregateState<T> {
    pub(crate) fn new(aggregate: AggregateState<T>, reducer: Arc<Reducer<T>>) -> Self {
        PublishableAggregateState {
            aggregate,
            reducer,
            published: Vec::new(),
        }
    }

    /// Publishes an event, returning the state with the event applied.
    pub fn publish(self, name: impl Into<String>, data: Value) -> Result<Self> {
        self.publish_event(DomainEvent::new(name, data))
    }

    pub fn publish_event(mut self, event: DomainEvent) -> Result<Self> {
        self.aggregate = self.reducer.apply(self.aggregate, &event)?;
        self.published.push(event);
        Ok(self)
    }

    /// Events published so far, in order.
    pub fn published(&self) -> &[DomainEvent] {
        &self.published
    }

    pub fn aggregate_state(&self) -> &AggregateState<T> {
        &self.aggregate
    }

    pub(crate) fn into_published(self) -> Vec<DomainEvent> {
        self.published
    }
}

impl<T> Deref for PublishableAggregateState<T> {
    type Target = AggregateState<T>;

    fn deref(&self) -> &Self::Target {
        &self.aggregate
    }
}

/// Outcome of resuming a [`Steps`] handler.
pub enum Step<T> {
    /// More work remains; resume again with this state.
    Yield(PublishableAggregateState<T>),
    /// The handler is finished.
    Done(PublishableAggregateState<T>),
}

/// A handler that runs as a sequence of resumable steps.
///
/// Each call to `resume` receives the latest state, including everything
/// published by previous steps.
#[async_trait]
pub trait Steps<T>: Send {
    async fn resume(&mut self, entity: PublishableAggregateState<T>) -> Result<Step<T>>;
}

pub type SyncHandlerFn<T> = dyn Fn(
        PublishableAggregateState<T>,
        &DomainCommand,
        &ServiceRegistry,
    ) -> Result<PublishableAggregateState<T>>
    + Send
    + Sync;

pub type AsyncHandlerFn<T> = dyn Fn(
        PublishableAggregateState<T>,
        DomainCommand,
        ServiceRegistry,
    ) -> BoxFuture<'static, Result<PublishableAggregateState<T>>>
    + Send
    + Sync;

pub type StepsFactoryFn<T> =
    dyn Fn(&DomainCommand, &ServiceRegistry) -> Box<dyn Steps<T>> + Send + Sync;

/// A single command handler.
pub enum Handler<T> {
    Sync(Arc<SyncHandlerFn<T>>),
    Async(Arc<AsyncHandlerFn<T>>),
    Steps(Arc<StepsFactoryFn<T>>),
}

impl<T: Send + 'static> Handler<T> {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(
                PublishableAggregateState<T>,
                &DomainCommand,
                &ServiceRegistry,
            ) -> Result<PublishableAggregateState<T>>
            + Send
            + Sync
            + 'static,
    {
        Handler::Sync(Arc::new(f))
    }

    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(PublishableAggregateState<T>, DomainCommand, ServiceRegistry) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<PublishableAggregateState<T>>> + Send + 'static,
    {
        Handler::Async(Arc::new(
            move |entity: PublishableAggregateState<T>,
                  command: DomainCommand,
                  services: ServiceRegistry|
                  -> BoxFuture<'static, Result<PublishableAggregateState<T>>> {
                Box::pin(f(entity, command, services))
            },
        ))
    }

    pub fn steps<F, S>(f: F) -> Self
    where
        F: Fn(&DomainCommand, &ServiceRegistry) -> S + Send + Sync + 'static,
        S: Steps<T> + 'static,
    {
        Handler::Steps(Arc::new(
            move |command: &DomainCommand, services: &ServiceRegistry| -> Box<dyn Steps<T>> {
                Box::new(f(command, services))
            },
        ))
    }

    /// A handler that publishes nothing and fails when the check fails.
    ///
    /// Typically placed first in a chain.
    pub fn validator<F>(f: F) -> Self
    where
        F: Fn(&DomainCommand, &ServiceRegistry) -> Result<()> + Send + Sync + 'static,
    {
        Handler::sync(move |entity, command, services| {
            f(command, services)?;
            Ok(entity)
        })
    }

    pub(crate) async fn run(
        &self,
        entity: PublishableAggregateState<T>,
        command: &DomainCommand,
        services: &ServiceRegistry,
    ) -> Result<PublishableAggregateState<T>> {
        match self {
            Handler::Sync(f) => f(entity, command, services),
            Handler::Async(f) => f(entity, command.clone(), services.clone()).await,
            Handler::Steps(factory) => {
                let mut steps = factory(command, services);
                let mut entity = entity;
                loop {
                    match steps.resume(entity).await? {
                        Step::Yield(next) => entity = next,
                        Step::Done(last) => return Ok(last),
                    }
                }
            }
        }
    }
}

impl<T> Clone for Handler<T> {
    fn clone(&self) -> Self {
        match self {
            Handler::Sync(f) => Handler::Sync(Arc::clone(f)),
            Handler::Async(f) => Handler::Async(Arc::clone(f)),
            Handler::Steps(f) => Handler::Steps(Arc::clone(f)),
        }
    }
}
