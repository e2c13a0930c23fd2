//! Reaction Traits and Adapters
//!
//! A reaction is the one capability the dispatcher needs from a listener:
//! accept the event (and its optional payload), produce nothing, possibly fail.
//! Listeners implement [`Reaction`] directly, or wrap a closure in
//! [`FnReaction`] / [`AsyncFnReaction`].

use std::borrow::Cow;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::dispatch::events::Event;

/// Shared reference to a reaction, as stored in a registry
pub type ReactionRef<P> = Arc<dyn Reaction<P>>;

/// A caller-supplied callable invoked when its channel is published
#[async_trait]
pub trait Reaction<P>: Send + Sync {
    /// React to one occurrence of the event
    async fn react(&self, event: &Event<P>) -> anyhow::Result<()>;

    /// Name used in logs and outcome entries
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Reaction backed by a synchronous closure
pub struct FnReaction<P, F> {
    name: Cow<'static, str>,
    func: F,
    _payload: PhantomData<fn(&P)>,
}

impl<P, F> FnReaction<P, F>
where
    P: Send + Sync + 'static,
    F: Fn(&Event<P>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<Cow<'static, str>>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _payload: PhantomData,
        }
    }

    /// Wrap and erase into a registry-ready reference
    pub fn arc(name: impl Into<Cow<'static, str>>, func: F) -> ReactionRef<P> {
        Arc::new(Self::new(name, func))
    }
}

#[async_trait]
impl<P, F> Reaction<P> for FnReaction<P, F>
where
    P: Send + Sync + 'static,
    F: Fn(&Event<P>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    async fn react(&self, event: &Event<P>) -> anyhow::Result<()> {
        (self.func)(event)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Reaction backed by a closure returning a future.
///
/// The closure receives an owned [`Event`] (cheap to clone) so the returned
/// future does not borrow from the publish call.
pub struct AsyncFnReaction<P, F> {
    name: Cow<'static, str>,
    func: F,
    _payload: PhantomData<fn(Event<P>)>,
}

impl<P, F, Fut> AsyncFnReaction<P, F>
where
    P: Send + Sync + 'static,
    F: Fn(Event<P>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    pub fn new(name: impl Into<Cow<'static, str>>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _payload: PhantomData,
        }
    }

    pub fn arc(name: impl Into<Cow<'static, str>>, func: F) -> ReactionRef<P> {
        Arc::new(Self::new(name, func))
    }
}

#[async_trait]
impl<P, F, Fut> Reaction<P> for AsyncFnReaction<P, F>
where
    P: Send + Sync + 'static,
    F: Fn(Event<P>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn react(&self, event: &Event<P>) -> anyhow::Result<()> {
        (self.func)(event.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Invocation priority. Higher values run first; equal priorities keep
/// registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Priority(pub i32);

impl Priority {
    pub const LOW: Priority = Priority(-100);
    pub const NORMAL: Priority = Priority(0);
    pub const HIGH: Priority = Priority(100);
}

/// Per-subscription options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub priority: Priority,
    /// Overrides the dispatcher-wide reaction timeout for this subscription
    pub timeout: Option<Duration>,
}

impl SubscribeOptions {
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
