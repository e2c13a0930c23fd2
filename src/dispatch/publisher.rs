//! Channel-bound publisher
//!
//! A [`ChannelPublisher`] fixes the channel once so owners can expose a single
//! event (say, a game's "level complete" notification) without handing out the
//! whole dispatcher or repeating the channel name.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;

use crate::dispatch::channel::ChannelId;
use crate::dispatch::error::DispatchResult;
use crate::dispatch::events::{Event, InvocationOutcome};
use crate::dispatch::manager::Dispatcher;
use crate::dispatch::registry::SubscriptionHandle;
use crate::dispatch::traits::{ReactionRef, SubscribeOptions};

/// Subscribe and publish on one channel of a [`Dispatcher`]
pub struct ChannelPublisher<P = ()> {
    dispatcher: Dispatcher<P>,
    channel: ChannelId,
}

impl<P> ChannelPublisher<P>
where
    P: Send + Sync + 'static,
{
    pub(crate) fn new(dispatcher: Dispatcher<P>, channel: ChannelId) -> Self {
        Self {
            dispatcher,
            channel,
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn dispatcher(&self) -> &Dispatcher<P> {
        &self.dispatcher
    }

    pub fn subscribe(&self, reaction: ReactionRef<P>) -> DispatchResult<SubscriptionHandle> {
        self.dispatcher.subscribe(&self.channel, reaction)
    }

    pub fn subscribe_with(
        &self,
        reaction: ReactionRef<P>,
        options: SubscribeOptions,
    ) -> DispatchResult<SubscriptionHandle> {
        self.dispatcher.subscribe_with(&self.channel, reaction, options)
    }

    pub fn subscribe_fn<F>(
        &self,
        name: impl Into<Cow<'static, str>>,
        func: F,
    ) -> DispatchResult<SubscriptionHandle>
    where
        F: Fn(&Event<P>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.subscribe_fn(&self.channel, name, func)
    }

    pub fn subscribe_async<F, Fut>(
        &self,
        name: impl Into<Cow<'static, str>>,
        func: F,
    ) -> DispatchResult<SubscriptionHandle>
    where
        F: Fn(Event<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.dispatcher.subscribe_async(&self.channel, name, func)
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> DispatchResult<bool> {
        self.dispatcher.unsubscribe(&self.channel, handle)
    }

    /// Publish with a payload
    pub async fn publish(&self, payload: P) -> DispatchResult<InvocationOutcome> {
        self.dispatcher.publish(&self.channel, Some(payload)).await
    }

    /// Publish without a payload
    pub async fn fire(&self) -> DispatchResult<InvocationOutcome> {
        self.dispatcher.publish(&self.channel, None).await
    }

    pub fn subscription_count(&self) -> usize {
        self.dispatcher.subscription_count(&self.channel)
    }
}

impl<P> Clone for ChannelPublisher<P> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            channel: self.channel.clone(),
        }
    }
}

impl<P> fmt::Debug for ChannelPublisher<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelPublisher")
            .field("channel", &self.channel)
            .finish()
    }
}
