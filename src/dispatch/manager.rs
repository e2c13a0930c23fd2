//! Dispatcher
//!
//! Central coordinator for the notification core. Maps channel identifiers to
//! their [`ListenerRegistry`] and exposes subscribe / unsubscribe / publish /
//! teardown.
//!
//! Locking: the channel map sits behind a `RwLock`, each registry behind its own
//! mutex. Both are released before any reaction runs, so a slow reaction never
//! stalls registrations. `teardown()` flips the disposed flag while holding the
//! map's write lock; every other operation checks the flag while holding the
//! map lock, so nothing can register after teardown completes.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info};
use parking_lot::RwLock;

use crate::dispatch::channel::ChannelId;
use crate::dispatch::config::{ConfigError, DispatcherConfig};
use crate::dispatch::error::{DispatchError, DispatchResult};
use crate::dispatch::events::{Event, InvocationOutcome};
use crate::dispatch::publisher::ChannelPublisher;
use crate::dispatch::registry::{ListenerRegistry, SubscriptionHandle};
use crate::dispatch::runner::InvocationRunner;
use crate::dispatch::stats::{DispatchStats, StatsRecorder};
use crate::dispatch::traits::{AsyncFnReaction, FnReaction, ReactionRef, SubscribeOptions};

struct Inner<P> {
    channels: RwLock<HashMap<ChannelId, ListenerRegistry<P>>>,
    disposed: AtomicBool,
    sequence: AtomicU64,
    runner: InvocationRunner,
    config: DispatcherConfig,
    stats: StatsRecorder,
}

/// Notification dispatcher for payloads of type `P`.
///
/// Cloning yields another handle to the same dispatcher.
pub struct Dispatcher<P = ()> {
    inner: Arc<Inner<P>>,
}

impl<P> Dispatcher<P>
where
    P: Send + Sync + 'static,
{
    /// Create a dispatcher with default configuration
    pub fn new() -> Self {
        Self::build(DispatcherConfig::default())
    }

    /// Create a dispatcher from a validated configuration
    pub fn with_config(config: DispatcherConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: DispatcherConfig) -> Self {
        let runner = InvocationRunner::new(config.reaction_timeout())
            .with_failure_logging(config.log_failures);
        Self {
            inner: Arc::new(Inner {
                channels: RwLock::new(HashMap::new()),
                disposed: AtomicBool::new(false),
                sequence: AtomicU64::new(0),
                runner,
                config,
                stats: StatsRecorder::default(),
            }),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> DispatchResult<()> {
        if self.is_disposed() {
            Err(DispatchError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Run `f` against the channel's registry, creating it if absent
    fn with_registry<R>(
        &self,
        channel: ChannelId,
        f: impl FnOnce(&ListenerRegistry<P>) -> R,
    ) -> DispatchResult<R> {
        {
            let channels = self.inner.channels.read();
            self.ensure_live()?;
            if let Some(registry) = channels.get(&channel) {
                return Ok(f(registry));
            }
        }

        let mut channels = self.inner.channels.write();
        self.ensure_live()?;
        let limit = self.inner.config.max_subscriptions_per_channel;
        let registry = channels.entry(channel.clone()).or_insert_with(|| {
            debug!("Created channel '{}'", channel);
            ListenerRegistry::with_limit(channel, limit)
        });
        Ok(f(registry))
    }

    /// Explicitly declare a channel. Returns false if it already existed.
    pub fn declare(&self, channel: impl Into<ChannelId>) -> DispatchResult<bool> {
        let channel = channel.into();
        let mut channels = self.inner.channels.write();
        self.ensure_live()?;
        if channels.contains_key(&channel) {
            return Ok(false);
        }

        debug!("Declared channel '{}'", channel);
        let limit = self.inner.config.max_subscriptions_per_channel;
        channels.insert(channel.clone(), ListenerRegistry::with_limit(channel, limit));
        Ok(true)
    }

    /// Handle bound to one channel, declaring it if needed
    pub fn channel(&self, channel: impl Into<ChannelId>) -> DispatchResult<ChannelPublisher<P>> {
        let channel = channel.into();
        self.declare(channel.clone())?;
        Ok(ChannelPublisher::new(self.clone(), channel))
    }

    /// Subscribe a reaction at the end of the channel's invocation order
    pub fn subscribe(
        &self,
        channel: impl Into<ChannelId>,
        reaction: ReactionRef<P>,
    ) -> DispatchResult<SubscriptionHandle> {
        self.subscribe_with(channel, reaction, SubscribeOptions::default())
    }

    /// Subscribe with an explicit priority and/or timeout
    pub fn subscribe_with(
        &self,
        channel: impl Into<ChannelId>,
        reaction: ReactionRef<P>,
        options: SubscribeOptions,
    ) -> DispatchResult<SubscriptionHandle> {
        self.with_registry(channel.into(), |registry| registry.add_with(reaction, options))?
    }

    /// Subscribe a synchronous closure
    pub fn subscribe_fn<F>(
        &self,
        channel: impl Into<ChannelId>,
        name: impl Into<Cow<'static, str>>,
        func: F,
    ) -> DispatchResult<SubscriptionHandle>
    where
        F: Fn(&Event<P>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe(channel, FnReaction::arc(name, func))
    }

    /// Subscribe a closure returning a future
    pub fn subscribe_async<F, Fut>(
        &self,
        channel: impl Into<ChannelId>,
        name: impl Into<Cow<'static, str>>,
        func: F,
    ) -> DispatchResult<SubscriptionHandle>
    where
        F: Fn(Event<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.subscribe(channel, AsyncFnReaction::arc(name, func))
    }

    /// Remove a subscription. Unknown channels and handles yield `Ok(false)`.
    pub fn unsubscribe(
        &self,
        channel: impl AsRef<str>,
        handle: SubscriptionHandle,
    ) -> DispatchResult<bool> {
        let channels = self.inner.channels.read();
        self.ensure_live()?;
        Ok(channels
            .get(channel.as_ref())
            .map(|registry| registry.remove(handle))
            .unwrap_or(false))
    }

    /// Publish one event on `channel`.
    ///
    /// Reactions run in snapshot order with failures captured per entry; the
    /// only error is [`DispatchError::Disposed`]. Publishing to a channel with
    /// no registry is a no-op that yields an empty outcome.
    pub async fn publish(
        &self,
        channel: impl Into<ChannelId>,
        payload: Option<P>,
    ) -> DispatchResult<InvocationOutcome> {
        let channel = channel.into();
        let snapshot = {
            let channels = self.inner.channels.read();
            self.ensure_live()?;
            channels.get(&channel).map(ListenerRegistry::snapshot)
        };

        let sequence = self.inner.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.stats.record_publish();

        match snapshot {
            Some(snapshot) => {
                let event = Event::new(channel, sequence, payload);
                let outcome = self
                    .inner
                    .runner
                    .run_recording(&snapshot, &event, Some(&self.inner.stats))
                    .await;
                Ok(outcome)
            }
            None => {
                debug!("Publish #{} on unknown channel '{}' ignored", sequence, channel);
                Ok(InvocationOutcome::empty(channel, sequence))
            }
        }
    }

    /// Release every registry. Later subscribe / unsubscribe / publish calls
    /// fail with [`DispatchError::Disposed`]; publishes that already took
    /// their snapshot run to completion. Returns the number of subscriptions
    /// released; calling it again releases nothing.
    pub fn teardown(&self) -> usize {
        let mut channels = self.inner.channels.write();
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return 0;
        }

        let channel_count = channels.len();
        let released: usize = channels.drain().map(|(_, registry)| registry.clear()).sum();
        info!(
            "Dispatcher torn down ({} channels, {} subscriptions released)",
            channel_count, released
        );
        released
    }

    /// Declared channels, sorted by name
    pub fn channels(&self) -> Vec<ChannelId> {
        let mut names: Vec<_> = self.inner.channels.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_channel(&self, channel: impl AsRef<str>) -> bool {
        self.inner.channels.read().contains_key(channel.as_ref())
    }

    /// Number of live subscriptions on a channel (0 if unknown)
    pub fn subscription_count(&self, channel: impl AsRef<str>) -> usize {
        self.inner
            .channels
            .read()
            .get(channel.as_ref())
            .map(ListenerRegistry::len)
            .unwrap_or(0)
    }

    /// Handles on a channel, in invocation order
    pub fn handles(&self, channel: impl AsRef<str>) -> DispatchResult<Vec<SubscriptionHandle>> {
        let channels = self.inner.channels.read();
        self.ensure_live()?;
        channels
            .get(channel.as_ref())
            .map(ListenerRegistry::handles)
            .ok_or_else(|| DispatchError::unknown_channel(channel.as_ref()))
    }

    /// Get delivery statistics
    pub fn stats(&self) -> DispatchStats {
        self.inner.stats.snapshot()
    }

    pub fn clear_stats(&self) {
        self.inner.stats.clear();
    }
}

impl<P> Default for Dispatcher<P>
where
    P: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for Dispatcher<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> fmt::Debug for Dispatcher<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels = self.inner.channels.read();
        f.debug_struct("Dispatcher")
            .field("channels", &channels.len())
            .field("disposed", &self.inner.disposed.load(Ordering::Acquire))
            .field("config", &self.inner.config)
            .finish()
    }
}
