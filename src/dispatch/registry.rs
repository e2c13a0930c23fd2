//! Listener Registry
//!
//! Holds the ordered subscriptions of one channel. Mutations and snapshot
//! reads are serialized by a single mutex; a [`Snapshot`] is an owned copy
//! and needs no locking once taken.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::dispatch::channel::ChannelId;
use crate::dispatch::error::{DispatchError, DispatchResult};
use crate::dispatch::traits::{Priority, ReactionRef, SubscribeOptions};

/// Opaque handle identifying one registration on a channel.
///
/// Handles are never reused for the lifetime of their channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// One listener's registration
pub struct Subscription<P> {
    handle: SubscriptionHandle,
    priority: Priority,
    timeout: Option<Duration>,
    reaction: ReactionRef<P>,
}

impl<P> Subscription<P> {
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn reaction(&self) -> &ReactionRef<P> {
        &self.reaction
    }
}

impl<P> Clone for Subscription<P> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle,
            priority: self.priority,
            timeout: self.timeout,
            reaction: Arc::clone(&self.reaction),
        }
    }
}

/// Point-in-time, invocation-ordered view of a channel's subscriptions
pub struct Snapshot<P> {
    channel: ChannelId,
    entries: Vec<Subscription<P>>,
}

impl<P> Snapshot<P> {
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Subscription<P>> {
        self.entries.iter()
    }

    pub fn handles(&self) -> Vec<SubscriptionHandle> {
        self.entries.iter().map(Subscription::handle).collect()
    }
}

/// Ordered set of subscriptions for one channel
pub struct ListenerRegistry<P> {
    channel: ChannelId,
    entries: Mutex<Vec<Subscription<P>>>,
    next_id: AtomicU64,
    max_subscriptions: Option<usize>,
}

impl<P> ListenerRegistry<P> {
    pub fn new(channel: impl Into<ChannelId>) -> Self {
        Self::with_limit(channel, None)
    }

    /// Create a registry that refuses registrations beyond `max_subscriptions`
    pub fn with_limit(channel: impl Into<ChannelId>, max_subscriptions: Option<usize>) -> Self {
        Self {
            channel: channel.into(),
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            max_subscriptions,
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Append a reaction with default options
    pub fn add(&self, reaction: ReactionRef<P>) -> DispatchResult<SubscriptionHandle> {
        self.add_with(reaction, SubscribeOptions::default())
    }

    /// Insert a reaction after every entry of equal or higher priority
    pub fn add_with(
        &self,
        reaction: ReactionRef<P>,
        options: SubscribeOptions,
    ) -> DispatchResult<SubscriptionHandle> {
        let mut entries = self.entries.lock();

        if let Some(limit) = self.max_subscriptions {
            if entries.len() >= limit {
                return Err(DispatchError::subscription_limit(&self.channel, limit));
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = SubscriptionHandle(id);
        let position = entries
            .iter()
            .position(|existing| existing.priority < options.priority)
            .unwrap_or(entries.len());

        entries.insert(
            position,
            Subscription {
                handle,
                priority: options.priority,
                timeout: options.timeout,
                reaction,
            },
        );

        debug!(
            "Registered {} on '{}' at position {} of {}",
            handle,
            self.channel,
            position,
            entries.len()
        );
        Ok(handle)
    }

    /// Remove a subscription; false if it was never registered or already removed
    pub fn remove(&self, handle: SubscriptionHandle) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter().position(|entry| entry.handle == handle) {
            Some(index) => {
                entries.remove(index);
                debug!("Removed {} from '{}'", handle, self.channel);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> Snapshot<P> {
        let entries = self.entries.lock().clone();
        Snapshot {
            channel: self.channel.clone(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Handles in invocation order
    pub fn handles(&self) -> Vec<SubscriptionHandle> {
        self.entries.lock().iter().map(Subscription::handle).collect()
    }

    /// Drop every subscription, returning how many were released
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let released = entries.len();
        entries.clear();
        released
    }
}
