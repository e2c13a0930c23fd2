//! Publish Events and Invocation Outcomes
//!
//! [`Event`] is the ephemeral value handed to every reaction during one publish.
//! [`InvocationOutcome`] is what the publisher gets back: one entry per
//! reaction that was in the snapshot, in invocation order.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::dispatch::channel::ChannelId;
use crate::dispatch::error::{FailureKind, OutcomeError, ReactionFailure};
use crate::dispatch::registry::SubscriptionHandle;

/// One occurrence of a channel's event.
///
/// The payload is shared, not copied: every reaction in the publish sees the
/// same value by reference.
pub struct Event<P> {
    channel: ChannelId,
    sequence: u64,
    published_at: SystemTime,
    payload: Option<Arc<P>>,
}

impl<P> Event<P> {
    pub(crate) fn new(channel: ChannelId, sequence: u64, payload: Option<P>) -> Self {
        Self {
            channel,
            sequence,
            published_at: SystemTime::now(),
            payload: payload.map(Arc::new),
        }
    }

    /// Channel this event was published on
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Dispatcher-wide publish sequence number, starting at 1
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn published_at(&self) -> SystemTime {
        self.published_at
    }

    /// Borrow the payload, if the publisher supplied one
    pub fn payload(&self) -> Option<&P> {
        self.payload.as_deref()
    }

    /// Shared handle to the payload, for reactions that need to keep it
    pub fn payload_arc(&self) -> Option<Arc<P>> {
        self.payload.clone()
    }
}

// Manual impls so `P` needs neither `Clone` nor `Debug`.
impl<P> Clone for Event<P> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
            sequence: self.sequence,
            published_at: self.published_at,
            payload: self.payload.clone(),
        }
    }
}

impl<P> fmt::Debug for Event<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("channel", &self.channel)
            .field("sequence", &self.sequence)
            .field("published_at", &self.published_at)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

/// Result of invoking one reaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactionOutcome {
    pub handle: SubscriptionHandle,
    pub name: String,
    pub elapsed: Duration,
    pub result: Result<(), ReactionFailure>,
}

impl ReactionOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn failure(&self) -> Option<&ReactionFailure> {
        self.result.as_ref().err()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure().map(|f| f.kind)
    }
}

/// Ordered per-reaction record of one publish call.
///
/// Always complete: its length equals the number of subscriptions captured in
/// the snapshot, regardless of how many reactions failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationOutcome {
    channel: ChannelId,
    sequence: u64,
    entries: Vec<ReactionOutcome>,
}

impl InvocationOutcome {
    pub(crate) fn new(channel: ChannelId, sequence: u64, entries: Vec<ReactionOutcome>) -> Self {
        Self {
            channel,
            sequence,
            entries,
        }
    }

    /// Outcome of publishing to a channel nobody subscribed to
    pub(crate) fn empty(channel: ChannelId, sequence: u64) -> Self {
        Self::new(channel, sequence, Vec::new())
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Sequence number of the publish that produced this outcome
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ReactionOutcome] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReactionOutcome> {
        self.entries.iter()
    }

    /// Look up the entry for a specific subscription
    pub fn get(&self, handle: SubscriptionHandle) -> Option<&ReactionOutcome> {
        self.entries.iter().find(|entry| entry.handle == handle)
    }

    /// True when every reaction succeeded (vacuously true when empty)
    pub fn all_succeeded(&self) -> bool {
        self.entries.iter().all(ReactionOutcome::is_success)
    }

    pub fn success_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.entries.len() - self.success_count()
    }

    /// Failed entries, in invocation order
    pub fn failures(&self) -> impl Iterator<Item = (SubscriptionHandle, &ReactionFailure)> + '_ {
        self.entries
            .iter()
            .filter_map(|e| e.failure().map(|failure| (e.handle, failure)))
    }

    /// Handles in invocation order
    pub fn handles(&self) -> Vec<SubscriptionHandle> {
        self.entries.iter().map(|e| e.handle).collect()
    }

    /// Convert into a `Result` for callers that treat any reaction failure as an error
    pub fn into_result(self) -> Result<Self, OutcomeError> {
        if self.all_succeeded() {
            return Ok(self);
        }

        let failures = self
            .failures()
            .map(|(handle, failure)| (handle, failure.clone()))
            .collect();
        Err(OutcomeError {
            channel: self.channel.clone(),
            total: self.entries.len(),
            failures,
        })
    }
}

impl IntoIterator for InvocationOutcome {
    type Item = ReactionOutcome;
    type IntoIter = std::vec::IntoIter<ReactionOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a InvocationOutcome {
    type Item = &'a ReactionOutcome;
    type IntoIter = std::slice::Iter<'a, ReactionOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
