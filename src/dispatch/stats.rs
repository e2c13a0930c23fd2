//! Delivery statistics

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::dispatch::error::FailureKind;
use crate::dispatch::events::ReactionOutcome;

/// Statistics about notification delivery
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    /// Total publish calls that reached the runner or found no channel
    pub events_published: u64,

    /// Total reactions invoked across all publishes
    pub reactions_invoked: u64,

    pub reactions_succeeded: u64,

    /// Reactions that returned an error
    pub reactions_failed: u64,

    pub reactions_panicked: u64,

    pub reactions_timed_out: u64,

    /// Cumulative reaction run time in microseconds
    pub total_reaction_time_us: u64,
}

impl DispatchStats {
    /// Failures of any kind
    pub fn total_failures(&self) -> u64 {
        self.reactions_failed + self.reactions_panicked + self.reactions_timed_out
    }

    /// Average reaction run time in microseconds
    pub fn avg_reaction_time_us(&self) -> u64 {
        if self.reactions_invoked == 0 {
            0
        } else {
            self.total_reaction_time_us / self.reactions_invoked
        }
    }
}

/// Lock-free counters shared by concurrent publishes
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    events_published: AtomicU64,
    reactions_invoked: AtomicU64,
    reactions_succeeded: AtomicU64,
    reactions_failed: AtomicU64,
    reactions_panicked: AtomicU64,
    reactions_timed_out: AtomicU64,
    total_reaction_time_us: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn record_publish(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record(&self, outcome: &ReactionOutcome) {
        self.reactions_invoked.fetch_add(1, Ordering::Relaxed);
        self.total_reaction_time_us
            .fetch_add(outcome.elapsed.as_micros() as u64, Ordering::Relaxed);

        let counter = match outcome.failure_kind() {
            None => &self.reactions_succeeded,
            Some(FailureKind::Error) => &self.reactions_failed,
            Some(FailureKind::Panicked) => &self.reactions_panicked,
            Some(FailureKind::TimedOut) => &self.reactions_timed_out,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            events_published: self.events_published.load(Ordering::Relaxed),
            reactions_invoked: self.reactions_invoked.load(Ordering::Relaxed),
            reactions_succeeded: self.reactions_succeeded.load(Ordering::Relaxed),
            reactions_failed: self.reactions_failed.load(Ordering::Relaxed),
            reactions_panicked: self.reactions_panicked.load(Ordering::Relaxed),
            reactions_timed_out: self.reactions_timed_out.load(Ordering::Relaxed),
            total_reaction_time_us: self.total_reaction_time_us.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn clear(&self) {
        for counter in [
            &self.events_published,
            &self.reactions_invoked,
            &self.reactions_succeeded,
            &self.reactions_failed,
            &self.reactions_panicked,
            &self.reactions_timed_out,
            &self.total_reaction_time_us,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
