//! Invocation Runner
//!
//! Executes one snapshot for one publish call. Every reaction runs inside a
//! guarded boundary: returned errors, panics and timeouts are all captured as
//! [`ReactionFailure`] entries, and the pass always continues to the next
//! entry. The returned [`InvocationOutcome`] is never partial.
//!
//! ```text
//! snapshot[0] ──► guard(react) ──► Ok / Error / Panicked / TimedOut
//! snapshot[1] ──► guard(react) ──► ...
//!     ...
//! snapshot[n] ──► guard(react) ──► ...
//!                                   └──► InvocationOutcome (n + 1 entries)
//! ```
//!
//! Panic capture uses `AssertUnwindSafe`: a reaction that panics while holding
//! its own `Mutex` may leave that state poisoned or inconsistent. The
//! dispatcher's internal state is never borrowed across the call.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::FutureExt;
use log::{debug, warn};

use crate::dispatch::error::ReactionFailure;
use crate::dispatch::events::{Event, InvocationOutcome, ReactionOutcome};
use crate::dispatch::registry::{Snapshot, Subscription};
use crate::dispatch::stats::StatsRecorder;

/// Runs snapshots under the failure-isolation policy
#[derive(Debug, Clone)]
pub struct InvocationRunner {
    default_timeout: Option<Duration>,
    log_failures: bool,
}

impl InvocationRunner {
    pub fn new(default_timeout: Option<Duration>) -> Self {
        Self {
            default_timeout,
            log_failures: true,
        }
    }

    /// Toggle warn-level logging of captured failures
    pub fn with_failure_logging(mut self, enabled: bool) -> Self {
        self.log_failures = enabled;
        self
    }

    /// Invoke every entry of `snapshot`, in order, with `event`
    pub async fn run<P>(&self, snapshot: &Snapshot<P>, event: &Event<P>) -> InvocationOutcome
    where
        P: Send + Sync + 'static,
    {
        self.run_recording(snapshot, event, None).await
    }

    pub(crate) async fn run_recording<P>(
        &self,
        snapshot: &Snapshot<P>,
        event: &Event<P>,
        stats: Option<&StatsRecorder>,
    ) -> InvocationOutcome
    where
        P: Send + Sync + 'static,
    {
        let start = Instant::now();
        let mut entries = Vec::with_capacity(snapshot.len());

        for subscription in snapshot.iter() {
            let outcome = self.invoke(subscription, event).await;
            if let Some(stats) = stats {
                stats.record(&outcome);
            }
            entries.push(outcome);
        }

        let outcome = InvocationOutcome::new(event.channel().clone(), event.sequence(), entries);
        debug!(
            "Published #{} on '{}' to {} reactions ({} ok, {} failed) in {:?}",
            event.sequence(),
            event.channel(),
            outcome.len(),
            outcome.success_count(),
            outcome.failure_count(),
            start.elapsed()
        );
        outcome
    }

    async fn invoke<P>(&self, subscription: &Subscription<P>, event: &Event<P>) -> ReactionOutcome
    where
        P: Send + Sync + 'static,
    {
        let reaction = subscription.reaction();
        let timeout = subscription.timeout().or(self.default_timeout);
        // `react` itself is called inside the guard; impls may panic before returning a future
        let guarded = AssertUnwindSafe(async { reaction.react(event).await }).catch_unwind();

        let start = Instant::now();
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(caught) => flatten(caught),
                Err(_) => Err(ReactionFailure::timed_out(limit)),
            },
            None => flatten(guarded.await),
        };
        let elapsed = start.elapsed();

        if let Err(failure) = &result {
            if self.log_failures {
                warn!(
                    "Reaction '{}' ({}) on '{}' {}: {}",
                    reaction.name(),
                    subscription.handle(),
                    event.channel(),
                    failure.kind,
                    failure.message
                );
            }
        }

        ReactionOutcome {
            handle: subscription.handle(),
            name: reaction.name().to_string(),
            elapsed,
            result,
        }
    }
}

impl Default for InvocationRunner {
    fn default() -> Self {
        Self::new(None)
    }
}

fn flatten(
    caught: Result<anyhow::Result<()>, Box<dyn Any + Send>>,
) -> Result<(), ReactionFailure> {
    match caught {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ReactionFailure::error(format!("{:#}", e))),
        Err(panic) => Err(ReactionFailure::panicked(panic_message(panic.as_ref()))),
    }
}

/// Best-effort text of a panic payload
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
