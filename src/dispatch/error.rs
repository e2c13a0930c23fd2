//! Dispatch Error Types
//!
//! Hard failures surfaced to callers of the dispatcher, plus the failure record
//! captured when a reaction misbehaves during a publish.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dispatch::channel::ChannelId;
use crate::dispatch::registry::SubscriptionHandle;

/// Result type for dispatcher operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors returned by dispatcher operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Operation attempted after `teardown()`
    #[error("Dispatcher has been torn down")]
    Disposed,

    /// Channel has no registry
    #[error("Unknown channel '{0}'")]
    UnknownChannel(ChannelId),

    /// Per-channel subscription cap reached
    #[error("Channel '{channel}' reached its subscription limit ({limit})")]
    SubscriptionLimit { channel: ChannelId, limit: usize },
}

impl DispatchError {
    /// Create an unknown channel error
    pub fn unknown_channel(channel: impl Into<ChannelId>) -> Self {
        Self::UnknownChannel(channel.into())
    }

    /// Create a subscription limit error
    pub fn subscription_limit(channel: impl Into<ChannelId>, limit: usize) -> Self {
        Self::SubscriptionLimit {
            channel: channel.into(),
            limit,
        }
    }

    /// Whether the dispatcher can no longer be used
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Disposed)
    }
}

/// How a reaction failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The reaction returned an error
    Error,
    /// The reaction panicked
    Panicked,
    /// The reaction exceeded its timeout
    TimedOut,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FailureKind::Error => "error",
            FailureKind::Panicked => "panicked",
            FailureKind::TimedOut => "timed out",
        };
        f.write_str(label)
    }
}

/// A failure captured from one reaction during a publish.
///
/// This is data inside an [`InvocationOutcome`](crate::dispatch::InvocationOutcome),
/// never returned as an `Err` from `publish`.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("reaction {kind}: {message}")]
pub struct ReactionFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ReactionFailure {
    /// Create a failure from an error returned by the reaction
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Error,
            message: message.into(),
        }
    }

    /// Create a failure from a caught panic
    pub fn panicked(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Panicked,
            message: message.into(),
        }
    }

    /// Create a timeout failure
    pub fn timed_out(limit: Duration) -> Self {
        Self {
            kind: FailureKind::TimedOut,
            message: format!("exceeded {:?}", limit),
        }
    }
}

/// Raised by [`InvocationOutcome::into_result`](crate::dispatch::InvocationOutcome::into_result)
/// when at least one reaction failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{} of {total} reactions on '{channel}' failed", .failures.len())]
pub struct OutcomeError {
    pub channel: ChannelId,
    pub total: usize,
    pub failures: Vec<(SubscriptionHandle, ReactionFailure)>,
}
