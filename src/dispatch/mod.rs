//! Notification Dispatch Core
//!
//! Registers, orders and invokes independent reactions to a single occurring
//! event, with per-reaction failure isolation.
//!
//! # Architecture
//!
//! - **ListenerRegistry**: ordered subscriptions of one channel
//! - **Dispatcher**: channel → registry map; subscribe / unsubscribe / publish / teardown
//! - **InvocationRunner**: runs one snapshot, capturing errors, panics and timeouts
//! - **Event / InvocationOutcome**: what reactions see, and what the publisher gets back
//!
//! ```text
//! subscribe("LevelComplete", A) ─┐
//! subscribe("LevelComplete", B) ─┼─► ListenerRegistry [A, B, C]
//! subscribe("LevelComplete", C) ─┘            │
//!                                         snapshot()
//! publish("LevelComplete") ──────────────────►│
//!                                    InvocationRunner
//!                               A ─► ok   B ─► error   C ─► ok
//!                                             │
//!                          InvocationOutcome [A:ok, B:failed, C:ok]
//! ```
//!
//! # Example Usage
//!
//! ```
//! use dispatchcore::dispatch::Dispatcher;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = Dispatcher::<()>::new();
//! dispatcher.subscribe_fn("LevelComplete", "save", |_| Ok(()))?;
//! dispatcher.subscribe_fn("LevelComplete", "ui", |_| anyhow::bail!("display lost"))?;
//!
//! let outcome = dispatcher.publish("LevelComplete", None).await?;
//! assert_eq!(outcome.len(), 2);
//! assert_eq!(outcome.failure_count(), 1);
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod events;
pub mod manager;
pub mod publisher;
pub mod registry;
pub mod runner;
pub mod stats;
pub mod traits;

#[cfg(test)]
mod tests;

// Re-export core types for convenience
pub use channel::ChannelId;
pub use config::{ConfigError, DispatcherConfig, DispatcherConfigBuilder};
pub use error::{DispatchError, DispatchResult, FailureKind, OutcomeError, ReactionFailure};
pub use events::{Event, InvocationOutcome, ReactionOutcome};
pub use manager::Dispatcher;
pub use publisher::ChannelPublisher;
pub use registry::{ListenerRegistry, Snapshot, Subscription, SubscriptionHandle};
pub use runner::InvocationRunner;
pub use stats::DispatchStats;
pub use traits::{AsyncFnReaction, FnReaction, Priority, Reaction, ReactionRef, SubscribeOptions};
