//! dispatchcore
//!
//! In-process notification dispatch: independent reactions subscribe to a
//! named channel, a publisher fires the channel once, and every reaction runs
//! in subscription order with its failure captured instead of propagated.
//!
//! - [`dispatch`]: the dispatcher, listener registries and invocation runner
//! - [`config`]: TOML configuration discovery
//! - [`logging`]: a `log` backend with text and JSON output

pub mod config;
pub mod dispatch;
pub mod logging;

pub use dispatch::{
    ChannelId, ChannelPublisher, DispatchError, DispatchResult, Dispatcher, DispatcherConfig, Event,
    InvocationOutcome, Reaction, SubscriptionHandle,
};
