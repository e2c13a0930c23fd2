//! Tests for the Notification Dispatch Core

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::dispatch::{
    DispatchError, Dispatcher, DispatcherConfig, Event, FailureKind, Priority, Reaction,
    SubscribeOptions, SubscriptionHandle,
};

/// Mock reaction that records every event sequence it sees into a shared log
struct MockReaction {
    id: String,
    log: Arc<Mutex<Vec<String>>>,
    should_fail: bool,
}

impl MockReaction {
    fn new(id: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            log: Arc::clone(log),
            should_fail: false,
        })
    }

    fn new_failing(id: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            log: Arc::clone(log),
            should_fail: true,
        })
    }
}

#[async_trait]
impl Reaction<()> for MockReaction {
    async fn react(&self, _event: &Event<()>) -> anyhow::Result<()> {
        self.log.lock().await.push(self.id.clone());
        if self.should_fail {
            anyhow::bail!("{} failed", self.id);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.id
    }
}

fn new_log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

#[tokio::test]
async fn test_dispatcher_creation() {
    let dispatcher = Dispatcher::<()>::new();
    assert!(dispatcher.channels().is_empty());
    assert!(!dispatcher.is_disposed());
    assert_eq!(dispatcher.stats().events_published, 0);
}

#[tokio::test]
async fn test_subscribe_creates_channel_lazily() {
    let dispatcher = Dispatcher::<()>::new();
    let log = new_log();

    assert!(!dispatcher.has_channel("LevelComplete"));
    dispatcher
        .subscribe("LevelComplete", MockReaction::new("save", &log))
        .unwrap();

    assert!(dispatcher.has_channel("LevelComplete"));
    assert_eq!(dispatcher.subscription_count("LevelComplete"), 1);
}

#[tokio::test]
async fn test_declare_is_idempotent() {
    let dispatcher = Dispatcher::<()>::new();
    assert!(dispatcher.declare("LevelComplete").unwrap());
    assert!(!dispatcher.declare("LevelComplete").unwrap());
    assert_eq!(dispatcher.subscription_count("LevelComplete"), 0);
    assert!(dispatcher.handles("LevelComplete").unwrap().is_empty());
}

#[tokio::test]
async fn test_publish_invokes_in_subscription_order() {
    let dispatcher = Dispatcher::<()>::new();
    let log = new_log();

    let handles: Vec<SubscriptionHandle> = ["save", "ui", "analytics"]
        .iter()
        .map(|id| {
            dispatcher
                .subscribe("LevelComplete", MockReaction::new(id, &log))
                .unwrap()
        })
        .collect();

    let outcome = dispatcher.publish("LevelComplete", None).await.unwrap();

    assert_eq!(*log.lock().await, vec!["save", "ui", "analytics"]);
    assert_eq!(outcome.handles(), handles);
    assert!(outcome.all_succeeded());
}

#[tokio::test]
async fn test_level_complete_scenario() {
    let dispatcher = Dispatcher::<()>::new();
    let log = new_log();

    let a = dispatcher
        .subscribe("LevelComplete", MockReaction::new("A", &log))
        .unwrap();
    let b = dispatcher
        .subscribe("LevelComplete", MockReaction::new_failing("B", &log))
        .unwrap();
    let c = dispatcher
        .subscribe("LevelComplete", MockReaction::new("C", &log))
        .unwrap();

    let outcome = dispatcher.publish("LevelComplete", None).await.unwrap();
    let summary: Vec<_> = outcome
        .iter()
        .map(|entry| (entry.handle, entry.is_success()))
        .collect();
    assert_eq!(summary, vec![(a, true), (b, false), (c, true)]);
    assert_eq!(outcome.get(b).unwrap().failure().unwrap().message, "B failed");

    assert!(dispatcher.unsubscribe("LevelComplete", b).unwrap());

    let outcome = dispatcher.publish("LevelComplete", None).await.unwrap();
    let summary: Vec<_> = outcome
        .iter()
        .map(|entry| (entry.handle, entry.is_success()))
        .collect();
    assert_eq!(summary, vec![(a, true), (c, true)]);
    assert_eq!(*log.lock().await, vec!["A", "B", "C", "A", "C"]);
}

#[tokio::test]
async fn test_unsubscribe_unknown_is_false_and_harmless() {
    let dispatcher = Dispatcher::<()>::new();
    let log = new_log();

    let a = dispatcher
        .subscribe("LevelComplete", MockReaction::new("A", &log))
        .unwrap();
    let b = dispatcher
        .subscribe("LevelComplete", MockReaction::new("B", &log))
        .unwrap();

    assert!(dispatcher.unsubscribe("LevelComplete", a).unwrap());
    assert!(!dispatcher.unsubscribe("LevelComplete", a).unwrap());
    assert!(!dispatcher
        .unsubscribe("LevelComplete", SubscriptionHandle::from_raw(42))
        .unwrap());
    assert!(!dispatcher.unsubscribe("NoSuchChannel", b).unwrap());

    assert_eq!(dispatcher.handles("LevelComplete").unwrap(), vec![b]);
    dispatcher.publish("LevelComplete", None).await.unwrap();
    assert_eq!(*log.lock().await, vec!["B"]);
}

#[tokio::test]
async fn test_publish_to_unknown_channel_is_empty() {
    let dispatcher = Dispatcher::<()>::new();
    let outcome = dispatcher.publish("Nobody", None).await.unwrap();
    assert!(outcome.is_empty());
    assert_eq!(outcome.channel().as_str(), "Nobody");
    assert!(!dispatcher.has_channel("Nobody"));
}

#[tokio::test]
async fn test_publish_to_declared_empty_channel_is_empty() {
    let dispatcher = Dispatcher::<()>::new();
    dispatcher.declare("Quiet").unwrap();
    let outcome = dispatcher.publish("Quiet", None).await.unwrap();
    assert_eq!(outcome.len(), 0);
}

#[tokio::test]
async fn test_handles_on_unknown_channel() {
    let dispatcher = Dispatcher::<()>::new();
    let err = dispatcher.handles("Missing").unwrap_err();
    assert_eq!(err, DispatchError::unknown_channel("Missing"));
}

#[tokio::test]
async fn test_failure_isolation_for_every_failure_kind() {
    let config = DispatcherConfig::builder()
        .with_reaction_timeout(Duration::from_millis(20))
        .with_failure_logging(false)
        .build()
        .unwrap();
    let dispatcher = Dispatcher::<()>::with_config(config).unwrap();
    let log = new_log();

    dispatcher
        .subscribe_fn("LevelComplete", "errors", |_| anyhow::bail!("nope"))
        .unwrap();
    dispatcher
        .subscribe_fn("LevelComplete", "panics", |_| panic!("listener bug"))
        .unwrap();
    dispatcher
        .subscribe_async("LevelComplete", "hangs", |_event: Event<()>| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();
    dispatcher
        .subscribe("LevelComplete", MockReaction::new("survivor", &log))
        .unwrap();

    let outcome = dispatcher.publish("LevelComplete", None).await.unwrap();
    let kinds: Vec<_> = outcome.iter().map(|e| e.failure_kind()).collect();
    assert_eq!(
        kinds,
        vec![
            Some(FailureKind::Error),
            Some(FailureKind::Panicked),
            Some(FailureKind::TimedOut),
            None
        ]
    );
    assert_eq!(*log.lock().await, vec!["survivor"]);

    let stats = dispatcher.stats();
    assert_eq!(stats.events_published, 1);
    assert_eq!(stats.reactions_invoked, 4);
    assert_eq!(stats.reactions_failed, 1);
    assert_eq!(stats.reactions_panicked, 1);
    assert_eq!(stats.reactions_timed_out, 1);
    assert_eq!(stats.reactions_succeeded, 1);
}

#[tokio::test]
async fn test_subscription_added_during_publish_waits_for_next_publish() {
    let dispatcher = Dispatcher::<()>::new();
    let log = new_log();
    let late_log = Arc::clone(&log);

    let registrar = dispatcher.clone();
    dispatcher
        .subscribe_async("LevelComplete", "registrar", move |_event: Event<()>| {
            let registrar = registrar.clone();
            let late_log = Arc::clone(&late_log);
            async move {
                registrar.subscribe("LevelComplete", MockReaction::new("late", &late_log))?;
                Ok::<_, anyhow::Error>(())
            }
        })
        .unwrap();

    let first = dispatcher.publish("LevelComplete", None).await.unwrap();
    assert_eq!(first.len(), 1);
    assert!(log.lock().await.is_empty());

    let second = dispatcher.publish("LevelComplete", None).await.unwrap();
    assert_eq!(second.len(), 2);
    assert_eq!(*log.lock().await, vec!["late"]);
}

#[tokio::test]
async fn test_slow_reaction_does_not_block_subscribe() {
    let dispatcher = Dispatcher::<()>::new();
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let (entered_in, release_in) = (Arc::clone(&entered), Arc::clone(&release));
    dispatcher
        .subscribe_async("LevelComplete", "blocking", move |_event: Event<()>| {
            let entered = Arc::clone(&entered_in);
            let release = Arc::clone(&release_in);
            async move {
                entered.notify_one();
                release.notified().await;
                Ok::<_, anyhow::Error>(())
            }
        })
        .unwrap();

    let publisher = dispatcher.clone();
    let in_flight = tokio::spawn(async move { publisher.publish("LevelComplete", None).await });

    entered.notified().await;
    let log = new_log();
    let late = dispatcher
        .subscribe("LevelComplete", MockReaction::new("late", &log))
        .unwrap();
    assert_eq!(dispatcher.subscription_count("LevelComplete"), 2);

    release.notify_one();
    let outcome = in_flight.await.unwrap().unwrap();
    assert_eq!(outcome.len(), 1);
    assert!(outcome.get(late).is_none());
}

#[tokio::test]
async fn test_payload_is_shared_by_reference() {
    #[derive(Debug)]
    struct LevelStats {
        level: u32,
    }

    let dispatcher = Dispatcher::<LevelStats>::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for name in ["save", "ui"] {
        let seen = Arc::clone(&seen);
        dispatcher
            .subscribe_async("LevelComplete", name, move |event: Event<LevelStats>| {
                let seen = Arc::clone(&seen);
                async move {
                    let payload = event.payload_arc().expect("payload");
                    seen.lock().await.push((payload.level, Arc::as_ptr(&payload) as usize));
                    Ok::<_, anyhow::Error>(())
                }
            })
            .unwrap();
    }

    dispatcher
        .publish("LevelComplete", Some(LevelStats { level: 3 }))
        .await
        .unwrap();

    let seen = seen.lock().await;
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, 3);
    assert_eq!(seen[0].1, seen[1].1);
}

#[tokio::test]
async fn test_priority_overrides_registration_order() {
    let dispatcher = Dispatcher::<()>::new();
    let log = new_log();

    dispatcher
        .subscribe("LevelComplete", MockReaction::new("normal", &log))
        .unwrap();
    dispatcher
        .subscribe_with(
            "LevelComplete",
            MockReaction::new("urgent", &log),
            SubscribeOptions::default().with_priority(Priority::HIGH),
        )
        .unwrap();

    dispatcher.publish("LevelComplete", None).await.unwrap();
    assert_eq!(*log.lock().await, vec!["urgent", "normal"]);
}

#[tokio::test]
async fn test_subscription_limit_from_config() {
    let config = DispatcherConfig::builder().with_max_subscriptions(1).build().unwrap();
    let dispatcher = Dispatcher::<()>::with_config(config).unwrap();
    let log = new_log();

    dispatcher
        .subscribe("LevelComplete", MockReaction::new("A", &log))
        .unwrap();
    let err = dispatcher
        .subscribe("LevelComplete", MockReaction::new("B", &log))
        .unwrap_err();
    assert_eq!(err, DispatchError::subscription_limit("LevelComplete", 1));

    // The cap is per channel
    dispatcher
        .subscribe("GameOver", MockReaction::new("C", &log))
        .unwrap();
}

#[tokio::test]
async fn test_teardown_disposes_every_operation() {
    let dispatcher = Dispatcher::<()>::new();
    let log = new_log();
    let handle = dispatcher
        .subscribe("LevelComplete", MockReaction::new("A", &log))
        .unwrap();
    dispatcher
        .subscribe("GameOver", MockReaction::new("B", &log))
        .unwrap();

    assert_eq!(dispatcher.teardown(), 2);
    assert!(dispatcher.is_disposed());
    assert!(dispatcher.channels().is_empty());

    assert_eq!(
        dispatcher
            .subscribe("LevelComplete", MockReaction::new("C", &log))
            .unwrap_err(),
        DispatchError::Disposed
    );
    assert_eq!(
        dispatcher.unsubscribe("LevelComplete", handle).unwrap_err(),
        DispatchError::Disposed
    );
    assert_eq!(
        dispatcher.publish("LevelComplete", None).await.unwrap_err(),
        DispatchError::Disposed
    );
    assert_eq!(dispatcher.declare("Other").unwrap_err(), DispatchError::Disposed);

    // Second teardown releases nothing
    assert_eq!(dispatcher.teardown(), 0);
    assert!(log.lock().await.is_empty());
}

#[tokio::test]
async fn test_teardown_lets_in_flight_publish_finish() {
    let dispatcher = Dispatcher::<()>::new();
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let log = new_log();

    let (entered_in, release_in) = (Arc::clone(&entered), Arc::clone(&release));
    dispatcher
        .subscribe_async("LevelComplete", "gate", move |_event: Event<()>| {
            let entered = Arc::clone(&entered_in);
            let release = Arc::clone(&release_in);
            async move {
                entered.notify_one();
                release.notified().await;
                Ok::<_, anyhow::Error>(())
            }
        })
        .unwrap();
    dispatcher
        .subscribe("LevelComplete", MockReaction::new("after-gate", &log))
        .unwrap();

    let publisher = dispatcher.clone();
    let in_flight = tokio::spawn(async move { publisher.publish("LevelComplete", None).await });

    entered.notified().await;
    assert_eq!(dispatcher.teardown(), 2);
    release.notify_one();

    let outcome = in_flight.await.unwrap().unwrap();
    assert_eq!(outcome.len(), 2);
    assert!(outcome.all_succeeded());
    assert_eq!(*log.lock().await, vec!["after-gate"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_publishes_preserve_per_call_order() {
    let dispatcher = Dispatcher::<usize>::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for position in 0..5usize {
        let seen = Arc::clone(&seen);
        dispatcher
            .subscribe_async("tick", format!("r{}", position), move |event: Event<usize>| {
                let seen = Arc::clone(&seen);
                async move {
                    let call = *event.payload().expect("payload");
                    seen.lock().await.push((call, position));
                    tokio::task::yield_now().await;
                    Ok::<_, anyhow::Error>(())
                }
            })
            .unwrap();
    }

    let mut tasks = Vec::new();
    for call in 0..8usize {
        let dispatcher = dispatcher.clone();
        tasks.push(tokio::spawn(async move { dispatcher.publish("tick", Some(call)).await }));
    }
    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome.len(), 5);
    }

    let seen = seen.lock().await;
    for call in 0..8usize {
        let order: Vec<_> = seen
            .iter()
            .filter(|(c, _)| *c == call)
            .map(|(_, position)| *position)
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }
    assert_eq!(dispatcher.stats().events_published, 8);
}

#[tokio::test]
async fn test_clear_stats() {
    let dispatcher = Dispatcher::<()>::new();
    dispatcher.subscribe_fn("LevelComplete", "ok", |_| Ok(())).unwrap();
    dispatcher.publish("LevelComplete", None).await.unwrap();
    assert_eq!(dispatcher.stats().reactions_succeeded, 1);

    dispatcher.clear_stats();
    assert_eq!(dispatcher.stats(), Default::default());
}

#[tokio::test]
async fn test_sequence_numbers_increase() {
    let dispatcher = Dispatcher::<()>::new();
    dispatcher.declare("LevelComplete").unwrap();
    let first = dispatcher.publish("LevelComplete", None).await.unwrap();
    let second = dispatcher.publish("Unknown", None).await.unwrap();
    assert_eq!(first.sequence(), 1);
    assert_eq!(second.sequence(), 2);
}
