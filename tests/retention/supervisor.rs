use std::sync::Arc;
use std::time::Duration;

use slack_janitor::config::ChannelMonitorConfig;
use slack_janitor::platform::daemon::{ShutdownOutcome, StopReason, Supervisor, SupervisorSettings};
use slack_janitor::transport::slack::SlackEvent;

use super::fake_slack::{CHANNEL, FakeSlack, ScriptedFeed, eventually, live_message, ts};

fn settings() -> SupervisorSettings {
    SupervisorSettings {
        router_buffer: 4,
        channel_buffer: 16,
        shutdown_timeout: Duration::from_secs(1),
    }
}

fn channel(retention_size: usize, monitor_size: bool) -> ChannelMonitorConfig {
    ChannelMonitorConfig {
        channel_id: CHANNEL.into(),
        channel_name: "daq-alerts".into(),
        retention_size,
        monitor_size,
        log_messages: false,
    }
}

#[tokio::test]
async fn monitored_channel_trims_live_traffic() {
    let slack = FakeSlack::with_history(10);
    let (feed, script) = ScriptedFeed::new();
    let mut supervisor = Supervisor::new(Arc::new(slack.clone()), Box::new(feed), settings());

    supervisor.monitor_channel(&channel(5, true)).await.unwrap();
    assert!(supervisor.router_started());

    // Backfill keeps six (five plus one for the first live message).
    assert!(eventually(|| slack.deleted().len() == 4).await);
    script
        .send(SlackEvent::Connected {
            connection_count: 1,
        })
        .await
        .unwrap();
    slack.post(ts(10));
    script
        .send(SlackEvent::Message(live_message(10)))
        .await
        .unwrap();

    assert!(eventually(|| slack.deleted().len() == 5).await);
    assert_eq!(slack.deleted().last(), Some(&ts(4)));
    assert_eq!(slack.remaining(), (5..11).map(ts).collect::<Vec<_>>());

    assert_eq!(supervisor.shutdown().await, ShutdownOutcome::Completed);
}

#[tokio::test]
async fn revoked_credentials_stop_the_supervisor() {
    let slack = FakeSlack::with_history(3);
    let (feed, script) = ScriptedFeed::new();
    let mut supervisor = Supervisor::new(Arc::new(slack), Box::new(feed), settings());
    supervisor.monitor_channel(&channel(3, true)).await.unwrap();

    script.send(SlackEvent::InvalidAuth).await.unwrap();
    let reason = tokio::time::timeout(
        Duration::from_secs(2),
        supervisor.run_until_stopped(std::future::pending()),
    )
    .await
    .unwrap();

    let StopReason::CannotContinue { worker, .. } = reason else {
        panic!("expected the router to give up, got {reason:?}");
    };
    assert_eq!(worker, "event-router");
    assert_eq!(supervisor.shutdown().await, ShutdownOutcome::Completed);
}

#[tokio::test]
async fn cleanup_only_channels_finish_without_a_router() {
    let slack = FakeSlack::with_history(12);
    let (feed, _script) = ScriptedFeed::new();
    let mut supervisor = Supervisor::new(Arc::new(slack.clone()), Box::new(feed), settings());

    supervisor.monitor_channel(&channel(2, false)).await.unwrap();
    assert!(!supervisor.router_started());
    assert_eq!(supervisor.worker_count(), 1);

    let reason = tokio::time::timeout(
        Duration::from_secs(2),
        supervisor.run_until_stopped(std::future::pending()),
    )
    .await
    .unwrap();

    assert_eq!(reason, StopReason::AllFinished);
    assert_eq!(slack.remaining(), vec![ts(10), ts(11)]);
}

#[tokio::test]
async fn interrupt_shuts_down_waiting_workers() {
    let slack = FakeSlack::with_history(2);
    let (feed, _script) = ScriptedFeed::new();
    let mut supervisor = Supervisor::new(Arc::new(slack), Box::new(feed), settings());
    supervisor.monitor_channel(&channel(5, true)).await.unwrap();
    let cancel = supervisor.cancellation_token();

    let reason = supervisor.run_until_stopped(async {}).await;

    assert_eq!(reason, StopReason::Interrupted);
    assert_eq!(supervisor.shutdown().await, ShutdownOutcome::Completed);
    assert!(cancel.is_cancelled());
}
