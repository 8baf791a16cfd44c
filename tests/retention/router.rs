use slack_janitor::retention::{EventRouter, RouterExit};
use slack_janitor::transport::slack::SlackEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::fake_slack::{CHANNEL, live_message};

#[tokio::test]
async fn registering_twice_delivers_once_to_latest() {
    let (feed_tx, feed_rx) = mpsc::channel(8);
    let (router, handle) = EventRouter::new(feed_rx, 4, CancellationToken::new());

    let (first_tx, mut first_rx) = mpsc::channel(8);
    let (second_tx, mut second_rx) = mpsc::channel(8);
    handle.register(CHANNEL, first_tx).await.unwrap();
    handle.register(CHANNEL, second_tx).await.unwrap();
    let task = tokio::spawn(router.run());

    feed_tx
        .send(SlackEvent::Connected {
            connection_count: 1,
        })
        .await
        .unwrap();
    feed_tx
        .send(SlackEvent::Message(live_message(1)))
        .await
        .unwrap();
    drop(feed_tx);
    assert_eq!(task.await.unwrap(), RouterExit::FeedClosed);

    assert_eq!(second_rx.recv().await.map(|m| m.ts), Some(live_message(1).ts));
    assert!(second_rx.recv().await.is_none());
    assert!(first_rx.recv().await.is_none());
}

#[tokio::test]
async fn lifecycle_and_unknown_events_are_ignored() {
    let (feed_tx, feed_rx) = mpsc::channel(8);
    let (router, handle) = EventRouter::new(feed_rx, 4, CancellationToken::new());
    let (events_tx, mut events_rx) = mpsc::channel(8);
    handle.register(CHANNEL, events_tx).await.unwrap();
    let task = tokio::spawn(router.run());

    for event in [
        SlackEvent::Hello,
        SlackEvent::LatencyReport(std::time::Duration::from_millis(40)),
        SlackEvent::ProtocolError {
            code: 1,
            message: "Socket URL has expired".into(),
        },
        SlackEvent::Other("presence_change".into()),
        SlackEvent::Message(live_message(2)),
    ] {
        feed_tx.send(event).await.unwrap();
    }
    drop(feed_tx);

    assert_eq!(task.await.unwrap(), RouterExit::FeedClosed);
    assert_eq!(events_rx.recv().await.map(|m| m.ts), Some(live_message(2).ts));
    assert!(events_rx.recv().await.is_none());
}
