use std::sync::Arc;

use slack_janitor::error::RetentionError;
use slack_janitor::retention::{BoundedHistoryQueue, HistoryBackfiller, ReadySignal};

use super::fake_slack::{CHANNEL, FakeSlack, ts};

fn backfiller(
    slack: &FakeSlack,
    retention: usize,
) -> (HistoryBackfiller, BoundedHistoryQueue, ReadySignal) {
    let queue = BoundedHistoryQueue::new(CHANNEL);
    let ready = ReadySignal::new();
    let backfiller =
        HistoryBackfiller::new(Arc::new(slack.clone()), queue.clone(), ready.clone(), retention);
    (backfiller, queue, ready)
}

#[tokio::test]
async fn keeps_newest_window_and_deletes_the_rest() {
    let slack = FakeSlack::with_history(40);
    let (backfiller, queue, ready) = backfiller(&slack, 15);

    let report = backfiller.run().await.unwrap();

    assert!(ready.is_ready());
    assert_eq!(report.pushed, 15);
    assert_eq!(report.deleted, 25);
    assert_eq!(queue.snapshot(), (25..40).map(ts).collect::<Vec<_>>());
    assert_eq!(slack.remaining(), (25..40).map(ts).collect::<Vec<_>>());
    let mut deleted = slack.deleted();
    deleted.sort();
    assert_eq!(deleted, (0..25).map(ts).collect::<Vec<_>>());
}

#[tokio::test]
async fn three_full_pages_with_retention_of_fifteen_hundred() {
    let slack = FakeSlack::with_history(3000);
    let (backfiller, queue, _ready) = backfiller(&slack, 1500);

    let report = backfiller.run().await.unwrap();

    let requests = slack.requests();
    assert_eq!(requests[0].limit, 1000);
    assert!(requests[0].before.is_none());
    assert_eq!(requests[1].limit, 500);
    assert_eq!(requests[1].before, Some(ts(2000)));
    assert_eq!(requests[2].limit, 1000);
    assert_eq!(requests[2].before, Some(ts(1500)));

    assert_eq!(report.pushed, 1500);
    assert_eq!(report.deleted, 1500);
    assert_eq!(queue.len(), 1500);
    assert_eq!(queue.snapshot().first(), Some(&ts(1500)));
    assert_eq!(queue.newest(), Some(ts(2999)));
    assert_eq!(slack.remaining().len(), 1500);
}

#[tokio::test]
async fn zero_retention_deletes_everything() {
    let slack = FakeSlack::with_history(25);
    let (backfiller, queue, ready) = backfiller(&slack, 0);

    let report = backfiller.run().await.unwrap();

    assert_eq!(report.pushed, 0);
    assert_eq!(report.deleted, 25);
    assert!(queue.is_empty());
    assert!(slack.remaining().is_empty());
    assert!(ready.is_ready());
    assert!(slack.requests()[0].before.is_none());
}

#[tokio::test]
async fn short_history_keeps_what_exists() {
    let slack = FakeSlack::with_history(7);
    let (backfiller, queue, _ready) = backfiller(&slack, 50);

    let report = backfiller.run().await.unwrap();

    assert_eq!(report.pushed, 7);
    assert_eq!(report.deleted, 0);
    assert_eq!(slack.requests().len(), 1);
    assert_eq!(queue.snapshot(), (0..7).map(ts).collect::<Vec<_>>());
}

#[tokio::test]
async fn window_ending_on_last_message_skips_deletion_phase() {
    let slack = FakeSlack::with_history(10);
    let (backfiller, queue, _ready) = backfiller(&slack, 10);

    let report = backfiller.run().await.unwrap();

    assert_eq!(queue.len(), 10);
    assert_eq!(report.deleted, 0);
    assert_eq!(slack.requests().len(), 1);
}

#[tokio::test]
async fn fetch_failure_aborts_but_still_signals_ready() {
    let slack = FakeSlack::with_history(30);
    slack.fail_fetches_from(1);
    let (backfiller, queue, ready) = backfiller(&slack, 10);

    let err = backfiller.run().await.unwrap_err();

    assert!(matches!(err, RetentionError::Fetch { ref channel_id, .. } if channel_id == CHANNEL));
    assert!(ready.is_ready());
    assert_eq!(queue.len(), 10);
    assert!(slack.deleted().is_empty());
}

#[tokio::test]
async fn failed_deletes_are_skipped() {
    let slack = FakeSlack::with_history(12);
    slack.refuse_delete(ts(3));
    let (backfiller, _queue, _ready) = backfiller(&slack, 4);

    let report = backfiller.run().await.unwrap();

    assert_eq!(report.deleted, 7);
    assert_eq!(report.failed_deletes, 1);
    assert!(slack.remaining().contains(&ts(3)));
}
