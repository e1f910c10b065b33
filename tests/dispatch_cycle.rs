// tests/dispatch_cycle.rs
mod common;

use common::{ad_url, at, raw_ad, raw_ad_with_photos, FakeListing, FakeNotifier, Reply};
use olx_watcher::dispatch::{CycleState, DispatchSettings, Dispatcher};
use olx_watcher::highlight::RuleDescriptor;
use olx_watcher::notify::Delivery;
use olx_watcher::watermark::{MemoryWatermarkStore, WatermarkStore};
use olx_watcher::{HighlightEngine, PhotoSize, WatchError};
use std::sync::Arc;
use std::time::Duration;

const KEY: &str = "MRT_kiev_-100";

fn settings() -> DispatchSettings {
    DispatchSettings {
        watermark_key: KEY.into(),
        rate_limit_backoff: Duration::from_secs(60),
        photo_size: PhotoSize::default(),
    }
}

fn dispatcher(
    listing: &Arc<FakeListing>,
    store: &Arc<MemoryWatermarkStore>,
    notifier: &Arc<FakeNotifier>,
) -> Dispatcher {
    let engine = HighlightEngine::from_descriptors(&[RuleDescriptor::attribute(
        "pets",
        &[("yes_cat", "🐈")],
    )])
    .unwrap();
    Dispatcher::new(
        settings(),
        engine,
        listing.clone(),
        store.clone(),
        notifier.clone(),
    )
}

async fn stored(store: &MemoryWatermarkStore) -> Option<String> {
    store.get(KEY).await.unwrap()
}

#[tokio::test]
async fn first_run_delivers_everything_oldest_first() {
    let listing = Arc::new(FakeListing::new(vec![vec![
        raw_ad(3, 12, false),
        raw_ad(2, 11, false),
        raw_ad(1, 10, false),
    ]]));
    let store = Arc::new(MemoryWatermarkStore::new());
    let notifier = Arc::new(FakeNotifier::default());

    let mut d = dispatcher(&listing, &store, &notifier);
    let report = d.run_cycle().await.unwrap();

    assert_eq!(report.found, 3);
    assert_eq!(report.delivered, 3);
    assert_eq!(report.watermark, at(12));
    assert_eq!(notifier.sent_urls(), vec![ad_url(1), ad_url(2), ad_url(3)]);
    assert_eq!(stored(&store).await.as_deref(), Some("2024-05-01T12:00:00+00:00"));
    assert_eq!(d.state(), CycleState::Idle);

    // Highlights travel with the message.
    match &notifier.sent()[0] {
        Delivery::Text { text } => assert!(text.ends_with("🐈")),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn rerun_with_unchanged_listing_is_idempotent() {
    let listing = Arc::new(FakeListing::new(vec![vec![
        raw_ad(2, 11, false),
        raw_ad(1, 10, false),
    ]]));
    let store = Arc::new(MemoryWatermarkStore::new());
    let notifier = Arc::new(FakeNotifier::default());
    let mut d = dispatcher(&listing, &store, &notifier);

    d.run_cycle().await.unwrap();
    let second = d.run_cycle().await.unwrap();

    assert_eq!(second.found, 0);
    assert_eq!(second.delivered, 0);
    assert_eq!(notifier.sent().len(), 2);
}

#[tokio::test]
async fn promoted_old_ad_skipped_and_organic_old_ad_stops_walk() {
    // Watermark at 10:00. Page 1: promoted 08:00, organic 11:00, organic 10:00.
    let listing = Arc::new(FakeListing::new(vec![
        vec![raw_ad(5, 8, true), raw_ad(4, 11, false), raw_ad(3, 10, false)],
        vec![raw_ad(2, 9, false)],
    ]));
    let store = Arc::new(MemoryWatermarkStore::new());
    store.set(KEY, "2024-05-01T10:00:00+00:00").await.unwrap();
    let notifier = Arc::new(FakeNotifier::default());

    let report = dispatcher(&listing, &store, &notifier)
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(report.found, 1);
    assert_eq!(notifier.sent_urls(), vec![ad_url(4)]);
    assert_eq!(listing.fetched(), vec![1]);
    assert_eq!(report.watermark, at(11));
}

#[tokio::test]
async fn promoted_new_ad_is_delivered_in_refresh_order() {
    // Promoted ads can be newer than organic ones listed after them.
    let listing = Arc::new(FakeListing::new(vec![vec![
        raw_ad(9, 15, true),
        raw_ad(2, 12, false),
        raw_ad(1, 9, false),
    ]]));
    let store = Arc::new(MemoryWatermarkStore::new());
    store.set(KEY, "2024-05-01T10:00:00+00:00").await.unwrap();
    let notifier = Arc::new(FakeNotifier::default());

    let report = dispatcher(&listing, &store, &notifier)
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(notifier.sent_urls(), vec![ad_url(2), ad_url(9)]);
    assert_eq!(report.watermark, at(15));
}

#[tokio::test]
async fn older_promoted_ad_survives_failure_after_newer_organic() {
    // The promoted ad is listed first but refreshed before the organic one.
    let listing = Arc::new(FakeListing::new(vec![vec![
        raw_ad(7, 11, true),
        raw_ad(8, 14, false),
        raw_ad(1, 9, false),
    ]]));
    let store = Arc::new(MemoryWatermarkStore::new());
    store.set(KEY, "2024-05-01T10:00:00+00:00").await.unwrap();
    let notifier = Arc::new(FakeNotifier::scripted(vec![Reply::Ok, Reply::Fail]));
    let mut d = dispatcher(&listing, &store, &notifier);

    let err = d.run_cycle().await.unwrap_err();
    assert!(matches!(err, WatchError::Notify(_)));
    assert_eq!(notifier.sent_urls(), vec![ad_url(7)]);
    assert_eq!(stored(&store).await.as_deref(), Some("2024-05-01T11:00:00+00:00"));

    let report = d.run_cycle().await.unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(notifier.sent_urls(), vec![ad_url(7), ad_url(8)]);
    assert_eq!(report.watermark, at(14));
}

#[tokio::test]
async fn failure_mid_delivery_keeps_confirmed_progress() {
    let listing = Arc::new(FakeListing::new(vec![vec![
        raw_ad(3, 12, false),
        raw_ad(2, 11, false),
        raw_ad(1, 10, false),
    ]]));
    let store = Arc::new(MemoryWatermarkStore::new());
    let notifier = Arc::new(FakeNotifier::scripted(vec![Reply::Ok, Reply::Fail]));
    let mut d = dispatcher(&listing, &store, &notifier);

    let err = d.run_cycle().await.unwrap_err();
    assert!(matches!(err, WatchError::Notify(_)));
    assert!(!err.is_fatal());
    assert_eq!(d.state(), CycleState::Idle);
    assert_eq!(stored(&store).await.as_deref(), Some("2024-05-01T10:00:00+00:00"));

    // Next cycle resumes after the last confirmed ad.
    let report = d.run_cycle().await.unwrap();
    assert_eq!(report.delivered, 2);
    assert_eq!(notifier.sent_urls(), vec![ad_url(1), ad_url(2), ad_url(3)]);
    assert_eq!(stored(&store).await.as_deref(), Some("2024-05-01T12:00:00+00:00"));
}

#[tokio::test]
async fn watermark_never_moves_backwards() {
    let store = Arc::new(MemoryWatermarkStore::new());
    store.set(KEY, "2024-05-01T20:00:00+00:00").await.unwrap();
    // Only a promoted ad is new; an older organic one follows.
    let listing = Arc::new(FakeListing::new(vec![vec![
        raw_ad(7, 21, true),
        raw_ad(6, 19, false),
    ]]));
    let notifier = Arc::new(FakeNotifier::default());
    let mut d = dispatcher(&listing, &store, &notifier);

    let report = d.run_cycle().await.unwrap();
    assert_eq!(report.watermark, at(21));

    let listing_older = Arc::new(FakeListing::new(vec![vec![raw_ad(8, 18, false)]]));
    let report = dispatcher(&listing_older, &store, &notifier)
        .run_cycle()
        .await
        .unwrap();
    assert_eq!(report.delivered, 0);
    assert_eq!(stored(&store).await.as_deref(), Some("2024-05-01T21:00:00+00:00"));
}

#[tokio::test(start_paused = true)]
async fn rate_limit_waits_and_retries_once() {
    let listing = Arc::new(FakeListing::new(vec![vec![raw_ad(1, 10, false)]]));
    let store = Arc::new(MemoryWatermarkStore::new());
    let notifier = Arc::new(FakeNotifier::scripted(vec![Reply::RateLimited, Reply::Ok]));
    let mut d = dispatcher(&listing, &store, &notifier);

    let started = tokio::time::Instant::now();
    let report = d.run_cycle().await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(60));
    assert_eq!(report.delivered, 1);
    assert_eq!(notifier.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn second_rate_limit_fails_the_cycle() {
    let listing = Arc::new(FakeListing::new(vec![vec![
        raw_ad(2, 11, false),
        raw_ad(1, 10, false),
    ]]));
    let store = Arc::new(MemoryWatermarkStore::new());
    let notifier = Arc::new(FakeNotifier::scripted(vec![
        Reply::RateLimited,
        Reply::RateLimited,
    ]));
    let mut d = dispatcher(&listing, &store, &notifier);

    let err = d.run_cycle().await.unwrap_err();
    assert!(err.to_string().contains("Rate limited"));
    assert_eq!(notifier.attempts(), 2);
    assert_eq!(stored(&store).await, None);
}

#[tokio::test]
async fn payload_shape_follows_photo_count() {
    let listing = Arc::new(FakeListing::new(vec![vec![
        raw_ad_with_photos(3, 12, false, 12),
        raw_ad_with_photos(2, 11, false, 1),
        raw_ad_with_photos(1, 10, false, 0),
    ]]));
    let store = Arc::new(MemoryWatermarkStore::new());
    let notifier = Arc::new(FakeNotifier::default());

    dispatcher(&listing, &store, &notifier)
        .run_cycle()
        .await
        .unwrap();

    let sent = notifier.sent();
    assert!(matches!(sent[0], Delivery::Text { .. }));
    match &sent[1] {
        Delivery::Photo { photo, .. } => assert_eq!(photo, "https://cdn.test/2/0;s=1200x900"),
        other => panic!("unexpected {other:?}"),
    }
    match &sent[2] {
        Delivery::MediaGroup { photos, caption } => {
            assert_eq!(photos.len(), 10);
            assert!(caption.starts_with(&ad_url(3)));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn malformed_listing_aborts_without_delivery() {
    let mut broken = raw_ad(2, 11, false);
    broken.as_object_mut().unwrap().remove("isPromoted");
    let listing = Arc::new(FakeListing::new(vec![vec![raw_ad(3, 12, false), broken]]));
    let store = Arc::new(MemoryWatermarkStore::new());
    let notifier = Arc::new(FakeNotifier::default());

    let err = dispatcher(&listing, &store, &notifier)
        .run_cycle()
        .await
        .unwrap_err();

    assert!(matches!(err, WatchError::Document(_)));
    assert!(notifier.sent().is_empty());
    assert_eq!(stored(&store).await, None);
}
