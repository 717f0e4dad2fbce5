//! Integration tests for the fetch-and-cache coordinator
//!
//! Cache behaviour is tested against a counting in-memory source under a
//! paused tokio clock. End-to-end tests use the JSON fixtures in
//! `tests/fixtures/channels/` through the fixture source.

use async_trait::async_trait;
use channelscope_core::analytics::{refresh_tracked, RefreshOutcome};
use channelscope_core::config::{SourceKind, UpstreamConfig};
use channelscope_core::upstream::FixtureSource;
use channelscope_core::{
    ChannelData, ChannelSource, Error, Message, ReactionCount, Result, SnapshotCache,
    SnapshotCoordinator,
};
use chrono::{Duration as ChronoDuration, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const TTL: Duration = Duration::from_secs(300);

/// In-memory source that counts fetches.
struct CountingSource {
    calls: AtomicUsize,
}

impl CountingSource {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelSource for CountingSource {
    fn name(&self) -> &str {
        "counting"
    }

    async fn fetch_channel(&self, reference: &str, _elevated: bool) -> Result<ChannelData> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if reference.contains("private") {
            return Err(Error::ChannelPrivate(reference.to_string()));
        }
        if reference.contains("flaky") {
            return Err(Error::Upstream("connection reset by peer".to_string()));
        }

        let now = Utc::now();
        let messages = [(3, 100u64), (2, 200), (1, 300)]
            .iter()
            .enumerate()
            .map(|(i, &(id, views))| Message {
                id,
                channel_id: 777,
                date: now - ChronoDuration::hours(48 + i as i64),
                text: format!("post number {}", id),
                views: Some(views),
                reactions: vec![ReactionCount {
                    reaction: "👍".to_string(),
                    count: 2,
                }],
            })
            .collect();

        Ok(ChannelData {
            channel_id: 777,
            title: format!("Counting #{}", call),
            handle: Some("countingchan".to_string()),
            subscriber_count: 1000,
            messages,
            avatar_path: Some(PathBuf::from(format!("/tmp/777_{}.jpg", call))),
        })
    }
}

fn coordinator(source: Arc<CountingSource>) -> SnapshotCoordinator {
    SnapshotCoordinator::new(source, SnapshotCache::new(TTL, 64), Duration::from_secs(30))
}

// ============================================
// Cache behaviour
// ============================================

#[tokio::test(start_paused = true)]
async fn test_fetches_once_within_ttl_and_again_after_expiry() {
    let source = CountingSource::new();
    let coord = coordinator(source.clone());

    let first = coord.get("@countingchan", false, false).await.unwrap();
    let second = coord.get("@countingchan", false, false).await.unwrap();
    assert_eq!(source.calls(), 1);
    assert_eq!(first.name, second.name);

    tokio::time::advance(TTL).await;

    let third = coord.get("@countingchan", false, false).await.unwrap();
    assert_eq!(source.calls(), 2);
    assert_eq!(third.name, "Counting #1");
}

#[tokio::test(start_paused = true)]
async fn test_elevated_and_free_never_share_entries() {
    let source = CountingSource::new();
    let coord = coordinator(source.clone());

    let free = coord.get("@countingchan", false, false).await.unwrap();
    let pro = coord.get("@countingchan", true, false).await.unwrap();
    assert_eq!(source.calls(), 2);

    assert!(free.pro.is_none());
    let metrics = pro.pro.as_ref().expect("elevated snapshot has pro metrics");
    assert!((metrics.engagement_rate - 20.0).abs() < 1e-9);
    assert_eq!(metrics.min_views, 100);
    assert_eq!(metrics.max_views, 300);

    // Identical apart from the elevated field set
    let pro_as_free = channelscope_core::ChannelSnapshot {
        pro: None,
        name: free.name.clone(),
        fetched_at: free.fetched_at,
        avatar_path: free.avatar_path.clone(),
        ..pro.clone()
    };
    assert_eq!(pro_as_free, free);

    // Both now served from their own entries
    assert!(coord.get("@countingchan", false, false).await.unwrap().pro.is_none());
    assert!(coord.get("@countingchan", true, false).await.unwrap().pro.is_some());
    assert_eq!(source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cached_snapshot_drops_avatar() {
    let source = CountingSource::new();
    let coord = coordinator(source.clone());

    let fresh = coord.get("@countingchan", true, false).await.unwrap();
    assert_eq!(fresh.avatar_path, Some(PathBuf::from("/tmp/777_0.jpg")));

    let cached = coord.get("@countingchan", true, false).await.unwrap();
    assert!(cached.avatar_path.is_none());
    assert_eq!(cached.pro, fresh.pro);
}

#[tokio::test(start_paused = true)]
async fn test_force_refresh_bypasses_fresh_entry() {
    let source = CountingSource::new();
    let coord = coordinator(source.clone());

    coord.get("@countingchan", true, false).await.unwrap();
    let forced = coord.get("@countingchan", true, true).await.unwrap();
    assert_eq!(source.calls(), 2);
    assert_eq!(forced.name, "Counting #1");
    assert!(forced.avatar_path.is_some());

    // The forced result replaced the entry
    let cached = coord.get("@countingchan", true, false).await.unwrap();
    assert_eq!(cached.name, "Counting #1");
    assert_eq!(source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failures_are_absent_and_never_cached() {
    let source = CountingSource::new();
    let coord = coordinator(source.clone());

    assert!(coord.get("@privatechan", false, false).await.is_none());
    assert!(coord.get("@privatechan", false, false).await.is_none());
    assert!(coord.get("@flakychan", true, false).await.is_none());
    assert_eq!(source.calls(), 3);
    assert_eq!(coord.cached_entries(), 0);

    let stats = coord.stats();
    assert_eq!(stats.fetches, 3);
    assert_eq!(stats.failures, 3);
    assert_eq!(stats.cache_hits, 0);
}

#[tokio::test(start_paused = true)]
async fn test_stale_entry_is_refetched_not_served() {
    let source = CountingSource::new();
    let coord = coordinator(source.clone());

    coord.get("@countingchan", false, false).await.unwrap();
    tokio::time::advance(TTL).await;

    // A stale entry is never served, even if it is all we have
    coord.get("@countingchan", false, false).await.unwrap();
    assert_eq!(source.calls(), 2);
    assert_eq!(coord.cached_entries(), 1);
}

// ============================================
// Fixture source end-to-end
// ============================================

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/channels")
}

fn fixture_coordinator(avatar_dir: &TempDir) -> SnapshotCoordinator {
    let source = FixtureSource::new(UpstreamConfig {
        source: SourceKind::Fixture,
        fixture_dir: Some(fixture_dir()),
        avatar_dir: Some(avatar_dir.path().to_path_buf()),
        ..Default::default()
    })
    .expect("fixture source");

    SnapshotCoordinator::new(
        Arc::new(source),
        SnapshotCache::new(TTL, 64),
        Duration::from_secs(30),
    )
}

#[tokio::test]
async fn test_fixture_channel_metrics() {
    let avatars = TempDir::new().unwrap();
    let coord = fixture_coordinator(&avatars);

    let snapshot = coord
        .get("https://t.me/rustnews", true, false)
        .await
        .expect("fixture channel resolves");

    assert_eq!(snapshot.name, "Rust News");
    assert_eq!(snapshot.handle.as_deref(), Some("rustnews"));
    assert_eq!(snapshot.subscribers, 1000);
    assert_eq!(snapshot.avg_views, 200);

    let pro = snapshot.pro.as_ref().unwrap();
    assert!((pro.engagement_rate - 20.0).abs() < 1e-9);
    assert!((pro.posts_per_day - 1.5).abs() < 1e-9);
    assert!((pro.reaction_rate - 16.0 / 3.0 / 2.0).abs() < 1e-9);
    assert_eq!((pro.min_views, pro.max_views), (100, 300));
    assert_eq!(pro.top_posts[0].text, "Rust 1.88 released...");
    assert_eq!(pro.top_posts[0].link, "https://t.me/rustnews/103");
    assert_eq!(pro.flop_posts.last().unwrap().views, 100);

    let avatar = snapshot.avatar_path.as_ref().expect("avatar copied");
    assert!(avatar.starts_with(avatars.path()));
    assert!(avatar.exists());
}

#[tokio::test]
async fn test_fixture_private_and_missing_channels() {
    let avatars = TempDir::new().unwrap();
    let coord = fixture_coordinator(&avatars);

    assert!(coord.get("https://t.me/+secretinvite", true, false).await.is_none());
    assert!(coord.get("@doesnotexist", true, false).await.is_none());
    assert!(coord.get("https://example.com/rustnews", true, false).await.is_none());
    assert_eq!(coord.cached_entries(), 0);
}

#[tokio::test]
async fn test_refresh_tracked_reports_each_reference() {
    let avatars = TempDir::new().unwrap();
    let coord = fixture_coordinator(&avatars);

    let outcomes = refresh_tracked(&coord, &["@rustnews", "@doesnotexist"]).await;
    assert_eq!(outcomes.len(), 2);

    let point = outcomes[0].point().expect("rustnews refreshed");
    assert_eq!(point.subscribers, 1000);
    assert!((point.engagement_rate - 20.0).abs() < 1e-9);
    assert_eq!(
        outcomes[1],
        RefreshOutcome::Failed {
            reference: "@doesnotexist".to_string()
        }
    );

    // Tracking always forces a fetch
    let again = refresh_tracked(&coord, &["@rustnews"]).await;
    assert!(again[0].point().is_some());
    assert_eq!(coord.stats().fetches, 3);

    // Refresh avatars are not kept
    assert_eq!(std::fs::read_dir(avatars.path()).unwrap().count(), 0);
}
