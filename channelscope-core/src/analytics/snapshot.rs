//! Assembly of [`ChannelSnapshot`] from upstream data and computed metrics.

use super::metrics::{compute_metrics_at, ChannelMetrics};
use crate::types::{ChannelData, ChannelSnapshot, ProMetrics};
use chrono::{DateTime, Utc};

/// Build a snapshot for `reference` from freshly fetched `data`.
///
/// The elevated field set is attached iff `elevated` is true. The avatar
/// path is carried over as-is; the caller of a fresh fetch owns that file.
pub fn build_snapshot(
    reference: &str,
    data: ChannelData,
    elevated: bool,
    now: DateTime<Utc>,
) -> ChannelSnapshot {
    let metrics = compute_metrics_at(
        &data.messages,
        data.subscriber_count,
        data.handle.as_deref(),
        now,
    );

    ChannelSnapshot {
        name: data.title,
        handle: data.handle,
        url: reference.to_string(),
        subscribers: data.subscriber_count,
        avg_views: metrics.average_views_floor(),
        fetched_at: now,
        pro: elevated.then(|| pro_metrics(metrics)),
        avatar_path: data.avatar_path,
    }
}

fn pro_metrics(metrics: ChannelMetrics) -> ProMetrics {
    ProMetrics {
        engagement_rate: metrics.engagement_rate,
        posts_per_day: metrics.posts_per_day,
        reaction_rate: metrics.reaction_rate,
        min_views: metrics.min_mature_views,
        max_views: metrics.max_mature_views,
        top_posts: metrics.top_posts,
        flop_posts: metrics.flop_posts,
    }
}
