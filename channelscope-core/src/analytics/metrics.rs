//! Channel Metrics Engine
//!
//! Turns a batch of recent channel messages into engagement statistics.
//! Pure computation: no I/O, and the only clock dependency is the maturity
//! cutoff, which [`compute_metrics_at`] takes as an argument.
//!
//! ## Metrics Produced
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `average_views` | float | `total_views / valid_posts` |
//! | `engagement_rate` | float | `average_views / subscribers * 100` |
//! | `posts_per_day` | float | `messages / max(1, days between newest and oldest)` |
//! | `reaction_rate` | float | `average_reactions / average_views * 100` |
//! | `min_mature_views` | integer | Lowest views among posts older than 24h |
//! | `max_mature_views` | integer | Highest views among posts older than 24h |
//! | `top_posts` | array | First 3 posts ranked by views |
//! | `flop_posts` | array | Last 3 posts ranked by views |
//!
//! A "valid post" is one with a view counter. Posts without one still count
//! toward posting cadence.
//!
//! ## Example
//!
//! Three posts older than a day with 100, 200 and 300 views on a channel
//! with 1000 subscribers:
//! - `average_views`: 200
//! - `engagement_rate`: 20.0
//! - `min_mature_views` / `max_mature_views`: 100 / 300

use crate::types::{Message, PostSummary};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Age after which a post's view count is considered settled.
pub const MATURITY_WINDOW_HOURS: i64 = 24;

/// Size of the top and flop lists.
pub const TOP_FLOP_SIZE: usize = 3;

/// Characters of the first body line kept in a post summary.
pub const SUMMARY_TEXT_CHARS: usize = 50;

/// Appended to every post summary text.
pub const TRUNCATION_MARKER: &str = "...";

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Statistics derived from one message batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ChannelMetrics {
    /// Sum of views over valid posts, saturating at `u64::MAX`
    pub total_views: u64,
    /// Sum of reactions over valid posts, saturating at `u64::MAX`
    pub total_reactions: u64,
    /// Number of posts with a view counter. A counter of zero is still a
    /// counter, so zero-view posts count here and in the mature range.
    pub valid_posts: usize,
    pub average_views: f64,
    pub average_reactions: f64,
    /// Percent
    pub engagement_rate: f64,
    pub posts_per_day: f64,
    /// Percent
    pub reaction_rate: f64,
    pub min_mature_views: u64,
    pub max_mature_views: u64,
    pub top_posts: Vec<PostSummary>,
    pub flop_posts: Vec<PostSummary>,
}

impl ChannelMetrics {
    /// Average views truncated to an integer.
    pub fn average_views_floor(&self) -> u64 {
        self.average_views as u64
    }
}

/// Compute metrics using the current time as the maturity reference.
pub fn compute_metrics(
    messages: &[Message],
    subscriber_count: u64,
    channel_handle: Option<&str>,
) -> ChannelMetrics {
    compute_metrics_at(messages, subscriber_count, channel_handle, Utc::now())
}

/// Compute metrics for `messages` (newest first) as of `now`.
///
/// Never fails: empty or degenerate input yields zeroed metrics.
pub fn compute_metrics_at(
    messages: &[Message],
    subscriber_count: u64,
    channel_handle: Option<&str>,
    now: DateTime<Utc>,
) -> ChannelMetrics {
    let maturity_cutoff = now - Duration::hours(MATURITY_WINDOW_HOURS);

    let mut total_views = 0u64;
    let mut total_reactions = 0u64;
    // Averages come from float sums so they stay exact past u64 saturation
    let mut view_sum = 0.0f64;
    let mut reaction_sum = 0.0f64;
    let mut valid_posts = 0usize;
    let mut min_mature: Option<u64> = None;
    let mut max_mature: Option<u64> = None;

    for msg in messages {
        let Some(views) = msg.views else {
            continue;
        };

        let reactions = msg.reaction_total();
        total_views = total_views.saturating_add(views);
        total_reactions = total_reactions.saturating_add(reactions);
        view_sum += views as f64;
        reaction_sum += reactions as f64;
        valid_posts += 1;

        // Strictly older than the cutoff; a post exactly 24h old is still settling
        if msg.date < maturity_cutoff {
            min_mature = Some(min_mature.map_or(views, |m| m.min(views)));
            max_mature = Some(max_mature.map_or(views, |m| m.max(views)));
        }
    }

    let average_views = ratio(view_sum, valid_posts as f64);
    let average_reactions = ratio(reaction_sum, valid_posts as f64);

    let (top_posts, flop_posts) = rank_posts(messages, channel_handle);

    ChannelMetrics {
        total_views,
        total_reactions,
        valid_posts,
        average_views,
        average_reactions,
        engagement_rate: ratio(average_views, subscriber_count as f64) * 100.0,
        posts_per_day: posting_cadence(messages),
        reaction_rate: ratio(average_reactions, average_views) * 100.0,
        min_mature_views: min_mature.unwrap_or(0),
        max_mature_views: max_mature.unwrap_or(0),
        top_posts,
        flop_posts,
    }
}

/// `numerator / denominator`, or 0 when the denominator is 0.
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Posts per day across the batch.
///
/// Relies on newest-first ordering. Spans under a day count as one day.
fn posting_cadence(messages: &[Message]) -> f64 {
    let (Some(newest), Some(oldest)) = (messages.first(), messages.last()) else {
        return 0.0;
    };
    if messages.len() < 2 {
        return 0.0;
    }

    let span = newest.date.signed_duration_since(oldest.date);
    let days = (span.num_milliseconds() as f64 / MILLIS_PER_DAY).max(1.0);

    messages.len() as f64 / days
}

/// Rank posts with views and text by views, descending.
///
/// The sort is stable, so equal view counts keep batch order. Top and flop
/// overlap when fewer than six posts qualify.
fn rank_posts(
    messages: &[Message],
    channel_handle: Option<&str>,
) -> (Vec<PostSummary>, Vec<PostSummary>) {
    let mut ranked: Vec<(&Message, u64)> = messages
        .iter()
        .filter(|m| !m.text.is_empty())
        .filter_map(|m| m.views.map(|views| (m, views)))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let summarize = |&(msg, views): &(&Message, u64)| PostSummary {
        text: summary_text(&msg.text),
        views,
        link: post_link(msg, channel_handle),
    };

    let top = ranked.iter().take(TOP_FLOP_SIZE).map(summarize).collect();
    let flop = ranked[ranked.len().saturating_sub(TOP_FLOP_SIZE)..]
        .iter()
        .map(summarize)
        .collect();

    (top, flop)
}

/// First line of the body, cut to [`SUMMARY_TEXT_CHARS`] characters.
fn summary_text(body: &str) -> String {
    let first_line = body.split('\n').next().unwrap_or_default();
    let mut text: String = first_line.chars().take(SUMMARY_TEXT_CHARS).collect();
    text.push_str(TRUNCATION_MARKER);
    text
}

/// Permalink for a post: by handle when public, by numeric id otherwise.
pub fn post_link(msg: &Message, channel_handle: Option<&str>) -> String {
    match channel_handle {
        Some(handle) if !handle.is_empty() => format!("https://t.me/{}/{}", handle, msg.id),
        _ => format!("https://t.me/c/{}/{}", msg.channel_id, msg.id),
    }
}
