//! Core domain types for channelscope
//!
//! Two groups of types live here:
//! - **Input** ([`Message`], [`ChannelData`]): what an upstream source hands
//!   back for a channel, messages ordered newest-first.
//! - **Output** ([`ChannelSnapshot`], [`ProMetrics`], [`PostSummary`]): the
//!   derived view handed to report renderers, exporters and the tracking job.
//!
//! Elevated-only fields are grouped in [`ProMetrics`] so a free snapshot
//! simply carries `pro: None` instead of a set of zeroed fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================
// Upstream input
// ============================================

/// Count of a single reaction kind on a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCount {
    /// Reaction identifier (emoji or custom emoji id)
    pub reaction: String,
    pub count: u64,
}

/// A channel post as delivered by the upstream source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message id, unique within the channel
    pub id: i64,
    /// Numeric channel (peer) id
    pub channel_id: i64,
    /// Publication timestamp
    pub date: DateTime<Utc>,
    /// Body text (empty for media-only posts)
    #[serde(default)]
    pub text: String,
    /// View counter; absent when the platform did not report one
    #[serde(default)]
    pub views: Option<u64>,
    /// Reaction counts in platform order
    #[serde(default)]
    pub reactions: Vec<ReactionCount>,
}

impl Message {
    /// Sum of all reaction counts on this message, saturating at `u64::MAX`.
    pub fn reaction_total(&self) -> u64 {
        self.reactions
            .iter()
            .fold(0u64, |total, r| total.saturating_add(r.count))
    }
}

/// Everything an upstream source returns for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelData {
    /// Numeric channel id
    pub channel_id: i64,
    /// Display title
    pub title: String,
    /// Public handle without the leading `@`
    pub handle: Option<String>,
    pub subscriber_count: u64,
    /// Most recent messages, newest first
    pub messages: Vec<Message>,
    /// Freshly downloaded avatar; owned by whoever receives this fetch
    pub avatar_path: Option<PathBuf>,
}

// ============================================
// Derived output
// ============================================

/// Short description of a single post for top/flop lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSummary {
    /// First line of the body, truncated
    pub text: String,
    pub views: u64,
    /// Permalink to the post
    pub link: String,
}

/// Metrics only present for elevated ("pro") requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProMetrics {
    /// Average views as a percentage of subscribers
    pub engagement_rate: f64,
    /// Posting cadence in posts per day
    pub posts_per_day: f64,
    /// Average reactions as a percentage of average views
    pub reaction_rate: f64,
    /// Lowest view count among posts older than 24 hours
    pub min_views: u64,
    /// Highest view count among posts older than 24 hours
    pub max_views: u64,
    /// Up to three best performing posts, best first
    pub top_posts: Vec<PostSummary>,
    /// Up to three worst performing posts, from the tail of the ranking
    pub flop_posts: Vec<PostSummary>,
}

/// Analytics snapshot for a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    /// Channel display name
    pub name: String,
    /// Public handle, if any
    pub handle: Option<String>,
    /// Reference the caller asked for
    pub url: String,
    pub subscribers: u64,
    /// Average views per post with a view counter, truncated
    pub avg_views: u64,
    /// When the underlying data was fetched
    pub fetched_at: DateTime<Utc>,
    /// Elevated-only metrics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pro: Option<ProMetrics>,
    /// Temporary avatar file; only set on fresh (non-cached) results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_path: Option<PathBuf>,
}

impl ChannelSnapshot {
    /// Whether this snapshot carries the elevated field set.
    pub fn is_pro(&self) -> bool {
        self.pro.is_some()
    }

    /// Copy of this snapshot that does not reference the avatar file.
    pub fn without_avatar(&self) -> Self {
        Self {
            avatar_path: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_deserialize_defaults() {
        let json = r#"{"id": 7, "channel_id": 1001, "date": "2025-03-01T12:00:00Z"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, 7);
        assert!(msg.text.is_empty());
        assert!(msg.views.is_none());
        assert!(msg.reactions.is_empty());
        assert_eq!(msg.reaction_total(), 0);
    }

    #[test]
    fn test_reaction_total() {
        let json = r#"{
            "id": 1, "channel_id": 1, "date": "2025-03-01T12:00:00Z",
            "views": 10,
            "reactions": [{"reaction": "👍", "count": 4}, {"reaction": "🔥", "count": 3}]
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.reaction_total(), 7);
    }

    #[test]
    fn test_reaction_total_saturates() {
        let json = format!(
            r#"{{"id": 1, "channel_id": 1, "date": "2025-03-01T12:00:00Z",
                "reactions": [{{"reaction": "a", "count": {max}}}, {{"reaction": "b", "count": 2}}]}}"#,
            max = u64::MAX
        );
        let msg: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(msg.reaction_total(), u64::MAX);
    }

    #[test]
    fn test_free_snapshot_serializes_without_pro_fields() {
        let snapshot = ChannelSnapshot {
            name: "Rust News".to_string(),
            handle: Some("rustnews".to_string()),
            url: "https://t.me/rustnews".to_string(),
            subscribers: 1000,
            avg_views: 200,
            fetched_at: Utc::now(),
            pro: None,
            avatar_path: Some(PathBuf::from("/tmp/a.jpg")),
        };

        let value = serde_json::to_value(snapshot.without_avatar()).unwrap();
        assert!(value.get("pro").is_none());
        assert!(value.get("avatar_path").is_none());
        assert_eq!(value["avg_views"], 200);
    }
}
