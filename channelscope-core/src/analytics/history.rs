//! History points for tracked channels.
//!
//! The tracking job periodically forces an elevated refresh of each tracked
//! channel and appends a [`HistoryPoint`] to its own store. Storage is the
//! caller's concern; this module only derives the points.

use crate::coordinator::SnapshotCoordinator;
use crate::types::ChannelSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One observation of a tracked channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    /// Reference the channel is tracked under
    pub reference: String,
    pub recorded_at: DateTime<Utc>,
    pub subscribers: u64,
    /// Percent; 0 when the snapshot had no elevated metrics
    pub engagement_rate: f64,
    pub avg_views: u64,
}

impl HistoryPoint {
    pub fn from_snapshot(snapshot: &ChannelSnapshot) -> Self {
        Self {
            reference: snapshot.url.clone(),
            recorded_at: snapshot.fetched_at,
            subscribers: snapshot.subscribers,
            engagement_rate: snapshot
                .pro
                .as_ref()
                .map_or(0.0, |pro| pro.engagement_rate),
            avg_views: snapshot.avg_views,
        }
    }
}

/// Result of refreshing one tracked channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Updated(HistoryPoint),
    Failed { reference: String },
}

impl RefreshOutcome {
    pub fn point(&self) -> Option<&HistoryPoint> {
        match self {
            RefreshOutcome::Updated(point) => Some(point),
            RefreshOutcome::Failed { .. } => None,
        }
    }
}

/// Force an elevated refresh of every tracked reference.
///
/// References are refreshed one after another; a failure is recorded and
/// the remaining references are still refreshed. Avatars downloaded by the
/// refresh are deleted.
pub async fn refresh_tracked<S: AsRef<str>>(
    coordinator: &SnapshotCoordinator,
    references: &[S],
) -> Vec<RefreshOutcome> {
    let mut outcomes = Vec::with_capacity(references.len());

    for reference in references {
        let reference = reference.as_ref();
        let outcome = match coordinator.get(reference, true, true).await {
            Some(snapshot) => {
                // History points carry no avatar, so the fresh file is not needed
                if let Some(path) = &snapshot.avatar_path {
                    if let Err(e) = tokio::fs::remove_file(path).await {
                        tracing::debug!(path = %path.display(), error = %e, "Failed to remove avatar");
                    }
                }
                RefreshOutcome::Updated(HistoryPoint::from_snapshot(&snapshot))
            }
            None => RefreshOutcome::Failed {
                reference: reference.trim().to_string(),
            },
        };
        outcomes.push(outcome);
    }

    let updated = outcomes.iter().filter(|o| o.point().is_some()).count();
    tracing::info!(
        tracked = references.len(),
        updated,
        failed = references.len() - updated,
        "Tracked channels refreshed"
    );

    outcomes
}
