//! Upstream channel-data sources
//!
//! A [`ChannelSource`] resolves a channel reference into a [`ChannelData`]:
//! title, handle, subscriber count, the most recent messages (newest first)
//! and optionally a freshly downloaded avatar.
//!
//! Two sources ship with the crate:
//! - [`GatewaySource`]: HTTP client for a channel-data gateway that holds
//!   the messaging-platform credentials
//! - [`FixtureSource`]: JSON files on disk, for offline runs and tests
//!
//! Both speak the same JSON shape:
//!
//! ```json
//! {
//!   "id": 1555000111,
//!   "title": "Rust News",
//!   "username": "rustnews",
//!   "subscribers": 1200,
//!   "avatar_url": "https://cdn.example.com/rustnews.jpg",
//!   "messages": [
//!     {"id": 42, "channel_id": 1555000111, "date": "2025-06-09T08:00:00Z",
//!      "text": "Release notes", "views": 950,
//!      "reactions": [{"reaction": "🔥", "count": 12}]}
//!   ]
//! }
//! ```

mod fixture;
mod gateway;

pub use fixture::FixtureSource;
pub use gateway::GatewaySource;

use crate::config::{SourceKind, UpstreamConfig};
use crate::error::{Error, Result};
use crate::types::{ChannelData, Message};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Capability to fetch current channel data from the messaging platform.
///
/// Implementations signal an unavailable channel with
/// [`Error::ChannelNotFound`](crate::Error::ChannelNotFound) or
/// [`Error::ChannelPrivate`](crate::Error::ChannelPrivate) and transport
/// problems with [`Error::Upstream`](crate::Error::Upstream).
#[async_trait]
pub trait ChannelSource: Send + Sync {
    /// Short name for logs (e.g., "gateway").
    fn name(&self) -> &str;

    /// Fetch channel metadata and its most recent messages.
    async fn fetch_channel(&self, reference: &str, elevated: bool) -> Result<ChannelData>;
}

/// Build the source selected in configuration.
pub fn create_source(config: &UpstreamConfig) -> Result<Arc<dyn ChannelSource>> {
    config.validate()?;

    let source: Arc<dyn ChannelSource> = match config.source {
        SourceKind::Gateway => Arc::new(GatewaySource::new(config.clone())?),
        SourceKind::Fixture => Arc::new(FixtureSource::new(config.clone())?),
    };
    tracing::info!(source = source.name(), "Channel source ready");
    Ok(source)
}

/// Channel payload as served by the gateway and stored in fixtures.
#[derive(Debug, Deserialize)]
pub(crate) struct ChannelPayload {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub username: Option<String>,
    pub subscribers: u64,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ChannelPayload {
    /// Convert into [`ChannelData`], newest message first, at most `limit` messages.
    pub fn into_channel_data(self, limit: usize, avatar_path: Option<PathBuf>) -> ChannelData {
        let mut messages = self.messages;
        messages.sort_by(|a, b| b.date.cmp(&a.date));
        messages.truncate(limit);

        ChannelData {
            channel_id: self.id,
            title: self.title,
            handle: self.username.filter(|u| !u.is_empty()),
            subscriber_count: self.subscribers,
            messages,
            avatar_path,
        }
    }
}

/// Unique avatar location for a channel inside `dir`.
pub(crate) fn avatar_target(dir: &Path, channel_id: i64) -> PathBuf {
    dir.join(format!("{}_{}.jpg", channel_id, uuid::Uuid::new_v4()))
}

/// Write avatar bytes for `channel_id` into `dir` and return the new file.
///
/// The bytes land in a `.part` file that is renamed into place once
/// complete. A failed write leaves nothing behind, and neither does a
/// dropped future (a fetch that hit its timeout mid-write).
pub(crate) async fn store_avatar(dir: &Path, channel_id: i64, bytes: Vec<u8>) -> Result<PathBuf> {
    let guard = AvatarWriteGuard::new(avatar_target(dir, channel_id));
    let dir = dir.to_path_buf();
    let partial = guard.partial.clone();
    let target = guard.target.clone();
    let abandoned = guard.abandoned.clone();

    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        std::fs::create_dir_all(&dir)?;
        let written = std::fs::write(&partial, &bytes).and_then(|()| {
            if abandoned.load(Ordering::SeqCst) {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::Interrupted,
                    "avatar write abandoned",
                ));
            }
            std::fs::rename(&partial, &target)
        });
        if written.is_err() {
            let _ = std::fs::remove_file(&partial);
        }
        written
    })
    .await
    .map_err(|e| Error::Upstream(format!("avatar write task failed: {}", e)))??;

    Ok(guard.commit())
}

/// Removes a half-written avatar unless the write was committed.
///
/// The blocking write outlives a dropped future, so the guard also flags
/// the write as abandoned; the writer then skips the rename.
struct AvatarWriteGuard {
    target: PathBuf,
    partial: PathBuf,
    abandoned: Arc<AtomicBool>,
    committed: bool,
}

impl AvatarWriteGuard {
    fn new(target: PathBuf) -> Self {
        let mut partial = target.clone().into_os_string();
        partial.push(".part");
        Self {
            target,
            partial: PathBuf::from(partial),
            abandoned: Arc::new(AtomicBool::new(false)),
            committed: false,
        }
    }

    fn commit(mut self) -> PathBuf {
        self.committed = true;
        self.target.clone()
    }
}

impl Drop for AvatarWriteGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.abandoned.store(true, Ordering::SeqCst);
        // Partial first: once it is gone the writer cannot rename it into place
        let _ = std::fs::remove_file(&self.partial);
        let _ = std::fs::remove_file(&self.target);
    }
}
