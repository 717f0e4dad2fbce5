//! Channel source reading JSON files from a directory.
//!
//! `{fixture_dir}/{handle}.json` (or `+{hash}.json` for invite links) holds
//! one channel payload. A payload's `avatar_url` is a path relative to the
//! fixture directory; the file is copied into the avatar directory so each
//! fetch hands out its own temporary avatar, like the gateway does.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use crate::reference::ChannelRef;
use crate::types::ChannelData;

use super::{store_avatar, ChannelPayload, ChannelSource};

/// Channel source backed by JSON fixture files.
pub struct FixtureSource {
    fixture_dir: PathBuf,
    avatar_dir: PathBuf,
    message_limit: usize,
    download_avatars: bool,
}

impl FixtureSource {
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let fixture_dir = config
            .fixture_dir
            .clone()
            .ok_or_else(|| Error::Config("upstream.fixture_dir is required".to_string()))?;

        Ok(Self {
            fixture_dir,
            avatar_dir: config.resolved_avatar_dir(),
            message_limit: config.message_limit,
            download_avatars: config.download_avatars,
        })
    }

    async fn copy_avatar(&self, channel_id: i64, relative: &str) -> Option<PathBuf> {
        let source = self.fixture_dir.join(relative);

        let copied = match tokio::fs::read(&source).await {
            Ok(bytes) => store_avatar(&self.avatar_dir, channel_id, bytes).await,
            Err(e) => Err(Error::from(e)),
        };

        match copied {
            Ok(target) => Some(target),
            Err(e) => {
                tracing::warn!(
                    channel_id,
                    source = %source.display(),
                    error = %e,
                    "Failed to copy fixture avatar"
                );
                None
            }
        }
    }
}

#[async_trait]
impl ChannelSource for FixtureSource {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn fetch_channel(&self, reference: &str, _elevated: bool) -> Result<ChannelData> {
        let channel = ChannelRef::parse(reference)?;
        let path = self
            .fixture_dir
            .join(format!("{}.json", channel.path_segment()));

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::ChannelNotFound(channel.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let payload: ChannelPayload = serde_json::from_str(&content)
            .map_err(|e| Error::Upstream(format!("invalid fixture {:?}: {}", path, e)))?;

        if payload.private {
            return Err(Error::ChannelPrivate(channel.to_string()));
        }

        let avatar_path = match (&payload.avatar_url, self.download_avatars) {
            (Some(relative), true) => self.copy_avatar(payload.id, relative).await,
            _ => None,
        };

        Ok(payload.into_channel_data(self.message_limit, avatar_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceKind;
    use tempfile::TempDir;

    fn source_for(dir: &TempDir) -> FixtureSource {
        FixtureSource::new(UpstreamConfig {
            source: SourceKind::Fixture,
            fixture_dir: Some(dir.path().to_path_buf()),
            avatar_dir: Some(dir.path().join("avatars")),
            message_limit: 2,
            ..Default::default()
        })
        .unwrap()
    }

    fn write(dir: &TempDir, name: &str, content: &str) {
        std::fs::write(dir.path().join(name), content).unwrap();
    }

    #[tokio::test]
    async fn test_reads_fixture_and_copies_avatar() {
        let dir = TempDir::new().unwrap();
        write(&dir, "face.jpg", "jpeg bytes");
        write(
            &dir,
            "rustnews.json",
            r#"{
                "id": 42, "title": "Rust News", "username": "rustnews", "subscribers": 900,
                "avatar_url": "face.jpg",
                "messages": [
                    {"id": 1, "channel_id": 42, "date": "2025-01-01T00:00:00Z", "views": 10},
                    {"id": 2, "channel_id": 42, "date": "2025-01-02T00:00:00Z", "views": 20},
                    {"id": 3, "channel_id": 42, "date": "2025-01-03T00:00:00Z", "views": 30}
                ]
            }"#,
        );

        let data = source_for(&dir)
            .fetch_channel("https://t.me/rustnews", true)
            .await
            .unwrap();

        assert_eq!(data.title, "Rust News");
        assert_eq!(data.subscriber_count, 900);
        assert_eq!(data.messages.len(), 2);
        assert_eq!(data.messages[0].id, 3);

        let avatar = data.avatar_path.expect("avatar copied");
        assert!(avatar.starts_with(dir.path().join("avatars")));
        assert_eq!(std::fs::read_to_string(avatar).unwrap(), "jpeg bytes");
    }

    #[tokio::test]
    async fn test_missing_fixture_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = source_for(&dir)
            .fetch_channel("@nosuchchannel", false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ChannelNotFound(_)));
    }

    #[tokio::test]
    async fn test_private_fixture() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "+secret.json",
            r#"{"id": 1, "title": "Hidden", "subscribers": 5, "private": true}"#,
        );
        let err = source_for(&dir)
            .fetch_channel("https://t.me/+secret", false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ChannelPrivate(_)));
    }

    #[tokio::test]
    async fn test_broken_fixture_is_upstream_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "brokenchan.json", "{ not json");
        let err = source_for(&dir)
            .fetch_channel("brokenchan", false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }
}
