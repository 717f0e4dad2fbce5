//! Telegram channel reference parsing.
//!
//! Callers pass channel references in whatever form users type them:
//! `https://t.me/rustnews`, `t.me/rustnews/42`, `@rustnews`, `rustnews`,
//! or a private invite link such as `https://t.me/+AbCdEf`.

use crate::error::{Error, Result};
use std::fmt;

const TELEGRAM_HOSTS: &[&str] = &["t.me", "telegram.me"];

/// A parsed channel reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelRef {
    /// Public channel by handle (without `@`)
    Public(String),
    /// Private channel by invite hash
    Invite(String),
}

impl ChannelRef {
    /// Parse a user-supplied reference.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidReference("empty reference".to_string()));
        }

        if let Some(handle) = trimmed.strip_prefix('@') {
            return Self::public(handle, input);
        }

        let without_scheme = strip_scheme(trimmed);
        if !without_scheme.contains('/') && !without_scheme.contains('.') {
            return Self::public(without_scheme, input);
        }

        let (host, path) = without_scheme
            .split_once('/')
            .unwrap_or((without_scheme, ""));
        let host = host.to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        if !TELEGRAM_HOSTS.contains(&host) {
            return Err(Error::InvalidReference(format!(
                "{} is not a Telegram link",
                input.trim()
            )));
        }

        let path = path.split(['?', '#']).next().unwrap_or_default();
        let mut segments = path.split('/').filter(|s| !s.is_empty());

        match segments.next() {
            Some(first) if first.starts_with('+') => Self::invite(&first[1..], input),
            Some("joinchat") => Self::invite(segments.next().unwrap_or_default(), input),
            // Web preview links: t.me/s/<handle>
            Some("s") => Self::public(segments.next().unwrap_or_default(), input),
            Some(handle) => Self::public(handle, input),
            None => Err(Error::InvalidReference(format!(
                "{} does not name a channel",
                input.trim()
            ))),
        }
    }

    /// The public handle, if this is not an invite link.
    pub fn handle(&self) -> Option<&str> {
        match self {
            ChannelRef::Public(handle) => Some(handle),
            ChannelRef::Invite(_) => None,
        }
    }

    /// Form used in gateway URLs and fixture file names.
    pub fn path_segment(&self) -> String {
        match self {
            ChannelRef::Public(handle) => handle.clone(),
            ChannelRef::Invite(hash) => format!("+{}", hash),
        }
    }

    fn public(handle: &str, original: &str) -> Result<Self> {
        if is_valid_handle(handle) {
            Ok(ChannelRef::Public(handle.to_string()))
        } else {
            Err(Error::InvalidReference(format!(
                "{} is not a valid channel handle",
                original.trim()
            )))
        }
    }

    fn invite(hash: &str, original: &str) -> Result<Self> {
        let valid = !hash.is_empty()
            && hash
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(ChannelRef::Invite(hash.to_string()))
        } else {
            Err(Error::InvalidReference(format!(
                "{} is not a valid invite link",
                original.trim()
            )))
        }
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "https://t.me/{}", self.path_segment())
    }
}

/// Whether a URL points at a Telegram domain.
///
/// Bare handles are not URLs and return `false`; use [`ChannelRef::parse`]
/// to accept those as well.
pub fn is_telegram_url(input: &str) -> bool {
    let without_scheme = strip_scheme(input.trim());
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    TELEGRAM_HOSTS.contains(&host)
}

fn strip_scheme(input: &str) -> &str {
    for scheme in ["https://", "http://"] {
        if input.len() >= scheme.len() && input[..scheme.len()].eq_ignore_ascii_case(scheme) {
            return &input[scheme.len()..];
        }
    }
    input
}

/// Telegram usernames: 5-32 chars of `[A-Za-z0-9_]`, starting with a letter.
fn is_valid_handle(handle: &str) -> bool {
    let len = handle.chars().count();
    (5..=32).contains(&len)
        && handle.starts_with(|c: char| c.is_ascii_alphabetic())
        && handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
