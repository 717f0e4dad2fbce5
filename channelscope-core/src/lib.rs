//! # channelscope-core
//!
//! Core library for channelscope - engagement analytics for Telegram channels.
//!
//! This library provides:
//! - Domain types for channel messages and analytics snapshots
//! - The metrics engine (views, engagement, cadence, top/flop posts)
//! - A fetch-and-cache coordinator over pluggable upstream sources
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! - **Upstream** ([`upstream`]): fetches channel metadata and recent messages
//! - **Engine** ([`analytics`]): pure computation from messages to metrics
//! - **Coordinator** ([`coordinator`]): cache check, fetch, compute, store
//!
//! ## Example
//!
//! ```rust,no_run
//! use channelscope_core::{create_source, BlockingCoordinator, Config, SnapshotCoordinator};
//!
//! let config = Config::load().expect("failed to load config");
//! let source = create_source(&config.upstream).expect("invalid upstream config");
//! let coordinator = BlockingCoordinator::new(SnapshotCoordinator::from_config(source, &config))
//!     .expect("failed to start runtime");
//!
//! if let Some(snapshot) = coordinator.get("https://t.me/rustnews", true, false) {
//!     println!("{}: {} avg views", snapshot.name, snapshot.avg_views);
//! }
//! ```

// Re-export commonly used items at the crate root
pub use cache::{CacheKey, SnapshotCache};
pub use config::Config;
pub use coordinator::{BlockingCoordinator, CoordinatorStats, SnapshotCoordinator};
pub use error::{Error, Result};
pub use reference::ChannelRef;
pub use types::*;
pub use upstream::{create_source, ChannelSource};

// Public modules
pub mod analytics;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod format;
pub mod logging;
pub mod reference;
pub mod types;
pub mod upstream;
