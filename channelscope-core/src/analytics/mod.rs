//! Analytics module for channelscope
//!
//! Provides:
//! - The metrics engine ([`metrics`]): message batch to engagement statistics
//! - Snapshot assembly ([`snapshot`]): statistics plus channel metadata,
//!   with the elevated field set attached on request
//! - History points for tracked channels ([`history`])

pub mod history;
pub mod metrics;
pub mod snapshot;

pub use history::{refresh_tracked, HistoryPoint, RefreshOutcome};
pub use metrics::{compute_metrics, compute_metrics_at, ChannelMetrics};
pub use snapshot::build_snapshot;
