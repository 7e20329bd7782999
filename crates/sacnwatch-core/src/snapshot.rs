//! Serializable, read-only view of the monitor state.
//!
//! A snapshot is assembled from copies handed out by the registries, so
//! building one never blocks ingestion for longer than a single entry read.
//! Universe order is ascending by ID; sources are ordered by name then CID.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::stats::{SourceInfo, StatsTracker};
use crate::universe::{Universe, UniverseManager};

/// Current snapshot schema version.
pub const REPORT_VERSION: u32 = 1;
/// Default timestamp used when no wall-clock time is available.
pub const DEFAULT_GENERATED_AT: &str = "1970-01-01T00:00:00Z";
/// Idle time after which a universe is reported as stale.
pub const DEFAULT_STALE_TIMEOUT: Duration = Duration::from_secs(5);

/// Knobs for [`build_snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotOptions {
    pub stale_timeout: Duration,
    /// Include channel levels up to the highest active channel.
    pub include_channels: bool,
    /// RFC3339 time written into the snapshot header.
    pub generated_at: String,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            stale_timeout: DEFAULT_STALE_TIMEOUT,
            include_channels: false,
            generated_at: DEFAULT_GENERATED_AT.to_string(),
        }
    }
}

/// Snapshot of every tracked universe.
///
/// # Examples
/// ```
/// use std::time::Instant;
///
/// use sacnwatch_core::{SnapshotOptions, StatsTracker, UniverseManager, build_snapshot};
///
/// let universes = UniverseManager::new();
/// let stats = StatsTracker::new();
/// let snapshot = build_snapshot(&universes, &stats, &SnapshotOptions::default(), Instant::now());
/// assert_eq!(snapshot.report_version, sacnwatch_core::REPORT_VERSION);
/// assert!(snapshot.universes.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    /// Snapshot schema version (not the binary version).
    pub report_version: u32,
    pub tool: ToolInfo,
    /// RFC3339 timestamp.
    pub generated_at: String,
    /// Packets the receiver discarded because the queue was full.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dropped_packets: Option<u64>,
    pub universes: Vec<UniverseSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

impl Default for ToolInfo {
    fn default() -> Self {
        Self {
            name: "sacnwatch".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Per-universe metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseSummary {
    pub universe: u16,
    /// Name of the source that wrote last.
    pub source_name: String,
    /// CID of the source that wrote last, hyphenated lowercase.
    pub cid: String,
    pub priority: u8,
    pub last_sequence: u8,
    pub packets_total: u64,
    pub active_channels: usize,
    /// Milliseconds since the last packet; absent when none was seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_ms: Option<u64>,
    pub stale: bool,
    pub packets_per_second: f64,
    pub loss_percent: f64,
    pub recent_loss_percent: f64,
    pub lost_packets: u64,
    pub sources: Vec<SourceSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub cid: String,
    pub name: String,
    pub last_sequence: u8,
    pub packets: u64,
    pub lost_packets: u64,
    pub loss_percent: f64,
    pub idle_ms: u64,
}

/// Build a snapshot of all universes as seen at `now`.
pub fn build_snapshot(
    universes: &UniverseManager,
    stats: &StatsTracker,
    options: &SnapshotOptions,
    now: Instant,
) -> MonitorSnapshot {
    MonitorSnapshot {
        report_version: REPORT_VERSION,
        tool: ToolInfo::default(),
        generated_at: options.generated_at.clone(),
        dropped_packets: None,
        universes: universes
            .get_all()
            .iter()
            .map(|universe| summarize_universe(universe, stats, options, now))
            .collect(),
    }
}

fn summarize_universe(
    universe: &Universe,
    stats: &StatsTracker,
    options: &SnapshotOptions,
    now: Instant,
) -> UniverseSummary {
    let id = universe.id;
    let info = stats.universe_stats(id);
    UniverseSummary {
        universe: id,
        source_name: universe.source_name.clone(),
        cid: universe.source_cid.hyphenated().to_string(),
        priority: universe.priority,
        last_sequence: universe.last_sequence,
        packets_total: universe.packet_count,
        active_channels: universe.active_channel_count(),
        idle_ms: universe.last_packet.map(|last| idle_ms(last, now)),
        stale: universe.is_stale_at(options.stale_timeout, now),
        packets_per_second: stats.packet_rate_at(id, now),
        loss_percent: stats.loss_percentage(id),
        recent_loss_percent: stats.recent_loss_percentage_at(id, now),
        lost_packets: info.as_ref().map_or(0, |info| info.lost_packets),
        sources: info
            .map(|info| {
                info.sources
                    .iter()
                    .map(|source| summarize_source(source, now))
                    .collect()
            })
            .unwrap_or_default(),
        channels: options.include_channels.then(|| universe.active_levels()),
    }
}

fn summarize_source(source: &SourceInfo, now: Instant) -> SourceSummary {
    SourceSummary {
        cid: source.cid.hyphenated().to_string(),
        name: source.name.clone(),
        last_sequence: source.last_sequence,
        packets: source.packet_count,
        lost_packets: source.lost_packets,
        loss_percent: source.loss_percentage(),
        idle_ms: idle_ms(source.last_seen, now),
    }
}

fn idle_ms(last: Instant, now: Instant) -> u64 {
    u64::try_from(now.saturating_duration_since(last).as_millis()).unwrap_or(u64::MAX)
}

/// Current wall-clock time as RFC3339, falling back to the epoch default.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| DEFAULT_GENERATED_AT.to_string())
}
