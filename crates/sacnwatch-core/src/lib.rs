//! sacnwatch core library: live E1.31 (sACN) monitoring.
//!
//! The pipeline is receiver -> decoded-packet queue -> ingestion, which feeds
//! two independent consumers: the universe state manager (last known channel
//! levels) and the statistics tracker (packet rate and sequence loss).
//! Decoding follows the layout/reader/parser split used by the protocol
//! modules and is free of I/O; sockets live in `receiver`.
//!
//! Invariants:
//! - Packets are applied in decode order by a single ingestion path.
//! - Every query returns a copy; no caller holds a handle into shared state.
//! - Sliding windows use one inclusion rule: `now - t < span`.
//!
//! # Examples
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Instant;
//!
//! use sacnwatch_core::{
//!     Receiver, ReceiverConfig, SnapshotOptions, StatsTracker, UniverseManager, build_snapshot,
//!     spawn_ingest,
//! };
//!
//! let universes = Arc::new(UniverseManager::new());
//! let stats = Arc::new(StatsTracker::new());
//! let receiver = Receiver::new(ReceiverConfig::default());
//! receiver.start()?;
//! let ingest = spawn_ingest(receiver.packets(), Arc::clone(&universes), Arc::clone(&stats))?;
//!
//! std::thread::sleep(std::time::Duration::from_secs(1));
//! let snapshot = build_snapshot(&universes, &stats, &SnapshotOptions::default(), Instant::now());
//! println!("{} universes", snapshot.universes.len());
//!
//! receiver.stop();
//! let _ = ingest.join();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod ingest;
pub mod protocols;
mod receiver;
mod snapshot;
mod source;
mod stats;
mod universe;

pub use ingest::{apply_packet, ingest, spawn_ingest};
pub use protocols::sacn::{SACN_PORT, SacnError, SacnPacket, parse_sacn_packet};
pub use receiver::{
    DEFAULT_JOIN_UNIVERSES, Receiver, ReceiverConfig, ReceiverError, multicast_group,
    multicast_interfaces,
};
pub use snapshot::{
    DEFAULT_GENERATED_AT, DEFAULT_STALE_TIMEOUT, MonitorSnapshot, REPORT_VERSION, SnapshotOptions,
    SourceSummary, ToolInfo, UniverseSummary, build_snapshot, now_rfc3339,
};
pub use source::{PacketSource, ReceivedPacket, SourceError};
pub use stats::{
    LOSS_WINDOW, RATE_WINDOW, SOURCE_RESTART_THRESHOLD, SequenceOutcome, SourceInfo, StatsTracker,
    TrackerConfig, UniverseStatsInfo, classify, forward_gap,
};
pub use universe::{CHANNELS_PER_UNIVERSE, Channel, Universe, UniverseManager};
