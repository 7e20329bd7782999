//! Packet rate and sequence-loss statistics.
//!
//! Each universe keeps lifetime counters, a per-source table keyed by CID and
//! two sliding windows: packet arrivals (rate) and loss events (recent loss).
//! Recording for one universe takes that universe's write lock only, so
//! universes never contend with each other while sources sharing a universe
//! are serialised.

mod sequence;
mod window;

pub use sequence::{SOURCE_RESTART_THRESHOLD, SequenceOutcome, classify, forward_gap};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use window::SlidingWindow;

/// Window used for packets-per-second.
pub const RATE_WINDOW: Duration = Duration::from_secs(1);
/// Window used for recent loss percentage.
pub const LOSS_WINDOW: Duration = Duration::from_secs(60);

/// Tunables for [`StatsTracker`]; the defaults match the E1.31 monitor
/// conventions (1 s rate window, 60 s loss window, restart at gap 200).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    pub rate_window: Duration,
    pub loss_window: Duration,
    pub restart_threshold: u16,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            rate_window: RATE_WINDOW,
            loss_window: LOSS_WINDOW,
            restart_threshold: SOURCE_RESTART_THRESHOLD,
        }
    }
}

/// One transmitter seen on a universe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub cid: Uuid,
    pub name: String,
    pub last_sequence: u8,
    pub last_seen: Instant,
    pub packet_count: u64,
    pub lost_packets: u64,
}

impl SourceInfo {
    pub fn loss_percentage(&self) -> f64 {
        loss_percentage(self.lost_packets, self.packet_count)
    }
}

/// Lifetime counters and sources of one universe.
#[derive(Debug, Clone, PartialEq)]
pub struct UniverseStatsInfo {
    pub universe: u16,
    pub packet_count: u64,
    pub lost_packets: u64,
    pub last_packet: Option<Instant>,
    pub sources: Vec<SourceInfo>,
}

#[derive(Debug, Clone, Copy)]
struct LossEvent {
    received: u64,
    lost: u64,
}

#[derive(Debug)]
struct UniverseStats {
    packet_count: u64,
    lost_packets: u64,
    last_packet: Option<Instant>,
    sources: HashMap<Uuid, SourceInfo>,
    arrivals: SlidingWindow<()>,
    losses: SlidingWindow<LossEvent>,
}

impl UniverseStats {
    fn new(config: &TrackerConfig) -> Self {
        Self {
            packet_count: 0,
            lost_packets: 0,
            last_packet: None,
            sources: HashMap::new(),
            arrivals: SlidingWindow::new(config.rate_window),
            losses: SlidingWindow::new(config.loss_window),
        }
    }

    fn sorted_sources(&self) -> Vec<SourceInfo> {
        let mut sources: Vec<SourceInfo> = self.sources.values().cloned().collect();
        sources.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.cid.cmp(&b.cid)));
        sources
    }
}

type StatsEntry = Arc<RwLock<UniverseStats>>;

/// Concurrent statistics registry.
///
/// # Examples
/// ```
/// use std::time::{Duration, Instant};
///
/// use sacnwatch_core::StatsTracker;
/// use uuid::Uuid;
///
/// let tracker = StatsTracker::new();
/// let cid = Uuid::from_bytes([1; 16]);
/// let t0 = Instant::now();
/// tracker.record_packet_at(1, cid, "desk", 0, t0);
/// tracker.record_packet_at(1, cid, "desk", 3, t0 + Duration::from_millis(20));
/// assert_eq!(tracker.loss_percentage(1), 50.0);
/// ```
#[derive(Debug, Default)]
pub struct StatsTracker {
    config: TrackerConfig,
    universes: RwLock<HashMap<u16, StatsEntry>>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TrackerConfig) -> Self {
        Self {
            config,
            universes: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn entry(&self, universe: u16) -> Option<StatsEntry> {
        self.universes.read().get(&universe).map(Arc::clone)
    }

    fn entry_or_insert(&self, universe: u16) -> StatsEntry {
        if let Some(entry) = self.entry(universe) {
            return entry;
        }
        let mut universes = self.universes.write();
        Arc::clone(
            universes
                .entry(universe)
                .or_insert_with(|| Arc::new(RwLock::new(UniverseStats::new(&self.config)))),
        )
    }

    pub fn record_packet(
        &self,
        universe: u16,
        cid: Uuid,
        source_name: &str,
        sequence: u8,
    ) -> SequenceOutcome {
        self.record_packet_at(universe, cid, source_name, sequence, Instant::now())
    }

    /// Record one packet received at `now`.
    ///
    /// Packets for the same universe must be recorded in arrival order for
    /// the loss figures to be meaningful.
    pub fn record_packet_at(
        &self,
        universe: u16,
        cid: Uuid,
        source_name: &str,
        sequence: u8,
        now: Instant,
    ) -> SequenceOutcome {
        let entry = self.entry_or_insert(universe);
        let mut stats = entry.write();

        stats.packet_count += 1;
        stats.last_packet = Some(now);
        stats.arrivals.push(now, ());

        let source = stats.sources.entry(cid).or_insert_with(|| SourceInfo {
            cid,
            name: source_name.to_string(),
            last_sequence: sequence,
            last_seen: now,
            packet_count: 0,
            lost_packets: 0,
        });

        let outcome = if source.packet_count > 0 {
            classify(source.last_sequence, sequence, self.config.restart_threshold)
        } else {
            SequenceOutcome::InOrder
        };
        if outcome == SequenceOutcome::Restart {
            debug!(
                universe,
                cid = %cid,
                last = source.last_sequence,
                sequence,
                "source sequence restart"
            );
        }

        let lost = outcome.lost();
        source.lost_packets += lost;
        source.last_sequence = sequence;
        source.last_seen = now;
        source.packet_count += 1;
        if source.name != source_name {
            source.name = source_name.to_string();
        }

        stats.lost_packets += lost;
        stats.losses.push(now, LossEvent { received: 1, lost });
        outcome
    }

    pub fn packet_rate(&self, universe: u16) -> f64 {
        self.packet_rate_at(universe, Instant::now())
    }

    /// Packets per second over the rate window ending at `now`.
    pub fn packet_rate_at(&self, universe: u16, now: Instant) -> f64 {
        let Some(entry) = self.entry(universe) else {
            return 0.0;
        };
        let stats = entry.read();
        let count = stats.arrivals.live(now).count();
        count as f64 / stats.arrivals.span().as_secs_f64()
    }

    /// Lifetime loss percentage for a universe.
    pub fn loss_percentage(&self, universe: u16) -> f64 {
        let Some(entry) = self.entry(universe) else {
            return 0.0;
        };
        let stats = entry.read();
        loss_percentage(stats.lost_packets, stats.packet_count)
    }

    pub fn recent_loss_percentage(&self, universe: u16) -> f64 {
        self.recent_loss_percentage_at(universe, Instant::now())
    }

    /// Loss percentage restricted to the loss window ending at `now`.
    pub fn recent_loss_percentage_at(&self, universe: u16, now: Instant) -> f64 {
        let Some(entry) = self.entry(universe) else {
            return 0.0;
        };
        let stats = entry.read();
        let (received, lost) = stats
            .losses
            .live(now)
            .fold((0u64, 0u64), |(received, lost), event| {
                (received + event.received, lost + event.lost)
            });
        loss_percentage(lost, received)
    }

    pub fn source_loss_percentage(&self, universe: u16, cid: Uuid) -> f64 {
        self.entry(universe)
            .and_then(|entry| entry.read().sources.get(&cid).map(SourceInfo::loss_percentage))
            .unwrap_or(0.0)
    }

    /// Sources seen on a universe, sorted by name then CID.
    pub fn sources(&self, universe: u16) -> Vec<SourceInfo> {
        self.entry(universe)
            .map(|entry| entry.read().sorted_sources())
            .unwrap_or_default()
    }

    pub fn universe_stats(&self, universe: u16) -> Option<UniverseStatsInfo> {
        let entry = self.entry(universe)?;
        let stats = entry.read();
        Some(UniverseStatsInfo {
            universe,
            packet_count: stats.packet_count,
            lost_packets: stats.lost_packets,
            last_packet: stats.last_packet,
            sources: stats.sorted_sources(),
        })
    }

    /// Tracked universe IDs in ascending order.
    pub fn universe_ids(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.universes.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Zero a universe's counters and windows. Sources stay listed with
    /// their names; their next packet is treated as a first packet.
    pub fn reset_universe(&self, universe: u16) {
        let Some(entry) = self.entry(universe) else {
            return;
        };
        let mut stats = entry.write();
        stats.packet_count = 0;
        stats.lost_packets = 0;
        stats.arrivals.clear();
        stats.losses.clear();
        for source in stats.sources.values_mut() {
            source.packet_count = 0;
            source.lost_packets = 0;
        }
    }

    /// Forget every universe and source.
    pub fn reset_all(&self) {
        self.universes.write().clear();
    }
}

fn loss_percentage(lost: u64, received: u64) -> f64 {
    let expected = received + lost;
    if expected == 0 {
        return 0.0;
    }
    lost as f64 / expected as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use uuid::Uuid;

    use super::{SequenceOutcome, StatsTracker, TrackerConfig};

    fn cid(byte: u8) -> Uuid {
        Uuid::from_bytes([byte; 16])
    }

    fn record_all(tracker: &StatsTracker, universe: u16, source: Uuid, sequences: &[u8]) {
        let t0 = Instant::now();
        for (idx, seq) in sequences.iter().enumerate() {
            let at = t0 + Duration::from_millis(idx as u64);
            tracker.record_packet_at(universe, source, "src", *seq, at);
        }
    }

    #[test]
    fn gap_is_counted_at_source_and_universe() {
        let tracker = StatsTracker::new();
        record_all(&tracker, 1, cid(1), &[0, 5]);
        let stats = tracker.universe_stats(1).unwrap();
        assert_eq!(stats.lost_packets, 4);
        assert_eq!(stats.packet_count, 2);
        assert_eq!(stats.sources[0].lost_packets, 4);
    }

    #[test]
    fn wraparound_gap() {
        let tracker = StatsTracker::new();
        record_all(&tracker, 1, cid(1), &[254, 1]);
        assert_eq!(tracker.universe_stats(1).unwrap().lost_packets, 2);
    }

    #[test]
    fn restart_records_no_loss() {
        let tracker = StatsTracker::new();
        let t0 = Instant::now();
        tracker.record_packet_at(1, cid(1), "src", 100, t0);
        let outcome = tracker.record_packet_at(1, cid(1), "src", 50, t0);
        assert_eq!(outcome, SequenceOutcome::Restart);
        assert_eq!(tracker.universe_stats(1).unwrap().lost_packets, 0);
        assert_eq!(tracker.loss_percentage(1), 0.0);
    }

    #[test]
    fn first_packet_never_counts_loss() {
        let tracker = StatsTracker::new();
        let outcome = tracker.record_packet(9, cid(1), "src", 77);
        assert_eq!(outcome, SequenceOutcome::InOrder);
        assert_eq!(tracker.loss_percentage(9), 0.0);
    }

    #[test]
    fn cumulative_loss_percentage_is_exact() {
        let tracker = StatsTracker::new();
        record_all(&tracker, 1, cid(1), &[0, 3]);
        assert_eq!(tracker.loss_percentage(1), 50.0);
        assert_eq!(tracker.source_loss_percentage(1, cid(1)), 50.0);
    }

    #[test]
    fn unknown_universe_and_source_report_zero() {
        let tracker = StatsTracker::new();
        assert_eq!(tracker.packet_rate(3), 0.0);
        assert_eq!(tracker.loss_percentage(3), 0.0);
        assert_eq!(tracker.recent_loss_percentage(3), 0.0);
        assert_eq!(tracker.source_loss_percentage(3, cid(1)), 0.0);
        assert!(tracker.sources(3).is_empty());
        assert!(tracker.universe_stats(3).is_none());
    }

    #[test]
    fn sources_are_tracked_independently() {
        let tracker = StatsTracker::new();
        let t0 = Instant::now();
        tracker.record_packet_at(1, cid(1), "alpha", 0, t0);
        tracker.record_packet_at(1, cid(2), "beta", 200, t0);
        tracker.record_packet_at(1, cid(1), "alpha", 1, t0);
        tracker.record_packet_at(1, cid(2), "beta", 203, t0);

        let sources = tracker.sources(1);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name, "alpha");
        assert_eq!(sources[0].lost_packets, 0);
        assert_eq!(sources[1].name, "beta");
        assert_eq!(sources[1].lost_packets, 2);
        assert_eq!(tracker.universe_stats(1).unwrap().lost_packets, 2);
    }

    #[test]
    fn source_name_follows_latest_packet() {
        let tracker = StatsTracker::new();
        tracker.record_packet(1, cid(1), "before", 0);
        tracker.record_packet(1, cid(1), "after", 1);
        assert_eq!(tracker.sources(1)[0].name, "after");
    }

    #[test]
    fn rate_counts_packets_inside_window() {
        let tracker = StatsTracker::new();
        let t0 = Instant::now();
        for i in 0..40u8 {
            let at = t0 + Duration::from_millis(u64::from(i) * 50);
            tracker.record_packet_at(1, cid(1), "src", i, at);
        }
        // last packet at 1950 ms; window (0.95 s, 1.95 s] holds 20 packets
        let now = t0 + Duration::from_millis(1950);
        assert_eq!(tracker.packet_rate_at(1, now), 20.0);
        assert_eq!(tracker.packet_rate_at(1, now + Duration::from_secs(2)), 0.0);
    }

    #[test]
    fn recent_loss_forgets_old_events() {
        let tracker = StatsTracker::with_config(TrackerConfig {
            loss_window: Duration::from_secs(10),
            ..TrackerConfig::default()
        });
        let t0 = Instant::now();
        tracker.record_packet_at(1, cid(1), "src", 0, t0);
        tracker.record_packet_at(1, cid(1), "src", 2, t0 + Duration::from_secs(1));
        assert_eq!(
            tracker.recent_loss_percentage_at(1, t0 + Duration::from_secs(1)),
            1.0 / 3.0 * 100.0
        );

        let later = t0 + Duration::from_secs(20);
        tracker.record_packet_at(1, cid(1), "src", 3, later);
        assert_eq!(tracker.recent_loss_percentage_at(1, later), 0.0);
        assert_eq!(tracker.loss_percentage(1), 25.0);
    }

    #[test]
    fn reset_universe_keeps_source_identity() {
        let tracker = StatsTracker::new();
        record_all(&tracker, 1, cid(1), &[0, 5]);
        tracker.reset_universe(1);

        let stats = tracker.universe_stats(1).unwrap();
        assert_eq!(stats.packet_count, 0);
        assert_eq!(stats.lost_packets, 0);
        assert_eq!(stats.sources.len(), 1);
        assert_eq!(stats.sources[0].cid, cid(1));
        assert_eq!(stats.sources[0].name, "src");
        assert_eq!(stats.sources[0].packet_count, 0);
        assert_eq!(tracker.packet_rate(1), 0.0);

        // counter restarted, so a jump after reset is not loss
        tracker.record_packet(1, cid(1), "src", 90);
        assert_eq!(tracker.loss_percentage(1), 0.0);
    }

    #[test]
    fn reset_all_forgets_universes() {
        let tracker = StatsTracker::new();
        record_all(&tracker, 1, cid(1), &[0, 1]);
        record_all(&tracker, 2, cid(1), &[0, 1]);
        assert_eq!(tracker.universe_ids(), vec![1, 2]);
        tracker.reset_all();
        assert!(tracker.universe_ids().is_empty());
        assert!(tracker.sources(1).is_empty());
    }
}
