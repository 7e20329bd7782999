//! Ingestion: drain a packet source into the universe and statistics state.
//!
//! A single ingestion path keeps packets in decode order. Each packet is
//! applied at its `received_at` stamp, not at the time it leaves the queue.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::source::{PacketSource, ReceivedPacket, SourceError};
use crate::stats::StatsTracker;
use crate::universe::UniverseManager;

/// Apply one packet to both consumers.
pub fn apply_packet(received: &ReceivedPacket, universes: &UniverseManager, stats: &StatsTracker) {
    let packet = &received.packet;
    universes.update_at(
        packet.universe,
        &packet.channel_data,
        &packet.source_name,
        packet.cid,
        packet.priority,
        packet.sequence,
        received.received_at,
    );
    stats.record_packet_at(
        packet.universe,
        packet.cid,
        &packet.source_name,
        packet.sequence,
        received.received_at,
    );
}

/// Drain `source` until it is exhausted. Returns the number of packets applied.
///
/// # Examples
/// ```
/// use std::net::{Ipv4Addr, SocketAddr};
/// use std::time::Instant;
///
/// use sacnwatch_core::{ReceivedPacket, SacnPacket, StatsTracker, UniverseManager, ingest};
///
/// let (tx, mut rx) = crossbeam_channel::unbounded();
/// tx.send(ReceivedPacket {
///     packet: SacnPacket {
///         cid: uuid::Uuid::nil(),
///         source_name: "desk".to_string(),
///         priority: 100,
///         sequence: 0,
///         universe: 1,
///         start_code: 0,
///         channel_data: vec![255],
///     },
///     received_at: Instant::now(),
///     source_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 5568)),
/// })
/// .unwrap();
/// drop(tx);
///
/// let universes = UniverseManager::new();
/// let stats = StatsTracker::new();
/// assert_eq!(ingest(&mut rx, &universes, &stats).unwrap(), 1);
/// assert_eq!(universes.active_channel_count(1), Some(1));
/// ```
pub fn ingest<S: PacketSource + ?Sized>(
    source: &mut S,
    universes: &UniverseManager,
    stats: &StatsTracker,
) -> Result<u64, SourceError> {
    let mut applied = 0u64;
    while let Some(received) = source.next_packet()? {
        apply_packet(&received, universes, stats);
        applied += 1;
    }
    debug!(applied, "ingestion finished");
    Ok(applied)
}

/// Run [`ingest`] on a dedicated thread. The thread ends once `source` is
/// exhausted, e.g. when a receiver queue closes after `stop`.
pub fn spawn_ingest<S>(
    mut source: S,
    universes: Arc<UniverseManager>,
    stats: Arc<StatsTracker>,
) -> io::Result<JoinHandle<Result<u64, SourceError>>>
where
    S: PacketSource + Send + 'static,
{
    thread::Builder::new()
        .name("sacn-ingest".to_string())
        .spawn(move || ingest(&mut source, &universes, &stats))
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddr};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use uuid::Uuid;

    use super::{apply_packet, spawn_ingest};
    use crate::protocols::sacn::SacnPacket;
    use crate::source::ReceivedPacket;
    use crate::stats::StatsTracker;
    use crate::universe::UniverseManager;

    fn received(universe: u16, sequence: u8, at: Instant) -> ReceivedPacket {
        ReceivedPacket {
            packet: SacnPacket {
                cid: Uuid::from_bytes([7; 16]),
                source_name: "rack".to_string(),
                priority: 90,
                sequence,
                universe,
                start_code: 0,
                channel_data: vec![10, 20],
            },
            received_at: at,
            source_addr: SocketAddr::from((Ipv4Addr::new(10, 0, 0, 2), 5568)),
        }
    }

    #[test]
    fn apply_updates_state_and_stats_at_receipt_time() {
        let universes = UniverseManager::new();
        let stats = StatsTracker::new();
        let t0 = Instant::now();

        apply_packet(&received(3, 10, t0), &universes, &stats);
        apply_packet(&received(3, 13, t0 + Duration::from_millis(20)), &universes, &stats);

        let universe = universes.get(3).unwrap();
        assert_eq!(universe.packet_count, 2);
        assert_eq!(universe.last_sequence, 13);
        assert_eq!(universe.priority, 90);
        assert_eq!(universe.last_packet, Some(t0 + Duration::from_millis(20)));

        let info = stats.universe_stats(3).unwrap();
        assert_eq!(info.packet_count, 2);
        assert_eq!(info.lost_packets, 2);
        assert_eq!(stats.packet_rate_at(3, t0 + Duration::from_millis(500)), 2.0);
    }

    #[test]
    fn spawned_ingest_ends_when_queue_closes() {
        let universes = Arc::new(UniverseManager::new());
        let stats = Arc::new(StatsTracker::new());
        let (tx, rx) = crossbeam_channel::bounded(8);
        let handle = spawn_ingest(rx, Arc::clone(&universes), Arc::clone(&stats)).unwrap();

        let t0 = Instant::now();
        for seq in 0..5u8 {
            tx.send(received(1, seq, t0)).unwrap();
        }
        drop(tx);

        assert_eq!(handle.join().unwrap().unwrap(), 5);
        assert_eq!(universes.get(1).unwrap().packet_count, 5);
        assert_eq!(stats.loss_percentage(1), 0.0);
    }
}
