//! Per-universe channel state.
//!
//! The registry maps universe IDs to independently locked entries. The map
//! lock is held exclusively only while an entry is inserted or removed;
//! packet application holds it shared and locks just the affected entry.
//! Every read returns a copy.

mod state;

pub use state::{CHANNELS_PER_UNIVERSE, Channel, Universe};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

type UniverseEntry = Arc<RwLock<Universe>>;

/// Registry of every universe observed since startup (or since last pruned).
#[derive(Debug, Default)]
pub struct UniverseManager {
    universes: RwLock<BTreeMap<u16, UniverseEntry>>,
}

impl UniverseManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: u16) -> UniverseEntry {
        if let Some(entry) = self.universes.read().get(&id) {
            return Arc::clone(entry);
        }
        let mut universes = self.universes.write();
        Arc::clone(
            universes
                .entry(id)
                .or_insert_with(|| Arc::new(RwLock::new(Universe::new(id)))),
        )
    }

    /// Snapshot of the universe, creating an empty one on first reference.
    pub fn get_or_create(&self, id: u16) -> Universe {
        self.entry(id).read().clone()
    }

    pub fn get(&self, id: u16) -> Option<Universe> {
        let entry = self.universes.read().get(&id).map(Arc::clone)?;
        let universe = entry.read().clone();
        Some(universe)
    }

    /// Apply a packet payload stamped with the current time.
    pub fn update(
        &self,
        id: u16,
        channel_data: &[u8],
        source_name: &str,
        cid: Uuid,
        priority: u8,
        sequence: u8,
    ) {
        self.update_at(
            id,
            channel_data,
            source_name,
            cid,
            priority,
            sequence,
            Instant::now(),
        );
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update_at(
        &self,
        id: u16,
        channel_data: &[u8],
        source_name: &str,
        cid: Uuid,
        priority: u8,
        sequence: u8,
        now: Instant,
    ) {
        loop {
            // map read lock held across apply so a concurrent prune cannot
            // detach the entry between lookup and write
            {
                let universes = self.universes.read();
                if let Some(entry) = universes.get(&id) {
                    entry
                        .write()
                        .apply(channel_data, source_name, cid, priority, sequence, now);
                    return;
                }
            }
            self.universes
                .write()
                .entry(id)
                .or_insert_with(|| Arc::new(RwLock::new(Universe::new(id))));
        }
    }

    /// All universes, ascending by ID.
    pub fn get_all(&self) -> Vec<Universe> {
        self.entries()
            .iter()
            .map(|entry| entry.read().clone())
            .collect()
    }

    pub fn get_active(&self, timeout: Duration) -> Vec<Universe> {
        self.get_active_at(timeout, Instant::now())
    }

    /// Universes that received a packet within `timeout` of `now`, ascending by ID.
    pub fn get_active_at(&self, timeout: Duration, now: Instant) -> Vec<Universe> {
        self.entries()
            .iter()
            .filter_map(|entry| {
                let universe = entry.read();
                (!universe.is_stale_at(timeout, now)).then(|| universe.clone())
            })
            .collect()
    }

    /// Active channel count for one universe, `None` when unknown.
    pub fn active_channel_count(&self, id: u16) -> Option<usize> {
        let entry = self.universes.read().get(&id).map(Arc::clone)?;
        let count = entry.read().active_channel_count();
        Some(count)
    }

    pub fn prune_stale(&self, timeout: Duration) -> usize {
        self.prune_stale_at(timeout, Instant::now())
    }

    /// Remove every stale universe, including ones that never saw a packet.
    pub fn prune_stale_at(&self, timeout: Duration, now: Instant) -> usize {
        let mut universes = self.universes.write();
        let before = universes.len();
        universes.retain(|_, entry| !entry.read().is_stale_at(timeout, now));
        let pruned = before - universes.len();
        if pruned > 0 {
            debug!(pruned, remaining = universes.len(), "pruned stale universes");
        }
        pruned
    }

    pub fn remove(&self, id: u16) -> bool {
        self.universes.write().remove(&id).is_some()
    }

    pub fn count(&self) -> usize {
        self.universes.read().len()
    }

    fn entries(&self) -> Vec<UniverseEntry> {
        self.universes.read().values().map(Arc::clone).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;
    use std::time::{Duration, Instant};

    use uuid::Uuid;

    use super::UniverseManager;

    fn cid(byte: u8) -> Uuid {
        Uuid::from_bytes([byte; 16])
    }

    #[test]
    fn get_or_create_is_stable() {
        let manager = UniverseManager::new();
        let first = manager.get_or_create(4);
        assert_eq!(first.packet_count, 0);
        manager.update(4, &[1, 2], "desk", cid(1), 100, 0);
        let second = manager.get_or_create(4);
        assert_eq!(second.packet_count, 1);
        assert_eq!(manager.count(), 1);
    }

    #[test]
    fn get_does_not_create() {
        let manager = UniverseManager::new();
        assert!(manager.get(1).is_none());
        assert_eq!(manager.count(), 0);
        assert!(manager.active_channel_count(1).is_none());
    }

    #[test]
    fn update_overwrites_metadata_and_channels() {
        let manager = UniverseManager::new();
        manager.update(2, &[5, 6, 7], "first", cid(1), 100, 10);
        manager.update(2, &[8], "second", cid(2), 120, 11);

        let universe = manager.get(2).unwrap();
        assert_eq!(universe.source_name, "second");
        assert_eq!(universe.source_cid, cid(2));
        assert_eq!(universe.priority, 120);
        assert_eq!(universe.last_sequence, 11);
        assert_eq!(universe.packet_count, 2);
        assert_eq!(universe.channel(0).value, 8);
        assert_eq!(universe.channel(2).value, 7);
        assert_eq!(manager.active_channel_count(2), Some(3));
    }

    #[test]
    fn snapshots_are_detached_copies() {
        let manager = UniverseManager::new();
        manager.update(1, &[1], "desk", cid(1), 100, 0);
        let mut copy = manager.get(1).unwrap();
        copy.channels[0].value = 200;
        copy.packet_count = 99;
        let fresh = manager.get(1).unwrap();
        assert_eq!(fresh.channel(0).value, 1);
        assert_eq!(fresh.packet_count, 1);
    }

    #[test]
    fn listing_is_sorted() {
        let manager = UniverseManager::new();
        for id in [300, 1, 42, 7] {
            manager.update(id, &[1], "desk", cid(1), 100, 0);
        }
        let ids: Vec<u16> = manager.get_all().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 7, 42, 300]);
    }

    #[test]
    fn active_and_prune_respect_timeout() {
        let manager = UniverseManager::new();
        let t0 = Instant::now();
        let timeout = Duration::from_secs(5);
        manager.update_at(1, &[1], "old", cid(1), 100, 0, t0);
        manager.update_at(2, &[1], "new", cid(2), 100, 0, t0 + Duration::from_secs(8));
        manager.get_or_create(3);

        let now = t0 + Duration::from_secs(10);
        let active: Vec<u16> = manager
            .get_active_at(timeout, now)
            .iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(active, vec![2]);

        assert_eq!(manager.prune_stale_at(timeout, now), 2);
        assert_eq!(manager.count(), 1);
        assert!(manager.get(2).is_some());
    }

    #[test]
    fn empty_universe_is_pruned_even_with_huge_timeout() {
        let manager = UniverseManager::new();
        manager.get_or_create(5);
        assert!(manager.get_active(Duration::from_secs(1 << 40)).is_empty());
        assert_eq!(manager.prune_stale(Duration::from_secs(1 << 40)), 1);
    }

    #[test]
    fn update_racing_prune_is_never_lost() {
        let t0 = Instant::now();
        let timeout = Duration::from_secs(60);
        for _ in 0..200 {
            let manager = UniverseManager::new();
            manager.get_or_create(5);
            let barrier = Barrier::new(2);
            thread::scope(|scope| {
                scope.spawn(|| {
                    barrier.wait();
                    manager.prune_stale_at(timeout, t0);
                });
                scope.spawn(|| {
                    barrier.wait();
                    manager.update_at(5, &[9], "desk", cid(1), 100, 0, t0);
                });
            });
            let universe = manager.get(5).expect("update must land in the registry");
            assert_eq!(universe.packet_count, 1);
            assert_eq!(universe.channel(0).value, 9);
        }
    }

    #[test]
    fn remove_reports_presence() {
        let manager = UniverseManager::new();
        manager.get_or_create(8);
        assert!(manager.remove(8));
        assert!(!manager.remove(8));
        assert_eq!(manager.count(), 0);
    }
}
