use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::protocols::sacn::layout::DMX_MAX_SLOTS;

/// Number of channels tracked per universe.
pub const CHANNELS_PER_UNIVERSE: usize = DMX_MAX_SLOTS;

/// State of one DMX slot.
///
/// A channel turns active the first time a packet covers its index and stays
/// active afterwards; staleness is judged per universe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Channel {
    pub value: u8,
    pub active: bool,
    pub last_update: Option<Instant>,
}

/// Last known state of one universe.
///
/// Values handed out by [`UniverseManager`](super::UniverseManager) are
/// copies; mutating them has no effect on the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Universe {
    pub id: u16,
    pub channels: [Channel; CHANNELS_PER_UNIVERSE],
    pub source_name: String,
    pub source_cid: Uuid,
    pub priority: u8,
    pub last_sequence: u8,
    pub last_packet: Option<Instant>,
    pub packet_count: u64,
}

impl Universe {
    pub fn new(id: u16) -> Self {
        Self {
            id,
            channels: [Channel::default(); CHANNELS_PER_UNIVERSE],
            source_name: String::new(),
            source_cid: Uuid::nil(),
            priority: 0,
            last_sequence: 0,
            last_packet: None,
            packet_count: 0,
        }
    }

    /// Apply one packet's payload. Slots past the end of `channel_data` keep
    /// their previous value and flags (last writer wins, no merge).
    pub(crate) fn apply(
        &mut self,
        channel_data: &[u8],
        source_name: &str,
        cid: Uuid,
        priority: u8,
        sequence: u8,
        now: Instant,
    ) {
        self.source_name.clear();
        self.source_name.push_str(source_name);
        self.source_cid = cid;
        self.priority = priority;
        self.last_sequence = sequence;
        self.last_packet = Some(now);
        self.packet_count += 1;

        for (channel, &value) in self.channels.iter_mut().zip(channel_data) {
            channel.value = value;
            channel.active = true;
            channel.last_update = Some(now);
        }
    }

    /// Channel at a zero-based index; out-of-range indices yield an inactive,
    /// zeroed channel.
    pub fn channel(&self, index: usize) -> Channel {
        self.channels.get(index).copied().unwrap_or_default()
    }

    pub fn active_channel_count(&self) -> usize {
        self.channels.iter().filter(|ch| ch.active).count()
    }

    /// Values of channels up to and including the highest active one.
    pub fn active_levels(&self) -> Vec<u8> {
        let end = self
            .channels
            .iter()
            .rposition(|ch| ch.active)
            .map_or(0, |idx| idx + 1);
        self.channels[..end].iter().map(|ch| ch.value).collect()
    }

    /// A universe that never received a packet is stale for every timeout.
    pub fn is_stale_at(&self, timeout: Duration, now: Instant) -> bool {
        match self.last_packet {
            None => true,
            Some(last) => now.saturating_duration_since(last) > timeout,
        }
    }

    pub fn is_stale(&self, timeout: Duration) -> bool {
        self.is_stale_at(timeout, Instant::now())
    }
}
