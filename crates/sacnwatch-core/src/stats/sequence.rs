/// Forward gaps at or above this are read as a sender restart, not loss.
pub const SOURCE_RESTART_THRESHOLD: u16 = 200;

/// How a sequence number relates to the one before it from the same source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOutcome {
    InOrder,
    /// `n` packets between the previous and current one never arrived.
    Lost(u16),
    /// The sender most likely reset its counter; no loss is recorded.
    Restart,
}

impl SequenceOutcome {
    pub fn lost(self) -> u64 {
        match self {
            SequenceOutcome::Lost(n) => u64::from(n),
            SequenceOutcome::InOrder | SequenceOutcome::Restart => 0,
        }
    }
}

/// Distance, modulo 256, from the expected successor of `last` to `current`.
/// Zero means `current` is exactly the expected successor.
pub fn forward_gap(last: u8, current: u8) -> u16 {
    let expected = last.wrapping_add(1);
    u16::from(current.wrapping_sub(expected))
}

pub fn classify(last: u8, current: u8, restart_threshold: u16) -> SequenceOutcome {
    match forward_gap(last, current) {
        0 => SequenceOutcome::InOrder,
        gap if gap < restart_threshold => SequenceOutcome::Lost(gap),
        _ => SequenceOutcome::Restart,
    }
}
