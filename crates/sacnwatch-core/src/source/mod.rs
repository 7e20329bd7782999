//! Packet sources.
//!
//! A source yields decoded sACN packets stamped with their arrival time and
//! sender address. The receiver queue implements [`PacketSource`]; ingestion
//! is written against the trait so tests can feed it directly.

use std::net::SocketAddr;
use std::time::Instant;

use thiserror::Error;

use crate::protocols::sacn::SacnPacket;

/// A decoded packet plus the metadata captured when it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedPacket {
    pub packet: SacnPacket,
    pub received_at: Instant,
    pub source_addr: SocketAddr,
}

pub trait PacketSource {
    /// Next packet, or `Ok(None)` once the source is exhausted.
    fn next_packet(&mut self) -> Result<Option<ReceivedPacket>, SourceError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Blocks until a packet is queued; ends once every sender is gone.
impl PacketSource for crossbeam_channel::Receiver<ReceivedPacket> {
    fn next_packet(&mut self) -> Result<Option<ReceivedPacket>, SourceError> {
        Ok(self.recv().ok())
    }
}
