//! sACN (E1.31) data packet codec.
//!
//! The parser validates the fixed header (preamble size, ACN identifier and
//! the root/framing/DMP vectors) and extracts the framing and DMP fields.
//! Wire offsets live in `layout`; bounds-checked reads live in `reader`.
//! Decoding is pure and never allocates beyond the returned packet.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use error::SacnError;
pub use parser::{SacnPacket, parse_sacn_packet};

/// UDP port reserved for E1.31 traffic.
pub const SACN_PORT: u16 = 5568;
