use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::SacnError;
use super::layout;
use super::reader::SacnReader;

/// One decoded E1.31 data packet.
///
/// `channel_data` never holds more than 512 slots. Non-zero start codes are
/// decoded as-is; interpreting them is left to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SacnPacket {
    pub cid: Uuid,
    pub source_name: String,
    pub priority: u8,
    pub sequence: u8,
    pub universe: u16,
    pub start_code: u8,
    pub channel_data: Vec<u8>,
}

impl SacnPacket {
    /// Number of DMX slots carried by this packet.
    pub fn channel_count(&self) -> usize {
        self.channel_data.len()
    }

    /// Encode as a wire-format data packet.
    ///
    /// Source names longer than 63 bytes and channel data longer than 512
    /// slots are truncated so the result always decodes.
    pub fn encode(&self) -> Vec<u8> {
        let slots = self.channel_data.len().min(layout::DMX_MAX_SLOTS);
        let total = layout::HEADER_LEN + slots;
        let mut buf = vec![0u8; total];

        buf[layout::PREAMBLE_SIZE_RANGE].copy_from_slice(&layout::PREAMBLE_SIZE.to_be_bytes());
        buf[layout::ACN_PID_RANGE].copy_from_slice(layout::ACN_PID);
        buf[16..18].copy_from_slice(&flags_and_length(total - 16));
        buf[layout::ROOT_VECTOR_RANGE].copy_from_slice(&layout::ROOT_VECTOR_DATA.to_be_bytes());
        buf[layout::CID_RANGE].copy_from_slice(self.cid.as_bytes());

        buf[38..40].copy_from_slice(&flags_and_length(total - 38));
        buf[layout::FRAMING_VECTOR_RANGE]
            .copy_from_slice(&layout::FRAMING_VECTOR_DMX.to_be_bytes());
        let name = self.source_name.as_bytes();
        let name_len = name.len().min(layout::SOURCE_NAME_RANGE.len() - 1);
        let name_start = layout::SOURCE_NAME_RANGE.start;
        buf[name_start..name_start + name_len].copy_from_slice(&name[..name_len]);
        buf[layout::PRIORITY_OFFSET] = self.priority;
        buf[layout::SEQUENCE_OFFSET] = self.sequence;
        buf[layout::UNIVERSE_RANGE].copy_from_slice(&self.universe.to_be_bytes());

        buf[115..117].copy_from_slice(&flags_and_length(total - 115));
        buf[layout::DMP_VECTOR_OFFSET] = layout::DMP_VECTOR_SET_PROPERTY;
        buf[118] = 0xa1;
        buf[121..123].copy_from_slice(&1u16.to_be_bytes());
        buf[123..125].copy_from_slice(&((slots + 1) as u16).to_be_bytes());
        buf[layout::START_CODE_OFFSET] = self.start_code;
        buf[layout::DMX_DATA_OFFSET..].copy_from_slice(&self.channel_data[..slots]);
        buf
    }
}

fn flags_and_length(len: usize) -> [u8; 2] {
    (0x7000 | (len as u16 & 0x0fff)).to_be_bytes()
}

/// Decode an E1.31 data packet.
///
/// Validation order: length, preamble size, ACN identifier, root vector,
/// framing vector, DMP vector. Declared PDU lengths are deliberately not
/// cross-checked: any buffer of at least 126 bytes whose fixed fields match
/// is accepted, and channel data is whatever follows the header (capped at
/// 512 slots).
///
/// # Examples
/// ```
/// use sacnwatch_core::{SacnError, parse_sacn_packet};
///
/// let err = parse_sacn_packet(&[0u8; 40]).unwrap_err();
/// assert!(matches!(err, SacnError::TooShort { .. }));
/// ```
pub fn parse_sacn_packet(payload: &[u8]) -> Result<SacnPacket, SacnError> {
    let reader = SacnReader::new(payload);
    reader.require_len(layout::HEADER_LEN)?;

    let preamble = reader.read_u16_be(layout::PREAMBLE_SIZE_RANGE)?;
    if preamble != layout::PREAMBLE_SIZE {
        return Err(SacnError::InvalidPreamble { value: preamble });
    }

    let acn_pid = reader.read_slice(layout::ACN_PID_RANGE)?;
    if acn_pid != layout::ACN_PID {
        return Err(SacnError::InvalidIdentifier);
    }

    let root_vector = reader.read_u32_be(layout::ROOT_VECTOR_RANGE)?;
    if root_vector != layout::ROOT_VECTOR_DATA {
        return Err(SacnError::InvalidRootVector { value: root_vector });
    }

    let framing_vector = reader.read_u32_be(layout::FRAMING_VECTOR_RANGE)?;
    if framing_vector != layout::FRAMING_VECTOR_DMX {
        return Err(SacnError::InvalidFramingVector {
            value: framing_vector,
        });
    }

    let dmp_vector = reader.read_u8(layout::DMP_VECTOR_OFFSET)?;
    if dmp_vector != layout::DMP_VECTOR_SET_PROPERTY {
        return Err(SacnError::InvalidDmpVector { value: dmp_vector });
    }

    Ok(SacnPacket {
        cid: Uuid::from_bytes(reader.read_array(layout::CID_RANGE)?),
        source_name: reader.read_nul_terminated(layout::SOURCE_NAME_RANGE)?,
        priority: reader.read_u8(layout::PRIORITY_OFFSET)?,
        sequence: reader.read_u8(layout::SEQUENCE_OFFSET)?,
        universe: reader.read_u16_be(layout::UNIVERSE_RANGE)?,
        start_code: reader.read_u8(layout::START_CODE_OFFSET)?,
        channel_data: reader
            .read_tail(layout::DMX_DATA_OFFSET, layout::DMX_MAX_SLOTS)?
            .to_vec(),
    })
}
