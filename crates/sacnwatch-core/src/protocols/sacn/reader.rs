use std::ops::Range;

use super::error::SacnError;

/// Bounds-checked view over a datagram.
///
/// Reads never look past the end of the buffer; declared PDU lengths are not
/// consulted.
pub struct SacnReader<'a> {
    payload: &'a [u8],
}

impl<'a> SacnReader<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { payload }
    }

    pub fn require_len(&self, needed: usize) -> Result<(), SacnError> {
        if self.payload.len() < needed {
            return Err(self.too_short(needed));
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, SacnError> {
        self.payload
            .get(offset)
            .copied()
            .ok_or_else(|| self.too_short(offset + 1))
    }

    pub fn read_u16_be(&self, range: Range<usize>) -> Result<u16, SacnError> {
        Ok(u16::from_be_bytes(self.read_array(range)?))
    }

    pub fn read_u32_be(&self, range: Range<usize>) -> Result<u32, SacnError> {
        Ok(u32::from_be_bytes(self.read_array(range)?))
    }

    pub fn read_array<const N: usize>(&self, range: Range<usize>) -> Result<[u8; N], SacnError> {
        let end = range.end;
        self.read_slice(range)?
            .try_into()
            .map_err(|_| self.too_short(end))
    }

    pub fn read_slice(&self, range: Range<usize>) -> Result<&'a [u8], SacnError> {
        let end = range.end;
        self.payload.get(range).ok_or_else(|| self.too_short(end))
    }

    /// Text up to the first NUL, or the whole field when unterminated.
    pub fn read_nul_terminated(&self, range: Range<usize>) -> Result<String, SacnError> {
        let field = self.read_slice(range)?;
        let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        Ok(String::from_utf8_lossy(&field[..len]).into_owned())
    }

    /// Everything from `offset` to the end of the buffer, capped at `max` bytes.
    pub fn read_tail(&self, offset: usize, max: usize) -> Result<&'a [u8], SacnError> {
        let tail = self
            .payload
            .get(offset..)
            .ok_or_else(|| self.too_short(offset))?;
        Ok(&tail[..tail.len().min(max)])
    }

    fn too_short(&self, needed: usize) -> SacnError {
        SacnError::TooShort {
            needed,
            actual: self.payload.len(),
        }
    }
}
