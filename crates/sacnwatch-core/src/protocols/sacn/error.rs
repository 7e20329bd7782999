use thiserror::Error;

/// Errors returned by E1.31 decoding, one per validation step.
///
/// Validation runs in declaration order, so a buffer that is both short and
/// malformed always reports `TooShort`.
///
/// # Examples
/// ```
/// use sacnwatch_core::SacnError;
///
/// let err = SacnError::InvalidDmpVector { value: 0xff };
/// assert!(err.to_string().contains("invalid DMP vector"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SacnError {
    #[error("payload too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("invalid preamble size: {value:#06x}")]
    InvalidPreamble { value: u16 },
    #[error("invalid ACN packet identifier")]
    InvalidIdentifier,
    #[error("invalid root vector: {value:#010x}")]
    InvalidRootVector { value: u32 },
    #[error("invalid framing vector: {value:#010x}")]
    InvalidFramingVector { value: u32 },
    #[error("invalid DMP vector: {value:#04x}")]
    InvalidDmpVector { value: u8 },
}
