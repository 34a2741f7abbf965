use thiserror::Error;

/// Longest encoding of a u64 (ceil(64 / 7)).
pub const MAX_VARINT_LEN: usize = 10;

/// Continuation bit carried by every byte but the last.
pub const CONTINUATION: u8 = 0x80;

/// Value bits per encoded byte.
pub const PAYLOAD_MASK: u8 = 0x7F;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VarintError {
    /// Input ended inside a continuation sequence.
    #[error("malformed varint: truncated after {read} byte(s)")]
    Truncated { read: usize },

    /// Leading zero group; a shorter encoding of the same value exists.
    #[error("malformed varint: non-minimal encoding")]
    NonMinimal,

    /// Continuation sequence decodes past u64::MAX.
    #[error("malformed varint: value exceeds 64 bits")]
    Overflow,
}
