//! varint/mod.rs
//! Variable-length integer codec used by every length prefix and identifier.
//!
//! Wire layout (big-endian base-128):
//! - Seven value bits per byte, most significant group first.
//! - Every byte except the last carries the continuation bit `0x80`.
//! - Encodings are minimal: a leading `0x80` byte is rejected on decode.
//! - A u64 needs at most `MAX_VARINT_LEN` bytes.
//!
//! Signed values go through zig-zag so small magnitudes stay short.

pub mod types;
pub mod encode;
pub mod decode;

pub use types::*;
pub use encode::*;
pub use decode::*;
