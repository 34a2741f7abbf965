use std::io::{self, Write};

use crate::varint::types::{CONTINUATION, MAX_VARINT_LEN, PAYLOAD_MASK};

/// Number of bytes `encode_u64` emits for `v`.
#[inline]
pub const fn encoded_len(v: u64) -> usize {
    let bits = 64 - v.leading_zeros() as usize;
    if bits == 0 { 1 } else { (bits + 6) / 7 }
}

/// Encode `v` into a fixed scratch buffer; returns the buffer and the used length.
///
/// The encoding is minimal by construction: the first emitted group is the
/// highest non-zero one.
#[inline]
pub fn encode_u64(v: u64) -> ([u8; MAX_VARINT_LEN], usize) {
    let len = encoded_len(v);
    let mut out = [0u8; MAX_VARINT_LEN];
    for i in 0..len {
        let shift = 7 * (len - 1 - i);
        let mut byte = ((v >> shift) as u8) & PAYLOAD_MASK;
        if i + 1 < len {
            byte |= CONTINUATION;
        }
        out[i] = byte;
    }
    (out, len)
}

/// Append the encoding of `v` to `out`.
#[inline]
pub fn encode_u64_into(v: u64, out: &mut Vec<u8>) {
    let (buf, len) = encode_u64(v);
    out.extend_from_slice(&buf[..len]);
}

/// Write the encoding of `v`; returns the number of bytes written.
#[inline]
pub fn write_u64<W: Write + ?Sized>(w: &mut W, v: u64) -> io::Result<usize> {
    let (buf, len) = encode_u64(v);
    w.write_all(&buf[..len])?;
    Ok(len)
}

/// Zig-zag map: 0, -1, 1, -2, 2 ... -> 0, 1, 2, 3, 4 ...
#[inline]
pub const fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

#[inline]
pub fn encode_i64(n: i64) -> ([u8; MAX_VARINT_LEN], usize) {
    encode_u64(zigzag_encode(n))
}

#[inline]
pub fn write_i64<W: Write + ?Sized>(w: &mut W, n: i64) -> io::Result<usize> {
    write_u64(w, zigzag_encode(n))
}
