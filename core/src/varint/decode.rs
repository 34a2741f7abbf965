use std::io::{self, Read};

use crate::varint::types::{VarintError, CONTINUATION, MAX_VARINT_LEN, PAYLOAD_MASK};

/// Incremental decoder shared by the slice and stream front-ends.
#[derive(Debug, Default)]
struct Accumulator {
    value: u64,
    read: usize,
}

impl Accumulator {
    /// Feed one byte; returns `Some(value)` once the final byte arrives.
    #[inline]
    fn push(&mut self, byte: u8) -> Result<Option<u64>, VarintError> {
        if self.read == 0 && byte == CONTINUATION {
            return Err(VarintError::NonMinimal);
        }
        if self.read == MAX_VARINT_LEN || self.value >> 57 != 0 {
            return Err(VarintError::Overflow);
        }
        self.value = (self.value << 7) | u64::from(byte & PAYLOAD_MASK);
        self.read += 1;
        if byte & CONTINUATION == 0 {
            Ok(Some(self.value))
        } else {
            Ok(None)
        }
    }
}

/// Decode one varint from the front of `buf`; returns `(value, bytes_consumed)`.
pub fn decode_u64(buf: &[u8]) -> Result<(u64, usize), VarintError> {
    let mut acc = Accumulator::default();
    for &byte in buf {
        if let Some(v) = acc.push(byte)? {
            return Ok((v, acc.read));
        }
    }
    Err(VarintError::Truncated { read: acc.read })
}

#[inline]
pub const fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

pub fn decode_i64(buf: &[u8]) -> Result<(i64, usize), VarintError> {
    let (v, n) = decode_u64(buf)?;
    Ok((zigzag_decode(v), n))
}

/// Failure of a stream decode: either the source failed or the bytes were bad.
#[derive(Debug)]
pub enum ReadVarintError {
    Io(io::Error),
    Varint(VarintError),
}

impl From<io::Error> for ReadVarintError {
    fn from(e: io::Error) -> Self {
        ReadVarintError::Io(e)
    }
}

impl From<VarintError> for ReadVarintError {
    fn from(e: VarintError) -> Self {
        ReadVarintError::Varint(e)
    }
}

/// Read one varint from a stream.
///
/// Returns `Ok(None)` on a clean end of stream before the first byte, which
/// lets callers tell "no more nodes" apart from a truncated node.
pub fn read_u64_opt<R: Read + ?Sized>(r: &mut R) -> Result<Option<(u64, usize)>, ReadVarintError> {
    let mut acc = Accumulator::default();
    let mut byte = [0u8; 1];
    loop {
        let n = loop {
            match r.read(&mut byte) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        if n == 0 {
            if acc.read == 0 {
                return Ok(None);
            }
            return Err(VarintError::Truncated { read: acc.read }.into());
        }
        if let Some(v) = acc.push(byte[0])? {
            return Ok(Some((v, acc.read)));
        }
    }
}

/// Read one varint from a stream; end of stream is always `Truncated`.
pub fn read_u64<R: Read + ?Sized>(r: &mut R) -> Result<(u64, usize), ReadVarintError> {
    read_u64_opt(r)?.ok_or(ReadVarintError::Varint(VarintError::Truncated { read: 0 }))
}

pub fn read_i64<R: Read + ?Sized>(r: &mut R) -> Result<(i64, usize), ReadVarintError> {
    let (v, n) = read_u64(r)?;
    Ok((zigzag_decode(v), n))
}
