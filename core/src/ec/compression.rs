//! ec/compression.rs
//! Raw deflate EC nodes with an optional CRC-32C trailer.
//!
//! Wire: `deflate-stream [crc32c(decompressed) as u32 BE]`.
//! The stream is not length-prefixed; its end is found by inflating it, so
//! the reader drives `flate2::Decompress` by hand over a `BufRead` and
//! consumes exactly the bytes the inflater used.

use std::io::{self, BufRead, Write};

use byteorder::{BigEndian, ByteOrder};
use flate2::write::DeflateEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};

use crate::constants::EC_CRC_LEN;
use crate::ec::decode_frame;
use crate::ec::types::{EcContent, EcError, EcFrame, EcKind};

const INFLATE_CHUNK: usize = 32 * 1024;

pub(crate) fn io_to_ec(e: io::Error, what: &'static str) -> EcError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        EcError::TruncatedStream(what)
    } else {
        EcError::Io(e.to_string())
    }
}

/// Deflate `plain` and append the CRC-32C trailer for `CompressedCrc`.
pub fn compress_fragment(plain: &[u8], kind: EcKind, level: u32) -> Result<Vec<u8>, EcError> {
    let mut enc = DeflateEncoder::new(Vec::with_capacity(plain.len() / 2 + 16), Compression::new(level.min(9)));
    enc.write_all(plain).map_err(|e| EcError::Io(e.to_string()))?;
    let mut out = enc.finish().map_err(|e| EcError::Io(e.to_string()))?;
    if kind == EcKind::CompressedCrc {
        let mut trailer = [0u8; EC_CRC_LEN];
        BigEndian::write_u32(&mut trailer, crc32c::crc32c(plain));
        out.extend_from_slice(&trailer);
    }
    Ok(out)
}

/// Inflate one compressed EC node from `r`.
///
/// Returns the frame and the number of stream bytes consumed. Input that
/// ends before the deflate end-of-stream marker, or before the trailer, is
/// `TruncatedStream`.
pub fn read_compressed<R: BufRead + ?Sized>(
    r: &mut R,
    kind: EcKind,
    max_len: u64,
) -> Result<(EcFrame, u64), EcError> {
    let mut inflater = Decompress::new(false);
    let mut out = Vec::new();
    let mut chunk = vec![0u8; INFLATE_CHUNK];

    loop {
        let input = r.fill_buf().map_err(|e| io_to_ec(e, "deflate stream"))?;
        let eof = input.is_empty();
        let (in0, out0) = (inflater.total_in(), inflater.total_out());
        let status = inflater
            .decompress(input, &mut chunk, FlushDecompress::None)
            .map_err(|e| EcError::Corrupt(e.to_string()))?;
        let used = (inflater.total_in() - in0) as usize;
        let produced = (inflater.total_out() - out0) as usize;
        r.consume(used);
        out.extend_from_slice(&chunk[..produced]);

        if out.len() as u64 > max_len {
            return Err(EcError::ContentTooLarge { max: max_len });
        }
        if status == Status::StreamEnd {
            break;
        }
        if used == 0 && produced == 0 {
            return Err(if eof {
                EcError::TruncatedStream("deflate stream ended before its end marker")
            } else {
                EcError::Corrupt("inflater made no progress".into())
            });
        }
    }

    let mut consumed = inflater.total_in();
    let crc = if kind.has_trailer() {
        let mut trailer = [0u8; EC_CRC_LEN];
        r.read_exact(&mut trailer).map_err(|e| io_to_ec(e, "checksum trailer"))?;
        consumed += EC_CRC_LEN as u64;
        Some(BigEndian::read_u32(&trailer))
    } else {
        None
    };

    Ok((EcFrame::Compressed { kind, bytes: out, crc }, consumed))
}

/// Inflate a complete compressed EC node held in memory.
///
/// The trailer, when present, is checked; a mismatch is reported in the
/// returned status and the inflated bytes are still handed back.
pub fn decompress_fragment(wire: &[u8], kind: EcKind, max_len: u64) -> Result<EcContent, EcError> {
    if !kind.is_compressed() {
        return Err(EcError::UnknownKind { raw: kind.id() });
    }
    let mut cursor = wire;
    let (frame, _) = read_compressed(&mut cursor, kind, max_len)?;
    decode_frame(frame, None, true)
}
