//! ec/mod.rs
//! Compressed / encrypted ("EC") sub-stream framing.
//!
//! Design notes:
//! - The outer framer writes the EC node head; the transform stream follows
//!   immediately with no length prefix.
//! - The content of every EC node is an ordinary DML fragment, so decoding
//!   yields bytes that are read again by a nested reader.
//! - Framing (finding the end of the node) is separated from decoding
//!   (inflate check / MAC verify / decrypt) so a node can be stepped over
//!   without keys.

pub mod types;
pub mod kdf;
pub mod compression;
pub mod encryption;

pub use types::*;
pub use compression::*;
pub use encryption::*;

use std::io::BufRead;

/// Consume one EC node of `kind` from `r` without keys.
///
/// Returns the number of stream bytes passed over. Compressed nodes still
/// have to be inflated to find their end; encrypted nodes are stepped over
/// chunk by chunk.
pub fn read_frame<R: BufRead + ?Sized>(r: &mut R, kind: EcKind, max_len: u64) -> Result<(EcFrame, u64), EcError> {
    if kind.is_compressed() {
        read_compressed(r, kind, max_len)
    } else {
        read_encrypted(r, kind, max_len)
    }
}

pub fn skip_frame<R: BufRead + ?Sized>(r: &mut R, kind: EcKind, max_len: u64) -> Result<u64, EcError> {
    read_frame(r, kind, max_len).map(|(_, consumed)| consumed)
}

/// Decode a framed EC node into its fragment bytes.
///
/// Compression frames are already inflated by the framing step; this checks
/// the trailer. Encryption frames are authenticated (when the variant carries
/// a MAC) before any block is decrypted.
pub fn decode_frame(
    frame: EcFrame,
    keys: Option<&EcKeys>,
    verify_checksums: bool,
) -> Result<EcContent, EcError> {
    match frame {
        EcFrame::Compressed { kind, bytes, crc } => {
            let checksum = match crc {
                Some(expected) if verify_checksums => {
                    let actual = crc32c::crc32c(&bytes);
                    if actual == expected {
                        ChecksumStatus::Verified
                    } else {
                        ChecksumStatus::Mismatch { expected, actual }
                    }
                }
                Some(_) => ChecksumStatus::Skipped,
                None => ChecksumStatus::Absent,
            };
            Ok(EcContent { kind, bytes, checksum })
        }
        EcFrame::Encrypted { kind, iv, ciphertext, mac } => {
            let keys = keys.ok_or(EcError::MissingKeys)?;
            if let Some(tag) = mac {
                verify_mac(keys, &iv, &ciphertext, &tag)?;
            }
            let bytes = decrypt_blocks(keys, &iv, ciphertext)?;
            Ok(EcContent { kind, bytes, checksum: ChecksumStatus::Absent })
        }
    }
}
