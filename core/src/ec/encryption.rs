//! ec/encryption.rs
//! AES-256-CBC EC nodes with an optional HMAC-SHA256 trailer.
//!
//! Wire:
//! ```text
//! iv[16]  { varint(n) block[16]*n }*  varint(0)  [mac[32]]
//! ```
//! - 1..=127 blocks per chunk; a zero count terminates.
//! - The plaintext is PKCS#7 padded, so the ciphertext is never empty.
//! - The MAC covers the IV followed by every ciphertext block, in order,
//!   and is checked before the first block is decrypted.

use std::io::Read;

use aes::Aes256;
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::constants::{EC_BLOCK_LEN, EC_IV_LEN, EC_KEY_LEN, EC_MAC_LEN, EC_MAX_CHUNK_BLOCKS};
use crate::ec::compression::io_to_ec;
use crate::ec::types::{EcError, EcFrame, EcKeys, EcKind};
use crate::varint::{encode_u64_into, read_u64, ReadVarintError};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

fn new_mac(keys: &EcKeys) -> Result<HmacSha256, EcError> {
    <HmacSha256 as KeyInit>::new_from_slice(&keys.mac_key)
        .map_err(|_| EcError::InvalidKeyLength { have: keys.mac_key.len(), need: EC_KEY_LEN })
}

fn compute_mac(keys: &EcKeys, iv: &[u8], ciphertext: &[u8]) -> Result<[u8; EC_MAC_LEN], EcError> {
    let mut mac = new_mac(keys)?;
    mac.update(iv);
    mac.update(ciphertext);
    let mut tag = [0u8; EC_MAC_LEN];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    Ok(tag)
}

/// Constant-time check of `tag` against the MAC of `iv || ciphertext`.
pub fn verify_mac(keys: &EcKeys, iv: &[u8], ciphertext: &[u8], tag: &[u8]) -> Result<(), EcError> {
    let mut mac = new_mac(keys)?;
    mac.update(iv);
    mac.update(ciphertext);
    mac.verify_slice(tag).map_err(|_| EcError::AuthenticationFailed)
}

/// Encrypt with a fresh random IV.
pub fn encrypt_fragment(plain: &[u8], keys: &EcKeys, kind: EcKind) -> Result<Vec<u8>, EcError> {
    let mut iv = [0u8; EC_IV_LEN];
    OsRng.fill_bytes(&mut iv);
    encrypt_fragment_with_iv(plain, keys, kind, iv)
}

/// Encrypt with a caller-supplied IV. Reusing an IV under one key leaks
/// plaintext equality; use `encrypt_fragment` outside of tests.
pub fn encrypt_fragment_with_iv(
    plain: &[u8],
    keys: &EcKeys,
    kind: EcKind,
    iv: [u8; EC_IV_LEN],
) -> Result<Vec<u8>, EcError> {
    let pad = EC_BLOCK_LEN - plain.len() % EC_BLOCK_LEN;
    let mut blocks = Vec::with_capacity(plain.len() + pad);
    blocks.extend_from_slice(plain);
    blocks.resize(plain.len() + pad, pad as u8);

    let mut enc = Aes256CbcEnc::new_from_slices(&keys.cipher_key, &iv)
        .map_err(|_| EcError::InvalidKeyLength { have: keys.cipher_key.len(), need: EC_KEY_LEN })?;
    for block in blocks.chunks_exact_mut(EC_BLOCK_LEN) {
        enc.encrypt_block_mut(GenericArray::from_mut_slice(block));
    }

    let chunk_bytes = EC_MAX_CHUNK_BLOCKS * EC_BLOCK_LEN;
    let mut out = Vec::with_capacity(EC_IV_LEN + blocks.len() + blocks.len() / chunk_bytes + 2 + EC_MAC_LEN);
    out.extend_from_slice(&iv);
    for chunk in blocks.chunks(chunk_bytes) {
        encode_u64_into((chunk.len() / EC_BLOCK_LEN) as u64, &mut out);
        out.extend_from_slice(chunk);
    }
    encode_u64_into(0, &mut out);

    if kind == EcKind::EncryptedAuth {
        out.extend_from_slice(&compute_mac(keys, &iv, &blocks)?);
    }
    Ok(out)
}

/// Consume one encrypted EC node from `r` without decrypting it.
///
/// Returns the frame and the number of stream bytes consumed. The ciphertext
/// gathered across all chunks may not exceed `max_len` bytes.
pub fn read_encrypted<R: Read + ?Sized>(
    r: &mut R,
    kind: EcKind,
    max_len: u64,
) -> Result<(EcFrame, u64), EcError> {
    let mut iv = [0u8; EC_IV_LEN];
    r.read_exact(&mut iv).map_err(|e| io_to_ec(e, "initialization vector"))?;
    let mut consumed = EC_IV_LEN as u64;

    let mut ciphertext = Vec::new();
    loop {
        let (blocks, used) = read_u64(r).map_err(|e| match e {
            ReadVarintError::Io(io) => io_to_ec(io, "chunk block count"),
            ReadVarintError::Varint(v) => EcError::Corrupt(v.to_string()),
        })?;
        consumed += used as u64;
        if blocks == 0 {
            break;
        }
        if blocks > EC_MAX_CHUNK_BLOCKS as u64 {
            return Err(EcError::ChunkTooLarge { blocks, max: EC_MAX_CHUNK_BLOCKS });
        }
        let len = blocks as usize * EC_BLOCK_LEN;
        let start = ciphertext.len();
        if (start + len) as u64 > max_len {
            return Err(EcError::ContentTooLarge { max: max_len });
        }
        ciphertext.resize(start + len, 0);
        r.read_exact(&mut ciphertext[start..]).map_err(|e| io_to_ec(e, "cipher blocks"))?;
        consumed += len as u64;
    }

    let mac = if kind == EcKind::EncryptedAuth {
        let mut tag = [0u8; EC_MAC_LEN];
        r.read_exact(&mut tag).map_err(|e| io_to_ec(e, "authentication tag"))?;
        consumed += EC_MAC_LEN as u64;
        Some(tag)
    } else {
        None
    };

    Ok((EcFrame::Encrypted { kind, iv, ciphertext, mac }, consumed))
}

/// CBC-decrypt `ciphertext` and strip the PKCS#7 padding.
pub fn decrypt_blocks(keys: &EcKeys, iv: &[u8; EC_IV_LEN], mut ciphertext: Vec<u8>) -> Result<Vec<u8>, EcError> {
    if ciphertext.is_empty() || ciphertext.len() % EC_BLOCK_LEN != 0 {
        return Err(EcError::InvalidPadding);
    }
    let mut dec = Aes256CbcDec::new_from_slices(&keys.cipher_key, iv)
        .map_err(|_| EcError::InvalidKeyLength { have: keys.cipher_key.len(), need: EC_KEY_LEN })?;
    for block in ciphertext.chunks_exact_mut(EC_BLOCK_LEN) {
        dec.decrypt_block_mut(GenericArray::from_mut_slice(block));
    }

    let pad = *ciphertext.last().ok_or(EcError::InvalidPadding)? as usize;
    if pad == 0 || pad > EC_BLOCK_LEN || ciphertext[ciphertext.len() - pad..].iter().any(|&b| b as usize != pad) {
        return Err(EcError::InvalidPadding);
    }
    ciphertext.truncate(ciphertext.len() - pad);
    Ok(ciphertext)
}

/// Decrypt a complete encrypted EC node held in memory.
pub fn decrypt_fragment(wire: &[u8], keys: &EcKeys, kind: EcKind) -> Result<Vec<u8>, EcError> {
    let mut cursor = wire;
    let (frame, _) = read_encrypted(&mut cursor, kind, wire.len() as u64)?;
    match frame {
        EcFrame::Encrypted { iv, ciphertext, mac, .. } => {
            if let Some(tag) = mac {
                verify_mac(keys, &iv, &ciphertext, &tag)?;
            }
            decrypt_blocks(keys, &iv, ciphertext)
        }
        EcFrame::Compressed { .. } => Err(EcError::UnknownKind { raw: kind.id() }),
    }
}
