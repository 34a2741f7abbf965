use std::fmt;

use num_enum::TryFromPrimitive;
use thiserror::Error;

use crate::constants::{ec_ids, DmlId, EC_IV_LEN, EC_KEY_LEN, EC_MAC_LEN};
use crate::utils::enum_name_or_hex;

/// The four EC node variants, keyed by their built-in identifier.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, TryFromPrimitive)]
pub enum EcKind {
    Compressed    = ec_ids::COMPRESSED,
    CompressedCrc = ec_ids::COMPRESSED_CRC,
    Encrypted     = ec_ids::ENCRYPTED,
    EncryptedAuth = ec_ids::ENCRYPTED_AUTH,
}

impl EcKind {
    pub const fn id(self) -> DmlId {
        self as DmlId
    }

    /// Label of the structural Name bound to this kind in the EC translation.
    pub const fn label(self) -> &'static str {
        match self {
            EcKind::Compressed => "DML:Compressed",
            EcKind::CompressedCrc => "DML:Compressed-CRC",
            EcKind::Encrypted => "DML:Encrypted",
            EcKind::EncryptedAuth => "DML:Encrypted-Auth",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        [EcKind::Compressed, EcKind::CompressedCrc, EcKind::Encrypted, EcKind::EncryptedAuth]
            .into_iter()
            .find(|k| k.label() == label)
    }

    pub const fn is_compressed(self) -> bool {
        matches!(self, EcKind::Compressed | EcKind::CompressedCrc)
    }

    /// True for the checksum / MAC carrying variants.
    pub const fn has_trailer(self) -> bool {
        matches!(self, EcKind::CompressedCrc | EcKind::EncryptedAuth)
    }

    pub fn verify(raw: DmlId) -> Result<Self, EcError> {
        EcKind::try_from_primitive(raw).map_err(|_| EcError::UnknownKind { raw })
    }
}

impl fmt::Display for EcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Cipher and MAC keys for encrypted EC nodes.
#[derive(Clone, PartialEq, Eq)]
pub struct EcKeys {
    pub(crate) cipher_key: [u8; EC_KEY_LEN],
    pub(crate) mac_key: [u8; EC_KEY_LEN],
}

impl EcKeys {
    pub fn new(cipher_key: [u8; EC_KEY_LEN], mac_key: [u8; EC_KEY_LEN]) -> Self {
        Self { cipher_key, mac_key }
    }

    pub fn from_slices(cipher_key: &[u8], mac_key: &[u8]) -> Result<Self, EcError> {
        let cipher_key: [u8; EC_KEY_LEN] = cipher_key
            .try_into()
            .map_err(|_| EcError::InvalidKeyLength { have: cipher_key.len(), need: EC_KEY_LEN })?;
        let mac_key: [u8; EC_KEY_LEN] = mac_key
            .try_into()
            .map_err(|_| EcError::InvalidKeyLength { have: mac_key.len(), need: EC_KEY_LEN })?;
        Ok(Self { cipher_key, mac_key })
    }
}

impl fmt::Debug for EcKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcKeys")
            .field("cipher_key", &"<redacted>")
            .field("mac_key", &"<redacted>")
            .finish()
    }
}

/// An EC node whose extent has been consumed from the outer stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcFrame {
    /// Already inflated; `crc` is the big-endian trailer when present.
    Compressed { kind: EcKind, bytes: Vec<u8>, crc: Option<u32> },
    Encrypted { kind: EcKind, iv: [u8; EC_IV_LEN], ciphertext: Vec<u8>, mac: Option<[u8; EC_MAC_LEN]> },
}

impl EcFrame {
    pub fn kind(&self) -> EcKind {
        match self {
            EcFrame::Compressed { kind, .. } | EcFrame::Encrypted { kind, .. } => *kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumStatus {
    Absent,
    Skipped,
    Verified,
    Mismatch { expected: u32, actual: u32 },
}

impl ChecksumStatus {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, ChecksumStatus::Mismatch { .. })
    }
}

/// Decoded fragment bytes of one EC node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcContent {
    pub kind: EcKind,
    pub bytes: Vec<u8>,
    pub checksum: ChecksumStatus,
}

fn fmt_raw_kind(raw: &DmlId) -> String {
    enum_name_or_hex::<EcKind>(*raw)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EcError {
    #[error("unknown EC node kind: {}", fmt_raw_kind(.raw))]
    UnknownKind { raw: DmlId },

    #[error("encrypted EC node requires keys but none were configured")]
    MissingKeys,

    #[error("invalid key length: {have} != {need}")]
    InvalidKeyLength { have: usize, need: usize },

    #[error("authentication failed: MAC over the ciphertext does not match")]
    AuthenticationFailed,

    #[error("checksum mismatch: trailer 0x{expected:08x}, computed 0x{actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("EC stream truncated: {0}")]
    TruncatedStream(&'static str),

    #[error("chunk of {blocks} block(s) exceeds the limit of {max}")]
    ChunkTooLarge { blocks: u64, max: usize },

    #[error("invalid block padding")]
    InvalidPadding,

    #[error("EC content exceeds {max} bytes")]
    ContentTooLarge { max: u64 },

    #[error("deflate stream corrupt: {0}")]
    Corrupt(String),

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("I/O error in EC stream: {0}")]
    Io(String),
}
