//! constants.rs
//! Wire-level constants shared by every layer.
//!
//! Notes:
//! - Identifier values are part of the wire format; never renumber a built-in.
//! - The reserved block is closed: user translations may not bind inside it.

use std::ops::RangeInclusive;

/// Numeric node identifier bound to a Name within a translation scope.
pub type DmlId = u32;

/// Format version written into every header.
pub const DML_VERSION: u64 = 3;
/// Oldest reader version able to read what this crate writes.
pub const DML_READ_VERSION: u64 = 3;

/// Identifier 0 never identifies a node.
pub const INVALID_ID: DmlId = 0;

/// Sentinel: the node carries its name and type literally.
pub const INLINE_IDENTIFICATION: DmlId = 0x3FFF;

/// Block of identifiers owned by the built-in base translations.
pub const RESERVED_START: DmlId = 0x3F00;
pub const RESERVED_END: DmlId = 0x3FFF;
pub const RESERVED_RANGE: RangeInclusive<DmlId> = RESERVED_START..=RESERVED_END;

/// Returns true when `id` falls inside the reserved built-in block.
#[inline]
pub const fn is_reserved(id: DmlId) -> bool {
    id >= RESERVED_START && id <= RESERVED_END
}

/// Built-in identifiers of the DML base translation (`urn:dml:dml3`).
pub mod dml_ids {
    use super::DmlId;

    // Header record
    pub const HEADER: DmlId              = 0x3F00;
    pub const VERSION: DmlId             = 0x3F01;
    pub const READ_VERSION: DmlId        = 0x3F02;
    pub const DOC_TYPE: DmlId            = 0x3F03;
    pub const INCLUDE_TRANSLATION: DmlId = 0x3F04;
    pub const URI: DmlId                 = 0x3F05;
    pub const URN: DmlId                 = 0x3F06;
    pub const INCLUDE_PRIMITIVES: DmlId  = 0x3F07;
    pub const SET: DmlId                 = 0x3F08;
    pub const CODEC: DmlId               = 0x3F09;
    pub const CODEC_URI: DmlId           = 0x3F0A;
    pub const CONFIG: DmlId              = 0x3F0B;

    // Structural markers and discardable nodes
    pub const END_ATTRIBUTES: DmlId      = 0x3F10;
    pub const END_CONTAINER: DmlId       = 0x3F11;
    pub const COMMENT: DmlId             = 0x3F12;
    pub const PADDING: DmlId             = 0x3F13;

    // Translation documents
    pub const TRANSLATION: DmlId         = 0x3F20;
    pub const CONTAINER: DmlId           = 0x3F21;
    pub const NODE: DmlId                = 0x3F22;
    pub const ID: DmlId                  = 0x3F23;
    pub const NAME: DmlId                = 0x3F24;
    pub const TYPE: DmlId                = 0x3F25;
    pub const RENUMBER: DmlId            = 0x3F26;
    pub const NEW_ID: DmlId              = 0x3F27;
    pub const XML_ROOT: DmlId            = 0x3F28;
}

/// Built-in identifiers of the EC translation (`urn:dml:dml-ec2`).
pub mod ec_ids {
    use super::DmlId;

    pub const COMPRESSED: DmlId          = 0x3F40;
    pub const COMPRESSED_CRC: DmlId      = 0x3F41;
    pub const ENCRYPTED: DmlId           = 0x3F42;
    pub const ENCRYPTED_AUTH: DmlId      = 0x3F43;
}

/// URNs under which the base translations can be included.
pub const URN_DML_BASE: &str = "urn:dml:dml3";
pub const URN_DML_EC: &str = "urn:dml:dml-ec2";

/// Sanity bound on a single primitive payload (256 MiB).
pub const MAX_PAYLOAD_LEN: u64 = 256 * 1024 * 1024;

/// Default bound on nested translation includes.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 16;

/// Default bound on EC nodes nested inside EC content.
pub const DEFAULT_MAX_EC_NESTING: usize = 32;

/// Default deflate level for compressed EC nodes.
pub const DEFAULT_LEVEL_DEFLATE: u32 = 6;

/// Cipher geometry for encrypted EC nodes (AES-256-CBC).
pub const EC_BLOCK_LEN: usize = 16;
pub const EC_IV_LEN: usize = 16;
pub const EC_KEY_LEN: usize = 32;
/// Maximum cipher blocks buffered into one chunk.
pub const EC_MAX_CHUNK_BLOCKS: usize = 127;
/// HMAC-SHA256 tag length.
pub const EC_MAC_LEN: usize = 32;
/// CRC-32C trailer length.
pub const EC_CRC_LEN: usize = 4;
