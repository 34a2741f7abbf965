//! config.rs
//! Reader and writer options.
//!
//! Plain structs with `Default`; serde-loadable from JSON. Key material and
//! extension handlers are runtime-only and never serialized.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_LEVEL_DEFLATE, DEFAULT_MAX_EC_NESTING, DEFAULT_MAX_INCLUDE_DEPTH, MAX_PAYLOAD_LEN};
use crate::ec::EcKeys;
use crate::primitives::ExtensionRegistry;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Drop comment nodes instead of reporting them.
    pub discard_comments: bool,
    /// Drop padding nodes instead of reporting them.
    pub discard_padding: bool,
    /// Compare CRC-32C trailers of compressed nodes.
    pub verify_checksums: bool,
    /// Turn a checksum mismatch into an error instead of a diagnostic.
    pub strict_checksums: bool,
    pub max_include_depth: usize,
    /// How many EC nodes may nest inside one another.
    pub max_ec_nesting: usize,
    /// Upper bound for one primitive payload and for one inflated EC node.
    pub max_payload_len: u64,
    #[serde(skip)]
    pub keys: Option<EcKeys>,
    #[serde(skip)]
    pub extensions: Arc<ExtensionRegistry>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            discard_comments: false,
            discard_padding: true,
            verify_checksums: true,
            strict_checksums: false,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            max_ec_nesting: DEFAULT_MAX_EC_NESTING,
            max_payload_len: MAX_PAYLOAD_LEN,
            keys: None,
            extensions: Arc::new(ExtensionRegistry::default()),
        }
    }
}

impl ReaderOptions {
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn with_keys(mut self, keys: EcKeys) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn with_extensions(mut self, extensions: Arc<ExtensionRegistry>) -> Self {
        self.extensions = extensions;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    /// Write unbound Names with inline identification instead of failing.
    pub allow_inline: bool,
    /// Deflate level (0-9) for compressed EC nodes.
    pub compression_level: u32,
    #[serde(skip)]
    pub keys: Option<EcKeys>,
    #[serde(skip)]
    pub extensions: Arc<ExtensionRegistry>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            allow_inline: false,
            compression_level: DEFAULT_LEVEL_DEFLATE,
            keys: None,
            extensions: Arc::new(ExtensionRegistry::default()),
        }
    }
}

impl WriterOptions {
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn with_keys(mut self, keys: EcKeys) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn with_extensions(mut self, extensions: Arc<ExtensionRegistry>) -> Self {
        self.extensions = extensions;
        self
    }
}
