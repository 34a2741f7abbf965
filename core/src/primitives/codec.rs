//! Primitive-set declarations.
//!
//! The base family (bool, int, uint, string, array-u8) is always readable.
//! Multi-byte families need an explicit byte-order codec declared by the
//! header before any value of that family may cross the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::primitives::types::PrimitiveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveFamily {
    Base,
    Common,
    Arrays,
    Extension,
}

impl PrimitiveFamily {
    pub const fn as_str(self) -> &'static str {
        match self {
            PrimitiveFamily::Base => "base",
            PrimitiveFamily::Common => "common",
            PrimitiveFamily::Arrays => "arrays",
            PrimitiveFamily::Extension => "extension",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "base" => Some(PrimitiveFamily::Base),
            "common" => Some(PrimitiveFamily::Common),
            "arrays" => Some(PrimitiveFamily::Arrays),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte order used for fixed-width multi-byte fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteOrderCodec {
    #[serde(rename = "le")]
    LittleEndian,
    #[serde(rename = "be")]
    BigEndian,
}

impl ByteOrderCodec {
    pub const fn as_str(self) -> &'static str {
        match self {
            ByteOrderCodec::LittleEndian => "le",
            ByteOrderCodec::BigEndian => "be",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "le" => Some(ByteOrderCodec::LittleEndian),
            "be" => Some(ByteOrderCodec::BigEndian),
            _ => None,
        }
    }
}

/// One `Include-Primitives` entry as carried by a header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrimitiveSetDecl {
    pub set: String,
    pub codec: String,
    pub codec_uri: Option<String>,
    pub config: Option<Vec<u8>>,
}

impl PrimitiveSetDecl {
    pub fn new(family: PrimitiveFamily, codec: ByteOrderCodec) -> Self {
        Self {
            set: family.as_str().to_owned(),
            codec: codec.as_str().to_owned(),
            codec_uri: None,
            config: None,
        }
    }
}

/// Codecs currently in force for a reader or writer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimitiveSets {
    common: Option<ByteOrderCodec>,
    arrays: Option<ByteOrderCodec>,
}

impl PrimitiveSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both multi-byte families declared with the same codec.
    pub fn all(codec: ByteOrderCodec) -> Self {
        Self { common: Some(codec), arrays: Some(codec) }
    }

    /// Apply a declaration. Re-declaring a family with the same codec is a no-op.
    pub fn declare(&mut self, decl: &PrimitiveSetDecl) -> Result<(), PrimitiveError> {
        let family = PrimitiveFamily::parse(&decl.set)
            .ok_or_else(|| PrimitiveError::UnknownPrimitiveSet(decl.set.clone()))?;
        let codec = ByteOrderCodec::parse(&decl.codec).ok_or_else(|| PrimitiveError::UnsupportedCodec {
            set: decl.set.clone(),
            codec: decl.codec.clone(),
        })?;
        let slot = match family {
            PrimitiveFamily::Base => {
                // base needs no codec; accept any recognised one
                return Ok(());
            }
            PrimitiveFamily::Common => &mut self.common,
            PrimitiveFamily::Arrays => &mut self.arrays,
            PrimitiveFamily::Extension => return Err(PrimitiveError::UnknownPrimitiveSet(decl.set.clone())),
        };
        match slot {
            Some(existing) if *existing != codec => Err(PrimitiveError::ConflictingCodec {
                set: decl.set.clone(),
                existing: existing.as_str().to_owned(),
            }),
            _ => {
                *slot = Some(codec);
                Ok(())
            }
        }
    }

    pub fn codec(&self, family: PrimitiveFamily) -> Option<ByteOrderCodec> {
        match family {
            PrimitiveFamily::Common => self.common,
            PrimitiveFamily::Arrays => self.arrays,
            PrimitiveFamily::Base | PrimitiveFamily::Extension => None,
        }
    }

    /// Codec required for `family`; `Ok(None)` when the family needs none.
    pub fn require(&self, family: PrimitiveFamily) -> Result<Option<ByteOrderCodec>, PrimitiveError> {
        match family {
            PrimitiveFamily::Base | PrimitiveFamily::Extension => Ok(None),
            PrimitiveFamily::Common | PrimitiveFamily::Arrays => self
                .codec(family)
                .map(Some)
                .ok_or(PrimitiveError::CodecNotSelected { family }),
        }
    }

    /// Declarations reproducing this state, in header order.
    pub fn declarations(&self) -> Vec<PrimitiveSetDecl> {
        let mut out = Vec::new();
        if let Some(c) = self.common {
            out.push(PrimitiveSetDecl::new(PrimitiveFamily::Common, c));
        }
        if let Some(c) = self.arrays {
            out.push(PrimitiveSetDecl::new(PrimitiveFamily::Arrays, c));
        }
        out
    }
}
