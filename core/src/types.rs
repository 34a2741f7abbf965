//! types.rs
//! Crate-wide error type.
//!
//! - One error enum per layer; `DmlError` wraps them all with `From` impls
//!   so `?` works across layer boundaries.
//! - `At` attaches the byte offset (and node, when known) of a failure.
//! - `class()` maps every error onto the five failure classes callers act on.

use std::io;

use thiserror::Error;

use crate::ec::EcError;
use crate::fragment::FragmentError;
use crate::framing::FramingError;
use crate::headers::HeaderError;
use crate::primitives::PrimitiveError;
use crate::translation::ResolutionError;
use crate::varint::{ReadVarintError, VarintError};

/// Failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Malformed input; the current read is aborted.
    Structural,
    /// Identifier / name binding failure; resolved state is left intact.
    Resolution,
    /// Sibling load failures collected during a partial load.
    PartialLoad,
    /// Authentication or checksum failure.
    Security,
    /// The backing stream is gone.
    Resource,
}

#[derive(Debug, Error)]
pub enum DmlError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Varint(#[from] VarintError),

    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("primitive error: {0}")]
    Primitive(#[from] PrimitiveError),

    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("header error: {0}")]
    Header(#[from] HeaderError),

    #[error("fragment error: {0}")]
    Fragment(#[from] FragmentError),

    #[error("EC error: {0}")]
    Ec(#[from] EcError),

    /// First failure of a sibling load, re-raised after every sibling was tried.
    #[error("partial load failed: {first} (+{additional_failures} more)")]
    PartialLoad { first: Box<DmlError>, additional_failures: usize },

    #[error("{source} (at byte {offset}{})", fmt_node(.node))]
    At { offset: u64, node: Option<String>, source: Box<DmlError> },
}

fn fmt_node(node: &Option<String>) -> String {
    match node {
        Some(n) => format!(", node {}", n),
        None => String::new(),
    }
}

impl From<ReadVarintError> for DmlError {
    fn from(e: ReadVarintError) -> Self {
        match e {
            ReadVarintError::Io(io) => DmlError::Io(io),
            ReadVarintError::Varint(v) => DmlError::Varint(v),
        }
    }
}

impl DmlError {
    /// Attach position context. An error that already carries a position
    /// keeps its innermost one.
    pub fn at(self, offset: u64, node: Option<String>) -> Self {
        match self {
            DmlError::At { .. } | DmlError::PartialLoad { .. } => self,
            other => DmlError::At { offset, node, source: Box::new(other) },
        }
    }

    /// Innermost error with positional wrappers removed.
    pub fn root_cause(&self) -> &DmlError {
        match self {
            DmlError::At { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn offset(&self) -> Option<u64> {
        match self {
            DmlError::At { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            DmlError::Io(_)
            | DmlError::Varint(_)
            | DmlError::Framing(_)
            | DmlError::Primitive(_)
            | DmlError::Header(_) => ErrorClass::Structural,
            DmlError::Resolution(_) => ErrorClass::Resolution,
            DmlError::Fragment(f) => f.class(),
            DmlError::Ec(e) => match e {
                EcError::AuthenticationFailed | EcError::ChecksumMismatch { .. } | EcError::MissingKeys => {
                    ErrorClass::Security
                }
                _ => ErrorClass::Structural,
            },
            DmlError::PartialLoad { .. } => ErrorClass::PartialLoad,
            DmlError::At { source, .. } => source.class(),
        }
    }

    /// True when the innermost error is the given EC error.
    pub fn is_ec(&self, e: &EcError) -> bool {
        matches!(self.root_cause(), DmlError::Ec(inner) if inner == e)
    }
}
