//! dml-core
//!
//! Streaming DML codec: self-describing binary documents with a separable
//! translation layer, lazily materialized trees and compressed / encrypted
//! sub-streams. Pure Rust, synchronous, no FFI.

#![forbid(unsafe_code)]

// Shared and top level
pub mod constants;
pub mod types;
pub mod utils;
pub mod config;
pub mod io;

// Codec layers
pub mod varint;
pub mod primitives;
pub mod translation;
pub mod framing;
pub mod headers;
pub mod ec;

// Document model
pub mod fragment;
pub mod document;

pub mod telemetry;

// -----------------------------------------------------------------------------
// Prelude (Rust users)
// -----------------------------------------------------------------------------
pub mod prelude {
    pub use crate::config::{ReaderOptions, WriterOptions};
    pub use crate::document::DmlDocument;
    pub use crate::ec::{EcKeys, EcKind};
    pub use crate::fragment::{FragmentTree, LoadDepth, LoadState, NodeId};
    pub use crate::framing::{DmlReader, DmlWriter, NodeEvent};
    pub use crate::headers::{DocumentHeader, IncludeTranslation};
    pub use crate::io::InputSource;
    pub use crate::primitives::{ByteOrderCodec, PrimitiveFamily, PrimitiveKind, Value};
    pub use crate::translation::{MemoryResolver, Name, NullResolver, Resolver, Translation};
    pub use crate::types::{DmlError, ErrorClass};
}
