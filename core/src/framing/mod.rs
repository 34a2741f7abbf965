//! framing/mod.rs
//! Node framing: heads, length-prefixed payloads, container structure.
//!
//! Wire:
//! ```text
//! head      := varint(id) | varint(0x3FFF) str(name) str(type)
//! primitive := head varint(len) payload
//! container := head primitive* EndAttributes node* EndContainer
//! ```
//! Containers carry no length; their extent is found by walking their
//! nodes. EC nodes are a head followed directly by the transform stream.

pub mod types;
pub mod reader;
pub mod writer;

pub use types::*;
pub use reader::*;
pub use writer::*;
