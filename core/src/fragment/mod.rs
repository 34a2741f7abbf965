//! fragment/mod.rs
//! Lazily materialized document tree.
//!
//! Design notes:
//! - Nodes live in an arena and refer to each other by `NodeId`; children
//!   are owned lists, the parent link is a plain index.
//! - A synthetic root container holds the top-level nodes of the stream.
//! - Containers read from a stream start `Unloaded` with the offset of their
//!   children; loading lists children as stubs and deepens level by level.
//!   Load state only moves forward.
//! - EC nodes are decoded as soon as they are listed and their subtree is
//!   fully materialized; a sequential transform cannot be resumed midway.
//! - The backing reader is released once the whole tree is loaded.

pub mod types;
pub mod tree;
pub mod load;
pub mod merge;
pub mod write;

pub use types::*;
pub use tree::*;
pub use merge::*;
