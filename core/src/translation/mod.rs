//! translation/mod.rs
//! Identifier <-> Name resolution across nested scopes.
//!
//! Design notes:
//! - Scopes live in an arena (`Translation`) and refer to each other by
//!   `ScopeId`. Parent links and local-scope ownership are plain indices, so
//!   the scope tree has no ownership cycles.
//! - Lookup is nearest-scope-wins: a scope is searched before its parents.
//! - The built-in base translations are immutable and shared; every reader,
//!   writer and document works on a private copy.

pub mod types;
pub mod scope;
pub mod builtin;
pub mod resolver;
pub mod document;

pub use types::*;
pub use scope::*;
pub use builtin::*;
pub use resolver::*;
pub use document::*;
