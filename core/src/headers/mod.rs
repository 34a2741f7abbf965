//! headers/mod.rs
//! The document header record.
//!
//! Notes:
//! - The header is an ordinary `DML:Header` container framed with built-in
//!   identifiers, so it can be read before any user translation is known.
//! - Version and read-version travel as attributes; include directives are
//!   child containers applied in order once the header has been read.

pub mod types;
pub mod encode;
pub mod decode;

pub use types::*;
pub use encode::*;
pub use decode::*;
