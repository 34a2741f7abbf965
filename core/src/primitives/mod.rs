//! primitives/mod.rs
//! Primitive value model and payload codecs.
//!
//! - `types`: the closed `PrimitiveKind` / `Value` sum types.
//! - `codec`: primitive-set declarations and the byte-order codec they select.
//! - `extension`: registered capability table for extension primitive types.
//! - `encode` / `decode`: payload bytes <-> `Value`, gated by the declared sets.

pub mod types;
pub mod codec;
pub mod extension;
pub mod encode;
pub mod decode;

pub use types::*;
pub use codec::*;
pub use extension::*;
pub use encode::*;
pub use decode::*;
