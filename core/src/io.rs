//! io.rs
//! Input normalization.
//!
//! Lazy loading seeks back to recorded offsets, so every input is turned
//! into a `Read + Seek` stream. Plain readers are buffered into memory.

use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::PathBuf;

use crate::types::DmlError;

/// Object-safe `Read + Seek`.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Canonical input abstraction
pub enum InputSource {
    Reader(Box<dyn Read>),
    File(PathBuf),
    Memory(Vec<u8>),
}

impl From<Vec<u8>> for InputSource {
    fn from(bytes: Vec<u8>) -> Self {
        InputSource::Memory(bytes)
    }
}

impl From<PathBuf> for InputSource {
    fn from(path: PathBuf) -> Self {
        InputSource::File(path)
    }
}

/// Normalize input source into a boxed seekable reader
pub fn open_input(src: InputSource) -> Result<Box<dyn ReadSeek>, DmlError> {
    let reader: Box<dyn ReadSeek> = match src {
        InputSource::Reader(mut r) => {
            let mut buf = Vec::new();
            r.read_to_end(&mut buf)?;
            Box::new(Cursor::new(buf))
        }
        InputSource::File(p) => Box::new(File::open(p)?),
        InputSource::Memory(b) => Box::new(Cursor::new(b)),
    };
    Ok(reader)
}
