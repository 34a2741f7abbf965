//! headers/encode.rs
//!
//! Header encoding. Everything is framed with built-in identifiers, which
//! resolve in the root of any translation seeded from the base vocabulary.

use std::io::Write;

use crate::constants::dml_ids;
use crate::framing::DmlWriter;
use crate::headers::types::{DocumentHeader, IncludeTranslation};
use crate::primitives::{PrimitiveSetDecl, Value};
use crate::types::DmlError;

pub fn write_include_translation<W: Write>(w: &mut DmlWriter<W>, inc: &IncludeTranslation) -> Result<(), DmlError> {
    w.write_container_by_id(dml_ids::INCLUDE_TRANSLATION)?;
    w.write_attribute_by_id(dml_ids::URI, &Value::from(inc.uri.as_str()))?;
    if let Some(urn) = &inc.urn {
        w.write_attribute_by_id(dml_ids::URN, &Value::from(urn.as_str()))?;
    }
    w.write_end_container()
}

pub fn write_include_primitives<W: Write>(w: &mut DmlWriter<W>, decl: &PrimitiveSetDecl) -> Result<(), DmlError> {
    w.write_container_by_id(dml_ids::INCLUDE_PRIMITIVES)?;
    w.write_attribute_by_id(dml_ids::SET, &Value::from(decl.set.as_str()))?;
    w.write_attribute_by_id(dml_ids::CODEC, &Value::from(decl.codec.as_str()))?;
    if let Some(uri) = &decl.codec_uri {
        w.write_attribute_by_id(dml_ids::CODEC_URI, &Value::from(uri.as_str()))?;
    }
    if let Some(config) = &decl.config {
        w.write_attribute_by_id(dml_ids::CONFIG, &Value::from(config.clone()))?;
    }
    w.write_end_container()
}

/// Write the `DML:Header` container.
///
/// Only the record is written; applying its includes and primitive sets to
/// the writer is the caller's job.
pub fn write_header<W: Write>(w: &mut DmlWriter<W>, h: &DocumentHeader) -> Result<(), DmlError> {
    h.validate()?;
    w.write_container_by_id(dml_ids::HEADER)?;
    w.write_attribute_by_id(dml_ids::VERSION, &Value::UInt(h.version))?;
    w.write_attribute_by_id(dml_ids::READ_VERSION, &Value::UInt(h.read_version))?;
    if let Some(doc_type) = &h.doc_type {
        w.write_attribute_by_id(dml_ids::DOC_TYPE, &Value::from(doc_type.as_str()))?;
    }
    for inc in &h.includes {
        write_include_translation(w, inc)?;
    }
    for decl in &h.primitive_sets {
        write_include_primitives(w, decl)?;
    }
    w.write_end_container()
}
