//! headers/decode.rs
//!
//! Header decoding, plus the attribute parsers for include directives that
//! translation documents share.

use std::io::{Read, Seek};

use tracing::debug;

use crate::framing::{attribute_by_label, Attribute, DmlReader, NodeEvent};
use crate::headers::types::{DocumentHeader, HeaderError, IncludeTranslation};
use crate::primitives::{PrimitiveSetDecl, Value};
use crate::translation::labels;
use crate::types::DmlError;

pub mod fields {
    pub const VERSION: &str = "DML:Version";
    pub const READ_VERSION: &str = "DML:ReadVersion";
    pub const DOC_TYPE: &str = "DML:DocType";
    pub const URI: &str = "DML:URI";
    pub const URN: &str = "DML:URN";
    pub const SET: &str = "DML:Set";
    pub const CODEC: &str = "DML:Codec";
    pub const CODEC_URI: &str = "DML:CodecURI";
    pub const CONFIG: &str = "DML:Config";
    pub const INCLUDE_TRANSLATION: &str = "DML:Include-Translation";
    pub const INCLUDE_PRIMITIVES: &str = "DML:Include-Primitives";
}

pub(crate) fn opt_str(attrs: &[Attribute], field: &'static str) -> Result<Option<String>, HeaderError> {
    match attribute_by_label(attrs, field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(HeaderError::InvalidField { field, found: other.kind().to_string() }),
    }
}

pub(crate) fn req_str(attrs: &[Attribute], field: &'static str) -> Result<String, HeaderError> {
    opt_str(attrs, field)?.ok_or(HeaderError::MissingField(field))
}

pub(crate) fn req_uint(attrs: &[Attribute], field: &'static str) -> Result<u64, HeaderError> {
    match attribute_by_label(attrs, field) {
        None => Err(HeaderError::MissingField(field)),
        Some(v) => v.as_u64().ok_or_else(|| HeaderError::InvalidField { field, found: v.kind().to_string() }),
    }
}

pub fn parse_include_translation(attrs: &[Attribute]) -> Result<IncludeTranslation, HeaderError> {
    Ok(IncludeTranslation { uri: req_str(attrs, fields::URI)?, urn: opt_str(attrs, fields::URN)? })
}

pub fn parse_include_primitives(attrs: &[Attribute]) -> Result<PrimitiveSetDecl, HeaderError> {
    let config = match attribute_by_label(attrs, fields::CONFIG) {
        None => None,
        Some(v) => Some(
            v.as_bytes()
                .ok_or_else(|| HeaderError::InvalidField { field: fields::CONFIG, found: v.kind().to_string() })?
                .to_vec(),
        ),
    };
    Ok(PrimitiveSetDecl {
        set: req_str(attrs, fields::SET)?,
        codec: req_str(attrs, fields::CODEC)?,
        codec_uri: opt_str(attrs, fields::CODEC_URI)?,
        config,
    })
}

/// Read an include directive container whose head was just consumed:
/// attributes, then no children.
pub(crate) fn read_directive<R: Read + Seek>(reader: &mut DmlReader<R>) -> Result<Vec<Attribute>, DmlError> {
    let attrs = reader.read_attributes()?;
    match reader.read_node()? {
        NodeEvent::ContainerEnd => Ok(attrs),
        other => Err(HeaderError::UnexpectedNode(other.describe()).into()),
    }
}

/// Parse the body of a `DML:Header` container whose head was just read.
pub fn read_header_body<R: Read + Seek>(reader: &mut DmlReader<R>) -> Result<DocumentHeader, DmlError> {
    let attrs = reader.read_attributes()?;
    let mut header = DocumentHeader {
        version: req_uint(&attrs, fields::VERSION)?,
        read_version: req_uint(&attrs, fields::READ_VERSION)?,
        doc_type: opt_str(&attrs, fields::DOC_TYPE)?,
        ..DocumentHeader::default()
    };
    header.validate()?;

    loop {
        match reader.read_node()? {
            NodeEvent::ContainerEnd => break,
            NodeEvent::ContainerStart { name, .. } if name.label == fields::INCLUDE_TRANSLATION => {
                let attrs = read_directive(reader)?;
                header.includes.push(parse_include_translation(&attrs)?);
            }
            NodeEvent::ContainerStart { name, .. } if name.label == fields::INCLUDE_PRIMITIVES => {
                let attrs = read_directive(reader)?;
                header.primitive_sets.push(parse_include_primitives(&attrs)?);
            }
            NodeEvent::Comment(_) | NodeEvent::Padding(_) => {}
            other => return Err(HeaderError::UnexpectedNode(other.describe()).into()),
        }
    }
    debug!(
        version = header.version,
        read_version = header.read_version,
        includes = header.includes.len(),
        sets = header.primitive_sets.len(),
        "header read"
    );
    Ok(header)
}

/// Read the header that must open the stream.
pub fn read_header<R: Read + Seek>(reader: &mut DmlReader<R>) -> Result<DocumentHeader, DmlError> {
    read_header_opt(reader)?.ok_or_else(|| {
        HeaderError::MissingHeader { found: "a non-header node".into() }.into()
    })
}

/// Read a header if the stream opens with one; otherwise rewind and
/// return `None`.
pub fn read_header_opt<R: Read + Seek>(reader: &mut DmlReader<R>) -> Result<Option<DocumentHeader>, DmlError> {
    let start = reader.position();
    loop {
        match reader.read_node()? {
            NodeEvent::ContainerStart { name, .. } if name.label == labels::HEADER => {
                return read_header_body(reader).map(Some);
            }
            NodeEvent::Comment(_) | NodeEvent::Padding(_) => continue,
            _ => {
                reader.rewind_to(start)?;
                return Ok(None);
            }
        }
    }
}
