//! headers/types.rs
//! Header record and its errors.

use std::fmt;

use crate::constants::{DML_READ_VERSION, DML_VERSION, URN_DML_EC};
use crate::primitives::{ByteOrderCodec, PrimitiveFamily, PrimitiveSetDecl};

/// One `DML:Include-Translation` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeTranslation {
    pub uri: String,
    pub urn: Option<String>,
}

impl IncludeTranslation {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into(), urn: None }
    }

    pub fn with_urn(uri: impl Into<String>, urn: impl Into<String>) -> Self {
        Self { uri: uri.into(), urn: Some(urn.into()) }
    }

    /// Key used for built-in lookup and include caching: URN when given.
    pub fn key(&self) -> &str {
        self.urn.as_deref().unwrap_or(&self.uri)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHeader {
    pub version: u64,
    pub read_version: u64,
    pub doc_type: Option<String>,
    pub includes: Vec<IncludeTranslation>,
    pub primitive_sets: Vec<PrimitiveSetDecl>,
}

impl Default for DocumentHeader {
    fn default() -> Self {
        Self {
            version: DML_VERSION,
            read_version: DML_READ_VERSION,
            doc_type: None,
            includes: Vec::new(),
            primitive_sets: Vec::new(),
        }
    }
}

impl DocumentHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    pub fn include(mut self, inc: IncludeTranslation) -> Self {
        self.includes.push(inc);
        self
    }

    pub fn declare(mut self, family: PrimitiveFamily, codec: ByteOrderCodec) -> Self {
        self.primitive_sets.push(PrimitiveSetDecl::new(family, codec));
        self
    }

    pub fn includes_urn(&self, urn: &str) -> bool {
        self.includes.iter().any(|i| i.urn.as_deref() == Some(urn) || i.uri == urn)
    }

    /// Add the EC vocabulary include unless already present.
    pub fn ensure_ec_include(&mut self) {
        if !self.includes_urn(URN_DML_EC) {
            self.includes.push(IncludeTranslation::with_urn(URN_DML_EC, URN_DML_EC));
        }
    }

    /// Reject headers this reader cannot honour.
    pub fn validate(&self) -> Result<(), HeaderError> {
        if self.version == 0 {
            return Err(HeaderError::InvalidVersion { have: self.version });
        }
        if self.read_version > DML_VERSION {
            return Err(HeaderError::UnsupportedReadVersion { required: self.read_version, supported: DML_VERSION });
        }
        if self.read_version > self.version {
            return Err(HeaderError::Validation(format!(
                "read version {} is newer than version {}",
                self.read_version, self.version
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// First node of the stream is not a `DML:Header` container.
    MissingHeader { found: String },

    InvalidVersion { have: u64 },

    /// The document needs a newer reader.
    UnsupportedReadVersion { required: u64, supported: u64 },

    /// A required attribute is absent.
    MissingField(&'static str),

    /// Attribute present with the wrong value type.
    InvalidField { field: &'static str, found: String },

    /// Node that has no place in a header or include directive.
    UnexpectedNode(String),

    Validation(String),
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use HeaderError::*;
        match self {
            MissingHeader { found } =>
                write!(f, "missing header: stream starts with {}", found),
            InvalidVersion { have } =>
                write!(f, "invalid version: {}", have),
            UnsupportedReadVersion { required, supported } =>
                write!(f, "unsupported read version: document requires {}, reader supports {}", required, supported),
            MissingField(field) =>
                write!(f, "missing header field {}", field),
            InvalidField { field, found } =>
                write!(f, "header field {} has type {}", field, found),
            UnexpectedNode(what) =>
                write!(f, "unexpected {} in header", what),
            Validation(msg) =>
                write!(f, "header validation error: {}", msg),
        }
    }
}

impl std::error::Error for HeaderError {}
