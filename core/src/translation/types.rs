use std::fmt;

use thiserror::Error;

use crate::constants::DmlId;
use crate::primitives::{ExtensionRegistry, PrimitiveError, PrimitiveKind};

/// Node-kind tag carried by every Name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Container,
    Primitive(PrimitiveKind),
    Structural,
    Comment,
    Padding,
}

impl NodeKind {
    pub fn type_str(&self, extensions: &ExtensionRegistry) -> String {
        match self {
            NodeKind::Primitive(p) => p.type_str(extensions),
            other => other.to_string(),
        }
    }

    pub fn parse(s: &str, extensions: &ExtensionRegistry) -> Result<Self, PrimitiveError> {
        Ok(match s {
            "container" => NodeKind::Container,
            "structural" => NodeKind::Structural,
            "comment" => NodeKind::Comment,
            "padding" => NodeKind::Padding,
            other => NodeKind::Primitive(PrimitiveKind::parse(other, extensions)?),
        })
    }

    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self {
            NodeKind::Primitive(p) => Some(*p),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Container => f.write_str("container"),
            NodeKind::Primitive(p) => write!(f, "{}", p),
            NodeKind::Structural => f.write_str("structural"),
            NodeKind::Comment => f.write_str("comment"),
            NodeKind::Padding => f.write_str("padding"),
        }
    }
}

/// Semantic identity of a node. Equality covers the label and the full kind,
/// so `Size:uint` and `Size:string` are different Names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    pub label: String,
    pub kind: NodeKind,
}

impl Name {
    pub fn new(label: impl Into<String>, kind: NodeKind) -> Self {
        Self { label: label.into(), kind }
    }

    pub fn container(label: impl Into<String>) -> Self {
        Self::new(label, NodeKind::Container)
    }

    pub fn primitive(label: impl Into<String>, kind: PrimitiveKind) -> Self {
        Self::new(label, NodeKind::Primitive(kind))
    }

    pub fn structural(label: impl Into<String>) -> Self {
        Self::new(label, NodeKind::Structural)
    }

    pub fn is_container(&self) -> bool {
        self.kind == NodeKind::Container
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.label, self.kind)
    }
}

/// Index of a scope inside its `Translation` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub(crate) usize);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A DmlId <-> Name binding, optionally owning a local scope (containers only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub id: DmlId,
    pub name: Name,
    pub local: Option<ScopeId>,
}

impl Association {
    pub fn new(id: DmlId, name: Name) -> Self {
        Self { id, name, local: None }
    }

    pub fn with_local(id: DmlId, name: Name, local: ScopeId) -> Self {
        Self { id, name, local: Some(local) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("duplicate identifier 0x{id:04x}: bound to {existing}, cannot bind {incoming}")]
    DuplicateIdentifier { id: DmlId, existing: String, incoming: String },

    #[error("duplicate name {name}: bound to 0x{existing:04x}, cannot bind 0x{incoming:04x}")]
    DuplicatePropertySet { name: String, existing: DmlId, incoming: DmlId },

    #[error("local scope of 0x{id:04x} is already attached elsewhere")]
    ScopeAlreadyAttached { id: DmlId },

    #[error("only containers may own a local scope ({name})")]
    LocalScopeOnPrimitive { name: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("identifier 0x{0:04x} is already in use")]
    IdentifierInUse(DmlId),

    #[error("identifier 0x{0:04x} lies in the reserved built-in range")]
    ReservedIdentifier(DmlId),

    #[error("identifier 0x{0:04x} is not assignable")]
    InvalidIdentifier(DmlId),

    #[error("identifier space exhausted")]
    IdentifiersExhausted,

    #[error("include cycle through '{0}'")]
    IncludeCycle(String),

    #[error("include depth {depth} exceeds the limit of {max}")]
    IncludeDepthExceeded { depth: usize, max: usize },

    #[error("cannot resolve include '{0}'")]
    UnresolvedInclude(String),

    #[error("XML translation documents are not supported ('{0}')")]
    XmlTranslationUnsupported(String),

    #[error("invalid translation document: {0}")]
    InvalidTranslationDocument(String),
}
