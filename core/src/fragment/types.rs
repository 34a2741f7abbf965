use std::fmt;

use thiserror::Error;

use crate::constants::DmlId;
use crate::ec::EcKind;
use crate::framing::Attribute;
use crate::primitives::Value;
use crate::translation::{Name, ScopeId};
use crate::types::ErrorClass;

/// Handle of a node inside its `FragmentTree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Materialization progress of a container. Ordered; never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadState {
    /// Children not read yet.
    Unloaded,
    /// Children listed; some descendant is still unloaded.
    PartiallyLoaded,
    /// Whole subtree in memory.
    FullyLoaded,
}

/// How far a `load` call reaches below the target container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadDepth {
    /// Direct children only.
    Shallow,
    /// `n` levels of descendants (`Levels(1)` is `Shallow`).
    Levels(usize),
    Full,
}

impl LoadDepth {
    pub(crate) fn levels(self) -> usize {
        match self {
            LoadDepth::Shallow => 1,
            LoadDepth::Levels(n) => n.max(1),
            LoadDepth::Full => usize::MAX,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerNode {
    pub id: Option<DmlId>,
    pub name: Name,
    pub attributes: Vec<Attribute>,
    pub children: Vec<NodeId>,
    pub load_state: LoadState,
    /// Stream offset of the first child (for EC nodes: of the transform
    /// stream). `None` for nodes built in memory.
    pub content_offset: Option<u64>,
    /// Resolution scope of the children.
    pub scope: Option<ScopeId>,
    /// Set for compressed / encrypted nodes.
    pub encoded: Option<EcKind>,
}

impl ContainerNode {
    pub(crate) fn built(id: Option<DmlId>, name: Name) -> Self {
        Self {
            id,
            name,
            attributes: Vec::new(),
            children: Vec::new(),
            load_state: LoadState::FullyLoaded,
            content_offset: None,
            scope: None,
            encoded: None,
        }
    }

    pub fn attribute(&self, label: &str) -> Option<&Value> {
        crate::framing::attribute_by_label(&self.attributes, label)
    }

    pub fn is_encoded(&self) -> bool {
        self.encoded.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveNode {
    pub id: Option<DmlId>,
    pub name: Name,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Container(ContainerNode),
    Primitive(PrimitiveNode),
    Comment(String),
    /// Padding length in bytes.
    Padding(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub data: NodeData,
}

impl Node {
    pub fn as_container(&self) -> Option<&ContainerNode> {
        match &self.data {
            NodeData::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_primitive(&self) -> Option<&PrimitiveNode> {
        match &self.data {
            NodeData::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&Name> {
        match &self.data {
            NodeData::Container(c) => Some(&c.name),
            NodeData::Primitive(p) => Some(&p.name),
            NodeData::Comment(_) | NodeData::Padding(_) => None,
        }
    }
}

/// Recoverable condition noticed while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    ChecksumMismatch { node: NodeId, kind: EcKind, expected: u32, actual: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FragmentError {
    #[error("backing stream closed while unloaded containers remain")]
    BackingStreamClosed,

    #[error("no node {0}")]
    InvalidNode(NodeId),

    #[error("node {0} is not a container")]
    NotAContainer(NodeId),

    #[error("node {0} is not a primitive")]
    NotAPrimitive(NodeId),

    #[error("attribute conflict on {name}")]
    AttributeConflict { name: String },

    #[error("container {0} is not fully loaded")]
    NotFullyLoaded(NodeId),

    #[error("{0} cannot be stored as a node here")]
    WrongKind(String),
}

impl FragmentError {
    pub fn class(&self) -> ErrorClass {
        match self {
            FragmentError::BackingStreamClosed => ErrorClass::Resource,
            FragmentError::AttributeConflict { .. } => ErrorClass::Resolution,
            _ => ErrorClass::Structural,
        }
    }
}
