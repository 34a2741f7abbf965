use thiserror::Error;

use crate::constants::DmlId;
use crate::ec::EcKind;
use crate::primitives::Value;
use crate::translation::Name;
use crate::utils::fmt_id;

/// Raw node head as found on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeHead {
    Id(DmlId),
    Inline { name: String, type_str: String },
}

/// A primitive attached to a container (before its EndAttributes marker).
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// `None` when the attribute was framed inline.
    pub id: Option<DmlId>,
    pub name: Name,
    pub value: Value,
}

impl Attribute {
    pub fn new(name: Name, value: Value) -> Self {
        Self { id: None, name, value }
    }
}

pub fn attribute_by_id(attrs: &[Attribute], id: DmlId) -> Option<&Value> {
    attrs.iter().find(|a| a.id == Some(id)).map(|a| &a.value)
}

pub fn attribute_by_label<'a>(attrs: &'a [Attribute], label: &str) -> Option<&'a Value> {
    attrs.iter().find(|a| a.name.label == label).map(|a| &a.value)
}

/// One step of a read.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// `offset` is where the head starts.
    ContainerStart { id: Option<DmlId>, name: Name, offset: u64 },
    ContainerEnd,
    EndAttributes,
    Primitive { id: Option<DmlId>, name: Name, value: Value },
    Comment(String),
    /// Padding length in bytes.
    Padding(u64),
    /// EC head read; the transform stream starts at the current position.
    Encoded { kind: EcKind, offset: u64 },
    EndOfStream,
}

impl NodeEvent {
    pub fn describe(&self) -> String {
        match self {
            NodeEvent::ContainerStart { name, .. } => format!("container {}", name.label),
            NodeEvent::ContainerEnd => "end of container".into(),
            NodeEvent::EndAttributes => "end of attributes".into(),
            NodeEvent::Primitive { name, .. } => format!("primitive {}", name),
            NodeEvent::Comment(_) => "comment".into(),
            NodeEvent::Padding(_) => "padding".into(),
            NodeEvent::Encoded { kind, .. } => format!("EC node {}", kind),
            NodeEvent::EndOfStream => "end of stream".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("identifier {} cannot identify a node", fmt_id(*.0))]
    InvalidIdentifier(DmlId),

    #[error("identifier {0} does not fit in 32 bits")]
    IdentifierOutOfRange(u64),

    #[error("identifier {} is not bound in the current scope", fmt_id(*.0))]
    UnknownIdentifier(DmlId),

    #[error("inline node with an empty name")]
    EmptyInlineName,

    #[error("payload of {len} byte(s) runs past end of stream ({available} available)")]
    PayloadPastEnd { len: u64, available: u64 },

    #[error("payload of {len} byte(s) exceeds the limit of {max}")]
    PayloadTooLarge { len: u64, max: u64 },

    #[error("unknown structural node {0}")]
    UnknownNodeKind(String),

    #[error("unexpected {found} in {context}")]
    UnexpectedNode { found: String, context: &'static str },

    #[error("stream ended with {open} container(s) still open")]
    UnexpectedEndOfStream { open: usize },

    #[error("end of container without an open container")]
    UnbalancedEnd,

    #[error("{0} container(s) left open")]
    UnclosedContainers(usize),

    #[error("{name} is not a {expected}")]
    WrongNodeKind { name: String, expected: &'static str },

    #[error("attribute section of the current container is already closed")]
    AttributesClosed,

    #[error("encoded content nested deeper than {max} level(s)")]
    NestingTooDeep { max: usize },
}
