//! fragment/tree.rs
//! The node arena, its builders and accessors.

use std::sync::Arc;

use tracing::debug;

use crate::constants::DmlId;
use crate::ec::EcKind;
use crate::framing::{Attribute, DmlReader};
use crate::fragment::types::{
    ContainerNode, Diagnostic, FragmentError, LoadState, Node, NodeData, NodeId, PrimitiveNode,
};
use crate::io::ReadSeek;
use crate::primitives::{PrimitiveError, PrimitiveKind, Value};
use crate::telemetry::ReadCounters;
use crate::translation::{Name, NodeKind, ScopeId, Translation};
use crate::types::DmlError;

pub const DOCUMENT_ROOT_LABEL: &str = "#document";

pub(crate) type Backing = DmlReader<Box<dyn ReadSeek>>;

pub struct FragmentTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) backing: Option<Backing>,
    pub(crate) translation: Arc<Translation>,
    pub(crate) counters: ReadCounters,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl std::fmt::Debug for FragmentTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentTree")
            .field("nodes", &self.nodes.len())
            .field("backed", &self.backing.is_some())
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

/// Check that `value` may be stored under `kind`.
pub(crate) fn check_value(kind: &PrimitiveKind, value: &Value) -> Result<(), PrimitiveError> {
    if matches!(kind, PrimitiveKind::Extension(_)) {
        return Ok(());
    }
    let found = value.kind();
    if found != *kind {
        return Err(PrimitiveError::TypeMismatch { expected: *kind, found });
    }
    Ok(())
}

fn primitive_kind(name: &Name) -> Result<PrimitiveKind, FragmentError> {
    name.kind.primitive().ok_or_else(|| FragmentError::WrongKind(name.to_string()))
}

impl FragmentTree {
    /// Empty in-memory tree; the root is fully loaded.
    pub fn new(translation: Arc<Translation>) -> Self {
        let root = Node {
            parent: None,
            data: NodeData::Container(ContainerNode::built(None, Name::container(DOCUMENT_ROOT_LABEL))),
        };
        Self { nodes: vec![root], backing: None, translation, counters: ReadCounters::default(), diagnostics: Vec::new() }
    }

    /// Tree backed by `reader`, whose top-level nodes start at `offset`.
    /// Nothing is read until the first `load`.
    pub fn from_reader(reader: Backing, offset: u64) -> Self {
        let mut tree = Self::new(Arc::clone(reader.translation()));
        if let NodeData::Container(root) = &mut tree.nodes[0].data {
            root.load_state = LoadState::Unloaded;
            root.content_offset = Some(offset);
            root.scope = Some(reader.current_scope());
        }
        tree.backing = Some(reader);
        tree
    }

    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn translation(&self) -> &Arc<Translation> {
        &self.translation
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children(self.root()).map_or(true, |c| c.is_empty())
    }

    pub fn counters(&self) -> &ReadCounters {
        &self.counters
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// True while a backing stream is held.
    pub fn is_backed(&self) -> bool {
        self.backing.is_some()
    }

    /// Release the backing stream. Containers still unloaded can no longer
    /// be materialized.
    pub fn close(&mut self) {
        if let Some(mut reader) = self.backing.take() {
            self.counters.merge(&reader.take_counters());
            debug!(nodes = self.nodes.len(), "backing stream released");
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> Result<&Node, FragmentError> {
        self.nodes.get(id.0).ok_or(FragmentError::InvalidNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, FragmentError> {
        self.nodes.get_mut(id.0).ok_or(FragmentError::InvalidNode(id))
    }

    pub fn container(&self, id: NodeId) -> Result<&ContainerNode, FragmentError> {
        self.node(id)?.as_container().ok_or(FragmentError::NotAContainer(id))
    }

    pub(crate) fn container_mut(&mut self, id: NodeId) -> Result<&mut ContainerNode, FragmentError> {
        match &mut self.node_mut(id)?.data {
            NodeData::Container(c) => Ok(c),
            _ => Err(FragmentError::NotAContainer(id)),
        }
    }

    pub fn primitive(&self, id: NodeId) -> Result<&PrimitiveNode, FragmentError> {
        self.node(id)?.as_primitive().ok_or(FragmentError::NotAPrimitive(id))
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], FragmentError> {
        Ok(&self.container(id)?.children)
    }

    pub fn attributes(&self, id: NodeId) -> Result<&[Attribute], FragmentError> {
        Ok(&self.container(id)?.attributes)
    }

    pub fn attribute(&self, id: NodeId, label: &str) -> Result<Option<&Value>, FragmentError> {
        Ok(self.container(id)?.attribute(label))
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, FragmentError> {
        Ok(self.node(id)?.parent)
    }

    pub fn load_state(&self, id: NodeId) -> Result<LoadState, FragmentError> {
        Ok(self.container(id)?.load_state)
    }

    /// Whether the container has children, when that is known without a
    /// read. `None` for a container whose children have not been listed.
    pub fn is_expandable(&self, id: NodeId) -> Result<Option<bool>, FragmentError> {
        let c = self.container(id)?;
        Ok(match c.load_state {
            LoadState::Unloaded => None,
            _ => Some(!c.children.is_empty()),
        })
    }

    /// First child whose Name carries `label`.
    pub fn child_by_label(&self, id: NodeId, label: &str) -> Result<Option<NodeId>, FragmentError> {
        Ok(self
            .children(id)?
            .iter()
            .copied()
            .find(|&c| self.nodes.get(c.0).and_then(Node::name).is_some_and(|n| n.label == label)))
    }

    /// Child containers of `id`, in order.
    pub(crate) fn child_containers(&self, id: NodeId) -> Result<Vec<NodeId>, FragmentError> {
        Ok(self
            .children(id)?
            .iter()
            .copied()
            .filter(|c| self.nodes.get(c.0).is_some_and(|n| n.as_container().is_some()))
            .collect())
    }

    /// True when `id` and every descendant container is fully loaded.
    pub fn is_fully_loaded(&self, id: NodeId) -> Result<bool, FragmentError> {
        Ok(self.container(id)?.load_state == LoadState::FullyLoaded)
    }

    /// True when any container in the tree is an EC node.
    pub fn has_encoded(&self) -> bool {
        self.nodes.iter().any(|n| n.as_container().is_some_and(ContainerNode::is_encoded))
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    pub(crate) fn push(&mut self, parent: NodeId, data: NodeData) -> Result<NodeId, FragmentError> {
        let id = NodeId(self.nodes.len());
        self.container_mut(parent)?.children.push(id);
        self.nodes.push(Node { parent: Some(parent), data });
        Ok(id)
    }

    fn writable_parent(&self, parent: NodeId) -> Result<(), FragmentError> {
        if self.container(parent)?.load_state != LoadState::FullyLoaded {
            return Err(FragmentError::NotFullyLoaded(parent));
        }
        Ok(())
    }

    pub fn add_container(&mut self, parent: NodeId, name: Name) -> Result<NodeId, DmlError> {
        if name.kind != NodeKind::Container {
            return Err(FragmentError::WrongKind(name.to_string()).into());
        }
        self.writable_parent(parent)?;
        let bound = self.bind(self.scope_of(parent), &name);
        let mut node = ContainerNode::built(bound.map(|(id, _)| id), name);
        node.scope = bound.and_then(|(_, local)| local);
        Ok(self.push(parent, NodeData::Container(node))?)
    }

    pub fn add_primitive(&mut self, parent: NodeId, name: Name, value: Value) -> Result<NodeId, DmlError> {
        check_value(&primitive_kind(&name)?, &value)?;
        self.writable_parent(parent)?;
        let id = self.bind(self.scope_of(parent), &name).map(|(id, _)| id);
        Ok(self.push(parent, NodeData::Primitive(PrimitiveNode { id, name, value }))?)
    }

    pub fn add_comment(&mut self, parent: NodeId, text: impl Into<String>) -> Result<NodeId, DmlError> {
        self.writable_parent(parent)?;
        Ok(self.push(parent, NodeData::Comment(text.into()))?)
    }

    pub fn add_padding(&mut self, parent: NodeId, len: u64) -> Result<NodeId, DmlError> {
        self.writable_parent(parent)?;
        Ok(self.push(parent, NodeData::Padding(len))?)
    }

    /// Add an EC node; its children are written through `kind`'s transform.
    pub fn add_encoded(&mut self, parent: NodeId, kind: EcKind) -> Result<NodeId, DmlError> {
        self.writable_parent(parent)?;
        let mut node = ContainerNode::built(Some(kind.id()), Name::structural(kind.label()));
        node.encoded = Some(kind);
        Ok(self.push(parent, NodeData::Container(node))?)
    }

    /// Set (or replace) an attribute of a container.
    pub fn set_attribute(&mut self, container: NodeId, name: Name, value: Value) -> Result<(), DmlError> {
        check_value(&primitive_kind(&name)?, &value)?;
        let id = self.bind(self.scope_of(container), &name).map(|(id, _)| id);
        let c = self.container_mut(container)?;
        match c.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => c.attributes.push(Attribute { id, name, value }),
        }
        Ok(())
    }

    /// Identifier and local scope of `name` as seen from `scope`.
    pub(crate) fn bind(&self, scope: ScopeId, name: &Name) -> Option<(DmlId, Option<ScopeId>)> {
        self.translation.try_find_name(scope, name).map(|(_, a)| (a.id, a.local))
    }

    /// Resolution scope for nodes placed under `id`: the nearest recorded
    /// scope on the ancestor path, else the translation root.
    pub(crate) fn scope_of(&self, id: NodeId) -> ScopeId {
        let mut cur = Some(id);
        while let Some(n) = cur {
            let Some(node) = self.nodes.get(n.0) else { break };
            if let Some(scope) = node.as_container().and_then(|c| c.scope) {
                return scope;
            }
            cur = node.parent;
        }
        self.translation.root()
    }
}
