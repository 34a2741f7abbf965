//! fragment/merge.rs
//! Merging containers that stand for the same logical root.

use tracing::trace;

use crate::framing::Attribute;
use crate::fragment::tree::FragmentTree;
use crate::fragment::types::{ContainerNode, FragmentError, LoadState, Node, NodeData, NodeId, PrimitiveNode};
use crate::translation::ScopeId;
use crate::types::DmlError;

/// Union `from` into `into`.
///
/// An attribute already present with an equal value is skipped; one with a
/// different value is an `AttributeConflict`. Nothing is changed on conflict.
pub fn union_attributes(into: &mut Vec<Attribute>, from: &[Attribute]) -> Result<(), FragmentError> {
    let mut added = Vec::new();
    for attr in from {
        let same = into
            .iter()
            .chain(added.iter())
            .find(|a| a.name.label == attr.name.label)
            .map(|a| a.name == attr.name && a.value == attr.value);
        match same {
            Some(true) => {}
            Some(false) => return Err(FragmentError::AttributeConflict { name: attr.name.label.clone() }),
            None => added.push(attr.clone()),
        }
    }
    into.extend(added);
    Ok(())
}

impl FragmentTree {
    /// Merge container `source` of `other` into container `target`:
    /// attributes are unioned, children are deep-copied and appended.
    /// Both sides must be fully loaded. Copied Names are bound again
    /// against this tree's translation.
    pub fn merge(&mut self, target: NodeId, other: &FragmentTree, source: NodeId) -> Result<(), DmlError> {
        if self.container(target)?.load_state != LoadState::FullyLoaded {
            return Err(FragmentError::NotFullyLoaded(target).into());
        }
        let src = other.container(source)?;
        if src.load_state != LoadState::FullyLoaded {
            return Err(FragmentError::NotFullyLoaded(source).into());
        }
        let attributes = self.rebind_attributes(self.scope_of(target), &src.attributes);
        union_attributes(&mut self.container_mut(target)?.attributes, &attributes)?;
        let mut pending: Vec<(NodeId, NodeId)> = src.children.iter().rev().map(|&child| (target, child)).collect();
        while let Some((parent, node)) = pending.pop() {
            let copy = self.copy_one(parent, other.node(node)?)?;
            if let Ok(c) = other.container(node) {
                pending.extend(c.children.iter().rev().map(|&child| (copy, child)));
            }
        }
        trace!(target = %target, appended = src.children.len(), "containers merged");
        Ok(())
    }

    /// Copy one node of another tree under `parent`, without its children.
    fn copy_one(&mut self, parent: NodeId, node: &Node) -> Result<NodeId, FragmentError> {
        let scope = self.scope_of(parent);
        let data = match &node.data {
            NodeData::Container(c) => {
                let mut copy = ContainerNode::built(c.id, c.name.clone());
                copy.encoded = c.encoded;
                if c.encoded.is_none() {
                    let bound = self.bind(scope, &c.name);
                    copy.id = bound.map(|(id, _)| id);
                    copy.scope = bound.and_then(|(_, local)| local);
                }
                copy.attributes = self.rebind_attributes(copy.scope.unwrap_or(scope), &c.attributes);
                NodeData::Container(copy)
            }
            NodeData::Primitive(p) => NodeData::Primitive(PrimitiveNode {
                id: self.bind(scope, &p.name).map(|(id, _)| id),
                name: p.name.clone(),
                value: p.value.clone(),
            }),
            leaf => leaf.clone(),
        };
        self.push(parent, data)
    }

    fn rebind_attributes(&self, scope: ScopeId, attributes: &[Attribute]) -> Vec<Attribute> {
        attributes
            .iter()
            .map(|a| Attribute { id: self.bind(scope, &a.name).map(|(id, _)| id), ..a.clone() })
            .collect()
    }
}
