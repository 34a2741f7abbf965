//! fragment/load.rs
//! Lazy materialization of containers from the backing stream.
//!
//! A load lists the direct children of a container (child containers become
//! `Unloaded` stubs remembering where their content starts), then descends
//! as far as the requested depth. A full load of an unloaded container reads
//! its subtree in a single forward pass instead. Neither walk recurses per
//! nesting level. EC nodes are decoded eagerly and come back fully loaded. Sibling failures do not stop the walk; they are collected
//! and returned once every sibling has been tried.

use std::io::{Read, Seek};

use tracing::{debug, warn};

use crate::ec::{ChecksumStatus, EcContent, EcFrame};
use crate::framing::{DmlReader, FramingError, NodeEvent};
use crate::fragment::tree::FragmentTree;
use crate::fragment::types::{
    ContainerNode, Diagnostic, FragmentError, LoadDepth, LoadState, NodeData, NodeId, PrimitiveNode,
};
use crate::translation::{Name, ScopeId};
use crate::types::DmlError;

/// Where a listing starts reading.
#[derive(Debug, Clone, Copy)]
enum Start {
    /// Top level of a stream; ends at end of stream.
    TopLevel(u64),
    /// Inside a container resolving in `ScopeId`; ends at its `EndContainer`.
    Inside(u64, ScopeId),
}

fn refire(mut errors: Vec<DmlError>) -> Result<(), DmlError> {
    if errors.is_empty() {
        return Ok(());
    }
    let first = errors.remove(0);
    Err(DmlError::PartialLoad { first: Box::new(first), additional_failures: errors.len() })
}

impl FragmentTree {
    /// Materialize `node` to `depth`.
    ///
    /// An error listing `node` itself is returned as is. Failures below it
    /// come back as one `PartialLoad` after all siblings were attempted; the
    /// nodes that did load stay loaded. The backing stream is released as
    /// soon as the whole tree is in memory.
    pub fn load(&mut self, node: NodeId, depth: LoadDepth) -> Result<(), DmlError> {
        if self.container(node)?.load_state == LoadState::FullyLoaded {
            return Ok(());
        }
        let mut reader = self.backing.take().ok_or(FragmentError::BackingStreamClosed)?;
        let mut errors = Vec::new();
        let result = self.expand(&mut reader, node, depth.levels(), &mut errors);
        self.counters.merge(&reader.take_counters());
        self.backing = Some(reader);

        self.promote_ancestors(node);
        if self.container(self.root())?.load_state == LoadState::FullyLoaded {
            self.close();
        }
        result?;
        if !errors.is_empty() {
            warn!(node = %node, failures = errors.len(), "partial load completed with failures");
        }
        refire(errors)
    }

    /// Load `node` plus one extra level, so every child container can report
    /// whether it is expandable without another read.
    pub fn ensure_expandable(&mut self, node: NodeId) -> Result<(), DmlError> {
        self.load(node, LoadDepth::Levels(2))
    }

    /// Walk from `node` down `levels` levels with an explicit work stack.
    /// An unloaded container asked for in full is built in one forward pass.
    fn expand<R: Read + Seek>(
        &mut self,
        reader: &mut DmlReader<R>,
        node: NodeId,
        levels: usize,
        errors: &mut Vec<DmlError>,
    ) -> Result<(), DmlError> {
        let mut pending = vec![(node, levels)];
        let mut visited = Vec::new();
        while let Some((current, levels)) = pending.pop() {
            let listed = match self.expand_one(reader, current, levels, errors) {
                Ok(listed) => listed,
                Err(e) if current == node => return Err(e),
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            visited.push(current);
            let Some(listed) = listed else { continue };
            if levels <= 1 {
                continue;
            }
            let next = if levels == usize::MAX { levels } else { levels - 1 };
            for child in self.child_containers(current)?.into_iter().rev() {
                // EC children were already attempted by the listing
                if listed && self.container(child)?.is_encoded() {
                    continue;
                }
                pending.push((child, next));
            }
        }
        // children were visited after their parents
        for n in visited.into_iter().rev() {
            self.refresh_state(n)?;
        }
        Ok(())
    }

    /// Materialize one container. `Some(listed)` when its child containers
    /// still need a visit, `None` when nothing below it is left to do.
    fn expand_one<R: Read + Seek>(
        &mut self,
        reader: &mut DmlReader<R>,
        node: NodeId,
        levels: usize,
        errors: &mut Vec<DmlError>,
    ) -> Result<Option<bool>, DmlError> {
        let (state, offset, scope, encoded, is_root) = {
            let n = self.node(node)?;
            let c = n.as_container().ok_or(FragmentError::NotAContainer(node))?;
            (c.load_state, c.content_offset, c.scope, c.encoded, n.parent.is_none())
        };
        match state {
            LoadState::FullyLoaded => Ok(None),
            LoadState::PartiallyLoaded => Ok(Some(false)),
            LoadState::Unloaded => {
                let offset = offset.ok_or(FragmentError::NotFullyLoaded(node))?;
                let scope = scope.unwrap_or_else(|| self.translation.root());
                if let Some(kind) = encoded {
                    reader.reposition(offset, scope)?;
                    let frame = reader.read_encoded_frame(kind)?;
                    self.materialize_encoded(reader, node, frame)?;
                    return Ok(None);
                }
                let start = if is_root { Start::TopLevel(offset) } else { Start::Inside(offset, scope) };
                if levels == usize::MAX {
                    self.build_subtree(reader, node, start, errors)?;
                    return Ok(None);
                }
                self.list_into(reader, node, start, errors)?;
                Ok(Some(true))
            }
        }
    }

    fn seek_start<R: Read + Seek>(reader: &mut DmlReader<R>, start: Start) -> Result<(), DmlError> {
        match start {
            Start::TopLevel(offset) => reader.rewind_to(offset),
            Start::Inside(offset, scope) => reader.reposition(offset, scope),
        }
    }

    /// Read the direct children of `node`. On failure the node is left
    /// unloaded with no children.
    fn list_into<R: Read + Seek>(
        &mut self,
        reader: &mut DmlReader<R>,
        node: NodeId,
        start: Start,
        errors: &mut Vec<DmlError>,
    ) -> Result<(), DmlError> {
        let mark = self.nodes.len();
        let result = Self::seek_start(reader, start).and_then(|()| self.list_children(reader, node, errors));
        match result {
            Ok(()) => {
                self.container_mut(node)?.load_state = LoadState::PartiallyLoaded;
                Ok(())
            }
            Err(e) => {
                self.discard_children(node, mark)?;
                Err(e)
            }
        }
    }

    fn list_children<R: Read + Seek>(
        &mut self,
        reader: &mut DmlReader<R>,
        node: NodeId,
        errors: &mut Vec<DmlError>,
    ) -> Result<(), DmlError> {
        loop {
            match reader.read_node()? {
                NodeEvent::ContainerEnd | NodeEvent::EndOfStream => return Ok(()),
                NodeEvent::ContainerStart { id, name, .. } => {
                    let attributes = reader.read_attributes()?;
                    let mut stub = ContainerNode::built(id, name);
                    stub.attributes = attributes;
                    stub.load_state = LoadState::Unloaded;
                    stub.content_offset = Some(reader.position());
                    stub.scope = Some(reader.current_scope());
                    reader.skip_container_body()?;
                    self.push(node, NodeData::Container(stub))?;
                }
                event => self.push_event(reader, node, event, errors)?,
            }
        }
    }

    /// Build the whole subtree of `node` in one forward pass.
    ///
    /// A failure inside a descendant container leaves that container
    /// unloaded, is collected, and reading resumes after its end. A failure
    /// that cannot be confined below `node` is returned, and `node` is left
    /// unloaded with no children.
    fn build_subtree<R: Read + Seek>(
        &mut self,
        reader: &mut DmlReader<R>,
        node: NodeId,
        start: Start,
        errors: &mut Vec<DmlError>,
    ) -> Result<(), DmlError> {
        let mark = self.nodes.len();
        let base = match start {
            Start::TopLevel(_) => Vec::new(),
            Start::Inside(_, scope) => vec![scope],
        };
        let result = Self::seek_start(reader, start).and_then(|()| self.build_children(reader, node, &base, errors));
        if let Err(e) = result {
            self.discard_children(node, mark)?;
            return Err(e);
        }
        for index in (mark..self.nodes.len()).rev() {
            let id = NodeId(index);
            if self.container(id).is_ok_and(|c| !c.is_encoded()) {
                self.refresh_state(id)?;
            }
        }
        self.container_mut(node)?.load_state = LoadState::PartiallyLoaded;
        self.refresh_state(node)
    }

    fn build_children<R: Read + Seek>(
        &mut self,
        reader: &mut DmlReader<R>,
        node: NodeId,
        base: &[ScopeId],
        errors: &mut Vec<DmlError>,
    ) -> Result<(), DmlError> {
        let mut open: Vec<NodeId> = Vec::new();
        loop {
            match self.build_step(reader, node, &mut open, errors) {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(e) => self.recover(reader, base, &mut open, errors, e)?,
            }
        }
    }

    /// Apply one event. `Ok(false)` once `node` is complete.
    fn build_step<R: Read + Seek>(
        &mut self,
        reader: &mut DmlReader<R>,
        node: NodeId,
        open: &mut Vec<NodeId>,
        errors: &mut Vec<DmlError>,
    ) -> Result<bool, DmlError> {
        let parent = open.last().copied().unwrap_or(node);
        match reader.read_node()? {
            NodeEvent::ContainerEnd => {
                if open.pop().is_none() {
                    return Ok(false);
                }
            }
            NodeEvent::EndOfStream => {
                if reader.depth() > 0 {
                    return Err(FramingError::UnexpectedEndOfStream { open: reader.depth() }.into());
                }
                return Ok(false);
            }
            NodeEvent::ContainerStart { id, name, .. } => {
                let attributes = reader.read_attributes()?;
                let mut container = ContainerNode::built(id, name);
                container.attributes = attributes;
                container.load_state = LoadState::PartiallyLoaded;
                container.content_offset = Some(reader.position());
                container.scope = Some(reader.current_scope());
                let child = self.push(parent, NodeData::Container(container))?;
                open.push(child);
            }
            event => self.push_event(reader, parent, event, errors)?,
        }
        Ok(true)
    }

    /// Give up on the innermost open container after `err`: leave it
    /// unloaded and resume after its end. When its end cannot be found the
    /// failure moves to its parent; with nothing open it is returned.
    fn recover<R: Read + Seek>(
        &mut self,
        reader: &mut DmlReader<R>,
        base: &[ScopeId],
        open: &mut Vec<NodeId>,
        errors: &mut Vec<DmlError>,
        mut err: DmlError,
    ) -> Result<(), DmlError> {
        loop {
            let Some(failed) = open.pop() else { return Err(err) };
            // everything pushed after an open container is its descendant
            self.discard_children(failed, failed.0 + 1)?;
            let mut scopes = base.to_vec();
            for &n in open.iter().chain(std::iter::once(&failed)) {
                scopes.extend(self.container(n)?.scope);
            }
            let offset = self.container(failed)?.content_offset.ok_or(FragmentError::NotFullyLoaded(failed))?;
            match reader.resume_at(offset, &scopes).and_then(|()| reader.skip_container_body()) {
                Ok(()) => {
                    errors.push(err);
                    return Ok(());
                }
                Err(e) => err = e,
            }
        }
    }

    /// Store a leaf or EC event under `parent`. EC nodes are decoded on the
    /// spot and their failures collected.
    fn push_event<R: Read + Seek>(
        &mut self,
        reader: &mut DmlReader<R>,
        parent: NodeId,
        event: NodeEvent,
        errors: &mut Vec<DmlError>,
    ) -> Result<(), DmlError> {
        match event {
            NodeEvent::Primitive { id, name, value } => {
                self.push(parent, NodeData::Primitive(PrimitiveNode { id, name, value }))?;
            }
            NodeEvent::Comment(text) => {
                self.push(parent, NodeData::Comment(text))?;
            }
            NodeEvent::Padding(len) => {
                self.push(parent, NodeData::Padding(len))?;
            }
            NodeEvent::Encoded { kind, offset } => {
                let frame = reader.read_encoded_frame(kind)?;
                let mut stub = ContainerNode::built(Some(kind.id()), Name::structural(kind.label()));
                stub.load_state = LoadState::Unloaded;
                stub.content_offset = Some(offset);
                stub.scope = Some(reader.current_scope());
                stub.encoded = Some(kind);
                let child = self.push(parent, NodeData::Container(stub))?;
                if let Err(e) = self.materialize_encoded(reader, child, frame) {
                    errors.push(e.at(offset, Some(kind.label().to_owned())));
                }
            }
            other => {
                return Err(FramingError::UnexpectedNode { found: other.describe(), context: "child list" }.into())
            }
        }
        Ok(())
    }

    /// Decode an EC frame and build its whole subtree. All or nothing: on
    /// any failure the node stays unloaded.
    fn materialize_encoded<R: Read + Seek>(
        &mut self,
        reader: &mut DmlReader<R>,
        node: NodeId,
        frame: EcFrame,
    ) -> Result<(), DmlError> {
        let kind = frame.kind();
        let EcContent { bytes, checksum, .. } = reader.decode_encoded(frame)?;
        let mut nested = reader.nested(bytes)?;
        let mark = self.nodes.len();
        let mut inner = Vec::new();
        let result = self
            .build_subtree(&mut nested, node, Start::TopLevel(0), &mut inner)
            .and_then(|()| refire(inner));
        reader.counters_mut().merge(&nested.take_counters());

        match result {
            Ok(()) => {
                self.container_mut(node)?.load_state = LoadState::FullyLoaded;
                if let ChecksumStatus::Mismatch { expected, actual } = checksum {
                    self.diagnostics.push(Diagnostic::ChecksumMismatch { node, kind, expected, actual });
                }
                debug!(node = %node, kind = %kind, "EC node materialized");
                Ok(())
            }
            Err(e) => {
                self.discard_children(node, mark)?;
                Err(e)
            }
        }
    }

    /// Forget every node from `mark` on (all of them under `node`) and
    /// reset `node` to unloaded.
    fn discard_children(&mut self, node: NodeId, mark: usize) -> Result<(), DmlError> {
        self.nodes.truncate(mark);
        self.diagnostics.retain(|d| match d {
            Diagnostic::ChecksumMismatch { node: n, .. } => n.0 < mark,
        });
        let c = self.container_mut(node)?;
        c.children.clear();
        c.load_state = LoadState::Unloaded;
        Ok(())
    }

    /// Recompute the state of a listed container from its child containers.
    fn refresh_state(&mut self, node: NodeId) -> Result<(), DmlError> {
        if self.container(node)?.load_state == LoadState::Unloaded {
            return Ok(());
        }
        let complete = self
            .child_containers(node)?
            .into_iter()
            .all(|c| self.container(c).is_ok_and(|c| c.load_state == LoadState::FullyLoaded));
        self.container_mut(node)?.load_state =
            if complete { LoadState::FullyLoaded } else { LoadState::PartiallyLoaded };
        Ok(())
    }

    fn promote_ancestors(&mut self, node: NodeId) {
        let mut cur = self.nodes.get(node.0).and_then(|n| n.parent);
        while let Some(p) = cur {
            if self.refresh_state(p).is_err() {
                break;
            }
            cur = self.nodes.get(p.0).and_then(|n| n.parent);
        }
    }
}
