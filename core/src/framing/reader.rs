//! framing/reader.rs
//! Pull reader over a seekable DML stream.
//!
//! Notes:
//! - Every head is resolved against the scope of the innermost open
//!   container; a container whose association owns a local scope switches
//!   resolution to that scope for its attributes and children.
//! - Errors leave `read_node` wrapped with the head offset and node label.
//! - EC nodes surface as `NodeEvent::Encoded`; the caller either decodes
//!   them (`read_encoded`) or steps over them (`skip_encoded`).

use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::sync::Arc;

use tracing::{trace, warn};

use crate::config::ReaderOptions;
use crate::constants::{DmlId, INLINE_IDENTIFICATION, INVALID_ID};
use crate::ec::{self, decode_frame, ChecksumStatus, EcContent, EcError, EcFrame, EcKind};
use crate::framing::types::{Attribute, FramingError, NodeEvent, NodeHead};
use crate::primitives::{decode_value, PrimitiveError, PrimitiveSets, Value};
use crate::telemetry::ReadCounters;
use crate::translation::{structural_marker, Marker, Name, NodeKind, ScopeId, Translation};
use crate::types::DmlError;
use crate::utils::fmt_bytes;
use crate::varint::{read_u64, read_u64_opt};

/// A resolved head: identifier (when framed by id), Name, and the local
/// scope owned by the association, if any.
#[derive(Debug, Clone)]
struct Head {
    id: Option<DmlId>,
    name: Name,
    local: Option<ScopeId>,
}

pub struct DmlReader<R> {
    inner: BufReader<R>,
    pos: u64,
    end: u64,
    translation: Arc<Translation>,
    base: ScopeId,
    /// Resolution scope of each open container, innermost last.
    scopes: Vec<ScopeId>,
    sets: PrimitiveSets,
    options: ReaderOptions,
    counters: ReadCounters,
    node_start: u64,
    current: Option<String>,
    /// Number of EC layers this reader sits under.
    ec_depth: usize,
}

impl<R: Read + Seek> DmlReader<R> {
    pub fn new(mut inner: R, translation: Arc<Translation>, options: ReaderOptions) -> Result<Self, DmlError> {
        let pos = inner.stream_position()?;
        let end = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(pos))?;
        let base = translation.root();
        Ok(Self {
            inner: BufReader::new(inner),
            pos,
            end,
            translation,
            base,
            scopes: Vec::new(),
            sets: PrimitiveSets::new(),
            options,
            counters: ReadCounters::default(),
            node_start: pos,
            current: None,
            ec_depth: 0,
        })
    }

    /// Reader over the built-in vocabulary (base and EC) only.
    pub fn with_builtins(inner: R, options: ReaderOptions) -> Result<Self, DmlError> {
        Self::new(inner, Arc::new(crate::translation::builtin_translation(true)), options)
    }

    pub fn with_sets(mut self, sets: PrimitiveSets) -> Self {
        self.sets = sets;
        self
    }

    pub fn with_base_scope(mut self, scope: ScopeId) -> Self {
        self.base = scope;
        self
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn stream_len(&self) -> u64 {
        self.end
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.end
    }

    /// Number of containers opened and not yet closed.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn current_scope(&self) -> ScopeId {
        self.scopes.last().copied().unwrap_or(self.base)
    }

    pub fn translation(&self) -> &Arc<Translation> {
        &self.translation
    }

    /// Mutable access for header processing; clones the arena if it is shared.
    pub fn translation_mut(&mut self) -> &mut Translation {
        Arc::make_mut(&mut self.translation)
    }

    pub fn set_translation(&mut self, translation: Arc<Translation>, base: ScopeId) {
        self.translation = translation;
        self.base = base;
    }

    pub fn sets(&self) -> &PrimitiveSets {
        &self.sets
    }

    pub fn sets_mut(&mut self) -> &mut PrimitiveSets {
        &mut self.sets
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    pub fn counters(&self) -> &ReadCounters {
        &self.counters
    }

    pub fn counters_mut(&mut self) -> &mut ReadCounters {
        &mut self.counters
    }

    pub fn take_counters(&mut self) -> ReadCounters {
        std::mem::take(&mut self.counters)
    }

    pub fn seek_to(&mut self, offset: u64) -> Result<(), DmlError> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.pos = offset;
        Ok(())
    }

    /// Resume inside a container: seek to `offset` (the start of its
    /// children) with `scope` as the container's resolution scope. Reading
    /// then runs until that container's `ContainerEnd`.
    pub fn reposition(&mut self, offset: u64, scope: ScopeId) -> Result<(), DmlError> {
        self.seek_to(offset)?;
        self.scopes.clear();
        self.scopes.push(scope);
        Ok(())
    }

    /// Resume at `offset` with `scopes` as the stack of open containers,
    /// outermost first.
    pub(crate) fn resume_at(&mut self, offset: u64, scopes: &[ScopeId]) -> Result<(), DmlError> {
        self.seek_to(offset)?;
        self.scopes.clear();
        self.scopes.extend_from_slice(scopes);
        Ok(())
    }

    /// Reset to top level at `offset`.
    pub fn rewind_to(&mut self, offset: u64) -> Result<(), DmlError> {
        self.seek_to(offset)?;
        self.scopes.clear();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Low-level reads
    // ------------------------------------------------------------------

    fn read_varint(&mut self) -> Result<u64, DmlError> {
        let (v, n) = read_u64(&mut self.inner)?;
        self.pos += n as u64;
        Ok(v)
    }

    /// Read a payload length prefix and check it against the limit and the
    /// bytes left in the stream.
    fn read_len(&mut self) -> Result<u64, DmlError> {
        let len = self.read_varint()?;
        if len > self.options.max_payload_len {
            return Err(FramingError::PayloadTooLarge { len, max: self.options.max_payload_len }.into());
        }
        let available = self.end.saturating_sub(self.pos);
        if len > available {
            return Err(FramingError::PayloadPastEnd { len, available }.into());
        }
        Ok(len)
    }

    fn read_payload(&mut self) -> Result<Vec<u8>, DmlError> {
        let len = self.read_len()? as usize;
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf)?;
        self.pos += len as u64;
        Ok(buf)
    }

    fn skip_payload(&mut self) -> Result<u64, DmlError> {
        let len = self.read_len()?;
        self.inner.seek_relative(len as i64)?;
        self.pos += len;
        Ok(len)
    }

    fn read_str(&mut self) -> Result<String, DmlError> {
        let bytes = self.read_payload()?;
        String::from_utf8(bytes).map_err(|_| PrimitiveError::InvalidUtf8.into())
    }

    /// Read one raw head. `Ok(None)` on a clean end of stream.
    pub fn read_head(&mut self) -> Result<Option<NodeHead>, DmlError> {
        let Some((raw, n)) = read_u64_opt(&mut self.inner)? else {
            return Ok(None);
        };
        self.pos += n as u64;
        let id = DmlId::try_from(raw).map_err(|_| FramingError::IdentifierOutOfRange(raw))?;
        if id == INVALID_ID {
            return Err(FramingError::InvalidIdentifier(id).into());
        }
        if id != INLINE_IDENTIFICATION {
            return Ok(Some(NodeHead::Id(id)));
        }
        let name = self.read_str()?;
        if name.is_empty() {
            return Err(FramingError::EmptyInlineName.into());
        }
        let type_str = self.read_str()?;
        Ok(Some(NodeHead::Inline { name, type_str }))
    }

    fn resolve(&self, head: NodeHead) -> Result<Head, DmlError> {
        let scope = self.current_scope();
        match head {
            NodeHead::Id(id) => {
                let (_, assoc) = self
                    .translation
                    .try_find_id(scope, id)
                    .ok_or(FramingError::UnknownIdentifier(id))?;
                Ok(Head { id: Some(id), name: assoc.name.clone(), local: assoc.local })
            }
            NodeHead::Inline { name, type_str } => {
                let kind = NodeKind::parse(&type_str, &self.options.extensions)?;
                let name = Name::new(name, kind);
                let local = self.translation.try_find_name(scope, &name).and_then(|(_, a)| a.local);
                Ok(Head { id: None, name, local })
            }
        }
    }

    /// Read and resolve the next head, recording its offset for error context.
    fn next_head(&mut self) -> Result<Option<Head>, DmlError> {
        self.node_start = self.pos;
        self.current = None;
        let Some(raw) = self.read_head()? else {
            if !self.scopes.is_empty() {
                return Err(FramingError::UnexpectedEndOfStream { open: self.scopes.len() }.into());
            }
            return Ok(None);
        };
        let head = self.resolve(raw)?;
        self.current = Some(head.name.label.clone());
        Ok(Some(head))
    }

    fn open_container(&mut self, head: &Head) {
        let scope = head.local.unwrap_or_else(|| self.current_scope());
        self.scopes.push(scope);
        self.counters.containers += 1;
    }

    fn close_container(&mut self) -> Result<(), DmlError> {
        self.scopes.pop().map(|_| ()).ok_or_else(|| FramingError::UnbalancedEnd.into())
    }

    fn with_context<T>(&self, r: Result<T, DmlError>) -> Result<T, DmlError> {
        r.map_err(|e| e.at(self.node_start, self.current.clone()))
    }

    // ------------------------------------------------------------------
    // Node reads
    // ------------------------------------------------------------------

    /// Read the next node. Discardable kinds are filtered per the options.
    pub fn read_node(&mut self) -> Result<NodeEvent, DmlError> {
        let r = self.read_node_inner();
        self.with_context(r)
    }

    fn read_node_inner(&mut self) -> Result<NodeEvent, DmlError> {
        loop {
            let Some(head) = self.next_head()? else {
                return Ok(NodeEvent::EndOfStream);
            };
            match head.name.kind {
                NodeKind::Container => {
                    self.open_container(&head);
                    trace!(offset = self.node_start, name = %head.name, "container");
                    return Ok(NodeEvent::ContainerStart { id: head.id, name: head.name, offset: self.node_start });
                }
                NodeKind::Structural => {
                    return match structural_marker(&head.name) {
                        Some(Marker::EndAttributes) => {
                            if self.scopes.is_empty() {
                                return Err(FramingError::UnexpectedNode {
                                    found: head.name.label,
                                    context: "top level",
                                }
                                .into());
                            }
                            Ok(NodeEvent::EndAttributes)
                        }
                        Some(Marker::EndContainer) => {
                            self.close_container()?;
                            Ok(NodeEvent::ContainerEnd)
                        }
                        Some(Marker::Encoded(kind)) => Ok(NodeEvent::Encoded { kind, offset: self.pos }),
                        None => Err(FramingError::UnknownNodeKind(head.name.to_string()).into()),
                    };
                }
                NodeKind::Comment => {
                    let text = self.read_str()?;
                    self.counters.comments += 1;
                    if !self.options.discard_comments {
                        return Ok(NodeEvent::Comment(text));
                    }
                }
                NodeKind::Padding => {
                    let len = self.skip_payload()?;
                    self.counters.padding += 1;
                    if !self.options.discard_padding {
                        return Ok(NodeEvent::Padding(len));
                    }
                }
                NodeKind::Primitive(kind) => {
                    let payload = self.read_payload()?;
                    trace!(offset = self.node_start, name = %head.name, payload = %fmt_bytes(&payload), "primitive");
                    let value = decode_value(&kind, &payload, &self.sets, &self.options.extensions)?;
                    self.counters.add_primitive(payload.len());
                    return Ok(NodeEvent::Primitive { id: head.id, name: head.name, value });
                }
            }
        }
    }

    /// Read the next node, which must be a primitive.
    pub fn read_value(&mut self) -> Result<(Name, Value), DmlError> {
        match self.read_node()? {
            NodeEvent::Primitive { name, value, .. } => Ok((name, value)),
            other => Err(FramingError::UnexpectedNode { found: other.describe(), context: "value read" }.into()),
        }
    }

    /// Pass over the next node without decoding it. Containers are skipped
    /// whole and EC nodes are framed but not decoded. Returns the skipped
    /// node's Name, or `None` at end of stream.
    pub fn skip_value(&mut self) -> Result<Option<Name>, DmlError> {
        let r = self.skip_value_inner();
        self.with_context(r)
    }

    fn skip_value_inner(&mut self) -> Result<Option<Name>, DmlError> {
        let Some(head) = self.next_head()? else {
            return Ok(None);
        };
        match head.name.kind {
            NodeKind::Container => {
                self.open_container(&head);
                self.skip_container_body()?;
                self.counters.skipped_containers += 1;
            }
            NodeKind::Structural => match structural_marker(&head.name) {
                Some(Marker::Encoded(kind)) => {
                    self.skip_encoded(kind)?;
                }
                Some(_) => {
                    return Err(FramingError::UnexpectedNode { found: head.name.label, context: "skip" }.into())
                }
                None => return Err(FramingError::UnknownNodeKind(head.name.to_string()).into()),
            },
            NodeKind::Comment | NodeKind::Padding | NodeKind::Primitive(_) => {
                self.skip_payload()?;
            }
        }
        Ok(Some(head.name))
    }

    /// Skip forward to the `EndContainer` of the innermost open container,
    /// consuming it. Nested containers are tracked by resolving their heads.
    pub fn skip_container_body(&mut self) -> Result<(), DmlError> {
        let target = self
            .depth()
            .checked_sub(1)
            .ok_or(FramingError::UnbalancedEnd)?;
        while self.depth() > target {
            let Some(head) = self.next_head()? else {
                return Err(FramingError::UnexpectedEndOfStream { open: self.depth() }.into());
            };
            match head.name.kind {
                NodeKind::Container => self.open_container(&head),
                NodeKind::Structural => match structural_marker(&head.name) {
                    Some(Marker::EndContainer) => self.close_container()?,
                    Some(Marker::EndAttributes) => {}
                    Some(Marker::Encoded(kind)) => {
                        self.skip_encoded(kind)?;
                    }
                    None => return Err(FramingError::UnknownNodeKind(head.name.to_string()).into()),
                },
                NodeKind::Comment | NodeKind::Padding | NodeKind::Primitive(_) => {
                    self.skip_payload()?;
                }
            }
        }
        Ok(())
    }

    /// Read the attribute section of the container just opened, up to and
    /// including its `EndAttributes` marker.
    pub fn read_attributes(&mut self) -> Result<Vec<Attribute>, DmlError> {
        let mut attrs = Vec::new();
        loop {
            match self.read_node()? {
                NodeEvent::Primitive { id, name, value } => attrs.push(Attribute { id, name, value }),
                NodeEvent::EndAttributes => return Ok(attrs),
                NodeEvent::Comment(_) | NodeEvent::Padding(_) => {}
                other => {
                    let e = FramingError::UnexpectedNode { found: other.describe(), context: "attribute section" };
                    return Err(DmlError::from(e).at(self.node_start, self.current.clone()));
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // EC nodes
    // ------------------------------------------------------------------

    /// Consume the transform stream of the EC node whose head was just
    /// returned as `Encoded`, without decoding it.
    pub fn read_encoded_frame(&mut self, kind: EcKind) -> Result<EcFrame, DmlError> {
        let r = ec::read_frame(&mut self.inner, kind, self.options.max_payload_len).map_err(DmlError::from);
        let (frame, consumed) = self.with_context(r)?;
        self.pos += consumed;
        Ok(frame)
    }

    /// Authenticate / decrypt / check a frame read by `read_encoded_frame`.
    ///
    /// A checksum mismatch is counted and logged; it only fails the read when
    /// `strict_checksums` is set.
    pub fn decode_encoded(&mut self, frame: EcFrame) -> Result<EcContent, DmlError> {
        let kind = frame.kind();
        let content = decode_frame(frame, self.options.keys.as_ref(), self.options.verify_checksums)?;
        if let ChecksumStatus::Mismatch { expected, actual } = content.checksum {
            self.counters.checksum_mismatches += 1;
            if self.options.strict_checksums {
                return Err(EcError::ChecksumMismatch { expected, actual }.into());
            }
            warn!(offset = self.node_start, expected, actual, "EC checksum mismatch; content kept");
        }
        self.counters.add_ec(kind.is_compressed(), content.bytes.len());
        trace!(kind = %kind, len = content.bytes.len(), "EC node decoded");
        Ok(content)
    }

    /// Frame and decode the EC node whose head was just returned as `Encoded`.
    pub fn read_encoded(&mut self, kind: EcKind) -> Result<EcContent, DmlError> {
        let frame = self.read_encoded_frame(kind)?;
        let r = self.decode_encoded(frame);
        self.with_context(r)
    }

    /// Step over the EC node whose head was just read. Needs no keys.
    pub fn skip_encoded(&mut self, kind: EcKind) -> Result<u64, DmlError> {
        let consumed = ec::skip_frame(&mut self.inner, kind, self.options.max_payload_len)?;
        self.pos += consumed;
        Ok(consumed)
    }

    /// Reader over decoded EC content, sharing this reader's translation,
    /// primitive sets and options. Resolution starts in the current scope.
    /// Fails with `NestingTooDeep` past `ReaderOptions::max_ec_nesting`.
    pub fn nested(&self, bytes: Vec<u8>) -> Result<DmlReader<Cursor<Vec<u8>>>, DmlError> {
        let max = self.options.max_ec_nesting;
        if self.ec_depth >= max {
            return Err(FramingError::NestingTooDeep { max }.into());
        }
        let mut nested = DmlReader::new(Cursor::new(bytes), Arc::clone(&self.translation), self.options.clone())?
            .with_sets(self.sets.clone())
            .with_base_scope(self.current_scope());
        nested.ec_depth = self.ec_depth + 1;
        Ok(nested)
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}
