//! framing/writer.rs
//! Push writer producing a DML stream.
//!
//! The writer tracks open containers so it can close attribute sections on
//! demand and refuse unbalanced ends. Names are written by identifier when
//! the translation binds them; otherwise inline when the options allow it.

use std::io::Write;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::WriterOptions;
use crate::constants::{dml_ids, DmlId, INLINE_IDENTIFICATION, INVALID_ID};
use crate::ec::{compress_fragment, encrypt_fragment, EcError, EcKind};
use crate::framing::types::FramingError;
use crate::primitives::{encode_value, PrimitiveSets, Value};
use crate::translation::{Name, ResolutionError, ScopeId, Translation};
use crate::types::DmlError;
use crate::varint::encode_u64_into;

#[derive(Debug, Clone, Copy)]
struct OpenContainer {
    scope: ScopeId,
    attributes_open: bool,
}

pub struct DmlWriter<W> {
    out: W,
    pos: u64,
    translation: Arc<Translation>,
    base: ScopeId,
    open: Vec<OpenContainer>,
    sets: PrimitiveSets,
    options: WriterOptions,
    scratch: Vec<u8>,
}

impl<W: Write> DmlWriter<W> {
    pub fn new(out: W, translation: Arc<Translation>, options: WriterOptions) -> Self {
        let base = translation.root();
        Self {
            out,
            pos: 0,
            translation,
            base,
            open: Vec::new(),
            sets: PrimitiveSets::new(),
            options,
            scratch: Vec::with_capacity(16),
        }
    }

    pub fn with_builtins(out: W, options: WriterOptions) -> Self {
        Self::new(out, Arc::new(crate::translation::builtin_translation(true)), options)
    }

    pub fn with_sets(mut self, sets: PrimitiveSets) -> Self {
        self.sets = sets;
        self
    }

    pub fn with_base_scope(mut self, scope: ScopeId) -> Self {
        self.base = scope;
        self
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn current_scope(&self) -> ScopeId {
        self.open.last().map(|c| c.scope).unwrap_or(self.base)
    }

    pub fn translation(&self) -> &Arc<Translation> {
        &self.translation
    }

    pub fn translation_mut(&mut self) -> &mut Translation {
        Arc::make_mut(&mut self.translation)
    }

    pub fn sets(&self) -> &PrimitiveSets {
        &self.sets
    }

    pub fn sets_mut(&mut self) -> &mut PrimitiveSets {
        &mut self.sets
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    // ------------------------------------------------------------------
    // Raw output
    // ------------------------------------------------------------------

    fn put(&mut self, bytes: &[u8]) -> Result<(), DmlError> {
        self.out.write_all(bytes)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }

    fn put_varint(&mut self, v: u64) -> Result<(), DmlError> {
        self.scratch.clear();
        encode_u64_into(v, &mut self.scratch);
        self.out.write_all(&self.scratch)?;
        self.pos += self.scratch.len() as u64;
        Ok(())
    }

    /// Length-prefixed bytes.
    fn put_payload(&mut self, bytes: &[u8]) -> Result<(), DmlError> {
        self.put_varint(bytes.len() as u64)?;
        self.put(bytes)
    }

    // ------------------------------------------------------------------
    // Heads
    // ------------------------------------------------------------------

    /// Emit a by-identifier head.
    pub fn write_start_node_id(&mut self, id: DmlId) -> Result<(), DmlError> {
        if id == INVALID_ID || id == INLINE_IDENTIFICATION {
            return Err(FramingError::InvalidIdentifier(id).into());
        }
        self.put_varint(u64::from(id))
    }

    /// Emit an inline head: sentinel, name string, type string.
    pub fn write_start_node_inline(&mut self, name: &str, type_str: &str) -> Result<(), DmlError> {
        if name.is_empty() {
            return Err(FramingError::EmptyInlineName.into());
        }
        self.put_varint(u64::from(INLINE_IDENTIFICATION))?;
        self.put_payload(name.as_bytes())?;
        self.put_payload(type_str.as_bytes())
    }

    /// Write the head for `name` in the current scope. Returns the local
    /// scope owned by the binding, if any.
    fn write_head(&mut self, name: &Name) -> Result<Option<ScopeId>, DmlError> {
        let scope = self.current_scope();
        let bound = self.translation.try_find_name(scope, name).map(|(_, a)| (a.id, a.local));
        match bound {
            Some((id, local)) => {
                self.write_start_node_id(id)?;
                Ok(local)
            }
            None if self.options.allow_inline => {
                let type_str = name.kind.type_str(&self.options.extensions);
                self.write_start_node_inline(&name.label, &type_str)?;
                Ok(None)
            }
            None => Err(ResolutionError::NotFound(format!("name {}", name)).into()),
        }
    }

    /// A new child node is about to start: close the parent's attribute
    /// section if it is still open.
    fn begin_child(&mut self) -> Result<(), DmlError> {
        if self.open.last().is_some_and(|c| c.attributes_open) {
            self.write_end_attributes()?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Containers
    // ------------------------------------------------------------------

    pub fn write_start_container(&mut self, name: &Name) -> Result<(), DmlError> {
        if !name.is_container() {
            return Err(FramingError::WrongNodeKind { name: name.to_string(), expected: "container" }.into());
        }
        self.begin_child()?;
        let local = self.write_head(name)?;
        let scope = local.unwrap_or_else(|| self.current_scope());
        self.open.push(OpenContainer { scope, attributes_open: true });
        trace!(name = %name, depth = self.open.len(), "start container");
        Ok(())
    }

    /// Start a container by its identifier in the current scope.
    pub fn write_container_by_id(&mut self, id: DmlId) -> Result<(), DmlError> {
        let (_, assoc) = self
            .translation
            .try_find_id(self.current_scope(), id)
            .ok_or(FramingError::UnknownIdentifier(id))?;
        if !assoc.name.is_container() {
            return Err(FramingError::WrongNodeKind { name: assoc.name.to_string(), expected: "container" }.into());
        }
        let scope = assoc.local.unwrap_or_else(|| self.current_scope());
        self.begin_child()?;
        self.write_start_node_id(id)?;
        self.open.push(OpenContainer { scope, attributes_open: true });
        Ok(())
    }

    pub fn write_end_attributes(&mut self) -> Result<(), DmlError> {
        let top = self.open.last_mut().ok_or(FramingError::AttributesClosed)?;
        if !top.attributes_open {
            return Err(FramingError::AttributesClosed.into());
        }
        top.attributes_open = false;
        self.put_varint(u64::from(dml_ids::END_ATTRIBUTES))
    }

    /// Close the innermost container, ending its attribute section first if
    /// nothing closed it.
    pub fn write_end_container(&mut self) -> Result<(), DmlError> {
        let top = *self.open.last().ok_or(FramingError::UnbalancedEnd)?;
        if top.attributes_open {
            self.write_end_attributes()?;
        }
        self.put_varint(u64::from(dml_ids::END_CONTAINER))?;
        self.open.pop();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Leaves
    // ------------------------------------------------------------------

    fn write_primitive_body(&mut self, name: &Name, value: &Value) -> Result<(), DmlError> {
        let kind = name
            .kind
            .primitive()
            .ok_or_else(|| FramingError::WrongNodeKind { name: name.to_string(), expected: "primitive" })?;
        let payload = encode_value(&kind, value, &self.sets, &self.options.extensions)?;
        self.write_head(name)?;
        self.put_payload(&payload)
    }

    /// Write a primitive into the open attribute section of the innermost
    /// container.
    pub fn write_attribute(&mut self, name: &Name, value: &Value) -> Result<(), DmlError> {
        if !self.open.last().is_some_and(|c| c.attributes_open) {
            return Err(FramingError::AttributesClosed.into());
        }
        self.write_primitive_body(name, value)
    }

    /// Write a primitive as a child node.
    pub fn write_primitive(&mut self, name: &Name, value: &Value) -> Result<(), DmlError> {
        self.begin_child()?;
        self.write_primitive_body(name, value)
    }

    pub fn write_attribute_by_id(&mut self, id: DmlId, value: &Value) -> Result<(), DmlError> {
        let name = self.translation.find_id(self.current_scope(), id)?.name.clone();
        self.write_attribute(&name, value)
    }

    pub fn write_primitive_by_id(&mut self, id: DmlId, value: &Value) -> Result<(), DmlError> {
        let name = self.translation.find_id(self.current_scope(), id)?.name.clone();
        self.write_primitive(&name, value)
    }

    pub fn write_comment(&mut self, text: &str) -> Result<(), DmlError> {
        self.begin_child()?;
        self.put_varint(u64::from(dml_ids::COMMENT))?;
        self.put_payload(text.as_bytes())
    }

    pub fn write_padding(&mut self, len: usize) -> Result<(), DmlError> {
        self.begin_child()?;
        self.put_varint(u64::from(dml_ids::PADDING))?;
        self.put_payload(&vec![0u8; len])
    }

    // ------------------------------------------------------------------
    // EC nodes
    // ------------------------------------------------------------------

    /// Writer for the content of an EC node: same translation, sets and
    /// options, resolving from the current scope.
    pub fn nested(&self) -> DmlWriter<Vec<u8>> {
        DmlWriter::new(Vec::new(), Arc::clone(&self.translation), self.options.clone())
            .with_sets(self.sets.clone())
            .with_base_scope(self.current_scope())
    }

    /// Emit an EC head followed by the transformed `plain` fragment bytes.
    pub fn write_encoded_bytes(&mut self, kind: EcKind, plain: &[u8]) -> Result<(), DmlError> {
        if self.translation.try_find_id(self.current_scope(), kind.id()).is_none() {
            return Err(ResolutionError::NotFound(format!("EC node {} (include urn:dml:dml-ec2)", kind)).into());
        }
        let wire = if kind.is_compressed() {
            compress_fragment(plain, kind, self.options.compression_level)?
        } else {
            let keys = self.options.keys.as_ref().ok_or(EcError::MissingKeys)?;
            encrypt_fragment(plain, keys, kind)?
        };
        self.begin_child()?;
        self.write_start_node_id(kind.id())?;
        self.put(&wire)?;
        debug!(kind = %kind, plain = plain.len(), wire = wire.len(), "EC node written");
        Ok(())
    }

    /// Write an EC node whose content is produced by `body` on a nested writer.
    pub fn write_encoded<F>(&mut self, kind: EcKind, body: F) -> Result<(), DmlError>
    where
        F: FnOnce(&mut DmlWriter<Vec<u8>>) -> Result<(), DmlError>,
    {
        let mut inner = self.nested();
        body(&mut inner)?;
        let plain = inner.finish()?;
        self.write_encoded_bytes(kind, &plain)
    }

    pub fn write_compressed<F>(&mut self, with_crc: bool, body: F) -> Result<(), DmlError>
    where
        F: FnOnce(&mut DmlWriter<Vec<u8>>) -> Result<(), DmlError>,
    {
        let kind = if with_crc { EcKind::CompressedCrc } else { EcKind::Compressed };
        self.write_encoded(kind, body)
    }

    pub fn write_encrypted<F>(&mut self, authenticated: bool, body: F) -> Result<(), DmlError>
    where
        F: FnOnce(&mut DmlWriter<Vec<u8>>) -> Result<(), DmlError>,
    {
        let kind = if authenticated { EcKind::EncryptedAuth } else { EcKind::Encrypted };
        self.write_encoded(kind, body)
    }

    /// Flush and hand back the sink. Every container must be closed.
    pub fn finish(mut self) -> Result<W, DmlError> {
        if !self.open.is_empty() {
            return Err(FramingError::UnclosedContainers(self.open.len()).into());
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

