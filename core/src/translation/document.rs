//! translation/document.rs
//! Translation documents: DML streams that define a vocabulary.
//!
//! Shape:
//! ```text
//! [DML:Header ...]
//! DML:Translation
//!   DML:Container {ID, Name}          nested definitions form its local scope
//!   DML:Node      {ID, Name, Type}
//!   DML:Renumber  {ID, NewID}
//!   DML:Include-Translation {URI, URN?}
//!   DML:Include-Primitives  {Set, Codec, ...}
//!   DML:XMLRoot   {root attributes}
//! ```
//! Definitions land in a fresh arena whose root holds no built-ins; user
//! identifiers inside the reserved block are refused.

use std::io::{Cursor, Read, Seek};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::WriterOptions;
use crate::constants::{dml_ids, is_reserved, DmlId, INLINE_IDENTIFICATION, INVALID_ID};
use crate::fragment::union_attributes;
use crate::framing::{Attribute, DmlReader, DmlWriter, NodeEvent};
use crate::headers::decode::{fields, opt_str, parse_include_primitives, parse_include_translation, read_directive, req_str, req_uint};
use crate::headers::{read_header_opt, write_header, DocumentHeader, IncludeTranslation};
use crate::primitives::{ExtensionRegistry, PrimitiveSetDecl, Value};
use crate::translation::builtin::{builtin_for_urn, builtin_translation, labels};
use crate::translation::resolver::{declare_all, IncludeContext};
use crate::translation::scope::Translation;
use crate::translation::types::{Association, Name, NodeKind, ResolutionError, ScopeId};
use crate::types::DmlError;

pub mod directives {
    pub const CONTAINER: &str = "DML:Container";
    pub const NODE: &str = "DML:Node";
    pub const RENUMBER: &str = "DML:Renumber";
    pub const XML_ROOT: &str = "DML:XMLRoot";
    pub const ID: &str = "DML:ID";
    pub const NAME: &str = "DML:Name";
    pub const TYPE: &str = "DML:Type";
    pub const NEW_ID: &str = "DML:NewID";
}

/// A parsed (or pre-resolved) translation ready to be imported.
#[derive(Debug, Clone)]
pub struct ResolvedTranslation {
    pub translation: Translation,
    /// Scope holding the top-level definitions.
    pub scope: ScopeId,
    pub primitive_sets: Vec<PrimitiveSetDecl>,
    pub xml_root: Vec<Attribute>,
}

impl ResolvedTranslation {
    pub fn from_translation(translation: Translation) -> Self {
        let scope = translation.root();
        Self { translation, scope, primitive_sets: Vec::new(), xml_root: Vec::new() }
    }

    pub fn with_primitive_sets(mut self, sets: Vec<PrimitiveSetDecl>) -> Self {
        self.primitive_sets = sets;
        self
    }

    /// Top-level bindings.
    pub fn len(&self) -> usize {
        self.translation.len(self.scope)
    }

    pub fn is_empty(&self) -> bool {
        self.translation.is_empty(self.scope)
    }

    pub fn to_bytes(&self, extensions: &Arc<ExtensionRegistry>) -> Result<Vec<u8>, DmlError> {
        write_translation_document(&self.translation, self.scope, &self.primitive_sets, &self.xml_root, extensions)
    }
}

fn user_id(raw: u64) -> Result<DmlId, ResolutionError> {
    let id = DmlId::try_from(raw)
        .map_err(|_| ResolutionError::InvalidTranslationDocument(format!("identifier {} out of range", raw)))?;
    if id == INVALID_ID || id == INLINE_IDENTIFICATION {
        return Err(ResolutionError::InvalidIdentifier(id));
    }
    if is_reserved(id) {
        return Err(ResolutionError::ReservedIdentifier(id));
    }
    Ok(id)
}

fn push_decl(sets: &mut Vec<PrimitiveSetDecl>, decl: PrimitiveSetDecl) {
    if !sets.contains(&decl) {
        sets.push(decl);
    }
}

struct Parser<'c, 'a, R> {
    reader: DmlReader<R>,
    ctx: &'c mut IncludeContext<'a>,
    out: ResolvedTranslation,
}

impl<'c, 'a, R: Read + Seek> Parser<'c, 'a, R> {
    fn include(&mut self, scope: ScopeId, inc: &IncludeTranslation) -> Result<(), DmlError> {
        if builtin_for_urn(inc.key()).is_some() {
            return Ok(());
        }
        let resolved = self.ctx.include(inc)?;
        self.out.translation.import(scope, &resolved.translation, resolved.scope)?;
        for decl in &resolved.primitive_sets {
            self.declare(decl.clone())?;
        }
        union_attributes(&mut self.out.xml_root, &resolved.xml_root)?;
        Ok(())
    }

    /// Record a primitive-set declaration and make it effective for the
    /// rest of this document.
    fn declare(&mut self, decl: PrimitiveSetDecl) -> Result<(), DmlError> {
        self.reader.sets_mut().declare(&decl)?;
        push_decl(&mut self.out.primitive_sets, decl);
        Ok(())
    }

    /// Definitions up to and including the `ContainerEnd` of the enclosing
    /// directive.
    fn definitions(&mut self, scope: ScopeId) -> Result<(), DmlError> {
        loop {
            let name = match self.reader.read_node()? {
                NodeEvent::ContainerEnd => return Ok(()),
                NodeEvent::Comment(_) | NodeEvent::Padding(_) => continue,
                NodeEvent::ContainerStart { name, .. } => name,
                other => {
                    return Err(ResolutionError::InvalidTranslationDocument(format!("unexpected {}", other.describe()))
                        .into())
                }
            };
            match name.label.as_str() {
                directives::CONTAINER => {
                    let attrs = self.reader.read_attributes()?;
                    let id = user_id(req_uint(&attrs, directives::ID)?)?;
                    let label = req_str(&attrs, directives::NAME)?;
                    trace!(id, label = %label, "container definition");
                    self.out.translation.add(scope, Association::new(id, Name::container(label)))?;
                    let local = self.out.translation.create_local_scope(scope, id)?;
                    self.definitions(local)?;
                }
                directives::NODE => {
                    let attrs = read_directive(&mut self.reader)?;
                    let id = user_id(req_uint(&attrs, directives::ID)?)?;
                    let label = req_str(&attrs, directives::NAME)?;
                    let type_str = opt_str(&attrs, directives::TYPE)?.unwrap_or_else(|| "container".to_owned());
                    let kind = NodeKind::parse(&type_str, &self.ctx.options().extensions)?;
                    trace!(id, label = %label, kind = %kind, "node definition");
                    self.out.translation.add(scope, Association::new(id, Name::new(label, kind)))?;
                }
                directives::RENUMBER => {
                    let attrs = read_directive(&mut self.reader)?;
                    let old = user_id(req_uint(&attrs, directives::ID)?)?;
                    let new = user_id(req_uint(&attrs, directives::NEW_ID)?)?;
                    self.out.translation.renumber(scope, old, new)?;
                }
                directives::XML_ROOT => {
                    let attrs = read_directive(&mut self.reader)?;
                    union_attributes(&mut self.out.xml_root, &attrs)?;
                }
                fields::INCLUDE_TRANSLATION => {
                    let attrs = read_directive(&mut self.reader)?;
                    let inc = parse_include_translation(&attrs)?;
                    self.include(scope, &inc)?;
                }
                fields::INCLUDE_PRIMITIVES => {
                    let attrs = read_directive(&mut self.reader)?;
                    self.declare(parse_include_primitives(&attrs)?)?;
                }
                other => {
                    return Err(ResolutionError::InvalidTranslationDocument(format!("unknown directive {}", other)).into())
                }
            }
        }
    }

    fn run(mut self) -> Result<ResolvedTranslation, DmlError> {
        if let Some(header) = read_header_opt(&mut self.reader)? {
            let root = self.out.scope;
            for inc in &header.includes {
                self.include(root, inc)?;
            }
            for decl in header.primitive_sets {
                self.declare(decl)?;
            }
        }

        loop {
            match self.reader.read_node()? {
                NodeEvent::ContainerStart { name, .. } if name.label == labels::TRANSLATION => break,
                NodeEvent::Comment(_) | NodeEvent::Padding(_) => continue,
                other => {
                    return Err(ResolutionError::InvalidTranslationDocument(format!(
                        "expected {}, found {}",
                        labels::TRANSLATION,
                        other.describe()
                    ))
                    .into())
                }
            }
        }
        self.reader.read_attributes()?;
        let root = self.out.scope;
        self.definitions(root)?;

        loop {
            match self.reader.read_node()? {
                NodeEvent::EndOfStream => break,
                NodeEvent::Comment(_) | NodeEvent::Padding(_) => continue,
                other => {
                    return Err(ResolutionError::InvalidTranslationDocument(format!(
                        "trailing {} after translation",
                        other.describe()
                    ))
                    .into())
                }
            }
        }
        debug!(bindings = self.out.len(), sets = self.out.primitive_sets.len(), "translation document parsed");
        Ok(self.out)
    }
}

/// Parse a DML-encoded translation document. Nested includes go through
/// `ctx`, which carries the cycle and depth state.
pub fn parse_translation_document(bytes: Vec<u8>, ctx: &mut IncludeContext<'_>) -> Result<ResolvedTranslation, DmlError> {
    let reader = DmlReader::new(Cursor::new(bytes), Arc::new(builtin_translation(false)), ctx.options().clone())?;
    let parser = Parser { reader, ctx, out: ResolvedTranslation::from_translation(Translation::new()) };
    parser.run()
}

fn write_scope<W: std::io::Write>(
    w: &mut DmlWriter<W>,
    translation: &Translation,
    scope: ScopeId,
    extensions: &ExtensionRegistry,
) -> Result<(), DmlError> {
    for assoc in translation.associations(scope) {
        if is_reserved(assoc.id) {
            continue;
        }
        if assoc.name.is_container() {
            w.write_container_by_id(dml_ids::CONTAINER)?;
            w.write_attribute_by_id(dml_ids::ID, &Value::UInt(u64::from(assoc.id)))?;
            w.write_attribute_by_id(dml_ids::NAME, &Value::from(assoc.name.label.as_str()))?;
            if let Some(local) = assoc.local {
                write_scope(w, translation, local, extensions)?;
            }
        } else {
            w.write_container_by_id(dml_ids::NODE)?;
            w.write_attribute_by_id(dml_ids::ID, &Value::UInt(u64::from(assoc.id)))?;
            w.write_attribute_by_id(dml_ids::NAME, &Value::from(assoc.name.label.as_str()))?;
            w.write_attribute_by_id(dml_ids::TYPE, &Value::from(assoc.name.kind.type_str(extensions)))?;
        }
        w.write_end_container()?;
    }
    Ok(())
}

/// Serialize the bindings of `scope` (and its local scopes) as a translation
/// document. Identifiers in the reserved block are left out.
pub fn write_translation_document(
    translation: &Translation,
    scope: ScopeId,
    primitive_sets: &[PrimitiveSetDecl],
    xml_root: &[Attribute],
    extensions: &Arc<ExtensionRegistry>,
) -> Result<Vec<u8>, DmlError> {
    let options = WriterOptions { allow_inline: true, extensions: Arc::clone(extensions), ..WriterOptions::default() };
    let mut w = DmlWriter::new(Vec::new(), Arc::new(builtin_translation(false)), options);
    declare_all(w.sets_mut(), primitive_sets)?;

    let header = DocumentHeader { primitive_sets: primitive_sets.to_vec(), ..DocumentHeader::default() };
    write_header(&mut w, &header)?;

    w.write_container_by_id(dml_ids::TRANSLATION)?;
    w.write_end_attributes()?;
    if !xml_root.is_empty() {
        w.write_container_by_id(dml_ids::XML_ROOT)?;
        for attr in xml_root {
            w.write_attribute(&attr.name, &attr.value)?;
        }
        w.write_end_container()?;
    }
    write_scope(&mut w, translation, scope, extensions)?;
    w.write_end_container()?;
    w.finish()
}
