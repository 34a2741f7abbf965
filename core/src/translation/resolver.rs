//! translation/resolver.rs
//! The resolution boundary and include processing.
//!
//! The core never fetches anything itself: a `Resolver` turns an include
//! URI into either raw document bytes or an already-resolved translation.
//! `IncludeContext` drives nested includes with cycle and depth checks and
//! caches every result by key for the duration of one open.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::ReaderOptions;
use crate::constants::DEFAULT_MAX_INCLUDE_DEPTH;
use crate::fragment::union_attributes;
use crate::framing::Attribute;
use crate::headers::{DocumentHeader, IncludeTranslation};
use crate::primitives::{PrimitiveSetDecl, PrimitiveSets};
use crate::translation::builtin::builtin_for_urn;
use crate::translation::document::{parse_translation_document, ResolvedTranslation};
use crate::translation::scope::Translation;
use crate::translation::types::{ResolutionError, ScopeId};
use crate::types::DmlError;

/// What a resolver hands back for one include.
#[derive(Debug, Clone)]
pub enum Resolved {
    /// Document bytes still to be parsed. XML documents are flagged so the
    /// core can refuse them with a typed error.
    Stream { bytes: Vec<u8>, is_xml: bool },
    /// A cached or otherwise pre-resolved translation.
    Translation(Arc<ResolvedTranslation>),
}

pub trait Resolver {
    fn resolve(&self, uri: &str, urn: Option<&str>) -> Result<Resolved, ResolutionError>;
}

/// Resolver that knows nothing; only built-in URNs can be included.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResolver;

impl Resolver for NullResolver {
    fn resolve(&self, uri: &str, _urn: Option<&str>) -> Result<Resolved, ResolutionError> {
        Err(ResolutionError::UnresolvedInclude(uri.to_owned()))
    }
}

/// In-memory table of documents, keyed by URN or URI.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    entries: HashMap<String, Resolved>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_stream(&mut self, key: impl Into<String>, bytes: Vec<u8>) -> &mut Self {
        self.entries.insert(key.into(), Resolved::Stream { bytes, is_xml: false });
        self
    }

    pub fn insert_xml(&mut self, key: impl Into<String>, bytes: Vec<u8>) -> &mut Self {
        self.entries.insert(key.into(), Resolved::Stream { bytes, is_xml: true });
        self
    }

    pub fn insert_translation(&mut self, key: impl Into<String>, resolved: ResolvedTranslation) -> &mut Self {
        self.entries.insert(key.into(), Resolved::Translation(Arc::new(resolved)));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Resolver for MemoryResolver {
    fn resolve(&self, uri: &str, urn: Option<&str>) -> Result<Resolved, ResolutionError> {
        urn.and_then(|u| self.entries.get(u))
            .or_else(|| self.entries.get(uri))
            .cloned()
            .ok_or_else(|| ResolutionError::UnresolvedInclude(uri.to_owned()))
    }
}

/// State of one include walk.
pub struct IncludeContext<'a> {
    resolver: &'a dyn Resolver,
    options: ReaderOptions,
    max_depth: usize,
    stack: Vec<String>,
    cache: HashMap<String, Arc<ResolvedTranslation>>,
}

impl<'a> IncludeContext<'a> {
    pub fn new(resolver: &'a dyn Resolver, options: &ReaderOptions) -> Self {
        let max_depth = if options.max_include_depth == 0 { DEFAULT_MAX_INCLUDE_DEPTH } else { options.max_include_depth };
        Self { resolver, options: options.clone(), max_depth, stack: Vec::new(), cache: HashMap::new() }
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Current include nesting.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Resolve one include directive. Built-in URNs never reach the resolver.
    pub fn include(&mut self, inc: &IncludeTranslation) -> Result<Arc<ResolvedTranslation>, DmlError> {
        let key = inc.key().to_owned();
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Arc::clone(hit));
        }
        if let Some(builtin) = builtin_for_urn(&key).or_else(|| builtin_for_urn(&inc.uri)) {
            let resolved = Arc::new(ResolvedTranslation::from_translation(builtin.clone()));
            self.cache.insert(key, Arc::clone(&resolved));
            return Ok(resolved);
        }
        if self.stack.contains(&key) {
            return Err(ResolutionError::IncludeCycle(key).into());
        }
        if self.stack.len() >= self.max_depth {
            return Err(ResolutionError::IncludeDepthExceeded { depth: self.stack.len() + 1, max: self.max_depth }.into());
        }

        let resolved = match self.resolver.resolve(&inc.uri, inc.urn.as_deref())? {
            Resolved::Translation(t) => t,
            Resolved::Stream { is_xml: true, .. } => {
                return Err(ResolutionError::XmlTranslationUnsupported(inc.uri.clone()).into());
            }
            Resolved::Stream { bytes, is_xml: false } => {
                self.stack.push(key.clone());
                let parsed = parse_translation_document(bytes, self);
                self.stack.pop();
                Arc::new(parsed?)
            }
        };
        debug!(include = %key, depth = self.stack.len(), bindings = resolved.len(), "translation included");
        self.cache.insert(key, Arc::clone(&resolved));
        Ok(resolved)
    }

    /// Apply a header to a document translation: import every include into
    /// `scope`, then declare the primitive sets (those of included
    /// translations first). Returns the merged XML root declarations.
    pub fn apply_header(
        &mut self,
        header: &DocumentHeader,
        translation: &mut Translation,
        scope: ScopeId,
        sets: &mut PrimitiveSets,
    ) -> Result<Vec<Attribute>, DmlError> {
        let mut xml_root = Vec::new();
        for inc in &header.includes {
            let resolved = self.include(inc)?;
            translation.import(scope, &resolved.translation, resolved.scope)?;
            declare_all(sets, &resolved.primitive_sets)?;
            union_attributes(&mut xml_root, &resolved.xml_root)?;
        }
        declare_all(sets, &header.primitive_sets)?;
        Ok(xml_root)
    }
}

pub(crate) fn declare_all(sets: &mut PrimitiveSets, decls: &[PrimitiveSetDecl]) -> Result<(), DmlError> {
    for decl in decls {
        sets.declare(decl)?;
    }
    Ok(())
}
