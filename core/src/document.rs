//! document.rs
//! A DML document: header, resolved vocabulary and a lazily loaded tree.
//!
//! `open` reads only the header and resolves its includes; the body is
//! listed one level ahead of what the caller has seen. `read_all` loads
//! everything and releases the input at once. When some siblings fail to
//! load the document is still returned; the collected failure is kept in
//! `load_failure`.

use std::io::Write;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{ReaderOptions, WriterOptions};
use crate::framing::{Attribute, DmlReader, DmlWriter};
use crate::fragment::{FragmentTree, LoadDepth};
use crate::headers::{read_header, write_header, DocumentHeader};
use crate::io::{open_input, InputSource};
use crate::primitives::PrimitiveSets;
use crate::translation::{builtin_translation, dml_ec, IncludeContext, Resolver, Translation};
use crate::types::DmlError;

#[derive(Debug)]
pub struct DmlDocument {
    header: DocumentHeader,
    tree: FragmentTree,
    sets: PrimitiveSets,
    xml_root: Vec<Attribute>,
    load_failure: Option<DmlError>,
}

/// Keep a partial load as the document's failure; anything else aborts.
fn partial(result: Result<(), DmlError>) -> Result<Option<DmlError>, DmlError> {
    match result {
        Ok(()) => Ok(None),
        Err(e @ DmlError::PartialLoad { .. }) => {
            warn!(error = %e, "document loaded with failures");
            Ok(Some(e))
        }
        Err(e) => Err(e),
    }
}

impl DmlDocument {
    /// Empty in-memory document whose vocabulary comes from `header`.
    pub fn create(header: DocumentHeader, resolver: &dyn Resolver, options: &ReaderOptions) -> Result<Self, DmlError> {
        header.validate()?;
        let mut translation = builtin_translation(false);
        let root = translation.root();
        let mut sets = PrimitiveSets::new();
        let xml_root = IncludeContext::new(resolver, options).apply_header(&header, &mut translation, root, &mut sets)?;
        Ok(Self { header, tree: FragmentTree::new(Arc::new(translation)), sets, xml_root, load_failure: None })
    }

    /// Read the header, resolve its includes and list the top level of the
    /// body. Containers below are loaded on demand through `tree_mut()`.
    pub fn open(src: InputSource, resolver: &dyn Resolver, options: ReaderOptions) -> Result<Self, DmlError> {
        let input = open_input(src)?;
        let mut reader = DmlReader::new(input, Arc::new(builtin_translation(false)), options)?;
        let header = read_header(&mut reader)?;

        let root = reader.translation().root();
        let mut sets = PrimitiveSets::new();
        let mut ctx = IncludeContext::new(resolver, reader.options());
        let xml_root = ctx.apply_header(&header, reader.translation_mut(), root, &mut sets)?;
        *reader.sets_mut() = sets.clone();
        debug!(
            includes = header.includes.len(),
            bindings = reader.translation().len(root),
            "document vocabulary resolved"
        );

        let body = reader.position();
        let mut tree = FragmentTree::from_reader(reader, body);
        let top = tree.root();
        let load_failure = partial(tree.ensure_expandable(top))?;
        Ok(Self { header, tree, sets, xml_root, load_failure })
    }

    /// Open and load the whole document.
    pub fn read_all(src: InputSource, resolver: &dyn Resolver, options: ReaderOptions) -> Result<Self, DmlError> {
        let mut doc = Self::open(src, resolver, options)?;
        let top = doc.tree.root();
        doc.load_failure = partial(doc.tree.load(top, LoadDepth::Full))?;
        Ok(doc)
    }

    pub fn header(&self) -> &DocumentHeader {
        &self.header
    }

    /// Sibling failures from the last load done by `open` or `read_all`.
    /// The nodes that did load stay usable.
    pub fn load_failure(&self) -> Option<&DmlError> {
        self.load_failure.as_ref()
    }

    pub fn tree(&self) -> &FragmentTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut FragmentTree {
        &mut self.tree
    }

    pub fn translation(&self) -> &Arc<Translation> {
        self.tree.translation()
    }

    pub fn sets(&self) -> &PrimitiveSets {
        &self.sets
    }

    /// Root attribute declarations merged from the included translations.
    pub fn xml_root(&self) -> &[Attribute] {
        &self.xml_root
    }

    /// Release the input stream.
    pub fn close(&mut self) {
        self.tree.close();
    }

    /// Serialize header and tree. A tree holding EC nodes gets the EC
    /// vocabulary included in its header.
    pub fn write<W: Write>(&mut self, out: W, options: WriterOptions) -> Result<W, DmlError> {
        if self.tree.has_encoded() && !self.header.includes_urn(crate::constants::URN_DML_EC) {
            self.header.ensure_ec_include();
            let translation = Arc::make_mut(&mut self.tree.translation);
            let root = translation.root();
            translation.import(root, dml_ec(), dml_ec().root())?;
        }
        let mut w = DmlWriter::new(out, Arc::clone(self.tree.translation()), options).with_sets(self.sets.clone());
        write_header(&mut w, &self.header)?;
        self.tree.write_tree(&mut w)?;
        w.finish()
    }

    pub fn to_bytes(&mut self, options: WriterOptions) -> Result<Vec<u8>, DmlError> {
        self.write(Vec::new(), options)
    }
}
