//! translation/builtin.rs
//! The immutable base translations.
//!
//! Built once per process and only ever cloned; nothing hands out a mutable
//! reference to them.

use std::sync::OnceLock;

use crate::constants::{dml_ids, DmlId, URN_DML_BASE, URN_DML_EC};
use crate::ec::EcKind;
use crate::primitives::{ElementKind, PrimitiveKind};
use crate::translation::scope::Translation;
use crate::translation::types::{Name, NodeKind};

const UINT: NodeKind = NodeKind::Primitive(PrimitiveKind::UInt);
const STRING: NodeKind = NodeKind::Primitive(PrimitiveKind::String);
const BYTES: NodeKind = NodeKind::Primitive(PrimitiveKind::Array(ElementKind::U8));

pub mod labels {
    pub const HEADER: &str = "DML:Header";
    pub const END_ATTRIBUTES: &str = "DML:EndAttributes";
    pub const END_CONTAINER: &str = "DML:EndContainer";
    pub const COMMENT: &str = "DML:Comment";
    pub const PADDING: &str = "DML:Padding";
    pub const TRANSLATION: &str = "DML:Translation";
}

const DML_BASE_TABLE: &[(DmlId, &str, NodeKind)] = &[
    (dml_ids::HEADER, labels::HEADER, NodeKind::Container),
    (dml_ids::VERSION, "DML:Version", UINT),
    (dml_ids::READ_VERSION, "DML:ReadVersion", UINT),
    (dml_ids::DOC_TYPE, "DML:DocType", STRING),
    (dml_ids::INCLUDE_TRANSLATION, "DML:Include-Translation", NodeKind::Container),
    (dml_ids::URI, "DML:URI", STRING),
    (dml_ids::URN, "DML:URN", STRING),
    (dml_ids::INCLUDE_PRIMITIVES, "DML:Include-Primitives", NodeKind::Container),
    (dml_ids::SET, "DML:Set", STRING),
    (dml_ids::CODEC, "DML:Codec", STRING),
    (dml_ids::CODEC_URI, "DML:CodecURI", STRING),
    (dml_ids::CONFIG, "DML:Config", BYTES),
    (dml_ids::END_ATTRIBUTES, labels::END_ATTRIBUTES, NodeKind::Structural),
    (dml_ids::END_CONTAINER, labels::END_CONTAINER, NodeKind::Structural),
    (dml_ids::COMMENT, labels::COMMENT, NodeKind::Comment),
    (dml_ids::PADDING, labels::PADDING, NodeKind::Padding),
    (dml_ids::TRANSLATION, labels::TRANSLATION, NodeKind::Container),
    (dml_ids::CONTAINER, "DML:Container", NodeKind::Container),
    (dml_ids::NODE, "DML:Node", NodeKind::Container),
    (dml_ids::ID, "DML:ID", UINT),
    (dml_ids::NAME, "DML:Name", STRING),
    (dml_ids::TYPE, "DML:Type", STRING),
    (dml_ids::RENUMBER, "DML:Renumber", NodeKind::Container),
    (dml_ids::NEW_ID, "DML:NewID", UINT),
    (dml_ids::XML_ROOT, "DML:XMLRoot", NodeKind::Container),
];

const EC_KINDS: [EcKind; 4] = [EcKind::Compressed, EcKind::CompressedCrc, EcKind::Encrypted, EcKind::EncryptedAuth];

static DML_BASE: OnceLock<Translation> = OnceLock::new();
static DML_EC: OnceLock<Translation> = OnceLock::new();

fn build_dml_base() -> Translation {
    let mut t = Translation::new();
    for &(id, label, kind) in DML_BASE_TABLE {
        t.insert_builtin(id, Name::new(label, kind));
    }
    t
}

fn build_dml_ec() -> Translation {
    let mut t = Translation::new();
    for kind in EC_KINDS {
        t.insert_builtin(kind.id(), Name::structural(kind.label()));
    }
    t
}

/// Base vocabulary: header, structural markers, translation documents.
pub fn dml_base() -> &'static Translation {
    DML_BASE.get_or_init(build_dml_base)
}

/// EC vocabulary: the four compressed / encrypted node kinds.
pub fn dml_ec() -> &'static Translation {
    DML_EC.get_or_init(build_dml_ec)
}

pub fn builtin_for_urn(urn: &str) -> Option<&'static Translation> {
    match urn {
        URN_DML_BASE => Some(dml_base()),
        URN_DML_EC => Some(dml_ec()),
        _ => None,
    }
}

/// A private, mutable starting translation: the base vocabulary, plus the EC
/// vocabulary when `with_ec` is set.
pub fn builtin_translation(with_ec: bool) -> Translation {
    let mut t = dml_base().clone();
    if with_ec {
        for kind in EC_KINDS {
            t.insert_builtin(kind.id(), Name::structural(kind.label()));
        }
    }
    t
}

/// Structural markers recognised by the framer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    EndAttributes,
    EndContainer,
    Encoded(EcKind),
}

pub fn structural_marker(name: &Name) -> Option<Marker> {
    if name.kind != NodeKind::Structural {
        return None;
    }
    match name.label.as_str() {
        labels::END_ATTRIBUTES => Some(Marker::EndAttributes),
        labels::END_CONTAINER => Some(Marker::EndContainer),
        other => EcKind::from_label(other).map(Marker::Encoded),
    }
}
