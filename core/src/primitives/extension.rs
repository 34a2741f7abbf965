//! Extension primitive types.
//!
//! A capability table: each entry names a type and supplies a decode and an
//! encode function. Lookup is by name (`ext:<name>` type strings) or by the
//! numeric type id assigned at registration.

use std::collections::HashMap;
use std::fmt;

use crate::primitives::types::{PrimitiveError, Value};

pub type ExtensionTypeId = u32;

pub type ExtensionDecodeFn = fn(&[u8]) -> Result<Value, PrimitiveError>;
pub type ExtensionEncodeFn = fn(&Value) -> Result<Vec<u8>, PrimitiveError>;

#[derive(Clone)]
pub struct ExtensionType {
    pub name: String,
    pub type_id: ExtensionTypeId,
    pub decode: ExtensionDecodeFn,
    pub encode: ExtensionEncodeFn,
}

impl fmt::Debug for ExtensionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionType")
            .field("name", &self.name)
            .field("type_id", &self.type_id)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    types: Vec<ExtensionType>,
    by_name: HashMap<String, usize>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; re-registering a name replaces its functions and keeps the id.
    pub fn register(&mut self, name: &str, decode: ExtensionDecodeFn, encode: ExtensionEncodeFn) -> ExtensionTypeId {
        if let Some(&idx) = self.by_name.get(name) {
            let entry = &mut self.types[idx];
            entry.decode = decode;
            entry.encode = encode;
            return entry.type_id;
        }
        let type_id = self.types.len() as ExtensionTypeId + 1;
        self.by_name.insert(name.to_owned(), self.types.len());
        self.types.push(ExtensionType { name: name.to_owned(), type_id, decode, encode });
        type_id
    }

    pub fn probe(&self, name: &str) -> Option<ExtensionTypeId> {
        self.by_name.get(name).map(|&i| self.types[i].type_id)
    }

    pub fn get(&self, type_id: ExtensionTypeId) -> Option<&ExtensionType> {
        let idx = (type_id as usize).checked_sub(1)?;
        self.types.get(idx)
    }

    pub fn name_of(&self, type_id: ExtensionTypeId) -> Option<&str> {
        self.get(type_id).map(|t| t.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
