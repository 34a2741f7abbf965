//! translation/scope.rs
//! Arena of translation scopes and the operations on them.
//!
//! Invariants kept by every mutator:
//! - Within one scope an id maps to at most one Association and a Name to
//!   at most one id; `by_id` and `by_name` always agree.
//! - A local scope has exactly one owner `(scope, id)`, its parent is that
//!   owning scope, and it is never an ancestor of its owner.

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use crate::constants::{is_reserved, DmlId, INLINE_IDENTIFICATION, INVALID_ID, RESERVED_END};
use crate::translation::types::{Association, Name, ResolutionError, ScopeId};

#[derive(Debug, Clone, Default)]
struct ScopeData {
    parent: Option<ScopeId>,
    owner: Option<(ScopeId, DmlId)>,
    by_id: BTreeMap<DmlId, Association>,
    by_name: HashMap<Name, DmlId>,
    next_id: DmlId,
}

/// A tree of scopes. `root()` is created with the arena; further scopes are
/// created as detached children (`new_scope`) or as local scopes owned by a
/// container association (`create_local_scope`).
#[derive(Debug, Clone)]
pub struct Translation {
    scopes: Vec<ScopeData>,
}

impl Default for Translation {
    fn default() -> Self {
        Self::new()
    }
}

fn scope_missing(scope: ScopeId) -> ResolutionError {
    ResolutionError::NotFound(format!("scope #{}", scope.0))
}

fn id_missing(id: DmlId) -> ResolutionError {
    ResolutionError::NotFound(format!("identifier 0x{:04x}", id))
}

impl Translation {
    pub fn new() -> Self {
        Self { scopes: vec![ScopeData { next_id: 1, ..Default::default() }] }
    }

    pub const fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    fn data(&self, scope: ScopeId) -> Result<&ScopeData, ResolutionError> {
        self.scopes.get(scope.0).ok_or_else(|| scope_missing(scope))
    }

    fn data_mut(&mut self, scope: ScopeId) -> Result<&mut ScopeData, ResolutionError> {
        self.scopes.get_mut(scope.0).ok_or_else(|| scope_missing(scope))
    }

    /// New empty scope, optionally delegating lookups to `parent`.
    pub fn new_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(ScopeData { parent, next_id: 1, ..Default::default() });
        id
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes.get(scope.0).and_then(|d| d.parent)
    }

    /// Association that owns `scope` as its local scope.
    pub fn owner(&self, scope: ScopeId) -> Option<(ScopeId, DmlId)> {
        self.scopes.get(scope.0).and_then(|d| d.owner)
    }

    pub fn len(&self, scope: ScopeId) -> usize {
        self.scopes.get(scope.0).map_or(0, |d| d.by_id.len())
    }

    pub fn is_empty(&self, scope: ScopeId) -> bool {
        self.len(scope) == 0
    }

    /// Associations of `scope` only, in id order.
    pub fn associations(&self, scope: ScopeId) -> impl Iterator<Item = &Association> + '_ {
        self.scopes.get(scope.0).into_iter().flat_map(|d| d.by_id.values())
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn try_get_id(&self, scope: ScopeId, id: DmlId) -> Option<&Association> {
        self.scopes.get(scope.0)?.by_id.get(&id)
    }

    pub fn try_get_name(&self, scope: ScopeId, name: &Name) -> Option<&Association> {
        let data = self.scopes.get(scope.0)?;
        data.by_name.get(name).and_then(|id| data.by_id.get(id))
    }

    /// Nearest-scope-wins lookup by id, walking parent links.
    pub fn try_find_id(&self, scope: ScopeId, id: DmlId) -> Option<(ScopeId, &Association)> {
        let mut cur = Some(scope);
        while let Some(s) = cur {
            let data = self.scopes.get(s.0)?;
            if let Some(a) = data.by_id.get(&id) {
                return Some((s, a));
            }
            cur = data.parent;
        }
        None
    }

    /// Nearest-scope-wins lookup by Name, walking parent links.
    pub fn try_find_name(&self, scope: ScopeId, name: &Name) -> Option<(ScopeId, &Association)> {
        let mut cur = Some(scope);
        while let Some(s) = cur {
            if let Some(a) = self.try_get_name(s, name) {
                return Some((s, a));
            }
            cur = self.scopes.get(s.0)?.parent;
        }
        None
    }

    pub fn find_id(&self, scope: ScopeId, id: DmlId) -> Result<&Association, ResolutionError> {
        self.try_find_id(scope, id).map(|(_, a)| a).ok_or_else(|| id_missing(id))
    }

    pub fn find_name(&self, scope: ScopeId, name: &Name) -> Result<&Association, ResolutionError> {
        self.try_find_name(scope, name)
            .map(|(_, a)| a)
            .ok_or_else(|| ResolutionError::NotFound(format!("name {}", name)))
    }

    pub fn local_scope(&self, scope: ScopeId, id: DmlId) -> Option<ScopeId> {
        self.try_get_id(scope, id).and_then(|a| a.local)
    }

    fn is_self_or_ancestor(&self, candidate: ScopeId, scope: ScopeId) -> bool {
        let mut cur = Some(scope);
        while let Some(s) = cur {
            if s == candidate {
                return true;
            }
            cur = self.parent(s);
        }
        false
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Bind `assoc` in `scope`.
    ///
    /// Re-adding an identical binding is a no-op; if it carries a local scope
    /// that one is attached (or merged into the existing local scope).
    pub fn add(&mut self, scope: ScopeId, assoc: Association) -> Result<(), ResolutionError> {
        if assoc.id == INVALID_ID || assoc.id == INLINE_IDENTIFICATION {
            return Err(ResolutionError::InvalidIdentifier(assoc.id));
        }
        if assoc.local.is_some() && !assoc.name.is_container() {
            return Err(ResolutionError::LocalScopeOnPrimitive { name: assoc.name.to_string() });
        }

        let data = self.data(scope)?;
        if let Some(existing) = data.by_id.get(&assoc.id) {
            if existing.name != assoc.name {
                return Err(ResolutionError::DuplicateIdentifier {
                    id: assoc.id,
                    existing: existing.name.to_string(),
                    incoming: assoc.name.to_string(),
                });
            }
            return match (existing.local, assoc.local) {
                (_, None) => Ok(()),
                (Some(a), Some(b)) if a == b => Ok(()),
                (None, Some(b)) => self.attach_local(scope, assoc.id, b),
                (Some(a), Some(b)) => {
                    if self.is_self_or_ancestor(b, scope) {
                        return Err(ResolutionError::ScopeAlreadyAttached { id: assoc.id });
                    }
                    self.merge_local(a, b)
                }
            };
        }
        if let Some(&bound) = data.by_name.get(&assoc.name) {
            return Err(ResolutionError::DuplicatePropertySet {
                name: assoc.name.to_string(),
                existing: bound,
                incoming: assoc.id,
            });
        }
        if let Some(local) = assoc.local {
            self.check_attachable(scope, assoc.id, local)?;
        }

        let Association { id, name, local } = assoc;
        trace!(scope = scope.0, id, name = %name, "bind");
        let data = self.data_mut(scope)?;
        data.by_name.insert(name.clone(), id);
        data.by_id.insert(id, Association::new(id, name));
        match local {
            Some(l) => self.attach_local(scope, id, l),
            None => Ok(()),
        }
    }

    fn check_attachable(&self, scope: ScopeId, id: DmlId, local: ScopeId) -> Result<(), ResolutionError> {
        let data = self.data(local)?;
        let foreign_owner = data.owner.is_some_and(|o| o != (scope, id));
        let foreign_parent = data.parent.is_some_and(|p| p != scope);
        if foreign_owner || foreign_parent || self.is_self_or_ancestor(local, scope) {
            return Err(ResolutionError::ScopeAlreadyAttached { id });
        }
        Ok(())
    }

    fn attach_local(&mut self, scope: ScopeId, id: DmlId, local: ScopeId) -> Result<(), ResolutionError> {
        self.check_attachable(scope, id, local)?;
        let data = self.data_mut(local)?;
        data.parent = Some(scope);
        data.owner = Some((scope, id));
        let assoc = self.data_mut(scope)?.by_id.get_mut(&id).ok_or_else(|| id_missing(id))?;
        assoc.local = Some(local);
        Ok(())
    }

    /// Local scope of the container bound to `id`, created on first use.
    pub fn create_local_scope(&mut self, scope: ScopeId, id: DmlId) -> Result<ScopeId, ResolutionError> {
        let assoc = self.try_get_id(scope, id).ok_or_else(|| id_missing(id))?;
        if !assoc.name.is_container() {
            return Err(ResolutionError::LocalScopeOnPrimitive { name: assoc.name.to_string() });
        }
        if let Some(local) = assoc.local {
            return Ok(local);
        }
        let local = self.new_scope(Some(scope));
        self.attach_local(scope, id, local)?;
        Ok(local)
    }

    /// Bind `name` to the next free id: never 0, never in the reserved block
    /// and never an id already visible from `scope`.
    pub fn assign(&mut self, scope: ScopeId, name: Name) -> Result<DmlId, ResolutionError> {
        let mut candidate = self.data(scope)?.next_id.max(1);
        loop {
            if is_reserved(candidate) {
                candidate = RESERVED_END + 1;
                continue;
            }
            if self.try_find_id(scope, candidate).is_none() {
                break;
            }
            candidate = candidate.checked_add(1).ok_or(ResolutionError::IdentifiersExhausted)?;
        }
        self.add(scope, Association::new(candidate, name))?;
        self.data_mut(scope)?.next_id = candidate.saturating_add(1);
        Ok(candidate)
    }

    /// Move the binding of `old` to `new`, keeping its Name and local scope.
    pub fn renumber(&mut self, scope: ScopeId, old: DmlId, new: DmlId) -> Result<(), ResolutionError> {
        if new == INVALID_ID || new == INLINE_IDENTIFICATION {
            return Err(ResolutionError::InvalidIdentifier(new));
        }
        if is_reserved(new) {
            return Err(ResolutionError::ReservedIdentifier(new));
        }
        let data = self.data_mut(scope)?;
        if !data.by_id.contains_key(&old) {
            return Err(id_missing(old));
        }
        if data.by_id.contains_key(&new) {
            return Err(ResolutionError::IdentifierInUse(new));
        }
        let mut assoc = data.by_id.remove(&old).ok_or_else(|| id_missing(old))?;
        assoc.id = new;
        data.by_name.insert(assoc.name.clone(), new);
        let local = assoc.local;
        data.by_id.insert(new, assoc);
        if let Some(l) = local {
            self.data_mut(l)?.owner = Some((scope, new));
        }
        trace!(scope = scope.0, old, new, "renumber");
        Ok(())
    }

    fn merge_local(&mut self, into: ScopeId, from: ScopeId) -> Result<(), ResolutionError> {
        if into == from {
            return Ok(());
        }
        let entries: Vec<Association> = self.data(from)?.by_id.values().cloned().collect();
        for Association { id, name, local } in entries {
            self.add(into, Association::new(id, name))?;
            if let Some(from_local) = local {
                // a binding imported twice shares one local scope
                let target = match self.local_scope(into, id) {
                    Some(existing) => existing,
                    None => self.create_local_scope(into, id)?,
                };
                self.merge_local(target, from_local)?;
            }
        }
        Ok(())
    }

    /// Merge every binding of `other`'s scope `from` (and its local scopes)
    /// into `into`, through `add`.
    pub fn import(&mut self, into: ScopeId, other: &Translation, from: ScopeId) -> Result<(), ResolutionError> {
        let entries: Vec<Association> = other.data(from)?.by_id.values().cloned().collect();
        for Association { id, name, local } in entries {
            self.add(into, Association::new(id, name))?;
            if let Some(other_local) = local {
                // a binding imported twice shares one local scope
                let target = match self.local_scope(into, id) {
                    Some(existing) => existing,
                    None => self.create_local_scope(into, id)?,
                };
                self.import(target, other, other_local)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Cloning
    // ------------------------------------------------------------------

    fn copy_subtree(
        &mut self,
        src: Option<&Translation>,
        root: ScopeId,
        parent: Option<ScopeId>,
        map: &mut HashMap<ScopeId, ScopeId>,
    ) -> Result<ScopeId, ResolutionError> {
        let data = match src {
            Some(t) => t.data(root)?.clone(),
            None => self.data(root)?.clone(),
        };
        let locals: Vec<(DmlId, ScopeId)> =
            data.by_id.values().filter_map(|a| a.local.map(|l| (a.id, l))).collect();

        let copy = ScopeId(self.scopes.len());
        self.scopes.push(ScopeData { parent, owner: None, ..data });
        map.insert(root, copy);

        for (id, local) in locals {
            let local_copy = self.copy_subtree(src, local, Some(copy), map)?;
            self.scopes[local_copy.0].owner = Some((copy, id));
            if let Some(a) = self.scopes[copy.0].by_id.get_mut(&id) {
                a.local = Some(local_copy);
            }
        }
        Ok(copy)
    }

    fn copy_chain(
        &mut self,
        src: Option<&Translation>,
        scope: ScopeId,
        include_parents: bool,
        detached_parent: Option<ScopeId>,
    ) -> Result<ScopeId, ResolutionError> {
        let source = src.unwrap_or(self);
        let mut map = HashMap::new();
        if !include_parents {
            return self.copy_subtree(src, scope, detached_parent, &mut map);
        }

        let mut chain = vec![scope];
        let mut cur = source.data(scope)?.parent;
        while let Some(p) = cur {
            chain.push(p);
            cur = source.data(p)?.parent;
        }

        let mut parent = None;
        for &s in chain.iter().rev() {
            let copy = match map.get(&s) {
                Some(&c) => c,
                None => self.copy_subtree(src, s, parent, &mut map)?,
            };
            parent = Some(copy);
        }
        map.get(&scope).copied().ok_or_else(|| scope_missing(scope))
    }

    /// Deep-copy `scope` and its local scopes inside this arena.
    ///
    /// Without `include_parents` the copy keeps delegating to the original
    /// parent; with it the whole ancestor chain is copied as well, so the copy
    /// shares nothing with the source.
    pub fn clone_scope(&mut self, scope: ScopeId, include_parents: bool) -> Result<ScopeId, ResolutionError> {
        let parent = self.data(scope)?.parent;
        self.copy_chain(None, scope, include_parents, parent)
    }

    /// Copy `scope` (and optionally its ancestors) into a fresh arena.
    /// Returns the new arena and the handle of the copied `scope` in it.
    pub fn extract(&self, scope: ScopeId, include_parents: bool) -> Result<(Translation, ScopeId), ResolutionError> {
        let mut out = Translation { scopes: Vec::new() };
        let copy = out.copy_chain(Some(self), scope, include_parents, None)?;
        Ok((out, copy))
    }

    /// Unvalidated insert used to build the immutable base translations.
    pub(crate) fn insert_builtin(&mut self, id: DmlId, name: Name) {
        if let Some(root) = self.scopes.first_mut() {
            root.by_name.insert(name.clone(), id);
            root.by_id.insert(id, Association::new(id, name));
        }
    }
}
