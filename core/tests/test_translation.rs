// Translation scopes: nearest-scope lookup, binding conflicts, renumbering,
// local scopes, import and copy isolation.

#[cfg(test)]
mod tests {
    use dml_core::constants::{dml_ids, RESERVED_END, RESERVED_START, URN_DML_BASE, URN_DML_EC};
    use dml_core::primitives::PrimitiveKind;
    use dml_core::translation::{
        builtin_for_urn, builtin_translation, dml_base, Association, Name, ResolutionError, Translation,
    };

    fn uint(label: &str) -> Name {
        Name::primitive(label, PrimitiveKind::UInt)
    }

    /// root: 10 Item (container), 20 Box (container, local { 10 Size:uint }), 30 Count:uint
    fn nested() -> (Translation, dml_core::translation::ScopeId) {
        let mut t = Translation::new();
        let root = t.root();
        t.add(root, Association::new(10, Name::container("Item"))).unwrap();
        t.add(root, Association::new(20, Name::container("Box"))).unwrap();
        t.add(root, Association::new(30, uint("Count"))).unwrap();
        let local = t.create_local_scope(root, 20).unwrap();
        t.add(local, Association::new(10, uint("Size"))).unwrap();
        (t, local)
    }

    #[test]
    fn nearest_scope_shadows_parent() {
        let (t, local) = nested();
        assert_eq!(t.find_id(local, 10).unwrap().name, uint("Size"));
        assert_eq!(t.find_id(t.root(), 10).unwrap().name, Name::container("Item"));
    }

    #[test]
    fn sibling_scope_sees_parent_binding() {
        let (mut t, _) = nested();
        let root = t.root();
        let sibling = t.create_local_scope(root, 10).unwrap();
        assert_eq!(t.find_id(sibling, 10).unwrap().name, Name::container("Item"));
    }

    #[test]
    fn parent_bindings_stay_visible() {
        let (t, local) = nested();
        let (found_in, assoc) = t.try_find_id(local, 30).unwrap();
        assert_eq!(found_in, t.root());
        assert_eq!(assoc.name, uint("Count"));
        assert_eq!(t.find_name(local, &Name::container("Item")).unwrap().id, 10);
    }

    #[test]
    fn local_scope_is_not_visible_from_parent() {
        let (t, _) = nested();
        assert!(t.try_find_name(t.root(), &uint("Size")).is_none());
        assert!(matches!(t.find_name(t.root(), &uint("Size")), Err(ResolutionError::NotFound(_))));
    }

    #[test]
    fn local_scope_is_owned_once() {
        let (t, local) = nested();
        assert_eq!(t.owner(local), Some((t.root(), 20)));
        assert_eq!(t.parent(local), Some(t.root()));
        assert_eq!(t.local_scope(t.root(), 20), Some(local));
    }

    #[test]
    fn duplicate_identifier_with_different_name() {
        let mut t = Translation::new();
        let root = t.root();
        t.add(root, Association::new(10, uint("Width"))).unwrap();
        let err = t.add(root, Association::new(10, uint("Height"))).unwrap_err();
        assert!(matches!(err, ResolutionError::DuplicateIdentifier { id: 10, .. }));
        // the failed add left the original binding in place
        assert_eq!(t.find_id(root, 10).unwrap().name, uint("Width"));
    }

    #[test]
    fn identical_rebinding_is_a_no_op() {
        let mut t = Translation::new();
        let root = t.root();
        t.add(root, Association::new(10, uint("Width"))).unwrap();
        t.add(root, Association::new(10, uint("Width"))).unwrap();
        assert_eq!(t.len(root), 1);
    }

    #[test]
    fn duplicate_name_with_different_identifier() {
        let mut t = Translation::new();
        let root = t.root();
        t.add(root, Association::new(10, uint("Width"))).unwrap();
        let err = t.add(root, Association::new(11, uint("Width"))).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::DuplicatePropertySet { name: "Width:uint".into(), existing: 10, incoming: 11 }
        );
    }

    #[test]
    fn name_equality_includes_type() {
        let mut t = Translation::new();
        let root = t.root();
        t.add(root, Association::new(1, uint("Size"))).unwrap();
        t.add(root, Association::new(2, Name::primitive("Size", PrimitiveKind::String))).unwrap();
        assert_eq!(t.len(root), 2);
    }

    #[test]
    fn invalid_identifiers_are_refused() {
        let mut t = Translation::new();
        let root = t.root();
        assert_eq!(t.add(root, Association::new(0, uint("Zero"))).unwrap_err(), ResolutionError::InvalidIdentifier(0));
        assert_eq!(
            t.add(root, Association::new(0x3FFF, uint("Inline"))).unwrap_err(),
            ResolutionError::InvalidIdentifier(0x3FFF)
        );
    }

    #[test]
    fn renumber_moves_binding() {
        let (mut t, local) = nested();
        let root = t.root();
        t.renumber(root, 20, 21).unwrap();
        assert!(matches!(t.find_id(root, 20), Err(ResolutionError::NotFound(_))));
        let moved = t.find_id(root, 21).unwrap();
        assert_eq!(moved.name, Name::container("Box"));
        assert_eq!(moved.local, Some(local));
        assert_eq!(t.owner(local), Some((root, 21)));
        assert_eq!(t.find_name(root, &Name::container("Box")).unwrap().id, 21);
    }

    #[test]
    fn renumber_conflicts() {
        let (mut t, _) = nested();
        let root = t.root();
        assert_eq!(t.renumber(root, 20, 30).unwrap_err(), ResolutionError::IdentifierInUse(30));
        assert_eq!(
            t.renumber(root, 20, RESERVED_START).unwrap_err(),
            ResolutionError::ReservedIdentifier(RESERVED_START)
        );
        assert!(matches!(t.renumber(root, 99, 100), Err(ResolutionError::NotFound(_))));
    }

    #[test]
    fn assign_picks_next_free_identifier() {
        let mut t = Translation::new();
        let root = t.root();
        t.add(root, Association::new(1, uint("A"))).unwrap();
        t.add(root, Association::new(2, uint("B"))).unwrap();
        assert_eq!(t.assign(root, uint("C")).unwrap(), 3);
        assert_eq!(t.assign(root, uint("D")).unwrap(), 4);
    }

    #[test]
    fn assign_avoids_ids_visible_from_parent() {
        let (mut t, local) = nested();
        // 10 is shadowed locally, 20 and 30 come from the root
        let mut got = Vec::new();
        for label in ["a", "b", "c"] {
            got.push(t.assign(local, uint(label)).unwrap());
        }
        assert!(!got.contains(&10) && !got.contains(&20) && !got.contains(&30));
    }

    #[test]
    fn assign_skips_reserved_block() {
        let mut t = Translation::new();
        let root = t.root();
        for id in 1..RESERVED_START {
            t.add(root, Association::new(id, uint(&format!("n{id}")))).unwrap();
        }
        assert_eq!(t.assign(root, uint("next")).unwrap(), RESERVED_END + 1);
    }

    #[test]
    fn local_scope_on_primitive_is_refused() {
        let (mut t, _) = nested();
        let root = t.root();
        assert!(matches!(t.create_local_scope(root, 30), Err(ResolutionError::LocalScopeOnPrimitive { .. })));
    }

    #[test]
    fn attaching_an_owned_scope_elsewhere_fails() {
        let (mut t, local) = nested();
        let root = t.root();
        let err = t.add(root, Association::with_local(40, Name::container("Crate"), local)).unwrap_err();
        assert_eq!(err, ResolutionError::ScopeAlreadyAttached { id: 40 });
        assert!(t.try_get_id(root, 40).is_none());
    }

    #[test]
    fn attaching_an_ancestor_fails() {
        let (mut t, local) = nested();
        let root = t.root();
        t.add(local, Association::new(50, Name::container("Inner"))).unwrap();
        let err = t.add(local, Association::with_local(51, Name::container("Loop"), root)).unwrap_err();
        assert!(matches!(err, ResolutionError::ScopeAlreadyAttached { .. }));
    }

    #[test]
    fn import_conflict_on_shared_identifier() {
        let mut a = Translation::new();
        let root_a = a.root();
        a.add(root_a, Association::new(10, uint("Width"))).unwrap();

        let mut b = Translation::new();
        let root_b = b.root();
        b.add(root_b, Association::new(10, uint("Depth"))).unwrap();

        let err = a.import(root_a, &b, root_b).unwrap_err();
        assert!(matches!(err, ResolutionError::DuplicateIdentifier { id: 10, .. }));
    }

    #[test]
    fn import_copies_local_scopes() {
        let (src, _) = nested();
        let mut dst = Translation::new();
        let root = dst.root();
        dst.import(root, &src, src.root()).unwrap();
        let local = dst.local_scope(root, 20).unwrap();
        assert_eq!(dst.find_id(local, 10).unwrap().name, uint("Size"));
        assert_eq!(dst.owner(local), Some((root, 20)));
    }

    #[test]
    fn clone_scope_is_isolated() {
        let (mut t, local) = nested();
        let copy = t.clone_scope(local, false).unwrap();
        t.add(copy, Association::new(11, uint("Weight"))).unwrap();
        assert!(t.try_get_id(local, 11).is_none());
        // the copy still resolves through the original parent
        assert_eq!(t.find_id(copy, 30).unwrap().name, uint("Count"));
    }

    #[test]
    fn extract_with_parents_is_self_contained() {
        let (t, local) = nested();
        let (mut out, copy) = t.extract(local, true).unwrap();
        assert_eq!(out.find_id(copy, 30).unwrap().name, uint("Count"));
        out.add(copy, Association::new(12, uint("Extra"))).unwrap();
        assert!(t.try_get_id(local, 12).is_none());
    }

    #[test]
    fn associations_iterate_in_id_order() {
        let (t, _) = nested();
        let ids: Vec<_> = t.associations(t.root()).map(|a| a.id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }

    #[test]
    fn builtins_are_cloned_not_shared() {
        let mut t = builtin_translation(false);
        let root = t.root();
        t.add(root, Association::new(10, uint("Mine"))).unwrap();
        assert!(dml_base().try_get_id(dml_base().root(), 10).is_none());
        assert_eq!(t.find_id(root, dml_ids::HEADER).unwrap().name, Name::container("DML:Header"));
    }

    #[test]
    fn builtin_urns() {
        assert!(builtin_for_urn(URN_DML_BASE).is_some());
        let ec = builtin_for_urn(URN_DML_EC).unwrap();
        assert_eq!(ec.len(ec.root()), 4);
        assert!(builtin_for_urn("urn:example:other").is_none());
        assert!(builtin_translation(true).try_get_id(builtin_translation(true).root(), 0x3F40).is_some());
    }
}
