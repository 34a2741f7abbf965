// Node framing: exact wire layout of containers and attributes, inline
// identification, malformed heads and payloads, skipping, and EC nodes as
// seen by the framer.

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use dml_core::config::{ReaderOptions, WriterOptions};
    use dml_core::constants::INLINE_IDENTIFICATION;
    use dml_core::ec::{EcError, EcKeys, EcKind};
    use dml_core::framing::{DmlReader, DmlWriter, FramingError, NodeEvent};
    use dml_core::primitives::{ByteOrderCodec, PrimitiveError, PrimitiveFamily, PrimitiveKind, PrimitiveSets, Value};
    use dml_core::translation::{builtin_translation, Association, Name, ResolutionError, Translation};
    use dml_core::types::{DmlError, ErrorClass};

    fn thing() -> Name {
        Name::container("Thing")
    }

    fn name_attr() -> Name {
        Name::primitive("Name", PrimitiveKind::String)
    }

    fn size() -> Name {
        Name::primitive("Size", PrimitiveKind::UInt)
    }

    fn weight() -> Name {
        Name::primitive("Weight", PrimitiveKind::Double)
    }

    /// Built-ins plus 5 Thing, 6 Name, 7 Size, 8 Weight.
    fn vocabulary(with_ec: bool) -> Arc<Translation> {
        let mut t = builtin_translation(with_ec);
        let root = t.root();
        t.add(root, Association::new(5, thing())).unwrap();
        t.add(root, Association::new(6, name_attr())).unwrap();
        t.add(root, Association::new(7, size())).unwrap();
        t.add(root, Association::new(8, weight())).unwrap();
        Arc::new(t)
    }

    fn writer(with_ec: bool, options: WriterOptions) -> DmlWriter<Vec<u8>> {
        DmlWriter::new(Vec::new(), vocabulary(with_ec), options)
    }

    fn reader(bytes: Vec<u8>, with_ec: bool, options: ReaderOptions) -> DmlReader<Cursor<Vec<u8>>> {
        DmlReader::new(Cursor::new(bytes), vocabulary(with_ec), options).unwrap()
    }

    fn keys() -> EcKeys {
        EcKeys::new([7u8; 32], [9u8; 32])
    }

    #[test]
    fn container_with_name_attribute_wire_layout() {
        let mut w = writer(false, WriterOptions::default());
        w.write_container_by_id(5).unwrap();
        w.write_attribute(&name_attr(), &Value::from("Unnamed")).unwrap();
        w.write_end_container().unwrap();
        let bytes = w.finish().unwrap();

        let mut expected = vec![0x05, 0x06, 0x07];
        expected.extend_from_slice(b"Unnamed");
        // EndAttributes 0x3F10, EndContainer 0x3F11
        expected.extend_from_slice(&[0xFE, 0x10, 0xFE, 0x11]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn container_with_name_attribute_reads_back() {
        let mut w = writer(false, WriterOptions::default());
        w.write_container_by_id(5).unwrap();
        w.write_attribute(&name_attr(), &Value::from("Unnamed")).unwrap();
        w.write_end_container().unwrap();
        let bytes = w.finish().unwrap();

        let mut r = reader(bytes, false, ReaderOptions::default());
        match r.read_node().unwrap() {
            NodeEvent::ContainerStart { id, name, offset } => {
                assert_eq!(id, Some(5));
                assert_eq!(name, thing());
                assert_eq!(offset, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
        let attrs = r.read_attributes().unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].id, Some(6));
        assert_eq!(attrs[0].name.kind, dml_core::translation::NodeKind::Primitive(PrimitiveKind::String));
        assert_eq!(attrs[0].value, Value::from("Unnamed"));
        assert_eq!(r.read_node().unwrap(), NodeEvent::ContainerEnd);
        assert_eq!(r.read_node().unwrap(), NodeEvent::EndOfStream);
        assert!(r.at_end());
    }

    #[test]
    fn children_close_the_attribute_section() {
        let mut w = writer(false, WriterOptions::default());
        w.write_start_container(&thing()).unwrap();
        w.write_attribute(&size(), &Value::UInt(3)).unwrap();
        w.write_primitive(&size(), &Value::UInt(4)).unwrap();
        let err = w.write_attribute(&size(), &Value::UInt(5)).unwrap_err();
        assert!(matches!(err, DmlError::Framing(FramingError::AttributesClosed)));
        w.write_end_container().unwrap();
        let bytes = w.finish().unwrap();

        let mut r = reader(bytes, false, ReaderOptions::default());
        r.read_node().unwrap();
        let attrs = r.read_attributes().unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(r.read_value().unwrap(), (size(), Value::UInt(4)));
        assert_eq!(r.read_node().unwrap(), NodeEvent::ContainerEnd);
    }

    #[test]
    fn inline_identification_round_trip() {
        let options = WriterOptions { allow_inline: true, ..WriterOptions::default() };
        let mut w = writer(false, options);
        let loose = Name::primitive("Loose", PrimitiveKind::Int);
        w.write_primitive(&loose, &Value::Int(-3)).unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0x7F]);

        let mut r = reader(bytes, false, ReaderOptions::default());
        match r.read_node().unwrap() {
            NodeEvent::Primitive { id, name, value } => {
                assert_eq!(id, None);
                assert_eq!(name, loose);
                assert_eq!(value, Value::Int(-3));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unbound_name_without_inline_is_not_found() {
        let mut w = writer(false, WriterOptions::default());
        let err = w.write_primitive(&Name::primitive("Loose", PrimitiveKind::Int), &Value::Int(1)).unwrap_err();
        assert!(matches!(err, DmlError::Resolution(ResolutionError::NotFound(_))));
        assert_eq!(err.class(), ErrorClass::Resolution);
    }

    #[test]
    fn writer_refuses_mismatched_value() {
        let mut w = writer(false, WriterOptions::default());
        let err = w.write_primitive(&size(), &Value::from("big")).unwrap_err();
        assert!(matches!(err, DmlError::Primitive(PrimitiveError::TypeMismatch { .. })));
        // nothing was emitted
        assert_eq!(w.position(), 0);
    }

    #[test]
    fn writer_refuses_bad_heads() {
        let mut w = writer(false, WriterOptions::default());
        assert!(matches!(w.write_start_node_id(0), Err(DmlError::Framing(FramingError::InvalidIdentifier(0)))));
        assert!(matches!(
            w.write_start_node_id(INLINE_IDENTIFICATION),
            Err(DmlError::Framing(FramingError::InvalidIdentifier(_)))
        ));
        assert!(matches!(w.write_start_node_inline("", "uint"), Err(DmlError::Framing(FramingError::EmptyInlineName))));
    }

    #[test]
    fn writer_tracks_balance() {
        let mut w = writer(false, WriterOptions::default());
        assert!(matches!(w.write_end_container(), Err(DmlError::Framing(FramingError::UnbalancedEnd))));
        w.write_start_container(&thing()).unwrap();
        assert_eq!(w.depth(), 1);
        assert!(matches!(w.finish(), Err(DmlError::Framing(FramingError::UnclosedContainers(1)))));
    }

    #[test]
    fn codec_must_be_selected_on_both_sides() {
        let mut w = writer(false, WriterOptions::default());
        let err = w.write_primitive(&weight(), &Value::Double(2.5)).unwrap_err();
        assert!(matches!(
            err,
            DmlError::Primitive(PrimitiveError::CodecNotSelected { family: PrimitiveFamily::Common })
        ));

        let mut w = writer(false, WriterOptions::default()).with_sets(PrimitiveSets::all(ByteOrderCodec::BigEndian));
        w.write_primitive(&weight(), &Value::Double(2.5)).unwrap();
        let bytes = w.finish().unwrap();

        let mut r = reader(bytes.clone(), false, ReaderOptions::default());
        let err = r.read_node().unwrap_err();
        assert!(matches!(
            err.root_cause(),
            DmlError::Primitive(PrimitiveError::CodecNotSelected { family: PrimitiveFamily::Common })
        ));

        let mut r = reader(bytes, false, ReaderOptions::default()).with_sets(PrimitiveSets::all(ByteOrderCodec::BigEndian));
        assert_eq!(r.read_value().unwrap().1, Value::Double(2.5));
    }

    #[test]
    fn identifier_zero_is_structural_error() {
        let mut r = reader(vec![0x00], false, ReaderOptions::default());
        let err = r.read_node().unwrap_err();
        assert!(matches!(err.root_cause(), DmlError::Framing(FramingError::InvalidIdentifier(0))));
        assert_eq!(err.class(), ErrorClass::Structural);
        assert_eq!(err.offset(), Some(0));
    }

    #[test]
    fn empty_inline_name_is_rejected() {
        let mut r = reader(vec![0xFF, 0x7F, 0x00, 0x00], false, ReaderOptions::default());
        let err = r.read_node().unwrap_err();
        assert!(matches!(err.root_cause(), DmlError::Framing(FramingError::EmptyInlineName)));
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        let mut r = reader(vec![0x63], false, ReaderOptions::default());
        let err = r.read_node().unwrap_err();
        assert!(matches!(err.root_cause(), DmlError::Framing(FramingError::UnknownIdentifier(0x63))));
    }

    #[test]
    fn payload_past_end_is_rejected() {
        let mut r = reader(vec![0x07, 0x05, 0x01], false, ReaderOptions::default());
        let err = r.read_node().unwrap_err();
        assert!(matches!(
            err.root_cause(),
            DmlError::Framing(FramingError::PayloadPastEnd { len: 5, available: 1 })
        ));
    }

    #[test]
    fn payload_limit_is_enforced() {
        let options = ReaderOptions { max_payload_len: 2, ..ReaderOptions::default() };
        let mut r = reader(vec![0x06, 0x03, b'a', b'b', b'c'], false, options);
        let err = r.read_node().unwrap_err();
        assert!(matches!(err.root_cause(), DmlError::Framing(FramingError::PayloadTooLarge { len: 3, max: 2 })));
    }

    #[test]
    fn truncated_container_is_rejected_with_offset() {
        // Thing opened, then a bad head inside its attribute section
        let mut r = reader(vec![0x05, 0x00], false, ReaderOptions::default());
        r.read_node().unwrap();
        let err = r.read_attributes().unwrap_err();
        assert_eq!(err.offset(), Some(1));

        let mut r = reader(vec![0x05], false, ReaderOptions::default());
        r.read_node().unwrap();
        let err = r.read_attributes().unwrap_err();
        assert!(matches!(err.root_cause(), DmlError::Framing(FramingError::UnexpectedEndOfStream { open: 1 })));
    }

    #[test]
    fn skip_value_passes_over_containers() {
        let mut w = writer(false, WriterOptions::default());
        w.write_start_container(&thing()).unwrap();
        w.write_attribute(&size(), &Value::UInt(1)).unwrap();
        w.write_start_container(&thing()).unwrap();
        w.write_primitive(&size(), &Value::UInt(2)).unwrap();
        w.write_end_container().unwrap();
        w.write_end_container().unwrap();
        w.write_primitive(&size(), &Value::UInt(3)).unwrap();
        let bytes = w.finish().unwrap();

        let mut r = reader(bytes, false, ReaderOptions::default());
        assert_eq!(r.skip_value().unwrap(), Some(thing()));
        assert_eq!(r.read_value().unwrap(), (size(), Value::UInt(3)));
        assert_eq!(r.skip_value().unwrap(), None);
        assert_eq!(r.counters().skipped_containers, 1);
    }

    #[test]
    fn comments_and_padding_follow_options() {
        let mut w = writer(false, WriterOptions::default());
        w.write_comment("note").unwrap();
        w.write_padding(4).unwrap();
        w.write_primitive(&size(), &Value::UInt(1)).unwrap();
        let bytes = w.finish().unwrap();

        let mut r = reader(bytes.clone(), false, ReaderOptions::default());
        assert_eq!(r.read_node().unwrap(), NodeEvent::Comment("note".into()));
        assert!(matches!(r.read_node().unwrap(), NodeEvent::Primitive { .. }));

        let options = ReaderOptions { discard_comments: true, discard_padding: false, ..ReaderOptions::default() };
        let mut r = reader(bytes, false, options);
        assert_eq!(r.read_node().unwrap(), NodeEvent::Padding(4));
        assert!(matches!(r.read_node().unwrap(), NodeEvent::Primitive { .. }));
        assert_eq!(r.counters().comments, 1);
    }

    #[test]
    fn local_scope_changes_resolution() {
        let mut t = builtin_translation(false);
        let root = t.root();
        t.add(root, Association::new(5, thing())).unwrap();
        t.add(root, Association::new(7, size())).unwrap();
        let local = t.create_local_scope(root, 5).unwrap();
        let label = Name::primitive("Label", PrimitiveKind::String);
        t.add(local, Association::new(7, label.clone())).unwrap();
        let t = Arc::new(t);

        let mut w = DmlWriter::new(Vec::new(), Arc::clone(&t), WriterOptions::default());
        w.write_primitive(&size(), &Value::UInt(1)).unwrap();
        w.write_start_container(&thing()).unwrap();
        w.write_attribute(&label, &Value::from("inner")).unwrap();
        w.write_end_container().unwrap();
        let bytes = w.finish().unwrap();

        let mut r = DmlReader::new(Cursor::new(bytes), t, ReaderOptions::default()).unwrap();
        assert_eq!(r.read_value().unwrap(), (size(), Value::UInt(1)));
        r.read_node().unwrap();
        let attrs = r.read_attributes().unwrap();
        assert_eq!(attrs[0].id, Some(7));
        assert_eq!(attrs[0].name, label);
        assert_eq!(r.current_scope(), local);
    }

    #[test]
    fn compressed_node_round_trip() {
        let mut w = writer(true, WriterOptions::default());
        w.write_compressed(true, |inner| inner.write_primitive(&size(), &Value::UInt(42))).unwrap();
        w.write_primitive(&size(), &Value::UInt(7)).unwrap();
        let bytes = w.finish().unwrap();

        let mut r = reader(bytes, true, ReaderOptions::default());
        let kind = match r.read_node().unwrap() {
            NodeEvent::Encoded { kind, .. } => kind,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(kind, EcKind::CompressedCrc);
        let content = r.read_encoded(kind).unwrap();
        let mut nested = r.nested(content.bytes).unwrap();
        assert_eq!(nested.read_value().unwrap(), (size(), Value::UInt(42)));
        assert_eq!(r.read_value().unwrap(), (size(), Value::UInt(7)));
    }

    #[test]
    fn ec_nodes_need_the_ec_vocabulary() {
        let mut w = writer(false, WriterOptions::default());
        let err = w.write_compressed(false, |inner| inner.write_primitive(&size(), &Value::UInt(1))).unwrap_err();
        assert!(matches!(err, DmlError::Resolution(ResolutionError::NotFound(_))));
    }

    #[test]
    fn encryption_needs_keys() {
        let mut w = writer(true, WriterOptions::default());
        let err = w.write_encrypted(true, |inner| inner.write_primitive(&size(), &Value::UInt(1))).unwrap_err();
        assert!(matches!(err, DmlError::Ec(EcError::MissingKeys)));
        assert_eq!(err.class(), ErrorClass::Security);
    }

    #[test]
    fn encrypted_node_can_be_skipped_without_keys() {
        let mut w = writer(true, WriterOptions::default().with_keys(keys()));
        w.write_encrypted(true, |inner| inner.write_primitive(&name_attr(), &Value::from("secret"))).unwrap();
        w.write_primitive(&size(), &Value::UInt(9)).unwrap();
        let bytes = w.finish().unwrap();

        let mut r = reader(bytes.clone(), true, ReaderOptions::default());
        assert_eq!(r.skip_value().unwrap(), Some(Name::structural(EcKind::EncryptedAuth.label())));
        assert_eq!(r.read_value().unwrap(), (size(), Value::UInt(9)));

        let mut r = reader(bytes, true, ReaderOptions::default().with_keys(keys()));
        let NodeEvent::Encoded { kind, .. } = r.read_node().unwrap() else { panic!("expected EC node") };
        let content = r.read_encoded(kind).unwrap();
        let mut nested = r.nested(content.bytes).unwrap();
        assert_eq!(nested.read_value().unwrap(), (name_attr(), Value::from("secret")));
    }
}
