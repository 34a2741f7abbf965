// Primitive payload codec and primitive-set declarations.

#[cfg(test)]
mod tests {
    use dml_core::primitives::{
        decode_value, encode_value, ArrayValue, ByteOrderCodec, Decimal, ElementKind, ExtensionRegistry,
        PrimitiveError, PrimitiveFamily, PrimitiveKind, PrimitiveSetDecl, PrimitiveSets, Value,
    };

    fn no_ext() -> ExtensionRegistry {
        ExtensionRegistry::new()
    }

    fn round_trip(kind: PrimitiveKind, value: Value, sets: &PrimitiveSets) -> Value {
        let ext = no_ext();
        let bytes = encode_value(&kind, &value, sets, &ext).unwrap();
        decode_value(&kind, &bytes, sets, &ext).unwrap()
    }

    #[test]
    fn base_family_needs_no_declaration() {
        let sets = PrimitiveSets::new();
        assert_eq!(round_trip(PrimitiveKind::UInt, Value::UInt(300), &sets), Value::UInt(300));
        assert_eq!(round_trip(PrimitiveKind::Int, Value::Int(-5), &sets), Value::Int(-5));
        assert_eq!(round_trip(PrimitiveKind::Bool, Value::Bool(true), &sets), Value::Bool(true));
        assert_eq!(
            round_trip(PrimitiveKind::String, Value::from("Unnamed"), &sets),
            Value::from("Unnamed")
        );
        assert_eq!(
            round_trip(PrimitiveKind::Array(ElementKind::U8), Value::from(vec![1u8, 2, 3]), &sets),
            Value::from(vec![1u8, 2, 3])
        );
    }

    #[test]
    fn uint_payload_is_a_varint() {
        let bytes = encode_value(&PrimitiveKind::UInt, &Value::UInt(128), &PrimitiveSets::new(), &no_ext()).unwrap();
        assert_eq!(bytes, vec![0x81, 0x00]);
    }

    #[test]
    fn string_payload_is_raw_utf8() {
        let bytes =
            encode_value(&PrimitiveKind::String, &Value::from("Unnamed"), &PrimitiveSets::new(), &no_ext()).unwrap();
        assert_eq!(bytes, b"Unnamed".to_vec());
    }

    #[test]
    fn double_without_codec_is_rejected() {
        let err = encode_value(&PrimitiveKind::Double, &Value::Double(1.5), &PrimitiveSets::new(), &no_ext())
            .unwrap_err();
        assert_eq!(err, PrimitiveError::CodecNotSelected { family: PrimitiveFamily::Common });

        let err = decode_value(&PrimitiveKind::Double, &[0u8; 8], &PrimitiveSets::new(), &no_ext()).unwrap_err();
        assert_eq!(err, PrimitiveError::CodecNotSelected { family: PrimitiveFamily::Common });
    }

    #[test]
    fn declared_byte_order_is_honoured() {
        let be = PrimitiveSets::all(ByteOrderCodec::BigEndian);
        let le = PrimitiveSets::all(ByteOrderCodec::LittleEndian);
        let b = encode_value(&PrimitiveKind::Double, &Value::Double(1.5), &be, &no_ext()).unwrap();
        let l = encode_value(&PrimitiveKind::Double, &Value::Double(1.5), &le, &no_ext()).unwrap();
        assert_eq!(b, vec![0x3F, 0xF8, 0, 0, 0, 0, 0, 0]);
        assert_eq!(l, vec![0, 0, 0, 0, 0, 0, 0xF8, 0x3F]);
    }

    #[test]
    fn arrays_need_their_own_family() {
        let mut sets = PrimitiveSets::new();
        sets.declare(&PrimitiveSetDecl::new(PrimitiveFamily::Common, ByteOrderCodec::LittleEndian)).unwrap();
        let value = Value::Array(ArrayValue::U32(vec![1, 2]));
        let err = encode_value(&PrimitiveKind::Array(ElementKind::U32), &value, &sets, &no_ext()).unwrap_err();
        assert_eq!(err, PrimitiveError::CodecNotSelected { family: PrimitiveFamily::Arrays });

        sets.declare(&PrimitiveSetDecl::new(PrimitiveFamily::Arrays, ByteOrderCodec::LittleEndian)).unwrap();
        assert_eq!(round_trip(PrimitiveKind::Array(ElementKind::U32), value.clone(), &sets), value);
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let err = encode_value(&PrimitiveKind::UInt, &Value::from("ten"), &PrimitiveSets::new(), &no_ext())
            .unwrap_err();
        assert_eq!(err, PrimitiveError::TypeMismatch { expected: PrimitiveKind::UInt, found: PrimitiveKind::String });
    }

    #[test]
    fn invalid_payloads() {
        let sets = PrimitiveSets::new();
        assert_eq!(
            decode_value(&PrimitiveKind::Bool, &[2], &sets, &no_ext()).unwrap_err(),
            PrimitiveError::InvalidBool(2)
        );
        assert_eq!(
            decode_value(&PrimitiveKind::String, &[0xFF, 0xFE], &sets, &no_ext()).unwrap_err(),
            PrimitiveError::InvalidUtf8
        );
        // trailing byte after a complete varint
        assert!(matches!(
            decode_value(&PrimitiveKind::UInt, &[0x01, 0x00], &sets, &no_ext()),
            Err(PrimitiveError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn conflicting_declaration_is_rejected() {
        let mut sets = PrimitiveSets::new();
        sets.declare(&PrimitiveSetDecl::new(PrimitiveFamily::Common, ByteOrderCodec::LittleEndian)).unwrap();
        // same codec again is fine
        sets.declare(&PrimitiveSetDecl::new(PrimitiveFamily::Common, ByteOrderCodec::LittleEndian)).unwrap();
        let err = sets
            .declare(&PrimitiveSetDecl::new(PrimitiveFamily::Common, ByteOrderCodec::BigEndian))
            .unwrap_err();
        assert!(matches!(err, PrimitiveError::ConflictingCodec { .. }));
    }

    #[test]
    fn unknown_set_and_codec() {
        let mut sets = PrimitiveSets::new();
        let decl = PrimitiveSetDecl { set: "vectors".into(), codec: "le".into(), ..PrimitiveSetDecl::default() };
        assert_eq!(sets.declare(&decl).unwrap_err(), PrimitiveError::UnknownPrimitiveSet("vectors".into()));
        let decl = PrimitiveSetDecl { set: "common".into(), codec: "middle".into(), ..PrimitiveSetDecl::default() };
        assert!(matches!(sets.declare(&decl), Err(PrimitiveError::UnsupportedCodec { .. })));
    }

    #[test]
    fn declarations_reproduce_state() {
        let sets = PrimitiveSets::all(ByteOrderCodec::BigEndian);
        let mut copy = PrimitiveSets::new();
        for decl in sets.declarations() {
            copy.declare(&decl).unwrap();
        }
        assert_eq!(copy, sets);
    }

    #[test]
    fn type_strings_parse_and_print() {
        let ext = no_ext();
        for s in ["bool", "int", "uint", "double", "string", "array-u8", "matrix-double"] {
            let kind = PrimitiveKind::parse(s, &ext).unwrap();
            assert_eq!(kind.type_str(&ext), s);
        }
        assert_eq!(PrimitiveKind::parse("array-u9", &ext).unwrap_err(), PrimitiveError::UnknownType("array-u9".into()));
        assert!(matches!(PrimitiveKind::parse("ext:point", &ext), Err(PrimitiveError::UnknownExtension(_))));
    }

    #[test]
    fn decimal_round_trip() {
        let sets = PrimitiveSets::all(ByteOrderCodec::LittleEndian);
        let d = Decimal::new(12_345, 2, true).unwrap();
        assert_eq!(d.to_string(), "-123.45");
        assert_eq!(round_trip(PrimitiveKind::Decimal, Value::Decimal(d), &sets), Value::Decimal(d));
        assert!(Decimal::new(1, 29, false).is_err());
    }

    fn decode_point(b: &[u8]) -> Result<Value, PrimitiveError> {
        Ok(Value::String(format!("point:{}", b.len())))
    }

    fn encode_point(v: &Value) -> Result<Vec<u8>, PrimitiveError> {
        match v {
            Value::String(s) => Ok(s.as_bytes().to_vec()),
            other => Err(PrimitiveError::ExtensionFailed { name: "point".into(), msg: format!("{:?}", other.kind()) }),
        }
    }

    #[test]
    fn extension_handlers_are_used() {
        let mut ext = ExtensionRegistry::new();
        let id = ext.register("point", decode_point, encode_point);
        let kind = PrimitiveKind::parse("ext:point", &ext).unwrap();
        assert_eq!(kind, PrimitiveKind::Extension(id));

        let sets = PrimitiveSets::new();
        let bytes = encode_value(&kind, &Value::from("abc"), &sets, &ext).unwrap();
        assert_eq!(bytes, b"abc".to_vec());
        assert_eq!(decode_value(&kind, &bytes, &sets, &ext).unwrap(), Value::from("point:3"));
    }

    #[test]
    fn unregistered_extension_keeps_raw_bytes() {
        let kind = PrimitiveKind::Extension(7);
        match decode_value(&kind, &[9, 9], &PrimitiveSets::new(), &no_ext()).unwrap() {
            Value::Extension(raw) => {
                assert_eq!(raw.type_id, 7);
                assert_eq!(raw.payload, vec![9, 9]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
