// Varint codec: exact wire bytes, minimal-encoding enforcement, stream
// end-of-input handling and zig-zag mapping.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use std::io::Cursor;

    use dml_core::varint::{
        decode_i64, decode_u64, encode_i64, encode_u64, encode_u64_into, encoded_len, read_u64, read_u64_opt,
        write_u64, zigzag_decode, zigzag_encode, ReadVarintError, VarintError, MAX_VARINT_LEN,
    };

    fn enc(v: u64) -> Vec<u8> {
        let (buf, n) = encode_u64(v);
        buf[..n].to_vec()
    }

    #[test]
    fn known_encodings() {
        assert_eq!(enc(0), vec![0x00]);
        assert_eq!(enc(1), vec![0x01]);
        assert_eq!(enc(127), vec![0x7F]);
        assert_eq!(enc(128), vec![0x81, 0x00]);
        assert_eq!(enc(300), vec![0x82, 0x2C]);
        assert_eq!(enc(16_383), vec![0xFF, 0x7F]);
        assert_eq!(enc(16_384), vec![0x81, 0x80, 0x00]);
    }

    #[test]
    fn inline_sentinel_is_two_bytes() {
        // 0x3FFF is the largest two-byte value
        assert_eq!(enc(0x3FFF), vec![0xFF, 0x7F]);
    }

    #[test]
    fn u64_max_uses_max_len() {
        let bytes = enc(u64::MAX);
        assert_eq!(bytes.len(), MAX_VARINT_LEN);
        assert_eq!(bytes[0], 0x81);
        assert_eq!(decode_u64(&bytes).unwrap(), (u64::MAX, MAX_VARINT_LEN));
    }

    #[test]
    fn encoded_len_matches_output() {
        for v in [0, 1, 127, 128, 16_383, 16_384, 1 << 35, u64::MAX] {
            assert_eq!(encoded_len(v), enc(v).len(), "value {v}");
        }
    }

    #[test]
    fn decode_reports_consumed_bytes() {
        let (v, n) = decode_u64(&[0x81, 0x00, 0xAA, 0xBB]).unwrap();
        assert_eq!((v, n), (128, 2));
    }

    #[test]
    fn non_minimal_is_rejected() {
        assert_eq!(decode_u64(&[0x80, 0x01]), Err(VarintError::NonMinimal));
    }

    #[test]
    fn truncated_is_rejected() {
        assert_eq!(decode_u64(&[0x81]), Err(VarintError::Truncated { read: 1 }));
        assert_eq!(decode_u64(&[]), Err(VarintError::Truncated { read: 0 }));
    }

    #[test]
    fn overflow_is_rejected() {
        assert_eq!(decode_u64(&[0xFF; 11]), Err(VarintError::Overflow));
        // 2^64 needs an eleventh group
        let mut too_big = vec![0x82];
        too_big.extend_from_slice(&[0x80; 8]);
        too_big.push(0x00);
        assert_eq!(decode_u64(&too_big), Err(VarintError::Overflow));
    }

    #[test]
    fn stream_clean_eof_is_none() {
        let mut empty = Cursor::new(Vec::<u8>::new());
        assert!(read_u64_opt(&mut empty).unwrap().is_none());
    }

    #[test]
    fn stream_eof_mid_value_is_error() {
        let mut cut = Cursor::new(vec![0x81u8]);
        match read_u64(&mut cut) {
            Err(ReadVarintError::Varint(VarintError::Truncated { .. })) | Err(ReadVarintError::Io(_)) => {}
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[test]
    fn stream_write_then_read() {
        let mut buf = Vec::new();
        let n = write_u64(&mut buf, 1_000_000).unwrap();
        assert_eq!(n, buf.len());
        let (v, used) = read_u64(&mut Cursor::new(buf)).unwrap();
        assert_eq!((v, used), (1_000_000, n));
    }

    #[test]
    fn zigzag_mapping() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_encode(i64::MAX), u64::MAX - 1);
        assert_eq!(zigzag_encode(i64::MIN), u64::MAX);
        assert_eq!(zigzag_decode(u64::MAX), i64::MIN);
    }

    #[test]
    fn small_negative_stays_short() {
        let (_, n) = encode_i64(-64);
        assert_eq!(n, 1);
    }

    #[test]
    fn encode_into_appends() {
        let mut out = vec![0xEE];
        encode_u64_into(128, &mut out);
        assert_eq!(out, vec![0xEE, 0x81, 0x00]);
    }

    proptest! {
        #[test]
        fn u64_round_trip(v in any::<u64>()) {
            let bytes = enc(v);
            prop_assert_eq!(decode_u64(&bytes).unwrap(), (v, bytes.len()));
        }

        #[test]
        fn i64_round_trip(v in any::<i64>()) {
            let (buf, n) = encode_i64(v);
            prop_assert_eq!(decode_i64(&buf[..n]).unwrap(), (v, n));
        }

        #[test]
        fn encoding_is_minimal(v in any::<u64>()) {
            let bytes = enc(v);
            prop_assert!(bytes[0] != 0x80);
            prop_assert_eq!(bytes.last().map(|b| b & 0x80), Some(0));
        }
    }
}
