// EC transforms: deflate with CRC-32C trailer, AES-256-CBC chunking, MAC
// verification, key derivation and framing without keys.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use dml_core::constants::{EC_BLOCK_LEN, EC_IV_LEN, EC_MAC_LEN};
    use dml_core::ec::{
        compress_fragment, decode_frame, decompress_fragment, decrypt_fragment, encrypt_fragment,
        encrypt_fragment_with_iv, read_frame, skip_frame, ChecksumStatus, EcError, EcKeys, EcKind,
    };

    const MAX: u64 = 1 << 24;

    fn keys() -> EcKeys {
        EcKeys::derive(b"correct horse battery staple", b"dml-test-salt").unwrap()
    }

    fn other_keys() -> EcKeys {
        EcKeys::derive(b"a different master secret", b"dml-test-salt").unwrap()
    }

    #[test]
    fn compressed_round_trip_with_crc() {
        let plain = b"the same words again and again and again and again".repeat(20);
        let wire = compress_fragment(&plain, EcKind::CompressedCrc, 6).unwrap();
        assert!(wire.len() < plain.len());
        let content = decompress_fragment(&wire, EcKind::CompressedCrc, MAX).unwrap();
        assert_eq!(content.bytes, plain);
        assert_eq!(content.checksum, ChecksumStatus::Verified);
    }

    #[test]
    fn crc_trailer_is_big_endian_crc32c() {
        let plain = b"123456789";
        let wire = compress_fragment(plain, EcKind::CompressedCrc, 6).unwrap();
        // CRC-32C check value for "123456789"
        assert_eq!(&wire[wire.len() - 4..], &[0xE3, 0x06, 0x92, 0x83]);
    }

    #[test]
    fn crc_mismatch_is_reported_with_the_content() {
        let mut wire = compress_fragment(b"payload", EcKind::CompressedCrc, 6).unwrap();
        let last = wire.len() - 1;
        wire[last] ^= 0x01;
        let content = decompress_fragment(&wire, EcKind::CompressedCrc, MAX).unwrap();
        assert!(content.checksum.is_mismatch());
        assert_eq!(content.bytes, b"payload".to_vec());
    }

    #[test]
    fn decompress_refuses_encrypted_kinds() {
        let wire = compress_fragment(b"payload", EcKind::Compressed, 6).unwrap();
        assert_eq!(
            decompress_fragment(&wire, EcKind::Encrypted, MAX).unwrap_err(),
            EcError::UnknownKind { raw: 0x3F42 }
        );
    }

    #[test]
    fn mismatch_is_a_status_when_framing() {
        let mut wire = compress_fragment(b"payload", EcKind::CompressedCrc, 6).unwrap();
        let last = wire.len() - 1;
        wire[last] ^= 0x01;
        let (frame, _) = read_frame(&mut wire.as_slice(), EcKind::CompressedCrc, MAX).unwrap();
        let content = decode_frame(frame.clone(), None, true).unwrap();
        assert!(content.checksum.is_mismatch());
        assert_eq!(content.bytes, b"payload".to_vec());

        let unchecked = decode_frame(frame, None, false).unwrap();
        assert_eq!(unchecked.checksum, ChecksumStatus::Skipped);
    }

    #[test]
    fn frame_consumes_exactly_its_bytes() {
        let mut wire = compress_fragment(b"abc", EcKind::Compressed, 9).unwrap();
        let len = wire.len() as u64;
        wire.extend_from_slice(&[0xAA, 0xBB]);
        let mut input = wire.as_slice();
        let (frame, consumed) = read_frame(&mut input, EcKind::Compressed, MAX).unwrap();
        assert_eq!(consumed, len);
        assert_eq!(input, &[0xAA, 0xBB]);
        let content = decode_frame(frame, None, true).unwrap();
        assert_eq!(content.checksum, ChecksumStatus::Absent);
    }

    #[test]
    fn truncated_deflate_is_rejected() {
        let wire = compress_fragment(&[7u8; 1000], EcKind::CompressedCrc, 6).unwrap();
        let cut = &wire[..wire.len() / 2];
        assert!(matches!(decompress_fragment(cut, EcKind::CompressedCrc, MAX), Err(EcError::TruncatedStream(_))));

        // deflate stream intact, trailer cut short
        let cut = &wire[..wire.len() - 2];
        assert!(matches!(decompress_fragment(cut, EcKind::CompressedCrc, MAX), Err(EcError::TruncatedStream(_))));
    }

    #[test]
    fn inflate_limit_is_enforced() {
        let wire = compress_fragment(&[0u8; 4096], EcKind::Compressed, 6).unwrap();
        assert!(matches!(
            decompress_fragment(&wire, EcKind::Compressed, 100),
            Err(EcError::ContentTooLarge { max: 100 })
        ));
    }

    #[test]
    fn encrypted_auth_round_trip() {
        let plain = b"secret fragment bytes".to_vec();
        let wire = encrypt_fragment(&plain, &keys(), EcKind::EncryptedAuth).unwrap();
        assert_eq!(decrypt_fragment(&wire, &keys(), EcKind::EncryptedAuth).unwrap(), plain);
    }

    #[test]
    fn encrypted_layout() {
        let iv = [3u8; EC_IV_LEN];
        // 20 bytes pad to two blocks
        let wire = encrypt_fragment_with_iv(&[1u8; 20], &keys(), EcKind::EncryptedAuth, iv).unwrap();
        assert_eq!(&wire[..EC_IV_LEN], &iv);
        assert_eq!(wire[EC_IV_LEN], 2);
        let terminator = EC_IV_LEN + 1 + 2 * EC_BLOCK_LEN;
        assert_eq!(wire[terminator], 0);
        assert_eq!(wire.len(), terminator + 1 + EC_MAC_LEN);

        let plain_only = encrypt_fragment_with_iv(&[1u8; 20], &keys(), EcKind::Encrypted, iv).unwrap();
        assert_eq!(plain_only.len(), terminator + 1);
    }

    #[test]
    fn block_aligned_plaintext_gets_a_full_pad_block() {
        let wire = encrypt_fragment_with_iv(&[0u8; 16], &keys(), EcKind::Encrypted, [0u8; EC_IV_LEN]).unwrap();
        assert_eq!(wire[EC_IV_LEN], 2);
        assert_eq!(decrypt_fragment(&wire, &keys(), EcKind::Encrypted).unwrap(), vec![0u8; 16]);
    }

    #[test]
    fn large_plaintext_is_chunked() {
        // 127 blocks fill one chunk; the pad block spills into a second
        let plain = vec![0x5Au8; 127 * EC_BLOCK_LEN];
        let wire = encrypt_fragment_with_iv(&plain, &keys(), EcKind::Encrypted, [1u8; EC_IV_LEN]).unwrap();
        assert_eq!(wire[EC_IV_LEN], 127);
        let second = EC_IV_LEN + 1 + 127 * EC_BLOCK_LEN;
        assert_eq!(wire[second], 1);
        assert_eq!(decrypt_fragment(&wire, &keys(), EcKind::Encrypted).unwrap(), plain);
    }

    #[test]
    fn ciphertext_limit_covers_all_chunks() {
        let plain = vec![0x5Au8; 127 * EC_BLOCK_LEN];
        let wire = encrypt_fragment_with_iv(&plain, &keys(), EcKind::Encrypted, [1u8; EC_IV_LEN]).unwrap();
        // the first chunk fits on its own, the second pushes the total over
        let limit = (127 * EC_BLOCK_LEN) as u64;
        assert!(matches!(
            read_frame(&mut wire.as_slice(), EcKind::Encrypted, limit),
            Err(EcError::ContentTooLarge { max }) if max == limit
        ));
        let (_, consumed) = read_frame(&mut wire.as_slice(), EcKind::Encrypted, limit + EC_BLOCK_LEN as u64).unwrap();
        assert_eq!(consumed, wire.len() as u64);
    }

    #[test]
    fn oversized_chunk_is_rejected() {
        let mut wire = vec![0u8; EC_IV_LEN];
        // varint 128
        wire.extend_from_slice(&[0x81, 0x00]);
        assert!(matches!(
            decrypt_fragment(&wire, &keys(), EcKind::Encrypted),
            Err(EcError::ChunkTooLarge { blocks: 128, .. })
        ));
    }

    #[test]
    fn flipped_ciphertext_bit_fails_authentication() {
        let mut wire = encrypt_fragment(b"do not touch", &keys(), EcKind::EncryptedAuth).unwrap();
        wire[EC_IV_LEN + 1] ^= 0x80;
        assert_eq!(
            decrypt_fragment(&wire, &keys(), EcKind::EncryptedAuth).unwrap_err(),
            EcError::AuthenticationFailed
        );
    }

    #[test]
    fn flipped_iv_bit_fails_authentication() {
        let mut wire = encrypt_fragment(b"do not touch", &keys(), EcKind::EncryptedAuth).unwrap();
        wire[0] ^= 0x01;
        assert_eq!(
            decrypt_fragment(&wire, &keys(), EcKind::EncryptedAuth).unwrap_err(),
            EcError::AuthenticationFailed
        );
    }

    #[test]
    fn wrong_keys_fail_authentication() {
        let wire = encrypt_fragment(b"for one reader", &keys(), EcKind::EncryptedAuth).unwrap();
        assert_eq!(
            decrypt_fragment(&wire, &other_keys(), EcKind::EncryptedAuth).unwrap_err(),
            EcError::AuthenticationFailed
        );
    }

    #[test]
    fn truncated_ciphertext_is_rejected() {
        let wire = encrypt_fragment(&[9u8; 40], &keys(), EcKind::EncryptedAuth).unwrap();
        for cut in [EC_IV_LEN - 1, EC_IV_LEN + 5, wire.len() - 1] {
            assert!(
                matches!(decrypt_fragment(&wire[..cut], &keys(), EcKind::EncryptedAuth), Err(EcError::TruncatedStream(_))),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn decoding_encrypted_frame_needs_keys() {
        let wire = encrypt_fragment(b"locked", &keys(), EcKind::Encrypted).unwrap();
        let (frame, _) = read_frame(&mut wire.as_slice(), EcKind::Encrypted, MAX).unwrap();
        assert_eq!(decode_frame(frame, None, true).unwrap_err(), EcError::MissingKeys);
    }

    #[test]
    fn skip_needs_no_keys() {
        let mut wire = encrypt_fragment(b"opaque", &keys(), EcKind::EncryptedAuth).unwrap();
        let len = wire.len() as u64;
        wire.push(0x42);
        let mut input = wire.as_slice();
        assert_eq!(skip_frame(&mut input, EcKind::EncryptedAuth, MAX).unwrap(), len);
        assert_eq!(input, &[0x42]);
    }

    #[test]
    fn derivation_is_deterministic_and_salt_checked() {
        assert_eq!(keys(), keys());
        assert_ne!(keys(), other_keys());
        assert!(matches!(EcKeys::derive(b"master", &[0u8; 16]), Err(EcError::Kdf(_))));
        assert!(matches!(EcKeys::derive(b"master", &[]), Err(EcError::Kdf(_))));
    }

    #[test]
    fn key_length_is_checked() {
        assert_eq!(
            EcKeys::from_slices(&[0u8; 16], &[0u8; 32]).unwrap_err(),
            EcError::InvalidKeyLength { have: 16, need: 32 }
        );
    }

    #[test]
    fn kinds_map_to_reserved_ids() {
        assert_eq!(EcKind::verify(0x3F43).unwrap(), EcKind::EncryptedAuth);
        assert!(matches!(EcKind::verify(0x3F44), Err(EcError::UnknownKind { raw: 0x3F44 })));
        assert_eq!(EcKind::from_label("DML:Compressed-CRC"), Some(EcKind::CompressedCrc));
        assert!(EcKind::CompressedCrc.has_trailer() && !EcKind::Encrypted.has_trailer());
    }

    proptest! {
        #[test]
        fn compress_round_trip(plain in proptest::collection::vec(any::<u8>(), 0..2048), crc in any::<bool>()) {
            let kind = if crc { EcKind::CompressedCrc } else { EcKind::Compressed };
            let wire = compress_fragment(&plain, kind, 6).unwrap();
            prop_assert_eq!(decompress_fragment(&wire, kind, MAX).unwrap().bytes, plain);
        }

        #[test]
        fn encrypt_round_trip(plain in proptest::collection::vec(any::<u8>(), 0..600)) {
            let wire = encrypt_fragment(&plain, &keys(), EcKind::EncryptedAuth).unwrap();
            prop_assert_eq!(decrypt_fragment(&wire, &keys(), EcKind::EncryptedAuth).unwrap(), plain);
        }
    }
}
