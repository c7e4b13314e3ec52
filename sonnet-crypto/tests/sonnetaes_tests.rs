//! End-to-end tests for the SONNETAES writer and reader.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use proptest::prelude::*;
use sonnet_core::CryptoResult;
use sonnet_crypto::{
    decrypt_file, encrypt_to_file, open_reader, AttachmentKey, EncryptedReader, EncryptedWriter,
    HEADER_LEN, HMAC_LEN, IV_LEN, KEY_LEN, MAGIC, MAX_RECORD_LEN,
};
use sonnet_test_utils::assertions::{assert_hmac_invalid, assert_not_sonnet_aes};
use sonnet_test_utils::fixtures::{payload, test_key};
use sonnet_test_utils::generators::arb_attachment_key;
use sonnet_test_utils::CryptoError;

// ============================================================================
// TEST HELPERS
// ============================================================================

fn encrypt(plaintext: &[u8], key: &AttachmentKey) -> Vec<u8> {
    let mut writer = EncryptedWriter::new(Cursor::new(Vec::new()), key).unwrap();
    writer.write_all(plaintext).unwrap();
    writer.finish().unwrap().into_inner()
}

fn decrypt(blob: Vec<u8>, key: &AttachmentKey) -> CryptoResult<Vec<u8>> {
    let mut reader = EncryptedReader::new(Cursor::new(blob), key)?;
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    Ok(out)
}

// ============================================================================
// ROUND TRIP
// ============================================================================

#[test]
fn test_roundtrip_boundary_sizes() {
    let key = test_key();
    for len in [0, 1, 65535, 65536 * 3 + 7] {
        let plaintext = payload(len);
        let blob = encrypt(&plaintext, &key);
        assert_eq!(decrypt(blob, &key).unwrap(), plaintext, "size {}", len);
    }
}

#[test]
fn test_layout() {
    let key = test_key();
    let blob = encrypt(&payload(70_000), &key);

    assert_eq!(&blob[..10], MAGIC);
    assert_ne!(&blob[10..HEADER_LEN], &[0u8; HMAC_LEN][..]);

    let first = u16::from_le_bytes([blob[HEADER_LEN], blob[HEADER_LEN + 1]]) as usize;
    assert_eq!(first, MAX_RECORD_LEN);
    let second_at = HEADER_LEN + 2 + first;
    let second = u16::from_le_bytes([blob[second_at], blob[second_at + 1]]) as usize;
    assert_eq!(second, 70_000 - MAX_RECORD_LEN);
    assert_eq!(&blob[blob.len() - 2..], &[0, 0]);
    assert_eq!(blob.len(), HEADER_LEN + 2 + first + 2 + second + 2);
}

#[test]
fn test_ciphertext_differs_from_plaintext() {
    let plaintext = payload(512);
    let blob = encrypt(&plaintext, &test_key());
    assert_ne!(&blob[HEADER_LEN + 2..HEADER_LEN + 2 + 512], &plaintext[..]);
}

#[test]
fn test_many_small_writes() {
    let key = test_key();
    let mut writer = EncryptedWriter::new(Cursor::new(Vec::new()), &key).unwrap();
    let mut expected = Vec::new();
    for i in 0..100u8 {
        let piece = vec![i; i as usize];
        writer.write_all(&piece).unwrap();
        expected.extend_from_slice(&piece);
    }
    let blob = writer.finish().unwrap().into_inner();
    assert_eq!(decrypt(blob, &key).unwrap(), expected);
}

#[test]
fn test_accepts_missing_terminator() {
    let key = test_key();
    let mut blob = encrypt(b"hello", &key);
    blob.truncate(blob.len() - 2);
    assert_eq!(decrypt(blob, &key).unwrap(), b"hello");
}

#[test]
fn test_dropped_writer_is_finalized() {
    let key = test_key();
    let mut sink = Cursor::new(Vec::new());
    {
        let mut writer = EncryptedWriter::new(&mut sink, &key).unwrap();
        writer.write_all(b"dropped").unwrap();
    }
    assert_eq!(decrypt(sink.into_inner(), &key).unwrap(), b"dropped");
}

// ============================================================================
// INTEGRITY
// ============================================================================

#[test]
fn test_bad_magic() {
    let key = test_key();
    let mut blob = encrypt(b"data", &key);
    blob[0] = b'X';
    assert_not_sonnet_aes(&decrypt(blob, &key));
}

#[test]
fn test_short_header() {
    let key = test_key();
    let blob = encrypt(b"data", &key)[..HEADER_LEN - 1].to_vec();
    assert_not_sonnet_aes(&decrypt(blob, &key));
}

#[test]
fn test_wrong_key() {
    let blob = encrypt(b"secret", &test_key());
    let other = AttachmentKey::new([0x43; KEY_LEN], [0x24; IV_LEN]);
    assert_hmac_invalid(&decrypt(blob, &other));
}

#[test]
fn test_trailing_bytes_after_terminator() {
    let key = test_key();
    let mut blob = encrypt(b"data", &key);
    blob.push(0);
    assert_hmac_invalid(&decrypt(blob, &key));
}

#[test]
fn test_truncated_record() {
    let key = test_key();
    let mut blob = encrypt(b"data", &key);
    blob.truncate(blob.len() - 3);
    assert_hmac_invalid(&decrypt(blob, &key));
}

#[test]
fn test_dangling_length_byte() {
    let key = test_key();
    let mut blob = encrypt(b"data", &key);
    blob.truncate(blob.len() - 2);
    blob.push(4);
    assert_hmac_invalid(&decrypt(blob, &key));
}

// ============================================================================
// READER ACCESS
// ============================================================================

#[test]
fn test_peek_and_exact_reads() {
    let key = test_key();
    let plaintext = payload(100_000);
    let blob = encrypt(&plaintext, &key);
    let mut reader = EncryptedReader::new(Cursor::new(blob), &key).unwrap();

    assert_eq!(reader.peek(10).unwrap(), &plaintext[..10]);
    assert_eq!(reader.read_exact_size(10).unwrap(), &plaintext[..10]);
    assert_eq!(reader.read_exact_size(70_000).unwrap(), &plaintext[10..70_010]);
    assert_eq!(reader.read_exact_size(50_000).unwrap(), &plaintext[70_010..]);
    assert!(reader.read_exact_size(1).unwrap().is_empty());
}

#[test]
fn test_seek_into_plaintext() {
    let key = test_key();
    let plaintext = payload(200_000);
    let blob = encrypt(&plaintext, &key);
    let mut reader = EncryptedReader::new(Cursor::new(blob), &key).unwrap();

    reader.seek(SeekFrom::Start(150_000)).unwrap();
    assert_eq!(reader.read_exact_size(4).unwrap(), &plaintext[150_000..150_004]);
    assert!(reader.decrypted_len() >= 150_004);

    reader.seek(SeekFrom::Start(5)).unwrap();
    assert_eq!(reader.read_exact_size(3).unwrap(), &plaintext[5..8]);

    reader.seek(SeekFrom::Current(-2)).unwrap();
    assert_eq!(reader.read_exact_size(2).unwrap(), &plaintext[6..8]);

    let end = reader.seek(SeekFrom::End(-1)).unwrap();
    assert_eq!(end, 199_999);
    assert_eq!(reader.read_exact_size(8).unwrap(), &plaintext[199_999..]);

    assert!(reader.seek(SeekFrom::Current(-300_000)).is_err());
}

// ============================================================================
// FILE HELPERS
// ============================================================================

#[test]
fn test_file_helpers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("attachment.sonnetaes");
    let key = AttachmentKey::generate();

    encrypt_to_file(&path, &key, b"on disk").unwrap();
    assert_eq!(decrypt_file(&path, &key).unwrap(), b"on disk");

    let mut raw = std::fs::read(&path).unwrap();
    raw[HEADER_LEN + 2] ^= 1;
    std::fs::write(&path, raw).unwrap();
    assert_hmac_invalid(&decrypt_file(&path, &key));
}

#[test]
fn test_open_reader_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = open_reader(dir.path().join("absent"), &test_key()).unwrap_err();
    assert!(matches!(err, CryptoError::Io(_)));
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_roundtrip(
        key in arb_attachment_key(),
        plaintext in prop::collection::vec(any::<u8>(), 0..4096),
    ) {
        let blob = encrypt(&plaintext, &key);
        prop_assert_eq!(decrypt(blob, &key).unwrap(), plaintext);
    }

    /// Any single flipped byte past the magic is detected before any read.
    #[test]
    fn prop_tamper_detected(
        key in arb_attachment_key(),
        plaintext in prop::collection::vec(any::<u8>(), 1..2048),
        position in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let mut blob = encrypt(&plaintext, &key);
        let index = MAGIC.len() + position.index(blob.len() - MAGIC.len());
        blob[index] ^= flip;
        assert_hmac_invalid(&decrypt(blob, &key));
    }

    /// Key material survives the stash encoding.
    #[test]
    fn prop_key_bytes_roundtrip(key in arb_attachment_key()) {
        prop_assert_eq!(AttachmentKey::from_bytes(&key.to_bytes()).unwrap(), key);
    }
}
