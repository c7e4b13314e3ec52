//! Fuzz test for the SONNETAES reader
//!
//! The reader must reject any blob that was not produced with the key,
//! without panicking, and must never release plaintext from a blob that
//! fails verification.
//!
//! Run with: cargo +nightly fuzz run sonnetaes_reader_fuzz -- -max_total_time=60

#![no_main]

use std::io::{Cursor, Read};

use libfuzzer_sys::fuzz_target;
use sonnet_crypto::{AttachmentKey, EncryptedReader, IV_LEN, KEY_LEN, MAGIC};

fuzz_target!(|data: &[u8]| {
    let key = AttachmentKey::new([0x42; KEY_LEN], [0x24; IV_LEN]);

    // Raw input, then the same bytes behind a valid magic.
    let mut framed = MAGIC.to_vec();
    framed.extend_from_slice(data);

    for blob in [data.to_vec(), framed] {
        if let Ok(mut reader) = EncryptedReader::new(Cursor::new(blob), &key) {
            let mut out = Vec::new();
            let _ = reader.read_to_end(&mut out);
        }
    }
});
