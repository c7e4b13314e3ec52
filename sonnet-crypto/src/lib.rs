//! Sonnet Crypto - SONNETAES Attachment Codec
//!
//! Authenticated streaming encryption for attachments at rest:
//!
//! ```text
//! magic "SONNETAES\x01" (10B) | HMAC-SHA512 (64B) | (u16 LE len, ciphertext)* | 0u16
//! ```
//!
//! AES-256-CTR provides confidentiality; HMAC-SHA512 over the ciphertext
//! records, keyed with the AES key, provides integrity. Readers verify the
//! whole file before releasing a single byte.
//!
//! Key material lives only in the VFS stash ([`stash`]). Discarding a record
//! makes its ciphertext unrecoverable.

pub mod key;
pub mod reader;
pub mod stash;
pub mod writer;

pub use key::{AttachmentKey, IV_LEN, KEY_LEN, KEY_MATERIAL_LEN};
pub use reader::EncryptedReader;
pub use stash::{discard, discard_records, record_id, recover, stash, AttachmentRecord};
pub use writer::EncryptedWriter;

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use sonnet_core::CryptoResult;

/// File magic: `SONNETAES` followed by the format version.
pub const MAGIC: &[u8; 10] = b"SONNETAES\x01";
/// HMAC-SHA512 tag length.
pub const HMAC_LEN: usize = 64;
/// Magic plus HMAC slot.
pub const HEADER_LEN: usize = MAGIC.len() + HMAC_LEN;
/// Largest ciphertext record.
pub const MAX_RECORD_LEN: usize = u16::MAX as usize;

// ============================================================================
// FILE HELPERS
// ============================================================================

/// Create (truncating) `path` and return a writer over it.
pub fn open_writer(path: impl AsRef<Path>, key: &AttachmentKey) -> CryptoResult<EncryptedWriter<File>> {
    let file = File::create(path)?;
    EncryptedWriter::new(file, key)
}

/// Open and verify `path`.
pub fn open_reader(path: impl AsRef<Path>, key: &AttachmentKey) -> CryptoResult<EncryptedReader<File>> {
    let file = File::open(path)?;
    EncryptedReader::new(file, key)
}

/// Encrypt `plaintext` into a new file at `path`.
pub fn encrypt_to_file(path: impl AsRef<Path>, key: &AttachmentKey, plaintext: &[u8]) -> CryptoResult<()> {
    let mut writer = open_writer(path, key)?;
    writer.write_all(plaintext)?;
    writer.finish()?;
    Ok(())
}

/// Verify and fully decrypt the file at `path`.
pub fn decrypt_file(path: impl AsRef<Path>, key: &AttachmentKey) -> CryptoResult<Vec<u8>> {
    let mut reader = open_reader(path, key)?;
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    Ok(out)
}
