//! Per-attachment key material.

use std::fmt;

use ctr::cipher::KeyIvInit;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use sonnet_core::{CryptoError, CryptoResult};

/// AES-256 with a 128-bit big-endian counter block seeded by the IV.
pub(crate) type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;
/// HMAC-SHA512 keyed with the AES key.
pub(crate) type HmacSha512 = Hmac<Sha512>;

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;
/// Serialized length: key followed by IV.
pub const KEY_MATERIAL_LEN: usize = KEY_LEN + IV_LEN;

/// A 256-bit key and 128-bit IV for one attachment.
#[derive(Clone, PartialEq, Eq)]
pub struct AttachmentKey {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl AttachmentKey {
    /// Fresh random key material.
    pub fn generate() -> Self {
        Self {
            key: rand::random(),
            iv: rand::random(),
        }
    }

    pub fn new(key: [u8; KEY_LEN], iv: [u8; IV_LEN]) -> Self {
        Self { key, iv }
    }

    /// Parse `key ∥ iv` as stored in the stash.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_MATERIAL_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_MATERIAL_LEN,
                got: bytes.len(),
            });
        }
        let mut key = [0u8; KEY_LEN];
        let mut iv = [0u8; IV_LEN];
        key.copy_from_slice(&bytes[..KEY_LEN]);
        iv.copy_from_slice(&bytes[KEY_LEN..]);
        Ok(Self { key, iv })
    }

    pub fn to_bytes(&self) -> [u8; KEY_MATERIAL_LEN] {
        let mut out = [0u8; KEY_MATERIAL_LEN];
        out[..KEY_LEN].copy_from_slice(&self.key);
        out[KEY_LEN..].copy_from_slice(&self.iv);
        out
    }

    pub fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    pub(crate) fn cipher(&self) -> CryptoResult<Aes256Ctr> {
        Aes256Ctr::new_from_slices(&self.key, &self.iv).map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            got: self.key.len(),
        })
    }

    pub(crate) fn mac(&self) -> CryptoResult<HmacSha512> {
        <HmacSha512 as Mac>::new_from_slice(&self.key).map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            got: self.key.len(),
        })
    }
}

impl fmt::Debug for AttachmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentKey").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_random() {
        assert_ne!(AttachmentKey::generate(), AttachmentKey::generate());
    }

    #[test]
    fn test_bytes_roundtrip() {
        let key = AttachmentKey::new([1; KEY_LEN], [2; IV_LEN]);
        let bytes = key.to_bytes();
        assert_eq!(&bytes[..KEY_LEN], &[1; KEY_LEN]);
        assert_eq!(AttachmentKey::from_bytes(&bytes).unwrap(), key);
    }

    #[test]
    fn test_from_bytes_wrong_length() {
        assert!(matches!(
            AttachmentKey::from_bytes(&[0; 32]),
            Err(CryptoError::InvalidKeyLength { expected: 48, got: 32 })
        ));
    }

    #[test]
    fn test_debug_hides_material() {
        let key = AttachmentKey::new([0xAB; KEY_LEN], [0xCD; IV_LEN]);
        let shown = format!("{:?}", key);
        assert!(!shown.contains("171"));
        assert!(!shown.to_lowercase().contains("ab"));
    }
}
