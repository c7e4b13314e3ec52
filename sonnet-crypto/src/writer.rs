//! SONNETAES streaming writer.

use std::io::{self, Seek, SeekFrom, Write};

use ctr::cipher::StreamCipher;
use hmac::Mac;
use sonnet_core::CryptoResult;

use crate::key::{Aes256Ctr, AttachmentKey, HmacSha512};
use crate::{HMAC_LEN, MAGIC, MAX_RECORD_LEN};

/// Encrypts everything written to it into a SONNETAES stream.
///
/// The HMAC slot is patched in by [`finish`](Self::finish). A writer dropped
/// without `finish` is finalized on a best-effort basis; errors are logged.
pub struct EncryptedWriter<W: Write + Seek> {
    inner: Option<W>,
    cipher: Aes256Ctr,
    mac: HmacSha512,
    /// Stream offset of the magic tag.
    start: u64,
    buf: Vec<u8>,
    finalized: bool,
}

impl<W: Write + Seek> EncryptedWriter<W> {
    /// Write the header and return a writer positioned at the first record.
    pub fn new(mut inner: W, key: &AttachmentKey) -> CryptoResult<Self> {
        let start = inner.stream_position()?;
        inner.write_all(MAGIC)?;
        inner.write_all(&[0u8; HMAC_LEN])?;

        Ok(Self {
            inner: Some(inner),
            cipher: key.cipher()?,
            mac: key.mac()?,
            start,
            buf: Vec::new(),
            finalized: false,
        })
    }

    /// Write the terminator, patch the HMAC and hand back the sink.
    pub fn finish(mut self) -> CryptoResult<W> {
        self.finalize()?;
        self.inner
            .take()
            .ok_or_else(|| io::Error::other("SONNETAES writer already finished").into())
    }

    fn write_record(&mut self, plaintext: &[u8]) -> io::Result<()> {
        if self.finalized {
            return Err(io::Error::other("SONNETAES writer already finished"));
        }
        let inner = self
            .inner
            .as_mut()
            .ok_or_else(|| io::Error::other("SONNETAES writer already finished"))?;

        self.buf.clear();
        self.buf.extend_from_slice(plaintext);
        self.cipher.apply_keystream(&mut self.buf);

        // MAX_RECORD_LEN fits a u16 by construction.
        let len = self.buf.len() as u16;
        inner.write_all(&len.to_le_bytes())?;
        inner.write_all(&self.buf)?;
        self.mac.update(&self.buf);
        Ok(())
    }

    fn finalize(&mut self) -> io::Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        let Some(inner) = self.inner.as_mut() else {
            return Ok(());
        };

        inner.write_all(&0u16.to_le_bytes())?;
        let tag = self.mac.finalize_reset().into_bytes();

        let end = inner.stream_position()?;
        inner.seek(SeekFrom::Start(self.start + MAGIC.len() as u64))?;
        inner.write_all(&tag)?;
        inner.seek(SeekFrom::Start(end))?;
        inner.flush()
    }
}

impl<W: Write + Seek> Write for EncryptedWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        for chunk in data.chunks(MAX_RECORD_LEN) {
            self.write_record(chunk)?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.as_mut() {
            Some(inner) => inner.flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write + Seek> Drop for EncryptedWriter<W> {
    fn drop(&mut self) {
        if !self.finalized {
            if let Err(e) = self.finalize() {
                tracing::warn!(error = %e, "Failed to finalize dropped SONNETAES writer");
            }
        }
    }
}
