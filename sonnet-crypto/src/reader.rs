//! SONNETAES verifying reader.
//!
//! Construction authenticates the whole ciphertext before any plaintext is
//! released. Reads then decrypt records lazily into a cache of every byte
//! decrypted so far: CTR keystream position follows the record sequence, so
//! a seek to offset `n` costs O(n) memory. `SeekFrom::End` decrypts the whole
//! stream.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

use ctr::cipher::StreamCipher;
use hmac::Mac;
use sonnet_core::{CryptoError, CryptoResult};

use crate::key::{Aes256Ctr, AttachmentKey, HmacSha512};
use crate::{HEADER_LEN, MAGIC, MAX_RECORD_LEN};

/// Next item in the record sequence.
enum Record {
    /// Clean end of file.
    Eof,
    /// Zero-length terminator.
    Terminator,
    /// A record of this many ciphertext bytes follows.
    Len(usize),
    /// A single dangling length byte.
    Dangling,
}

/// Decrypting reader over a verified SONNETAES stream.
pub struct EncryptedReader<R: Read + Seek> {
    inner: R,
    cipher: Aes256Ctr,
    cache: Vec<u8>,
    pointer: u64,
    exhausted: bool,
}

impl<R: Read + Seek> fmt::Debug for EncryptedReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedReader").finish_non_exhaustive()
    }
}

impl<R: Read + Seek> EncryptedReader<R> {
    /// Verify the header and HMAC, then position at the first record.
    ///
    /// Fails `NotSonnetAes` on a short header or bad magic and `HmacInvalid`
    /// on any authentication or structural failure of the body.
    pub fn new(mut inner: R, key: &AttachmentKey) -> CryptoResult<Self> {
        let start = inner.stream_position()?;

        let mut header = [0u8; HEADER_LEN];
        if read_full(&mut inner, &mut header)? < HEADER_LEN || &header[..MAGIC.len()] != MAGIC {
            return Err(CryptoError::NotSonnetAes);
        }

        let mut mac = key.mac()?;
        verify_body(&mut inner, &mut mac)?;
        mac.verify_slice(&header[MAGIC.len()..])
            .map_err(|_| CryptoError::HmacInvalid)?;

        inner.seek(SeekFrom::Start(start + HEADER_LEN as u64))?;

        Ok(Self {
            inner,
            cipher: key.cipher()?,
            cache: Vec::new(),
            pointer: 0,
            exhausted: false,
        })
    }

    /// Bytes from the current position without advancing it.
    pub fn peek(&mut self, size: usize) -> io::Result<Vec<u8>> {
        let start = self.position();
        self.fill_to(start.saturating_add(size))?;
        Ok(self.slice_from(start, size).to_vec())
    }

    /// Up to `size` bytes from the current position; fewer only at end of stream.
    pub fn read_exact_size(&mut self, size: usize) -> io::Result<Vec<u8>> {
        let out = self.peek(size)?;
        self.pointer += out.len() as u64;
        Ok(out)
    }

    /// Total plaintext decrypted so far.
    pub fn decrypted_len(&self) -> usize {
        self.cache.len()
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn position(&self) -> usize {
        usize::try_from(self.pointer).unwrap_or(usize::MAX)
    }

    fn slice_from(&self, start: usize, size: usize) -> &[u8] {
        if start >= self.cache.len() {
            return &[];
        }
        let end = start.saturating_add(size).min(self.cache.len());
        &self.cache[start..end]
    }

    /// Decrypt records until the cache holds `target` bytes or the stream ends.
    fn fill_to(&mut self, target: usize) -> io::Result<()> {
        let mut chunk = Vec::new();
        while self.cache.len() < target && !self.exhausted {
            match next_record(&mut self.inner)? {
                Record::Len(len) => {
                    chunk.resize(len, 0);
                    if read_full(&mut self.inner, &mut chunk)? < len {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "SONNETAES record truncated after verification",
                        ));
                    }
                    self.cipher.apply_keystream(&mut chunk);
                    self.cache.extend_from_slice(&chunk);
                }
                Record::Eof | Record::Terminator | Record::Dangling => self.exhausted = true,
            }
        }
        Ok(())
    }
}

impl<R: Read + Seek> Read for EncryptedReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let start = self.position();
        self.fill_to(start.saturating_add(out.len()))?;
        let available = self.slice_from(start, out.len());
        let n = available.len();
        out[..n].copy_from_slice(available);
        self.pointer += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for EncryptedReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.pointer.checked_add_signed(delta),
            SeekFrom::End(delta) => {
                self.fill_to(usize::MAX)?;
                (self.cache.len() as u64).checked_add_signed(delta)
            }
        };
        match target {
            Some(pointer) => {
                self.pointer = pointer;
                Ok(pointer)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}

/// Feed every record's ciphertext to `mac`, rejecting malformed structure.
fn verify_body<R: Read>(inner: &mut R, mac: &mut HmacSha512) -> CryptoResult<()> {
    let mut chunk = vec![0u8; MAX_RECORD_LEN];
    loop {
        match next_record(inner)? {
            Record::Eof => return Ok(()),
            Record::Terminator => {
                // Nothing may follow the terminator.
                let mut extra = [0u8; 1];
                if read_full(inner, &mut extra)? != 0 {
                    return Err(CryptoError::HmacInvalid);
                }
                return Ok(());
            }
            Record::Dangling => return Err(CryptoError::HmacInvalid),
            Record::Len(len) => {
                if read_full(inner, &mut chunk[..len])? < len {
                    return Err(CryptoError::HmacInvalid);
                }
                mac.update(&chunk[..len]);
            }
        }
    }
}

fn next_record<R: Read>(inner: &mut R) -> io::Result<Record> {
    let mut len = [0u8; 2];
    Ok(match read_full(inner, &mut len)? {
        0 => Record::Eof,
        1 => Record::Dangling,
        _ => match u16::from_le_bytes(len) {
            0 => Record::Terminator,
            n => Record::Len(n as usize),
        },
    })
}

/// Read until `buf` is full or EOF; returns the byte count read.
fn read_full<R: Read>(inner: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match inner.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
