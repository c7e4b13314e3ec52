//! Fixed-width abuse window records.
//!
//! # Binary Format
//!
//! All fields little-endian, records packed back to back:
//! - message-rate: `[user_id: u64][timestamp_millis: u64]` (16 bytes)
//! - char-rate: `[user_id: u64][timestamp_millis: u64][char_count: u32]` (20 bytes)
//!
//! A trailing partial record is ignored.

use sonnet_core::{TimestampMillis, UserId};

/// Size of a record without the char count.
pub const BASE_RECORD_LEN: usize = 16;
/// Size of a record with the char count.
pub const CHAR_RECORD_LEN: usize = 20;

/// One observed event in a detector window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowEntry {
    pub user_id: UserId,
    pub timestamp_millis: TimestampMillis,
    pub char_count: u32,
}

/// Decode every complete record in `buf`.
pub fn decode_entries(buf: &[u8], with_chars: bool) -> Vec<WindowEntry> {
    let width = record_len(with_chars);
    buf.chunks_exact(width)
        .map(|chunk| {
            let mut user = [0u8; 8];
            let mut ts = [0u8; 8];
            user.copy_from_slice(&chunk[0..8]);
            ts.copy_from_slice(&chunk[8..16]);
            let char_count = if with_chars {
                let mut chars = [0u8; 4];
                chars.copy_from_slice(&chunk[16..20]);
                u32::from_le_bytes(chars)
            } else {
                0
            };
            WindowEntry {
                user_id: u64::from_le_bytes(user),
                timestamp_millis: u64::from_le_bytes(ts),
                char_count,
            }
        })
        .collect()
}

/// Encode entries into a fresh buffer.
pub fn encode_entries(entries: &[WindowEntry], with_chars: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.len() * record_len(with_chars));
    for entry in entries {
        out.extend_from_slice(&entry.user_id.to_le_bytes());
        out.extend_from_slice(&entry.timestamp_millis.to_le_bytes());
        if with_chars {
            out.extend_from_slice(&entry.char_count.to_le_bytes());
        }
    }
    out
}

pub fn record_len(with_chars: bool) -> usize {
    if with_chars {
        CHAR_RECORD_LEN
    } else {
        BASE_RECORD_LEN
    }
}
