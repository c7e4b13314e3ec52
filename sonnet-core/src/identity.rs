//! Identity types for Sonnet guilds, users and messages

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Discord guild snowflake. The unit of cache and rate-limit partitioning.
pub type GuildId = u64;

/// Discord user snowflake.
pub type UserId = u64;

/// Discord message snowflake.
pub type MessageId = u64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Milliseconds since the Unix epoch, as stored in abuse-window records.
pub type TimestampMillis = u64;

/// SHA-256 content hash.
pub type ContentHash = [u8; 32];

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> TimestampMillis {
    timestamp_millis(Utc::now())
}

/// Convert a UTC timestamp to epoch milliseconds.
///
/// Timestamps before the epoch clamp to zero; chat events never predate it.
pub fn timestamp_millis(ts: Timestamp) -> TimestampMillis {
    u64::try_from(ts.timestamp_millis()).unwrap_or(0)
}

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Lowercase hex of the last 16 bytes of a SHA-256 digest.
///
/// Used to name VFS nodes after arbitrary user input: the output is always 32
/// hex characters and can never contain a path separator.
pub fn short_hash_hex(content: &[u8]) -> String {
    let hash = compute_content_hash(content);
    hex::encode(&hash[16..])
}
