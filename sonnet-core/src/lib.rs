//! Sonnet Core - Identity Types and Errors
//!
//! Pure data types shared by every crate in the workspace: guild/user/message
//! identifiers, timestamp helpers, content hashing, and the error hierarchy.
//! This crate contains no cache logic.

pub mod error;
pub mod identity;

pub use error::{
    CodecError, ConfigError, CryptoError, CryptoResult, SonnetError, SonnetResult, StoreError,
    ValidationError, VfsError, VfsResult,
};
pub use identity::{
    compute_content_hash, now_millis, short_hash_hex, timestamp_millis, ContentHash,
    GuildId, MessageId, Timestamp, TimestampMillis, UserId,
};
