//! Guild cache layer on top of the VFS.
//!
//! Everything here is a cache of durable state held by the external config
//! store. Entries have no TTL; they are removed only by an explicit
//! [`CacheDirective`] sweep or because they failed to decode.
//!
//! # Layout
//!
//! ```text
//! <guild>/caches/<schema>.v<version>   encoded GuildConfig (Bytes)
//! <guild>/regex/<kind>                 validated regex sources (List)
//! <guild>/antispam/<detector>.asam     abuse window records (Bytes)
//! <guild>/files/<message>/<record>/    stashed attachment keys
//! ```
//!
//! # Example
//!
//! ```ignore
//! let config = load_guild_config(&mut vfs, guild_id, &MESSAGE_CONFIG, &store, &options).await?;
//! let prefix = config.scalar("prefix");
//!
//! // After a command that changed the guild's settings:
//! sweep(&mut vfs, guild_id, &CacheDirective::Regenerate)?;
//! ```

pub mod codec;
pub mod directive;
pub mod guild_config;
pub mod guild_path;
pub mod regex;
pub mod schema;

pub use directive::{sweep, CacheDirective, CacheTarget, SweepReport, TargetKind};
pub use guild_config::{
    fetch_from_store, load_guild_config, parse_json_list, read_cached, CacheOptions, FieldValue,
    GuildConfig,
};
pub use guild_path::GuildPath;
pub use regex::{load_regex_patterns, RegexKind};
pub use schema::{
    ConfigSchema, EmbedColor, FieldKind, FieldSpec, ALL_SCHEMAS, EMBED_COLORS, JOIN_NOTIFIER,
    MESSAGE_CONFIG,
};
