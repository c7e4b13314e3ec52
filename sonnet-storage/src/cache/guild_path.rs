//! Guild-scoped VFS paths.
//!
//! Every per-guild cache artifact lives beneath a directory named after the
//! guild id. `GuildPath` can only be built from a guild id, so cache code
//! cannot address another guild's subtree by accident.

use std::fmt;

use sonnet_core::GuildId;

/// Directory holding decoded-config cache files.
pub const CACHES_DIR: &str = "caches";
/// Directory holding compiled regex pattern lists.
pub const REGEX_DIR: &str = "regex";
/// Directory holding abuse-detector buffers.
pub const ANTISPAM_DIR: &str = "antispam";
/// Directory holding stashed attachment key records.
pub const FILES_DIR: &str = "files";
/// Counter file name for event statistics.
pub const STATS_FILE: &str = "stats";
/// Pseudo-guild holding process-wide statistics.
pub const GLOBAL_SCOPE: &str = "global";

/// A VFS path inside one guild's subtree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GuildPath {
    guild_id: GuildId,
    path: String,
}

impl GuildPath {
    /// The guild's root directory.
    pub fn root(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            path: guild_id.to_string(),
        }
    }

    /// A path relative to the guild root. An empty `relative` is the root itself.
    pub fn new(guild_id: GuildId, relative: &str) -> Self {
        if relative.is_empty() {
            return Self::root(guild_id);
        }
        Self {
            guild_id,
            path: format!("{}/{}", guild_id, relative),
        }
    }

    /// Append one or more components.
    pub fn join(&self, relative: &str) -> Self {
        if relative.is_empty() {
            return self.clone();
        }
        Self {
            guild_id: self.guild_id,
            path: format!("{}/{}", self.path, relative),
        }
    }

    pub fn caches(guild_id: GuildId) -> Self {
        Self::new(guild_id, CACHES_DIR)
    }

    pub fn regex(guild_id: GuildId) -> Self {
        Self::new(guild_id, REGEX_DIR)
    }

    pub fn antispam(guild_id: GuildId) -> Self {
        Self::new(guild_id, ANTISPAM_DIR)
    }

    pub fn stats(guild_id: GuildId) -> Self {
        Self::new(guild_id, STATS_FILE)
    }

    /// Directory holding the stashed attachment records of one message.
    pub fn message_files(guild_id: GuildId, message_id: u64) -> Self {
        Self::new(guild_id, &format!("{}/{}", FILES_DIR, message_id))
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for GuildPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl AsRef<str> for GuildPath {
    fn as_ref(&self) -> &str {
        &self.path
    }
}

/// Path of the process-wide statistics counter file.
pub fn global_stats_path() -> String {
    format!("{}/{}", GLOBAL_SCOPE, STATS_FILE)
}
