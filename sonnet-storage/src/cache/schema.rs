//! Fixed guild configuration schemas.
//!
//! A schema is the ordered field list shared by the encoder and the decoder.
//! The wire format is positional, so field order is part of the format: any
//! reorder, insertion or kind change requires bumping `version`, which moves
//! the cache file to a new name.

use serde::Serialize;
use sonnet_core::GuildId;

use super::guild_config::FieldValue;
use super::guild_path::GuildPath;

/// How a field's value is typed and encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FieldKind {
    /// A single string.
    Scalar,
    /// A list joined with `,` on the wire. Items never contain commas.
    CsvList,
    /// A list of arbitrary strings, each individually length-prefixed.
    StringList,
}

/// One schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Default applied when the database has no value. List defaults are
    /// comma-separated.
    pub default: &'static str,
}

impl FieldSpec {
    pub const fn scalar(name: &'static str, default: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Scalar,
            default,
        }
    }

    pub const fn csv(name: &'static str, default: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::CsvList,
            default,
        }
    }

    pub const fn string_list(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::StringList,
            default: "",
        }
    }

    /// The default as a typed value.
    pub fn default_value(&self) -> FieldValue {
        match self.kind {
            FieldKind::Scalar => FieldValue::Scalar(self.default.to_string()),
            FieldKind::CsvList | FieldKind::StringList => FieldValue::List(
                self.default
                    .split(',')
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
        }
    }
}

/// A named, versioned, ordered field list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfigSchema {
    pub name: &'static str,
    pub version: u16,
    pub fields: &'static [FieldSpec],
}

impl ConfigSchema {
    /// File name of this schema's cache entry, e.g. `sonnet_default.v1`.
    pub fn cache_file_name(&self) -> String {
        format!("{}.v{}", self.name, self.version)
    }

    /// VFS path of a guild's cache entry for this schema.
    pub fn cache_path(&self, guild_id: GuildId) -> GuildPath {
        GuildPath::caches(guild_id).join(&self.cache_file_name())
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Default command prefix.
pub const GLOBAL_PREFIX: &str = "!";
/// Default action taken on blacklist hits.
pub const BLACKLIST_ACTION: &str = "warn";

/// Message handling and automod configuration.
pub const MESSAGE_CONFIG: ConfigSchema = ConfigSchema {
    name: "sonnet_default",
    version: 1,
    fields: &[
        FieldSpec::csv("word-blacklist", ""),
        FieldSpec::csv("filetype-blacklist", ""),
        FieldSpec::csv("word-in-word-blacklist", ""),
        FieldSpec::csv("url-blacklist", ""),
        FieldSpec::csv("antispam", "2,0"),
        FieldSpec::csv("char-antispam", "2,0,500"),
        FieldSpec::scalar("prefix", GLOBAL_PREFIX),
        FieldSpec::scalar("blacklist-action", BLACKLIST_ACTION),
        FieldSpec::scalar("antispam-action", "mute"),
        FieldSpec::scalar("blacklist-whitelist", ""),
        FieldSpec::scalar("regex-notifier-log", ""),
        FieldSpec::scalar("admin-role", ""),
        FieldSpec::scalar("moderator-role", ""),
        FieldSpec::scalar("antispam-time", "20"),
        FieldSpec::scalar("moderator-protect", "0"),
    ],
};

/// Per-guild embed colours, stored as `0xRRGGBB` strings.
pub const EMBED_COLORS: ConfigSchema = ConfigSchema {
    name: "sonnet_colortypes",
    version: 1,
    fields: &[
        FieldSpec::scalar("embed-color-primary", "0x0057e7"),
        FieldSpec::scalar("embed-color-creation", "0x008744"),
        FieldSpec::scalar("embed-color-edit", "0xffa700"),
        FieldSpec::scalar("embed-color-deletion", "0xd62d20"),
    ],
};

/// Member-join notifier configuration.
pub const JOIN_NOTIFIER: ConfigSchema = ConfigSchema {
    name: "sonnet_join_notifier",
    version: 1,
    fields: &[
        FieldSpec::scalar("notifier-log-timestamp", "0"),
        FieldSpec::scalar("notifier-log-defaultpfp", "0"),
        FieldSpec::scalar("regex-notifier-log", ""),
        FieldSpec::string_list("notifier-log-users"),
    ],
};

/// Every schema the cache knows about.
pub const ALL_SCHEMAS: &[ConfigSchema] = &[MESSAGE_CONFIG, EMBED_COLORS, JOIN_NOTIFIER];

/// Embed colour slots in [`EMBED_COLORS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EmbedColor {
    Primary,
    Creation,
    Edit,
    Deletion,
}

impl EmbedColor {
    pub fn field_name(&self) -> &'static str {
        match self {
            EmbedColor::Primary => "embed-color-primary",
            EmbedColor::Creation => "embed-color-creation",
            EmbedColor::Edit => "embed-color-edit",
            EmbedColor::Deletion => "embed-color-deletion",
        }
    }
}
