//! Read-through guild config cache.
//!
//! A hit decodes the guild's cache file. A miss (or a corrupt entry) loads
//! every schema field from the [`GuildConfigStore`], normalises it, applies
//! defaults, writes the encoded record back to the VFS and returns it.
//! There is no TTL: an entry stays valid until a sweep removes it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sonnet_core::{GuildId, SonnetError, SonnetResult, VfsError};

use super::codec;
use super::schema::{ConfigSchema, FieldKind, FieldSpec};
use crate::vfs::{FilePayload, Vfs};
use crate::GuildConfigStore;

// ============================================================================
// VALUES
// ============================================================================

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(s) => Some(s),
            FieldValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            FieldValue::Scalar(_) => None,
        }
    }
}

/// A guild's decoded configuration: field name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    fields: BTreeMap<String, FieldValue>,
}

impl GuildConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every field of `schema` set to its default.
    pub fn with_defaults(schema: &ConfigSchema) -> Self {
        let mut config = Self::new();
        for field in schema.fields {
            config.insert(field.name, field.default_value());
        }
        config
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn scalar(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_scalar)
    }

    pub fn list(&self, name: &str) -> Option<&[String]> {
        self.get(name).and_then(FieldValue::as_list)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ============================================================================
// OPTIONS
// ============================================================================

/// Cache behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheOptions {
    /// Bypass the cache entirely: always rebuild, never write.
    pub stateless: bool,
}

impl CacheOptions {
    pub fn stateless() -> Self {
        Self { stateless: true }
    }

    pub fn with_stateless(mut self, stateless: bool) -> Self {
        self.stateless = stateless;
        self
    }
}

// ============================================================================
// LOADER
// ============================================================================

/// Load a guild's config for `schema`, rebuilding from `store` on a miss.
///
/// Corrupt entries are removed and rebuilt; the caller never sees them.
/// Store failures and unencodable values propagate.
pub async fn load_guild_config<S>(
    vfs: &mut Vfs,
    guild_id: GuildId,
    schema: &ConfigSchema,
    store: &S,
    options: &CacheOptions,
) -> SonnetResult<GuildConfig>
where
    S: GuildConfigStore + ?Sized,
{
    let path = schema.cache_path(guild_id);

    if !options.stateless {
        match read_cached(vfs, schema, path.as_str()) {
            Ok(config) => return Ok(config),
            Err(e) if e.is_not_found() => {
                tracing::debug!(guild_id, schema = schema.name, "Config cache miss");
            }
            Err(e) if e.is_corruption() => {
                tracing::warn!(
                    guild_id,
                    schema = schema.name,
                    error = %e,
                    "Discarding corrupt config cache entry"
                );
                discard_entry(vfs, path.as_str())?;
            }
            Err(e) => return Err(e),
        }
    }

    let config = fetch_from_store(guild_id, schema, store).await?;

    if !options.stateless {
        let blob = codec::encode(schema, &config)?;
        vfs.create_file(path.as_str(), FilePayload::bytes(blob))?;
    }

    Ok(config)
}

/// Decode the cached entry without touching the store.
pub fn read_cached(vfs: &Vfs, schema: &ConfigSchema, path: &str) -> SonnetResult<GuildConfig> {
    let blob = vfs.read_bytes(path)?;
    Ok(codec::decode(schema, blob)?)
}

/// Load and normalise every schema field from the store.
pub async fn fetch_from_store<S>(
    guild_id: GuildId,
    schema: &ConfigSchema,
    store: &S,
) -> SonnetResult<GuildConfig>
where
    S: GuildConfigStore + ?Sized,
{
    let mut config = GuildConfig::new();
    for field in schema.fields {
        let raw = store.get(guild_id, field.name).await?;
        let value = match raw.as_deref().filter(|v| !v.is_empty()) {
            Some(raw) => normalise(guild_id, field, raw),
            None => field.default_value(),
        };
        config.insert(field.name, value);
    }
    Ok(config)
}

fn normalise(guild_id: GuildId, field: &FieldSpec, raw: &str) -> FieldValue {
    match field.kind {
        FieldKind::Scalar => FieldValue::Scalar(raw.to_string()),
        FieldKind::CsvList => {
            let items: Vec<String> = raw
                .to_lowercase()
                .split(',')
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect();
            if items.is_empty() {
                field.default_value()
            } else {
                FieldValue::List(items)
            }
        }
        FieldKind::StringList => match parse_json_list(raw) {
            Some(items) => FieldValue::List(items),
            None => {
                tracing::warn!(
                    guild_id,
                    field = field.name,
                    "Unparseable list value in config store, using default"
                );
                field.default_value()
            }
        },
    }
}

/// Parse a stored JSON list: either `{"blacklist": [...]}` or a bare array.
///
/// String items are taken as-is; numbers and booleans are stringified.
pub fn parse_json_list(raw: &str) -> Option<Vec<String>> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    let array = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("blacklist")? {
            serde_json::Value::Array(items) => items,
            _ => return None,
        },
        _ => return None,
    };

    array
        .into_iter()
        .map(|item| match item {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .collect()
}

/// Remove a cache entry whatever its node kind; absence is fine.
fn discard_entry(vfs: &mut Vfs, path: &str) -> SonnetResult<()> {
    let result = match vfs.remove_file(path) {
        Err(VfsError::TypeMismatch { .. }) => vfs.rmdir(path),
        other => other,
    };
    match result {
        Ok(()) | Err(VfsError::NotFound { .. }) => Ok(()),
        Err(e) => Err(SonnetError::from(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::schema::{EMBED_COLORS, JOIN_NOTIFIER, MESSAGE_CONFIG};
    use crate::vfs::FileKind;
    use crate::MockConfigStore;

    #[tokio::test]
    async fn test_miss_rebuilds_with_defaults() {
        let store = MockConfigStore::new();
        let mut vfs = Vfs::new();

        let config = load_guild_config(&mut vfs, 1, &MESSAGE_CONFIG, &store, &CacheOptions::default())
            .await
            .unwrap();

        assert_eq!(config, GuildConfig::with_defaults(&MESSAGE_CONFIG));
        assert!(vfs.exists("1/caches/sonnet_default.v1"));
        assert_eq!(store.get_calls(), MESSAGE_CONFIG.fields.len());
    }

    #[tokio::test]
    async fn test_hit_does_not_touch_store() {
        let store = MockConfigStore::new();
        store.insert(1, "prefix", "?");
        let mut vfs = Vfs::new();
        let options = CacheOptions::default();

        let first = load_guild_config(&mut vfs, 1, &MESSAGE_CONFIG, &store, &options)
            .await
            .unwrap();
        let calls = store.get_calls();

        // A store change is invisible until the cache is swept.
        store.insert(1, "prefix", "$");
        let second = load_guild_config(&mut vfs, 1, &MESSAGE_CONFIG, &store, &options)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(second.scalar("prefix"), Some("?"));
        assert_eq!(store.get_calls(), calls);
    }

    #[tokio::test]
    async fn test_normalisation() {
        let store = MockConfigStore::new();
        store.insert(7, "word-blacklist", "Foo,,BAR");
        store.insert(7, "notifier-log-users", "[123, \"456\"]");
        store.insert(7, "antispam", ",");
        let mut vfs = Vfs::new();
        let options = CacheOptions::default();

        let message = load_guild_config(&mut vfs, 7, &MESSAGE_CONFIG, &store, &options)
            .await
            .unwrap();
        assert_eq!(
            message.list("word-blacklist"),
            Some(&["foo".to_string(), "bar".to_string()][..])
        );
        assert_eq!(
            message.list("antispam"),
            Some(&["2".to_string(), "0".to_string()][..])
        );

        let notifier = load_guild_config(&mut vfs, 7, &JOIN_NOTIFIER, &store, &options)
            .await
            .unwrap();
        assert_eq!(
            notifier.list("notifier-log-users"),
            Some(&["123".to_string(), "456".to_string()][..])
        );
    }

    #[tokio::test]
    async fn test_bad_json_falls_back_to_default() {
        let store = MockConfigStore::new();
        store.insert(7, "notifier-log-users", "{not json");
        let mut vfs = Vfs::new();

        let config = load_guild_config(&mut vfs, 7, &JOIN_NOTIFIER, &store, &CacheOptions::default())
            .await
            .unwrap();
        assert_eq!(config.list("notifier-log-users"), Some(&[][..]));
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_rebuilt() {
        let store = MockConfigStore::new();
        let mut vfs = Vfs::new();
        let path = EMBED_COLORS.cache_path(3);
        vfs.create_file(path.as_str(), FilePayload::bytes(vec![9, 0, b'x']))
            .unwrap();

        let config = load_guild_config(&mut vfs, 3, &EMBED_COLORS, &store, &CacheOptions::default())
            .await
            .unwrap();

        assert_eq!(config, GuildConfig::with_defaults(&EMBED_COLORS));
        let blob = vfs.read_bytes(path.as_str()).unwrap();
        assert_eq!(codec::decode(&EMBED_COLORS, blob).unwrap(), config);
    }

    #[tokio::test]
    async fn test_wrong_kind_entry_is_rebuilt() {
        let store = MockConfigStore::new();
        let mut vfs = Vfs::new();
        let path = EMBED_COLORS.cache_path(3);
        vfs.create_file(path.as_str(), FilePayload::empty(FileKind::List))
            .unwrap();

        let config = load_guild_config(&mut vfs, 3, &EMBED_COLORS, &store, &CacheOptions::default())
            .await
            .unwrap();
        assert_eq!(config.scalar("embed-color-edit"), Some("0xffa700"));
        assert!(vfs.read_bytes(path.as_str()).is_ok());
    }

    #[tokio::test]
    async fn test_stateless_never_writes() {
        let store = MockConfigStore::new();
        let mut vfs = Vfs::new();
        let options = CacheOptions::stateless();

        load_guild_config(&mut vfs, 1, &EMBED_COLORS, &store, &options)
            .await
            .unwrap();
        load_guild_config(&mut vfs, 1, &EMBED_COLORS, &store, &options)
            .await
            .unwrap();

        assert!(vfs.is_empty());
        assert_eq!(store.get_calls(), 2 * EMBED_COLORS.fields.len());
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = MockConfigStore::new();
        store.set_unavailable(true);
        let mut vfs = Vfs::new();

        let result =
            load_guild_config(&mut vfs, 1, &MESSAGE_CONFIG, &store, &CacheOptions::default()).await;
        assert!(matches!(result, Err(SonnetError::Store(_))));
        assert!(vfs.is_empty());
    }

    #[test]
    fn test_parse_json_list_shapes() {
        assert_eq!(
            parse_json_list(r#"{"blacklist": ["a", "b"]}"#),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(parse_json_list("[1, true]"), Some(vec!["1".to_string(), "true".to_string()]));
        assert_eq!(parse_json_list(r#"{"other": []}"#), None);
        assert_eq!(parse_json_list("[[1]]"), None);
        assert_eq!(parse_json_list("nope"), None);
    }
}
