//! Per-guild regex pattern cache.
//!
//! Pattern sources are stored in the config store as a JSON list of entries
//! of the form `<tag> /<pattern>/<flag>`. The cache keeps the validated
//! pattern sources as a `List` file at `<guild>/regex/<kind>`; patterns that
//! fail to compile are dropped when the list is built.

use regex::Regex;
use serde::Serialize;
use sonnet_core::{GuildId, SonnetResult, VfsError};

use super::guild_config::parse_json_list;
use super::guild_path::GuildPath;
use crate::vfs::{FilePayload, Vfs};
use crate::GuildConfigStore;

/// Which regex list to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RegexKind {
    Blacklist,
    Notifier,
}

impl RegexKind {
    /// Config store field, also the cache file name.
    pub fn field_name(&self) -> &'static str {
        match self {
            RegexKind::Blacklist => "regex-blacklist",
            RegexKind::Notifier => "regex-notifier",
        }
    }
}

/// Load and compile a guild's regex patterns, building the cache on a miss.
pub async fn load_regex_patterns<S>(
    vfs: &mut Vfs,
    guild_id: GuildId,
    kind: RegexKind,
    store: &S,
) -> SonnetResult<Vec<Regex>>
where
    S: GuildConfigStore + ?Sized,
{
    let path = GuildPath::regex(guild_id).join(kind.field_name());

    let sources = match vfs.read_list(path.as_str()) {
        Ok(sources) => sources.to_vec(),
        Err(VfsError::NotFound { .. }) | Err(VfsError::TypeMismatch { .. }) => {
            let sources = fetch_patterns(guild_id, kind, store).await?;
            vfs.create_file(path.as_str(), FilePayload::list(sources.iter().cloned()))?;
            sources
        }
        Err(e) => return Err(e.into()),
    };

    // Sources were validated when cached.
    Ok(sources.iter().filter_map(|s| Regex::new(s).ok()).collect())
}

async fn fetch_patterns<S>(guild_id: GuildId, kind: RegexKind, store: &S) -> SonnetResult<Vec<String>>
where
    S: GuildConfigStore + ?Sized,
{
    let Some(raw) = store.get(guild_id, kind.field_name()).await? else {
        return Ok(Vec::new());
    };
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let Some(entries) = parse_json_list(&raw) else {
        tracing::warn!(
            guild_id,
            field = kind.field_name(),
            "Unparseable regex list in config store, treating as empty"
        );
        return Ok(Vec::new());
    };

    let mut sources = Vec::with_capacity(entries.len());
    for entry in &entries {
        let source = unwrap_stored_pattern(entry);
        match Regex::new(source) {
            Ok(_) => sources.push(source.to_string()),
            Err(e) => tracing::warn!(
                guild_id,
                field = kind.field_name(),
                pattern = source,
                error = %e,
                "Dropping regex that failed to compile"
            ),
        }
    }
    Ok(sources)
}

/// Strip the `<tag> /` prefix and `/<flag>` suffix from a stored entry.
/// Entries not in that form are used verbatim.
pub fn unwrap_stored_pattern(entry: &str) -> &str {
    match entry.split_once(' ') {
        Some((_, body)) if body.len() >= 3 && body.starts_with('/') => {
            body.get(1..body.len() - 2).unwrap_or(entry)
        }
        _ => entry,
    }
}
