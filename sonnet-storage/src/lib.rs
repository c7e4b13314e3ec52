//! Sonnet Storage - VFS, Guild Cache and Config Store Seam
//!
//! The in-memory virtual filesystem, the guild cache layer built on it, event
//! statistics, and the async trait through which the cache reaches the
//! durable guild config store. The database implementation lives outside
//! this workspace; [`MockConfigStore`] stands in for tests.

pub mod cache;
pub mod stats;
pub mod vfs;

pub use cache::{
    load_guild_config, load_regex_patterns, sweep, CacheDirective, CacheOptions, CacheTarget,
    ConfigSchema, FieldKind, FieldSpec, FieldValue, GuildConfig, GuildPath, RegexKind,
    SweepReport, TargetKind, EMBED_COLORS, JOIN_NOTIFIER, MESSAGE_CONFIG,
};
pub use stats::{inc_statistics, read_global_statistics, read_statistics, StatEvent};
pub use vfs::{FileKind, FilePayload, Node, NodeId, TreeEntry, Vfs};

use async_trait::async_trait;
use sonnet_core::{GuildId, StoreError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

// ============================================================================
// CONFIG STORE TRAIT
// ============================================================================

/// Durable key-value store of guild configuration, owned by the database layer.
///
/// Values are raw strings exactly as stored; the cache layer normalises them.
#[async_trait]
pub trait GuildConfigStore: Send + Sync {
    /// Get a field's stored value, `None` if never set.
    async fn get(&self, guild_id: GuildId, field: &str) -> Result<Option<String>, StoreError>;

    /// Set a field's value.
    async fn set(&self, guild_id: GuildId, field: &str, value: &str) -> Result<(), StoreError>;
}

// ============================================================================
// MOCK CONFIG STORE
// ============================================================================

/// In-memory config store for testing.
#[derive(Debug, Default, Clone)]
pub struct MockConfigStore {
    values: Arc<RwLock<HashMap<(GuildId, String), String>>>,
    get_calls: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
}

impl MockConfigStore {
    /// Create an empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value without going through the async trait.
    pub fn insert(&self, guild_id: GuildId, field: &str, value: &str) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((guild_id, field.to_string()), value.to_string());
    }

    /// Number of `get` calls served so far.
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Make every call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Remove all stored values.
    pub fn clear(&self) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "mock store marked unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl GuildConfigStore for MockConfigStore {
    async fn get(&self, guild_id: GuildId, field: &str) -> Result<Option<String>, StoreError> {
        self.check_available()?;
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let values = self.values.read().map_err(|_| StoreError::QueryFailed {
            field: field.to_string(),
            reason: "lock poisoned".to_string(),
        })?;
        Ok(values.get(&(guild_id, field.to_string())).cloned())
    }

    async fn set(&self, guild_id: GuildId, field: &str, value: &str) -> Result<(), StoreError> {
        self.check_available()?;
        let mut values = self.values.write().map_err(|_| StoreError::QueryFailed {
            field: field.to_string(),
            reason: "lock poisoned".to_string(),
        })?;
        values.insert((guild_id, field.to_string()), value.to_string());
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
