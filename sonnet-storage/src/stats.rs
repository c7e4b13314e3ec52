//! Chat event statistics.
//!
//! Counters live in the long-lived kernel VFS as integer-keyed `Counters`
//! files, one per guild plus a process-wide `global/stats`.

use std::collections::BTreeMap;

use serde::Serialize;
use sonnet_core::{GuildId, VfsError, VfsResult};

use crate::cache::guild_path::{global_stats_path, GuildPath};
use crate::vfs::{FileKind, FilePayload, Vfs};

/// Counted chat events. The discriminant is the counter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(u64)]
pub enum StatEvent {
    OnMessage = 0,
    OnMessageEdit = 1,
    OnMessageDelete = 2,
    OnReactionAdd = 3,
    OnRawReactionAdd = 4,
    OnRawReactionRemove = 5,
    OnMemberUpdate = 6,
    OnMemberJoin = 7,
    OnMemberRemove = 8,
}

impl StatEvent {
    pub const ALL: [StatEvent; 9] = [
        StatEvent::OnMessage,
        StatEvent::OnMessageEdit,
        StatEvent::OnMessageDelete,
        StatEvent::OnReactionAdd,
        StatEvent::OnRawReactionAdd,
        StatEvent::OnRawReactionRemove,
        StatEvent::OnMemberUpdate,
        StatEvent::OnMemberJoin,
        StatEvent::OnMemberRemove,
    ];

    pub fn key(self) -> u64 {
        self as u64
    }

    pub fn from_key(key: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.key() == key)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatEvent::OnMessage => "on-message",
            StatEvent::OnMessageEdit => "on-message-edit",
            StatEvent::OnMessageDelete => "on-message-delete",
            StatEvent::OnReactionAdd => "on-reaction-add",
            StatEvent::OnRawReactionAdd => "on-raw-reaction-add",
            StatEvent::OnRawReactionRemove => "on-raw-reaction-remove",
            StatEvent::OnMemberUpdate => "on-member-update",
            StatEvent::OnMemberJoin => "on-member-join",
            StatEvent::OnMemberRemove => "on-member-remove",
        }
    }
}

/// Bump `event` for the guild and globally.
pub fn inc_statistics(kernel: &mut Vfs, guild_id: GuildId, event: StatEvent) -> VfsResult<()> {
    bump(kernel, GuildPath::stats(guild_id).as_str(), event)?;
    bump(kernel, &global_stats_path(), event)
}

/// A guild's counters keyed by event. Empty if nothing was counted yet.
pub fn read_statistics(kernel: &Vfs, guild_id: GuildId) -> VfsResult<BTreeMap<StatEvent, u64>> {
    read_at(kernel, GuildPath::stats(guild_id).as_str())
}

/// Process-wide counters.
pub fn read_global_statistics(kernel: &Vfs) -> VfsResult<BTreeMap<StatEvent, u64>> {
    read_at(kernel, &global_stats_path())
}

fn bump(kernel: &mut Vfs, path: &str, event: StatEvent) -> VfsResult<()> {
    if !kernel.exists(path) {
        kernel.create_file(path, FilePayload::empty(FileKind::Counters))?;
    }
    let counters = kernel.read_counters_mut(path)?;
    *counters.entry(event.key()).or_insert(0) += 1;
    Ok(())
}

fn read_at(kernel: &Vfs, path: &str) -> VfsResult<BTreeMap<StatEvent, u64>> {
    let counters = match kernel.read_counters(path) {
        Ok(counters) => counters,
        Err(VfsError::NotFound { .. }) => return Ok(BTreeMap::new()),
        Err(e) => return Err(e),
    };
    Ok(counters
        .iter()
        .filter_map(|(&key, &count)| StatEvent::from_key(key).map(|e| (e, count)))
        .collect())
}
