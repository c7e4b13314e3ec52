//! Explicit runtime context.
//!
//! One `Context` per bot process, owned by the event loop and lent to every
//! handler as `&mut Context`. Two VFS instances live here:
//!
//! - `ram`: per-guild caches, detector buffers and attachment key records.
//!   Safe to throw away at any time with [`Context::regenerate_ram`].
//! - `kernel_ram`: long-lived statistics counters.

use sonnet_core::{GuildId, MessageId};
use sonnet_crypto::stash;
use sonnet_storage::Vfs;
use tokio::sync::mpsc;

use crate::config::RuntimeConfig;
use crate::error::RuntimeResult;

/// Posted by a background attachment job once its files are deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredAttachments {
    pub guild_id: GuildId,
    pub message_id: MessageId,
    pub record_ids: Vec<String>,
}

pub struct Context {
    pub ram: Vfs,
    pub kernel_ram: Vfs,
    config: RuntimeConfig,
    expiry_tx: mpsc::UnboundedSender<ExpiredAttachments>,
    expiry_rx: mpsc::UnboundedReceiver<ExpiredAttachments>,
}

impl Context {
    /// Validate `config` and build an empty context.
    pub fn new(config: RuntimeConfig) -> RuntimeResult<Self> {
        config.validate()?;
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        Ok(Self {
            ram: Vfs::new(),
            kernel_ram: Vfs::new(),
            config,
            expiry_tx,
            expiry_rx,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Channel background jobs use to report expired attachments.
    pub(crate) fn expiry_sender(&self) -> mpsc::UnboundedSender<ExpiredAttachments> {
        self.expiry_tx.clone()
    }

    /// Drop every cache, buffer and stashed key.
    pub fn regenerate_ram(&mut self) {
        self.ram = Vfs::new();
        tracing::info!("Regenerated ram");
    }

    /// Drop all statistics.
    pub fn regenerate_kernel_ram(&mut self) {
        self.kernel_ram = Vfs::new();
        tracing::info!("Regenerated kernel ram");
    }

    /// Discard key records for every attachment batch that has expired since
    /// the last call. Returns the number of records removed.
    pub fn reap_expired(&mut self) -> usize {
        let mut removed = 0;
        while let Ok(notice) = self.expiry_rx.try_recv() {
            match stash::discard_records(
                &mut self.ram,
                notice.guild_id,
                notice.message_id,
                &notice.record_ids,
            ) {
                Ok(count) => removed += count,
                Err(e) => tracing::warn!(
                    guild_id = notice.guild_id,
                    message_id = notice.message_id,
                    error = %e,
                    "Failed to discard expired attachment keys"
                ),
            }
            if stash::recover(&self.ram, notice.guild_id, notice.message_id)
                .map(|records| records.is_empty())
                .unwrap_or(false)
            {
                if let Err(e) = stash::discard(&mut self.ram, notice.guild_id, notice.message_id) {
                    tracing::warn!(guild_id = notice.guild_id, error = %e, "Failed to prune message files directory");
                }
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "Reaped expired attachment keys");
        }
        removed
    }
}
