//! Attachment encryption and expiry jobs.
//!
//! Storing a message's attachments stashes one key record per file in the
//! context's `ram`, then hands the plaintext to a background job:
//!
//! 1. encrypt every file on the blocking pool
//! 2. sleep for the configured TTL
//! 3. delete the ciphertext files
//! 4. post [`ExpiredAttachments`] so the next handled event discards the keys
//!
//! Background jobs never touch the VFS. Jobs are not cancelled; the TTL
//! bounds how long either plaintext-equivalent artifact exists.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sonnet_core::{CryptoResult, GuildId, MessageId};
use sonnet_crypto::{self as crypto, stash, AttachmentKey, AttachmentRecord};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::context::{Context, ExpiredAttachments};
use crate::error::RuntimeResult;

/// File extension of stored ciphertext.
pub const CIPHERTEXT_EXTENSION: &str = "sonnetaes";

/// A file attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingAttachment {
    pub filename: String,
    pub data: Vec<u8>,
}

impl IncomingAttachment {
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

/// A decrypted attachment handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredAttachment {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Handle on a batch of attachments being stored in the background.
#[derive(Debug)]
pub struct StoredAttachments {
    pub record_ids: Vec<String>,
    /// Resolves with the number of files written once encryption finishes.
    pub written: oneshot::Receiver<usize>,
    /// The whole job, resolving after expiry.
    pub job: JoinHandle<()>,
}

struct PendingFile {
    record_id: String,
    path: PathBuf,
    key: AttachmentKey,
    data: Vec<u8>,
}

// ============================================================================
// STORE
// ============================================================================

/// Stash keys for `attachments` and start the encrypt-then-expire job.
pub fn store_attachments(
    ctx: &mut Context,
    guild_id: GuildId,
    message_id: MessageId,
    attachments: Vec<IncomingAttachment>,
) -> RuntimeResult<StoredAttachments> {
    let dir = ctx.config().attachment_dir.clone();
    let ttl = ctx.config().attachment_ttl;

    let mut pending = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        let key = AttachmentKey::generate();
        let record_id = stash::record_id(&attachment.filename, &key);
        let path = dir.join(format!("{}.{}", record_id, CIPHERTEXT_EXTENSION));

        let record = AttachmentRecord::new(attachment.filename, key.clone(), path.clone());
        stash::stash(&mut ctx.ram, guild_id, message_id, &record)?;

        pending.push(PendingFile {
            record_id,
            path,
            key,
            data: attachment.data,
        });
    }

    let record_ids: Vec<String> = pending.iter().map(|file| file.record_id.clone()).collect();
    let notice = ExpiredAttachments {
        guild_id,
        message_id,
        record_ids: record_ids.clone(),
    };
    let (written_tx, written) = oneshot::channel();
    let job = tokio::spawn(attachment_job(
        pending,
        ttl,
        written_tx,
        notice,
        ctx.expiry_sender(),
    ));

    tracing::debug!(guild_id, message_id, count = record_ids.len(), "Queued attachments for encryption");
    Ok(StoredAttachments {
        record_ids,
        written,
        job,
    })
}

async fn attachment_job(
    pending: Vec<PendingFile>,
    ttl: Duration,
    written_tx: oneshot::Sender<usize>,
    notice: ExpiredAttachments,
    expiry_tx: mpsc::UnboundedSender<ExpiredAttachments>,
) {
    let mut paths = Vec::with_capacity(pending.len());
    let mut written = 0;

    for file in pending {
        let path = file.path.clone();
        let task = tokio::task::spawn_blocking(move || write_ciphertext(&file.path, &file.key, &file.data));
        match task.await {
            Ok(Ok(())) => written += 1,
            Ok(Err(e)) => tracing::warn!(
                guild_id = notice.guild_id,
                path = %path.display(),
                error = %e,
                "Failed to encrypt attachment"
            ),
            Err(e) => tracing::error!(error = %e, "Attachment encryption task panicked"),
        }
        paths.push(path);
    }
    // The receiver may have been dropped; nobody is waiting.
    let _ = written_tx.send(written);

    tokio::time::sleep(ttl).await;

    for path in &paths {
        remove_ciphertext(path).await;
    }
    if expiry_tx.send(notice).is_err() {
        tracing::debug!("Context gone before attachment expiry");
    }
}

fn write_ciphertext(path: &Path, key: &AttachmentKey, data: &[u8]) -> CryptoResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    crypto::encrypt_to_file(path, key, data)
}

async fn remove_ciphertext(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to delete expired attachment"),
    }
}

// ============================================================================
// RETRIEVE
// ============================================================================

/// Decrypt every recoverable attachment of a message.
///
/// Files that fail verification or are already gone are skipped with a
/// warning, never returned partially. With `discard` set, the ciphertext
/// files and key records are removed afterwards.
pub async fn retrieve_attachments(
    ctx: &mut Context,
    guild_id: GuildId,
    message_id: MessageId,
    discard: bool,
) -> RuntimeResult<Vec<RecoveredAttachment>> {
    let records = stash::recover(&ctx.ram, guild_id, message_id)?;

    let mut recovered = Vec::with_capacity(records.len());
    for record in records {
        let path = record.ciphertext_path.clone();
        let key = record.key.clone();
        let decrypted = tokio::task::spawn_blocking(move || crypto::decrypt_file(&path, &key)).await?;

        match decrypted {
            Ok(data) => recovered.push(RecoveredAttachment {
                filename: record.filename.clone(),
                data,
            }),
            Err(e) => tracing::warn!(
                guild_id,
                message_id,
                filename = %record.filename,
                error = %e,
                "Skipping unreadable attachment"
            ),
        }

        if discard {
            remove_ciphertext(&record.ciphertext_path).await;
        }
    }

    if discard {
        stash::discard(&mut ctx.ram, guild_id, message_id)?;
    }
    Ok(recovered)
}
