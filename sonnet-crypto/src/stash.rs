//! Ephemeral attachment key records in the VFS.
//!
//! Layout, one directory per attachment:
//!
//! ```text
//! <guild>/files/<message>/<record_id>/name     filename bytes
//! <guild>/files/<message>/<record_id>/key      key ∥ iv (48 bytes)
//! <guild>/files/<message>/<record_id>/pointer  ciphertext path bytes
//! ```
//!
//! Once a record is discarded the ciphertext on disk is unrecoverable.

use std::path::PathBuf;

use serde::Serialize;
use sonnet_core::{short_hash_hex, GuildId, MessageId, VfsError, VfsResult};
use sonnet_storage::cache::GuildPath;
use sonnet_storage::{FilePayload, Vfs};

use crate::key::{AttachmentKey, KEY_MATERIAL_LEN};

const NAME_FILE: &str = "name";
const KEY_FILE: &str = "key";
const POINTER_FILE: &str = "pointer";

/// Everything needed to find and decrypt one stored attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentRecord {
    pub filename: String,
    #[serde(skip)]
    pub key: AttachmentKey,
    pub ciphertext_path: PathBuf,
}

impl AttachmentRecord {
    pub fn new(filename: impl Into<String>, key: AttachmentKey, ciphertext_path: PathBuf) -> Self {
        Self {
            filename: filename.into(),
            key,
            ciphertext_path,
        }
    }

    pub fn record_id(&self) -> String {
        record_id(&self.filename, &self.key)
    }
}

/// Hash of `filename ∥ key ∥ iv`, used as a record's directory name.
pub fn record_id(filename: &str, key: &AttachmentKey) -> String {
    let mut material = Vec::with_capacity(filename.len() + KEY_MATERIAL_LEN);
    material.extend_from_slice(filename.as_bytes());
    material.extend_from_slice(key.key());
    material.extend_from_slice(key.iv());
    short_hash_hex(&material)
}

/// Store a record under the message's files directory. Returns its record id.
pub fn stash(
    vfs: &mut Vfs,
    guild_id: GuildId,
    message_id: MessageId,
    record: &AttachmentRecord,
) -> VfsResult<String> {
    let record_id = record.record_id();
    let dir = GuildPath::message_files(guild_id, message_id).join(&record_id);

    vfs.create_file(
        dir.join(NAME_FILE).as_str(),
        FilePayload::bytes(record.filename.as_bytes().to_vec()),
    )?;
    vfs.create_file(
        dir.join(KEY_FILE).as_str(),
        FilePayload::bytes(record.key.to_bytes().to_vec()),
    )?;
    vfs.create_file(
        dir.join(POINTER_FILE).as_str(),
        FilePayload::bytes(record.ciphertext_path.to_string_lossy().into_owned().into_bytes()),
    )?;

    tracing::debug!(guild_id, message_id, record_id = %record_id, "Stashed attachment key");
    Ok(record_id)
}

/// All intact records for a message, sorted by record id.
///
/// A message with no files directory yields an empty list. Records with
/// missing or malformed parts are skipped with a warning.
pub fn recover(vfs: &Vfs, guild_id: GuildId, message_id: MessageId) -> VfsResult<Vec<AttachmentRecord>> {
    let dir = GuildPath::message_files(guild_id, message_id);
    let record_ids = match vfs.ls(dir.as_str()) {
        Ok((_files, dirs)) => dirs,
        Err(VfsError::NotFound { .. }) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut records = Vec::with_capacity(record_ids.len());
    for record_id in record_ids {
        match read_record(vfs, &dir.join(&record_id)) {
            Some(record) => records.push(record),
            None => {
                tracing::warn!(guild_id, message_id, record_id = %record_id, "Skipping malformed attachment record");
            }
        }
    }
    Ok(records)
}

/// Drop every record for a message. Returns whether anything was removed.
pub fn discard(vfs: &mut Vfs, guild_id: GuildId, message_id: MessageId) -> VfsResult<bool> {
    let dir = GuildPath::message_files(guild_id, message_id);
    match vfs.rmdir(dir.as_str()) {
        Ok(()) => {
            tracing::debug!(guild_id, message_id, "Discarded attachment keys");
            Ok(true)
        }
        Err(VfsError::NotFound { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Drop specific records by id, tolerating ones already gone.
pub fn discard_records(
    vfs: &mut Vfs,
    guild_id: GuildId,
    message_id: MessageId,
    record_ids: &[String],
) -> VfsResult<usize> {
    let dir = GuildPath::message_files(guild_id, message_id);
    let mut removed = 0;
    for record_id in record_ids {
        match vfs.rmdir(dir.join(record_id).as_str()) {
            Ok(()) => removed += 1,
            Err(VfsError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}

fn read_record(vfs: &Vfs, dir: &GuildPath) -> Option<AttachmentRecord> {
    let filename = vfs.read_bytes(dir.join(NAME_FILE).as_str()).ok()?;
    let key = vfs.read_bytes(dir.join(KEY_FILE).as_str()).ok()?;
    let path = vfs.read_bytes(dir.join(POINTER_FILE).as_str()).ok()?;

    Some(AttachmentRecord {
        filename: String::from_utf8(filename.to_vec()).ok()?,
        key: AttachmentKey::from_bytes(key).ok()?,
        ciphertext_path: PathBuf::from(String::from_utf8(path.to_vec()).ok()?),
    })
}
