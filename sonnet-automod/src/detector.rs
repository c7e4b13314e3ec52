//! Sliding-window abuse detection.
//!
//! Each `(guild, detector)` pair owns one fixed-width record buffer in the
//! VFS. Every check drops entries that fell out of the window, appends the
//! current event, evaluates the trigger, and rewrites the buffer with exactly
//! the retained entries.

use serde::Serialize;
use sonnet_core::{GuildId, TimestampMillis, UserId, VfsError, VfsResult};
use sonnet_storage::{FilePayload, GuildPath, Vfs};

use crate::record::{decode_entries, encode_entries, WindowEntry};
use crate::spec::{DetectorName, DetectorSpec};

/// The char-rate detector sums characters over every user's retained
/// entries, not only the acting user's. Kept as observed; flip deliberately
/// if per-user accounting is wanted.
pub const CHAR_RATE_SUMS_ALL_USERS: bool = true;

/// One inbound chat event as seen by the detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AbuseEvent {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub timestamp_millis: TimestampMillis,
    /// Characters in the message body.
    pub char_count: u32,
}

/// Result of one detector check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AbuseVerdict {
    pub triggered: bool,
    pub detector: DetectorName,
    /// Entries kept in the buffer, including the current event.
    pub retained: usize,
    /// Retained entries belonging to the acting user.
    pub user_count: u64,
    /// Characters across the retained entries counted by the detector.
    pub total_chars: u64,
}

/// VFS path of a detector's buffer for a guild.
pub fn buffer_path(guild_id: GuildId, detector: DetectorName) -> GuildPath {
    GuildPath::antispam(guild_id).join(&detector.buffer_file())
}

/// Run one detector against `event`, recording the event in its window.
pub fn check_abuse(vfs: &mut Vfs, event: &AbuseEvent, spec: &DetectorSpec) -> VfsResult<AbuseVerdict> {
    let detector = spec.name();
    let with_chars = matches!(spec, DetectorSpec::CharRate { .. });
    let path = buffer_path(event.guild_id, detector);

    let existing = match vfs.read_bytes(path.as_str()) {
        Ok(buf) => decode_entries(buf, with_chars),
        Err(VfsError::NotFound { .. }) => Vec::new(),
        Err(e @ VfsError::TypeMismatch { .. }) => {
            tracing::warn!(
                guild_id = event.guild_id,
                detector = detector.as_str(),
                error = %e,
                "Discarding corrupt abuse buffer"
            );
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    // Signed so early timestamps cannot underflow. The +1 makes a zero
    // window drop everything, which is how a detector is switched off.
    let drop_threshold =
        i128::from(event.timestamp_millis) - i128::from(spec.window_millis()) + 1;

    let mut retained: Vec<WindowEntry> = existing
        .into_iter()
        .filter(|entry| i128::from(entry.timestamp_millis) > drop_threshold)
        .collect();
    retained.push(WindowEntry {
        user_id: event.user_id,
        timestamp_millis: event.timestamp_millis,
        char_count: if with_chars { event.char_count } else { 0 },
    });

    let user_count = retained
        .iter()
        .filter(|entry| entry.user_id == event.user_id)
        .count() as u64;
    let total_chars: u64 = retained
        .iter()
        .filter(|entry| CHAR_RATE_SUMS_ALL_USERS || entry.user_id == event.user_id)
        .map(|entry| u64::from(entry.char_count))
        .sum();

    let triggered = match *spec {
        DetectorSpec::MessageRate {
            threshold_count, ..
        } => user_count >= threshold_count,
        DetectorSpec::CharRate {
            threshold_count,
            threshold_chars,
            ..
        } => total_chars > threshold_chars && retained.len() as u64 >= threshold_count,
    };

    vfs.create_file(
        path.as_str(),
        FilePayload::bytes(encode_entries(&retained, with_chars)),
    )?;

    Ok(AbuseVerdict {
        triggered,
        detector,
        retained: retained.len(),
        user_count,
        total_chars,
    })
}

/// Run every detector; each one records the event. Returns the first verdict
/// that triggered, in `specs` order.
pub fn check_all(
    vfs: &mut Vfs,
    event: &AbuseEvent,
    specs: &[DetectorSpec],
) -> VfsResult<Option<AbuseVerdict>> {
    let mut first = None;
    for spec in specs {
        let verdict = check_abuse(vfs, event, spec)?;
        if verdict.triggered && first.is_none() {
            first = Some(verdict);
        }
    }
    Ok(first)
}
