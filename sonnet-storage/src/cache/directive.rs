//! Command-declared cache invalidation.
//!
//! Every command declares one [`CacheDirective`]. After the command succeeds
//! the dispatcher calls [`sweep`] against the acting guild's subtree, which
//! deletes the declared targets so the next reader rebuilds from the database.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use sonnet_core::{GuildId, ValidationError, VfsError, VfsResult};

use super::guild_path::{GuildPath, CACHES_DIR, REGEX_DIR};
use crate::vfs::Vfs;

/// Kind of node a `Direct` target names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TargetKind {
    File,
    Directory,
}

impl TargetKind {
    fn tag(&self) -> &'static str {
        match self {
            TargetKind::File => "(f)",
            TargetKind::Directory => "(d)",
        }
    }
}

/// An exact target for `Direct` invalidation, relative to the guild root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CacheTarget {
    pub kind: TargetKind,
    pub path: String,
}

impl CacheTarget {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::File,
            path: path.into(),
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Directory,
            path: path.into(),
        }
    }
}

impl fmt::Display for CacheTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.tag(), self.path)
    }
}

/// What a command does to the guild's cache once it completes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub enum CacheDirective {
    /// No action.
    #[default]
    Keep,
    /// Drop the guild's cache; it may stay cold.
    Purge,
    /// Drop the guild's cache; the caller will rebuild it shortly.
    Regenerate,
    /// Drop exactly the listed targets.
    Direct(Vec<CacheTarget>),
}

impl CacheDirective {
    /// True for the two wholesale directives.
    pub fn clears_guild(&self) -> bool {
        matches!(self, CacheDirective::Purge | CacheDirective::Regenerate)
    }
}

impl fmt::Display for CacheDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheDirective::Keep => f.write_str("keep"),
            CacheDirective::Purge => f.write_str("purge"),
            CacheDirective::Regenerate => f.write_str("regenerate"),
            CacheDirective::Direct(targets) => {
                f.write_str("direct:")?;
                for (i, target) in targets.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", target)?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for CacheDirective {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidDirective {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        match s {
            "keep" => return Ok(CacheDirective::Keep),
            "purge" => return Ok(CacheDirective::Purge),
            "regenerate" => return Ok(CacheDirective::Regenerate),
            _ => {}
        }

        let body = s
            .strip_prefix("direct:")
            .ok_or_else(|| invalid("expected keep, purge, regenerate or direct:<targets>"))?;

        let mut targets = Vec::new();
        for item in body.split(',') {
            let (kind, path) = if let Some(path) = item.strip_prefix("(f)") {
                (TargetKind::File, path)
            } else if let Some(path) = item.strip_prefix("(d)") {
                (TargetKind::Directory, path)
            } else {
                return Err(invalid("direct targets must start with (f) or (d)"));
            };
            if path.is_empty() || path.split('/').any(str::is_empty) {
                return Err(invalid("direct target path has an empty component"));
            }
            targets.push(CacheTarget {
                kind,
                path: path.to_string(),
            });
        }

        Ok(CacheDirective::Direct(targets))
    }
}

/// Outcome of a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Paths that existed and were deleted.
    pub removed: Vec<String>,
    /// Paths that were already gone.
    pub already_absent: Vec<String>,
}

/// Apply a directive to one guild's subtree.
///
/// Targets that are already absent count as success. Any other VFS failure
/// (a `Direct` file target that is a directory, for instance) propagates.
pub fn sweep(vfs: &mut Vfs, guild_id: GuildId, directive: &CacheDirective) -> VfsResult<SweepReport> {
    let mut report = SweepReport::default();

    match directive {
        CacheDirective::Keep => {}
        CacheDirective::Purge | CacheDirective::Regenerate => {
            for dir in [CACHES_DIR, REGEX_DIR] {
                let path = GuildPath::new(guild_id, dir);
                remove_target(vfs, TargetKind::Directory, path.as_str(), &mut report)?;
            }
        }
        CacheDirective::Direct(targets) => {
            for target in targets {
                let path = GuildPath::new(guild_id, &target.path);
                remove_target(vfs, target.kind, path.as_str(), &mut report)?;
            }
        }
    }

    tracing::debug!(
        guild_id,
        directive = %directive,
        removed = report.removed.len(),
        already_absent = report.already_absent.len(),
        "Cache sweep complete"
    );

    Ok(report)
}

fn remove_target(vfs: &mut Vfs, kind: TargetKind, path: &str, report: &mut SweepReport) -> VfsResult<()> {
    let result = match kind {
        TargetKind::File => vfs.remove_file(path),
        TargetKind::Directory => vfs.rmdir(path),
    };
    match result {
        Ok(()) => report.removed.push(path.to_string()),
        Err(VfsError::NotFound { .. }) => report.already_absent.push(path.to_string()),
        Err(e) => return Err(e),
    }
    Ok(())
}
