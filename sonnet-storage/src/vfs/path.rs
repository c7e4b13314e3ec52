//! Path parsing for the virtual filesystem.
//!
//! Paths are `/`-delimited strings of non-empty, case-sensitive components.
//! The empty string names the root directory.

use sonnet_core::{VfsError, VfsResult};

/// Split a path into its components.
///
/// Returns an empty vector for the root (`""`). Any empty component, including
/// one produced by a leading or trailing `/`, is rejected.
pub fn components(path: &str) -> VfsResult<Vec<&str>> {
    if path.is_empty() {
        return Ok(Vec::new());
    }

    let parts: Vec<&str> = path.split('/').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(VfsError::InvalidPath {
            path: path.to_string(),
            reason: "path components must be non-empty",
        });
    }
    Ok(parts)
}

/// Split a path into its parent components and final name.
///
/// Fails for the root, which has no name.
pub fn split_last(path: &str) -> VfsResult<(Vec<&str>, &str)> {
    let mut parts = components(path)?;
    match parts.pop() {
        Some(name) => Ok((parts, name)),
        None => Err(VfsError::InvalidPath {
            path: path.to_string(),
            reason: "operation requires a named node, not the root",
        }),
    }
}

/// Join components back into a path string.
pub fn join(parts: &[&str]) -> String {
    parts.join("/")
}
