//! Ephemeral, hierarchical, typed in-memory filesystem.
//!
//! The VFS is a process-local cache namespace. Directories map names to
//! child nodes; files hold one of a closed set of typed payloads
//! ([`FilePayload`]). Everything lives in an arena of slots addressed by
//! index, with parent links stored as indices, so recursive deletion is a
//! sweep over subtree indices and no reference cycles exist.
//!
//! # Path resolution
//!
//! Paths descend component-by-component from the root. Only the create-type
//! operations ([`Vfs::mkdir`], [`Vfs::create_file`]) create intermediate
//! directories; reads and removals never do.
//!
//! # Concurrency
//!
//! The VFS holds no locks. Callers guarantee at most one writer per guild
//! subtree at a time; in practice handlers receive `&mut Vfs` through the
//! runtime context, so the borrow checker enforces it.

mod node;
pub mod path;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use sonnet_core::{VfsError, VfsResult};

pub use node::{FileKind, FilePayload, Node, NodeId};
use node::{Entry, Slot};

/// One line of a recursive listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Nesting depth below the listed directory (0 = direct child).
    pub depth: usize,
    pub name: String,
    pub is_dir: bool,
}

impl fmt::Display for TreeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = if self.is_dir { 'D' } else { 'F' };
        write!(f, "{} {}{}", tag, "| ".repeat(self.depth), self.name)
    }
}

/// In-memory virtual filesystem.
#[derive(Debug)]
pub struct Vfs {
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

impl Vfs {
    /// Create an empty filesystem containing only the root directory.
    pub fn new() -> Self {
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(Node::directory("", None)),
            }],
            free: Vec::new(),
            live: 1,
        }
    }

    /// Number of live nodes, including the root.
    pub fn len(&self) -> usize {
        self.live
    }

    /// True when only the root directory exists.
    pub fn is_empty(&self) -> bool {
        self.live == 1
    }

    // ========================================================================
    // HANDLES
    // ========================================================================

    /// Look up a node by handle. Stale handles resolve to `None`.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    /// Handle of a node's parent directory. `None` for the root or stale handles.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id)?.parent?;
        Some(self.handle(parent))
    }

    /// Reconstruct the full path of a node by following parent links.
    pub fn path_of(&self, id: NodeId) -> Option<String> {
        let mut names = Vec::new();
        let mut current = self.node(id)?;
        while let Some(parent) = current.parent {
            names.push(current.name.as_str());
            current = self.node_at(parent)?;
        }
        names.reverse();
        Some(path::join(&names))
    }

    // ========================================================================
    // OPERATIONS
    // ========================================================================

    /// Ensure every directory component of `path` exists. Idempotent.
    pub fn mkdir(&mut self, path: &str) -> VfsResult<NodeId> {
        let parts = path::components(path)?;
        let index = self.ensure_dirs(&parts, path)?;
        Ok(self.handle(index))
    }

    /// Create or overwrite a typed file, creating parent directories.
    ///
    /// Whatever previously lived at `path` is replaced, including a
    /// directory and its whole subtree.
    pub fn create_file(&mut self, path: &str, payload: FilePayload) -> VfsResult<&mut FilePayload> {
        let (parents, name) = path::split_last(path)?;
        let dir = self.ensure_dirs(&parents, path)?;

        if let Some(existing) = self.child(dir, name) {
            self.detach(existing);
            self.free_subtree(existing);
        }

        let index = self.alloc(Node::file(name, dir, payload));
        if let Some(Entry::Directory(children)) = self.node_at_mut(dir).map(|n| &mut n.entry) {
            children.insert(name.to_string(), index);
        }

        match self.node_at_mut(index).map(|n| &mut n.entry) {
            Some(Entry::File(payload)) => Ok(payload),
            _ => Err(VfsError::not_found(path)),
        }
    }

    /// Read the payload stored at `path`.
    pub fn read_file(&self, path: &str) -> VfsResult<&FilePayload> {
        let index = self.resolve_path(path)?;
        match self.node_at(index).map(|n| &n.entry) {
            Some(Entry::File(payload)) => Ok(payload),
            Some(Entry::Directory(_)) => Err(VfsError::type_mismatch(path, "file", "directory")),
            None => Err(VfsError::not_found(path)),
        }
    }

    /// Mutable access to the payload stored at `path`.
    pub fn read_file_mut(&mut self, path: &str) -> VfsResult<&mut FilePayload> {
        let index = self.resolve_path(path)?;
        match self.node_at_mut(index).map(|n| &mut n.entry) {
            Some(Entry::File(payload)) => Ok(payload),
            Some(Entry::Directory(_)) => Err(VfsError::type_mismatch(path, "file", "directory")),
            None => Err(VfsError::not_found(path)),
        }
    }

    /// Read a byte buffer, failing `TypeMismatch` for other payload kinds.
    pub fn read_bytes(&self, path: &str) -> VfsResult<&[u8]> {
        match self.read_file(path)? {
            FilePayload::Bytes(data) => Ok(data),
            other => Err(VfsError::type_mismatch(path, "bytes", other.kind().as_str())),
        }
    }

    pub fn read_bytes_mut(&mut self, path: &str) -> VfsResult<&mut Vec<u8>> {
        match self.read_file_mut(path)? {
            FilePayload::Bytes(data) => Ok(data),
            other => Err(VfsError::type_mismatch(path, "bytes", other.kind().as_str())),
        }
    }

    pub fn read_counters(&self, path: &str) -> VfsResult<&BTreeMap<u64, u64>> {
        match self.read_file(path)? {
            FilePayload::Counters(map) => Ok(map),
            other => Err(VfsError::type_mismatch(path, "counters", other.kind().as_str())),
        }
    }

    pub fn read_counters_mut(
        &mut self,
        path: &str,
    ) -> VfsResult<&mut BTreeMap<u64, u64>> {
        match self.read_file_mut(path)? {
            FilePayload::Counters(map) => Ok(map),
            other => Err(VfsError::type_mismatch(path, "counters", other.kind().as_str())),
        }
    }

    pub fn read_list(&self, path: &str) -> VfsResult<&[String]> {
        match self.read_file(path)? {
            FilePayload::List(items) => Ok(items),
            other => Err(VfsError::type_mismatch(path, "list", other.kind().as_str())),
        }
    }

    pub fn read_list_mut(&mut self, path: &str) -> VfsResult<&mut Vec<String>> {
        match self.read_file_mut(path)? {
            FilePayload::List(items) => Ok(items),
            other => Err(VfsError::type_mismatch(path, "list", other.kind().as_str())),
        }
    }

    /// Delete a file. Fails `NotFound` if absent.
    pub fn remove_file(&mut self, path: &str) -> VfsResult<()> {
        path::split_last(path)?;
        let index = self.resolve_path(path)?;
        if self.node_at(index).is_some_and(Node::is_dir) {
            return Err(VfsError::type_mismatch(path, "file", "directory"));
        }
        self.detach(index);
        self.free_subtree(index);
        Ok(())
    }

    /// Delete a directory and everything beneath it. Fails `NotFound` if absent.
    pub fn rmdir(&mut self, path: &str) -> VfsResult<()> {
        path::split_last(path)?;
        let index = self.resolve_path(path)?;
        if let Some(node) = self.node_at(index) {
            if !node.is_dir() {
                return Err(VfsError::type_mismatch(path, "directory", node.entry.kind_name()));
            }
        }
        self.detach(index);
        self.free_subtree(index);
        Ok(())
    }

    /// List a directory as `(file_names, subdirectory_names)`, each sorted.
    pub fn ls(&self, path: &str) -> VfsResult<(Vec<String>, Vec<String>)> {
        let index = self.resolve_path(path)?;
        let children = self.children(index, path)?;

        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for (name, child) in children {
            match self.node_at(*child) {
                Some(node) if node.is_dir() => dirs.push(name.clone()),
                Some(_) => files.push(name.clone()),
                None => {}
            }
        }
        files.sort();
        dirs.sort();
        Ok((files, dirs))
    }

    /// Recursive listing below `path`: files first, then each subdirectory
    /// followed by its own contents.
    pub fn tree(&self, path: &str) -> VfsResult<Vec<TreeEntry>> {
        let index = self.resolve_path(path)?;
        let mut out = Vec::new();
        self.tree_into(index, path, 0, &mut out)?;
        Ok(out)
    }

    /// True if any node exists at `path`.
    pub fn exists(&self, path: &str) -> bool {
        self.resolve_path(path).is_ok()
    }

    // ========================================================================
    // ARENA INTERNALS
    // ========================================================================

    fn handle(&self, index: usize) -> NodeId {
        let generation = self.slots.get(index).map(|s| s.generation).unwrap_or(0);
        NodeId { index, generation }
    }

    fn node_at(&self, index: usize) -> Option<&Node> {
        self.slots.get(index)?.node.as_ref()
    }

    fn node_at_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.slots.get_mut(index)?.node.as_mut()
    }

    fn alloc(&mut self, node: Node) -> usize {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            self.slots[index].node = Some(node);
            index
        } else {
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            self.slots.len() - 1
        }
    }

    fn child(&self, dir: usize, name: &str) -> Option<usize> {
        match self.node_at(dir).map(|n| &n.entry) {
            Some(Entry::Directory(children)) => children.get(name).copied(),
            _ => None,
        }
    }

    fn children(&self, index: usize, path: &str) -> VfsResult<&HashMap<String, usize>> {
        match self.node_at(index).map(|n| &n.entry) {
            Some(Entry::Directory(children)) => Ok(children),
            Some(entry) => Err(VfsError::type_mismatch(path, "directory", entry.kind_name())),
            None => Err(VfsError::not_found(path)),
        }
    }

    fn resolve_path(&self, path: &str) -> VfsResult<usize> {
        let parts = path::components(path)?;
        self.resolve(&parts, path)
    }

    /// Descend from the root without creating anything.
    fn resolve(&self, parts: &[&str], path: &str) -> VfsResult<usize> {
        let mut current = 0;
        for part in parts {
            let children = self.children(current, path)?;
            current = *children.get(*part).ok_or_else(|| VfsError::not_found(path))?;
        }
        Ok(current)
    }

    /// Descend from the root, creating missing directories.
    fn ensure_dirs(&mut self, parts: &[&str], path: &str) -> VfsResult<usize> {
        let mut current = 0;
        for part in parts {
            let existing = self.children(current, path)?.get(*part).copied();
            let next = match existing {
                Some(existing) => existing,
                None => {
                    let index = self.alloc(Node::directory(*part, Some(current)));
                    if let Some(Entry::Directory(children)) =
                        self.node_at_mut(current).map(|n| &mut n.entry)
                    {
                        children.insert(part.to_string(), index);
                    }
                    index
                }
            };
            current = next;
        }
        // The final component must itself be a directory.
        self.children(current, path)?;
        Ok(current)
    }

    /// Unlink a node from its parent directory.
    fn detach(&mut self, index: usize) {
        let Some(node) = self.node_at(index) else {
            return;
        };
        let (Some(parent), name) = (node.parent, node.name.clone()) else {
            return;
        };
        if let Some(Entry::Directory(children)) = self.node_at_mut(parent).map(|n| &mut n.entry) {
            children.remove(&name);
        }
    }

    /// Free a node and all of its descendants.
    fn free_subtree(&mut self, root: usize) {
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            let Some(slot) = self.slots.get_mut(index) else {
                continue;
            };
            let Some(node) = slot.node.take() else {
                continue;
            };
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index);
            self.live -= 1;
            if let Entry::Directory(children) = node.entry {
                stack.extend(children.into_values());
            }
        }
    }

    fn tree_into(&self, index: usize, path: &str, depth: usize, out: &mut Vec<TreeEntry>) -> VfsResult<()> {
        let (files, dirs) = {
            let children = self.children(index, path)?;
            let mut files = Vec::new();
            let mut dirs = Vec::new();
            for (name, &child) in children {
                match self.node_at(child) {
                    Some(node) if node.is_dir() => dirs.push((name.clone(), child)),
                    Some(_) => files.push(name.clone()),
                    None => {}
                }
            }
            files.sort();
            dirs.sort();
            (files, dirs)
        };

        for name in files {
            out.push(TreeEntry {
                depth,
                name,
                is_dir: false,
            });
        }
        for (name, child) in dirs {
            out.push(TreeEntry {
                depth,
                name,
                is_dir: true,
            });
            self.tree_into(child, path, depth + 1, out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_then_read() {
        let mut vfs = Vfs::new();
        vfs.create_file("1/caches/cfg", FilePayload::bytes(b"hello".to_vec()))
            .unwrap();
        assert_eq!(vfs.read_bytes("1/caches/cfg").unwrap(), b"hello");
        assert!(vfs.exists("1/caches"));
    }

    #[test]
    fn test_mkdir_is_idempotent() {
        let mut vfs = Vfs::new();
        let a = vfs.mkdir("a/b/c").unwrap();
        let b = vfs.mkdir("a/b/c").unwrap();
        assert_eq!(a, b);
        assert_eq!(vfs.len(), 4);
        assert_eq!(vfs.path_of(a).as_deref(), Some("a/b/c"));
    }

    #[test]
    fn test_mkdir_root() {
        let mut vfs = Vfs::new();
        assert_eq!(vfs.mkdir("").unwrap(), NodeId::ROOT);
    }

    #[test]
    fn test_read_does_not_autovivify() {
        let vfs = Vfs::new();
        assert!(matches!(vfs.read_file("a/b"), Err(VfsError::NotFound { .. })));
        assert!(vfs.is_empty());
    }

    #[test]
    fn test_remove_file_missing() {
        let mut vfs = Vfs::new();
        vfs.mkdir("a").unwrap();
        assert!(matches!(vfs.remove_file("a/x"), Err(VfsError::NotFound { .. })));
        assert!(matches!(vfs.remove_file("b/x"), Err(VfsError::NotFound { .. })));
    }

    #[test]
    fn test_rmdir_recursive() {
        let mut vfs = Vfs::new();
        vfs.create_file("g/files/1/a/key", FilePayload::bytes(vec![1]))
            .unwrap();
        vfs.create_file("g/files/1/b/key", FilePayload::bytes(vec![2]))
            .unwrap();
        vfs.create_file("g/stats", FilePayload::empty(FileKind::Counters))
            .unwrap();
        vfs.rmdir("g/files").unwrap();

        assert!(matches!(vfs.read_file("g/files/1/a/key"), Err(VfsError::NotFound { .. })));
        assert!(vfs.read_counters("g/stats").is_ok());
        // root, g, stats
        assert_eq!(vfs.len(), 3);
    }

    #[test]
    fn test_rmdir_missing_and_root() {
        let mut vfs = Vfs::new();
        assert!(matches!(vfs.rmdir("nope"), Err(VfsError::NotFound { .. })));
        assert!(matches!(vfs.rmdir(""), Err(VfsError::InvalidPath { .. })));
    }

    #[test]
    fn test_type_mismatch_signals() {
        let mut vfs = Vfs::new();
        vfs.create_file("a/list", FilePayload::list(["x"])).unwrap();

        assert!(matches!(
            vfs.read_bytes("a/list"),
            Err(VfsError::TypeMismatch { expected: "bytes", found: "list", .. })
        ));
        assert!(matches!(
            vfs.read_file("a"),
            Err(VfsError::TypeMismatch { expected: "file", .. })
        ));
        assert!(matches!(
            vfs.rmdir("a/list"),
            Err(VfsError::TypeMismatch { expected: "directory", .. })
        ));
        assert!(matches!(vfs.remove_file("a"), Err(VfsError::TypeMismatch { .. })));
        assert!(matches!(
            vfs.create_file("a/list/child", FilePayload::empty(FileKind::Bytes)),
            Err(VfsError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_overwrite_replaces_kind() {
        let mut vfs = Vfs::new();
        vfs.create_file("a/f", FilePayload::bytes(vec![1, 2, 3])).unwrap();
        vfs.create_file("a/f", FilePayload::counters([(1, 5)])).unwrap();
        assert_eq!(vfs.read_counters("a/f").unwrap().get(&1), Some(&5));
    }

    #[test]
    fn test_overwrite_directory_with_file() {
        let mut vfs = Vfs::new();
        vfs.create_file("a/d/x", FilePayload::empty(FileKind::Bytes)).unwrap();
        let before = vfs.len();
        vfs.create_file("a/d", FilePayload::empty(FileKind::List)).unwrap();
        assert!(vfs.read_list("a/d").unwrap().is_empty());
        assert_eq!(vfs.len(), before - 1);
    }

    #[test]
    fn test_stale_handle_after_slot_reuse() {
        let mut vfs = Vfs::new();
        let old = vfs.mkdir("a").unwrap();
        vfs.rmdir("a").unwrap();
        let new = vfs.mkdir("b").unwrap();

        assert_eq!(old.index(), new.index());
        assert!(vfs.node(old).is_none());
        assert_eq!(vfs.node(new).map(Node::name), Some("b"));
    }

    #[test]
    fn test_parent_links() {
        let mut vfs = Vfs::new();
        let c = vfs.mkdir("a/b/c").unwrap();
        let b = vfs.parent(c).unwrap();
        assert_eq!(vfs.node(b).map(Node::name), Some("b"));
        assert_eq!(vfs.parent(NodeId::ROOT), None);
    }

    #[test]
    fn test_ls_and_tree() {
        let mut vfs = Vfs::new();
        vfs.create_file("g/caches/cfg", FilePayload::empty(FileKind::Bytes)).unwrap();
        vfs.create_file("g/stats", FilePayload::empty(FileKind::Counters)).unwrap();
        vfs.mkdir("g/regex").unwrap();

        let (files, dirs) = vfs.ls("g").unwrap();
        assert_eq!(files, vec!["stats".to_string()]);
        assert_eq!(dirs, vec!["caches".to_string(), "regex".to_string()]);

        let lines: Vec<String> = vfs.tree("").unwrap().iter().map(|e| e.to_string()).collect();
        assert_eq!(
            lines,
            vec!["D g", "F | stats", "D | caches", "F | | cfg", "D | regex"]
        );
    }

    #[test]
    fn test_paths_are_case_sensitive() {
        let mut vfs = Vfs::new();
        vfs.create_file("A/x", FilePayload::bytes(vec![1])).unwrap();
        assert!(vfs.read_file("a/x").is_err());
    }
}
