//! Arena node types for the virtual filesystem.

use std::collections::{BTreeMap, HashMap};

/// Stable handle to a node in the VFS arena.
///
/// The generation guards against slot reuse: once a node is deleted, every
/// handle to it stops resolving, even after its slot is recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

impl NodeId {
    /// The root directory handle. The root is never freed.
    pub const ROOT: NodeId = NodeId {
        index: 0,
        generation: 0,
    };

    /// Arena slot index.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// The closed set of file payload kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Raw byte buffer.
    Bytes,
    /// Integer-keyed counter map.
    Counters,
    /// Ordered list of strings.
    List,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Bytes => "bytes",
            FileKind::Counters => "counters",
            FileKind::List => "list",
        }
    }
}

/// Typed file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePayload {
    Bytes(Vec<u8>),
    Counters(BTreeMap<u64, u64>),
    List(Vec<String>),
}

impl FilePayload {
    /// An empty payload of the given kind.
    pub fn empty(kind: FileKind) -> Self {
        match kind {
            FileKind::Bytes => FilePayload::Bytes(Vec::new()),
            FileKind::Counters => FilePayload::Counters(BTreeMap::new()),
            FileKind::List => FilePayload::List(Vec::new()),
        }
    }

    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        FilePayload::Bytes(data.into())
    }

    pub fn counters(entries: impl IntoIterator<Item = (u64, u64)>) -> Self {
        FilePayload::Counters(entries.into_iter().collect())
    }

    pub fn list<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Self {
        FilePayload::List(items.into_iter().map(Into::into).collect())
    }

    pub fn kind(&self) -> FileKind {
        match self {
            FilePayload::Bytes(_) => FileKind::Bytes,
            FilePayload::Counters(_) => FileKind::Counters,
            FilePayload::List(_) => FileKind::List,
        }
    }
}

/// Directory or file contents of a node.
#[derive(Debug)]
pub(crate) enum Entry {
    Directory(HashMap<String, usize>),
    File(FilePayload),
}

impl Entry {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Entry::Directory(_) => "directory",
            Entry::File(payload) => payload.kind().as_str(),
        }
    }
}

/// A node in the VFS arena.
#[derive(Debug)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) parent: Option<usize>,
    pub(crate) entry: Entry,
}

impl Node {
    pub(crate) fn directory(name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            name: name.into(),
            parent,
            entry: Entry::Directory(HashMap::new()),
        }
    }

    pub(crate) fn file(name: impl Into<String>, parent: usize, payload: FilePayload) -> Self {
        Self {
            name: name.into(),
            parent: Some(parent),
            entry: Entry::File(payload),
        }
    }

    /// Name of this node within its parent. Empty for the root.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.entry, Entry::Directory(_))
    }

    /// The file payload, or `None` for directories.
    pub fn payload(&self) -> Option<&FilePayload> {
        match &self.entry {
            Entry::File(payload) => Some(payload),
            Entry::Directory(_) => None,
        }
    }
}

/// An arena slot. Empty slots sit on the free list.
#[derive(Debug)]
pub(crate) struct Slot {
    pub(crate) generation: u32,
    pub(crate) node: Option<Node>,
}
