//! In-memory host storage.
//!
//! Every root owns one node arena behind a `std::sync::Mutex`; handles are
//! `(arena, node id)` pairs, so a write through one handle is visible
//! through every other handle to the same node, and a handle to a removed
//! node fails with `NotFound` the next time it is used.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{HandleFsError, Result};
use crate::handle::{
    guess_content_type, AccessMode, DirHandle, DirectoryHandle, FileHandle, FileMetadata,
    FileRef, Handle, Host, PermissionState,
};

/// Logical clock origin for modification times (2023-11-14T22:13:20Z).
const CLOCK_EPOCH_MS: u64 = 1_700_000_000_000;

const ROOT_ID: u64 = 0;

/// Order in which `entries()` returns children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationOrder {
    Insertion,
    Reversed,
}

enum NodeKind {
    Directory { children: Vec<u64> },
    File { data: Vec<u8>, modified: u64 },
}

struct Node {
    name: String,
    kind: NodeKind,
}

struct Arena {
    nodes: HashMap<u64, Node>,
    next_id: u64,
    clock: u64,
    permission: PermissionState,
    request_outcome: PermissionState,
    order: EnumerationOrder,
}

impl Arena {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        CLOCK_EPOCH_MS + self.clock
    }

    fn node(&self, id: u64, name: &str) -> Result<&Node> {
        self.nodes.get(&id).ok_or_else(|| HandleFsError::NotFound {
            path: name.to_string(),
        })
    }

    fn children(&self, id: u64, name: &str) -> Result<&Vec<u64>> {
        match &self.node(id, name)?.kind {
            NodeKind::Directory { children } => Ok(children),
            NodeKind::File { .. } => Err(HandleFsError::NotADirectory {
                path: name.to_string(),
            }),
        }
    }

    fn find_child(&self, parent: u64, parent_name: &str, name: &str) -> Result<Option<u64>> {
        let children = self.children(parent, parent_name)?;
        Ok(children
            .iter()
            .copied()
            .find(|c| self.nodes.get(c).map(|n| n.name == name).unwrap_or(false)))
    }

    fn insert_child(&mut self, parent: u64, name: &str, kind: NodeKind) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                name: name.to_string(),
                kind,
            },
        );
        if let Some(Node {
            kind: NodeKind::Directory { children },
            ..
        }) = self.nodes.get_mut(&parent)
        {
            children.push(id);
        }
        id
    }

    fn remove_subtree(&mut self, id: u64) {
        if let Some(node) = self.nodes.remove(&id) {
            if let NodeKind::Directory { children } = node.kind {
                for child in children {
                    self.remove_subtree(child);
                }
            }
        }
    }

    fn check(&self, mode: AccessMode) -> Result<()> {
        match self.permission {
            PermissionState::Granted => Ok(()),
            state => Err(HandleFsError::Permission { mode, state }),
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(HandleFsError::InvalidPath {
            path: name.to_string(),
        });
    }
    Ok(())
}

/// A directory in an in-memory root.
pub struct MemoryDirectory {
    arena: Arc<Mutex<Arena>>,
    id: u64,
    name: String,
}

/// A file in an in-memory root.
pub struct MemoryFile {
    arena: Arc<Mutex<Arena>>,
    id: u64,
    name: String,
}

fn lock(arena: &Mutex<Arena>) -> MutexGuard<'_, Arena> {
    // A panic while holding the lock leaves plain data behind; keep going.
    arena.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryDirectory {
    /// Create an empty root directory with its own storage.
    pub fn new_root(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_ID,
            Node {
                name: name.clone(),
                kind: NodeKind::Directory {
                    children: Vec::new(),
                },
            },
        );
        Arc::new(Self {
            arena: Arc::new(Mutex::new(Arena {
                nodes,
                next_id: ROOT_ID + 1,
                clock: 0,
                permission: PermissionState::Granted,
                request_outcome: PermissionState::Granted,
                order: EnumerationOrder::Insertion,
            })),
            id: ROOT_ID,
            name,
        })
    }

    /// Change the permission state reported for the whole storage.
    /// Anything other than `Granted` makes every operation fail.
    pub fn set_permission(&self, state: PermissionState) {
        lock(&self.arena).permission = state;
    }

    /// What a `request_permission` prompt resolves to.
    pub fn set_request_outcome(&self, state: PermissionState) {
        lock(&self.arena).request_outcome = state;
    }

    pub fn set_enumeration_order(&self, order: EnumerationOrder) {
        lock(&self.arena).order = order;
    }

    fn child_dir(&self, id: u64, name: &str) -> DirHandle {
        Arc::new(MemoryDirectory {
            arena: self.arena.clone(),
            id,
            name: name.to_string(),
        })
    }

    fn child_file(&self, id: u64, name: &str) -> FileRef {
        Arc::new(MemoryFile {
            arena: self.arena.clone(),
            id,
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl DirectoryHandle for MemoryDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn reference(&self) -> Option<String> {
        (self.id == ROOT_ID).then(|| format!("memory:{}", self.name))
    }

    async fn entries(&self) -> Result<Vec<Handle>> {
        let arena = lock(&self.arena);
        arena.check(AccessMode::Read)?;
        let mut out = Vec::new();
        for &child in arena.children(self.id, &self.name)? {
            let Some(node) = arena.nodes.get(&child) else {
                continue;
            };
            out.push(match node.kind {
                NodeKind::Directory { .. } => Handle::Directory(self.child_dir(child, &node.name)),
                NodeKind::File { .. } => Handle::File(self.child_file(child, &node.name)),
            });
        }
        if arena.order == EnumerationOrder::Reversed {
            out.reverse();
        }
        Ok(out)
    }

    async fn get_directory(&self, name: &str, create: bool) -> Result<DirHandle> {
        validate_name(name)?;
        let mut arena = lock(&self.arena);
        arena.check(if create { AccessMode::ReadWrite } else { AccessMode::Read })?;
        match arena.find_child(self.id, &self.name, name)? {
            Some(id) => match arena.node(id, name)?.kind {
                NodeKind::Directory { .. } => Ok(self.child_dir(id, name)),
                NodeKind::File { .. } => Err(HandleFsError::NotADirectory {
                    path: name.to_string(),
                }),
            },
            None if create => {
                let id = arena.insert_child(
                    self.id,
                    name,
                    NodeKind::Directory {
                        children: Vec::new(),
                    },
                );
                Ok(self.child_dir(id, name))
            }
            None => Err(HandleFsError::NotFound {
                path: name.to_string(),
            }),
        }
    }

    async fn get_file(&self, name: &str, create: bool) -> Result<FileRef> {
        validate_name(name)?;
        let mut arena = lock(&self.arena);
        arena.check(if create { AccessMode::ReadWrite } else { AccessMode::Read })?;
        match arena.find_child(self.id, &self.name, name)? {
            Some(id) => match arena.node(id, name)?.kind {
                NodeKind::File { .. } => Ok(self.child_file(id, name)),
                NodeKind::Directory { .. } => Err(HandleFsError::NotAFile {
                    path: name.to_string(),
                }),
            },
            None if create => {
                let modified = arena.tick();
                let id = arena.insert_child(
                    self.id,
                    name,
                    NodeKind::File {
                        data: Vec::new(),
                        modified,
                    },
                );
                Ok(self.child_file(id, name))
            }
            None => Err(HandleFsError::NotFound {
                path: name.to_string(),
            }),
        }
    }

    async fn remove_entry(&self, name: &str, recursive: bool) -> Result<()> {
        let mut arena = lock(&self.arena);
        arena.check(AccessMode::ReadWrite)?;
        let id = arena
            .find_child(self.id, &self.name, name)?
            .ok_or_else(|| HandleFsError::NotFound {
                path: name.to_string(),
            })?;
        if let NodeKind::Directory { children } = &arena.node(id, name)?.kind {
            if !children.is_empty() && !recursive {
                return Err(HandleFsError::DirectoryNotEmpty {
                    path: name.to_string(),
                });
            }
        }
        if let Some(Node {
            kind: NodeKind::Directory { children },
            ..
        }) = arena.nodes.get_mut(&self.id)
        {
            children.retain(|&c| c != id);
        }
        arena.remove_subtree(id);
        Ok(())
    }

    async fn query_permission(&self, _mode: AccessMode) -> Result<PermissionState> {
        Ok(lock(&self.arena).permission)
    }

    async fn request_permission(&self, _mode: AccessMode) -> Result<PermissionState> {
        let mut arena = lock(&self.arena);
        if arena.permission != PermissionState::Granted {
            arena.permission = arena.request_outcome;
        }
        Ok(arena.permission)
    }
}

#[async_trait]
impl FileHandle for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn metadata(&self) -> Result<FileMetadata> {
        let arena = lock(&self.arena);
        arena.check(AccessMode::Read)?;
        match &arena.node(self.id, &self.name)?.kind {
            NodeKind::File { data, modified } => Ok(FileMetadata {
                size: data.len() as u64,
                last_modified: *modified,
                content_type: guess_content_type(&self.name).to_string(),
            }),
            NodeKind::Directory { .. } => Err(HandleFsError::NotAFile {
                path: self.name.clone(),
            }),
        }
    }

    async fn read(&self) -> Result<Vec<u8>> {
        let arena = lock(&self.arena);
        arena.check(AccessMode::Read)?;
        match &arena.node(self.id, &self.name)?.kind {
            NodeKind::File { data, .. } => Ok(data.clone()),
            NodeKind::Directory { .. } => Err(HandleFsError::NotAFile {
                path: self.name.clone(),
            }),
        }
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut arena = lock(&self.arena);
        arena.check(AccessMode::ReadWrite)?;
        let now = arena.tick();
        let name = self.name.clone();
        match arena.nodes.get_mut(&self.id) {
            Some(Node {
                kind: NodeKind::File { data, modified },
                ..
            }) => {
                *data = bytes.to_vec();
                *modified = now;
                Ok(())
            }
            Some(_) => Err(HandleFsError::NotAFile { path: name }),
            None => Err(HandleFsError::NotFound { path: name }),
        }
    }
}

/// A host whose roots live in memory.
#[derive(Default)]
pub struct MemoryHost {
    roots: Mutex<HashMap<String, Arc<MemoryDirectory>>>,
    selected: Mutex<Option<String>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a named root and make it the picker's answer.
    pub fn add_root(&self, name: &str) -> Arc<MemoryDirectory> {
        let root = MemoryDirectory::new_root(name);
        self.roots
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(name.to_string(), root.clone());
        self.select(Some(name));
        root
    }

    /// Choose which root the picker returns; `None` simulates a cancel.
    pub fn select(&self, name: Option<&str>) {
        *self.selected.lock().unwrap_or_else(|p| p.into_inner()) = name.map(str::to_string);
    }

    /// Forget a root, as if its storage disappeared.
    pub fn drop_root(&self, name: &str) {
        self.roots
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(name);
    }

    fn root(&self, name: &str) -> Option<Arc<MemoryDirectory>> {
        self.roots
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(name)
            .cloned()
    }
}

#[async_trait]
impl Host for MemoryHost {
    async fn pick_directory(&self, _mode: AccessMode) -> Result<DirHandle> {
        let selected = self
            .selected
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        let root = selected
            .and_then(|name| self.root(&name))
            .ok_or_else(|| HandleFsError::Other("directory picker cancelled".to_string()))?;
        Ok(root as DirHandle)
    }

    async fn restore_directory(&self, reference: &str) -> Result<Option<DirHandle>> {
        let Some(name) = reference.strip_prefix("memory:") else {
            return Ok(None);
        };
        Ok(self.root(name).map(|r| r as DirHandle))
    }
}
