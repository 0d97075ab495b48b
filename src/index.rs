use std::{
    collections::{btree_map::Entry, BTreeMap},
    sync::{PoisonError, RwLock, RwLockReadGuard},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileEntry {
    pub file_type: FileType,
    pub size: u64,
}

impl FileEntry {
    pub fn file(size: u64) -> Self {
        Self {
            file_type: FileType::File,
            size,
        }
    }

    pub fn directory() -> Self {
        Self {
            file_type: FileType::Directory,
            size: 0,
        }
    }

    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }
}

/// The in-memory map of everything known about the remote tree, keyed by logical path.
///
/// Paths are ordered bytewise, so the descendants of a directory always sort directly after it.
/// The index only ever grows: entries are never removed, and inserting a path that is already
/// present leaves the existing entry untouched.
#[derive(Debug, Default)]
pub struct Index {
    files: RwLock<BTreeMap<String, FileEntry>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a consistent read-only snapshot of the index.  Writers are blocked while the guard
    /// is held, so keep it short.
    pub fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, FileEntry>> {
        // Inserts can't leave the map in a torn state, so a poisoned lock is still usable.
        self.files.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `path`, unless it's already present.  Returns whether the entry was added.
    pub fn insert(&self, path: impl Into<String>, entry: FileEntry) -> bool {
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        match files.entry(path.into()) {
            Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.read().contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<FileEntry> {
        self.read().get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// All known paths, in index order.
    pub fn paths(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }
}
