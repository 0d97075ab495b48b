//! Read-only metadata for a disk backed by a statically served remote tree.
//!
//! The view answers metadata queries from the [`Index`] of its [`WebObjectStorage`] and loads
//! the missing parts of the remote tree the first time a query touches them.  Nothing about the
//! tree can be modified: transactions accept the full set of mutations but either ignore them or
//! reject them with [`Error::NotAllowed`].
//!
//! [`Index`]: crate::index::Index

use std::{
    collections::{BTreeMap, HashMap},
    ops::Bound,
    sync::Arc,
    time::SystemTime,
};

use log::trace;

use crate::{
    error::{Error, Result},
    escape::escape_for_file_name,
    index::FileEntry,
    metadata::{DirectoryIterator, MetadataStorage, MetadataTransaction, StoredObject},
    object_storage::WebObjectStorage,
    path, query,
};

/// The metadata of a mounted static web disk.
#[derive(Debug)]
pub struct StaticFilesMetadata {
    storage: Arc<WebObjectStorage>,
}

/// Whether some key of `files` is `path` or sorts right after it with `path` as a prefix.
fn has_path_or_descendant(files: &BTreeMap<String, FileEntry>, path: &str) -> bool {
    if files.contains_key(path) {
        return true;
    }

    let mut after = files.range::<str, _>((Bound::Included(path), Bound::Unbounded));
    let Some((next, _)) = after.next() else {
        return false;
    };
    if next.starts_with(path) {
        return true;
    }

    files
        .range::<str, _>((Bound::Unbounded, Bound::Excluded(path)))
        .next_back()
        .is_some_and(|(prev, _)| prev.starts_with(path))
}

impl StaticFilesMetadata {
    pub fn new(storage: Arc<WebObjectStorage>) -> Self {
        Self { storage }
    }

    pub fn object_storage(&self) -> &Arc<WebObjectStorage> {
        &self.storage
    }

    /// Makes sure that `path` has been looked up on the server.
    ///
    /// Returns `Ok(false)` if loading failed but the failure was not escalated.  Failures are
    /// escalated to [`Error::Network`] if `throw_on_error` says so, or, if it's `None`, when the
    /// current thread is serving a query (see [`query::QueryScope`]).
    pub fn initialize_if_needed(&self, path: &str, throw_on_error: Option<bool>) -> Result<bool> {
        if self.storage.index().contains(path) {
            return Ok(true);
        }

        match self.storage.initialize(&self.storage.url_for(path)) {
            Ok(()) => Ok(true),
            Err(source) => {
                if throw_on_error.unwrap_or_else(query::is_attached) {
                    return Err(Error::Network { source });
                }
                trace!("Cannot load disk metadata. Error: {source}");
                Ok(false)
            }
        }
    }

    fn missing(&self, path: &str) -> Error {
        let known = cfg!(debug_assertions).then(|| self.storage.index().paths().join(", "));
        Error::FileDoesntExist {
            path: path.to_string(),
            known,
        }
    }

    pub fn assert_exists(&self, path: &str) -> Result<()> {
        self.initialize_if_needed(path, None)?;

        if !self.exists(path) {
            return Err(self.missing(path));
        }
        Ok(())
    }

    /// Looks up a path that must be listed in the index itself.
    fn entry(&self, path: &str) -> Result<FileEntry> {
        self.assert_exists(path)?;
        self.storage
            .index()
            .get(path)
            .ok_or_else(|| Error::no_such_path(path))
    }
}

impl MetadataStorage for StaticFilesMetadata {
    fn create_transaction(&self) -> Box<dyn MetadataTransaction + '_> {
        Box::new(StaticFilesTransaction::new(self))
    }

    fn path(&self) -> &str {
        ""
    }

    fn exists(&self, path: &str) -> bool {
        // A path with an extension names a file, and it's the directory holding it that has a
        // listing on the server.
        let listed = if path::has_extension(path) {
            path::parent_path(path)
        } else {
            path
        };
        if let Err(err) = self.initialize_if_needed(listed, Some(false)) {
            trace!("Checking {path:?} without a listing of {listed:?}: {err}");
        }

        let files = self.storage.index().read();
        !files.is_empty() && has_path_or_descendant(&files, path)
    }

    fn is_file(&self, path: &str) -> Result<bool> {
        Ok(self.entry(path)?.is_file())
    }

    fn is_directory(&self, path: &str) -> Result<bool> {
        Ok(self.entry(path)?.is_directory())
    }

    fn file_size(&self, path: &str) -> Result<u64> {
        Ok(self.entry(path)?.size)
    }

    fn list_directory(&self, path: &str) -> Vec<String> {
        self.storage
            .index()
            .read()
            .keys()
            .filter(|file| file.starts_with(path))
            .cloned()
            .collect()
    }

    fn iterate_directory(&self, path: &str) -> Result<DirectoryIterator> {
        if !self.initialize_if_needed(path, None)? {
            return Ok(DirectoryIterator::empty());
        }

        self.assert_exists(path)?;

        let dir = path::normalize_dir(path);
        let children: Vec<String> = self
            .storage
            .index()
            .read()
            .keys()
            .filter(|file| path::parent_path(file) == dir)
            .cloned()
            .collect();

        trace!("Iterate directory {path} with {} files", children.len());
        Ok(DirectoryIterator::new(children))
    }

    fn read_file_to_string(&self, _path: &str) -> Result<String> {
        Err(Error::NotAllowed)
    }

    fn last_modified(&self, _path: &str) -> SystemTime {
        SystemTime::UNIX_EPOCH
    }

    fn last_changed(&self, _path: &str) -> i64 {
        0
    }

    fn hardlink_count(&self, _path: &str) -> u32 {
        1
    }

    fn storage_objects(&self, path: &str) -> Result<Vec<StoredObject>> {
        let entry = self.entry(path)?;

        let (dir, name) = path::split_parent(path);
        let (stem, extension) = path::split_extension(name);
        let object_name = escape_for_file_name(stem) + extension.unwrap_or_default();
        // the key is whatever follows the base URL, leading slash included
        let remote_path = format!("/{}", path::join(dir, &object_name));

        Ok(vec![StoredObject {
            storage: Arc::clone(&self.storage),
            remote_path,
            bytes_size: entry.size,
            is_remote: true,
        }])
    }

    fn serialized_metadata(&self, _paths: &[String]) -> Result<HashMap<String, String>> {
        Err(Error::NotImplemented("serialized_metadata"))
    }
}

/// A transaction on a [`StaticFilesMetadata`].
///
/// Creating directories or metadata files and committing succeed without doing anything, since
/// the engine issues them while attaching tables.  Everything else fails.
#[derive(Debug)]
pub struct StaticFilesTransaction<'a> {
    metadata: &'a StaticFilesMetadata,
}

impl<'a> StaticFilesTransaction<'a> {
    pub fn new(metadata: &'a StaticFilesMetadata) -> Self {
        Self { metadata }
    }
}

impl MetadataTransaction for StaticFilesTransaction<'_> {
    fn storage_for_non_transactional_reads(&self) -> &dyn MetadataStorage {
        self.metadata
    }

    fn commit(&mut self) -> Result<()> {
        // nothing was staged
        Ok(())
    }

    fn create_directory(&mut self, _path: &str) -> Result<()> {
        Ok(())
    }

    fn create_directory_recursive(&mut self, _path: &str) -> Result<()> {
        Ok(())
    }

    fn create_empty_metadata_file(&mut self, _path: &str) -> Result<()> {
        Ok(())
    }

    fn create_metadata_file(&mut self, _path: &str, _blob_name: &str, _size: u64) -> Result<()> {
        Ok(())
    }

    fn write_string_to_file(&mut self, _path: &str, _data: &str) -> Result<()> {
        Err(Error::NotAllowed)
    }

    fn set_last_modified(&mut self, _path: &str, _timestamp: SystemTime) -> Result<()> {
        Err(Error::NotAllowed)
    }

    fn set_read_only(&mut self, _path: &str) -> Result<()> {
        Err(Error::NotAllowed)
    }

    fn chmod(&mut self, _path: &str, _mode: u32) -> Result<()> {
        Err(Error::NotImplemented("chmod"))
    }

    fn unlink_file(&mut self, _path: &str) -> Result<()> {
        Err(Error::NotAllowed)
    }

    fn remove_directory(&mut self, _path: &str) -> Result<()> {
        Err(Error::NotAllowed)
    }

    fn remove_recursive(&mut self, _path: &str) -> Result<()> {
        Err(Error::NotAllowed)
    }

    fn move_file(&mut self, _from: &str, _to: &str) -> Result<()> {
        Err(Error::NotAllowed)
    }

    fn move_directory(&mut self, _from: &str, _to: &str) -> Result<()> {
        Err(Error::NotAllowed)
    }

    fn replace_file(&mut self, _from: &str, _to: &str) -> Result<()> {
        Err(Error::NotAllowed)
    }

    fn create_hard_link(&mut self, _from: &str, _to: &str) -> Result<()> {
        Err(Error::NotAllowed)
    }

    fn add_blob_to_metadata(&mut self, _path: &str, _blob_name: &str, _size: u64) -> Result<()> {
        Err(Error::NotAllowed)
    }

    fn unlink_metadata(&mut self, _path: &str) -> Result<()> {
        Err(Error::NotAllowed)
    }
}
