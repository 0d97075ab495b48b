//! The filesystem-metadata interfaces a disk presents to the query engine.

use std::{collections::HashMap, fmt, sync::Arc, time::SystemTime};

use reqwest::Url;

use crate::{error::Result, object_storage::WebObjectStorage, path};

/// A reference to one object holding (part of) a file's data.
#[derive(Clone)]
pub struct StoredObject {
    pub storage: Arc<WebObjectStorage>,
    /// The key of the object, relative to the storage's base URL.  Starts with `/`.
    pub remote_path: String,
    pub bytes_size: u64,
    pub is_remote: bool,
}

impl StoredObject {
    /// The absolute URL of the object, as requested by [`WebObjectStorage::read_object`].
    pub fn url(&self) -> Url {
        self.storage.url_for(&self.remote_path)
    }
}

impl fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredObject")
            .field("storage", &self.storage.url().as_str())
            .field("remote_path", &self.remote_path)
            .field("bytes_size", &self.bytes_size)
            .field("is_remote", &self.is_remote)
            .finish()
    }
}

/// An iterator over the entries of one directory.
///
/// The iterator owns a snapshot of the paths taken when it was created; later changes to the
/// underlying storage are not reflected.
#[derive(Debug, Default, Clone)]
pub struct DirectoryIterator {
    paths: std::vec::IntoIter<String>,
}

impl DirectoryIterator {
    pub fn new(paths: Vec<String>) -> Self {
        Self {
            paths: paths.into_iter(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The name of the next entry, without consuming it.
    pub fn peek_name(&self) -> Option<&str> {
        self.paths
            .as_slice()
            .first()
            .map(|path| path::split_parent(path).1)
    }
}

impl Iterator for DirectoryIterator {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.paths.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.paths.size_hint()
    }
}

impl ExactSizeIterator for DirectoryIterator {}

/// Read access to the metadata of a disk.
pub trait MetadataStorage {
    fn create_transaction(&self) -> Box<dyn MetadataTransaction + '_>;

    /// The root of the disk.
    fn path(&self) -> &str;

    fn exists(&self, path: &str) -> bool;
    fn is_file(&self, path: &str) -> Result<bool>;
    fn is_directory(&self, path: &str) -> Result<bool>;
    fn file_size(&self, path: &str) -> Result<u64>;

    /// Every known path below `path`, at any depth.
    fn list_directory(&self, path: &str) -> Vec<String>;
    /// The direct children of `path`.
    fn iterate_directory(&self, path: &str) -> Result<DirectoryIterator>;

    fn read_file_to_string(&self, path: &str) -> Result<String>;
    fn last_modified(&self, path: &str) -> SystemTime;
    fn last_changed(&self, path: &str) -> i64;
    fn hardlink_count(&self, path: &str) -> u32;

    fn storage_objects(&self, path: &str) -> Result<Vec<StoredObject>>;
    fn serialized_metadata(&self, paths: &[String]) -> Result<HashMap<String, String>>;
}

/// The mutating side of a disk's metadata.  Changes take effect on [`commit`].
///
/// [`commit`]: MetadataTransaction::commit
pub trait MetadataTransaction {
    fn storage_for_non_transactional_reads(&self) -> &dyn MetadataStorage;

    fn commit(&mut self) -> Result<()>;

    fn create_directory(&mut self, path: &str) -> Result<()>;
    fn create_directory_recursive(&mut self, path: &str) -> Result<()>;
    fn create_empty_metadata_file(&mut self, path: &str) -> Result<()>;
    fn create_metadata_file(&mut self, path: &str, blob_name: &str, size: u64) -> Result<()>;

    fn write_string_to_file(&mut self, path: &str, data: &str) -> Result<()>;
    fn set_last_modified(&mut self, path: &str, timestamp: SystemTime) -> Result<()>;
    fn set_read_only(&mut self, path: &str) -> Result<()>;
    fn chmod(&mut self, path: &str, mode: u32) -> Result<()>;

    fn unlink_file(&mut self, path: &str) -> Result<()>;
    fn remove_directory(&mut self, path: &str) -> Result<()>;
    fn remove_recursive(&mut self, path: &str) -> Result<()>;

    fn move_file(&mut self, from: &str, to: &str) -> Result<()>;
    fn move_directory(&mut self, from: &str, to: &str) -> Result<()>;
    fn replace_file(&mut self, from: &str, to: &str) -> Result<()>;
    fn create_hard_link(&mut self, from: &str, to: &str) -> Result<()>;

    fn add_blob_to_metadata(&mut self, path: &str, blob_name: &str, size: u64) -> Result<()>;
    fn unlink_metadata(&mut self, path: &str) -> Result<()>;
}
