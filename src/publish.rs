//! Lays out a local directory tree the way a static web disk expects to find it on the server.
//!
//! For every directory the output holds the same directory plus a `.index` listing.  Each
//! regular file is stored under its escaped stem followed by its original extension, so that
//! `d1/d2/name.ext` ends up at `d1/d2/<escape(name)>.ext`.  The result can be served by any
//! static HTTP server.

use std::{
    collections::HashMap,
    fs,
    io::{Error, ErrorKind, Result},
    path::Path,
};

use log::{debug, trace};

use crate::{
    escape::escape_for_file_name,
    index::FileEntry,
    listing::{format_listing, ListingEntry, INDEX_FILE_NAME},
    path::split_extension,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    pub directories: u64,
    pub files: u64,
    pub bytes: u64,
}

/// The name a file called `name` is stored under on the server.
pub fn object_file_name(name: &str) -> String {
    let (stem, extension) = split_extension(name);
    escape_for_file_name(stem) + extension.unwrap_or_default()
}

/// Publishes the tree at `source` into `destination`, which is created if needed.
pub fn publish(source: &Path, destination: &Path) -> Result<PublishStats> {
    let mut stats = PublishStats::default();
    publish_directory(source, destination, &mut stats)?;
    Ok(stats)
}

fn publish_directory(source: &Path, destination: &Path, stats: &mut PublishStats) -> Result<()> {
    trace!("publishing {source:?} to {destination:?}");
    fs::create_dir_all(destination)?;
    stats.directories += 1;

    let mut children = vec![];
    for dirent in fs::read_dir(source)? {
        let dirent = dirent?;
        let name = dirent.file_name().into_string().map_err(|name| {
            Error::new(
                ErrorKind::InvalidData,
                format!("file name {name:?} is not valid UTF-8"),
            )
        })?;
        if name.contains(['\t', '\n']) {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("file name {name:?} can't be listed"),
            ));
        }
        children.push((name, dirent.path(), dirent.file_type()?));
    }
    children.sort_by(|a, b| a.0.cmp(&b.0));

    // Directories keep their names while files are escaped, so siblings can clash.
    let mut published = HashMap::new();
    let mut listing = vec![];
    for (name, path, file_type) in children {
        if name == INDEX_FILE_NAME {
            debug!("skipping {path:?}: reserved name");
            continue;
        }

        let target = if file_type.is_dir() {
            name.clone()
        } else if file_type.is_file() {
            object_file_name(&name)
        } else {
            debug!("skipping {path:?}: not a regular file or directory");
            continue;
        };
        if let Some(other) = published.insert(target.clone(), name.clone()) {
            return Err(Error::new(
                ErrorKind::AlreadyExists,
                format!("{other:?} and {name:?} in {source:?} would both be published as {target:?}"),
            ));
        }

        let entry = if file_type.is_dir() {
            publish_directory(&path, &destination.join(&target), stats)?;
            FileEntry::directory()
        } else {
            let size = fs::copy(&path, destination.join(&target))?;
            stats.files += 1;
            stats.bytes += size;
            FileEntry::file(size)
        };

        listing.push(ListingEntry { name, entry });
    }

    fs::write(destination.join(INDEX_FILE_NAME), format_listing(&listing))
}
