use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

use log::{debug, trace};
use percent_encoding::percent_decode_str;
use reqwest::Url;

use crate::{
    fetch::{Fetch, FetchError},
    index::{FileEntry, Index},
    listing::{parse_listing, INDEX_FILE_NAME},
    metadata::StoredObject,
    path,
};

/// How far below the requested directory a single load descends.  A served tree that nests
/// deeper than this is almost certainly a directory linked back to one of its ancestors.
pub const MAX_DEPTH: usize = 64;

/// A statically served remote tree: the base URL, the fetcher used to talk to it, and the
/// [`Index`] of everything learned about it so far.
pub struct WebObjectStorage {
    url: Url,
    fetcher: Box<dyn Fetch>,
    index: Index,
    // Serializes loads so that only one of them makes progress at a time.
    load_lock: Mutex<()>,
}

impl fmt::Debug for WebObjectStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebObjectStorage")
            .field("url", &self.url.as_str())
            .field("indexed", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl WebObjectStorage {
    /// Creates the storage for the tree rooted at `url`.  Nothing is fetched until the first
    /// call to [`WebObjectStorage::initialize`].
    ///
    /// Fails for URLs that can't have a path below them, like `mailto:` ones.
    pub fn new(mut url: Url, fetcher: Box<dyn Fetch>) -> Result<Self, FetchError> {
        if url.cannot_be_a_base() {
            return Err(FetchError::UnsupportedUrl(url.to_string()));
        }
        let trimmed = url.path().trim_end_matches('/').to_string();
        url.set_path(&trimmed);
        url.set_fragment(None);

        Ok(Self {
            url,
            fetcher,
            index: Index::new(),
            load_lock: Mutex::new(()),
        })
    }

    /// The base URL, without a trailing slash.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// The URL of `path`, relative to the base URL.  Each `/`-separated component is
    /// percent-encoded on its own, so `%` in a server-side name is sent as `%25`.  Any query
    /// string of the base URL is kept.
    pub fn url_for(&self, path: &str) -> Url {
        let mut url = self.url.clone();
        // can't fail: checked in new()
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend(path.split('/').filter(|component| !component.is_empty()));
        }
        url
    }

    /// Converts a URL below the base URL into the logical path it names.
    fn relative_path(&self, url: &Url) -> Result<String, FetchError> {
        let unsupported = || FetchError::UnsupportedUrl(url.to_string());

        if url.scheme() != self.url.scheme()
            || url.host() != self.url.host()
            || url.port() != self.url.port()
            || url.query() != self.url.query()
        {
            return Err(unsupported());
        }

        let rest = url
            .path()
            .strip_prefix(self.url.path().trim_end_matches('/'))
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .ok_or_else(unsupported)?;

        let mut components = vec![];
        for component in rest.split('/').filter(|component| !component.is_empty()) {
            let decoded = percent_decode_str(component)
                .decode_utf8()
                .map_err(|_| unsupported())?;
            components.push(decoded.into_owned());
        }
        Ok(components.join("/"))
    }

    /// Fetches the listing of the directory at `url_prefix` and everything below it, and merges
    /// it into the index.
    ///
    /// A directory without a listing doesn't exist on the server; that isn't an error and simply
    /// adds nothing.  Directories more than [`MAX_DEPTH`] levels below `url_prefix` fail the load
    /// with [`FetchError::TooDeep`].
    pub fn initialize(&self, url_prefix: &Url) -> Result<(), FetchError> {
        let dir = self.relative_path(url_prefix)?;
        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut todo = vec![(dir, 0)];
        while let Some((dir, depth)) = todo.pop() {
            for subdirectory in self.load_directory(&dir)? {
                if depth == MAX_DEPTH {
                    return Err(FetchError::TooDeep {
                        url: self.url_for(&subdirectory).to_string(),
                        limit: MAX_DEPTH,
                    });
                }
                todo.push((subdirectory, depth + 1));
            }
        }

        Ok(())
    }

    /// Merges the listing of a single directory into the index and returns the subdirectories
    /// it names.
    fn load_directory(&self, dir: &str) -> Result<Vec<String>, FetchError> {
        let listing_url = self.url_for(&path::join(dir, INDEX_FILE_NAME));
        trace!("Loading metadata for directory {dir:?} ({listing_url})");

        let Some(data) = self.fetcher.get(&listing_url)? else {
            debug!("No listing at {listing_url}");
            return Ok(vec![]);
        };

        let entries = parse_listing(&data).map_err(|source| FetchError::Listing {
            url: listing_url.to_string(),
            source,
        })?;

        let mut subdirectories = vec![];
        let mut added = 0;
        for listed in &entries {
            let child = path::join(dir, &listed.name);
            if listed.entry.is_directory() {
                subdirectories.push(child.clone());
            }
            if self.index.insert(child, listed.entry) {
                added += 1;
            }
        }
        if !dir.is_empty() {
            self.index.insert(dir, FileEntry::directory());
        }
        trace!(
            "Directory {dir:?} lists {} entries, {added} new",
            entries.len()
        );

        Ok(subdirectories)
    }

    /// Downloads the contents of a stored object, from [`StoredObject::url`].
    pub fn read_object(&self, object: &StoredObject) -> Result<Vec<u8>, FetchError> {
        let url = object.url();
        trace!("Reading object {url}");
        self.fetcher.get(&url)?.ok_or(FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}
