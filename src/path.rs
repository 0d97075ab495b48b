//! Helpers for the `/`-separated logical paths used throughout the crate.
//!
//! Logical paths are plain strings, not [`std::path::Path`]s: they name remote objects and must
//! behave the same on every platform.

/// Splits off the last component of `path`.  Trailing slashes are ignored.
///
/// Returns `(parent, name)` where `parent` has no trailing slash (and is empty for top-level
/// names).
pub(crate) fn split_parent(path: &str) -> (&str, &str) {
    let path = path.trim_end_matches('/');
    match path.rfind('/') {
        Some(pos) => (path[..pos].trim_end_matches('/'), &path[pos + 1..]),
        None => ("", path),
    }
}

/// The directory containing `path`, without a trailing slash.
pub(crate) fn parent_path(path: &str) -> &str {
    split_parent(path).0
}

/// `path` with any trailing slashes removed, for comparing directory names.
pub(crate) fn normalize_dir(path: &str) -> &str {
    path.trim_end_matches('/')
}

/// Splits a file name into its stem and its extension (including the leading `.`).
///
/// A name that only starts with a dot, like `.index`, has no extension.  A name ending in a dot
/// has the extension `"."`.
pub(crate) fn split_extension(name: &str) -> (&str, Option<&str>) {
    if name == ".." {
        return (name, None);
    }
    match name.rfind('.') {
        Some(0) | None => (name, None),
        Some(pos) => (&name[..pos], Some(&name[pos..])),
    }
}

/// Whether the last component of `path` has an extension.
pub(crate) fn has_extension(path: &str) -> bool {
    split_extension(split_parent(path).1).1.is_some()
}

/// Joins two `/`-separated paths with exactly one `/` between them.  An empty `tail` leaves
/// `head` unchanged, and an empty `head` yields `tail`.
pub(crate) fn join(head: &str, tail: &str) -> String {
    let tail = tail.trim_start_matches('/');
    if tail.is_empty() {
        return head.to_string();
    }
    if head.is_empty() {
        return tail.to_string();
    }
    format!("{}/{}", head.trim_end_matches('/'), tail)
}
