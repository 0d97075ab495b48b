//! Presents a statically served remote directory tree as a read-only disk.
//!
//! [`web::StaticFilesMetadata`] answers the metadata queries of a query engine (existence,
//! file/directory classification, sizes, listings, object references) for a tree published with
//! [`publish::publish`] and served over HTTP.  The remote tree is discovered lazily, one
//! `.index` listing at a time, and never modified.

pub mod error;
pub mod escape;
pub mod fetch;
pub mod index;
pub mod listing;
pub mod metadata;
pub mod object_storage;
mod path;
pub mod publish;
pub mod query;
pub mod web;

pub use error::{Error, ErrorCode, Result};
pub use fetch::FetchError;
