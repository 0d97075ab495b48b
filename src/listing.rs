//! The `.index` listing that describes one remote directory.
//!
//! Every directory on the server carries a `.index` file with one line per child:
//!
//! ```text
//! <name>\t<is_directory>[\t<size>]\n
//! ```
//!
//! `is_directory` is `0` or `1`, and the size column is only present for files.  Names are the
//! logical (unescaped) names of the children, relative to the directory.

use std::fmt::Write;

use thiserror::Error;

use crate::index::{FileEntry, FileType};

/// The name of the listing file inside each remote directory.
pub const INDEX_FILE_NAME: &str = ".index";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub entry: FileEntry,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ListingError {
    #[error("listing is not valid UTF-8")]
    InvalidUtf8,
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: usize,
        expected: &'static str,
        found: usize,
    },
    #[error("line {line}: invalid name {name:?}")]
    InvalidName { line: usize, name: String },
    #[error("line {line}: invalid directory flag {flag:?}")]
    InvalidFlag { line: usize, flag: String },
    #[error("line {line}: invalid size {size:?}")]
    InvalidSize { line: usize, size: String },
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\t', '\n'])
}

/// Parses the contents of a `.index` file.
pub fn parse_listing(data: &[u8]) -> Result<Vec<ListingEntry>, ListingError> {
    let text = std::str::from_utf8(data).map_err(|_| ListingError::InvalidUtf8)?;
    let mut entries = vec![];

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        let (name, flag) = match fields.as_slice() {
            [name, flag] | [name, flag, _] => (*name, *flag),
            _ => {
                return Err(ListingError::FieldCount {
                    line: line_no,
                    expected: "2 or 3",
                    found: fields.len(),
                })
            }
        };

        if !valid_name(name) {
            return Err(ListingError::InvalidName {
                line: line_no,
                name: name.to_string(),
            });
        }

        let entry = match (flag, fields.get(2)) {
            ("1", None) => FileEntry::directory(),
            ("0", Some(size)) => {
                FileEntry::file(size.parse().map_err(|_| ListingError::InvalidSize {
                    line: line_no,
                    size: size.to_string(),
                })?)
            }
            ("1", Some(_)) => {
                return Err(ListingError::FieldCount {
                    line: line_no,
                    expected: "2",
                    found: 3,
                })
            }
            ("0", None) => {
                return Err(ListingError::FieldCount {
                    line: line_no,
                    expected: "3",
                    found: 2,
                })
            }
            (flag, _) => {
                return Err(ListingError::InvalidFlag {
                    line: line_no,
                    flag: flag.to_string(),
                })
            }
        };

        entries.push(ListingEntry {
            name: name.to_string(),
            entry,
        });
    }

    Ok(entries)
}

/// Formats a `.index` file.  Entries are written in the order given.
pub fn format_listing<'a>(entries: impl IntoIterator<Item = &'a ListingEntry>) -> String {
    let mut output = String::new();
    for ListingEntry { name, entry } in entries {
        // Writing to a String can't fail
        let _ = match entry.file_type {
            FileType::Directory => writeln!(output, "{name}\t1"),
            FileType::File => writeln!(output, "{name}\t0\t{}", entry.size),
        };
    }
    output
}
