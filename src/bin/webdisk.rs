use std::{io::Write, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Url;

use webdisk::{
    fetch::fetcher_for_url,
    metadata::MetadataStorage,
    object_storage::WebObjectStorage,
    publish::publish,
    query::QueryScope,
    web::StaticFilesMetadata,
};

/// webdisk
#[derive(Debug, Parser)]
#[clap(name = "webdisk", version)]
pub struct App {
    /// Timeout for each HTTP request, in seconds
    #[clap(long, global = true)]
    timeout: Option<u64>,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Lays out a local directory so that it can be served as a static web disk
    Publish {
        source: PathBuf,
        destination: PathBuf,
    },
    /// Lists a directory of a remote tree
    Ls {
        /// the base URL of the tree (http://, https:// or file://)
        url: Url,
        #[clap(default_value = "")]
        path: String,
        /// list everything below the directory instead of its direct children
        #[clap(long)]
        recursive: bool,
    },
    /// Shows what is known about a path
    Stat { url: Url, path: String },
    /// Writes the contents of a remote file to stdout
    Cat { url: Url, path: String },
}

fn open(url: &Url, timeout: Option<u64>) -> Result<StaticFilesMetadata> {
    let fetcher = fetcher_for_url(url, timeout.map(Duration::from_secs))?;
    let storage = WebObjectStorage::new(url.clone(), fetcher)?;
    Ok(StaticFilesMetadata::new(Arc::new(storage)))
}

fn main() -> Result<()> {
    env_logger::init();

    let args = App::parse();

    // Everything the CLI does is on behalf of the user, so fetch failures are errors.
    let _scope = QueryScope::enter();

    match args.cmd {
        Command::Publish {
            ref source,
            ref destination,
        } => {
            let stats = publish(source, destination)?;
            println!(
                "published {} files ({} bytes) in {} directories",
                stats.files, stats.bytes, stats.directories
            );
        }
        Command::Ls {
            ref url,
            ref path,
            recursive,
        } => {
            let metadata = open(url, args.timeout)?;
            if recursive {
                let progress = ProgressBar::new_spinner();
                progress.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
                progress.set_message(format!("Fetching listings below {url}"));
                progress.enable_steady_tick(Duration::from_millis(100));
                let loaded = metadata.assert_exists(path);
                progress.finish_and_clear();
                loaded?;

                for file in metadata.list_directory(path) {
                    println!("{file}");
                }
            } else {
                for child in metadata.iterate_directory(path)? {
                    if metadata.is_directory(&child)? {
                        println!("{child}/");
                    } else {
                        println!("{child}\t{}", metadata.file_size(&child)?);
                    }
                }
            }
        }
        Command::Stat { ref url, ref path } => {
            let metadata = open(url, args.timeout)?;
            if !metadata.exists(path) {
                bail!("{path}: no such file or directory");
            }
            match metadata.object_storage().index().get(path) {
                None => println!("{path}: directory (implied)"),
                Some(entry) if entry.is_directory() => println!("{path}: directory"),
                Some(entry) => {
                    println!("{path}: file, {} bytes", entry.size);
                    for object in metadata.storage_objects(path)? {
                        println!("object {}", object.url());
                    }
                }
            }
        }
        Command::Cat { ref url, ref path } => {
            let metadata = open(url, args.timeout)?;
            let mut stdout = std::io::stdout().lock();
            for object in metadata.storage_objects(path)? {
                stdout.write_all(&object.storage.read_object(&object)?)?;
            }
        }
    }
    Ok(())
}
