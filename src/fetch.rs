//! Blocking retrieval of listings and objects from the server.
//!
//! The metadata layer only needs one primitive: "get the bytes at this URL, or tell me it isn't
//! there".  [`HttpFetcher`] implements it over HTTP(S) and [`FileFetcher`] over `file://` URLs,
//! which is handy for serving a published tree straight from disk.

use std::{io::ErrorKind, sync::Arc, time::Duration};

use log::trace;
use reqwest::{blocking::Client, StatusCode, Url};
use thiserror::Error;

use crate::listing::ListingError;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{url} returned HTTP status {status}")]
    Status { url: String, status: u16 },
    #[error("Unsupported URL {0:?}")]
    UnsupportedUrl(String),
    #[error("Invalid listing {url}: {source}")]
    Listing {
        url: String,
        #[source]
        source: ListingError,
    },
    #[error("Directory {url} is nested more than {limit} levels deep")]
    TooDeep { url: String, limit: usize },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fetches the content stored at a URL.
pub trait Fetch: Send + Sync {
    /// Returns the body stored at `url`, or `None` if the server says there is nothing there.
    /// Every other kind of failure is an error.
    fn get(&self, url: &Url) -> Result<Option<Vec<u8>>, FetchError>;
}

impl<F: Fetch + ?Sized> Fetch for Arc<F> {
    fn get(&self, url: &Url) -> Result<Option<Vec<u8>>, FetchError> {
        (**self).get(url)
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Ok(Self {
            client: Client::builder().build()?,
        })
    }

    /// Uses a preconfigured client, for settings like proxies, TLS roots or default headers.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Creates a fetcher whose requests fail once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

impl Fetch for HttpFetcher {
    fn get(&self, url: &Url) -> Result<Option<Vec<u8>>, FetchError> {
        trace!("GET {url}");
        let response = self.client.get(url.clone()).send()?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.bytes()?.to_vec())),
            status => Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}

/// Serves `file://` URLs from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

impl Fetch for FileFetcher {
    fn get(&self, url: &Url) -> Result<Option<Vec<u8>>, FetchError> {
        if url.scheme() != "file" {
            return Err(FetchError::UnsupportedUrl(url.to_string()));
        }
        let path = url
            .to_file_path()
            .map_err(|()| FetchError::UnsupportedUrl(url.to_string()))?;
        trace!("read {path:?}");
        match std::fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            // a file in place of a parent directory also means there's nothing there
            Err(e) if e.kind() == ErrorKind::NotFound || !path.exists() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Picks a fetcher able to serve `url`, based on its scheme.
pub fn fetcher_for_url(
    url: &Url,
    timeout: Option<Duration>,
) -> Result<Box<dyn Fetch>, FetchError> {
    match url.scheme() {
        "http" | "https" => Ok(Box::new(match timeout {
            Some(timeout) => HttpFetcher::with_timeout(timeout)?,
            None => HttpFetcher::new()?,
        })),
        "file" => Ok(Box::new(FileFetcher)),
        _ => Err(FetchError::UnsupportedUrl(url.to_string())),
    }
}
