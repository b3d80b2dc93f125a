//! Byte-level resource fetching for model assets
//!
//! The loader never touches the filesystem or network directly; it asks a
//! [`ResourceFetcher`] for bytes. The default implementation understands:
//! - plain and relative filesystem paths (relative to a root directory)
//! - `file://` URIs
//! - `data:` URIs with base64 payloads
//! - `http(s)://` URLs (native targets only)

use base64::Engine;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CHUNK_SIZE: usize = 64 * 1024;

/// Upper bound on buffer space reserved from a declared content length
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP {status} fetching {url}")]
    Http { status: u16, url: String },
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("malformed data URI: {0}")]
    BadDataUri(String),
    #[error("unsupported URI scheme: {0}")]
    UnsupportedScheme(String),
}

/// Source of raw bytes for a URI
///
/// `progress` receives `(bytes_loaded, bytes_total)` as data arrives; the
/// total is `None` when the source does not announce a length.
pub trait ResourceFetcher: Send + Sync {
    fn fetch(
        &self,
        uri: &str,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<Vec<u8>, FetchError>;
}

/// Convert a byte count into a 0..=100 percentage
pub fn percent(loaded: u64, total: Option<u64>) -> Option<u8> {
    match total {
        Some(0) => Some(100),
        Some(total) => Some(((loaded.min(total) * 100) / total) as u8),
        None => None,
    }
}

/// Fetcher for local files, data URIs and (on native targets) HTTP
#[derive(Debug, Clone, Default)]
pub struct DefaultFetcher {
    root: PathBuf,
}

impl DefaultFetcher {
    /// Relative paths are resolved against `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn fetch_file(
        &self,
        path: &Path,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<Vec<u8>, FetchError> {
        let full = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let io_err = |source| FetchError::Io {
            path: full.display().to_string(),
            source,
        };

        let mut file = std::fs::File::open(&full).map_err(io_err)?;
        let total = file.metadata().map(|m| m.len()).ok();
        read_with_progress(&mut file, total, progress).map_err(io_err)
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn fetch_http(
        &self,
        url: &str,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<Vec<u8>, FetchError> {
        let request_err = |e: reqwest::Error| FetchError::Request {
            url: url.to_string(),
            message: e.to_string(),
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(request_err)?;
        let mut response = client.get(url).send().map_err(request_err)?;

        if !response.status().is_success() {
            return Err(FetchError::Http {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let total = response.content_length();
        read_with_progress(&mut response, total, progress).map_err(|source| FetchError::Io {
            path: url.to_string(),
            source,
        })
    }

    #[cfg(target_arch = "wasm32")]
    fn fetch_http(
        &self,
        url: &str,
        _progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<Vec<u8>, FetchError> {
        // The browser host prefetches the model itself; nothing else may go over the network
        Err(FetchError::UnsupportedScheme(url.to_string()))
    }
}

impl ResourceFetcher for DefaultFetcher {
    fn fetch(
        &self,
        uri: &str,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<Vec<u8>, FetchError> {
        if uri.starts_with("data:") {
            let bytes = decode_data_uri(uri)?;
            let len = bytes.len() as u64;
            progress(len, Some(len));
            return Ok(bytes);
        }
        if uri.starts_with("http://") || uri.starts_with("https://") {
            return self.fetch_http(uri, progress);
        }
        if let Some(path) = uri.strip_prefix("file://") {
            return self.fetch_file(Path::new(path), progress);
        }
        if uri.contains("://") {
            return Err(FetchError::UnsupportedScheme(uri.to_string()));
        }
        self.fetch_file(Path::new(uri), progress)
    }
}

fn read_with_progress(
    reader: &mut dyn Read,
    total: Option<u64>,
    progress: &mut dyn FnMut(u64, Option<u64>),
) -> std::io::Result<Vec<u8>> {
    // Declared lengths are untrusted; reserve at most MAX_PREALLOC up front
    let reserve = usize::try_from(total.unwrap_or(0).min(MAX_PREALLOC)).unwrap_or(0);
    let mut data = Vec::with_capacity(reserve);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..n]);
        progress(data.len() as u64, total);
    }
    Ok(data)
}

/// Decode a `data:[<mime>][;base64],<payload>` URI
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, FetchError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| FetchError::BadDataUri(truncate(uri)))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| FetchError::BadDataUri(truncate(uri)))?;

    if header.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| FetchError::BadDataUri(e.to_string()))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

fn truncate(uri: &str) -> String {
    uri.chars().take(48).collect()
}
