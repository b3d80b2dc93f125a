//! Turn a bundled model reference into a loadable URI
//!
//! A model reference arrives in whatever shape the host bundled it as: a
//! numeric bundle id, a path string, or something else entirely. The
//! resolver inspects it, runs the download/cache step when needed and
//! produces a non-empty [`ResolvedUri`] or an [`AssetResolutionError`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{AssetCache, CacheError};
use crate::fetch::{FetchError, ResourceFetcher};

/// Directory models are served from on web targets
pub const WEB_MODELS_DIR: &str = "assets/models";

#[derive(Error, Debug)]
pub enum AssetResolutionError {
    #[error("no bundled asset with id {0}")]
    UnknownBundle(u32),
    #[error("model reference resolved to an empty URI")]
    EmptyUri,
    #[error("unrecognized model reference: {0}")]
    Unsupported(String),
    #[error("bundle manifest error: {0}")]
    Manifest(String),
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("download failed: {0}")]
    Fetch(#[from] FetchError),
}

/// Reference to the bundled model as shipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelHandle {
    /// Integer id assigned by the bundler
    BundleId(u32),
    /// Path or URI string
    Path(String),
    /// Anything else; the raw representation is kept for best-effort resolution
    Unrecognized(String),
}

impl ModelHandle {
    /// Classify a dynamically-typed reference by its runtime representation
    pub fn from_value(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) => match n.as_u64().and_then(|v| u32::try_from(v).ok()) {
                Some(id) => Self::BundleId(id),
                None => Self::Unrecognized(n.to_string()),
            },
            serde_json::Value::String(s) => Self::Path(s.clone()),
            other => Self::Unrecognized(other.to_string()),
        }
    }
}

impl fmt::Display for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BundleId(id) => write!(f, "bundle:{}", id),
            Self::Path(p) => write!(f, "{}", p),
            Self::Unrecognized(raw) => write!(f, "unrecognized:{}", raw),
        }
    }
}

/// A non-empty URI the loader can fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUri(String);

impl ResolvedUri {
    pub fn new(uri: impl Into<String>) -> Result<Self, AssetResolutionError> {
        let uri = uri.into();
        if uri.trim().is_empty() {
            return Err(AssetResolutionError::EmptyUri);
        }
        Ok(Self(uri))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_path(path: &Path) -> Result<Self, AssetResolutionError> {
        Self::new(path.display().to_string())
    }
}

impl fmt::Display for ResolvedUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Execution target, decides whether the download step runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Native,
    Web,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_arch = "wasm32") {
            Self::Web
        } else {
            Self::Native
        }
    }
}

/// One bundled asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleEntry {
    pub id: u32,
    /// Source path (relative to the bundle root) or URL
    pub source: String,
    /// Expected SHA256 of the content
    #[serde(default)]
    pub sha256: Option<String>,
    /// File name to cache under; defaults to the source's file name
    #[serde(default)]
    pub name: Option<String>,
}

impl BundleEntry {
    pub fn file_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| file_name_of(&self.source))
    }
}

/// Table of bundled assets (`bundle.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleManifest {
    #[serde(default, rename = "asset")]
    pub assets: Vec<BundleEntry>,
}

impl BundleManifest {
    pub fn parse(content: &str) -> Result<Self, AssetResolutionError> {
        toml::from_str(content).map_err(|e| AssetResolutionError::Manifest(e.to_string()))
    }

    /// Load from a file; a missing file is an empty manifest
    pub fn from_file(path: &Path) -> Result<Self, AssetResolutionError> {
        if !path.exists() {
            warn!(path = %path.display(), "Bundle manifest not found");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| AssetResolutionError::Manifest(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn get(&self, id: u32) -> Option<&BundleEntry> {
        self.assets.iter().find(|a| a.id == id)
    }

    pub fn find_by_source(&self, source: &str) -> Option<&BundleEntry> {
        self.assets.iter().find(|a| a.source == source)
    }
}

/// Resolves model handles, downloading bundled assets into a local cache
pub struct AssetResolver {
    platform: Platform,
    manifest: BundleManifest,
    cache_dir: PathBuf,
    fetcher: Arc<dyn ResourceFetcher>,
}

impl AssetResolver {
    pub fn new(
        platform: Platform,
        manifest: BundleManifest,
        cache_dir: impl Into<PathBuf>,
        fetcher: Arc<dyn ResourceFetcher>,
    ) -> Self {
        Self {
            platform,
            manifest,
            cache_dir: cache_dir.into(),
            fetcher,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Resolve a handle to a URI; never returns an empty URI
    pub fn resolve(&self, handle: &ModelHandle) -> Result<ResolvedUri, AssetResolutionError> {
        debug!(handle = %handle, platform = ?self.platform, "Resolving model reference");

        let uri = match self.platform {
            Platform::Web => self.resolve_web(handle),
            Platform::Native => self.resolve_native(handle),
        }?;

        info!(handle = %handle, uri = %uri, "Model reference resolved");
        Ok(uri)
    }

    /// Web targets serve the bundle statically; build a relative path
    fn resolve_web(&self, handle: &ModelHandle) -> Result<ResolvedUri, AssetResolutionError> {
        match handle {
            ModelHandle::BundleId(id) => {
                let entry = self
                    .manifest
                    .get(*id)
                    .ok_or(AssetResolutionError::UnknownBundle(*id))?;
                ResolvedUri::new(format!("{}/{}", WEB_MODELS_DIR, entry.file_name()))
            }
            ModelHandle::Path(path) => ResolvedUri::new(path.trim()),
            ModelHandle::Unrecognized(raw) => {
                let raw = raw.trim();
                if let Ok(id) = raw.parse::<u32>() {
                    return self.resolve_web(&ModelHandle::BundleId(id));
                }
                let name = file_name_of(raw);
                if name.is_empty() {
                    return Err(AssetResolutionError::Unsupported(raw.to_string()));
                }
                ResolvedUri::new(format!("{}/{}", WEB_MODELS_DIR, name))
            }
        }
    }

    fn resolve_native(&self, handle: &ModelHandle) -> Result<ResolvedUri, AssetResolutionError> {
        match handle {
            ModelHandle::BundleId(id) => {
                let entry = self
                    .manifest
                    .get(*id)
                    .ok_or(AssetResolutionError::UnknownBundle(*id))?;
                self.download(&entry.source, &entry.file_name(), entry.sha256.as_deref())
            }
            ModelHandle::Path(path) => ResolvedUri::new(path.trim()),
            ModelHandle::Unrecognized(raw) => {
                // Best effort: same download path as a bundled asset
                let raw = raw.trim();
                if let Ok(id) = raw.parse::<u32>() {
                    return self.resolve_native(&ModelHandle::BundleId(id));
                }
                if let Some(entry) = self.manifest.find_by_source(raw) {
                    return self.download(&entry.source, &entry.file_name(), entry.sha256.as_deref());
                }
                let name = file_name_of(raw);
                if name.is_empty() {
                    return Err(AssetResolutionError::Unsupported(raw.to_string()));
                }
                self.download(raw, &name, None)
            }
        }
    }

    /// Fetch `source` into the local cache and return the cached path
    fn download(
        &self,
        source: &str,
        name: &str,
        sha: Option<&str>,
    ) -> Result<ResolvedUri, AssetResolutionError> {
        let mut cache = AssetCache::new(self.cache_dir.clone())?;

        if let Some(path) = cache.cached_source_path(source) {
            let matches = match sha {
                Some(expected) => cache
                    .manifest
                    .get_by_source(source)
                    .map(|m| m.sha.eq_ignore_ascii_case(expected))
                    .unwrap_or(false),
                None => true,
            };
            if matches {
                debug!(source = %source, "Using cached model");
                return ResolvedUri::from_path(&path);
            }
        }

        info!(source = %source, "Downloading bundled model");
        let bytes = self.fetcher.fetch(source, &mut |_, _| {})?;
        let path = cache.store_model(source, name, &bytes, sha)?;
        ResolvedUri::from_path(&path)
    }
}

fn file_name_of(source: &str) -> String {
    let without_query = source.split(['?', '#']).next().unwrap_or("");
    without_query
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::DefaultFetcher;
    use tempfile::TempDir;

    fn resolver_with_bundle(platform: Platform) -> (TempDir, AssetResolver) {
        let dir = TempDir::new().unwrap();
        let bundle_dir = dir.path().join("bundle");
        std::fs::create_dir_all(&bundle_dir).unwrap();
        std::fs::write(bundle_dir.join("motorcycle.glb"), b"glb-bytes").unwrap();

        let manifest = BundleManifest::parse(
            r#"
            [[asset]]
            id = 7
            source = "motorcycle.glb"
            "#,
        )
        .unwrap();

        let resolver = AssetResolver::new(
            platform,
            manifest,
            dir.path().join("cache"),
            Arc::new(DefaultFetcher::new(bundle_dir)),
        );
        (dir, resolver)
    }

    #[test]
    fn test_handle_from_value() {
        assert_eq!(ModelHandle::from_value(&serde_json::json!(3)), ModelHandle::BundleId(3));
        assert_eq!(
            ModelHandle::from_value(&serde_json::json!("models/bike.glb")),
            ModelHandle::Path("models/bike.glb".into())
        );
        assert!(matches!(
            ModelHandle::from_value(&serde_json::json!({"uri": "x"})),
            ModelHandle::Unrecognized(_)
        ));
        assert!(matches!(
            ModelHandle::from_value(&serde_json::json!(-1)),
            ModelHandle::Unrecognized(_)
        ));
    }

    #[test]
    fn test_bundle_id_downloads_into_cache() {
        let (_dir, resolver) = resolver_with_bundle(Platform::Native);
        let uri = resolver.resolve(&ModelHandle::BundleId(7)).unwrap();

        assert!(!uri.as_str().is_empty());
        assert!(uri.as_str().ends_with("-motorcycle.glb"));
        assert_eq!(std::fs::read(uri.as_str()).unwrap(), b"glb-bytes".to_vec());

        // Second resolution hits the cache and yields the same path
        let again = resolver.resolve(&ModelHandle::BundleId(7)).unwrap();
        assert_eq!(uri, again);
    }

    #[test]
    fn test_string_handle_is_already_a_uri() {
        let (_dir, resolver) = resolver_with_bundle(Platform::Native);
        let uri = resolver
            .resolve(&ModelHandle::Path("https://cdn.example.com/bike.glb".into()))
            .unwrap();
        assert_eq!(uri.as_str(), "https://cdn.example.com/bike.glb");

        let err = resolver.resolve(&ModelHandle::Path("   ".into())).unwrap_err();
        assert!(matches!(err, AssetResolutionError::EmptyUri));
    }

    #[test]
    fn test_unrecognized_handle_best_effort() {
        let (_dir, resolver) = resolver_with_bundle(Platform::Native);

        let uri = resolver
            .resolve(&ModelHandle::Unrecognized("7".into()))
            .unwrap();
        assert!(uri.as_str().ends_with("-motorcycle.glb"));

        let err = resolver
            .resolve(&ModelHandle::Unrecognized("{}".into()))
            .unwrap_err();
        assert!(matches!(err, AssetResolutionError::Fetch(_)));

        let err = resolver
            .resolve(&ModelHandle::Unrecognized("".into()))
            .unwrap_err();
        assert!(matches!(err, AssetResolutionError::Unsupported(_)));
    }

    #[test]
    fn test_unknown_bundle_fails() {
        let (_dir, resolver) = resolver_with_bundle(Platform::Native);
        let err = resolver.resolve(&ModelHandle::BundleId(99)).unwrap_err();
        assert!(matches!(err, AssetResolutionError::UnknownBundle(99)));
    }

    #[test]
    fn test_web_builds_relative_path() {
        let (dir, resolver) = resolver_with_bundle(Platform::Web);
        let uri = resolver.resolve(&ModelHandle::BundleId(7)).unwrap();
        assert_eq!(uri.as_str(), "assets/models/motorcycle.glb");
        // Nothing was downloaded
        assert!(!dir.path().join("cache").exists());
    }

    #[test]
    fn test_every_handle_kind_yields_uri_or_error() {
        let (_dir, resolver) = resolver_with_bundle(Platform::Native);
        let handles = [
            ModelHandle::BundleId(7),
            ModelHandle::BundleId(8),
            ModelHandle::Path("bike.glb".into()),
            ModelHandle::Path(String::new()),
            ModelHandle::Unrecognized("motorcycle.glb".into()),
            ModelHandle::Unrecognized("null".into()),
        ];
        for handle in &handles {
            if let Ok(uri) = resolver.resolve(handle) {
                assert!(!uri.as_str().trim().is_empty(), "empty URI for {}", handle);
            }
        }
    }
}
