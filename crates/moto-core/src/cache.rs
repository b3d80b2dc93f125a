//! Local model cache with SHA-based deduplication
//!
//! Bundled models are copied into a cache directory before parsing so the
//! loader always reads from a stable local path. Files are stored by their
//! SHA256 hash:
//! - a bundle whose content is already cached is not written again
//! - different versions of the same logical model can coexist
//!
//! Model files are stored with SHA-prefixed names: `models/{short_sha}-{name}`

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("SHA mismatch: expected {expected}, got {actual}")]
    ShaMismatch { expected: String, actual: String },
}

/// Cache manifest entry for a model file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedModel {
    /// Where the bytes came from (bundle source path or URL)
    pub source: String,
    /// SHA256 hash of the model content (full)
    pub sha: String,
    /// Short SHA (first 8 characters) used in filename
    pub short_sha: String,
    /// Original model file name (without SHA prefix)
    pub name: String,
    /// Local file path (relative to cache directory): models/{short_sha}-{name}
    pub path: String,
    /// When this was cached (RFC 3339)
    pub fetched_at: String,
}

/// The cache manifest tracks every cached model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheManifest {
    /// Version of the manifest format
    #[serde(default = "default_version")]
    pub version: String,
    /// Model entries keyed by their SHA
    #[serde(default)]
    pub models: HashMap<String, CachedModel>,
    /// Last SHA stored for each source, so repeat resolutions can skip the fetch
    #[serde(default)]
    pub by_source: HashMap<String, String>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl CacheManifest {
    pub fn new() -> Self {
        Self {
            version: default_version(),
            models: HashMap::new(),
            by_source: HashMap::new(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, CacheError> {
        let content = std::fs::read_to_string(path)?;
        let manifest: CacheManifest = serde_json::from_str(&content)?;
        Ok(manifest)
    }

    /// Load manifest or create new if file doesn't exist
    pub fn load_or_create(path: &Path) -> Result<Self, CacheError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::new())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn has_model(&self, sha: &str) -> bool {
        self.models.contains_key(sha)
    }

    pub fn get_model(&self, sha: &str) -> Option<&CachedModel> {
        self.models.get(sha)
    }

    /// Most recently cached entry for a source
    pub fn get_by_source(&self, source: &str) -> Option<&CachedModel> {
        self.by_source.get(source).and_then(|sha| self.models.get(sha))
    }

    pub fn add_model(&mut self, entry: CachedModel) {
        self.by_source.insert(entry.source.clone(), entry.sha.clone());
        self.models.insert(entry.sha.clone(), entry);
    }
}

/// Cache directory manager
#[derive(Debug, Clone)]
pub struct AssetCache {
    /// Base directory for the cache
    pub base_dir: PathBuf,
    /// Path to the manifest file
    pub manifest_path: PathBuf,
    /// The cache manifest
    pub manifest: CacheManifest,
}

impl AssetCache {
    /// Open (or create) a cache at the given directory
    ///
    /// A relative directory is anchored at the current working directory so
    /// returned paths stay valid for fetchers rooted elsewhere.
    pub fn new(base_dir: PathBuf) -> Result<Self, CacheError> {
        let base_dir = if base_dir.is_absolute() {
            base_dir
        } else {
            std::env::current_dir()?.join(base_dir)
        };
        std::fs::create_dir_all(&base_dir)?;

        let manifest_path = base_dir.join("manifest.json");
        let manifest = CacheManifest::load_or_create(&manifest_path)?;

        Ok(Self {
            base_dir,
            manifest_path,
            manifest,
        })
    }

    pub fn models_dir(&self) -> PathBuf {
        self.base_dir.join("models")
    }

    /// Get short SHA (first 8 characters) from a full SHA
    pub fn short_sha(sha: &str) -> String {
        sha[..8.min(sha.len())].to_string()
    }

    /// True when the manifest knows the SHA and the file is still on disk
    pub fn has_model(&self, sha: &str) -> bool {
        self.manifest
            .get_model(sha)
            .map(|m| self.base_dir.join(&m.path).exists())
            .unwrap_or(false)
    }

    /// Absolute path of a cached copy of `source`, if one is still on disk
    pub fn cached_source_path(&self, source: &str) -> Option<PathBuf> {
        self.manifest
            .get_by_source(source)
            .map(|m| self.base_dir.join(&m.path))
            .filter(|p| p.exists())
    }

    /// Store model bytes, verifying `expected_sha` when one is supplied
    ///
    /// Returns the absolute path of the cached file.
    pub fn store_model(
        &mut self,
        source: &str,
        model_name: &str,
        content: &[u8],
        expected_sha: Option<&str>,
    ) -> Result<PathBuf, CacheError> {
        let sha = sha256_hex(content);
        if let Some(expected) = expected_sha {
            if !expected.eq_ignore_ascii_case(&sha) {
                return Err(CacheError::ShaMismatch {
                    expected: expected.to_string(),
                    actual: sha,
                });
            }
        }

        if self.has_model(&sha) {
            if let Some(existing) = self.manifest.get_model(&sha).cloned() {
                tracing::debug!(sha = %sha, "Model already cached");
                self.manifest.by_source.insert(source.to_string(), sha);
                self.manifest.save(&self.manifest_path)?;
                return Ok(self.base_dir.join(existing.path));
            }
        }

        std::fs::create_dir_all(self.models_dir())?;

        let short_sha = Self::short_sha(&sha);
        let file_name = format!("{}-{}", short_sha, model_name);
        let path = self.models_dir().join(&file_name);
        std::fs::write(&path, content)?;

        self.manifest.add_model(CachedModel {
            source: source.to_string(),
            sha: sha.clone(),
            short_sha,
            name: model_name.to_string(),
            path: format!("models/{}", file_name),
            fetched_at: chrono::Utc::now().to_rfc3339(),
        });
        self.manifest.save(&self.manifest_path)?;

        tracing::info!(sha = %sha, path = %path.display(), "Cached model");
        Ok(path)
    }
}

/// Compute SHA256 hash of data and return as hex string
pub fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}
