//! Texture fetch strategies
//!
//! Some runtimes cannot turn image bytes into textures at all. Rather than
//! patching the parser, each loader is constructed with a
//! [`TextureFetchPolicy`] that decides what happens to image resources:
//! - [`FetchTextures`] fetches them like any other resource
//! - [`PlaceholderTextures`] never fetches and hands back a 1×1 opaque pixel

use thiserror::Error;

use crate::fetch::{FetchError, ResourceFetcher};

/// File extensions treated as image resources
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "ktx", "ktx2"];

#[derive(Error, Debug)]
pub enum TextureFetchError {
    #[error("texture fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("embedded image {0} lies outside its buffer")]
    OutOfBounds(usize),
}

/// Where an image lives in the source asset
#[derive(Debug, Clone, Copy)]
pub enum TextureSource<'a> {
    /// External file or URL, already resolved against the model location
    Uri(&'a str),
    /// Bytes inside a buffer view of the asset
    Embedded { bytes: &'a [u8], mime_type: &'a str },
}

/// Image payload produced by a policy
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    /// Encoded image bytes, or raw RGBA8 for placeholders
    pub bytes: Vec<u8>,
    pub placeholder: bool,
}

impl TextureData {
    /// Opaque white 1×1 RGBA8 pixel
    pub fn placeholder() -> Self {
        Self {
            width: 1,
            height: 1,
            bytes: vec![255, 255, 255, 255],
            placeholder: true,
        }
    }

    fn encoded(bytes: Vec<u8>) -> Self {
        Self {
            width: 0,
            height: 0,
            bytes,
            placeholder: false,
        }
    }
}

/// True when the URI names an image resource by extension or data-URI mime type
pub fn is_image_uri(uri: &str) -> bool {
    if let Some(rest) = uri.strip_prefix("data:") {
        return rest.starts_with("image/");
    }
    let path = uri.split(['?', '#']).next().unwrap_or("");
    let Some((_, ext)) = path.rsplit_once('.') else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str())
}

/// Strategy deciding how image resources are obtained
pub trait TextureFetchPolicy: Send + Sync {
    /// Short name used in logs and load reports
    fn name(&self) -> &'static str;

    /// True when a plain resource fetch for `uri` must be answered with an
    /// empty buffer instead of reaching the fetcher
    fn intercepts(&self, uri: &str) -> bool;

    /// Produce image data for one image of the asset
    fn fetch(
        &self,
        source: TextureSource<'_>,
        fetcher: &dyn ResourceFetcher,
    ) -> Result<TextureData, TextureFetchError>;
}

/// Fetch images normally (platforms with full image support)
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchTextures;

impl TextureFetchPolicy for FetchTextures {
    fn name(&self) -> &'static str {
        "fetch"
    }

    fn intercepts(&self, _uri: &str) -> bool {
        false
    }

    fn fetch(
        &self,
        source: TextureSource<'_>,
        fetcher: &dyn ResourceFetcher,
    ) -> Result<TextureData, TextureFetchError> {
        match source {
            TextureSource::Uri(uri) => {
                let bytes = fetcher.fetch(uri, &mut |_, _| {})?;
                Ok(TextureData::encoded(bytes))
            }
            TextureSource::Embedded { bytes, .. } => Ok(TextureData::encoded(bytes.to_vec())),
        }
    }
}

/// Never fetch images; every image becomes a 1×1 placeholder immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderTextures;

impl TextureFetchPolicy for PlaceholderTextures {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn intercepts(&self, uri: &str) -> bool {
        is_image_uri(uri)
    }

    fn fetch(
        &self,
        _source: TextureSource<'_>,
        _fetcher: &dyn ResourceFetcher,
    ) -> Result<TextureData, TextureFetchError> {
        Ok(TextureData::placeholder())
    }
}
