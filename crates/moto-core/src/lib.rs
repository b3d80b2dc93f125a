//! Moto Core - Model loading and interaction logic for the motorcycle viewer
//!
//! This crate holds everything that does not need a renderer:
//! - model reference resolution with a SHA-keyed local cache
//! - glTF loading with a per-loader texture fetch policy
//! - name-based material classification and the fallback model
//! - the touch gesture controller and per-frame auto-rotation
//! - the load session state machine tying these together

pub mod cache;
pub mod classifier;
pub mod fallback;
pub mod fetch;
pub mod frame_loop;
pub mod gesture;
pub mod loader;
pub mod resolver;
pub mod scene_graph;
pub mod session;
pub mod texture;

#[cfg(test)]
mod test_fixtures;

pub use cache::{AssetCache, CacheError};
pub use classifier::{classify, classify_scene, ClassificationReport, MaterialCategory, MaterialProcessingError};
pub use fallback::build_fallback;
pub use fetch::{DefaultFetcher, FetchError, ResourceFetcher};
pub use frame_loop::FrameLoop;
pub use gesture::{CameraRig, ControlSettings, GestureController, GesturePhase, InteractionState, TouchEvent, TouchPoint};
pub use loader::{LoadReport, LoadedModel, ModelLoader, ParseError};
pub use resolver::{AssetResolutionError, AssetResolver, BundleManifest, ModelHandle, Platform, ResolvedUri};
pub use scene_graph::SceneGraph;
pub use session::{LoadError, LoadOutcome, LoadPipeline, LoadSlot, LoadState, MountGuard, Overlay, ViewerSession};
pub use texture::{FetchTextures, PlaceholderTextures, TextureFetchPolicy};
