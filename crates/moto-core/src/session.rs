//! Load session: resolve, load, classify, fall back
//!
//! [`LoadPipeline`] does the blocking work and always produces a displayable
//! [`LoadOutcome`]; a failure yields the fallback model plus the reason.
//! [`ViewerSession`] is the main-thread view of one mount. It owns the
//! [`LoadState`] and accepts the outcome exactly once, through a
//! [`LoadSlot`] guarded by a [`MountGuard`] so late deliveries after
//! unmount are dropped.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::classifier::{classify_scene, ClassificationReport};
use crate::fallback::build_fallback;
use crate::loader::{LoadReport, ModelLoader, ParseError};
use crate::resolver::{AssetResolutionError, AssetResolver, ModelHandle};
use crate::scene_graph::SceneGraph;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("could not resolve model: {0}")]
    Resolution(#[from] AssetResolutionError),
    #[error("could not load model: {0}")]
    Parse(#[from] ParseError),
    #[error("no mesh material could be processed ({0} failures)")]
    Classification(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Loading { progress: u8 },
    Loaded,
    Failed(String),
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading { .. })
    }
}

/// What the host draws over the canvas
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    Spinner { progress: u8 },
    ErrorBanner(String),
    None,
}

/// Shared "still mounted" flag handed to background work
#[derive(Debug, Clone)]
pub struct MountGuard(Arc<AtomicBool>);

impl Default for MountGuard {
    fn default() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }
}

impl MountGuard {
    pub fn is_mounted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn unmount(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Statistics of a successful load
#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub load: LoadReport,
    pub classification: ClassificationReport,
}

/// Result of one pipeline run; `scene` is always displayable
#[derive(Debug)]
pub struct LoadOutcome {
    pub scene: SceneGraph,
    pub result: Result<LoadSummary, LoadError>,
}

impl LoadOutcome {
    /// Fallback-only scene carrying the failure
    pub fn failed(error: LoadError) -> Self {
        error!(error = %error, "Model load failed, showing fallback");
        let mut scene = SceneGraph::new();
        build_fallback(&mut scene);
        Self {
            scene,
            result: Err(error),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.result.is_err()
    }
}

/// Resolver and loader for one mount
pub struct LoadPipeline {
    resolver: AssetResolver,
    loader: ModelLoader,
}

impl LoadPipeline {
    pub fn new(resolver: AssetResolver, loader: ModelLoader) -> Self {
        Self { resolver, loader }
    }

    pub fn resolver(&self) -> &AssetResolver {
        &self.resolver
    }

    pub fn loader(&self) -> &ModelLoader {
        &self.loader
    }

    /// Resolve `handle`, load it and classify its materials
    pub fn run(&self, handle: &ModelHandle, on_progress: &mut dyn FnMut(u8)) -> LoadOutcome {
        let uri = match self.resolver.resolve(handle) {
            Ok(uri) => uri,
            Err(e) => return LoadOutcome::failed(e.into()),
        };
        match self.loader.load(&uri, on_progress) {
            Ok(model) => finish(model.scene, model.report),
            Err(e) => LoadOutcome::failed(e.into()),
        }
    }

    /// Same as [`run`](Self::run) for bytes the host already fetched
    pub fn run_bytes(&self, bytes: &[u8], base_uri: Option<&str>) -> LoadOutcome {
        match self.loader.load_bytes(bytes, base_uri) {
            Ok(model) => finish(model.scene, model.report),
            Err(e) => LoadOutcome::failed(e.into()),
        }
    }
}

fn finish(mut scene: SceneGraph, load: LoadReport) -> LoadOutcome {
    let classification = classify_scene(&mut scene);
    if classification.all_failed() {
        return LoadOutcome::failed(LoadError::Classification(classification.failures.len()));
    }
    LoadOutcome {
        scene,
        result: Ok(LoadSummary {
            load,
            classification,
        }),
    }
}

/// Hand-off point between the background load and the main thread
#[derive(Debug, Clone, Default)]
pub struct LoadSlot {
    outcome: Arc<Mutex<Option<LoadOutcome>>>,
    progress: Arc<AtomicU8>,
}

impl LoadSlot {
    pub fn report_progress(&self, percent: u8) {
        self.progress.store(percent.min(100), Ordering::Relaxed);
    }

    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::Relaxed)
    }

    /// Store the outcome unless the viewer has gone away
    pub fn publish(&self, guard: &MountGuard, outcome: LoadOutcome) -> bool {
        if !guard.is_mounted() {
            debug!("Viewer unmounted, dropping load outcome");
            return false;
        }
        match self.outcome.lock() {
            Ok(mut slot) => {
                *slot = Some(outcome);
                true
            }
            Err(_) => false,
        }
    }

    /// Take the outcome if one is ready and the lock is free
    pub fn take(&self) -> Option<LoadOutcome> {
        self.outcome.try_lock().ok().and_then(|mut slot| slot.take())
    }
}

/// Main-thread state of one mounted viewer
#[derive(Debug)]
pub struct ViewerSession {
    state: LoadState,
    guard: MountGuard,
    model_present: bool,
}

impl Default for ViewerSession {
    fn default() -> Self {
        Self::mount()
    }
}

impl ViewerSession {
    pub fn mount() -> Self {
        Self {
            state: LoadState::Loading { progress: 0 },
            guard: MountGuard::default(),
            model_present: false,
        }
    }

    pub fn guard(&self) -> MountGuard {
        self.guard.clone()
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_mounted(&self) -> bool {
        self.guard.is_mounted()
    }

    /// Real or fallback model on screen
    pub fn model_present(&self) -> bool {
        self.model_present
    }

    pub fn overlay(&self) -> Overlay {
        match &self.state {
            LoadState::Loading { progress } => Overlay::Spinner {
                progress: *progress,
            },
            LoadState::Failed(reason) => Overlay::ErrorBanner(reason.clone()),
            LoadState::Loaded => Overlay::None,
        }
    }

    pub fn set_progress(&mut self, percent: u8) {
        if let LoadState::Loading { progress } = &mut self.state {
            *progress = percent.min(100);
        }
    }

    /// Apply a finished load; returns the scene to display
    ///
    /// Ignored after unmount or once the state is terminal.
    pub fn complete(&mut self, outcome: LoadOutcome) -> Option<SceneGraph> {
        if !self.is_mounted() || !self.state.is_loading() {
            warn!("Ignoring load completion for inactive viewer");
            return None;
        }
        self.state = match &outcome.result {
            Ok(summary) => {
                info!(
                    meshes = summary.load.meshes,
                    classified = summary.classification.classified(),
                    "Model ready"
                );
                LoadState::Loaded
            }
            Err(e) => LoadState::Failed(e.to_string()),
        };
        self.model_present = true;
        Some(outcome.scene)
    }

    /// Fatal failure with nothing to display
    pub fn fail(&mut self, reason: impl Into<String>) {
        if !self.is_mounted() {
            return;
        }
        let reason = reason.into();
        error!(reason = %reason, "Viewer failed");
        self.state = LoadState::Failed(reason);
        self.model_present = false;
    }

    /// Pick up progress and, once ready, the outcome from `slot`
    pub fn poll(&mut self, slot: &LoadSlot) -> Option<SceneGraph> {
        if !self.is_mounted() {
            return None;
        }
        self.set_progress(slot.progress());
        let outcome = slot.take()?;
        self.complete(outcome)
    }

    pub fn unmount(&mut self) {
        self.guard.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::FALLBACK_NAME;
    use crate::fetch::DefaultFetcher;
    use crate::resolver::{BundleManifest, Platform};
    use crate::test_fixtures::{build_glb, FixtureMesh};
    use crate::texture::PlaceholderTextures;
    use tempfile::TempDir;

    fn pipeline(root: &std::path::Path) -> LoadPipeline {
        let fetcher = Arc::new(DefaultFetcher::new(root));
        let manifest = BundleManifest::parse(
            r#"
            [[asset]]
            id = 1
            source = "bike.glb"
            "#,
        )
        .unwrap();
        let resolver = AssetResolver::new(Platform::Native, manifest, root.join("cache"), fetcher.clone());
        LoadPipeline::new(resolver, ModelLoader::new(fetcher, Arc::new(PlaceholderTextures)))
    }

    fn assert_fallback(scene: &SceneGraph) {
        let group = scene.find(FALLBACK_NAME).unwrap();
        assert!(scene.descendant_mesh_count(group) >= 4);
    }

    #[test]
    fn test_successful_load() {
        let dir = TempDir::new().unwrap();
        let glb = build_glb(&[
            FixtureMesh::new("chassis", 9).material("Body_Paint_01"),
            FixtureMesh::new("Front_Tire", 6),
        ]);
        std::fs::write(dir.path().join("bike.glb"), glb).unwrap();

        let mut session = ViewerSession::mount();
        let mut last = 0;
        let outcome = pipeline(dir.path()).run(&ModelHandle::BundleId(1), &mut |p| last = p);
        assert_eq!(last, 100);
        assert!(!outcome.is_fallback());

        let scene = session.complete(outcome).unwrap();
        assert_eq!(session.state(), &LoadState::Loaded);
        assert_eq!(session.overlay(), Overlay::None);
        assert!(session.model_present());
        assert!(scene.find(FALLBACK_NAME).is_none());
        assert_eq!(scene.mesh_count(), 2);
    }

    #[test]
    fn test_bundled_model_with_relative_cache_dir() {
        let dir = TempDir::new().unwrap();
        let assets = dir.path().join("assets");
        std::fs::create_dir_all(assets.join("models")).unwrap();
        std::fs::write(
            assets.join("models/motorcycle.glb"),
            build_glb(&[FixtureMesh::new("chassis", 9)]),
        )
        .unwrap();

        // Fetcher rooted at the bundle directory, cache relative to the cwd
        let cache_dir = std::path::PathBuf::from(format!(".session-cache-{}", std::process::id()));
        let fetcher = Arc::new(DefaultFetcher::new(&assets));
        let manifest = BundleManifest::parse(
            r#"
            [[asset]]
            id = 1
            source = "models/motorcycle.glb"
            "#,
        )
        .unwrap();
        let resolver = AssetResolver::new(Platform::Native, manifest, cache_dir.clone(), fetcher.clone());
        let pipeline = LoadPipeline::new(resolver, ModelLoader::new(fetcher, Arc::new(PlaceholderTextures)));

        let outcome = pipeline.run(&ModelHandle::BundleId(1), &mut |_| {});
        std::fs::remove_dir_all(std::env::current_dir().unwrap().join(&cache_dir)).unwrap();

        assert!(outcome.result.is_ok(), "{:?}", outcome.result.as_ref().err());
        assert!(!outcome.is_fallback());
        assert_eq!(outcome.scene.mesh_count(), 1);
    }

    #[test]
    fn test_parse_failure_shows_fallback() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bike.glb"), b"corrupt").unwrap();

        let mut session = ViewerSession::mount();
        let outcome = pipeline(dir.path()).run(&ModelHandle::Path("bike.glb".into()), &mut |_| {});
        assert!(matches!(outcome.result, Err(LoadError::Parse(_))));

        let scene = session.complete(outcome).unwrap();
        assert!(!session.state().is_loading());
        assert!(matches!(session.state(), LoadState::Failed(_)));
        assert!(session.model_present());
        assert_fallback(&scene);
    }

    #[test]
    fn test_cyclic_asset_shows_fallback() {
        let dir = TempDir::new().unwrap();
        let outcome = pipeline(dir.path()).run_bytes(
            br#"{"asset":{"version":"2.0"},"scene":0,"scenes":[{"nodes":[0]}],"nodes":[{"name":"a","children":[0]}]}"#,
            None,
        );
        assert!(matches!(
            outcome.result,
            Err(LoadError::Parse(ParseError::InvalidHierarchy(0)))
        ));
        assert_fallback(&outcome.scene);
    }

    #[test]
    fn test_unresolvable_mount_after_one_poll() {
        let dir = TempDir::new().unwrap();
        let slot = LoadSlot::default();
        let mut session = ViewerSession::mount();
        assert!(matches!(session.overlay(), Overlay::Spinner { progress: 0 }));

        let outcome = pipeline(dir.path()).run(&ModelHandle::BundleId(42), &mut |_| {});
        assert!(matches!(
            outcome.result,
            Err(LoadError::Resolution(AssetResolutionError::UnknownBundle(42)))
        ));
        assert!(slot.publish(&session.guard(), outcome));

        let scene = session.poll(&slot).unwrap();
        assert!(matches!(session.overlay(), Overlay::ErrorBanner(_)));
        assert_fallback(&scene);
    }

    #[test]
    fn test_progress_through_slot() {
        let slot = LoadSlot::default();
        let mut session = ViewerSession::mount();

        slot.report_progress(40);
        assert!(session.poll(&slot).is_none());
        assert_eq!(session.overlay(), Overlay::Spinner { progress: 40 });

        slot.report_progress(250);
        session.poll(&slot);
        assert_eq!(session.state(), &LoadState::Loading { progress: 100 });
    }

    #[test]
    fn test_late_delivery_after_unmount() {
        let slot = LoadSlot::default();
        let mut session = ViewerSession::mount();
        let guard = session.guard();
        session.unmount();

        let outcome = LoadOutcome::failed(LoadError::Classification(1));
        assert!(!slot.publish(&guard, outcome));
        assert!(session.poll(&slot).is_none());

        let outcome = LoadOutcome::failed(LoadError::Classification(1));
        assert!(session.complete(outcome).is_none());
        assert!(session.state().is_loading());
    }

    #[test]
    fn test_completion_applied_once() {
        let mut session = ViewerSession::mount();
        assert!(session
            .complete(LoadOutcome::failed(LoadError::Classification(2)))
            .is_some());
        assert!(session
            .complete(LoadOutcome::failed(LoadError::Classification(2)))
            .is_none());
    }

    #[test]
    fn test_fail_without_scene() {
        let mut session = ViewerSession::mount();
        session.fail("no primary window");
        assert_eq!(session.overlay(), Overlay::ErrorBanner("no primary window".into()));
        assert!(!session.model_present());
    }

    #[test]
    fn test_run_bytes() {
        let dir = TempDir::new().unwrap();
        let glb = build_glb(&[FixtureMesh::new("visor", 3)]);
        let outcome = pipeline(dir.path()).run_bytes(&glb, Some("assets/models/bike.glb"));
        let summary = outcome.result.unwrap();
        assert_eq!(summary.load.meshes, 1);
        assert_eq!(summary.classification.classified(), 1);
    }
}
