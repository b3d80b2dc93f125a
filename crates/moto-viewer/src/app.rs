//! Bevy application setup

use bevy::prelude::*;
use bevy::winit::WinitSettings;
use bevy_egui::EguiPlugin;
use moto_core::{
    AssetResolver, BundleManifest, DefaultFetcher, FetchTextures, LoadPipeline, ModelLoader,
    PlaceholderTextures, Platform, TextureFetchPolicy,
};
use moto_scene::{ModelRequest, MotoScenePlugin, ViewerSettings};
use std::sync::Arc;
use tracing::info;

use crate::config::ViewerConfig;

/// Images are only fetched on native targets that ask for them
///
/// Texture slots are cleared after parsing, so by default no image bytes
/// are read on any platform.
pub fn texture_policy(platform: Platform, fetch_textures: bool) -> Arc<dyn TextureFetchPolicy> {
    match (platform, fetch_textures) {
        (Platform::Native, true) => Arc::new(FetchTextures),
        _ => Arc::new(PlaceholderTextures),
    }
}

/// Resolver and loader for the configured model
pub fn build_pipeline(config: &ViewerConfig, manifest: BundleManifest) -> LoadPipeline {
    let platform = config.model.platform();
    let fetcher = Arc::new(DefaultFetcher::new(config.model.bundle_root()));
    let resolver = AssetResolver::new(
        platform,
        manifest,
        config.model.cache_dir.clone(),
        fetcher.clone(),
    );
    let textures = texture_policy(platform, config.model.fetch_textures);
    LoadPipeline::new(resolver, ModelLoader::new(fetcher, textures))
}

fn viewer_settings(config: &ViewerConfig) -> ViewerSettings {
    ViewerSettings {
        auto_rotate: config.viewer.auto_rotate,
        controls: config.controls,
        ..default()
    }
}

/// Run the viewer until its window closes
pub fn run(config: ViewerConfig, manifest: BundleManifest) -> AppExit {
    let pipeline = build_pipeline(&config, manifest);
    let request = ModelRequest {
        pipeline: Arc::new(pipeline),
        handle: config.model.handle(),
    };
    info!(
        handle = %request.handle,
        platform = ?config.model.platform(),
        textures = request.pipeline.loader().texture_policy().name(),
        "Starting viewer"
    );

    App::new()
        // Transparent so the host page shows through the canvas
        .insert_resource(ClearColor(Color::NONE))
        .insert_resource(WinitSettings::default())
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: config.viewer.title.clone(),
                resolution: (config.viewer.width, config.viewer.height).into(),
                transparent: true,
                canvas: Some("#viewer-canvas".to_string()),
                fit_canvas_to_parent: true,
                prevent_default_event_handling: false,
                ..default()
            }),
            ..default()
        }))
        .add_plugins(EguiPlugin::default())
        // Read by MotoScenePlugin when it builds
        .insert_resource(viewer_settings(&config))
        .insert_resource(request)
        .add_plugins(MotoScenePlugin)
        .run()
}
