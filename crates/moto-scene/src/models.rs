//! Background model loading and spawning of the result

use bevy::prelude::*;
use moto_core::{LoadPipeline, LoadSlot, ModelHandle, MountGuard};
use std::sync::Arc;
use tracing::info;

use crate::scene::spawn_scene_graph;
use crate::ViewerState;

/// Plugin for model loading
pub struct ModelsPlugin;

impl Plugin for ModelsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PendingLoad>()
            .add_systems(Startup, start_model_load)
            .add_systems(Update, process_pending_load);
    }
}

/// What to load and how; inserted by the host before the plugin runs
#[derive(Resource, Clone)]
pub struct ModelRequest {
    pub pipeline: Arc<LoadPipeline>,
    pub handle: ModelHandle,
}

/// Outcome of the background load, polled every frame
#[derive(Resource, Default)]
pub struct PendingLoad {
    pub slot: LoadSlot,
}

/// Root entity of whatever model is on screen
#[derive(Component)]
pub struct ModelRoot;

fn start_model_load(
    request: Option<Res<ModelRequest>>,
    pending: Res<PendingLoad>,
    mut viewer: ResMut<ViewerState>,
) {
    let Some(request) = request else {
        viewer.session.fail("no model configured");
        return;
    };

    info!(handle = %request.handle, "Starting model load");
    spawn_load(request.clone(), pending.slot.clone(), viewer.session.guard());
}

#[cfg(not(target_arch = "wasm32"))]
fn spawn_load(request: ModelRequest, slot: LoadSlot, guard: MountGuard) {
    use bevy::tasks::IoTaskPool;

    IoTaskPool::get()
        .spawn(async move {
            let outcome = request
                .pipeline
                .run(&request.handle, &mut |p| slot.report_progress(p));
            slot.publish(&guard, outcome);
        })
        .detach();
}

#[cfg(target_arch = "wasm32")]
fn spawn_load(request: ModelRequest, slot: LoadSlot, guard: MountGuard) {
    use moto_core::{FetchError, LoadError, LoadOutcome, ParseError};
    use tracing::error;

    wasm_bindgen_futures::spawn_local(async move {
        // Resolution on the web never touches the network
        let uri = match request.pipeline.resolver().resolve(&request.handle) {
            Ok(uri) => uri,
            Err(e) => {
                slot.publish(&guard, LoadOutcome::failed(LoadError::from(e)));
                return;
            }
        };

        let outcome = match fetch_bytes(uri.as_str()).await {
            Ok(bytes) => {
                slot.report_progress(100);
                request.pipeline.run_bytes(&bytes, Some(uri.as_str()))
            }
            Err(e) => {
                error!(uri = %uri, error = %e, "Model download failed");
                LoadOutcome::failed(LoadError::Parse(ParseError::Fetch {
                    uri: uri.to_string(),
                    source: FetchError::Request {
                        url: uri.to_string(),
                        message: e,
                    },
                }))
            }
        };
        slot.publish(&guard, outcome);
    });
}

#[cfg(target_arch = "wasm32")]
async fn fetch_bytes(url: &str) -> Result<Vec<u8>, String> {
    let response = gloo_net::http::Request::get(url)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if !response.ok() {
        return Err(format!("HTTP {}: {}", response.status(), response.status_text()));
    }
    response.binary().await.map_err(|e| e.to_string())
}

/// Apply a finished load: replace the displayed model
fn process_pending_load(
    mut commands: Commands,
    pending: Res<PendingLoad>,
    mut viewer: ResMut<ViewerState>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    existing: Query<Entity, With<ModelRoot>>,
) {
    let Some(graph) = viewer.session.poll(&pending.slot) else {
        return;
    };

    for entity in &existing {
        commands.entity(entity).despawn();
    }

    let root = commands
        .spawn((
            Transform::from_rotation(viewer.controller.state().model_rotation()),
            Visibility::default(),
            ModelRoot,
        ))
        .id();
    let spawned = spawn_scene_graph(&mut commands, &mut meshes, &mut materials, &graph, root);
    info!(nodes = spawned, state = ?viewer.session.state(), "Model spawned");
}
