//! Per-frame auto-rotation and model transform updates

use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use tracing::info;

use crate::input::InputSet;
use crate::models::ModelRoot;
use crate::ViewerState;

/// Plugin for the per-frame loop
pub struct RenderLoopPlugin;

impl Plugin for RenderLoopPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (detect_unmount, advance_frame, apply_model_rotation)
                .chain()
                .after(InputSet),
        );
    }
}

/// The viewer is gone once its window is
fn detect_unmount(windows: Query<(), With<PrimaryWindow>>, mut viewer: ResMut<ViewerState>) {
    if windows.is_empty() && viewer.frame_loop.is_mounted() {
        info!("Primary window closed, unmounting viewer");
        viewer.unmount();
    }
}

fn advance_frame(mut viewer: ResMut<ViewerState>) {
    let viewer = &mut *viewer;
    let model_present = viewer.session.model_present();
    viewer.frame_loop.advance(&mut viewer.controller, model_present);
}

fn apply_model_rotation(
    viewer: Res<ViewerState>,
    mut roots: Query<&mut Transform, With<ModelRoot>>,
) {
    if !viewer.frame_loop.is_mounted() {
        return;
    }
    let rotation = viewer.controller.state().model_rotation();
    for mut transform in &mut roots {
        transform.rotation = rotation;
    }
}
