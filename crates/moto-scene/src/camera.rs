//! Fixed camera rig following the zoom of the gesture controller

use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::{RenderSetupError, ViewerState};

/// Marker component for the main camera
#[derive(Component)]
pub struct MainCamera;

/// Plugin for the camera rig
pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_camera)
            .add_systems(PostStartup, check_render_setup)
            .add_systems(Update, apply_camera_zoom.after(crate::input::InputSet));
    }
}

fn spawn_camera(mut commands: Commands, viewer: Res<ViewerState>) {
    let controller = &viewer.controller;
    commands.spawn((
        Camera3d::default(),
        Camera {
            // Transparent so the host page shows through
            clear_color: ClearColorConfig::Custom(Color::NONE),
            ..default()
        },
        Projection::Perspective(PerspectiveProjection {
            fov: 45f32.to_radians(),
            near: 0.1,
            far: 100.0,
            ..default()
        }),
        Transform::from_translation(controller.camera_position())
            .looking_at(controller.camera_target(), Vec3::Y),
        MainCamera,
    ));
}

/// A viewer without a window or camera cannot show anything
fn check_render_setup(
    windows: Query<(), With<PrimaryWindow>>,
    cameras: Query<(), With<MainCamera>>,
    mut viewer: ResMut<ViewerState>,
) {
    let result = if windows.single().is_err() {
        Err(RenderSetupError::NoWindow)
    } else if cameras.single().is_err() {
        Err(RenderSetupError::NoCamera)
    } else {
        Ok(())
    };

    if let Err(e) = result {
        viewer.session.fail(e.to_string());
        viewer.unmount();
    }
}

fn apply_camera_zoom(
    viewer: Res<ViewerState>,
    mut camera_query: Query<&mut Transform, With<MainCamera>>,
) {
    let Ok(mut transform) = camera_query.single_mut() else {
        return;
    };
    let controller = &viewer.controller;
    transform.translation = controller.camera_position();
    transform.look_at(controller.camera_target(), Vec3::Y);
}
