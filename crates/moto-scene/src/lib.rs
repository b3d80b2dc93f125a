//! Moto Scene - Bevy rendering of the showcased motorcycle
//!
//! This crate wires the engine-independent pieces of `moto-core` into a
//! Bevy app:
//! - camera rig and lights
//! - background model loading and spawning of the resulting scene graph
//! - touch and mouse input feeding the gesture controller
//! - per-frame auto-rotation
//! - egui overlay for the spinner and error banner

pub mod camera;
pub mod input;
pub mod models;
pub mod render_loop;
pub mod scene;
pub mod ui;

use bevy::prelude::*;
use moto_core::{ControlSettings, CameraRig, FrameLoop, GestureController, ViewerSession};
use thiserror::Error;

/// Host-facing viewer options
#[derive(Debug, Clone, Resource)]
pub struct ViewerSettings {
    pub auto_rotate: bool,
    pub controls: ControlSettings,
    pub rig: CameraRig,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            auto_rotate: true,
            controls: ControlSettings::default(),
            rig: CameraRig::default(),
        }
    }
}

/// Everything one mounted viewer owns
#[derive(Debug, Resource)]
pub struct ViewerState {
    pub session: ViewerSession,
    pub controller: GestureController,
    pub frame_loop: FrameLoop,
}

impl ViewerState {
    pub fn new(settings: &ViewerSettings) -> Self {
        Self {
            session: ViewerSession::mount(),
            controller: GestureController::new(settings.controls, settings.rig),
            frame_loop: FrameLoop::new(settings.auto_rotate, settings.controls.auto_rotate_step),
        }
    }

    /// Stop all further state changes from frames and load completions
    pub fn unmount(&mut self) {
        self.session.unmount();
        self.frame_loop.unmount();
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderSetupError {
    #[error("no window to render into")]
    NoWindow,
    #[error("camera could not be created")]
    NoCamera,
}

/// Plugin that sets up the viewer
pub struct MotoScenePlugin;

impl Plugin for MotoScenePlugin {
    fn build(&self, app: &mut App) {
        let settings = app
            .world()
            .get_resource::<ViewerSettings>()
            .cloned()
            .unwrap_or_default();

        app.insert_resource(ViewerState::new(&settings))
            .insert_resource(settings)
            .add_plugins(camera::CameraPlugin)
            .add_plugins(scene::SceneSetupPlugin)
            .add_plugins(models::ModelsPlugin)
            .add_plugins(input::InputPlugin)
            .add_plugins(render_loop::RenderLoopPlugin)
            .add_plugins(ui::OverlayPlugin);
    }
}

pub use camera::MainCamera;
pub use models::{ModelRequest, ModelRoot, PendingLoad};
