//! Touch gestures to model rotation and camera zoom
//!
//! The controller is a small state machine keyed by the number of active
//! touches:
//!
//! | touches | phase      | effect                                  |
//! |---------|------------|-----------------------------------------|
//! | 0       | `Idle`     | nothing                                 |
//! | 1       | `Rotating` | yaw/pitch from cumulative drag           |
//! | 2+      | `Zooming`  | camera distance from pinch distance      |
//!
//! Rotation is absolute: each move recomputes the angles from the snapshot
//! taken when the phase began plus the total displacement since then, so no
//! error accumulates across frames. Nothing is smoothed and there is no
//! inertia after release.

use glam::{EulerRot, Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_3;
use tracing::{debug, trace};

/// Pinch distances below this are treated as degenerate
const MIN_PINCH_DISTANCE: f32 = 1e-6;

/// Fraction of the zoom removed per scroll line
const SCROLL_ZOOM_STEP: f32 = 0.1;

/// Tunable gesture and camera parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlSettings {
    /// Radians of yaw per pixel of horizontal drag
    #[serde(default = "default_horizontal_sensitivity")]
    pub horizontal_sensitivity: f32,
    /// Radians of pitch per pixel of vertical drag
    #[serde(default = "default_vertical_sensitivity")]
    pub vertical_sensitivity: f32,
    #[serde(default = "default_min_zoom")]
    pub min_zoom: f32,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: f32,
    #[serde(default = "default_initial_zoom")]
    pub initial_zoom: f32,
    /// Yaw added per frame while auto-rotating
    #[serde(default = "default_auto_rotate_step")]
    pub auto_rotate_step: f32,
}

fn default_horizontal_sensitivity() -> f32 {
    0.0004
}

fn default_vertical_sensitivity() -> f32 {
    0.0002
}

fn default_min_zoom() -> f32 {
    0.5
}

fn default_max_zoom() -> f32 {
    12.0
}

fn default_initial_zoom() -> f32 {
    5.0
}

fn default_auto_rotate_step() -> f32 {
    0.005
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            horizontal_sensitivity: default_horizontal_sensitivity(),
            vertical_sensitivity: default_vertical_sensitivity(),
            min_zoom: default_min_zoom(),
            max_zoom: default_max_zoom(),
            initial_zoom: default_initial_zoom(),
            auto_rotate_step: default_auto_rotate_step(),
        }
    }
}

impl ControlSettings {
    pub fn clamp_zoom(&self, zoom: f32) -> f32 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }
}

/// Fixed camera placement for the showcased model
///
/// Only the distance along Z follows the zoom; X and Y are calibrated for
/// this one model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraRig {
    pub x: f32,
    pub y: f32,
    pub target: Vec3,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 1.5,
            target: Vec3::new(0.0, 0.8, 0.0),
        }
    }
}

impl CameraRig {
    pub fn position(&self, zoom: f32) -> Vec3 {
        Vec3::new(self.x, self.y, zoom)
    }
}

/// One touch as reported by the host; coordinates may be missing
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TouchPoint {
    pub x: Option<f32>,
    pub y: Option<f32>,
}

impl TouchPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
        }
    }

    /// Position if both coordinates are present and finite
    pub fn position(&self) -> Option<Vec2> {
        match (self.x, self.y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some(Vec2::new(x, y)),
            _ => None,
        }
    }
}

impl From<Vec2> for TouchPoint {
    fn from(v: Vec2) -> Self {
        Self::new(v.x, v.y)
    }
}

/// Touch notifications delivered by the host
#[derive(Debug, Clone, PartialEq)]
pub enum TouchEvent {
    Began(Vec<TouchPoint>),
    Moved(Vec<TouchPoint>),
    /// Touches still down after the release
    Ended(Vec<TouchPoint>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GesturePhase {
    #[default]
    Idle,
    Rotating,
    Zooming,
}

impl GesturePhase {
    fn for_touch_count(count: usize) -> Self {
        match count {
            0 => GesturePhase::Idle,
            1 => GesturePhase::Rotating,
            _ => GesturePhase::Zooming,
        }
    }
}

/// Rotation, zoom and the transients of the current gesture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionState {
    /// Pitch about X in `x`, yaw about Y in `y` (radians)
    pub rotation: Vec2,
    /// Camera distance along Z
    pub zoom: f32,
    /// Rotation when the current rotation phase began
    pub rotation_snapshot: Vec2,
    /// Drag origin of the current rotation phase
    pub drag_origin: Option<Vec2>,
    pub pinch_reference_distance: Option<f32>,
    pub pinch_reference_zoom: Option<f32>,
    /// Per-axis change applied by the last move (radians per event)
    pub angular_velocity: Vec2,
}

impl InteractionState {
    pub fn new(zoom: f32) -> Self {
        Self {
            rotation: Vec2::ZERO,
            zoom,
            rotation_snapshot: Vec2::ZERO,
            drag_origin: None,
            pinch_reference_distance: None,
            pinch_reference_zoom: None,
            angular_velocity: Vec2::ZERO,
        }
    }

    pub fn pitch(&self) -> f32 {
        self.rotation.x
    }

    pub fn yaw(&self) -> f32 {
        self.rotation.y
    }

    /// Orientation to apply to the model root
    pub fn model_rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.rotation.y, self.rotation.x, 0.0)
    }

    fn clear_pinch(&mut self) {
        self.pinch_reference_distance = None;
        self.pinch_reference_zoom = None;
    }
}

#[derive(Debug, Clone)]
pub struct GestureController {
    settings: ControlSettings,
    rig: CameraRig,
    phase: GesturePhase,
    state: InteractionState,
}

impl Default for GestureController {
    fn default() -> Self {
        Self::new(ControlSettings::default(), CameraRig::default())
    }
}

impl GestureController {
    pub fn new(settings: ControlSettings, rig: CameraRig) -> Self {
        Self {
            state: InteractionState::new(settings.clamp_zoom(settings.initial_zoom)),
            settings,
            rig,
            phase: GesturePhase::Idle,
        }
    }

    pub fn settings(&self) -> &ControlSettings {
        &self.settings
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn phase(&self) -> GesturePhase {
        self.phase
    }

    /// True while any finger (or mouse button) is down
    pub fn is_active(&self) -> bool {
        self.phase != GesturePhase::Idle
    }

    pub fn camera_position(&self) -> Vec3 {
        self.rig.position(self.state.zoom)
    }

    pub fn camera_target(&self) -> Vec3 {
        self.rig.target
    }

    pub fn handle(&mut self, event: &TouchEvent) {
        match event {
            TouchEvent::Began(touches) => self.touch_start(touches),
            TouchEvent::Moved(touches) => self.touch_move(touches),
            TouchEvent::Ended(remaining) => self.touch_end(remaining),
        }
    }

    /// A new gesture starts: snapshot rotation, reset transients
    pub fn touch_start(&mut self, touches: &[TouchPoint]) {
        let Some(points) = positions(touches) else {
            debug!("Skipping malformed touch start");
            return;
        };
        self.state.clear_pinch();
        self.state.angular_velocity = Vec2::ZERO;
        self.begin_phase(&points);
    }

    pub fn touch_move(&mut self, touches: &[TouchPoint]) {
        let Some(points) = positions(touches) else {
            trace!("Skipping malformed touch frame");
            return;
        };
        if GesturePhase::for_touch_count(points.len()) != self.phase {
            // Finger added or lifted without a start/end notification
            self.begin_phase(&points);
        }

        match self.phase {
            GesturePhase::Idle => {}
            GesturePhase::Rotating => self.rotate(points[0]),
            GesturePhase::Zooming => self.pinch(points[0].distance(points[1])),
        }
    }

    /// Release; `remaining` are the touches still down
    pub fn touch_end(&mut self, remaining: &[TouchPoint]) {
        self.state.clear_pinch();
        self.state.angular_velocity = Vec2::ZERO;
        match positions(remaining) {
            Some(points) => self.begin_phase(&points),
            None => {
                self.phase = GesturePhase::Idle;
                self.state.drag_origin = None;
            }
        }
    }

    /// Mouse wheel; positive `lines` zooms in
    pub fn scroll_zoom(&mut self, lines: f32) {
        if !lines.is_finite() {
            return;
        }
        let factor = (-lines * SCROLL_ZOOM_STEP).exp();
        self.state.zoom = self.settings.clamp_zoom(self.state.zoom * factor);
    }

    /// Yaw step from the render loop's auto-rotation
    pub fn advance_yaw(&mut self, step: f32) {
        self.state.rotation.y += step;
    }

    fn begin_phase(&mut self, points: &[Vec2]) {
        self.phase = GesturePhase::for_touch_count(points.len());
        self.state.rotation_snapshot = self.state.rotation;
        self.state.drag_origin = None;
        self.state.clear_pinch();
        if self.phase == GesturePhase::Rotating {
            self.state.drag_origin = Some(points[0]);
        }
    }

    fn rotate(&mut self, position: Vec2) {
        let Some(origin) = self.state.drag_origin else {
            self.state.drag_origin = Some(position);
            return;
        };
        let delta = position - origin;
        let snapshot = self.state.rotation_snapshot;
        let limit = FRAC_PI_3;

        let rotation = Vec2::new(
            (snapshot.x + delta.y * self.settings.vertical_sensitivity).clamp(-limit, limit),
            snapshot.y + delta.x * self.settings.horizontal_sensitivity,
        );
        self.state.angular_velocity = rotation - self.state.rotation;
        self.state.rotation = rotation;
    }

    fn pinch(&mut self, distance: f32) {
        match (self.state.pinch_reference_distance, self.state.pinch_reference_zoom) {
            (Some(reference), Some(zoom)) => {
                let scaled = zoom * reference / distance.max(MIN_PINCH_DISTANCE);
                self.state.zoom = self.settings.clamp_zoom(scaled);
            }
            _ => {
                if distance < MIN_PINCH_DISTANCE {
                    // Two fingers on one spot: no usable reference yet
                    return;
                }
                self.state.pinch_reference_distance = Some(distance);
                self.state.pinch_reference_zoom = Some(self.state.zoom);
            }
        }
    }
}

/// All touch positions, or `None` if any touch is malformed
fn positions(touches: &[TouchPoint]) -> Option<Vec<Vec2>> {
    touches.iter().map(TouchPoint::position).collect()
}
