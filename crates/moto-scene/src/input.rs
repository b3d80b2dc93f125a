//! Touch and mouse input feeding the gesture controller

use bevy::input::mouse::{AccumulatedMouseScroll, MouseScrollUnit};
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use moto_core::TouchPoint;

use crate::ViewerState;

/// Pixels per scroll line on trackpads and browsers
const PIXELS_PER_LINE: f32 = 100.0;

/// Systems that update the interaction state from input
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputSet;

/// Plugin for gesture input
pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (handle_touches, handle_mouse).chain().in_set(InputSet),
        );
    }
}

fn touch_points(touches: &Touches) -> Vec<TouchPoint> {
    touches.iter().map(|t| TouchPoint::from(t.position())).collect()
}

fn handle_touches(touches: Res<Touches>, mut viewer: ResMut<ViewerState>) {
    if !viewer.session.is_mounted() {
        return;
    }
    let controller = &mut viewer.controller;

    // Released touches are no longer in `iter()`
    if touches.any_just_released() || touches.any_just_canceled() {
        controller.touch_end(&touch_points(&touches));
    }
    if touches.any_just_pressed() {
        controller.touch_start(&touch_points(&touches));
    }
    if touches.iter().any(|t| t.delta() != Vec2::ZERO) {
        controller.touch_move(&touch_points(&touches));
    }
}

/// Desktop stand-in: left drag rotates, the wheel zooms
fn handle_mouse(
    buttons: Res<ButtonInput<MouseButton>>,
    scroll: Res<AccumulatedMouseScroll>,
    touches: Res<Touches>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut viewer: ResMut<ViewerState>,
) {
    if !viewer.session.is_mounted() || touches.iter().next().is_some() {
        return;
    }

    // Missing cursor becomes a malformed point and the frame is skipped
    let cursor = windows
        .single()
        .ok()
        .and_then(Window::cursor_position)
        .map(TouchPoint::from)
        .unwrap_or_default();
    let controller = &mut viewer.controller;

    if buttons.just_pressed(MouseButton::Left) {
        controller.touch_start(&[cursor]);
    } else if buttons.just_released(MouseButton::Left) {
        controller.touch_end(&[]);
    } else if buttons.pressed(MouseButton::Left) {
        controller.touch_move(&[cursor]);
    }

    if scroll.delta.y != 0.0 {
        let lines = match scroll.unit {
            MouseScrollUnit::Line => scroll.delta.y,
            MouseScrollUnit::Pixel => scroll.delta.y / PIXELS_PER_LINE,
        };
        controller.scroll_zoom(lines);
    }
}
