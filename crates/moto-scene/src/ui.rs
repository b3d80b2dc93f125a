//! Loading spinner and error banner drawn over the canvas

use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use moto_core::Overlay;

use crate::ViewerState;

/// Plugin for the overlay
pub struct OverlayPlugin;

impl Plugin for OverlayPlugin {
    fn build(&self, app: &mut App) {
        // Runs in EguiPrimaryContextPass for proper input handling (bevy_egui 0.38+)
        app.add_systems(EguiPrimaryContextPass, overlay_system);
    }
}

/// Hosts that cannot report download length stay at 0 until done
fn spinner_label(progress: u8) -> String {
    if progress == 0 {
        "Loading model…".to_string()
    } else {
        format!("Loading model… {}%", progress)
    }
}

fn overlay_system(mut contexts: EguiContexts, viewer: Res<ViewerState>) {
    let Ok(ctx) = contexts.ctx_mut() else { return };

    match viewer.session.overlay() {
        Overlay::None => {}
        Overlay::Spinner { progress } => {
            egui::Window::new("loading")
                .title_bar(false)
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
                .show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.spinner();
                        ui.label(spinner_label(progress));
                    });
                });
        }
        Overlay::ErrorBanner(message) => {
            egui::Window::new("error")
                .title_bar(false)
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_TOP, egui::vec2(0.0, 16.0))
                .show(ctx, |ui| {
                    ui.label(
                        egui::RichText::new("Could not load the model")
                            .strong()
                            .color(egui::Color32::from_rgb(255, 100, 100)),
                    );
                    ui.label(egui::RichText::new(message).small());
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_label() {
        assert_eq!(spinner_label(0), "Loading model…");
        assert_eq!(spinner_label(42), "Loading model… 42%");
        assert_eq!(spinner_label(100), "Loading model… 100%");
    }
}
