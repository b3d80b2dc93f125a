//! Moto Viewer - Interactive 3D motorcycle showcase
//!
//! Hosts the `moto-scene` plugin in a window (native) or a canvas (wasm).
//! The native binary lives in `main.rs`; the wasm entry point is below.

pub mod app;
pub mod config;

pub use config::{load_config, save_default_config, ViewerConfig};

#[cfg(target_arch = "wasm32")]
mod web {
    use moto_core::BundleManifest;
    use tracing::error;
    use wasm_bindgen::prelude::*;

    use crate::{app, ViewerConfig};

    /// Manifest baked in at build time; the page serves the models next to it
    const BUNDLE_MANIFEST: &str = include_str!("../../../assets/bundle.toml");

    /// WASM entry point
    #[wasm_bindgen(start)]
    pub fn main() {
        // Set up panic hook for better error messages
        console_error_panic_hook::set_once();

        tracing_wasm::set_as_global_default_with_config(
            tracing_wasm::WASMLayerConfigBuilder::new()
                .set_max_level(tracing::Level::WARN)
                .build(),
        );

        let manifest = BundleManifest::parse(BUNDLE_MANIFEST).unwrap_or_else(|e| {
            error!(error = %e, "Bundled manifest is invalid");
            BundleManifest::default()
        });

        app::run(ViewerConfig::default(), manifest);
    }
}
