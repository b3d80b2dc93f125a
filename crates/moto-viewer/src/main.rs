//! Moto Viewer - native entry point

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    native::main()
}

// The wasm build starts from the library's `#[wasm_bindgen(start)]` entry
#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use anyhow::{Context, Result};
    use bevy::app::AppExit;
    use clap::Parser;
    use moto_core::BundleManifest;
    use moto_viewer::{app, load_config, save_default_config};
    use std::path::PathBuf;
    use tracing::{error, info, Level};
    use tracing_subscriber::FmtSubscriber;

    #[derive(Parser, Debug)]
    #[command(name = "moto-viewer")]
    #[command(about = "Interactive 3D motorcycle showcase")]
    #[command(version)]
    struct Args {
        /// Path to configuration file
        #[arg(short, long, default_value = "moto-viewer.toml")]
        config: PathBuf,

        /// Model to show: a bundle id or a path/URL to a glTF/GLB file
        #[arg(short, long)]
        model: Option<String>,

        /// Window width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Window height in pixels
        #[arg(long)]
        height: Option<u32>,

        /// Start with auto-rotation off
        #[arg(long)]
        no_auto_rotate: bool,

        /// Log level (trace, debug, info, warn, error); overrides the config
        #[arg(short, long)]
        log_level: Option<String>,

        /// Write a default configuration to the config path and exit
        #[arg(long)]
        write_default_config: bool,
    }

    fn parse_level(level: &str) -> Level {
        match level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    pub fn main() -> Result<()> {
        let args = Args::parse();

        if args.write_default_config {
            save_default_config(&args.config)?;
            println!("Wrote default configuration to {}", args.config.display());
            return Ok(());
        }

        // Config is read before logging starts so its level can apply
        let mut config = load_config(&args.config)?;
        if let Some(level) = args.log_level {
            config.logging.level = level;
        }

        let subscriber = FmtSubscriber::builder()
            .with_max_level(parse_level(&config.logging.level))
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;

        info!("Moto Viewer v{}", env!("CARGO_PKG_VERSION"));

        if let Some(model) = args.model {
            match model.trim().parse::<u32>() {
                Ok(id) => {
                    config.model.bundle_id = Some(id);
                    config.model.path = None;
                }
                Err(_) => config.model.path = Some(model),
            }
        }
        if let Some(width) = args.width {
            config.viewer.width = width;
        }
        if let Some(height) = args.height {
            config.viewer.height = height;
        }
        if args.no_auto_rotate {
            config.viewer.auto_rotate = false;
        }

        let manifest = BundleManifest::from_file(&config.model.manifest)
            .with_context(|| format!("loading {}", config.model.manifest.display()))?;

        info!(
            width = config.viewer.width,
            height = config.viewer.height,
            auto_rotate = config.viewer.auto_rotate,
            assets = manifest.assets.len(),
            "Configuration loaded"
        );

        match app::run(config, manifest) {
            AppExit::Success => Ok(()),
            AppExit::Error(code) => {
                error!(code = code.get(), "Viewer exited with an error");
                anyhow::bail!("viewer exited with code {}", code)
            }
        }
    }

}
