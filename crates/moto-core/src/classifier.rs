//! Name-based material classification
//!
//! Source materials are discarded. Every mesh gets a fresh material built
//! from the preset of its [`MaterialCategory`], which is derived from
//! keywords in the material and mesh names. Rule order matters: the first
//! category whose keywords match wins.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::scene_graph::{Material, MeshData, Rgb, SceneGraph};

/// Vertex count above which an unnamed mesh is treated as a body panel
pub const BODY_PANEL_VERTEX_THRESHOLD: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum MaterialCategory {
    BodyPaint,
    Chrome,
    Rubber,
    Glass,
    Light,
    Seat,
    AccentDetail,
    CarbonFiber,
    Default,
}

impl fmt::Display for MaterialCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Keyword rules, evaluated top to bottom
pub const RULES: &[(MaterialCategory, &[&str])] = &[
    (MaterialCategory::BodyPaint, &["body", "fairing", "tank", "paint"]),
    (MaterialCategory::Chrome, &["metal", "chrome", "silver", "exhaust"]),
    (MaterialCategory::Rubber, &["rubber", "tire", "wheel"]),
    (MaterialCategory::Glass, &["glass", "window", "screen", "visor"]),
    (
        MaterialCategory::Light,
        &["light", "headlight", "taillight", "lamp", "led"],
    ),
    (MaterialCategory::Seat, &["seat", "saddle"]),
    (
        MaterialCategory::AccentDetail,
        &["accent", "detail", "stripe", "logo", "badge"],
    ),
    (MaterialCategory::CarbonFiber, &["carbon", "fiber"]),
];

/// Pick the category for a mesh
///
/// Total: anything that matches no rule falls back on geometry density.
pub fn classify(material_name: &str, mesh_name: &str, vertex_count: usize) -> MaterialCategory {
    let material_name = material_name.to_lowercase();
    let mesh_name = mesh_name.to_lowercase();

    RULES
        .iter()
        .find(|(_, keywords)| {
            keywords
                .iter()
                .any(|k| material_name.contains(k) || mesh_name.contains(k))
        })
        .map(|(category, _)| *category)
        .unwrap_or(if vertex_count > BODY_PANEL_VERTEX_THRESHOLD {
            MaterialCategory::BodyPaint
        } else {
            MaterialCategory::Default
        })
}

/// Fixed surface parameters for one category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialPreset {
    pub color: u32,
    pub metalness: f32,
    pub roughness: f32,
    pub emissive: Option<(u32, f32)>,
    pub opacity: f32,
}

impl MaterialPreset {
    const fn solid(color: u32, metalness: f32, roughness: f32) -> Self {
        Self {
            color,
            metalness,
            roughness,
            emissive: None,
            opacity: 1.0,
        }
    }

    /// Build a fresh material carrying this preset
    pub fn to_material(&self, name: impl Into<String>) -> Material {
        let (emissive, emissive_intensity) = match self.emissive {
            Some((color, intensity)) => (Rgb::from_hex(color), intensity),
            None => (Rgb::BLACK, 0.0),
        };
        let transparent = self.opacity < 1.0;
        Material {
            name: name.into(),
            color: Rgb::from_hex(self.color),
            metalness: self.metalness,
            roughness: self.roughness,
            emissive,
            emissive_intensity,
            opacity: self.opacity,
            transparent,
            double_sided: transparent,
            ..Default::default()
        }
    }
}

/// Substitute for meshes whose material could not be processed
pub const NEUTRAL_GRAY: MaterialPreset = MaterialPreset::solid(0x888888, 0.2, 0.7);

pub fn preset(category: MaterialCategory) -> MaterialPreset {
    match category {
        MaterialCategory::BodyPaint => MaterialPreset::solid(0xC41E3A, 0.6, 0.25),
        MaterialCategory::Chrome => MaterialPreset::solid(0xE8E8E8, 1.0, 0.08),
        MaterialCategory::Rubber => MaterialPreset::solid(0x1A1A1A, 0.0, 0.9),
        MaterialCategory::Glass => MaterialPreset {
            opacity: 0.35,
            ..MaterialPreset::solid(0xA8D8FF, 0.1, 0.05)
        },
        MaterialCategory::Light => MaterialPreset {
            emissive: Some((0xFFF4C0, 0.8)),
            ..MaterialPreset::solid(0xFFFFEE, 0.1, 0.2)
        },
        MaterialCategory::Seat => MaterialPreset::solid(0x2B1D14, 0.0, 0.8),
        MaterialCategory::AccentDetail => MaterialPreset::solid(0xD4AF37, 0.8, 0.3),
        MaterialCategory::CarbonFiber => MaterialPreset::solid(0x222222, 0.3, 0.4),
        MaterialCategory::Default => MaterialPreset::solid(0x808080, 0.3, 0.6),
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum MaterialProcessingError {
    #[error("mesh {0} has no vertices")]
    EmptyGeometry(String),
    #[error("mesh {mesh} has non-finite vertex data at index {index}")]
    NonFinite { mesh: String, index: usize },
}

fn check_geometry(mesh_name: &str, geometry: &MeshData) -> Result<(), MaterialProcessingError> {
    if geometry.positions.is_empty() {
        return Err(MaterialProcessingError::EmptyGeometry(mesh_name.to_string()));
    }
    let bad = geometry
        .positions
        .iter()
        .chain(geometry.normals.iter())
        .position(|v| v.iter().any(|c| !c.is_finite()));
    match bad {
        Some(index) => Err(MaterialProcessingError::NonFinite {
            mesh: mesh_name.to_string(),
            index,
        }),
        None => Ok(()),
    }
}

/// Outcome of one classification pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassificationReport {
    pub counts: BTreeMap<MaterialCategory, usize>,
    pub failures: Vec<String>,
}

impl ClassificationReport {
    pub fn classified(&self) -> usize {
        self.counts.values().sum()
    }

    /// True when meshes were present and none could be processed
    pub fn all_failed(&self) -> bool {
        !self.failures.is_empty() && self.classified() == 0
    }
}

/// Replace every mesh material in the graph and enable shadows
pub fn classify_scene(scene: &mut SceneGraph) -> ClassificationReport {
    let mut report = ClassificationReport::default();

    for (mesh_name, mesh) in scene.meshes_mut() {
        mesh.cast_shadow = true;
        mesh.receive_shadow = true;

        match check_geometry(mesh_name, &mesh.geometry) {
            Ok(()) => {
                let category = classify(
                    &mesh.material.name,
                    mesh_name,
                    mesh.geometry.vertex_count(),
                );
                debug!(mesh = %mesh_name, material = %mesh.material.name, ?category, "Classified");
                let name = std::mem::take(&mut mesh.material.name);
                mesh.material = preset(category).to_material(name);
                *report.counts.entry(category).or_default() += 1;
            }
            Err(e) => {
                warn!(error = %e, "Material processing failed, using neutral gray");
                let name = std::mem::take(&mut mesh.material.name);
                mesh.material = NEUTRAL_GRAY.to_material(name);
                report.failures.push(e.to_string());
            }
        }
    }

    info!(
        classified = report.classified(),
        failed = report.failures.len(),
        "Material classification complete"
    );
    report
}
