//! Scene setup and conversion of a [`SceneGraph`] into entities

use bevy::asset::RenderAssetUsages;
use bevy::light::{NotShadowCaster, NotShadowReceiver};
use bevy::mesh::Indices;
use bevy::prelude::*;
use bevy::render::render_resource::{Face, PrimitiveTopology};
use moto_core::scene_graph::{self, MeshData, NodeId, NodeKind, SceneGraph};

/// Marker component for the main directional light
#[derive(Component)]
pub struct MainDirectionalLight;

/// Node of the displayed model
#[derive(Component)]
pub struct ModelNode {
    pub name: String,
}

/// Plugin for lights and environment
pub struct SceneSetupPlugin;

impl Plugin for SceneSetupPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_lights);
    }
}

fn setup_lights(mut commands: Commands) {
    commands.insert_resource(AmbientLight {
        color: Color::srgb(0.95, 0.95, 1.0),
        brightness: 300.0,
        ..default()
    });

    // Key light from the front right, casting the model's shadows
    commands.spawn((
        DirectionalLight {
            illuminance: 8000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4.0, 6.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
        MainDirectionalLight,
    ));

    // Fill from behind the rig
    commands.spawn((
        PointLight {
            intensity: 200_000.0,
            shadows_enabled: false,
            ..default()
        },
        Transform::from_xyz(-3.0, 3.0, -4.0),
    ));
}

/// Build a Bevy mesh from loader geometry
pub fn to_mesh(data: &MeshData) -> Mesh {
    let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default())
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, data.positions.clone())
        .with_inserted_attribute(Mesh::ATTRIBUTE_NORMAL, data.normals.clone());
    if let Some(uvs) = &data.uvs {
        mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs.clone());
    }
    if let Some(indices) = &data.indices {
        mesh.insert_indices(Indices::U32(indices.clone()));
    }
    mesh
}

pub fn to_standard_material(material: &scene_graph::Material) -> StandardMaterial {
    let [r, g, b] = material.color.to_array();
    let emissive = Color::srgb(material.emissive.r, material.emissive.g, material.emissive.b)
        .to_linear();
    let intensity = material.emissive_intensity;
    StandardMaterial {
        base_color: Color::srgba(r, g, b, material.opacity),
        metallic: material.metalness,
        perceptual_roughness: material.roughness,
        emissive: LinearRgba::rgb(
            emissive.red * intensity,
            emissive.green * intensity,
            emissive.blue * intensity,
        ),
        alpha_mode: if material.transparent {
            AlphaMode::Blend
        } else {
            AlphaMode::Opaque
        },
        double_sided: material.double_sided,
        cull_mode: if material.double_sided {
            None
        } else {
            Some(Face::Back)
        },
        ..default()
    }
}

fn to_transform(transform: &scene_graph::Transform) -> Transform {
    Transform {
        translation: transform.translation,
        rotation: transform.rotation,
        scale: transform.scale,
    }
}

/// Spawn every node of `graph` below `parent`
pub fn spawn_scene_graph(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    graph: &SceneGraph,
    parent: Entity,
) -> usize {
    let mut spawned = 0;
    for &root in graph.roots() {
        spawned += spawn_node(commands, meshes, materials, graph, root, parent);
    }
    spawned
}

fn spawn_node(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    graph: &SceneGraph,
    id: NodeId,
    parent: Entity,
) -> usize {
    let Some(node) = graph.node(id) else {
        return 0;
    };

    let mut entity = commands.spawn((
        to_transform(&node.transform),
        Visibility::default(),
        ModelNode {
            name: node.name.clone(),
        },
        ChildOf(parent),
    ));

    if let NodeKind::Mesh(mesh) = &node.kind {
        entity.insert((
            Mesh3d(meshes.add(to_mesh(&mesh.geometry))),
            MeshMaterial3d(materials.add(to_standard_material(&mesh.material))),
        ));
        if !mesh.cast_shadow {
            entity.insert(NotShadowCaster);
        }
        if !mesh.receive_shadow {
            entity.insert(NotShadowReceiver);
        }
    }
    let entity = entity.id();

    let mut spawned = 1;
    for &child in &node.children {
        spawned += spawn_node(commands, meshes, materials, graph, child, entity);
    }
    spawned
}

#[cfg(test)]
mod tests {
    use super::*;
    use moto_core::classifier::{preset, MaterialCategory};

    #[test]
    fn test_cuboid_to_mesh() {
        let mesh = to_mesh(&MeshData::cuboid(1.0, 1.0, 1.0));
        assert_eq!(mesh.count_vertices(), 24);
        assert_eq!(mesh.indices().map(|i| i.len()), Some(36));
        assert!(mesh.attribute(Mesh::ATTRIBUTE_UV_0).is_some());
    }

    #[test]
    fn test_glass_material() {
        let material = to_standard_material(&preset(MaterialCategory::Glass).to_material("visor"));
        assert!(matches!(material.alpha_mode, AlphaMode::Blend));
        assert!(material.double_sided);
        assert_eq!(material.cull_mode, None);
        assert!((material.base_color.alpha() - 0.35).abs() < 1e-6);
    }

    #[test]
    fn test_body_material() {
        let material = to_standard_material(&preset(MaterialCategory::BodyPaint).to_material("tank"));
        assert!(matches!(material.alpha_mode, AlphaMode::Opaque));
        assert_eq!(material.metallic, 0.6);
        assert_eq!(material.perceptual_roughness, 0.25);
        assert_eq!(material.emissive, LinearRgba::BLACK);
    }
}
