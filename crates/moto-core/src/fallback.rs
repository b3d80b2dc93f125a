//! Low-poly stand-in shown when the real model cannot be displayed

use glam::{Quat, Vec3};
use tracing::info;

use crate::classifier::{preset, MaterialCategory};
use crate::scene_graph::{MeshData, MeshNode, Node, NodeId, SceneGraph, Transform};

pub const FALLBACK_NAME: &str = "fallback_motorcycle";

/// (name, size, position, category)
const PARTS: [(&str, [f32; 3], [f32; 3], MaterialCategory); 4] = [
    ("fallback_body", [2.0, 0.6, 0.5], [0.0, 0.9, 0.0], MaterialCategory::BodyPaint),
    ("fallback_seat", [0.8, 0.15, 0.4], [-0.3, 1.27, 0.0], MaterialCategory::Seat),
    ("fallback_front_wheel", [0.7, 0.7, 0.15], [0.75, 0.35, 0.0], MaterialCategory::Rubber),
    ("fallback_rear_wheel", [0.7, 0.7, 0.15], [-0.75, 0.35, 0.0], MaterialCategory::Rubber),
];

/// Add the proxy motorcycle to `scene` and return its group
pub fn build_fallback(scene: &mut SceneGraph) -> NodeId {
    // Three-quarter view like the showcased model
    let group_transform = Transform::default().with_rotation(Quat::from_rotation_y(-0.4));
    let group = scene.add_root(Node::group(FALLBACK_NAME, group_transform));

    for (name, [w, h, d], position, category) in PARTS {
        let mut mesh = MeshNode::new(MeshData::cuboid(w, h, d), preset(category).to_material(name));
        mesh.cast_shadow = true;
        mesh.receive_shadow = true;
        scene.add_child(
            group,
            Node::mesh(name, Transform::from_translation(Vec3::from_array(position)), mesh),
        );
    }

    info!("Fallback model added");
    group
}
