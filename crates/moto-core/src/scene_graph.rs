//! Engine-independent scene graph produced by the loader
//!
//! Nodes live in a flat arena and refer to each other by index. Mesh nodes
//! carry their geometry and a material; group nodes only carry a transform.
//! The graph is owned by one viewer and replaced wholesale on reload.

use glam::{Quat, Vec3};

/// Index of a node inside its [`SceneGraph`]
pub type NodeId = usize;

/// Local transform of a node relative to its parent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }
}

/// sRGB color with components in 0..=1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0.0, g: 0.0, b: 0.0 };
    pub const WHITE: Rgb = Rgb { r: 1.0, g: 1.0, b: 1.0 };

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Build a color from a `0xRRGGBB` literal
    pub fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as f32 / 255.0,
            g: ((hex >> 8) & 0xff) as f32 / 255.0,
            b: (hex & 0xff) as f32 / 255.0,
        }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// Reference from a material slot to an image in the source asset
#[derive(Debug, Clone, PartialEq)]
pub struct TextureRef {
    /// Index of the image in the source asset
    pub image_index: usize,
    /// External URI of the image, `None` when embedded in a buffer view
    pub uri: Option<String>,
}

/// The six texture slots a material can reference
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextureSlots {
    pub map: Option<TextureRef>,
    pub normal_map: Option<TextureRef>,
    pub roughness_map: Option<TextureRef>,
    pub metalness_map: Option<TextureRef>,
    pub ao_map: Option<TextureRef>,
    pub emissive_map: Option<TextureRef>,
}

impl TextureSlots {
    /// Drop every texture reference
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// True when no slot references a texture
    pub fn is_empty(&self) -> bool {
        self.iter().all(|slot| slot.is_none())
    }

    /// Number of occupied slots
    pub fn occupied(&self) -> usize {
        self.iter().filter(|slot| slot.is_some()).count()
    }

    fn iter(&self) -> impl Iterator<Item = &Option<TextureRef>> {
        [
            &self.map,
            &self.normal_map,
            &self.roughness_map,
            &self.metalness_map,
            &self.ao_map,
            &self.emissive_map,
        ]
        .into_iter()
    }
}

/// Physically-inspired surface description of a mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub color: Rgb,
    pub metalness: f32,
    pub roughness: f32,
    pub emissive: Rgb,
    pub emissive_intensity: f32,
    pub opacity: f32,
    pub transparent: bool,
    pub double_sided: bool,
    pub textures: TextureSlots,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            color: Rgb::WHITE,
            metalness: 0.0,
            roughness: 1.0,
            emissive: Rgb::BLACK,
            emissive_intensity: 1.0,
            opacity: 1.0,
            transparent: false,
            double_sided: false,
            textures: TextureSlots::default(),
        }
    }
}

/// Triangle geometry of a single mesh primitive
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Option<Vec<[f32; 2]>>,
    pub indices: Option<Vec<u32>>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Axis-aligned box centred on the origin with 24 vertices (flat faces)
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        let (x, y, z) = (width / 2.0, height / 2.0, depth / 2.0);

        // (normal, four corners counter-clockwise seen from outside)
        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            ([0.0, 0.0, 1.0], [[-x, -y, z], [x, -y, z], [x, y, z], [-x, y, z]]),
            ([0.0, 0.0, -1.0], [[x, -y, -z], [-x, -y, -z], [-x, y, -z], [x, y, -z]]),
            ([1.0, 0.0, 0.0], [[x, -y, z], [x, -y, -z], [x, y, -z], [x, y, z]]),
            ([-1.0, 0.0, 0.0], [[-x, -y, -z], [-x, -y, z], [-x, y, z], [-x, y, -z]]),
            ([0.0, 1.0, 0.0], [[-x, y, z], [x, y, z], [x, y, -z], [-x, y, -z]]),
            ([0.0, -1.0, 0.0], [[-x, -y, -z], [x, -y, -z], [x, -y, z], [-x, -y, z]]),
        ];

        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut uvs = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for (normal, corners) in faces {
            let base = positions.len() as u32;
            positions.extend_from_slice(&corners);
            normals.extend_from_slice(&[normal; 4]);
            uvs.extend_from_slice(&[[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]);
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self {
            positions,
            normals,
            uvs: Some(uvs),
            indices: Some(indices),
        }
    }

    /// Fill in smooth vertex normals when the source asset did not provide any
    pub fn ensure_normals(&mut self) {
        if self.normals.len() == self.positions.len() {
            return;
        }

        let mut accum = vec![Vec3::ZERO; self.positions.len()];
        let triangles: Vec<[usize; 3]> = match &self.indices {
            Some(indices) => indices
                .chunks_exact(3)
                .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
                .collect(),
            None => (0..self.positions.len() / 3)
                .map(|i| [i * 3, i * 3 + 1, i * 3 + 2])
                .collect(),
        };

        for [a, b, c] in triangles {
            if a >= accum.len() || b >= accum.len() || c >= accum.len() {
                continue;
            }
            let pa = Vec3::from_array(self.positions[a]);
            let pb = Vec3::from_array(self.positions[b]);
            let pc = Vec3::from_array(self.positions[c]);
            let face = (pb - pa).cross(pc - pa);
            accum[a] += face;
            accum[b] += face;
            accum[c] += face;
        }

        self.normals = accum
            .into_iter()
            .map(|n| n.try_normalize().unwrap_or(Vec3::Y).to_array())
            .collect();
    }
}

/// Payload of a mesh node
#[derive(Debug, Clone, PartialEq)]
pub struct MeshNode {
    pub geometry: MeshData,
    pub material: Material,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl MeshNode {
    pub fn new(geometry: MeshData, material: Material) -> Self {
        Self {
            geometry,
            material,
            cast_shadow: false,
            receive_shadow: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh(MeshNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn group(name: impl Into<String>, transform: Transform) -> Self {
        Self {
            name: name.into(),
            transform,
            kind: NodeKind::Group,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn mesh(name: impl Into<String>, transform: Transform, mesh: MeshNode) -> Self {
        Self {
            name: name.into(),
            transform,
            kind: NodeKind::Mesh(mesh),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn as_mesh(&self) -> Option<&MeshNode> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            NodeKind::Group => None,
        }
    }
}

/// Tree of groups and meshes making up the displayed model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a top-level node
    pub fn add_root(&mut self, mut node: Node) -> NodeId {
        let id = self.nodes.len();
        node.parent = None;
        node.children.clear();
        self.nodes.push(node);
        self.roots.push(id);
        id
    }

    /// Insert a node below `parent`
    ///
    /// Panics if `parent` does not belong to this graph.
    pub fn add_child(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let id = self.nodes.len();
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        self.nodes[parent].children.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First node with the given name
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name)
    }

    /// All mesh nodes in insertion order
    pub fn meshes(&self) -> impl Iterator<Item = (NodeId, &Node, &MeshNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(id, node)| node.as_mesh().map(|mesh| (id, node, mesh)))
    }

    /// Mutable access to every mesh together with its node name
    pub fn meshes_mut(&mut self) -> impl Iterator<Item = (&str, &mut MeshNode)> {
        self.nodes.iter_mut().filter_map(|node| match &mut node.kind {
            NodeKind::Mesh(mesh) => Some((node.name.as_str(), mesh)),
            NodeKind::Group => None,
        })
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes().count()
    }

    /// Number of mesh nodes anywhere below `id`
    pub fn descendant_mesh_count(&self, id: NodeId) -> usize {
        let Some(node) = self.nodes.get(id) else {
            return 0;
        };
        node.children
            .iter()
            .map(|&child| {
                let own = usize::from(self.nodes[child].as_mesh().is_some());
                own + self.descendant_mesh_count(child)
            })
            .sum()
    }

    /// Clear every texture slot on every material
    pub fn clear_texture_slots(&mut self) -> usize {
        let mut cleared = 0;
        for (_, mesh) in self.meshes_mut() {
            cleared += mesh.material.textures.occupied();
            mesh.material.textures.clear();
        }
        cleared
    }
}
