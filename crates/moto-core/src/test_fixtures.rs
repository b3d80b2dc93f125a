//! In-memory GLB assets for tests

use serde_json::json;

/// One mesh node of a fixture asset
pub struct FixtureMesh {
    pub node_name: &'static str,
    pub material_name: Option<&'static str>,
    pub vertices: usize,
    /// External image referenced as base color and normal map
    pub texture_uri: Option<&'static str>,
}

impl FixtureMesh {
    pub fn new(node_name: &'static str, vertices: usize) -> Self {
        Self {
            node_name,
            material_name: None,
            vertices,
            texture_uri: None,
        }
    }

    pub fn material(mut self, name: &'static str) -> Self {
        self.material_name = Some(name);
        self
    }

    pub fn texture(mut self, uri: &'static str) -> Self {
        self.texture_uri = Some(uri);
        self
    }
}

/// Build a binary glTF with one node per fixture mesh
pub fn build_glb(meshes: &[FixtureMesh]) -> Vec<u8> {
    let mut bin: Vec<u8> = Vec::new();
    let mut buffer_views = Vec::new();
    let mut accessors = Vec::new();
    let mut gltf_meshes = Vec::new();
    let mut materials = Vec::new();
    let mut textures = Vec::new();
    let mut images = Vec::new();
    let mut nodes = Vec::new();

    for (i, mesh) in meshes.iter().enumerate() {
        let offset = bin.len();
        for v in 0..mesh.vertices {
            let p = [(v % 3) as f32 * 0.5, ((v / 3) % 2) as f32, 0.0f32];
            for c in p {
                bin.extend_from_slice(&c.to_le_bytes());
            }
        }
        buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": mesh.vertices * 12,
        }));
        accessors.push(json!({
            "bufferView": i,
            "componentType": 5126,
            "count": mesh.vertices,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [1.0, 1.0, 0.0],
        }));

        let mut primitive = json!({ "attributes": { "POSITION": i } });
        if let Some(name) = mesh.material_name {
            let mut material = json!({
                "name": name,
                "pbrMetallicRoughness": { "baseColorFactor": [1.0, 1.0, 1.0, 1.0] },
            });
            if let Some(uri) = mesh.texture_uri {
                let image_index = images.len();
                images.push(json!({ "uri": uri }));
                let texture_index = textures.len();
                textures.push(json!({ "source": image_index }));
                material["pbrMetallicRoughness"]["baseColorTexture"] = json!({ "index": texture_index });
                material["normalTexture"] = json!({ "index": texture_index });
            }
            primitive["material"] = json!(materials.len());
            materials.push(material);
        }

        gltf_meshes.push(json!({ "name": format!("{}_mesh", mesh.node_name), "primitives": [primitive] }));
        nodes.push(json!({ "name": mesh.node_name, "mesh": i }));
    }

    let mut root = json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": (0..meshes.len()).collect::<Vec<_>>() }],
        "nodes": nodes,
        "meshes": gltf_meshes,
        "accessors": accessors,
        "bufferViews": buffer_views,
        "buffers": [{ "byteLength": bin.len() }],
    });
    if !materials.is_empty() {
        root["materials"] = json!(materials);
    }
    if !images.is_empty() {
        root["images"] = json!(images);
        root["textures"] = json!(textures);
    }

    pack_glb(&serde_json::to_vec(&root).unwrap_or_default(), &bin)
}

fn pack_glb(json: &[u8], bin: &[u8]) -> Vec<u8> {
    let mut json_chunk = json.to_vec();
    while json_chunk.len() % 4 != 0 {
        json_chunk.push(b' ');
    }
    let mut bin_chunk = bin.to_vec();
    while bin_chunk.len() % 4 != 0 {
        bin_chunk.push(0);
    }

    let total = 12 + 8 + json_chunk.len() + 8 + bin_chunk.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json_chunk.len() as u32).to_le_bytes());
    out.extend_from_slice(b"JSON");
    out.extend_from_slice(&json_chunk);
    out.extend_from_slice(&(bin_chunk.len() as u32).to_le_bytes());
    out.extend_from_slice(b"BIN\0");
    out.extend_from_slice(&bin_chunk);
    out
}
