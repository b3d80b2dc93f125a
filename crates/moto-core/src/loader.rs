//! glTF model loading into a [`SceneGraph`]
//!
//! The loader fetches the asset through its [`ResourceFetcher`], parses it
//! with the `gltf` crate and converts the default scene into our own graph.
//! Image handling is delegated to the [`TextureFetchPolicy`] chosen when the
//! loader was built:
//! - plain fetches of image resources are answered with an empty buffer when
//!   the policy intercepts them
//! - a failing image never fails the load; it is counted and skipped
//! - once parsed, every texture slot of every material is cleared

use glam::{Quat, Vec3};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fetch::{percent, FetchError, ResourceFetcher};
use crate::resolver::ResolvedUri;
use crate::scene_graph::{
    Material, MeshData, MeshNode, Node, NodeId, Rgb, SceneGraph, TextureRef, TextureSlots,
    Transform,
};
use crate::texture::{TextureData, TextureFetchError, TextureFetchPolicy, TextureSource};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to fetch {uri}: {source}")]
    Fetch {
        uri: String,
        #[source]
        source: FetchError,
    },
    #[error("invalid glTF: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("buffer {0} has no data")]
    MissingBuffer(usize),
    #[error("asset contains no scene")]
    NoScene,
    #[error("asset contains no renderable meshes")]
    NoMeshes,
    #[error("node {0} is reachable more than once or nests too deeply")]
    InvalidHierarchy(usize),
}

/// Deepest node nesting accepted before the hierarchy is rejected
const MAX_NODE_DEPTH: usize = 256;

/// Statistics about a completed load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Size of the main asset in bytes
    pub bytes: usize,
    pub meshes: usize,
    pub textures_fetched: usize,
    pub textures_placeholder: usize,
    pub textures_failed: usize,
    pub texture_slots_cleared: usize,
    pub skipped_primitives: usize,
    pub policy: &'static str,
}

/// Result of a successful load
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub scene: SceneGraph,
    /// Image data by image index; `None` when the image could not be obtained
    pub images: Vec<Option<TextureData>>,
    pub report: LoadReport,
}

/// Parses glTF/GLB assets with an injected fetcher and texture policy
#[derive(Clone)]
pub struct ModelLoader {
    fetcher: Arc<dyn ResourceFetcher>,
    textures: Arc<dyn TextureFetchPolicy>,
}

impl ModelLoader {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, textures: Arc<dyn TextureFetchPolicy>) -> Self {
        Self { fetcher, textures }
    }

    pub fn texture_policy(&self) -> &dyn TextureFetchPolicy {
        self.textures.as_ref()
    }

    /// Callback form: progress in percent, then exactly one of `on_loaded` / `on_failed`
    pub fn load_with(
        &self,
        uri: &ResolvedUri,
        on_progress: &mut dyn FnMut(u8),
        on_loaded: impl FnOnce(LoadedModel),
        on_failed: impl FnOnce(ParseError),
    ) {
        match self.load(uri, on_progress) {
            Ok(model) => on_loaded(model),
            Err(e) => on_failed(e),
        }
    }

    /// Fetch and parse the asset at `uri`
    pub fn load(
        &self,
        uri: &ResolvedUri,
        on_progress: &mut dyn FnMut(u8),
    ) -> Result<LoadedModel, ParseError> {
        info!(uri = %uri, policy = self.textures.name(), "Loading model");

        let mut last_percent = None;
        let bytes = self
            .fetcher
            .fetch(uri.as_str(), &mut |loaded, total| {
                if let Some(p) = percent(loaded, total) {
                    if last_percent != Some(p) {
                        last_percent = Some(p);
                        on_progress(p);
                    }
                }
            })
            .map_err(|source| ParseError::Fetch {
                uri: uri.to_string(),
                source,
            })?;
        if last_percent != Some(100) {
            on_progress(100);
        }

        self.load_bytes(&bytes, Some(uri.as_str()))
    }

    /// Parse an asset already in memory; `base_uri` resolves relative sub-resources
    pub fn load_bytes(&self, bytes: &[u8], base_uri: Option<&str>) -> Result<LoadedModel, ParseError> {
        let gltf = gltf::Gltf::from_slice(bytes)?;
        let mut report = LoadReport {
            bytes: bytes.len(),
            policy: self.textures.name(),
            ..Default::default()
        };

        let buffers = self.load_buffers(&gltf, base_uri)?;
        let images = self.load_images(&gltf.document, &buffers, base_uri, &mut report);

        let scene = gltf
            .document
            .default_scene()
            .or_else(|| gltf.document.scenes().next())
            .ok_or(ParseError::NoScene)?;

        let mut graph = SceneGraph::new();
        let mut visited = vec![false; gltf.document.nodes().count()];
        for node in scene.nodes() {
            let mut ctx = NodeContext {
                graph: &mut graph,
                buffers: &buffers,
                report: &mut report,
                visited: &mut visited,
            };
            convert_node(&node, None, 0, &mut ctx)?;
        }

        report.meshes = graph.mesh_count();
        if report.meshes == 0 {
            return Err(ParseError::NoMeshes);
        }

        report.texture_slots_cleared = graph.clear_texture_slots();

        info!(
            meshes = report.meshes,
            textures_fetched = report.textures_fetched,
            textures_placeholder = report.textures_placeholder,
            textures_failed = report.textures_failed,
            slots_cleared = report.texture_slots_cleared,
            "Model parsed"
        );

        Ok(LoadedModel {
            scene: graph,
            images,
            report,
        })
    }

    /// Plain resource fetch, short-circuited for intercepted image URIs
    fn fetch_resource(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        if self.textures.intercepts(uri) {
            debug!(uri = %uri, "Image fetch intercepted, returning empty buffer");
            return Ok(Vec::new());
        }
        self.fetcher.fetch(uri, &mut |_, _| {})
    }

    fn load_buffers(
        &self,
        gltf: &gltf::Gltf,
        base_uri: Option<&str>,
    ) -> Result<Vec<Vec<u8>>, ParseError> {
        let mut buffers = Vec::new();
        for buffer in gltf.document.buffers() {
            let data = match buffer.source() {
                gltf::buffer::Source::Bin => gltf
                    .blob
                    .clone()
                    .ok_or(ParseError::MissingBuffer(buffer.index()))?,
                gltf::buffer::Source::Uri(uri) => {
                    let full = resolve_relative(base_uri, uri);
                    self.fetch_resource(&full)
                        .map_err(|source| ParseError::Fetch { uri: full, source })?
                }
            };
            if data.len() < buffer.length() {
                warn!(
                    buffer = buffer.index(),
                    expected = buffer.length(),
                    actual = data.len(),
                    "Buffer shorter than declared"
                );
            }
            buffers.push(data);
        }
        Ok(buffers)
    }

    fn load_images(
        &self,
        document: &gltf::Document,
        buffers: &[Vec<u8>],
        base_uri: Option<&str>,
        report: &mut LoadReport,
    ) -> Vec<Option<TextureData>> {
        document
            .images()
            .map(|image| {
                let result = match image.source() {
                    gltf::image::Source::Uri { uri, .. } => {
                        let full = resolve_relative(base_uri, uri);
                        self.textures
                            .fetch(TextureSource::Uri(&full), self.fetcher.as_ref())
                    }
                    gltf::image::Source::View { view, mime_type } => {
                        match view_bytes(&view, buffers) {
                            Some(bytes) => self.textures.fetch(
                                TextureSource::Embedded { bytes, mime_type },
                                self.fetcher.as_ref(),
                            ),
                            None => Err(TextureFetchError::OutOfBounds(image.index())),
                        }
                    }
                };

                match result {
                    Ok(data) => {
                        if data.placeholder {
                            report.textures_placeholder += 1;
                        } else {
                            report.textures_fetched += 1;
                        }
                        Some(data)
                    }
                    Err(e) => {
                        // Continue without this texture
                        warn!(image = image.index(), error = %e, "Skipping texture");
                        report.textures_failed += 1;
                        None
                    }
                }
            })
            .collect()
    }
}

fn view_bytes<'a>(view: &gltf::buffer::View, buffers: &'a [Vec<u8>]) -> Option<&'a [u8]> {
    let data = buffers.get(view.buffer().index())?;
    data.get(view.offset()..view.offset() + view.length())
}

/// Resolve a sub-resource URI against the directory of the model URI
fn resolve_relative(base_uri: Option<&str>, uri: &str) -> String {
    if uri.starts_with("data:") || uri.contains("://") || uri.starts_with('/') {
        return uri.to_string();
    }
    match base_uri.and_then(|base| base.rfind(['/', '\\']).map(|i| &base[..=i])) {
        Some(dir) => format!("{}{}", dir, uri),
        None => uri.to_string(),
    }
}

struct NodeContext<'a> {
    graph: &'a mut SceneGraph,
    buffers: &'a [Vec<u8>],
    report: &'a mut LoadReport,
    /// Node indices already converted; glTF nodes have at most one parent
    visited: &'a mut [bool],
}

fn convert_node(
    node: &gltf::Node,
    parent: Option<NodeId>,
    depth: usize,
    ctx: &mut NodeContext,
) -> Result<(), ParseError> {
    let index = node.index();
    if depth > MAX_NODE_DEPTH {
        return Err(ParseError::InvalidHierarchy(index));
    }
    match ctx.visited.get_mut(index) {
        Some(seen) if !*seen => *seen = true,
        _ => return Err(ParseError::InvalidHierarchy(index)),
    }

    let name = node
        .name()
        .map(str::to_string)
        .or_else(|| node.mesh().and_then(|m| m.name().map(str::to_string)))
        .unwrap_or_else(|| format!("node_{}", node.index()));

    let (t, r, s) = node.transform().decomposed();
    let transform = Transform {
        translation: Vec3::from_array(t),
        rotation: Quat::from_array(r),
        scale: Vec3::from_array(s),
    };

    let mut meshes: Vec<MeshNode> = Vec::new();
    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            match convert_primitive(&primitive, ctx.buffers) {
                Some(converted) => meshes.push(converted),
                None => ctx.report.skipped_primitives += 1,
            }
        }
    }

    let insert = |graph: &mut SceneGraph, new_node: Node| match parent {
        Some(p) => graph.add_child(p, new_node),
        None => graph.add_root(new_node),
    };

    let graph = &mut *ctx.graph;
    let id = if meshes.len() == 1 {
        let mesh = meshes.remove(0);
        insert(graph, Node::mesh(name, transform, mesh))
    } else {
        let group = insert(graph, Node::group(name.clone(), transform));
        for (i, mesh) in meshes.into_iter().enumerate() {
            graph.add_child(group, Node::mesh(format!("{}_{}", name, i), Transform::default(), mesh));
        }
        group
    };

    for child in node.children() {
        convert_node(&child, Some(id), depth + 1, ctx)?;
    }
    Ok(())
}

fn convert_primitive(primitive: &gltf::Primitive, buffers: &[Vec<u8>]) -> Option<MeshNode> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        warn!(mode = ?primitive.mode(), "Skipping non-triangle primitive");
        return None;
    }

    let readable = primitive
        .attributes()
        .map(|(_, accessor)| accessor)
        .chain(primitive.indices())
        .all(|accessor| accessor_readable(&accessor, buffers));
    if !readable {
        warn!("Skipping primitive with out-of-bounds accessor data");
        return None;
    }

    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    let normals: Vec<[f32; 3]> = reader
        .read_normals()
        .map(|n| n.collect())
        .unwrap_or_default();
    let uvs: Option<Vec<[f32; 2]>> = reader.read_tex_coords(0).map(|uv| uv.into_f32().collect());
    let indices: Option<Vec<u32>> = reader.read_indices().map(|i| i.into_u32().collect());

    let mut geometry = MeshData {
        positions,
        normals,
        uvs,
        indices,
    };
    geometry.ensure_normals();

    Some(MeshNode::new(geometry, convert_material(&primitive.material())))
}

fn accessor_readable(accessor: &gltf::Accessor, buffers: &[Vec<u8>]) -> bool {
    let Some(view) = accessor.view() else {
        return false;
    };
    let data_len = buffers.get(view.buffer().index()).map(Vec::len).unwrap_or(0);
    if view.offset() + view.length() > data_len {
        return false;
    }
    if accessor.count() == 0 {
        return true;
    }
    let stride = view.stride().unwrap_or(accessor.size());
    accessor.offset() + stride * (accessor.count() - 1) + accessor.size() <= view.length()
}

fn convert_material(material: &gltf::Material) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, a] = pbr.base_color_factor();
    let [er, eg, eb] = material.emissive_factor();

    let texture_ref = |texture: gltf::Texture| {
        let image = texture.source();
        TextureRef {
            image_index: image.index(),
            uri: match image.source() {
                gltf::image::Source::Uri { uri, .. } => Some(uri.to_string()),
                gltf::image::Source::View { .. } => None,
            },
        }
    };
    let metallic_roughness = pbr.metallic_roughness_texture().map(|info| texture_ref(info.texture()));

    Material {
        name: material.name().unwrap_or_default().to_string(),
        color: Rgb::new(r, g, b),
        metalness: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        emissive: Rgb::new(er, eg, eb),
        emissive_intensity: 1.0,
        opacity: a,
        transparent: material.alpha_mode() == gltf::material::AlphaMode::Blend,
        double_sided: material.double_sided(),
        textures: TextureSlots {
            map: pbr.base_color_texture().map(|info| texture_ref(info.texture())),
            normal_map: material.normal_texture().map(|t| texture_ref(t.texture())),
            roughness_map: metallic_roughness.clone(),
            metalness_map: metallic_roughness,
            ao_map: material.occlusion_texture().map(|t| texture_ref(t.texture())),
            emissive_map: material.emissive_texture().map(|info| texture_ref(info.texture())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::DefaultFetcher;
    use crate::test_fixtures::{build_glb, FixtureMesh};
    use crate::texture::{FetchTextures, PlaceholderTextures};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serves one in-memory model and counts every other request
    struct MemoryFetcher {
        model: Vec<u8>,
        other_requests: AtomicUsize,
        requested: Mutex<Vec<String>>,
    }

    impl MemoryFetcher {
        fn new(model: Vec<u8>) -> Self {
            Self {
                model,
                other_requests: AtomicUsize::new(0),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    impl ResourceFetcher for MemoryFetcher {
        fn fetch(
            &self,
            uri: &str,
            progress: &mut dyn FnMut(u64, Option<u64>),
        ) -> Result<Vec<u8>, FetchError> {
            self.requested.lock().unwrap().push(uri.to_string());
            if uri.ends_with("bike.glb") {
                let total = self.model.len() as u64;
                progress(total / 2, Some(total));
                progress(total, Some(total));
                return Ok(self.model.clone());
            }
            self.other_requests.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::UnsupportedScheme(uri.to_string()))
        }
    }

    fn textured_fixture() -> Vec<u8> {
        build_glb(&[
            FixtureMesh::new("chassis", 9).material("Body_Paint_01").texture("textures/paint.png"),
            FixtureMesh::new("Front_Tire", 6).material("Mat.002").texture("textures/tire.jpg"),
            FixtureMesh::new("bolt", 3),
        ])
    }

    #[test]
    fn test_load_builds_scene_graph() {
        let fetcher = Arc::new(MemoryFetcher::new(textured_fixture()));
        let loader = ModelLoader::new(fetcher, Arc::new(PlaceholderTextures));
        let uri = ResolvedUri::new("models/bike.glb").unwrap();

        let mut progress = Vec::new();
        let model = loader.load(&uri, &mut |p| progress.push(p)).unwrap();

        assert_eq!(progress, vec![50, 100]);
        assert_eq!(model.report.meshes, 3);
        let chassis = model.scene.find("chassis").unwrap();
        let node = model.scene.node(chassis).unwrap();
        let mesh = node.as_mesh().unwrap();
        assert_eq!(mesh.geometry.vertex_count(), 9);
        assert_eq!(mesh.geometry.normals.len(), 9);
        assert_eq!(mesh.material.name, "Body_Paint_01");
    }

    #[test]
    fn test_texture_slots_cleared_after_load() {
        let fetcher = Arc::new(MemoryFetcher::new(textured_fixture()));
        let loader = ModelLoader::new(fetcher, Arc::new(PlaceholderTextures));
        let uri = ResolvedUri::new("bike.glb").unwrap();

        let model = loader.load(&uri, &mut |_| {}).unwrap();

        // base color + normal map on two materials
        assert_eq!(model.report.texture_slots_cleared, 4);
        for (_, _, mesh) in model.scene.meshes() {
            assert!(mesh.material.textures.is_empty());
        }
    }

    #[test]
    fn test_placeholder_policy_never_fetches_images() {
        let fetcher = Arc::new(MemoryFetcher::new(textured_fixture()));
        let loader = ModelLoader::new(fetcher.clone(), Arc::new(PlaceholderTextures));
        let model = loader.load(&ResolvedUri::new("bike.glb").unwrap(), &mut |_| {}).unwrap();

        assert_eq!(fetcher.other_requests.load(Ordering::SeqCst), 0);
        assert_eq!(model.report.textures_placeholder, 2);
        assert!(model.images.iter().all(|img| img.as_ref().map(|t| t.placeholder).unwrap_or(false)));
    }

    #[test]
    fn test_texture_failures_do_not_fail_load() {
        let fetcher = Arc::new(MemoryFetcher::new(textured_fixture()));
        let loader = ModelLoader::new(fetcher.clone(), Arc::new(FetchTextures));
        let model = loader
            .load(&ResolvedUri::new("assets/bike.glb").unwrap(), &mut |_| {})
            .unwrap();

        assert_eq!(model.report.textures_failed, 2);
        assert_eq!(fetcher.other_requests.load(Ordering::SeqCst), 2);
        assert!(fetcher
            .requested
            .lock()
            .unwrap()
            .contains(&"assets/textures/paint.png".to_string()));
        assert!(model.images.iter().all(Option::is_none));
        assert_eq!(model.report.meshes, 3);
    }

    #[test]
    fn test_load_with_callbacks() {
        let fetcher = Arc::new(MemoryFetcher::new(textured_fixture()));
        let loader = ModelLoader::new(fetcher, Arc::new(PlaceholderTextures));

        let mut loaded = None;
        let mut failed = None;
        loader.load_with(
            &ResolvedUri::new("bike.glb").unwrap(),
            &mut |_| {},
            |m| loaded = Some(m.report.meshes),
            |e| failed = Some(e.to_string()),
        );
        assert_eq!(loaded, Some(3));
        assert!(failed.is_none());

        let mut failed = None;
        loader.load_with(
            &ResolvedUri::new("missing.glb").unwrap(),
            &mut |_| {},
            |_| panic!("should not load"),
            |e| failed = Some(e),
        );
        assert!(matches!(failed, Some(ParseError::Fetch { .. })));
    }

    #[test]
    fn test_malformed_asset_is_parse_error() {
        let loader = ModelLoader::new(
            Arc::new(MemoryFetcher::new(b"definitely not a model".to_vec())),
            Arc::new(PlaceholderTextures),
        );
        let err = loader
            .load(&ResolvedUri::new("bike.glb").unwrap(), &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, ParseError::Gltf(_)));
    }

    #[test]
    fn test_asset_without_scene_or_meshes() {
        let loader = ModelLoader::new(Arc::new(DefaultFetcher::default()), Arc::new(PlaceholderTextures));

        let err = loader.load_bytes(br#"{"asset":{"version":"2.0"}}"#, None).unwrap_err();
        assert!(matches!(err, ParseError::NoScene));

        let err = loader
            .load_bytes(br#"{"asset":{"version":"2.0"},"scene":0,"scenes":[{"nodes":[0]}],"nodes":[{"name":"empty"}]}"#, None)
            .unwrap_err();
        assert!(matches!(err, ParseError::NoMeshes));
    }

    #[test]
    fn test_cyclic_hierarchy_is_parse_error() {
        let loader = ModelLoader::new(Arc::new(DefaultFetcher::default()), Arc::new(PlaceholderTextures));

        let err = loader
            .load_bytes(br#"{"asset":{"version":"2.0"},"scene":0,"scenes":[{"nodes":[0]}],"nodes":[{"name":"a","children":[0]}]}"#, None)
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidHierarchy(0)));

        let err = loader
            .load_bytes(br#"{"asset":{"version":"2.0"},"scene":0,"scenes":[{"nodes":[0]}],"nodes":[{"name":"a","children":[1]},{"name":"b","children":[0]}]}"#, None)
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidHierarchy(0)));
    }

    #[test]
    fn test_overly_deep_hierarchy_is_parse_error() {
        let count = MAX_NODE_DEPTH + 10;
        let nodes: Vec<String> = (0..count)
            .map(|i| {
                if i + 1 < count {
                    format!(r#"{{"children":[{}]}}"#, i + 1)
                } else {
                    "{}".to_string()
                }
            })
            .collect();
        let json = format!(
            r#"{{"asset":{{"version":"2.0"}},"scene":0,"scenes":[{{"nodes":[0]}}],"nodes":[{}]}}"#,
            nodes.join(",")
        );

        let loader = ModelLoader::new(Arc::new(DefaultFetcher::default()), Arc::new(PlaceholderTextures));
        let err = loader.load_bytes(json.as_bytes(), None).unwrap_err();
        assert!(matches!(err, ParseError::InvalidHierarchy(_)));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bike.glb"), textured_fixture()).unwrap();

        let loader = ModelLoader::new(
            Arc::new(DefaultFetcher::new(dir.path())),
            Arc::new(PlaceholderTextures),
        );
        let model = loader.load(&ResolvedUri::new("bike.glb").unwrap(), &mut |_| {}).unwrap();
        assert_eq!(model.report.meshes, 3);
        assert_eq!(model.report.policy, "placeholder");
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(resolve_relative(Some("a/b/bike.gltf"), "bike.bin"), "a/b/bike.bin");
        assert_eq!(resolve_relative(Some("bike.gltf"), "bike.bin"), "bike.bin");
        assert_eq!(resolve_relative(Some("a/bike.gltf"), "data:x,y"), "data:x,y");
        assert_eq!(resolve_relative(None, "https://x/y.png"), "https://x/y.png");
    }
}
