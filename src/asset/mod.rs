mod import;

use crate::scene::{SceneError, SceneGraph};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use thiserror::Error;

/// Upper bound on assets fetched over HTTP.
pub const MAX_DOWNLOAD_BYTES: u64 = 512 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("http error: {0}")]
    Http(String),
    #[error("gltf error: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("invalid glTF document: {0}")]
    Invalid(String),
    #[error("document has no scene")]
    NoScene,
    #[error("scene graph error: {0}")]
    Scene(#[from] SceneError),
    #[error("draco decoder failed: {0}")]
    Decoder(String),
    #[error("asset loader stopped: {0}")]
    Loader(String),
}

/// Where a model comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    Path(PathBuf),
    Url(String),
    Bytes { name: String, bytes: Vec<u8> },
}

impl AssetSource {
    /// `http://` and `https://` locations are fetched; anything else is a file path.
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            AssetSource::Url(location.to_string())
        } else {
            AssetSource::Path(PathBuf::from(location))
        }
    }

    pub fn label(&self) -> String {
        match self {
            AssetSource::Path(path) => path.display().to_string(),
            AssetSource::Url(url) => url.clone(),
            AssetSource::Bytes { name, .. } => name.clone(),
        }
    }

    fn file_stem(&self) -> String {
        let raw = match self {
            AssetSource::Path(path) => path.to_string_lossy().into_owned(),
            AssetSource::Url(url) => url.clone(),
            AssetSource::Bytes { name, .. } => name.clone(),
        };
        let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();
        Path::new(last)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl fmt::Display for AssetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Compressed primitive handed to a [`DracoDecoder`].
#[derive(Debug, Clone)]
pub struct DracoPrimitive<'a> {
    pub data: &'a [u8],
    /// glTF attribute semantic to Draco attribute id.
    pub attributes: BTreeMap<String, u32>,
    pub vertex_count: usize,
    pub index_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedGeometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Option<Vec<u32>>,
}

/// Draco bitstream decoder. The codec itself lives outside this crate.
pub trait DracoDecoder: Send + Sync {
    fn decode(&self, primitive: &DracoPrimitive<'_>) -> Result<DecodedGeometry, AssetError>;
}

/// Decodes an in-memory GLB or glTF document.
pub fn load_slice(
    bytes: &[u8],
    name: &str,
    base: Option<&Path>,
    decoder: Option<&dyn DracoDecoder>,
) -> Result<SceneGraph, AssetError> {
    import::import(bytes, name, base, decoder)
}

/// Reads and decodes `source` on the calling thread.
pub fn load_source(
    source: &AssetSource,
    decoder: Option<&dyn DracoDecoder>,
) -> Result<SceneGraph, AssetError> {
    let name = source.file_stem();
    match source {
        AssetSource::Path(path) => {
            let bytes = std::fs::read(path).map_err(|source| AssetError::Io {
                path: path.clone(),
                source,
            })?;
            load_slice(&bytes, &name, path.parent(), decoder)
        }
        AssetSource::Url(url) => {
            let bytes = fetch(url)?;
            load_slice(&bytes, &name, None, decoder)
        }
        AssetSource::Bytes { bytes, .. } => load_slice(bytes, &name, None, decoder),
    }
}

fn fetch(url: &str) -> Result<Vec<u8>, AssetError> {
    log::info!("[asset] fetching {url}");
    let response = ureq::get(url)
        .call()
        .map_err(|err| AssetError::Http(format!("{url}: {err}")))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_DOWNLOAD_BYTES)
        .read_to_end(&mut bytes)
        .map_err(|err| AssetError::Http(format!("{url}: {err}")))?;
    Ok(bytes)
}

/// Spawns background loads. Each load runs on its own `asset-loader` thread.
#[derive(Default, Clone)]
pub struct AssetLoader {
    decoder: Option<Arc<dyn DracoDecoder>>,
}

impl AssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decoder(decoder: Arc<dyn DracoDecoder>) -> Self {
        Self {
            decoder: Some(decoder),
        }
    }

    pub fn load(&self, source: AssetSource) -> LoadHandle {
        let (sender, receiver) = mpsc::channel();
        let fallback = sender.clone();
        let label = source.label();
        let decoder = self.decoder.clone();

        let spawned = std::thread::Builder::new()
            .name("asset-loader".into())
            .spawn(move || {
                let result = load_source(&source, decoder.as_deref());
                // The handle may already be gone; nothing left to notify.
                let _ = sender.send(result);
            });

        if let Err(err) = spawned {
            let _ = fallback.send(Err(AssetError::Loader(format!(
                "failed to spawn loader thread: {err}"
            ))));
        }

        LoadHandle {
            receiver,
            label,
            finished: false,
        }
    }
}

/// Pending result of [`AssetLoader::load`].
pub struct LoadHandle {
    receiver: Receiver<Result<SceneGraph, AssetError>>,
    label: String,
    finished: bool,
}

impl LoadHandle {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Non-blocking. Yields the result exactly once.
    pub fn poll(&mut self) -> Option<Result<SceneGraph, AssetError>> {
        if self.finished {
            return None;
        }
        match self.receiver.try_recv() {
            Ok(result) => {
                self.finished = true;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.finished = true;
                Some(Err(AssetError::Loader(format!(
                    "loader for {} exited without a result",
                    self.label
                ))))
            }
        }
    }

    pub fn wait(mut self) -> Result<SceneGraph, AssetError> {
        if self.finished {
            return Err(AssetError::Loader(format!(
                "result for {} already taken",
                self.label
            )));
        }
        self.finished = true;
        self.receiver.recv().map_err(|_| {
            AssetError::Loader(format!("loader for {} exited without a result", self.label))
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::glb::{DRACO_EXTENSION, write_glb};
    use crate::export::{ExportOptions, ExportOutput, GlbExporter, SceneExporter};
    use crate::scene::{Color, Geometry, GeometryKind, Material, MaterialColors};
    use glam::{Mat4, Vec3};
    use serde_json::json;
    use std::sync::Mutex;

    fn sample_scene() -> SceneGraph {
        let mut scene = SceneGraph::new("sample");
        let base = scene
            .add_mesh(
                None,
                "Base",
                Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)),
                Geometry::new(
                    GeometryKind::Triangles,
                    vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
                )
                .with_indices(vec![0, 1, 2]),
                Some(Material::standard(Color::new(200, 100, 50))),
            )
            .unwrap();
        scene
            .add_mesh(
                Some(base),
                "Outline",
                Mat4::IDENTITY,
                Geometry::new(GeometryKind::Lines, vec![[0.0; 3], [0.0, 2.0, 0.0]]),
                Some(Material::unlit(Color::WHITE)),
            )
            .unwrap();
        scene
    }

    fn glb_bytes(scene: &SceneGraph) -> Vec<u8> {
        match GlbExporter::new()
            .export(scene, &ExportOptions::compressed_glb())
            .expect("export")
        {
            ExportOutput::Binary(bytes) => bytes,
            ExportOutput::Json(_) => panic!("expected binary"),
        }
    }

    #[test]
    fn exported_glb_loads_back_with_hierarchy_and_materials() {
        let bytes = glb_bytes(&sample_scene());
        let scene = load_slice(&bytes, "fallback", None, None).expect("glb decodes");

        assert_eq!(scene.name(), "sample");
        let base = scene.find_mesh("Base").expect("base mesh");
        let outline = scene.find_mesh("Outline").expect("outline mesh");
        assert_eq!(scene.node(outline).unwrap().parent(), Some(base));

        let base_mesh = scene.mesh(base).unwrap();
        assert_eq!(base_mesh.geometry.kind, GeometryKind::Triangles);
        assert_eq!(base_mesh.geometry.indices.as_deref(), Some(&[0, 1, 2][..]));
        assert_eq!(scene.material_color(base), Some(Color::new(200, 100, 50)));

        let outline_mesh = scene.mesh(outline).unwrap();
        assert_eq!(outline_mesh.geometry.kind, GeometryKind::Lines);
        assert_eq!(
            outline_mesh.material.as_ref().map(|material| material.kind),
            Some(crate::scene::MaterialKind::Unlit)
        );

        let bounds = outline_mesh.world_bounds().expect("bounds");
        assert_eq!(bounds.min, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(0.0, 1.0, 0.0));
    }

    fn draco_glb() -> Vec<u8> {
        let document = json!({
            "asset": { "version": "2.0" },
            "extensionsUsed": [DRACO_EXTENSION],
            "extensionsRequired": [DRACO_EXTENSION],
            "scene": 0,
            "scenes": [{ "nodes": [0] }],
            "nodes": [{ "name": "Compressed", "mesh": 0 }],
            "meshes": [{
                "primitives": [{
                    "attributes": { "POSITION": 0 },
                    "indices": 1,
                    "extensions": {
                        DRACO_EXTENSION: { "bufferView": 0, "attributes": { "POSITION": 0 } }
                    }
                }]
            }],
            "accessors": [
                { "componentType": 5126, "count": 3, "type": "VEC3",
                  "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
                { "componentType": 5125, "count": 3, "type": "SCALAR" }
            ],
            "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": 4 }],
            "buffers": [{ "byteLength": 4 }]
        });
        write_glb(&document, &[9, 8, 7, 6]).expect("glb")
    }

    #[test]
    fn draco_primitive_without_decoder_keeps_metadata() {
        let scene = load_slice(&draco_glb(), "draco", None, None).expect("loads");
        let node = scene.find_mesh("Compressed").expect("mesh node");
        let geometry = &scene.mesh(node).unwrap().geometry;

        assert!(geometry.positions.is_empty());
        assert_eq!(geometry.vertex_count(), 3);
        assert_eq!(
            geometry.undecoded,
            Some(crate::scene::UndecodedDraco {
                vertex_count: 3,
                index_count: 3
            })
        );
        assert!(scene.mesh(node).unwrap().material.is_none());
    }

    fn scene_glb(nodes: serde_json::Value, meshes: serde_json::Value) -> Vec<u8> {
        let document = json!({
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "nodes": [0] }],
            "nodes": nodes,
            "meshes": meshes,
            "accessors": [
                { "bufferView": 0, "componentType": 5126, "count": 1, "type": "VEC3",
                  "min": [0.0, 0.0, 0.0], "max": [0.0, 0.0, 0.0] }
            ],
            "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": 12 }],
            "buffers": [{ "byteLength": 12 }]
        });
        write_glb(&document, &[0; 12]).expect("glb")
    }

    #[test]
    fn out_of_range_mesh_index_is_an_error() {
        let bytes = scene_glb(
            json!([{ "name": "Dangling", "mesh": 3 }]),
            json!([{ "primitives": [{ "attributes": { "POSITION": 0 } }] }]),
        );
        let result = load_slice(&bytes, "dangling", None, None);
        assert!(matches!(result, Err(AssetError::Invalid(_))), "{result:?}");
    }

    #[test]
    fn out_of_range_accessor_and_material_are_errors() {
        let accessor = scene_glb(
            json!([{ "mesh": 0 }]),
            json!([{ "primitives": [{ "attributes": { "POSITION": 7 } }] }]),
        );
        assert!(matches!(
            load_slice(&accessor, "accessor", None, None),
            Err(AssetError::Invalid(_))
        ));

        let material = scene_glb(
            json!([{ "mesh": 0 }]),
            json!([{ "primitives": [{ "attributes": { "POSITION": 0 }, "material": 2 }] }]),
        );
        assert!(matches!(
            load_slice(&material, "material", None, None),
            Err(AssetError::Invalid(_))
        ));
    }

    #[test]
    fn well_formed_single_point_still_loads() {
        let bytes = scene_glb(
            json!([{ "name": "Dot", "mesh": 0 }]),
            json!([{ "primitives": [{ "attributes": { "POSITION": 0 }, "mode": 0 }] }]),
        );
        let scene = load_slice(&bytes, "dot", None, None).expect("valid document loads");
        assert!(scene.find_mesh("Dot").is_some());
    }

    struct StubDecoder {
        seen: Mutex<Vec<(Vec<u8>, usize)>>,
    }

    impl DracoDecoder for StubDecoder {
        fn decode(&self, primitive: &DracoPrimitive<'_>) -> Result<DecodedGeometry, AssetError> {
            self.seen
                .lock()
                .unwrap()
                .push((primitive.data.to_vec(), primitive.attributes["POSITION"] as usize));
            Ok(DecodedGeometry {
                positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                normals: Vec::new(),
                indices: Some(vec![0, 1, 2]),
            })
        }
    }

    #[test]
    fn draco_primitive_is_routed_through_decoder() {
        let decoder = StubDecoder {
            seen: Mutex::new(Vec::new()),
        };
        let scene = load_slice(&draco_glb(), "draco", None, Some(&decoder)).expect("loads");
        let node = scene.find_mesh("Compressed").unwrap();

        assert_eq!(scene.mesh(node).unwrap().geometry.positions.len(), 3);
        assert_eq!(*decoder.seen.lock().unwrap(), vec![(vec![9, 8, 7, 6], 0)]);
    }

    #[test]
    fn background_load_resolves_once() {
        let bytes = glb_bytes(&sample_scene());
        let loader = AssetLoader::new();
        let handle = loader.load(AssetSource::Bytes {
            name: "memory.glb".into(),
            bytes,
        });
        assert_eq!(handle.label(), "memory.glb");

        let scene = handle.wait().expect("background load");
        assert!(scene.find_mesh("Base").is_some());
    }

    #[test]
    fn poll_reports_missing_file_as_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = AssetLoader::new().load(AssetSource::Path(dir.path().join("missing.glb")));

        let result = loop {
            if let Some(result) = handle.poll() {
                break result;
            }
            std::thread::yield_now();
        };
        assert!(matches!(result, Err(AssetError::Io { .. })));
        assert!(handle.is_finished());
        assert!(handle.poll().is_none());
    }

    #[test]
    fn source_parsing_and_names() {
        assert_eq!(
            AssetSource::parse("https://example.com/models/olympia.glb"),
            AssetSource::Url("https://example.com/models/olympia.glb".into())
        );
        let path = AssetSource::parse("sample/olympia.glb");
        assert_eq!(path, AssetSource::Path(PathBuf::from("sample/olympia.glb")));
        assert_eq!(path.file_stem(), "olympia");
        assert_eq!(
            AssetSource::parse("https://example.com/a/b.glb").file_stem(),
            "b"
        );
    }
}
