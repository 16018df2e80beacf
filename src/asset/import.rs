use super::{AssetError, DracoDecoder, DracoPrimitive};
use crate::export::glb::DRACO_EXTENSION;
use crate::scene::{
    Color, Geometry, GeometryKind, Material, MaterialKind, NodeId, SceneGraph, UndecodedDraco,
};
use glam::Mat4;
use gltf::json::validation::{Error as ValidationError, Validate};
use gltf::mesh::Mode;
use rayon::prelude::*;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

struct PrimitiveJob<'d> {
    target: NodeId,
    mesh_index: usize,
    primitive: gltf::Primitive<'d>,
}

/// Decodes a GLB or JSON glTF document into a scene graph.
pub(crate) fn import(
    bytes: &[u8],
    fallback_name: &str,
    base: Option<&Path>,
    decoder: Option<&dyn DracoDecoder>,
) -> Result<SceneGraph, AssetError> {
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice_without_validation(bytes)?;
    validate(document.as_json())?;
    let buffers = gltf::import_buffers(&document, base, blob)?;

    let draco_used = document
        .extensions_used()
        .any(|extension| extension == DRACO_EXTENSION);
    let raw = if draco_used { raw_document(bytes) } else { None };

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or(AssetError::NoScene)?;

    let mut graph = SceneGraph::new(scene.name().unwrap_or(fallback_name));
    let mut jobs = Vec::new();
    for node in scene.nodes() {
        walk(node, None, &mut graph, &mut jobs)?;
    }

    let context = DecodeContext {
        document: &document,
        buffers: &buffers,
        raw: raw.as_ref(),
        decoder,
    };
    let geometries = jobs
        .par_iter()
        .map(|job| context.decode(job))
        .collect::<Result<Vec<_>, _>>()?;

    let undecoded = geometries
        .iter()
        .filter(|geometry| geometry.undecoded.is_some())
        .count();
    if undecoded > 0 {
        log::warn!(
            "[asset] {undecoded} Draco primitive(s) kept as metadata only; no decoder attached"
        );
    }

    for (job, geometry) in jobs.iter().zip(geometries) {
        graph.attach_mesh(job.target, geometry, material_of(&job.primitive))?;
    }

    log::info!(
        "[asset] decoded '{}' ({} nodes, {} primitives)",
        graph.name(),
        graph.node_count(),
        jobs.len()
    );
    Ok(graph)
}

/// Full document validation, minus the checks Draco documents cannot pass:
/// the compression extension is listed as required, and compressed
/// accessors have no `bufferView`.
fn validate(root: &gltf::json::Root) -> Result<(), AssetError> {
    // Validation reads POSITION accessors without a bounds check.
    for (mesh_index, mesh) in root.meshes.iter().enumerate() {
        for primitive in &mesh.primitives {
            for accessor in primitive.attributes.values() {
                if accessor.value() >= root.accessors.len() {
                    return Err(AssetError::Invalid(format!(
                        "meshes[{mesh_index}] references missing accessor {}",
                        accessor.value()
                    )));
                }
            }
        }
    }

    let mut errors = Vec::new();
    root.validate(root, gltf::json::Path::new, &mut |path, error| {
        let path = path();
        let tolerated = match error {
            ValidationError::Unsupported => true,
            ValidationError::Missing => {
                path.as_str().starts_with("accessors[") && path.as_str().ends_with(".bufferView")
            }
            _ => false,
        };
        if !tolerated {
            errors.push(format!("{path}: {error:?}"));
        }
    });

    match errors.first() {
        None => Ok(()),
        Some(first) => Err(AssetError::Invalid(format!(
            "{first} ({} problem(s))",
            errors.len()
        ))),
    }
}

fn walk<'d>(
    node: gltf::Node<'d>,
    parent: Option<NodeId>,
    graph: &mut SceneGraph,
    jobs: &mut Vec<PrimitiveJob<'d>>,
) -> Result<(), AssetError> {
    let mesh = node.mesh();
    let name = node
        .name()
        .or_else(|| mesh.as_ref().and_then(|mesh| mesh.name()))
        .unwrap_or_default()
        .to_string();
    let local = Mat4::from_cols_array_2d(&node.transform().matrix());
    let id = graph.add_node(parent, name.clone(), local)?;

    if let Some(mesh) = mesh {
        let mut primitives: Vec<_> = mesh.primitives().collect();
        // A single primitive becomes the node's own mesh; several become children.
        if primitives.len() == 1 {
            jobs.push(PrimitiveJob {
                target: id,
                mesh_index: mesh.index(),
                primitive: primitives.remove(0),
            });
        } else {
            for primitive in primitives {
                let child_name = format!("{name}_{}", primitive.index());
                let target = graph.add_node(Some(id), child_name, Mat4::IDENTITY)?;
                jobs.push(PrimitiveJob {
                    target,
                    mesh_index: mesh.index(),
                    primitive,
                });
            }
        }
    }

    for child in node.children() {
        walk(child, Some(id), graph, jobs)?;
    }
    Ok(())
}

struct DecodeContext<'a> {
    document: &'a gltf::Document,
    buffers: &'a [gltf::buffer::Data],
    raw: Option<&'a Value>,
    decoder: Option<&'a dyn DracoDecoder>,
}

impl<'a> DecodeContext<'a> {
    fn decode(&self, job: &PrimitiveJob<'_>) -> Result<Geometry, AssetError> {
        let primitive = &job.primitive;
        let kind = geometry_kind(primitive.mode());

        if let Some(extension) = self.draco_extension(job) {
            return self.decode_draco(kind, primitive, extension);
        }

        let reader = primitive.reader(|buffer| {
            self.buffers
                .get(buffer.index())
                .map(|data| data.0.as_slice())
        });
        let positions: Vec<[f32; 3]> = reader
            .read_positions()
            .map(|iter| iter.collect())
            .unwrap_or_default();
        let normals: Vec<[f32; 3]> = reader
            .read_normals()
            .map(|iter| iter.collect())
            .unwrap_or_default();
        let indices = reader
            .read_indices()
            .map(|indices| indices.into_u32().collect());

        Ok(Geometry {
            kind,
            positions,
            normals,
            indices,
            undecoded: None,
        })
    }

    fn draco_extension(&self, job: &PrimitiveJob<'_>) -> Option<&'a Value> {
        let pointer = format!(
            "/meshes/{}/primitives/{}/extensions/{}",
            job.mesh_index,
            job.primitive.index(),
            DRACO_EXTENSION
        );
        self.raw?.pointer(&pointer)
    }

    fn decode_draco(
        &self,
        kind: GeometryKind,
        primitive: &gltf::Primitive<'_>,
        extension: &Value,
    ) -> Result<Geometry, AssetError> {
        let info = UndecodedDraco {
            vertex_count: primitive
                .get(&gltf::Semantic::Positions)
                .map(|accessor| accessor.count())
                .unwrap_or(0),
            index_count: primitive
                .indices()
                .map(|accessor| accessor.count())
                .unwrap_or(0),
        };

        let Some(decoder) = self.decoder else {
            return Ok(Geometry::undecoded(kind, info));
        };

        let view_index = extension
            .get("bufferView")
            .and_then(Value::as_u64)
            .ok_or_else(|| AssetError::Decoder("draco extension without bufferView".into()))?
            as usize;
        let attributes: BTreeMap<String, u32> = extension
            .get("attributes")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(semantic, id)| Some((semantic.clone(), id.as_u64()? as u32)))
                    .collect()
            })
            .unwrap_or_default();

        let view = self
            .document
            .views()
            .nth(view_index)
            .ok_or_else(|| AssetError::Decoder(format!("buffer view {view_index} missing")))?;
        let data = self
            .buffers
            .get(view.buffer().index())
            .and_then(|buffer| buffer.0.get(view.offset()..view.offset() + view.length()))
            .ok_or_else(|| {
                AssetError::Decoder(format!("buffer view {view_index} out of bounds"))
            })?;

        let decoded = decoder.decode(&DracoPrimitive {
            data,
            attributes,
            vertex_count: info.vertex_count,
            index_count: info.index_count,
        })?;

        Ok(Geometry {
            kind,
            positions: decoded.positions,
            normals: decoded.normals,
            indices: decoded.indices,
            undecoded: None,
        })
    }
}

fn geometry_kind(mode: Mode) -> GeometryKind {
    match mode {
        Mode::Points => GeometryKind::Points,
        Mode::Lines => GeometryKind::Lines,
        Mode::LineLoop => GeometryKind::LineLoop,
        Mode::LineStrip => GeometryKind::LineStrip,
        Mode::Triangles => GeometryKind::Triangles,
        Mode::TriangleStrip => GeometryKind::TriangleStrip,
        Mode::TriangleFan => GeometryKind::TriangleFan,
    }
}

/// Primitives that fall back to the glTF default material report no material.
fn material_of(primitive: &gltf::Primitive<'_>) -> Option<Material> {
    let material = primitive.material();
    material.index()?;

    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, alpha] = pbr.base_color_factor();
    Some(Material {
        kind: if material.unlit() {
            MaterialKind::Unlit
        } else {
            MaterialKind::Standard
        },
        name: material.name().map(str::to_string),
        color: Color::from_factor([r, g, b]),
        alpha,
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
    })
}

/// Untyped view of the document, used for extension payloads the typed
/// model does not surface.
fn raw_document(bytes: &[u8]) -> Option<Value> {
    if bytes.starts_with(b"glTF") {
        let glb = gltf::Glb::from_slice(bytes).ok()?;
        serde_json::from_slice(&glb.json).ok()
    } else {
        serde_json::from_slice(bytes).ok()
    }
}
