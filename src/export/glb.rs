//! glTF document assembly and the GLB binary container.

use super::{DracoEncoder, ExportError, ExportOptions};
use crate::scene::{Geometry, Material, MaterialKind, NodeId, SceneGraph};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use glam::Mat4;
use serde_json::{Map, Value, json};
use std::collections::HashMap;

pub const GLB_MAGIC: u32 = 0x4654_6C67;
pub const GLB_VERSION: u32 = 2;
pub const CHUNK_JSON: u32 = 0x4E4F_534A;
pub const CHUNK_BIN: u32 = 0x004E_4942;

pub const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";
pub const UNLIT_EXTENSION: &str = "KHR_materials_unlit";

const COMPONENT_FLOAT: u32 = 5126;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// Wraps a JSON document and binary payload into a GLB container.
pub fn write_glb(document: &Value, bin: &[u8]) -> Result<Vec<u8>, ExportError> {
    let mut json_chunk = serde_json::to_vec(document)?;
    pad_to_four(&mut json_chunk, b' ');

    let mut bin_chunk = bin.to_vec();
    pad_to_four(&mut bin_chunk, 0);

    let mut total = 12 + 8 + json_chunk.len();
    if !bin_chunk.is_empty() {
        total += 8 + bin_chunk.len();
    }
    let total_length = u32::try_from(total).map_err(|_| ExportError::TooLarge(total))?;

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&total_length.to_le_bytes());

    out.extend_from_slice(&(json_chunk.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json_chunk);

    if !bin_chunk.is_empty() {
        out.extend_from_slice(&(bin_chunk.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        out.extend_from_slice(&bin_chunk);
    }
    Ok(out)
}

fn pad_to_four(bytes: &mut Vec<u8>, fill: u8) {
    while bytes.len() % 4 != 0 {
        bytes.push(fill);
    }
}

/// Builds the glTF JSON and its single binary buffer for `scene`.
pub(crate) struct DocumentBuilder<'a> {
    options: &'a ExportOptions,
    encoder: Option<&'a dyn DracoEncoder>,
    bin: Vec<u8>,
    buffer_views: Vec<Value>,
    accessors: Vec<Value>,
    meshes: Vec<Value>,
    materials: Vec<Value>,
    extensions_used: Vec<&'static str>,
    extensions_required: Vec<&'static str>,
    skipped_meshes: usize,
}

impl<'a> DocumentBuilder<'a> {
    pub(crate) fn new(options: &'a ExportOptions, encoder: Option<&'a dyn DracoEncoder>) -> Self {
        Self {
            options,
            encoder,
            bin: Vec::new(),
            buffer_views: Vec::new(),
            accessors: Vec::new(),
            meshes: Vec::new(),
            materials: Vec::new(),
            extensions_used: Vec::new(),
            extensions_required: Vec::new(),
            skipped_meshes: 0,
        }
    }

    pub(crate) fn build(mut self, scene: &SceneGraph) -> Result<(Value, Vec<u8>), ExportError> {
        let order = scene.traverse();
        if order.is_empty() {
            return Err(ExportError::EmptyScene);
        }
        let index_of: HashMap<NodeId, usize> = order
            .iter()
            .enumerate()
            .map(|(index, node)| (*node, index))
            .collect();

        let mut nodes = Vec::with_capacity(order.len());
        for node_id in &order {
            let Some(node) = scene.node(*node_id) else {
                continue;
            };
            let mut entry = Map::new();
            if !node.name.is_empty() {
                entry.insert("name".into(), json!(node.name));
            }
            if node.local_transform() != Mat4::IDENTITY {
                entry.insert(
                    "matrix".into(),
                    json!(node.local_transform().to_cols_array()),
                );
            }
            if !node.children().is_empty() {
                let children: Vec<usize> = node
                    .children()
                    .iter()
                    .filter_map(|child| index_of.get(child).copied())
                    .collect();
                entry.insert("children".into(), json!(children));
            }
            if let Some(mesh) = node.mesh() {
                if let Some(mesh_index) =
                    self.push_mesh(&node.name, &mesh.geometry, mesh.material.as_ref())?
                {
                    entry.insert("mesh".into(), json!(mesh_index));
                }
            }
            nodes.push(Value::Object(entry));
        }

        if self.skipped_meshes > 0 {
            log::warn!(
                "[export] {} mesh(es) without decoded geometry were left out",
                self.skipped_meshes
            );
        }

        let roots: Vec<usize> = scene
            .roots()
            .iter()
            .filter_map(|root| index_of.get(root).copied())
            .collect();

        let mut asset = json!({ "version": "2.0", "generator": "glb_viewer" });
        if let (Some(draco), None) = (self.options.draco_options, self.encoder) {
            asset["extras"] = json!({ "dracoOptions": draco });
        }

        let mut document = json!({
            "asset": asset,
            "scene": 0,
            "scenes": [{ "name": scene.name(), "nodes": roots }],
            "nodes": nodes,
        });

        if !self.meshes.is_empty() {
            document["meshes"] = Value::Array(std::mem::take(&mut self.meshes));
            document["accessors"] = Value::Array(std::mem::take(&mut self.accessors));
            document["bufferViews"] = Value::Array(std::mem::take(&mut self.buffer_views));
        }
        if !self.materials.is_empty() {
            document["materials"] = Value::Array(std::mem::take(&mut self.materials));
        }
        if !self.extensions_used.is_empty() {
            document["extensionsUsed"] = json!(self.extensions_used);
        }
        if !self.extensions_required.is_empty() {
            document["extensionsRequired"] = json!(self.extensions_required);
        }
        if !self.bin.is_empty() {
            let mut buffer = json!({ "byteLength": self.bin.len() });
            if !self.options.binary {
                buffer["uri"] = json!(format!(
                    "data:application/octet-stream;base64,{}",
                    STANDARD.encode(&self.bin)
                ));
            }
            document["buffers"] = json!([buffer]);
        }

        Ok((document, self.bin))
    }

    fn push_mesh(
        &mut self,
        name: &str,
        geometry: &Geometry,
        material: Option<&Material>,
    ) -> Result<Option<usize>, ExportError> {
        if geometry.positions.is_empty() {
            if geometry.undecoded.is_some() {
                self.skipped_meshes += 1;
            }
            return Ok(None);
        }

        let mut primitive = match (self.options.draco_options, self.encoder) {
            (Some(draco), Some(encoder)) => {
                let encoded = encoder.encode(geometry, &draco)?;
                self.push_draco_primitive(geometry, encoded)
            }
            _ => self.push_raw_primitive(geometry),
        };

        primitive.insert("mode".into(), json!(geometry.kind.gltf_mode()));
        if let Some(material) = material {
            let index = self.push_material(material);
            primitive.insert("material".into(), json!(index));
        }

        let mut mesh = json!({ "primitives": [Value::Object(primitive)] });
        if !name.is_empty() {
            mesh["name"] = json!(name);
        }
        self.meshes.push(mesh);
        Ok(Some(self.meshes.len() - 1))
    }

    fn push_raw_primitive(&mut self, geometry: &Geometry) -> Map<String, Value> {
        let mut attributes = Map::new();

        let view = self.push_view(&vec3_bytes(&geometry.positions), Some(TARGET_ARRAY_BUFFER));
        let position = self.push_vec3_accessor(Some(view), &geometry.positions, true);
        attributes.insert("POSITION".into(), json!(position));

        if geometry.has_normals() {
            let view = self.push_view(&vec3_bytes(&geometry.normals), Some(TARGET_ARRAY_BUFFER));
            let normal = self.push_vec3_accessor(Some(view), &geometry.normals, false);
            attributes.insert("NORMAL".into(), json!(normal));
        }

        let mut primitive = Map::new();
        primitive.insert("attributes".into(), Value::Object(attributes));

        if let Some(indices) = &geometry.indices {
            let bytes: Vec<u8> = indices.iter().flat_map(|index| index.to_le_bytes()).collect();
            let view = self.push_view(&bytes, Some(TARGET_ELEMENT_ARRAY_BUFFER));
            let accessor = self.push_index_accessor(Some(view), indices.len());
            primitive.insert("indices".into(), json!(accessor));
        }
        primitive
    }

    fn push_draco_primitive(
        &mut self,
        geometry: &Geometry,
        encoded: super::EncodedPrimitive,
    ) -> Map<String, Value> {
        self.require_extension(DRACO_EXTENSION, true);
        let view = self.push_view(&encoded.bytes, None);

        let mut attributes = Map::new();
        let position = self.push_vec3_accessor(None, &geometry.positions, true);
        attributes.insert("POSITION".into(), json!(position));
        if geometry.has_normals() && encoded.attributes.contains_key("NORMAL") {
            let normal = self.push_vec3_accessor(None, &geometry.normals, false);
            attributes.insert("NORMAL".into(), json!(normal));
        }

        let mut primitive = Map::new();
        primitive.insert("attributes".into(), Value::Object(attributes));
        if let Some(indices) = &geometry.indices {
            let accessor = self.push_index_accessor(None, indices.len());
            primitive.insert("indices".into(), json!(accessor));
        }
        primitive.insert(
            "extensions".into(),
            json!({
                DRACO_EXTENSION: {
                    "bufferView": view,
                    "attributes": encoded.attributes,
                }
            }),
        );
        primitive
    }

    fn push_material(&mut self, material: &Material) -> usize {
        let [r, g, b] = material.color.to_factor();
        let mut entry = json!({
            "pbrMetallicRoughness": {
                "baseColorFactor": [r, g, b, material.alpha],
                "metallicFactor": material.metallic,
                "roughnessFactor": material.roughness,
            }
        });
        if let Some(name) = &material.name {
            entry["name"] = json!(name);
        }
        if material.alpha < 1.0 {
            entry["alphaMode"] = json!("BLEND");
        }
        if material.kind == MaterialKind::Unlit {
            self.require_extension(UNLIT_EXTENSION, false);
            entry["extensions"] = json!({ UNLIT_EXTENSION: {} });
        }
        self.materials.push(entry);
        self.materials.len() - 1
    }

    fn push_view(&mut self, bytes: &[u8], target: Option<u32>) -> usize {
        pad_to_four(&mut self.bin, 0);
        let offset = self.bin.len();
        self.bin.extend_from_slice(bytes);

        let mut view = json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": bytes.len(),
        });
        if let Some(target) = target {
            view["target"] = json!(target);
        }
        self.buffer_views.push(view);
        self.buffer_views.len() - 1
    }

    fn push_vec3_accessor(
        &mut self,
        view: Option<usize>,
        values: &[[f32; 3]],
        with_bounds: bool,
    ) -> usize {
        let mut accessor = json!({
            "componentType": COMPONENT_FLOAT,
            "count": values.len(),
            "type": "VEC3",
        });
        if let Some(view) = view {
            accessor["bufferView"] = json!(view);
        }
        if with_bounds {
            let (min, max) = component_bounds(values);
            accessor["min"] = json!(min);
            accessor["max"] = json!(max);
        }
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }

    fn push_index_accessor(&mut self, view: Option<usize>, count: usize) -> usize {
        let mut accessor = json!({
            "componentType": COMPONENT_UNSIGNED_INT,
            "count": count,
            "type": "SCALAR",
        });
        if let Some(view) = view {
            accessor["bufferView"] = json!(view);
        }
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }

    fn require_extension(&mut self, name: &'static str, required: bool) {
        if !self.extensions_used.contains(&name) {
            self.extensions_used.push(name);
        }
        if required && !self.extensions_required.contains(&name) {
            self.extensions_required.push(name);
        }
    }
}

fn vec3_bytes(values: &[[f32; 3]]) -> Vec<u8> {
    values
        .iter()
        .flat_map(|value| value.iter().flat_map(|component| component.to_le_bytes()))
        .collect()
}

fn component_bounds(values: &[[f32; 3]]) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for value in values {
        for axis in 0..3 {
            min[axis] = min[axis].min(value[axis]);
            max[axis] = max[axis].max(value[axis]);
        }
    }
    (min, max)
}
