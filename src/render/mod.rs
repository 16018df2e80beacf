mod camera;
mod mesh;
#[cfg(feature = "render-wgpu")]
pub mod window;

pub use camera::OrbitCamera;
pub use mesh::{MeshData, Topology, linear_rgb};

use crate::scene::{Color, MaterialKind, NodeId, SceneGraph};
use crate::viewer::{AmbientLight, DirectionalLight};
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Colour used for meshes that carry no material.
pub const DEFAULT_MESH_COLOR: Color = Color::WHITE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Null,
    Wgpu,
}

#[derive(Debug, Clone, Copy)]
pub struct RendererConfig {
    pub backend: BackendKind,
    pub enable_vsync: bool,
    pub clear_color: [f64; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Null,
            enable_vsync: true,
            clear_color: [0.05, 0.1, 0.12, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "GLB Viewer".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FrameInputs {
    pub frame_index: u64,
    pub delta_seconds: f32,
    pub elapsed_seconds: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    pub ambient: f32,
    /// Unit vector pointing from the scene toward the light.
    pub direction: Vec3,
    pub intensity: f32,
}

impl Lighting {
    pub fn new(ambient: &AmbientLight, directional: &DirectionalLight) -> Self {
        let direction = Vec3::from(directional.position).normalize_or_zero();
        Self {
            ambient: ambient.intensity,
            direction: if direction == Vec3::ZERO { Vec3::Z } else { direction },
            intensity: directional.intensity,
        }
    }
}

/// Camera and lights for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameView {
    pub view_projection: Mat4,
    pub lighting: Lighting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub node: NodeId,
    pub world: Mat4,
    pub color: Color,
    pub alpha: f32,
    pub unlit: bool,
}

/// Meshes to draw this frame, with their current material colours.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawList {
    pub items: Vec<DrawItem>,
}

impl DrawList {
    pub fn from_scene(scene: &SceneGraph) -> Self {
        let items = scene
            .mesh_nodes()
            .into_iter()
            .filter_map(|node| {
                let record = scene.node(node)?;
                let mesh = record.mesh()?;
                if mesh.geometry.undecoded.is_some() {
                    return None;
                }
                let material = mesh.material.as_ref();
                Some(DrawItem {
                    node,
                    world: record.world_transform(),
                    color: material.map_or(DEFAULT_MESH_COLOR, |material| material.color),
                    alpha: material.map_or(1.0, |material| material.alpha),
                    unlit: material.is_some_and(|material| material.kind == MaterialKind::Unlit),
                })
            })
            .collect();
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSubmission {
    pub frame_index: u64,
    pub draw_calls: usize,
}

#[derive(Debug)]
pub enum RenderError {
    FrameOutOfOrder { expected: u64, got: u64 },
    Backend(&'static str),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::FrameOutOfOrder { expected, got } => write!(
                f,
                "renderer expected frame {expected} but backend produced {got}"
            ),
            RenderError::Backend(reason) => write!(f, "gpu backend failure: {reason}"),
        }
    }
}

impl std::error::Error for RenderError {}

pub type RenderResult<T> = Result<T, RenderError>;

pub trait GpuBackend: Send {
    fn label(&self) -> &'static str;

    /// Called once per newly installed scene, before its first frame.
    fn prepare(&mut self, _scene: &SceneGraph) -> RenderResult<()> {
        Ok(())
    }

    fn resize(&mut self, _width: u32, _height: u32) {}

    fn render_frame(
        &mut self,
        inputs: &FrameInputs,
        view: &FrameView,
        draws: &DrawList,
    ) -> RenderResult<RenderSubmission>;
}

pub struct Renderer {
    config: RendererConfig,
    backend: Box<dyn GpuBackend>,
    frame_index: u64,
    elapsed_seconds: f32,
    prepared_generation: Option<u64>,
}

impl Renderer {
    pub fn new(config: RendererConfig, backend: Box<dyn GpuBackend>) -> Self {
        Self {
            config,
            backend,
            frame_index: 0,
            elapsed_seconds: 0.0,
            prepared_generation: None,
        }
    }

    /// Draws `scene` (if any). `generation` identifies the scene; a change
    /// triggers [`GpuBackend::prepare`].
    pub fn render(
        &mut self,
        delta_seconds: f32,
        scene: Option<(&SceneGraph, u64)>,
        view: &FrameView,
    ) -> RenderResult<RenderSubmission> {
        let draws = match scene {
            Some((scene, generation)) => {
                if self.prepared_generation != Some(generation) {
                    self.backend.prepare(scene)?;
                    self.prepared_generation = Some(generation);
                }
                DrawList::from_scene(scene)
            }
            None => DrawList::default(),
        };

        let next_index = self.frame_index + 1;
        let elapsed = self.elapsed_seconds + delta_seconds;
        let inputs = FrameInputs {
            frame_index: next_index,
            delta_seconds,
            elapsed_seconds: elapsed,
        };

        let submission = self.backend.render_frame(&inputs, view, &draws)?;
        if submission.frame_index != next_index {
            return Err(RenderError::FrameOutOfOrder {
                expected: next_index,
                got: submission.frame_index,
            });
        }

        self.frame_index = next_index;
        self.elapsed_seconds = elapsed;
        Ok(submission)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.backend.resize(width, height);
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn backend_label(&self) -> &'static str {
        self.backend.label()
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }
}

#[derive(Default)]
pub struct NullGpuBackend;

impl GpuBackend for NullGpuBackend {
    fn label(&self) -> &'static str {
        "Null GPU Backend"
    }

    fn render_frame(
        &mut self,
        inputs: &FrameInputs,
        _view: &FrameView,
        draws: &DrawList,
    ) -> RenderResult<RenderSubmission> {
        log::trace!(
            "[render] frame {} (dt {:.3} s) - {} draw calls",
            inputs.frame_index,
            inputs.delta_seconds,
            draws.len()
        );

        Ok(RenderSubmission {
            frame_index: inputs.frame_index,
            draw_calls: draws.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Geometry, GeometryKind, Material, UndecodedDraco};
    use std::sync::{Arc, Mutex};

    fn view() -> FrameView {
        FrameView {
            view_projection: Mat4::IDENTITY,
            lighting: Lighting::new(&AmbientLight::default(), &DirectionalLight::default()),
        }
    }

    fn scene() -> SceneGraph {
        let mut scene = SceneGraph::new("draw");
        let triangle = Geometry::new(GeometryKind::Triangles, vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        scene
            .add_mesh(None, "lit", Mat4::IDENTITY, triangle.clone(), Some(Material::standard(Color::new(1, 2, 3))))
            .unwrap();
        scene
            .add_mesh(None, "bare", Mat4::IDENTITY, triangle, None)
            .unwrap();
        scene
            .add_mesh(
                None,
                "compressed",
                Mat4::IDENTITY,
                Geometry::undecoded(
                    GeometryKind::Triangles,
                    UndecodedDraco {
                        vertex_count: 3,
                        index_count: 3,
                    },
                ),
                Some(Material::unlit(Color::WHITE)),
            )
            .unwrap();
        scene
    }

    #[test]
    fn draw_list_reads_current_colours() {
        let scene = scene();
        let draws = DrawList::from_scene(&scene);
        assert_eq!(draws.len(), 2);
        assert_eq!(draws.items[0].color, Color::new(1, 2, 3));
        assert_eq!(draws.items[1].color, DEFAULT_MESH_COLOR);
        assert!(!draws.items[1].unlit);
    }

    #[test]
    fn null_pipeline_advances_frame_index() {
        let mut renderer = Renderer::new(RendererConfig::default(), Box::new(NullGpuBackend));
        let scene = scene();
        let submission = renderer
            .render(0.016, Some((&scene, 1)), &view())
            .expect("null pipeline should not fail");
        assert_eq!(renderer.frame_index(), 1);
        assert_eq!(submission.draw_calls, 2);
    }

    #[derive(Default)]
    struct TestBackend {
        forced_frame_index: Option<u64>,
        prepared: Arc<Mutex<Vec<String>>>,
        inputs: Arc<Mutex<Vec<FrameInputs>>>,
    }

    impl GpuBackend for TestBackend {
        fn label(&self) -> &'static str {
            "Test Backend"
        }

        fn prepare(&mut self, scene: &SceneGraph) -> RenderResult<()> {
            self.prepared.lock().unwrap().push(scene.name().to_string());
            Ok(())
        }

        fn render_frame(
            &mut self,
            inputs: &FrameInputs,
            _view: &FrameView,
            draws: &DrawList,
        ) -> RenderResult<RenderSubmission> {
            self.inputs.lock().unwrap().push(*inputs);
            Ok(RenderSubmission {
                frame_index: self.forced_frame_index.unwrap_or(inputs.frame_index),
                draw_calls: draws.len(),
            })
        }
    }

    #[test]
    fn renderer_detects_out_of_order_frames() {
        let backend = TestBackend {
            forced_frame_index: Some(0),
            ..TestBackend::default()
        };
        let mut renderer = Renderer::new(RendererConfig::default(), Box::new(backend));

        match renderer.render(0.016, None, &view()) {
            Err(RenderError::FrameOutOfOrder { expected, got }) => {
                assert_eq!(expected, 1);
                assert_eq!(got, 0);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(renderer.frame_index(), 0);
    }

    #[test]
    fn prepare_runs_once_per_generation() {
        let backend = TestBackend::default();
        let prepared = backend.prepared.clone();
        let inputs = backend.inputs.clone();
        let mut renderer = Renderer::new(RendererConfig::default(), Box::new(backend));
        let scene = scene();

        renderer.render(0.25, Some((&scene, 1)), &view()).unwrap();
        renderer.render(0.5, Some((&scene, 1)), &view()).unwrap();
        renderer.render(0.25, Some((&scene, 2)), &view()).unwrap();

        assert_eq!(*prepared.lock().unwrap(), vec!["draw", "draw"]);
        let inputs = inputs.lock().unwrap();
        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs[1].frame_index, 2);
        assert_eq!(inputs[2].elapsed_seconds, 1.0);
    }

    #[test]
    fn lighting_direction_is_normalized() {
        let lighting = Lighting::new(
            &AmbientLight { intensity: 0.3 },
            &DirectionalLight {
                position: [0.0, 0.0, 5.0],
                intensity: 2.0,
            },
        );
        assert_eq!(lighting.direction, Vec3::Z);
        assert_eq!(lighting.ambient, 0.3);
    }
}
