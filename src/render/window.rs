//! Desktop window for the viewer: a flat-lit mesh pass, orbit controls and
//! pointer picking wired into [`Viewer`].

use super::{
    BackendKind, DrawList, FrameInputs, FrameView, GpuBackend, Lighting, MeshData, OrbitCamera,
    RenderError, RenderResult, RenderSubmission, Renderer, RendererConfig, Topology, WindowConfig,
    linear_rgb,
};
use crate::scene::{NodeId, SceneGraph};
use crate::viewer::Viewer;
use glam::Mat4;
use pollster::block_on;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wgpu::util::DeviceExt;
use winit::{
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{EventLoop, EventLoopWindowTarget},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Pointer travel, in pixels, below which a press/release counts as a click.
const CLICK_SLOP: f32 = 4.0;
const TITLE_REFRESH: Duration = Duration::from_millis(250);

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct FrameUniforms {
    view_projection: [[f32; 4]; 4],
    light: [f32; 4],
    ambient: [f32; 4],
}

impl FrameUniforms {
    fn new(view: &FrameView) -> Self {
        let Lighting {
            ambient,
            direction,
            intensity,
        } = view.lighting;
        Self {
            view_projection: view.view_projection.to_cols_array_2d(),
            light: direction.extend(intensity).to_array(),
            ambient: [ambient, 0.0, 0.0, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct MeshUniforms {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 4],
    color: [f32; 4],
    params: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
}

impl Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

struct GpuMesh {
    topology: Topology,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct MeshPipelines {
    triangles: wgpu::RenderPipeline,
    lines: wgpu::RenderPipeline,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    mesh_layout: wgpu::BindGroupLayout,
}

struct WindowSurface {
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    window: Arc<Window>,
    depth_view: wgpu::TextureView,
}

pub struct WindowBackend {
    config: RendererConfig,
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    surface: Option<WindowSurface>,
    pipelines: Option<MeshPipelines>,
    meshes: HashMap<NodeId, GpuMesh>,
}

impl WindowBackend {
    pub fn initialize(config: RendererConfig) -> RenderResult<Self> {
        block_on(Self::initialize_async(config))
    }

    async fn initialize_async(config: RendererConfig) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::Backend(
                "failed to find a compatible GPU adapter for window rendering",
            ))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Viewer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|_| RenderError::Backend("failed to create wgpu device for window"))?;

        log::info!(
            "[render] window backend initialized (adapter: {:?})",
            adapter.get_info().name
        );

        Ok(Self {
            config,
            instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
            surface: None,
            pipelines: None,
            meshes: HashMap::new(),
        })
    }

    pub fn create_window_surface(&mut self, window: Arc<Window>) -> RenderResult<()> {
        let surface = self
            .instance
            .create_surface(window.clone())
            .map_err(|_| RenderError::Backend("failed to create wgpu surface from window"))?;

        let capabilities = surface.get_capabilities(&self.adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| capabilities.formats.first().copied())
            .ok_or(RenderError::Backend("surface reports no texture formats"))?;

        let size = window.inner_size();
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if self.config.enable_vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: wgpu::CompositeAlphaMode::Opaque,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&self.device, &surface_config);

        let depth_view = self.create_depth_view(surface_config.width, surface_config.height);
        self.pipelines = Some(self.create_pipelines(format));
        self.surface = Some(WindowSurface {
            surface,
            surface_config,
            window,
            depth_view,
        });

        log::info!(
            "[render] window surface configured ({}x{}, format: {:?})",
            size.width,
            size.height,
            format
        );
        Ok(())
    }

    fn create_depth_view(&self, width: u32, height: u32) -> wgpu::TextureView {
        let depth_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Viewer Depth Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        depth_texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn uniform_layout(&self, label: &str, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayout {
        self.device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            })
    }

    fn create_pipelines(&self, surface_format: wgpu::TextureFormat) -> MeshPipelines {
        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Viewer Mesh Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
            });

        let stages = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;
        let frame_layout = self.uniform_layout("Viewer Frame Layout", stages);
        let mesh_layout = self.uniform_layout("Viewer Mesh Layout", stages);

        let frame_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Viewer Frame Uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Viewer Frame Bind Group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Viewer Mesh Pipeline Layout"),
                bind_group_layouts: &[&frame_layout, &mesh_layout],
                push_constant_ranges: &[],
            });

        let pipeline = |label: &str,
                        topology: wgpu::PrimitiveTopology,
                        cull_mode: Option<wgpu::Face>| {
            self.device
                .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(label),
                    layout: Some(&layout),
                    vertex: wgpu::VertexState {
                        module: &shader,
                        entry_point: "vs_main",
                        buffers: &[Vertex::desc()],
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &shader,
                        entry_point: "fs_main",
                        targets: &[Some(wgpu::ColorTargetState {
                            format: surface_format,
                            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology,
                        strip_index_format: None,
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode,
                        polygon_mode: wgpu::PolygonMode::Fill,
                        unclipped_depth: false,
                        conservative: false,
                    },
                    depth_stencil: Some(wgpu::DepthStencilState {
                        format: DEPTH_FORMAT,
                        depth_write_enabled: true,
                        depth_compare: wgpu::CompareFunction::Less,
                        stencil: wgpu::StencilState::default(),
                        bias: wgpu::DepthBiasState::default(),
                    }),
                    multisample: wgpu::MultisampleState {
                        count: 1,
                        mask: !0,
                        alpha_to_coverage_enabled: false,
                    },
                    multiview: None,
                })
        };

        MeshPipelines {
            // glTF meshes are frequently single-sided shells; draw both faces.
            triangles: pipeline(
                "Viewer Triangle Pipeline",
                wgpu::PrimitiveTopology::TriangleList,
                None,
            ),
            lines: pipeline("Viewer Line Pipeline", wgpu::PrimitiveTopology::LineList, None),
            frame_buffer,
            frame_bind_group,
            mesh_layout,
        }
    }

    fn upload(&self, pipelines: &MeshPipelines, data: &MeshData) -> GpuMesh {
        let vertices: Vec<Vertex> = data
            .positions
            .iter()
            .zip(&data.normals)
            .map(|(position, normal)| Vertex {
                position: *position,
                normal: *normal,
            })
            .collect();

        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Viewer Vertex Buffer"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Viewer Index Buffer"),
                contents: bytemuck::cast_slice(&data.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Viewer Mesh Uniforms"),
            size: std::mem::size_of::<MeshUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Viewer Mesh Bind Group"),
            layout: &pipelines.mesh_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        GpuMesh {
            topology: data.topology,
            vertex_buffer,
            index_buffer,
            index_count: data.indices.len() as u32,
            uniform_buffer,
            bind_group,
        }
    }

    fn reconfigure(&self) {
        if let Some(surf) = self.surface.as_ref() {
            surf.surface.configure(&self.device, &surf.surface_config);
        }
    }
}

impl GpuBackend for WindowBackend {
    fn label(&self) -> &'static str {
        "Window Backend (Desktop)"
    }

    fn prepare(&mut self, scene: &SceneGraph) -> RenderResult<()> {
        let pipelines = self
            .pipelines
            .as_ref()
            .ok_or(RenderError::Backend("mesh pipelines not initialized"))?;

        let mut meshes = HashMap::new();
        for node in scene.mesh_nodes() {
            let Some(mesh) = scene.mesh(node) else {
                continue;
            };
            if let Some(data) = MeshData::from_geometry(&mesh.geometry) {
                meshes.insert(node, self.upload(pipelines, &data));
            }
        }
        log::info!(
            "[render] uploaded {} of {} meshes for '{}'",
            meshes.len(),
            scene.mesh_nodes().len(),
            scene.name()
        );
        self.meshes = meshes;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        let Some(surf) = self.surface.as_mut() else {
            return;
        };
        surf.surface_config.width = width.max(1);
        surf.surface_config.height = height.max(1);
        surf.surface.configure(&self.device, &surf.surface_config);
        let (width, height) = (surf.surface_config.width, surf.surface_config.height);
        let depth_view = self.create_depth_view(width, height);
        if let Some(surf) = self.surface.as_mut() {
            surf.depth_view = depth_view;
        }
        log::debug!("[render] window resized to {}x{}", width, height);
    }

    fn render_frame(
        &mut self,
        inputs: &FrameInputs,
        view: &FrameView,
        draws: &DrawList,
    ) -> RenderResult<RenderSubmission> {
        let frame = {
            let surface = self
                .surface
                .as_ref()
                .ok_or(RenderError::Backend("window surface not initialized"))?;
            match surface.surface.get_current_texture() {
                Ok(frame) => frame,
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    log::debug!("[render] surface lost; reconfiguring");
                    self.reconfigure();
                    return Ok(RenderSubmission {
                        frame_index: inputs.frame_index,
                        draw_calls: 0,
                    });
                }
                Err(_) => return Err(RenderError::Backend("failed to acquire swapchain texture")),
            }
        };

        let surface = self
            .surface
            .as_ref()
            .ok_or(RenderError::Backend("window surface not initialized"))?;
        let pipelines = self
            .pipelines
            .as_ref()
            .ok_or(RenderError::Backend("mesh pipelines not initialized"))?;

        self.queue.write_buffer(
            &pipelines.frame_buffer,
            0,
            bytemuck::cast_slice(&[FrameUniforms::new(view)]),
        );

        let visible: Vec<&GpuMesh> = draws
            .items
            .iter()
            .filter_map(|item| {
                let mesh = self.meshes.get(&item.node)?;
                let [r, g, b] = linear_rgb(item.color);
                let uniforms = MeshUniforms {
                    model: item.world.to_cols_array_2d(),
                    normal: item.world.inverse().transpose().to_cols_array_2d(),
                    color: [r, g, b, item.alpha],
                    params: [if item.unlit { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
                };
                self.queue
                    .write_buffer(&mesh.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));
                Some(mesh)
            })
            .collect();

        let target = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Viewer Frame Encoder"),
            });

        {
            let [r, g, b, a] = self.config.clear_color;
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Viewer Mesh Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &surface.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_bind_group(0, &pipelines.frame_bind_group, &[]);
            for mesh in &visible {
                let pipeline = match mesh.topology {
                    Topology::Triangles => &pipelines.triangles,
                    Topology::Lines => &pipelines.lines,
                };
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(1, &mesh.bind_group, &[]);
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        Ok(RenderSubmission {
            frame_index: inputs.frame_index,
            draw_calls: visible.len(),
        })
    }
}

/// Event loop wrapper for desktop window rendering
pub struct WindowEventLoop {
    event_loop: EventLoop<()>,
}

impl WindowEventLoop {
    pub fn new() -> RenderResult<Self> {
        let event_loop =
            EventLoop::new().map_err(|_| RenderError::Backend("failed to create event loop"))?;
        Ok(Self { event_loop })
    }

    pub fn run<F>(self, mut app_factory: F) -> RenderResult<()>
    where
        F: FnMut(&EventLoopWindowTarget<()>) -> RenderResult<WindowApp> + 'static,
    {
        use winit::event::{Event, StartCause};

        let mut app: Option<WindowApp> = None;

        self.event_loop
            .run(move |event, event_loop_target| match event {
                Event::NewEvents(StartCause::Init) => match app_factory(event_loop_target) {
                    Ok(new_app) => {
                        log::info!("[render] window application initialized");
                        app = Some(new_app);
                    }
                    Err(err) => {
                        log::error!("[render] failed to initialize window app: {err}");
                        event_loop_target.exit();
                    }
                },
                Event::WindowEvent { window_id, event } => {
                    if let Some(app) = app.as_mut() {
                        app.handle_window_event(event_loop_target, window_id, event);
                    }
                }
                Event::AboutToWait => {
                    if let Some(app) = app.as_ref() {
                        app.window.request_redraw();
                    }
                }
                _ => {}
            })
            .map_err(|_| RenderError::Backend("event loop terminated with error"))?;

        Ok(())
    }
}

/// Opens a window showing `viewer`'s scene and blocks until it is closed.
pub fn run_window(config: WindowConfig, viewer: Viewer) -> RenderResult<()> {
    let mut viewer = Some(viewer);
    WindowEventLoop::new()?.run(move |target| {
        let viewer = viewer
            .take()
            .ok_or(RenderError::Backend("window application already created"))?;
        WindowApp::new(target, config.clone(), viewer)
    })
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    last: [f32; 2],
    travelled: f32,
}

/// Window state: the viewer, its camera and the pointer.
pub struct WindowApp {
    window: Arc<Window>,
    renderer: Renderer,
    viewer: Viewer,
    camera: OrbitCamera,
    lighting: Lighting,
    title: String,
    cursor: Option<[f32; 2]>,
    drag: Option<Drag>,
    last_frame: Instant,
    last_title: Instant,
}

impl WindowApp {
    pub fn new(
        event_loop: &EventLoopWindowTarget<()>,
        config: WindowConfig,
        viewer: Viewer,
    ) -> RenderResult<Self> {
        use winit::dpi::LogicalSize;

        let window = winit::window::WindowBuilder::new()
            .with_title(config.title.clone())
            .with_inner_size(LogicalSize::new(config.width, config.height))
            .with_resizable(config.resizable)
            .build(event_loop)
            .map_err(|_| RenderError::Backend("failed to create window"))?;
        let window = Arc::new(window);

        let renderer_config = RendererConfig {
            backend: BackendKind::Wgpu,
            ..RendererConfig::default()
        };
        let mut backend = WindowBackend::initialize(renderer_config)?;
        backend.create_window_surface(Arc::clone(&window))?;

        let composition = viewer.composition();
        let camera = OrbitCamera::new(&composition.camera, composition.orbit_controls);
        let lighting = Lighting::new(&composition.ambient_light, &composition.directional_light);

        Ok(Self {
            window,
            renderer: Renderer::new(renderer_config, Box::new(backend)),
            viewer,
            camera,
            lighting,
            title: config.title,
            cursor: None,
            drag: None,
            last_frame: Instant::now(),
            last_title: Instant::now(),
        })
    }

    fn viewport(&self) -> [f32; 2] {
        let size = self.window.inner_size();
        [size.width as f32, size.height as f32]
    }

    fn mesh_under_cursor(&self) -> Option<NodeId> {
        let ray = self.camera.picking_ray(self.cursor?, self.viewport())?;
        self.viewer.pick(&ray)
    }

    fn refresh_hover(&mut self) {
        let mesh = self.mesh_under_cursor();
        self.viewer.hover(mesh);
    }

    pub fn handle_window_event(
        &mut self,
        event_loop: &EventLoopWindowTarget<()>,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("[render] window close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                self.renderer.resize(size.width, size.height);
            }
            WindowEvent::CursorMoved { position, .. } => {
                let cursor = [position.x as f32, position.y as f32];
                let previous = self.cursor.replace(cursor);
                match (self.drag.as_mut(), previous) {
                    (Some(drag), Some(_)) => {
                        let (dx, dy) = (cursor[0] - drag.last[0], cursor[1] - drag.last[1]);
                        drag.travelled += dx.hypot(dy);
                        drag.last = cursor;
                        if drag.travelled >= CLICK_SLOP {
                            self.camera.orbit(dx, dy);
                        }
                    }
                    _ => self.refresh_hover(),
                }
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.drag = None;
                self.viewer.hover(None);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => {
                    self.drag = self.cursor.map(|last| Drag {
                        last,
                        travelled: 0.0,
                    });
                }
                ElementState::Released => {
                    if let Some(drag) = self.drag.take() {
                        if drag.travelled < CLICK_SLOP {
                            if let Some(mesh) = self.mesh_under_cursor() {
                                self.viewer.click(mesh);
                            }
                        }
                    }
                    self.refresh_hover();
                }
            },
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 / 50.0,
                };
                self.camera.zoom(steps);
                self.refresh_hover();
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                match &event.logical_key {
                    Key::Character(text) if text.as_str().eq_ignore_ascii_case("e") => {
                        self.viewer.export();
                    }
                    Key::Named(NamedKey::Escape) => event_loop.exit(),
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.render_frame() {
                    log::error!("[render] redraw failed: {err}");
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    pub fn render_frame(&mut self) -> RenderResult<()> {
        let now = Instant::now();
        let delta_seconds = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        let generation = self.viewer.scene_generation();
        self.viewer.tick(delta_seconds);
        if self.viewer.scene_generation() != generation {
            self.refresh_hover();
        }

        let [width, height] = self.viewport();
        let view = FrameView {
            view_projection: if height > 0.0 {
                self.camera.view_projection(width / height)
            } else {
                Mat4::IDENTITY
            },
            lighting: self.lighting,
        };
        let scene = self
            .viewer
            .scene()
            .map(|scene| (scene, self.viewer.scene_generation()));
        self.renderer.render(delta_seconds, scene, &view)?;

        if now.duration_since(self.last_title) >= TITLE_REFRESH {
            self.last_title = now;
            self.window.set_title(&self.status_line());
        }
        Ok(())
    }

    /// Window title: info panel, stats overlay and the latest notice.
    fn status_line(&self) -> String {
        let mut parts = vec![self.title.clone()];
        match self.viewer.info_panel() {
            Some(info) => parts.push(format!(
                "{} | {} | {}",
                if info.name.is_empty() { "(unnamed)" } else { &info.name },
                info.geometry,
                info.material_label()
            )),
            None if self.viewer.is_loading() => parts.push("loading...".to_string()),
            None => {}
        }
        if self.viewer.composition().stats {
            parts.push(self.viewer.stats().summary());
        }
        if let Some(notice) = self.viewer.notices().latest() {
            parts.push(notice.to_string());
        }
        parts.join(" - ")
    }
}
