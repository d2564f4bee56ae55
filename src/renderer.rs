use std::{borrow::Cow, sync::Arc};

use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::{
    application::Screen,
    mesh::{uv_sphere, ModelMesh, ModelVertex, Vertex},
    scene::SceneState,
};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Samples per pixel of the color and depth targets; resolved into the swapchain.
pub const SAMPLE_COUNT: u32 = 4;

/// Vertex buffer that can be rewritten from the CPU and grows when needed.
pub struct VertexBuffer {
    buffer: wgpu::Buffer,
    label: Option<&'static str>,
}

impl VertexBuffer {
    pub fn init_immediate(
        device: &wgpu::Device,
        content: &[u8],
        label: Option<&'static str>,
    ) -> Self {
        let init_descriptor = wgpu::util::BufferInitDescriptor {
            label,
            contents: content,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        };
        let buffer = device.create_buffer_init(&init_descriptor);
        Self { buffer, label }
    }

    pub fn init(device: &wgpu::Device, size: u64, label: Option<&'static str>) -> Self {
        let wgt_descriptor = wgpu::BufferDescriptor {
            label,
            size: size.max(wgpu::COPY_BUFFER_ALIGNMENT),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        };
        let buffer = device.create_buffer(&wgt_descriptor);
        Self { buffer, label }
    }

    /// Upload `content` from offset 0, reallocating if it no longer fits.
    pub fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, content: &[u8]) {
        if content.is_empty() {
            return;
        }
        if content.len() as u64 > self.buffer.size() {
            *self = Self::init_immediate(device, content, self.label);
        } else {
            queue.write_buffer(&self.buffer, 0, content);
        }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

pub struct IndexBuffer {
    buffer: wgpu::Buffer,
    format: wgpu::IndexFormat,
}

macro_rules! index_buffer_init_immediate {
    ($device:expr, $content:expr, $label:expr, $ty:ident) => {{
        let init_descriptor = wgpu::util::BufferInitDescriptor {
            label: $label,
            contents: bytemuck::cast_slice($content),
            usage: wgpu::BufferUsages::INDEX,
        };
        let buffer = $device.create_buffer_init(&init_descriptor);
        IndexBuffer {
            buffer,
            format: wgpu::IndexFormat::$ty,
        }
    }};
}

impl IndexBuffer {
    pub fn init_immediate_u16<'label>(
        device: &wgpu::Device,
        content: &[u16],
        label: Option<&'label str>,
    ) -> Self {
        index_buffer_init_immediate!(device, content, label, Uint16)
    }

    pub fn init_immediate_u32<'label>(
        device: &wgpu::Device,
        content: &[u32],
        label: Option<&'label str>,
    ) -> Self {
        index_buffer_init_immediate!(device, content, label, Uint32)
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn format(&self) -> wgpu::IndexFormat {
        self.format
    }

    pub fn count(&self) -> u32 {
        (self.buffer.size() / Self::format_size(self.format) as u64) as u32
    }

    /// Return the index byte size from the index format
    #[inline(always)]
    pub fn format_size(format: wgpu::IndexFormat) -> u8 {
        match format {
            wgpu::IndexFormat::Uint16 => 2,
            wgpu::IndexFormat::Uint32 => 4,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct SceneUniform {
    view_proj: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    ambient: [f32; 4],
    directional_color: [f32; 4],
    directional_direction: [f32; 4],
    material: [f32; 4],
}

impl SceneUniform {
    fn new(state: &SceneState) -> Self {
        let ambient = state.lights.ambient;
        let directional = state.lights.directional;
        Self {
            view_proj: state.camera.view_projection_matrix().to_cols_array_2d(),
            view: state.camera.view_matrix().to_cols_array_2d(),
            ambient: (ambient.color * ambient.intensity).extend(1.0).to_array(),
            directional_color: (directional.color * directional.intensity)
                .extend(1.0)
                .to_array(),
            directional_direction: directional.direction.extend(0.0).to_array(),
            material: [state.config.sphere_opacity, 0.0, 0.0, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct InstanceRaw {
    model: [[f32; 4]; 4],
}

impl InstanceRaw {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        3 => Float32x4, 4 => Float32x4, 5 => Float32x4, 6 => Float32x4
    ];

    fn new(transform: Mat4) -> Self {
        Self {
            model: transform.to_cols_array_2d(),
        }
    }

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct LineVertex {
    position: [f32; 3],
}

impl LineVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

struct GpuModel {
    source: Arc<ModelMesh>,
    vertex_buffer: VertexBuffer,
    index_buffer: IndexBuffer,
}

/// Draws the object field, the model clones and the comet lines.
pub struct SceneRenderer {
    scene_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    targets: RenderTargets,

    sphere_pipeline: wgpu::RenderPipeline,
    sphere_vertices: VertexBuffer,
    sphere_indices: IndexBuffer,
    sphere_instances: VertexBuffer,
    sphere_count: u32,

    model_pipeline: wgpu::RenderPipeline,
    model: Option<GpuModel>,
    model_instances: VertexBuffer,
    model_count: u32,

    line_pipeline: wgpu::RenderPipeline,
    line_vertices: VertexBuffer,
    line_count: u32,
}

fn shader_module(device: &wgpu::Device, label: &str, body: &'static str) -> wgpu::ShaderModule {
    let common = include_str!("asset/shader/scene.wgsl");
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(Cow::Owned(format!("{common}\n{body}"))),
    })
}

fn attachment_descriptor(
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    label: Option<&str>,
) -> wgpu::TextureDescriptor<'_> {
    wgpu::TextureDescriptor {
        label,
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: SAMPLE_COUNT,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    }
}

/// Multisampled color and depth attachments, sized to the surface.
struct RenderTargets {
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
}

impl RenderTargets {
    fn new(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> Self {
        let color = device.create_texture(&attachment_descriptor(
            config.width,
            config.height,
            config.format,
            Some("Multisampled Color Texture"),
        ));
        let depth = device.create_texture(&attachment_descriptor(
            config.width,
            config.height,
            DEPTH_FORMAT,
            Some("Depth Texture"),
        ));
        Self {
            color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
            depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
        }
    }
}

fn multisample_state() -> wgpu::MultisampleState {
    wgpu::MultisampleState {
        count: SAMPLE_COUNT,
        mask: !0,
        alpha_to_coverage_enabled: false,
    }
}

struct PipelineSpec<'a> {
    label: &'a str,
    shader: &'a wgpu::ShaderModule,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    topology: wgpu::PrimitiveTopology,
    cull_mode: Option<wgpu::Face>,
    blend: wgpu::BlendState,
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    spec: PipelineSpec,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(spec.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: spec.shader,
            entry_point: "vs_main",
            buffers: spec.buffers,
        },
        fragment: Some(wgpu::FragmentState {
            module: spec.shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(spec.blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: spec.topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: spec.cull_mode,
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
        multisample: multisample_state(),
        multiview: None,
    })
}

impl SceneRenderer {
    pub fn new(screen: &Screen, state: &SceneState) -> Self {
        let device = &screen.device;
        let config = &state.config;

        let scene_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene Buffer"),
            contents: bytemuck::cast_slice(&[SceneUniform::new(state)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let scene_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("scene_bind_group_layout"),
            });
        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &scene_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_buffer.as_entire_binding(),
            }],
            label: Some("scene_bind_group"),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&scene_bind_group_layout],
            push_constant_ranges: &[],
        });
        let format = screen.config.format;

        let sphere_shader = shader_module(device, "Sphere Shader", include_str!("asset/shader/sphere.wgsl"));
        let sphere_pipeline = create_pipeline(
            device,
            &pipeline_layout,
            format,
            PipelineSpec {
                label: "Sphere Pipeline",
                shader: &sphere_shader,
                buffers: &[Vertex::layout(), InstanceRaw::layout()],
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                blend: wgpu::BlendState::ALPHA_BLENDING,
            },
        );

        let model_shader = shader_module(device, "Model Shader", include_str!("asset/shader/model.wgsl"));
        let model_pipeline = create_pipeline(
            device,
            &pipeline_layout,
            format,
            PipelineSpec {
                label: "Model Pipeline",
                shader: &model_shader,
                buffers: &[ModelVertex::layout(), InstanceRaw::layout()],
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                blend: wgpu::BlendState::REPLACE,
            },
        );

        let line_shader = shader_module(device, "Line Shader", include_str!("asset/shader/line.wgsl"));
        let line_pipeline = create_pipeline(
            device,
            &pipeline_layout,
            format,
            PipelineSpec {
                label: "Line Pipeline",
                shader: &line_shader,
                buffers: &[LineVertex::layout()],
                topology: wgpu::PrimitiveTopology::LineList,
                cull_mode: None,
                blend: wgpu::BlendState::REPLACE,
            },
        );

        let (width_segments, height_segments) = config.sphere_segments;
        let sphere = uv_sphere(config.sphere_radius, width_segments, height_segments);
        let sphere_vertices = VertexBuffer::init_immediate(
            device,
            bytemuck::cast_slice(&sphere.vertices),
            Some("Sphere Vertex Buffer"),
        );
        let sphere_indices =
            IndexBuffer::init_immediate_u16(device, &sphere.indices, Some("Sphere Index Buffer"));

        let instance_size = std::mem::size_of::<InstanceRaw>() as u64;
        let line_size = std::mem::size_of::<LineVertex>() as u64;

        tracing::info!(format = ?format, "renderer ready");

        Self {
            scene_buffer,
            scene_bind_group,
            targets: RenderTargets::new(device, &screen.config),
            sphere_pipeline,
            sphere_vertices,
            sphere_indices,
            sphere_instances: VertexBuffer::init(
                device,
                instance_size * config.sphere_count as u64,
                Some("Sphere Instance Buffer"),
            ),
            sphere_count: 0,
            model_pipeline,
            model: None,
            model_instances: VertexBuffer::init(
                device,
                instance_size * config.decorated_spheres as u64,
                Some("Model Instance Buffer"),
            ),
            model_count: 0,
            line_pipeline,
            line_vertices: VertexBuffer::init(
                device,
                line_size * 2 * config.comet_count as u64,
                Some("Comet Vertex Buffer"),
            ),
            line_count: 0,
        }
    }

    pub fn resize(&mut self, screen: &Screen) {
        self.targets = RenderTargets::new(&screen.device, &screen.config);
    }

    /// Copy this frame's scene state to the GPU. Clears the comets' dirty flags.
    pub fn prepare(&mut self, screen: &Screen, state: &mut SceneState) {
        let device = &screen.device;
        let queue = &screen.queue;

        queue.write_buffer(
            &self.scene_buffer,
            0,
            bytemuck::cast_slice(&[SceneUniform::new(state)]),
        );

        // Transparent spheres are drawn back to front.
        let eye = state.camera.eye;
        let forward = state.camera.forward;
        let mut order: Vec<(f32, usize)> = state
            .spheres
            .iter()
            .enumerate()
            .map(|(index, sphere)| ((sphere.position - eye).dot(forward), index))
            .collect();
        order.sort_by(|a, b| b.0.total_cmp(&a.0));
        let spheres: Vec<InstanceRaw> = order
            .iter()
            .map(|&(_, index)| InstanceRaw::new(state.spheres[index].transform()))
            .collect();
        self.sphere_instances
            .write(device, queue, bytemuck::cast_slice(&spheres));
        self.sphere_count = spheres.len() as u32;

        if let Some(model) = state.model.as_ref() {
            let stale = self
                .model
                .as_ref()
                .map_or(true, |gpu| !Arc::ptr_eq(&gpu.source, &model.mesh));
            if stale {
                self.model = Some(GpuModel {
                    source: Arc::clone(&model.mesh),
                    vertex_buffer: VertexBuffer::init_immediate(
                        device,
                        bytemuck::cast_slice(&model.mesh.vertices),
                        Some("Model Vertex Buffer"),
                    ),
                    index_buffer: IndexBuffer::init_immediate_u32(
                        device,
                        &model.mesh.indices,
                        Some("Model Index Buffer"),
                    ),
                });
            }
        }
        let models: Vec<InstanceRaw> = state
            .spheres
            .iter()
            .filter_map(|sphere| {
                let model = sphere.model.as_ref()?;
                Some(InstanceRaw::new(sphere.transform() * model.local_transform()))
            })
            .collect();
        self.model_instances
            .write(device, queue, bytemuck::cast_slice(&models));
        self.model_count = models.len() as u32;

        if state.comets.iter().any(|comet| comet.dirty) {
            let lines: Vec<LineVertex> = state
                .comets
                .iter_mut()
                .flat_map(|comet| {
                    comet.dirty = false;
                    comet.line.map(|point| LineVertex {
                        position: point.to_array(),
                    })
                })
                .collect();
            self.line_vertices
                .write(device, queue, bytemuck::cast_slice(&lines));
            self.line_count = lines.len() as u32;
        }
    }

    pub fn render(&mut self, screen: &Screen) -> Result<(), wgpu::SurfaceError> {
        let output = screen.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = screen
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.color_view,
                    resolve_target: Some(&view),
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        // Only the resolved image is presented.
                        store: false,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: true,
                    }),
                    stencil_ops: None,
                }),
            });
            render_pass.set_bind_group(0, &self.scene_bind_group, &[]);

            // Opaque first, then the transparent spheres.
            if let Some(model) = self.model.as_ref().filter(|_| self.model_count > 0) {
                render_pass.set_pipeline(&self.model_pipeline);
                render_pass.set_vertex_buffer(0, model.vertex_buffer.buffer().slice(..));
                render_pass.set_vertex_buffer(1, self.model_instances.buffer().slice(..));
                render_pass.set_index_buffer(
                    model.index_buffer.buffer().slice(..),
                    model.index_buffer.format(),
                );
                render_pass.draw_indexed(0..model.index_buffer.count(), 0, 0..self.model_count);
            }

            if self.line_count > 0 {
                render_pass.set_pipeline(&self.line_pipeline);
                render_pass.set_vertex_buffer(0, self.line_vertices.buffer().slice(..));
                render_pass.draw(0..self.line_count, 0..1);
            }

            if self.sphere_count > 0 {
                render_pass.set_pipeline(&self.sphere_pipeline);
                render_pass.set_vertex_buffer(0, self.sphere_vertices.buffer().slice(..));
                render_pass.set_vertex_buffer(1, self.sphere_instances.buffer().slice(..));
                render_pass.set_index_buffer(
                    self.sphere_indices.buffer().slice(..),
                    self.sphere_indices.format(),
                );
                render_pass.draw_indexed(0..self.sphere_indices.count(), 0, 0..self.sphere_count);
            }
        }

        screen.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
