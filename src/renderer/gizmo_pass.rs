use crate::gizmo::{GIZMO_ANCHOR_OFFSET, GIZMO_AXIS_LENGTH};
use anyhow::{Context, Result};
use glam::{Mat4, Vec3};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GizmoVertex {
    position: [f32; 3],
    color: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GizmoUniform {
    view_proj: [[f32; 4]; 4],
}

const AXIS_COLORS: [[f32; 4]; 3] = [
    [0.91, 0.28, 0.28, 1.0], // X
    [0.35, 0.82, 0.32, 1.0], // Y
    [0.3, 0.48, 0.93, 1.0],  // Z
];
const VERTEX_CAPACITY: usize = 6;

struct GizmoResources {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    vertex_buffer: wgpu::Buffer,
}

/// Axis-handle overlay for the bound object. Drawn without a depth
/// attachment so the handles stay visible through geometry.
#[derive(Default)]
pub(crate) struct GizmoPass {
    resources: Option<GizmoResources>,
}

impl GizmoPass {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_resources(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
    ) -> Result<()> {
        if self.resources.is_some() {
            return Ok(());
        }
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Gizmo Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("../../assets/shaders/gizmo_lines.wgsl").into(),
            ),
        });
        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Gizmo BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Gizmo Pipeline Layout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Gizmo Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<GizmoVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x3,
                        },
                        wgpu::VertexAttribute {
                            offset: 12,
                            shader_location: 1,
                            format: wgpu::VertexFormat::Float32x4,
                        },
                    ],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Gizmo Uniform Buffer"),
            size: std::mem::size_of::<GizmoUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Gizmo BG"),
            layout: &bgl,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: uniform_buffer.as_entire_binding() }],
        });
        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Gizmo Vertex Buffer"),
            size: (VERTEX_CAPACITY * std::mem::size_of::<GizmoVertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        self.resources = Some(GizmoResources { pipeline, uniform_buffer, bind_group, vertex_buffer });
        Ok(())
    }

    pub fn record(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        frame_view: &wgpu::TextureView,
        surface_format: wgpu::TextureFormat,
        view_proj: Mat4,
        origin: Vec3,
    ) -> Result<()> {
        self.ensure_resources(device, surface_format)?;
        let resources = self.resources.as_ref().context("Gizmo resources missing")?;

        queue.write_buffer(
            &resources.uniform_buffer,
            0,
            bytemuck::bytes_of(&GizmoUniform { view_proj: view_proj.to_cols_array_2d() }),
        );

        let anchor = origin + GIZMO_ANCHOR_OFFSET;
        let mut vertices = [GizmoVertex { position: [0.0; 3], color: [0.0; 4] }; VERTEX_CAPACITY];
        let axes = [Vec3::X, Vec3::Y, Vec3::Z];
        for (axis_index, axis) in axes.iter().enumerate() {
            let tip = anchor + *axis * GIZMO_AXIS_LENGTH;
            vertices[axis_index * 2] =
                GizmoVertex { position: anchor.to_array(), color: AXIS_COLORS[axis_index] };
            vertices[axis_index * 2 + 1] =
                GizmoVertex { position: tip.to_array(), color: AXIS_COLORS[axis_index] };
        }
        queue.write_buffer(&resources.vertex_buffer, 0, bytemuck::cast_slice(&vertices));

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Gizmo Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: frame_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(&resources.pipeline);
        pass.set_bind_group(0, &resources.bind_group, &[]);
        pass.set_vertex_buffer(0, resources.vertex_buffer.slice(..));
        pass.draw(0..VERTEX_CAPACITY as u32, 0..1);
        Ok(())
    }
}
