use anyhow::{Context, Result};
use glam::Mat4;

use super::{GpuMesh, DEPTH_FORMAT};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ShadowFrameUniform {
    view_proj: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ShadowDrawUniform {
    model: [[f32; 4]; 4],
}

struct ShadowResources {
    pipeline: wgpu::RenderPipeline,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    draw_bgl: wgpu::BindGroupLayout,
}

/// Depth-only pass over shadow casters, rendered from the directional
/// light's fixed orthographic frustum into a single map.
#[derive(Default)]
pub(crate) struct ShadowPass {
    resources: Option<ShadowResources>,
    map_texture: Option<wgpu::Texture>,
    map_view: Option<wgpu::TextureView>,
    sampler: Option<wgpu::Sampler>,
    // One uniform buffer per caster; reused across frames.
    draw_slots: Vec<(wgpu::Buffer, wgpu::BindGroup)>,
    resolution: u32,
}

impl ShadowPass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_view(&self) -> Result<&wgpu::TextureView> {
        self.map_view.as_ref().context("Shadow map missing")
    }

    pub fn comparison_sampler(&self) -> Result<&wgpu::Sampler> {
        self.sampler.as_ref().context("Shadow sampler missing")
    }

    pub fn ensure_resources(&mut self, device: &wgpu::Device, resolution: u32) -> Result<()> {
        if self.resources.is_none() {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Shadow Shader"),
                source: wgpu::ShaderSource::Wgsl(
                    include_str!("../../assets/shaders/shadow_depth.wgsl").into(),
                ),
            });

            let uniform_bgl_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            };
            let frame_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Shadow Frame BGL"),
                entries: &[uniform_bgl_entry(0)],
            });
            let draw_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Shadow Draw BGL"),
                entries: &[uniform_bgl_entry(0)],
            });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Shadow Pipeline Layout"),
                bind_group_layouts: &[&frame_bgl, &draw_bgl],
                push_constant_ranges: &[],
            });
            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Shadow Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[crate::mesh::MeshVertex::layout()],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: None,
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: Some(wgpu::Face::Back),
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState { constant: 2, slope_scale: 2.0, clamp: 0.0 },
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

            let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Shadow Frame Buffer"),
                size: std::mem::size_of::<ShadowFrameUniform>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Shadow Frame BG"),
                layout: &frame_bgl,
                entries: &[wgpu::BindGroupEntry { binding: 0, resource: frame_buffer.as_entire_binding() }],
            });

            self.resources =
                Some(ShadowResources { pipeline, frame_buffer, frame_bind_group, draw_bgl });
        }

        let resolution = resolution.clamp(256, 4096);
        if self.map_texture.is_none() || self.resolution != resolution {
            self.resolution = resolution;
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Shadow Map"),
                size: wgpu::Extent3d { width: resolution, height: resolution, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            self.map_view = Some(texture.create_view(&wgpu::TextureViewDescriptor::default()));
            self.map_texture = Some(texture);
        }

        if self.sampler.is_none() {
            // Linear comparison filtering gives the soft-edged look for free.
            self.sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("Shadow Sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                mipmap_filter: wgpu::FilterMode::Nearest,
                compare: Some(wgpu::CompareFunction::LessEqual),
                ..Default::default()
            }));
        }
        Ok(())
    }

    pub fn record(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        casters: &[(Mat4, &GpuMesh)],
        shadow_view_proj: Mat4,
    ) -> Result<()> {
        let resources = self.resources.as_ref().context("Shadow resources missing")?;
        let map_view = self.map_view.as_ref().context("Shadow map missing")?;

        queue.write_buffer(
            &resources.frame_buffer,
            0,
            bytemuck::bytes_of(&ShadowFrameUniform { view_proj: shadow_view_proj.to_cols_array_2d() }),
        );

        while self.draw_slots.len() < casters.len() {
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Shadow Draw Buffer"),
                size: std::mem::size_of::<ShadowDrawUniform>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Shadow Draw BG"),
                layout: &resources.draw_bgl,
                entries: &[wgpu::BindGroupEntry { binding: 0, resource: buffer.as_entire_binding() }],
            });
            self.draw_slots.push((buffer, bind_group));
        }
        for ((buffer, _), (model, _)) in self.draw_slots.iter().zip(casters) {
            queue.write_buffer(
                buffer,
                0,
                bytemuck::bytes_of(&ShadowDrawUniform { model: model.to_cols_array_2d() }),
            );
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: map_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(&resources.pipeline);
        pass.set_bind_group(0, &resources.frame_bind_group, &[]);
        for ((_, bind_group), (_, mesh)) in self.draw_slots.iter().zip(casters) {
            pass.set_bind_group(1, bind_group, &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
        Ok(())
    }
}
