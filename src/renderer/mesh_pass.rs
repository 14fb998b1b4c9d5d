use crate::material_registry::{self, MaterialGpu, MaterialRegistry};
use crate::scene::ScenePlan;
use anyhow::{Context, Result};
use std::sync::Arc;
use winit::dpi::PhysicalSize;

use super::{GpuMesh, DEPTH_FORMAT};

const CLEAR_COLOR: wgpu::Color = wgpu::Color { r: 0.74, g: 0.76, b: 0.78, a: 1.0 };

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct MeshFrameUniform {
    view_proj: [[f32; 4]; 4],
    shadow_view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 4],
    sun: [f32; 4],     // xyz direction toward the light, w intensity
    ambient: [f32; 4], // x ambient intensity, y shadow texel size
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct MeshDrawUniform {
    model: [[f32; 4]; 4],
    flags: [f32; 4], // x receive_shadow
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GroundUniform {
    model: [[f32; 4]; 4],
    params: [f32; 4], // x shadow opacity
}

struct MeshPassResources {
    surface_pipeline: wgpu::RenderPipeline,
    ground_pipeline: wgpu::RenderPipeline,
    material_bgl: wgpu::BindGroupLayout,
    draw_bgl: wgpu::BindGroupLayout,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    ground_buffer: wgpu::Buffer,
    ground_bind_group: wgpu::BindGroup,
}

pub(crate) struct MeshPassParams<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub frame_view: &'a wgpu::TextureView,
    pub depth_view: &'a wgpu::TextureView,
    pub viewport: PhysicalSize<u32>,
    pub plan: &'a ScenePlan,
    pub registry: &'a mut MaterialRegistry,
    pub node_meshes: &'a [GpuMesh],
    pub ground_mesh: Option<&'a GpuMesh>,
    pub shadow_resolution: u32,
}

/// Forward pass: lit asset nodes first, then the transparent shadow-catching
/// ground so its blend composes over them.
#[derive(Default)]
pub(crate) struct MeshPass {
    resources: Option<MeshPassResources>,
    draw_slots: Vec<(wgpu::Buffer, wgpu::BindGroup)>,
}

impl MeshPass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure_resources(
        &mut self,
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        shadow_view: &wgpu::TextureView,
        shadow_sampler: &wgpu::Sampler,
    ) -> Result<()> {
        if self.resources.is_some() {
            return Ok(());
        }

        let surface_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh Surface Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("../../assets/shaders/mesh_surface.wgsl").into(),
            ),
        });
        let ground_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Ground Shadow Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("../../assets/shaders/ground_shadow.wgsl").into(),
            ),
        });

        let frame_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Mesh Frame BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Depth,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });
        let draw_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Mesh Draw BGL"),
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
        });
        let material_bgl = material_registry::material_bind_group_layout(device);

        let surface_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&frame_bgl, &material_bgl, &draw_bgl],
            push_constant_ranges: &[],
        });
        let surface_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Mesh Pipeline"),
            layout: Some(&surface_layout),
            vertex: wgpu::VertexState {
                module: &surface_shader,
                entry_point: Some("vs_main"),
                buffers: &[crate::mesh::MeshVertex::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &surface_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
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
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let ground_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Ground Pipeline Layout"),
            bind_group_layouts: &[&frame_bgl, &draw_bgl],
            push_constant_ranges: &[],
        });
        let ground_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Ground Pipeline"),
            layout: Some(&ground_layout),
            vertex: wgpu::VertexState {
                module: &ground_shader,
                entry_point: Some("vs_main"),
                buffers: &[crate::mesh::MeshVertex::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &ground_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Mesh Frame Buffer"),
            size: std::mem::size_of::<MeshFrameUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Mesh Frame BG"),
            layout: &frame_bgl,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: frame_buffer.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(shadow_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(shadow_sampler),
                },
            ],
        });

        let ground_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Ground Draw Buffer"),
            size: std::mem::size_of::<GroundUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let ground_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Ground Draw BG"),
            layout: &draw_bgl,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: ground_buffer.as_entire_binding() }],
        });

        self.resources = Some(MeshPassResources {
            surface_pipeline,
            ground_pipeline,
            material_bgl,
            draw_bgl,
            frame_buffer,
            frame_bind_group,
            ground_buffer,
            ground_bind_group,
        });
        Ok(())
    }

    pub fn record(&mut self, params: MeshPassParams<'_>) -> Result<()> {
        let resources = self.resources.as_ref().context("Mesh pass resources missing")?;
        let plan = params.plan;

        // Material bind groups come first: the registry may rebuild GPU state
        // invalidated by an override.
        let mut materials: Vec<Arc<MaterialGpu>> = Vec::with_capacity(plan.draws.len());
        for draw in &plan.draws {
            let name = draw
                .material
                .as_deref()
                .filter(|name| params.registry.has(name))
                .unwrap_or_else(|| params.registry.default_key())
                .to_string();
            materials.push(params.registry.prepare_gpu(
                &name,
                params.device,
                params.queue,
                &resources.material_bgl,
            )?);
        }

        let camera = &plan.camera;
        let sun_dir = plan.lighting.sun_position.normalize_or_zero();
        let frame_uniform = MeshFrameUniform {
            view_proj: camera.view_projection(params.viewport).to_cols_array_2d(),
            shadow_view_proj: plan.lighting.shadow_view_proj.to_cols_array_2d(),
            camera_pos: camera.position.extend(1.0).to_array(),
            sun: [sun_dir.x, sun_dir.y, sun_dir.z, plan.lighting.sun_intensity],
            ambient: [
                plan.lighting.ambient_intensity,
                1.0 / params.shadow_resolution.max(1) as f32,
                0.0,
                0.0,
            ],
        };
        params.queue.write_buffer(&resources.frame_buffer, 0, bytemuck::bytes_of(&frame_uniform));

        while self.draw_slots.len() < plan.draws.len() {
            let buffer = params.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Mesh Draw Buffer"),
                size: std::mem::size_of::<MeshDrawUniform>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = params.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Mesh Draw BG"),
                layout: &resources.draw_bgl,
                entries: &[wgpu::BindGroupEntry { binding: 0, resource: buffer.as_entire_binding() }],
            });
            self.draw_slots.push((buffer, bind_group));
        }
        for ((buffer, _), draw) in self.draw_slots.iter().zip(&plan.draws) {
            let uniform = MeshDrawUniform {
                model: draw.model.to_cols_array_2d(),
                flags: [draw.receive_shadow as u32 as f32, 0.0, 0.0, 0.0],
            };
            params.queue.write_buffer(buffer, 0, bytemuck::bytes_of(&uniform));
        }

        let ground_uniform = GroundUniform {
            model: plan.ground.model.to_cols_array_2d(),
            params: [plan.ground.opacity, 0.0, 0.0, 0.0],
        };
        params.queue.write_buffer(&resources.ground_buffer, 0, bytemuck::bytes_of(&ground_uniform));

        let mut pass = params.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Mesh Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: params.frame_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: params.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        pass.set_pipeline(&resources.surface_pipeline);
        pass.set_bind_group(0, &resources.frame_bind_group, &[]);
        for (index, draw) in plan.draws.iter().enumerate() {
            let Some(mesh) = params.node_meshes.get(draw.node) else {
                continue;
            };
            pass.set_bind_group(1, materials[index].bind_group(), &[]);
            pass.set_bind_group(2, &self.draw_slots[index].1, &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }

        if let Some(ground) = params.ground_mesh {
            pass.set_pipeline(&resources.ground_pipeline);
            pass.set_bind_group(0, &resources.frame_bind_group, &[]);
            pass.set_bind_group(1, &resources.ground_bind_group, &[]);
            pass.set_vertex_buffer(0, ground.vertex_buffer.slice(..));
            pass.set_index_buffer(ground.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..ground.index_count, 0, 0..1);
        }

        Ok(())
    }
}
