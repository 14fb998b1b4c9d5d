use crate::material_registry::MaterialRegistry;
use crate::mesh::{AssetImport, Mesh};
use crate::scene::{ScenePlan, GROUND_SIZE};
use anyhow::Result;
use egui_wgpu::{Renderer as EguiRenderer, ScreenDescriptor};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::Window;

pub(crate) mod egui_pass;
pub(crate) mod gizmo_pass;
pub(crate) mod mesh_pass;
pub(crate) mod shadow_pass;
pub(crate) mod window_surface;

use gizmo_pass::GizmoPass;
use mesh_pass::MeshPass;
use shadow_pass::ShadowPass;
use window_surface::WindowSurface;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl GpuMesh {
    pub fn upload(device: &wgpu::Device, mesh: &Mesh, label: &str) -> Self {
        use wgpu::util::DeviceExt;
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} VB")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} IB")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self { vertex_buffer, index_buffer, index_count: mesh.indices.len() as u32 }
    }
}

/// Inputs the egui overlay pass needs from the app for one frame.
pub struct EguiFrameInput<'a> {
    pub painter: &'a mut EguiRenderer,
    pub paint_jobs: &'a [egui::ClippedPrimitive],
    pub textures_delta: &'a egui::TexturesDelta,
    pub screen: &'a ScreenDescriptor,
}

/// Owns the GPU surface and the fixed pass pipeline: shadow depth, lit
/// meshes + shadow-catching ground, gizmo overlay, egui overlay.
pub struct Renderer {
    surface: WindowSurface,
    shadow: ShadowPass,
    meshes: MeshPass,
    gizmo: GizmoPass,
    node_meshes: Vec<GpuMesh>,
    ground_mesh: Option<GpuMesh>,
    shadow_resolution: u32,
}

impl Renderer {
    pub fn new(window_cfg: &crate::config::WindowConfig, shadow_resolution: u32) -> Self {
        Self {
            surface: WindowSurface::new(window_cfg),
            shadow: ShadowPass::new(),
            meshes: MeshPass::new(),
            gizmo: GizmoPass::new(),
            node_meshes: Vec::new(),
            ground_mesh: None,
            shadow_resolution: shadow_resolution.clamp(256, 4096),
        }
    }

    pub fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        self.surface.ensure_window(event_loop)?;
        if self.ground_mesh.is_none() {
            let device = self.surface.device()?;
            self.ground_mesh = Some(GpuMesh::upload(device, &Mesh::plane(GROUND_SIZE), "Ground"));
        }
        Ok(())
    }

    pub fn device(&self) -> Result<&wgpu::Device> {
        self.surface.device()
    }

    pub fn queue(&self) -> Result<&wgpu::Queue> {
        self.surface.queue()
    }

    pub fn surface_format(&self) -> Result<wgpu::TextureFormat> {
        self.surface.surface_format()
    }

    pub fn window(&self) -> Option<&Window> {
        self.surface.window()
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.surface.size()
    }

    pub fn pixels_per_point(&self) -> f32 {
        self.surface.pixels_per_point()
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.surface.resize(new_size);
    }

    pub fn has_asset(&self) -> bool {
        !self.node_meshes.is_empty()
    }

    /// Uploads one vertex/index buffer pair per imported node, in node order
    /// so `SceneDrawItem::node` indexes straight into the list.
    pub fn upload_asset(&mut self, import: &AssetImport) -> Result<()> {
        let device = self.surface.device()?;
        self.node_meshes = import
            .nodes
            .iter()
            .map(|node| GpuMesh::upload(device, &node.mesh, &node.name))
            .collect();
        Ok(())
    }

    pub fn render_frame(
        &mut self,
        plan: &ScenePlan,
        registry: &mut MaterialRegistry,
        egui_frame: Option<EguiFrameInput<'_>>,
    ) -> Result<()> {
        self.surface.ensure_depth_texture()?;
        let frame = self.surface.acquire_surface_frame()?;
        let viewport = self.surface.size();
        {
            let device = self.surface.device()?;
            let queue = self.surface.queue()?;

            self.shadow.ensure_resources(device, self.shadow_resolution)?;
            self.meshes.ensure_resources(
                device,
                self.surface.surface_format()?,
                self.shadow.map_view()?,
                self.shadow.comparison_sampler()?,
            )?;

            let mut encoder = device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Scene Encoder") });

            let casters: Vec<(glam::Mat4, &GpuMesh)> = plan
                .draws
                .iter()
                .filter(|draw| draw.cast_shadow)
                .filter_map(|draw| self.node_meshes.get(draw.node).map(|mesh| (draw.model, mesh)))
                .collect();
            self.shadow.record(&mut encoder, device, queue, &casters, plan.lighting.shadow_view_proj)?;

            self.meshes.record(mesh_pass::MeshPassParams {
                encoder: &mut encoder,
                device,
                queue,
                frame_view: frame.view(),
                depth_view: self.surface.depth_view()?,
                viewport,
                plan,
                registry,
                node_meshes: &self.node_meshes,
                ground_mesh: self.ground_mesh.as_ref(),
                shadow_resolution: self.shadow_resolution,
            })?;

            if let Some(gizmo) = &plan.gizmo {
                self.gizmo.record(
                    &mut encoder,
                    device,
                    queue,
                    frame.view(),
                    self.surface.surface_format()?,
                    plan.camera.view_projection(viewport),
                    gizmo.origin,
                )?;
            }

            queue.submit(std::iter::once(encoder.finish()));

            if let Some(egui_frame) = egui_frame {
                egui_pass::render(device, queue, frame.view(), egui_frame)?;
            }
        }
        frame.present();
        Ok(())
    }
}
