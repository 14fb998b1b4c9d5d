use crate::config::WindowConfig;
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Fullscreen, Window};

use super::DEPTH_FORMAT;

pub struct SurfaceFrame {
    view: wgpu::TextureView,
    surface: wgpu::SurfaceTexture,
}

impl SurfaceFrame {
    fn new(surface: wgpu::SurfaceTexture) -> Self {
        let view = surface.texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { view, surface }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn present(self) {
        self.surface.present();
    }
}

/// Window, surface, device, and the depth buffer that tracks surface size.
pub struct WindowSurface {
    surface: Option<wgpu::Surface<'static>>,
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    config: Option<wgpu::SurfaceConfiguration>,
    size: PhysicalSize<u32>,
    window: Option<Arc<Window>>,
    title: String,
    vsync: bool,
    fullscreen: bool,
    depth_texture: Option<wgpu::Texture>,
    depth_view: Option<wgpu::TextureView>,
}

impl WindowSurface {
    pub fn new(window_cfg: &WindowConfig) -> Self {
        Self {
            surface: None,
            device: None,
            queue: None,
            config: None,
            size: PhysicalSize::new(window_cfg.width.max(1), window_cfg.height.max(1)),
            window: None,
            title: window_cfg.title.clone(),
            vsync: window_cfg.vsync,
            fullscreen: window_cfg.fullscreen,
            depth_texture: None,
            depth_view: None,
        }
    }

    pub fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        if self.window.is_some() {
            return Ok(());
        }
        let mut attrs =
            Window::default_attributes().with_title(self.title.clone()).with_inner_size(self.size);
        if self.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let window = Arc::new(event_loop.create_window(attrs).context("Failed to create window")?);
        pollster::block_on(self.init_wgpu(&window))?;
        let inner = window.inner_size();
        if inner.width > 0 && inner.height > 0 && inner != self.size {
            self.resize(inner);
        }
        self.window = Some(window);
        self.recreate_depth_texture()
    }

    async fn init_wgpu(&mut self, window: &Arc<Window>) -> Result<()> {
        let instance = wgpu::Instance::default();
        let surface =
            instance.create_surface(window.clone()).context("Failed to create render surface")?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|err| anyhow!("No suitable GPU adapter: {err}"))?;
        let required_limits = wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits());
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features: wgpu::Features::empty(),
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
            })
            .await
            .context("Failed to create GPU device")?;

        let caps = surface.get_capabilities(&adapter);
        let format =
            caps.formats.iter().copied().find(|f| f.is_srgb()).unwrap_or(caps.formats[0]);
        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if self.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        self.surface = Some(surface);
        self.device = Some(device);
        self.queue = Some(queue);
        self.config = Some(config);
        Ok(())
    }

    pub fn device(&self) -> Result<&wgpu::Device> {
        self.device.as_ref().context("GPU device not initialized")
    }

    pub fn queue(&self) -> Result<&wgpu::Queue> {
        self.queue.as_ref().context("GPU queue not initialized")
    }

    pub fn depth_view(&self) -> Result<&wgpu::TextureView> {
        self.depth_view.as_ref().context("Depth texture missing")
    }

    pub fn surface_format(&self) -> Result<wgpu::TextureFormat> {
        Ok(self.config.as_ref().context("Surface configuration missing")?.format)
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn pixels_per_point(&self) -> f32 {
        1.0
    }

    pub fn window(&self) -> Option<&Window> {
        self.window.as_deref()
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        if let (Some(surface), Some(device), Some(config)) =
            (&self.surface, &self.device, self.config.as_mut())
        {
            config.width = new_size.width;
            config.height = new_size.height;
            surface.configure(device, config);
        }
        if let Err(err) = self.recreate_depth_texture() {
            log::warn!("depth texture resize failed: {err:?}");
        }
    }

    pub fn ensure_depth_texture(&mut self) -> Result<()> {
        if self.depth_texture.is_some() {
            return Ok(());
        }
        self.recreate_depth_texture()
    }

    pub fn acquire_surface_frame(&mut self) -> Result<SurfaceFrame> {
        let surface = self.surface.as_ref().context("Surface not initialized")?;
        match surface.get_current_texture() {
            Ok(frame) => Ok(SurfaceFrame::new(frame)),
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                if let (Some(device), Some(config)) = (&self.device, &self.config) {
                    surface.configure(device, config);
                }
                Err(anyhow!("Surface needs reconfiguration: {err:?}"))
            }
            Err(err) => Err(anyhow!("Failed to acquire surface frame: {err:?}")),
        }
    }

    fn recreate_depth_texture(&mut self) -> Result<()> {
        let device = self.device()?;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width: self.size.width.max(1),
                height: self.size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.depth_texture = Some(texture);
        self.depth_view = Some(view);
        Ok(())
    }
}
