use crate::assets::AssetLoader;
use crate::camera_rig::CameraRig;
use crate::config::{AppConfig, AppConfigOverrides};
use crate::events::{ControlBus, ControlEvent};
use crate::gizmo::{self, GizmoDrag, GIZMO_ANCHOR_OFFSET, GIZMO_GRAB_RADIUS_PX};
use crate::input::{Input, InputEvent};
use crate::interaction::{InteractionController, InteractionMode};
use crate::material_registry::MaterialRegistry;
use crate::materializer;
use crate::renderer::{EguiFrameInput, Renderer};
use crate::scene::{SceneWorld, Transform3D};
use crate::time::FrameClock;
use anyhow::{Context, Result};
use glam::Vec2;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};

use egui::Context as EguiCtx;
use egui_wgpu::{Renderer as EguiRenderer, RendererOptions, ScreenDescriptor};
use egui_winit::State as EguiWinit;

pub(crate) mod control_panel;

const CONFIG_PATH: &str = "config/app.json";

pub fn run() -> Result<()> {
    run_with_overrides(AppConfigOverrides::default())
}

pub fn run_with_overrides(overrides: AppConfigOverrides) -> Result<()> {
    let mut config = AppConfig::load_or_default(CONFIG_PATH);
    config.apply_overrides(&overrides);
    let event_loop = EventLoop::new().context("Failed to create winit event loop")?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app).context("Event loop execution failed")?;
    Ok(())
}

pub struct App {
    renderer: Renderer,
    input: Input,
    clock: FrameClock,
    should_close: bool,

    // egui
    egui_ctx: EguiCtx,
    egui_winit: Option<EguiWinit>,
    egui_renderer: Option<EguiRenderer>,
    egui_screen: Option<ScreenDescriptor>,

    // Scene and controllers
    scene: SceneWorld,
    rig: CameraRig,
    interaction: InteractionController,
    registry: MaterialRegistry,
    loader: AssetLoader,
    node_count: usize,

    panel: control_panel::PanelState,
    control_bus: ControlBus,
    gizmo_drag: Option<GizmoDrag>,

    config: AppConfig,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let renderer = Renderer::new(&config.window, config.shadow.resolution);
        let rig = CameraRig::new(&config.camera);
        let loader = AssetLoader::spawn(config.asset.path.clone());
        let panel = control_panel::PanelState {
            attach: false,
            min_distance: config.camera.min_distance,
        };
        Self {
            renderer,
            input: Input::new(),
            clock: FrameClock::new(),
            should_close: false,
            egui_ctx: EguiCtx::default(),
            egui_winit: None,
            egui_renderer: None,
            egui_screen: None,
            scene: SceneWorld::new(),
            rig,
            interaction: InteractionController::new(),
            registry: MaterialRegistry::new(),
            loader,
            node_count: 0,
            panel,
            control_bus: ControlBus::default(),
            gizmo_drag: None,
            config,
        }
    }

    /// The asset-load promise resolving: materialize, upload, spawn, and hand
    /// the root to the interaction controller as the gizmo subject.
    fn poll_asset(&mut self) {
        let Some(mut import) = self.loader.poll() else {
            return;
        };
        materializer::materialize(&mut import, &mut self.registry, &self.config.asset.overrides);
        if let Err(err) = self.renderer.upload_asset(&import) {
            log::error!("asset upload failed: {err:?}");
            return;
        }
        let root = self.scene.spawn_asset(&import);
        self.interaction.set_subject(Some(root));
        self.node_count = import.nodes.len();
        log::info!(
            "materialized '{}' with {} mesh nodes",
            self.loader.path().display(),
            self.node_count
        );
    }

    fn apply_control_events(&mut self) {
        for event in self.control_bus.drain() {
            log::debug!("control event: {event}");
            match event {
                ControlEvent::SetAttach(attach) => {
                    self.interaction.set_editing(attach, &mut self.rig);
                }
                ControlEvent::SetMinDistance(distance) => self.rig.set_min_distance(distance),
                ControlEvent::ZoomIn => self.rig.zoom_in(),
                ControlEvent::ZoomOut => self.rig.zoom_out(),
            }
        }
    }

    /// Routes pointer input to exactly one controller per the current mode.
    /// The rig additionally gates on its own enabled flag, so even a stray
    /// call while editing cannot move the camera.
    fn update_pointer(&mut self, viewport: PhysicalSize<u32>) {
        if self.input.take_mode_toggle() {
            let mode = self.interaction.toggle_mode(&mut self.rig);
            self.panel.attach = mode == InteractionMode::Editing;
        }

        let cursor = self.input.cursor_position().map(|(x, y)| Vec2::new(x, y));
        let camera = self.rig.camera();

        if self.interaction.mode() == InteractionMode::Editing {
            let binding = self.interaction.binding();
            let origin = binding
                .and_then(|entity| self.scene.world().get::<Transform3D>(entity))
                .map(|transform| transform.translation);

            if self.input.take_left_click() {
                if let (Some(entity), Some(origin), Some(cursor)) = (binding, origin, cursor) {
                    let anchor = origin + GIZMO_ANCHOR_OFFSET;
                    let near_handle = camera
                        .world_to_pixel(anchor, viewport)
                        .is_some_and(|pixel| pixel.distance(cursor) <= GIZMO_GRAB_RADIUS_PX);
                    if near_handle {
                        self.gizmo_drag = camera
                            .pixel_ray(cursor, viewport)
                            .and_then(|ray| gizmo::begin_drag(entity, origin, -camera.forward(), ray));
                    }
                }
            }
            if self.input.take_left_release() {
                self.gizmo_drag = None;
            }
            if let (Some(drag), Some(cursor)) = (self.gizmo_drag, cursor) {
                if self.input.left_held() {
                    if let Some(position) = camera
                        .pixel_ray(cursor, viewport)
                        .and_then(|ray| gizmo::drag_position(&drag, ray))
                    {
                        if let Some(mut transform) =
                            self.scene.world_mut().get_mut::<Transform3D>(drag.entity)
                        {
                            transform.translation = position;
                        }
                    }
                }
            }
        } else {
            self.gizmo_drag = None;
            if let Some(delta) = self.input.consume_wheel_delta() {
                self.rig.dolly_scroll(delta);
            }
            let (dx, dy) = self.input.mouse_delta;
            if dx.abs() > f32::EPSILON || dy.abs() > f32::EPSILON {
                if self.input.left_held() {
                    self.rig.orbit(Vec2::new(dx, dy));
                } else if self.input.right_held() {
                    self.rig.pan(Vec2::new(dx, dy), viewport);
                }
            }
        }
    }

    fn render(&mut self) {
        let viewport = self.renderer.size();
        let plan = self.scene.compose(&self.interaction, &self.rig);

        let egui_output = if let (Some(egui_winit), Some(window)) =
            (self.egui_winit.as_mut(), self.renderer.window())
        {
            let raw_input = egui_winit.take_egui_input(window);
            let status = control_panel::PanelStatus {
                mode: self.interaction.mode(),
                camera_distance: self.rig.distance(),
                zoom_factor: self.rig.zoom_factor(),
                asset_name: self.loader.path().display().to_string(),
                asset_state: self.loader.state(),
                node_count: self.node_count,
            };
            let ctx = self.egui_ctx.clone();
            let panel = &mut self.panel;
            let bus = &mut self.control_bus;
            let full_output =
                ctx.run(raw_input, |ctx| control_panel::show(ctx, panel, &status, bus));
            Some(full_output)
        } else {
            None
        };

        let egui_frame = match (egui_output, self.egui_renderer.as_mut(), self.egui_screen.as_ref()) {
            (Some(full_output), Some(painter), Some(screen)) => {
                let egui::FullOutput { platform_output, textures_delta, shapes, .. } = full_output;
                if let (Some(egui_winit), Some(window)) =
                    (self.egui_winit.as_mut(), self.renderer.window())
                {
                    egui_winit.handle_platform_output(window, platform_output);
                }
                let paint_jobs = self.egui_ctx.tessellate(shapes, screen.pixels_per_point);
                Some((painter, paint_jobs, textures_delta, screen))
            }
            _ => None,
        };

        let result = match egui_frame {
            Some((painter, paint_jobs, textures_delta, screen)) => self.renderer.render_frame(
                &plan,
                &mut self.registry,
                Some(EguiFrameInput {
                    painter,
                    paint_jobs: &paint_jobs,
                    textures_delta: &textures_delta,
                    screen,
                }),
            ),
            None => self.renderer.render_frame(&plan, &mut self.registry, None),
        };
        if let Err(err) = result {
            log::warn!("render error: {err:?}");
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Err(err) = self.renderer.ensure_window(event_loop) {
            log::error!("renderer initialization failed: {err:?}");
            self.should_close = true;
            return;
        }

        if self.egui_winit.is_none() {
            if let Some(window) = self.renderer.window() {
                self.egui_winit = Some(EguiWinit::new(
                    self.egui_ctx.clone(),
                    egui::ViewportId::ROOT,
                    window,
                    Some(self.renderer.pixels_per_point()),
                    window.theme(),
                    None,
                ));
            }
        }
        match (self.renderer.device(), self.renderer.surface_format()) {
            (Ok(device), Ok(format)) => {
                self.egui_renderer = Some(EguiRenderer::new(device, format, RendererOptions::default()));
            }
            (Err(err), _) | (_, Err(err)) => {
                log::error!("egui renderer initialization failed: {err:?}");
                self.should_close = true;
                return;
            }
        }
        let size = self.renderer.size();
        self.egui_screen = Some(ScreenDescriptor {
            size_in_pixels: [size.width, size.height],
            pixels_per_point: self.renderer.pixels_per_point(),
        });
    }

    fn window_event(&mut self, _el: &ActiveEventLoop, id: winit::window::WindowId, event: WindowEvent) {
        let mut consumed = false;
        let input_event = InputEvent::from_window_event(&event);
        let is_cursor_event = matches!(&input_event, InputEvent::CursorPos { .. });
        if let (Some(window), Some(state)) = (self.renderer.window(), self.egui_winit.as_mut()) {
            if id == window.id() {
                let response = state.on_window_event(window, &event);
                consumed = response.consumed;
            }
        }
        // egui swallows pointer events over the panel; cursor position still
        // flows so a drag released over the panel does not stick.
        if !consumed || is_cursor_event {
            self.input.push(input_event);
        }
        if consumed {
            return;
        }

        match &event {
            WindowEvent::CloseRequested => self.should_close = true,
            WindowEvent::Resized(size) => {
                self.renderer.resize(*size);
                if let Some(screen) = &mut self.egui_screen {
                    screen.size_in_pixels = [size.width, size.height];
                }
            }
            WindowEvent::KeyboardInput { event: KeyEvent { logical_key, state, .. }, .. } => {
                if let Key::Named(NamedKey::Escape) = logical_key {
                    if *state == ElementState::Pressed {
                        self.should_close = true;
                    }
                }
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _el: &ActiveEventLoop, _dev: winit::event::DeviceId, ev: DeviceEvent) {
        self.input.push(InputEvent::from_device_event(&ev));
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_close {
            event_loop.exit();
            return;
        }
        let dt = self.clock.tick();

        self.poll_asset();
        self.apply_control_events();
        self.update_pointer(self.renderer.size());
        self.rig.advance(dt);
        self.render();

        self.input.clear_frame();
        if let Some(window) = self.renderer.window() {
            window.request_redraw();
        }
    }
}
