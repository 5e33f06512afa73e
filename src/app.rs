//! winit front end: owns the window, the renderer and all application state,
//! and routes host events into the panel, the controls and the frame loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use glam::Vec2;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{ElementState, MouseScrollDelta, Touch, TouchPhase, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoopProxy};
use winit::window::{Window, WindowId};

use crate::context::WaterContext;
use crate::frame::{FrameLoop, FrameScheduler, MonotonicClock};
use crate::input::{map_winit_key, PointerTracker};
use crate::overlay::OverlayInput;
use crate::panel::{PanelNavigator, TuningPanel};
use crate::preset::{Preset, PresetError};
use crate::render::{GpuRenderer, RenderTarget};
use crate::scene::RenderSettings;
use crate::viewport::{handle_resize, HostViewport};

pub const WINDOW_TITLE: &str = "Raging Sea";

/// Events delivered to the event loop from outside winit.
pub enum AppEvent {
    /// Renderer finished asynchronous initialization.
    RendererReady(Box<GpuRenderer>),
    RendererFailed(anyhow::Error),
    Panel(PanelCommand),
}

/// Panel edit issued by the host page or another embedder.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelCommand {
    SetNumber { label: String, value: f32 },
    SetColor { label: String, hex: String },
    Toggle,
    ApplyPreset(String),
}

impl PanelCommand {
    pub fn apply(&self, panel: &mut TuningPanel, ctx: &mut WaterContext) -> Result<()> {
        match self {
            Self::SetNumber { label, value } => {
                panel.set_number(ctx, label, *value)?;
            }
            Self::SetColor { label, hex } => {
                panel.set_color(ctx, label, hex)?;
            }
            Self::Toggle => {
                panel.toggle();
            }
            Self::ApplyPreset(xml) => {
                Preset::from_xml(xml)?.apply(panel, ctx)?;
            }
        }
        Ok(())
    }
}

pub struct WaterApp {
    context: WaterContext,
    panel: TuningPanel,
    navigator: PanelNavigator,
    frames: FrameLoop<MonotonicClock>,
    pointer: PointerTracker,
    window: Option<Arc<Window>>,
    overlay: Option<OverlayInput>,
    renderer: Option<GpuRenderer>,
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    proxy: EventLoopProxy<AppEvent>,
    last_error: Option<anyhow::Error>,
}

impl WaterApp {
    /// Assembles the scene against `host` and registers the panel.
    pub fn new(proxy: EventLoopProxy<AppEvent>, host: &impl HostViewport) -> Result<Self> {
        let mut context = WaterContext::assemble(host).context("failed to assemble the scene")?;
        let panel = TuningPanel::water(&mut context).context("failed to build the tuning panel")?;
        Ok(Self {
            context,
            panel,
            navigator: PanelNavigator::new(),
            frames: FrameLoop::new(MonotonicClock::new()),
            pointer: PointerTracker::new(),
            window: None,
            overlay: None,
            renderer: None,
            proxy,
            last_error: None,
        })
    }

    pub fn apply_preset(&mut self, preset: &Preset) -> Result<usize, PresetError> {
        preset.apply(&self.panel, &mut self.context)
    }

    /// Error that ended the event loop, if any.
    pub fn take_error(&mut self) -> Option<anyhow::Error> {
        self.last_error.take()
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:?}");
        self.frames.stop_handle().stop();
        self.last_error = Some(err);
        event_loop.exit();
    }

    fn create_window(&self, event_loop: &ActiveEventLoop) -> Result<Arc<Window>> {
        let settings = self.context.scene.render;
        let attributes = Window::default_attributes()
            .with_title(WINDOW_TITLE)
            .with_inner_size(LogicalSize::new(settings.width, settings.height));
        #[cfg(target_arch = "wasm32")]
        let attributes = {
            use winit::platform::web::WindowAttributesExtWebSys;
            match crate::web::find_canvas() {
                Some(canvas) => attributes.with_canvas(Some(canvas)),
                None => attributes.with_append(true),
            }
        };
        let window = event_loop
            .create_window(attributes)
            .context("failed to create window")?;
        Ok(Arc::new(window))
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn start_renderer(&mut self, event_loop: &ActiveEventLoop, window: Arc<Window>) {
        match pollster::block_on(GpuRenderer::new(window, &self.context.scene)) {
            Ok(renderer) => self.install_renderer(renderer),
            Err(err) => self.fail(event_loop, err),
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn start_renderer(&mut self, _event_loop: &ActiveEventLoop, window: Arc<Window>) {
        let scene = self.context.scene.clone();
        let proxy = self.proxy.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let event = match GpuRenderer::new(window, &scene).await {
                Ok(renderer) => AppEvent::RendererReady(Box::new(renderer)),
                Err(err) => AppEvent::RendererFailed(err),
            };
            if proxy.send_event(event).is_err() {
                log::warn!("event loop closed before the renderer was ready");
            }
        });
    }

    fn install_renderer(&mut self, renderer: GpuRenderer) {
        log::info!("renderer ready");
        self.renderer = Some(renderer);
        self.resize();
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn resize(&mut self) {
        let Some(window) = &self.window else {
            return;
        };
        let host = resize_host(window);
        let ctx = &mut self.context;
        let mut targets = ResizeTargets {
            settings: &mut ctx.scene.render,
            renderer: self.renderer.as_mut(),
        };
        handle_resize(&host, &mut ctx.viewport, &mut ctx.scene.camera, &mut targets);
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(window), Some(renderer)) = (&self.window, self.renderer.as_mut()) else {
            return;
        };
        if let Some(overlay) = self.overlay.as_mut() {
            let report = self.frames.stats().latest();
            let frame = overlay.run(window, &mut self.panel, &mut self.context, report);
            renderer.set_overlay(frame);
        }
        let mut scheduler = WindowScheduler(window);
        if let Err(err) = self.frames.tick(&mut self.context, renderer, &mut scheduler) {
            self.fail(event_loop, err);
        }
    }

    fn logical(&self, position: PhysicalPosition<f64>) -> Vec2 {
        let scale = self
            .window
            .as_ref()
            .map(|window| window.scale_factor())
            .unwrap_or(1.0);
        let logical = position.to_logical::<f32>(scale);
        Vec2::new(logical.x, logical.y)
    }

    fn handle_touch(&mut self, touch: Touch, claimed: bool) {
        let position = self.logical(touch.location);
        let client_height = self.context.viewport.height as f32;
        let ctx = &mut self.context;
        match touch.phase {
            TouchPhase::Started if claimed => {}
            TouchPhase::Started => self.pointer.touch_started(touch.id, position),
            TouchPhase::Moved => self.pointer.touch_moved(
                touch.id,
                position,
                client_height,
                &mut ctx.controls,
                &ctx.scene.camera,
            ),
            TouchPhase::Ended | TouchPhase::Cancelled => self.pointer.touch_ended(touch.id),
        }
    }
}

impl ApplicationHandler<AppEvent> for WaterApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window = match self.create_window(event_loop) {
            Ok(window) => window,
            Err(err) => return self.fail(event_loop, err),
        };
        self.overlay = Some(OverlayInput::new(&window));
        self.window = Some(Arc::clone(&window));
        self.start_renderer(event_loop, window);
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: AppEvent) {
        match event {
            AppEvent::RendererReady(renderer) => self.install_renderer(*renderer),
            AppEvent::RendererFailed(err) => self.fail(event_loop, err),
            AppEvent::Panel(command) => {
                if let Err(err) = command.apply(&mut self.panel, &mut self.context) {
                    log::warn!("panel command rejected: {err:#}");
                }
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        // Presses and keys that land on the overlay do not reach the camera or the navigator.
        let claimed = match (self.overlay.as_mut(), self.window.as_deref()) {
            (Some(overlay), Some(window)) => overlay.on_window_event(window, &event),
            _ => false,
        };
        match event {
            WindowEvent::CloseRequested => {
                self.frames.stop_handle().stop();
                event_loop.exit();
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => self.resize(),
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && !claimed =>
            {
                let Some(key) = map_winit_key(&event.logical_key) else {
                    return;
                };
                if let Err(err) = self
                    .navigator
                    .handle_key(key, &mut self.panel, &mut self.context)
                {
                    log::warn!("panel input rejected: {err}");
                }
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed if claimed => {}
                ElementState::Pressed => self.pointer.button_down(button.into()),
                ElementState::Released => self.pointer.button_up(button.into()),
            },
            WindowEvent::CursorMoved { position, .. } => {
                let position = self.logical(position);
                let client_height = self.context.viewport.height as f32;
                let ctx = &mut self.context;
                self.pointer.pointer_moved(
                    position,
                    client_height,
                    &mut ctx.controls,
                    &ctx.scene.camera,
                );
            }
            WindowEvent::CursorLeft { .. } => self.pointer.pointer_left(),
            WindowEvent::MouseWheel { delta, .. } if !claimed => {
                self.pointer
                    .wheel(wheel_steps(delta), &mut self.context.controls);
            }
            WindowEvent::Touch(touch) => self.handle_touch(touch, claimed),
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}

/// Positive when scrolling away from the user.
fn wheel_steps(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(position) if position.y == 0.0 => 0.0,
        MouseScrollDelta::PixelDelta(position) => position.y.signum() as f32,
    }
}

struct WindowScheduler<'a>(&'a Window);

impl FrameScheduler for WindowScheduler<'_> {
    fn request_frame(&mut self) {
        self.0.request_redraw();
    }
}

/// Keeps the scene's render settings and the live surface in step.
struct ResizeTargets<'a> {
    settings: &'a mut RenderSettings,
    renderer: Option<&'a mut GpuRenderer>,
}

impl RenderTarget for ResizeTargets<'_> {
    fn set_size(&mut self, width: u32, height: u32) {
        self.settings.set_size(width, height);
        if let Some(renderer) = self.renderer.as_deref_mut() {
            renderer.set_size(width, height);
        }
    }

    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.settings.set_pixel_ratio(ratio);
        if let Some(renderer) = self.renderer.as_deref_mut() {
            renderer.set_pixel_ratio(ratio);
        }
    }
}

/// Reads the window's logical size and scale factor.
#[cfg(not(target_arch = "wasm32"))]
struct WindowHost<'a>(&'a Window);

#[cfg(not(target_arch = "wasm32"))]
impl HostViewport for WindowHost<'_> {
    fn viewport_size(&self) -> (u32, u32) {
        let size = self.0.inner_size().to_logical::<f64>(self.0.scale_factor());
        (size.width.round() as u32, size.height.round() as u32)
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.0.scale_factor()
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn resize_host(window: &Window) -> WindowHost<'_> {
    WindowHost(window)
}

#[cfg(target_arch = "wasm32")]
fn resize_host(_window: &Window) -> crate::web::BrowserHost {
    crate::web::BrowserHost
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel;
    use crate::uniforms;
    use crate::viewport::StaticViewport;

    fn setup() -> (WaterContext, TuningPanel) {
        let mut ctx = WaterContext::assemble(&StaticViewport::new(800, 600, 1.0)).unwrap();
        let panel = TuningPanel::water(&mut ctx).unwrap();
        (ctx, panel)
    }

    #[test]
    fn panel_commands_reach_the_store() {
        let (mut ctx, mut panel) = setup();
        PanelCommand::SetNumber {
            label: panel::BIG_WAVES_SPEED.into(),
            value: 1.5,
        }
        .apply(&mut panel, &mut ctx)
        .unwrap();
        PanelCommand::SetColor {
            label: panel::SURFACE_COLOR.into(),
            hex: "#ffffff".into(),
        }
        .apply(&mut panel, &mut ctx)
        .unwrap();
        PanelCommand::Toggle.apply(&mut panel, &mut ctx).unwrap();

        assert_eq!(ctx.uniforms.float(uniforms::BIG_WAVES_SPEED).unwrap(), 1.5);
        assert_eq!(ctx.debug.surface_color, "#ffffff");
        assert!(panel.is_open());
    }

    #[test]
    fn bad_commands_leave_state_alone() {
        let (mut ctx, mut panel) = setup();
        let before = ctx.uniforms.clone();
        let command = PanelCommand::ApplyPreset("<preset><control>".into());
        assert!(command.apply(&mut panel, &mut ctx).is_err());
        let command = PanelCommand::ApplyPreset(
            r#"<preset>
                <control name="uColorOffset">0.5</control>
                <color name="DepthColor">navy</color>
            </preset>"#
                .into(),
        );
        assert!(command.apply(&mut panel, &mut ctx).is_err());
        let command = PanelCommand::SetColor {
            label: panel::DEPTH_COLOR.into(),
            hex: "teal".into(),
        };
        assert!(command.apply(&mut panel, &mut ctx).is_err());
        assert_eq!(ctx.uniforms, before);
    }

    #[test]
    fn settings_follow_resize() {
        let mut ctx = WaterContext::assemble(&StaticViewport::new(800, 600, 1.0)).unwrap();
        let mut targets = ResizeTargets {
            settings: &mut ctx.scene.render,
            renderer: None,
        };
        let host = StaticViewport::new(1024, 512, 2.0);
        assert!(handle_resize(
            &host,
            &mut ctx.viewport,
            &mut ctx.scene.camera,
            &mut targets
        ));
        assert_eq!((ctx.scene.render.width, ctx.scene.render.height), (1024, 512));
        assert_eq!(ctx.scene.render.pixel_ratio, 2.0);
    }

    #[test]
    fn wheel_direction_matches_dolly() {
        assert_eq!(wheel_steps(MouseScrollDelta::LineDelta(0.0, 2.0)), 2.0);
        assert_eq!(
            wheel_steps(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -40.0))),
            -1.0
        );
        assert_eq!(
            wheel_steps(MouseScrollDelta::PixelDelta(PhysicalPosition::new(3.0, 0.0))),
            0.0
        );
    }
}
