//! Animated water surface with live-tunable shading inputs.
//!
//! The scene, the uniform store, the tuning panel and the frame loop are plain
//! Rust types that run without a GPU. Rendering and window integration live
//! behind the [`render::SceneRenderer`] and [`render::RenderTarget`] traits so
//! the headless parts stay easy to test. The panel and the frame readout are
//! drawn on screen by [`overlay`] with egui.

pub mod app;
pub mod camera;
pub mod color;
pub mod context;
pub mod controls;
pub mod frame;
pub mod input;
pub mod overlay;
pub mod panel;
pub mod preset;
pub mod render;
pub mod scene;
pub mod uniforms;
pub mod viewport;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use app::{AppEvent, PanelCommand, WaterApp};
pub use color::Color;
pub use context::WaterContext;
pub use frame::{Clock, FrameLoop, FrameReport, FrameScheduler, MonotonicClock};
pub use panel::{PanelNavigator, TuningPanel};
pub use preset::Preset;
pub use render::{GpuRenderer, RenderTarget, SceneRenderer};
pub use scene::WaterScene;
pub use uniforms::{UniformStore, UniformValue};
pub use viewport::{handle_resize, HostViewport, StaticViewport};
