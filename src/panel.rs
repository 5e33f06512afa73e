//! Live tuning panel: an ordered registry of widgets bound to the context
//! through explicit getter/setter pairs.
//!
//! Widgets own range enforcement. A number write is clamped to the widget's
//! `[min, max]` and then snapped to its step before it reaches the store. A
//! color write updates the hex proxy and then re-derives the shading color
//! from it.

use std::fmt;

use thiserror::Error;

use crate::color::{Color, ColorParseError};
use crate::context::{DebugColors, WaterContext};
use crate::input::{KeyCode, NamedKey};
use crate::uniforms::{self, step_decimals, TunableRange, UniformError, UniformValue};

pub const PANEL_WIDTH: u32 = 340;

pub const LIGHT_X: &str = "Light Position x";
pub const LIGHT_Y: &str = "Light Position y";
pub const LIGHT_Z: &str = "Light Position z";
pub const BIG_WAVES_ELEVATION: &str = "uBigwavesElevation";
pub const BIG_WAVES_FREQUENCY_X: &str = "uBigwavesFrequencyX";
pub const BIG_WAVES_FREQUENCY_Y: &str = "uBigwavesFrequencyY";
pub const BIG_WAVES_SPEED: &str = "uBigWavesSpeed";
pub const COLOR_OFFSET: &str = "uColorOffset";
pub const COLOR_MULTIPLIER: &str = "uColorMultiplier";
pub const SMALL_WAVES_SPEED: &str = "uSmallwavesSpeed";
pub const SMALL_WAVES_ELEVATION: &str = "uSmallWavesElevation";
pub const SMALL_WAVES_FREQUENCY: &str = "uSmallWavesFrequency";
pub const SMALL_ITERATIONS: &str = "uSmallIterations";
pub const DEPTH_COLOR: &str = "DepthColor";
pub const SURFACE_COLOR: &str = "SurfaceColor";

const LIGHT_RANGE: TunableRange = TunableRange::new(0.0, 100.0, 0.001);

type NumberGetter = Box<dyn Fn(&WaterContext) -> Result<f32, UniformError>>;
type NumberSetter = Box<dyn Fn(&mut WaterContext, f32) -> Result<(), UniformError>>;

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("no panel control named `{0}`")]
    UnknownControl(String),
    #[error("panel control `{0}` is not a number slider")]
    NotANumber(String),
    #[error("panel control `{0}` is not a color picker")]
    NotAColor(String),
    #[error("rejected non-finite value for `{0}`")]
    NotFinite(String),
    #[error(transparent)]
    Uniform(#[from] UniformError),
    #[error(transparent)]
    Color(#[from] ColorParseError),
}

/// Accessor pair for a color picker's hex proxy.
#[derive(Clone, Copy)]
pub struct ColorProxy {
    pub get: fn(&DebugColors) -> &str,
    pub get_mut: fn(&mut DebugColors) -> &mut String,
}

pub enum Binding {
    Number {
        range: TunableRange,
        get: NumberGetter,
        set: NumberSetter,
    },
    Color {
        /// Uniform re-derived from the proxy on change.
        uniform: &'static str,
        proxy: ColorProxy,
    },
}

pub struct Control {
    pub label: &'static str,
    pub binding: Binding,
}

impl Control {
    pub fn range(&self) -> Option<TunableRange> {
        match &self.binding {
            Binding::Number { range, .. } => Some(*range),
            Binding::Color { .. } => None,
        }
    }

    pub fn is_color(&self) -> bool {
        matches!(self.binding, Binding::Color { .. })
    }
}

impl fmt::Debug for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.binding {
            Binding::Number { range, .. } => f
                .debug_struct("Control")
                .field("label", &self.label)
                .field("range", range)
                .finish(),
            Binding::Color { uniform, .. } => f
                .debug_struct("Control")
                .field("label", &self.label)
                .field("uniform", uniform)
                .finish(),
        }
    }
}

#[derive(Debug)]
pub struct TuningPanel {
    controls: Vec<Control>,
    open: bool,
    width: u32,
}

impl Default for TuningPanel {
    fn default() -> Self {
        Self {
            controls: Vec::new(),
            open: true,
            width: PANEL_WIDTH,
        }
    }
}

impl TuningPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every water control, in display order, and starts closed.
    pub fn water(ctx: &mut WaterContext) -> Result<Self, PanelError> {
        let mut panel = Self::new();

        panel.add_number(
            LIGHT_X,
            LIGHT_RANGE,
            Box::new(|ctx: &WaterContext| Ok(ctx.scene.light.position.x)),
            Box::new(|ctx: &mut WaterContext, v: f32| {
                ctx.scene.light.position.x = v;
                Ok(())
            }),
        );
        panel.add_number(
            LIGHT_Y,
            LIGHT_RANGE,
            Box::new(|ctx: &WaterContext| Ok(ctx.scene.light.position.y)),
            Box::new(|ctx: &mut WaterContext, v: f32| {
                ctx.scene.light.position.y = v;
                Ok(())
            }),
        );
        panel.add_number(
            LIGHT_Z,
            LIGHT_RANGE,
            Box::new(|ctx: &WaterContext| Ok(ctx.scene.light.position.z)),
            Box::new(|ctx: &mut WaterContext, v: f32| {
                ctx.scene.light.position.z = v;
                Ok(())
            }),
        );

        let ten = TunableRange::new(0.0, 10.0, 0.001);
        panel.add_uniform(ctx, BIG_WAVES_ELEVATION, uniforms::BIG_WAVES_ELEVATION, ten)?;
        panel.add_vec2_component(ctx, BIG_WAVES_FREQUENCY_X, uniforms::BIG_WAVES_FREQUENCY, 0, ten)?;
        panel.add_vec2_component(ctx, BIG_WAVES_FREQUENCY_Y, uniforms::BIG_WAVES_FREQUENCY, 1, ten)?;
        panel.add_uniform(ctx, BIG_WAVES_SPEED, uniforms::BIG_WAVES_SPEED, ten)?;
        panel.add_uniform(
            ctx,
            COLOR_OFFSET,
            uniforms::COLOR_OFFSET,
            TunableRange::new(0.0, 1.0, 0.001),
        )?;
        panel.add_uniform(ctx, COLOR_MULTIPLIER, uniforms::COLOR_MULTIPLIER, ten)?;
        panel.add_uniform(
            ctx,
            SMALL_WAVES_SPEED,
            uniforms::SMALL_WAVES_SPEED,
            TunableRange::new(0.0, 4.0, 0.001),
        )?;
        panel.add_uniform(
            ctx,
            SMALL_WAVES_ELEVATION,
            uniforms::SMALL_WAVES_ELEVATION,
            TunableRange::new(0.0, 10.0, 0.0001),
        )?;
        panel.add_uniform(ctx, SMALL_WAVES_FREQUENCY, uniforms::SMALL_WAVES_FREQUENCY, ten)?;
        panel.add_integer_uniform(
            ctx,
            SMALL_ITERATIONS,
            uniforms::SMALL_ITERATIONS,
            TunableRange::new(0.0, 5.0, 1.0),
        )?;

        panel.add_color(
            DEPTH_COLOR,
            uniforms::DEPTH_COLOR,
            ColorProxy {
                get: depth_hex,
                get_mut: depth_hex_mut,
            },
        );
        panel.add_color(
            SURFACE_COLOR,
            uniforms::SURFACE_COLOR,
            ColorProxy {
                get: surface_hex,
                get_mut: surface_hex_mut,
            },
        );

        panel.close();
        Ok(panel)
    }

    pub fn add_number(
        &mut self,
        label: &'static str,
        range: TunableRange,
        get: NumberGetter,
        set: NumberSetter,
    ) {
        self.controls.push(Control {
            label,
            binding: Binding::Number { range, get, set },
        });
    }

    pub fn add_color(&mut self, label: &'static str, uniform: &'static str, proxy: ColorProxy) {
        self.controls.push(Control {
            label,
            binding: Binding::Color { uniform, proxy },
        });
    }

    fn add_uniform(
        &mut self,
        ctx: &mut WaterContext,
        label: &'static str,
        name: &'static str,
        range: TunableRange,
    ) -> Result<(), UniformError> {
        ctx.uniforms.expose(name, range)?;
        self.add_number(
            label,
            range,
            Box::new(move |ctx: &WaterContext| ctx.uniforms.float(name)),
            Box::new(move |ctx: &mut WaterContext, v: f32| {
                ctx.uniforms.set(name, UniformValue::Float(v))
            }),
        );
        Ok(())
    }

    fn add_integer_uniform(
        &mut self,
        ctx: &mut WaterContext,
        label: &'static str,
        name: &'static str,
        range: TunableRange,
    ) -> Result<(), UniformError> {
        ctx.uniforms.expose(name, range)?;
        self.add_number(
            label,
            range,
            Box::new(move |ctx: &WaterContext| ctx.uniforms.int(name).map(|v| v as f32)),
            Box::new(move |ctx: &mut WaterContext, v: f32| {
                ctx.uniforms.set(name, UniformValue::Int(v.round() as i32))
            }),
        );
        Ok(())
    }

    fn add_vec2_component(
        &mut self,
        ctx: &mut WaterContext,
        label: &'static str,
        name: &'static str,
        component: usize,
        range: TunableRange,
    ) -> Result<(), UniformError> {
        ctx.uniforms.expose(name, range)?;
        self.add_number(
            label,
            range,
            Box::new(move |ctx: &WaterContext| ctx.uniforms.vec2(name).map(|v| v[component])),
            Box::new(move |ctx: &mut WaterContext, value: f32| {
                let mut v = ctx.uniforms.vec2(name)?;
                v[component] = value;
                ctx.uniforms.set(name, UniformValue::Vec2(v))
            }),
        );
        Ok(())
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    pub fn control(&self, label: &str) -> Result<&Control, PanelError> {
        self.controls
            .iter()
            .find(|control| control.label == label)
            .ok_or_else(|| PanelError::UnknownControl(label.to_string()))
    }

    pub fn number(&self, ctx: &WaterContext, label: &str) -> Result<f32, PanelError> {
        match &self.control(label)?.binding {
            Binding::Number { get, .. } => Ok(get(ctx)?),
            Binding::Color { .. } => Err(PanelError::NotANumber(label.to_string())),
        }
    }

    /// Widget write: clamps, snaps, stores. Returns the value actually stored.
    pub fn set_number(
        &self,
        ctx: &mut WaterContext,
        label: &str,
        value: f32,
    ) -> Result<f32, PanelError> {
        let control = self.control(label)?;
        let Binding::Number { range, get, set } = &control.binding else {
            return Err(PanelError::NotANumber(label.to_string()));
        };
        if !value.is_finite() {
            return Err(PanelError::NotFinite(label.to_string()));
        }
        set(ctx, range.constrain(value))?;
        let stored = get(ctx)?;
        log::info!("{} = {}", control.label, format_number(stored, range.step));
        Ok(stored)
    }

    /// Moves a slider by `steps` of its own step size.
    pub fn nudge(&self, ctx: &mut WaterContext, label: &str, steps: f32) -> Result<f32, PanelError> {
        let control = self.control(label)?;
        let Some(range) = control.range() else {
            return Err(PanelError::NotANumber(label.to_string()));
        };
        let current = self.number(ctx, label)?;
        self.set_number(ctx, label, current + steps * range.step)
    }

    pub fn color<'a>(&self, ctx: &'a WaterContext, label: &str) -> Result<&'a str, PanelError> {
        match &self.control(label)?.binding {
            Binding::Color { proxy, .. } => Ok((proxy.get)(&ctx.debug)),
            Binding::Number { .. } => Err(PanelError::NotAColor(label.to_string())),
        }
    }

    /// Color picker write. Malformed hex leaves both proxy and uniform untouched.
    pub fn set_color(
        &self,
        ctx: &mut WaterContext,
        label: &str,
        hex: &str,
    ) -> Result<Color, PanelError> {
        let control = self.control(label)?;
        let Binding::Color { uniform, proxy } = &control.binding else {
            return Err(PanelError::NotAColor(label.to_string()));
        };
        let parsed = Color::from_hex(hex)?;
        *(proxy.get_mut)(&mut ctx.debug) = parsed.to_hex();
        let derived = Self::on_color_change(ctx, uniform, *proxy)?;
        log::info!("{} = {}", control.label, derived);
        Ok(derived)
    }

    fn on_color_change(
        ctx: &mut WaterContext,
        uniform: &str,
        proxy: ColorProxy,
    ) -> Result<Color, PanelError> {
        let color = Color::from_hex((proxy.get)(&ctx.debug))?;
        ctx.uniforms.set(uniform, UniformValue::Color(color))?;
        Ok(color)
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn toggle(&mut self) -> bool {
        self.open = !self.open;
        log::info!(
            "tuning panel {}",
            if self.open { "opened" } else { "closed" }
        );
        self.open
    }

    /// One line per control: label, range and current value.
    pub fn describe(&self, ctx: &WaterContext) -> Vec<String> {
        self.controls
            .iter()
            .map(|control| match &control.binding {
                Binding::Number { range, get, .. } => {
                    let value = get(ctx)
                        .map(|v| format_number(v, range.step))
                        .unwrap_or_else(|err| format!("<{err}>"));
                    format!(
                        "{} [{}, {}] step {} = {}",
                        control.label, range.min, range.max, range.step, value
                    )
                }
                Binding::Color { proxy, .. } => {
                    format!("{} (color) = {}", control.label, (proxy.get)(&ctx.debug))
                }
            })
            .collect()
    }
}

fn depth_hex(debug: &DebugColors) -> &str {
    &debug.depth_color
}

fn depth_hex_mut(debug: &mut DebugColors) -> &mut String {
    &mut debug.depth_color
}

fn surface_hex(debug: &DebugColors) -> &str {
    &debug.surface_color
}

fn surface_hex_mut(debug: &mut DebugColors) -> &mut String {
    &mut debug.surface_color
}

/// Formats with as many decimals as the step carries.
pub fn format_number(value: f32, step: f32) -> String {
    let decimals = step_decimals(step);
    format!("{value:.decimals$}")
}

/// Keyboard front end for the panel: `H` toggles it; while open, Up/Down
/// select a control and Left/Right step the selected slider.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PanelNavigator {
    selected: usize,
}

impl PanelNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected<'a>(&self, panel: &'a TuningPanel) -> Option<&'a Control> {
        panel.controls().get(self.selected)
    }

    /// Returns whether the key was consumed by the panel.
    pub fn handle_key(
        &mut self,
        key: KeyCode,
        panel: &mut TuningPanel,
        ctx: &mut WaterContext,
    ) -> Result<bool, PanelError> {
        if key == KeyCode::Character('H') {
            panel.toggle();
            return Ok(true);
        }
        if !panel.is_open() || panel.controls().is_empty() {
            return Ok(false);
        }
        let count = panel.controls().len();
        let steps = match key {
            KeyCode::Named(NamedKey::Up) => {
                self.selected = (self.selected + count - 1) % count;
                self.announce(panel, ctx);
                return Ok(true);
            }
            KeyCode::Named(NamedKey::Down) | KeyCode::Named(NamedKey::Tab) => {
                self.selected = (self.selected + 1) % count;
                self.announce(panel, ctx);
                return Ok(true);
            }
            KeyCode::Named(NamedKey::Left) => -1.0,
            KeyCode::Named(NamedKey::Right) => 1.0,
            KeyCode::Named(NamedKey::PageDown) => -100.0,
            KeyCode::Named(NamedKey::PageUp) => 100.0,
            _ => return Ok(false),
        };
        let Some(control) = self.selected(panel) else {
            return Ok(false);
        };
        if control.is_color() {
            log::info!("{} is a color picker; set it with a hex value", control.label);
            return Ok(true);
        }
        let label = control.label;
        panel.nudge(ctx, label, steps)?;
        Ok(true)
    }

    fn announce(&self, panel: &TuningPanel, ctx: &WaterContext) {
        if let Some(line) = panel.describe(ctx).get(self.selected) {
            log::info!("selected {line}");
        }
    }
}
