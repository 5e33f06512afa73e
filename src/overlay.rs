//! On-screen tuning panel and frame-time readout, drawn with egui.
//!
//! Widgets are built from the panel registry every frame. Edits go through
//! [`TuningPanel::set_number`] and [`TuningPanel::set_color`], so sliders obey
//! the same clamp-then-snap rule as keyboard and preset writes.

use egui::{Align2, Color32, RichText};
use winit::event::WindowEvent;
use winit::window::Window;

use crate::color::Color;
use crate::context::WaterContext;
use crate::frame::FrameReport;
use crate::panel::{Binding, Control, PanelError, TuningPanel};
use crate::uniforms::step_decimals;

const MARGIN: f32 = 8.0;
const STATS_FOREGROUND: Color32 = Color32::from_rgb(0x00, 0xff, 0x00);
const STATS_BACKGROUND: Color32 = Color32::from_rgb(0x00, 0x22, 0x00);

/// What one overlay pass drew and changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OverlayOutcome {
    pub panel_drawn: bool,
    pub edits: usize,
}

/// Tessellated overlay waiting to be painted over the next frame.
pub struct OverlayFrame {
    pub paint_jobs: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
}

/// egui input state bound to the app window.
pub struct OverlayInput {
    state: egui_winit::State,
}

impl OverlayInput {
    pub fn new(window: &Window) -> Self {
        let state = egui_winit::State::new(
            egui::Context::default(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        Self { state }
    }

    /// Returns whether egui claimed the event.
    pub fn on_window_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    /// Runs one UI pass against the live state and tessellates the result.
    pub fn run(
        &mut self,
        window: &Window,
        panel: &mut TuningPanel,
        water: &mut WaterContext,
        report: Option<FrameReport>,
    ) -> OverlayFrame {
        let raw_input = self.state.take_egui_input(window);
        let mut outcome = OverlayOutcome::default();
        let output = self.state.egui_ctx().run(raw_input, |ui_ctx| {
            outcome = draw(ui_ctx, panel, water, report);
        });
        if outcome.edits > 0 {
            log::debug!("overlay applied {} edits", outcome.edits);
        }
        self.state
            .handle_platform_output(window, output.platform_output);
        let paint_jobs = self
            .state
            .egui_ctx()
            .tessellate(output.shapes, output.pixels_per_point);
        OverlayFrame {
            paint_jobs,
            textures_delta: output.textures_delta,
        }
    }
}

/// Draws the frame readout and, while open, the tuning panel.
pub fn draw(
    ui_ctx: &egui::Context,
    panel: &mut TuningPanel,
    water: &mut WaterContext,
    report: Option<FrameReport>,
) -> OverlayOutcome {
    draw_frame_stats(ui_ctx, report);

    let mut outcome = OverlayOutcome::default();
    if !panel.is_open() {
        egui::Area::new(egui::Id::new("panel-opener"))
            .anchor(Align2::RIGHT_TOP, [-MARGIN, MARGIN])
            .show(ui_ctx, |ui| {
                if ui.button("Open Controls").clicked() {
                    panel.open();
                }
            });
        return outcome;
    }

    outcome.panel_drawn = true;
    let width = panel.width() as f32;
    let mut close = false;
    egui::Window::new("Controls")
        .anchor(Align2::RIGHT_TOP, [-MARGIN, MARGIN])
        .default_width(width)
        .resizable(false)
        .collapsible(false)
        .show(ui_ctx, |ui| {
            ui.set_min_width(width);
            for control in panel.controls() {
                match control_row(ui, panel, control, water) {
                    Ok(true) => outcome.edits += 1,
                    Ok(false) => {}
                    Err(err) => log::warn!("panel edit rejected: {err}"),
                }
            }
            ui.separator();
            close = ui.button("Close Controls").clicked();
        });
    if close {
        panel.close();
    }
    outcome
}

fn control_row(
    ui: &mut egui::Ui,
    panel: &TuningPanel,
    control: &Control,
    water: &mut WaterContext,
) -> Result<bool, PanelError> {
    match &control.binding {
        Binding::Number { range, .. } => {
            let mut value = panel.number(water, control.label)?;
            let slider = egui::Slider::new(&mut value, range.min..=range.max)
                .step_by(range.step as f64)
                .max_decimals(step_decimals(range.step))
                .text(control.label);
            if ui.add(slider).changed() {
                panel.set_number(water, control.label, value)?;
                return Ok(true);
            }
        }
        Binding::Color { .. } => {
            let mut rgb = Color::from_hex(panel.color(water, control.label)?)?.to_rgb8();
            let changed = ui
                .horizontal(|ui| {
                    let changed = ui.color_edit_button_srgb(&mut rgb).changed();
                    ui.label(control.label);
                    changed
                })
                .inner;
            if changed {
                panel.set_color(water, control.label, &Color::from_rgb8(rgb).to_hex())?;
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn draw_frame_stats(ui_ctx: &egui::Context, report: Option<FrameReport>) {
    let text = report
        .map(stats_label)
        .unwrap_or_else(|| "-- MS".to_string());
    egui::Area::new(egui::Id::new("frame-stats"))
        .anchor(Align2::LEFT_TOP, [0.0, 0.0])
        .interactable(false)
        .show(ui_ctx, |ui| {
            egui::Frame::NONE
                .fill(STATS_BACKGROUND)
                .inner_margin(egui::Margin::same(4))
                .show(ui, |ui| {
                    ui.label(RichText::new(text).monospace().color(STATS_FOREGROUND));
                });
        });
}

/// `16 MS (12-21)`: mean work per frame with the window's min and max.
pub fn stats_label(report: FrameReport) -> String {
    format!(
        "{:.0} MS ({:.0}-{:.0})",
        report.mean_ms, report.min_ms, report.max_ms
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::StaticViewport;

    fn setup() -> (WaterContext, TuningPanel) {
        let mut ctx = WaterContext::assemble(&StaticViewport::new(800, 600, 1.0)).unwrap();
        let panel = TuningPanel::water(&mut ctx).unwrap();
        (ctx, panel)
    }

    fn run_pass(panel: &mut TuningPanel, ctx: &mut WaterContext) -> OverlayOutcome {
        let ui_ctx = egui::Context::default();
        let mut outcome = OverlayOutcome::default();
        let _ = ui_ctx.run(egui::RawInput::default(), |ui_ctx| {
            outcome = draw(ui_ctx, panel, ctx, None);
        });
        outcome
    }

    #[test]
    fn closed_panel_draws_only_the_opener() {
        let (mut ctx, mut panel) = setup();
        let outcome = run_pass(&mut panel, &mut ctx);
        assert!(!outcome.panel_drawn);
        assert!(!panel.is_open());
    }

    #[test]
    fn open_panel_draws_without_touching_values() {
        let (mut ctx, mut panel) = setup();
        panel.open();
        let before = ctx.uniforms.clone();
        let light = ctx.scene.light;

        let outcome = run_pass(&mut panel, &mut ctx);

        assert!(outcome.panel_drawn);
        assert_eq!(outcome.edits, 0);
        assert_eq!(ctx.uniforms, before);
        assert_eq!(ctx.scene.light, light);
        assert!(panel.is_open());
    }

    #[test]
    fn stats_label_reads_like_the_ms_panel() {
        let report = FrameReport {
            mean_ms: 3.6,
            min_ms: 1.2,
            max_ms: 9.8,
            frames: 60,
        };
        assert_eq!(stats_label(report), "4 MS (1-10)");
    }
}
