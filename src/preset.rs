//! XML presets for the tuning panel.
//!
//! ```xml
//! <preset>
//!     <control name="uBigwavesElevation">0.2</control>
//!     <color name="DepthColor">#186691</color>
//! </preset>
//! ```
//!
//! Presets go through the panel, so every value is clamped and snapped
//! exactly as if it had been typed into the widget.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use thiserror::Error;

use crate::context::WaterContext;
use crate::panel::{format_number, Binding, PanelError, TuningPanel};

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("failed to read preset {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid preset XML")]
    Xml(#[from] roxmltree::Error),
    #[error("preset root must be <preset>, found <{0}>")]
    Root(String),
    #[error("<{0}> entry is missing its name attribute")]
    MissingName(String),
    #[error("`{name}` has a non-numeric value `{value}`")]
    BadNumber { name: String, value: String },
    #[error(transparent)]
    Panel(#[from] PanelError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresetEntry {
    Number { label: String, value: f32 },
    Color { label: String, hex: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preset {
    pub entries: Vec<PresetEntry>,
}

impl Preset {
    pub fn from_xml(xml: &str) -> Result<Self, PresetError> {
        let document = Document::parse(xml)?;
        let root = document.root_element();
        if !root.has_tag_name("preset") {
            return Err(PresetError::Root(root.tag_name().name().to_string()));
        }

        let mut entries = Vec::new();
        for node in root.children().filter(Node::is_element) {
            let tag = node.tag_name().name();
            let label = match node.attribute("name") {
                Some(name) if !name.trim().is_empty() => name.trim().to_string(),
                _ => return Err(PresetError::MissingName(tag.to_string())),
            };
            let text = node.text().map(str::trim).unwrap_or_default();
            match tag {
                "control" => {
                    let value = text.parse::<f32>().map_err(|_| PresetError::BadNumber {
                        name: label.clone(),
                        value: text.to_string(),
                    })?;
                    entries.push(PresetEntry::Number { label, value });
                }
                "color" => entries.push(PresetEntry::Color {
                    label,
                    hex: text.to_string(),
                }),
                other => log::warn!("ignoring unknown preset entry <{other}>"),
            }
        }
        Ok(Self { entries })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PresetError> {
        let path = path.as_ref();
        let xml = fs::read_to_string(path).map_err(|source| PresetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_xml(&xml)
    }

    /// Applies every entry in order, or none of them: entries run against a
    /// staged copy that replaces `ctx` only once the last entry is accepted.
    pub fn apply(&self, panel: &TuningPanel, ctx: &mut WaterContext) -> Result<usize, PresetError> {
        let mut staged = ctx.clone();
        for entry in &self.entries {
            match entry {
                PresetEntry::Number { label, value } => {
                    panel.set_number(&mut staged, label, *value)?;
                }
                PresetEntry::Color { label, hex } => {
                    panel.set_color(&mut staged, label, hex)?;
                }
            }
        }
        *ctx = staged;
        log::info!("applied preset with {} entries", self.entries.len());
        Ok(self.entries.len())
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<preset>\n");
        for entry in &self.entries {
            // Writing into a String cannot fail.
            let _ = match entry {
                PresetEntry::Number { label, value } => writeln!(
                    xml,
                    "    <control name=\"{}\">{value}</control>",
                    escape(label)
                ),
                PresetEntry::Color { label, hex } => writeln!(
                    xml,
                    "    <color name=\"{}\">{}</color>",
                    escape(label),
                    escape(hex)
                ),
            };
        }
        xml.push_str("</preset>\n");
        xml
    }
}

impl TuningPanel {
    /// Snapshot of every control's current value.
    pub fn capture_preset(&self, ctx: &WaterContext) -> Result<Preset, PanelError> {
        let mut entries = Vec::with_capacity(self.controls().len());
        for control in self.controls() {
            let label = control.label.to_string();
            match &control.binding {
                Binding::Number { range, .. } => {
                    let value = self.number(ctx, control.label)?;
                    // Round-trip through the display precision to drop f32 noise.
                    let value = format_number(value, range.step)
                        .parse()
                        .unwrap_or(value);
                    entries.push(PresetEntry::Number { label, value });
                }
                Binding::Color { .. } => {
                    let hex = self.color(ctx, control.label)?.to_string();
                    entries.push(PresetEntry::Color { label, hex });
                }
            }
        }
        Ok(Preset { entries })
    }

    pub fn export_preset(&self, ctx: &WaterContext) -> Result<String, PanelError> {
        Ok(self.capture_preset(ctx)?.to_xml())
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel;
    use crate::uniforms;
    use crate::viewport::StaticViewport;
    use std::io::Write;

    const SAMPLE: &str = r#"
    <preset>
        <control name="uBigwavesElevation">0.2</control>
        <control name="uSmallIterations">9</control>
        <color name="DepthColor">#186691</color>
        <note name="ignored">hello</note>
    </preset>
    "#;

    fn setup() -> (WaterContext, TuningPanel) {
        let mut ctx = WaterContext::assemble(&StaticViewport::new(800, 600, 1.0)).unwrap();
        let panel = TuningPanel::water(&mut ctx).unwrap();
        (ctx, panel)
    }

    #[test]
    fn parses_controls_and_colors() {
        let preset = Preset::from_xml(SAMPLE).unwrap();
        assert_eq!(preset.entries.len(), 3);
        assert_eq!(
            preset.entries[2],
            PresetEntry::Color {
                label: panel::DEPTH_COLOR.into(),
                hex: "#186691".into()
            }
        );
    }

    #[test]
    fn apply_goes_through_widget_ranges() {
        let (mut ctx, panel) = setup();
        let applied = Preset::from_xml(SAMPLE).unwrap().apply(&panel, &mut ctx).unwrap();
        assert_eq!(applied, 3);
        assert_eq!(ctx.uniforms.float(uniforms::BIG_WAVES_ELEVATION).unwrap(), 0.2);
        assert_eq!(ctx.uniforms.int(uniforms::SMALL_ITERATIONS).unwrap(), 5);
        assert_eq!(ctx.debug.depth_color, "#186691");
        assert_eq!(
            ctx.uniforms.color(uniforms::DEPTH_COLOR).unwrap().to_hex(),
            "#186691"
        );
    }

    #[test]
    fn exported_preset_restores_state() {
        let (mut ctx, panel) = setup();
        panel.set_number(&mut ctx, panel::COLOR_OFFSET, 0.05).unwrap();
        panel.set_color(&mut ctx, panel::SURFACE_COLOR, "#aabbcc").unwrap();
        let xml = panel.export_preset(&ctx).unwrap();

        let (mut fresh, fresh_panel) = setup();
        Preset::from_xml(&xml).unwrap().apply(&fresh_panel, &mut fresh).unwrap();
        assert_eq!(fresh.uniforms.float(uniforms::COLOR_OFFSET).unwrap(), 0.05);
        assert_eq!(fresh.debug.surface_color, "#aabbcc");
        assert_eq!(fresh_panel.describe(&fresh), panel.describe(&ctx));
    }

    #[test]
    fn rejects_bad_documents() {
        assert!(matches!(Preset::from_xml("<preset>"), Err(PresetError::Xml(_))));
        assert!(matches!(
            Preset::from_xml("<scene/>"),
            Err(PresetError::Root(_))
        ));
        assert!(matches!(
            Preset::from_xml(r#"<preset><control>1</control></preset>"#),
            Err(PresetError::MissingName(_))
        ));
        assert!(matches!(
            Preset::from_xml(r#"<preset><control name="uColorOffset">lots</control></preset>"#),
            Err(PresetError::BadNumber { .. })
        ));
    }

    #[test]
    fn unknown_controls_are_reported() {
        let (mut ctx, panel) = setup();
        let preset =
            Preset::from_xml(r#"<preset><control name="uNope">1</control></preset>"#).unwrap();
        assert!(matches!(
            preset.apply(&panel, &mut ctx),
            Err(PresetError::Panel(PanelError::UnknownControl(_)))
        ));
    }

    #[test]
    fn failed_preset_applies_nothing() {
        let (mut ctx, panel) = setup();
        let before = ctx.uniforms.clone();
        let preset = Preset::from_xml(
            r#"<preset>
                <control name="uColorOffset">0.5</control>
                <color name="DepthColor">navy</color>
            </preset>"#,
        )
        .unwrap();

        assert!(matches!(
            preset.apply(&panel, &mut ctx),
            Err(PresetError::Panel(PanelError::Color(_)))
        ));
        assert_eq!(ctx.uniforms, before);
        assert_eq!(ctx.uniforms.float(uniforms::COLOR_OFFSET).unwrap(), 0.022);
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let preset = Preset::load(file.path()).unwrap();
        assert_eq!(preset.entries.len(), 3);
        assert!(matches!(
            Preset::load("/definitely/not/here.xml"),
            Err(PresetError::Io { .. })
        ));
    }
}
