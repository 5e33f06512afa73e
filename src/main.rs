use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use anyhow::{anyhow, Context, Result};

use raging_sea::{Preset, StaticViewport, TuningPanel, WaterContext};

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

const USAGE: &str =
    "Usage: raging-sea [--width <px>] [--height <px>] [--preset <file.xml>] [--summary-only]";

#[cfg_attr(target_arch = "wasm32", allow(dead_code))]
fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let preset = options
        .preset
        .as_deref()
        .map(|path| Preset::load(path).with_context(|| format!("failed to load preset {path}")))
        .transpose()?;

    if options.summary_only {
        return run_headless(&options, preset.as_ref());
    }
    match run_interactive(&options, preset.as_ref()) {
        Ok(()) => Ok(()),
        Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
            eprintln!("{err}. Falling back to --summary-only mode.");
            run_headless(&options, preset.as_ref())
        }
        Err(err) => Err(err),
    }
}

#[cfg_attr(target_arch = "wasm32", allow(dead_code))]
fn run_headless(options: &CliOptions, preset: Option<&Preset>) -> Result<()> {
    let mut ctx = WaterContext::assemble(&StaticViewport::new(options.width, options.height, 1.0))
        .context("failed to assemble the scene")?;
    let panel = TuningPanel::water(&mut ctx).context("failed to build the tuning panel")?;
    if let Some(preset) = preset {
        preset.apply(&panel, &mut ctx).context("failed to apply preset")?;
    }
    print_summary(&ctx, &panel);
    Ok(())
}

fn print_summary(ctx: &WaterContext, panel: &TuningPanel) {
    println!("{}", ctx.scene.summary());
    println!(
        "Viewport: {}x{} @{}x",
        ctx.viewport.width, ctx.viewport.height, ctx.viewport.pixel_ratio
    );
    println!("Uniforms:");
    for uniform in ctx.uniforms.iter() {
        println!(
            " - {} ({}) = {}",
            uniform.name,
            uniform.value.kind(),
            uniform.value
        );
    }
    println!(
        "Tuning panel ({}, {}px):",
        if panel.is_open() { "open" } else { "closed" },
        panel.width()
    );
    for line in panel.describe(ctx) {
        println!(" - {line}");
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn run_interactive(options: &CliOptions, preset: Option<&Preset>) -> Result<()> {
    use raging_sea::{AppEvent, WaterApp};
    use winit::event_loop::EventLoop;

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(|| {
        EventLoop::<AppEvent>::with_user_event().build()
    }));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;

    let host = StaticViewport::new(options.width, options.height, 1.0);
    let mut app = WaterApp::new(event_loop.create_proxy(), &host)?;
    if let Some(preset) = preset {
        app.apply_preset(preset).context("failed to apply preset")?;
    }

    event_loop.run_app(&mut app).context("event loop failed")?;
    match app.take_error() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(target_arch = "wasm32")]
fn run_interactive(_options: &CliOptions, _preset: Option<&Preset>) -> Result<()> {
    Err(anyhow!("the desktop window is not available in the browser build"))
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

#[derive(Debug, PartialEq)]
struct CliOptions {
    width: u32,
    height: u32,
    preset: Option<String>,
    summary_only: bool,
}

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self {
            width: 1280,
            height: 720,
            preset: None,
            summary_only: false,
        };
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--width" => options.width = dimension(&arg, args.next())?,
                "--height" => options.height = dimension(&arg, args.next())?,
                "--preset" => {
                    let path = args
                        .next()
                        .ok_or_else(|| anyhow!("--preset needs a file path\n{USAGE}"))?;
                    options.preset = Some(path);
                }
                "--summary-only" => options.summary_only = true,
                other => return Err(anyhow!("Unknown argument: {other}\n{USAGE}")),
            }
        }
        Ok(options)
    }
}

fn dimension(flag: &str, value: Option<String>) -> Result<u32> {
    let value = value.ok_or_else(|| anyhow!("{flag} needs a value\n{USAGE}"))?;
    match value.parse::<u32>() {
        Ok(px) if px > 0 => Ok(px),
        _ => Err(anyhow!("{flag} expects a positive pixel count, got `{value}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliOptions> {
        CliOptions::parse(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn defaults_to_a_720p_window() {
        let options = parse(&[]).unwrap();
        assert_eq!((options.width, options.height), (1280, 720));
        assert!(!options.summary_only);
        assert_eq!(options.preset, None);
    }

    #[test]
    fn reads_every_flag() {
        let options = parse(&[
            "--width",
            "640",
            "--height",
            "480",
            "--preset",
            "calm.xml",
            "--summary-only",
        ])
        .unwrap();
        assert_eq!(
            options,
            CliOptions {
                width: 640,
                height: 480,
                preset: Some("calm.xml".into()),
                summary_only: true,
            }
        );
    }

    #[test]
    fn rejects_bad_dimensions_and_unknown_flags() {
        assert!(parse(&["--width", "0"]).is_err());
        assert!(parse(&["--height"]).is_err());
        assert!(parse(&["--fullscreen"]).is_err());
    }
}
