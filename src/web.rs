#![cfg(target_arch = "wasm32")]

//! Browser entry points. The page calls `start()` once; the panel exports
//! forward edits to the running event loop as user events.

use std::cell::RefCell;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlCanvasElement;
use winit::event_loop::{EventLoop, EventLoopProxy};
use winit::platform::web::EventLoopExtWebSys;

use crate::app::{AppEvent, PanelCommand, WaterApp};
use crate::preset::Preset;
use crate::viewport::HostViewport;

const CANVAS_SELECTOR: &str = "canvas.webgl";

thread_local! {
    static PROXY: RefCell<Option<EventLoopProxy<AppEvent>>> = const { RefCell::new(None) };
}

#[wasm_bindgen(start)]
pub fn bootstrap() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

/// Builds the scene and hands the event loop to the browser.
#[wasm_bindgen]
pub fn start(preset_xml: Option<String>) -> Result<(), JsValue> {
    let event_loop = EventLoop::<AppEvent>::with_user_event()
        .build()
        .map_err(to_js)?;
    let proxy = event_loop.create_proxy();
    let mut app = WaterApp::new(proxy.clone(), &BrowserHost).map_err(to_js)?;
    if let Some(xml) = preset_xml {
        let preset = Preset::from_xml(&xml).map_err(to_js)?;
        app.apply_preset(&preset).map_err(to_js)?;
    }
    PROXY.with(|slot| *slot.borrow_mut() = Some(proxy));
    event_loop.spawn_app(app);
    Ok(())
}

#[wasm_bindgen]
pub fn set_control(label: String, value: f32) -> Result<(), JsValue> {
    send(PanelCommand::SetNumber { label, value })
}

#[wasm_bindgen]
pub fn set_color(label: String, hex: String) -> Result<(), JsValue> {
    send(PanelCommand::SetColor { label, hex })
}

#[wasm_bindgen]
pub fn toggle_panel() -> Result<(), JsValue> {
    send(PanelCommand::Toggle)
}

#[wasm_bindgen]
pub fn apply_preset(xml: String) -> Result<(), JsValue> {
    send(PanelCommand::ApplyPreset(xml))
}

fn send(command: PanelCommand) -> Result<(), JsValue> {
    PROXY.with(|slot| {
        let slot = slot.borrow();
        let proxy = slot
            .as_ref()
            .ok_or_else(|| JsValue::from_str("start() has not been called"))?;
        proxy
            .send_event(AppEvent::Panel(command))
            .map_err(|_| JsValue::from_str("event loop has stopped"))
    })
}

fn to_js(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

pub(crate) fn find_canvas() -> Option<HtmlCanvasElement> {
    web_sys::window()?
        .document()?
        .query_selector(CANVAS_SELECTOR)
        .ok()
        .flatten()?
        .dyn_into::<HtmlCanvasElement>()
        .ok()
}

/// Reads `innerWidth`, `innerHeight` and `devicePixelRatio` from the page.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserHost;

impl HostViewport for BrowserHost {
    fn viewport_size(&self) -> (u32, u32) {
        let Some(window) = web_sys::window() else {
            return (0, 0);
        };
        let read = |value: Result<JsValue, JsValue>| {
            value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0).max(0.0) as u32
        };
        (read(window.inner_width()), read(window.inner_height()))
    }

    fn device_pixel_ratio(&self) -> f64 {
        web_sys::window()
            .map(|window| window.device_pixel_ratio())
            .unwrap_or(1.0)
    }
}
