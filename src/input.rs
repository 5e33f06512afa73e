use std::collections::{HashMap, HashSet};

use glam::Vec2;

use crate::camera::PerspectiveCamera;
use crate::controls::OrbitControls;

/// Identifier for a keyboard key, independent of the windowing backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
}

impl KeyCode {
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(key) = parse_named_key(name) {
            return Some(key);
        }
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) if ch.is_ascii_alphanumeric() => {
                Some(Self::Character(ch.to_ascii_uppercase()))
            }
            _ => None,
        }
    }
}

fn parse_named_key(name: &str) -> Option<KeyCode> {
    use NamedKey::*;
    let key = match name {
        "Tab" => Tab,
        "Left" | "ArrowLeft" => Left,
        "Right" | "ArrowRight" => Right,
        "Up" | "ArrowUp" => Up,
        "Down" | "ArrowDown" => Down,
        "PageUp" => PageUp,
        "PageDown" => PageDown,
        _ => return None,
    };
    Some(KeyCode::Named(key))
}

/// Keys the tuning panel reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Tab,
    Left,
    Right,
    Up,
    Down,
    PageUp,
    PageDown,
}

/// Translates a winit logical key. Keys the panel never handles map to `None`.
pub fn map_winit_key(key: &winit::keyboard::Key) -> Option<KeyCode> {
    use winit::keyboard::{Key, NamedKey as Winit};
    match key {
        Key::Named(named) => {
            let named = match named {
                Winit::Tab => NamedKey::Tab,
                Winit::ArrowLeft => NamedKey::Left,
                Winit::ArrowRight => NamedKey::Right,
                Winit::ArrowUp => NamedKey::Up,
                Winit::ArrowDown => NamedKey::Down,
                Winit::PageUp => NamedKey::PageUp,
                Winit::PageDown => NamedKey::PageDown,
                _ => return None,
            };
            Some(KeyCode::Named(named))
        }
        Key::Character(text) => KeyCode::from_name(text.as_str()),
        _ => None,
    }
}

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);
    pub const MIDDLE: Self = Self(1);
    pub const RIGHT: Self = Self(2);
}

impl From<winit::event::MouseButton> for MouseButton {
    fn from(button: winit::event::MouseButton) -> Self {
        use winit::event::MouseButton as Winit;
        match button {
            Winit::Left => Self::LEFT,
            Winit::Middle => Self::MIDDLE,
            Winit::Right => Self::RIGHT,
            Winit::Back => Self(3),
            Winit::Forward => Self(4),
            Winit::Other(index) => Self(index.min(u8::MAX as u16) as u8),
        }
    }
}

/// Turns raw pointer and touch events into orbit gestures.
///
/// Positions are logical pixels. Left drag rotates, right drag pans and middle
/// drag dollies. One finger rotates; two fingers pinch to dolly and drag to pan.
#[derive(Debug, Default)]
pub struct PointerTracker {
    buttons: HashSet<MouseButton>,
    position: Option<Vec2>,
    touches: HashMap<u64, Vec2>,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_button_down(&self, button: MouseButton) -> bool {
        self.buttons.contains(&button)
    }

    pub fn touch_count(&self) -> usize {
        self.touches.len()
    }

    pub fn button_down(&mut self, button: MouseButton) {
        self.buttons.insert(button);
    }

    pub fn button_up(&mut self, button: MouseButton) {
        self.buttons.remove(&button);
    }

    pub fn pointer_left(&mut self) {
        self.buttons.clear();
        self.position = None;
    }

    pub fn pointer_moved(
        &mut self,
        position: Vec2,
        client_height: f32,
        controls: &mut OrbitControls,
        camera: &PerspectiveCamera,
    ) {
        let previous = self.position.replace(position);
        let Some(previous) = previous else {
            return;
        };
        let delta = position - previous;
        if self.is_button_down(MouseButton::LEFT) {
            controls.rotate(delta, client_height);
        } else if self.is_button_down(MouseButton::RIGHT) {
            controls.pan(delta, client_height, camera);
        } else if self.is_button_down(MouseButton::MIDDLE) && delta.y != 0.0 {
            controls.dolly(if delta.y < 0.0 { 1.0 } else { -1.0 });
        }
    }

    /// `steps` is positive when the wheel moves away from the user.
    pub fn wheel(&mut self, steps: f32, controls: &mut OrbitControls) {
        if steps.is_finite() {
            controls.dolly(steps);
        }
    }

    pub fn touch_started(&mut self, id: u64, position: Vec2) {
        self.touches.insert(id, position);
    }

    pub fn touch_ended(&mut self, id: u64) {
        self.touches.remove(&id);
    }

    pub fn touch_moved(
        &mut self,
        id: u64,
        position: Vec2,
        client_height: f32,
        controls: &mut OrbitControls,
        camera: &PerspectiveCamera,
    ) {
        let before = self.touch_pair();
        let Some(previous) = self.touches.insert(id, position) else {
            return;
        };
        match (self.touches.len(), before, self.touch_pair()) {
            (1, _, _) => controls.rotate(position - previous, client_height),
            (_, Some((a0, b0)), Some((a1, b1))) => {
                let distance = a1.distance(b1);
                if distance > 0.0 {
                    controls.dolly_by_ratio(a0.distance(b0) / distance);
                }
                let midpoint_delta = (a1 + b1) / 2.0 - (a0 + b0) / 2.0;
                controls.pan(midpoint_delta, client_height, camera);
            }
            _ => {}
        }
    }

    /// The two lowest-numbered touches, so the pair is stable across events.
    fn touch_pair(&self) -> Option<(Vec2, Vec2)> {
        let mut ids: Vec<_> = self.touches.keys().copied().collect();
        if ids.len() < 2 {
            return None;
        }
        ids.sort_unstable();
        Some((self.touches[&ids[0]], self.touches[&ids[1]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn camera() -> PerspectiveCamera {
        let mut camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 100.0);
        camera.position = Vec3::new(1.0, 1.0, 1.0);
        camera
    }

    #[test]
    fn parses_named_and_character_keys() {
        assert_eq!(KeyCode::from_name("Tab"), Some(KeyCode::Named(NamedKey::Tab)));
        assert_eq!(
            KeyCode::from_name("ArrowUp"),
            Some(KeyCode::Named(NamedKey::Up))
        );
        assert_eq!(KeyCode::from_name("h"), Some(KeyCode::Character('H')));
        assert_eq!(KeyCode::from_name("Shift"), None);
    }

    #[test]
    fn maps_winit_keys() {
        use winit::keyboard::{Key, NamedKey as Winit};
        assert_eq!(
            map_winit_key(&Key::Named(Winit::PageUp)),
            Some(KeyCode::Named(NamedKey::PageUp))
        );
        assert_eq!(
            map_winit_key(&Key::Character("h".into())),
            Some(KeyCode::Character('H'))
        );
        assert_eq!(map_winit_key(&Key::Named(Winit::Shift)), None);
    }

    #[test]
    fn left_drag_rotates_the_camera() {
        let mut tracker = PointerTracker::new();
        let mut controls = OrbitControls::new();
        let mut camera = camera();
        tracker.pointer_moved(Vec2::new(10.0, 10.0), 600.0, &mut controls, &camera);
        tracker.button_down(MouseButton::LEFT);
        tracker.pointer_moved(Vec2::new(60.0, 10.0), 600.0, &mut controls, &camera);
        assert!(controls.update(&mut camera));
    }

    #[test]
    fn hover_without_buttons_does_nothing() {
        let mut tracker = PointerTracker::new();
        let mut controls = OrbitControls::new();
        let mut camera = camera();
        tracker.pointer_moved(Vec2::ZERO, 600.0, &mut controls, &camera);
        tracker.pointer_moved(Vec2::new(80.0, 40.0), 600.0, &mut controls, &camera);
        assert!(!controls.update(&mut camera));
    }

    #[test]
    fn pinch_apart_zooms_in() {
        let mut tracker = PointerTracker::new();
        let mut controls = OrbitControls::new();
        let mut camera = camera();
        let radius = camera.position.length();
        tracker.touch_started(1, Vec2::new(100.0, 100.0));
        tracker.touch_started(2, Vec2::new(200.0, 100.0));
        tracker.touch_moved(2, Vec2::new(300.0, 100.0), 600.0, &mut controls, &camera);
        tracker.touch_moved(1, Vec2::new(0.0, 100.0), 600.0, &mut controls, &camera);
        controls.update(&mut camera);
        assert!((camera.target - Vec3::ZERO).length() < 1e-5);
        assert!(camera.position.length() < radius);
        assert_eq!(tracker.touch_count(), 2);
    }
}
