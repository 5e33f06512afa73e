//! Damped orbit camera control driven by pointer and touch gestures.

use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};

use crate::camera::PerspectiveCamera;

const EPS: f32 = 1e-6;

/// Spherical coordinates around the orbit target. `phi` is measured from +Y,
/// `theta` around Y starting at +Z.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Spherical {
    radius: f32,
    phi: f32,
    theta: f32,
}

impl Spherical {
    fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius == 0.0 {
            return Self::default();
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    fn to_offset(self) -> Vec3 {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vec3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    spherical_delta: Spherical,
    pan_offset: Vec3,
    scale: f32,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            enable_damping: false,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            spherical_delta: Spherical::default(),
            pan_offset: Vec3::ZERO,
            scale: 1.0,
        }
    }
}

impl OrbitControls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pointer drag by `delta` logical pixels on a viewport `client_height` tall.
    pub fn rotate(&mut self, delta: Vec2, client_height: f32) {
        let height = client_height.max(1.0);
        let delta = delta * self.rotate_speed;
        self.spherical_delta.theta -= TAU * delta.x / height;
        self.spherical_delta.phi -= TAU * delta.y / height;
    }

    /// Positive `steps` zoom in (wheel away from the user).
    pub fn dolly(&mut self, steps: f32) {
        if steps == 0.0 {
            return;
        }
        let zoom_scale = 0.95f32.powf(self.zoom_speed * steps.abs());
        if steps > 0.0 {
            self.scale *= zoom_scale;
        } else {
            self.scale /= zoom_scale;
        }
    }

    /// Pinch gesture: `ratio` is previous finger distance over current.
    pub fn dolly_by_ratio(&mut self, ratio: f32) {
        if ratio.is_finite() && ratio > 0.0 {
            self.scale *= ratio;
        }
    }

    /// Screen-space pan by `delta` logical pixels.
    pub fn pan(&mut self, delta: Vec2, client_height: f32, camera: &PerspectiveCamera) {
        let height = client_height.max(1.0);
        let offset = camera.position - self.target;
        let target_distance = offset.length() * (camera.fov.to_radians() / 2.0).tan();
        let (right, up) = camera.screen_axes();
        self.pan_offset += right * (-2.0 * delta.x * target_distance / height);
        self.pan_offset += up * (2.0 * delta.y * target_distance / height);
    }

    /// Integrates pending gestures into the camera. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let offset = camera.position - self.target;
        let mut spherical = Spherical::from_offset(offset);

        let factor = if self.enable_damping {
            self.damping_factor
        } else {
            1.0
        };
        spherical.theta += self.spherical_delta.theta * factor;
        spherical.phi += self.spherical_delta.phi * factor;
        spherical.phi = spherical
            .phi
            .clamp(self.min_polar_angle, self.max_polar_angle)
            .clamp(EPS, PI - EPS);
        spherical.radius =
            (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        self.target += self.pan_offset * factor;

        let previous = camera.position;
        camera.position = self.target + spherical.to_offset();
        camera.look_at(self.target);

        if self.enable_damping {
            self.spherical_delta.theta *= 1.0 - self.damping_factor;
            self.spherical_delta.phi *= 1.0 - self.damping_factor;
            self.pan_offset *= 1.0 - self.damping_factor;
        } else {
            self.spherical_delta = Spherical::default();
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;

        previous.distance_squared(camera.position) > EPS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> PerspectiveCamera {
        let mut camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 100.0);
        camera.position = Vec3::new(1.0, 1.0, 1.0);
        camera
    }

    #[test]
    fn idle_update_keeps_position_and_looks_at_target() {
        let mut controls = OrbitControls::new();
        controls.enable_damping = true;
        let mut camera = camera();
        let moved = controls.update(&mut camera);
        assert!(!moved);
        assert!(camera.position.distance(Vec3::new(1.0, 1.0, 1.0)) < 1e-5);
        assert_eq!(camera.target, Vec3::ZERO);
    }

    #[test]
    fn damped_rotation_spreads_over_frames() {
        let mut controls = OrbitControls::new();
        controls.enable_damping = true;
        let mut camera = camera();
        let radius = camera.position.length();
        controls.rotate(Vec2::new(100.0, 0.0), 800.0);

        controls.update(&mut camera);
        let first = camera.position;
        controls.update(&mut camera);
        let second = camera.position;

        let step_one = first.distance(Vec3::new(1.0, 1.0, 1.0));
        let step_two = second.distance(first);
        assert!(step_one > 0.0);
        assert!(step_two < step_one);
        assert!((second.length() - radius).abs() < 1e-4);
    }

    #[test]
    fn dolly_in_shrinks_distance() {
        let mut controls = OrbitControls::new();
        let mut camera = camera();
        let radius = camera.position.length();
        controls.dolly(1.0);
        controls.update(&mut camera);
        assert!((camera.position.length() - radius * 0.95).abs() < 1e-4);
    }

    #[test]
    fn polar_angle_stays_off_the_poles() {
        let mut controls = OrbitControls::new();
        let mut camera = camera();
        controls.rotate(Vec2::new(0.0, 10_000.0), 100.0);
        controls.update(&mut camera);
        let offset = camera.position - controls.target;
        assert!(offset.x.abs() + offset.z.abs() > 0.0);
        assert!(offset.y > 0.0);
    }
}
