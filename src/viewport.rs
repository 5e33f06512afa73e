use crate::camera::PerspectiveCamera;
use crate::render::RenderTarget;
use crate::scene::MAX_PIXEL_RATIO;

/// Reports the host's current drawable size and pixel density.
pub trait HostViewport {
    /// Logical (CSS) size.
    fn viewport_size(&self) -> (u32, u32);
    fn device_pixel_ratio(&self) -> f64;
}

/// Host that always reports the same dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticViewport {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f64,
}

impl StaticViewport {
    pub const fn new(width: u32, height: u32, pixel_ratio: f64) -> Self {
        Self {
            width,
            height,
            pixel_ratio,
        }
    }
}

impl HostViewport for StaticViewport {
    fn viewport_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f64,
}

impl Viewport {
    pub fn from_host(host: &impl HostViewport) -> Self {
        let (width, height) = host.viewport_size();
        Self {
            width,
            height,
            pixel_ratio: capped_pixel_ratio(host.device_pixel_ratio()),
        }
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Backing-store size in physical pixels.
    pub fn physical_size(&self) -> (u32, u32) {
        (
            physical_extent(self.width, self.pixel_ratio),
            physical_extent(self.height, self.pixel_ratio),
        )
    }
}

pub fn capped_pixel_ratio(device_pixel_ratio: f64) -> f64 {
    if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
        device_pixel_ratio.min(MAX_PIXEL_RATIO)
    } else {
        1.0
    }
}

pub fn physical_extent(logical: u32, pixel_ratio: f64) -> u32 {
    ((logical as f64 * pixel_ratio).floor() as u32).max(1)
}

/// Re-reads the host size and pushes it into the viewport, camera and render
/// target. Zero-area reports are ignored. Returns whether anything was applied.
pub fn handle_resize(
    host: &impl HostViewport,
    viewport: &mut Viewport,
    camera: &mut PerspectiveCamera,
    target: &mut impl RenderTarget,
) -> bool {
    let (width, height) = host.viewport_size();
    if width == 0 || height == 0 {
        log::debug!("ignoring resize to {width}x{height}");
        return false;
    }

    viewport.width = width;
    viewport.height = height;
    viewport.pixel_ratio = capped_pixel_ratio(host.device_pixel_ratio());

    camera.aspect = width as f32 / height as f32;
    camera.update_projection_matrix();

    target.set_size(width, height);
    target.set_pixel_ratio(viewport.pixel_ratio);
    log::info!(
        "viewport resized to {width}x{height} @{:.2}x",
        viewport.pixel_ratio
    );
    true
}
