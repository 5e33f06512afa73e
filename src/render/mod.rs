//! Seams between the application state and the GPU.
//!
//! The frame loop and the resize handler only talk to [`SceneRenderer`] and
//! [`RenderTarget`], so both can be exercised without a device or a window.

use bytemuck::{Pod, Zeroable};

use crate::scene::{RenderSettings, WaterScene};
use crate::uniforms::{self, UniformError, UniformStore};

pub mod gpu;

pub use gpu::GpuRenderer;

/// Draws the scene once per call.
pub trait SceneRenderer {
    fn render(&mut self, scene: &WaterScene, uniforms: &UniformStore) -> anyhow::Result<()>;
}

/// Drawable surface whose backing store follows the viewport.
pub trait RenderTarget {
    /// Logical size in CSS pixels.
    fn set_size(&mut self, width: u32, height: u32);
    fn set_pixel_ratio(&mut self, ratio: f64);
}

impl RenderTarget for RenderSettings {
    fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.pixel_ratio = ratio;
    }
}

/// Uniform buffer contents, laid out to match `WaterUniforms` in both WGSL stages.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct WaterUniformBlock {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub depth_color: [f32; 4],
    pub surface_color: [f32; 4],
    pub fog_color: [f32; 4],
    pub big_waves_frequency: [f32; 2],
    pub time: f32,
    pub big_waves_speed: f32,
    pub big_waves_elevation: f32,
    pub color_offset: f32,
    pub color_multiplier: f32,
    pub small_waves_speed: f32,
    pub small_waves_elevation: f32,
    pub small_waves_frequency: f32,
    pub small_iterations: i32,
    pub fog_near: f32,
    pub fog_far: f32,
    pub pad0: f32,
    pub pad1: f32,
    pub pad2: f32,
}

impl WaterUniformBlock {
    pub fn from_scene(scene: &WaterScene, store: &UniformStore) -> Result<Self, UniformError> {
        let camera = &scene.camera;
        Ok(Self {
            projection: camera.projection().to_cols_array_2d(),
            view: camera.view().to_cols_array_2d(),
            model: scene.water.model_matrix().to_cols_array_2d(),
            depth_color: store.color(uniforms::DEPTH_COLOR)?.extend(1.0),
            surface_color: store.color(uniforms::SURFACE_COLOR)?.extend(1.0),
            fog_color: store.color(uniforms::FOG_COLOR)?.extend(1.0),
            big_waves_frequency: store.vec2(uniforms::BIG_WAVES_FREQUENCY)?.into(),
            time: store.float(uniforms::TIME)?,
            big_waves_speed: store.float(uniforms::BIG_WAVES_SPEED)?,
            big_waves_elevation: store.float(uniforms::BIG_WAVES_ELEVATION)?,
            color_offset: store.float(uniforms::COLOR_OFFSET)?,
            color_multiplier: store.float(uniforms::COLOR_MULTIPLIER)?,
            small_waves_speed: store.float(uniforms::SMALL_WAVES_SPEED)?,
            small_waves_elevation: store.float(uniforms::SMALL_WAVES_ELEVATION)?,
            small_waves_frequency: store.float(uniforms::SMALL_WAVES_FREQUENCY)?,
            small_iterations: store.int(uniforms::SMALL_ITERATIONS)?,
            fog_near: store.float(uniforms::FOG_NEAR)?,
            fog_far: store.float(uniforms::FOG_FAR)?,
            pad0: 0.0,
            pad1: 0.0,
            pad2: 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::WaterContext;
    use crate::uniforms::UniformValue;
    use crate::viewport::StaticViewport;
    use std::mem::{offset_of, size_of};

    #[test]
    fn block_matches_the_wgsl_layout() {
        assert_eq!(size_of::<WaterUniformBlock>(), 304);
        assert_eq!(offset_of!(WaterUniformBlock, depth_color), 192);
        assert_eq!(offset_of!(WaterUniformBlock, big_waves_frequency), 240);
        assert_eq!(offset_of!(WaterUniformBlock, time), 248);
        assert_eq!(offset_of!(WaterUniformBlock, small_iterations), 280);
        assert_eq!(offset_of!(WaterUniformBlock, fog_far), 288);
    }

    #[test]
    fn water_shading_ignores_the_light() {
        let ctx = WaterContext::assemble(&StaticViewport::new(800, 600, 1.0)).unwrap();
        let material = &ctx.scene.water.material;
        assert!(!material.fragment_shader.contains("light"));
        assert!(!material.vertex_shader.contains("light"));
    }

    #[test]
    fn block_mirrors_the_store() {
        let mut ctx = WaterContext::assemble(&StaticViewport::new(800, 600, 1.0)).unwrap();
        ctx.uniforms
            .set(uniforms::TIME, UniformValue::Float(2.5))
            .unwrap();
        let block = WaterUniformBlock::from_scene(&ctx.scene, &ctx.uniforms).unwrap();
        assert_eq!(block.time, 2.5);
        assert_eq!(block.small_iterations, 4);
        assert_eq!(block.big_waves_frequency, [0.4, 0.5]);
        assert_eq!(block.fog_near, 5.0);
        assert_eq!(block.fog_color, ctx.scene.fog.color.extend(1.0));
        assert_eq!(block.depth_color[3], 1.0);
    }
}
