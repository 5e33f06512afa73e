//! Fixed scene description: fog, a point light, the water plane and its
//! material, the camera, and render target settings.

use std::f32::consts::FRAC_PI_2;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::camera::PerspectiveCamera;
use crate::color::Color;

pub const BACKGROUND_COLOR: Color = Color::new(209.0 / 255.0, 220.0 / 255.0, 223.0 / 255.0);
pub const MAX_PIXEL_RATIO: f64 = 2.0;

pub const PLANE_SIZE: f32 = 40.0;
pub const PLANE_SEGMENTS: u32 = 258;

pub const CAMERA_FOV: f32 = 75.0;
pub const CAMERA_NEAR: f32 = 0.1;
pub const CAMERA_FAR: f32 = 100.0;
pub const CAMERA_POSITION: Vec3 = Vec3::new(1.0, 1.0, 1.0);

pub const VERTEX_SHADER: &str = include_str!("render/shaders/water.vert.wgsl");
pub const FRAGMENT_SHADER: &str = include_str!("render/shaders/water.frag.wgsl");

/// Linear fog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    pub color: Color,
    pub near: f32,
    pub far: f32,
}

impl Default for Fog {
    fn default() -> Self {
        Self {
            color: BACKGROUND_COLOR,
            near: 5.0,
            far: 15.0,
        }
    }
}

/// Panel-tunable light. The water material is unlit and never samples it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub color: Color,
    pub intensity: f32,
    /// Cutoff distance; zero means unlimited.
    pub distance: f32,
    pub position: Vec3,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            color: Color::new(1.0, 125.0 / 255.0, 70.0 / 255.0),
            intensity: 1.0,
            distance: 7.0,
            position: Vec3::new(0.0, 2.2, 2.7),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PlaneVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<PlaneVertex>,
    pub indices: Vec<u32>,
}

/// Plane in local XY facing +Z, subdivided into a regular grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneGeometry {
    pub width: f32,
    pub height: f32,
    pub width_segments: u32,
    pub height_segments: u32,
}

impl PlaneGeometry {
    pub fn new(width: f32, height: f32, width_segments: u32, height_segments: u32) -> Self {
        Self {
            width,
            height,
            width_segments: width_segments.max(1),
            height_segments: height_segments.max(1),
        }
    }

    pub fn vertex_count(&self) -> usize {
        ((self.width_segments + 1) * (self.height_segments + 1)) as usize
    }

    pub fn index_count(&self) -> usize {
        (self.width_segments * self.height_segments * 6) as usize
    }

    pub fn build(&self) -> MeshData {
        let grid_x = self.width_segments;
        let grid_y = self.height_segments;
        let columns = grid_x + 1;
        let segment_width = self.width / grid_x as f32;
        let segment_height = self.height / grid_y as f32;
        let half_width = self.width / 2.0;
        let half_height = self.height / 2.0;

        let mut vertices = Vec::with_capacity(self.vertex_count());
        for iy in 0..=grid_y {
            let y = iy as f32 * segment_height - half_height;
            for ix in 0..=grid_x {
                let x = ix as f32 * segment_width - half_width;
                vertices.push(PlaneVertex {
                    position: [x, -y, 0.0],
                    uv: [ix as f32 / grid_x as f32, 1.0 - iy as f32 / grid_y as f32],
                });
            }
        }

        let mut indices = Vec::with_capacity(self.index_count());
        for iy in 0..grid_y {
            for ix in 0..grid_x {
                let a = ix + columns * iy;
                let b = ix + columns * (iy + 1);
                let c = (ix + 1) + columns * (iy + 1);
                let d = (ix + 1) + columns * iy;
                indices.extend_from_slice(&[a, b, d, b, c, d]);
            }
        }

        MeshData { vertices, indices }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Front,
    Back,
    Double,
}

/// Shader-driven material: two WGSL stages plus the names of the uniforms they read.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterMaterial {
    pub side: Side,
    pub fog: bool,
    pub vertex_shader: &'static str,
    pub fragment_shader: &'static str,
    pub uniforms: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaterMesh {
    pub geometry: PlaneGeometry,
    pub material: WaterMaterial,
    /// Rotation about X that lays the plane flat.
    pub rotation_x: f32,
}

impl WaterMesh {
    pub fn new(geometry: PlaneGeometry, material: WaterMaterial) -> Self {
        Self {
            geometry,
            material,
            rotation_x: -FRAC_PI_2,
        }
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_rotation_x(self.rotation_x)
    }
}

/// Desired render target state. The renderer applies it on creation and the
/// resize handler keeps it current afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f64,
    pub clear_color: Color,
}

/// The whole scene graph. Built once; never replaced.
#[derive(Debug, Clone)]
pub struct WaterScene {
    pub fog: Fog,
    pub light: PointLight,
    pub water: WaterMesh,
    pub camera: PerspectiveCamera,
    pub render: RenderSettings,
}

impl WaterScene {
    pub fn summary(&self) -> String {
        let geometry = &self.water.geometry;
        format!(
            "Water surface: {}x{} units, {}x{} segments ({} vertices, {} triangles)",
            geometry.width,
            geometry.height,
            geometry.width_segments,
            geometry.height_segments,
            geometry.vertex_count(),
            geometry.index_count() / 3
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_grid_has_expected_topology() {
        let plane = PlaneGeometry::new(2.0, 2.0, 2, 2);
        let mesh = plane.build();
        assert_eq!(mesh.vertices.len(), 9);
        assert_eq!(mesh.indices.len(), 24);
        assert_eq!(mesh.vertices[0].position, [-1.0, 1.0, 0.0]);
        assert_eq!(mesh.vertices[0].uv, [0.0, 1.0]);
        assert_eq!(mesh.vertices[8].position, [1.0, -1.0, 0.0]);
        assert_eq!(&mesh.indices[..6], &[0, 3, 1, 3, 4, 1]);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn full_water_plane_needs_wide_indices() {
        let plane = PlaneGeometry::new(PLANE_SIZE, PLANE_SIZE, PLANE_SEGMENTS, PLANE_SEGMENTS);
        assert_eq!(plane.vertex_count(), 259 * 259);
        assert!(plane.vertex_count() > u16::MAX as usize);
        assert_eq!(plane.index_count(), 258 * 258 * 6);
    }

    #[test]
    fn water_lies_in_the_xz_plane() {
        let mesh = WaterMesh::new(
            PlaneGeometry::new(1.0, 1.0, 1, 1),
            WaterMaterial {
                side: Side::Double,
                fog: true,
                vertex_shader: VERTEX_SHADER,
                fragment_shader: FRAGMENT_SHADER,
                uniforms: Vec::new(),
            },
        );
        let up = mesh.model_matrix().transform_vector3(Vec3::Z);
        assert!((up - Vec3::Y).length() < 1e-6);
    }
}
