use glam::Vec2;
use thiserror::Error;

use crate::camera::PerspectiveCamera;
use crate::color::{Color, ColorParseError};
use crate::controls::OrbitControls;
use crate::scene::{
    Fog, PlaneGeometry, PointLight, RenderSettings, Side, WaterMaterial, WaterMesh, WaterScene,
    BACKGROUND_COLOR, CAMERA_FAR, CAMERA_FOV, CAMERA_NEAR, CAMERA_POSITION, FRAGMENT_SHADER,
    PLANE_SEGMENTS, PLANE_SIZE, VERTEX_SHADER,
};
use crate::uniforms::{self, UniformError, UniformStore, UniformValue};
use crate::viewport::{HostViewport, Viewport};

pub const DEFAULT_DEPTH_COLOR: &str = "#065589";
pub const DEFAULT_SURFACE_COLOR: &str = "#9bd8ff";

/// Editable hex strings behind the color pickers. The shading colors in the
/// uniform store are derived from these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugColors {
    pub depth_color: String,
    pub surface_color: String,
}

impl Default for DebugColors {
    fn default() -> Self {
        Self {
            depth_color: DEFAULT_DEPTH_COLOR.to_string(),
            surface_color: DEFAULT_SURFACE_COLOR.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssemblyError {
    #[error(transparent)]
    Uniform(#[from] UniformError),
    #[error(transparent)]
    Color(#[from] ColorParseError),
}

/// All mutable application state, owned in one place and lent to the panel,
/// the frame loop and the resize handler.
#[derive(Debug, Clone)]
pub struct WaterContext {
    pub uniforms: UniformStore,
    pub debug: DebugColors,
    pub scene: WaterScene,
    pub controls: OrbitControls,
    pub viewport: Viewport,
}

impl WaterContext {
    /// Builds the fixed scene against the host's current viewport.
    pub fn assemble(host: &impl HostViewport) -> Result<Self, AssemblyError> {
        let viewport = Viewport::from_host(host);

        let fog = Fog::default();
        let light = PointLight::default();

        let geometry = PlaneGeometry::new(PLANE_SIZE, PLANE_SIZE, PLANE_SEGMENTS, PLANE_SEGMENTS);
        let debug = DebugColors::default();
        let uniforms = water_uniforms(&debug, &fog)?;
        let material = WaterMaterial {
            side: Side::Double,
            fog: true,
            vertex_shader: VERTEX_SHADER,
            fragment_shader: FRAGMENT_SHADER,
            uniforms: SHADING_INPUTS.to_vec(),
        };
        let water = WaterMesh::new(geometry, material);

        let mut camera = PerspectiveCamera::new(CAMERA_FOV, viewport.aspect(), CAMERA_NEAR, CAMERA_FAR);
        camera.position = CAMERA_POSITION;

        let render = RenderSettings {
            width: viewport.width,
            height: viewport.height,
            pixel_ratio: viewport.pixel_ratio,
            clear_color: BACKGROUND_COLOR,
        };

        let mut controls = OrbitControls::new();
        controls.enable_damping = true;

        let scene = WaterScene {
            fog,
            light,
            water,
            camera,
            render,
        };
        log::info!("{}", scene.summary());

        Ok(Self {
            uniforms,
            debug,
            scene,
            controls,
            viewport,
        })
    }
}

const SHADING_INPUTS: &[&str] = &[
    uniforms::TIME,
    uniforms::BIG_WAVES_SPEED,
    uniforms::BIG_WAVES_ELEVATION,
    uniforms::BIG_WAVES_FREQUENCY,
    uniforms::DEPTH_COLOR,
    uniforms::SURFACE_COLOR,
    uniforms::COLOR_OFFSET,
    uniforms::COLOR_MULTIPLIER,
    uniforms::SMALL_WAVES_SPEED,
    uniforms::SMALL_WAVES_ELEVATION,
    uniforms::SMALL_WAVES_FREQUENCY,
    uniforms::SMALL_ITERATIONS,
    uniforms::FOG_COLOR,
    uniforms::FOG_NEAR,
    uniforms::FOG_FAR,
];

fn water_uniforms(debug: &DebugColors, fog: &Fog) -> Result<UniformStore, AssemblyError> {
    let depth = Color::from_hex(&debug.depth_color)?;
    let surface = Color::from_hex(&debug.surface_color)?;

    let mut store = UniformStore::new();
    let defaults = [
        (uniforms::TIME, UniformValue::Float(0.0)),
        (uniforms::BIG_WAVES_SPEED, UniformValue::Float(0.75)),
        (uniforms::BIG_WAVES_ELEVATION, UniformValue::Float(0.07)),
        (
            uniforms::BIG_WAVES_FREQUENCY,
            UniformValue::Vec2(Vec2::new(0.4, 0.5)),
        ),
        (uniforms::DEPTH_COLOR, UniformValue::Color(depth)),
        (uniforms::SURFACE_COLOR, UniformValue::Color(surface)),
        (uniforms::COLOR_OFFSET, UniformValue::Float(0.022)),
        (uniforms::COLOR_MULTIPLIER, UniformValue::Float(3.6)),
        (uniforms::SMALL_WAVES_SPEED, UniformValue::Float(0.5)),
        (uniforms::SMALL_WAVES_ELEVATION, UniformValue::Float(0.063)),
        (uniforms::SMALL_WAVES_FREQUENCY, UniformValue::Float(0.7)),
        (uniforms::SMALL_ITERATIONS, UniformValue::Int(4)),
        (uniforms::FOG_COLOR, UniformValue::Color(fog.color)),
        (uniforms::FOG_NEAR, UniformValue::Float(fog.near)),
        (uniforms::FOG_FAR, UniformValue::Float(fog.far)),
    ];
    for (name, value) in defaults {
        store.declare(name, value)?;
    }
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::StaticViewport;
    use glam::Vec3;

    fn context() -> WaterContext {
        WaterContext::assemble(&StaticViewport::new(1600, 900, 3.0)).unwrap()
    }

    #[test]
    fn assembly_seeds_literal_defaults() {
        let ctx = context();
        let u = &ctx.uniforms;
        assert_eq!(u.float(uniforms::TIME).unwrap(), 0.0);
        assert_eq!(u.float(uniforms::BIG_WAVES_SPEED).unwrap(), 0.75);
        assert_eq!(u.float(uniforms::BIG_WAVES_ELEVATION).unwrap(), 0.07);
        assert_eq!(
            u.vec2(uniforms::BIG_WAVES_FREQUENCY).unwrap(),
            Vec2::new(0.4, 0.5)
        );
        assert_eq!(u.color(uniforms::DEPTH_COLOR).unwrap().to_hex(), "#065589");
        assert_eq!(u.color(uniforms::SURFACE_COLOR).unwrap().to_hex(), "#9bd8ff");
        assert_eq!(u.float(uniforms::COLOR_OFFSET).unwrap(), 0.022);
        assert_eq!(u.float(uniforms::COLOR_MULTIPLIER).unwrap(), 3.6);
        assert_eq!(u.float(uniforms::SMALL_WAVES_SPEED).unwrap(), 0.5);
        assert_eq!(u.float(uniforms::SMALL_WAVES_ELEVATION).unwrap(), 0.063);
        assert_eq!(u.float(uniforms::SMALL_WAVES_FREQUENCY).unwrap(), 0.7);
        assert_eq!(u.int(uniforms::SMALL_ITERATIONS).unwrap(), 4);
        assert_eq!(u.color(uniforms::FOG_COLOR).unwrap().to_hex(), "#d1dcdf");
        assert_eq!(u.float(uniforms::FOG_NEAR).unwrap(), 5.0);
        assert_eq!(u.float(uniforms::FOG_FAR).unwrap(), 15.0);
        assert_eq!(u.len(), SHADING_INPUTS.len());
    }

    #[test]
    fn assembly_builds_the_fixed_scene() {
        let ctx = context();
        let scene = &ctx.scene;
        assert_eq!(scene.light.position, Vec3::new(0.0, 2.2, 2.7));
        assert_eq!(scene.light.color.to_hex(), "#ff7d46");
        assert_eq!(scene.light.distance, 7.0);
        assert_eq!(scene.water.material.side, Side::Double);
        assert!(scene.water.material.fog);
        assert_eq!(scene.water.geometry.width_segments, 258);
        assert_eq!(scene.camera.position, Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(scene.camera.fov, 75.0);
        assert_eq!(scene.camera.aspect, 1600.0 / 900.0);
        assert_eq!(scene.render.pixel_ratio, 2.0);
        assert_eq!((scene.render.width, scene.render.height), (1600, 900));
        assert!(ctx.controls.enable_damping);
    }

    #[test]
    fn material_declares_every_stored_uniform() {
        let ctx = context();
        for uniform in ctx.uniforms.iter() {
            assert!(ctx
                .scene
                .water
                .material
                .uniforms
                .contains(&uniform.name.as_str()));
        }
    }
}
