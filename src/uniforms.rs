//! Named shading inputs shared between the tuning panel, the frame loop and
//! the renderer.
//!
//! The store never clamps. Range metadata recorded through [`UniformStore::expose`]
//! describes what the panel widget accepts; programmatic writes such as the
//! per-frame time update bypass it.

use std::fmt;

use glam::Vec2;
use thiserror::Error;

use crate::color::Color;

pub const TIME: &str = "uTime";
pub const BIG_WAVES_SPEED: &str = "uBigWavesSpeed";
pub const BIG_WAVES_ELEVATION: &str = "uBigwavesElevation";
pub const BIG_WAVES_FREQUENCY: &str = "uBigwavesFrequency";
pub const DEPTH_COLOR: &str = "uDepthColor";
pub const SURFACE_COLOR: &str = "uSurfaceColor";
pub const COLOR_OFFSET: &str = "uColorOffset";
pub const COLOR_MULTIPLIER: &str = "uColorMultiplier";
pub const SMALL_WAVES_SPEED: &str = "uSmallwavesSpeed";
pub const SMALL_WAVES_ELEVATION: &str = "uSmallWavesElevation";
pub const SMALL_WAVES_FREQUENCY: &str = "uSmallWavesFrequency";
pub const SMALL_ITERATIONS: &str = "uSmallIterations";
pub const FOG_COLOR: &str = "fogColor";
pub const FOG_NEAR: &str = "fogNear";
pub const FOG_FAR: &str = "fogFar";

/// Current value of a uniform, tagged with its semantic type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2(Vec2),
    Color(Color),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            Self::Float(_) => UniformKind::Float,
            Self::Int(_) => UniformKind::Int,
            Self::Vec2(_) => UniformKind::Vec2,
            Self::Color(_) => UniformKind::Color,
        }
    }
}

impl fmt::Display for UniformValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Vec2(v) => write!(f, "({}, {})", v.x, v.y),
            Self::Color(c) => write!(f, "{c}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Int,
    Vec2,
    Color,
}

impl fmt::Display for UniformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Float => "number",
            Self::Int => "integer",
            Self::Vec2 => "vec2",
            Self::Color => "color",
        };
        f.write_str(name)
    }
}

/// Widget range for a tunable value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TunableRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl TunableRange {
    pub const fn new(min: f32, max: f32, step: f32) -> Self {
        Self { min, max, step }
    }

    /// Clamps first, then snaps to the nearest step.
    pub fn constrain(&self, value: f32) -> f32 {
        let clamped = value.clamp(self.min, self.max);
        if self.step <= 0.0 {
            return clamped;
        }
        let step = self.step as f64;
        let snapped = (clamped as f64 / step).round() * step;
        // Trim the representation error `step` picks up in f32.
        let scale = 10f64.powi(step_decimals(self.step) as i32);
        ((snapped * scale).round() / scale) as f32
    }
}

/// Number of decimal places a step size carries (`0.001` -> 3, `1` -> 0).
pub fn step_decimals(step: f32) -> usize {
    if step > 0.0 {
        (-step.log10()).round().max(0.0) as usize
    } else {
        3
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UniformError {
    #[error("unknown uniform `{0}`")]
    Unknown(String),
    #[error("uniform `{name}` holds a {expected}, not a {found}")]
    TypeMismatch {
        name: String,
        expected: UniformKind,
        found: UniformKind,
    },
    #[error("uniform `{0}` is already declared")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Uniform {
    pub name: String,
    pub value: UniformValue,
    pub range: Option<TunableRange>,
}

/// Ordered collection of uniforms, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformStore {
    entries: Vec<Uniform>,
}

impl UniformStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(
        &mut self,
        name: impl Into<String>,
        value: UniformValue,
    ) -> Result<(), UniformError> {
        let name = name.into();
        if self.position(&name).is_some() {
            return Err(UniformError::Duplicate(name));
        }
        self.entries.push(Uniform {
            name,
            value,
            range: None,
        });
        Ok(())
    }

    /// Records the panel range for a uniform. Does not touch the value.
    pub fn expose(&mut self, name: &str, range: TunableRange) -> Result<(), UniformError> {
        self.entry_mut(name)?.range = Some(range);
        Ok(())
    }

    /// Overwrites the value. The semantic type must match the declaration.
    pub fn set(&mut self, name: &str, value: UniformValue) -> Result<(), UniformError> {
        let entry = self.entry_mut(name)?;
        if entry.value.kind() != value.kind() {
            return Err(UniformError::TypeMismatch {
                name: name.to_string(),
                expected: entry.value.kind(),
                found: value.kind(),
            });
        }
        entry.value = value;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<UniformValue, UniformError> {
        self.entry(name).map(|entry| entry.value)
    }

    pub fn range(&self, name: &str) -> Result<Option<TunableRange>, UniformError> {
        self.entry(name).map(|entry| entry.range)
    }

    pub fn float(&self, name: &str) -> Result<f32, UniformError> {
        match self.get(name)? {
            UniformValue::Float(v) => Ok(v),
            other => Err(mismatch(name, other.kind(), UniformKind::Float)),
        }
    }

    pub fn int(&self, name: &str) -> Result<i32, UniformError> {
        match self.get(name)? {
            UniformValue::Int(v) => Ok(v),
            other => Err(mismatch(name, other.kind(), UniformKind::Int)),
        }
    }

    pub fn vec2(&self, name: &str) -> Result<Vec2, UniformError> {
        match self.get(name)? {
            UniformValue::Vec2(v) => Ok(v),
            other => Err(mismatch(name, other.kind(), UniformKind::Vec2)),
        }
    }

    pub fn color(&self, name: &str) -> Result<Color, UniformError> {
        match self.get(name)? {
            UniformValue::Color(v) => Ok(v),
            other => Err(mismatch(name, other.kind(), UniformKind::Color)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Uniform> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.name == name)
    }

    fn entry(&self, name: &str) -> Result<&Uniform, UniformError> {
        self.position(name)
            .map(|index| &self.entries[index])
            .ok_or_else(|| UniformError::Unknown(name.to_string()))
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut Uniform, UniformError> {
        match self.position(name) {
            Some(index) => Ok(&mut self.entries[index]),
            None => Err(UniformError::Unknown(name.to_string())),
        }
    }
}

fn mismatch(name: &str, expected: UniformKind, found: UniformKind) -> UniformError {
    UniformError::TypeMismatch {
        name: name.to_string(),
        expected,
        found,
    }
}
