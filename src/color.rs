use std::fmt;

use thiserror::Error;

/// RGB color with components in `0.0..=1.0`, stored exactly as decoded from hex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorParseError {
    #[error("color `{0}` must start with `#`")]
    MissingHash(String),
    #[error("color `{0}` must have 3 or 6 hex digits")]
    BadLength(String),
    #[error("color `{0}` contains a non-hex digit")]
    BadDigit(String),
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Decodes `#rrggbb` or the `#rgb` shorthand.
    pub fn from_hex(hex: &str) -> Result<Self, ColorParseError> {
        let digits = hex
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| ColorParseError::MissingHash(hex.to_string()))?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorParseError::BadDigit(hex.to_string()));
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).map(|v| v as f32 / 255.0);
        let parsed = match digits.len() {
            6 => (
                channel(&digits[0..2]),
                channel(&digits[2..4]),
                channel(&digits[4..6]),
            ),
            3 => {
                let expand = |i: usize| digits[i..i + 1].repeat(2);
                (
                    channel(&expand(0)),
                    channel(&expand(1)),
                    channel(&expand(2)),
                )
            }
            _ => return Err(ColorParseError::BadLength(hex.to_string())),
        };
        match parsed {
            (Ok(r), Ok(g), Ok(b)) => Ok(Self { r, g, b }),
            _ => Err(ColorParseError::BadDigit(hex.to_string())),
        }
    }

    pub fn from_rgb8([r, g, b]: [u8; 3]) -> Self {
        Self::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    pub fn to_rgb8(self) -> [u8; 3] {
        let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [byte(self.r), byte(self.g), byte(self.b)]
    }

    /// Lowercase `#rrggbb`.
    pub fn to_hex(self) -> String {
        let [r, g, b] = self.to_rgb8();
        format!("#{r:02x}{g:02x}{b:02x}")
    }

    pub fn extend(self, w: f32) -> [f32; 4] {
        [self.r, self.g, self.b, w]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
