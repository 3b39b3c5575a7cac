//! RGBA color type, palette constants and per-thread distinct colors.

use serde::{Deserialize, Serialize};

/// RGBA color with floating-point components in `0.0..=1.0`.
///
/// # Examples
///
/// ```
/// use threadcanvas::draw::Color;
/// let red = Color::rgb(1.0, 0.0, 0.0);
/// let translucent = red.with_alpha(0.5);
/// assert_eq!(translucent.a, 0.5);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color.
    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Opaque color from 0-255 components.
    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgb(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0)
    }

    pub fn with_alpha(self, a: f64) -> Self {
        Self { a, ..self }
    }

    pub fn is_opaque(&self) -> bool {
        self.a >= 1.0
    }

    /// Converts hue/saturation/value to an opaque color.
    ///
    /// `hue` is in sextants (`0.0..6.0`, wrapping), `sat` and `val` in `0.0..=1.0`.
    pub fn from_hsv(hue: f64, sat: f64, val: f64) -> Self {
        let hue = hue.rem_euclid(6.0);
        let sat = sat.clamp(0.0, 1.0);
        let val = val.clamp(0.0, 1.0);

        let sector = hue.floor();
        let f = hue - sector;
        let p = val * (1.0 - sat);
        let q = val * (1.0 - sat * f);
        let t = val * (1.0 - sat * (1.0 - f));

        match sector as u8 {
            0 => Self::rgb(val, t, p),
            1 => Self::rgb(q, val, p),
            2 => Self::rgb(p, val, t),
            3 => Self::rgb(p, q, val),
            4 => Self::rgb(t, p, val),
            _ => Self::rgb(val, p, q),
        }
    }

    /// Visually distinct color for the `index`-th thread or series.
    ///
    /// Consecutive indices map to hues far apart on the color wheel.
    pub fn high_contrast(index: u32) -> Self {
        const PRIME_HUE: u32 = 61;
        const PRIME_SAT: u32 = 71;
        let hue = ((PRIME_HUE.wrapping_mul(index)) % 255) as f64 / 255.0;
        let sat = (255 - (index.wrapping_mul(PRIME_SAT + 1)) % 80) as f64 / 255.0;
        let val = (11 - (index.wrapping_mul(3)) % 7) as f64 / 11.0;
        Self::from_hsv(hue * 6.0, sat, val)
    }
}

pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
pub const YELLOW: Color = Color::rgb(1.0, 1.0, 0.0);
pub const ORANGE: Color = Color::rgb(1.0, 0.5, 0.0);
pub const PINK: Color = Color::rgb(1.0, 0.0, 1.0);
pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);

/// Maps a lowercase color name to a palette constant.
pub fn name_to_color(name: &str) -> Option<Color> {
    match name.to_ascii_lowercase().as_str() {
        "red" => Some(RED),
        "green" => Some(GREEN),
        "blue" => Some(BLUE),
        "yellow" => Some(YELLOW),
        "orange" => Some(ORANGE),
        "pink" => Some(PINK),
        "white" => Some(WHITE),
        "black" => Some(BLACK),
        "transparent" => Some(TRANSPARENT),
        _ => None,
    }
}
