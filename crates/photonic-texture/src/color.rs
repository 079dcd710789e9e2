//! Normalized color values for the per-pixel feature stages.

/// Rec. 709 luma coefficients.
pub const LUMA_709: [f64; 3] = [0.2126, 0.7152, 0.0722];

/// RGBA color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn from_rgba8([r, g, b, a]: [u8; 4]) -> Self {
        Self {
            r: f64::from(r) / 255.0,
            g: f64::from(g) / 255.0,
            b: f64::from(b) / 255.0,
            a: f64::from(a) / 255.0,
        }
    }

    /// Rec. 709 luminance; alpha is ignored.
    pub fn luminance(&self) -> f64 {
        LUMA_709[0] * self.r + LUMA_709[1] * self.g + LUMA_709[2] * self.b
    }

    /// HSV saturation. Grays, including black, are 0.
    pub fn saturation(&self) -> f64 {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        if max <= 1e-10 {
            return 0.0;
        }
        (max - min) / max
    }
}
