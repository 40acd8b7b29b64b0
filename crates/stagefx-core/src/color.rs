//! Abstract color triplets
//!
//! Effects speak in hue/saturation/lightness. Turning that into RGB mixing
//! or a color-wheel slot is left to the fixture layer; `to_rgb` exists for
//! previews and logging.

use serde::{Deserialize, Serialize};

/// Hue in degrees `[0, 360)`, saturation and lightness in percent `[0, 100]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsl {
    /// Hue (degrees)
    pub h: f32,
    /// Saturation (percent)
    pub s: f32,
    /// Lightness (percent)
    pub l: f32,
}

impl Default for Hsl {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Hsl {
    /// Neutral full white
    pub const WHITE: Hsl = Hsl::new(0.0, 0.0, 100.0);
    /// Black
    pub const BLACK: Hsl = Hsl::new(0.0, 0.0, 0.0);

    /// Create a color
    pub const fn new(h: f32, s: f32, l: f32) -> Self {
        Self { h, s, l }
    }

    /// True when every component is a finite number
    pub fn is_finite(&self) -> bool {
        self.h.is_finite() && self.s.is_finite() && self.l.is_finite()
    }

    /// Same color with hue wrapped into `[0, 360)` and s/l clamped
    pub fn normalized(&self) -> Self {
        Self {
            h: self.h.rem_euclid(360.0),
            s: self.s.clamp(0.0, 100.0),
            l: self.l.clamp(0.0, 100.0),
        }
    }

    /// Interpolate toward `other`, taking the short way around the hue circle
    pub fn lerp(&self, other: &Hsl, t: f32) -> Hsl {
        let t = t.clamp(0.0, 1.0);
        let mut dh = (other.h - self.h).rem_euclid(360.0);
        if dh > 180.0 {
            dh -= 360.0;
        }
        Hsl {
            h: (self.h + dh * t).rem_euclid(360.0),
            s: self.s + (other.s - self.s) * t,
            l: self.l + (other.l - self.l) * t,
        }
    }

    /// Convert to 8-bit RGB
    pub fn to_rgb(&self) -> [u8; 3] {
        let c = self.normalized();
        let s = c.s / 100.0;
        let l = c.l / 100.0;

        let chroma = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let h = c.h / 60.0;
        let x = chroma * (1.0 - (h % 2.0 - 1.0).abs());
        let m = l - chroma / 2.0;

        let (r, g, b) = match h as u32 {
            0 => (chroma, x, 0.0),
            1 => (x, chroma, 0.0),
            2 => (0.0, chroma, x),
            3 => (0.0, x, chroma),
            4 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };

        [to_byte(r + m), to_byte(g + m), to_byte(b + m)]
    }

    /// Convert from 8-bit RGB
    pub fn from_rgb(rgb: [u8; 3]) -> Self {
        let [r, g, b] = rgb.map(|v| f32::from(v) / 255.0);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;

        if (max - min).abs() < f32::EPSILON {
            return Hsl::new(0.0, 0.0, l * 100.0);
        }

        let d = max - min;
        let s = if l > 0.5 {
            d / (2.0 - max - min)
        } else {
            d / (max + min)
        };
        let h = if max == r {
            ((g - b) / d).rem_euclid(6.0)
        } else if max == g {
            (b - r) / d + 2.0
        } else {
            (r - g) / d + 4.0
        };

        Hsl::new(h * 60.0, s * 100.0, l * 100.0)
    }
}

fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_colors() {
        assert_eq!(Hsl::new(0.0, 100.0, 50.0).to_rgb(), [255, 0, 0]);
        assert_eq!(Hsl::new(120.0, 100.0, 50.0).to_rgb(), [0, 255, 0]);
        assert_eq!(Hsl::new(240.0, 100.0, 50.0).to_rgb(), [0, 0, 255]);
        assert_eq!(Hsl::WHITE.to_rgb(), [255, 255, 255]);
        assert_eq!(Hsl::BLACK.to_rgb(), [0, 0, 0]);
    }

    #[test]
    fn test_rgb_to_hsl() {
        let cyan = Hsl::from_rgb([0, 255, 255]);
        assert!((cyan.h - 180.0).abs() < 0.01);
        assert!((cyan.s - 100.0).abs() < 0.01);
        assert!((cyan.l - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_lerp_takes_short_hue_path() {
        let a = Hsl::new(350.0, 100.0, 50.0);
        let b = Hsl::new(10.0, 100.0, 50.0);
        let mid = a.lerp(&b, 0.5);
        assert!(mid.h < 0.01 || mid.h > 359.99, "hue was {}", mid.h);
    }

    #[test]
    fn test_normalized_wraps_hue() {
        let c = Hsl::new(-30.0, 150.0, -5.0).normalized();
        assert_eq!(c.h, 330.0);
        assert_eq!(c.s, 100.0);
        assert_eq!(c.l, 0.0);
    }
}
