//! Pixel type and scene colors

use bytemuck::{Pod, Zeroable};

/// One RGBA8 pixel, laid out exactly as the encoder expects
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(c: [u8; 3]) -> Self {
        Self::new(c[0], c[1], c[2], 255)
    }

    pub fn with_alpha(self, alpha: f32) -> Self {
        Self {
            a: (alpha.clamp(0.0, 1.0) * 255.0) as u8,
            ..self
        }
    }

    /// Move toward white by `t` in 0..=1
    pub fn lighten(self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let up = |c: u8| (c as f32 + (255.0 - c as f32) * t) as u8;
        Self {
            r: up(self.r),
            g: up(self.g),
            b: up(self.b),
            a: self.a,
        }
    }

    /// Source-over blend onto an opaque destination
    pub fn blend_over(self, dst: Rgba) -> Rgba {
        if self.a == 255 {
            return self;
        }
        let a = self.a as u32;
        let mix = |s: u8, d: u8| ((s as u32 * a + d as u32 * (255 - a) + 127) / 255) as u8;
        Rgba {
            r: mix(self.r, dst.r),
            g: mix(self.g, dst.g),
            b: mix(self.b, dst.b),
            a: 255,
        }
    }
}

/// Colors for scene elements
pub mod colors {
    use super::Rgba;

    pub const BOUNDARY: Rgba = Rgba::new(70, 70, 90, 255);
    pub const WIN_ZONE: Rgba = Rgba::new(60, 220, 120, 110);
    pub const WIN_ZONE_EDGE: Rgba = Rgba::new(120, 255, 170, 255);
    pub const DEADLY: Rgba = Rgba::new(230, 50, 50, 255);
    pub const HP_PIP: Rgba = Rgba::new(255, 255, 255, 220);
    pub const TOMBSTONE: Rgba = Rgba::new(90, 90, 90, 255);
    pub const FINISHED_RING: Rgba = Rgba::new(255, 215, 80, 255);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_extremes() {
        let dst = Rgba::new(0, 0, 0, 255);
        assert_eq!(Rgba::new(200, 100, 50, 255).blend_over(dst), Rgba::new(200, 100, 50, 255));
        assert_eq!(Rgba::new(200, 100, 50, 0).blend_over(dst), dst);
        let half = Rgba::new(255, 255, 255, 128).blend_over(dst);
        assert!(half.r > 120 && half.r < 135);
    }

    #[test]
    fn test_pixel_is_four_bytes() {
        assert_eq!(std::mem::size_of::<Rgba>(), 4);
        let px = [Rgba::new(1, 2, 3, 4)];
        assert_eq!(bytemuck::cast_slice::<Rgba, u8>(&px), &[1, 2, 3, 4]);
    }
}
