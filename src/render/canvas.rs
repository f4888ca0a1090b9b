//! CPU render target
//!
//! A fixed-size RGBA framebuffer with a few rasterization primitives. Coordinates
//! are pixels with y pointing down; samples are taken at pixel centers.

use glam::Vec2;

use super::pixel::Rgba;
use crate::capture::FrameSource;
use crate::error::CaptureError;

#[derive(Debug, Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
}

impl Canvas {
    /// Allocate a render target
    pub fn new(width: u32, height: u32) -> Result<Self, CaptureError> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .filter(|&n| n > 0)
            .ok_or(CaptureError::RenderTarget { width, height })?;
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|_| CaptureError::RenderTarget { width, height })?;
        pixels.resize(len, Rgba::new(0, 0, 0, 255));
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    /// Raw RGBA bytes
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn clear(&mut self, color: Rgba) {
        self.pixels.fill(color.with_alpha(1.0));
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[(y * self.width + x) as usize])
    }

    /// Blend one pixel; out-of-bounds writes are dropped
    pub fn blend(&mut self, x: i32, y: i32, color: Rgba) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let i = (y as u32 * self.width + x as u32) as usize;
        self.pixels[i] = color.blend_over(self.pixels[i]);
    }

    fn span(&mut self, y: i32, x0: f32, x1: f32, color: Rgba) {
        // pixel centers inside [x0, x1)
        let start = (x0 - 0.5).ceil().max(0.0) as i32;
        let end = ((x1 - 0.5).ceil() as i32).min(self.width as i32);
        for x in start..end {
            self.blend(x, y, color);
        }
    }

    /// Axis-aligned rectangle from `min` to `max`
    pub fn fill_rect(&mut self, min: Vec2, max: Vec2, color: Rgba) {
        let y0 = (min.y - 0.5).ceil().max(0.0) as i32;
        let y1 = ((max.y - 0.5).ceil() as i32).min(self.height as i32);
        for y in y0..y1 {
            self.span(y, min.x, max.x, color);
        }
    }

    /// Even-odd scanline fill of any simple polygon
    pub fn fill_polygon(&mut self, points: &[Vec2], color: Rgba) {
        if points.len() < 3 {
            return;
        }
        let (lo, hi) = points
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
        let y0 = (lo - 0.5).ceil().max(0.0) as i32;
        let y1 = ((hi - 0.5).ceil() as i32).min(self.height as i32);
        let mut crossings = Vec::with_capacity(points.len());
        for y in y0..y1 {
            let sy = y as f32 + 0.5;
            crossings.clear();
            for (i, &a) in points.iter().enumerate() {
                let b = points[(i + 1) % points.len()];
                if (a.y <= sy) != (b.y <= sy) {
                    let t = (sy - a.y) / (b.y - a.y);
                    crossings.push(a.x + t * (b.x - a.x));
                }
            }
            crossings.sort_by(|a, b| a.total_cmp(b));
            for pair in crossings.chunks_exact(2) {
                self.span(y, pair[0], pair[1], color);
            }
        }
    }

    pub fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba) {
        let y0 = (center.y - radius - 0.5).ceil().max(0.0) as i32;
        let y1 = ((center.y + radius - 0.5).ceil() as i32).min(self.height as i32);
        for y in y0..y1 {
            let dy = y as f32 + 0.5 - center.y;
            let half = (radius * radius - dy * dy).max(0.0).sqrt();
            self.span(y, center.x - half, center.x + half, color);
        }
    }

    /// Thick line as a quad
    pub fn line(&mut self, a: Vec2, b: Vec2, width: f32, color: Rgba) {
        let dir = (b - a).normalize_or_zero();
        let perp = Vec2::new(-dir.y, dir.x) * (width * 0.5);
        self.fill_polygon(&[a + perp, b + perp, b - perp, a - perp], color);
    }

    /// Outline of a closed polygon
    pub fn stroke_polygon(&mut self, points: &[Vec2], width: f32, color: Rgba) {
        for (i, &a) in points.iter().enumerate() {
            let b = points[(i + 1) % points.len()];
            self.line(a, b, width, color);
        }
    }
}

impl FrameSource for Canvas {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_pixels(&self, out: &mut Vec<u8>) {
        out.clear();
        out.extend_from_slice(self.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba = Rgba::new(255, 0, 0, 255);

    #[test]
    fn test_zero_size_target_fails() {
        assert!(matches!(
            Canvas::new(0, 10),
            Err(CaptureError::RenderTarget { width: 0, height: 10 })
        ));
    }

    #[test]
    fn test_fill_rect_covers_pixel_centers() {
        let mut c = Canvas::new(8, 8).unwrap();
        c.fill_rect(Vec2::new(2.0, 2.0), Vec2::new(4.0, 4.0), RED);
        let red = c.pixels().iter().filter(|p| **p == RED).count();
        assert_eq!(red, 4);
        assert_eq!(c.get(2, 2), Some(RED));
        assert_eq!(c.get(4, 4), Some(Rgba::new(0, 0, 0, 255)));
    }

    #[test]
    fn test_polygon_matches_rect() {
        let mut a = Canvas::new(16, 16).unwrap();
        let mut b = Canvas::new(16, 16).unwrap();
        a.fill_rect(Vec2::new(3.0, 5.0), Vec2::new(11.0, 9.0), RED);
        b.fill_polygon(
            &[
                Vec2::new(3.0, 5.0),
                Vec2::new(11.0, 5.0),
                Vec2::new(11.0, 9.0),
                Vec2::new(3.0, 9.0),
            ],
            RED,
        );
        assert_eq!(a.pixels(), b.pixels());
    }

    #[test]
    fn test_offscreen_drawing_is_clipped() {
        let mut c = Canvas::new(4, 4).unwrap();
        c.fill_circle(Vec2::new(-10.0, -10.0), 3.0, RED);
        c.fill_rect(Vec2::new(-5.0, -5.0), Vec2::new(1.0, 1.0), RED);
        assert_eq!(c.get(0, 0), Some(RED));
        assert_eq!(c.pixels().iter().filter(|p| **p == RED).count(), 1);
    }

    #[test]
    fn test_frame_source_bytes() {
        let mut c = Canvas::new(2, 1).unwrap();
        c.clear(Rgba::new(1, 2, 3, 0));
        let mut out = Vec::new();
        c.read_pixels(&mut out);
        assert_eq!(out, vec![1, 2, 3, 255, 1, 2, 3, 255]);
    }
}
