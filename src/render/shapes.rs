//! Shape generation for scene primitives
//!
//! Everything here works in world meters and returns outlines or rectangles
//! for the canvas after scaling to pixels.

use glam::Vec2;

use crate::rotate;

/// 3x5 bitmap digits, one row per entry, high bit on the left
const DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b010, 0b010, 0b010],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

/// Corners of a rotated square racer
pub fn racer_outline(pos: Vec2, angle: f32, size: f32) -> [Vec2; 4] {
    let h = size * 0.5;
    [
        Vec2::new(-h, -h),
        Vec2::new(h, -h),
        Vec2::new(h, h),
        Vec2::new(-h, h),
    ]
    .map(|p| pos + rotate(p, angle))
}

/// Two crossed bars marking where a racer died
pub fn tombstone(pos: Vec2, size: f32) -> [(Vec2, Vec2); 2] {
    let h = size * 0.4;
    [
        (pos + Vec2::new(-h, -h), pos + Vec2::new(h, h)),
        (pos + Vec2::new(-h, h), pos + Vec2::new(h, -h)),
    ]
}

/// Trail opacity, oldest point first
pub fn trail_alpha(index: usize, len: usize) -> f32 {
    if len == 0 {
        return 0.0;
    }
    (index + 1) as f32 / len as f32 * 0.6
}

/// Row of small squares showing remaining hits, centred on `center`
pub fn hp_pips(center: Vec2, hits_left: i32, pip: f32) -> Vec<(Vec2, Vec2)> {
    let n = hits_left.max(0) as usize;
    let gap = pip * 0.5;
    let total = n as f32 * pip + n.saturating_sub(1) as f32 * gap;
    let mut x = center.x - total * 0.5;
    (0..n)
        .map(|_| {
            let min = Vec2::new(x, center.y - pip * 0.5);
            x += pip + gap;
            (min, min + Vec2::splat(pip))
        })
        .collect()
}

/// Filled cells for a number rendered in the 3x5 digit font
pub fn digit_cells(center: Vec2, value: u32, cell: f32) -> Vec<(Vec2, Vec2)> {
    let text = value.to_string();
    let width = text.len() as f32 * 4.0 - 1.0;
    let origin = center - Vec2::new(width, 5.0) * cell * 0.5;
    let mut cells = Vec::new();
    for (i, ch) in text.bytes().enumerate() {
        let glyph = DIGITS[(ch - b'0') as usize];
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..3 {
                if bits & (0b100 >> col) != 0 {
                    let min = origin + Vec2::new((i * 4 + col) as f32, row as f32) * cell;
                    cells.push((min, min + Vec2::splat(cell)));
                }
            }
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_racer_outline_unrotated() {
        let pts = racer_outline(Vec2::new(2.0, 3.0), 0.0, 1.0);
        assert_eq!(pts[0], Vec2::new(1.5, 2.5));
        assert_eq!(pts[2], Vec2::new(2.5, 3.5));
    }

    #[test]
    fn test_pips_centred() {
        let pips = hp_pips(Vec2::ZERO, 3, 2.0);
        assert_eq!(pips.len(), 3);
        let left = pips[0].0.x;
        let right = pips[2].1.x;
        assert!((left + right).abs() < 1e-5);
        assert!(hp_pips(Vec2::ZERO, -1, 2.0).is_empty());
    }

    #[test]
    fn test_digit_cells() {
        // "1" lights 8 cells, "8" lights 13
        assert_eq!(digit_cells(Vec2::ZERO, 1, 1.0).len(), 8);
        assert_eq!(digit_cells(Vec2::ZERO, 8, 1.0).len(), 13);
        assert_eq!(digit_cells(Vec2::ZERO, 11, 1.0).len(), 16);
    }

    #[test]
    fn test_trail_fades_in() {
        assert!(trail_alpha(0, 10) < trail_alpha(9, 10));
        assert_eq!(trail_alpha(0, 0), 0.0);
    }
}
