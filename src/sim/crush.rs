//! Bounding boxes and crush detection
//!
//! Walls that grow or move can squash racers. A racer is crushed when the
//! overlap between the wall's box and its own box covers more than a
//! threshold fraction of the racer's box.

use glam::Vec2;

use crate::rotate;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_center(center: Vec2, half: Vec2) -> Self {
        Self::new(center - half, center + half)
    }

    /// Box enclosing `points` (in local space) rotated by `angle` around `center`
    pub fn from_points(center: Vec2, angle: f32, points: &[Vec2]) -> Self {
        let mut min = Vec2::splat(f32::INFINITY);
        let mut max = Vec2::splat(f32::NEG_INFINITY);
        for &p in points {
            let w = center + rotate(p, angle);
            min = min.min(w);
            max = max.max(w);
        }
        if points.is_empty() {
            return Self::from_center(center, Vec2::ZERO);
        }
        Self { min, max }
    }

    /// Box enclosing a rotated rectangle
    pub fn from_rotated_rect(center: Vec2, half: Vec2, angle: f32) -> Self {
        Self::from_points(
            center,
            angle,
            &[
                Vec2::new(-half.x, -half.y),
                Vec2::new(half.x, -half.y),
                Vec2::new(half.x, half.y),
                Vec2::new(-half.x, half.y),
            ],
        )
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn area(&self) -> f32 {
        let s = self.size();
        s.x.max(0.0) * s.y.max(0.0)
    }

    /// Grow by `margin` on every side
    pub fn inflate(&self, margin: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(margin),
            max: self.max + Vec2::splat(margin),
        }
    }

    /// Area of the intersection (0 when disjoint)
    pub fn overlap_area(&self, other: &Aabb) -> f32 {
        let w = self.max.x.min(other.max.x) - self.min.x.max(other.min.x);
        let h = self.max.y.min(other.max.y) - self.min.y.max(other.min.y);
        if w <= 0.0 || h <= 0.0 {
            return 0.0;
        }
        w * h
    }

    /// Strict overlap after inflating `self` by `margin`
    pub fn intersects(&self, other: &Aabb, margin: f32) -> bool {
        let a = self.inflate(margin);
        a.min.x < other.max.x && a.max.x > other.min.x && a.min.y < other.max.y && a.max.y > other.min.y
    }

    /// Whether `other` lies entirely inside `self`
    pub fn contains(&self, other: &Aabb) -> bool {
        other.min.x >= self.min.x
            && other.min.y >= self.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }
}

/// Fraction of the racer's box covered by the wall's box, in `0..=1`
///
/// The overlap is clamped to the racer's own area so walls far larger than the
/// racer cannot report more than full coverage.
pub fn crush_fraction(racer: &Aabb, wall: &Aabb) -> f32 {
    let racer_area = racer.area();
    if racer_area <= f32::EPSILON {
        return 0.0;
    }
    wall.overlap_area(racer).min(racer_area) / racer_area
}

/// Kill rule: strictly more than `threshold` of the racer covered
pub fn is_crushed(racer: &Aabb, wall: &Aabb, threshold: f32) -> bool {
    crush_fraction(racer, wall) > threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn racer_at(x: f32) -> Aabb {
        Aabb::from_center(Vec2::new(x, 0.0), Vec2::splat(0.5))
    }

    #[test]
    fn test_overlap_area() {
        let a = Aabb::new(Vec2::ZERO, Vec2::new(2.0, 2.0));
        let b = Aabb::new(Vec2::new(1.0, 1.0), Vec2::new(3.0, 3.0));
        assert!((a.overlap_area(&b) - 1.0).abs() < 1e-6);
        let c = Aabb::new(Vec2::new(5.0, 5.0), Vec2::new(6.0, 6.0));
        assert_eq!(a.overlap_area(&c), 0.0);
    }

    #[test]
    fn test_crush_threshold_boundary() {
        // Wall covers x in [-10, 0]; racer is 1x1 centered at x
        let wall = Aabb::new(Vec2::new(-10.0, -5.0), Vec2::new(0.0, 5.0));

        // Exactly half covered: not crushed
        let exact = racer_at(0.0);
        assert!((crush_fraction(&exact, &wall) - 0.5).abs() < 1e-6);
        assert!(!is_crushed(&exact, &wall, 0.5));

        // Just below
        let below = racer_at(0.01);
        assert!(!is_crushed(&below, &wall, 0.5));

        // Just above
        let above = racer_at(-0.01);
        assert!(is_crushed(&above, &wall, 0.5));
    }

    #[test]
    fn test_huge_wall_is_clamped_to_footprint() {
        let wall = Aabb::new(Vec2::splat(-100.0), Vec2::splat(100.0));
        let racer = racer_at(0.0);
        assert!((crush_fraction(&racer, &wall) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rotated_rect_bounds() {
        let b = Aabb::from_rotated_rect(Vec2::ZERO, Vec2::new(1.0, 0.0), std::f32::consts::FRAC_PI_2);
        assert!(b.size().x.abs() < 1e-5);
        assert!((b.size().y - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_intersects_with_margin() {
        let a = Aabb::new(Vec2::ZERO, Vec2::new(1.0, 1.0));
        let b = Aabb::new(Vec2::new(1.01, 0.0), Vec2::new(2.0, 1.0));
        assert!(!a.intersects(&b, 0.0));
        assert!(a.intersects(&b, 0.02));
    }

    proptest! {
        #[test]
        fn prop_crush_fraction_in_unit_range(
            rx in -20.0f32..20.0, ry in -20.0f32..20.0,
            wx in -20.0f32..20.0, wy in -20.0f32..20.0,
            ww in 0.0f32..30.0, wh in 0.0f32..30.0,
        ) {
            let racer = Aabb::from_center(Vec2::new(rx, ry), Vec2::splat(0.5));
            let wall = Aabb::from_center(Vec2::new(wx, wy), Vec2::new(ww, wh));
            let f = crush_fraction(&racer, &wall);
            prop_assert!((0.0..=1.0 + 1e-6).contains(&f));
        }
    }
}
