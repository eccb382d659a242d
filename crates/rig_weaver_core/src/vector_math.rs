//! Pure geometric helpers over 3D points.
//!
//! Segments are given as (start, end) point pairs and the segment vector is
//! always `end - start`. Zero-length segments make the returned directions
//! undefined (NaN propagates); coincident input points are a precondition
//! violation screened for by [`crate::joint_chain::JointChain`] validation,
//! not a recoverable error here.

use bevy::math::Vec3;

/// Euclidean distance between two points.
pub fn magnitude(a: Vec3, b: Vec3) -> f32 {
    a.distance(b)
}

/// Cross-product data for two segments.
#[derive(Debug, Clone, Copy)]
pub struct CrossDirection {
    /// `|v1 x v2| / (|v1| |v2|)`, the sine of the angle between the segments.
    pub sin_theta: f32,
    /// Perpendicular to the plane spanned by the two segments.
    pub cross: Vec3,
    pub cross_magnitude: f32,
}

/// Cross product of the segments `p1_start -> p1_end` and
/// `p2_start -> p2_end`, used to find the normal of a plane defined by two
/// bones (the leg plane, the foot plane).
pub fn cross_direction(
    p1_start: Vec3,
    p1_end: Vec3,
    p2_start: Vec3,
    p2_end: Vec3,
    normalize: bool,
) -> CrossDirection {
    let mut v1 = p1_end - p1_start;
    let mut v2 = p2_end - p2_start;
    let mut mag1 = v1.length();
    let mut mag2 = v2.length();

    if normalize {
        v1 /= mag1;
        v2 /= mag2;
        mag1 = 1.0;
        mag2 = 1.0;
    }

    let cross = v1.cross(v2);
    let cross_magnitude = cross.length();

    CrossDirection {
        sin_theta: cross_magnitude / (mag1 * mag2),
        cross,
        cross_magnitude,
    }
}

/// Dot-product data for two segments.
#[derive(Debug, Clone, Copy)]
pub struct DotDirection {
    /// Signed cosine of the angle between the segments: positive when they
    /// point into the same half space. This is the workhorse of every side
    /// test in the axis classification code.
    pub cos_theta: f32,
    pub dot: f32,
}

pub fn dot_direction(
    p1_start: Vec3,
    p1_end: Vec3,
    p2_start: Vec3,
    p2_end: Vec3,
    normalize: bool,
) -> DotDirection {
    let mut v1 = p1_end - p1_start;
    let mut v2 = p2_end - p2_start;
    let mut mag1 = v1.length();
    let mut mag2 = v2.length();

    if normalize {
        v1 /= mag1;
        v2 /= mag2;
        mag1 = 1.0;
        mag2 = 1.0;
    }

    let dot = v1.dot(v2);

    DotDirection {
        cos_theta: dot / (mag1 * mag2),
        dot,
    }
}

/// `a + t * (b - a)`. `t = 0.5` is the midpoint; values outside `[0, 1]`
/// extrapolate along the same line (used to place pole-vector handles beyond
/// a chain).
pub fn offset_between(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    a + (b - a) * t
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn magnitude_of_a_point_to_itself_is_zero() {
        let p = Vec3::new(1.5, -2.0, 7.25);
        assert_eq!(magnitude(p, p), 0.0);
    }

    #[test]
    fn magnitude_is_symmetric() {
        let a = Vec3::new(1., 2., 3.);
        let b = Vec3::new(-4., 0., 2.);
        assert_eq!(magnitude(a, b), magnitude(b, a));
    }

    #[test]
    fn offset_between_hits_endpoints_and_midpoint() {
        let a = Vec3::new(2., 0., -1.);
        let b = Vec3::new(4., 6., 3.);
        assert_eq!(offset_between(a, b, 0.), a);
        assert_eq!(offset_between(a, b, 1.), b);
        assert_eq!(offset_between(a, b, 0.5), Vec3::new(3., 3., 1.));
    }

    #[test]
    fn offset_between_extrapolates() {
        let a = Vec3::ZERO;
        let b = Vec3::X;
        assert_eq!(offset_between(a, b, 2.0), Vec3::new(2., 0., 0.));
    }

    #[test]
    fn cross_direction_is_antisymmetric_under_segment_swap() {
        let (a, b) = (Vec3::ZERO, Vec3::new(1., 0., 0.));
        let (c, d) = (Vec3::ZERO, Vec3::new(0., 1., 0.));
        let forward = cross_direction(a, b, c, d, false);
        let swapped = cross_direction(c, d, a, b, false);
        assert_eq!(forward.cross, -swapped.cross);
        assert_eq!(forward.sin_theta, swapped.sin_theta);
    }

    #[test]
    fn parallel_segments_have_zero_sine() {
        let result = cross_direction(
            Vec3::ZERO,
            Vec3::new(1., 1., 0.),
            Vec3::new(5., 0., 0.),
            Vec3::new(7., 2., 0.),
            false,
        );
        assert!(result.sin_theta.abs() < 1e-6);
        assert!(result.cross_magnitude < 1e-6);
    }

    #[test]
    fn dot_direction_signs_side_tests() {
        let same_side = dot_direction(Vec3::ZERO, Vec3::X, Vec3::ZERO, Vec3::new(1., 1., 0.), false);
        assert!(same_side.cos_theta > 0.);
        let opposite = dot_direction(Vec3::ZERO, Vec3::X, Vec3::ZERO, Vec3::new(-1., 1., 0.), false);
        assert!(opposite.cos_theta < 0.);
    }

    #[test]
    fn normalize_scales_magnitudes_but_not_angles() {
        let raw = dot_direction(Vec3::ZERO, Vec3::new(3., 0., 0.), Vec3::ZERO, Vec3::new(0., 2., 2.), false);
        let unit = dot_direction(Vec3::ZERO, Vec3::new(3., 0., 0.), Vec3::ZERO, Vec3::new(0., 2., 2.), true);
        assert!((raw.cos_theta - unit.cos_theta).abs() < 1e-6);
        assert!((unit.dot - unit.cos_theta).abs() < 1e-6);
    }
}
