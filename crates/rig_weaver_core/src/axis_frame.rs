//! Classification of a transform's local axes against a named reference
//! frame.
//!
//! Given a transform with a known world orientation and a set of reference
//! points (cross / aim / up, all relative to a shared origin), each local
//! axis is probed at unit offset and matched to the reference it aligns with
//! best. The signed cosine of the winning alignment is kept: it becomes the
//! +/-1 polarity applied later so rotation direction does not depend on which
//! world axis happens to play a given role for this particular limb.

use bevy::math::{Quat, Vec3};

use crate::{
    channels::{Axis, RotateOrder},
    vector_math::{self, offset_between},
};

/// Reference points a foot (or any planar limb end) is classified against.
/// Computed once per rig build from the heel/ankle/toe/hip world positions,
/// immutable afterwards.
#[derive(Debug, Clone, Copy)]
pub struct FootFrame {
    pub heel: Vec3,
    /// Heel offset by the foot-plane normal (cross of heel->ankle and
    /// heel->toe).
    pub cross_point: Vec3,
    /// Heel->toe direction extrapolated past the toe.
    pub aim_point: Vec3,
    pub hip: Vec3,
}

impl FootFrame {
    pub fn from_positions(heel: Vec3, ankle: Vec3, toe: Vec3, hip: Vec3) -> Self {
        let plane = vector_math::cross_direction(heel, ankle, heel, toe, false);
        FootFrame {
            heel,
            cross_point: heel + plane.cross,
            aim_point: offset_between(heel, toe, 1.5),
            hip,
        }
    }
}

/// One local axis matched to a reference direction.
#[derive(Debug, Clone, Copy)]
pub struct AxisPick {
    pub axis: Axis,
    /// Signed cosine of the alignment; magnitude is the match quality.
    pub cosine: f32,
}

impl AxisPick {
    pub fn sign(&self) -> f32 {
        if self.cosine >= 0.0 { 1.0 } else { -1.0 }
    }
}

/// The three named axes of a classified transform.
#[derive(Debug, Clone, Copy)]
pub struct AxesInfo {
    pub cross: AxisPick,
    pub aim: AxisPick,
    pub up: AxisPick,
}

impl AxesInfo {
    /// Rotation order (aim, then cross, then up) so that sequential roll,
    /// bank and pivot edits do not interfere through gimbal coupling.
    /// `None` when two reference names resolved to the same local axis.
    pub fn rotate_order(&self) -> Option<RotateOrder> {
        RotateOrder::from_axes(self.aim.axis, self.cross.axis, self.up.axis)
    }
}

/// Matches each of the transform's local axes to the reference direction it
/// aligns with best.
///
/// The three names map to three *distinct* axes only when the reference
/// vectors are themselves roughly orthogonal. That is a caller precondition
/// and is not verified here; [`AxesInfo::rotate_order`] surfaces the
/// degenerate case.
pub fn classify_axes(world_position: Vec3, world_orientation: Quat, frame: &FootFrame) -> AxesInfo {
    let mut cross: Option<AxisPick> = None;
    let mut aim: Option<AxisPick> = None;
    let mut up: Option<AxisPick> = None;

    for axis in Axis::ALL {
        let probe = world_position + world_orientation * axis.unit();

        for (reference, pick) in [
            (frame.cross_point, &mut cross),
            (frame.aim_point, &mut aim),
            (frame.hip, &mut up),
        ] {
            let cosine =
                vector_math::dot_direction(world_position, probe, frame.heel, reference, false)
                    .cos_theta;
            // Strictly greater: the first axis wins ties, matching the probe
            // order X, Y, Z.
            if pick.is_none_or(|best| cosine.abs() > best.cosine.abs()) {
                *pick = Some(AxisPick { axis, cosine });
            }
        }
    }

    let fallback = AxisPick {
        axis: Axis::X,
        cosine: 0.0,
    };
    AxesInfo {
        cross: cross.unwrap_or(fallback),
        aim: aim.unwrap_or(fallback),
        up: up.unwrap_or(fallback),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn axis_aligned_frame() -> FootFrame {
        // Heel at origin, foot aiming down +Z, hip straight up, plane normal
        // along +X.
        FootFrame {
            heel: Vec3::ZERO,
            cross_point: Vec3::new(2., 0., 0.),
            aim_point: Vec3::new(0., 0., 3.),
            hip: Vec3::new(0., 5., 0.),
        }
    }

    #[test]
    fn identity_transform_classifies_onto_world_axes() {
        let info = classify_axes(Vec3::ZERO, Quat::IDENTITY, &axis_aligned_frame());
        assert_eq!(info.cross.axis, Axis::X);
        assert_eq!(info.aim.axis, Axis::Z);
        assert_eq!(info.up.axis, Axis::Y);
        assert!(info.cross.cosine > 0.9);
        assert_eq!(info.cross.sign(), 1.0);
    }

    #[test]
    fn flipped_transform_keeps_axes_but_flips_polarity() {
        // Rotate 180 degrees about Y: local X now points down world -X.
        let rot = Quat::from_rotation_y(std::f32::consts::PI);
        let info = classify_axes(Vec3::ZERO, rot, &axis_aligned_frame());
        assert_eq!(info.cross.axis, Axis::X);
        assert_eq!(info.cross.sign(), -1.0);
        assert_eq!(info.up.axis, Axis::Y);
        assert_eq!(info.up.sign(), 1.0);
    }

    #[test]
    fn rotate_order_is_aim_cross_up() {
        let info = classify_axes(Vec3::ZERO, Quat::IDENTITY, &axis_aligned_frame());
        // aim = Z, cross = X, up = Y
        assert_eq!(info.rotate_order(), Some(RotateOrder::Zxy));
    }

    #[test]
    fn classification_is_translation_invariant() {
        let frame = axis_aligned_frame();
        let offset_frame = FootFrame {
            heel: frame.heel + Vec3::splat(10.),
            cross_point: frame.cross_point + Vec3::splat(10.),
            aim_point: frame.aim_point + Vec3::splat(10.),
            hip: frame.hip + Vec3::splat(10.),
        };
        let here = classify_axes(Vec3::ZERO, Quat::IDENTITY, &frame);
        let there = classify_axes(Vec3::splat(10.), Quat::IDENTITY, &offset_frame);
        assert_eq!(here.cross.axis, there.cross.axis);
        assert_eq!(here.aim.axis, there.aim.axis);
        assert_eq!(here.up.axis, there.up.axis);
    }
}
