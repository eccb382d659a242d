//! No-flip / manual pole-vector switching, shared by every two-bone IK rig.

use bevy::math::Vec3;

use rig_weaver_core::{
    channels::{self, SourcePin, TargetPin},
    controls::Control,
    errors::GraphValidationError,
    joint_chain::{JointChain, JointId},
    registry::{ConstraintKind, ConstraintNode, NodeHandle, SceneRef},
    rig_graph::{ModeState, ModeSwitch},
    rig_instance::RigInstance,
    vector_math,
};

pub const MODE_ATTR: &str = "Pole_Vector_Mode";
pub const TWIST: &str = "twist";

/// The installed switch: the pole-vector constraint, the enum pin that
/// drives it, and the twist the no-flip state applies.
#[derive(Debug, Clone)]
pub struct PoleVectorSwitch {
    pub constraint: NodeHandle,
    pub mode_pin: SourcePin,
    pub no_flip_twist: f32,
}

/// Probe point for the no-flip side test: pushed out from the middle joint
/// along its plane axis by twice the root-to-end span. Also where the
/// no-flip target starts out.
pub fn no_flip_probe(chain: &JointChain, root: JointId, middle: JointId, end: JointId) -> Vec3 {
    let plane_axis = chain.joint(root).node_axes.plane;
    let offset = vector_math::magnitude(chain.position(root), chain.position(end)) * 2.0;
    chain.position(middle) + chain.joint(middle).world_orientation * (plane_axis.unit() * offset)
}

/// Twist that keeps the solve plane on the no-flip side.
///
/// The probe point is compared against the chain's plane normal; the side it
/// lands on selects +90 or -90 degrees.
pub fn no_flip_twist(chain: &JointChain, root: JointId, middle: JointId, end: JointId) -> f32 {
    let root_pos = chain.position(root);
    let middle_pos = chain.position(middle);
    let end_pos = chain.position(end);

    let plane = vector_math::cross_direction(middle_pos, end_pos, middle_pos, root_pos, false);
    let plane_point = middle_pos + plane.cross;
    let probe = no_flip_probe(chain, root, middle, end);

    let side = vector_math::dot_direction(middle_pos, plane_point, middle_pos, probe, false);
    if side.cos_theta < 0.0 { -90.0 } else { 90.0 }
}

/// Position for the manual pole handle: pushed out along the segment-midpoint
/// to middle-joint line, extending the offset until it clears the
/// root-to-middle rest distance so the handle can never collapse onto the
/// chain.
pub fn manual_pole_position(mid: Vec3, middle: Vec3, root: Vec3) -> Vec3 {
    let clearance = vector_math::magnitude(root, middle);
    let mut t = 2.0;
    let mut position = vector_math::offset_between(mid, middle, t);
    while vector_math::magnitude(position, middle) <= clearance {
        t += 2.0;
        position = vector_math::offset_between(mid, middle, t);
    }
    position
}

/// Installs `Pole_Vector_Mode` on `control` plus the driven table that flips
/// between the two targets.
///
/// State 0 (no flip): twist = `twist`, weights (1, 0), manual handle hidden.
/// State 1 (manual): twist = 0, weights (0, 1), manual handle shown.
/// Weights always sum to one.
pub fn install_pole_vector_switch(
    rig: &mut RigInstance,
    control: &Control,
    ik_handle: NodeHandle,
    no_flip_target: NodeHandle,
    manual: &Control,
    twist: f32,
) -> Result<PoleVectorSwitch, GraphValidationError> {
    let label = rig
        .node(ik_handle)
        .map(|n| n.label.clone())
        .unwrap_or_default();
    let constraint = rig.add_constraint(
        format!("{label}_poleVectorConstraint"),
        ConstraintKind::PoleVector,
        SceneRef::Node(ik_handle),
        &[
            SceneRef::Node(no_flip_target),
            SceneRef::Node(manual.transform),
        ],
        false,
    )?;

    let mode_pin = rig.add_enum_attr(control.transform, MODE_ATTR, &["No Flip", "Manual"], 0);

    rig.add_mode_switch(ModeSwitch {
        driver: mode_pin.clone(),
        states: vec![
            ModeState {
                driver_value: 0,
                effects: vec![
                    (TargetPin::node(ik_handle, TWIST), twist),
                    (TargetPin::node(constraint, ConstraintNode::weight_pin(0)), 1.0),
                    (TargetPin::node(constraint, ConstraintNode::weight_pin(1)), 0.0),
                    (
                        TargetPin::node(manual.pre_transform, channels::VISIBILITY),
                        0.0,
                    ),
                ],
            },
            ModeState {
                driver_value: 1,
                effects: vec![
                    (TargetPin::node(ik_handle, TWIST), 0.0),
                    (TargetPin::node(constraint, ConstraintNode::weight_pin(0)), 0.0),
                    (TargetPin::node(constraint, ConstraintNode::weight_pin(1)), 1.0),
                    (
                        TargetPin::node(manual.pre_transform, channels::VISIBILITY),
                        1.0,
                    ),
                ],
            },
        ],
    })?;

    Ok(PoleVectorSwitch {
        constraint,
        mode_pin,
        no_flip_twist: twist,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn manual_pole_clears_the_root_to_middle_distance() {
        let root = Vec3::ZERO;
        let middle = Vec3::new(6., 1., 0.);
        let mid = Vec3::new(6., 0., 0.);
        let position = manual_pole_position(mid, middle, root);
        assert!(
            vector_math::magnitude(position, middle) > vector_math::magnitude(root, middle)
        );
        // The handle extends along the mid -> middle line.
        assert_eq!(position.x, 6.);
        assert_eq!(position.z, 0.);
        assert!(position.y > middle.y);
    }
}
