//! Two-segment stretch correction, shared by the hinge IK and the stretchy
//! reverse-foot leg.
//!
//! The live root-to-effector distance is divided by the global scale and by
//! the chain's rest length; a branch floors the factor at 1 so the chain only
//! ever lengthens. The two multiply outputs carry the corrected segment
//! translations; callers wire them into the joints (directly, or through the
//! elbow-blend layer).

use rig_weaver_core::{
    channels::{Axis, SourcePin, TargetPin},
    errors::RigBuildError,
    joint_chain::{JointChain, JointId},
    registry::NodeHandle,
    rig_graph::operators::{CompareOp, Op, OperatorNode},
    rig_instance::RigInstance,
};

#[derive(Debug, Clone)]
pub struct StretchNetwork {
    pub distance: NodeHandle,
    pub factor: NodeHandle,
    /// Stretch-corrected rest translation for the root->middle segment.
    pub upper_output: SourcePin,
    /// Stretch-corrected rest translation for the middle->end segment.
    pub lower_output: SourcePin,
    pub upper_rest: f32,
    pub lower_rest: f32,
    pub aim_axis: Axis,
}

pub fn install_stretch(
    rig: &mut RigInstance,
    chain: &JointChain,
    root: JointId,
    middle: JointId,
    end: JointId,
    root_anchor: NodeHandle,
    end_anchor: NodeHandle,
    prefix: &str,
) -> Result<StretchNetwork, RigBuildError> {
    let aim_axis = chain.joint(root).node_axes.aim;
    let upper_rest = aim_axis.component(chain.local_translation(middle));
    let lower_rest = aim_axis.component(chain.local_translation(end));
    let rest_length = (upper_rest + lower_rest).abs();
    if rest_length < 1e-5 {
        return Err(RigBuildError::ZeroRestLength);
    }

    let distance = rig.distance_between(format!("{prefix}_rootToEnd_distance"), root_anchor, end_anchor)?;

    // Live distance divided by the character's uniform scale, so scaling the
    // whole character does not read as a stretch.
    let normalized = rig.add_operator(
        format!("{prefix}_restLengthFactor"),
        OperatorNode::new(Op::Divide),
    );
    rig.connect(
        RigInstance::operator_out(distance),
        TargetPin::node(normalized, Op::IN_A),
    )?;
    rig.connect(
        rig.global_scale_pin(),
        TargetPin::node(normalized, Op::IN_B),
    )?;

    let ratio = rig.add_operator(
        format!("{prefix}_stretchLengthDivide"),
        OperatorNode::new(Op::Divide).with_input(Op::IN_B, rest_length),
    );
    rig.connect(
        RigInstance::operator_out(normalized),
        TargetPin::node(ratio, Op::IN_A),
    )?;

    // Only lengthen: factor 1 until the live length exceeds the rest length.
    let factor = rig.add_operator(
        format!("{prefix}_stretchBranch"),
        OperatorNode::new(Op::Branch(CompareOp::More))
            .with_input(Op::SECOND_TERM, rest_length)
            .with_input(Op::IF_FALSE, 1.0),
    );
    rig.connect(
        RigInstance::operator_out(normalized),
        TargetPin::node(factor, Op::FIRST_TERM),
    )?;
    rig.connect(
        RigInstance::operator_out(ratio),
        TargetPin::node(factor, Op::IF_TRUE),
    )?;

    let upper_multiply = rig.add_operator(
        format!("{prefix}_upperTranslateMultiply"),
        OperatorNode::new(Op::Multiply).with_input(Op::IN_B, upper_rest),
    );
    rig.connect(
        RigInstance::operator_out(factor),
        TargetPin::node(upper_multiply, Op::IN_A),
    )?;

    let lower_multiply = rig.add_operator(
        format!("{prefix}_lowerTranslateMultiply"),
        OperatorNode::new(Op::Multiply).with_input(Op::IN_B, lower_rest),
    );
    rig.connect(
        RigInstance::operator_out(factor),
        TargetPin::node(lower_multiply, Op::IN_A),
    )?;

    Ok(StretchNetwork {
        distance,
        factor,
        upper_output: RigInstance::operator_out(upper_multiply),
        lower_output: RigInstance::operator_out(lower_multiply),
        upper_rest,
        lower_rest,
        aim_axis,
    })
}
