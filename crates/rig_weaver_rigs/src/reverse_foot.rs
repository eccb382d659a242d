//! Multi-pivot reverse-foot IK rig.
//!
//! The foot rolls through a chain of pivot groups (heel, toe, ball, toe
//! curl), each carrying one IK handle, while a piecewise remap network
//! distributes `Foot_Roll` across them: the heel takes negative roll, the
//! ball ramps in between the toe-lift and toe-straight breakpoints, and the
//! toe takes over past the straight point. Banking shifts the toe pivot's
//! rotate *pivot* sideways instead of rotating a different group, so the
//! foot tips over its own edge.

use bevy::{
    log::debug,
    math::{Quat, Vec3},
    transform::components::Transform,
};
use serde::{Deserialize, Serialize};

use rig_weaver_core::{
    axis_frame::{AxesInfo, FootFrame, classify_axes},
    channels::{Axis, RotateOrder, SourcePin, TargetPin},
    controls::Control,
    errors::RigBuildError,
    joint_chain::{FootJoints, JointChain, TranslationSpace},
    registry::{
        ConstraintKind, IkSolver, IkSpec, NodeHandle, ProxyShape, ProxyStyle, SceneRef,
    },
    rig_graph::operators::{CompareOp, Op, OperatorNode},
    rig_instance::RigInstance,
    vector_math,
};

use crate::{
    pole_vector::{self, PoleVectorSwitch},
    stretch::{self, StretchNetwork},
};

/// Typed configuration for one reverse-foot build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverseFootConfig {
    /// Label prefix for everything this build creates; the hip joint's name
    /// when omitted.
    pub prefix: Option<String>,
    /// Default roll value at which the ball stops and the toe takes over
    /// ramping.
    pub toe_lift: f32,
    /// Default roll value at which the toe is fully straightened.
    pub toe_straight: f32,
    /// Adds the leg stretch network on the hip-to-ankle solve.
    pub with_stretch: bool,
}

impl Default for ReverseFootConfig {
    fn default() -> Self {
        ReverseFootConfig {
            prefix: None,
            toe_lift: 30.0,
            toe_straight: 70.0,
            with_stretch: false,
        }
    }
}

/// A finished reverse-foot build.
#[derive(Debug)]
pub struct ReverseFootRig {
    pub instance: RigInstance,
    pub joints: FootJoints,
    pub foot_control: Control,
    pub pole_control: Control,
    pub pole_switch: PoleVectorSwitch,
    pub leg_ik: NodeHandle,
    pub ball_ik: NodeHandle,
    pub toe_ik: NodeHandle,
    pub heel_roll: NodeHandle,
    pub toe_roll: NodeHandle,
    pub ball_roll: NodeHandle,
    pub toe_curl: NodeHandle,
    pub bank_pivot_1: Control,
    pub bank_pivot_2: Control,
    /// Cross-axis rotation channels of the three roll pivots.
    pub heel_roll_rotate: TargetPin,
    pub ball_roll_rotate: TargetPin,
    pub toe_roll_rotate: TargetPin,
    /// Cross-axis rotation of the toe-curl pivot.
    pub toe_curl_rotate: TargetPin,
    /// Aim-axis rotation of the toe pivot, driven by `Foot_Bank`.
    pub bank_rotate: TargetPin,
    /// Cross-axis rotate-pivot of the toe pivot, shifted by the bank branch.
    pub bank_pivot_shift: TargetPin,
    /// Sign the bank calibration settled on for the aim-axis rotation.
    pub bank_aim_sign: f32,
    /// Up-axis rotation of the no-flip pole pre-transform (`Knee_Twist`).
    pub knee_twist_rotate: TargetPin,
    pub stretch: Option<StretchNetwork>,
}

impl ReverseFootRig {
    pub fn build(chain: &JointChain, config: &ReverseFootConfig) -> Result<Self, RigBuildError> {
        let joints = chain.foot_joints()?;
        let hip_joint = chain.joint(joints.hip);

        let hip_pos = chain.position(joints.hip);
        let knee_pos = chain.position(joints.knee);
        let ankle_pos = chain.position(joints.ankle);
        let ball_pos = chain.position(joints.ball);
        let toe_pos = chain.position(joints.toe);
        let heel_pos = chain.position(joints.heel);

        let frame = FootFrame::from_positions(heel_pos, ankle_pos, toe_pos, hip_pos);

        let prefix = config
            .prefix
            .clone()
            .unwrap_or_else(|| hip_joint.name.clone());
        let mut rig = RigInstance::new(format!("{prefix}_Reverse_IK_Leg_Control"));
        let root_group = rig.root_group();
        let root_label = rig.node(root_group).map(|n| n.label.clone()).unwrap_or_default();

        // Main foot control at the ankle.
        let ankle_joint = chain.joint(joints.ankle);
        let control_world = match chain.translation_space {
            TranslationSpace::LocalOrientation => Transform {
                translation: ankle_pos,
                rotation: ankle_joint.world_orientation,
                scale: Vec3::ONE,
            },
            TranslationSpace::World => Transform::from_translation(ankle_pos),
        };
        let foot_control = rig.create_control(
            format!("{prefix}_handle"),
            Some(root_group),
            control_world,
            ProxyShape {
                radius: hip_joint.radius * 0.88,
                style: ProxyStyle::Ring,
            },
        );
        rig.lock_channels(
            foot_control.transform,
            &["scaleX", "scaleY", "scaleZ", rig_weaver_core::channels::VISIBILITY],
        );
        match chain.translation_space {
            TranslationSpace::LocalOrientation => {
                let axes = classify_axes(
                    control_world.translation,
                    control_world.rotation,
                    &frame,
                );
                let order = axes.rotate_order().ok_or_else(|| {
                    RigBuildError::AmbiguousAxisFrame {
                        label: format!("{prefix}_handle"),
                    }
                })?;
                rig.set_rotate_order(foot_control.transform, order);
            }
            TranslationSpace::World => {
                rig.set_rotate_order(foot_control.transform, RotateOrder::Zxy);
            }
        }

        let roll = rig.add_scalar_attr(foot_control.transform, "Foot_Roll", 0.0, None, None);
        let lift =
            rig.add_scalar_attr(foot_control.transform, "Foot_Toe_Lift", config.toe_lift, None, None);
        let straight = rig.add_scalar_attr(
            foot_control.transform,
            "Foot_Toe_Straight",
            config.toe_straight,
            None,
            None,
        );
        let knee_twist = rig.add_scalar_attr(foot_control.transform, "Knee_Twist", 0.0, None, None);
        let bank = rig.add_scalar_attr(foot_control.transform, "Foot_Bank", 0.0, None, None);
        let ball_pivot = rig.add_scalar_attr(foot_control.transform, "Ball_Pivot", 0.0, None, None);
        let toe_pivot = rig.add_scalar_attr(foot_control.transform, "Toe_Pivot", 0.0, None, None);
        let toe_curl_attr = rig.add_scalar_attr(foot_control.transform, "Toe_Curl", 0.0, None, None);
        let heel_pivot = rig.add_scalar_attr(foot_control.transform, "Heel_Pivot", 0.0, None, None);

        rig.add_parent_switch(
            &foot_control,
            &[(SceneRef::Node(root_group), root_label.as_str())],
            1,
        )?;

        // Pivot chain: heel -> toe -> ball -> toe curl, each aligned to its
        // joint and ordered so roll, bank and pivot edits stay independent.
        let heel_pre = rig.create_group(
            format!("{prefix}_heelRoll_preTransform"),
            Some(foot_control.transform),
            joint_world(chain, joints.heel),
        );
        let (heel_roll, heel_axes) =
            create_pivot(&mut rig, format!("{prefix}_heelRoll_pivot"), heel_pre, joint_world(chain, joints.heel), &frame)?;
        let (toe_roll, toe_axes) =
            create_pivot(&mut rig, format!("{prefix}_toeRoll_pivot"), heel_roll, joint_world(chain, joints.toe), &frame)?;
        let (ball_roll, ball_axes) =
            create_pivot(&mut rig, format!("{prefix}_ballRoll_pivot"), toe_roll, joint_world(chain, joints.ball), &frame)?;
        let (toe_curl, curl_axes) =
            create_pivot(&mut rig, format!("{prefix}_toeCurl_pivot"), ball_roll, joint_world(chain, joints.ball), &frame)?;

        // IK handles, parented into the pivot chain.
        let leg_ik = rig.create_ik_handle(
            format!("{prefix}_hipAnkleIkHandle"),
            Some(ball_roll),
            IkSpec {
                solver: IkSolver::RotatePlane,
                start: joints.hip,
                end: joints.ankle,
            },
            Transform {
                translation: ankle_pos,
                rotation: ankle_joint.world_orientation,
                scale: Vec3::ONE,
            },
        );
        let ball_ik = rig.create_ik_handle(
            format!("{prefix}_ankleBallIkHandle"),
            Some(toe_roll),
            IkSpec {
                solver: IkSolver::SingleChain,
                start: joints.ankle,
                end: joints.ball,
            },
            Transform::from_translation(ball_pos),
        );
        let toe_ik = rig.create_ik_handle(
            format!("{prefix}_ballToeIkHandle"),
            Some(toe_curl),
            IkSpec {
                solver: IkSolver::SingleChain,
                start: joints.ball,
                end: joints.toe,
            },
            Transform::from_translation(toe_pos),
        );

        // Heel: rolls only for negative roll.
        let heel_branch = rig.add_operator(
            format!("{prefix}_heelRoll_branch"),
            OperatorNode::new(Op::Branch(CompareOp::MoreEqual))
                .with_input(Op::FIRST_TERM, 0.0)
                .with_input(Op::IF_FALSE, 0.0),
        );
        rig.connect(roll.clone(), TargetPin::node(heel_branch, Op::SECOND_TERM))?;
        rig.connect(roll.clone(), TargetPin::node(heel_branch, Op::IF_TRUE))?;
        let heel_roll_rotate = connect_signed(
            &mut rig,
            format!("{prefix}_heelRoll_signMultiply"),
            RigInstance::operator_out(heel_branch),
            heel_axes.cross.sign(),
            heel_roll,
            heel_axes.cross.axis,
        )?;
        rig.connect(
            heel_pivot,
            TargetPin::node(heel_roll, heel_axes.up.axis.rotate_channel()),
        )?;

        // Ball: ramps from the lift breakpoint back down to zero at the
        // straight breakpoint. The three regions meet without jumps, which
        // is why this is branches plus a clamped remap and not one formula.
        let ball_remap = rig.add_operator(
            format!("{prefix}_ballRoll_remap"),
            OperatorNode::new(Op::Remap).with_input(Op::NEW_MAX, 0.0),
        );
        rig.connect(roll.clone(), TargetPin::node(ball_remap, Op::VALUE))?;
        rig.connect(lift.clone(), TargetPin::node(ball_remap, Op::OLD_MIN))?;
        rig.connect(straight.clone(), TargetPin::node(ball_remap, Op::OLD_MAX))?;
        rig.connect(lift.clone(), TargetPin::node(ball_remap, Op::NEW_MIN))?;

        let ball_pick = rig.add_operator(
            format!("{prefix}_ballRoll_rampBranch"),
            OperatorNode::new(Op::Branch(CompareOp::Less)),
        );
        rig.connect(roll.clone(), TargetPin::node(ball_pick, Op::FIRST_TERM))?;
        rig.connect(lift.clone(), TargetPin::node(ball_pick, Op::SECOND_TERM))?;
        rig.connect(roll.clone(), TargetPin::node(ball_pick, Op::IF_TRUE))?;
        rig.connect(
            RigInstance::operator_out(ball_remap),
            TargetPin::node(ball_pick, Op::IF_FALSE),
        )?;

        let ball_floor = rig.add_operator(
            format!("{prefix}_ballRoll_floorBranch"),
            OperatorNode::new(Op::Branch(CompareOp::More))
                .with_input(Op::SECOND_TERM, 0.0)
                .with_input(Op::IF_FALSE, 0.0),
        );
        rig.connect(
            RigInstance::operator_out(ball_pick),
            TargetPin::node(ball_floor, Op::FIRST_TERM),
        )?;
        rig.connect(
            RigInstance::operator_out(ball_pick),
            TargetPin::node(ball_floor, Op::IF_TRUE),
        )?;
        let ball_roll_rotate = connect_signed(
            &mut rig,
            format!("{prefix}_ballRoll_signMultiply"),
            RigInstance::operator_out(ball_floor),
            ball_axes.cross.sign(),
            ball_roll,
            ball_axes.cross.axis,
        )?;
        rig.connect(
            ball_pivot,
            TargetPin::node(ball_roll, ball_axes.up.axis.rotate_channel()),
        )?;

        // Toe: zero until the lift breakpoint, ramps to the straight
        // breakpoint, then follows the raw roll unclamped.
        let toe_floor = rig.add_operator(
            format!("{prefix}_toeRoll_floorBranch"),
            OperatorNode::new(Op::Branch(CompareOp::More))
                .with_input(Op::SECOND_TERM, 0.0)
                .with_input(Op::IF_FALSE, 0.0),
        );
        rig.connect(roll.clone(), TargetPin::node(toe_floor, Op::FIRST_TERM))?;
        rig.connect(roll.clone(), TargetPin::node(toe_floor, Op::IF_TRUE))?;

        let toe_pick = rig.add_operator(
            format!("{prefix}_toeRoll_rampBranch"),
            OperatorNode::new(Op::Branch(CompareOp::Less)),
        );
        rig.connect(roll.clone(), TargetPin::node(toe_pick, Op::FIRST_TERM))?;
        rig.connect(lift.clone(), TargetPin::node(toe_pick, Op::SECOND_TERM))?;
        rig.connect(
            RigInstance::operator_out(toe_floor),
            TargetPin::node(toe_pick, Op::IF_TRUE),
        )?;
        rig.connect(roll.clone(), TargetPin::node(toe_pick, Op::IF_FALSE))?;

        let toe_remap = rig.add_operator(
            format!("{prefix}_toeRoll_remap"),
            OperatorNode::new(Op::Remap).with_input(Op::NEW_MIN, 0.0),
        );
        rig.connect(
            RigInstance::operator_out(toe_pick),
            TargetPin::node(toe_remap, Op::VALUE),
        )?;
        rig.connect(lift.clone(), TargetPin::node(toe_remap, Op::OLD_MIN))?;
        rig.connect(straight.clone(), TargetPin::node(toe_remap, Op::OLD_MAX))?;
        rig.connect(straight.clone(), TargetPin::node(toe_remap, Op::NEW_MAX))?;

        let toe_tail = rig.add_operator(
            format!("{prefix}_toeRoll_tailBranch"),
            OperatorNode::new(Op::Branch(CompareOp::LessEqual)),
        );
        rig.connect(roll.clone(), TargetPin::node(toe_tail, Op::FIRST_TERM))?;
        rig.connect(straight.clone(), TargetPin::node(toe_tail, Op::SECOND_TERM))?;
        rig.connect(
            RigInstance::operator_out(toe_remap),
            TargetPin::node(toe_tail, Op::IF_TRUE),
        )?;
        rig.connect(roll.clone(), TargetPin::node(toe_tail, Op::IF_FALSE))?;

        let toe_roll_rotate = connect_signed(
            &mut rig,
            format!("{prefix}_toeRoll_signMultiply"),
            RigInstance::operator_out(toe_tail),
            toe_axes.cross.sign(),
            toe_roll,
            toe_axes.cross.axis,
        )?;
        rig.connect(
            toe_pivot,
            TargetPin::node(toe_roll, toe_axes.up.axis.rotate_channel()),
        )?;

        // Toe curl passes straight through to the curl pivot.
        let toe_curl_rotate = connect_signed(
            &mut rig,
            format!("{prefix}_toeCurl_signMultiply"),
            toe_curl_attr,
            curl_axes.cross.sign(),
            toe_curl,
            curl_axes.cross.axis,
        )?;

        // Bank pivots: lockable handles offset to both sides of the foot.
        let bank_offset = 0.3 * vector_math::magnitude(ball_pos, heel_pos);
        let toe_roll_world = rig
            .world_transform(toe_roll)
            .expect("toe pivot was just created");
        let bank_pivot_1 = create_bank_pivot(
            &mut rig,
            format!("{prefix}_bankPivot_1_handle"),
            toe_roll,
            toe_roll_world,
            toe_axes.cross.axis.unit() * bank_offset,
            hip_joint.radius * 0.32 * 0.7,
        );
        let bank_pivot_2 = create_bank_pivot(
            &mut rig,
            format!("{prefix}_bankPivot_2_handle"),
            toe_roll,
            toe_roll_world,
            toe_axes.cross.axis.unit() * -bank_offset,
            hip_joint.radius * 0.32 * 0.7,
        );

        let pivot_1_axes = classify_axes(
            rig.world_position(bank_pivot_1.transform),
            toe_roll_world.rotation,
            &frame,
        );
        let pivot_2_axes = classify_axes(
            rig.world_position(bank_pivot_2.transform),
            toe_roll_world.rotation,
            &frame,
        );

        let pivot_1_branch = bank_side_branch(
            &mut rig,
            format!("{prefix}_bankPivot_1_branch"),
            &bank,
            &bank_pivot_1,
            &pivot_1_axes,
        )?;
        let pivot_2_branch = bank_side_branch(
            &mut rig,
            format!("{prefix}_bankPivot_2_branch"),
            &bank,
            &bank_pivot_2,
            &pivot_2_axes,
        )?;

        // Selected offset (or zero at rest) becomes the toe pivot's rotate
        // pivot on the cross axis.
        let bank_sum = rig.add_operator(
            format!("{prefix}_bankPivotShift_sum"),
            OperatorNode::new(Op::Sum).with_input(Op::IN_C, 0.0),
        );
        rig.connect(pivot_1_branch, TargetPin::node(bank_sum, Op::IN_A))?;
        rig.connect(pivot_2_branch, TargetPin::node(bank_sum, Op::IN_B))?;
        let bank_pivot_shift =
            TargetPin::node(toe_roll, toe_axes.cross.axis.rotate_pivot_channel());
        rig.connect(RigInstance::operator_out(bank_sum), bank_pivot_shift.clone())?;

        // Bank drives the toe pivot's aim rotation directly; the sign is
        // settled by the numeric probe below.
        let bank_multiply = rig.add_operator(
            format!("{prefix}_bankAim_signMultiply"),
            OperatorNode::new(Op::Multiply).with_input(Op::IN_B, 1.0),
        );
        rig.connect(bank.clone(), TargetPin::node(bank_multiply, Op::IN_A))?;
        let bank_rotate = TargetPin::node(toe_roll, toe_axes.aim.axis.rotate_channel());
        rig.connect(RigInstance::operator_out(bank_multiply), bank_rotate.clone())?;

        let bank_aim_sign = calibrate_bank_sign(
            toe_roll_world,
            toe_axes.cross.axis.unit() * bank_offset,
            toe_axes.aim.axis,
            hip_pos,
        );
        if bank_aim_sign < 0.0 {
            debug!("bank probe moved away from the hip, flipping aim rotation sign");
            rig.set_operator_input(bank_multiply, Op::IN_B, -1.0);
        }

        // Pole-vector candidates and the shared mode switch.
        let twist = pole_vector::no_flip_twist(chain, joints.hip, joints.knee, joints.ankle);
        let probe = pole_vector::no_flip_probe(chain, joints.hip, joints.knee, joints.ankle);
        let no_flip_pre = rig.create_group(
            format!("{prefix}_kneeNoFlipPole_preTransform"),
            Some(ball_roll),
            Transform::from_translation(ankle_pos),
        );
        let no_flip_target = rig.create_locator(
            format!("{prefix}_kneeNoFlipPole_target"),
            Some(no_flip_pre),
            Transform::from_translation(probe),
        );
        let pre_axes = classify_axes(ankle_pos, Quat::IDENTITY, &frame);
        let knee_twist_rotate =
            TargetPin::node(no_flip_pre, pre_axes.up.axis.rotate_channel());
        rig.connect(knee_twist, knee_twist_rotate.clone())?;

        let mid_projection = chain
            .ik_segment_mid_pos
            .ok_or_else(|| RigBuildError::MissingSegmentMidpoint(hip_joint.name.clone()))?;
        let manual_pos = pole_vector::manual_pole_position(mid_projection, knee_pos, hip_pos);
        let pole_control = rig.create_control(
            format!("{prefix}_kneeManualPole_handle"),
            Some(root_group),
            Transform::from_translation(manual_pos),
            ProxyShape {
                radius: hip_joint.radius * 0.32,
                style: ProxyStyle::Diamond,
            },
        );
        rig.lock_channels(
            pole_control.transform,
            &[
                "rotateX",
                "rotateY",
                "rotateZ",
                "scaleX",
                "scaleY",
                "scaleZ",
                rig_weaver_core::channels::VISIBILITY,
            ],
        );
        rig.add_parent_switch(
            &pole_control,
            &[(SceneRef::Node(root_group), root_label.as_str())],
            1,
        )?;
        let pole_switch = pole_vector::install_pole_vector_switch(
            &mut rig,
            &foot_control,
            leg_ik,
            no_flip_target,
            &pole_control,
            twist,
        )?;

        // Optional leg stretch, same network as the hinge rig.
        let stretch = if config.with_stretch {
            let hip_anchor = rig.create_locator(
                format!("{prefix}_hipPos_loc"),
                Some(root_group),
                Transform::from_translation(hip_pos),
            );
            rig.set_visibility(hip_anchor, false);
            rig.add_constraint(
                format!("{prefix}_hipPos_pointConstraint"),
                ConstraintKind::Point,
                SceneRef::Node(hip_anchor),
                &[SceneRef::Joint(joints.hip)],
                false,
            )?;
            let network = stretch::install_stretch(
                &mut rig,
                chain,
                joints.hip,
                joints.knee,
                joints.ankle,
                hip_anchor,
                foot_control.transform,
                &prefix,
            )?;
            rig.connect(
                network.upper_output.clone(),
                TargetPin::joint(joints.knee, network.aim_axis.translate_channel()),
            )?;
            rig.connect(
                network.lower_output.clone(),
                TargetPin::joint(joints.ankle, network.aim_axis.translate_channel()),
            )?;
            Some(network)
        } else {
            None
        };

        for axis in Axis::ALL {
            rig.publish(
                SourcePin::node(foot_control.transform, axis.translate_channel()),
                format!("foot_control_{}", axis.translate_channel()),
            );
            rig.publish(
                SourcePin::node(foot_control.transform, axis.rotate_channel()),
                format!("foot_control_{}", axis.rotate_channel()),
            );
            rig.publish(
                SourcePin::node(pole_control.transform, axis.translate_channel()),
                format!("knee_poleVector_{}", axis.translate_channel()),
            );
        }
        for attr in [
            "Foot_Roll",
            "Foot_Toe_Lift",
            "Foot_Toe_Straight",
            "Knee_Twist",
            "Foot_Bank",
            "Ball_Pivot",
            "Toe_Pivot",
            "Toe_Curl",
            "Heel_Pivot",
            pole_vector::MODE_ATTR,
        ] {
            rig.publish(
                SourcePin::node(foot_control.transform, attr),
                format!("foot_control_{attr}"),
            );
        }

        rig.validate(chain)?;

        Ok(ReverseFootRig {
            instance: rig,
            joints,
            foot_control,
            pole_control,
            pole_switch,
            leg_ik,
            ball_ik,
            toe_ik,
            heel_roll,
            toe_roll,
            ball_roll,
            toe_curl,
            bank_pivot_1,
            bank_pivot_2,
            heel_roll_rotate,
            ball_roll_rotate,
            toe_roll_rotate,
            toe_curl_rotate,
            bank_rotate,
            bank_pivot_shift,
            bank_aim_sign,
            knee_twist_rotate,
            stretch,
        })
    }
}

fn joint_world(chain: &JointChain, joint: rig_weaver_core::joint_chain::JointId) -> Transform {
    Transform {
        translation: chain.position(joint),
        rotation: chain.joint(joint).world_orientation,
        scale: Vec3::ONE,
    }
}

/// Creates one roll pivot group aligned to its joint, classified against the
/// foot frame and given the gimbal-safe rotate order.
fn create_pivot(
    rig: &mut RigInstance,
    label: String,
    parent: NodeHandle,
    world: Transform,
    frame: &FootFrame,
) -> Result<(NodeHandle, AxesInfo), RigBuildError> {
    let pivot = rig.create_group(label.clone(), Some(parent), world);
    let axes = classify_axes(world.translation, world.rotation, frame);
    let order = axes
        .rotate_order()
        .ok_or(RigBuildError::AmbiguousAxisFrame { label })?;
    rig.set_rotate_order(pivot, order);
    Ok((pivot, axes))
}

/// Multiplies `source` by the pivot's cross polarity and wires it into the
/// pivot's cross rotation, so roll direction is independent of which world
/// axis plays "cross" for this foot.
fn connect_signed(
    rig: &mut RigInstance,
    label: String,
    source: SourcePin,
    sign: f32,
    pivot: NodeHandle,
    cross_axis: Axis,
) -> Result<TargetPin, RigBuildError> {
    let multiply = rig.add_operator(
        label,
        OperatorNode::new(Op::Multiply).with_input(Op::IN_B, sign),
    );
    rig.connect(source, TargetPin::node(multiply, Op::IN_A))?;
    let target = TargetPin::node(pivot, cross_axis.rotate_channel());
    rig.connect(RigInstance::operator_out(multiply), target.clone())?;
    Ok(target)
}

/// One side handle of the bank: a small control whose unused translate axes
/// are locked, resting at its cross-axis offset.
fn create_bank_pivot(
    rig: &mut RigInstance,
    label: String,
    toe_roll: NodeHandle,
    toe_roll_world: Transform,
    local_offset: Vec3,
    radius: f32,
) -> Control {
    let control = rig.create_control(
        label,
        Some(toe_roll),
        toe_roll_world,
        ProxyShape {
            radius,
            style: ProxyStyle::Diamond,
        },
    );
    rig.set_world_translation(control.transform, toe_roll_world.transform_point(local_offset));

    let mut locked = vec![
        "rotateX",
        "rotateY",
        "rotateZ",
        "scaleX",
        "scaleY",
        "scaleZ",
        rig_weaver_core::channels::VISIBILITY,
    ];
    for axis in Axis::ALL {
        if axis.component(local_offset).abs() < 1e-6 {
            locked.push(axis.translate_channel());
        }
    }
    rig.lock_channels(control.transform, &locked);
    control
}

/// Branch selecting this bank pivot's live offset when `Foot_Bank` is on its
/// side of zero (the positive-side pivot reacts to negative bank and vice
/// versa).
fn bank_side_branch(
    rig: &mut RigInstance,
    label: String,
    bank: &SourcePin,
    pivot: &Control,
    axes: &AxesInfo,
) -> Result<SourcePin, RigBuildError> {
    let cross_channel = axes.cross.axis.translate_channel();
    let rest_value = rig
        .registry()
        .transform(pivot.transform)
        .map(|t| axes.cross.axis.component(t.local.translation))
        .unwrap_or_default();
    let compare = if rest_value > 0.0 {
        CompareOp::Less
    } else {
        CompareOp::More
    };
    let branch = rig.add_operator(
        label,
        OperatorNode::new(Op::Branch(compare))
            .with_input(Op::SECOND_TERM, 0.0)
            .with_input(Op::IF_FALSE, 0.0),
    );
    rig.connect(bank.clone(), TargetPin::node(branch, Op::FIRST_TERM))?;
    rig.connect(
        SourcePin::node(pivot.transform, cross_channel),
        TargetPin::node(branch, Op::IF_TRUE),
    )?;
    Ok(RigInstance::operator_out(branch))
}

/// Numeric probe deciding the sign of the bank's aim-axis rotation: swing the
/// bank to +/-15 degrees on the rest transforms and watch whether the first
/// bank pivot's distance to the hip grows. When it does, the sign flips.
fn calibrate_bank_sign(
    toe_roll_world: Transform,
    pivot_1_offset: Vec3,
    aim_axis: Axis,
    hip_pos: Vec3,
) -> f32 {
    let round4 = |value: f32| (value * 10_000.0).round() / 10_000.0;

    let rest_world = toe_roll_world.transform_point(pivot_1_offset);
    let rest_distance = vector_math::magnitude(hip_pos, rest_world);

    let mut sign = 1.0;
    for angle in [15.0_f32, -15.0] {
        // The branch puts the rotate pivot on the far side of the bank.
        let rotate_pivot = if angle > 0.0 {
            -pivot_1_offset
        } else {
            pivot_1_offset
        };
        let rotation = Quat::from_axis_angle(aim_axis.unit(), (angle * sign).to_radians());
        let swung = rotate_pivot + rotation * (pivot_1_offset - rotate_pivot);
        let distance = vector_math::magnitude(hip_pos, toe_roll_world.transform_point(swung));
        if round4(distance) > round4(rest_distance) {
            sign = -1.0;
        }
    }
    sign
}
