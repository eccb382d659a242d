//! Stretchy two-bone IK rig with pole-vector mode switching.
//!
//! Built for 3-joint hinge chains (shoulder/elbow/wrist, hip/knee/ankle
//! without a foot). The middle joint only ever bends about the chain's plane
//! axis, so a rotate-plane solve plus a pole target is enough; everything
//! else here is the pole-vector switching, the stretch correction and the
//! optional elbow-blend layer.

use bevy::{math::Vec3, transform::components::Transform};
use serde::{Deserialize, Serialize};

use rig_weaver_core::{
    channels::{self, Axis, RotateOrder, SourcePin, TargetPin},
    controls::Control,
    errors::{GraphValidationError, RigBuildError},
    joint_chain::{HingeJoints, JointChain, TranslationSpace},
    registry::{
        ConstraintKind, ConstraintNode, IkSolver, IkSpec, NodeHandle, ProxyShape, ProxyStyle,
        SceneRef,
    },
    rig_graph::operators::{Op, OperatorNode},
    rig_instance::RigInstance,
};

use crate::{
    pole_vector::{self, PoleVectorSwitch},
    stretch::{self, StretchNetwork},
};

/// Typed configuration for one hinge IK build, validated at construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HingeIkConfig {
    /// Label prefix for everything this build creates; the root joint's name
    /// when omitted.
    pub prefix: Option<String>,
    /// Adds the `Elbow_Blend` / `Forearm_FK` layer that lets the pole handle
    /// behave like a draggable FK elbow.
    pub with_elbow_blend: bool,
}

/// A finished hinge IK build: the owning instance plus handles to the pieces
/// callers wire further or inspect.
#[derive(Debug)]
pub struct StretchyHingeIkRig {
    pub instance: RigInstance,
    pub joints: HingeJoints,
    pub ik_control: Control,
    pub pole_control: Control,
    pub no_flip_target: NodeHandle,
    pub ik_handle: NodeHandle,
    pub pole_switch: PoleVectorSwitch,
    pub stretch: StretchNetwork,
    /// Aim-axis translation channel of the middle joint.
    pub upper_translate: TargetPin,
    /// Aim-axis translation channel of the end joint.
    pub lower_translate: TargetPin,
    pub elbow_blend_pin: Option<SourcePin>,
}

impl StretchyHingeIkRig {
    pub fn build(chain: &JointChain, config: &HingeIkConfig) -> Result<Self, RigBuildError> {
        let joints = chain.hinge_joints()?;
        let root_joint = chain.joint(joints.root);
        let end_joint = chain.joint(joints.end);
        let mid_projection = chain
            .ik_segment_mid_pos
            .ok_or_else(|| RigBuildError::MissingSegmentMidpoint(root_joint.name.clone()))?;

        let prefix = config
            .prefix
            .clone()
            .unwrap_or_else(|| root_joint.name.clone());
        let mut rig = RigInstance::new(format!("{prefix}_IK_Control"));
        let root_group = rig.root_group();
        let root_label = rig.node(root_group).map(|n| n.label.clone()).unwrap_or_default();

        let root_pos = chain.position(joints.root);
        let middle_pos = chain.position(joints.middle);
        let end_pos = chain.position(joints.end);

        let ik_handle = rig.create_ik_handle(
            format!("{prefix}_driverIkHandle"),
            Some(root_group),
            IkSpec {
                solver: IkSolver::RotatePlane,
                start: joints.root,
                end: joints.end,
            },
            Transform {
                translation: end_pos,
                rotation: end_joint.world_orientation,
                scale: Vec3::ONE,
            },
        );
        rig.set_rotate_order(ik_handle, RotateOrder::Xzy);

        // Frame the IK control hangs from; in elbow mode a parent constraint
        // from the pole handle takes it over.
        let elbow_frame = config.with_elbow_blend.then(|| {
            rig.create_group(
                format!("{prefix}_elbowFkFrame"),
                Some(root_group),
                Transform::from_translation(end_pos),
            )
        });

        let control_world = match chain.translation_space {
            TranslationSpace::LocalOrientation => Transform {
                translation: end_pos,
                rotation: end_joint.world_orientation,
                scale: Vec3::ONE,
            },
            TranslationSpace::World => Transform::from_translation(end_pos),
        };
        let ik_control = rig.create_control(
            format!("{prefix}_handle"),
            Some(elbow_frame.unwrap_or(root_group)),
            control_world,
            ProxyShape {
                radius: root_joint.radius * 0.88,
                style: ProxyStyle::Ring,
            },
        );
        rig.set_rotate_order(ik_control.pre_transform, RotateOrder::Xzy);
        rig.set_rotate_order(ik_control.transform, RotateOrder::Xzy);
        rig.lock_channels(
            ik_control.transform,
            &["scaleX", "scaleY", "scaleZ", channels::VISIBILITY],
        );

        rig.add_constraint(
            format!("{prefix}_handle_pointConstraint"),
            ConstraintKind::Point,
            SceneRef::Node(ik_handle),
            &[SceneRef::Node(ik_control.transform)],
            false,
        )?;
        rig.add_constraint(
            format!("{prefix}_handle_orientConstraint"),
            ConstraintKind::Orient,
            SceneRef::Joint(joints.end),
            &[SceneRef::Node(ik_control.transform)],
            true,
        )?;

        rig.add_parent_switch(
            &ik_control,
            &[(SceneRef::Node(root_group), root_label.as_str())],
            1,
        )?;

        // Pole-vector candidates: the auto no-flip target tracks the
        // effector through the IK control, the manual handle sits out past
        // the chain plane.
        let twist = pole_vector::no_flip_twist(chain, joints.root, joints.middle, joints.end);
        let probe = pole_vector::no_flip_probe(chain, joints.root, joints.middle, joints.end);
        let no_flip_pre = rig.create_group(
            format!("{prefix}_noFlipPole_preTransform"),
            Some(ik_control.transform),
            Transform::from_translation(end_pos),
        );
        let no_flip_target = rig.create_locator(
            format!("{prefix}_noFlipPole_target"),
            Some(no_flip_pre),
            Transform::from_translation(probe),
        );

        let manual_pos = pole_vector::manual_pole_position(mid_projection, middle_pos, root_pos);
        let pole_control = rig.create_control(
            format!("{prefix}_manualPole_handle"),
            Some(root_group),
            Transform::from_translation(manual_pos),
            ProxyShape {
                radius: root_joint.radius * 0.32,
                style: ProxyStyle::Diamond,
            },
        );
        let mut locked = vec!["scaleX", "scaleY", "scaleZ", channels::VISIBILITY];
        if !config.with_elbow_blend {
            locked.extend(["rotateX", "rotateY", "rotateZ"]);
        }
        rig.lock_channels(pole_control.transform, &locked);
        rig.add_parent_switch(
            &pole_control,
            &[(SceneRef::Node(root_group), root_label.as_str())],
            1,
        )?;

        let pole_switch = pole_vector::install_pole_vector_switch(
            &mut rig,
            &ik_control,
            ik_handle,
            no_flip_target,
            &pole_control,
            twist,
        )?;

        // Stretch correction off the live root-to-control distance.
        let root_anchor = rig.create_locator(
            format!("{prefix}_rootPos_loc"),
            Some(root_group),
            Transform::from_translation(root_pos),
        );
        rig.set_visibility(root_anchor, false);
        rig.add_constraint(
            format!("{prefix}_rootPos_pointConstraint"),
            ConstraintKind::Point,
            SceneRef::Node(root_anchor),
            &[SceneRef::Joint(joints.root)],
            false,
        )?;
        let stretch = stretch::install_stretch(
            &mut rig,
            chain,
            joints.root,
            joints.middle,
            joints.end,
            root_anchor,
            ik_control.transform,
            &prefix,
        )?;

        let aim = stretch.aim_axis;
        let upper_translate = TargetPin::joint(joints.middle, aim.translate_channel());
        let lower_translate = TargetPin::joint(joints.end, aim.translate_channel());

        let mut elbow_blend_pin = None;
        if let Some(elbow_frame) = elbow_frame {
            let blend_pin =
                rig.add_scalar_attr(ik_control.transform, "Elbow_Blend", 0.0, Some(0.0), Some(1.0));
            let forearm_fk = rig.add_enum_attr(ik_control.transform, "Forearm_FK", &["Off", "On"], 0);

            let lower_live = rig.distance_between(
                format!("{prefix}_poleToControl_distance"),
                pole_control.transform,
                ik_control.transform,
            )?;
            let upper_live = rig.distance_between(
                format!("{prefix}_rootToPole_distance"),
                root_anchor,
                pole_control.transform,
            )?;

            let upper_blended = segment_blend(
                &mut rig,
                &prefix,
                "upper",
                stretch.upper_output.clone(),
                upper_live,
                stretch.upper_rest,
                &blend_pin,
            )?;
            let lower_blended = segment_blend(
                &mut rig,
                &prefix,
                "lower",
                stretch.lower_output.clone(),
                lower_live,
                stretch.lower_rest,
                &blend_pin,
            )?;
            rig.connect(upper_blended, upper_translate.clone())?;
            rig.connect(lower_blended, lower_translate.clone())?;

            let fk_constraint = rig.add_constraint(
                format!("{prefix}_forearmFk_parentConstraint"),
                ConstraintKind::Parent,
                SceneRef::Node(elbow_frame),
                &[SceneRef::Node(pole_control.transform)],
                true,
            )?;
            rig.connect(
                forearm_fk.clone(),
                TargetPin::node(fk_constraint, ConstraintNode::weight_pin(0)),
            )?;

            rig.publish(blend_pin.clone(), "ik_control_Elbow_Blend");
            rig.publish(forearm_fk, "ik_control_Forearm_FK");
            elbow_blend_pin = Some(blend_pin);
        } else {
            rig.connect(stretch.upper_output.clone(), upper_translate.clone())?;
            rig.connect(stretch.lower_output.clone(), lower_translate.clone())?;
        }

        for axis in Axis::ALL {
            rig.publish(
                SourcePin::node(ik_control.transform, axis.translate_channel()),
                format!("ik_control_{}", axis.translate_channel()),
            );
            rig.publish(
                SourcePin::node(ik_control.transform, axis.rotate_channel()),
                format!("ik_control_{}", axis.rotate_channel()),
            );
            rig.publish(
                SourcePin::node(pole_control.transform, axis.translate_channel()),
                format!("ik_poleVector_{}", axis.translate_channel()),
            );
        }
        rig.publish(
            pole_switch.mode_pin.clone(),
            format!("ik_control_{}", pole_vector::MODE_ATTR),
        );

        rig.validate(chain)?;

        Ok(StretchyHingeIkRig {
            instance: rig,
            joints,
            ik_control,
            pole_control,
            no_flip_target,
            ik_handle,
            pole_switch,
            stretch,
            upper_translate,
            lower_translate,
            elbow_blend_pin,
        })
    }
}

/// Blends one segment between its stretch-corrected rest translation and the
/// live pole-handle distance (sign restored for segments that rest on the
/// negative side of the aim axis).
fn segment_blend(
    rig: &mut RigInstance,
    prefix: &str,
    segment: &str,
    stretch_output: SourcePin,
    live_distance: NodeHandle,
    rest: f32,
    alpha: &SourcePin,
) -> Result<SourcePin, GraphValidationError> {
    let live_output = if rest < 0.0 {
        let negate = rig.add_operator(
            format!("{prefix}_{segment}TranslateReverse"),
            OperatorNode::new(Op::Multiply).with_input(Op::IN_B, -1.0),
        );
        rig.connect(
            RigInstance::operator_out(live_distance),
            TargetPin::node(negate, Op::IN_A),
        )?;
        RigInstance::operator_out(negate)
    } else {
        RigInstance::operator_out(live_distance)
    };

    let blend = rig.add_operator(
        format!("{prefix}_{segment}TranslateBlend"),
        OperatorNode::new(Op::Blend),
    );
    rig.connect(stretch_output, TargetPin::node(blend, Op::IN_A))?;
    rig.connect(live_output, TargetPin::node(blend, Op::IN_B))?;
    rig.connect(alpha.clone(), TargetPin::node(blend, Op::ALPHA))?;
    Ok(RigInstance::operator_out(blend))
}

#[cfg(test)]
mod test {
    use super::*;
    use bevy::math::Quat;
    use rig_weaver_core::{
        joint_chain::{Joint, NodeAxes},
        sampling::GraphSampler,
    };

    fn arm_joint(name: &str, parent: Option<usize>, position: Vec3) -> Joint {
        Joint {
            name: name.into(),
            parent,
            world_position: position,
            world_orientation: Quat::IDENTITY,
            node_axes: NodeAxes {
                aim: Axis::X,
                up: Axis::Y,
                plane: Axis::Z,
            },
            radius: 1.0,
            mirror: None,
        }
    }

    /// Shoulder at the origin, elbow bent up in the XY plane, wrist at x=10.
    /// Rest length along the aim axis is exactly 10.
    fn arm_chain() -> JointChain {
        JointChain::new(vec![
            arm_joint("shoulder", None, Vec3::ZERO),
            arm_joint("elbow", Some(0), Vec3::new(6., 1., 0.)),
            arm_joint("wrist", Some(1), Vec3::new(10., 0., 0.)),
        ])
        .unwrap()
        .with_segment_mid_pos(Vec3::new(6., 0., 0.))
    }

    fn build(with_elbow_blend: bool) -> StretchyHingeIkRig {
        StretchyHingeIkRig::build(
            &arm_chain(),
            &HingeIkConfig {
                prefix: None,
                with_elbow_blend,
            },
        )
        .unwrap()
    }

    #[test]
    fn missing_segment_midpoint_is_a_build_error() {
        let chain = JointChain::new(vec![
            arm_joint("shoulder", None, Vec3::ZERO),
            arm_joint("elbow", Some(0), Vec3::new(6., 1., 0.)),
            arm_joint("wrist", Some(1), Vec3::new(10., 0., 0.)),
        ])
        .unwrap();
        let result = StretchyHingeIkRig::build(&chain, &HingeIkConfig::default());
        assert!(matches!(
            result,
            Err(RigBuildError::MissingSegmentMidpoint(_))
        ));
    }

    #[test]
    fn stretch_factor_is_floored_at_one() {
        let rig = build(false);
        let chain = arm_chain();
        let sampler = GraphSampler::new(&rig.instance, &chain);
        // At rest the live length equals the rest length, so segment
        // translations are untouched.
        let upper = sampler.target(&rig.upper_translate).unwrap().as_f32().unwrap();
        let lower = sampler.target(&rig.lower_translate).unwrap().as_f32().unwrap();
        assert!((upper - 6.0).abs() < 1e-5);
        assert!((lower - 4.0).abs() < 1e-5);
    }

    #[test]
    fn stretch_factor_scales_with_live_over_rest() {
        let rig = build(false);
        let chain = arm_chain();
        // Rest length 10, live length 15, global scale 1 => factor 1.5.
        let sampler = GraphSampler::new(&rig.instance, &chain).with_override(
            RigInstance::world_position_pin(rig.ik_control.transform),
            Vec3::new(15., 0., 0.),
        );
        let upper = sampler.target(&rig.upper_translate).unwrap().as_f32().unwrap();
        let lower = sampler.target(&rig.lower_translate).unwrap().as_f32().unwrap();
        assert!((upper - 9.0).abs() < 1e-4);
        assert!((lower - 6.0).abs() < 1e-4);
    }

    #[test]
    fn global_scale_divides_out_of_the_live_length() {
        let rig = build(false);
        let chain = arm_chain();
        let sampler = GraphSampler::new(&rig.instance, &chain)
            .with_override(
                RigInstance::world_position_pin(rig.ik_control.transform),
                Vec3::new(15., 0., 0.),
            )
            .with_override(rig.instance.global_scale_pin(), 1.5);
        let upper = sampler.target(&rig.upper_translate).unwrap().as_f32().unwrap();
        assert!((upper - 6.0).abs() < 1e-4);
    }

    #[test]
    fn no_flip_twist_matches_the_plane_side() {
        let chain = arm_chain();
        let hinge = chain.hinge_joints().unwrap();
        let twist = pole_vector::no_flip_twist(&chain, hinge.root, hinge.middle, hinge.end);
        assert_eq!(twist, -90.0);
    }

    #[test]
    fn manual_pole_handle_clears_the_chain() {
        let rig = build(false);
        let chain = arm_chain();
        let pole_pos = rig
            .instance
            .world_transform(rig.pole_control.transform)
            .unwrap()
            .translation;
        assert_eq!(pole_pos, Vec3::new(6., 8., 0.));
        let middle = chain.position(rig.joints.middle);
        let root = chain.position(rig.joints.root);
        assert!(pole_pos.distance(middle) > root.distance(middle));
    }

    #[test]
    fn pole_vector_mode_switch_swaps_weights_and_twist() {
        let rig = build(false);
        let chain = arm_chain();
        let w0 = TargetPin::node(rig.pole_switch.constraint, ConstraintNode::weight_pin(0));
        let w1 = TargetPin::node(rig.pole_switch.constraint, ConstraintNode::weight_pin(1));
        let twist = TargetPin::node(rig.ik_handle, pole_vector::TWIST);
        let visibility = TargetPin::node(rig.pole_control.pre_transform, channels::VISIBILITY);

        let no_flip = GraphSampler::new(&rig.instance, &chain);
        assert_eq!(no_flip.target(&w0).unwrap().as_f32().unwrap(), 1.0);
        assert_eq!(no_flip.target(&w1).unwrap().as_f32().unwrap(), 0.0);
        assert_eq!(
            no_flip.target(&twist).unwrap().as_f32().unwrap(),
            rig.pole_switch.no_flip_twist
        );
        assert_eq!(no_flip.target(&visibility).unwrap().as_f32().unwrap(), 0.0);

        let manual =
            GraphSampler::new(&rig.instance, &chain).with_override(rig.pole_switch.mode_pin.clone(), 1.0);
        let (w0, w1) = (
            manual.target(&w0).unwrap().as_f32().unwrap(),
            manual.target(&w1).unwrap().as_f32().unwrap(),
        );
        assert_eq!((w0, w1), (0.0, 1.0));
        assert_eq!(w0 + w1, 1.0);
        assert_eq!(manual.target(&twist).unwrap().as_f32().unwrap(), 0.0);
        assert_eq!(manual.target(&visibility).unwrap().as_f32().unwrap(), 1.0);
    }

    #[test]
    fn elbow_blend_extremes_reproduce_both_networks() {
        let rig = build(true);
        let chain = arm_chain();
        let blend_pin = rig.elbow_blend_pin.clone().unwrap();

        // Blend 0: pure stretch-corrected values.
        let ik_only = GraphSampler::new(&rig.instance, &chain)
            .with_override(blend_pin.clone(), 0.0);
        let lower = ik_only.target(&rig.lower_translate).unwrap().as_f32().unwrap();
        assert!((lower - 4.0).abs() < 1e-5);

        // Blend 1: pure live-distance values, the elbow behaves like FK.
        let elbow = GraphSampler::new(&rig.instance, &chain).with_override(blend_pin, 1.0);
        let lower = elbow.target(&rig.lower_translate).unwrap().as_f32().unwrap();
        let upper = elbow.target(&rig.upper_translate).unwrap().as_f32().unwrap();
        let pole_pos = Vec3::new(6., 8., 0.);
        assert!((lower - pole_pos.distance(Vec3::new(10., 0., 0.))).abs() < 1e-4);
        assert!((upper - pole_pos.distance(Vec3::ZERO)).abs() < 1e-4);
    }

    #[test]
    fn published_channels_cover_the_animator_surface() {
        let rig = build(true);
        assert!(rig.instance.published_pin("ik_control_translateX").is_some());
        assert!(rig.instance.published_pin("ik_control_rotateZ").is_some());
        assert!(rig.instance.published_pin("ik_poleVector_translateY").is_some());
        assert!(
            rig.instance
                .published_pin("ik_control_Pole_Vector_Mode")
                .is_some()
        );
        assert!(rig.instance.published_pin("ik_control_Elbow_Blend").is_some());
    }
}
