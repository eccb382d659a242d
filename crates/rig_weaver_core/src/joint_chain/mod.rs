//! The externally supplied joint hierarchy a rig is built against.
//!
//! A chain is a small parent-indexed tree, root first. Rig instances only
//! ever *reference* joints (by [`JointId`]); the chain itself is owned by the
//! caller and never mutated by a build.

pub mod serial;

use bevy::{
    math::{Quat, Vec3},
    reflect::Reflect,
};
use serde::{Deserialize, Serialize};

use crate::{
    channels::Axis,
    errors::RigBuildError,
    vector_math,
};

/// Index of a joint within its chain. Stable for the lifetime of the chain.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointId(pub usize);

/// Local axis convention of a joint: which local axis aims down the bone,
/// which is the up reference, and which is perpendicular to the creation
/// plane. Always a permutation of X/Y/Z (validated on chain construction).
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAxes {
    pub aim: Axis,
    pub up: Axis,
    pub plane: Axis,
}

impl NodeAxes {
    pub fn is_permutation(&self) -> bool {
        self.aim != self.up && self.up != self.plane && self.plane != self.aim
    }
}

/// How translation controls built for this chain are oriented.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TranslationSpace {
    #[default]
    World,
    LocalOrientation,
}

/// How a mirrored counterpart's rotations relate to this side's.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MirrorRotationMode {
    /// Rotations behave symmetrically: equal control input produces the
    /// mirrored pose.
    #[default]
    Behaviour,
    /// Mirrored joints keep the same world orientation.
    Orientation,
}

#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreationPlane {
    XY,
    YZ,
    XZ,
}

impl CreationPlane {
    pub fn normal(self) -> Axis {
        match self {
            CreationPlane::XY => Axis::Z,
            CreationPlane::YZ => Axis::X,
            CreationPlane::XZ => Axis::Y,
        }
    }
}

/// Mirror metadata carried by joints that belong to a mirrored module pair.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MirrorInfo {
    pub plane: CreationPlane,
    /// Which side of the plane this joint was created on.
    pub sign: f32,
    pub rotation_mode: MirrorRotationMode,
}

#[derive(Reflect, Debug, Clone)]
pub struct Joint {
    pub name: String,
    /// Chain index of the parent; `None` exactly for the root (index 0).
    pub parent: Option<usize>,
    pub world_position: Vec3,
    pub world_orientation: Quat,
    pub node_axes: NodeAxes,
    /// Drives the default size of controls built on this joint.
    pub radius: f32,
    pub mirror: Option<MirrorInfo>,
}

/// Joints of a validated 3-joint hinge chain.
#[derive(Debug, Clone, Copy)]
pub struct HingeJoints {
    pub root: JointId,
    pub middle: JointId,
    pub end: JointId,
}

/// Joints of a validated reverse-foot leg chain.
#[derive(Debug, Clone, Copy)]
pub struct FootJoints {
    pub hip: JointId,
    pub knee: JointId,
    pub ankle: JointId,
    pub ball: JointId,
    pub toe: JointId,
    pub heel: JointId,
}

#[derive(Reflect, Debug, Clone)]
pub struct JointChain {
    joints: Vec<Joint>,
    pub translation_space: TranslationSpace,
    /// Projection of the middle joint onto the root-end line, precomputed by
    /// the module system for hinge chains.
    pub ik_segment_mid_pos: Option<Vec3>,
}

impl JointChain {
    const MIN_SEGMENT_LENGTH: f32 = 1e-5;

    pub fn new(joints: Vec<Joint>) -> Result<Self, RigBuildError> {
        let chain = JointChain {
            joints,
            translation_space: TranslationSpace::default(),
            ik_segment_mid_pos: None,
        };
        chain.validate()?;
        Ok(chain)
    }

    pub fn with_translation_space(mut self, space: TranslationSpace) -> Self {
        self.translation_space = space;
        self
    }

    pub fn with_segment_mid_pos(mut self, pos: Vec3) -> Self {
        self.ik_segment_mid_pos = Some(pos);
        self
    }

    fn validate(&self) -> Result<(), RigBuildError> {
        if self.joints.is_empty() {
            return Err(RigBuildError::EmptyChain);
        }

        for (index, joint) in self.joints.iter().enumerate() {
            if self
                .joints
                .iter()
                .filter(|other| other.name == joint.name)
                .count()
                > 1
            {
                return Err(RigBuildError::DuplicateJointName(joint.name.clone()));
            }

            match joint.parent {
                None if index != 0 => {
                    return Err(RigBuildError::MultipleRoots(joint.name.clone()));
                }
                Some(parent) if parent >= index => {
                    return Err(RigBuildError::ParentAfterChild(joint.name.clone()));
                }
                Some(parent) => {
                    let parent = &self.joints[parent];
                    if vector_math::magnitude(parent.world_position, joint.world_position)
                        < Self::MIN_SEGMENT_LENGTH
                    {
                        return Err(RigBuildError::CoincidentJoints {
                            a: parent.name.clone(),
                            b: joint.name.clone(),
                        });
                    }
                }
                None => {}
            }

            if !joint.node_axes.is_permutation() {
                return Err(RigBuildError::DegenerateNodeAxes {
                    joint: joint.name.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn root(&self) -> JointId {
        JointId(0)
    }

    pub fn joint(&self, id: JointId) -> &Joint {
        &self.joints[id.0]
    }

    pub fn joints(&self) -> impl Iterator<Item = (JointId, &Joint)> {
        self.joints
            .iter()
            .enumerate()
            .map(|(index, joint)| (JointId(index), joint))
    }

    pub fn parent(&self, id: JointId) -> Option<JointId> {
        self.joints[id.0].parent.map(JointId)
    }

    pub fn position(&self, id: JointId) -> Vec3 {
        self.joints[id.0].world_position
    }

    pub fn children_of(&self, id: JointId) -> Vec<JointId> {
        self.joints()
            .filter(|(_, joint)| joint.parent == Some(id.0))
            .map(|(child, _)| child)
            .collect()
    }

    /// All descendants of `id`, depth first.
    pub fn descendants_of(&self, id: JointId) -> Vec<JointId> {
        let mut out = vec![];
        let mut pending = self.children_of(id);
        pending.reverse();
        while let Some(next) = pending.pop() {
            out.push(next);
            let mut children = self.children_of(next);
            children.reverse();
            pending.extend(children);
        }
        out
    }

    /// Signed rest translation of `id` relative to its parent, expressed in
    /// the parent's local frame. Zero for the root.
    pub fn local_translation(&self, id: JointId) -> Vec3 {
        let Some(parent) = self.parent(id) else {
            return Vec3::ZERO;
        };
        let parent = self.joint(parent);
        parent.world_orientation.inverse() * (self.position(id) - parent.world_position)
    }

    /// Classifies this chain as a 3-joint hinge (root, middle, end).
    pub fn hinge_joints(&self) -> Result<HingeJoints, RigBuildError> {
        if self.joints.len() != 3
            || self.joints[1].parent != Some(0)
            || self.joints[2].parent != Some(1)
        {
            return Err(RigBuildError::NotAHingeChain {
                found: self.joints.len(),
            });
        }
        Ok(HingeJoints {
            root: JointId(0),
            middle: JointId(1),
            end: JointId(2),
        })
    }

    /// Classifies this chain as a reverse-foot leg: a hip/knee/ankle hinge
    /// whose ankle has exactly one ball child (with further descendants,
    /// ending in the toe) and one heel child (a leaf).
    pub fn foot_joints(&self) -> Result<FootJoints, RigBuildError> {
        if self.joints.len() < 5 || self.joints[1].parent != Some(0) || self.joints[2].parent != Some(1)
        {
            return Err(RigBuildError::NotAHingeChain {
                found: self.joints.len(),
            });
        }
        let ankle = JointId(2);

        let mut ball = None;
        let mut heel = None;
        for child in self.children_of(ankle) {
            if self.children_of(child).is_empty() {
                if heel.replace(child).is_some() {
                    return Err(RigBuildError::AmbiguousFootChildren {
                        ankle: self.joint(ankle).name.clone(),
                    });
                }
            } else if ball.replace(child).is_some() {
                return Err(RigBuildError::AmbiguousFootChildren {
                    ankle: self.joint(ankle).name.clone(),
                });
            }
        }

        let (Some(ball), Some(heel)) = (ball, heel) else {
            return Err(RigBuildError::AmbiguousFootChildren {
                ankle: self.joint(ankle).name.clone(),
            });
        };

        let toe = *self
            .descendants_of(ball)
            .last()
            .expect("ball was classified by having descendants");

        Ok(FootJoints {
            hip: JointId(0),
            knee: JointId(1),
            ankle,
            ball,
            toe,
            heel,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn joint(name: &str, parent: Option<usize>, position: Vec3) -> Joint {
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

    fn leg_chain() -> JointChain {
        JointChain::new(vec![
            joint("hip", None, Vec3::new(0., 10., 0.)),
            joint("knee", Some(0), Vec3::new(0., 5., 0.5)),
            joint("ankle", Some(1), Vec3::new(0., 1., 0.)),
            joint("ball", Some(2), Vec3::new(0., 0., 1.)),
            joint("toe", Some(3), Vec3::new(0., 0., 2.)),
            joint("heel", Some(2), Vec3::new(0., 0., -0.5)),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_duplicate_names() {
        let result = JointChain::new(vec![
            joint("hip", None, Vec3::ZERO),
            joint("hip", Some(0), Vec3::X),
        ]);
        assert!(matches!(result, Err(RigBuildError::DuplicateJointName(_))));
    }

    #[test]
    fn rejects_second_root() {
        let result = JointChain::new(vec![
            joint("hip", None, Vec3::ZERO),
            joint("stray", None, Vec3::X),
        ]);
        assert!(matches!(result, Err(RigBuildError::MultipleRoots(_))));
    }

    #[test]
    fn rejects_coincident_joints() {
        let result = JointChain::new(vec![
            joint("hip", None, Vec3::ZERO),
            joint("knee", Some(0), Vec3::ZERO),
        ]);
        assert!(matches!(result, Err(RigBuildError::CoincidentJoints { .. })));
    }

    #[test]
    fn classifies_foot_children() {
        let chain = leg_chain();
        let foot = chain.foot_joints().unwrap();
        assert_eq!(chain.joint(foot.ball).name, "ball");
        assert_eq!(chain.joint(foot.toe).name, "toe");
        assert_eq!(chain.joint(foot.heel).name, "heel");
    }

    #[test]
    fn two_leaf_ankle_children_are_ambiguous() {
        let chain = JointChain::new(vec![
            joint("hip", None, Vec3::new(0., 10., 0.)),
            joint("knee", Some(0), Vec3::new(0., 5., 0.5)),
            joint("ankle", Some(1), Vec3::new(0., 1., 0.)),
            joint("ball", Some(2), Vec3::new(0., 0., 1.)),
            joint("heel", Some(2), Vec3::new(0., 0., -0.5)),
        ])
        .unwrap();
        assert!(matches!(
            chain.foot_joints(),
            Err(RigBuildError::AmbiguousFootChildren { .. })
        ));
    }

    #[test]
    fn local_translation_is_expressed_in_parent_frame() {
        let mut joints = vec![
            joint("a", None, Vec3::ZERO),
            joint("b", Some(0), Vec3::new(0., 3., 0.)),
        ];
        // Parent aims its local X up the world Y axis.
        joints[0].world_orientation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let chain = JointChain::new(joints).unwrap();
        let local = chain.local_translation(JointId(1));
        assert!((local - Vec3::new(3., 0., 0.)).length() < 1e-5);
    }

    #[test]
    fn hinge_requires_exactly_three_joints() {
        assert!(leg_chain().hinge_joints().is_err());
    }
}
