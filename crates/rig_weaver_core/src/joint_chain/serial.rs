//! Plain serde PODs for the textual (RON) joint-chain form.
//!
//! Deserialization is two-step: parse the POD, then convert into the value
//! type with full chain validation. This keeps serde derive boilerplate out
//! of the validated types.

use bevy::math::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    channels::Axis,
    errors::RigBuildError,
    joint_chain::{Joint, JointChain, MirrorInfo, NodeAxes, TranslationSpace},
};

#[derive(Debug, Error)]
pub enum ChainParseError {
    #[error("could not parse chain: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error(transparent)]
    Build(#[from] RigBuildError),
}

#[derive(Serialize, Deserialize)]
pub struct JointChainSerial {
    pub joints: Vec<JointSerial>,
    #[serde(default)]
    pub translation_space: TranslationSpace,
    #[serde(default)]
    pub ik_segment_mid_pos: Option<[f32; 3]>,
}

#[derive(Serialize, Deserialize)]
pub struct JointSerial {
    pub name: String,
    pub parent: Option<usize>,
    pub position: [f32; 3],
    /// Orientation quaternion as (x, y, z, w); identity when omitted.
    #[serde(default = "identity_orientation")]
    pub orientation: [f32; 4],
    /// Aim/up/plane axes as a three letter string, e.g. `"XYZ"`.
    pub node_axes: String,
    #[serde(default = "default_radius")]
    pub radius: f32,
    #[serde(default)]
    pub mirror: Option<MirrorInfo>,
}

fn identity_orientation() -> [f32; 4] {
    [0., 0., 0., 1.]
}

fn default_radius() -> f32 {
    1.0
}

impl JointChainSerial {
    pub fn from_value(chain: &JointChain) -> Self {
        JointChainSerial {
            joints: chain
                .joints()
                .map(|(_, joint)| JointSerial {
                    name: joint.name.clone(),
                    parent: joint.parent,
                    position: joint.world_position.to_array(),
                    orientation: joint.world_orientation.to_array(),
                    node_axes: [joint.node_axes.aim, joint.node_axes.up, joint.node_axes.plane]
                        .iter()
                        .map(axis_letter)
                        .collect(),
                    radius: joint.radius,
                    mirror: joint.mirror,
                })
                .collect(),
            translation_space: chain.translation_space,
            ik_segment_mid_pos: chain.ik_segment_mid_pos.map(|v| v.to_array()),
        }
    }

    pub fn to_value(&self) -> Result<JointChain, RigBuildError> {
        let joints = self
            .joints
            .iter()
            .map(|serial| {
                Ok(Joint {
                    name: serial.name.clone(),
                    parent: serial.parent,
                    world_position: Vec3::from_array(serial.position),
                    world_orientation: Quat::from_array(serial.orientation),
                    node_axes: parse_node_axes(&serial.node_axes).ok_or_else(|| {
                        RigBuildError::DegenerateNodeAxes {
                            joint: serial.name.clone(),
                        }
                    })?,
                    radius: serial.radius,
                    mirror: serial.mirror,
                })
            })
            .collect::<Result<Vec<_>, RigBuildError>>()?;

        let mut chain = JointChain::new(joints)?.with_translation_space(self.translation_space);
        if let Some(mid) = self.ik_segment_mid_pos {
            chain = chain.with_segment_mid_pos(Vec3::from_array(mid));
        }
        Ok(chain)
    }
}

impl JointChain {
    pub fn from_ron_str(source: &str) -> Result<Self, ChainParseError> {
        let serial: JointChainSerial = ron::de::from_str(source)?;
        Ok(serial.to_value()?)
    }

    pub fn to_ron_string(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(
            &JointChainSerial::from_value(self),
            ron::ser::PrettyConfig::default(),
        )
    }
}

fn axis_letter(axis: &Axis) -> char {
    match axis {
        Axis::X => 'X',
        Axis::Y => 'Y',
        Axis::Z => 'Z',
    }
}

fn parse_node_axes(text: &str) -> Option<NodeAxes> {
    let mut axes = text.chars().map(|c| match c.to_ascii_uppercase() {
        'X' => Some(Axis::X),
        'Y' => Some(Axis::Y),
        'Z' => Some(Axis::Z),
        _ => None,
    });

    let (aim, up, plane) = (axes.next()??, axes.next()??, axes.next()??);
    if axes.next().is_some() {
        return None;
    }
    Some(NodeAxes { aim, up, plane })
}

#[cfg(test)]
mod test {
    use super::*;

    const LEG: &str = r#"(
        joints: [
            (name: "hip", parent: None, position: (0.0, 10.0, 0.0), node_axes: "XYZ"),
            (name: "knee", parent: Some(0), position: (0.0, 5.0, 0.5), node_axes: "XYZ"),
            (name: "ankle", parent: Some(1), position: (0.0, 1.0, 0.0), node_axes: "XYZ"),
        ],
        ik_segment_mid_pos: Some((0.0, 5.5, 0.0)),
    )"#;

    #[test]
    fn parses_a_chain_from_ron() {
        let chain = JointChain::from_ron_str(LEG).unwrap();
        assert_eq!(chain.len(), 3);
        assert!(chain.ik_segment_mid_pos.is_some());
        assert_eq!(chain.joint(chain.root()).name, "hip");
    }

    #[test]
    fn round_trips_through_the_serial_form() {
        let chain = JointChain::from_ron_str(LEG).unwrap();
        let text = chain.to_ron_string().unwrap();
        let reparsed = JointChain::from_ron_str(&text).unwrap();
        assert_eq!(reparsed.len(), chain.len());
        assert_eq!(
            reparsed.joint(reparsed.root()).world_position,
            chain.joint(chain.root()).world_position
        );
    }

    #[test]
    fn bad_axis_letters_are_rejected() {
        let result = JointChain::from_ron_str(
            r#"(joints: [(name: "a", parent: None, position: (0.0, 0.0, 0.0), node_axes: "XXW")])"#,
        );
        assert!(result.is_err());
    }
}
