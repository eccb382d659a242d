//! Left/right mirroring support.
//!
//! A mirrored rig pair is two independent instances built sequentially; this
//! module supplies the pieces that stay in sync between them: label flipping
//! (regex pattern mapper), geometric reflection of a joint chain across its
//! creation plane, and the one-way copy of published attribute defaults from
//! the primary side.

use bevy::math::{Quat, Vec3};
use regex::Regex;

use crate::{
    channels::{Axis, SourcePin},
    errors::RigBuildError,
    joint_chain::{CreationPlane, Joint, JointChain, MirrorRotationMode},
    registry::{AttrSpec, RigNodeKind},
    rig_instance::RigInstance,
};

/// Flips a side token (e.g. `_L` / `_R`) inside a label. The regex is built
/// as `(pattern_before)(key_1|key_2)(pattern_after)` and the matched key is
/// swapped for its partner.
#[derive(Debug, Clone)]
pub struct PatternMapper {
    pub key_1: String,
    pub key_2: String,
    pub pattern_before: String,
    pub pattern_after: String,
    regex: Regex,
}

impl PatternMapper {
    pub fn new(
        key_1: &str,
        key_2: &str,
        pattern_before: &str,
        pattern_after: &str,
    ) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!(
            "({pattern_before})({key_1}|{key_2})({pattern_after})"
        ))?;
        Ok(PatternMapper {
            key_1: key_1.into(),
            key_2: key_2.into(),
            pattern_before: pattern_before.into(),
            pattern_after: pattern_after.into(),
            regex,
        })
    }

    pub fn flip(&self, input: &str) -> Option<String> {
        let captures = self.regex.captures(input)?;
        let key_capture = captures.get(2).unwrap().as_str();
        let replacement_key = if key_capture == self.key_1 {
            &self.key_2
        } else {
            &self.key_1
        };
        Some(
            self.regex
                .replace(input, format!("${{1}}{replacement_key}${{3}}"))
                .into(),
        )
    }
}

impl Default for PatternMapper {
    fn default() -> Self {
        // Suffix convention: "hip_L" <-> "hip_R".
        PatternMapper::new("L", "R", "^.*_", "$").expect("default pattern is valid")
    }
}

#[derive(Debug, Clone)]
pub struct SymmetryConfig {
    pub name_mapper: PatternMapper,
    pub plane: CreationPlane,
    pub rotation_mode: MirrorRotationMode,
}

impl SymmetryConfig {
    pub fn across(plane: CreationPlane) -> Self {
        SymmetryConfig {
            name_mapper: PatternMapper::default(),
            plane,
            rotation_mode: MirrorRotationMode::Behaviour,
        }
    }
}

pub fn reflect_point(plane: CreationPlane, mut point: Vec3) -> Vec3 {
    match plane.normal() {
        Axis::X => point.x *= -1.,
        Axis::Y => point.y *= -1.,
        Axis::Z => point.z *= -1.,
    }
    point
}

/// Reflects an orientation across the plane.
///
/// In behaviour mode the vector components off the plane normal are negated
/// (so equal channel values produce the mirrored pose); in orientation mode
/// the world orientation is kept as is.
pub fn reflect_orientation(
    plane: CreationPlane,
    mode: MirrorRotationMode,
    mut rotation: Quat,
) -> Quat {
    if mode == MirrorRotationMode::Orientation {
        return rotation;
    }
    match plane.normal() {
        Axis::X => {
            rotation.y *= -1.;
            rotation.z *= -1.;
        }
        Axis::Y => {
            rotation.x *= -1.;
            rotation.z *= -1.;
        }
        Axis::Z => {
            rotation.x *= -1.;
            rotation.y *= -1.;
        }
    }
    rotation
}

/// Builds the geometric mirror of a chain: positions reflected across the
/// creation plane, orientations per the rotation mode, names flipped through
/// the pattern mapper, side signs inverted.
pub fn mirror_chain(chain: &JointChain, config: &SymmetryConfig) -> Result<JointChain, RigBuildError> {
    let joints = chain
        .joints()
        .map(|(_, joint)| Joint {
            name: config
                .name_mapper
                .flip(&joint.name)
                .unwrap_or_else(|| joint.name.clone()),
            parent: joint.parent,
            world_position: reflect_point(config.plane, joint.world_position),
            world_orientation: reflect_orientation(
                config.plane,
                config.rotation_mode,
                joint.world_orientation,
            ),
            node_axes: joint.node_axes,
            radius: joint.radius,
            mirror: joint.mirror.map(|mut info| {
                info.sign *= -1.;
                info
            }),
        })
        .collect();

    let mut mirrored = JointChain::new(joints)?.with_translation_space(chain.translation_space);
    if let Some(mid) = chain.ik_segment_mid_pos {
        mirrored = mirrored.with_segment_mid_pos(reflect_point(config.plane, mid));
    }
    Ok(mirrored)
}

/// One-way sync of published attribute defaults from the primary side of a
/// mirrored pair onto its counterpart. Attributes are matched by published
/// name, flipped through the mapper when it applies.
pub fn copy_attribute_defaults(
    primary: &RigInstance,
    config: &SymmetryConfig,
    mirror: &mut RigInstance,
) {
    for attr in primary.published().to_vec() {
        let SourcePin::Node(source_handle, pin) = &attr.pin else {
            continue;
        };
        let Some(spec) = primary
            .registry()
            .transform(*source_handle)
            .and_then(|t| t.attrs.get(pin))
            .cloned()
        else {
            continue;
        };

        let mirrored_name = config
            .name_mapper
            .flip(&attr.name)
            .unwrap_or_else(|| attr.name.clone());
        let Some(SourcePin::Node(target_handle, target_pin)) =
            mirror.published_pin(&mirrored_name).cloned()
        else {
            continue;
        };

        if let Some(RigNodeKind::Transform(transform)) =
            mirror.registry.get_mut(target_handle).map(|n| &mut n.kind)
        {
            if let Some(target_spec) = transform.attrs.get_mut(&target_pin) {
                let default = spec.default_value();
                match target_spec {
                    AttrSpec::Scalar { default: d, .. } => *d = default,
                    AttrSpec::Enum { default: d, .. } => *d = default as i32,
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flips_side_suffixes_both_ways() {
        let mapper = PatternMapper::default();
        assert_eq!(mapper.flip("hip_L").as_deref(), Some("hip_R"));
        assert_eq!(mapper.flip("hip_R").as_deref(), Some("hip_L"));
        assert_eq!(mapper.flip("spine"), None);
    }

    #[test]
    fn reflection_across_yz_negates_x() {
        let point = Vec3::new(2., 3., 4.);
        assert_eq!(
            reflect_point(CreationPlane::YZ, point),
            Vec3::new(-2., 3., 4.)
        );
    }

    #[test]
    fn behaviour_reflection_preserves_normalization() {
        let rotation = Quat::from_rotation_y(0.7) * Quat::from_rotation_x(0.3);
        let reflected =
            reflect_orientation(CreationPlane::YZ, MirrorRotationMode::Behaviour, rotation);
        assert!(reflected.is_normalized());
        assert_ne!(reflected, rotation);
    }

    #[test]
    fn orientation_mode_keeps_world_orientation() {
        let rotation = Quat::from_rotation_z(1.2);
        let reflected =
            reflect_orientation(CreationPlane::YZ, MirrorRotationMode::Orientation, rotation);
        assert_eq!(reflected, rotation);
    }
}
