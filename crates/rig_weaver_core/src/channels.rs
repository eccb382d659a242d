//! Shared channel and value vocabulary for the rig graph.
//!
//! Pins address a single scalar or vector channel on a node (or on a joint of
//! the externally supplied chain). Channel ids are plain strings so hosts can
//! map them onto their own attribute naming; the constants below are the ids
//! this crate wires.

use bevy::{math::Vec3, reflect::Reflect};
use serde::{Deserialize, Serialize};

use crate::{errors::GraphError, joint_chain::JointId, registry::NodeHandle};

pub type PinId = String;

/// World-space position of a transform or joint. The only vector-valued
/// channel; everything else in a rig graph is scalar.
pub const WORLD_POSITION: &str = "worldPosition";
pub const VISIBILITY: &str = "visibility";

#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn unit(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }

    pub fn component(self, v: Vec3) -> f32 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
            Axis::Z => v.z,
        }
    }

    pub fn translate_channel(self) -> &'static str {
        match self {
            Axis::X => "translateX",
            Axis::Y => "translateY",
            Axis::Z => "translateZ",
        }
    }

    pub fn rotate_channel(self) -> &'static str {
        match self {
            Axis::X => "rotateX",
            Axis::Y => "rotateY",
            Axis::Z => "rotateZ",
        }
    }

    pub fn rotate_pivot_channel(self) -> &'static str {
        match self {
            Axis::X => "rotatePivotX",
            Axis::Y => "rotatePivotY",
            Axis::Z => "rotatePivotZ",
        }
    }
}

/// The sequence in which a transform's rotation channels compose.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotateOrder {
    #[default]
    Xyz,
    Yzx,
    Zxy,
    Xzy,
    Yxz,
    Zyx,
}

impl RotateOrder {
    /// Order that applies `first`, then `second`, then `third`. `None` when
    /// the axes are not a permutation of X/Y/Z.
    pub fn from_axes(first: Axis, second: Axis, third: Axis) -> Option<Self> {
        use Axis::*;
        match (first, second, third) {
            (X, Y, Z) => Some(Self::Xyz),
            (Y, Z, X) => Some(Self::Yzx),
            (Z, X, Y) => Some(Self::Zxy),
            (X, Z, Y) => Some(Self::Xzy),
            (Y, X, Z) => Some(Self::Yxz),
            (Z, Y, X) => Some(Self::Zyx),
            _ => None,
        }
    }
}

#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataSpec {
    #[default]
    F32,
    Vec3,
}

#[derive(Reflect, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    F32(f32),
    Vec3(Vec3),
}

impl DataValue {
    pub fn spec(&self) -> DataSpec {
        match self {
            DataValue::F32(_) => DataSpec::F32,
            DataValue::Vec3(_) => DataSpec::Vec3,
        }
    }

    pub fn as_f32(&self) -> Result<f32, GraphError> {
        match self {
            DataValue::F32(v) => Ok(*v),
            other => Err(GraphError::MismatchedDataType {
                expected: DataSpec::F32,
                found: other.spec(),
            }),
        }
    }

    pub fn as_vec3(&self) -> Result<Vec3, GraphError> {
        match self {
            DataValue::Vec3(v) => Ok(*v),
            other => Err(GraphError::MismatchedDataType {
                expected: DataSpec::Vec3,
                found: other.spec(),
            }),
        }
    }
}

impl Default for DataValue {
    fn default() -> Self {
        Self::F32(0.)
    }
}

impl From<f32> for DataValue {
    fn from(value: f32) -> Self {
        Self::F32(value)
    }
}

impl From<Vec3> for DataValue {
    fn from(value: Vec3) -> Self {
        Self::Vec3(value)
    }
}

/// Value-producing end of an edge.
#[derive(Reflect, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourcePin {
    Node(NodeHandle, PinId),
    Joint(JointId, PinId),
}

impl SourcePin {
    pub fn node(handle: NodeHandle, pin: impl Into<PinId>) -> Self {
        Self::Node(handle, pin.into())
    }

    pub fn joint(joint: JointId, pin: impl Into<PinId>) -> Self {
        Self::Joint(joint, pin.into())
    }
}

/// Value-consuming end of an edge. A target is driven by at most one source.
#[derive(Reflect, Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetPin {
    Node(NodeHandle, PinId),
    Joint(JointId, PinId),
}

impl TargetPin {
    pub fn node(handle: NodeHandle, pin: impl Into<PinId>) -> Self {
        Self::Node(handle, pin.into())
    }

    pub fn joint(joint: JointId, pin: impl Into<PinId>) -> Self {
        Self::Joint(joint, pin.into())
    }
}
