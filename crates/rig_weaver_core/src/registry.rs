//! Arena of everything a rig instance owns.
//!
//! Nodes are addressed by opaque [`NodeHandle`]s issued at insertion; labels
//! are metadata for inspection and host-side naming, never lookup keys.

use bevy::{
    math::Vec3, platform::collections::HashSet, reflect::Reflect,
    transform::components::Transform,
};
use indexmap::IndexMap;

use crate::{
    channels::{PinId, RotateOrder},
    joint_chain::JointId,
    rig_graph::operators::OperatorNode,
};

/// Opaque handle into a rig's node registry. Only meaningful for the registry
/// that issued it.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(u32);

/// A node owned by the rig, or a joint of the externally supplied chain.
/// Joints are referenced, never owned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneRef {
    Node(NodeHandle),
    Joint(JointId),
}

#[derive(Debug, Clone)]
pub struct RigNode {
    pub label: String,
    pub kind: RigNodeKind,
}

#[derive(Debug, Clone)]
pub enum RigNodeKind {
    Transform(TransformNode),
    Operator(OperatorNode),
    Constraint(ConstraintNode),
}

impl RigNode {
    pub fn transform(&self) -> Option<&TransformNode> {
        match &self.kind {
            RigNodeKind::Transform(t) => Some(t),
            _ => None,
        }
    }

    pub fn operator(&self) -> Option<&OperatorNode> {
        match &self.kind {
            RigNodeKind::Operator(op) => Some(op),
            _ => None,
        }
    }

    pub fn constraint(&self) -> Option<&ConstraintNode> {
        match &self.kind {
            RigNodeKind::Constraint(c) => Some(c),
            _ => None,
        }
    }
}

/// Cosmetic shape drawn for a control's proxy node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProxyShape {
    pub radius: f32,
    pub style: ProxyStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStyle {
    /// Large ring drawn for main grab handles.
    Ring,
    /// Small diamond drawn for secondary handles (pole vectors, pivots).
    Diamond,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IkSolver {
    /// Two-segment solve with a pole-vector target slot and a twist channel.
    RotatePlane,
    /// Single-segment aim solve.
    SingleChain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IkSpec {
    pub solver: IkSolver,
    pub start: JointId,
    pub end: JointId,
}

/// What a transform node is for. The role never changes after creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformRole {
    Group,
    Locator,
    Proxy(ProxyShape),
    IkHandle(IkSpec),
}

/// A transform owned by the rig: local and world placement captured at build
/// time, plus the channel metadata the graph wires against.
#[derive(Debug, Clone)]
pub struct TransformNode {
    pub parent: Option<NodeHandle>,
    pub local: Transform,
    pub world: Transform,
    pub rotate_order: RotateOrder,
    pub rotate_pivot: Vec3,
    pub visibility: bool,
    pub role: TransformRole,
    /// Channels removed from the keyable set and locked at their rest value.
    pub locked: HashSet<PinId>,
    /// Custom animator-facing attributes added to this transform.
    pub attrs: IndexMap<PinId, AttrSpec>,
}

impl TransformNode {
    pub fn at_world(world: Transform, role: TransformRole) -> Self {
        TransformNode {
            parent: None,
            local: world,
            world,
            rotate_order: RotateOrder::default(),
            rotate_pivot: Vec3::ZERO,
            visibility: true,
            role,
            locked: HashSet::default(),
            attrs: IndexMap::new(),
        }
    }

    pub fn ik_spec(&self) -> Option<IkSpec> {
        match self.role {
            TransformRole::IkHandle(spec) => Some(spec),
            _ => None,
        }
    }
}

/// Declared range and default of a custom attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrSpec {
    Scalar {
        default: f32,
        min: Option<f32>,
        max: Option<f32>,
    },
    Enum {
        variants: Vec<String>,
        default: i32,
    },
}

impl AttrSpec {
    pub fn default_value(&self) -> f32 {
        match self {
            AttrSpec::Scalar { default, .. } => *default,
            AttrSpec::Enum { default, .. } => *default as f32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Point,
    Orient,
    Parent,
    PoleVector,
}

/// A weighted constraint relationship. The `envelope` pin scales the whole
/// constraint and is wired from the rig-weight attribute on creation; the
/// per-target `w{i}` pins are what mode switches drive.
#[derive(Debug, Clone)]
pub struct ConstraintNode {
    pub kind: ConstraintKind,
    pub constrained: SceneRef,
    pub targets: Vec<ConstraintTarget>,
    pub maintain_offset: bool,
}

#[derive(Debug, Clone)]
pub struct ConstraintTarget {
    pub source: SceneRef,
    /// Rest weight, used when no edge or mode switch drives the pin.
    pub weight: f32,
}

impl ConstraintNode {
    pub const ENVELOPE: &'static str = "envelope";

    pub fn weight_pin(index: usize) -> PinId {
        format!("w{index}")
    }

    pub fn weight_index(pin: &str) -> Option<usize> {
        pin.strip_prefix('w')?.parse().ok()
    }
}

#[derive(Debug, Default, Clone)]
pub struct Registry {
    nodes: Vec<RigNode>,
}

impl Registry {
    pub fn insert(&mut self, label: impl Into<String>, kind: RigNodeKind) -> NodeHandle {
        let handle = NodeHandle(self.nodes.len() as u32);
        self.nodes.push(RigNode {
            label: label.into(),
            kind,
        });
        handle
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&RigNode> {
        self.nodes.get(handle.0 as usize)
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut RigNode> {
        self.nodes.get_mut(handle.0 as usize)
    }

    pub fn transform(&self, handle: NodeHandle) -> Option<&TransformNode> {
        self.get(handle).and_then(RigNode::transform)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &RigNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeHandle(index as u32), node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn handles_stay_stable_as_nodes_are_added() {
        let mut registry = Registry::default();
        let a = registry.insert(
            "a",
            RigNodeKind::Transform(TransformNode::at_world(
                Transform::IDENTITY,
                TransformRole::Group,
            )),
        );
        let b = registry.insert(
            "b",
            RigNodeKind::Transform(TransformNode::at_world(
                Transform::IDENTITY,
                TransformRole::Locator,
            )),
        );
        assert_ne!(a, b);
        assert_eq!(registry.get(a).unwrap().label, "a");
        assert_eq!(registry.get(b).unwrap().label, "b");
    }

    #[test]
    fn weight_pin_round_trips() {
        assert_eq!(ConstraintNode::weight_pin(3), "w3");
        assert_eq!(ConstraintNode::weight_index("w3"), Some(3));
        assert_eq!(ConstraintNode::weight_index("envelope"), None);
    }
}
