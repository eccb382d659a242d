//! Ownership root of one synthesized rig.

use bevy::transform::components::Transform;
use uuid::Uuid;

use crate::{
    channels::SourcePin,
    controls::Control,
    errors::GraphValidationError,
    joint_chain::JointChain,
    registry::{AttrSpec, NodeHandle, Registry, RigNode, RigNodeKind, TransformNode, TransformRole},
    rig_graph::RigGraph,
};

/// A published animator-facing channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedAttribute {
    pub name: String,
    pub pin: SourcePin,
}

/// Exclusive owner of everything one rig build creates: the node registry,
/// the dataflow graph, the controls and the published channel list.
///
/// The joint chain a rig was built against is only *referenced* (by
/// [`crate::joint_chain::JointId`]); two rig instances never share nodes, and
/// a mirrored pair is simply two instances built one after the other.
/// Construction is all-or-nothing: a build that fails returns an error and
/// the partially assembled instance is dropped.
#[derive(Debug, Clone)]
pub struct RigInstance {
    pub id: Uuid,
    pub label: String,
    pub(crate) registry: Registry,
    pub(crate) graph: RigGraph,
    pub(crate) controls: Vec<Control>,
    pub(crate) published: Vec<PublishedAttribute>,
    root_group: NodeHandle,
}

impl RigInstance {
    /// Scalar blending the whole generated joint-driving layer against the
    /// original skeleton (0 = rig inactive, 1 = fully driving). Wired into
    /// the envelope of every constraint the build creates.
    pub const RIG_WEIGHT: &'static str = "rigWeight";
    /// Uniform scale of the whole character, divided out of world distances
    /// before they are compared against rest lengths.
    pub const GLOBAL_SCALE: &'static str = "globalScale";

    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        let mut registry = Registry::default();

        let mut root = TransformNode::at_world(Transform::IDENTITY, TransformRole::Group);
        root.attrs.insert(
            Self::RIG_WEIGHT.into(),
            AttrSpec::Scalar {
                default: 1.0,
                min: Some(0.0),
                max: Some(1.0),
            },
        );
        root.attrs.insert(
            Self::GLOBAL_SCALE.into(),
            AttrSpec::Scalar {
                default: 1.0,
                min: None,
                max: None,
            },
        );
        let root_group = registry.insert(format!("{label}_Grp"), RigNodeKind::Transform(root));

        RigInstance {
            id: Uuid::new_v4(),
            label,
            registry,
            graph: RigGraph::default(),
            controls: vec![],
            published: vec![],
            root_group,
        }
    }

    pub fn root_group(&self) -> NodeHandle {
        self.root_group
    }

    pub fn weight_pin(&self) -> SourcePin {
        SourcePin::node(self.root_group, Self::RIG_WEIGHT)
    }

    pub fn global_scale_pin(&self) -> SourcePin {
        SourcePin::node(self.root_group, Self::GLOBAL_SCALE)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn graph(&self) -> &RigGraph {
        &self.graph
    }

    pub fn node(&self, handle: NodeHandle) -> Option<&RigNode> {
        self.registry.get(handle)
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    /// Exposes a channel to the host under a stable name.
    pub fn publish(&mut self, pin: SourcePin, name: impl Into<String>) {
        self.published.push(PublishedAttribute {
            name: name.into(),
            pin,
        });
    }

    pub fn published(&self) -> &[PublishedAttribute] {
        &self.published
    }

    pub fn published_pin(&self, name: &str) -> Option<&SourcePin> {
        self.published
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| &attr.pin)
    }

    /// Final well-formedness check before an instance is handed to the host.
    pub fn validate(&self, chain: &JointChain) -> Result<(), GraphValidationError> {
        self.graph.validate(&self.registry, chain)
    }

    /// World transform captured for a node at build time (the rest pose).
    pub fn world_transform(&self, handle: NodeHandle) -> Option<Transform> {
        self.registry.transform(handle).map(|t| t.world)
    }
}
