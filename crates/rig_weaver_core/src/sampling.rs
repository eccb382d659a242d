//! Rest-pose reference sampler.
//!
//! Playback evaluation belongs to the host's dependency-graph engine; this
//! pull-based resolver exists so builds (and tests) can check the values a
//! host would compute at the rest pose. The override layer stands in for
//! animator edits: setting a control attribute or a world position override
//! and re-sampling shows how the network responds, without any notion of
//! time, constraint solving or joint posing.

use bevy::platform::collections::HashMap;

use crate::{
    channels::{self, Axis, DataValue, SourcePin, TargetPin},
    errors::GraphError,
    joint_chain::JointChain,
    registry::{ConstraintNode, RigNodeKind, TransformNode},
    rig_graph::operators::Op,
    rig_instance::RigInstance,
};

pub struct GraphSampler<'a> {
    rig: &'a RigInstance,
    chain: &'a JointChain,
    overrides: HashMap<SourcePin, DataValue>,
}

impl<'a> GraphSampler<'a> {
    pub fn new(rig: &'a RigInstance, chain: &'a JointChain) -> Self {
        GraphSampler {
            rig,
            chain,
            overrides: HashMap::default(),
        }
    }

    pub fn with_override(mut self, pin: SourcePin, value: impl Into<DataValue>) -> Self {
        self.set_override(pin, value);
        self
    }

    pub fn set_override(&mut self, pin: SourcePin, value: impl Into<DataValue>) {
        self.overrides.insert(pin, value.into());
    }

    /// Resolves a value-producing pin.
    pub fn source(&self, pin: &SourcePin) -> Result<DataValue, GraphError> {
        if let Some(value) = self.overrides.get(pin) {
            return Ok(*value);
        }

        match pin {
            SourcePin::Node(handle, id) => {
                let node = self
                    .rig
                    .node(*handle)
                    .ok_or_else(|| GraphError::StaleHandle(pin.clone()))?;
                match &node.kind {
                    RigNodeKind::Operator(operator) => {
                        if id != Op::OUT {
                            return Err(GraphError::MissingSourcePin(pin.clone()));
                        }
                        operator
                            .op
                            .apply(&mut |input| self.target(&TargetPin::node(*handle, input)))
                    }
                    RigNodeKind::Transform(transform) => {
                        if let Some(value) = self.driven(&TargetPin::Node(*handle, id.clone()))? {
                            return Ok(value);
                        }
                        self.rest_channel(transform, id)
                            .ok_or_else(|| GraphError::MissingSourcePin(pin.clone()))
                    }
                    RigNodeKind::Constraint(constraint) => {
                        if let Some(value) = self.driven(&TargetPin::Node(*handle, id.clone()))? {
                            return Ok(value);
                        }
                        self.constraint_rest(constraint, id)
                            .ok_or_else(|| GraphError::MissingSourcePin(pin.clone()))
                    }
                }
            }
            SourcePin::Joint(joint, id) => {
                if joint.0 >= self.chain.len() {
                    return Err(GraphError::StaleHandle(pin.clone()));
                }
                if let Some(value) = self.driven(&TargetPin::Joint(*joint, id.clone()))? {
                    return Ok(value);
                }
                self.joint_rest(*joint, id)
                    .ok_or_else(|| GraphError::MissingSourcePin(pin.clone()))
            }
        }
    }

    /// Resolves what a value-consuming pin currently holds: its driver if it
    /// has one, otherwise its constant or rest value.
    pub fn target(&self, pin: &TargetPin) -> Result<DataValue, GraphError> {
        if let Some(value) = self.driven(pin)? {
            return Ok(value);
        }

        match pin {
            TargetPin::Node(handle, id) => {
                let node = self
                    .rig
                    .node(*handle)
                    .ok_or_else(|| GraphError::UnresolvedTarget(pin.clone()))?;
                match &node.kind {
                    RigNodeKind::Operator(operator) => operator
                        .constant(id)
                        .ok_or_else(|| GraphError::UnresolvedTarget(pin.clone())),
                    RigNodeKind::Transform(transform) => self
                        .rest_channel(transform, id)
                        .ok_or_else(|| GraphError::UnresolvedTarget(pin.clone())),
                    RigNodeKind::Constraint(constraint) => self
                        .constraint_rest(constraint, id)
                        .ok_or_else(|| GraphError::UnresolvedTarget(pin.clone())),
                }
            }
            TargetPin::Joint(joint, id) => self
                .joint_rest(*joint, id)
                .ok_or_else(|| GraphError::UnresolvedTarget(pin.clone())),
        }
    }

    fn driven(&self, target: &TargetPin) -> Result<Option<DataValue>, GraphError> {
        if let Some(source) = self.rig.graph().source_of(target) {
            return self.source(source).map(Some);
        }
        if let Some(switch) = self.rig.graph().mode_switch_driving(target) {
            let driver = self.source(&switch.driver)?.as_f32()?.round() as i32;
            let value = switch
                .effect_on(target, driver)
                .ok_or(GraphError::UnsampledModeValue(driver))?;
            return Ok(Some(value.into()));
        }
        Ok(None)
    }

    fn rest_channel(&self, transform: &TransformNode, id: &str) -> Option<DataValue> {
        if id == channels::WORLD_POSITION {
            return Some(transform.world.translation.into());
        }
        if id == channels::VISIBILITY {
            return Some(if transform.visibility { 1.0 } else { 0.0 }.into());
        }
        if let Some(attr) = transform.attrs.get(id) {
            return Some(attr.default_value().into());
        }
        for axis in Axis::ALL {
            if id == axis.translate_channel() {
                return Some(axis.component(transform.local.translation).into());
            }
            if id == axis.rotate_pivot_channel() {
                return Some(axis.component(transform.rotate_pivot).into());
            }
            // Rotation channels rest at zero: controls and pivot groups are
            // aligned (identity local rotation) when they are created.
            if id == axis.rotate_channel() {
                return Some(0.0.into());
            }
        }
        if id == "twist" {
            return Some(0.0.into());
        }
        None
    }

    fn constraint_rest(&self, constraint: &ConstraintNode, id: &str) -> Option<DataValue> {
        if id == ConstraintNode::ENVELOPE {
            return Some(1.0.into());
        }
        let index = ConstraintNode::weight_index(id)?;
        constraint
            .targets
            .get(index)
            .map(|target| target.weight.into())
    }

    fn joint_rest(&self, joint: crate::joint_chain::JointId, id: &str) -> Option<DataValue> {
        if id == channels::WORLD_POSITION {
            return Some(self.chain.position(joint).into());
        }
        for axis in Axis::ALL {
            if id == axis.translate_channel() {
                return Some(axis.component(self.chain.local_translation(joint)).into());
            }
            if id == axis.rotate_channel() {
                return Some(0.0.into());
            }
        }
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        channels::TargetPin,
        joint_chain::{Joint, JointChain, NodeAxes},
        rig_graph::operators::{Op, OperatorNode},
        rig_graph::{ModeState, ModeSwitch},
    };
    use bevy::math::{Quat, Vec3};
    use bevy::transform::components::Transform;

    fn single_joint_chain() -> JointChain {
        JointChain::new(vec![Joint {
            name: "root".into(),
            parent: None,
            world_position: Vec3::ZERO,
            world_orientation: Quat::IDENTITY,
            node_axes: NodeAxes {
                aim: Axis::X,
                up: Axis::Y,
                plane: Axis::Z,
            },
            radius: 1.0,
            mirror: None,
        }])
        .unwrap()
    }

    #[test]
    fn samples_an_attribute_through_an_operator() {
        let chain = single_joint_chain();
        let mut rig = RigInstance::new("test");
        let root = rig.root_group();
        let attr = rig.add_scalar_attr(root, "amount", 3.0, None, None);
        let double = rig.add_operator(
            "double",
            OperatorNode::new(Op::Multiply).with_input(Op::IN_B, 2.0),
        );
        rig.connect(attr.clone(), TargetPin::node(double, Op::IN_A))
            .unwrap();

        let sampler = GraphSampler::new(&rig, &chain);
        let out = sampler
            .source(&RigInstance::operator_out(double))
            .unwrap()
            .as_f32()
            .unwrap();
        assert_eq!(out, 6.0);

        let out = GraphSampler::new(&rig, &chain)
            .with_override(attr, 5.0)
            .source(&RigInstance::operator_out(double))
            .unwrap()
            .as_f32()
            .unwrap();
        assert_eq!(out, 10.0);
    }

    #[test]
    fn distance_reads_world_positions_and_overrides() {
        let chain = single_joint_chain();
        let mut rig = RigInstance::new("test");
        let a = rig.create_locator("a", None, Transform::from_translation(Vec3::ZERO));
        let b = rig.create_locator("b", None, Transform::from_translation(Vec3::new(0., 10., 0.)));
        let distance = rig.distance_between("distance", a, b).unwrap();

        let rest = GraphSampler::new(&rig, &chain)
            .source(&RigInstance::operator_out(distance))
            .unwrap()
            .as_f32()
            .unwrap();
        assert_eq!(rest, 10.0);

        let stretched = GraphSampler::new(&rig, &chain)
            .with_override(
                RigInstance::world_position_pin(b),
                Vec3::new(0., 15., 0.),
            )
            .source(&RigInstance::operator_out(distance))
            .unwrap()
            .as_f32()
            .unwrap();
        assert_eq!(stretched, 15.0);
    }

    #[test]
    fn mode_switch_effects_follow_the_driver() {
        let chain = single_joint_chain();
        let mut rig = RigInstance::new("test");
        let root = rig.root_group();
        let mode = rig.add_enum_attr(root, "mode", &["off", "on"], 0);
        let lamp = rig.create_locator("lamp", None, Transform::IDENTITY);

        rig.add_mode_switch(ModeSwitch {
            driver: mode.clone(),
            states: vec![
                ModeState {
                    driver_value: 0,
                    effects: vec![(TargetPin::node(lamp, channels::VISIBILITY), 0.0)],
                },
                ModeState {
                    driver_value: 1,
                    effects: vec![(TargetPin::node(lamp, channels::VISIBILITY), 1.0)],
                },
            ],
        })
        .unwrap();

        let visibility = TargetPin::node(lamp, channels::VISIBILITY);
        let off = GraphSampler::new(&rig, &chain)
            .target(&visibility)
            .unwrap()
            .as_f32()
            .unwrap();
        assert_eq!(off, 0.0);

        let on = GraphSampler::new(&rig, &chain)
            .with_override(mode.clone(), 1.0)
            .target(&visibility)
            .unwrap()
            .as_f32()
            .unwrap();
        assert_eq!(on, 1.0);

        // Values outside the sampled set do not interpolate.
        let err = GraphSampler::new(&rig, &chain)
            .with_override(mode, 2.0)
            .target(&visibility);
        assert!(matches!(err, Err(GraphError::UnsampledModeValue(2))));
    }
}
