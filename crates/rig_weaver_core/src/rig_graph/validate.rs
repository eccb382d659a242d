//! Pre-publish structural validation of a rig graph.
//!
//! The dependency walk is pin-granular: a transform's world position depends
//! on its own driven translate channels, its constraints, and its ancestors'
//! placement, but *not* on its own rotation. Node-granular checks would
//! reject legitimate rigs (an IK chain whose root position feeds a stretch
//! network is acyclic at the pin level even though the node graph loops).

use bevy::platform::collections::HashMap;

use crate::{
    channels::{self, Axis, DataSpec, SourcePin, TargetPin},
    errors::GraphValidationError,
    joint_chain::{JointChain, JointId},
    registry::{
        ConstraintKind, ConstraintNode, IkSpec, NodeHandle, Registry, RigNodeKind, SceneRef,
    },
    rig_graph::{RigGraph, operators::Op},
};

impl RigGraph {
    pub fn validate(
        &self,
        registry: &Registry,
        chain: &JointChain,
    ) -> Result<(), GraphValidationError> {
        self.check_endpoints(registry, chain)?;
        self.check_pin_types()?;
        Walker::new(self, registry, chain).check_acyclic()
    }

    fn check_endpoints(
        &self,
        registry: &Registry,
        chain: &JointChain,
    ) -> Result<(), GraphValidationError> {
        let check_source = |pin: &SourcePin| match pin {
            SourcePin::Node(handle, _) if registry.get(*handle).is_none() => {
                Err(GraphValidationError::DanglingHandle(pin.clone()))
            }
            SourcePin::Joint(joint, _) if joint.0 >= chain.len() => {
                Err(GraphValidationError::DanglingHandle(pin.clone()))
            }
            _ => Ok(()),
        };

        let check_target = |pin: &TargetPin| {
            let as_source = match pin {
                TargetPin::Node(handle, id) => SourcePin::Node(*handle, id.clone()),
                TargetPin::Joint(joint, id) => SourcePin::Joint(*joint, id.clone()),
            };
            check_source(&as_source)
        };

        for (target, source) in self.edges() {
            check_source(source)?;
            check_target(target)?;
        }
        for switch in self.mode_switches() {
            check_source(&switch.driver)?;
            for state in &switch.states {
                for (target, _) in &state.effects {
                    check_target(target)?;
                }
            }
        }
        Ok(())
    }

    fn check_pin_types(&self) -> Result<(), GraphValidationError> {
        for (target, source) in self.edges() {
            let source_spec = source_pin_spec(source);
            let target_spec = target_pin_spec(target);
            if source_spec != target_spec {
                return Err(GraphValidationError::InconsistentPinTypes(
                    source.clone(),
                    target.clone(),
                ));
            }
        }
        for switch in self.mode_switches() {
            for state in &switch.states {
                for (target, _) in &state.effects {
                    // Mode switch effects are always scalar samples.
                    if target_pin_spec(target) != DataSpec::F32 {
                        return Err(GraphValidationError::InconsistentPinTypes(
                            switch.driver.clone(),
                            target.clone(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

fn source_pin_spec(pin: &SourcePin) -> DataSpec {
    let id = match pin {
        SourcePin::Node(_, id) | SourcePin::Joint(_, id) => id,
    };
    if id == channels::WORLD_POSITION {
        DataSpec::Vec3
    } else {
        DataSpec::F32
    }
}

fn target_pin_spec(pin: &TargetPin) -> DataSpec {
    let id = match pin {
        TargetPin::Node(_, id) | TargetPin::Joint(_, id) => id,
    };
    Op::pin_spec(id)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

struct Walker<'a> {
    graph: &'a RigGraph,
    registry: &'a Registry,
    chain: &'a JointChain,
    constraints_on: HashMap<SceneRef, Vec<NodeHandle>>,
    ik_handles: Vec<(NodeHandle, IkSpec)>,
    marks: HashMap<SourcePin, Mark>,
}

impl<'a> Walker<'a> {
    fn new(graph: &'a RigGraph, registry: &'a Registry, chain: &'a JointChain) -> Self {
        let mut constraints_on: HashMap<SceneRef, Vec<NodeHandle>> = HashMap::default();
        let mut ik_handles = vec![];
        for (handle, node) in registry.iter() {
            match &node.kind {
                RigNodeKind::Constraint(constraint) => constraints_on
                    .entry(constraint.constrained)
                    .or_default()
                    .push(handle),
                RigNodeKind::Transform(transform) => {
                    if let Some(spec) = transform.ik_spec() {
                        ik_handles.push((handle, spec));
                    }
                }
                RigNodeKind::Operator(_) => {}
            }
        }
        Walker {
            graph,
            registry,
            chain,
            constraints_on,
            ik_handles,
            marks: HashMap::default(),
        }
    }

    fn check_acyclic(&mut self) -> Result<(), GraphValidationError> {
        let mut roots: Vec<SourcePin> = self
            .graph
            .edges()
            .map(|(_, source)| source.clone())
            .collect();
        roots.extend(self.graph.mode_switches().iter().map(|s| s.driver.clone()));
        // Implicit (constraint/hierarchy) dependencies are only reachable
        // through world positions, so every placed thing is a walk root too.
        for (handle, node) in self.registry.iter() {
            if node.transform().is_some() {
                roots.push(SourcePin::node(handle, channels::WORLD_POSITION));
            }
        }
        for (joint, _) in self.chain.joints() {
            roots.push(SourcePin::joint(joint, channels::WORLD_POSITION));
        }

        for root in roots {
            self.visit(&root)?;
        }
        Ok(())
    }

    fn visit(&mut self, pin: &SourcePin) -> Result<(), GraphValidationError> {
        match self.marks.get(pin) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                return Err(GraphValidationError::CycleDetected(pin.clone()));
            }
            None => {}
        }
        self.marks.insert(pin.clone(), Mark::InProgress);

        let mut deps = vec![];
        self.dependencies(pin, &mut deps);
        for dep in deps {
            self.visit(&dep)?;
        }

        self.marks.insert(pin.clone(), Mark::Done);
        Ok(())
    }

    /// Whatever the driver of `target` is (edge or mode switch), as a source.
    fn driven_source(&self, target: &TargetPin, out: &mut Vec<SourcePin>) {
        if let Some(source) = self.graph.source_of(target) {
            out.push(source.clone());
        } else if let Some(switch) = self.graph.mode_switch_driving(target) {
            out.push(switch.driver.clone());
        }
    }

    fn dependencies(&self, pin: &SourcePin, out: &mut Vec<SourcePin>) {
        match pin {
            SourcePin::Node(handle, id) => match self.registry.get(*handle).map(|n| &n.kind) {
                Some(RigNodeKind::Operator(operator)) => {
                    if id == Op::OUT {
                        for input in operator.op.input_pins() {
                            self.driven_source(&TargetPin::node(*handle, *input), out);
                        }
                    }
                }
                Some(RigNodeKind::Transform(_)) => {
                    if id == channels::WORLD_POSITION {
                        self.position_deps(SceneRef::Node(*handle), out);
                    } else {
                        self.driven_source(&TargetPin::Node(*handle, id.clone()), out);
                    }
                }
                Some(RigNodeKind::Constraint(_)) | None => {
                    self.driven_source(&TargetPin::Node(*handle, id.clone()), out);
                }
            },
            SourcePin::Joint(joint, id) => {
                if id == channels::WORLD_POSITION {
                    self.joint_position_deps(*joint, out);
                } else if Axis::ALL.iter().any(|a| a.rotate_channel() == id) {
                    self.joint_rotation_deps(*joint, out);
                } else {
                    self.driven_source(&TargetPin::Joint(*joint, id.clone()), out);
                }
            }
        }
    }

    fn position_deps(&self, reference: SceneRef, out: &mut Vec<SourcePin>) {
        let SceneRef::Node(handle) = reference else {
            if let SceneRef::Joint(joint) = reference {
                self.joint_position_deps(joint, out);
            }
            return;
        };
        let Some(transform) = self.registry.transform(handle) else {
            return;
        };

        for axis in Axis::ALL {
            out.push(SourcePin::node(handle, axis.translate_channel()));
        }
        self.constrained_by(reference, &[ConstraintKind::Point, ConstraintKind::Parent], out);

        if let Some(parent) = transform.parent {
            out.push(SourcePin::node(parent, channels::WORLD_POSITION));
            for axis in Axis::ALL {
                out.push(SourcePin::node(parent, axis.rotate_channel()));
                out.push(SourcePin::node(parent, axis.rotate_pivot_channel()));
            }
            self.constrained_by(
                SceneRef::Node(parent),
                &[ConstraintKind::Orient, ConstraintKind::Parent],
                out,
            );
        }
    }

    fn joint_position_deps(&self, joint: JointId, out: &mut Vec<SourcePin>) {
        for axis in Axis::ALL {
            out.push(SourcePin::joint(joint, axis.translate_channel()));
        }
        self.constrained_by(
            SceneRef::Joint(joint),
            &[ConstraintKind::Point, ConstraintKind::Parent],
            out,
        );
        if let Some(parent) = self.chain.parent(joint) {
            out.push(SourcePin::joint(parent, channels::WORLD_POSITION));
            for axis in Axis::ALL {
                out.push(SourcePin::joint(parent, axis.rotate_channel()));
            }
        }
    }

    fn joint_rotation_deps(&self, joint: JointId, out: &mut Vec<SourcePin>) {
        for axis in Axis::ALL {
            self.driven_source(&TargetPin::joint(joint, axis.rotate_channel()), out);
        }
        for (handle, spec) in &self.ik_handles {
            if self.on_ik_path(*spec, joint) {
                out.push(SourcePin::node(*handle, channels::WORLD_POSITION));
                self.driven_source(&TargetPin::node(*handle, "twist"), out);
                self.constrained_by(SceneRef::Node(*handle), &[ConstraintKind::PoleVector], out);
            }
        }
        self.constrained_by(
            SceneRef::Joint(joint),
            &[ConstraintKind::Orient, ConstraintKind::Parent],
            out,
        );
    }

    /// Joints whose rotation an IK solve drives: the path from the start
    /// joint down to (but excluding) the end effector.
    fn on_ik_path(&self, spec: IkSpec, joint: JointId) -> bool {
        let mut current = self.chain.parent(spec.end);
        while let Some(step) = current {
            if step == joint {
                return true;
            }
            if step == spec.start {
                break;
            }
            current = self.chain.parent(step);
        }
        false
    }

    fn constrained_by(&self, reference: SceneRef, kinds: &[ConstraintKind], out: &mut Vec<SourcePin>) {
        let Some(handles) = self.constraints_on.get(&reference) else {
            return;
        };
        for handle in handles {
            let Some(constraint) = self.registry.get(*handle).and_then(|n| n.constraint()) else {
                continue;
            };
            if !kinds.contains(&constraint.kind) {
                continue;
            }
            out.push(SourcePin::node(*handle, ConstraintNode::ENVELOPE));
            for (index, target) in constraint.targets.iter().enumerate() {
                out.push(SourcePin::node(*handle, ConstraintNode::weight_pin(index)));
                match target.source {
                    SceneRef::Node(node) => {
                        out.push(SourcePin::node(node, channels::WORLD_POSITION));
                        if matches!(
                            constraint.kind,
                            ConstraintKind::Orient | ConstraintKind::Parent
                        ) {
                            for axis in Axis::ALL {
                                out.push(SourcePin::node(node, axis.rotate_channel()));
                            }
                        }
                    }
                    SceneRef::Joint(joint) => {
                        out.push(SourcePin::joint(joint, channels::WORLD_POSITION));
                        if matches!(
                            constraint.kind,
                            ConstraintKind::Orient | ConstraintKind::Parent
                        ) {
                            for axis in Axis::ALL {
                                out.push(SourcePin::joint(joint, axis.rotate_channel()));
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rig_graph::operators::{Op, OperatorNode};
    use crate::registry::{RigNodeKind, TransformNode, TransformRole};
    use bevy::transform::components::Transform;

    fn empty_chain() -> JointChain {
        use crate::joint_chain::{Joint, NodeAxes};
        use bevy::math::{Quat, Vec3};
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
    fn detects_an_operator_cycle() {
        let mut registry = Registry::default();
        let a = registry.insert("a", RigNodeKind::Operator(OperatorNode::new(Op::Multiply)));
        let b = registry.insert("b", RigNodeKind::Operator(OperatorNode::new(Op::Multiply)));

        let mut graph = RigGraph::default();
        graph
            .connect(SourcePin::node(a, Op::OUT), TargetPin::node(b, Op::IN_A))
            .unwrap();
        graph
            .connect(SourcePin::node(b, Op::OUT), TargetPin::node(a, Op::IN_A))
            .unwrap();

        let result = graph.validate(&registry, &empty_chain());
        assert!(matches!(result, Err(GraphValidationError::CycleDetected(_))));
    }

    #[test]
    fn accepts_a_chain_of_operators() {
        let mut registry = Registry::default();
        let control = registry.insert(
            "control",
            RigNodeKind::Transform(TransformNode::at_world(
                Transform::IDENTITY,
                TransformRole::Group,
            )),
        );
        let scale = registry.insert("scale", RigNodeKind::Operator(OperatorNode::new(Op::Multiply)));
        let offset = registry.insert("offset", RigNodeKind::Operator(OperatorNode::new(Op::Sum)));

        let mut graph = RigGraph::default();
        graph
            .connect(
                SourcePin::node(control, "attr"),
                TargetPin::node(scale, Op::IN_A),
            )
            .unwrap();
        graph
            .connect(
                SourcePin::node(scale, Op::OUT),
                TargetPin::node(offset, Op::IN_A),
            )
            .unwrap();
        graph
            .connect(
                SourcePin::node(offset, Op::OUT),
                TargetPin::node(control, "rotateX"),
            )
            .unwrap();

        graph.validate(&registry, &empty_chain()).unwrap();
    }

    #[test]
    fn rejects_vector_wired_into_scalar() {
        let mut registry = Registry::default();
        let node = registry.insert(
            "node",
            RigNodeKind::Transform(TransformNode::at_world(
                Transform::IDENTITY,
                TransformRole::Group,
            )),
        );
        let multiply = registry.insert("m", RigNodeKind::Operator(OperatorNode::new(Op::Multiply)));

        let mut graph = RigGraph::default();
        graph
            .connect(
                SourcePin::node(node, channels::WORLD_POSITION),
                TargetPin::node(multiply, Op::IN_A),
            )
            .unwrap();

        let result = graph.validate(&registry, &empty_chain());
        assert!(matches!(
            result,
            Err(GraphValidationError::InconsistentPinTypes(_, _))
        ));
    }
}
