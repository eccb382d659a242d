//! Wiring API on [`RigInstance`]: creation of transforms, controls,
//! attributes, operators, constraints and mode switches, plus the scene-graph
//! bookkeeping (world/local placement, re-parenting) rig algorithms lean on.

use bevy::{math::Vec3, transform::components::Transform};

use crate::{
    channels::{self, PinId, RotateOrder, SourcePin, TargetPin},
    controls::{Control, ParentSwitchGroup},
    errors::GraphValidationError,
    registry::{
        AttrSpec, ConstraintKind, ConstraintNode, ConstraintTarget, IkSpec, NodeHandle, ProxyShape,
        RigNodeKind, SceneRef, TransformNode, TransformRole,
    },
    rig_graph::{ModeState, ModeSwitch, operators::OperatorNode},
    rig_instance::RigInstance,
};

impl RigInstance {
    // --- transform nodes -------------------------------------------------

    pub fn create_group(
        &mut self,
        label: impl Into<String>,
        parent: Option<NodeHandle>,
        world: Transform,
    ) -> NodeHandle {
        self.create_transform(label, parent, world, TransformRole::Group)
    }

    pub fn create_locator(
        &mut self,
        label: impl Into<String>,
        parent: Option<NodeHandle>,
        world: Transform,
    ) -> NodeHandle {
        self.create_transform(label, parent, world, TransformRole::Locator)
    }

    /// An IK handle is a transform like any other (it gets parented under
    /// pivot groups); the solver spec tells the host which joints it drives.
    /// Created invisible, like every helper.
    pub fn create_ik_handle(
        &mut self,
        label: impl Into<String>,
        parent: Option<NodeHandle>,
        spec: IkSpec,
        world: Transform,
    ) -> NodeHandle {
        let handle = self.create_transform(label, parent, world, TransformRole::IkHandle(spec));
        self.set_visibility(handle, false);
        handle
    }

    fn create_transform(
        &mut self,
        label: impl Into<String>,
        parent: Option<NodeHandle>,
        world: Transform,
        role: TransformRole,
    ) -> NodeHandle {
        let mut node = TransformNode::at_world(world, role);
        node.parent = parent;
        node.local = match parent {
            Some(parent) => self.local_from_world(parent, world),
            None => world,
        };
        self.registry.insert(label, RigNodeKind::Transform(node))
    }

    /// Creates the full (pre-transform, transform, proxy) triple at `world`.
    /// The transform starts with identity local channels, so every keyable
    /// channel rests at zero.
    pub fn create_control(
        &mut self,
        label: impl Into<String>,
        parent: Option<NodeHandle>,
        world: Transform,
        shape: ProxyShape,
    ) -> Control {
        let label = label.into();
        let pre_transform = self.create_transform(
            format!("{label}_preTransform"),
            parent,
            world,
            TransformRole::Group,
        );
        let transform =
            self.create_transform(label.clone(), Some(pre_transform), world, TransformRole::Group);
        let proxy = self.create_transform(
            format!("{label}_shape"),
            Some(transform),
            world,
            TransformRole::Proxy(shape),
        );

        let control = Control {
            pre_transform,
            transform,
            proxy,
        };
        self.controls.push(control);
        control
    }

    /// Re-parents `node`, preserving its world placement (the local transform
    /// is recomputed against the new parent).
    pub fn reparent_keep_world(&mut self, node: NodeHandle, new_parent: Option<NodeHandle>) {
        let world = self.world_of(node);
        let local = match new_parent {
            Some(parent) => self.local_from_world(parent, world),
            None => world,
        };
        if let Some(transform) = self.transform_mut(node) {
            transform.parent = new_parent;
            transform.local = local;
        }
    }

    /// Re-parents `node`, keeping its local transform (world placement
    /// changes, and descendants follow).
    pub fn reparent_keep_local(&mut self, node: NodeHandle, new_parent: Option<NodeHandle>) {
        if let Some(transform) = self.transform_mut(node) {
            transform.parent = new_parent;
        }
        self.refresh_world(node);
    }

    /// Moves `node` to a new world position (descendants follow).
    pub fn set_world_translation(&mut self, node: NodeHandle, position: Vec3) {
        let mut world = self.world_of(node);
        world.translation = position;
        let local = match self.registry.transform(node).and_then(|t| t.parent) {
            Some(parent) => self.local_from_world(parent, world),
            None => world,
        };
        if let Some(transform) = self.transform_mut(node) {
            transform.world = world;
            transform.local = local;
        }
        for child in self.children_of(node) {
            self.refresh_world(child);
        }
    }

    pub fn set_rotate_order(&mut self, node: NodeHandle, order: RotateOrder) {
        if let Some(transform) = self.transform_mut(node) {
            transform.rotate_order = order;
        }
    }

    pub fn set_visibility(&mut self, node: NodeHandle, visible: bool) {
        if let Some(transform) = self.transform_mut(node) {
            transform.visibility = visible;
        }
    }

    /// Removes channels from the keyable set, locking them at rest.
    pub fn lock_channels(&mut self, node: NodeHandle, pins: &[&str]) {
        if let Some(transform) = self.transform_mut(node) {
            for pin in pins {
                transform.locked.insert((*pin).to_string());
            }
        }
    }

    pub fn world_position(&self, node: NodeHandle) -> Vec3 {
        self.world_of(node).translation
    }

    pub fn world_position_pin(node: NodeHandle) -> SourcePin {
        SourcePin::node(node, channels::WORLD_POSITION)
    }

    fn world_of(&self, node: NodeHandle) -> Transform {
        self.registry
            .transform(node)
            .map(|t| t.world)
            .unwrap_or(Transform::IDENTITY)
    }

    fn local_from_world(&self, parent: NodeHandle, world: Transform) -> Transform {
        let parent_world = self.world_of(parent);
        Transform::from_matrix(parent_world.to_matrix().inverse()) * world
    }

    fn transform_mut(&mut self, node: NodeHandle) -> Option<&mut TransformNode> {
        match self.registry.get_mut(node).map(|n| &mut n.kind) {
            Some(RigNodeKind::Transform(transform)) => Some(transform),
            _ => None,
        }
    }

    pub fn children_of(&self, node: NodeHandle) -> Vec<NodeHandle> {
        self.registry
            .iter()
            .filter(|(_, candidate)| {
                candidate
                    .transform()
                    .is_some_and(|t| t.parent == Some(node))
            })
            .map(|(handle, _)| handle)
            .collect()
    }

    fn refresh_world(&mut self, node: NodeHandle) {
        let Some(transform) = self.registry.transform(node) else {
            return;
        };
        let world = match transform.parent {
            Some(parent) => self.world_of(parent) * transform.local,
            None => transform.local,
        };
        if let Some(transform) = self.transform_mut(node) {
            transform.world = world;
        }
        for child in self.children_of(node) {
            self.refresh_world(child);
        }
    }

    // --- custom attributes -----------------------------------------------

    pub fn add_scalar_attr(
        &mut self,
        node: NodeHandle,
        name: &str,
        default: f32,
        min: Option<f32>,
        max: Option<f32>,
    ) -> SourcePin {
        if let Some(transform) = self.transform_mut(node) {
            transform
                .attrs
                .insert(name.into(), AttrSpec::Scalar { default, min, max });
        }
        SourcePin::node(node, name)
    }

    pub fn add_enum_attr(
        &mut self,
        node: NodeHandle,
        name: &str,
        variants: &[&str],
        default: i32,
    ) -> SourcePin {
        if let Some(transform) = self.transform_mut(node) {
            transform.attrs.insert(
                name.into(),
                AttrSpec::Enum {
                    variants: variants.iter().map(|v| (*v).to_string()).collect(),
                    default,
                },
            );
        }
        SourcePin::node(node, name)
    }

    // --- operators and edges ---------------------------------------------

    pub fn add_operator(&mut self, label: impl Into<String>, node: OperatorNode) -> NodeHandle {
        self.registry.insert(label, RigNodeKind::Operator(node))
    }

    pub fn operator_out(handle: NodeHandle) -> SourcePin {
        SourcePin::node(handle, crate::rig_graph::operators::Op::OUT)
    }

    /// Overwrites an operator's constant input. Used by post-construction
    /// calibration (sign flips) before the instance is published.
    pub fn set_operator_input(
        &mut self,
        handle: NodeHandle,
        pin: &str,
        value: impl Into<crate::channels::DataValue>,
    ) {
        if let Some(RigNodeKind::Operator(operator)) =
            self.registry.get_mut(handle).map(|n| &mut n.kind)
        {
            operator.inputs.insert(pin.into(), value.into());
        }
    }

    pub fn connect(
        &mut self,
        source: SourcePin,
        target: TargetPin,
    ) -> Result<(), GraphValidationError> {
        self.graph.connect(source, target)
    }

    pub fn add_mode_switch(&mut self, switch: ModeSwitch) -> Result<(), GraphValidationError> {
        self.graph.add_mode_switch(switch)
    }

    /// Distance operator wired between the world positions of two transforms.
    pub fn distance_between(
        &mut self,
        label: impl Into<String>,
        a: NodeHandle,
        b: NodeHandle,
    ) -> Result<NodeHandle, GraphValidationError> {
        use crate::rig_graph::operators::{Op, OperatorNode};
        let distance = self.add_operator(label, OperatorNode::new(Op::Distance));
        self.connect(
            Self::world_position_pin(a),
            TargetPin::node(distance, Op::POINT_A),
        )?;
        self.connect(
            Self::world_position_pin(b),
            TargetPin::node(distance, Op::POINT_B),
        )?;
        Ok(distance)
    }

    // --- constraints -----------------------------------------------------

    /// Creates a weighted constraint and wires its envelope from the rig
    /// weight, so the whole generated layer can be blended off against the
    /// original skeleton.
    pub fn add_constraint(
        &mut self,
        label: impl Into<String>,
        kind: ConstraintKind,
        constrained: SceneRef,
        targets: &[SceneRef],
        maintain_offset: bool,
    ) -> Result<NodeHandle, GraphValidationError> {
        let node = ConstraintNode {
            kind,
            constrained,
            targets: targets
                .iter()
                .map(|source| ConstraintTarget {
                    source: *source,
                    weight: 1.0,
                })
                .collect(),
            maintain_offset,
        };
        let handle = self.registry.insert(label, RigNodeKind::Constraint(node));
        let weight = self.weight_pin();
        self.connect(weight, TargetPin::node(handle, ConstraintNode::ENVELOPE))?;
        Ok(handle)
    }

    // --- parent switching ------------------------------------------------

    /// Inserts a parent-switch group above the control's pre-transform.
    ///
    /// The selector attribute gains a `None` entry (value 0) under which no
    /// target has any weight; entry `i` gives target `i - 1` full weight.
    /// The weight table is installed as a mode switch, so the invariant
    /// (selected weight 1, rest 0, sum 1) holds by construction. `initial`
    /// is the selector's starting value.
    pub fn add_parent_switch(
        &mut self,
        control: &Control,
        targets: &[(SceneRef, &str)],
        initial: i32,
    ) -> Result<ParentSwitchGroup, GraphValidationError> {
        let control_label = self
            .node(control.transform)
            .map(|n| n.label.clone())
            .unwrap_or_default();

        let pre_world = self.world_of(control.pre_transform);
        let old_parent = self
            .registry
            .transform(control.pre_transform)
            .and_then(|t| t.parent);

        let group = self.create_group(
            format!("{control_label}_parentSwitch_grp"),
            old_parent,
            pre_world,
        );
        self.reparent_keep_world(control.pre_transform, Some(group));

        let target_refs: Vec<SceneRef> = targets.iter().map(|(reference, _)| *reference).collect();
        let constraint = self.add_constraint(
            format!("{control_label}_parentSwitch_parentConstraint"),
            ConstraintKind::Parent,
            SceneRef::Node(group),
            &target_refs,
            true,
        )?;

        let mut variants = vec!["None"];
        variants.extend(targets.iter().map(|(_, label)| *label));
        let selector = self.add_enum_attr(control.transform, "Target_Parent", &variants, initial);

        let mut states = vec![];
        for selected in 0..=targets.len() {
            let effects = (0..targets.len())
                .map(|index| {
                    let weight = if selected == index + 1 { 1.0 } else { 0.0 };
                    (
                        TargetPin::node(constraint, ConstraintNode::weight_pin(index)),
                        weight,
                    )
                })
                .collect();
            states.push(ModeState {
                driver_value: selected as i32,
                effects,
            });
        }
        self.add_mode_switch(ModeSwitch {
            driver: selector,
            states,
        })?;

        Ok(ParentSwitchGroup {
            group,
            constraint,
            targets: target_refs,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bevy::math::Quat;

    #[test]
    fn control_triple_is_parented_in_order() {
        let mut rig = RigInstance::new("test");
        let root = rig.root_group();
        let control = rig.create_control(
            "handle",
            Some(root),
            Transform::from_translation(Vec3::new(1., 2., 3.)),
            ProxyShape {
                radius: 0.5,
                style: crate::registry::ProxyStyle::Ring,
            },
        );

        let pre = rig.registry().transform(control.pre_transform).unwrap();
        let transform = rig.registry().transform(control.transform).unwrap();
        let proxy = rig.registry().transform(control.proxy).unwrap();

        assert_eq!(pre.parent, Some(root));
        assert_eq!(transform.parent, Some(control.pre_transform));
        assert_eq!(proxy.parent, Some(control.transform));
        // keyable channels rest at zero
        assert!(transform.local.translation.length() < 1e-6);
        assert_eq!(transform.world.translation, Vec3::new(1., 2., 3.));
    }

    #[test]
    fn reparent_keep_world_recomputes_local() {
        let mut rig = RigInstance::new("test");
        let anchor = rig.create_group(
            "anchor",
            None,
            Transform::from_translation(Vec3::new(10., 0., 0.)),
        );
        let node = rig.create_group(
            "node",
            None,
            Transform::from_translation(Vec3::new(12., 0., 0.)),
        );

        rig.reparent_keep_world(node, Some(anchor));

        let transform = rig.registry().transform(node).unwrap();
        assert_eq!(transform.world.translation, Vec3::new(12., 0., 0.));
        assert!((transform.local.translation - Vec3::new(2., 0., 0.)).length() < 1e-5);
    }

    #[test]
    fn reparent_keep_world_under_rotated_parent() {
        let mut rig = RigInstance::new("test");
        let anchor = rig.create_group(
            "anchor",
            None,
            Transform::from_rotation(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2)),
        );
        let node = rig.create_group(
            "node",
            None,
            Transform::from_translation(Vec3::new(0., 3., 0.)),
        );

        rig.reparent_keep_world(node, Some(anchor));
        let transform = rig.registry().transform(node).unwrap();
        assert!((transform.local.translation - Vec3::new(3., 0., 0.)).length() < 1e-5);
    }

    #[test]
    fn moving_a_parent_moves_descendants() {
        let mut rig = RigInstance::new("test");
        let parent = rig.create_group("parent", None, Transform::IDENTITY);
        let child = rig.create_group(
            "child",
            Some(parent),
            Transform::from_translation(Vec3::new(0., 0., 1.)),
        );

        rig.set_world_translation(parent, Vec3::new(5., 0., 0.));
        let child = rig.registry().transform(child).unwrap();
        assert_eq!(child.world.translation, Vec3::new(5., 0., 1.));
    }

    #[test]
    fn parent_switch_weights_are_exclusive_and_sum_to_one() {
        let mut rig = RigInstance::new("test");
        let root = rig.root_group();
        let target_a = rig.create_group("a", None, Transform::IDENTITY);
        let target_b = rig.create_group("b", None, Transform::IDENTITY);
        let control = rig.create_control(
            "handle",
            Some(root),
            Transform::IDENTITY,
            ProxyShape {
                radius: 1.0,
                style: crate::registry::ProxyStyle::Ring,
            },
        );

        let switch_group = rig
            .add_parent_switch(
                &control,
                &[
                    (SceneRef::Node(target_a), "a"),
                    (SceneRef::Node(target_b), "b"),
                ],
                1,
            )
            .unwrap();

        // pre-transform now lives under the switch group
        let pre = rig.registry().transform(control.pre_transform).unwrap();
        assert_eq!(pre.parent, Some(switch_group.group));

        let switch = rig
            .graph()
            .mode_switch_driving(&TargetPin::node(
                switch_group.constraint,
                ConstraintNode::weight_pin(0),
            ))
            .unwrap();

        for state in &switch.states {
            let total: f32 = state.effects.iter().map(|(_, w)| w).sum();
            if state.driver_value == 0 {
                assert_eq!(total, 0.0);
            } else {
                assert_eq!(total, 1.0);
                let max = state.effects.iter().map(|(_, w)| *w).fold(0.0, f32::max);
                assert_eq!(max, 1.0);
            }
        }
    }
}
