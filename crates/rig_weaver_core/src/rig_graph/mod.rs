//! The synthesized dataflow graph: value edges between pins plus mode
//! switches.
//!
//! The graph is assembled once during a rig build and published as data; an
//! external pull-based engine evaluates it. Construction keeps the two
//! structural invariants the host relies on: every target pin is driven by
//! at most one thing, and the dependency relation is acyclic.

pub mod operators;
mod validate;

use indexmap::IndexMap;

use crate::{
    channels::{SourcePin, TargetPin},
    errors::GraphValidationError,
};

/// One discrete state of a mode switch: while the driver pin sits at
/// `driver_value`, every effect target holds its paired value.
#[derive(Debug, Clone)]
pub struct ModeState {
    pub driver_value: i32,
    pub effects: Vec<(TargetPin, f32)>,
}

/// A sampled driver-to-dependents table: the explicit form of a driven-key
/// mode switch. States are applied atomically; no interpolation is defined
/// between or outside the sampled driver values.
#[derive(Debug, Clone)]
pub struct ModeSwitch {
    pub driver: SourcePin,
    pub states: Vec<ModeState>,
}

impl ModeSwitch {
    pub fn state_for(&self, driver_value: i32) -> Option<&ModeState> {
        self.states
            .iter()
            .find(|state| state.driver_value == driver_value)
    }

    pub fn effect_on(&self, target: &TargetPin, driver_value: i32) -> Option<f32> {
        self.state_for(driver_value)?
            .effects
            .iter()
            .find(|(effect_target, _)| effect_target == target)
            .map(|(_, value)| *value)
    }

    pub fn drives(&self, target: &TargetPin) -> bool {
        self.states
            .iter()
            .any(|state| state.effects.iter().any(|(t, _)| t == target))
    }
}

#[derive(Debug, Default, Clone)]
pub struct RigGraph {
    edges_inverted: IndexMap<TargetPin, SourcePin>,
    mode_switches: Vec<ModeSwitch>,
}

impl RigGraph {
    /// Wires `source` into `target`. Fails if the target is already driven.
    pub fn connect(
        &mut self,
        source: SourcePin,
        target: TargetPin,
    ) -> Result<(), GraphValidationError> {
        if self.is_driven(&target) {
            return Err(GraphValidationError::DoublyDrivenTarget(target));
        }
        self.edges_inverted.insert(target, source);
        Ok(())
    }

    pub fn add_mode_switch(&mut self, switch: ModeSwitch) -> Result<(), GraphValidationError> {
        for state in &switch.states {
            for (target, _) in &state.effects {
                if self.edges_inverted.contains_key(target) {
                    return Err(GraphValidationError::DoublyDrivenTarget(target.clone()));
                }
                if self
                    .mode_switches
                    .iter()
                    .any(|existing| existing.drives(target))
                {
                    return Err(GraphValidationError::DoublyDrivenTarget(target.clone()));
                }
            }
        }
        self.mode_switches.push(switch);
        Ok(())
    }

    pub fn source_of(&self, target: &TargetPin) -> Option<&SourcePin> {
        self.edges_inverted.get(target)
    }

    pub fn is_driven(&self, target: &TargetPin) -> bool {
        self.edges_inverted.contains_key(target)
            || self.mode_switches.iter().any(|s| s.drives(target))
    }

    pub fn mode_switch_driving(&self, target: &TargetPin) -> Option<&ModeSwitch> {
        self.mode_switches.iter().find(|s| s.drives(target))
    }

    pub fn edges(&self) -> impl Iterator<Item = (&TargetPin, &SourcePin)> {
        self.edges_inverted.iter()
    }

    pub fn mode_switches(&self) -> &[ModeSwitch] {
        &self.mode_switches
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        channels::{SourcePin, TargetPin},
        registry::{Registry, RigNodeKind, TransformNode, TransformRole},
    };
    use bevy::transform::components::Transform;

    fn group(registry: &mut Registry, label: &str) -> crate::registry::NodeHandle {
        registry.insert(
            label,
            RigNodeKind::Transform(TransformNode::at_world(
                Transform::IDENTITY,
                TransformRole::Group,
            )),
        )
    }

    #[test]
    fn a_target_cannot_be_driven_twice() {
        let mut registry = Registry::default();
        let a = group(&mut registry, "a");
        let b = group(&mut registry, "b");
        let c = group(&mut registry, "c");

        let mut graph = RigGraph::default();
        graph
            .connect(
                SourcePin::node(a, "translateX"),
                TargetPin::node(c, "translateX"),
            )
            .unwrap();
        let result = graph.connect(
            SourcePin::node(b, "translateX"),
            TargetPin::node(c, "translateX"),
        );
        assert!(matches!(
            result,
            Err(GraphValidationError::DoublyDrivenTarget(_))
        ));
    }

    #[test]
    fn mode_switches_respect_existing_edges() {
        let mut registry = Registry::default();
        let a = group(&mut registry, "a");
        let b = group(&mut registry, "b");

        let mut graph = RigGraph::default();
        graph
            .connect(
                SourcePin::node(a, "translateX"),
                TargetPin::node(b, "translateX"),
            )
            .unwrap();

        let result = graph.add_mode_switch(ModeSwitch {
            driver: SourcePin::node(a, "mode"),
            states: vec![ModeState {
                driver_value: 0,
                effects: vec![(TargetPin::node(b, "translateX"), 1.0)],
            }],
        });
        assert!(matches!(
            result,
            Err(GraphValidationError::DoublyDrivenTarget(_))
        ));
    }

    #[test]
    fn mode_switch_lookup_is_exact() {
        let mut registry = Registry::default();
        let a = group(&mut registry, "a");
        let b = group(&mut registry, "b");

        let switch = ModeSwitch {
            driver: SourcePin::node(a, "mode"),
            states: vec![
                ModeState {
                    driver_value: 0,
                    effects: vec![(TargetPin::node(b, "visibility"), 0.0)],
                },
                ModeState {
                    driver_value: 1,
                    effects: vec![(TargetPin::node(b, "visibility"), 1.0)],
                },
            ],
        };
        assert_eq!(switch.effect_on(&TargetPin::node(b, "visibility"), 1), Some(1.0));
        assert_eq!(switch.effect_on(&TargetPin::node(b, "visibility"), 2), None);
    }
}
