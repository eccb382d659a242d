//! The scalar operator vocabulary of a rig graph.
//!
//! Operators are *data*: the host's dependency-graph engine maps them onto
//! its own node library at evaluation time. [`Op::apply`] defines the
//! reference semantics used by validation and the rest-pose sampler.

use indexmap::IndexMap;

use crate::{
    channels::{DataSpec, DataValue, PinId},
    errors::GraphError,
};

/// Comparison selected by a branch operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareOp {
    Less,
    LessEqual,
    More,
    MoreEqual,
    #[default]
    Equal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    /// `first_term <op> second_term ? if_true : if_false`.
    Branch(CompareOp),
    /// Linear remap of `value` from `[old_min, old_max]` onto
    /// `[new_min, new_max]`, input clamped to the old range. The old range
    /// must be ordered; the new range may be descending.
    Remap,
    /// `in_a * in_b`.
    Multiply,
    /// `in_a / in_b`.
    Divide,
    /// `in_a + alpha * (in_b - in_a)`.
    Blend,
    /// Euclidean distance between `point_a` and `point_b`.
    Distance,
    /// `in_a + in_b + in_c`.
    Sum,
}

impl Op {
    pub const OUT: &'static str = "out";

    pub const IN_A: &'static str = "in_a";
    pub const IN_B: &'static str = "in_b";
    pub const IN_C: &'static str = "in_c";
    pub const ALPHA: &'static str = "alpha";

    pub const FIRST_TERM: &'static str = "first_term";
    pub const SECOND_TERM: &'static str = "second_term";
    pub const IF_TRUE: &'static str = "if_true";
    pub const IF_FALSE: &'static str = "if_false";

    pub const VALUE: &'static str = "value";
    pub const OLD_MIN: &'static str = "old_min";
    pub const OLD_MAX: &'static str = "old_max";
    pub const NEW_MIN: &'static str = "new_min";
    pub const NEW_MAX: &'static str = "new_max";

    pub const POINT_A: &'static str = "point_a";
    pub const POINT_B: &'static str = "point_b";

    pub fn input_pins(&self) -> &'static [&'static str] {
        match self {
            Op::Branch(_) => &[
                Self::FIRST_TERM,
                Self::SECOND_TERM,
                Self::IF_TRUE,
                Self::IF_FALSE,
            ],
            Op::Remap => &[
                Self::VALUE,
                Self::OLD_MIN,
                Self::OLD_MAX,
                Self::NEW_MIN,
                Self::NEW_MAX,
            ],
            Op::Multiply | Op::Divide => &[Self::IN_A, Self::IN_B],
            Op::Blend => &[Self::IN_A, Self::IN_B, Self::ALPHA],
            Op::Distance => &[Self::POINT_A, Self::POINT_B],
            Op::Sum => &[Self::IN_A, Self::IN_B, Self::IN_C],
        }
    }

    pub fn pin_spec(pin: &str) -> DataSpec {
        if pin == Self::POINT_A || pin == Self::POINT_B {
            DataSpec::Vec3
        } else {
            DataSpec::F32
        }
    }

    /// Reference semantics; `get` supplies each input pin's value.
    pub fn apply(
        &self,
        get: &mut dyn FnMut(&'static str) -> Result<DataValue, GraphError>,
    ) -> Result<DataValue, GraphError> {
        let value = match self {
            Op::Branch(cmp) => {
                let first = get(Self::FIRST_TERM)?.as_f32()?;
                let second = get(Self::SECOND_TERM)?.as_f32()?;
                let holds = match cmp {
                    CompareOp::Less => first < second,
                    CompareOp::LessEqual => first <= second,
                    CompareOp::More => first > second,
                    CompareOp::MoreEqual => first >= second,
                    CompareOp::Equal => first == second,
                };
                if holds {
                    get(Self::IF_TRUE)?.as_f32()?
                } else {
                    get(Self::IF_FALSE)?.as_f32()?
                }
            }
            Op::Remap => {
                let old_min = get(Self::OLD_MIN)?.as_f32()?;
                let old_max = get(Self::OLD_MAX)?.as_f32()?;
                let new_min = get(Self::NEW_MIN)?.as_f32()?;
                let new_max = get(Self::NEW_MAX)?.as_f32()?;
                let value = get(Self::VALUE)?.as_f32()?.max(old_min).min(old_max);
                let span = old_max - old_min;
                if span == 0.0 {
                    new_min
                } else {
                    new_min + (value - old_min) / span * (new_max - new_min)
                }
            }
            Op::Multiply => get(Self::IN_A)?.as_f32()? * get(Self::IN_B)?.as_f32()?,
            Op::Divide => get(Self::IN_A)?.as_f32()? / get(Self::IN_B)?.as_f32()?,
            Op::Blend => {
                let a = get(Self::IN_A)?.as_f32()?;
                let b = get(Self::IN_B)?.as_f32()?;
                let alpha = get(Self::ALPHA)?.as_f32()?;
                a + alpha * (b - a)
            }
            Op::Distance => {
                let a = get(Self::POINT_A)?.as_vec3()?;
                let b = get(Self::POINT_B)?.as_vec3()?;
                a.distance(b)
            }
            Op::Sum => {
                get(Self::IN_A)?.as_f32()? + get(Self::IN_B)?.as_f32()? + get(Self::IN_C)?.as_f32()?
            }
        };
        Ok(DataValue::F32(value))
    }
}

/// An operator instance plus the constants backing any input pin that is not
/// wired by an edge.
#[derive(Debug, Clone)]
pub struct OperatorNode {
    pub op: Op,
    pub inputs: IndexMap<PinId, DataValue>,
}

impl OperatorNode {
    pub fn new(op: Op) -> Self {
        OperatorNode {
            op,
            inputs: IndexMap::new(),
        }
    }

    pub fn with_input(mut self, pin: &str, value: impl Into<DataValue>) -> Self {
        self.inputs.insert(pin.into(), value.into());
        self
    }

    pub fn constant(&self, pin: &str) -> Option<DataValue> {
        self.inputs.get(pin).copied()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn eval(op: Op, inputs: &[(&'static str, f32)]) -> f32 {
        op.apply(&mut |pin| {
            inputs
                .iter()
                .find(|(id, _)| *id == pin)
                .map(|(_, v)| DataValue::F32(*v))
                .ok_or(GraphError::UnsampledModeValue(0))
        })
        .unwrap()
        .as_f32()
        .unwrap()
    }

    #[test]
    fn branch_picks_the_matching_side() {
        let op = Op::Branch(CompareOp::More);
        let picked = eval(
            op,
            &[
                (Op::FIRST_TERM, 5.),
                (Op::SECOND_TERM, 3.),
                (Op::IF_TRUE, 1.),
                (Op::IF_FALSE, -1.),
            ],
        );
        assert_eq!(picked, 1.);
        let other = eval(
            op,
            &[
                (Op::FIRST_TERM, 2.),
                (Op::SECOND_TERM, 3.),
                (Op::IF_TRUE, 1.),
                (Op::IF_FALSE, -1.),
            ],
        );
        assert_eq!(other, -1.);
    }

    #[test]
    fn remap_is_linear_inside_and_clamped_outside() {
        let table = [
            (Op::OLD_MIN, 30.),
            (Op::OLD_MAX, 70.),
            (Op::NEW_MIN, 0.),
            (Op::NEW_MAX, 70.),
        ];
        let at = |v: f32| {
            let mut inputs = table.to_vec();
            inputs.push((Op::VALUE, v));
            eval(Op::Remap, &inputs)
        };
        assert_eq!(at(30.), 0.);
        assert_eq!(at(70.), 70.);
        assert_eq!(at(50.), 35.);
        // clamped at both ends of the old range
        assert_eq!(at(10.), 0.);
        assert_eq!(at(90.), 70.);
    }

    #[test]
    fn remap_supports_descending_output_ranges() {
        let at = |v: f32| {
            eval(
                Op::Remap,
                &[
                    (Op::OLD_MIN, 30.),
                    (Op::OLD_MAX, 70.),
                    (Op::NEW_MIN, 30.),
                    (Op::NEW_MAX, 0.),
                    (Op::VALUE, v),
                ],
            )
        };
        assert_eq!(at(30.), 30.);
        assert_eq!(at(70.), 0.);
        assert_eq!(at(50.), 15.);
    }

    #[test]
    fn blend_extremes_reproduce_the_inputs() {
        let at = |alpha: f32| {
            eval(
                Op::Blend,
                &[(Op::IN_A, 2.), (Op::IN_B, 10.), (Op::ALPHA, alpha)],
            )
        };
        assert_eq!(at(0.), 2.);
        assert_eq!(at(1.), 10.);
        assert_eq!(at(0.5), 6.);
    }
}
