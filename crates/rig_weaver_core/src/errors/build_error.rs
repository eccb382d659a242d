use thiserror::Error;

use crate::errors::GraphValidationError;

/// Fatal precondition violations detected while synthesizing a rig.
///
/// A build is all-or-nothing: when one of these is returned the partially
/// built [`crate::rig_instance::RigInstance`] is dropped by the caller, never
/// published. Retrying with identical inputs is meaningless, construction is
/// deterministic.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RigBuildError {
    #[error("joint chain is empty")]
    EmptyChain,
    #[error("joint {0:?} appears more than once in the chain")]
    DuplicateJointName(String),
    #[error("joint {0:?} must come after its parent in the chain")]
    ParentAfterChild(String),
    #[error("chain has more than one root joint ({0:?} has no parent)")]
    MultipleRoots(String),
    #[error("local axes of joint {joint:?} are not a permutation of X/Y/Z")]
    DegenerateNodeAxes { joint: String },
    #[error("joints {a:?} and {b:?} are coincident, segment direction is undefined")]
    CoincidentJoints { a: String, b: String },
    #[error("expected a 3-joint hinge chain (root, middle, end), found {found} joints")]
    NotAHingeChain { found: usize },
    #[error("hinge chain {0:?} is missing its segment midpoint metadata")]
    MissingSegmentMidpoint(String),
    #[error("ankle joint {ankle:?} needs exactly one ball child (with descendants) and one heel child (leaf)")]
    AmbiguousFootChildren { ankle: String },
    #[error("reference frame assigned the same local axis twice for {label:?}")]
    AmbiguousAxisFrame { label: String },
    #[error("chain rest length is zero, stretch factor is undefined")]
    ZeroRestLength,
    #[error("graph failed validation: {0}")]
    Validation(#[from] GraphValidationError),
}
