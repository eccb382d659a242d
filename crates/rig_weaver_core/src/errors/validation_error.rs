use thiserror::Error;

use crate::channels::{SourcePin, TargetPin};

/// Structural defects in a synthesized rig graph.
///
/// These indicate a bug in the rig algorithm that produced the graph; a
/// correctly written build can never trigger them.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GraphValidationError {
    #[error("{0:?} and {1:?} have different data types but are connected")]
    InconsistentPinTypes(SourcePin, TargetPin),
    #[error("{0:?} is driven more than once (edge and/or mode switch)")]
    DoublyDrivenTarget(TargetPin),
    #[error("dependency cycle through {0:?}")]
    CycleDetected(SourcePin),
    #[error("edge endpoint {0:?} refers to a node that is not in the registry")]
    DanglingHandle(SourcePin),
}
