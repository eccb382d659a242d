use thiserror::Error;

use crate::channels::{DataSpec, SourcePin, TargetPin};

/// Lookup failures while resolving pins on a published graph, e.g. from the
/// reference sampler.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("expected {expected:?} data, found {found:?}")]
    MismatchedDataType { expected: DataSpec, found: DataSpec },
    #[error("{0:?} does not exist on the node it addresses")]
    MissingSourcePin(SourcePin),
    #[error("{0:?} is neither driven nor backed by a constant")]
    UnresolvedTarget(TargetPin),
    #[error("mode switch has no state sampled at driver value {0}")]
    UnsampledModeValue(i32),
    #[error("node handle in {0:?} is stale")]
    StaleHandle(SourcePin),
}
