//! # Rig Weaver
//!
//! Procedural synthesis of animation **control rigs** on top of a skinned
//! joint hierarchy.
//!
//! Given a [`JointChain`](rig_weaver_core::joint_chain::JointChain) annotated
//! with axis metadata, a rig build creates an auxiliary network of driver
//! transforms, geometric helper nodes and scalar operators so an animator can
//! work a handful of controls (an IK handle, a pole vector, a foot-roll dial)
//! while the network computes joint motion. The build is one-shot: it
//! synthesizes a static, acyclic dataflow graph
//! ([`RigGraph`](rig_weaver_core::rig_graph::RigGraph)) that an external
//! pull-based engine evaluates during playback; nothing here runs per frame.
//!
//! The built-in rig algorithms live in [`rigs`]:
//! - [`rigs::hinge_ik::StretchyHingeIkRig`], a stretchy two-bone IK with
//!   no-flip / manual pole-vector switching and an optional elbow-blend
//!   layer;
//! - [`rigs::reverse_foot::ReverseFootRig`], a multi-pivot reverse-foot IK
//!   with a piecewise foot-roll network and dual-axis bank disambiguation.
//!
//! ```
//! use rig_weaver::prelude::*;
//!
//! # fn demo(chain: &JointChain) -> Result<(), RigBuildError> {
//! let rig = StretchyHingeIkRig::build(chain, &HingeIkConfig::default())?;
//! for attr in rig.instance.published() {
//!     println!("{} -> {:?}", attr.name, attr.pin);
//! }
//! # Ok(())
//! # }
//! ```

pub use rig_weaver_core as core;
pub use rig_weaver_rigs as rigs;

pub mod prelude {
    pub use rig_weaver_core::{
        axis_frame::{AxesInfo, FootFrame, classify_axes},
        channels::{Axis, DataValue, RotateOrder, SourcePin, TargetPin},
        controls::{Control, ParentSwitchGroup},
        errors::{GraphError, GraphValidationError, RigBuildError},
        joint_chain::{Joint, JointChain, JointId, NodeAxes},
        registry::{NodeHandle, SceneRef},
        rig_graph::{ModeState, ModeSwitch, RigGraph},
        rig_instance::{PublishedAttribute, RigInstance},
        sampling::GraphSampler,
        symmetry::{SymmetryConfig, mirror_chain},
        vector_math,
    };
    pub use rig_weaver_rigs::{
        hinge_ik::{HingeIkConfig, StretchyHingeIkRig},
        pole_vector::PoleVectorSwitch,
        reverse_foot::{ReverseFootConfig, ReverseFootRig},
        stretch::StretchNetwork,
    };
}
