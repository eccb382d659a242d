//! Built-in rig algorithms.
//!
//! Each algorithm is a one-shot build: it takes a validated
//! [`rig_weaver_core::joint_chain::JointChain`] plus a typed config struct
//! and returns a fully wired, validated
//! [`rig_weaver_core::rig_instance::RigInstance`] along with handles to the
//! pieces callers and tests care about. A failed build returns an error and
//! leaves nothing behind.

pub mod hinge_ik;
pub mod pole_vector;
pub mod reverse_foot;
pub mod stretch;
