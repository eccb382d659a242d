//! Core substrate for procedural control-rig synthesis.
//!
//! A rig build is a one-shot pass: given a [`joint_chain::JointChain`]
//! annotated with axis metadata, the builder API on
//! [`rig_instance::RigInstance`] creates controls, helper transforms and a
//! dataflow graph of scalar operators ([`rig_graph::RigGraph`]). The graph is
//! *data*: an external pull-based host evaluates it during playback. This
//! crate only guarantees that the published graph is well formed (type
//! consistent, singly driven, acyclic).

pub mod axis_frame;
pub mod builder;
pub mod channels;
pub mod controls;
pub mod errors;
pub mod joint_chain;
pub mod registry;
pub mod rig_graph;
pub mod rig_instance;
pub mod sampling;
pub mod symmetry;
pub mod vector_math;
