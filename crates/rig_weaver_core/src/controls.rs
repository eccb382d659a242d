//! Animator-facing handles and their parent-switch machinery.

use crate::registry::{NodeHandle, SceneRef};

/// The (pre-transform, transform, proxy) triple every animator-facing handle
/// is made of.
///
/// The pre-transform is the only node that is ever re-parented; the transform
/// carries the keyable channels and custom attributes; the proxy is purely
/// cosmetic. Controls are created once per rig, owned by the instance, and
/// only destroyed with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    pub pre_transform: NodeHandle,
    pub transform: NodeHandle,
    pub proxy: NodeHandle,
}

/// Group inserted above a control's pre-transform so the control can follow
/// one of several weighted parents.
///
/// The selector enum attribute lives on the control's transform; the
/// constraint weights are enforced by a mode switch installed at build time
/// (selected target weight 1, all others 0), never by runtime logic.
#[derive(Debug, Clone)]
pub struct ParentSwitchGroup {
    pub group: NodeHandle,
    pub constraint: NodeHandle,
    pub targets: Vec<SceneRef>,
}
