//! Host abstraction.
//!
//! The renderer never touches a real node tree. Everything it does to the
//! host goes through [`HostOps`], addressing nodes by opaque [`NodeHandle`]s.

use serde::Serialize;

use crate::reactive::Value;

/// Opaque reference to a node owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeHandle(u64);

impl NodeHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Node operations a host provides.
pub trait HostOps {
    fn create_element(&mut self, tag: &str) -> NodeHandle;

    fn create_text(&mut self, text: &str) -> NodeHandle;

    fn create_comment(&mut self, text: &str) -> NodeHandle;

    /// Replace all content of `el` with `text`.
    fn set_element_text(&mut self, el: NodeHandle, text: &str);

    /// Set the content of a text or comment node.
    fn set_text(&mut self, node: NodeHandle, text: &str);

    /// Insert `child` into `parent` before `anchor`, or at the end when
    /// there is no anchor. A child that is already attached is moved.
    fn insert(&mut self, child: NodeHandle, parent: NodeHandle, anchor: Option<NodeHandle>);

    /// Detach `child` from its parent.
    fn remove(&mut self, child: NodeHandle);

    /// Apply a prop change. `next == None` removes the prop.
    fn patch_prop(&mut self, el: NodeHandle, key: &str, prev: Option<&Value>, next: Option<&Value>);

    fn parent_node(&self, node: NodeHandle) -> Option<NodeHandle>;

    fn next_sibling(&self, node: NodeHandle) -> Option<NodeHandle>;
}
