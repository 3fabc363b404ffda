//! Host Operations Contract
//!
//! The reconciler never touches a rendering backend directly. Everything it
//! does to the host tree goes through [`HostOps`], so a browser DOM, a
//! terminal cell grid or the in-memory host used by the tests can be swapped
//! in without changing any diffing logic.

use std::fmt;

use serde::Serialize;

use super::vnode::PropValue;

/// Opaque handle to a node owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HostNode(pub u64);

impl fmt::Display for HostNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host#{}", self.0)
    }
}

/// Operations the reconciler needs from a host backend.
///
/// `insert` is also how nodes are moved: inserting a node that already has a
/// parent detaches it from there first.
pub trait HostOps {
    fn create_element(&mut self, tag: &str) -> HostNode;

    fn create_text(&mut self, content: &str) -> HostNode;

    /// Replace the content of a text node.
    fn set_text(&mut self, node: HostNode, content: &str);

    /// Replace all children of an element with raw text.
    fn set_element_text(&mut self, el: HostNode, text: &str);

    /// Insert `node` into `parent` before `anchor`, or at the end.
    fn insert(&mut self, node: HostNode, parent: HostNode, anchor: Option<HostNode>);

    fn remove(&mut self, parent: HostNode, node: HostNode);

    fn first_child(&self, parent: HostNode) -> Option<HostNode>;

    fn next_sibling(&self, node: HostNode) -> Option<HostNode>;

    /// Apply a single property change. `next == None` removes the property.
    fn patch_prop(&mut self, el: HostNode, key: &str, prev: Option<&PropValue>, next: Option<&PropValue>);
}
