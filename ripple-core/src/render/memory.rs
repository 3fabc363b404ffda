//! In-Memory Host
//!
//! A [`HostOps`] backend that keeps the host tree in a map and records every
//! operation it receives. Tests assert on the operation log (how many moves a
//! reorder took) and on the resulting tree (as JSON).
//!
//! Event listeners follow the invoker scheme: each element keeps one listener
//! slot per event, and rebinding a handler replaces the slot's contents
//! instead of detaching and reattaching a listener.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};

use super::host::{HostNode, HostOps};
use super::renderer::Renderer;
use super::vnode::{Handler, PropValue};
use crate::reactive::Value;

/// One recorded host operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostOp {
    CreateElement { node: HostNode, tag: String },
    CreateText { node: HostNode, content: String },
    SetText { node: HostNode, content: String },
    SetElementText { node: HostNode, text: String },
    /// A detached node was attached.
    Insert { node: HostNode, parent: HostNode, anchor: Option<HostNode> },
    /// An attached node was re-inserted somewhere else.
    Move { node: HostNode, parent: HostNode, anchor: Option<HostNode> },
    Remove { node: HostNode, parent: HostNode },
    SetProp { node: HostNode, key: String },
    RemoveProp { node: HostNode, key: String },
}

#[derive(Debug)]
enum NodeKind {
    Element(String),
    Text,
}

#[derive(Debug)]
struct MemNode {
    kind: NodeKind,
    text: String,
    parent: Option<HostNode>,
    children: Vec<HostNode>,
    attrs: IndexMap<String, Value>,
    listeners: IndexMap<String, Handler>,
}

impl MemNode {
    fn new(kind: NodeKind, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
            parent: None,
            children: Vec::new(),
            attrs: IndexMap::new(),
            listeners: IndexMap::new(),
        }
    }
}

/// In-memory host tree with an operation log.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: HashMap<HostNode, MemNode>,
    next_id: u64,
    ops: Vec<HostOp>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, node: MemNode) -> HostNode {
        self.next_id += 1;
        let id = HostNode(self.next_id);
        self.nodes.insert(id, node);
        id
    }

    /// Create a container element to render into. Not recorded.
    pub fn create_root(&mut self) -> HostNode {
        self.alloc(MemNode::new(NodeKind::Element("root".into()), ""))
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    /// Drain the operation log.
    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// Number of recorded operations matching `predicate`.
    pub fn count_ops(&self, predicate: impl Fn(&HostOp) -> bool) -> usize {
        self.ops.iter().filter(|op| predicate(op)).count()
    }

    pub fn children(&self, node: HostNode) -> Vec<HostNode> {
        self.nodes
            .get(&node)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    pub fn parent(&self, node: HostNode) -> Option<HostNode> {
        self.nodes.get(&node).and_then(|node| node.parent)
    }

    pub fn tag(&self, node: HostNode) -> Option<&str> {
        match &self.nodes.get(&node)?.kind {
            NodeKind::Element(tag) => Some(tag),
            NodeKind::Text => None,
        }
    }

    pub fn attr(&self, node: HostNode, key: &str) -> Option<&Value> {
        self.nodes.get(&node)?.attrs.get(key)
    }

    /// Concatenated text of `node` and everything below it.
    pub fn text_content(&self, node: HostNode) -> String {
        let Some(mem) = self.nodes.get(&node) else {
            return String::new();
        };
        match mem.kind {
            NodeKind::Text => mem.text.clone(),
            NodeKind::Element(_) if mem.children.is_empty() => mem.text.clone(),
            NodeKind::Element(_) => mem.children.iter().map(|child| self.text_content(*child)).collect(),
        }
    }

    /// The handler bound to `event` on `node`.
    pub fn handler(&self, node: HostNode, event: &str) -> Option<Handler> {
        self.nodes.get(&node)?.listeners.get(&event.to_lowercase()).cloned()
    }

    /// Call the handler bound to `event` on `node`. Returns whether one was
    /// bound.
    pub fn dispatch(&self, node: HostNode, event: &str, args: &[Value]) -> bool {
        match self.handler(node, event) {
            Some(handler) => {
                handler.call(args);
                true
            }
            None => false,
        }
    }

    /// JSON snapshot of the tree below `node`.
    ///
    /// Elements become `{"tag", "attrs", "children"}` objects (or `"text"`
    /// for raw element text), text nodes become strings.
    pub fn to_json(&self, node: HostNode) -> JsonValue {
        let Some(mem) = self.nodes.get(&node) else {
            return JsonValue::Null;
        };
        match &mem.kind {
            NodeKind::Text => JsonValue::String(mem.text.clone()),
            NodeKind::Element(tag) => {
                let attrs: serde_json::Map<String, JsonValue> = mem
                    .attrs
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect();
                let mut out = json!({ "tag": tag, "attrs": attrs });
                if mem.children.is_empty() && !mem.text.is_empty() {
                    out["text"] = JsonValue::String(mem.text.clone());
                } else {
                    out["children"] = mem.children.iter().map(|child| self.to_json(*child)).collect();
                }
                out
            }
        }
    }

    fn detach(&mut self, node: HostNode) -> Option<HostNode> {
        let parent = self.nodes.get_mut(&node)?.parent.take()?;
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.retain(|child| *child != node);
        }
        Some(parent)
    }
}

impl HostOps for MemoryHost {
    fn create_element(&mut self, tag: &str) -> HostNode {
        let node = self.alloc(MemNode::new(NodeKind::Element(tag.to_string()), ""));
        self.ops.push(HostOp::CreateElement {
            node,
            tag: tag.to_string(),
        });
        node
    }

    fn create_text(&mut self, content: &str) -> HostNode {
        let node = self.alloc(MemNode::new(NodeKind::Text, content));
        self.ops.push(HostOp::CreateText {
            node,
            content: content.to_string(),
        });
        node
    }

    fn set_text(&mut self, node: HostNode, content: &str) {
        if let Some(mem) = self.nodes.get_mut(&node) {
            mem.text = content.to_string();
        }
        self.ops.push(HostOp::SetText {
            node,
            content: content.to_string(),
        });
    }

    fn set_element_text(&mut self, el: HostNode, text: &str) {
        for child in self.children(el) {
            self.detach(child);
        }
        if let Some(mem) = self.nodes.get_mut(&el) {
            mem.text = text.to_string();
        }
        self.ops.push(HostOp::SetElementText {
            node: el,
            text: text.to_string(),
        });
    }

    fn insert(&mut self, node: HostNode, parent: HostNode, anchor: Option<HostNode>) {
        let moved = self.detach(node).is_some();

        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            let index = anchor
                .and_then(|anchor| parent_node.children.iter().position(|child| *child == anchor))
                .unwrap_or(parent_node.children.len());
            parent_node.children.insert(index, node);
        }
        if let Some(mem) = self.nodes.get_mut(&node) {
            mem.parent = Some(parent);
        }

        self.ops.push(if moved {
            HostOp::Move { node, parent, anchor }
        } else {
            HostOp::Insert { node, parent, anchor }
        });
    }

    fn remove(&mut self, parent: HostNode, node: HostNode) {
        self.detach(node);
        self.ops.push(HostOp::Remove { node, parent });
    }

    fn first_child(&self, parent: HostNode) -> Option<HostNode> {
        self.nodes.get(&parent)?.children.first().copied()
    }

    fn next_sibling(&self, node: HostNode) -> Option<HostNode> {
        let parent = self.nodes.get(&node)?.parent?;
        let siblings = &self.nodes.get(&parent)?.children;
        let index = siblings.iter().position(|child| *child == node)?;
        siblings.get(index + 1).copied()
    }

    fn patch_prop(&mut self, el: HostNode, key: &str, _prev: Option<&PropValue>, next: Option<&PropValue>) {
        let Some(mem) = self.nodes.get_mut(&el) else {
            return;
        };

        let event = key.strip_prefix("on").map(str::to_lowercase);
        match (next, event) {
            (Some(PropValue::Handler(handler)), Some(event)) => {
                mem.listeners.insert(event, handler.clone());
            }
            (None, Some(event)) if mem.listeners.contains_key(&event) => {
                mem.listeners.shift_remove(&event);
            }
            (Some(PropValue::Value(value)), _) => {
                mem.attrs.insert(key.to_string(), value.clone());
            }
            (Some(PropValue::Handler(_)), None) => {}
            (None, _) => {
                mem.attrs.shift_remove(key);
            }
        }

        self.ops.push(match next {
            Some(_) => HostOp::SetProp {
                node: el,
                key: key.to_string(),
            },
            None => HostOp::RemoveProp {
                node: el,
                key: key.to_string(),
            },
        });
    }
}

impl Renderer<MemoryHost> {
    /// Dispatch `event` on `node` without holding the host borrow while the
    /// handler runs, so the handler may render again.
    pub fn dispatch(&self, node: HostNode, event: &str, args: &[Value]) -> bool {
        let handler = self.host().handler(node, event);
        match handler {
            Some(handler) => {
                handler.call(args);
                true
            }
            None => false,
        }
    }
}
