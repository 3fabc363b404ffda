//! Tree Snapshots
//!
//! A [`VNode`] describes one node of the UI tree as produced by a single
//! render. Snapshots are built fresh on every render and diffed against the
//! previous one; the only state carried from the old snapshot to the new one
//! is the host node (and component instance) each matched node produced.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::component::{Component, ComponentInstance};
use super::host::HostNode;
use crate::reactive::{Key, Value};

/// What kind of node a [`VNode`] is.
#[derive(Clone)]
pub enum NodeType {
    /// A host element with the given tag.
    Element(String),
    /// A host text node. The content lives in [`Children::Text`].
    Text,
    /// A list of siblings with no host node of its own.
    Fragment,
    Component(Rc<dyn Component>),
}

impl NodeType {
    /// Whether two node types describe the same kind of node. Components
    /// compare by descriptor identity.
    pub fn same(&self, other: &NodeType) -> bool {
        match (self, other) {
            (NodeType::Element(a), NodeType::Element(b)) => a == b,
            (NodeType::Text, NodeType::Text) | (NodeType::Fragment, NodeType::Fragment) => true,
            (NodeType::Component(a), NodeType::Component(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Element(tag) => write!(f, "<{tag}>"),
            NodeType::Text => f.write_str("#text"),
            NodeType::Fragment => f.write_str("#fragment"),
            NodeType::Component(component) => write!(f, "<{}/>", component.name()),
        }
    }
}

/// Children of a node.
#[derive(Debug, Clone, Default)]
pub enum Children {
    #[default]
    None,
    Text(String),
    Nodes(Vec<VNode>),
}

/// Event handler bound through an `on*` prop.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&[Value])>);

impl Handler {
    pub fn new(f: impl Fn(&[Value]) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) {
        (self.0)(args)
    }

    pub fn ptr_eq(&self, other: &Handler) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Rc::as_ptr(&self.0))
    }
}

/// A property value: plain data or an event handler.
#[derive(Debug, Clone)]
pub enum PropValue {
    Value(Value),
    Handler(Handler),
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Value(a), PropValue::Value(b)) => a.same_value(b),
            (PropValue::Handler(a), PropValue::Handler(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

macro_rules! prop_value_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for PropValue {
                fn from(value: $ty) -> Self {
                    PropValue::Value(value.into())
                }
            }
        )*
    };
}

prop_value_from!(Value, bool, f64, i32, u32, usize, &str, String);

impl From<Handler> for PropValue {
    fn from(handler: Handler) -> Self {
        PropValue::Handler(handler)
    }
}

pub type Props = IndexMap<String, PropValue>;

/// One node of a tree snapshot.
#[derive(Clone)]
pub struct VNode {
    pub node_type: NodeType,
    /// Stable identity among siblings.
    pub key: Option<Key>,
    pub props: Props,
    pub children: Children,
    /// Host node produced by mounting. Unset for fragments and components.
    pub(crate) el: Option<HostNode>,
    pub(crate) component: Option<Rc<ComponentInstance>>,
}

impl VNode {
    fn new(node_type: NodeType, children: Children) -> Self {
        Self {
            node_type,
            key: None,
            props: Props::new(),
            children,
            el: None,
            component: None,
        }
    }

    pub fn element(tag: impl Into<String>) -> Self {
        Self::new(NodeType::Element(tag.into()), Children::None)
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(NodeType::Text, Children::Text(content.into()))
    }

    pub fn fragment(children: impl IntoIterator<Item = VNode>) -> Self {
        Self::new(NodeType::Fragment, Children::Nodes(children.into_iter().collect()))
    }

    pub fn component(component: Rc<dyn Component>) -> Self {
        Self::new(NodeType::Component(component), Children::None)
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    /// Bind `handler` to the `on<Event>` prop named by `name`.
    pub fn on(self, name: impl Into<String>, handler: impl Fn(&[Value]) + 'static) -> Self {
        self.prop(name, Handler::new(handler))
    }

    /// Append a child node.
    pub fn child(mut self, child: VNode) -> Self {
        match &mut self.children {
            Children::Nodes(nodes) => nodes.push(child),
            children => *children = Children::Nodes(vec![child]),
        }
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = VNode>) -> Self {
        self.children = Children::Nodes(children.into_iter().collect());
        self
    }

    /// Raw text content of an element.
    pub fn text_content(mut self, text: impl Into<String>) -> Self {
        self.children = Children::Text(text.into());
        self
    }

    /// Whether `self` and `other` are the same logical node across renders:
    /// same type and equal keys, both present and truthy.
    pub fn is_same(&self, other: &VNode) -> bool {
        let keyed = match (&self.key, &other.key) {
            (Some(a), Some(b)) => a.is_truthy() && a == b,
            _ => false,
        };
        keyed && self.node_type.same(&other.node_type)
    }

    /// The first host node this subtree produced, if it is mounted.
    pub fn el(&self) -> Option<HostNode> {
        match &self.node_type {
            NodeType::Element(_) | NodeType::Text => self.el,
            NodeType::Fragment => match &self.children {
                Children::Nodes(nodes) => nodes.iter().find_map(VNode::el),
                _ => None,
            },
            NodeType::Component(_) => self
                .component
                .as_ref()
                .and_then(|instance| instance.sub_tree.borrow().as_ref().and_then(VNode::el)),
        }
    }

    /// Every top-level host node of this subtree, in order.
    pub(crate) fn host_nodes(&self, out: &mut Vec<HostNode>) {
        match &self.node_type {
            NodeType::Element(_) | NodeType::Text => out.extend(self.el),
            NodeType::Fragment => {
                if let Children::Nodes(nodes) = &self.children {
                    for node in nodes {
                        node.host_nodes(out);
                    }
                }
            }
            NodeType::Component(_) => {
                if let Some(instance) = &self.component {
                    if let Some(sub_tree) = instance.sub_tree.borrow().as_ref() {
                        sub_tree.host_nodes(out);
                    }
                }
            }
        }
    }

    /// The last top-level host node of this subtree.
    pub(crate) fn last_host_node(&self) -> Option<HostNode> {
        let mut out = Vec::new();
        self.host_nodes(&mut out);
        out.pop()
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VNode")
            .field("type", &self.node_type)
            .field("key", &self.key)
            .field("props", &self.props)
            .field("children", &self.children)
            .field("el", &self.el)
            .finish()
    }
}

/// The first host node among `nodes`, or `fallback` if none is mounted.
pub(crate) fn anchor_after(nodes: &[VNode], fallback: Option<HostNode>) -> Option<HostNode> {
    nodes.iter().find_map(VNode::el).or(fallback)
}
