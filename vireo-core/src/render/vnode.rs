//! Virtual nodes.
//!
//! A [`VNode`] describes one node of the UI tree. Trees are rebuilt on every
//! render and compared against the previous tree; the host handle is the only
//! thing carried forward from an old node to the new node that replaces it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::component::{ComponentDef, ComponentInstance, ComponentProxy};
use super::host::NodeHandle;
use super::shape::ShapeFlags;
use crate::reactive::Value;

/// Node props, in declaration order.
pub type Props = IndexMap<String, Value>;

/// Sibling identity used by the keyed diff.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Str(Rc<str>),
    Int(i64),
}

impl NodeKey {
    /// Key from a `key` prop. Whole numbers become [`NodeKey::Int`].
    pub fn from_value(value: &Value) -> Option<NodeKey> {
        match value {
            Value::Str(s) => Some(NodeKey::Str(s.clone())),
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(NodeKey::Int(*n as i64)),
            Value::Number(_) | Value::Bool(_) => Some(NodeKey::Str(value.to_string().into())),
            _ => None,
        }
    }
}

impl From<&str> for NodeKey {
    fn from(s: &str) -> Self {
        NodeKey::Str(s.into())
    }
}

impl From<String> for NodeKey {
    fn from(s: String) -> Self {
        NodeKey::Str(s.into())
    }
}

impl From<i64> for NodeKey {
    fn from(n: i64) -> Self {
        NodeKey::Int(n)
    }
}

impl From<i32> for NodeKey {
    fn from(n: i32) -> Self {
        NodeKey::Int(n.into())
    }
}

impl From<usize> for NodeKey {
    fn from(n: usize) -> Self {
        NodeKey::Int(n as i64)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Str(s) => f.write_str(s),
            NodeKey::Int(n) => write!(f, "{n}"),
        }
    }
}

/// What a vnode stands for.
#[derive(Clone)]
pub enum VNodeType {
    Element(Rc<str>),
    Text,
    Comment,
    /// Children without a wrapper element, bracketed by two empty text
    /// anchors in the host tree.
    Fragment,
    Component(Rc<ComponentDef>),
}

impl PartialEq for VNodeType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (VNodeType::Element(a), VNodeType::Element(b)) => a == b,
            (VNodeType::Text, VNodeType::Text)
            | (VNodeType::Comment, VNodeType::Comment)
            | (VNodeType::Fragment, VNodeType::Fragment) => true,
            (VNodeType::Component(a), VNodeType::Component(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for VNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNodeType::Element(tag) => write!(f, "Element({tag})"),
            VNodeType::Text => f.write_str("Text"),
            VNodeType::Comment => f.write_str("Comment"),
            VNodeType::Fragment => f.write_str("Fragment"),
            VNodeType::Component(def) => write!(f, "Component({})", def.name()),
        }
    }
}

/// Children of a vnode.
#[derive(Debug, Clone, Default)]
pub enum Children {
    #[default]
    None,
    Text(Rc<str>),
    Nodes(Vec<VNode>),
}

impl From<&str> for Children {
    fn from(text: &str) -> Self {
        Children::Text(text.into())
    }
}

impl From<String> for Children {
    fn from(text: String) -> Self {
        Children::Text(text.into())
    }
}

impl From<Vec<VNode>> for Children {
    fn from(nodes: Vec<VNode>) -> Self {
        Children::Nodes(nodes)
    }
}

impl From<VNode> for Children {
    fn from(node: VNode) -> Self {
        Children::Nodes(vec![node])
    }
}

impl From<()> for Children {
    fn from(_: ()) -> Self {
        Children::None
    }
}

/// One node of a virtual tree.
#[derive(Clone)]
pub struct VNode {
    pub(crate) kind: VNodeType,
    pub(crate) props: Props,
    pub(crate) children: Children,
    pub(crate) shape: ShapeFlags,
    pub(crate) key: Option<NodeKey>,
    /// Host node once mounted. For a fragment, its start anchor.
    pub(crate) el: Cell<Option<NodeHandle>>,
    /// Fragment end anchor.
    pub(crate) anchor: Cell<Option<NodeHandle>>,
    pub(crate) component: RefCell<Option<Rc<ComponentInstance>>>,
}

impl VNode {
    /// Build a vnode. The key is taken from the `key` prop, and the shape
    /// flags are derived from the type and the children.
    pub fn new(kind: VNodeType, props: Props, children: Children) -> Self {
        let mut shape = match &kind {
            VNodeType::Element(_) => ShapeFlags::ELEMENT,
            VNodeType::Component(_) => ShapeFlags::STATEFUL_COMPONENT,
            VNodeType::Text | VNodeType::Comment | VNodeType::Fragment => ShapeFlags::empty(),
        };
        match &children {
            Children::Text(_) if !matches!(kind, VNodeType::Text | VNodeType::Comment) => {
                shape |= ShapeFlags::TEXT_CHILDREN;
            }
            Children::Nodes(_) => shape |= ShapeFlags::ARRAY_CHILDREN,
            _ => {}
        }
        let key = props.get("key").and_then(NodeKey::from_value);

        Self {
            kind,
            props,
            children,
            shape,
            key,
            el: Cell::new(None),
            anchor: Cell::new(None),
            component: RefCell::new(None),
        }
    }

    /// Set the key explicitly.
    pub fn with_key(mut self, key: impl Into<NodeKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn kind(&self) -> &VNodeType {
        &self.kind
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn children(&self) -> &Children {
        &self.children
    }

    pub fn shape(&self) -> ShapeFlags {
        self.shape
    }

    pub fn key(&self) -> Option<&NodeKey> {
        self.key.as_ref()
    }

    /// Host node recorded at mount; `None` until mounted.
    pub fn el(&self) -> Option<NodeHandle> {
        self.el.get()
    }

    /// Same type and same key.
    pub fn is_same_type(&self, other: &VNode) -> bool {
        self.kind == other.kind && self.key == other.key
    }

    /// The first host node this vnode occupies.
    ///
    /// Components resolve through their rendered subtree.
    pub fn host_el(&self) -> Option<NodeHandle> {
        match &self.kind {
            VNodeType::Component(_) => self
                .component
                .borrow()
                .as_ref()
                .and_then(|instance| instance.sub_tree_host_el(VNode::host_el)),
            _ => self.el.get(),
        }
    }

    /// The last host node this vnode occupies.
    pub(crate) fn last_host_el(&self) -> Option<NodeHandle> {
        match &self.kind {
            VNodeType::Component(_) => self
                .component
                .borrow()
                .as_ref()
                .and_then(|instance| instance.sub_tree_host_el(VNode::last_host_el)),
            VNodeType::Fragment => self.anchor.get(),
            _ => self.el.get(),
        }
    }

    /// The public proxy of a mounted component vnode.
    pub fn component_proxy(&self) -> Option<ComponentProxy> {
        self.component
            .borrow()
            .as_ref()
            .map(|instance| instance.proxy().clone())
    }

    pub(crate) fn nodes(&self) -> &[VNode] {
        match &self.children {
            Children::Nodes(nodes) => nodes,
            _ => &[],
        }
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VNode")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("props", &self.props)
            .field("children", &self.children)
            .field("el", &self.el.get())
            .finish()
    }
}

impl From<&str> for VNode {
    fn from(text: &str) -> Self {
        VNode::new(VNodeType::Text, Props::new(), Children::Text(text.into()))
    }
}

impl From<String> for VNode {
    fn from(text: String) -> Self {
        VNode::new(VNodeType::Text, Props::new(), Children::Text(text.into()))
    }
}
