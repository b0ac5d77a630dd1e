//! Vnode builders.

use std::rc::Rc;

use super::component::ComponentDef;
use super::vnode::{Children, Props, VNode, VNodeType};

/// Build a props map.
///
/// ```rust,ignore
/// let p = props! { "id" => "main", "key" => 1 };
/// ```
#[macro_export]
macro_rules! props {
    () => {
        $crate::render::Props::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut props = $crate::render::Props::new();
        $(props.insert(::std::string::String::from($key), $crate::reactive::Value::from($value));)+
        props
    }};
}

/// An element vnode.
pub fn h(tag: &str, props: Props, children: impl Into<Children>) -> VNode {
    VNode::new(VNodeType::Element(tag.into()), props, children.into())
}

/// A text vnode.
pub fn text(content: impl Into<Rc<str>>) -> VNode {
    VNode::new(VNodeType::Text, Props::new(), Children::Text(content.into()))
}

/// A comment vnode.
pub fn comment(content: impl Into<Rc<str>>) -> VNode {
    VNode::new(VNodeType::Comment, Props::new(), Children::Text(content.into()))
}

/// A fragment of sibling vnodes.
pub fn fragment(children: Vec<VNode>) -> VNode {
    VNode::new(VNodeType::Fragment, Props::new(), Children::Nodes(children))
}

/// A component vnode. Props the component declares become its props,
/// everything else its attrs.
pub fn component(def: &Rc<ComponentDef>, props: Props) -> VNode {
    VNode::new(VNodeType::Component(def.clone()), props, Children::None)
}
