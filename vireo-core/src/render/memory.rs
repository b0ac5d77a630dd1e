//! In-memory host.
//!
//! [`MemoryHost`] keeps the node tree in an arena and records every
//! operation the renderer performs, which makes it the host the tests and
//! benches render into.

use std::collections::HashMap;
use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;

use super::host::{HostOps, NodeHandle};
use crate::reactive::Value;

/// One recorded host operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostOp {
    CreateElement {
        node: NodeHandle,
        tag: String,
    },
    CreateText {
        node: NodeHandle,
        text: String,
    },
    CreateComment {
        node: NodeHandle,
        text: String,
    },
    SetElementText {
        node: NodeHandle,
        text: String,
    },
    SetText {
        node: NodeHandle,
        text: String,
    },
    Insert {
        node: NodeHandle,
        parent: NodeHandle,
        anchor: Option<NodeHandle>,
    },
    Remove {
        node: NodeHandle,
    },
    PatchProp {
        node: NodeHandle,
        key: String,
        prev: Option<serde_json::Value>,
        next: Option<serde_json::Value>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Root,
    Element(String),
    Text,
    Comment,
}

#[derive(Debug)]
struct MemNode {
    kind: NodeKind,
    text: String,
    props: IndexMap<String, serde_json::Value>,
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
}

impl MemNode {
    fn new(kind: NodeKind, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
            props: IndexMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Arena-backed host that logs what was done to it.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: HashMap<NodeHandle, MemNode>,
    next_id: u64,
    ops: Vec<HostOp>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, kind: NodeKind, text: &str) -> NodeHandle {
        self.next_id += 1;
        let handle = NodeHandle::from_raw(self.next_id);
        self.nodes.insert(handle, MemNode::new(kind, text));
        handle
    }

    /// A container to render into. Not recorded as an operation.
    pub fn create_root(&mut self) -> NodeHandle {
        self.alloc(NodeKind::Root, "")
    }

    /// Operations recorded since the last [`take_ops`](Self::take_ops).
    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// Number of recorded operations matching `pred`.
    pub fn count_ops(&self, pred: impl Fn(&HostOp) -> bool) -> usize {
        self.ops.iter().filter(|op| pred(op)).count()
    }

    /// The operation log as JSON.
    pub fn ops_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.ops)
    }

    /// Live nodes, including roots.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, node: NodeHandle) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn children(&self, node: NodeHandle) -> Vec<NodeHandle> {
        self.nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn tag(&self, node: NodeHandle) -> Option<&str> {
        match &self.nodes.get(&node)?.kind {
            NodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    /// Content of a text or comment node, or the text set on an element.
    pub fn text(&self, node: NodeHandle) -> Option<&str> {
        self.nodes.get(&node).map(|n| n.text.as_str())
    }

    pub fn prop(&self, node: NodeHandle, key: &str) -> Option<&serde_json::Value> {
        self.nodes.get(&node)?.props.get(key)
    }

    /// Markup for `node` and everything below it.
    pub fn to_markup(&self, node: NodeHandle) -> String {
        let mut out = String::new();
        self.write_markup(node, &mut out);
        out
    }

    /// Markup for the children of `node`.
    pub fn inner_markup(&self, node: NodeHandle) -> String {
        let mut out = String::new();
        if let Some(n) = self.nodes.get(&node) {
            out.push_str(&n.text);
            for &child in &n.children {
                self.write_markup(child, &mut out);
            }
        }
        out
    }

    fn write_markup(&self, node: NodeHandle, out: &mut String) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        match &n.kind {
            NodeKind::Text => out.push_str(&n.text),
            NodeKind::Comment => {
                let _ = write!(out, "<!--{}-->", n.text);
            }
            NodeKind::Root => out.push_str(&self.inner_markup(node)),
            NodeKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (key, value) in &n.props {
                    match value {
                        serde_json::Value::String(s) => {
                            let _ = write!(out, " {key}=\"{s}\"");
                        }
                        other => {
                            let _ = write!(out, " {key}=\"{other}\"");
                        }
                    }
                }
                out.push('>');
                out.push_str(&self.inner_markup(node));
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    fn detach(&mut self, child: NodeHandle) {
        let Some(parent) = self.nodes.get_mut(&child).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|&c| c != child);
        }
    }

    fn drop_subtree(&mut self, node: NodeHandle) {
        if let Some(n) = self.nodes.remove(&node) {
            for child in n.children {
                self.drop_subtree(child);
            }
        }
    }
}

impl HostOps for MemoryHost {
    fn create_element(&mut self, tag: &str) -> NodeHandle {
        let node = self.alloc(NodeKind::Element(tag.to_string()), "");
        self.ops.push(HostOp::CreateElement {
            node,
            tag: tag.to_string(),
        });
        node
    }

    fn create_text(&mut self, text: &str) -> NodeHandle {
        let node = self.alloc(NodeKind::Text, text);
        self.ops.push(HostOp::CreateText {
            node,
            text: text.to_string(),
        });
        node
    }

    fn create_comment(&mut self, text: &str) -> NodeHandle {
        let node = self.alloc(NodeKind::Comment, text);
        self.ops.push(HostOp::CreateComment {
            node,
            text: text.to_string(),
        });
        node
    }

    fn set_element_text(&mut self, el: NodeHandle, text: &str) {
        let children = match self.nodes.get_mut(&el) {
            Some(n) => {
                n.text = text.to_string();
                std::mem::take(&mut n.children)
            }
            None => return,
        };
        for child in children {
            self.drop_subtree(child);
        }
        self.ops.push(HostOp::SetElementText {
            node: el,
            text: text.to_string(),
        });
    }

    fn set_text(&mut self, node: NodeHandle, text: &str) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.text = text.to_string();
        }
        self.ops.push(HostOp::SetText {
            node,
            text: text.to_string(),
        });
    }

    fn insert(&mut self, child: NodeHandle, parent: NodeHandle, anchor: Option<NodeHandle>) {
        self.detach(child);
        let Some(p) = self.nodes.get_mut(&parent) else {
            warn!(?parent, "insert into unknown node");
            return;
        };
        let position = match anchor {
            Some(anchor) => match p.children.iter().position(|&c| c == anchor) {
                Some(position) => position,
                None => {
                    warn!(?anchor, ?parent, "anchor is not a child of parent, appending");
                    p.children.len()
                }
            },
            None => p.children.len(),
        };
        p.children.insert(position, child);
        if let Some(c) = self.nodes.get_mut(&child) {
            c.parent = Some(parent);
        }
        self.ops.push(HostOp::Insert {
            node: child,
            parent,
            anchor,
        });
    }

    fn remove(&mut self, child: NodeHandle) {
        self.detach(child);
        self.drop_subtree(child);
        self.ops.push(HostOp::Remove { node: child });
    }

    fn patch_prop(&mut self, el: NodeHandle, key: &str, prev: Option<&Value>, next: Option<&Value>) {
        let prev = prev.map(Value::to_json);
        let next = next.map(Value::to_json);
        if let Some(n) = self.nodes.get_mut(&el) {
            match &next {
                Some(value) if !value.is_null() => {
                    n.props.insert(key.to_string(), value.clone());
                }
                _ => {
                    n.props.shift_remove(key);
                }
            }
        }
        self.ops.push(HostOp::PatchProp {
            node: el,
            key: key.to_string(),
            prev,
            next,
        });
    }

    fn parent_node(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.nodes.get(&node)?.parent
    }

    fn next_sibling(&self, node: NodeHandle) -> Option<NodeHandle> {
        let parent = self.parent_node(node)?;
        let siblings = &self.nodes.get(&parent)?.children;
        let position = siblings.iter().position(|&c| c == node)?;
        siblings.get(position + 1).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_before_anchor_and_move() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let a = host.create_text("a");
        let b = host.create_text("b");
        let c = host.create_text("c");
        host.insert(a, root, None);
        host.insert(c, root, None);
        host.insert(b, root, Some(c));
        assert_eq!(host.inner_markup(root), "abc");

        host.insert(c, root, Some(a));
        assert_eq!(host.inner_markup(root), "cab");
        assert_eq!(host.next_sibling(c), Some(a));
        assert_eq!(host.next_sibling(b), None);
        assert_eq!(host.parent_node(a), Some(root));
    }

    #[test]
    fn markup_and_props() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let div = host.create_element("div");
        host.patch_prop(div, "id", None, Some(&Value::from("main")));
        host.patch_prop(div, "n", None, Some(&Value::from(2)));
        host.set_element_text(div, "hi");
        host.insert(div, root, None);
        assert_eq!(host.to_markup(root), "<div id=\"main\" n=\"2\">hi</div>");

        host.patch_prop(div, "id", Some(&Value::from("main")), None);
        assert_eq!(host.prop(div, "id"), None);
        assert_eq!(host.prop(div, "n"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn remove_drops_the_subtree() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let ul = host.create_element("ul");
        let li = host.create_element("li");
        host.insert(li, ul, None);
        host.insert(ul, root, None);
        assert_eq!(host.node_count(), 3);

        host.remove(ul);
        assert_eq!(host.node_count(), 1);
        assert!(!host.contains(li));
        assert!(host.children(root).is_empty());
    }

    #[test]
    fn ops_are_logged_as_json() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let t = host.create_text("x");
        host.insert(t, root, None);

        let json: serde_json::Value = serde_json::from_str(&host.ops_json().unwrap()).unwrap();
        assert_eq!(json[0]["op"], "create_text");
        assert_eq!(json[1]["op"], "insert");
        assert_eq!(json[1]["anchor"], serde_json::Value::Null);
        assert_eq!(host.count_ops(|op| matches!(op, HostOp::Insert { .. })), 1);

        assert_eq!(host.take_ops().len(), 2);
        assert!(host.ops().is_empty());
    }
}
