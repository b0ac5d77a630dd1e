//! The renderer.
//!
//! Mounts vnode trees into a host and patches them against the previous
//! tree on every render.
//!
//! # Keyed children
//!
//! Two child lists are reconciled in five steps:
//!
//! 1. Patch the common prefix.
//! 2. Patch the common suffix.
//! 3. Only new nodes left: mount them.
//! 4. Only old nodes left: unmount them.
//! 5. Otherwise map the remaining new keys to their positions, walk the
//!    remaining old nodes patching or unmounting each, then walk the new
//!    range backwards mounting fresh nodes and moving matched ones. When
//!    the matched nodes are out of order, only the ones outside a longest
//!    increasing subsequence of their old positions are moved.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use super::component::{ComponentDef, ComponentInstance};
use super::host::{HostOps, NodeHandle};
use super::sequence::longest_increasing_subsequence;
use super::shape::ShapeFlags;
use super::vnode::{Children, NodeKey, Props, VNode, VNodeType};
use crate::graph::{queue_job, Job};
use crate::reactive::{effect_with, untracked, EffectOptions};

/// Renderer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererConfig {
    /// Log a warning when siblings share a key.
    pub warn_duplicate_keys: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            warn_duplicate_keys: cfg!(debug_assertions),
        }
    }
}

struct RendererInner<H> {
    host: RefCell<H>,
    config: RendererConfig,
    roots: RefCell<HashMap<NodeHandle, VNode>>,
}

/// Renders vnode trees into a host.
pub struct Renderer<H> {
    inner: Rc<RendererInner<H>>,
}

impl<H> Clone for Renderer<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<H: HostOps + 'static> Renderer<H> {
    pub fn new(host: H) -> Self {
        Self::with_config(host, RendererConfig::default())
    }

    pub fn with_config(host: H, config: RendererConfig) -> Self {
        Self {
            inner: Rc::new(RendererInner {
                host: RefCell::new(host),
                config,
                roots: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.inner.config
    }

    /// Borrow the host.
    ///
    /// # Panics
    ///
    /// If called from inside a host operation.
    pub fn host(&self) -> std::cell::Ref<'_, H> {
        self.inner.host.borrow()
    }

    /// Run `f` with the host borrowed mutably.
    pub fn with_host<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(&mut self.inner.host.borrow_mut())
    }

    /// Render `vnode` into `container`, patching whatever was rendered there
    /// before. `None` unmounts the previous tree.
    pub fn render(&self, vnode: Option<VNode>, container: NodeHandle) {
        let prev = self.inner.roots.borrow_mut().remove(&container);
        match (prev, vnode) {
            (Some(prev), None) => self.unmount(&prev),
            (None, None) => {}
            (prev, Some(next)) => {
                self.patch(prev.as_ref(), &next, container, None);
                self.inner.roots.borrow_mut().insert(container, next);
            }
        }
    }

    /// Run `f` on the tree currently rendered into `container`.
    pub fn with_root<R>(&self, container: NodeHandle, f: impl FnOnce(&VNode) -> R) -> Option<R> {
        let roots = self.inner.roots.borrow();
        roots.get(&container).map(f)
    }

    /// Make the host reflect `new`, reusing `old`'s host nodes where the two
    /// are the same type.
    pub fn patch(&self, old: Option<&VNode>, new: &VNode, container: NodeHandle, anchor: Option<NodeHandle>) {
        let mut old = old;
        let mut anchor = anchor;

        if let Some(prev) = old {
            if std::ptr::eq(prev, new) {
                return;
            }
            if !prev.is_same_type(new) {
                anchor = self.next_host_node(prev);
                self.unmount(prev);
                old = None;
            }
        }

        match &new.kind {
            VNodeType::Text | VNodeType::Comment => self.process_leaf(old, new, container, anchor),
            VNodeType::Fragment => self.process_fragment(old, new, container, anchor),
            VNodeType::Element(tag) => self.process_element(old, new, tag, container, anchor),
            VNodeType::Component(def) => match old {
                None => self.mount_component(def, new, container, anchor),
                Some(prev) => self.update_component(prev, new),
            },
        }
    }

    /// Unmount `vnode` and remove its host nodes.
    pub fn unmount(&self, vnode: &VNode) {
        self.unmount_node(vnode, true);
    }

    fn text_of(vnode: &VNode) -> &str {
        match &vnode.children {
            Children::Text(text) => &**text,
            _ => "",
        }
    }

    /// Text and comment nodes.
    fn process_leaf(&self, old: Option<&VNode>, new: &VNode, container: NodeHandle, anchor: Option<NodeHandle>) {
        let content = Self::text_of(new);
        match old {
            None => {
                let mut host = self.inner.host.borrow_mut();
                let el = match new.kind {
                    VNodeType::Comment => host.create_comment(content),
                    _ => host.create_text(content),
                };
                new.el.set(Some(el));
                host.insert(el, container, anchor);
            }
            Some(prev) => {
                new.el.set(prev.el.get());
                if let Some(el) = prev.el.get() {
                    if Self::text_of(prev) != content {
                        self.inner.host.borrow_mut().set_text(el, content);
                    }
                }
            }
        }
    }

    fn process_fragment(&self, old: Option<&VNode>, new: &VNode, container: NodeHandle, anchor: Option<NodeHandle>) {
        match old {
            None => {
                let end = {
                    let mut host = self.inner.host.borrow_mut();
                    let start = host.create_text("");
                    let end = host.create_text("");
                    host.insert(start, container, anchor);
                    host.insert(end, container, anchor);
                    new.el.set(Some(start));
                    new.anchor.set(Some(end));
                    end
                };
                self.mount_children(new.nodes(), container, Some(end));
            }
            Some(prev) => {
                new.el.set(prev.el.get());
                new.anchor.set(prev.anchor.get());
                self.patch_children(prev, new, container, prev.anchor.get());
            }
        }
    }

    fn process_element(
        &self,
        old: Option<&VNode>,
        new: &VNode,
        tag: &str,
        container: NodeHandle,
        anchor: Option<NodeHandle>,
    ) {
        match old {
            None => self.mount_element(new, tag, container, anchor),
            Some(prev) => {
                let Some(el) = prev.el.get() else {
                    warn!(tag, "patching an element that was never mounted");
                    return;
                };
                new.el.set(Some(el));
                self.patch_props(el, &prev.props, &new.props);
                self.patch_children(prev, new, el, None);
            }
        }
    }

    fn mount_element(&self, vnode: &VNode, tag: &str, container: NodeHandle, anchor: Option<NodeHandle>) {
        let el = {
            let mut host = self.inner.host.borrow_mut();
            let el = host.create_element(tag);
            for (key, value) in vnode.props.iter().filter(|(key, _)| *key != "key") {
                host.patch_prop(el, key, None, Some(value));
            }
            if vnode.shape.contains(ShapeFlags::TEXT_CHILDREN) {
                host.set_element_text(el, Self::text_of(vnode));
            }
            el
        };
        vnode.el.set(Some(el));
        if vnode.shape.contains(ShapeFlags::ARRAY_CHILDREN) {
            self.mount_children(vnode.nodes(), el, None);
        }
        self.inner.host.borrow_mut().insert(el, container, anchor);
    }

    fn patch_props(&self, el: NodeHandle, old: &Props, new: &Props) {
        let mut host = self.inner.host.borrow_mut();
        for (key, prev) in old {
            if key != "key" && !new.contains_key(key) {
                host.patch_prop(el, key, Some(prev), None);
            }
        }
        for (key, next) in new {
            if key == "key" {
                continue;
            }
            let prev = old.get(key);
            // `value` can drift from what was rendered, so it is always
            // handed to the host.
            let changed = key == "value" || prev.map_or(true, |prev| !prev.strict_eq(next));
            if changed {
                host.patch_prop(el, key, prev, Some(next));
            }
        }
    }

    fn mount_children(&self, children: &[VNode], container: NodeHandle, anchor: Option<NodeHandle>) {
        for child in children {
            self.patch(None, child, container, anchor);
        }
    }

    fn unmount_children(&self, children: &[VNode]) {
        for child in children {
            self.unmount_node(child, true);
        }
    }

    /// Children diff, dispatched on the shape of both sides.
    fn patch_children(&self, old: &VNode, new: &VNode, container: NodeHandle, anchor: Option<NodeHandle>) {
        let (prev_shape, shape) = (old.shape, new.shape);

        if shape.contains(ShapeFlags::TEXT_CHILDREN) {
            if prev_shape.contains(ShapeFlags::ARRAY_CHILDREN) {
                self.unmount_children(old.nodes());
            }
            let text = Self::text_of(new);
            if !prev_shape.contains(ShapeFlags::TEXT_CHILDREN) || Self::text_of(old) != text {
                self.inner.host.borrow_mut().set_element_text(container, text);
            }
        } else if prev_shape.contains(ShapeFlags::ARRAY_CHILDREN) {
            if shape.contains(ShapeFlags::ARRAY_CHILDREN) {
                self.patch_keyed_children(old.nodes(), new.nodes(), container, anchor);
            } else {
                self.unmount_children(old.nodes());
            }
        } else {
            if prev_shape.contains(ShapeFlags::TEXT_CHILDREN) {
                self.inner.host.borrow_mut().set_element_text(container, "");
            }
            if shape.contains(ShapeFlags::ARRAY_CHILDREN) {
                self.mount_children(new.nodes(), container, anchor);
            }
        }
    }

    fn patch_keyed_children(&self, c1: &[VNode], c2: &[VNode], container: NodeHandle, parent_anchor: Option<NodeHandle>) {
        let mut i = 0usize;
        let mut e1 = c1.len() as isize - 1;
        let mut e2 = c2.len() as isize - 1;

        // 1. common prefix
        while (i as isize) <= e1 && (i as isize) <= e2 {
            let (prev, next) = (&c1[i], &c2[i]);
            if !prev.is_same_type(next) {
                break;
            }
            self.patch(Some(prev), next, container, None);
            i += 1;
        }

        // 2. common suffix
        while (i as isize) <= e1 && (i as isize) <= e2 {
            let (prev, next) = (&c1[e1 as usize], &c2[e2 as usize]);
            if !prev.is_same_type(next) {
                break;
            }
            self.patch(Some(prev), next, container, None);
            e1 -= 1;
            e2 -= 1;
        }

        // 3. only new nodes left
        if (i as isize) > e1 {
            if (i as isize) <= e2 {
                let next_pos = (e2 + 1) as usize;
                let anchor = self.anchor_at(c2, next_pos, parent_anchor);
                for next in &c2[i..=e2 as usize] {
                    self.patch(None, next, container, anchor);
                }
            }
            return;
        }

        // 4. only old nodes left
        if (i as isize) > e2 {
            for prev in &c1[i..=e1 as usize] {
                self.unmount_node(prev, true);
            }
            return;
        }

        // 5. unknown sequence
        let (s1, s2) = (i, i);
        let (e1, e2) = (e1 as usize, e2 as usize);

        let mut key_to_new_index: HashMap<&NodeKey, usize> = HashMap::new();
        for (index, next) in c2.iter().enumerate().take(e2 + 1).skip(s2) {
            if let Some(key) = next.key() {
                if key_to_new_index.insert(key, index).is_some() && self.inner.config.warn_duplicate_keys {
                    warn!(%key, "duplicate key among siblings");
                }
            }
        }

        let to_be_patched = e2 - s2 + 1;
        let mut patched = 0usize;
        let mut moved = false;
        let mut max_new_index_so_far = 0usize;
        // new index (relative to s2) -> old index + 1, 0 meaning "new"
        let mut new_index_to_old_index = vec![0usize; to_be_patched];

        for (old_index, prev) in c1.iter().enumerate().take(e1 + 1).skip(s1) {
            if patched >= to_be_patched {
                // every new node already has a match
                self.unmount_node(prev, true);
                continue;
            }

            let new_index = match prev.key() {
                Some(key) => key_to_new_index.get(key).copied(),
                None => (s2..=e2).find(|&j| {
                    new_index_to_old_index[j - s2] == 0 && c2[j].key().is_none() && prev.is_same_type(&c2[j])
                }),
            };

            match new_index {
                Some(j) if new_index_to_old_index[j - s2] == 0 => {
                    new_index_to_old_index[j - s2] = old_index + 1;
                    if j >= max_new_index_so_far {
                        max_new_index_so_far = j;
                    } else {
                        moved = true;
                    }
                    self.patch(Some(prev), &c2[j], container, None);
                    patched += 1;
                }
                _ => self.unmount_node(prev, true),
            }
        }

        let stable = if moved {
            longest_increasing_subsequence(&new_index_to_old_index)
        } else {
            Vec::new()
        };
        trace!(to_be_patched, patched, moved, stable = stable.len(), "keyed diff");

        let mut j = stable.len();
        for k in (0..to_be_patched).rev() {
            let index = s2 + k;
            let next = &c2[index];
            let anchor = self.anchor_at(c2, index + 1, parent_anchor);
            if new_index_to_old_index[k] == 0 {
                self.patch(None, next, container, anchor);
            } else if moved {
                if j > 0 && stable[j - 1] == k {
                    j -= 1;
                } else {
                    self.move_node(next, container, anchor);
                }
            }
        }
    }

    /// Host node of `children[index]`, or `fallback` past the end.
    fn anchor_at(&self, children: &[VNode], index: usize, fallback: Option<NodeHandle>) -> Option<NodeHandle> {
        match children.get(index) {
            Some(node) => node.host_el(),
            None => fallback,
        }
    }

    fn next_host_node(&self, vnode: &VNode) -> Option<NodeHandle> {
        let last = vnode.last_host_el()?;
        self.inner.host.borrow().next_sibling(last)
    }

    fn move_node(&self, vnode: &VNode, container: NodeHandle, anchor: Option<NodeHandle>) {
        if vnode.shape.contains(ShapeFlags::STATEFUL_COMPONENT) {
            let instance = vnode.component.borrow().clone();
            if let Some(instance) = instance {
                if let Some(sub_tree) = &*instance.sub_tree.borrow() {
                    self.move_node(sub_tree, container, anchor);
                }
            }
            return;
        }
        match &vnode.kind {
            VNodeType::Fragment => {
                if let Some(start) = vnode.el.get() {
                    self.inner.host.borrow_mut().insert(start, container, anchor);
                }
                for child in vnode.nodes() {
                    self.move_node(child, container, anchor);
                }
                if let Some(end) = vnode.anchor.get() {
                    self.inner.host.borrow_mut().insert(end, container, anchor);
                }
            }
            _ => {
                if let Some(el) = vnode.el.get() {
                    self.inner.host.borrow_mut().insert(el, container, anchor);
                }
            }
        }
    }

    /// Tear down `vnode`. Host nodes are removed only when `remove` is set;
    /// descendants of a removed element go with it.
    fn unmount_node(&self, vnode: &VNode, remove: bool) {
        if vnode.shape.contains(ShapeFlags::STATEFUL_COMPONENT) {
            let instance = vnode.component.borrow_mut().take();
            if let Some(instance) = instance {
                debug!(component = instance.name(), "unmounting component");
                instance.stop();
                let sub_tree = instance.sub_tree.borrow_mut().take();
                if let Some(sub_tree) = sub_tree {
                    self.unmount_node(&sub_tree, remove);
                }
                instance.mounted.set(false);
            }
            return;
        }
        match &vnode.kind {
            VNodeType::Fragment => {
                for child in vnode.nodes() {
                    self.unmount_node(child, remove);
                }
                if remove {
                    let mut host = self.inner.host.borrow_mut();
                    for el in [vnode.el.get(), vnode.anchor.get()].into_iter().flatten() {
                        host.remove(el);
                    }
                }
            }
            _ => {
                if vnode.shape.contains(ShapeFlags::ARRAY_CHILDREN) {
                    for child in vnode.nodes() {
                        self.unmount_node(child, false);
                    }
                }
                if remove {
                    if let Some(el) = vnode.el.get() {
                        self.inner.host.borrow_mut().remove(el);
                    }
                }
            }
        }
    }

    fn mount_component(&self, def: &Rc<ComponentDef>, vnode: &VNode, container: NodeHandle, anchor: Option<NodeHandle>) {
        debug!(component = def.name(), "mounting component");
        let instance = Rc::new(ComponentInstance::new(def.clone(), &vnode.props));
        instance.container.set(Some(container));
        instance.anchor.set(anchor);
        *vnode.component.borrow_mut() = Some(instance.clone());
        self.setup_render_effect(&instance);
    }

    /// Give `instance` a render effect owned by its scope. Triggers queue the
    /// instance's update job instead of re-rendering in place.
    fn setup_render_effect(&self, instance: &Rc<ComponentInstance>) {
        let weak_instance: Weak<ComponentInstance> = Rc::downgrade(instance);
        let weak_renderer: Weak<RendererInner<H>> = Rc::downgrade(&self.inner);

        let job = {
            let weak_instance = weak_instance.clone();
            Job::new(move || {
                if let Some(instance) = weak_instance.upgrade() {
                    if let Some(effect) = instance.effect.get().filter(|e| e.is_active()) {
                        effect.run();
                    }
                }
            })
        };
        let fresh = instance.job.set(job.clone()).is_ok();
        debug_assert!(fresh, "render job installed twice");

        let body = move || {
            let (Some(instance), Some(inner)) = (weak_instance.upgrade(), weak_renderer.upgrade()) else {
                return;
            };
            Renderer { inner }.render_component(&instance);
        };
        let options = EffectOptions::default().scheduler(move || queue_job(job.clone())).lazy();

        let Some(effect) = instance.scope.run(|| effect_with(body, options)) else {
            warn!(component = instance.name(), "component scope stopped before mount");
            return;
        };
        let fresh = instance.effect.set(effect.clone()).is_ok();
        debug_assert!(fresh, "render effect installed twice");
        effect.run();
    }

    /// Render the component and patch the result against its last subtree.
    fn render_component(&self, instance: &ComponentInstance) {
        let next = instance.render();
        let prev = instance.sub_tree.borrow_mut().take();

        untracked(|| match &prev {
            None => {
                let Some(container) = instance.container.get() else {
                    warn!(component = instance.name(), "component has no container");
                    return;
                };
                self.patch(None, &next, container, instance.anchor.get());
                instance.mounted.set(true);
                trace!(component = instance.name(), "component mounted");
            }
            Some(prev) => {
                let container = prev
                    .host_el()
                    .and_then(|el| self.inner.host.borrow().parent_node(el))
                    .or(instance.container.get());
                let Some(container) = container else {
                    return;
                };
                let anchor = self.next_host_node(prev);
                self.patch(Some(prev), &next, container, anchor);
                trace!(component = instance.name(), "component updated");
            }
        });

        *instance.sub_tree.borrow_mut() = Some(next);
    }

    /// Carry the instance over to the new vnode and re-render it right away
    /// if its props changed.
    fn update_component(&self, old: &VNode, new: &VNode) {
        let instance = old.component.borrow_mut().take();
        let Some(instance) = instance else {
            warn!("updating a component that was never mounted");
            return;
        };
        *new.component.borrow_mut() = Some(instance.clone());

        if instance.update_props(&new.props) {
            instance.update();
        }
    }
}

impl<H> fmt::Debug for Renderer<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.inner.config)
            .field("roots", &self.inner.roots.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::flush_jobs;
    use crate::props;
    use crate::reactive::{reactive, Value};
    use crate::render::{comment, component, fragment, h, text, HostOp, MemoryHost};
    use serde_json::json;

    fn setup() -> (Renderer<MemoryHost>, NodeHandle) {
        let renderer = Renderer::new(MemoryHost::new());
        let root = renderer.with_host(|host| host.create_root());
        (renderer, root)
    }

    fn markup(renderer: &Renderer<MemoryHost>, root: NodeHandle) -> String {
        renderer.host().inner_markup(root)
    }

    fn list(keys: &[&str]) -> VNode {
        h(
            "ul",
            props! {},
            keys.iter()
                .map(|k| h("li", props! { "key" => *k }, *k))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn mounts_elements_text_and_comments() {
        let (renderer, root) = setup();
        renderer.render(
            Some(h(
                "div",
                props! { "id" => "app" },
                vec![text("hi"), comment("c"), h("b", props! {}, "bold")],
            )),
            root,
        );
        assert_eq!(markup(&renderer, root), "<div id=\"app\">hi<!--c--><b>bold</b></div>");
    }

    #[test]
    fn patches_props_and_text() {
        let (renderer, root) = setup();
        renderer.render(Some(h("p", props! { "a" => 1, "b" => 2 }, "x")), root);
        renderer.with_host(|host| host.take_ops());

        renderer.render(Some(h("p", props! { "a" => 1, "c" => 3 }, "y")), root);
        assert_eq!(markup(&renderer, root), "<p a=\"1\" c=\"3\">y</p>");

        let host = renderer.host();
        let patched: Vec<_> = host
            .ops()
            .iter()
            .filter_map(|op| match op {
                HostOp::PatchProp { key, .. } => Some(key.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(patched, vec!["b", "c"]);
    }

    #[test]
    fn value_prop_is_always_patched() {
        let (renderer, root) = setup();
        renderer.render(Some(h("input", props! { "value" => "a" }, ())), root);
        renderer.with_host(|host| host.take_ops());

        renderer.render(Some(h("input", props! { "value" => "a" }, ())), root);
        assert_eq!(renderer.host().count_ops(|op| matches!(op, HostOp::PatchProp { .. })), 1);
    }

    #[test]
    fn same_tree_creates_nothing() {
        let (renderer, root) = setup();
        renderer.render(Some(list(&["a", "b", "c"])), root);
        renderer.with_host(|host| host.take_ops());

        renderer.render(Some(list(&["a", "b", "c"])), root);
        assert!(renderer.host().ops().is_empty());
    }

    #[test]
    fn type_change_replaces_in_place() {
        let (renderer, root) = setup();
        renderer.render(Some(h("div", props! {}, vec![h("a", props! {}, ()), h("b", props! {}, ())])), root);
        renderer.render(Some(h("div", props! {}, vec![h("i", props! {}, ()), h("b", props! {}, ())])), root);
        assert_eq!(markup(&renderer, root), "<div><i></i><b></b></div>");
    }

    #[test]
    fn children_switch_between_text_and_nodes() {
        let (renderer, root) = setup();
        renderer.render(Some(h("div", props! {}, "t")), root);
        renderer.render(Some(h("div", props! {}, vec![h("b", props! {}, ())])), root);
        assert_eq!(markup(&renderer, root), "<div><b></b></div>");

        renderer.render(Some(h("div", props! {}, "u")), root);
        assert_eq!(markup(&renderer, root), "<div>u</div>");

        renderer.render(Some(h("div", props! {}, ())), root);
        assert_eq!(markup(&renderer, root), "<div></div>");
    }

    #[test]
    fn unchanged_text_children_skip_the_host() {
        let (renderer, root) = setup();
        renderer.render(Some(h("div", props! {}, "same")), root);
        renderer.with_host(|host| host.take_ops());

        renderer.render(Some(h("div", props! {}, "same")), root);
        assert_eq!(renderer.host().count_ops(|op| matches!(op, HostOp::SetElementText { .. })), 0);

        renderer.render(Some(h("div", props! {}, "changed")), root);
        assert_eq!(renderer.host().count_ops(|op| matches!(op, HostOp::SetElementText { .. })), 1);
        assert_eq!(markup(&renderer, root), "<div>changed</div>");
    }

    #[test]
    fn keyed_reorder_moves_minimum() {
        let (renderer, root) = setup();
        renderer.render(Some(list(&["a", "b", "c", "d"])), root);
        renderer.with_host(|host| host.take_ops());

        renderer.render(Some(list(&["d", "a", "b", "c"])), root);
        assert_eq!(
            markup(&renderer, root),
            "<ul><li>d</li><li>a</li><li>b</li><li>c</li></ul>"
        );
        assert_eq!(renderer.host().count_ops(|op| matches!(op, HostOp::Insert { .. })), 1);
    }

    #[test]
    fn removes_and_adds_at_the_ends() {
        let (renderer, root) = setup();
        renderer.render(Some(list(&["a", "b", "c"])), root);
        renderer.render(Some(list(&["a", "c"])), root);
        assert_eq!(markup(&renderer, root), "<ul><li>a</li><li>c</li></ul>");

        renderer.render(Some(list(&["z", "a", "c", "d"])), root);
        assert_eq!(
            markup(&renderer, root),
            "<ul><li>z</li><li>a</li><li>c</li><li>d</li></ul>"
        );
    }

    #[test]
    fn fragments_mount_between_anchors_and_unmount_cleanly() {
        let (renderer, root) = setup();
        let baseline = renderer.host().node_count();

        renderer.render(Some(fragment(vec![text("a"), text("b")])), root);
        assert_eq!(markup(&renderer, root), "ab");

        renderer.render(Some(fragment(vec![text("a"), text("b"), text("c")])), root);
        assert_eq!(markup(&renderer, root), "abc");

        renderer.render(None, root);
        assert_eq!(markup(&renderer, root), "");
        assert_eq!(renderer.host().node_count(), baseline);
    }

    #[test]
    fn component_renders_and_updates_on_flush() {
        let (renderer, root) = setup();
        let def = ComponentDef::new("Counter", |this| h("span", props! {}, this.get("count").to_string()))
            .data(|_| Value::from(json!({ "count": 0 })))
            .build();

        renderer.render(Some(component(&def, props! {})), root);
        assert_eq!(markup(&renderer, root), "<span>0</span>");

        let proxy = renderer.with_root(root, VNode::component_proxy).flatten().unwrap();
        proxy.set("count", 1);
        proxy.set("count", 2);
        assert_eq!(markup(&renderer, root), "<span>0</span>");

        assert_eq!(flush_jobs(), Ok(1));
        assert_eq!(markup(&renderer, root), "<span>2</span>");
    }

    #[test]
    fn parent_props_rerender_child_synchronously() {
        let (renderer, root) = setup();
        let child = ComponentDef::new("Label", |this| h("b", props! {}, this.get("text").to_string()))
            .prop("text")
            .build();

        renderer.render(Some(h("div", props! {}, component(&child, props! { "text" => "one" }))), root);
        renderer.render(Some(h("div", props! {}, component(&child, props! { "text" => "two" }))), root);

        assert_eq!(markup(&renderer, root), "<div><b>two</b></div>");
        assert_eq!(flush_jobs(), Ok(0));
    }

    #[test]
    fn unmounted_component_stops_reacting() {
        let (renderer, root) = setup();
        let state = reactive(Value::from(json!({ "n": 1 })));
        let s = state.clone();
        let def = ComponentDef::new("View", move |_| text(s.get("n").to_string())).build();

        renderer.render(Some(component(&def, props! {})), root);
        assert_eq!(markup(&renderer, root), "1");

        renderer.render(None, root);
        state.set("n", 2);
        assert_eq!(flush_jobs(), Ok(0));
        assert_eq!(markup(&renderer, root), "");
    }
}
