//! Components.
//!
//! A [`ComponentDef`] pairs an optional `data` factory with a `render`
//! function. Each mounted component vnode gets a [`ComponentInstance`]
//! holding its reactive state, an [`EffectScope`] owning its render effect,
//! and the last rendered subtree.

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{trace, warn};

use super::host::NodeHandle;
use super::vnode::{Props, VNode};
use crate::graph::{invalidate_job, Job};
use crate::reactive::{reactive, untracked, Container, EffectScope, Reactive, ReactiveEffect, Value};

type DataFn = Box<dyn Fn(&ComponentProxy) -> Value>;
type RenderFn = Box<dyn Fn(&ComponentProxy) -> VNode>;

/// A component definition.
pub struct ComponentDef {
    name: String,
    props: Vec<String>,
    data: Option<DataFn>,
    render: RenderFn,
}

impl ComponentDef {
    pub fn new<F>(name: impl Into<String>, render: F) -> Self
    where
        F: Fn(&ComponentProxy) -> VNode + 'static,
    {
        Self {
            name: name.into(),
            props: Vec::new(),
            data: None,
            render: Box::new(render),
        }
    }

    /// Declare a prop. Undeclared vnode props end up in `$attrs`.
    pub fn prop(mut self, name: impl Into<String>) -> Self {
        self.props.push(name.into());
        self
    }

    /// Set the state factory. It receives the proxy, so props are readable.
    pub fn data<F>(mut self, data: F) -> Self
    where
        F: Fn(&ComponentProxy) -> Value + 'static,
    {
        self.data = Some(Box::new(data));
        self
    }

    pub fn build(self) -> Rc<Self> {
        Rc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declares(&self, prop: &str) -> bool {
        self.props.iter().any(|p| p == prop)
    }
}

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef")
            .field("name", &self.name)
            .field("props", &self.props)
            .field("data", &self.data.is_some())
            .finish()
    }
}

struct ProxyState {
    data: RefCell<Option<Reactive>>,
    props: Reactive,
    attrs: Container,
}

/// What `data` and `render` see as the component.
///
/// Reads resolve against the state first, then props, then attrs. `$props`
/// and `$attrs` return the whole maps.
#[derive(Clone)]
pub struct ComponentProxy(Rc<ProxyState>);

impl ComponentProxy {
    fn new(props: Reactive, attrs: Container) -> Self {
        Self(Rc::new(ProxyState {
            data: RefCell::new(None),
            props,
            attrs,
        }))
    }

    fn data(&self) -> Option<Reactive> {
        self.0.data.borrow().clone()
    }

    pub fn get(&self, key: &str) -> Value {
        if let Some(data) = self.data().filter(|d| d.has_own(key)) {
            return data.get(key);
        }
        if self.0.props.has_own(key) {
            return self.0.props.get(key);
        }
        if self.0.attrs.has_own(key) {
            return self.0.attrs.get(key);
        }
        match key {
            "$props" => Value::Reactive(self.0.props.clone()),
            "$attrs" => Value::Container(self.0.attrs.clone()),
            _ => Value::Undefined,
        }
    }

    /// Write through to whichever map owns `key`. Returns `false` when none
    /// does.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        if let Some(data) = self.data().filter(|d| d.has_own(key)) {
            data.set(key, value);
            return true;
        }
        if self.0.props.has_own(key) {
            self.0.props.set(key, value);
            return true;
        }
        if self.0.attrs.has_own(key) {
            self.0.attrs.set(key, value);
            return true;
        }
        warn!(key, "write to unknown component property ignored");
        false
    }

    /// The reactive state, if the component has a `data` factory.
    pub fn state(&self) -> Option<Reactive> {
        self.data()
    }

    pub fn props(&self) -> &Reactive {
        &self.0.props
    }

    /// Attrs are not reactive.
    pub fn attrs(&self) -> &Container {
        &self.0.attrs
    }
}

impl fmt::Debug for ComponentProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentProxy")
            .field("data", &self.data().map(|d| d.id()))
            .field("props", &self.0.props.id())
            .field("attrs", &self.0.attrs)
            .finish()
    }
}

/// A mounted component.
pub(crate) struct ComponentInstance {
    def: Rc<ComponentDef>,
    proxy: ComponentProxy,
    pub(crate) scope: EffectScope,
    pub(crate) sub_tree: RefCell<Option<VNode>>,
    pub(crate) mounted: Cell<bool>,
    pub(crate) container: Cell<Option<NodeHandle>>,
    pub(crate) anchor: Cell<Option<NodeHandle>>,
    pub(crate) job: OnceCell<Job>,
    pub(crate) effect: OnceCell<ReactiveEffect>,
}

/// Split vnode props into declared props and attrs. Declared props that
/// were not passed are present as `Undefined`.
fn split_props(def: &ComponentDef, raw: &Props) -> (Container, Container) {
    let props = Container::record();
    let attrs = Container::record();
    for (key, value) in raw {
        if key == "key" {
            continue;
        }
        if def.declares(key) {
            props.set(key.as_str(), value.clone());
        } else {
            attrs.set(key.as_str(), value.clone());
        }
    }
    for declared in &def.props {
        if !props.has_own(declared.as_str()) {
            props.set(declared.as_str(), Value::Undefined);
        }
    }
    (props, attrs)
}

impl ComponentInstance {
    pub(crate) fn new(def: Rc<ComponentDef>, raw_props: &Props) -> Self {
        let (props, attrs) = split_props(&def, raw_props);
        let proxy = ComponentProxy::new(Reactive::new(&props), attrs);
        let scope = EffectScope::detached();

        if let Some(data) = &def.data {
            let state = scope.run(|| untracked(|| data(&proxy)));
            match state.map(reactive) {
                Some(Value::Reactive(state)) => *proxy.0.data.borrow_mut() = Some(state),
                Some(other) => warn!(
                    component = def.name(),
                    found = other.type_name(),
                    "data() must return a record"
                ),
                None => {}
            }
        }

        Self {
            def,
            proxy,
            scope,
            sub_tree: RefCell::new(None),
            mounted: Cell::new(false),
            container: Cell::new(None),
            anchor: Cell::new(None),
            job: OnceCell::new(),
            effect: OnceCell::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        self.def.name()
    }

    pub(crate) fn proxy(&self) -> &ComponentProxy {
        &self.proxy
    }

    /// Run the render function. Reads are tracked by the caller's effect.
    pub(crate) fn render(&self) -> VNode {
        (self.def.render)(&self.proxy)
    }

    pub(crate) fn sub_tree_host_el(&self, pick: fn(&VNode) -> Option<NodeHandle>) -> Option<NodeHandle> {
        self.sub_tree.borrow().as_ref().and_then(pick)
    }

    /// Apply props from a new parent render. Returns whether anything
    /// changed.
    ///
    /// Declared props are written through the reactive props, so the render
    /// effect gets triggered. Attrs are replaced wholesale.
    pub(crate) fn update_props(&self, raw: &Props) -> bool {
        let (next_props, next_attrs) = split_props(&self.def, raw);
        let mut changed = false;

        let props = self.proxy.props().raw();
        for key in next_props.keys() {
            let next = next_props.get(key.clone());
            if !props.get(key.clone()).strict_eq(&next) {
                self.proxy.props().set(key, next);
                changed = true;
            }
        }

        let attrs = self.proxy.attrs();
        let same_attrs = attrs.len() == next_attrs.len()
            && next_attrs
                .keys()
                .into_iter()
                .all(|key| attrs.has_own(key.clone()) && attrs.get(key.clone()).strict_eq(&next_attrs.get(key)));
        if !same_attrs {
            attrs.clear();
            for key in next_attrs.keys() {
                attrs.set(key.clone(), next_attrs.get(key));
            }
            changed = true;
        }

        trace!(component = self.name(), changed, "props updated");
        changed
    }

    /// Run the render effect now, dropping any queued run.
    pub(crate) fn update(&self) {
        if let Some(job) = self.job.get() {
            invalidate_job(job);
        }
        if let Some(effect) = self.effect.get() {
            if effect.is_active() {
                effect.run();
            }
        }
    }

    pub(crate) fn stop(&self) {
        self.scope.stop();
        if let Some(job) = self.job.get() {
            invalidate_job(job);
        }
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("name", &self.def.name())
            .field("mounted", &self.mounted.get())
            .field("scope", &self.scope)
            .finish()
    }
}
