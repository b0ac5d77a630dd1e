//! Refs: boxed values behind a uniform `get`/`set` surface.
//!
//! Four kinds share the [`DerivedRef`] capability:
//!
//! - [`Ref`] owns its value and has its own dependency set
//! - [`ObjectRef`] is a view on one property of a container and relies on
//!   that container's reactivity
//! - [`GetterRef`] re-runs a closure on every read
//! - [`Computed`](super::Computed) caches a derivation
//!
//! [`RefHandle`] erases the kind so refs can live inside containers as
//! [`Value::Ref`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::warn;

use super::effect::untracked;
use super::proxy::{reactive, to_raw};
use super::value::{Container, Key, Value};
use crate::error::{Error, Result};
use crate::graph::{track_effects, trigger_effects, Dep};

/// Which kind of ref sits behind a [`RefHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Ref,
    Object,
    Getter,
    Computed,
}

/// Shared capability of every ref kind.
pub trait DerivedRef {
    /// Current value. Reads are tracked the way the kind defines.
    fn get(&self) -> Value;

    /// Replace the value. Read-only kinds log a warning and ignore it.
    fn set(&self, value: Value);

    fn kind(&self) -> RefKind;
}

/// Type-erased, shareable ref.
///
/// Identity is per handle: clones are the same ref.
#[derive(Clone)]
pub struct RefHandle(Rc<dyn DerivedRef>);

impl RefHandle {
    pub fn new<R>(inner: R) -> Self
    where
        R: DerivedRef + 'static,
    {
        Self(Rc::new(inner))
    }

    pub fn get(&self) -> Value {
        self.0.get()
    }

    pub fn set(&self, value: impl Into<Value>) {
        self.0.set(value.into());
    }

    pub fn kind(&self) -> RefKind {
        self.0.kind()
    }

    /// Whether two handles are the same ref.
    pub fn ptr_eq(&self, other: &RefHandle) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl fmt::Debug for RefHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefHandle").field(&self.kind()).finish()
    }
}

struct RefInner {
    raw: RefCell<Value>,
    value: RefCell<Value>,
    dep: Dep,
}

/// A boxed value with its own dependency set.
///
/// Container values are stored as their reactive proxy. Writes trigger only
/// when the new raw value is strictly different from the old one.
#[derive(Clone)]
pub struct Ref(Rc<RefInner>);

impl Ref {
    pub fn new(value: impl Into<Value>) -> Self {
        let raw = to_raw(value.into());
        Self(Rc::new(RefInner {
            value: RefCell::new(reactive(raw.clone())),
            raw: RefCell::new(raw),
            dep: Dep::new(),
        }))
    }

    /// Tracked read.
    pub fn get(&self) -> Value {
        track_effects(&self.0.dep);
        self.0.value.borrow().clone()
    }

    /// Write, triggering readers if the raw value changed.
    pub fn set(&self, value: impl Into<Value>) {
        let raw = to_raw(value.into());
        if self.0.raw.borrow().strict_eq(&raw) {
            return;
        }
        let old_value = self.0.value.replace(reactive(raw.clone()));
        let old_raw = self.0.raw.replace(raw);
        trigger_effects(&self.0.dep);
        drop((old_value, old_raw));
    }

    /// Number of readers currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        self.0.dep.len()
    }
}

impl DerivedRef for Ref {
    fn get(&self) -> Value {
        Ref::get(self)
    }

    fn set(&self, value: Value) {
        Ref::set(self, value);
    }

    fn kind(&self) -> RefKind {
        RefKind::Ref
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("value", &*self.0.raw.borrow())
            .field("subscribers", &self.0.dep.len())
            .finish()
    }
}

/// A view on one property of a container or proxy.
pub struct ObjectRef {
    object: Value,
    key: Key,
    default: Value,
}

impl ObjectRef {
    pub fn new(object: Value, key: impl Into<Key>, default: Value) -> Self {
        Self {
            object,
            key: key.into(),
            default,
        }
    }
}

impl DerivedRef for ObjectRef {
    fn get(&self) -> Value {
        match self.object.get(&self.key) {
            Value::Undefined => self.default.clone(),
            value => value,
        }
    }

    fn set(&self, value: Value) {
        self.object.set(&self.key, value);
    }

    fn kind(&self) -> RefKind {
        RefKind::Object
    }
}

/// A read-only ref that calls its getter on every read.
pub struct GetterRef {
    getter: Box<dyn Fn() -> Value>,
}

impl GetterRef {
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        Self {
            getter: Box::new(getter),
        }
    }
}

impl DerivedRef for GetterRef {
    fn get(&self) -> Value {
        (self.getter)()
    }

    fn set(&self, _value: Value) {
        warn!("write to a getter ref ignored");
    }

    fn kind(&self) -> RefKind {
        RefKind::Getter
    }
}

/// Box a value in a [`Ref`]. A value that already is a ref is returned as is.
pub fn make_ref(value: impl Into<Value>) -> RefHandle {
    match value.into() {
        Value::Ref(handle) => handle,
        other => RefHandle::new(Ref::new(other)),
    }
}

/// Convert a value to a ref; same as [`make_ref`].
pub fn to_ref(value: impl Into<Value>) -> RefHandle {
    make_ref(value)
}

/// Wrap a closure as a read-only ref.
pub fn to_ref_getter<F>(getter: F) -> RefHandle
where
    F: Fn() -> Value + 'static,
{
    RefHandle::new(GetterRef::new(getter))
}

/// A ref bound to `object[key]`.
///
/// If the property already holds a ref, that ref is returned instead.
pub fn property_ref(object: &Value, key: impl Into<Key>, default: Value) -> RefHandle {
    let key = key.into();
    let current = object
        .container()
        .map(|container| container.get(key.clone()))
        .unwrap_or_default();
    match current {
        Value::Ref(handle) => handle,
        _ => RefHandle::new(ObjectRef::new(object.clone(), key, default)),
    }
}

/// A container of refs mirroring every property of `object`.
///
/// Lists map to lists and records to records. Reading a ref reads the source
/// property, so destructured values stay connected.
pub fn to_refs(object: &Value) -> Result<Value> {
    let container = object.container().ok_or(Error::NotAContainer {
        found: object.type_name(),
    })?;

    let refs = untracked(|| {
        container
            .keys()
            .into_iter()
            .map(|key| (key.clone(), property_ref(object, key, Value::Undefined)))
            .collect::<Vec<_>>()
    });

    let mirrored = if container.is_list() {
        Container::from_values(refs.into_iter().map(|(_, handle)| handle))
    } else {
        Container::from_entries(
            refs.into_iter()
                .map(|(key, handle)| (key.to_string(), handle)),
        )
    };
    Ok(Value::Container(mirrored))
}

/// Read through a ref; other values are returned unchanged.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(handle) => handle.get(),
        other => other.clone(),
    }
}

pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// Property access that unwraps refs.
#[derive(Clone, Debug)]
pub struct RefsProxy {
    target: Value,
}

impl RefsProxy {
    /// Read a property, unwrapping a ref.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        unref(&self.target.get(key))
    }

    /// Write a property. A plain value written over a ref goes into the ref.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let value = value.into();
        let current = self
            .target
            .container()
            .map(|container| container.get(key.clone()))
            .unwrap_or_default();
        match current {
            Value::Ref(handle) if !is_ref(&value) => {
                handle.set(value);
                true
            }
            _ => self.target.set(key, value),
        }
    }

    /// The wrapped object.
    pub fn target(&self) -> &Value {
        &self.target
    }
}

/// Wrap an object whose properties may hold refs.
pub fn proxy_refs(object: Value) -> RefsProxy {
    RefsProxy { target: object }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{computed, effect, is_reactive};
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn ref_triggers_on_strict_change_only() {
        let count = Ref::new(1);
        let runs = Rc::new(Cell::new(0));
        let (c, r) = (count.clone(), runs.clone());
        let _e = effect(move || {
            c.get();
            r.set(r.get() + 1);
        });

        count.set(1);
        assert_eq!(runs.get(), 1);
        count.set(2);
        assert_eq!(runs.get(), 2);
        assert_eq!(count.get(), Value::from(2));
    }

    #[test]
    fn ref_wraps_containers() {
        let raw = Container::record();
        let boxed = Ref::new(raw.clone());
        assert!(is_reactive(&boxed.get()));

        // Same raw container: no change.
        let runs = Rc::new(Cell::new(0));
        let (b, r) = (boxed.clone(), runs.clone());
        let _e = effect(move || {
            b.get();
            r.set(r.get() + 1);
        });
        boxed.set(reactive(Value::from(raw)));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn make_ref_returns_existing_refs() {
        let first = make_ref(1);
        let second = make_ref(Value::Ref(first.clone()));
        assert!(first.ptr_eq(&second));
        assert_eq!(second.kind(), RefKind::Ref);
    }

    #[test]
    fn object_ref_reads_through_and_defaults() {
        let state = reactive(Value::from(json!({ "name": "tom" })));
        let name = property_ref(&state, "name", Value::Undefined);
        let missing = property_ref(&state, "age", Value::from(18));

        assert_eq!(name.get(), Value::from("tom"));
        assert_eq!(missing.get(), Value::from(18));

        name.set("jerry");
        assert_eq!(state.get("name"), Value::from("jerry"));
        assert_eq!(name.kind(), RefKind::Object);
    }

    #[test]
    fn getter_ref_reruns_and_is_read_only() {
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let getter = to_ref_getter(move || {
            c.set(c.get() + 1);
            Value::from(c.get())
        });

        getter.get();
        getter.get();
        assert_eq!(calls.get(), 2);

        getter.set(100);
        assert_eq!(getter.get(), Value::from(3));
    }

    #[test]
    fn to_refs_keeps_destructured_values_live() {
        let state = reactive(Value::from(json!({ "first": "tom", "last": "lee" })));
        let refs = to_refs(&state).unwrap();
        let first = refs.get("first");
        assert!(is_ref(&first));

        let seen = Rc::new(RefCell::new(Vec::new()));
        let (f, s) = (first.clone(), seen.clone());
        let _e = effect(move || s.borrow_mut().push(unref(&f).to_string()));

        state.set("first", "ann");
        assert_eq!(*seen.borrow(), vec!["tom", "ann"]);
    }

    #[test]
    fn to_refs_rejects_non_containers() {
        assert_eq!(
            to_refs(&Value::from(1)),
            Err(Error::NotAContainer { found: "number" })
        );
    }

    #[test]
    fn to_refs_reuses_refs_in_place() {
        let inner = make_ref(1);
        let holder = Value::from(Container::from_entries([("n", inner.clone())]));
        let refs = to_refs(&holder).unwrap();
        let reused = refs.get("n");
        assert!(reused.as_ref_handle().is_some_and(|h| h.ptr_eq(&inner)));
    }

    #[test]
    fn proxy_refs_unwraps_and_writes_into_refs() {
        let count = make_ref(1);
        let holder = Value::from(Container::from_entries([
            ("count", Value::Ref(count.clone())),
            ("plain", Value::from("x")),
        ]));
        let view = proxy_refs(holder.clone());

        assert_eq!(view.get("count"), Value::from(1));
        assert!(view.set("count", 5));
        assert_eq!(count.get(), Value::from(5));
        assert!(is_ref(&holder.get("count")));

        // Writing a ref replaces the slot.
        let other = make_ref(9);
        assert!(view.set("count", Value::Ref(other.clone())));
        assert_eq!(view.get("count"), Value::from(9));

        assert!(view.set("plain", "y"));
        assert_eq!(view.get("plain"), Value::from("y"));
    }

    #[test]
    fn computed_is_a_ref() {
        let state = reactive(Value::from(json!({ "n": 2 })));
        let s = state.clone();
        let square = RefHandle::new(computed(move || {
            let n = s.get("n").as_number().unwrap_or_default();
            Value::from(n * n)
        }));
        assert_eq!(square.kind(), RefKind::Computed);
        assert_eq!(square.get(), Value::from(4));
        state.set("n", 3);
        assert_eq!(unref(&Value::Ref(square)), Value::from(9));
    }
}
