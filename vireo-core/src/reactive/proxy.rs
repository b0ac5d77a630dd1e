//! Reactive proxies.
//!
//! A [`Reactive`] wraps a [`Container`] and routes every access through the
//! dependency registry: reads call `track`, writes that changed something
//! call `trigger`. There is at most one live proxy per container; wrapping
//! the same container twice returns the same proxy.
//!
//! Nested containers are stored raw and wrapped when they are read, so deep
//! reactivity costs nothing until it is used.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use super::value::{Container, ContainerId, Key, Value};
use crate::error::Result;
use crate::graph::Registry;

thread_local! {
    static REACTIVE_MAP: RefCell<HashMap<ContainerId, Weak<ReactiveInner>>> =
        RefCell::new(HashMap::new());
}

struct ReactiveInner {
    raw: Container,
}

impl Drop for ReactiveInner {
    fn drop(&mut self) {
        let id = self.raw.id();
        let _ = REACTIVE_MAP.try_with(|map| {
            if let Ok(mut map) = map.try_borrow_mut() {
                if map.get(&id).is_some_and(|proxy| proxy.strong_count() == 0) {
                    map.remove(&id);
                }
            }
        });
    }
}

/// Observed view of a container.
#[derive(Clone)]
pub struct Reactive(Rc<ReactiveInner>);

impl Reactive {
    /// The proxy for `container`, created on first use.
    pub fn new(container: &Container) -> Self {
        let id = container.id();
        let cached = REACTIVE_MAP.with(|map| map.borrow().get(&id).and_then(Weak::upgrade));
        if let Some(inner) = cached {
            return Self(inner);
        }

        let inner = Rc::new(ReactiveInner {
            raw: container.clone(),
        });
        REACTIVE_MAP.with(|map| map.borrow_mut().insert(id, Rc::downgrade(&inner)));
        trace!(target = ?id, "created reactive proxy");
        Self(inner)
    }

    /// The wrapped container.
    pub fn raw(&self) -> Container {
        self.0.raw.clone()
    }

    pub fn id(&self) -> ContainerId {
        self.0.raw.id()
    }

    pub fn is_list(&self) -> bool {
        self.0.raw.is_list()
    }

    /// Whether two handles are the same proxy.
    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn structural_key(&self) -> Key {
        if self.is_list() {
            Key::Length
        } else {
            Key::Iterate
        }
    }

    /// Tracked read. Container results come back as proxies.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = self.0.raw.canonical_key(key.into());
        Registry::track(self.id(), &key);
        reactive(self.0.raw.get(key))
    }

    /// Write, triggering the key if the value changed.
    ///
    /// Returns false if the key cannot be written. Index writes also trigger
    /// `Length`; a new record field also triggers `Iterate`; shrinking a list
    /// through `length` triggers every index that went away.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        let raw = &self.0.raw;
        let key = raw.canonical_key(key.into());
        let value = to_raw(value.into());

        let Some(write) = raw.write(&key, value.clone()) else {
            return false;
        };
        if write.old.strict_eq(&value) {
            return true;
        }

        let id = self.id();
        Registry::trigger(id, &key);
        match &key {
            Key::Index(_) => Registry::trigger(id, &Key::Length),
            Key::Length => {
                let old_len = write.old.as_number().unwrap_or_default() as usize;
                for index in raw.len()..old_len {
                    Registry::trigger(id, &Key::Index(index));
                }
            }
            Key::Field(_) if write.added => Registry::trigger(id, &Key::Iterate),
            _ => {}
        }
        true
    }

    /// Remove a record field (or blank a list slot), triggering if it existed.
    pub fn delete(&self, key: impl Into<Key>) -> bool {
        let raw = &self.0.raw;
        let key = raw.canonical_key(key.into());
        let existed = raw.has_own(key.clone());
        let Some(old) = raw.remove(key.clone()) else {
            return false;
        };

        let id = self.id();
        if existed {
            Registry::trigger(id, &key);
            if !raw.is_list() {
                Registry::trigger(id, &Key::Iterate);
            }
        }
        drop(old);
        existed
    }

    /// Number of fields or elements. Tracks the structure, not the values.
    pub fn len(&self) -> usize {
        Registry::track(self.id(), &self.structural_key());
        self.0.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys in order. Tracks the structure.
    pub fn keys(&self) -> Vec<Key> {
        Registry::track(self.id(), &self.structural_key());
        self.0.raw.keys()
    }

    /// Every value, each read tracked.
    pub fn values(&self) -> Vec<Value> {
        self.keys().into_iter().map(|key| self.get(key)).collect()
    }

    /// Untracked existence check.
    pub fn has_own(&self, key: impl Into<Key>) -> bool {
        self.0.raw.has_own(key)
    }

    fn mutate<R>(&self, op: &'static str, f: impl FnOnce(&mut Vec<Value>) -> R) -> Result<R> {
        let result = self.0.raw.with_list(op, f)?;
        trace!(target = ?self.id(), op, "list mutation");
        Registry::trigger(self.id(), &Key::Length);
        Ok(result)
    }

    /// Append. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        let value = to_raw(value.into());
        self.mutate("push", |items| {
            items.push(value);
            items.len()
        })
    }

    /// Remove the last element.
    pub fn pop(&self) -> Result<Value> {
        self.mutate("pop", |items| items.pop().unwrap_or_default())
            .map(reactive)
    }

    /// Remove the first element.
    pub fn shift(&self) -> Result<Value> {
        self.mutate("shift", |items| {
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        })
        .map(reactive)
    }

    /// Prepend. Returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> Result<usize> {
        let value = to_raw(value.into());
        self.mutate("unshift", |items| {
            items.insert(0, value);
            items.len()
        })
    }

    /// Remove `delete_count` elements at `start` and insert `items` there.
    ///
    /// `start` and `delete_count` are clamped to the list. Returns the
    /// removed elements.
    pub fn splice<I>(&self, start: usize, delete_count: usize, items: I) -> Result<Vec<Value>>
    where
        I: IntoIterator<Item = Value>,
    {
        let inserted: Vec<Value> = items.into_iter().map(to_raw).collect();
        let removed = self.mutate("splice", |list| {
            let start = start.min(list.len());
            let end = start.saturating_add(delete_count).min(list.len());
            list.splice(start..end, inserted).collect::<Vec<_>>()
        })?;
        Ok(removed.into_iter().map(reactive).collect())
    }

    /// Sort in place with a comparator over the raw elements.
    pub fn sort_by<F>(&self, mut compare: F) -> Result<()>
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        self.mutate("sort", |items| items.sort_by(|a, b| compare(a, b)))
    }

    /// Reverse in place.
    pub fn reverse(&self) -> Result<()> {
        self.mutate("reverse", |items| items.reverse())
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reactive").field(&self.0.raw).finish()
    }
}

/// Make a value reactive.
///
/// Containers come back as their proxy; proxies and every other value come
/// back unchanged.
pub fn reactive(value: Value) -> Value {
    match value {
        Value::Container(container) => Value::Reactive(Reactive::new(&container)),
        other => other,
    }
}

/// Whether the value is a reactive proxy.
pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Reactive(_))
}

/// Strip the proxy off a value, if there is one.
pub fn to_raw(value: Value) -> Value {
    match value {
        Value::Reactive(proxy) => Value::Container(proxy.raw()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::reactive::effect;
    use serde_json::json;
    use std::cell::Cell;

    fn counting_effect(read: impl Fn() + 'static) -> Rc<Cell<usize>> {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let e = effect(move || {
            read();
            r.set(r.get() + 1);
        });
        // The effect stays alive through the deps it joined.
        drop(e);
        runs
    }

    #[test]
    fn wrapping_is_idempotent() {
        let raw = Value::from(json!({ "a": 1 }));
        let first = reactive(raw.clone());
        let second = reactive(raw);
        assert_eq!(first, second);
        assert_eq!(reactive(first.clone()), first);
        assert!(is_reactive(&first));
    }

    #[test]
    fn cache_does_not_keep_proxies_alive() {
        let raw = Container::record();
        let id = raw.id();
        drop(Reactive::new(&raw));
        assert!(REACTIVE_MAP.with(|map| !map.borrow().contains_key(&id)));
    }

    #[test]
    fn nested_containers_are_wrapped_on_read() {
        let state = reactive(Value::from(json!({ "inner": { "x": 1 } })));
        let inner = state.get("inner");
        assert!(is_reactive(&inner));
        assert_eq!(inner, state.get("inner"));
    }

    #[test]
    fn unchanged_write_does_not_trigger() {
        let state = reactive(Value::from(json!({ "a": 1 })));
        let s = state.clone();
        let runs = counting_effect(move || {
            s.get("a");
        });

        state.set("a", 1);
        assert_eq!(runs.get(), 1);
        state.set("a", 2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn index_write_triggers_length() {
        let list = reactive(Value::from(json!([1, 2, 3])));
        let proxy = list.as_reactive().cloned().unwrap();
        let p = proxy.clone();
        let runs = counting_effect(move || {
            p.len();
        });

        assert!(proxy.set(1, 20));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn new_field_triggers_iteration() {
        let state = reactive(Value::from(json!({ "a": 1 })));
        let proxy = state.as_reactive().cloned().unwrap();
        let p = proxy.clone();
        let runs = counting_effect(move || {
            p.keys();
        });

        proxy.set("a", 2);
        assert_eq!(runs.get(), 1);
        proxy.set("b", 1);
        assert_eq!(runs.get(), 2);
        proxy.delete("b");
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn list_mutators_trigger_length() {
        let list = reactive(Value::from(json!([3, 1, 2])));
        let proxy = list.as_reactive().cloned().unwrap();
        let p = proxy.clone();
        let runs = counting_effect(move || {
            p.len();
        });

        assert_eq!(proxy.push(4), Ok(4));
        assert_eq!(proxy.unshift(0), Ok(5));
        assert_eq!(proxy.pop(), Ok(Value::from(4)));
        assert_eq!(proxy.shift(), Ok(Value::from(0)));
        proxy
            .sort_by(|a, b| {
                a.as_number()
                    .partial_cmp(&b.as_number())
                    .unwrap_or(Ordering::Equal)
            })
            .unwrap();
        proxy.reverse().unwrap();
        let removed = proxy.splice(1, 1, [Value::from(9), Value::from(8)]).unwrap();

        assert_eq!(removed, vec![Value::from(2)]);
        assert_eq!(runs.get(), 8);
        assert_eq!(list.to_json(), json!([3, 9, 8, 1]));
    }

    #[test]
    fn pushed_containers_come_back_reactive() {
        let list = reactive(Value::from(json!([])));
        let proxy = list.as_reactive().cloned().unwrap();
        let item = Container::record();
        proxy.push(item.clone()).unwrap();

        let read = proxy.get(0);
        assert!(is_reactive(&read));
        assert!(read.container().is_some_and(|c| c.ptr_eq(&item)));
    }

    #[test]
    fn list_mutators_reject_records() {
        let record = reactive(Value::from(json!({})));
        let proxy = record.as_reactive().cloned().unwrap();
        assert_eq!(proxy.push(1), Err(Error::NotAList { op: "push" }));
        assert_eq!(proxy.reverse(), Err(Error::NotAList { op: "reverse" }));
    }

    #[test]
    fn to_raw_unwraps() {
        let raw = Container::record();
        let proxy = reactive(Value::from(raw.clone()));
        assert_eq!(to_raw(proxy), Value::from(raw));
        assert_eq!(to_raw(Value::from(1)), Value::from(1));
    }
}
