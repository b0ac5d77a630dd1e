//! Dynamic values and observable containers.
//!
//! [`Value`] is the dynamic value type that flows through the runtime:
//! through containers, refs, watch callbacks and vnode props. Containers
//! are identity-based: cloning a [`Container`] handle shares the storage,
//! and two containers are only ever equal if they are the same storage.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::effect::untracked;
use super::proxy::Reactive;
use super::refs::RefHandle;
use crate::error::{Error, Result};
use crate::graph::Registry;

/// Process-unique identity of a container's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(u64);

impl ContainerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A property key, as seen by the dependency registry.
///
/// `Length` and `Iterate` are the structural keys: `Length` is what list
/// iteration depends on, `Iterate` is the same for the key set of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Named field.
    Field(Rc<str>),
    /// List position.
    Index(usize),
    /// Length of a list.
    Length,
    /// Key set of a record.
    Iterate,
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Field(name.into())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Field(name.into())
    }
}

impl From<Rc<str>> for Key {
    fn from(name: Rc<str>) -> Self {
        Key::Field(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{index}"),
            Key::Length => f.write_str("length"),
            Key::Iterate => f.write_str("<iterate>"),
        }
    }
}

#[derive(Debug)]
enum ContainerData {
    Record(IndexMap<Rc<str>, Value>),
    List(Vec<Value>),
}

struct ContainerCell {
    id: ContainerId,
    data: RefCell<ContainerData>,
}

impl Drop for ContainerCell {
    fn drop(&mut self) {
        Registry::evict(self.id);
    }
}

/// Result of a raw write.
pub(crate) struct Write {
    pub(crate) old: Value,
    pub(crate) added: bool,
}

/// A shared record or list.
///
/// Reads and writes on a `Container` are raw: nothing is tracked and nothing
/// is triggered. Wrap it with [`reactive`](super::reactive) to observe it.
#[derive(Clone)]
pub struct Container(Rc<ContainerCell>);

impl Container {
    fn with_data(data: ContainerData) -> Self {
        Self(Rc::new(ContainerCell {
            id: ContainerId::new(),
            data: RefCell::new(data),
        }))
    }

    /// Create an empty record.
    pub fn record() -> Self {
        Self::with_data(ContainerData::Record(IndexMap::new()))
    }

    /// Create an empty list.
    pub fn list() -> Self {
        Self::with_data(ContainerData::List(Vec::new()))
    }

    /// Create a record from key/value pairs, keeping their order.
    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map = entries
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self::with_data(ContainerData::Record(map))
    }

    /// Create a list from values.
    pub fn from_values<V, I>(values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::with_data(ContainerData::List(
            values.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn id(&self) -> ContainerId {
        self.0.id
    }

    pub fn is_list(&self) -> bool {
        matches!(*self.0.data.borrow(), ContainerData::List(_))
    }

    /// Whether two handles share storage.
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of fields or elements.
    pub fn len(&self) -> usize {
        match &*self.0.data.borrow() {
            ContainerData::Record(map) => map.len(),
            ContainerData::List(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Normalize a key for this kind of container.
    ///
    /// On a list, `"length"` means [`Key::Length`] and numeric field names
    /// are indices. On a record every key except [`Key::Iterate`] is a
    /// field name.
    pub fn canonical_key(&self, key: Key) -> Key {
        if self.is_list() {
            match key {
                Key::Field(name) if &*name == "length" => Key::Length,
                Key::Field(name) => match name.parse::<usize>() {
                    Ok(index) => Key::Index(index),
                    Err(_) => Key::Field(name),
                },
                other => other,
            }
        } else {
            match key {
                Key::Index(index) => Key::Field(index.to_string().into()),
                Key::Length => Key::Field("length".into()),
                other => other,
            }
        }
    }

    /// Raw read. Missing entries read as [`Value::Undefined`].
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = self.canonical_key(key.into());
        match (&*self.0.data.borrow(), &key) {
            (ContainerData::Record(map), Key::Field(name)) => {
                map.get(name).cloned().unwrap_or_default()
            }
            (ContainerData::List(items), Key::Index(index)) => {
                items.get(*index).cloned().unwrap_or_default()
            }
            (ContainerData::List(items), Key::Length) => Value::Number(items.len() as f64),
            _ => Value::Undefined,
        }
    }

    /// Whether the key names an existing entry.
    pub fn has_own(&self, key: impl Into<Key>) -> bool {
        let key = self.canonical_key(key.into());
        match (&*self.0.data.borrow(), &key) {
            (ContainerData::Record(map), Key::Field(name)) => map.contains_key(name),
            (ContainerData::List(items), Key::Index(index)) => *index < items.len(),
            (ContainerData::List(_), Key::Length) => true,
            _ => false,
        }
    }

    /// Raw write. Returns false if the key cannot be written.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        let key = self.canonical_key(key.into());
        self.write(&key, value.into()).is_some()
    }

    /// Write `value` under an already canonical key.
    ///
    /// Writing past the end of a list pads it with `Undefined`. Writing
    /// `Length` truncates or pads.
    pub(crate) fn write(&self, key: &Key, value: Value) -> Option<Write> {
        let mut truncated = Vec::new();
        let write = match (&mut *self.0.data.borrow_mut(), key) {
            (ContainerData::Record(map), Key::Field(name)) => {
                let old = map.insert(name.clone(), value);
                Some(Write {
                    added: old.is_none(),
                    old: old.unwrap_or_default(),
                })
            }
            (ContainerData::List(items), Key::Index(index)) => {
                let index = *index;
                if index < items.len() {
                    let old = std::mem::replace(&mut items[index], value);
                    Some(Write { old, added: false })
                } else {
                    items.resize(index, Value::Undefined);
                    items.push(value);
                    Some(Write {
                        old: Value::Undefined,
                        added: true,
                    })
                }
            }
            (ContainerData::List(items), Key::Length) => {
                match value.as_number().filter(|n| *n >= 0.0 && n.fract() == 0.0) {
                    Some(len) => {
                        let len = len as usize;
                        let old = Value::Number(items.len() as f64);
                        if len < items.len() {
                            truncated = items.split_off(len);
                        } else {
                            items.resize(len, Value::Undefined);
                        }
                        Some(Write { old, added: false })
                    }
                    None => None,
                }
            }
            _ => None,
        };
        // Truncated values are released after the storage borrow ends.
        drop(truncated);
        write
    }

    /// Remove an entry. Removing a list index leaves `Undefined` in its place.
    pub fn remove(&self, key: impl Into<Key>) -> Option<Value> {
        let key = self.canonical_key(key.into());
        let mut data = self.0.data.borrow_mut();
        match (&mut *data, &key) {
            (ContainerData::Record(map), Key::Field(name)) => map.shift_remove(name),
            (ContainerData::List(items), Key::Index(index)) => items
                .get_mut(*index)
                .map(std::mem::take),
            _ => None,
        }
    }

    /// Keys in order: field names for a record, indices for a list.
    pub fn keys(&self) -> Vec<Key> {
        match &*self.0.data.borrow() {
            ContainerData::Record(map) => map.keys().map(|name| Key::Field(name.clone())).collect(),
            ContainerData::List(items) => (0..items.len()).map(Key::Index).collect(),
        }
    }

    /// Values in order.
    pub fn values(&self) -> Vec<Value> {
        match &*self.0.data.borrow() {
            ContainerData::Record(map) => map.values().cloned().collect(),
            ContainerData::List(items) => items.clone(),
        }
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let old = {
            let mut data = self.0.data.borrow_mut();
            match &mut *data {
                ContainerData::Record(map) => std::mem::take(map).into_values().collect(),
                ContainerData::List(items) => std::mem::take(items),
            }
        };
        drop::<Vec<Value>>(old);
    }

    /// Append to a list. Returns false on a record.
    pub fn push(&self, value: impl Into<Value>) -> bool {
        self.with_list("push", |items| items.push(value.into())).is_ok()
    }

    /// Run `f` on the list storage.
    pub(crate) fn with_list<R>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Vec<Value>) -> R,
    ) -> Result<R> {
        match &mut *self.0.data.borrow_mut() {
            ContainerData::List(items) => Ok(f(items)),
            ContainerData::Record(_) => Err(Error::NotAList { op }),
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_list() { "List" } else { "Record" };
        write!(f, "{kind}#{}", self.0.id.0)
    }
}

/// A dynamic value.
///
/// Equality is strict: primitives compare by value (`NaN` never equals
/// itself) and containers, proxies and refs compare by identity.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    /// Raw, unobserved container.
    Container(Container),
    /// Observed proxy of a container.
    Reactive(Reactive),
    /// Derived ref.
    Ref(RefHandle),
}

impl Value {
    /// Strict equality.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Container(a), Value::Container(b)) => a.ptr_eq(b),
            (Value::Reactive(a), Value::Reactive(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// `null` or `undefined`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Loose truthiness, for conditions in render code.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Container(_) | Value::Reactive(_) | Value::Ref(_) => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Value::Reactive(proxy) => Some(proxy),
            _ => None,
        }
    }

    /// The raw container, if this is one. Proxies are not unwrapped.
    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Value::Container(container) => Some(container),
            _ => None,
        }
    }

    pub fn as_ref_handle(&self) -> Option<&RefHandle> {
        match self {
            Value::Ref(handle) => Some(handle),
            _ => None,
        }
    }

    /// The underlying container of a raw container or a proxy.
    pub fn container(&self) -> Option<Container> {
        match self {
            Value::Container(container) => Some(container.clone()),
            Value::Reactive(proxy) => Some(proxy.raw()),
            _ => None,
        }
    }

    /// Read a property. Tracked through a proxy, raw on a container,
    /// `Undefined` on anything else.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        match self {
            Value::Reactive(proxy) => proxy.get(key),
            Value::Container(container) => container.get(key),
            _ => Value::Undefined,
        }
    }

    /// Write a property. Triggers through a proxy, raw on a container,
    /// returns false on anything else.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        match self {
            Value::Reactive(proxy) => proxy.set(key, value),
            Value::Container(container) => container.set(key, value),
            _ => false,
        }
    }

    /// Short type label for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Container(_) => "container",
            Value::Reactive(_) => "reactive",
            Value::Ref(_) => "ref",
        }
    }

    /// Snapshot as JSON. Untracked; refs are unwrapped; a container met again
    /// on the current path becomes `null`.
    pub fn to_json(&self) -> serde_json::Value {
        untracked(|| self.to_json_inner(&mut HashSet::new()))
    }

    fn to_json_inner(&self, path: &mut HashSet<ContainerId>) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Undefined | Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::Str(s) => Json::String(s.to_string()),
            Value::Ref(handle) => handle.get().to_json_inner(path),
            Value::Container(_) | Value::Reactive(_) => {
                let Some(container) = self.container() else {
                    return Json::Null;
                };
                if !path.insert(container.id()) {
                    return Json::Null;
                }
                let json = if container.is_list() {
                    Json::Array(
                        container
                            .values()
                            .iter()
                            .map(|value| value.to_json_inner(path))
                            .collect(),
                    )
                } else {
                    Json::Object(
                        container
                            .keys()
                            .into_iter()
                            .map(|key| {
                                let value = container.get(key.clone());
                                (key.to_string(), value.to_json_inner(path))
                            })
                            .collect(),
                    )
                };
                path.remove(&container.id());
                json
            }
        }
    }

    fn fmt_display(&self, f: &mut fmt::Formatter<'_>, seen: &mut HashSet<ContainerId>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => fmt_number(*n, f),
            Value::Str(s) => f.write_str(s),
            Value::Ref(handle) => untracked(|| handle.get()).fmt_display(f, seen),
            Value::Container(_) | Value::Reactive(_) => {
                let Some(container) = self.container() else {
                    return Ok(());
                };
                if !container.is_list() {
                    return f.write_str("[object Object]");
                }
                // A list that contains itself prints as empty, like `join`.
                if !seen.insert(container.id()) {
                    return Ok(());
                }
                for (index, item) in container.values().iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    if !item.is_nullish() {
                        item.fmt_display(f, seen)?;
                    }
                }
                seen.remove(&container.id());
                Ok(())
            }
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n == 0.0 {
        f.write_str("0")
    } else if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        write!(f, "{n:.0}")
    } else {
        write!(f, "{n}")
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Container(container) => write!(f, "Container({container:?})"),
            Value::Reactive(proxy) => write!(f, "Reactive({:?})", proxy.raw()),
            Value::Ref(handle) => write!(f, "Ref({:?})", handle.kind()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_display(f, &mut HashSet::new())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(f64, f32, i32, i64, u32, u64, usize);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<Container> for Value {
    fn from(container: Container) -> Self {
        Value::Container(container)
    }
}

impl From<Reactive> for Value {
    fn from(proxy: Reactive) -> Self {
        Value::Reactive(proxy)
    }
}

impl From<RefHandle> for Value {
    fn from(handle: RefHandle) -> Self {
        Value::Ref(handle)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
            Json::String(s) => Value::Str(s.into()),
            Json::Array(items) => Value::Container(Container::from_values(items)),
            Json::Object(map) => Value::Container(Container::from_entries(map)),
        }
    }
}
