//! Reactive Proxy Layer
//!
//! A [`Reactive`] is an observed view over a raw [`Object`]. Reads through the
//! view register dependencies, writes through it trigger them.
//!
//! # How Wrapping Works
//!
//! 1. `reactive(object)` looks the object up in a per-thread identity cache,
//!    keyed by object id and wrapping mode. Wrapping the same object twice in
//!    the same mode returns the same view, so views can be compared by
//!    identity.
//!
//! 2. Every operation on the view dispatches to a [`Handler`] chosen from the
//!    object's container kind: plain objects, arrays, and Map/Set each have
//!    their own handler.
//!
//! 3. Deep views wrap nested structured values on the way out, inheriting
//!    the parent's read-only flag. Shallow views return nested values as
//!    stored.
//!
//! 4. Read-only views never track reads (their data cannot change through
//!    them) and reject writes: the rejection is logged and reported as
//!    success, and nothing is mutated.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use super::ids::ObjectId;
use super::store::{self, DepKey, TriggerOp};
use super::value::{Container, ContainerKind, Object, Value};
use crate::config;

/// Wrapping mode of a [`Reactive`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ProxyMode {
    /// Nested structured values are returned unwrapped.
    pub shallow: bool,
    /// Writes are rejected and reads are not tracked.
    pub readonly: bool,
}

impl ProxyMode {
    pub const REACTIVE: ProxyMode = ProxyMode {
        shallow: false,
        readonly: false,
    };
    pub const SHALLOW: ProxyMode = ProxyMode {
        shallow: true,
        readonly: false,
    };
    pub const READONLY: ProxyMode = ProxyMode {
        shallow: false,
        readonly: true,
    };
    pub const SHALLOW_READONLY: ProxyMode = ProxyMode {
        shallow: true,
        readonly: true,
    };
}

/// Property key of a plain object or array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropKey {
    Name(Rc<str>),
    Index(usize),
}

impl PropKey {
    /// The name form of this key.
    pub fn name(&self) -> Rc<str> {
        match self {
            PropKey::Name(name) => name.clone(),
            PropKey::Index(index) => index.to_string().into(),
        }
    }

    /// The key as a collection entry key.
    pub(crate) fn to_value(&self) -> Value {
        match self {
            PropKey::Name(name) => Value::Str(name.clone()),
            PropKey::Index(index) => Value::from(*index),
        }
    }
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropKey::Name(name) => f.write_str(name),
            PropKey::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for PropKey {
    fn from(name: &str) -> Self {
        PropKey::Name(name.into())
    }
}

impl From<String> for PropKey {
    fn from(name: String) -> Self {
        PropKey::Name(name.into())
    }
}

impl From<Rc<str>> for PropKey {
    fn from(name: Rc<str>) -> Self {
        PropKey::Name(name)
    }
}

impl From<usize> for PropKey {
    fn from(index: usize) -> Self {
        PropKey::Index(index)
    }
}

/// Negative numbers are not indices; they become names like `"-1"`.
impl From<i32> for PropKey {
    fn from(index: i32) -> Self {
        match usize::try_from(index) {
            Ok(index) => PropKey::Index(index),
            Err(_) => PropKey::Name(index.to_string().into()),
        }
    }
}

/// Per-kind strategy behind a [`Reactive`].
///
/// `set` takes the receiver separately from the view whose handler runs:
/// a write to a key inherited through a prototype is delegated to the
/// prototype's handler, but it lands on (and is reported by) the receiver.
pub(crate) trait Handler {
    fn get(&self, proxy: &Reactive, key: &PropKey) -> Value;
    fn set(&self, proxy: &Reactive, key: &PropKey, value: Value, receiver: &Reactive) -> bool;
    fn has(&self, proxy: &Reactive, key: &PropKey) -> bool;
    fn own_keys(&self, proxy: &Reactive) -> Vec<PropKey>;
    fn delete(&self, proxy: &Reactive, key: &PropKey) -> bool;
}

struct ProxyInner {
    target: Object,
    mode: ProxyMode,
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        let key = (self.target.id(), self.mode);
        let _ = PROXY_CACHE.try_with(|cache| {
            if let Ok(mut cache) = cache.try_borrow_mut() {
                cache.remove(&key);
            }
        });
    }
}

thread_local! {
    static PROXY_CACHE: RefCell<HashMap<(ObjectId, ProxyMode), Weak<ProxyInner>>> =
        RefCell::new(HashMap::new());
}

/// An observed view over an [`Object`].
///
/// Cloning a `Reactive` clones the handle; equality is identity.
#[derive(Clone)]
pub struct Reactive(Rc<ProxyInner>);

impl Reactive {
    /// Wrap `target` in the given mode, reusing a cached view if one is alive.
    pub fn with_mode(target: Object, mode: ProxyMode) -> Reactive {
        let key = (target.id(), mode);
        let cached = PROXY_CACHE.with(|cache| cache.borrow().get(&key).and_then(Weak::upgrade));
        if let Some(inner) = cached {
            return Reactive(inner);
        }

        let inner = Rc::new(ProxyInner { target, mode });
        PROXY_CACHE.with(|cache| {
            cache.borrow_mut().insert(key, Rc::downgrade(&inner));
        });
        Reactive(inner)
    }

    /// The backing object. Reading through it is never tracked.
    pub fn raw(&self) -> Object {
        self.0.target.clone()
    }

    pub fn mode(&self) -> ProxyMode {
        self.0.mode
    }

    pub fn is_readonly(&self) -> bool {
        self.0.mode.readonly
    }

    pub fn is_shallow(&self) -> bool {
        self.0.mode.shallow
    }

    pub fn kind(&self) -> ContainerKind {
        self.0.target.kind()
    }

    pub fn id(&self) -> ObjectId {
        self.0.target.id()
    }

    /// Read-only view over the same object.
    pub fn to_readonly(&self) -> Reactive {
        let mode = ProxyMode {
            readonly: true,
            ..self.mode()
        };
        Reactive::with_mode(self.raw(), mode)
    }

    pub(crate) fn ptr_id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn handler(&self) -> &'static dyn Handler {
        match self.kind() {
            ContainerKind::Plain => &ObjectHandler,
            ContainerKind::Array => &super::array::ArrayHandler,
            ContainerKind::Map | ContainerKind::Set => &super::collections::CollectionHandler,
        }
    }

    /// Read `key`, tracking it.
    pub fn get(&self, key: impl Into<PropKey>) -> Value {
        self.handler().get(self, &key.into())
    }

    /// Write `key`. Returns `false` only when the key cannot hold a value
    /// (a non-index name on an array).
    pub fn set(&self, key: impl Into<PropKey>, value: impl Into<Value>) -> bool {
        self.handler().set(self, &key.into(), value.into(), self)
    }

    /// Whether `key` exists (own or inherited), tracking it.
    pub fn has(&self, key: impl Into<PropKey>) -> bool {
        self.handler().has(self, &key.into())
    }

    /// Own keys in order, tracking iteration.
    pub fn own_keys(&self) -> Vec<PropKey> {
        self.handler().own_keys(self)
    }

    /// Remove `key`.
    pub fn delete(&self, key: impl Into<PropKey>) -> bool {
        self.handler().delete(self, &key.into())
    }

    /// Track `key` on the backing object unless this view is read-only.
    pub(crate) fn track(&self, key: DepKey) {
        if !self.is_readonly() {
            store::track(self.id(), key);
        }
    }

    pub(crate) fn trigger(&self, key: DepKey, op: TriggerOp, new_value: Option<&Value>) {
        store::trigger(self.id(), self.kind(), key, op, new_value);
    }

    /// Wrap a value read out of this view according to its mode.
    pub(crate) fn wrap(&self, value: Value) -> Value {
        match value {
            Value::Object(object) if !self.is_shallow() => {
                let mode = ProxyMode {
                    shallow: false,
                    readonly: self.is_readonly(),
                };
                Value::Reactive(Reactive::with_mode(object, mode))
            }
            other => other,
        }
    }

    /// Normalize a value about to be stored through this view.
    pub(crate) fn unwrap_incoming(&self, value: Value) -> Value {
        if self.is_shallow() {
            value
        } else {
            value.into_raw()
        }
    }

    /// Log a rejected write. Returns the success the caller reports.
    pub(crate) fn reject_write(&self, op: &str, key: &dyn fmt::Display) -> bool {
        if config::current().warn_on_readonly_write {
            tracing::warn!(object = %self.id(), %key, op, "write rejected: target is readonly");
        }
        true
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Reactive {}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("target", &self.0.target)
            .field("shallow", &self.0.mode.shallow)
            .field("readonly", &self.0.mode.readonly)
            .finish()
    }
}

/// Deep, mutable view.
pub fn reactive(target: Object) -> Reactive {
    Reactive::with_mode(target, ProxyMode::REACTIVE)
}

/// Mutable view that does not wrap nested values.
pub fn shallow_reactive(target: Object) -> Reactive {
    Reactive::with_mode(target, ProxyMode::SHALLOW)
}

/// Deep, read-only view.
pub fn readonly(target: Object) -> Reactive {
    Reactive::with_mode(target, ProxyMode::READONLY)
}

/// Read-only view that does not wrap nested values.
pub fn shallow_readonly(target: Object) -> Reactive {
    Reactive::with_mode(target, ProxyMode::SHALLOW_READONLY)
}

pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Reactive(_))
}

pub fn is_readonly(value: &Value) -> bool {
    value.as_reactive().is_some_and(Reactive::is_readonly)
}

/// Strip any reactive view.
pub fn to_raw(value: Value) -> Value {
    value.into_raw()
}

// ----------------------------------------------------------------------------
// Plain objects
// ----------------------------------------------------------------------------

pub(crate) struct ObjectHandler;

impl Handler for ObjectHandler {
    fn get(&self, proxy: &Reactive, key: &PropKey) -> Value {
        let name = key.name();
        proxy.track(DepKey::Field(name.clone()));

        let target = proxy.raw();
        match target.own_field(&name) {
            Some(value) => proxy.wrap(value),
            None => match target.prototype() {
                Some(prototype) => Reactive::with_mode(prototype, proxy.mode()).get(key.clone()),
                None => Value::Undefined,
            },
        }
    }

    fn set(&self, proxy: &Reactive, key: &PropKey, value: Value, receiver: &Reactive) -> bool {
        if proxy.is_readonly() {
            return proxy.reject_write("set", key);
        }
        let name = key.name();
        let value = proxy.unwrap_incoming(value);
        let target = proxy.raw();
        let old = target.own_field(&name);

        let inherited = match (&old, target.prototype()) {
            (None, Some(prototype)) if prototype.has_field_in_chain(&name) => Some(prototype),
            _ => None,
        };
        match inherited {
            Some(prototype) => {
                let parent = Reactive::with_mode(prototype, proxy.mode());
                parent.handler().set(&parent, key, value.clone(), receiver);
            }
            None => {
                if let Container::Plain(fields) = &mut *receiver.raw().borrow_mut() {
                    fields.insert(name.clone(), value.clone());
                }
            }
        }

        // Writes delegated from a child view are reported by the child.
        if target.ptr_eq(&receiver.raw()) {
            match old {
                None => proxy.trigger(DepKey::Field(name), TriggerOp::Add, Some(&value)),
                Some(old) if old != value => {
                    proxy.trigger(DepKey::Field(name), TriggerOp::Set, Some(&value))
                }
                Some(_) => {}
            }
        }
        true
    }

    fn has(&self, proxy: &Reactive, key: &PropKey) -> bool {
        let name = key.name();
        store::track(proxy.id(), DepKey::Field(name.clone()));
        proxy.raw().has_field_in_chain(&name)
    }

    fn own_keys(&self, proxy: &Reactive) -> Vec<PropKey> {
        store::track(proxy.id(), DepKey::Iterate);
        match &*proxy.raw().borrow() {
            Container::Plain(fields) => fields.keys().cloned().map(PropKey::Name).collect(),
            _ => Vec::new(),
        }
    }

    fn delete(&self, proxy: &Reactive, key: &PropKey) -> bool {
        if proxy.is_readonly() {
            return proxy.reject_write("delete", key);
        }
        let name = key.name();
        let removed = match &mut *proxy.raw().borrow_mut() {
            Container::Plain(fields) => fields.shift_remove(&name).is_some(),
            _ => false,
        };
        if removed {
            proxy.trigger(DepKey::Field(name), TriggerOp::Delete, None);
        }
        true
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::effect;
    use std::cell::Cell;

    fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        (runs.clone(), runs)
    }

    #[test]
    fn wrapping_is_idempotent() {
        let object = Object::plain();
        let a = reactive(object.clone());
        let b = reactive(object.clone());
        assert_eq!(a, b);

        // Different modes get different views
        let r = readonly(object.clone());
        assert_ne!(a, r);
        assert_eq!(r, readonly(object));
        assert_eq!(a.to_readonly(), r);
    }

    #[test]
    fn nested_values_are_wrapped_once() {
        let state = reactive(Object::from_fields([(
            "child",
            Value::Object(Object::from_fields([("n", 1)])),
        )]));

        let first = state.get("child");
        let second = state.get("child");
        assert!(is_reactive(&first));
        assert_eq!(first, second);
    }

    #[test]
    fn shallow_does_not_wrap_nested() {
        let state = shallow_reactive(Object::from_fields([(
            "child",
            Value::Object(Object::plain()),
        )]));
        assert!(matches!(state.get("child"), Value::Object(_)));
    }

    #[test]
    fn readonly_rejects_writes() {
        let object = Object::from_fields([("n", 1)]);
        let view = readonly(object.clone());

        assert!(view.set("n", 2));
        assert!(view.delete("n"));
        assert_eq!(view.get("n"), Value::from(1));
        assert_eq!(object.own_field("n"), Some(Value::from(1)));
    }

    #[test]
    fn readonly_nested_is_readonly() {
        let view = readonly(Object::from_fields([(
            "child",
            Value::Object(Object::from_fields([("n", 1)])),
        )]));
        let child = view.get("child");
        assert!(is_readonly(&child));
    }

    #[test]
    fn readonly_reads_do_not_track() {
        let object = Object::from_fields([("n", 1)]);
        let view = readonly(object.clone());
        let (runs, r) = counter();

        let v = view.clone();
        let e = effect(move || {
            r.set(r.get() + 1);
            v.get("n");
        });
        assert_eq!(e.dependency_count(), 0);

        reactive(object).set("n", 2);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn writes_store_raw_values() {
        let state = reactive(Object::plain());
        let child = reactive(Object::plain());
        state.set("child", child.clone());

        let stored = state.raw().own_field("child");
        assert_eq!(stored, Some(Value::Object(child.raw())));
        assert_eq!(state.get("child"), Value::Reactive(child));
    }

    #[test]
    fn same_value_write_does_not_trigger() {
        let state = reactive(Object::from_fields([("n", Value::Number(f64::NAN))]));
        let (runs, r) = counter();

        let s = state.clone();
        let _e = effect(move || {
            r.set(r.get() + 1);
            s.get("n");
        });

        state.set("n", f64::NAN);
        assert_eq!(runs.get(), 1);

        state.set("n", 1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn has_and_own_keys_track() {
        let state = reactive(Object::from_fields([("a", 1)]));
        let (has_runs, h) = counter();
        let (keys_runs, k) = counter();

        let s = state.clone();
        let _has = effect(move || {
            h.set(h.get() + 1);
            s.has("b");
        });
        let s = state.clone();
        let _keys = effect(move || {
            k.set(k.get() + 1);
            s.own_keys();
        });

        // Existing key SET: neither `has("b")` nor iteration re-runs
        state.set("a", 2);
        assert_eq!((has_runs.get(), keys_runs.get()), (1, 1));

        // ADD of `b`: both re-run
        state.set("b", 1);
        assert_eq!((has_runs.get(), keys_runs.get()), (2, 2));

        // DELETE of `b`: both re-run
        state.delete("b");
        assert_eq!((has_runs.get(), keys_runs.get()), (3, 3));
        assert_eq!(state.own_keys(), vec![PropKey::from("a")]);
    }

    #[test]
    fn inherited_write_triggers_once_on_child() {
        let parent_raw = Object::from_fields([("bar", 1)]);
        let child_raw = Object::plain();
        child_raw.set_prototype(Some(parent_raw.clone()));

        let parent = reactive(parent_raw.clone());
        let child = reactive(child_raw.clone());
        let (runs, r) = counter();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let c = child.clone();
        let seen_clone = seen.clone();
        let _e = effect(move || {
            r.set(r.get() + 1);
            seen_clone.borrow_mut().push(c.get("bar"));
        });
        assert_eq!(*seen.borrow(), vec![Value::from(1)]);

        // Write lands on the child, parent keeps its value
        child.set("bar", 2);
        assert_eq!(runs.get(), 2);
        assert_eq!(child_raw.own_field("bar"), Some(Value::from(2)));
        assert_eq!(parent_raw.own_field("bar"), Some(Value::from(1)));

        // Parent changes no longer matter once shadowed
        parent.set("bar", 3);
        assert_eq!(runs.get(), 2);
        assert_eq!(*seen.borrow(), vec![Value::from(1), Value::from(2)]);
    }

    #[test]
    fn inherited_read_tracks_parent() {
        let parent_raw = Object::from_fields([("bar", 1)]);
        let child_raw = Object::plain();
        child_raw.set_prototype(Some(parent_raw.clone()));

        let child = reactive(child_raw);
        let (runs, r) = counter();

        let c = child.clone();
        let _e = effect(move || {
            r.set(r.get() + 1);
            c.get("bar");
        });

        reactive(parent_raw).set("bar", 2);
        assert_eq!(runs.get(), 2);
        assert_eq!(child.get("bar"), Value::from(2));
    }

    #[test]
    fn cache_entry_released_with_view() {
        let object = Object::plain();
        let id = object.id();
        let mode = ProxyMode::REACTIVE;

        let view = reactive(object);
        assert!(PROXY_CACHE.with(|c| c.borrow().contains_key(&(id, mode))));
        drop(view);
        assert!(!PROXY_CACHE.with(|c| c.borrow().contains_key(&(id, mode))));
    }
}
