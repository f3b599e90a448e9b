//! Refs: reactive single-value cells.
//!
//! [`Ref`] observes one owned value of any type. [`FieldRef`] points at a
//! key of a reactive object and forwards to it, so a field can be passed
//! around on its own without losing reactivity.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::ids::ObjectId;
use super::proxy::{PropKey, Reactive};
use super::store::{self, DepKey, TriggerOp};
use super::value::{ContainerKind, Value};

struct RefInner<T> {
    id: ObjectId,
    value: RefCell<T>,
}

impl<T> Drop for RefInner<T> {
    fn drop(&mut self) {
        store::forget(self.id);
    }
}

/// A reactive cell holding one value.
pub struct Ref<T> {
    inner: Rc<RefInner<T>>,
}

/// Create a [`Ref`] holding `value`.
pub fn make_ref<T: Clone + PartialEq + 'static>(value: T) -> Ref<T> {
    Ref::new(value)
}

impl<T: Clone + PartialEq + 'static> Ref<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefInner {
                id: ObjectId::next(),
                value: RefCell::new(value),
            }),
        }
    }

    /// Read the value, tracking it.
    pub fn get(&self) -> T {
        store::track(self.inner.id, DepKey::Value);
        self.inner.value.borrow().clone()
    }

    /// Read without tracking.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Replace the value. Readers re-run only if it changed.
    pub fn set(&self, value: T) {
        let changed = {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        };
        if changed {
            store::trigger(self.inner.id, ContainerKind::Plain, DepKey::Value, TriggerOp::Set, None);
        }
    }

    /// Derive the next value from the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.inner.value.borrow());
        self.set(next);
    }

    pub fn id(&self) -> ObjectId {
        self.inner.id
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.inner.id)
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}

/// A ref bound to one key of a reactive object.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldRef {
    target: Reactive,
    key: PropKey,
}

impl FieldRef {
    pub fn get(&self) -> Value {
        self.target.get(self.key.clone())
    }

    pub fn set(&self, value: impl Into<Value>) {
        self.target.set(self.key.clone(), value);
    }

    pub fn key(&self) -> &PropKey {
        &self.key
    }
}

/// Ref to `target[key]`.
pub fn to_ref(target: &Reactive, key: impl Into<PropKey>) -> FieldRef {
    FieldRef {
        target: target.clone(),
        key: key.into(),
    }
}

/// One [`FieldRef`] per own key of `target`, in key order.
pub fn to_refs(target: &Reactive) -> IndexMap<PropKey, FieldRef> {
    target
        .own_keys()
        .into_iter()
        .map(|key| (key.clone(), to_ref(target, key)))
        .collect()
}

/// One member of a [`ProxyRefs`] view.
#[derive(Clone, Debug)]
pub enum RefSlot {
    /// Forwards to a key of a reactive object.
    Field(FieldRef),
    /// Forwards to a standalone ref.
    Ref(Ref<Value>),
    /// An ordinary, untracked value.
    Plain(Value),
}

impl From<FieldRef> for RefSlot {
    fn from(field: FieldRef) -> Self {
        RefSlot::Field(field)
    }
}

impl From<Ref<Value>> for RefSlot {
    fn from(cell: Ref<Value>) -> Self {
        RefSlot::Ref(cell)
    }
}

impl From<Value> for RefSlot {
    fn from(value: Value) -> Self {
        RefSlot::Plain(value)
    }
}

/// A record whose ref members read and write as plain values.
///
/// Reading a ref member returns the ref's current value (tracked like any
/// read of the ref); writing one sets the ref. Plain members behave like
/// fields of an ordinary struct.
#[derive(Clone, Debug, Default)]
pub struct ProxyRefs {
    slots: Rc<RefCell<IndexMap<PropKey, RefSlot>>>,
}

/// Wrap `slots` so that refs among them are unwrapped on access.
///
/// ```rust,ignore
/// let state = reactive(Object::from_fields([("foo", 1)]));
/// let mut members = to_refs(&state).into_iter().map(|(k, f)| (k, RefSlot::from(f))).collect::<Vec<_>>();
/// members.push(("count".into(), make_ref(Value::from(0)).into()));
///
/// let view = proxy_refs(members);
/// assert_eq!(view.get("foo"), Value::from(1));
/// view.set("count", 5);
/// ```
pub fn proxy_refs<K, S, I>(slots: I) -> ProxyRefs
where
    K: Into<PropKey>,
    S: Into<RefSlot>,
    I: IntoIterator<Item = (K, S)>,
{
    ProxyRefs {
        slots: Rc::new(RefCell::new(
            slots
                .into_iter()
                .map(|(key, slot)| (key.into(), slot.into()))
                .collect(),
        )),
    }
}

impl ProxyRefs {
    pub fn get(&self, key: impl Into<PropKey>) -> Value {
        let slot = self.slots.borrow().get(&key.into()).cloned();
        match slot {
            Some(RefSlot::Field(field)) => field.get(),
            Some(RefSlot::Ref(cell)) => cell.get(),
            Some(RefSlot::Plain(value)) => value,
            None => Value::Undefined,
        }
    }

    /// Write `key`. Ref members forward the write; anything else stores a
    /// plain value, adding the key when missing.
    pub fn set(&self, key: impl Into<PropKey>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        let slot = self.slots.borrow().get(&key).cloned();
        match slot {
            Some(RefSlot::Field(field)) => field.set(value),
            Some(RefSlot::Ref(cell)) => cell.set(value),
            Some(RefSlot::Plain(_)) | None => {
                self.slots.borrow_mut().insert(key, RefSlot::Plain(value));
            }
        }
    }

    pub fn keys(&self) -> Vec<PropKey> {
        self.slots.borrow().keys().cloned().collect()
    }

    /// Whether `key` is backed by a ref rather than a plain value.
    pub fn is_ref(&self, key: impl Into<PropKey>) -> bool {
        matches!(
            self.slots.borrow().get(&key.into()),
            Some(RefSlot::Field(_) | RefSlot::Ref(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, reactive, Object};
    use std::cell::Cell;

    #[test]
    fn ref_tracks_and_triggers() {
        let count = make_ref(0);
        let runs = Rc::new(Cell::new(0));

        let c = count.clone();
        let r = runs.clone();
        let _e = effect(move || {
            r.set(r.get() + 1);
            c.get();
        });

        count.set(1);
        assert_eq!(runs.get(), 2);

        // Same value: no re-run
        count.set(1);
        assert_eq!(runs.get(), 2);

        count.update(|n| n + 1);
        assert_eq!(runs.get(), 3);
        assert_eq!(count.get_untracked(), 2);
    }

    #[test]
    fn field_refs_forward_to_the_object() {
        let state = reactive(Object::from_fields([("foo", 1), ("bar", 2)]));
        let refs = to_refs(&state);
        assert_eq!(refs.len(), 2);

        let foo = &refs[&PropKey::from("foo")];
        let seen = Rc::new(RefCell::new(Vec::new()));
        let f = foo.clone();
        let s = seen.clone();
        let _e = effect(move || s.borrow_mut().push(f.get()));

        state.set("foo", 10);
        foo.set(20);
        assert_eq!(
            *seen.borrow(),
            vec![Value::from(1), Value::from(10), Value::from(20)]
        );
        assert_eq!(state.get("foo"), Value::from(20));
    }

    #[test]
    fn proxy_refs_unwraps_refs_on_access() {
        let state = reactive(Object::from_fields([("foo", 1)]));
        let count = make_ref(Value::from(0));

        let mut members: Vec<(PropKey, RefSlot)> = to_refs(&state)
            .into_iter()
            .map(|(key, field)| (key, field.into()))
            .collect();
        members.push(("count".into(), count.clone().into()));
        members.push(("label".into(), Value::from("plain").into()));
        let view = proxy_refs(members);

        assert_eq!(view.get("foo"), Value::from(1));
        assert_eq!(view.get("count"), Value::from(0));
        assert_eq!(view.get("label"), Value::from("plain"));
        assert!(view.is_ref("count"));
        assert!(!view.is_ref("label"));

        // Reads through the view track the underlying refs
        let seen = Rc::new(RefCell::new(Vec::new()));
        let v = view.clone();
        let s = seen.clone();
        let _e = effect(move || s.borrow_mut().push((v.get("foo"), v.get("count"))));

        view.set("foo", 2);
        view.set("count", 7);
        assert_eq!(state.get("foo"), Value::from(2));
        assert_eq!(count.get_untracked(), Value::from(7));
        assert_eq!(
            *seen.borrow(),
            vec![
                (Value::from(1), Value::from(0)),
                (Value::from(2), Value::from(0)),
                (Value::from(2), Value::from(7)),
            ]
        );

        // Plain members are replaced, not forwarded
        view.set("label", "changed");
        view.set("extra", true);
        assert_eq!(view.get("label"), Value::from("changed"));
        assert_eq!(view.keys().len(), 4);
        assert_eq!(seen.borrow().len(), 3);
    }
}
