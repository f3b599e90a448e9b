//! Dynamic Values
//!
//! The reactive layer observes structured data of four shapes: plain objects,
//! arrays, Maps and Sets. They are modelled as [`Object`], a shared,
//! identity-carrying handle around a [`Container`]. Scalars and handles are
//! carried around as [`Value`].
//!
//! # Equality
//!
//! `Value` equality is strict equality with one exception: `NaN` equals
//! itself. Structured values (raw objects and reactive views) compare by
//! identity. This makes `Value` usable as a Map key and gives writes a
//! "did the value actually change" test that never fires for `NaN -> NaN`.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use super::ids::ObjectId;
use super::proxy::Reactive;
use super::store;

/// Field storage of a plain object.
pub type Fields = IndexMap<Rc<str>, Value>;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    /// Missing value (absent key, empty slot).
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    /// A raw, unobserved structured value.
    Object(Object),
    /// A reactive view over a structured value.
    Reactive(Reactive),
}

/// The four structured shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Plain,
    Array,
    Map,
    Set,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerKind::Plain => "plain object",
            ContainerKind::Array => "array",
            ContainerKind::Map => "map",
            ContainerKind::Set => "set",
        };
        f.write_str(name)
    }
}

/// Backing storage of an [`Object`].
#[derive(Debug, Clone)]
pub enum Container {
    Plain(Fields),
    Array(Vec<Value>),
    Map(IndexMap<Value, Value>),
    Set(IndexSet<Value>),
}

impl Container {
    pub fn kind(&self) -> ContainerKind {
        match self {
            Container::Plain(_) => ContainerKind::Plain,
            Container::Array(_) => ContainerKind::Array,
            Container::Map(_) => ContainerKind::Map,
            Container::Set(_) => ContainerKind::Set,
        }
    }
}

struct ObjectCell {
    id: ObjectId,
    kind: ContainerKind,
    data: RefCell<Container>,
    prototype: RefCell<Option<Object>>,
}

impl Drop for ObjectCell {
    fn drop(&mut self) {
        store::forget(self.id);
    }
}

/// A shared handle to a raw structured value.
///
/// Cloning the handle aliases the same storage. The container kind is fixed
/// at construction and stored next to the data, so the proxy layer can pick
/// its handler without borrowing the container.
#[derive(Clone)]
pub struct Object(Rc<ObjectCell>);

impl Object {
    /// Wrap a container into a new object with a fresh identity.
    pub fn new(container: Container) -> Self {
        Self(Rc::new(ObjectCell {
            id: ObjectId::next(),
            kind: container.kind(),
            data: RefCell::new(container),
            prototype: RefCell::new(None),
        }))
    }

    /// An empty plain object.
    pub fn plain() -> Self {
        Self::new(Container::Plain(Fields::new()))
    }

    /// A plain object with the given fields, in order.
    pub fn from_fields<K, V, I>(fields: I) -> Self
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(Container::Plain(fields))
    }

    /// An array holding the given items.
    pub fn array<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::new(Container::Array(items.into_iter().map(Into::into).collect()))
    }

    /// A Map holding the given entries, in insertion order.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.into().into_raw(), v.into().into_raw()))
            .collect();
        Self::new(Container::Map(entries))
    }

    /// A Set holding the given members, in insertion order.
    pub fn set<V, I>(members: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let members = members.into_iter().map(|v| v.into().into_raw()).collect();
        Self::new(Container::Set(members))
    }

    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    pub fn kind(&self) -> ContainerKind {
        self.0.kind
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn borrow(&self) -> Ref<'_, Container> {
        self.0.data.borrow()
    }

    pub(crate) fn borrow_mut(&self) -> RefMut<'_, Container> {
        self.0.data.borrow_mut()
    }

    /// Set the prototype consulted for keys a plain object does not own.
    pub fn set_prototype(&self, prototype: Option<Object>) {
        *self.0.prototype.borrow_mut() = prototype;
    }

    pub fn prototype(&self) -> Option<Object> {
        self.0.prototype.borrow().clone()
    }

    /// Own field of a plain object, without consulting the prototype.
    pub(crate) fn own_field(&self, name: &str) -> Option<Value> {
        match &*self.borrow() {
            Container::Plain(fields) => fields.get(name).cloned(),
            _ => None,
        }
    }

    /// Whether `name` is an own field or found along the prototype chain.
    pub(crate) fn has_field_in_chain(&self, name: &str) -> bool {
        let mut current = Some(self.clone());
        let mut seen = HashSet::new();
        while let Some(object) = current {
            if !seen.insert(object.id()) {
                return false;
            }
            if object.own_field(name).is_some() {
                return true;
            }
            current = object.prototype();
        }
        false
    }

    /// Number of items (fields, elements, entries or members).
    pub fn len(&self) -> usize {
        match &*self.borrow() {
            Container::Plain(fields) => fields.len(),
            Container::Array(items) => items.len(),
            Container::Map(entries) => entries.len(),
            Container::Set(members) => members.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({}, {})", self.id(), self.kind())
    }
}

/// Hashable identity of a value, used as a dependency key for collection
/// entries. Holds no strong reference to structured values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Undefined,
    Null,
    Bool(bool),
    Number(u64),
    Str(Rc<str>),
    Object(ObjectId),
}

fn number_bits(n: f64) -> u64 {
    if n.is_nan() {
        f64::NAN.to_bits()
    } else if n == 0.0 {
        0.0f64.to_bits()
    } else {
        n.to_bits()
    }
}

impl Value {
    /// Build a value from JSON: objects become plain objects, arrays become
    /// arrays.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s.into()),
            serde_json::Value::Array(items) => {
                Value::Object(Object::array(items.into_iter().map(Value::from_json)))
            }
            serde_json::Value::Object(fields) => Value::Object(Object::from_fields(
                fields.into_iter().map(|(k, v)| (k, Value::from_json(v))),
            )),
        }
    }

    /// Snapshot this value as JSON, reading raw storage (nothing is tracked).
    ///
    /// Maps become arrays of `[key, value]` pairs and Sets become arrays.
    /// `Undefined`, non-finite numbers and references back into an object
    /// that is still being serialized become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut path = HashSet::new();
        self.to_json_inner(&mut path)
    }

    fn to_json_inner(&self, path: &mut HashSet<ObjectId>) -> serde_json::Value {
        use serde_json::Value as Json;

        let object = match self {
            Value::Undefined | Value::Null => return Json::Null,
            Value::Bool(b) => return Json::Bool(*b),
            Value::Number(n) => {
                return serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number)
            }
            Value::Str(s) => return Json::String(s.to_string()),
            Value::Object(object) => object.clone(),
            Value::Reactive(view) => view.raw(),
        };

        if !path.insert(object.id()) {
            return Json::Null;
        }
        let container = object.borrow().clone();
        let json = match container {
            Container::Plain(fields) => Json::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_json_inner(path)))
                    .collect(),
            ),
            Container::Array(items) => {
                Json::Array(items.iter().map(|v| v.to_json_inner(path)).collect())
            }
            Container::Map(entries) => Json::Array(
                entries
                    .iter()
                    .map(|(k, v)| Json::Array(vec![k.to_json_inner(path), v.to_json_inner(path)]))
                    .collect(),
            ),
            Container::Set(members) => {
                Json::Array(members.iter().map(|v| v.to_json_inner(path)).collect())
            }
        };
        path.remove(&object.id());
        json
    }

    /// JavaScript-style truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Object(_) | Value::Reactive(_) => true,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Whether this is a structured value (raw or reactive).
    pub fn is_structured(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Reactive(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
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
            Value::Reactive(view) => Some(view),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Strip a reactive view down to its backing object.
    pub fn into_raw(self) -> Value {
        match self {
            Value::Reactive(view) => Value::Object(view.raw()),
            other => other,
        }
    }

    /// The structured value behind this value, raw form.
    pub fn raw_object(&self) -> Option<Object> {
        match self {
            Value::Object(object) => Some(object.clone()),
            Value::Reactive(view) => Some(view.raw()),
            _ => None,
        }
    }

    /// Identity used for collection dependency keys. Reactive views map to
    /// their backing object.
    pub fn identity(&self) -> Identity {
        match self {
            Value::Undefined => Identity::Undefined,
            Value::Null => Identity::Null,
            Value::Bool(b) => Identity::Bool(*b),
            Value::Number(n) => Identity::Number(number_bits(*n)),
            Value::Str(s) => Identity::Str(s.clone()),
            Value::Object(object) => Identity::Object(object.id()),
            Value::Reactive(view) => Identity::Object(view.raw().id()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Reactive(a), Value::Reactive(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Undefined | Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => number_bits(*n).hash(state),
            Value::Str(s) => s.hash(state),
            Value::Object(object) => object.id().hash(state),
            Value::Reactive(view) => view.ptr_id().hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Object(object) => write!(f, "{object:?}"),
            Value::Reactive(view) => write!(f, "{view:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

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

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<Reactive> for Value {
    fn from(view: Reactive) -> Self {
        Value::Reactive(view)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nan_equals_itself() {
        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_eq!(Value::Number(0.0), Value::Number(-0.0));
        assert_ne!(Value::Number(1.0), Value::from("1"));
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = Object::plain();
        let b = Object::plain();
        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        assert_ne!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn json_builds_nested_containers() {
        let value = Value::from_json(json!({ "user": { "name": "ada" }, "tags": [1, 2] }));
        let object = value.as_object().expect("plain object");
        assert_eq!(object.kind(), ContainerKind::Plain);
        assert_eq!(
            value.to_json(),
            json!({ "user": { "name": "ada" }, "tags": [1.0, 2.0] })
        );
    }

    #[test]
    fn json_snapshot_survives_cycles() {
        let parent = Object::plain();
        if let Container::Plain(fields) = &mut *parent.borrow_mut() {
            fields.insert("me".into(), Value::Object(parent.clone()));
        }
        assert_eq!(Value::Object(parent.clone()).to_json(), json!({ "me": null }));

        // Break the cycle so the object can be dropped.
        *parent.borrow_mut() = Container::Plain(Fields::new());
    }

    #[test]
    fn prototype_chain_lookup() {
        let base = Object::from_fields([("greeting", "hi")]);
        let child = Object::plain();
        child.set_prototype(Some(base));
        assert!(child.has_field_in_chain("greeting"));
        assert!(!child.has_field_in_chain("missing"));
        assert!(child.own_field("greeting").is_none());
    }
}
