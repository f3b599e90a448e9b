//! Reactive Map and Set.
//!
//! Collection methods operate on the raw backing collection and add the
//! instrumentation inline:
//!
//! - `get`/`has` track the entry key; `size`, `for_each`, `entries` and
//!   `values` track [`DepKey::Iterate`].
//! - Map `keys` tracks [`DepKey::MapKeyIterate`] instead, so replacing a
//!   value (a SET) re-runs value iteration but not key iteration.
//! - `set`/`add`/`delete`/`clear` trigger ADD, SET, DELETE or CLEAR.
//!
//! Keys and members are stored raw. Every structured key or value handed
//! back to the caller goes through the view's wrapping, so a deep view
//! yields deep views.

use super::proxy::{Handler, PropKey, Reactive};
use super::store::{self, DepKey, TriggerOp};
use super::value::{Container, ContainerKind, Value};
use crate::error::ReactiveError;

/// Handler for Map and Set views.
///
/// Property access maps onto entries: a string key reads the entry under
/// that string, an index reads the entry under that number. Sets answer
/// `get` with the member itself when present. `own_keys` lists the
/// string and index keys only.
pub(crate) struct CollectionHandler;

impl Handler for CollectionHandler {
    fn get(&self, proxy: &Reactive, key: &PropKey) -> Value {
        let key = key.to_value();
        match proxy.kind() {
            ContainerKind::Map => proxy.get_entry(key).unwrap_or_default(),
            _ => {
                if proxy.has_entry(key.clone()).unwrap_or(false) {
                    proxy.wrap(key)
                } else {
                    Value::Undefined
                }
            }
        }
    }

    fn set(&self, proxy: &Reactive, key: &PropKey, value: Value, _receiver: &Reactive) -> bool {
        let result = match proxy.kind() {
            ContainerKind::Map => proxy.set_entry(key.to_value(), value),
            _ => proxy.add(key.to_value()),
        };
        result.is_ok()
    }

    fn has(&self, proxy: &Reactive, key: &PropKey) -> bool {
        proxy.has_entry(key.to_value()).unwrap_or(false)
    }

    fn own_keys(&self, proxy: &Reactive) -> Vec<PropKey> {
        store::track(proxy.id(), DepKey::Iterate);
        raw_keys(proxy)
            .into_iter()
            .filter_map(|key| match key {
                Value::Str(name) => Some(PropKey::Name(name)),
                Value::Number(n) if n >= 0.0 && n.fract() == 0.0 => Some(PropKey::Index(n as usize)),
                _ => None,
            })
            .collect()
    }

    fn delete(&self, proxy: &Reactive, key: &PropKey) -> bool {
        proxy.delete_entry(key.to_value()).is_ok()
    }
}

fn raw_keys(proxy: &Reactive) -> Vec<Value> {
    match &*proxy.raw().borrow() {
        Container::Map(entries) => entries.keys().cloned().collect(),
        Container::Set(members) => members.iter().cloned().collect(),
        _ => Vec::new(),
    }
}

fn raw_entries(proxy: &Reactive) -> Vec<(Value, Value)> {
    match &*proxy.raw().borrow() {
        Container::Map(entries) => entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Container::Set(members) => members.iter().map(|m| (m.clone(), m.clone())).collect(),
        _ => Vec::new(),
    }
}

impl Reactive {
    fn expect_kind(
        &self,
        op: &'static str,
        expected: ContainerKind,
    ) -> Result<(), ReactiveError> {
        if self.kind() == expected {
            Ok(())
        } else {
            Err(ReactiveError::KindMismatch {
                op,
                expected,
                found: self.kind(),
            })
        }
    }

    fn expect_collection(&self, op: &'static str) -> Result<(), ReactiveError> {
        match self.kind() {
            ContainerKind::Map | ContainerKind::Set => Ok(()),
            found => Err(ReactiveError::KindMismatch {
                op,
                expected: ContainerKind::Map,
                found,
            }),
        }
    }

    /// Number of entries, tracking iteration.
    pub fn size(&self) -> Result<usize, ReactiveError> {
        self.expect_collection("size")?;
        self.track(DepKey::Iterate);
        Ok(self.raw().len())
    }

    /// Map lookup, tracking the key.
    pub fn get_entry(&self, key: impl Into<Value>) -> Result<Value, ReactiveError> {
        self.expect_kind("get", ContainerKind::Map)?;
        let key = key.into().into_raw();
        self.track(DepKey::Entry(key.identity()));
        let value = match &*self.raw().borrow() {
            Container::Map(entries) => entries.get(&key).cloned().unwrap_or_default(),
            _ => Value::Undefined,
        };
        Ok(self.wrap(value))
    }

    /// Map or Set membership, tracking the key.
    pub fn has_entry(&self, key: impl Into<Value>) -> Result<bool, ReactiveError> {
        self.expect_collection("has")?;
        let key = key.into().into_raw();
        self.track(DepKey::Entry(key.identity()));
        let found = match &*self.raw().borrow() {
            Container::Map(entries) => entries.contains_key(&key),
            Container::Set(members) => members.contains(&key),
            _ => false,
        };
        Ok(found)
    }

    /// Map insert. Triggers ADD for a new key, SET for a changed value.
    pub fn set_entry(
        &self,
        key: impl Into<Value>,
        value: impl Into<Value>,
    ) -> Result<(), ReactiveError> {
        self.expect_kind("set", ContainerKind::Map)?;
        let key = key.into().into_raw();
        if self.is_readonly() {
            self.reject_write("set", &format_args!("{key:?}"));
            return Ok(());
        }
        let value = self.unwrap_incoming(value.into());

        let old = match &mut *self.raw().borrow_mut() {
            Container::Map(entries) => entries.insert(key.clone(), value.clone()),
            _ => None,
        };
        let dep = DepKey::Entry(key.identity());
        match old {
            None => self.trigger(dep, TriggerOp::Add, Some(&value)),
            Some(old) if old != value => self.trigger(dep, TriggerOp::Set, Some(&value)),
            Some(_) => {}
        }
        Ok(())
    }

    /// Set insert. Triggers ADD when the member is new.
    pub fn add(&self, member: impl Into<Value>) -> Result<(), ReactiveError> {
        self.expect_kind("add", ContainerKind::Set)?;
        let member = member.into().into_raw();
        if self.is_readonly() {
            self.reject_write("add", &format_args!("{member:?}"));
            return Ok(());
        }
        let added = match &mut *self.raw().borrow_mut() {
            Container::Set(members) => members.insert(member.clone()),
            _ => false,
        };
        if added {
            self.trigger(DepKey::Entry(member.identity()), TriggerOp::Add, Some(&member));
        }
        Ok(())
    }

    /// Map or Set removal. Returns whether the key was present.
    pub fn delete_entry(&self, key: impl Into<Value>) -> Result<bool, ReactiveError> {
        self.expect_collection("delete")?;
        let key = key.into().into_raw();
        if self.is_readonly() {
            self.reject_write("delete", &format_args!("{key:?}"));
            return Ok(false);
        }
        let removed = match &mut *self.raw().borrow_mut() {
            Container::Map(entries) => entries.shift_remove(&key).is_some(),
            Container::Set(members) => members.shift_remove(&key),
            _ => false,
        };
        if removed {
            self.trigger(DepKey::Entry(key.identity()), TriggerOp::Delete, None);
        }
        Ok(removed)
    }

    /// Remove every entry, re-running everything that read the collection.
    pub fn clear(&self) -> Result<(), ReactiveError> {
        self.expect_collection("clear")?;
        if self.is_readonly() {
            self.reject_write("clear", &"*");
            return Ok(());
        }
        let had_entries = match &mut *self.raw().borrow_mut() {
            Container::Map(entries) => {
                let had = !entries.is_empty();
                entries.clear();
                had
            }
            Container::Set(members) => {
                let had = !members.is_empty();
                members.clear();
                had
            }
            _ => false,
        };
        if had_entries {
            self.trigger(DepKey::Iterate, TriggerOp::Clear, None);
        }
        Ok(())
    }

    /// Visit `(value, key)` pairs in insertion order. Sets pass the member
    /// as both.
    pub fn for_each(&self, mut f: impl FnMut(Value, Value)) -> Result<(), ReactiveError> {
        self.expect_collection("for_each")?;
        self.track(DepKey::Iterate);
        for (key, value) in raw_entries(self) {
            f(self.wrap(value), self.wrap(key));
        }
        Ok(())
    }

    /// `(key, value)` pairs in insertion order.
    pub fn entries(&self) -> Result<Vec<(Value, Value)>, ReactiveError> {
        self.expect_collection("entries")?;
        self.track(DepKey::Iterate);
        Ok(raw_entries(self)
            .into_iter()
            .map(|(k, v)| (self.wrap(k), self.wrap(v)))
            .collect())
    }

    pub fn values(&self) -> Result<Vec<Value>, ReactiveError> {
        self.expect_collection("values")?;
        self.track(DepKey::Iterate);
        Ok(raw_entries(self)
            .into_iter()
            .map(|(_, v)| self.wrap(v))
            .collect())
    }

    pub fn keys(&self) -> Result<Vec<Value>, ReactiveError> {
        self.expect_collection("keys")?;
        match self.kind() {
            ContainerKind::Map => self.track(DepKey::MapKeyIterate),
            _ => self.track(DepKey::Iterate),
        }
        Ok(raw_keys(self).into_iter().map(|k| self.wrap(k)).collect())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
