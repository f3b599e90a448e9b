//! Reactive arrays.
//!
//! Element reads track the element's index, `length` reads and iteration
//! track [`DepKey::Length`]. Writes past the end are ADDs, which also
//! notify `length` readers; shrinking the array notifies the readers of
//! every removed index.
//!
//! The mutating methods (`push`, `pop`, `shift`, `unshift`, `splice`) pause
//! tracking while they run. They read the array and its length internally,
//! and without the pause an effect calling `push` would subscribe to the
//! length it is changing and re-trigger itself.

use super::context::ReactiveContext;
use super::proxy::{Handler, PropKey, Reactive};
use super::store::{self, DepKey, TriggerOp};
use super::value::{Container, ContainerKind, Value};
use crate::error::ReactiveError;

pub(crate) struct ArrayHandler;

enum ArrayKey {
    Index(usize),
    Length,
    Other,
}

/// Largest valid array length. Indices at or above it are plain names.
const MAX_LENGTH: usize = u32::MAX as usize;

fn classify(key: &PropKey) -> ArrayKey {
    let index = match key {
        PropKey::Index(index) => *index,
        PropKey::Name(name) if &**name == "length" => return ArrayKey::Length,
        PropKey::Name(name) => match name.parse::<usize>() {
            Ok(index) => index,
            Err(_) => return ArrayKey::Other,
        },
    };
    if index < MAX_LENGTH {
        ArrayKey::Index(index)
    } else {
        ArrayKey::Other
    }
}

fn raw_len(proxy: &Reactive) -> usize {
    proxy.raw().len()
}

fn raw_items(proxy: &Reactive) -> Vec<Value> {
    match &*proxy.raw().borrow() {
        Container::Array(items) => items.clone(),
        _ => Vec::new(),
    }
}

fn raw_item(proxy: &Reactive, index: usize) -> Value {
    match &*proxy.raw().borrow() {
        Container::Array(items) => items.get(index).cloned().unwrap_or_default(),
        _ => Value::Undefined,
    }
}

impl ArrayHandler {
    fn set_index(proxy: &Reactive, index: usize, value: Value) {
        let value = proxy.unwrap_incoming(value);
        let (had, old) = match &mut *proxy.raw().borrow_mut() {
            Container::Array(items) => {
                let had = index < items.len();
                if !had {
                    let Some(len) = index.checked_add(1).filter(|len| *len <= MAX_LENGTH) else {
                        return;
                    };
                    items.resize(len, Value::Undefined);
                }
                let old = std::mem::replace(&mut items[index], value.clone());
                (had, old)
            }
            _ => return,
        };

        if !had {
            proxy.trigger(DepKey::Index(index), TriggerOp::Add, Some(&value));
        } else if old != value {
            proxy.trigger(DepKey::Index(index), TriggerOp::Set, Some(&value));
        }
    }

    fn set_length(proxy: &Reactive, len: usize) {
        let old_len = match &mut *proxy.raw().borrow_mut() {
            Container::Array(items) => {
                let old_len = items.len();
                items.resize(len, Value::Undefined);
                old_len
            }
            _ => return,
        };
        if old_len != len {
            let new_len = Value::from(len);
            proxy.trigger(DepKey::Length, TriggerOp::Set, Some(&new_len));
        }
    }
}

impl Handler for ArrayHandler {
    fn get(&self, proxy: &Reactive, key: &PropKey) -> Value {
        match classify(key) {
            ArrayKey::Index(index) => {
                proxy.track(DepKey::Index(index));
                proxy.wrap(raw_item(proxy, index))
            }
            ArrayKey::Length => {
                proxy.track(DepKey::Length);
                Value::from(raw_len(proxy))
            }
            ArrayKey::Other => Value::Undefined,
        }
    }

    fn set(&self, proxy: &Reactive, key: &PropKey, value: Value, _receiver: &Reactive) -> bool {
        if proxy.is_readonly() {
            return proxy.reject_write("set", key);
        }
        match classify(key) {
            ArrayKey::Index(index) => {
                Self::set_index(proxy, index, value);
                true
            }
            ArrayKey::Length => match value.as_f64() {
                Some(len) if (0.0..=MAX_LENGTH as f64).contains(&len) && len.fract() == 0.0 => {
                    Self::set_length(proxy, len as usize);
                    true
                }
                _ => false,
            },
            ArrayKey::Other => false,
        }
    }

    fn has(&self, proxy: &Reactive, key: &PropKey) -> bool {
        match classify(key) {
            ArrayKey::Index(index) => {
                store::track(proxy.id(), DepKey::Index(index));
                index < raw_len(proxy)
            }
            ArrayKey::Length => true,
            ArrayKey::Other => false,
        }
    }

    fn own_keys(&self, proxy: &Reactive) -> Vec<PropKey> {
        store::track(proxy.id(), DepKey::Length);
        (0..raw_len(proxy)).map(PropKey::Index).collect()
    }

    fn delete(&self, proxy: &Reactive, key: &PropKey) -> bool {
        if proxy.is_readonly() {
            return proxy.reject_write("delete", key);
        }
        if let ArrayKey::Index(index) = classify(key) {
            // An in-bounds slot exists even when it holds `Undefined`
            let removed = match &mut *proxy.raw().borrow_mut() {
                Container::Array(items) if index < items.len() => {
                    items[index] = Value::Undefined;
                    true
                }
                _ => false,
            };
            if removed {
                proxy.trigger(DepKey::Index(index), TriggerOp::Delete, None);
            }
        }
        true
    }
}

impl Reactive {
    fn expect_array(&self, op: &'static str) -> Result<(), ReactiveError> {
        match self.kind() {
            ContainerKind::Array => Ok(()),
            found => Err(ReactiveError::KindMismatch {
                op,
                expected: ContainerKind::Array,
                found,
            }),
        }
    }

    /// Tracked length.
    pub fn len(&self) -> Result<usize, ReactiveError> {
        self.expect_array("len")?;
        self.track(DepKey::Length);
        Ok(raw_len(self))
    }

    pub fn is_empty(&self) -> Result<bool, ReactiveError> {
        Ok(self.len()? == 0)
    }

    /// Snapshot of the elements, tracking the length and every index.
    pub fn to_vec(&self) -> Result<Vec<Value>, ReactiveError> {
        self.expect_array("to_vec")?;
        self.track(DepKey::Length);
        let items = raw_items(self);
        for index in 0..items.len() {
            self.track(DepKey::Index(index));
        }
        Ok(items.into_iter().map(|v| self.wrap(v)).collect())
    }

    /// Append values, returning the new length.
    pub fn push<I>(&self, values: I) -> Result<usize, ReactiveError>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.expect_array("push")?;
        if self.is_readonly() {
            self.reject_write("push", &"length");
            return Ok(raw_len(self));
        }
        let _paused = ReactiveContext::pause_tracking();
        for value in values {
            let index = raw_len(self);
            ArrayHandler::set_index(self, index, value.into());
        }
        Ok(raw_len(self))
    }

    /// Remove and return the last element (`Undefined` when empty).
    pub fn pop(&self) -> Result<Value, ReactiveError> {
        self.expect_array("pop")?;
        if self.is_readonly() {
            self.reject_write("pop", &"length");
            return Ok(Value::Undefined);
        }
        let _paused = ReactiveContext::pause_tracking();
        let len = raw_len(self);
        if len == 0 {
            return Ok(Value::Undefined);
        }
        let last = self.wrap(raw_item(self, len - 1));
        ArrayHandler::set_length(self, len - 1);
        Ok(last)
    }

    /// Remove and return the first element (`Undefined` when empty).
    pub fn shift(&self) -> Result<Value, ReactiveError> {
        self.expect_array("shift")?;
        if self.is_readonly() {
            self.reject_write("shift", &"length");
            return Ok(Value::Undefined);
        }
        let _paused = ReactiveContext::pause_tracking();
        let items = raw_items(self);
        let Some(first) = items.first().cloned() else {
            return Ok(Value::Undefined);
        };
        for (index, value) in items.iter().enumerate().skip(1) {
            ArrayHandler::set_index(self, index - 1, value.clone());
        }
        ArrayHandler::set_length(self, items.len() - 1);
        Ok(self.wrap(first))
    }

    /// Prepend values, returning the new length.
    pub fn unshift<I>(&self, values: I) -> Result<usize, ReactiveError>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.expect_array("unshift")?;
        if self.is_readonly() {
            self.reject_write("unshift", &"length");
            return Ok(raw_len(self));
        }
        let _paused = ReactiveContext::pause_tracking();
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let items = raw_items(self);
        let shift = values.len();
        if shift == 0 {
            return Ok(items.len());
        }
        for (index, value) in items.iter().enumerate().rev() {
            ArrayHandler::set_index(self, index + shift, value.clone());
        }
        for (index, value) in values.into_iter().enumerate() {
            ArrayHandler::set_index(self, index, value);
        }
        Ok(raw_len(self))
    }

    /// Remove `delete_count` elements at `start` and insert `values` there.
    /// Returns the removed elements.
    pub fn splice<I>(
        &self,
        start: usize,
        delete_count: usize,
        values: I,
    ) -> Result<Vec<Value>, ReactiveError>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.expect_array("splice")?;
        if self.is_readonly() {
            self.reject_write("splice", &"length");
            return Ok(Vec::new());
        }
        let _paused = ReactiveContext::pause_tracking();
        let items = raw_items(self);
        let start = start.min(items.len());
        let end = start.saturating_add(delete_count).min(items.len());

        let mut next: Vec<Value> = items[..start].to_vec();
        next.extend(values.into_iter().map(|v| self.unwrap_incoming(v.into())));
        next.extend_from_slice(&items[end..]);

        for (index, value) in next.iter().enumerate() {
            ArrayHandler::set_index(self, index, value.clone());
        }
        if next.len() < items.len() {
            ArrayHandler::set_length(self, next.len());
        }

        Ok(items[start..end].iter().map(|v| self.wrap(v.clone())).collect())
    }

    /// Truncate or extend (with `Undefined`) to `len` elements.
    pub fn set_len(&self, len: usize) -> Result<(), ReactiveError> {
        self.expect_array("set_len")?;
        self.set("length", len);
        Ok(())
    }

    fn search(&self, needle: &Value, reverse: bool) -> Option<usize> {
        self.track(DepKey::Length);
        let items = raw_items(self);
        for index in 0..items.len() {
            self.track(DepKey::Index(index));
        }

        let find = |candidates: &[Value], needle: &Value| {
            let mut positions = candidates.iter().enumerate();
            if reverse {
                positions.rev().find(|(_, v)| *v == needle).map(|(i, _)| i)
            } else {
                positions.find(|(_, v)| *v == needle).map(|(i, _)| i)
            }
        };

        let view: Vec<Value> = items.iter().map(|v| self.wrap(v.clone())).collect();
        find(&view, needle).or_else(|| find(&items, &needle.clone().into_raw()))
    }

    pub fn includes(&self, needle: impl Into<Value>) -> Result<bool, ReactiveError> {
        self.expect_array("includes")?;
        Ok(self.search(&needle.into(), false).is_some())
    }

    pub fn index_of(&self, needle: impl Into<Value>) -> Result<Option<usize>, ReactiveError> {
        self.expect_array("index_of")?;
        Ok(self.search(&needle.into(), false))
    }

    pub fn last_index_of(&self, needle: impl Into<Value>) -> Result<Option<usize>, ReactiveError> {
        self.expect_array("last_index_of")?;
        Ok(self.search(&needle.into(), true))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
