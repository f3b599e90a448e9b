//! Dependency Store
//!
//! The store is the central registry that connects observed data to the
//! effects that read it. It is a two-level map:
//!
//! ```text
//! ObjectId -> DepKey -> { EffectId -> Weak<effect> }
//! ```
//!
//! # How It Works
//!
//! 1. When a reactive read happens inside a running effect, [`track`] adds
//!    the effect to the set for `(object, key)` and tells the effect about
//!    the new subscription, so it can remove itself before its next run.
//!
//! 2. When a reactive write happens, [`trigger`] collects every effect that
//!    depends on the changed key, plus the effects of the pseudo-keys the
//!    operation affects (iteration, array length, truncated indices).
//!
//! 3. The collected effects are run after the store borrow is released:
//!    through their scheduler if they have one, directly otherwise.
//!
//! # Ownership
//!
//! Effects are held weakly: an effect that nobody holds a handle to is
//! skipped and eventually pruned. Objects are referenced by id only, and an
//! object's entry is removed when the object is dropped. Leaking an entry
//! costs memory, never correctness, since the ids are never reused.
//!
//! # Ordering
//!
//! Subscriber sets are insertion ordered. A trigger visits the changed key
//! first, then the pseudo-keys in the order listed in [`trigger`], and runs
//! each effect once, in the order it was first collected.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::effect::{AnyEffect, EffectHandle};
use super::ids::{EffectId, ObjectId};
use super::value::{ContainerKind, Identity, Value};

/// Key inside an object's dependency map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// Named field of a plain object.
    Field(Rc<str>),
    /// Array element.
    Index(usize),
    /// Array `length`.
    Length,
    /// Map or Set entry, by key identity.
    Entry(Identity),
    /// Any key iterated (`own_keys`, collection size and iteration).
    Iterate,
    /// Map key iteration.
    MapKeyIterate,
    /// The single value of a computed cell or ref.
    Value,
}

/// Kind of mutation passed to [`trigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
    /// A key that did not exist was added.
    Add,
    /// An existing key was assigned a different value.
    Set,
    /// An existing key was removed.
    Delete,
    /// A collection was emptied.
    Clear,
}

type Subscribers = IndexMap<EffectId, Weak<dyn AnyEffect>>;
type KeyMap = IndexMap<DepKey, Subscribers>;

thread_local! {
    static STORE: RefCell<HashMap<ObjectId, KeyMap>> = RefCell::new(HashMap::new());
}

/// Record that the active effect depends on `(target, key)`.
///
/// No-op when no effect is running or tracking is paused.
pub fn track(target: ObjectId, key: DepKey) {
    if !ReactiveContext::should_track() {
        return;
    }
    let Some(active) = ReactiveContext::current_effect() else {
        return;
    };

    let inserted = STORE.with(|store| {
        let mut store = store.borrow_mut();
        let subscribers = store
            .entry(target)
            .or_default()
            .entry(key.clone())
            .or_default();
        if subscribers.contains_key(&active.id()) {
            false
        } else {
            subscribers.insert(active.id(), Rc::downgrade(active.inner()));
            true
        }
    });

    if inserted {
        tracing::trace!(object = %target, ?key, effect = active.id().raw(), "track");
        active.inner().record(target, key);
    }
}

/// Re-run every effect that depends on `(target, key)`.
///
/// Besides the key's own subscribers, this collects:
///
/// 1. for `Add` and `Delete`, the `Iterate` subscribers;
/// 2. for Maps, the `Iterate` subscribers on `Set` too, and the
///    `MapKeyIterate` subscribers on `Add` and `Delete`;
/// 3. for arrays, the `Length` subscribers on `Add`, and on a write to
///    `Length` the subscribers of every index at or past the new length;
/// 4. for `Clear`, the subscribers of every key of the target.
///
/// Effects that are currently running are skipped, so an effect writing a
/// key it has just read does not re-enter itself.
pub fn trigger(
    target: ObjectId,
    kind: ContainerKind,
    key: DepKey,
    op: TriggerOp,
    new_value: Option<&Value>,
) {
    let effects = STORE.with(|store| {
        let store = store.borrow();
        let Some(keys) = store.get(&target) else {
            return Vec::new();
        };

        let mut collected: IndexMap<EffectId, EffectHandle> = IndexMap::new();
        let mut add = |subscribers: Option<&Subscribers>| {
            for (id, weak) in subscribers.into_iter().flatten() {
                if collected.contains_key(id) || ReactiveContext::is_running(*id) {
                    continue;
                }
                if let Some(effect) = weak.upgrade() {
                    collected.insert(*id, EffectHandle::from_inner(effect));
                }
            }
        };

        if op == TriggerOp::Clear {
            for subscribers in keys.values() {
                add(Some(subscribers));
            }
        } else {
            add(keys.get(&key));

            if matches!(op, TriggerOp::Add | TriggerOp::Delete)
                || (op == TriggerOp::Set && kind == ContainerKind::Map)
            {
                add(keys.get(&DepKey::Iterate));
            }
            if kind == ContainerKind::Map && matches!(op, TriggerOp::Add | TriggerOp::Delete) {
                add(keys.get(&DepKey::MapKeyIterate));
            }
            if kind == ContainerKind::Array {
                if op == TriggerOp::Add {
                    add(keys.get(&DepKey::Length));
                }
                if key == DepKey::Length {
                    let new_len = new_value.and_then(Value::as_f64).unwrap_or(0.0);
                    for (dep, subscribers) in keys {
                        if let DepKey::Index(index) = dep {
                            if *index as f64 >= new_len {
                                add(Some(subscribers));
                            }
                        }
                    }
                }
            }
        }

        collected.into_values().collect::<Vec<_>>()
    });

    if effects.is_empty() {
        return;
    }
    tracing::trace!(object = %target, ?key, ?op, count = effects.len(), "trigger");

    for effect in effects {
        match effect.scheduler() {
            Some(scheduler) => scheduler(effect),
            None => effect.run(),
        }
    }
}

/// Remove `effect` from the subscriber sets of `deps`.
pub(crate) fn unsubscribe<'a>(effect: EffectId, deps: impl IntoIterator<Item = &'a (ObjectId, DepKey)>) {
    let _ = STORE.try_with(|store| {
        let Ok(mut store) = store.try_borrow_mut() else {
            return;
        };
        for (target, key) in deps {
            let Some(keys) = store.get_mut(target) else {
                continue;
            };
            if let Some(subscribers) = keys.get_mut(key) {
                subscribers.shift_remove(&effect);
                if subscribers.is_empty() {
                    keys.shift_remove(key);
                }
            }
            if keys.is_empty() {
                store.remove(target);
            }
        }
    });
}

/// Drop every dependency entry of `target`. Called when the object dies.
pub(crate) fn forget(target: ObjectId) {
    let _ = STORE.try_with(|store| {
        if let Ok(mut store) = store.try_borrow_mut() {
            store.remove(&target);
        }
    });
}

/// Number of live subscribers for `(target, key)`.
pub fn subscriber_count(target: ObjectId, key: &DepKey) -> usize {
    STORE.with(|store| {
        store
            .borrow()
            .get(&target)
            .and_then(|keys| keys.get(key))
            .map_or(0, |subscribers| {
                subscribers.values().filter(|w| w.strong_count() > 0).count()
            })
    })
}

/// Whether `effect` is subscribed to `(target, key)`.
pub fn has_subscriber(target: ObjectId, key: &DepKey, effect: EffectId) -> bool {
    STORE.with(|store| {
        store
            .borrow()
            .get(&target)
            .and_then(|keys| keys.get(key))
            .is_some_and(|subscribers| subscribers.contains_key(&effect))
    })
}

/// Whether the store holds any entry for `target`.
pub fn is_observed(target: ObjectId) -> bool {
    STORE.with(|store| store.borrow().contains_key(&target))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::{effect, effect_with, EffectOptions};
    use std::cell::Cell;

    fn field(name: &str) -> DepKey {
        DepKey::Field(name.into())
    }

    #[test]
    fn track_outside_effect_is_noop() {
        let target = ObjectId::next();
        track(target, field("a"));
        assert!(!is_observed(target));
    }

    #[test]
    fn track_and_trigger() {
        let target = ObjectId::next();
        let runs = Rc::new(Cell::new(0));

        let runs_clone = runs.clone();
        let e = effect(move || {
            runs_clone.set(runs_clone.get() + 1);
            track(target, field("a"));
        });
        assert_eq!(runs.get(), 1);
        assert!(has_subscriber(target, &field("a"), e.id()));

        trigger(target, ContainerKind::Plain, field("a"), TriggerOp::Set, None);
        assert_eq!(runs.get(), 2);

        // Unrelated key does nothing
        trigger(target, ContainerKind::Plain, field("b"), TriggerOp::Set, None);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn set_does_not_trigger_iteration() {
        let target = ObjectId::next();
        let runs = Rc::new(Cell::new(0));

        let runs_clone = runs.clone();
        let _e = effect(move || {
            runs_clone.set(runs_clone.get() + 1);
            track(target, DepKey::Iterate);
        });

        trigger(target, ContainerKind::Plain, field("x"), TriggerOp::Set, None);
        assert_eq!(runs.get(), 1);

        trigger(target, ContainerKind::Plain, field("x"), TriggerOp::Add, None);
        assert_eq!(runs.get(), 2);

        trigger(target, ContainerKind::Plain, field("x"), TriggerOp::Delete, None);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn map_set_triggers_iteration_but_not_key_iteration() {
        let target = ObjectId::next();
        let values_runs = Rc::new(Cell::new(0));
        let keys_runs = Rc::new(Cell::new(0));

        let v = values_runs.clone();
        let _values = effect(move || {
            v.set(v.get() + 1);
            track(target, DepKey::Iterate);
        });
        let k = keys_runs.clone();
        let _keys = effect(move || {
            k.set(k.get() + 1);
            track(target, DepKey::MapKeyIterate);
        });

        let key = DepKey::Entry(Identity::Str("a".into()));
        trigger(target, ContainerKind::Map, key.clone(), TriggerOp::Set, None);
        assert_eq!(values_runs.get(), 2);
        assert_eq!(keys_runs.get(), 1);

        trigger(target, ContainerKind::Map, key, TriggerOp::Add, None);
        assert_eq!(values_runs.get(), 3);
        assert_eq!(keys_runs.get(), 2);
    }

    #[test]
    fn length_write_triggers_truncated_indices() {
        let target = ObjectId::next();
        let low = Rc::new(Cell::new(0));
        let high = Rc::new(Cell::new(0));

        let l = low.clone();
        let _low = effect(move || {
            l.set(l.get() + 1);
            track(target, DepKey::Index(0));
        });
        let h = high.clone();
        let _high = effect(move || {
            h.set(h.get() + 1);
            track(target, DepKey::Index(3));
        });

        trigger(
            target,
            ContainerKind::Array,
            DepKey::Length,
            TriggerOp::Set,
            Some(&Value::Number(2.0)),
        );
        assert_eq!(low.get(), 1);
        assert_eq!(high.get(), 2);
    }

    #[test]
    fn scheduler_receives_effect() {
        let target = ObjectId::next();
        let scheduled = Rc::new(Cell::new(0));

        let s = scheduled.clone();
        let e = effect_with(
            move || track(target, field("a")),
            EffectOptions::default().with_scheduler(move |_| s.set(s.get() + 1)),
        );
        assert_eq!(e.run_count(), 1);

        trigger(target, ContainerKind::Plain, field("a"), TriggerOp::Set, None);
        assert_eq!(scheduled.get(), 1);
        assert_eq!(e.run_count(), 1);
    }

    #[test]
    fn dropped_effect_is_unsubscribed() {
        let target = ObjectId::next();
        let e = effect(move || track(target, field("a")));
        assert_eq!(subscriber_count(target, &field("a")), 1);

        drop(e);
        assert_eq!(subscriber_count(target, &field("a")), 0);
        assert!(!is_observed(target));
    }

    #[test]
    fn forget_removes_object() {
        let target = ObjectId::next();
        let _e = effect(move || track(target, field("a")));
        assert!(is_observed(target));

        forget(target);
        assert!(!is_observed(target));
    }
}
