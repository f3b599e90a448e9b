//! Watch Implementation
//!
//! A watcher observes a source and calls back with `(new, old)` whenever the
//! source changes.
//!
//! # How Watchers Work
//!
//! 1. The source becomes the getter of a lazy effect. A function source is
//!    used as is and tracks exactly what it reads. [`watch_deep`] instead
//!    traverses a reactive object recursively, reading every reachable key.
//!
//! 2. Unless `immediate` is set, the getter runs once at registration to
//!    record the baseline value. With `immediate`, the callback fires right
//!    away with no old value.
//!
//! 3. The effect's scheduler re-runs the getter, fires any invalidation
//!    registered by the previous callback, invokes the callback with the
//!    new and previous values, and keeps the new value for next time. With
//!    [`Flush::Post`] this happens in the next job flush instead of inside
//!    the triggering write.
//!
//! # Invalidation
//!
//! The callback receives an [`OnInvalidate`]. A closure registered through it
//! runs before the next callback invocation (or when the watcher stops).
//! Async work started by the callback uses it to mark itself stale; the
//! engine never cancels anything on its own.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use super::effect::{effect_with, Effect, EffectOptions};
use super::ids::ObjectId;
use super::proxy::Reactive;
use super::value::{ContainerKind, Value};
use crate::scheduler::{queue_job, Job};

/// When the callback runs relative to the triggering write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Flush {
    /// Inside the write that changed the source.
    #[default]
    Sync,
    /// In the next job flush, once per flush.
    Post,
}

/// Options for [`watch`] and [`watch_deep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    pub immediate: bool,
    pub flush: Flush,
}

impl WatchOptions {
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn flush(mut self, flush: Flush) -> Self {
        self.flush = flush;
        self
    }
}

type Cleanup = Box<dyn FnOnce()>;

/// Registration slot for a watcher's invalidation callback.
///
/// Holds at most one callback; registering again replaces it.
#[derive(Clone, Default)]
pub struct OnInvalidate {
    slot: Rc<RefCell<Option<Cleanup>>>,
}

impl OnInvalidate {
    /// Run `f` before the next callback invocation or when the watcher stops.
    pub fn register(&self, f: impl FnOnce() + 'static) {
        *self.slot.borrow_mut() = Some(Box::new(f));
    }

    fn fire(&self) {
        let pending = self.slot.borrow_mut().take();
        if let Some(cleanup) = pending {
            cleanup();
        }
    }
}

impl fmt::Debug for OnInvalidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnInvalidate")
            .field("registered", &self.slot.borrow().is_some())
            .finish()
    }
}

type Callback<T> = Box<dyn Fn(&T, Option<&T>, &OnInvalidate)>;

struct WatchInner<T: 'static> {
    effect: Effect<T>,
    callback: Callback<T>,
    old: RefCell<Option<T>>,
    on_invalidate: OnInvalidate,
}

impl<T: Clone + 'static> WatchInner<T> {
    fn fire(&self) {
        if !self.effect.is_active() {
            return;
        }
        let new = self.effect.run();
        self.on_invalidate.fire();
        let old = self.old.replace(Some(new.clone()));
        (self.callback)(&new, old.as_ref(), &self.on_invalidate);
    }
}

/// Handle to a registered watcher. Dropping it stops the watcher.
#[must_use = "dropping the watcher stops it"]
pub struct Watcher<T: 'static> {
    inner: Rc<WatchInner<T>>,
}

impl<T: Clone + 'static> Watcher<T> {
    /// Stop watching. A pending invalidation runs now.
    pub fn stop(&self) {
        self.inner.effect.stop();
        self.inner.on_invalidate.fire();
    }

    pub fn is_active(&self) -> bool {
        self.inner.effect.is_active()
    }

    /// The value recorded at the last run.
    pub fn last_value(&self) -> Option<T> {
        self.inner.old.borrow().clone()
    }
}

impl<T> fmt::Debug for Watcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("effect", &self.inner.effect)
            .finish()
    }
}

/// Watch the value returned by `getter`.
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(Object::from_fields([("count", 0)]));
///
/// let s = state.clone();
/// let _w = watch(
///     move || s.get("count"),
///     |new, old, _| println!("{old:?} -> {new:?}"),
///     WatchOptions::default(),
/// );
///
/// state.set("count", 1);  // prints "Some(0) -> 1"
/// ```
#[must_use = "dropping the watcher stops it"]
pub fn watch<T, G, C>(getter: G, callback: C, options: WatchOptions) -> Watcher<T>
where
    T: Clone + 'static,
    G: Fn() -> T + 'static,
    C: Fn(&T, Option<&T>, &OnInvalidate) + 'static,
{
    let inner = Rc::new_cyclic(|weak: &Weak<WatchInner<T>>| {
        let weak = weak.clone();
        let flush = options.flush;
        let scheduler = move |effect: super::effect::EffectHandle| {
            let weak = weak.clone();
            match flush {
                Flush::Sync => {
                    if let Some(inner) = weak.upgrade() {
                        inner.fire();
                    }
                }
                Flush::Post => queue_job(Job::new(effect.id(), move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.fire();
                    }
                })),
            }
        };
        WatchInner {
            effect: effect_with(getter, EffectOptions::default().lazy().with_scheduler(scheduler)),
            callback: Box::new(callback),
            old: RefCell::new(None),
            on_invalidate: OnInvalidate::default(),
        }
    });

    if options.immediate {
        inner.fire();
    } else {
        let baseline = inner.effect.run();
        *inner.old.borrow_mut() = Some(baseline);
    }

    Watcher { inner }
}

/// Watch every key reachable from `source`.
///
/// The callback receives the source itself as both values, so it reports
/// that something changed, not what.
#[must_use = "dropping the watcher stops it"]
pub fn watch_deep<C>(source: &Reactive, callback: C, options: WatchOptions) -> Watcher<Value>
where
    C: Fn(&Value, Option<&Value>, &OnInvalidate) + 'static,
{
    let source = source.clone();
    watch(
        move || {
            let mut seen = HashSet::new();
            traverse(&Value::Reactive(source.clone()), &mut seen);
            Value::Reactive(source.clone())
        },
        callback,
        options,
    )
}

/// Read every key reachable from `value`, once per object.
pub fn traverse(value: &Value, seen: &mut HashSet<ObjectId>) {
    let Value::Reactive(view) = value else {
        return;
    };
    if !seen.insert(view.id()) {
        return;
    }

    match view.kind() {
        ContainerKind::Plain | ContainerKind::Array => {
            for key in view.own_keys() {
                traverse(&view.get(key), seen);
            }
        }
        ContainerKind::Map | ContainerKind::Set => {
            if let Ok(entries) = view.entries() {
                for (key, value) in entries {
                    traverse(&key, seen);
                    traverse(&value, seen);
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
