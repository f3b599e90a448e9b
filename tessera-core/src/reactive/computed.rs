//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when the
//! reactive data its getter read has changed.
//!
//! # How Computeds Work
//!
//! 1. The getter runs inside a lazy effect. Nothing is evaluated until the
//!    first `get()`.
//!
//! 2. `get()` on a dirty cell runs the effect, caches the result and clears
//!    the dirty flag. A clean cell returns the cache.
//!
//! 3. When an input changes, the effect's scheduler only sets the dirty flag
//!    and triggers the cell's own readers. Recomputation waits for the next
//!    `get()`.
//!
//! 4. Every `get()` subscribes the reader to the cell itself, whether or not
//!    it recomputed, so effects and watchers over a computed re-run when its
//!    inputs change.
//!
//! # Why This Matters
//!
//! This "lazy" approach avoids unnecessary recomputation:
//!
//! - A field changes
//! - 10 computeds depend on it
//! - Only the computeds actually read will recompute
//! - Computeds that are never read stay dirty (no wasted work)

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::effect::{effect_with, Effect, EffectOptions};
use super::ids::ObjectId;
use super::store::{self, DepKey, TriggerOp};
use super::value::ContainerKind;

struct ComputedInner<T: 'static> {
    id: ObjectId,
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    effect: Effect<T>,
}

impl<T: 'static> ComputedInner<T> {
    fn invalidate(&self) {
        if !self.dirty.replace(true) {
            store::trigger(self.id, ContainerKind::Plain, DepKey::Value, TriggerOp::Set, None);
        }
    }
}

impl<T: 'static> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        store::forget(self.id);
    }
}

/// A cached derived value.
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(Object::from_fields([("a", 1), ("b", 2)]));
///
/// let s = state.clone();
/// let sum = computed(move || {
///     s.get("a").as_f64().unwrap_or(0.0) + s.get("b").as_f64().unwrap_or(0.0)
/// });
///
/// assert_eq!(sum.get(), 3.0);
/// ```
#[must_use = "dropping the computed stops tracking its inputs"]
pub struct Computed<T: 'static> {
    inner: Rc<ComputedInner<T>>,
}

/// Create a computed cell over `getter`.
#[must_use = "dropping the computed stops tracking its inputs"]
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
{
    let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
        let weak = weak.clone();
        let options = EffectOptions::default().lazy().with_scheduler(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.invalidate();
            }
        });
        ComputedInner {
            id: ObjectId::next(),
            value: RefCell::new(None),
            dirty: Cell::new(true),
            effect: effect_with(getter, options),
        }
    });
    Computed { inner }
}

impl<T: Clone + 'static> Computed<T> {
    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> T {
        let cached = if self.inner.dirty.get() {
            None
        } else {
            self.inner.value.borrow().clone()
        };

        let value = match cached {
            Some(value) => value,
            None => {
                let value = self.inner.effect.run();
                *self.inner.value.borrow_mut() = Some(value.clone());
                self.inner.dirty.set(false);
                value
            }
        };

        store::track(self.inner.id, DepKey::Value);
        value
    }

    /// Whether the next `get()` will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Number of times the getter has run.
    pub fn compute_count(&self) -> usize {
        self.inner.effect.run_count()
    }

    pub fn id(&self) -> ObjectId {
        self.inner.id
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("dirty", &self.inner.dirty.get())
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, reactive, Object};

    fn number(value: crate::reactive::Value) -> f64 {
        value.as_f64().unwrap_or(0.0)
    }

    #[test]
    fn computed_is_lazy_and_cached() {
        let state = reactive(Object::from_fields([("a", 1), ("b", 2)]));

        let s = state.clone();
        let sum = computed(move || number(s.get("a")) + number(s.get("b")));

        // Not evaluated until first read
        assert_eq!(sum.compute_count(), 0);
        assert!(sum.is_dirty());

        assert_eq!(sum.get(), 3.0);
        assert_eq!(sum.get(), 3.0);
        assert_eq!(sum.compute_count(), 1);
    }

    #[test]
    fn computed_recomputes_after_change() {
        let state = reactive(Object::from_fields([("a", 1), ("b", 2)]));

        let s = state.clone();
        let sum = computed(move || number(s.get("a")) + number(s.get("b")));
        assert_eq!(sum.get(), 3.0);

        state.set("a", 10);
        // Marked dirty, not recomputed yet
        assert!(sum.is_dirty());
        assert_eq!(sum.compute_count(), 1);

        assert_eq!(sum.get(), 12.0);
        assert_eq!(sum.compute_count(), 2);
    }

    #[test]
    fn effect_over_computed_reruns() {
        let state = reactive(Object::from_fields([("n", 1)]));

        let s = state.clone();
        let doubled = computed(move || number(s.get("n")) * 2.0);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let d = doubled.clone();
        let seen_clone = seen.clone();
        let _e = effect(move || seen_clone.borrow_mut().push(d.get()));

        state.set("n", 5);
        assert_eq!(*seen.borrow(), vec![2.0, 10.0]);
    }

    #[test]
    fn chained_computeds() {
        let state = reactive(Object::from_fields([("n", 1)]));

        let s = state.clone();
        let doubled = computed(move || number(s.get("n")) * 2.0);
        let d = doubled.clone();
        let quadrupled = computed(move || d.get() * 2.0);

        assert_eq!(quadrupled.get(), 4.0);
        state.set("n", 3);
        assert!(quadrupled.is_dirty());
        assert_eq!(quadrupled.get(), 12.0);
    }

    #[test]
    fn unread_computed_does_not_recompute() {
        let state = reactive(Object::from_fields([("n", 1)]));

        let s = state.clone();
        let c = computed(move || number(s.get("n")));
        assert_eq!(c.get(), 1.0);

        state.set("n", 2);
        state.set("n", 3);
        state.set("n", 4);
        assert_eq!(c.compute_count(), 1);
        assert_eq!(c.get(), 4.0);
        assert_eq!(c.compute_count(), 2);
    }
}
