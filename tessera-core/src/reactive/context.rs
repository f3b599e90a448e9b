//! Reactive Context
//!
//! The reactive context tracks which effect is currently running and whether
//! reads should be recorded as dependencies.
//!
//! # Implementation
//!
//! We use a thread-local stack of running effects. When an effect runs, it
//! pushes itself onto the stack; when it completes, it pops itself. The
//! innermost entry is the "active effect" that reads subscribe.
//!
//! A second thread-local holds the tracking switch. Mutating array methods
//! and watcher callbacks pause tracking so that the reads they perform
//! internally do not become dependencies. Pauses nest: each guard restores
//! the previous state when dropped.

use std::cell::{Cell, RefCell};

use super::effect::EffectHandle;
use super::ids::EffectId;

thread_local! {
    /// Effects currently executing, innermost last.
    static CONTEXT_STACK: RefCell<Vec<EffectHandle>> = const { RefCell::new(Vec::new()) };

    /// Whether reads are currently recorded.
    static SHOULD_TRACK: Cell<bool> = const { Cell::new(true) };
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the effect body panics.
pub struct ReactiveContext {
    effect_id: EffectId,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given effect.
    ///
    /// While the returned guard is alive, reads from reactive objects
    /// subscribe `effect`.
    pub fn enter(effect: EffectHandle) -> Self {
        let effect_id = effect.id();
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(effect));
        Self { effect_id }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The innermost running effect, if any.
    pub fn current_effect() -> Option<EffectHandle> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Id of the innermost running effect.
    pub fn current_effect_id() -> Option<EffectId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(EffectHandle::id))
    }

    /// Whether `id` is somewhere on the stack of running effects.
    pub fn is_running(id: EffectId) -> bool {
        CONTEXT_STACK.with(|stack| stack.borrow().iter().any(|e| e.id() == id))
    }

    /// Whether a read right now would be recorded.
    pub fn should_track() -> bool {
        SHOULD_TRACK.with(Cell::get) && Self::is_active()
    }

    /// Stop recording reads until the guard is dropped.
    pub fn pause_tracking() -> TrackingGuard {
        let previous = SHOULD_TRACK.with(|flag| flag.replace(false));
        TrackingGuard { previous }
    }

    /// Record reads again until the guard is dropped, even inside a paused
    /// region.
    pub fn enable_tracking() -> TrackingGuard {
        let previous = SHOULD_TRACK.with(|flag| flag.replace(true));
        TrackingGuard { previous }
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // `try_with` tolerates teardown of thread-locals at thread exit.
        let _ = CONTEXT_STACK.try_with(|stack| {
            let popped = stack.borrow_mut().pop();

            // Verify we're popping the right context.
            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.id(),
                    self.effect_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.effect_id,
                    entry.id()
                );
            }
        });
    }
}

/// Restores the previous tracking state when dropped.
pub struct TrackingGuard {
    previous: bool,
}

impl Drop for TrackingGuard {
    fn drop(&mut self) {
        let _ = SHOULD_TRACK.try_with(|flag| flag.set(self.previous));
    }
}

/// Run `f` without recording any reads.
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let _guard = ReactiveContext::pause_tracking();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::{effect_with, EffectOptions};

    #[test]
    fn context_tracks_effect() {
        let e = effect_with(|| {}, EffectOptions::default().lazy());
        let id = e.id();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_effect_id().is_none());

        {
            let _ctx = ReactiveContext::enter(e.handle());

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_effect_id(), Some(id));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_effect_id().is_none());
    }

    #[test]
    fn nested_contexts() {
        let outer = effect_with(|| {}, EffectOptions::default().lazy());
        let inner = effect_with(|| {}, EffectOptions::default().lazy());

        {
            let _ctx1 = ReactiveContext::enter(outer.handle());
            assert_eq!(ReactiveContext::current_effect_id(), Some(outer.id()));

            {
                let _ctx2 = ReactiveContext::enter(inner.handle());
                assert_eq!(ReactiveContext::current_effect_id(), Some(inner.id()));
                assert!(ReactiveContext::is_running(outer.id()));
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current_effect_id(), Some(outer.id()));
        }

        assert!(ReactiveContext::current_effect_id().is_none());
    }

    #[test]
    fn pause_tracking_nests() {
        let e = effect_with(|| {}, EffectOptions::default().lazy());
        let _ctx = ReactiveContext::enter(e.handle());
        assert!(ReactiveContext::should_track());

        {
            let _paused = ReactiveContext::pause_tracking();
            assert!(!ReactiveContext::should_track());
            {
                let _resumed = ReactiveContext::enable_tracking();
                assert!(ReactiveContext::should_track());
            }
            assert!(!ReactiveContext::should_track());
        }

        assert!(ReactiveContext::should_track());
        assert!(untracked(|| !ReactiveContext::should_track()));
    }
}
