//! Effect Implementation
//!
//! An Effect is a computation that re-runs whenever the reactive data it
//! read on its last run changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies (unless created lazy).
//!
//! 2. Before every run, the effect removes itself from every dependency set
//!    it joined last time. Dependencies can change between runs (a branch
//!    taken, a list shortened), so stale subscriptions must not survive.
//!
//! 3. The run pushes the effect onto the context stack. Every reactive read
//!    during the run subscribes the effect at the top of the stack, which
//!    attributes reads inside nested effects to the innermost one.
//!
//! 4. When a dependency changes, the effect re-runs directly, or is handed to
//!    its scheduler if it has one.
//!
//! # Lifetime
//!
//! The dependency store holds effects weakly. An effect lives as long as an
//! [`Effect`] (or an [`EffectHandle`]) referring to it does; dropping the last
//! one unsubscribes it. [`Effect::stop`] deactivates it earlier.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::context::{untracked, ReactiveContext};
use super::ids::{EffectId, ObjectId};
use super::store::{self, DepKey};

/// Custom scheduler: receives the triggered effect instead of it running.
pub type Scheduler = Rc<dyn Fn(EffectHandle)>;

/// Object-safe view of an effect, independent of its return type.
pub(crate) trait AnyEffect {
    fn id(&self) -> EffectId;
    fn run_dyn(&self);
    fn scheduler(&self) -> Option<Scheduler>;
    fn record(&self, target: ObjectId, key: DepKey);
    fn is_active(&self) -> bool;
}

/// Options for [`effect_with`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Do not run at registration.
    pub lazy: bool,
    /// Called with the effect instead of running it on trigger.
    pub scheduler: Option<Scheduler>,
}

impl EffectOptions {
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn with_scheduler(mut self, scheduler: impl Fn(EffectHandle) + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    /// Batch re-runs through the job queue (see [`crate::scheduler`]).
    pub fn queued(mut self) -> Self {
        self.scheduler = Some(crate::scheduler::queued_scheduler());
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .finish()
    }
}

struct EffectInner<T> {
    id: EffectId,
    f: Box<dyn Fn() -> T>,
    scheduler: Option<Scheduler>,
    deps: RefCell<SmallVec<[(ObjectId, DepKey); 4]>>,
    active: Cell<bool>,
    runs: Cell<usize>,
    self_ref: Weak<EffectInner<T>>,
}

impl<T: 'static> EffectInner<T> {
    fn run(&self) -> T {
        if !self.active.get() {
            return untracked(|| (self.f)());
        }
        let Some(this) = self.self_ref.upgrade() else {
            return untracked(|| (self.f)());
        };

        self.cleanup();

        let _ctx = ReactiveContext::enter(EffectHandle(this));
        let _tracking = ReactiveContext::enable_tracking();
        self.runs.set(self.runs.get() + 1);
        (self.f)()
    }

    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        store::unsubscribe(self.id, deps.iter());
    }
}

impl<T: 'static> AnyEffect for EffectInner<T> {
    fn id(&self) -> EffectId {
        self.id
    }

    fn run_dyn(&self) {
        self.run();
    }

    fn scheduler(&self) -> Option<Scheduler> {
        self.scheduler.clone()
    }

    fn record(&self, target: ObjectId, key: DepKey) {
        self.deps.borrow_mut().push((target, key));
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }
}

impl<T> Drop for EffectInner<T> {
    fn drop(&mut self) {
        let deps = std::mem::take(self.deps.get_mut());
        store::unsubscribe(self.id, deps.iter());
    }
}

/// Type-erased handle to an effect, as seen by schedulers and the context
/// stack.
#[derive(Clone)]
pub struct EffectHandle(Rc<dyn AnyEffect>);

impl EffectHandle {
    pub(crate) fn from_inner(inner: Rc<dyn AnyEffect>) -> Self {
        Self(inner)
    }

    pub(crate) fn inner(&self) -> &Rc<dyn AnyEffect> {
        &self.0
    }

    pub fn id(&self) -> EffectId {
        self.0.id()
    }

    /// Run the effect now, discarding its result.
    pub fn run(&self) {
        self.0.run_dyn();
    }

    pub fn is_active(&self) -> bool {
        self.0.is_active()
    }

    pub(crate) fn scheduler(&self) -> Option<Scheduler> {
        self.0.scheduler()
    }
}

impl PartialEq for EffectHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for EffectHandle {}

impl fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EffectHandle").field(&self.id()).finish()
    }
}

/// A computation that re-runs when the reactive data it reads changes.
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(Object::from_fields([("count", 0)]));
///
/// let s = state.clone();
/// let e = effect(move || {
///     println!("count is {:?}", s.get("count"));
/// });
///
/// state.set("count", 5);  // prints "count is 5"
/// ```
#[must_use = "dropping the effect unsubscribes it"]
pub struct Effect<T = ()> {
    inner: Rc<EffectInner<T>>,
}

impl<T: 'static> Effect<T> {
    fn new(f: Box<dyn Fn() -> T>, scheduler: Option<Scheduler>) -> Self {
        let inner = Rc::new_cyclic(|self_ref| EffectInner {
            id: EffectId::next(),
            f,
            scheduler,
            deps: RefCell::new(SmallVec::new()),
            active: Cell::new(true),
            runs: Cell::new(0),
            self_ref: self_ref.clone(),
        });
        Self { inner }
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// Run the effect now, re-collecting its dependencies.
    pub fn run(&self) -> T {
        self.inner.run()
    }

    /// Type-erased handle to this effect.
    pub fn handle(&self) -> EffectHandle {
        EffectHandle(self.inner.clone())
    }

    /// Unsubscribe and deactivate. A stopped effect still runs when called
    /// explicitly, but tracks nothing.
    pub fn stop(&self) {
        if self.inner.active.replace(false) {
            self.inner.cleanup();
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Number of tracked runs so far.
    pub fn run_count(&self) -> usize {
        self.inner.runs.get()
    }

    /// Number of `(object, key)` pairs read on the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }
}

impl<T> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.inner.runs.get())
            .field("dependency_count", &self.inner.deps.borrow().len())
            .field("active", &self.inner.active.get())
            .finish()
    }
}

/// Register an effect that runs immediately and on every change.
#[must_use = "dropping the effect unsubscribes it"]
pub fn effect<F>(f: F) -> Effect
where
    F: Fn() + 'static,
{
    effect_with(f, EffectOptions::default())
}

/// Register an effect with options.
#[must_use = "dropping the effect unsubscribes it"]
pub fn effect_with<T, F>(f: F, options: EffectOptions) -> Effect<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    let effect = Effect::new(Box::new(f), options.scheduler);
    if !options.lazy {
        effect.run();
    }
    effect
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
