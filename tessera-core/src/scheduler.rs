//! Job Scheduler
//!
//! The scheduler batches triggered effects into a single flush.
//!
//! # How Batching Works
//!
//! 1. An effect created with [`EffectOptions::queued`] does not re-run inside
//!    the write that triggers it. Its scheduler calls [`queue_job`] instead.
//!
//! 2. The queue is de-duplicated by effect id: queueing an effect that is
//!    already waiting is a no-op, so N writes collapse into one run.
//!
//! 3. [`flush_jobs`] is the deferred step. It runs the queued jobs in the
//!    order they were first queued. A job queued while the flush is running
//!    (including one that already ran) runs later in the same flush.
//!
//! 4. A job that keeps re-queueing itself is cut off after
//!    [`RuntimeConfig::max_job_recursion`] runs in one flush.
//!
//! There is no event loop here. The host decides when a macro-step ends
//! and calls [`flush_jobs`], or wraps the step in [`tick`]. A host with its
//! own loop can install a hook with [`set_flush_hook`]; it is called each
//! time the queue goes from empty to pending, and is expected to arrange
//! a later [`flush_jobs`] call (for example by spawning a local task).
//!
//! [`EffectOptions::queued`]: crate::reactive::EffectOptions::queued
//! [`RuntimeConfig::max_job_recursion`]: crate::config::RuntimeConfig

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::config;
use crate::reactive::{EffectHandle, EffectId, Scheduler};

/// A unit of deferred work, identified by the effect it belongs to.
#[derive(Clone)]
pub struct Job {
    id: EffectId,
    task: Rc<dyn Fn()>,
}

impl Job {
    pub fn new(id: EffectId, task: impl Fn() + 'static) -> Self {
        Self {
            id,
            task: Rc::new(task),
        }
    }

    pub fn id(&self) -> EffectId {
        self.id
    }

    fn run(&self) {
        (self.task)()
    }
}

impl From<EffectHandle> for Job {
    fn from(effect: EffectHandle) -> Self {
        let id = effect.id();
        Job::new(id, move || effect.run())
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Job").field(&self.id).finish()
    }
}

thread_local! {
    static QUEUE: RefCell<IndexMap<EffectId, Job>> = RefCell::new(IndexMap::new());
    static FLUSHING: Cell<bool> = const { Cell::new(false) };
    static FLUSH_HOOK: RefCell<Option<Rc<dyn Fn()>>> = RefCell::new(None);
}

/// Install (or with `None`, remove) the hook that requests a flush.
pub fn set_flush_hook(hook: Option<Rc<dyn Fn()>>) {
    FLUSH_HOOK.with(|slot| *slot.borrow_mut() = hook);
}

/// Queue `job` unless a job for the same effect is already waiting.
pub fn queue_job(job: Job) {
    let was_empty = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        let was_empty = queue.is_empty();
        if !queue.contains_key(&job.id) {
            queue.insert(job.id, job);
        }
        was_empty
    });

    // A running flush drains the queue itself
    if was_empty && !FLUSHING.with(Cell::get) {
        let hook = FLUSH_HOOK.with(|slot| slot.borrow().clone());
        if let Some(hook) = hook {
            tracing::trace!("requesting flush");
            hook();
        }
    }
}

/// Whether any job is waiting for the next flush.
pub fn has_pending_jobs() -> bool {
    QUEUE.with(|queue| !queue.borrow().is_empty())
}

/// Run every queued job. Returns the number of jobs run.
///
/// A nested call from inside a running job returns 0 immediately; the
/// outer flush picks up whatever the job queued.
pub fn flush_jobs() -> usize {
    if FLUSHING.with(|flushing| flushing.replace(true)) {
        return 0;
    }
    let _reset = FlushGuard;

    let max_recursion = config::current().max_job_recursion;
    let mut counts: HashMap<EffectId, usize> = HashMap::new();
    let mut ran = 0;

    loop {
        let next = QUEUE.with(|queue| queue.borrow_mut().shift_remove_index(0));
        let Some((id, job)) = next else {
            break;
        };

        let count = counts.entry(id).or_insert(0);
        *count += 1;
        if *count > max_recursion {
            tracing::error!(
                job = id.raw(),
                limit = max_recursion,
                "maximum recursive updates exceeded, dropping job"
            );
            continue;
        }

        job.run();
        ran += 1;
    }

    tracing::debug!(jobs = ran, "flushed job queue");
    ran
}

struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        let _ = FLUSHING.try_with(|flushing| flushing.set(false));
    }
}

/// Run one macro-step: `f`, then a flush.
pub fn tick<T>(f: impl FnOnce() -> T) -> T {
    let result = f();
    flush_jobs();
    result
}

/// Scheduler that defers the effect to the job queue.
pub fn queued_scheduler() -> Scheduler {
    Rc::new(|effect: EffectHandle| queue_job(Job::from(effect)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
