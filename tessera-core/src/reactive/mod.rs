//! Reactive Primitives
//!
//! This module implements the reactive half of the crate: observed data,
//! effects, computeds, refs and watchers.
//!
//! # Concepts
//!
//! ## Observed data
//!
//! Structured data ([`Object`]: plain objects, arrays, Maps, Sets) is observed
//! through a [`Reactive`] view. Reading a key through the view inside an
//! effect records the dependency; writing a key re-runs the effects that read
//! it.
//!
//! ## Effects
//!
//! An [`Effect`] is a computation that re-runs whenever the data it read on
//! its last run changes. Effects can hand re-runs to a scheduler instead,
//! which is how batching (see [`crate::scheduler`]), computeds and watchers
//! are built.
//!
//! ### Ownership
//!
//! The dependency store holds effects weakly. The returned handle owns the
//! subscription: an [`Effect`], [`Computed`] or [`Watcher`] that is dropped
//! unsubscribes and never runs again. Keep the handle for as long as the
//! effect should live, in a binding (`let _view = effect(...)`, not
//! `let _ = ...`) or in a struct. An effect created inside another effect
//! lives only as long as the outer effect keeps its handle, typically in a
//! slot the outer closure owns.
//!
//! ## Computeds
//!
//! A [`Computed`] is a lazy, cached derived value. It recomputes on read,
//! and only after one of its inputs changed.
//!
//! ## Watchers
//!
//! A [`Watcher`] calls back with `(new, old)` when its source changes.
//!
//! # Implementation Notes
//!
//! The engine is single threaded. The running-effect stack, the dependency
//! store and the proxy identity cache are thread-local, and every handle is
//! `Rc` based, so none of the types here are `Send`.

mod array;
mod collections;
mod computed;
mod context;
mod effect;
mod ids;
mod proxy;
mod refs;
mod store;
mod value;
mod watch;

pub use computed::{computed, Computed};
pub use context::{untracked, ReactiveContext, TrackingGuard};
pub use effect::{effect, effect_with, Effect, EffectHandle, EffectOptions, Scheduler};
pub use ids::{EffectId, ObjectId};
pub use proxy::{
    is_reactive, is_readonly, reactive, readonly, shallow_reactive, shallow_readonly, to_raw,
    PropKey, ProxyMode, Reactive,
};
pub use refs::{make_ref, proxy_refs, to_ref, to_refs, FieldRef, ProxyRefs, Ref, RefSlot};
pub use store::{has_subscriber, is_observed, subscriber_count, track, trigger, DepKey, TriggerOp};
pub use value::{Container, ContainerKind, Fields, Identity, Object, Value};
pub use watch::{traverse, watch, watch_deep, Flush, OnInvalidate, WatchOptions, Watcher};
