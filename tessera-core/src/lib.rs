//! Tessera Core
//!
//! This crate provides the runtime core of the Tessera UI engine.
//! It implements:
//!
//! - Fine-grained reactivity over plain objects, arrays, Maps and Sets
//! - Effects, computed values, refs and watchers
//! - A batching job scheduler
//! - A virtual-tree reconciler with two keyed-children diff algorithms
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Observed data, dependency tracking and effects
//! - `scheduler`: Job queue that batches scheduled effects
//! - `render`: Virtual nodes, the host interface and the reconciler
//! - `config`: Per-thread runtime configuration
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust,ignore
//! use tessera_core::reactive::{computed, effect, reactive, Object, Value};
//!
//! // Observe some state
//! let state = reactive(Object::from_fields([("count", Value::from(0))]));
//!
//! // Derive a value
//! let s = state.clone();
//! let doubled = computed(move || s.get("count").as_f64().unwrap_or_default() * 2.0);
//!
//! // React to changes
//! let s = state.clone();
//! let _e = effect(move || {
//!     println!("Count: {:?}, Doubled: {}", s.get("count"), doubled.get());
//! });
//!
//! // Update the state
//! state.set("count", 5);
//! // Effect runs again, prints: "Count: Number(5.0), Doubled: 10"
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod render;
pub mod scheduler;

pub use config::{DiffStrategy, RuntimeConfig};
pub use error::{ConfigError, ReactiveError, RenderError};
