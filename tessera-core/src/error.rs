//! Error types.
//!
//! Most of the engine is infallible by contract: read-only violations are
//! logged and ignored, missing subscribers are simply empty. The errors here
//! cover the cases a caller can actually get wrong.

use thiserror::Error;

use crate::reactive::ContainerKind;

/// Errors from typed operations on reactive views.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReactiveError {
    /// An array or collection method was called on the wrong container.
    #[error("`{op}` expects a {expected}, found a {found}")]
    KindMismatch {
        op: &'static str,
        expected: ContainerKind,
        found: ContainerKind,
    },
}

/// Errors raised while reconciling a virtual tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    /// A node that should already be mounted has no host handle.
    #[error("virtual node has no mounted host node: {0}")]
    MissingHandle(String),

    /// A teleport target selector did not resolve.
    #[error("teleport target `{0}` not found")]
    TeleportTarget(String),
}

/// Errors loading a [`crate::config::RuntimeConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid runtime configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
