//! Request correlation.
//!
//! Every outstanding request is identified by a [`ContextHandle`] issued by
//! the [`CallbackRegistry`]. The registry holds the request's callback until
//! a response, failure or cancellation retires the handle.

mod outcome;
mod registry;

pub use outcome::{CommandFailure, CommandOutcome, StatusFailure};
pub use registry::CallbackRegistry;

use std::fmt;

/// Opaque per-request handle. Never reused within a registry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ContextHandle(u64);

impl ContextHandle {
    /// Rebuild a handle carried across a transport boundary.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Lifecycle of a handle.
///
/// ```text
/// Unregistered -> Reserved -> Live -> Retired
///                     \_______________/
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContextState {
    /// Never issued by this registry.
    Unregistered,
    /// Issued by `allocate()`, no callback yet.
    Reserved,
    /// Callback registered and waiting.
    Live,
    /// Resolved or canceled. Terminal.
    Retired,
}
