//! # Carryover
//!
//! Carry thread-bound ambient context (tracing ids, log correlation data,
//! security principals, ...) across the suspension points of async tasks.
//!
//! Worker threads are reused by many unrelated tasks, and one task may
//! resume on a different thread each time it wakes up. Carryover captures
//! the ambient values once, when a task is created, and installs them on
//! whichever thread resumes the task, putting back whatever was there when
//! the task suspends again.
//!
//! ## Building blocks
//!
//! - [`ContextRegistry`] - which ambient values exist and how to read/write
//!   them on the current thread
//! - [`Carrier`] - immutable key/value context travelling with a pipeline;
//!   preferred over thread-locals when present
//! - [`ContextSnapshot`] / [`Scope`] - captured values and their live
//!   installation on a thread
//!
//! ## Hooks
//!
//! - [`SuspensionBridge`] - per-task `on_resume` / `on_suspend` hooks for a
//!   scheduler
//! - [`Propagated`] / [`propagate`] - the same hooks applied around every
//!   poll of a future
//!
//! # Examples
//!
//! ```
//! use carryover::{propagate, ContextRegistry, ThreadLocalAccessor};
//!
//! let request = ContextRegistry::global().register_slot("doc-lib-request");
//! request.set(17_u64).unwrap();
//!
//! let task = propagate({
//!     let request = request.clone();
//!     async move { request.get::<u64>() }
//! });
//!
//! request.reset().unwrap();
//! let seen = futures_lite::future::block_on(task).unwrap();
//! assert_eq!(seen, Some(17));
//! assert_eq!(request.get::<u64>(), None);
//! ```

pub mod bridge;
pub mod carrier;
pub mod config;
pub mod error;
pub mod registry;
pub mod snapshot;

// Re-export main types for convenience
pub use bridge::{propagate, CallSite, Propagated, SuspensionBridge};
pub use carrier::Carrier;
pub use config::{BridgeConfig, CapturePolicy};
pub use error::{ContextError, Result};
pub use registry::{
    ContextKey, ContextRegistry, ContextValue, FnAccessor, SlotAccessor, ThreadLocalAccessor,
};
pub use snapshot::{ContextSnapshot, Scope};
