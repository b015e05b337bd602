//! Registry of ambient context accessors.
//!
//! This module provides the pieces that know how to read and write one kind
//! of ambient value on the current thread, and the registry that maps each
//! [`ContextKey`] to its accessor.

mod accessor;
mod key;
mod registry;

pub use accessor::{FnAccessor, SlotAccessor, ThreadLocalAccessor};
pub use key::{ContextKey, ContextValue};
pub use registry::ContextRegistry;
