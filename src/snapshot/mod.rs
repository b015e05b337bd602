//! Captured context and its live installations.
//!
//! - [`ContextSnapshot`]: immutable copy of every registered ambient value,
//!   taken once
//! - [`Scope`]: a snapshot installed on the current thread, together with the
//!   values it displaced

mod scope;
mod snapshot;

pub use scope::Scope;
pub use snapshot::ContextSnapshot;
