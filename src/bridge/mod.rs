//! Resume/suspend hooks for suspendable tasks.
//!
//! A scheduler creates one [`SuspensionBridge`] per task and calls
//! [`SuspensionBridge::on_resume`] / [`SuspensionBridge::on_suspend`] around
//! every execution window. [`Propagated`] does this for any future by
//! treating each `poll` as one window.

mod bridge;
mod future;

pub use bridge::{CallSite, SuspensionBridge};
pub use future::{propagate, Propagated};
