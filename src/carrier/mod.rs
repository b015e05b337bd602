//! Immutable context carriers.
//!
//! A carrier travels alongside a reactive or async computation, independent
//! of any thread. When one is supplied at capture time it is the
//! authoritative source of ambient values.

mod carrier;

pub use carrier::Carrier;
