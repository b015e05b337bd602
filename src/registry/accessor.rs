use super::{ContextKey, ContextValue};
use crate::error::{ContextError, Result};
use std::cell::RefCell;
use std::collections::HashMap;

/// Reads and writes one kind of ambient value on the current thread.
///
/// Implementations only ever touch the calling thread's storage.
pub trait ThreadLocalAccessor: Send + Sync {
    /// The key this accessor is registered under.
    fn key(&self) -> &ContextKey;

    /// Current value on this thread, or `None` if the slot is empty.
    fn get_value(&self) -> Option<ContextValue>;

    /// Write `value` into this thread's slot.
    fn set_value(&self, value: ContextValue) -> Result<()>;

    /// Clear this thread's slot.
    fn reset(&self) -> Result<()>;
}

thread_local! {
    static SLOTS: RefCell<HashMap<ContextKey, ContextValue>> = RefCell::new(HashMap::new());
}

/// Accessor backed by a native thread-local slot per key.
///
/// Two `SlotAccessor`s with the same key address the same slot.
///
/// # Examples
///
/// ```
/// use carryover::registry::{ContextValue, SlotAccessor, ThreadLocalAccessor};
///
/// let user = SlotAccessor::new("user");
/// user.set_value(ContextValue::new("alice".to_string())).unwrap();
/// assert_eq!(user.get::<String>().as_deref(), Some("alice"));
///
/// user.reset().unwrap();
/// assert!(user.get_value().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct SlotAccessor {
    key: ContextKey,
}

impl SlotAccessor {
    /// Create an accessor for `key`.
    pub fn new(key: impl Into<ContextKey>) -> Self {
        Self { key: key.into() }
    }

    /// Read the current value as `T`.
    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        self.get_value().and_then(|value| value.get::<T>())
    }

    /// Write a typed value.
    pub fn set<T: Send + Sync + 'static>(&self, value: T) -> Result<()> {
        self.set_value(ContextValue::new(value))
    }

    fn destroyed(&self) -> ContextError {
        ContextError::accessor(self.key.clone(), "thread-local storage already destroyed")
    }
}

impl ThreadLocalAccessor for SlotAccessor {
    fn key(&self) -> &ContextKey {
        &self.key
    }

    fn get_value(&self) -> Option<ContextValue> {
        SLOTS
            .try_with(|slots| slots.borrow().get(&self.key).cloned())
            .ok()
            .flatten()
    }

    // Displaced values are dropped after the borrow ends: their `Drop` may
    // read slots again.
    fn set_value(&self, value: ContextValue) -> Result<()> {
        let old = SLOTS
            .try_with(|slots| slots.borrow_mut().insert(self.key.clone(), value))
            .map_err(|_| self.destroyed())?;
        drop(old);
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let old = SLOTS
            .try_with(|slots| slots.borrow_mut().remove(&self.key))
            .map_err(|_| self.destroyed())?;
        drop(old);
        Ok(())
    }
}

type Getter = Box<dyn Fn() -> Option<ContextValue> + Send + Sync>;
type Setter = Box<dyn Fn(ContextValue) -> Result<()> + Send + Sync>;
type Resetter = Box<dyn Fn() -> Result<()> + Send + Sync>;

/// Accessor assembled from read, write and clear functions.
///
/// Useful for bridging ambient state that already lives somewhere else,
/// such as a logging library's own thread-local.
pub struct FnAccessor {
    key: ContextKey,
    get: Getter,
    set: Setter,
    reset: Resetter,
}

impl FnAccessor {
    /// Create an accessor for `key` from its three operations.
    pub fn new<G, S, R>(key: impl Into<ContextKey>, get: G, set: S, reset: R) -> Self
    where
        G: Fn() -> Option<ContextValue> + Send + Sync + 'static,
        S: Fn(ContextValue) -> Result<()> + Send + Sync + 'static,
        R: Fn() -> Result<()> + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            get: Box::new(get),
            set: Box::new(set),
            reset: Box::new(reset),
        }
    }
}

impl ThreadLocalAccessor for FnAccessor {
    fn key(&self) -> &ContextKey {
        &self.key
    }

    fn get_value(&self) -> Option<ContextValue> {
        (self.get)()
    }

    fn set_value(&self, value: ContextValue) -> Result<()> {
        (self.set)(value)
    }

    fn reset(&self) -> Result<()> {
        (self.reset)()
    }
}

impl std::fmt::Debug for FnAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnAccessor")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
