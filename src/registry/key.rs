use std::any::Any;
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Identifier for one kind of ambient value, e.g. `"trace-id"`.
///
/// Keys are cheap to clone and compare by name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextKey(Arc<str>);

impl ContextKey {
    /// Create a key with the given name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// The key's name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContextKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ContextKey {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl Borrow<str> for ContextKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextKey({:?})", &*self.0)
    }
}

/// A type-erased ambient value.
///
/// Values are shared, never mutated, and compared by identity. Use
/// [`ContextValue::downcast_ref`] or [`ContextValue::get`] to read the typed
/// payload back.
#[derive(Clone)]
pub struct ContextValue(Arc<dyn Any + Send + Sync>);

impl ContextValue {
    /// Wrap a value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrow the payload as `T`, if it is one.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Clone the payload out as `T`, if it is one.
    pub fn get<T: Any + Clone>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }

    /// Whether the payload is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    /// Whether both handles point at the same payload.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ContextValue {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.downcast_ref::<String>() {
            write!(f, "ContextValue({s:?})")
        } else if let Some(s) = self.downcast_ref::<&'static str>() {
            write!(f, "ContextValue({s:?})")
        } else {
            f.write_str("ContextValue(..)")
        }
    }
}
