use super::{ContextKey, ContextValue, SlotAccessor, ThreadLocalAccessor};
use crate::carrier::Carrier;
use crate::error::{ContextError, Result};
use parking_lot::RwLock;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

/// Table of ambient context accessors, keyed by [`ContextKey`].
///
/// Supports both a process-wide global registry (default) and explicitly
/// scoped registries for isolation. At most one accessor is registered per
/// key; registering another one for the same key replaces it.
///
/// # Examples
///
/// Using the global registry:
///
/// ```
/// use carryover::registry::{ContextRegistry, SlotAccessor};
///
/// let registry = ContextRegistry::global();
/// registry.register(SlotAccessor::new("doc-global"));
/// assert!(registry.is_registered(&"doc-global".into()));
/// ```
///
/// Using a scoped registry:
///
/// ```
/// use carryover::registry::ContextRegistry;
///
/// ContextRegistry::scope(|| {
///     let registry = ContextRegistry::current();
///     registry.register_slot("request-id");
///     assert_eq!(registry.len(), 1);
/// });
/// // Registry and its accessors are dropped here
/// ```
pub struct ContextRegistry {
    accessors: RwLock<HashMap<ContextKey, Arc<dyn ThreadLocalAccessor>>>,
}

// Thread-local stack for scoped registries
thread_local! {
    static REGISTRY_STACK: RefCell<Vec<Arc<ContextRegistry>>> = RefCell::new(vec![]);
}

impl ContextRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(ContextRegistry {
            accessors: RwLock::new(HashMap::new()),
        })
    }

    /// Run a function with a fresh isolated registry as the current one.
    ///
    /// The registry is dropped when the function returns.
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        Self::with_registry(Self::new(), f)
    }

    /// Get or create the process-wide registry.
    ///
    /// Used as the current registry when no scoped registry is active.
    pub fn global() -> Arc<Self> {
        use std::sync::OnceLock;
        static REGISTRY: OnceLock<Arc<ContextRegistry>> = OnceLock::new();
        Arc::clone(REGISTRY.get_or_init(Self::new))
    }

    /// Get the current registry (scoped or global fallback).
    ///
    /// Returns the registry from the top of the thread-local stack, or the
    /// global registry if no scoped registry is active.
    pub fn current() -> Arc<Self> {
        REGISTRY_STACK.with(|stack| stack.borrow().last().cloned().unwrap_or_else(Self::global))
    }

    /// Run a function with a specific registry as the current one.
    ///
    /// This pushes the registry onto the thread-local stack for the duration
    /// of the function execution, popping it again even if `f` panics.
    pub fn with_registry<F, R>(registry: Arc<Self>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        REGISTRY_STACK.with(|stack| {
            stack.borrow_mut().push(registry);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        REGISTRY_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Register an accessor, replacing any previous one for the same key.
    pub fn register<A>(&self, accessor: A) -> &Self
    where
        A: ThreadLocalAccessor + 'static,
    {
        self.register_arc(Arc::new(accessor))
    }

    /// Register a shared accessor, replacing any previous one for the same key.
    pub fn register_arc(&self, accessor: Arc<dyn ThreadLocalAccessor>) -> &Self {
        let key = accessor.key().clone();
        if self.accessors.write().insert(key.clone(), accessor).is_some() {
            tracing::debug!(key = %key, "replaced thread-local accessor");
        }
        self
    }

    /// Register a [`SlotAccessor`] for `key` and return it.
    pub fn register_slot(&self, key: impl Into<ContextKey>) -> SlotAccessor {
        let slot = SlotAccessor::new(key);
        self.register(slot.clone());
        slot
    }

    /// Remove the accessor for `key`. Returns whether one was registered.
    pub fn unregister(&self, key: &ContextKey) -> bool {
        self.accessors.write().remove(key).is_some()
    }

    /// Whether an accessor is registered for `key`.
    pub fn is_registered(&self, key: &ContextKey) -> bool {
        self.accessors.read().contains_key(key)
    }

    /// Number of registered accessors.
    pub fn len(&self) -> usize {
        self.accessors.read().len()
    }

    /// Whether no accessor is registered.
    pub fn is_empty(&self) -> bool {
        self.accessors.read().is_empty()
    }

    /// All keys with a registered accessor.
    pub fn registered_keys(&self) -> Vec<ContextKey> {
        let mut keys: Vec<_> = self.accessors.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Read `key` from the current thread. Unregistered keys read as absent.
    pub fn read_thread_local(&self, key: &ContextKey) -> Option<ContextValue> {
        self.accessor(key).and_then(|accessor| accessor.get_value())
    }

    /// Write `value` for `key` on the current thread; `None` clears the slot.
    pub fn write_thread_local(&self, key: &ContextKey, value: Option<ContextValue>) -> Result<()> {
        let accessor = self
            .accessor(key)
            .ok_or_else(|| ContextError::UnknownKey(key.clone()))?;
        match value {
            Some(value) => accessor.set_value(value),
            None => accessor.reset(),
        }
    }

    /// Values in `carrier` whose keys are registered here.
    pub fn values_in(&self, carrier: &Carrier) -> HashMap<ContextKey, ContextValue> {
        let accessors = self.accessors.read();
        carrier
            .iter()
            .filter(|(key, _)| accessors.contains_key(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Copy of the accessor table, sorted by key.
    ///
    /// Callers run accessors from the copy so the lock is never held while
    /// user code executes.
    pub(crate) fn accessors(&self) -> Vec<(ContextKey, Arc<dyn ThreadLocalAccessor>)> {
        let mut accessors: Vec<_> = self
            .accessors
            .read()
            .iter()
            .map(|(key, accessor)| (key.clone(), Arc::clone(accessor)))
            .collect();
        accessors.sort_by(|a, b| a.0.cmp(&b.0));
        accessors
    }

    fn accessor(&self, key: &ContextKey) -> Option<Arc<dyn ThreadLocalAccessor>> {
        self.accessors.read().get(key).cloned()
    }
}

impl std::fmt::Debug for ContextRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextRegistry")
            .field("keys", &self.registered_keys())
            .finish()
    }
}
